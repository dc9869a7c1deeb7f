mod common;

use common::ScriptedLlm;
use orc_agent_host::AgentHost;
use orc_schemas::{AgentName, Phase};
use orc_store::request::{insert_request, NewRequest};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn approving_a_paused_artifact_advances_the_phase() -> anyhow::Result<()> {
    let Some(pool) = common::db().await? else {
        return Ok(());
    };

    let request_id = Uuid::new_v4();
    insert_request(
        &pool,
        &NewRequest {
            request_id,
            original_prompt: "build a garden log".to_string(),
        },
    )
    .await?;

    let host = AgentHost::new(pool.clone(), ScriptedLlm { draft: json!({"answers": []}) });
    host.run_agent(request_id, AgentName::IntentInterviewer).await?;

    let state = host.approve(request_id).await?;
    assert_eq!(state.phase, Phase::Planning);
    assert!(!state.awaiting_human);

    Ok(())
}

#[tokio::test]
async fn rejecting_a_paused_artifact_clears_the_pause_without_advancing() -> anyhow::Result<()> {
    let Some(pool) = common::db().await? else {
        return Ok(());
    };

    let request_id = Uuid::new_v4();
    insert_request(
        &pool,
        &NewRequest {
            request_id,
            original_prompt: "build a garden log".to_string(),
        },
    )
    .await?;

    let host = AgentHost::new(pool.clone(), ScriptedLlm { draft: json!({"answers": []}) });
    host.run_agent(request_id, AgentName::IntentInterviewer).await?;

    host.reject(request_id).await?;

    let state = orc_store::fetch_conductor_state(&pool, request_id).await?;
    assert_eq!(state.phase, Phase::Intake);
    assert!(!state.awaiting_human);

    Ok(())
}

#[tokio::test]
async fn approving_at_a_fan_out_phase_is_refused() -> anyhow::Result<()> {
    let Some(pool) = common::db().await? else {
        return Ok(());
    };

    let request_id = Uuid::new_v4();
    insert_request(
        &pool,
        &NewRequest {
            request_id,
            original_prompt: "build a garden log".to_string(),
        },
    )
    .await?;
    orc_store::transition_phase(&pool, request_id, Phase::Planning).await?;
    orc_store::transition_phase(&pool, request_id, Phase::Behavioral).await?;
    orc_store::transition_phase(&pool, request_id, Phase::VisualDesign).await?;
    orc_store::transition_phase(&pool, request_id, Phase::ConstitutionalDraft).await?;
    orc_store::transition_phase(&pool, request_id, Phase::BuildPlanning).await?;
    orc_store::transition_phase(&pool, request_id, Phase::ExecutionPlanning).await?;
    orc_store::transition_phase(&pool, request_id, Phase::RoboticExecution).await?;
    orc_store::transition_phase(&pool, request_id, Phase::Verification).await?;

    let host = AgentHost::new(pool.clone(), ScriptedLlm { draft: json!({}) });
    let err = host.approve(request_id).await.unwrap_err();
    assert!(err.to_string().contains("ambiguous"));

    Ok(())
}
