mod common;

use common::ScriptedLlm;
use orc_agent_host::{AgentHost, CompletionDecision};
use orc_schemas::{ArtifactStatus, ArtifactType, Phase};
use orc_store::ledger::NewArtifact;
use orc_store::request::{insert_request, NewRequest};
use serde_json::json;
use uuid::Uuid;

async fn seed_request_in_verification(pool: &sqlx::PgPool, request_id: Uuid) -> anyhow::Result<()> {
    insert_request(
        pool,
        &NewRequest {
            request_id,
            original_prompt: "build a chore chart".to_string(),
        },
    )
    .await?;
    for phase in [
        Phase::Planning,
        Phase::Behavioral,
        Phase::VisualDesign,
        Phase::ConstitutionalDraft,
        Phase::BuildPlanning,
        Phase::ExecutionPlanning,
        Phase::RoboticExecution,
        Phase::Verification,
    ] {
        orc_store::transition_phase(pool, request_id, phase).await?;
    }
    Ok(())
}

async fn write_verification_result(pool: &sqlx::PgPool, request_id: Uuid, content: serde_json::Value) -> anyhow::Result<()> {
    let content_hash = orc_hash::content_hash(&content, &[]);
    orc_store::append_artifact(
        pool,
        &NewArtifact {
            request_id,
            artifact_type: ArtifactType::VerificationResult,
            produced_by: orc_schemas::AgentName::Verifier,
            content,
            content_hash: content_hash.clone(),
            input_hashes: vec![],
            request_hash: format!("req-{content_hash}"),
            status: ArtifactStatus::Approved,
            approved_by: Some("system".to_string()),
        },
    )
    .await?;
    Ok(())
}

#[tokio::test]
async fn a_passing_report_marks_the_request_completed() -> anyhow::Result<()> {
    let Some(pool) = common::db().await? else {
        return Ok(());
    };
    let request_id = Uuid::new_v4();
    seed_request_in_verification(&pool, request_id).await?;
    write_verification_result(&pool, request_id, json!({"passed": true, "more_units_pending": false})).await?;

    let host = AgentHost::new(pool.clone(), ScriptedLlm { draft: json!({}) });
    let decision = host.run_completion_auditor(request_id).await?;
    assert_eq!(decision, CompletionDecision::MarkCompleted);

    let events = orc_store::list_for_request(&pool, request_id).await?;
    assert!(events.iter().any(|e| e.event_type == "completion_audit_mark_completed"));

    let state = host.resolve_completion_decision(request_id).await?;
    assert_eq!(state.phase, Phase::Completed);

    Ok(())
}

#[tokio::test]
async fn a_repairable_failure_routes_to_repair_planning_and_counts_the_attempt() -> anyhow::Result<()> {
    let Some(pool) = common::db().await? else {
        return Ok(());
    };
    let request_id = Uuid::new_v4();
    seed_request_in_verification(&pool, request_id).await?;
    write_verification_result(&pool, request_id, json!({"passed": false, "failure_kind": null})).await?;

    let host = AgentHost::new(pool.clone(), ScriptedLlm { draft: json!({}) });
    let decision = host.run_completion_auditor(request_id).await?;
    assert_eq!(decision, CompletionDecision::RetryWithRepair);

    let state = host.resolve_completion_decision(request_id).await?;
    assert_eq!(state.phase, Phase::RepairPlanning);
    assert_eq!(state.repair_attempts, 1);

    Ok(())
}

#[tokio::test]
async fn a_security_violation_marks_failed_even_on_the_first_attempt() -> anyhow::Result<()> {
    let Some(pool) = common::db().await? else {
        return Ok(());
    };
    let request_id = Uuid::new_v4();
    seed_request_in_verification(&pool, request_id).await?;
    write_verification_result(
        &pool,
        request_id,
        json!({"passed": false, "failure_kind": "security_violation"}),
    )
    .await?;

    let host = AgentHost::new(pool.clone(), ScriptedLlm { draft: json!({}) });
    let decision = host.run_completion_auditor(request_id).await?;
    assert_eq!(decision, CompletionDecision::MarkFailed);

    let state = host.resolve_completion_decision(request_id).await?;
    assert_eq!(state.phase, Phase::Failed);

    Ok(())
}

#[tokio::test]
async fn auditing_does_not_itself_move_the_phase() -> anyhow::Result<()> {
    let Some(pool) = common::db().await? else {
        return Ok(());
    };
    let request_id = Uuid::new_v4();
    seed_request_in_verification(&pool, request_id).await?;
    write_verification_result(&pool, request_id, json!({"passed": true, "more_units_pending": false})).await?;

    let host = AgentHost::new(pool.clone(), ScriptedLlm { draft: json!({}) });
    host.run_completion_auditor(request_id).await?;

    let state = orc_store::fetch_conductor_state(&pool, request_id).await?;
    assert_eq!(state.phase, Phase::Verification, "auditing alone must not advance the phase");

    Ok(())
}
