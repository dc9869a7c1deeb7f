//! Drive a freshly-inserted request through every phase to `Completed`
//! (and, separately, around one `RepairPlanning`/`RepairExecution` loop),
//! playing the same "compose the real components into one driven loop"
//! role `Orchestrator::run` plays for a bar-by-bar backtest.
//!
//! The Conductor only ever unlocks one agent per phase before `approve`
//! advances past the whole phase (`decide_lock_acquire` rejects a second
//! lock while `awaiting_human` is set, and `approve` unconditionally jumps
//! to the phase's singular successor). A phase with more than one producing
//! agent -- Behavioral's `ScreenIndexer`/`UserRoleMapper`, VisualDesign's
//! `VisualExpander`/`VisualNormalizer`/`VisualComposer` -- therefore never
//! runs every sibling through the gateway in one pass; this harness seeds
//! those siblings' artifacts directly into the ledger, the same shortcut
//! `orc-agent-host`'s own `write_repair_plan_draft` scenario helper uses,
//! and drives only each phase's terminal agent through the real
//! `AgentHost`.

use orc_agent_host::AgentHost;
use orc_llm::ScriptedLlmProvider;
use orc_schemas::{AgentName, Artifact, ArtifactStatus, ArtifactType, ConductorState, RequestId};
use orc_store::{AppendOutcome, NewArtifact, NewRequest};
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::fs::InMemoryWorkspaceFs;

/// Append an artifact straight to the ledger, approved, bypassing the agent
/// that would normally produce it. Used only to stand in for a phase's
/// non-terminal sibling agents -- the terminal agent of every phase still
/// runs for real through `AgentHost::run_agent`. Written straight to
/// `Approved` since `bundle::assemble` only ever reads the approved slot.
pub async fn seed_artifact(
    pool: &PgPool,
    request_id: RequestId,
    artifact_type: ArtifactType,
    produced_by: AgentName,
    content: Value,
) -> anyhow::Result<Artifact> {
    let content_hash = orc_hash::content_hash(&content, &[]);
    let request_hash = format!("seed-{content_hash}");
    let outcome = orc_store::append_artifact(
        pool,
        &NewArtifact {
            request_id,
            artifact_type,
            produced_by,
            content,
            content_hash,
            input_hashes: vec![],
            request_hash,
            status: ArtifactStatus::Approved,
            approved_by: Some("system".to_string()),
        },
    )
    .await?;
    Ok(match outcome {
        AppendOutcome::Written(a) | AppendOutcome::Deduped(a) => a,
    })
}

async fn insert_fresh_request(pool: &PgPool, prompt: &str) -> anyhow::Result<RequestId> {
    let request_id = Uuid::new_v4();
    orc_store::insert_request(
        pool,
        &NewRequest {
            request_id,
            original_prompt: prompt.to_string(),
        },
    )
    .await?;
    Ok(request_id)
}

/// Drive the Drafting/Constitutional/BuildPlanning/ExecutionPlanning arc
/// up to a freshly-written `ExecutionLog`, leaving the request paused at
/// `Verification` with its lock released. Shared by both scenarios below.
async fn drive_to_verification(
    pool: &PgPool,
    request_id: RequestId,
    host: &AgentHost<ScriptedLlmProvider>,
) -> anyhow::Result<()> {
    host.run_agent(request_id, AgentName::IntentInterviewer).await?;
    host.approve(request_id).await?;

    seed_artifact(pool, request_id, ArtifactType::BasePrompt, AgentName::BasePromptDrafter, json!({"base_prompt": "placeholder"})).await?;
    seed_artifact(pool, request_id, ArtifactType::MasterPlan, AgentName::MasterPlanner, json!({"master_plan": "placeholder"})).await?;
    host.run_agent(request_id, AgentName::ImplementationPlanner).await?;
    host.approve(request_id).await?;

    seed_artifact(pool, request_id, ArtifactType::ScreenIndex, AgentName::ScreenIndexer, json!({"screens": ["home"]})).await?;
    seed_artifact(pool, request_id, ArtifactType::UserRoleTable, AgentName::UserRoleMapper, json!({"roles": ["owner"]})).await?;
    host.run_agent(request_id, AgentName::UserJourneyMapper).await?;
    host.approve(request_id).await?;

    seed_artifact(pool, request_id, ArtifactType::VisualExpansion, AgentName::VisualExpander, json!({"expansion": "placeholder"})).await?;
    seed_artifact(pool, request_id, ArtifactType::VisualNormalization, AgentName::VisualNormalizer, json!({"normalization": "placeholder"})).await?;
    seed_artifact(pool, request_id, ArtifactType::VisualComposition, AgentName::VisualComposer, json!({"composition": "placeholder"})).await?;
    host.run_agent(request_id, AgentName::VisualCodeRenderer).await?;
    host.approve(request_id).await?;

    host.run_agent(request_id, AgentName::ProjectRulesAuthor).await?;
    host.approve(request_id).await?;

    host.run_agent(request_id, AgentName::BuildPromptAuthor).await?;
    host.approve(request_id).await?;

    host.run_agent(request_id, AgentName::ExecutionPlanner).await?;
    host.approve(request_id).await?;

    host.run_agent(request_id, AgentName::RoboticExecutor).await?;
    host.approve(request_id).await?;

    Ok(())
}

/// Insert a request and drive it all the way to `Phase::Completed` along
/// the never-needs-repair path: a `Verifier` that reports a clean pass,
/// realized by the `CompletionAuditor` into `MarkCompleted`. Verification
/// has no singular exit phase (it fans out to `Completed`/`RepairPlanning`/
/// `Failed`), so the Completion Auditor's own two-step
/// `run_completion_auditor`/`resolve_completion_decision` realizes the
/// transition directly rather than going through `approve`.
pub async fn drive_to_completion(pool: &PgPool, prompt: &str) -> anyhow::Result<ConductorState> {
    let request_id = insert_fresh_request(pool, prompt).await?;
    let host = AgentHost::new(
        pool.clone(),
        ScriptedLlmProvider::new()
            .with_script(AgentName::Verifier, json!({"passed": true, "more_units_pending": false})),
    );

    drive_to_verification(pool, request_id, &host).await?;

    host.run_agent(request_id, AgentName::Verifier).await?;
    host.run_completion_auditor(request_id).await?;
    let state = host.resolve_completion_decision(request_id).await?;
    Ok(state)
}

/// Insert a request and drive it through one failed verification, a
/// `RepairAgent` pass against an in-memory workspace, and a clean
/// re-verification -- exercising `RetryWithRepair`'s loop back to
/// `Phase::Verification` (`legal_next_phases`'s `RepairExecution ->
/// Verification` edge) before finishing at `Completed`.
/// The `fs` the repair step writes against is returned so a caller can
/// assert on its final contents.
pub async fn drive_through_one_repair_cycle(
    pool: &PgPool,
    prompt: &str,
    seed_files: &[(&str, &str)],
) -> anyhow::Result<(ConductorState, InMemoryWorkspaceFs)> {
    let request_id = insert_fresh_request(pool, prompt).await?;
    let repair_plan = json!({
        "candidates": [{
            "candidate_id": "candidate-1",
            "allowed_files": seed_files.iter().map(|(path, _)| *path).collect::<Vec<_>>(),
            "no_new_files": true,
            "actions": seed_files
                .iter()
                .map(|(path, content)| json!({
                    "id": format!("repair-{path}"),
                    "file": path,
                    "kind": {"kind": "replace_content", "old_content": *content, "new_content": format!("{content} (repaired)")},
                }))
                .collect::<Vec<_>>(),
        }],
    });

    let host = AgentHost::new(
        pool.clone(),
        ScriptedLlmProvider::new()
            .with_script(AgentName::Verifier, json!({"passed": false, "failure_kind": null}))
            .with_script(AgentName::RepairPlanGenerator, repair_plan),
    );

    drive_to_verification(pool, request_id, &host).await?;

    host.run_agent(request_id, AgentName::Verifier).await?;
    host.run_completion_auditor(request_id).await?;
    let state = host.resolve_completion_decision(request_id).await?;
    assert_eq!(state.phase, orc_schemas::Phase::RepairPlanning, "a repairable failure must loop back through repair planning");

    host.run_agent(request_id, AgentName::RepairPlanGenerator).await?;
    host.approve(request_id).await?;

    let fs = InMemoryWorkspaceFs::seeded(seed_files);
    host.run_repair_agent(request_id, &fs).await?;

    let clean_host = AgentHost::new(
        pool.clone(),
        ScriptedLlmProvider::new()
            .with_script(AgentName::Verifier, json!({"passed": true, "more_units_pending": false})),
    );
    clean_host.run_agent(request_id, AgentName::Verifier).await?;
    clean_host.run_completion_auditor(request_id).await?;
    let state = clean_host.resolve_completion_decision(request_id).await?;

    Ok((state, fs))
}
