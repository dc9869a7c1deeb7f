//! Agent Host — the SINGLE choke-point for every producer-agent invocation.
//!
//! # Invariant
//!
//! `AgentRunner` is private and never re-exported. The only public entry
//! point is `AgentHost::run_agent`, which evaluates, in the fixed order
//! `spec.md` §4.4 specifies: phase check -> lock -> context isolation -> LLM
//! invocation -> output validation -> dedup -> hash -> ledger write -> event
//! -> pause-for-human. This mirrors `BrokerGateway::enforce_gates` checking
//! `integrity_armed -> risk_allowed -> reconcile_clean` before ever reaching
//! `OrderRouter` — here the "order router" is the ledger/event-log write.
//!
//! Any failure from context isolation onward releases the request's lock
//! before propagating (`spec.md` §4.4 "Failure semantics": try/finally,
//! no retries, no partial writes).

use orc_schemas::{
    AgentAction, AgentEnvelope, AgentName, Artifact, ArtifactStatus, ArtifactType, ConductorState, Phase, RequestId,
};
use orc_store::{AppendOutcome, NewArtifact, NewEvent};
use serde::Serialize;
use sqlx::PgPool;

use crate::bundle::{self, type_tag};
use crate::completion_auditor::{self, CompletionDecision};
use crate::error::HostError;
use crate::llm::{LlmProvider, LlmRequest};
use orc_envelope::EnvelopeRuntime;

/// Envelope/request-hash schema version (`spec.md` §4.3 point 5). Bumping
/// this is a breaking protocol change: every previously computed
/// `request_hash` becomes unreachable by dedup.
const SCHEMA_VERSION: u32 = 1;

/// Determinism-constrained by default (`spec.md` §4.3 point 4): every
/// producer agent call is issued at or below this temperature.
const DEFAULT_TEMPERATURE: f32 = 0.2;

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Written(Artifact),
    Deduped(Artifact),
}

impl RunOutcome {
    pub fn into_artifact(self) -> Artifact {
        match self {
            RunOutcome::Written(a) | RunOutcome::Deduped(a) => a,
        }
    }

    pub fn was_deduped(&self) -> bool {
        matches!(self, RunOutcome::Deduped(_))
    }
}

/// The SINGLE choke-point through which a producer-agent invocation reaches
/// storage. `pub(crate)` so nothing outside this crate can construct one and
/// skip `AgentHost::run_agent`'s bookkeeping.
struct AgentRunner<'a, P: LlmProvider> {
    pool: &'a PgPool,
    envelopes: &'a EnvelopeRuntime,
    llm: &'a P,
}

impl<'a, P: LlmProvider> AgentRunner<'a, P> {
    async fn execute(&self, request_id: RequestId, agent_name: AgentName) -> Result<RunOutcome, HostError> {
        let envelope = self
            .envelopes
            .envelope_for(agent_name)
            .ok_or(HostError::UnregisteredAgent)?
            .clone();

        let state = fetch_state(self.pool, request_id).await?;
        if state.phase != envelope.phase {
            return Err(HostError::PhaseMismatch {
                expected: envelope.phase,
                actual: state.phase,
            });
        }

        orc_store::lock_acquire(self.pool, request_id, agent_name)
            .await
            .map_err(|e| HostError::ConductorRefused(e.to_string()))?;

        let result = self.execute_locked(request_id, agent_name, &envelope).await;
        if result.is_err() {
            // try/finally discipline: the lock is released on any failure
            // from context isolation onward, never left stale for a human to
            // clean up via `clear_stale_locks_on_boot`.
            let _ = orc_store::lock_release(self.pool, request_id).await;
        }
        result
    }

    async fn execute_locked(
        &self,
        request_id: RequestId,
        agent_name: AgentName,
        envelope: &AgentEnvelope,
    ) -> Result<RunOutcome, HostError> {
        let input_bundle = bundle::assemble(self.pool, request_id, &envelope.required_inputs).await?;
        let produced = input_bundle.produced_types();

        self.envelopes
            .authorize(agent_name, envelope.phase, &produced, AgentAction::CallLlm)?;

        let llm_request = LlmRequest {
            agent_name,
            system_prompt: format!("produce {}", type_tag(envelope.produces)),
            input_bundle: input_bundle.as_json(),
            temperature: DEFAULT_TEMPERATURE,
        };
        let response = self.llm.complete(&llm_request).await?;

        if !response.content.is_object() {
            return Err(HostError::InvalidOutput(
                "agent draft must be a JSON object".to_string(),
            ));
        }
        envelope
            .scope
            .check(&response.content)
            .map_err(HostError::ScopeViolation)?;

        self.envelopes
            .authorize(agent_name, envelope.phase, &produced, AgentAction::WriteArtifact)?;

        let input_hashes = input_bundle.input_hashes();
        let request_hash = derive_request_hash(agent_name, &input_hashes, envelope.produces);
        let content_hash = orc_hash::content_hash(&response.content, &input_hashes);

        // An envelope that never grants `PauseForHuman` has no human gate to
        // pause at -- the ReadOnly tier (Verifier) and any other
        // self-classifying writer go straight to `Approved`, the same way
        // `CompletionDecision` writes never pass through a literal human
        // approval step either.
        let gated = envelope.permits(AgentAction::PauseForHuman);
        let (status, approved_by) = if gated {
            (ArtifactStatus::AwaitingApproval, None)
        } else {
            (ArtifactStatus::Approved, Some("system".to_string()))
        };

        let new_artifact = NewArtifact {
            request_id,
            artifact_type: envelope.produces,
            produced_by: agent_name,
            content: response.content.clone(),
            content_hash,
            input_hashes: input_hashes.clone(),
            request_hash,
            status,
            approved_by,
        };
        let outcome = orc_store::append_artifact(self.pool, &new_artifact)
            .await
            .map_err(|e| HostError::Storage(e.to_string()))?;

        self.envelopes
            .authorize(agent_name, envelope.phase, &produced, AgentAction::EmitEvent)?;
        let (artifact, deduped) = match &outcome {
            AppendOutcome::Written(a) => (a.clone(), false),
            AppendOutcome::Deduped(a) => (a.clone(), true),
        };
        let event_type = if deduped {
            format!("{}_generated_dedup", type_tag(envelope.produces))
        } else {
            format!("{}_generated", type_tag(envelope.produces))
        };
        orc_store::append_event(
            self.pool,
            &NewEvent {
                request_id,
                event_type,
                payload: serde_json::json!({
                    "artifact_id": artifact.artifact_id,
                    "agent": agent_name.as_str(),
                    "version": artifact.version,
                }),
            },
        )
        .await
        .map_err(|e| HostError::Storage(e.to_string()))?;

        if !deduped {
            if let Some(secondary_type) = envelope.secondary_produces {
                self.write_secondary_artifact(request_id, agent_name, &response.content, secondary_type, &input_hashes)
                    .await?;
            }
        }

        if gated {
            self.envelopes
                .authorize(agent_name, envelope.phase, &produced, AgentAction::PauseForHuman)?;
            orc_store::set_awaiting_human(self.pool, request_id, true)
                .await
                .map_err(|e| HostError::Storage(e.to_string()))?;
        }
        orc_store::lock_release(self.pool, request_id)
            .await
            .map_err(|e| HostError::Storage(e.to_string()))?;

        Ok(match outcome {
            AppendOutcome::Written(a) => RunOutcome::Written(a),
            AppendOutcome::Deduped(_) => RunOutcome::Deduped(artifact),
        })
    }

    /// Write an agent's second declared output (`secondary_produces`) from
    /// the same invocation's response, keyed by its own type tag inside the
    /// content object (falling back to the whole response for a provider
    /// that didn't key its output). Always auto-approved: there is no second
    /// human gate for one agent call.
    async fn write_secondary_artifact(
        &self,
        request_id: RequestId,
        agent_name: AgentName,
        response_content: &serde_json::Value,
        secondary_type: ArtifactType,
        input_hashes: &[String],
    ) -> Result<(), HostError> {
        let content = response_content
            .get(type_tag(secondary_type))
            .cloned()
            .unwrap_or_else(|| response_content.clone());
        let content_hash = orc_hash::content_hash(&content, input_hashes);
        let request_hash = derive_request_hash(agent_name, input_hashes, secondary_type);

        let new_artifact = NewArtifact {
            request_id,
            artifact_type: secondary_type,
            produced_by: agent_name,
            content,
            content_hash,
            input_hashes: input_hashes.to_vec(),
            request_hash,
            status: ArtifactStatus::Approved,
            approved_by: Some("system".to_string()),
        };
        let outcome = orc_store::append_artifact(self.pool, &new_artifact)
            .await
            .map_err(|e| HostError::Storage(e.to_string()))?;
        let artifact = outcome.into_artifact();

        orc_store::append_event(
            self.pool,
            &NewEvent {
                request_id,
                event_type: format!("{}_generated", type_tag(secondary_type)),
                payload: serde_json::json!({
                    "artifact_id": artifact.artifact_id,
                    "agent": agent_name.as_str(),
                    "version": artifact.version,
                }),
            },
        )
        .await
        .map_err(|e| HostError::Storage(e.to_string()))?;

        Ok(())
    }
}

/// `request_hash = H(agent_name || input_hashes || produces || schema_version)`
/// (`spec.md` §4.3 point 5). Computed before the draft exists so a retried
/// invocation with identical inputs always lands on the same key, regardless
/// of whether the LLM's output happens to vary token-for-token.
fn derive_request_hash(agent_name: AgentName, input_hashes: &[String], produces: orc_schemas::ArtifactType) -> String {
    #[derive(Serialize)]
    struct Hashable<'a> {
        agent_name: &'a str,
        input_hashes: &'a [String],
        produces: orc_schemas::ArtifactType,
        schema_version: u32,
    }
    let hashable = Hashable {
        agent_name: agent_name.as_str(),
        input_hashes,
        produces,
        schema_version: SCHEMA_VERSION,
    };
    orc_hash::hash_value(&hashable).expect("serde_json::Value always serializes")
}

fn approve_error_to_host_error(err: orc_store::ApproveError) -> HostError {
    match err {
        orc_store::ApproveError::HashMismatch { .. } => HostError::Integrity(err.to_string()),
        orc_store::ApproveError::NotFound(_) | orc_store::ApproveError::NotAwaitingApproval(_) => {
            HostError::Storage(err.to_string())
        }
        orc_store::ApproveError::Storage(e) => HostError::Storage(e.to_string()),
    }
}

async fn fetch_state(pool: &PgPool, request_id: RequestId) -> Result<ConductorState, HostError> {
    orc_store::fetch_conductor_state(pool, request_id)
        .await
        .map_err(|e| HostError::Storage(e.to_string()))
}

/// Public face of the Agent Host. Owns the only `EnvelopeRuntime` and the
/// pool every invocation runs against.
pub struct AgentHost<P: LlmProvider> {
    pool: PgPool,
    envelopes: EnvelopeRuntime,
    llm: P,
}

impl<P: LlmProvider> AgentHost<P> {
    pub fn new(pool: PgPool, llm: P) -> Self {
        Self {
            pool,
            envelopes: EnvelopeRuntime::new(),
            llm,
        }
    }

    pub fn envelopes(&self) -> &EnvelopeRuntime {
        &self.envelopes
    }

    /// Run one producer agent once. Returns `RunOutcome::Deduped` instead of
    /// re-invoking the LLM's side effects when an identical invocation has
    /// already been recorded (`spec.md` §11 resume safety) -- note the LLM
    /// is still called (the draft and the dedup check both need its input
    /// hashes' shape), only the ledger write is skipped.
    pub async fn run_agent(
        &self,
        request_id: RequestId,
        agent_name: AgentName,
    ) -> Result<RunOutcome, orc_schemas::OrchestratorError> {
        let runner = AgentRunner {
            pool: &self.pool,
            envelopes: &self.envelopes,
            llm: &self.llm,
        };
        runner.execute(request_id, agent_name).await.map_err(Into::into)
    }

    /// Human approved the artifact paused at the request's current phase:
    /// re-verify its stored content hash, flip it to `Approved`, and advance
    /// to the envelope's singular exit phase. This is a system/human-triggered
    /// operation, not an agent action, so it does not pass through
    /// `EnvelopeRuntime::authorize` -- the same way `orc_store::cancel_request`
    /// is an admin escape hatch outside any agent's envelope.
    ///
    /// Approving a `RepairPlanDraft` is special-cased: it additionally
    /// selects the draft's first candidate and writes a separately-hashed
    /// `RepairPlanApproved` artifact (`spec.md` §4.5) before the phase
    /// transition, rather than advancing the draft itself in place.
    pub async fn approve(&self, request_id: RequestId) -> Result<ConductorState, orc_schemas::OrchestratorError> {
        self.approve_inner(request_id).await.map_err(Into::into)
    }

    async fn approve_inner(&self, request_id: RequestId) -> Result<ConductorState, HostError> {
        let state = fetch_state(&self.pool, request_id).await?;
        let next = orc_conductor::singular_next_phase(state.phase)
            .ok_or(HostError::AmbiguousExitPhase(state.phase))?;

        let awaiting = orc_store::fetch_awaiting_approval(&self.pool, request_id)
            .await
            .map_err(|e| HostError::Storage(e.to_string()))?
            .ok_or_else(|| HostError::Storage("no artifact is awaiting approval for this request".to_string()))?;

        let approved = orc_store::approve_artifact(&self.pool, awaiting.artifact_id, "human")
            .await
            .map_err(approve_error_to_host_error)?;

        if approved.artifact_type == ArtifactType::RepairPlanDraft {
            self.approve_repair_plan(request_id, &approved).await?;
        }

        orc_store::set_awaiting_human(&self.pool, request_id, false)
            .await
            .map_err(|e| HostError::Storage(e.to_string()))?;
        orc_store::transition_phase(&self.pool, request_id, next)
            .await
            .map_err(|e| HostError::ConductorRefused(e.to_string()))
    }

    /// Select the draft's first candidate (single-candidate path; human
    /// selection among several candidates is an open question deferred to a
    /// future UI), re-derive its own `plan_hash`, and write it as a new,
    /// independently-hashed `RepairPlanApproved` artifact, `approved_by`
    /// `"human"`. This is the artifact the Repair Agent actually reads --
    /// never the draft.
    async fn approve_repair_plan(&self, request_id: RequestId, draft: &Artifact) -> Result<(), HostError> {
        let candidates = draft
            .content
            .get("candidates")
            .and_then(|v| v.as_array())
            .ok_or_else(|| HostError::InvalidOutput("repair plan draft missing 'candidates'".to_string()))?;
        let candidate = candidates
            .first()
            .ok_or_else(|| HostError::InvalidOutput("repair plan draft has no candidates".to_string()))?;

        let verification_result =
            orc_store::current_approved_artifact(&self.pool, request_id, ArtifactType::VerificationResult)
                .await
                .map_err(|e| HostError::Storage(e.to_string()))?
                .ok_or(HostError::MissingInput(ArtifactType::VerificationResult))?;

        let allowed_files: Vec<String> = serde_json::from_value(
            candidate.get("allowed_files").cloned().unwrap_or(serde_json::Value::Null),
        )
        .map_err(|e| HostError::InvalidOutput(e.to_string()))?;
        let no_new_files = candidate.get("no_new_files").and_then(|v| v.as_bool()).unwrap_or(false);
        let actions_value = candidate.get("actions").cloned().unwrap_or(serde_json::Value::Array(vec![]));
        let actions: Vec<orc_repair::RepairAction> =
            serde_json::from_value(actions_value.clone()).map_err(|e| HostError::InvalidOutput(e.to_string()))?;

        let plan_hash = orc_hash::hash_value(&serde_json::json!({
            "allowed_files": allowed_files,
            "no_new_files": no_new_files,
            "actions": actions_value,
        }))
        .expect("serde_json::Value always serializes");

        let approved_plan = orc_repair::ApprovedRepairPlan {
            plan_hash,
            verification_result_hash: verification_result.content_hash.clone(),
            allowed_files,
            no_new_files,
            actions,
        };
        let content = serde_json::to_value(&approved_plan).expect("ApprovedRepairPlan always serializes");
        let input_hashes = vec![draft.content_hash.clone()];
        let content_hash = orc_hash::content_hash(&content, &input_hashes);
        let request_hash =
            derive_request_hash(AgentName::RepairPlanGenerator, &input_hashes, ArtifactType::RepairPlanApproved);

        let new_artifact = NewArtifact {
            request_id,
            artifact_type: ArtifactType::RepairPlanApproved,
            produced_by: AgentName::RepairPlanGenerator,
            content,
            content_hash,
            input_hashes,
            request_hash,
            status: ArtifactStatus::Approved,
            approved_by: Some("human".to_string()),
        };
        let outcome = orc_store::append_artifact(&self.pool, &new_artifact)
            .await
            .map_err(|e| HostError::Storage(e.to_string()))?;
        let artifact = outcome.into_artifact();

        orc_store::append_event(
            &self.pool,
            &NewEvent {
                request_id,
                event_type: "repair_plan_approved".to_string(),
                payload: serde_json::json!({ "artifact_id": artifact.artifact_id }),
            },
        )
        .await
        .map_err(|e| HostError::Storage(e.to_string()))?;

        Ok(())
    }

    /// Human-supplied content for a conversational agent (`spec.md` §6's
    /// `submit_input`), bypassing the LLM call entirely. Reuses the same
    /// phase-check/lock/context-isolation/write/event/pause template as
    /// `run_agent`, substituting the human's own content for a draft.
    pub async fn submit_input(
        &self,
        request_id: RequestId,
        artifact_type: ArtifactType,
        content: serde_json::Value,
    ) -> Result<RunOutcome, orc_schemas::OrchestratorError> {
        self.submit_input_inner(request_id, artifact_type, content)
            .await
            .map_err(Into::into)
    }

    async fn submit_input_inner(
        &self,
        request_id: RequestId,
        artifact_type: ArtifactType,
        content: serde_json::Value,
    ) -> Result<RunOutcome, HostError> {
        let agent_name = self
            .envelopes
            .producer_for(artifact_type)
            .ok_or(HostError::UnregisteredAgent)?;
        let envelope = self
            .envelopes
            .envelope_for(agent_name)
            .ok_or(HostError::UnregisteredAgent)?
            .clone();

        if !content.is_object() {
            return Err(HostError::InvalidOutput(
                "submitted input must be a JSON object".to_string(),
            ));
        }

        let state = fetch_state(&self.pool, request_id).await?;
        if state.phase != envelope.phase {
            return Err(HostError::PhaseMismatch {
                expected: envelope.phase,
                actual: state.phase,
            });
        }

        orc_store::lock_acquire(&self.pool, request_id, agent_name)
            .await
            .map_err(|e| HostError::ConductorRefused(e.to_string()))?;

        let result = self.submit_input_locked(request_id, agent_name, &envelope, content).await;
        if result.is_err() {
            let _ = orc_store::lock_release(&self.pool, request_id).await;
        }
        result
    }

    async fn submit_input_locked(
        &self,
        request_id: RequestId,
        agent_name: AgentName,
        envelope: &AgentEnvelope,
        content: serde_json::Value,
    ) -> Result<RunOutcome, HostError> {
        let input_bundle = bundle::assemble(&self.pool, request_id, &envelope.required_inputs).await?;
        let produced = input_bundle.produced_types();

        self.envelopes
            .authorize(agent_name, envelope.phase, &produced, AgentAction::WriteArtifact)?;

        let input_hashes = input_bundle.input_hashes();
        let request_hash = derive_request_hash(agent_name, &input_hashes, envelope.produces);
        let content_hash = orc_hash::content_hash(&content, &input_hashes);

        let gated = envelope.permits(AgentAction::PauseForHuman);
        let (status, approved_by) = if gated {
            (ArtifactStatus::AwaitingApproval, None)
        } else {
            (ArtifactStatus::Approved, Some("system".to_string()))
        };

        let new_artifact = NewArtifact {
            request_id,
            artifact_type: envelope.produces,
            produced_by: agent_name,
            content,
            content_hash,
            input_hashes,
            request_hash,
            status,
            approved_by,
        };
        let outcome = orc_store::append_artifact(&self.pool, &new_artifact)
            .await
            .map_err(|e| HostError::Storage(e.to_string()))?;

        self.envelopes
            .authorize(agent_name, envelope.phase, &produced, AgentAction::EmitEvent)?;
        let (artifact, deduped) = match &outcome {
            AppendOutcome::Written(a) => (a.clone(), false),
            AppendOutcome::Deduped(a) => (a.clone(), true),
        };
        let event_type = if deduped {
            format!("{}_generated_dedup", type_tag(envelope.produces))
        } else {
            format!("{}_generated", type_tag(envelope.produces))
        };
        orc_store::append_event(
            &self.pool,
            &NewEvent {
                request_id,
                event_type,
                payload: serde_json::json!({
                    "artifact_id": artifact.artifact_id,
                    "agent": agent_name.as_str(),
                    "version": artifact.version,
                }),
            },
        )
        .await
        .map_err(|e| HostError::Storage(e.to_string()))?;

        if gated {
            self.envelopes
                .authorize(agent_name, envelope.phase, &produced, AgentAction::PauseForHuman)?;
            orc_store::set_awaiting_human(&self.pool, request_id, true)
                .await
                .map_err(|e| HostError::Storage(e.to_string()))?;
        }
        orc_store::lock_release(&self.pool, request_id)
            .await
            .map_err(|e| HostError::Storage(e.to_string()))?;

        Ok(match outcome {
            AppendOutcome::Written(a) => RunOutcome::Written(a),
            AppendOutcome::Deduped(_) => RunOutcome::Deduped(artifact),
        })
    }

    /// Human rejected the paused artifact: clear the pause without
    /// advancing the phase, so the same agent can be re-run and (on genuinely
    /// different output) append a new version.
    pub async fn reject(&self, request_id: RequestId) -> Result<(), orc_schemas::OrchestratorError> {
        orc_store::set_awaiting_human(&self.pool, request_id, false)
            .await
            .map_err(|e| HostError::Storage(e.to_string()).into())
    }

    /// Run the Completion Auditor: classify the currently approved
    /// `VerificationResult` and write the one `CompletionDecision` artifact
    /// plus its one event.
    /// Unlike `run_agent`, this never calls the LLM and never mutates the
    /// Conductor's phase or lock -- realizing the decision is a distinct
    /// step, `resolve_completion_decision`.
    pub async fn run_completion_auditor(
        &self,
        request_id: RequestId,
    ) -> Result<CompletionDecision, orc_schemas::OrchestratorError> {
        self.run_completion_auditor_inner(request_id).await.map_err(Into::into)
    }

    async fn run_completion_auditor_inner(&self, request_id: RequestId) -> Result<CompletionDecision, HostError> {
        let state = fetch_state(&self.pool, request_id).await?;
        if state.phase != Phase::Verification {
            return Err(HostError::PhaseMismatch {
                expected: Phase::Verification,
                actual: state.phase,
            });
        }

        let report = orc_store::current_approved_artifact(&self.pool, request_id, ArtifactType::VerificationResult)
            .await
            .map_err(|e| HostError::Storage(e.to_string()))?
            .ok_or(HostError::MissingInput(ArtifactType::VerificationResult))?;

        orc_store::verify_artifact_chain(&self.pool, report.artifact_id)
            .await
            .map_err(|e| HostError::Integrity(e.to_string()))?;

        let outcome = completion_auditor::parse_verification_outcome(&report.content)
            .map_err(|e| HostError::InvalidOutput(e.to_string()))?;
        let decision = completion_auditor::decide(outcome, state.repair_attempts);

        let input_hashes = vec![report.content_hash.clone()];
        let content = serde_json::json!({ "decision": decision });
        let content_hash = orc_hash::content_hash(&content, &input_hashes);
        let request_hash = derive_request_hash(AgentName::CompletionAuditor, &input_hashes, completion_auditor::PRODUCES);

        let new_artifact = NewArtifact {
            request_id,
            artifact_type: completion_auditor::PRODUCES,
            produced_by: AgentName::CompletionAuditor,
            content,
            content_hash,
            input_hashes,
            request_hash,
            status: ArtifactStatus::Approved,
            approved_by: Some("system".to_string()),
        };
        let outcome = orc_store::append_artifact(&self.pool, &new_artifact)
            .await
            .map_err(|e| HostError::Storage(e.to_string()))?;
        let artifact = outcome.into_artifact();

        orc_store::append_event(
            &self.pool,
            &NewEvent {
                request_id,
                event_type: format!("completion_audit_{}", type_tag_for(decision)),
                payload: serde_json::json!({ "artifact_id": artifact.artifact_id, "decision": decision }),
            },
        )
        .await
        .map_err(|e| HostError::Storage(e.to_string()))?;

        Ok(decision)
    }

    /// Realize a previously written `CompletionDecision`: the only step that
    /// actually moves the Conductor's phase on the auditor's behalf. Kept
    /// separate from `run_completion_auditor` so the auditor's own
    /// invocation never mutates the Conductor, per `spec.md` §4.6.
    pub async fn resolve_completion_decision(
        &self,
        request_id: RequestId,
    ) -> Result<ConductorState, orc_schemas::OrchestratorError> {
        self.resolve_completion_decision_inner(request_id)
            .await
            .map_err(Into::into)
    }

    async fn resolve_completion_decision_inner(&self, request_id: RequestId) -> Result<ConductorState, HostError> {
        let decision_artifact =
            orc_store::current_approved_artifact(&self.pool, request_id, completion_auditor::PRODUCES)
                .await
                .map_err(|e| HostError::Storage(e.to_string()))?
                .ok_or(HostError::MissingInput(completion_auditor::PRODUCES))?;
        let decision: CompletionDecision = serde_json::from_value(
            decision_artifact
                .content
                .get("decision")
                .cloned()
                .ok_or_else(|| HostError::InvalidOutput("completion decision artifact missing 'decision'".to_string()))?,
        )
        .map_err(|e| HostError::InvalidOutput(e.to_string()))?;

        match decision {
            CompletionDecision::MarkCompleted => orc_store::transition_phase(&self.pool, request_id, Phase::Completed)
                .await
                .map_err(|e| HostError::ConductorRefused(e.to_string())),
            CompletionDecision::MarkFailed => orc_store::transition_phase(&self.pool, request_id, Phase::Failed)
                .await
                .map_err(|e| HostError::ConductorRefused(e.to_string())),
            CompletionDecision::RetryWithRepair => {
                orc_store::increment_repair_attempts(&self.pool, request_id)
                    .await
                    .map_err(|e| HostError::Storage(e.to_string()))?;
                orc_store::transition_phase(&self.pool, request_id, Phase::RepairPlanning)
                    .await
                    .map_err(|e| HostError::ConductorRefused(e.to_string()))
            }
            CompletionDecision::EscalateToHuman => {
                orc_store::set_awaiting_human(&self.pool, request_id, true)
                    .await
                    .map_err(|e| HostError::Storage(e.to_string()))?;
                fetch_state(&self.pool, request_id).await
            }
            // This concrete instantiation models the whole build as a single
            // execution unit (one `ExecutionLog` per request), so the
            // Robotic Executor never reports more units pending and `decide`
            // never actually returns this variant in practice. Kept so the
            // decision function stays complete and independently testable.
            CompletionDecision::ProceedToNextUnit => Err(HostError::InvalidOutput(
                "proceed_to_next_unit has no execution-unit loop in this instantiation".to_string(),
            )),
        }
    }

    /// Run the Repair Agent: apply the `RepairPlanApproved` plan against
    /// `fs` in strict order and write the one `RepairExecutionLog` artifact.
    /// No LLM call -- `fs` plays the role `self.llm` plays for `run_agent`,
    /// passed per-call rather than stored, since a workspace is owned per
    /// request rather than per host.
    pub async fn run_repair_agent(
        &self,
        request_id: RequestId,
        fs: &dyn orc_repair::WorkspaceFs,
    ) -> Result<orc_repair::RepairExecutionLog, orc_schemas::OrchestratorError> {
        self.run_repair_agent_inner(request_id, fs).await.map_err(Into::into)
    }

    async fn run_repair_agent_inner(
        &self,
        request_id: RequestId,
        fs: &dyn orc_repair::WorkspaceFs,
    ) -> Result<orc_repair::RepairExecutionLog, HostError> {
        let envelope = self
            .envelopes
            .envelope_for(AgentName::RepairAgent)
            .ok_or(HostError::UnregisteredAgent)?
            .clone();

        let state = fetch_state(&self.pool, request_id).await?;
        if state.phase != envelope.phase {
            return Err(HostError::PhaseMismatch {
                expected: envelope.phase,
                actual: state.phase,
            });
        }

        orc_store::lock_acquire(&self.pool, request_id, AgentName::RepairAgent)
            .await
            .map_err(|e| HostError::ConductorRefused(e.to_string()))?;

        let result = self.run_repair_agent_locked(request_id, &envelope, fs).await;
        if result.is_err() {
            let _ = orc_store::lock_release(&self.pool, request_id).await;
        }
        result
    }

    async fn run_repair_agent_locked(
        &self,
        request_id: RequestId,
        envelope: &AgentEnvelope,
        fs: &dyn orc_repair::WorkspaceFs,
    ) -> Result<orc_repair::RepairExecutionLog, HostError> {
        let input_bundle = bundle::assemble(&self.pool, request_id, &envelope.required_inputs).await?;
        let produced = input_bundle.produced_types();

        self.envelopes
            .authorize(AgentName::RepairAgent, envelope.phase, &produced, AgentAction::MutateFile)?;

        let plan_artifact = input_bundle
            .get(ArtifactType::RepairPlanApproved)
            .ok_or(HostError::MissingInput(ArtifactType::RepairPlanApproved))?;
        let plan: orc_repair::ApprovedRepairPlan = serde_json::from_value(plan_artifact.content.clone())
            .map_err(|e| HostError::InvalidOutput(e.to_string()))?;

        let recomputed_plan_hash = orc_hash::hash_value(&serde_json::json!({
            "allowed_files": &plan.allowed_files,
            "no_new_files": plan.no_new_files,
            "actions": &plan.actions,
        }))
        .expect("serde_json::Value always serializes");
        if recomputed_plan_hash != plan.plan_hash {
            return Err(HostError::Integrity(format!(
                "approved repair plan {} failed plan_hash validation",
                plan_artifact.artifact_id
            )));
        }

        let log = orc_repair::run_repair_plan(&plan, fs);

        self.envelopes
            .authorize(AgentName::RepairAgent, envelope.phase, &produced, AgentAction::WriteArtifact)?;

        let input_hashes = input_bundle.input_hashes();
        let content = serde_json::to_value(&log).expect("RepairExecutionLog always serializes");
        let content_hash = orc_hash::content_hash(&content, &input_hashes);
        let request_hash = derive_request_hash(AgentName::RepairAgent, &input_hashes, envelope.produces);

        // A successful run transitions immediately below with no intervening
        // human approval step; a failed run pauses for one instead, so only
        // the failure case actually sits `AwaitingApproval`.
        let (status, approved_by) = match log.terminal_status {
            orc_repair::TerminalStatus::Success => (ArtifactStatus::Approved, Some("system".to_string())),
            orc_repair::TerminalStatus::Failed => (ArtifactStatus::AwaitingApproval, None),
        };

        orc_store::append_artifact(
            &self.pool,
            &NewArtifact {
                request_id,
                artifact_type: envelope.produces,
                produced_by: AgentName::RepairAgent,
                content,
                content_hash,
                input_hashes,
                request_hash,
                status,
                approved_by,
            },
        )
        .await
        .map_err(|e| HostError::Storage(e.to_string()))?;

        self.envelopes
            .authorize(AgentName::RepairAgent, envelope.phase, &produced, AgentAction::EmitEvent)?;
        let event_type = match log.terminal_status {
            orc_repair::TerminalStatus::Success => "repair_execution_completed",
            orc_repair::TerminalStatus::Failed => "repair_execution_failed",
        };
        orc_store::append_event(
            &self.pool,
            &NewEvent {
                request_id,
                event_type: event_type.to_string(),
                payload: serde_json::json!({ "files_touched": log.files_touched }),
            },
        )
        .await
        .map_err(|e| HostError::Storage(e.to_string()))?;

        match log.terminal_status {
            orc_repair::TerminalStatus::Success => {
                self.envelopes
                    .authorize(AgentName::RepairAgent, envelope.phase, &produced, AgentAction::Transition)?;
                orc_store::transition_phase(&self.pool, request_id, Phase::Verification)
                    .await
                    .map_err(|e| HostError::ConductorRefused(e.to_string()))?;
            }
            orc_repair::TerminalStatus::Failed => {
                self.envelopes
                    .authorize(AgentName::RepairAgent, envelope.phase, &produced, AgentAction::PauseForHuman)?;
                orc_store::set_awaiting_human(&self.pool, request_id, true)
                    .await
                    .map_err(|e| HostError::Storage(e.to_string()))?;
            }
        }

        orc_store::lock_release(&self.pool, request_id)
            .await
            .map_err(|e| HostError::Storage(e.to_string()))?;

        Ok(log)
    }
}

fn type_tag_for(decision: CompletionDecision) -> String {
    serde_json::to_value(decision)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}
