//! Core shared types for the constitutional multi-agent orchestrator.
//!
//! Every other crate in the workspace depends on this one and nothing in
//! here depends on IO, a clock, or randomness beyond `Uuid` generation at
//! the call site.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type RequestId = Uuid;
pub type ArtifactId = Uuid;
pub type EventId = Uuid;

/// Pipeline phase a `Request` occupies. Order here is documentation only;
/// legality of a transition is decided by `orc-conductor`, not by enum order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Intake,
    Planning,
    Behavioral,
    VisualDesign,
    ConstitutionalDraft,
    BuildPlanning,
    ExecutionPlanning,
    RoboticExecution,
    Verification,
    RepairPlanning,
    RepairExecution,
    Completed,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_else(|| "unknown".to_string());
        write!(f, "{s}")
    }
}

/// Every producible artifact type named in the external interface contract.
/// Changing this enum's wire representation is a breaking protocol bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactType {
    IntentAnswers,
    BasePrompt,
    MasterPlan,
    ImplementationPlan,
    ScreenIndex,
    UserRoleTable,
    UserJourney,
    VisualExpansion,
    VisualNormalization,
    VisualComposition,
    VisualCodeRendering,
    ScreenMockup,
    ProjectRules,
    BuildPrompt,
    ExecutionPlan,
    ExecutionLog,
    VerificationResult,
    VerificationReport,
    RepairPlanDraft,
    RepairPlanApproved,
    RepairExecutionLog,
    CompletionDecision,
}

/// The 19 canonical agents (see SPEC_FULL.md §12). Wire-stable name used as
/// the envelope registry key and as the `produced_by` field on artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentName {
    IntentInterviewer,
    BasePromptDrafter,
    MasterPlanner,
    ImplementationPlanner,
    ScreenIndexer,
    UserRoleMapper,
    UserJourneyMapper,
    VisualExpander,
    VisualNormalizer,
    VisualComposer,
    VisualCodeRenderer,
    ProjectRulesAuthor,
    BuildPromptAuthor,
    ExecutionPlanner,
    RoboticExecutor,
    Verifier,
    RepairPlanGenerator,
    RepairAgent,
    CompletionAuditor,
}

impl AgentName {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentName::IntentInterviewer => "intent_interviewer",
            AgentName::BasePromptDrafter => "base_prompt_drafter",
            AgentName::MasterPlanner => "master_planner",
            AgentName::ImplementationPlanner => "implementation_planner",
            AgentName::ScreenIndexer => "screen_indexer",
            AgentName::UserRoleMapper => "user_role_mapper",
            AgentName::UserJourneyMapper => "user_journey_mapper",
            AgentName::VisualExpander => "visual_expander",
            AgentName::VisualNormalizer => "visual_normalizer",
            AgentName::VisualComposer => "visual_composer",
            AgentName::VisualCodeRenderer => "visual_code_renderer",
            AgentName::ProjectRulesAuthor => "project_rules_author",
            AgentName::BuildPromptAuthor => "build_prompt_author",
            AgentName::ExecutionPlanner => "execution_planner",
            AgentName::RoboticExecutor => "robotic_executor",
            AgentName::Verifier => "verifier",
            AgentName::RepairPlanGenerator => "repair_plan_generator",
            AgentName::RepairAgent => "repair_agent",
            AgentName::CompletionAuditor => "completion_auditor",
        }
    }
}

/// Authority tier an envelope grants its agent. Higher tiers unlock actions
/// lower tiers are forbidden from (mutate_file, transition).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorityTier {
    ReadOnly,
    Drafting,
    Constitutional,
    ExecutionWriter,
}

/// An action an agent may ask the Envelope Runtime to perform on its behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentAction {
    ReadArtifact,
    CallLlm,
    WriteArtifact,
    Transition,
    PauseForHuman,
    EmitEvent,
    MutateFile,
}

/// An artifact's place in the approval lifecycle (`spec.md` §3). `Draft`
/// exists for wire completeness -- this implementation moves a freshly
/// written artifact straight to `AwaitingApproval`, the same way
/// `CompletionDecision` never passes through a literal "proceed to next
/// unit" loop in practice (see `gateway.rs`'s note on that variant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    Draft,
    AwaitingApproval,
    Approved,
    Rejected,
}

/// A committed artifact: content-addressed, append-only, hash-locked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub artifact_id: ArtifactId,
    pub request_id: RequestId,
    pub artifact_type: ArtifactType,
    pub produced_by: AgentName,
    pub version: u32,
    pub content: serde_json::Value,
    pub content_hash: String,
    pub input_hashes: Vec<String>,
    pub request_hash: String,
    pub status: ArtifactStatus,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Global per-request pipeline state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConductorState {
    pub request_id: RequestId,
    pub phase: Phase,
    pub locked: bool,
    pub locked_by: Option<AgentName>,
    pub awaiting_human: bool,
    pub repair_attempts: u32,
    pub updated_at: DateTime<Utc>,
}

/// Append-only audit record. `created_at` is excluded from `content_hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_id: EventId,
    pub request_id: RequestId,
    pub seq: u64,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub hash_prev: Option<String>,
    pub hash_self: String,
    pub created_at: DateTime<Utc>,
}

/// A single closed-vocabulary constraint on one field of an artifact's
/// content: every string value under `field` (a bare top-level key, or every
/// string in a top-level array) must appear in `allowed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeVocabulary {
    pub field: String,
    pub allowed: Vec<String>,
}

/// Scope an envelope enforces on its own agent's output, modeled on the same
/// fixed-ceiling / single-structured-breach shape
/// `enforce_allocation_cap_micros`/`AllocationCapBreach` uses for exposure
/// limits: a ceiling declared up front at registration time, one function
/// that returns `Ok` or names exactly what broke it. An envelope with no
/// constraints (the default) always checks `Ok`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EnvelopeScope {
    pub allowed_values: Vec<ScopeVocabulary>,
    pub forbidden_keywords: Vec<String>,
    pub max_content_bytes: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeViolation {
    /// A value outside its field's closed vocabulary -- "CANONICALIZATION
    /// FAILURE" in the operator-facing failure taxonomy.
    UnknownVocabulary { field: String, value: String },
    /// A blanket forbidden keyword found anywhere in the content.
    ForbiddenKeyword { keyword: String },
    /// Canonical content exceeded the envelope's density cap.
    DensityExceeded { max_bytes: usize, actual_bytes: usize },
}

impl fmt::Display for ScopeViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeViolation::UnknownVocabulary { field, value } => {
                write!(f, "CANONICALIZATION FAILURE: field {field:?} has value {value:?} outside its closed vocabulary")
            }
            ScopeViolation::ForbiddenKeyword { keyword } => {
                write!(f, "SCOPE VIOLATION: forbidden keyword {keyword:?} present in content")
            }
            ScopeViolation::DensityExceeded { max_bytes, actual_bytes } => {
                write!(f, "SCOPE VIOLATION: content is {actual_bytes} bytes, exceeding the {max_bytes}-byte cap")
            }
        }
    }
}

fn scalar_strings(v: &serde_json::Value) -> Vec<String> {
    match v {
        serde_json::Value::String(s) => vec![s.clone()],
        serde_json::Value::Array(items) => items.iter().filter_map(|i| i.as_str().map(str::to_string)).collect(),
        _ => Vec::new(),
    }
}

impl EnvelopeScope {
    /// Evaluate every rule against `content`, in the same fixed order every
    /// time: closed vocabulary, then forbidden keywords, then density. The
    /// first broken rule is returned; callers never see more than one
    /// violation per check.
    pub fn check(&self, content: &serde_json::Value) -> Result<(), ScopeViolation> {
        for vocab in &self.allowed_values {
            if let Some(found) = content.get(&vocab.field) {
                for value in scalar_strings(found) {
                    if !vocab.allowed.iter().any(|a| *a == value) {
                        return Err(ScopeViolation::UnknownVocabulary {
                            field: vocab.field.clone(),
                            value,
                        });
                    }
                }
            }
        }

        let serialized = content.to_string();
        for keyword in &self.forbidden_keywords {
            if serialized.contains(keyword.as_str()) {
                return Err(ScopeViolation::ForbiddenKeyword { keyword: keyword.clone() });
            }
        }

        if let Some(max) = self.max_content_bytes {
            let actual = serialized.len();
            if actual > max {
                return Err(ScopeViolation::DensityExceeded {
                    max_bytes: max,
                    actual_bytes: actual,
                });
            }
        }

        Ok(())
    }
}

/// Declarative per-agent contract, registered statically at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEnvelope {
    pub agent_name: AgentName,
    pub authority: AuthorityTier,
    pub allowed_actions: Vec<AgentAction>,
    /// Actions this envelope refuses outright, distinct from actions that
    /// are merely absent from `allowed_actions`: the runtime aborts loudly
    /// and short-circuits every other check the moment one is requested.
    pub forbidden_actions: Vec<AgentAction>,
    pub required_inputs: Vec<ArtifactType>,
    pub produces: ArtifactType,
    /// A second artifact type this envelope's agent also emits from the
    /// same invocation (e.g. the Visual Code Renderer's screen mockup
    /// alongside its rendered code). Written immediately as `Approved` --
    /// only `produces` is gated behind human approval.
    pub secondary_produces: Option<ArtifactType>,
    pub scope: EnvelopeScope,
    pub phase: Phase,
}

impl AgentEnvelope {
    pub fn permits(&self, action: AgentAction) -> bool {
        self.allowed_actions.contains(&action)
    }

    pub fn forbids(&self, action: AgentAction) -> bool {
        self.forbidden_actions.contains(&action)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("protocol violation: {0}")]
    Protocol(String),
    #[error("integrity violation: {0}")]
    Integrity(String),
    #[error("constitutional violation: {0}")]
    Constitutional(String),
    #[error("contract violation: {0}")]
    Contract(String),
    #[error("dependency failure: {0}")]
    Dependency(String),
    #[error("repair-bound failure: {0}")]
    RepairBound(String),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
