use orc_envelope::EnvelopeRefusal;
use orc_schemas::{AgentAction, ArtifactType, OrchestratorError, Phase, ScopeViolation};

use crate::llm::LlmError;

/// Agent-Host-specific failure detail. Every variant maps onto exactly one
/// `OrchestratorError` taxonomy bucket (`spec.md` §7) via `From` below —
/// this type exists only to carry the richer context the gateway needs for
/// its own error event payloads and test assertions.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("conductor state violation: envelope scoped to {expected}, request is in {actual}")]
    PhaseMismatch { expected: Phase, actual: Phase },
    #[error("agent has no registered envelope")]
    UnregisteredAgent,
    #[error("context violation: required input {0:?} not yet produced")]
    MissingInput(ArtifactType),
    #[error("constitutional violation: action {0:?} not permitted by envelope")]
    ActionNotPermitted(AgentAction),
    #[error("constitutional violation: agent attempted forbidden action {0:?}")]
    ForbiddenAction(AgentAction),
    #[error("constitutional violation: {0}")]
    ScopeViolation(ScopeViolation),
    #[error("contract violation: {0}")]
    InvalidOutput(String),
    #[error("dependency failure: {0}")]
    Llm(#[from] LlmError),
    #[error("dependency failure: storage error: {0}")]
    Storage(String),
    #[error("integrity violation: {0}")]
    Integrity(String),
    #[error("conductor refused: {0}")]
    ConductorRefused(String),
    #[error("exit phase for {0} is ambiguous; use a dedicated resume operation")]
    AmbiguousExitPhase(Phase),
}

impl From<EnvelopeRefusal> for HostError {
    fn from(refusal: EnvelopeRefusal) -> Self {
        match refusal {
            // Only reachable if the registry itself is incomplete; every
            // `AgentName` variant has an envelope (see orc-envelope's
            // `every_agent_name_has_exactly_one_envelope`).
            EnvelopeRefusal::UnregisteredAgent => HostError::UnregisteredAgent,
            EnvelopeRefusal::PhaseMismatch { expected, actual } => {
                HostError::PhaseMismatch { expected, actual }
            }
            EnvelopeRefusal::MissingRequiredInput(t) => HostError::MissingInput(t),
            EnvelopeRefusal::ActionNotPermitted(a) => HostError::ActionNotPermitted(a),
            EnvelopeRefusal::ForbiddenAction(a) => HostError::ForbiddenAction(a),
        }
    }
}

impl From<HostError> for OrchestratorError {
    fn from(err: HostError) -> Self {
        match &err {
            HostError::PhaseMismatch { .. }
            | HostError::UnregisteredAgent
            | HostError::MissingInput(_)
            | HostError::ConductorRefused(_)
            | HostError::AmbiguousExitPhase(_) => OrchestratorError::Protocol(err.to_string()),
            HostError::ActionNotPermitted(_) | HostError::ForbiddenAction(_) | HostError::ScopeViolation(_) => {
                OrchestratorError::Constitutional(err.to_string())
            }
            HostError::InvalidOutput(_) => OrchestratorError::Contract(err.to_string()),
            HostError::Llm(_) | HostError::Storage(_) => OrchestratorError::Dependency(err.to_string()),
            HostError::Integrity(_) => OrchestratorError::Integrity(err.to_string()),
        }
    }
}
