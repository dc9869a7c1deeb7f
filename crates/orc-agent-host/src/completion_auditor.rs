//! Completion Auditor — a pure decision function, not an LLM call.
//!
//! Consulted after verification, it never mutates artifacts or the
//! Conductor itself; it only writes its own decision artifact and emits one
//! event. Realizing the decision (moving the Conductor's phase) is
//! therefore a *separate* step — see `AgentHost::resolve_completion_decision`
//! in `gateway.rs` — so the auditor's own invocation stays pure.

use orc_schemas::ArtifactType;
use serde::{Deserialize, Serialize};

/// The non-repairable error taxonomy (Open Question resolution, `spec.md`
/// §9 / DESIGN.md). Driven by the verification artifact's structured
/// `failure_kind` field, never by matching keywords in free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonRepairableKind {
    SecurityViolation,
    RulesetViolation,
    ArchitecturalConflict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionDecision {
    ProceedToNextUnit,
    MarkCompleted,
    RetryWithRepair,
    EscalateToHuman,
    MarkFailed,
}

/// The verification result shape the auditor classifies. Parsed from the
/// `VerificationResult` artifact's structured content -- never from the raw
/// LLM-authored prose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationOutcome {
    Passed { more_units_pending: bool },
    Failed { non_repairable: Option<NonRepairableKind> },
}

#[derive(Debug, thiserror::Error)]
pub enum VerificationReportError {
    #[error("verification report missing required field {0:?}")]
    MissingField(&'static str),
    #[error("verification report field {0:?} had an unexpected shape")]
    MalformedField(&'static str),
}

/// Parse the expected shape out of a `VerificationResult` artifact's
/// content: `{"passed": bool, "more_units_pending": bool, "failure_kind":
/// string | null}`.
pub fn parse_verification_outcome(content: &serde_json::Value) -> Result<VerificationOutcome, VerificationReportError> {
    let passed = content
        .get("passed")
        .and_then(|v| v.as_bool())
        .ok_or(VerificationReportError::MissingField("passed"))?;

    if passed {
        let more_units_pending = content
            .get("more_units_pending")
            .and_then(|v| v.as_bool())
            .ok_or(VerificationReportError::MissingField("more_units_pending"))?;
        return Ok(VerificationOutcome::Passed { more_units_pending });
    }

    let non_repairable = match content.get("failure_kind") {
        None | Some(serde_json::Value::Null) => None,
        Some(v) => {
            let kind: NonRepairableKind = serde_json::from_value(v.clone())
                .map_err(|_| VerificationReportError::MalformedField("failure_kind"))?;
            Some(kind)
        }
    };
    Ok(VerificationOutcome::Failed { non_repairable })
}

/// `spec.md` §4.6's decision table. Determinism required: identical inputs
/// always produce the identical decision.
pub fn decide(outcome: VerificationOutcome, repair_attempts: u32) -> CompletionDecision {
    match outcome {
        VerificationOutcome::Passed { more_units_pending: false } => CompletionDecision::MarkCompleted,
        VerificationOutcome::Passed { more_units_pending: true } => CompletionDecision::ProceedToNextUnit,
        VerificationOutcome::Failed { non_repairable: Some(_) } => CompletionDecision::MarkFailed,
        VerificationOutcome::Failed { non_repairable: None } => {
            if repair_attempts < orc_conductor::MAX_REPAIR_ATTEMPTS {
                CompletionDecision::RetryWithRepair
            } else {
                CompletionDecision::EscalateToHuman
            }
        }
    }
}

pub(crate) const PRODUCES: ArtifactType = ArtifactType::CompletionDecision;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn passed_with_no_more_units_marks_completed() {
        let outcome = parse_verification_outcome(&json!({"passed": true, "more_units_pending": false})).unwrap();
        assert_eq!(decide(outcome, 0), CompletionDecision::MarkCompleted);
    }

    #[test]
    fn passed_with_more_units_proceeds() {
        let outcome = parse_verification_outcome(&json!({"passed": true, "more_units_pending": true})).unwrap();
        assert_eq!(decide(outcome, 0), CompletionDecision::ProceedToNextUnit);
    }

    #[test]
    fn failed_non_repairable_marks_failed_regardless_of_attempts() {
        let outcome = parse_verification_outcome(&json!({
            "passed": false,
            "failure_kind": "security_violation"
        }))
        .unwrap();
        assert_eq!(decide(outcome, 0), CompletionDecision::MarkFailed);
    }

    #[test]
    fn failed_repairable_under_limit_retries() {
        let outcome = parse_verification_outcome(&json!({"passed": false, "failure_kind": null})).unwrap();
        assert_eq!(decide(outcome, orc_conductor::MAX_REPAIR_ATTEMPTS - 1), CompletionDecision::RetryWithRepair);
    }

    #[test]
    fn failed_repairable_at_limit_escalates() {
        let outcome = parse_verification_outcome(&json!({"passed": false, "failure_kind": null})).unwrap();
        assert_eq!(decide(outcome, orc_conductor::MAX_REPAIR_ATTEMPTS), CompletionDecision::EscalateToHuman);
    }

    #[test]
    fn missing_passed_field_is_rejected() {
        let err = parse_verification_outcome(&json!({})).unwrap_err();
        assert!(matches!(err, VerificationReportError::MissingField("passed")));
    }
}
