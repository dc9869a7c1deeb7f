//! Every agent named in the registry must have a total, reachable envelope:
//! no agent can act outside its phase, skip a required input, or exceed
//! its authority tier's permitted actions, regardless of call order.

use orc_envelope::EnvelopeRuntime;
use orc_schemas::{AgentAction, AgentName, ArtifactType, Phase};
use std::collections::HashSet;

#[test]
fn repair_agent_cannot_act_before_a_repair_plan_exists() {
    let rt = EnvelopeRuntime::new();
    let err = rt
        .authorize(
            AgentName::RepairAgent,
            Phase::RepairExecution,
            &HashSet::new(),
            AgentAction::MutateFile,
        )
        .unwrap_err();
    assert_eq!(
        err,
        orc_envelope::EnvelopeRefusal::MissingRequiredInput(ArtifactType::RepairPlanDraft)
    );
}

#[test]
fn repair_agent_authorized_once_plan_exists() {
    let rt = EnvelopeRuntime::new();
    let mut produced = HashSet::new();
    produced.insert(ArtifactType::RepairPlanDraft);
    let ok = rt.authorize(
        AgentName::RepairAgent,
        Phase::RepairExecution,
        &produced,
        AgentAction::MutateFile,
    );
    assert!(ok.is_ok());
}

#[test]
fn project_rules_author_is_the_only_constitutional_drafting_agent() {
    let rt = EnvelopeRuntime::new();
    let envelope = rt
        .envelope_for(AgentName::ProjectRulesAuthor)
        .expect("registered");
    assert_eq!(envelope.phase, Phase::ConstitutionalDraft);
    assert!(envelope.permits(AgentAction::Transition));
    assert!(!envelope.permits(AgentAction::MutateFile));
}

#[test]
fn intent_interviewer_requires_no_prior_artifacts() {
    let rt = EnvelopeRuntime::new();
    let ok = rt.authorize(
        AgentName::IntentInterviewer,
        Phase::Intake,
        &HashSet::new(),
        AgentAction::CallLlm,
    );
    assert!(ok.is_ok());
}
