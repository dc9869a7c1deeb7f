//! Static registry of the nineteen agent envelopes.
//!
//! Each entry is the declarative contract SPEC_FULL.md §12 assigns one
//! agent: the authority tier it is granted, the actions it may ask the
//! runtime to perform, the artifact types it must have read before it can
//! run, and the single artifact type it produces.

use orc_schemas::{
    AgentAction, AgentEnvelope, AgentName, ArtifactType, AuthorityTier, EnvelopeScope, Phase, ScopeVocabulary,
};

const ALL_ACTIONS: &[AgentAction] = &[
    AgentAction::ReadArtifact,
    AgentAction::CallLlm,
    AgentAction::WriteArtifact,
    AgentAction::Transition,
    AgentAction::PauseForHuman,
    AgentAction::EmitEvent,
    AgentAction::MutateFile,
];

const READ_ONLY_ACTIONS: &[AgentAction] = &[
    AgentAction::ReadArtifact,
    AgentAction::CallLlm,
    AgentAction::WriteArtifact,
    AgentAction::EmitEvent,
];

const DRAFTING_ACTIONS: &[AgentAction] = &[
    AgentAction::ReadArtifact,
    AgentAction::CallLlm,
    AgentAction::WriteArtifact,
    AgentAction::EmitEvent,
    AgentAction::PauseForHuman,
];

const CONSTITUTIONAL_ACTIONS: &[AgentAction] = &[
    AgentAction::ReadArtifact,
    AgentAction::CallLlm,
    AgentAction::WriteArtifact,
    AgentAction::EmitEvent,
    AgentAction::PauseForHuman,
    AgentAction::Transition,
];

const EXECUTION_WRITER_ACTIONS: &[AgentAction] = &[
    AgentAction::ReadArtifact,
    AgentAction::CallLlm,
    AgentAction::WriteArtifact,
    AgentAction::EmitEvent,
    AgentAction::PauseForHuman,
    AgentAction::Transition,
    AgentAction::MutateFile,
];

fn actions_for(tier: AuthorityTier) -> Vec<AgentAction> {
    match tier {
        AuthorityTier::ReadOnly => READ_ONLY_ACTIONS.to_vec(),
        AuthorityTier::Drafting => DRAFTING_ACTIONS.to_vec(),
        AuthorityTier::Constitutional => CONSTITUTIONAL_ACTIONS.to_vec(),
        AuthorityTier::ExecutionWriter => EXECUTION_WRITER_ACTIONS.to_vec(),
    }
}

/// The complement of `actions_for`: every action this tier's envelope does
/// NOT grant, checked first and loudest by `EnvelopeRuntime::authorize` --
/// an agent asking for one of these aborts the invocation before phase or
/// input checks even run (Guarantee #1).
fn forbidden_for(tier: AuthorityTier) -> Vec<AgentAction> {
    let granted = actions_for(tier);
    ALL_ACTIONS.iter().copied().filter(|a| !granted.contains(a)).collect()
}

/// Closed-vocabulary + density-cap scope for `ProjectRulesAuthor`'s output,
/// the one agent in this registry whose draft names an auth strategy by
/// keyword rather than free prose. Modeled the way `mqk-isolation`'s
/// `enforce_allocation_cap_micros` declares a fixed ceiling up front and
/// returns a structured breach rather than silently clamping: the allowed
/// vocabulary and the byte ceiling are both declared here, not discovered
/// at check time.
fn project_rules_scope() -> EnvelopeScope {
    EnvelopeScope {
        allowed_values: vec![ScopeVocabulary {
            field: "auth_provider".to_string(),
            allowed: vec![
                "email_password".to_string(),
                "oauth_google".to_string(),
                "oauth_github".to_string(),
                "magic_link".to_string(),
            ],
        }],
        forbidden_keywords: vec!["enterprise_sso".to_string()],
        max_content_bytes: Some(8192),
    }
}

struct Spec {
    agent_name: AgentName,
    authority: AuthorityTier,
    required_inputs: &'static [ArtifactType],
    produces: ArtifactType,
    secondary_produces: Option<ArtifactType>,
    scope: EnvelopeScope,
    phase: Phase,
}

impl Spec {
    fn new(
        agent_name: AgentName,
        authority: AuthorityTier,
        required_inputs: &'static [ArtifactType],
        produces: ArtifactType,
        phase: Phase,
    ) -> Self {
        Spec {
            agent_name,
            authority,
            required_inputs,
            produces,
            secondary_produces: None,
            scope: EnvelopeScope::default(),
            phase,
        }
    }
}

fn specs() -> Vec<Spec> {
    use AgentName::*;
    use ArtifactType::*;
    use AuthorityTier::*;
    use Phase::*;

    vec![
        Spec::new(IntentInterviewer, Drafting, &[], IntentAnswers, Intake),
        Spec::new(BasePromptDrafter, Drafting, &[IntentAnswers], BasePrompt, Planning),
        Spec::new(MasterPlanner, Drafting, &[BasePrompt], MasterPlan, Planning),
        Spec::new(ImplementationPlanner, Drafting, &[MasterPlan], ImplementationPlan, Planning),
        Spec::new(ScreenIndexer, Drafting, &[ImplementationPlan], ScreenIndex, Behavioral),
        Spec::new(UserRoleMapper, Drafting, &[ImplementationPlan], UserRoleTable, Behavioral),
        Spec::new(UserJourneyMapper, Drafting, &[ScreenIndex, UserRoleTable], UserJourney, Behavioral),
        Spec::new(VisualExpander, Drafting, &[UserJourney], VisualExpansion, VisualDesign),
        Spec::new(VisualNormalizer, Drafting, &[VisualExpansion], VisualNormalization, VisualDesign),
        Spec::new(VisualComposer, Drafting, &[VisualNormalization], VisualComposition, VisualDesign),
        Spec {
            secondary_produces: Some(ScreenMockup),
            ..Spec::new(VisualCodeRenderer, Drafting, &[VisualComposition], VisualCodeRendering, VisualDesign)
        },
        Spec {
            scope: project_rules_scope(),
            ..Spec::new(ProjectRulesAuthor, Constitutional, &[ScreenMockup], ProjectRules, ConstitutionalDraft)
        },
        Spec::new(BuildPromptAuthor, Drafting, &[ProjectRules], BuildPrompt, BuildPlanning),
        Spec::new(ExecutionPlanner, Drafting, &[BuildPrompt], ExecutionPlan, ExecutionPlanning),
        Spec::new(RoboticExecutor, ExecutionWriter, &[ExecutionPlan], ExecutionLog, RoboticExecution),
        Spec {
            secondary_produces: Some(VerificationReport),
            ..Spec::new(Verifier, ReadOnly, &[ExecutionLog], VerificationResult, Verification)
        },
        Spec::new(CompletionAuditor, Constitutional, &[VerificationResult], CompletionDecision, Verification),
        Spec::new(RepairPlanGenerator, Drafting, &[VerificationResult], RepairPlanDraft, RepairPlanning),
        Spec::new(RepairAgent, ExecutionWriter, &[RepairPlanApproved], RepairExecutionLog, RepairExecution),
    ]
}

/// Build the full set of envelopes, one per agent, in the order SPEC_FULL.md
/// §12 lists them.
pub(crate) fn all_envelopes() -> Vec<AgentEnvelope> {
    specs()
        .into_iter()
        .map(|s| AgentEnvelope {
            agent_name: s.agent_name,
            authority: s.authority,
            allowed_actions: actions_for(s.authority),
            forbidden_actions: forbidden_for(s.authority),
            required_inputs: s.required_inputs.to_vec(),
            produces: s.produces,
            secondary_produces: s.secondary_produces,
            scope: s.scope,
            phase: s.phase,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_agent_name_has_exactly_one_envelope() {
        let envelopes = all_envelopes();
        let mut seen = HashSet::new();
        for e in &envelopes {
            assert!(seen.insert(e.agent_name), "duplicate envelope for {:?}", e.agent_name);
        }
        assert_eq!(envelopes.len(), 19);
    }

    #[test]
    fn only_execution_writers_may_mutate_files() {
        for e in all_envelopes() {
            let allowed = e.permits(AgentAction::MutateFile);
            let is_writer = e.authority == AuthorityTier::ExecutionWriter;
            assert_eq!(allowed, is_writer, "mismatch for {:?}", e.agent_name);
        }
    }

    #[test]
    fn only_constitutional_or_above_may_transition() {
        for e in all_envelopes() {
            let allowed = e.permits(AgentAction::Transition);
            let may = matches!(
                e.authority,
                AuthorityTier::Constitutional | AuthorityTier::ExecutionWriter
            );
            assert_eq!(allowed, may, "mismatch for {:?}", e.agent_name);
        }
    }

    #[test]
    fn allowed_and_forbidden_actions_partition_the_full_set() {
        for e in all_envelopes() {
            for action in ALL_ACTIONS {
                assert_ne!(
                    e.permits(*action),
                    e.forbids(*action),
                    "{:?} must permit xor forbid {:?}",
                    e.agent_name,
                    action
                );
            }
        }
    }

    #[test]
    fn project_rules_author_rejects_enterprise_sso() {
        let envelopes = all_envelopes();
        let author = envelopes
            .iter()
            .find(|e| e.agent_name == AgentName::ProjectRulesAuthor)
            .unwrap();
        let draft = serde_json::json!({"auth_provider": "enterprise_sso"});
        let violation = author.scope.check(&draft).unwrap_err();
        assert!(matches!(violation, orc_schemas::ScopeViolation::ForbiddenKeyword { .. }));
    }

    #[test]
    fn project_rules_author_accepts_known_vocabulary() {
        let envelopes = all_envelopes();
        let author = envelopes
            .iter()
            .find(|e| e.agent_name == AgentName::ProjectRulesAuthor)
            .unwrap();
        let draft = serde_json::json!({"auth_provider": "oauth_google"});
        assert!(author.scope.check(&draft).is_ok());
    }
}
