//! Envelope Runtime — the SINGLE choke-point through which every agent
//! invocation must pass before it is allowed to touch an artifact, call an
//! LLM, mutate a file, transition the pipeline, or pause for a human.
//!
//! # Invariant
//!
//! `registry` is private. There is no way to construct an `AgentEnvelope`
//! from outside this crate and bypass the checks in [`EnvelopeRuntime::authorize`].
//! Every call evaluates, in order:
//!
//! 1. the agent is running in the phase its envelope is scoped to
//! 2. every artifact type its envelope lists as a required input has
//!    actually been produced for this request
//! 3. the requested action is one its authority tier's envelope permits
//!
//! The Agent Host calls `authorize` once per invocation and refuses to
//! proceed on any `EnvelopeRefusal`.

use crate::registry::all_envelopes;
use orc_schemas::{AgentAction, AgentEnvelope, AgentName, ArtifactType, Phase};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeRefusal {
    UnregisteredAgent,
    PhaseMismatch { expected: Phase, actual: Phase },
    MissingRequiredInput(ArtifactType),
    ActionNotPermitted(AgentAction),
    /// The action is on the envelope's explicit `forbidden_actions` list --
    /// distinct from `ActionNotPermitted`'s "simply not granted" (Guarantee
    /// #1: abort loudly, never silently skip the step).
    ForbiddenAction(AgentAction),
}

impl std::fmt::Display for EnvelopeRefusal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvelopeRefusal::UnregisteredAgent => write!(f, "ENVELOPE_REFUSED: agent has no registered envelope"),
            EnvelopeRefusal::PhaseMismatch { expected, actual } => {
                write!(f, "ENVELOPE_REFUSED: envelope scoped to phase {expected}, request is in {actual}")
            }
            EnvelopeRefusal::MissingRequiredInput(t) => {
                write!(f, "ENVELOPE_REFUSED: required input {t:?} not yet produced")
            }
            EnvelopeRefusal::ActionNotPermitted(a) => {
                write!(f, "ENVELOPE_REFUSED: action {a:?} not permitted by envelope")
            }
            EnvelopeRefusal::ForbiddenAction(a) => {
                write!(f, "CONSTITUTIONAL: agent attempted forbidden action {a:?}")
            }
        }
    }
}

impl std::error::Error for EnvelopeRefusal {}

/// The SINGLE choke-point for envelope enforcement. `registry` is private:
/// no external crate can construct an `AgentEnvelope` and skip straight to
/// delegation.
pub struct EnvelopeRuntime {
    registry: HashMap<AgentName, AgentEnvelope>,
}

impl Default for EnvelopeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvelopeRuntime {
    pub fn new() -> Self {
        let registry = all_envelopes()
            .into_iter()
            .map(|e| (e.agent_name, e))
            .collect();
        Self { registry }
    }

    /// Read-only introspection: the declared contract for an agent, with no
    /// enforcement side effects. Used by operator tooling (`orc-cli envelope
    /// show`) and by the Agent Host to pre-validate a bundle before `authorize`.
    pub fn envelope_for(&self, agent_name: AgentName) -> Option<&AgentEnvelope> {
        self.registry.get(&agent_name)
    }

    /// Reverse lookup: which agent's envelope declares `produces ==
    /// artifact_type`. Used by HTTP-layer operations (e.g. `submit_input`)
    /// that are handed an artifact type rather than an agent name.
    pub fn producer_for(&self, artifact_type: ArtifactType) -> Option<AgentName> {
        self.registry
            .values()
            .find(|e| e.produces == artifact_type)
            .map(|e| e.agent_name)
    }

    /// Every agent whose envelope is scoped to `phase` -- the set a caller
    /// may legally `start_agent` against while the request sits there.
    pub fn agents_for_phase(&self, phase: Phase) -> Vec<AgentName> {
        self.registry
            .values()
            .filter(|e| e.phase == phase)
            .map(|e| e.agent_name)
            .collect()
    }

    /// Authorize a single action for `agent_name`, currently sitting in
    /// `current_phase`, having already produced `produced_inputs` for this
    /// request. Checks run in the order documented above; the first failure
    /// is returned.
    pub fn authorize(
        &self,
        agent_name: AgentName,
        current_phase: Phase,
        produced_inputs: &HashSet<ArtifactType>,
        action: AgentAction,
    ) -> Result<(), EnvelopeRefusal> {
        let envelope = self
            .registry
            .get(&agent_name)
            .ok_or(EnvelopeRefusal::UnregisteredAgent)?;

        // Checked first, ahead of phase and input checks: a forbidden action
        // is refused loudly regardless of anything else about the call.
        if envelope.forbids(action) {
            return Err(EnvelopeRefusal::ForbiddenAction(action));
        }

        if envelope.phase != current_phase {
            return Err(EnvelopeRefusal::PhaseMismatch {
                expected: envelope.phase,
                actual: current_phase,
            });
        }

        for required in &envelope.required_inputs {
            if !produced_inputs.contains(required) {
                return Err(EnvelopeRefusal::MissingRequiredInput(*required));
            }
        }

        if !envelope.permits(action) {
            return Err(EnvelopeRefusal::ActionNotPermitted(action));
        }

        Ok(())
    }
}
