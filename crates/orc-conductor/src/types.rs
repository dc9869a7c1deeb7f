use orc_schemas::{AgentName, Phase};

/// Conductor's in-memory view of a request's pipeline state. Mirrors
/// `orc_schemas::ConductorState` but drops the wall-clock field — pure
/// decision logic never reads `updated_at`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConductorView {
    pub phase: Phase,
    pub locked: bool,
    pub locked_by: Option<AgentName>,
    pub awaiting_human: bool,
    pub repair_attempts: u32,
}

impl ConductorView {
    pub fn fresh() -> Self {
        Self {
            phase: Phase::Intake,
            locked: false,
            locked_by: None,
            awaiting_human: false,
            repair_attempts: 0,
        }
    }
}

/// Decision returned for a requested phase transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionDecision {
    pub action: TransitionAction,
    pub reason: TransitionReason,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransitionAction {
    Allow,
    Reject,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransitionReason {
    Allowed,
    RequestTerminal,
    AwaitingHuman,
    IllegalPhaseEdge,
    RepairAttemptsExhausted,
}

/// Decision returned for a requested lock acquisition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockDecision {
    pub action: LockAction,
    pub reason: LockReason,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LockAction {
    Allow,
    Reject,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LockReason {
    Allowed,
    AlreadyLockedByOther,
    AwaitingHuman,
    RequestTerminal,
}
