use crate::types::{
    ConductorView, LockAction, LockDecision, LockReason, TransitionAction, TransitionDecision,
    TransitionReason,
};
use orc_schemas::{AgentName, Phase};

/// Legal forward edges in the pipeline. `cancel_request` (not modeled as an
/// edge here — see `decide_cancel`) can move any non-terminal phase straight
/// to `Failed` regardless of this table.
fn legal_next_phases(current: Phase) -> &'static [Phase] {
    use Phase::*;
    match current {
        Intake => &[Planning],
        Planning => &[Behavioral],
        Behavioral => &[VisualDesign],
        VisualDesign => &[ConstitutionalDraft],
        ConstitutionalDraft => &[BuildPlanning],
        BuildPlanning => &[ExecutionPlanning],
        ExecutionPlanning => &[RoboticExecution],
        RoboticExecution => &[Verification],
        // Verification fans out to either completion or the repair sub-loop.
        Verification => &[Completed, RepairPlanning, Failed],
        RepairPlanning => &[RepairExecution],
        // A repair cycle always loops back through verification.
        RepairExecution => &[Verification],
        Completed | Failed => &[],
    }
}

/// Decide whether `requested` is a legal next phase for a request currently
/// sitting in `view`. Sticky states (`awaiting_human`, terminal phase) take
/// precedence over the phase-edge check, mirroring the integrity engine's
/// halted/disarmed precedence checks.
pub fn decide_transition(view: &ConductorView, requested: Phase) -> TransitionDecision {
    if view.phase.is_terminal() {
        return TransitionDecision {
            action: TransitionAction::Reject,
            reason: TransitionReason::RequestTerminal,
        };
    }
    if view.awaiting_human {
        return TransitionDecision {
            action: TransitionAction::Reject,
            reason: TransitionReason::AwaitingHuman,
        };
    }
    if requested == Phase::RepairPlanning && view.repair_attempts >= crate::MAX_REPAIR_ATTEMPTS {
        return TransitionDecision {
            action: TransitionAction::Reject,
            reason: TransitionReason::RepairAttemptsExhausted,
        };
    }
    if legal_next_phases(view.phase).contains(&requested) {
        TransitionDecision {
            action: TransitionAction::Allow,
            reason: TransitionReason::Allowed,
        }
    } else {
        TransitionDecision {
            action: TransitionAction::Reject,
            reason: TransitionReason::IllegalPhaseEdge,
        }
    }
}

/// The single unambiguous legal next phase for `current`, or `None` when
/// `current` has zero legal next phases (terminal) or more than one (a fan-out
/// point, e.g. `Verification`). Used by the Agent Host to auto-advance a
/// request on human approval of a producer agent's artifact, where exactly
/// one exit phase is always expected.
pub fn singular_next_phase(current: Phase) -> Option<Phase> {
    match legal_next_phases(current) {
        [single] => Some(*single),
        _ => None,
    }
}

/// `cancel_request` is always legal from any non-terminal phase — an admin
/// escape hatch that bypasses the phase-edge table entirely.
pub fn decide_cancel(view: &ConductorView) -> TransitionDecision {
    if view.phase.is_terminal() {
        TransitionDecision {
            action: TransitionAction::Reject,
            reason: TransitionReason::RequestTerminal,
        }
    } else {
        TransitionDecision {
            action: TransitionAction::Allow,
            reason: TransitionReason::Allowed,
        }
    }
}

/// Decide whether `requester` may acquire the request's exclusive lock.
/// Reentrant for the current holder (an agent host retry after a crash
/// mid-invocation re-acquires its own lock rather than being rejected).
pub fn decide_lock_acquire(view: &ConductorView, requester: AgentName) -> LockDecision {
    if view.phase.is_terminal() {
        return LockDecision {
            action: LockAction::Reject,
            reason: LockReason::RequestTerminal,
        };
    }
    if view.awaiting_human {
        return LockDecision {
            action: LockAction::Reject,
            reason: LockReason::AwaitingHuman,
        };
    }
    if view.locked {
        if view.locked_by == Some(requester) {
            return LockDecision {
                action: LockAction::Allow,
                reason: LockReason::Allowed,
            };
        }
        return LockDecision {
            action: LockAction::Reject,
            reason: LockReason::AlreadyLockedByOther,
        };
    }
    LockDecision {
        action: LockAction::Allow,
        reason: LockReason::Allowed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(phase: Phase) -> ConductorView {
        ConductorView {
            phase,
            ..ConductorView::fresh()
        }
    }

    #[test]
    fn legal_forward_edge_allowed() {
        let d = decide_transition(&view(Phase::Intake), Phase::Planning);
        assert_eq!(d.action, TransitionAction::Allow);
    }

    #[test]
    fn skipping_a_phase_is_rejected() {
        let d = decide_transition(&view(Phase::Intake), Phase::Behavioral);
        assert_eq!(d.action, TransitionAction::Reject);
        assert_eq!(d.reason, TransitionReason::IllegalPhaseEdge);
    }

    #[test]
    fn terminal_phase_rejects_everything() {
        let d = decide_transition(&view(Phase::Completed), Phase::Planning);
        assert_eq!(d.reason, TransitionReason::RequestTerminal);
    }

    #[test]
    fn awaiting_human_blocks_transition() {
        let mut v = view(Phase::Verification);
        v.awaiting_human = true;
        let d = decide_transition(&v, Phase::Completed);
        assert_eq!(d.reason, TransitionReason::AwaitingHuman);
    }

    #[test]
    fn verification_can_go_to_repair_planning_or_completed() {
        assert_eq!(
            decide_transition(&view(Phase::Verification), Phase::Completed).action,
            TransitionAction::Allow
        );
        assert_eq!(
            decide_transition(&view(Phase::Verification), Phase::RepairPlanning).action,
            TransitionAction::Allow
        );
    }

    #[test]
    fn repair_attempts_exhausted_blocks_repair_planning() {
        let mut v = view(Phase::Verification);
        v.repair_attempts = crate::MAX_REPAIR_ATTEMPTS;
        let d = decide_transition(&v, Phase::RepairPlanning);
        assert_eq!(d.reason, TransitionReason::RepairAttemptsExhausted);
    }

    #[test]
    fn cancel_is_legal_from_any_nonterminal_phase() {
        let d = decide_cancel(&view(Phase::BuildPlanning));
        assert_eq!(d.action, TransitionAction::Allow);
    }

    #[test]
    fn cancel_rejected_once_terminal() {
        let d = decide_cancel(&view(Phase::Failed));
        assert_eq!(d.reason, TransitionReason::RequestTerminal);
    }

    #[test]
    fn lock_acquire_by_new_requester_when_unlocked_is_allowed() {
        let d = decide_lock_acquire(&view(Phase::Planning), AgentName::MasterPlanner);
        assert_eq!(d.action, LockAction::Allow);
    }

    #[test]
    fn lock_acquire_blocked_when_held_by_another_agent() {
        let mut v = view(Phase::Planning);
        v.locked = true;
        v.locked_by = Some(AgentName::MasterPlanner);
        let d = decide_lock_acquire(&v, AgentName::ImplementationPlanner);
        assert_eq!(d.reason, LockReason::AlreadyLockedByOther);
    }

    #[test]
    fn lock_reacquire_by_current_holder_is_allowed() {
        let mut v = view(Phase::Planning);
        v.locked = true;
        v.locked_by = Some(AgentName::MasterPlanner);
        let d = decide_lock_acquire(&v, AgentName::MasterPlanner);
        assert_eq!(d.action, LockAction::Allow);
    }

    #[test]
    fn singular_next_phase_is_some_on_a_linear_edge() {
        assert_eq!(singular_next_phase(Phase::Intake), Some(Phase::Planning));
    }

    #[test]
    fn singular_next_phase_is_none_at_a_fan_out_point() {
        assert_eq!(singular_next_phase(Phase::Verification), None);
    }

    #[test]
    fn singular_next_phase_is_none_at_a_terminal_phase() {
        assert_eq!(singular_next_phase(Phase::Completed), None);
    }
}
