//! Lock state with fail-closed boot semantics.
//!
//! # Invariants
//!
//! - **Boot is always fail-closed**: a request's lock starts `Unlocked` on
//!   every process restart, regardless of what was last persisted. A
//!   previously `Locked` state is NOT trusted — a crashed Agent Host can
//!   never leave a request permanently stuck locked.
//!
//! - **Boot reason is discarded, not preserved**: unlike a disarm, a stale
//!   lock carries no operator-relevant cause to remember; recovery simply
//!   clears it.
//!
//! All logic is pure deterministic — no IO, no clock, no randomness.

use orc_schemas::AgentName;

/// A request's exclusive-execution lock.
///
/// Tracked in memory by the Agent Host and persisted on `conductor_state`.
/// On every boot, [`LockState::boot`] determines the starting state (always
/// `Unlocked` — see invariants above).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    Locked { by: AgentName },
}

impl LockState {
    /// Fail-closed boot semantics.
    ///
    /// | Persisted state         | Boot result   |
    /// |--------------------------|--------------|
    /// | `None` (no record)       | `Unlocked`   |
    /// | `Some(Locked { .. })`    | `Unlocked`   |
    /// | `Some(Unlocked)`         | `Unlocked`   |
    ///
    /// A lock is never trusted to have survived a crash; recovery always
    /// clears it so the next Agent Host invocation can acquire it fresh.
    pub fn boot(_persisted: Option<LockState>) -> Self {
        LockState::Unlocked
    }

    pub fn acquire(by: AgentName) -> Self {
        LockState::Locked { by }
    }

    pub fn release() -> Self {
        LockState::Unlocked
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, LockState::Locked { .. })
    }

    pub fn held_by(&self) -> Option<AgentName> {
        match self {
            LockState::Locked { by } => Some(*by),
            LockState::Unlocked => None,
        }
    }
}
