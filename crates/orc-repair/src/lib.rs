//! Repair Sub-loop (C7): bounded, human-selected file mutations re-entering
//! Verification. Activated only when a `VerificationReport` is FAILED.
//!
//! The Repair Plan Generator is advisory and produces a Draft Repair Plan
//! through the ordinary Agent Host LLM template (see `orc-agent-host`); this
//! crate is the Repair Agent's own execution engine, consuming only an
//! Approved Repair Plan and a workspace path, never an LLM.

mod engine;
mod fs;
mod gate;
mod types;

pub use engine::run_repair_plan;
pub use fs::{WorkspaceFs, WorkspaceFsError};
pub use gate::{check_action_gate, RepairBoundReason, RepairGate};
pub use types::{
    ActionOutcome, ApprovedRepairPlan, RepairAction, RepairActionKind, RepairExecutionLog, TerminalStatus,
};
