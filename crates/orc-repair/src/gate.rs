//! Repair gate -- the precondition checks the Repair Agent must pass before
//! applying each action.
//!
//! Evaluated fresh for every action in the ordered list, never once for the
//! whole plan, so an action that would violate scope is caught even after an
//! earlier action in the same plan already succeeded. Mirrors
//! `ArmStartGate`/`DriftAction`: a pure function returning an enum verdict
//! carrying its own evidence, no exceptions.

use crate::fs::WorkspaceFs;
use crate::types::{ApprovedRepairPlan, RepairAction, RepairActionKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairGate {
    Permitted,
    Blocked { reason: RepairBoundReason },
}

impl RepairGate {
    pub fn is_permitted(&self) -> bool {
        matches!(self, RepairGate::Permitted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepairBoundReason {
    #[error("file {0:?} is not in the approved plan's allowed_files")]
    FileNotAllowed(String),
    #[error("file {0:?} does not exist but no_new_files forbids creating it")]
    FileMustPreexist(String),
    #[error("line range [{start}, {end}] is out of bounds for a file of {line_count} lines")]
    LineRangeOutOfBounds { start: u32, end: u32, line_count: u32 },
    #[error("old_content not found verbatim in {0:?}")]
    OldContentNotFound(String),
}

/// Check one action against the plan's declared scope and the file's actual
/// on-disk state. Does not mutate anything.
pub fn check_action_gate(plan: &ApprovedRepairPlan, action: &RepairAction, fs: &dyn WorkspaceFs) -> RepairGate {
    if !plan.allowed_files.iter().any(|f| f == &action.file) {
        return RepairGate::Blocked {
            reason: RepairBoundReason::FileNotAllowed(action.file.clone()),
        };
    }

    let exists = match fs.exists(&action.file) {
        Ok(e) => e,
        Err(_) => false,
    };
    if plan.no_new_files && !exists {
        return RepairGate::Blocked {
            reason: RepairBoundReason::FileMustPreexist(action.file.clone()),
        };
    }

    match &action.kind {
        RepairActionKind::ReplaceLines { start_line, end_line, .. } => {
            let Ok(bytes) = fs.read(&action.file) else {
                return RepairGate::Blocked {
                    reason: RepairBoundReason::FileMustPreexist(action.file.clone()),
                };
            };
            let line_count = String::from_utf8_lossy(&bytes).lines().count() as u32;
            if *start_line < 1 || *end_line > line_count || start_line > end_line {
                return RepairGate::Blocked {
                    reason: RepairBoundReason::LineRangeOutOfBounds {
                        start: *start_line,
                        end: *end_line,
                        line_count,
                    },
                };
            }
        }
        RepairActionKind::ReplaceContent { old_content, .. } => {
            let Ok(bytes) = fs.read(&action.file) else {
                return RepairGate::Blocked {
                    reason: RepairBoundReason::FileMustPreexist(action.file.clone()),
                };
            };
            let text = String::from_utf8_lossy(&bytes);
            if !text.contains(old_content.as_str()) {
                return RepairGate::Blocked {
                    reason: RepairBoundReason::OldContentNotFound(action.file.clone()),
                };
            }
        }
    }

    RepairGate::Permitted
}
