//! Repair Sub-loop (C7) execution: apply an Approved Repair Plan's actions in
//! strict order, aborting immediately on the first gate refusal or mutation
//! failure. No retry, no rollback, no continuation past the failing action --
//! its unapplied tail is recorded `Skipped`.

use crate::fs::WorkspaceFs;
use crate::gate::{check_action_gate, RepairGate};
use crate::types::{ActionOutcome, ApprovedRepairPlan, RepairActionKind, RepairExecutionLog, TerminalStatus};

/// Run every action in `plan.actions`, in order, against `fs`. Returns an
/// execution log regardless of outcome -- a FAILED run is still a complete,
/// immutable record, never an `Err` (REPAIR-BOUND failures are recorded in
/// the log's own `terminal_status`, not propagated as a Rust error, since a
/// partially-executed repair is a valid, auditable terminal state).
pub fn run_repair_plan(plan: &ApprovedRepairPlan, fs: &dyn WorkspaceFs) -> RepairExecutionLog {
    let mut outcomes = Vec::with_capacity(plan.actions.len());
    let mut files_touched = Vec::new();
    let mut failed = false;

    for action in &plan.actions {
        if failed {
            outcomes.push(ActionOutcome::Skipped { id: action.id.clone() });
            continue;
        }

        if check_action_gate(plan, action, fs) != RepairGate::Permitted {
            outcomes.push(ActionOutcome::Skipped { id: action.id.clone() });
            failed = true;
            continue;
        }

        match apply(&action.kind, &action.file, fs) {
            Ok(()) => {
                outcomes.push(ActionOutcome::Executed {
                    id: action.id.clone(),
                    file: action.file.clone(),
                });
                files_touched.push(action.file.clone());
            }
            Err(_) => {
                outcomes.push(ActionOutcome::Skipped { id: action.id.clone() });
                failed = true;
            }
        }
    }

    RepairExecutionLog {
        plan_hash: plan.plan_hash.clone(),
        verification_result_hash: plan.verification_result_hash.clone(),
        actions_executed: outcomes,
        files_touched,
        terminal_status: if failed { TerminalStatus::Failed } else { TerminalStatus::Success },
    }
}

fn apply(kind: &RepairActionKind, file: &str, fs: &dyn WorkspaceFs) -> Result<(), crate::fs::WorkspaceFsError> {
    match kind {
        RepairActionKind::ReplaceLines { start_line, end_line, new_content } => {
            let bytes = fs.read(file)?;
            let text = String::from_utf8_lossy(&bytes);
            let mut lines: Vec<&str> = text.lines().collect();
            let start = (*start_line - 1) as usize;
            let end = *end_line as usize;
            lines.splice(start..end, new_content.lines());
            fs.write(file, lines.join("\n").as_bytes())
        }
        RepairActionKind::ReplaceContent { old_content, new_content } => {
            let bytes = fs.read(file)?;
            let text = String::from_utf8_lossy(&bytes);
            let replaced = text.replacen(old_content.as_str(), new_content, 1);
            fs.write(file, replaced.as_bytes())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::WorkspaceFsError;
    use crate::types::{RepairAction, RepairActionKind};
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    struct InMemoryFs(RefCell<BTreeMap<String, Vec<u8>>>);

    impl WorkspaceFs for InMemoryFs {
        fn exists(&self, path: &str) -> Result<bool, WorkspaceFsError> {
            Ok(self.0.borrow().contains_key(path))
        }
        fn read(&self, path: &str) -> Result<Vec<u8>, WorkspaceFsError> {
            self.0
                .borrow()
                .get(path)
                .cloned()
                .ok_or_else(|| WorkspaceFsError::NotFound(path.to_string()))
        }
        fn write(&self, path: &str, bytes: &[u8]) -> Result<(), WorkspaceFsError> {
            self.0.borrow_mut().insert(path.to_string(), bytes.to_vec());
            Ok(())
        }
    }

    fn plan(actions: Vec<RepairAction>) -> ApprovedRepairPlan {
        ApprovedRepairPlan {
            plan_hash: "plan-hash".to_string(),
            verification_result_hash: "verify-hash".to_string(),
            allowed_files: vec!["a.ts".to_string()],
            no_new_files: true,
            actions,
        }
    }

    #[test]
    fn a_clean_run_executes_every_action_in_order() {
        let fs = InMemoryFs(RefCell::new(BTreeMap::from([("a.ts".to_string(), b"old text".to_vec())])));
        let actions = vec![RepairAction {
            id: "r1".to_string(),
            file: "a.ts".to_string(),
            kind: RepairActionKind::ReplaceContent {
                old_content: "old".to_string(),
                new_content: "new".to_string(),
            },
        }];
        let log = run_repair_plan(&plan(actions), &fs);
        assert_eq!(log.terminal_status, TerminalStatus::Success);
        assert_eq!(log.files_touched, vec!["a.ts".to_string()]);
        assert_eq!(fs.0.borrow().get("a.ts").unwrap(), b"new text");
    }

    #[test]
    fn an_action_outside_allowed_files_aborts_and_skips_the_rest() {
        let fs = InMemoryFs(RefCell::new(BTreeMap::from([("a.ts".to_string(), b"text".to_vec())])));
        let actions = vec![
            RepairAction {
                id: "r1".to_string(),
                file: "b.ts".to_string(),
                kind: RepairActionKind::ReplaceContent {
                    old_content: "text".to_string(),
                    new_content: "x".to_string(),
                },
            },
            RepairAction {
                id: "r2".to_string(),
                file: "a.ts".to_string(),
                kind: RepairActionKind::ReplaceContent {
                    old_content: "text".to_string(),
                    new_content: "x".to_string(),
                },
            },
        ];
        let log = run_repair_plan(&plan(actions), &fs);
        assert_eq!(log.terminal_status, TerminalStatus::Failed);
        assert!(log.files_touched.is_empty());
        assert_eq!(log.actions_executed.len(), 2);
        assert!(matches!(&log.actions_executed[1], ActionOutcome::Skipped { id } if id == "r2"));
    }

    #[test]
    fn out_of_bounds_line_range_is_repair_bound_and_writes_no_bytes() {
        let fs = InMemoryFs(RefCell::new(BTreeMap::from([("a.ts".to_string(), b"one\ntwo".to_vec())])));
        let actions = vec![RepairAction {
            id: "r1".to_string(),
            file: "a.ts".to_string(),
            kind: RepairActionKind::ReplaceLines {
                start_line: 1,
                end_line: 99,
                new_content: "x".to_string(),
            },
        }];
        let log = run_repair_plan(&plan(actions), &fs);
        assert_eq!(log.terminal_status, TerminalStatus::Failed);
        assert_eq!(fs.0.borrow().get("a.ts").unwrap(), b"one\ntwo");
    }
}
