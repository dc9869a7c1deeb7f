use orc_repair::{run_repair_plan, ApprovedRepairPlan, RepairAction, RepairActionKind, TerminalStatus, WorkspaceFs, WorkspaceFsError};
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

#[test]
fn old_content_not_found_is_repair_bound_and_writes_no_bytes() {
    let fs = InMemoryFs(RefCell::new(BTreeMap::from([("src/a.ts".to_string(), b"fn main() {}".to_vec())])));
    let plan = ApprovedRepairPlan {
        plan_hash: "plan-1".to_string(),
        verification_result_hash: "verify-1".to_string(),
        allowed_files: vec!["src/a.ts".to_string()],
        no_new_files: true,
        actions: vec![RepairAction {
            id: "r1".to_string(),
            file: "src/a.ts".to_string(),
            kind: RepairActionKind::ReplaceContent {
                old_content: "does not appear".to_string(),
                new_content: "x".to_string(),
            },
        }],
    };

    let log = run_repair_plan(&plan, &fs);
    assert_eq!(log.terminal_status, TerminalStatus::Failed);
    assert!(log.files_touched.is_empty());
    assert_eq!(fs.0.borrow().get("src/a.ts").unwrap(), b"fn main() {}");
}

#[test]
fn an_action_targeting_a_file_outside_allowed_files_never_touches_the_filesystem() {
    let fs = InMemoryFs(RefCell::new(BTreeMap::from([
        ("src/a.ts".to_string(), b"one".to_vec()),
        ("src/b.ts".to_string(), b"two".to_vec()),
    ])));
    let plan = ApprovedRepairPlan {
        plan_hash: "plan-2".to_string(),
        verification_result_hash: "verify-2".to_string(),
        allowed_files: vec!["src/a.ts".to_string()],
        no_new_files: true,
        actions: vec![RepairAction {
            id: "r1".to_string(),
            file: "src/b.ts".to_string(),
            kind: RepairActionKind::ReplaceContent {
                old_content: "two".to_string(),
                new_content: "tampered".to_string(),
            },
        }],
    };

    let log = run_repair_plan(&plan, &fs);
    assert_eq!(log.terminal_status, TerminalStatus::Failed);
    assert_eq!(fs.0.borrow().get("src/b.ts").unwrap(), b"two");
}

#[test]
fn actions_execute_in_declared_order_and_the_log_records_that_order() {
    let fs = InMemoryFs(RefCell::new(BTreeMap::from([("src/a.ts".to_string(), b"one\ntwo\nthree".to_vec())])));
    let plan = ApprovedRepairPlan {
        plan_hash: "plan-3".to_string(),
        verification_result_hash: "verify-3".to_string(),
        allowed_files: vec!["src/a.ts".to_string()],
        no_new_files: true,
        actions: vec![
            RepairAction {
                id: "r1".to_string(),
                file: "src/a.ts".to_string(),
                kind: RepairActionKind::ReplaceLines {
                    start_line: 2,
                    end_line: 2,
                    new_content: "TWO".to_string(),
                },
            },
            RepairAction {
                id: "r2".to_string(),
                file: "src/a.ts".to_string(),
                kind: RepairActionKind::ReplaceContent {
                    old_content: "three".to_string(),
                    new_content: "THREE".to_string(),
                },
            },
        ],
    };

    let log = run_repair_plan(&plan, &fs);
    assert_eq!(log.terminal_status, TerminalStatus::Success);
    assert_eq!(fs.0.borrow().get("src/a.ts").unwrap(), b"one\nTWO\nTHREE");
    let ids: Vec<String> = log
        .actions_executed
        .iter()
        .map(|o| match o {
            orc_repair::ActionOutcome::Executed { id, .. } => id.clone(),
            orc_repair::ActionOutcome::Skipped { id } => id.clone(),
        })
        .collect();
    assert_eq!(ids, vec!["r1".to_string(), "r2".to_string()]);
}
