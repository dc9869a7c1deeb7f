use serde::{Deserialize, Serialize};

/// One file-mutation action inside an Approved Repair Plan, in the exact
/// order the plan declares it. `id` is the plan author's own identifier,
/// carried through into the execution log unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairAction {
    pub id: String,
    pub file: String,
    pub kind: RepairActionKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RepairActionKind {
    /// 1-indexed, inclusive `[start_line, end_line]`.
    ReplaceLines {
        start_line: u32,
        end_line: u32,
        new_content: String,
    },
    ReplaceContent {
        old_content: String,
        new_content: String,
    },
}

/// The Approved Repair Plan the Repair Agent consumes -- nothing else. Human
/// selection has already picked exactly one candidate out of the Draft Repair
/// Plan; this is that one candidate, stamped `approved_by=human` upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovedRepairPlan {
    pub plan_hash: String,
    pub verification_result_hash: String,
    pub allowed_files: Vec<String>,
    pub no_new_files: bool,
    pub actions: Vec<RepairAction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionOutcome {
    Executed { id: String, file: String },
    Skipped { id: String },
}

/// Immutable record of a Repair Agent run. `execution_hash` is computed over
/// the ordered `actions_executed` list (DESIGN.md's Open Question #3
/// resolution), so two repairs against the same plan that stop at a
/// different point -- or execute the same actions in a different achieved
/// order -- hash differently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairExecutionLog {
    pub plan_hash: String,
    pub verification_result_hash: String,
    pub actions_executed: Vec<ActionOutcome>,
    pub files_touched: Vec<String>,
    pub terminal_status: TerminalStatus,
}
