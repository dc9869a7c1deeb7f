//! In-process test doubles and scenario harnesses shared across this
//! workspace's integration tests: a `WorkspaceFs` fake for the Repair
//! Agent's one external I/O dependency, plus a `drive_to_completion`
//! harness that composes a real `AgentHost` against a real (test) Postgres
//! pool to carry a request from intake to a terminal phase.

pub mod fs;
pub mod harness;

pub use fs::InMemoryWorkspaceFs;
pub use harness::{drive_through_one_repair_cycle, drive_to_completion, seed_artifact};
