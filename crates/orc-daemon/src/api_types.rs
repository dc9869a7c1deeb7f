//! Request and response types for every orc-daemon HTTP endpoint.
//!
//! `Serialize`/`Deserialize` only -- no business logic lives here.

use orc_schemas::{ArtifactType, ConductorState};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

/// Error body for every non-2xx response. `kind` is one of the PROTOCOL /
/// INTEGRITY / CONSTITUTIONAL / CONTRACT / DEPENDENCY / REPAIR-BOUND
/// taxonomy tags from `spec.md` §7, never a bare HTTP status.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRequestBody {
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewRequestResponse {
    pub request_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct StateResponse {
    #[serde(flatten)]
    pub state: ConductorState,
}

#[derive(Debug, Clone, Serialize)]
pub struct NextActionResponse {
    pub phase: orc_schemas::Phase,
    pub eligible_agents: Vec<&'static str>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitInputBody {
    pub artifact_type: ArtifactType,
    pub content: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventsSinceQuery {
    pub since: Option<i64>,
}
