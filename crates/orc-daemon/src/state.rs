//! Shared runtime state for orc-daemon.
//!
//! All types here are `Clone`-able (via `Arc`). Handlers receive
//! `State<Arc<AppState>>` from Axum; this module owns nothing async itself.

use std::path::PathBuf;
use std::sync::Arc;

use orc_agent_host::AgentHost;
use orc_llm::ScriptedLlmProvider;
use orc_workspace_fs::RealWorkspaceFs;
use sqlx::PgPool;
use tokio::sync::broadcast;

/// One message on the internal event bus, fanned out to every SSE
/// subscriber. Carries `request_id` so a client subscribed to
/// `/v1/requests/:id/stream` can filter down to its own request.
#[derive(Clone, Debug, serde::Serialize)]
pub struct BusMsg {
    pub request_id: uuid::Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
}

/// Static build metadata included in health responses.
#[derive(Clone, Debug, serde::Serialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

/// Cloneable (Arc) handle shared across all Axum handlers. The Agent Host's
/// LLM provider is `ScriptedLlmProvider` -- a deterministic placeholder for
/// a real model-backed provider until one is wired in.
pub struct AppState {
    pub pool: PgPool,
    pub host: AgentHost<ScriptedLlmProvider>,
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    workspace_root: PathBuf,
}

impl AppState {
    pub fn new(pool: PgPool, workspace_root: PathBuf) -> Arc<Self> {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        Arc::new(Self {
            host: AgentHost::new(pool.clone(), ScriptedLlmProvider::new()),
            pool,
            bus,
            build: BuildInfo {
                service: "orc-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            workspace_root,
        })
    }

    /// One workspace directory per request, rooted under the daemon's
    /// configured workspace root.
    pub fn workspace_fs_for(&self, request_id: uuid::Uuid) -> RealWorkspaceFs {
        RealWorkspaceFs::new(self.workspace_root.join(request_id.to_string()))
    }

    pub fn publish(&self, request_id: uuid::Uuid, event_type: impl Into<String>, payload: serde_json::Value) {
        let _ = self.bus.send(BusMsg {
            request_id,
            event_type: event_type.into(),
            payload,
        });
    }
}
