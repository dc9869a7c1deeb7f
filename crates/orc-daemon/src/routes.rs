//! Axum router and all HTTP handlers for orc-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. All handlers are `pub(crate)` so the scenario tests in
//! `tests/` can compose the router directly.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use orc_schemas::{AgentName, ArtifactType, OrchestratorError};
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::{
    api_types::{
        ErrorResponse, EventsSinceQuery, HealthResponse, NewRequestBody, NewRequestResponse,
        NextActionResponse, StateResponse, SubmitInputBody,
    },
    state::{AppState, BusMsg},
};

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/agents/:agent_name/envelope", get(get_envelope))
        .route("/v1/requests", post(create_request))
        .route("/v1/requests/:id/state", get(get_state))
        .route("/v1/requests/:id/next-action", get(get_next_action))
        .route("/v1/requests/:id/artifacts/:artifact_type", get(get_artifact))
        .route("/v1/requests/:id/submit-input", post(submit_input))
        .route("/v1/requests/:id/agents/:agent_name/start", post(start_agent))
        .route("/v1/requests/:id/approve", post(approve))
        .route("/v1/requests/:id/reject", post(reject))
        .route("/v1/requests/:id/events", get(get_events))
        .route("/v1/requests/:id/stream", get(stream))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/agents/:agent_name/envelope  -- get_envelope(agent_name): read-only
// introspection of an agent's declared scope/authority, so a human can see
// what it is permitted to do before approving its output.
// ---------------------------------------------------------------------------

pub(crate) async fn get_envelope(State(st): State<Arc<AppState>>, Path(agent_name): Path<String>) -> Response {
    let agent_name = match parse_tagged::<AgentName>(&agent_name) {
        Ok(a) => a,
        Err(e) => return protocol_error(e),
    };
    match st.host.envelopes().envelope_for(agent_name) {
        Some(envelope) => (StatusCode::OK, Json(envelope)).into_response(),
        None => protocol_error(format!("{agent_name:?} has no registered envelope")),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/requests  -- create a Request, not itself one of spec.md §6's
// public operations (those all take an existing request_id), but the
// necessary bootstrap for every one of them.
// ---------------------------------------------------------------------------

pub(crate) async fn create_request(State(st): State<Arc<AppState>>, Json(body): Json<NewRequestBody>) -> Response {
    let request_id = Uuid::new_v4();
    match orc_store::insert_request(
        &st.pool,
        &orc_store::NewRequest {
            request_id,
            original_prompt: body.prompt,
        },
    )
    .await
    {
        Ok(()) => (StatusCode::CREATED, Json(NewRequestResponse { request_id })).into_response(),
        Err(e) => dependency_error(e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/requests/:id/state  -- get_state()
// ---------------------------------------------------------------------------

pub(crate) async fn get_state(State(st): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    match orc_store::fetch_conductor_state(&st.pool, id).await {
        Ok(state) => (StatusCode::OK, Json(StateResponse { state })).into_response(),
        Err(e) => dependency_error(e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/requests/:id/next-action  -- get_next_action()
// ---------------------------------------------------------------------------

pub(crate) async fn get_next_action(State(st): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    let state = match orc_store::fetch_conductor_state(&st.pool, id).await {
        Ok(s) => s,
        Err(e) => return dependency_error(e.to_string()),
    };
    let eligible_agents = st
        .host
        .envelopes()
        .agents_for_phase(state.phase)
        .into_iter()
        .map(AgentName::as_str)
        .collect();
    (
        StatusCode::OK,
        Json(NextActionResponse {
            phase: state.phase,
            eligible_agents,
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/requests/:id/artifacts/:artifact_type  -- get_artifact(type)
// ---------------------------------------------------------------------------

pub(crate) async fn get_artifact(State(st): State<Arc<AppState>>, Path((id, artifact_type)): Path<(Uuid, String)>) -> Response {
    let artifact_type = match parse_tagged::<ArtifactType>(&artifact_type) {
        Ok(t) => t,
        Err(e) => return protocol_error(e),
    };
    match orc_store::fetch_latest_artifact(&st.pool, id, artifact_type).await {
        Ok(Some(artifact)) => (StatusCode::OK, Json(artifact)).into_response(),
        Ok(None) => protocol_error(format!("no {artifact_type:?} artifact yet for this request")),
        Err(e) => dependency_error(e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/requests/:id/submit-input  -- submit_input(artifact_id, content)
// concretized as (artifact_type, content): the caller names the role it is
// filling, the conductor already knows which artifact_id that becomes.
// ---------------------------------------------------------------------------

pub(crate) async fn submit_input(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<SubmitInputBody>,
) -> Response {
    match st.host.submit_input(id, body.artifact_type, body.content).await {
        Ok(outcome) => {
            let artifact = outcome.into_artifact();
            st.publish(id, "input_submitted", serde_json::json!({"artifact_id": artifact.artifact_id}));
            (StatusCode::OK, Json(artifact)).into_response()
        }
        Err(e) => orchestrator_error(e),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/requests/:id/agents/:agent_name/start  -- start_agent(phase),
// concretized to name the agent directly rather than just the phase, since
// several phases have more than one eligible agent (`get_next_action` lists
// them). `CompletionAuditor` and `RepairAgent` are not generic LLM agents,
// so this dispatches to their dedicated Agent Host operations instead of
// the generic `run_agent` template.
// ---------------------------------------------------------------------------

pub(crate) async fn start_agent(
    State(st): State<Arc<AppState>>,
    Path((id, agent_name)): Path<(Uuid, String)>,
) -> Response {
    let agent_name = match parse_tagged::<AgentName>(&agent_name) {
        Ok(a) => a,
        Err(e) => return protocol_error(e),
    };

    match agent_name {
        AgentName::CompletionAuditor => match st.host.run_completion_auditor(id).await {
            Ok(decision) => match st.host.resolve_completion_decision(id).await {
                Ok(state) => {
                    st.publish(id, "completion_audit_resolved", serde_json::json!({"decision": decision}));
                    (StatusCode::OK, Json(StateResponse { state })).into_response()
                }
                Err(e) => orchestrator_error(e),
            },
            Err(e) => orchestrator_error(e),
        },
        AgentName::RepairAgent => {
            let fs = st.workspace_fs_for(id);
            match st.host.run_repair_agent(id, &fs).await {
                Ok(log) => {
                    st.publish(id, "repair_execution_log", serde_json::json!({"terminal_status": log.terminal_status}));
                    (StatusCode::OK, Json(log)).into_response()
                }
                Err(e) => orchestrator_error(e),
            }
        }
        _ => match st.host.run_agent(id, agent_name).await {
            Ok(outcome) => {
                let artifact = outcome.into_artifact();
                st.publish(id, "agent_completed", serde_json::json!({"agent": agent_name.as_str(), "artifact_id": artifact.artifact_id}));
                (StatusCode::OK, Json(artifact)).into_response()
            }
            Err(e) => orchestrator_error(e),
        },
    }
}

// ---------------------------------------------------------------------------
// POST /v1/requests/:id/approve  -- approve(artifact_id, approver)
// concretized to the request (at most one artifact is ever awaiting
// approval per request, see DESIGN.md's "no separate status column" note).
// ---------------------------------------------------------------------------

pub(crate) async fn approve(State(st): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    match st.host.approve(id).await {
        Ok(state) => {
            st.publish(id, "conductor_resumed", serde_json::json!({"phase": state.phase}));
            (StatusCode::OK, Json(StateResponse { state })).into_response()
        }
        Err(e) => orchestrator_error(e),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/requests/:id/reject  -- reject(artifact_id, feedback?)
// ---------------------------------------------------------------------------

pub(crate) async fn reject(State(st): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    match st.host.reject(id).await {
        Ok(()) => {
            st.publish(id, "artifact_rejected", serde_json::json!({}));
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => orchestrator_error(e),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/requests/:id/events?since=seq  -- get_events(since?)
// ---------------------------------------------------------------------------

pub(crate) async fn get_events(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(q): Query<EventsSinceQuery>,
) -> Response {
    match orc_store::list_for_request(&st.pool, id).await {
        Ok(events) => {
            let since = q.since.unwrap_or(0);
            let filtered: Vec<_> = events.into_iter().filter(|e| e.seq as i64 > since).collect();
            (StatusCode::OK, Json(filtered)).into_response()
        }
        Err(e) => dependency_error(e.to_string()),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/requests/:id/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx, id);
    Sse::new(events).keep_alive(KeepAlive::new()).into_response()
}

fn broadcast_to_sse(
    rx: tokio::sync::broadcast::Receiver<BusMsg>,
    request_id: Uuid,
) -> impl Stream<Item = Result<SseEvent, Infallible>> {
    BroadcastStream::new(rx).filter_map(move |msg| async move {
        match msg {
            Ok(m) if m.request_id == request_id => {
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(SseEvent::default().event(m.event_type.clone()).data(data)))
            }
            Ok(_) => None,
            Err(_) => None, // lagged / closed
        }
    })
}

// ---------------------------------------------------------------------------
// Error mapping -- every `OrchestratorError` kind maps onto an HTTP status
// the way `spec.md` §7's propagation policy describes: surfaced, never
// swallowed, always with a structured `{error, kind}` body.
// ---------------------------------------------------------------------------

fn orchestrator_error(err: OrchestratorError) -> Response {
    let (status, kind) = match &err {
        OrchestratorError::Protocol(_) => (StatusCode::CONFLICT, "protocol"),
        OrchestratorError::Integrity(_) => (StatusCode::CONFLICT, "integrity"),
        OrchestratorError::Constitutional(_) => (StatusCode::FORBIDDEN, "constitutional"),
        OrchestratorError::Contract(_) => (StatusCode::BAD_GATEWAY, "contract"),
        OrchestratorError::Dependency(_) => (StatusCode::BAD_GATEWAY, "dependency"),
        OrchestratorError::RepairBound(_) => (StatusCode::CONFLICT, "repair_bound"),
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            kind: kind.to_string(),
        }),
    )
        .into_response()
}

fn protocol_error(message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse { error: message, kind: "protocol".to_string() }),
    )
        .into_response()
}

fn dependency_error(message: String) -> Response {
    (
        StatusCode::BAD_GATEWAY,
        Json(ErrorResponse { error: message, kind: "dependency".to_string() }),
    )
        .into_response()
}

/// Parse a snake_case path segment into any `Deserialize` tagged enum, the
/// same representation `#[serde(rename_all = "snake_case")]` gives it on the
/// wire -- avoids a second hand-written `FromStr` per enum.
fn parse_tagged<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(segment.to_string()))
        .map_err(|_| format!("unrecognized value {segment:?}"))
}
