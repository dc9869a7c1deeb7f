//! Deterministic, in-memory `LlmProvider` -- the LLM equivalent of a paper
//! broker adapter. No network calls, no randomness, no wall-clock reads.
//!
//! Two providers are offered:
//! - [`ScriptedLlmProvider`] returns a canned draft per `AgentName`, set up
//!   once at construction. Unscripted agents fall through to a deterministic
//!   default derived only from the request's own fields.
//! - [`EchoLlmProvider`] is the bare default on its own -- useful for
//!   smoke-driving the pipeline without authoring any canned drafts.

use async_trait::async_trait;
use orc_agent_host::{LlmError, LlmProvider, LlmRequest, LlmResponse};
use orc_schemas::AgentName;
use std::collections::HashMap;

/// Produces the same draft every time for a given `AgentName`, exactly like
/// `PaperBroker::submit` treating a repeated `client_order_id` as idempotent
/// rather than generating a fresh fill.
#[derive(Default)]
pub struct ScriptedLlmProvider {
    scripts: HashMap<AgentName, serde_json::Value>,
}

impl ScriptedLlmProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(mut self, agent_name: AgentName, draft: serde_json::Value) -> Self {
        self.scripts.insert(agent_name, draft);
        self
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlmProvider {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let content = match self.scripts.get(&request.agent_name) {
            Some(draft) => draft.clone(),
            None => default_draft(request),
        };
        Ok(LlmResponse { content })
    }
}

/// Always the deterministic default draft, regardless of agent. Useful as a
/// standalone provider when no scripts are needed at all.
pub struct EchoLlmProvider;

#[async_trait]
impl LlmProvider for EchoLlmProvider {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        Ok(LlmResponse {
            content: default_draft(request),
        })
    }
}

/// A minimal, schema-agnostic object derived only from the request's own
/// fields (never a clock, never randomness), so two identical requests
/// always produce byte-identical drafts.
fn default_draft(request: &LlmRequest) -> serde_json::Value {
    serde_json::json!({
        "produced_by": request.agent_name.as_str(),
        "note": "scripted placeholder draft; replace with a real model-backed provider",
    })
}
