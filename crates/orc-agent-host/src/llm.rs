//! The boundary between the Agent Host and the outside world's language
//! model. `LlmProvider` is defined here, the consumer, the same way
//! `BrokerAdapter` is defined in the order-routing module it serves rather
//! than in the broker's own crate — `orc-llm` depends on this crate to
//! implement it, not the other way around.

use async_trait::async_trait;
use orc_schemas::AgentName;
use serde_json::Value;

/// Everything an agent's body needs to produce its draft: the isolated
/// input bundle (already scoped to `required_inputs`, never the whole
/// ledger) and the agent's identity, so a scripted test provider can branch
/// on which of the nineteen agents is calling.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub agent_name: AgentName,
    pub system_prompt: String,
    pub input_bundle: Value,
    /// Determinism-constrained agents require `temperature <= 0.3` (see
    /// `spec.md` §4.3 point 4). The Agent Host sets this; providers must
    /// honor it or refuse.
    pub temperature: f32,
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// The raw draft, already parsed as JSON. Schema/vocabulary validation
    /// against the producing agent's envelope happens in the gateway, not
    /// here — a provider's only job is to produce structured output.
    pub content: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("llm call failed: {0}")]
    CallFailed(String),
    #[error("llm returned output that does not parse as JSON: {0}")]
    Unparseable(String),
}

/// No silent fallbacks (`spec.md` §4.3 point 6): on failure the Agent Host
/// escalates to a human rather than degrading to a heuristic, so this trait
/// has exactly one fallible method and no default implementation.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;
}
