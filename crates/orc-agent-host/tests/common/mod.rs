use async_trait::async_trait;
use orc_agent_host::{LlmError, LlmProvider, LlmRequest, LlmResponse};
use sqlx::PgPool;

/// Skip-if-unset helper, same idiom as `orc-store`'s scenario tests: a
/// Postgres-backed test with no configured database quietly reports SKIP
/// instead of failing the whole suite.
pub async fn db() -> anyhow::Result<Option<PgPool>> {
    if std::env::var(orc_store::ENV_DB_URL).is_err() {
        eprintln!("SKIP: {} not set", orc_store::ENV_DB_URL);
        return Ok(None);
    }
    let pool = orc_store::testkit_db_pool().await?;
    Ok(Some(pool))
}

/// Always returns the same canned draft regardless of input -- enough to
/// drive the gateway's ordering tests without a real model.
pub struct ScriptedLlm {
    pub draft: serde_json::Value,
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn complete(&self, _request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        Ok(LlmResponse {
            content: self.draft.clone(),
        })
    }
}

/// Always fails -- used to assert the "no silent fallback" refusal path.
pub struct FailingLlm;

#[async_trait]
impl LlmProvider for FailingLlm {
    async fn complete(&self, _request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        Err(LlmError::CallFailed("simulated provider outage".to_string()))
    }
}
