use std::sync::Arc;

use orc_daemon::state::AppState;
use sqlx::PgPool;

/// Skip-if-unset helper, same idiom as `orc-agent-host`'s scenario tests: a
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

pub fn app_state(pool: PgPool) -> Arc<AppState> {
    let root = std::env::temp_dir().join(format!("orc-daemon-tests-{}", uuid::Uuid::new_v4()));
    AppState::new(pool, root)
}
