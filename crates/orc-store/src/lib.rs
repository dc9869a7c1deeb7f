//! Storage Layer (C9): the only crate in the workspace that issues SQL.
//!
//! Persists the Request/Conductor State row, the Artifact Ledger, and the
//! Event Log, with a connection bootstrap, migration runner, and
//! fetch-then-guarded-UPDATE lifecycle.

pub mod event_log;
pub mod ledger;
pub mod request;
mod wire;

pub use event_log::{append as append_event, list_for_request, verify_for_request, NewEvent};
pub use ledger::{
    approve as approve_artifact, append as append_artifact, current_approved as current_approved_artifact,
    fetch_awaiting_approval, fetch_latest as fetch_latest_artifact, reject as reject_artifact,
    verify_chain as verify_artifact_chain, AppendOutcome, ApproveError, ChainVerifyError, NewArtifact,
};
pub use request::{
    cancel_request, clear_stale_locks_on_boot, fetch_conductor_state, increment_repair_attempts,
    insert_request, lock_acquire, lock_release, set_awaiting_human, transition_phase, NewRequest,
};

use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};

pub const ENV_DB_URL: &str = "ORC_DATABASE_URL";

/// Connect to Postgres using `ORC_DATABASE_URL`.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Test helper: connect using `ORC_DATABASE_URL` and apply migrations.
pub async fn testkit_db_pool() -> Result<PgPool> {
    let pool = connect_from_env().await?;
    migrate(&pool).await?;
    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_requests_table: bool,
}

/// Connectivity + schema-presence check, used by `orc-cli db status` and
/// daemon healthchecks.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as(
        r#"
        select exists (
            select 1 from information_schema.tables
            where table_schema = 'public' and table_name = 'requests'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_requests_table: exists,
    })
}
