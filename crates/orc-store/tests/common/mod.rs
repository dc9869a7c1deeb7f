use sqlx::PgPool;

/// Connect and migrate, or print a SKIP line and return `None` if
/// `ORC_DATABASE_URL` is not set. Every DB-backed scenario test in this
/// crate starts with `let Some(pool) = common::db().await? else { return Ok(()) };`.
pub async fn db() -> anyhow::Result<Option<PgPool>> {
    let url = match std::env::var(orc_store::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: {} not set", orc_store::ENV_DB_URL);
            return Ok(None);
        }
    };
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(4)
        .connect(&url)
        .await?;
    orc_store::migrate(&pool).await?;
    Ok(Some(pool))
}
