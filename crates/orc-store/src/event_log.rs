//! Persisted Event Log (C2).
//!
//! `seq` and `hash_prev` are assigned under a row lock on the request so two
//! concurrent appends can never interleave — the same discipline the
//! teacher applies to `outbox_claim_batch`'s `FOR UPDATE SKIP LOCKED`, scoped
//! here to a single advisory read rather than a batch claim since exactly
//! one event is appended per call.

use anyhow::Context;
use anyhow::Result;
use orc_hash::{compute_event_hash, verify_chain, VerifyResult};
use orc_schemas::{Event, RequestId};
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub request_id: RequestId,
    pub event_type: String,
    pub payload: serde_json::Value,
}

/// Append one event, deriving `seq` and `hash_prev` from the request's
/// current tail under a transaction-scoped row lock.
pub async fn append(pool: &PgPool, new: &NewEvent) -> Result<Event> {
    let mut tx = pool.begin().await.context("event_log::append begin tx failed")?;

    // Lock the request row so seq/hash_prev derivation is serialized per
    // request; unrelated requests append concurrently without contention.
    sqlx::query("select request_id from requests where request_id = $1 for update")
        .bind(new.request_id)
        .fetch_one(&mut *tx)
        .await
        .context("event_log::append request lock failed")?;

    let tail: Option<(i64, String)> = sqlx::query_as(
        r#"
        select seq, hash_self
        from events
        where request_id = $1
        order by seq desc
        limit 1
        "#,
    )
    .fetch_optional(&mut *tx)
    .await
    .context("event_log::append tail lookup failed")?;

    let (next_seq, hash_prev) = match tail {
        Some((seq, hash_self)) => (seq + 1, Some(hash_self)),
        None => (1, None),
    };

    let event_id = Uuid::new_v4();
    let mut event = Event {
        event_id,
        request_id: new.request_id,
        seq: next_seq as u64,
        event_type: new.event_type.clone(),
        payload: new.payload.clone(),
        hash_prev,
        hash_self: String::new(),
        created_at: chrono::Utc::now(),
    };
    event.hash_self = compute_event_hash(&event);

    sqlx::query(
        r#"
        insert into events (
            event_id, request_id, seq, event_type, payload, hash_prev, hash_self
        ) values ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(event.event_id)
    .bind(event.request_id)
    .bind(next_seq)
    .bind(&event.event_type)
    .bind(&event.payload)
    .bind(&event.hash_prev)
    .bind(&event.hash_self)
    .execute(&mut *tx)
    .await
    .context("event_log::append insert failed")?;

    tx.commit().await.context("event_log::append commit failed")?;

    // created_at stamped by the DB default; reload so callers see the real
    // persisted timestamp (it plays no role in the hash).
    fetch_one(pool, new.request_id, event.seq).await
}

pub async fn list_for_request(pool: &PgPool, request_id: RequestId) -> Result<Vec<Event>> {
    let rows = sqlx::query(
        r#"
        select event_id, request_id, seq, event_type, payload, hash_prev, hash_self, created_at
        from events
        where request_id = $1
        order by seq asc
        "#,
    )
    .bind(request_id)
    .fetch_all(pool)
    .await
    .context("event_log::list_for_request failed")?;

    rows.iter().map(row_to_event).collect()
}

async fn fetch_one(pool: &PgPool, request_id: RequestId, seq: u64) -> Result<Event> {
    let row = sqlx::query(
        r#"
        select event_id, request_id, seq, event_type, payload, hash_prev, hash_self, created_at
        from events
        where request_id = $1 and seq = $2
        "#,
    )
    .bind(request_id)
    .bind(seq as i64)
    .fetch_one(pool)
    .await
    .context("event_log::fetch_one failed")?;
    row_to_event(&row)
}

fn row_to_event(row: &sqlx::postgres::PgRow) -> Result<Event> {
    Ok(Event {
        event_id: row.try_get("event_id")?,
        request_id: row.try_get("request_id")?,
        seq: row.try_get::<i64, _>("seq")? as u64,
        event_type: row.try_get("event_type")?,
        payload: row.try_get("payload")?,
        hash_prev: row.try_get("hash_prev")?,
        hash_self: row.try_get("hash_self")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Re-verify the persisted chain for a request. Called by `orc-cli events
/// tail` and by startup integrity checks, never by the hot append path.
pub async fn verify_for_request(pool: &PgPool, request_id: RequestId) -> Result<VerifyResult> {
    let events = list_for_request(pool, request_id).await?;
    Ok(verify_chain(&events))
}
