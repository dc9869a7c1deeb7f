//! Request + Conductor State persistence.
//!
//! Fetch the current row, match-assert its status, then issue a guarded
//! `UPDATE` that refuses to fire from an invalid source state: the guard is
//! `orc-conductor`'s pure decision functions, and the `UPDATE` carries the
//! old phase in its `WHERE` clause as an optimistic-concurrency check.

use crate::wire::{from_text, to_text};
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use orc_conductor::{decide_cancel, decide_lock_acquire, decide_transition, ConductorView};
use orc_schemas::{AgentName, ConductorState, Phase, RequestId};
use sqlx::{PgPool, Row};

#[derive(Debug, Clone)]
pub struct NewRequest {
    pub request_id: RequestId,
    pub original_prompt: String,
}

/// Insert a new request. Phase defaults to `intake`, unlocked, not
/// awaiting human, per the table default.
pub async fn insert_request(pool: &PgPool, req: &NewRequest) -> Result<()> {
    sqlx::query("insert into requests (request_id, original_prompt) values ($1, $2)")
        .bind(req.request_id)
        .bind(&req.original_prompt)
        .execute(pool)
        .await
        .context("insert_request failed")?;
    Ok(())
}

pub async fn fetch_conductor_state(pool: &PgPool, request_id: RequestId) -> Result<ConductorState> {
    let row = sqlx::query(
        r#"
        select request_id, phase, locked, locked_by, awaiting_human, repair_attempts, updated_at
        from requests
        where request_id = $1
        "#,
    )
    .bind(request_id)
    .fetch_one(pool)
    .await
    .context("fetch_conductor_state failed")?;

    row_to_state(&row)
}

fn row_to_state(row: &sqlx::postgres::PgRow) -> Result<ConductorState> {
    let phase_text: String = row.try_get("phase")?;
    let locked_by_text: Option<String> = row.try_get("locked_by")?;
    Ok(ConductorState {
        request_id: row.try_get("request_id")?,
        phase: from_text(&phase_text)?,
        locked: row.try_get("locked")?,
        locked_by: locked_by_text.map(|s| from_text(&s)).transpose()?,
        awaiting_human: row.try_get("awaiting_human")?,
        repair_attempts: row.try_get::<i32, _>("repair_attempts")? as u32,
        updated_at: row.try_get("updated_at")?,
    })
}

fn to_view(state: &ConductorState) -> ConductorView {
    ConductorView {
        phase: state.phase,
        locked: state.locked,
        locked_by: state.locked_by,
        awaiting_human: state.awaiting_human,
        repair_attempts: state.repair_attempts,
    }
}

/// Attempt the given phase transition. Refuses (without touching the row)
/// if the Conductor's decision core rejects it; otherwise issues a
/// compare-and-swap `UPDATE` keyed on the phase read at decision time, so a
/// concurrent transition between the read and the write loses the race
/// instead of silently overwriting it.
pub async fn transition_phase(
    pool: &PgPool,
    request_id: RequestId,
    requested: Phase,
) -> Result<ConductorState> {
    let current = fetch_conductor_state(pool, request_id).await?;
    let decision = decide_transition(&to_view(&current), requested);
    if decision.action != orc_conductor::TransitionAction::Allow {
        return Err(anyhow!(
            "transition refused: {:?} -> {:?} ({:?})",
            current.phase,
            requested,
            decision.reason
        ));
    }

    let requested_text = to_text(&requested)?;
    let current_text = to_text(&current.phase)?;
    let result = sqlx::query(
        r#"
        update requests
        set phase = $1, updated_at = now()
        where request_id = $2 and phase = $3
        "#,
    )
    .bind(&requested_text)
    .bind(request_id)
    .bind(&current_text)
    .execute(pool)
    .await
    .context("transition_phase update failed")?;

    if result.rows_affected() == 0 {
        return Err(anyhow!(
            "transition lost race: phase changed concurrently for request {request_id}"
        ));
    }

    fetch_conductor_state(pool, request_id).await
}

/// Admin escape hatch (SPEC_FULL §11): any non-terminal phase -> `failed`.
pub async fn cancel_request(pool: &PgPool, request_id: RequestId) -> Result<ConductorState> {
    let current = fetch_conductor_state(pool, request_id).await?;
    let decision = decide_cancel(&to_view(&current));
    if decision.action != orc_conductor::TransitionAction::Allow {
        return Err(anyhow!("cancel refused: {:?}", decision.reason));
    }

    sqlx::query("update requests set phase = 'failed', updated_at = now() where request_id = $1")
        .bind(request_id)
        .execute(pool)
        .await
        .context("cancel_request update failed")?;

    fetch_conductor_state(pool, request_id).await
}

/// Acquire the request's exclusive lock for `requester`. Reentrant for the
/// current holder. The `UPDATE`'s `WHERE` clause re-derives the allow
/// condition so a lock taken concurrently between the read and the write
/// cannot be silently stolen.
pub async fn lock_acquire(pool: &PgPool, request_id: RequestId, requester: AgentName) -> Result<()> {
    let current = fetch_conductor_state(pool, request_id).await?;
    let decision = decide_lock_acquire(&to_view(&current), requester);
    if decision.action != orc_conductor::LockAction::Allow {
        return Err(anyhow!("lock_acquire refused: {:?}", decision.reason));
    }

    let requester_text = to_text(&requester)?;
    let result = sqlx::query(
        r#"
        update requests
        set locked = true, locked_by = $1, updated_at = now()
        where request_id = $2
          and (locked = false or locked_by = $1)
        "#,
    )
    .bind(&requester_text)
    .bind(request_id)
    .execute(pool)
    .await
    .context("lock_acquire update failed")?;

    if result.rows_affected() == 0 {
        return Err(anyhow!(
            "lock_acquire lost race: lock taken concurrently for request {request_id}"
        ));
    }
    Ok(())
}

pub async fn lock_release(pool: &PgPool, request_id: RequestId) -> Result<()> {
    sqlx::query(
        "update requests set locked = false, locked_by = null, updated_at = now() where request_id = $1",
    )
    .bind(request_id)
    .execute(pool)
    .await
    .context("lock_release update failed")?;
    Ok(())
}

/// Fail-closed boot recovery (mirrors `orc_conductor::LockState::boot`):
/// clear every lock left behind by a crashed Agent Host. Call once, at
/// daemon startup, before accepting any request work.
pub async fn clear_stale_locks_on_boot(pool: &PgPool) -> Result<u64> {
    let result = sqlx::query(
        "update requests set locked = false, locked_by = null, updated_at = now() where locked = true",
    )
    .execute(pool)
    .await
    .context("clear_stale_locks_on_boot failed")?;
    Ok(result.rows_affected())
}

pub async fn set_awaiting_human(pool: &PgPool, request_id: RequestId, value: bool) -> Result<()> {
    sqlx::query("update requests set awaiting_human = $1, updated_at = now() where request_id = $2")
        .bind(value)
        .bind(request_id)
        .execute(pool)
        .await
        .context("set_awaiting_human failed")?;
    Ok(())
}

/// Increment the repair-attempt counter (only a `retry_with_repair`
/// Completion Auditor decision may call this — see SPEC_FULL §11). Returns
/// the new count.
pub async fn increment_repair_attempts(pool: &PgPool, request_id: RequestId) -> Result<u32> {
    let row = sqlx::query(
        r#"
        update requests
        set repair_attempts = repair_attempts + 1, updated_at = now()
        where request_id = $1
        returning repair_attempts
        "#,
    )
    .bind(request_id)
    .fetch_one(pool)
    .await
    .context("increment_repair_attempts failed")?;
    Ok(row.try_get::<i32, _>("repair_attempts")? as u32)
}
