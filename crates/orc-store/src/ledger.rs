//! Persisted Artifact Ledger (C3).
//!
//! `version` is assigned under a row lock on the request: a monotonic
//! sequence number, never a UUID, never a timestamp. Dedup-aware resume
//! uses an `ON CONFLICT ... DO NOTHING RETURNING` idiom: a retry with the
//! same `request_hash` for the same `(request_id, artifact_type)` is a
//! no-op that returns the already-written artifact instead of writing a
//! duplicate.

use crate::wire::{from_text, to_text};
use anyhow::{Context, Result};
use orc_schemas::{AgentName, Artifact, ArtifactStatus, ArtifactType, RequestId};
use sqlx::{PgPool, Row};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewArtifact {
    pub request_id: RequestId,
    pub artifact_type: ArtifactType,
    pub produced_by: AgentName,
    pub content: serde_json::Value,
    pub content_hash: String,
    pub input_hashes: Vec<String>,
    pub request_hash: String,
    /// Initial lifecycle status (`spec.md` §3). Most producer-agent writes
    /// start `AwaitingApproval`; a self-classifying step with no human gate
    /// (the Completion Auditor, the Verifier, a seeded test fixture) writes
    /// straight to `Approved` with `approved_by` set.
    pub status: ArtifactStatus,
    pub approved_by: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AppendOutcome {
    /// A new row was written at the returned version.
    Written(Artifact),
    /// An artifact with this `request_hash` already existed; the existing
    /// row is returned unchanged (P: L2 dedup-aware resume).
    Deduped(Artifact),
}

impl AppendOutcome {
    pub fn into_artifact(self) -> Artifact {
        match self {
            AppendOutcome::Written(a) | AppendOutcome::Deduped(a) => a,
        }
    }
}

/// Append an artifact, assigning the next version for
/// `(request_id, artifact_type)` under a transaction so concurrent writers
/// for the same pair never collide on `version`.
pub async fn append(pool: &PgPool, new: &NewArtifact) -> Result<AppendOutcome> {
    let mut tx = pool.begin().await.context("ledger::append begin tx failed")?;

    let artifact_type_text = to_text(&new.artifact_type)?;
    let produced_by_text = to_text(&new.produced_by)?;

    // Lock the request row first (aggregates can't be combined with FOR
    // UPDATE directly) so the version lookup below is serialized against any
    // other artifact append for this request.
    sqlx::query("select request_id from requests where request_id = $1 for update")
        .bind(new.request_id)
        .fetch_one(&mut *tx)
        .await
        .context("ledger::append request lock failed")?;

    let next_version: i32 = sqlx::query(
        r#"
        select coalesce(max(version), 0) + 1 as next_version
        from artifacts
        where request_id = $1 and artifact_type = $2
        "#,
    )
    .bind(new.request_id)
    .bind(&artifact_type_text)
    .fetch_one(&mut *tx)
    .await
    .context("ledger::append version lookup failed")?
    .try_get("next_version")?;

    let artifact_id = Uuid::new_v4();
    let input_hashes_json = serde_json::to_value(&new.input_hashes)?;
    let status_text = to_text(&new.status)?;

    let inserted = sqlx::query(
        r#"
        insert into artifacts (
            artifact_id, request_id, artifact_type, produced_by, version,
            content, content_hash, input_hashes, request_hash,
            status, approved_by, approved_at
        ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
            case when $10 = 'approved' then now() else null end)
        on conflict (request_id, artifact_type, request_hash) do nothing
        returning artifact_id
        "#,
    )
    .bind(artifact_id)
    .bind(new.request_id)
    .bind(&artifact_type_text)
    .bind(&produced_by_text)
    .bind(next_version)
    .bind(&new.content)
    .bind(&new.content_hash)
    .bind(&input_hashes_json)
    .bind(&new.request_hash)
    .bind(&status_text)
    .bind(&new.approved_by)
    .fetch_optional(&mut *tx)
    .await
    .context("ledger::append insert failed")?;

    let outcome = match inserted {
        Some(row) => {
            let id: Uuid = row.try_get("artifact_id")?;
            tx.commit().await.context("ledger::append commit failed")?;
            AppendOutcome::Written(fetch_by_id(pool, id).await?)
        }
        None => {
            tx.commit().await.context("ledger::append commit failed")?;
            let existing = fetch_by_request_hash(
                pool,
                new.request_id,
                new.artifact_type,
                &new.request_hash,
            )
            .await?;
            AppendOutcome::Deduped(existing)
        }
    };

    Ok(outcome)
}

const SELECT_COLUMNS: &str = r#"
    artifact_id, request_id, artifact_type, produced_by, version,
    content, content_hash, input_hashes, request_hash,
    status, approved_by, approved_at, created_at
"#;

pub async fn fetch_by_id(pool: &PgPool, artifact_id: Uuid) -> Result<Artifact> {
    let row = sqlx::query(&format!(
        "select {SELECT_COLUMNS} from artifacts where artifact_id = $1"
    ))
    .bind(artifact_id)
    .fetch_one(pool)
    .await
    .context("ledger::fetch_by_id failed")?;
    row_to_artifact(&row)
}

async fn fetch_by_request_hash(
    pool: &PgPool,
    request_id: RequestId,
    artifact_type: ArtifactType,
    request_hash: &str,
) -> Result<Artifact> {
    let artifact_type_text = to_text(&artifact_type)?;
    let row = sqlx::query(&format!(
        "select {SELECT_COLUMNS} from artifacts where request_id = $1 and artifact_type = $2 and request_hash = $3"
    ))
    .bind(request_id)
    .bind(&artifact_type_text)
    .bind(request_hash)
    .fetch_one(pool)
    .await
    .context("ledger::fetch_by_request_hash failed")?;
    row_to_artifact(&row)
}

/// Latest version of `artifact_type` produced for a request, or `None` if
/// the agent that produces it hasn't run yet. Includes every status --
/// callers that need the approval-gated view use [`current_approved`].
pub async fn fetch_latest(
    pool: &PgPool,
    request_id: RequestId,
    artifact_type: ArtifactType,
) -> Result<Option<Artifact>> {
    let artifact_type_text = to_text(&artifact_type)?;
    let row = sqlx::query(&format!(
        "select {SELECT_COLUMNS} from artifacts where request_id = $1 and artifact_type = $2 order by version desc limit 1"
    ))
    .bind(request_id)
    .bind(&artifact_type_text)
    .fetch_optional(pool)
    .await
    .context("ledger::fetch_latest failed")?;

    row.as_ref().map(row_to_artifact).transpose()
}

/// The one artifact of `artifact_type` currently holding the `approved` slot
/// for this request (I2: at most one can exist), or `None` if none has been
/// approved yet. This is what a producer agent's input bundle actually reads
/// (`spec.md` §4.2's `current_approved`).
pub async fn current_approved(
    pool: &PgPool,
    request_id: RequestId,
    artifact_type: ArtifactType,
) -> Result<Option<Artifact>> {
    let artifact_type_text = to_text(&artifact_type)?;
    let row = sqlx::query(&format!(
        "select {SELECT_COLUMNS} from artifacts where request_id = $1 and artifact_type = $2 and status = 'approved'"
    ))
    .bind(request_id)
    .bind(&artifact_type_text)
    .fetch_optional(pool)
    .await
    .context("ledger::current_approved failed")?;

    row.as_ref().map(row_to_artifact).transpose()
}

/// The artifact (of any type) currently paused `awaiting_approval` for this
/// request, or `None` -- at most one exists at a time (I2), since the
/// Conductor never lets a second agent lock in while one is paused.
pub async fn fetch_awaiting_approval(pool: &PgPool, request_id: RequestId) -> Result<Option<Artifact>> {
    let row = sqlx::query(&format!(
        "select {SELECT_COLUMNS} from artifacts where request_id = $1 and status = 'awaiting_approval'"
    ))
    .bind(request_id)
    .fetch_optional(pool)
    .await
    .context("ledger::fetch_awaiting_approval failed")?;

    row.as_ref().map(row_to_artifact).transpose()
}

#[derive(Debug, Error)]
pub enum ApproveError {
    #[error("no artifact with id {0}")]
    NotFound(Uuid),
    #[error(
        "INTEGRITY: recomputed content hash {recomputed} does not match stored hash {stored} for artifact {artifact_id}"
    )]
    HashMismatch {
        artifact_id: Uuid,
        stored: String,
        recomputed: String,
    },
    #[error("PROTOCOL: artifact {0} is not awaiting approval")]
    NotAwaitingApproval(Uuid),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// `approve(artifact_id, approver)` (`spec.md` §4.2): re-canonicalise and
/// re-hash the stored content before ever flipping status, so a row tampered
/// with between write and approval is caught here rather than silently
/// blessed (P4).
pub async fn approve(pool: &PgPool, artifact_id: Uuid, approver: &str) -> Result<Artifact, ApproveError> {
    let artifact = fetch_by_id(pool, artifact_id)
        .await
        .map_err(ApproveError::Storage)?;

    if artifact.status != ArtifactStatus::AwaitingApproval {
        return Err(ApproveError::NotAwaitingApproval(artifact_id));
    }

    let recomputed = orc_hash::content_hash(&artifact.content, &artifact.input_hashes);
    if recomputed != artifact.content_hash {
        return Err(ApproveError::HashMismatch {
            artifact_id,
            stored: artifact.content_hash,
            recomputed,
        });
    }

    let status_text = to_text(&ArtifactStatus::Approved).map_err(ApproveError::Storage)?;
    let result = sqlx::query(
        "update artifacts set status = $1, approved_by = $2, approved_at = now() where artifact_id = $3 and status = 'awaiting_approval'",
    )
    .bind(&status_text)
    .bind(approver)
    .bind(artifact_id)
    .execute(pool)
    .await
    .context("ledger::approve update failed")
    .map_err(ApproveError::Storage)?;

    if result.rows_affected() == 0 {
        return Err(ApproveError::NotAwaitingApproval(artifact_id));
    }

    fetch_by_id(pool, artifact_id).await.map_err(ApproveError::Storage)
}

/// `reject(artifact_id, reason)` (`spec.md` §4.2): soft-delete to `rejected`
/// without touching `content`/`content_hash` -- the rejected row remains
/// visible in history (L3), it just no longer occupies the awaiting/approved
/// slot a new draft from the same agent can fill.
pub async fn reject(pool: &PgPool, artifact_id: Uuid) -> Result<Artifact> {
    let status_text = to_text(&ArtifactStatus::Rejected)?;
    sqlx::query("update artifacts set status = $1 where artifact_id = $2 and status = 'awaiting_approval'")
        .bind(&status_text)
        .bind(artifact_id)
        .execute(pool)
        .await
        .context("ledger::reject update failed")?;
    fetch_by_id(pool, artifact_id).await
}

#[derive(Debug, Error)]
pub enum ChainVerifyError {
    #[error(
        "INTEGRITY: artifact {artifact_id} content no longer matches its stored hash (expected {stored}, recomputed {recomputed})"
    )]
    HashMismatch {
        artifact_id: Uuid,
        stored: String,
        recomputed: String,
    },
    #[error("INTEGRITY: input hash {input_hash} has no currently-approved artifact in request {request_id}")]
    DanglingInputHash { request_id: RequestId, input_hash: String },
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// `Ledger.verify_chain(artifact_id)` (`spec.md` §4.2): re-verify an
/// artifact's own stored hash against its current content (catching direct
/// database tampering post-approval, seed scenario 3), then assert every
/// hash in `input_hashes` still names a currently-approved artifact in the
/// same request (P2).
pub async fn verify_chain(pool: &PgPool, artifact_id: Uuid) -> Result<(), ChainVerifyError> {
    let artifact = fetch_by_id(pool, artifact_id).await?;

    let recomputed = orc_hash::content_hash(&artifact.content, &artifact.input_hashes);
    if recomputed != artifact.content_hash {
        return Err(ChainVerifyError::HashMismatch {
            artifact_id,
            stored: artifact.content_hash,
            recomputed,
        });
    }

    for input_hash in &artifact.input_hashes {
        let exists: (bool,) = sqlx::query_as(
            "select exists (select 1 from artifacts where request_id = $1 and content_hash = $2 and status = 'approved')",
        )
        .bind(artifact.request_id)
        .bind(input_hash)
        .fetch_one(pool)
        .await?;
        if !exists.0 {
            return Err(ChainVerifyError::DanglingInputHash {
                request_id: artifact.request_id,
                input_hash: input_hash.clone(),
            });
        }
    }

    Ok(())
}

fn row_to_artifact(row: &sqlx::postgres::PgRow) -> Result<Artifact> {
    let artifact_type_text: String = row.try_get("artifact_type")?;
    let produced_by_text: String = row.try_get("produced_by")?;
    let status_text: String = row.try_get("status")?;
    let input_hashes_json: serde_json::Value = row.try_get("input_hashes")?;
    Ok(Artifact {
        artifact_id: row.try_get("artifact_id")?,
        request_id: row.try_get("request_id")?,
        artifact_type: from_text(&artifact_type_text)?,
        produced_by: from_text(&produced_by_text)?,
        version: row.try_get::<i32, _>("version")? as u32,
        content: row.try_get("content")?,
        content_hash: row.try_get("content_hash")?,
        input_hashes: serde_json::from_value(input_hashes_json)?,
        request_hash: row.try_get("request_hash")?,
        status: from_text(&status_text)?,
        approved_by: row.try_get("approved_by")?,
        approved_at: row.try_get("approved_at")?,
        created_at: row.try_get("created_at")?,
    })
}
