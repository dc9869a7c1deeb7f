mod common;

use orc_hash::VerifyResult;
use orc_store::event_log::{append, verify_for_request, NewEvent};
use orc_store::request::{insert_request, NewRequest};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn untampered_event_chain_verifies_and_a_mutated_payload_is_detected() -> anyhow::Result<()> {
    let Some(pool) = common::db().await? else {
        return Ok(());
    };

    let request_id = Uuid::new_v4();
    insert_request(
        &pool,
        &NewRequest {
            request_id,
            original_prompt: "build a habit tracker".to_string(),
        },
    )
    .await?;

    append(
        &pool,
        &NewEvent {
            request_id,
            event_type: "request_created".to_string(),
            payload: json!({}),
        },
    )
    .await?;
    append(
        &pool,
        &NewEvent {
            request_id,
            event_type: "phase_transitioned".to_string(),
            payload: json!({"to": "planning"}),
        },
    )
    .await?;

    let result = verify_for_request(&pool, request_id).await?;
    assert!(matches!(result, VerifyResult::Valid { count: 2 }));

    sqlx::query("update events set payload = $1 where request_id = $2 and seq = 1")
        .bind(json!({"tampered": true}))
        .bind(request_id)
        .execute(&pool)
        .await?;

    let result = verify_for_request(&pool, request_id).await?;
    assert!(matches!(result, VerifyResult::Broken { seq: 1, .. }));

    Ok(())
}
