mod common;

use http_body_util::BodyExt;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use orc_daemon::routes::build_router;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_check_reports_ok() -> anyhow::Result<()> {
    let Some(pool) = common::db().await? else {
        return Ok(());
    };
    let app = build_router(common::app_state(pool));

    let response = app
        .oneshot(Request::builder().uri("/v1/health").body(Body::empty())?)
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["ok"], json!(true));
    Ok(())
}

#[tokio::test]
async fn envelope_introspection_reports_the_intake_agents_scope() -> anyhow::Result<()> {
    let Some(pool) = common::db().await? else {
        return Ok(());
    };
    let app = build_router(common::app_state(pool));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/agents/intent_interviewer/envelope")
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["phase"], json!("intake"));
    assert_eq!(body["produces"], json!("intent_answers"));

    Ok(())
}

#[tokio::test]
async fn creating_a_request_and_reading_its_state_round_trips() -> anyhow::Result<()> {
    let Some(pool) = common::db().await? else {
        return Ok(());
    };
    let app = build_router(common::app_state(pool));

    let create = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/requests")
                .header("content-type", "application/json")
                .body(Body::from(json!({"prompt": "build a garden log"}).to_string()))?,
        )
        .await?;
    assert_eq!(create.status(), StatusCode::CREATED);
    let created = body_json(create).await;
    let request_id = created["request_id"].as_str().unwrap();

    let state = app
        .oneshot(Request::builder().uri(format!("/v1/requests/{request_id}/state")).body(Body::empty())?)
        .await?;
    assert_eq!(state.status(), StatusCode::OK);
    let state_body = body_json(state).await;
    assert_eq!(state_body["phase"], json!("intake"));
    assert_eq!(state_body["awaiting_human"], json!(false));

    Ok(())
}

#[tokio::test]
async fn next_action_lists_the_single_intake_agent() -> anyhow::Result<()> {
    let Some(pool) = common::db().await? else {
        return Ok(());
    };
    let app = build_router(common::app_state(pool));

    let create = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/requests")
                .header("content-type", "application/json")
                .body(Body::from(json!({"prompt": "build a garden log"}).to_string()))?,
        )
        .await?;
    let created = body_json(create).await;
    let request_id = created["request_id"].as_str().unwrap();

    let next = app
        .oneshot(
            Request::builder()
                .uri(format!("/v1/requests/{request_id}/next-action"))
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(next.status(), StatusCode::OK);
    let next_body = body_json(next).await;
    assert_eq!(next_body["phase"], json!("intake"));
    assert_eq!(next_body["eligible_agents"], json!(["intent_interviewer"]));

    Ok(())
}

#[tokio::test]
async fn submitting_input_for_the_intake_agent_pauses_for_human_approval() -> anyhow::Result<()> {
    let Some(pool) = common::db().await? else {
        return Ok(());
    };
    let app = build_router(common::app_state(pool));

    let create = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/requests")
                .header("content-type", "application/json")
                .body(Body::from(json!({"prompt": "build a garden log"}).to_string()))?,
        )
        .await?;
    let created = body_json(create).await;
    let request_id = created["request_id"].as_str().unwrap();

    let submit = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/v1/requests/{request_id}/submit-input"))
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({
                        "artifact_type": "intent_answers",
                        "content": {"answers": ["a garden log app"]},
                    })
                    .to_string(),
                ))?,
        )
        .await?;
    assert_eq!(submit.status(), StatusCode::OK);

    let state = app
        .oneshot(Request::builder().uri(format!("/v1/requests/{request_id}/state")).body(Body::empty())?)
        .await?;
    let state_body = body_json(state).await;
    assert_eq!(state_body["awaiting_human"], json!(true));

    Ok(())
}

#[tokio::test]
async fn approving_an_unknown_request_reports_a_dependency_error() -> anyhow::Result<()> {
    let Some(pool) = common::db().await? else {
        return Ok(());
    };
    let app = build_router(common::app_state(pool));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/v1/requests/{}/approve", uuid::Uuid::new_v4()))
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["kind"], json!("dependency"));

    Ok(())
}
