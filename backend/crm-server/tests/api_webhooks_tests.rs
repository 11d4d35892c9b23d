//! Integration tests for webhook API handlers
mod common;

use crate::common::{create_test_state, seed_funnel, seed_stage};

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crm_server::build_router;

#[tokio::test]
async fn test_create_and_list_webhooks() {
    let state = create_test_state().await;
    let app = build_router(state.clone());

    let target_id = Uuid::new_v4();
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/webhooks")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "target_type": "opportunity",
                "target_id": target_id,
                "url": "https://hooks.example.test/crm",
                "event": "move",
            })
            .to_string(),
        ))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let request = Request::builder()
        .method("GET")
        .uri("/api/v1/webhooks")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    let webhooks = json["webhooks"].as_array().unwrap();
    assert_eq!(webhooks.len(), 1);
    assert_eq!(webhooks[0]["target_type"], "opportunity");
    assert_eq!(webhooks[0]["event"], "move");
}

#[tokio::test]
async fn test_create_webhook_rejects_bad_scheme() {
    let state = create_test_state().await;
    let app = build_router(state.clone());

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/webhooks")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "target_type": "opportunity",
                "target_id": Uuid::new_v4(),
                "url": "ftp://hooks.example.test/crm",
                "event": "move",
            })
            .to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"]["field"], "url");
}

#[tokio::test]
async fn test_test_endpoint_reports_delivery() {
    let state = create_test_state().await;
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let app = build_router(state.clone());

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/webhooks")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "target_type": "stage",
                "target_id": Uuid::new_v4(),
                "url": format!("{}/hook", server.uri()),
                "event": "update",
            })
            .to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let created: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let webhook_id = created["webhook"]["id"].as_str().unwrap();

    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/v1/webhooks/{}/test", webhook_id))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["delivered"], true);
}

#[tokio::test]
async fn test_test_endpoint_reports_dead_endpoint() {
    let state = create_test_state().await;
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let app = build_router(state.clone());

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/webhooks")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "target_type": "funnel",
                "target_id": Uuid::new_v4(),
                "url": format!("{}/dead", server.uri()),
                "event": "create",
            })
            .to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let created: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let webhook_id = created["webhook"]["id"].as_str().unwrap();

    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/v1/webhooks/{}/test", webhook_id))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["delivered"], false);
}

#[tokio::test]
async fn test_inbound_creates_opportunity_and_notifies() {
    let state = create_test_state().await;
    let funnel = seed_funnel(&state.pool).await;
    let stage = seed_stage(&state.pool, funnel.id, "Lead", 0).await;

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "event": "opportunity.create" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let app = build_router(state.clone());

    // Subscribe an endpoint to opportunity.create before the intake
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/webhooks")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "target_type": "opportunity",
                "target_id": Uuid::nil(),
                "url": format!("{}/hook", server.uri()),
                "event": "create",
            })
            .to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/webhooks/inbound")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "funnel_id": funnel.id,
                "stage_id": stage.id,
                "title": "Inbound lead",
                "client": "Initech",
                "value": 9_500.0,
                "custom_fields": { "Source": "landing-page" },
            })
            .to_string(),
        ))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["opportunity"]["title"], "Inbound lead");
    assert_eq!(
        json["opportunity"]["custom_fields"]["Source"],
        "landing-page"
    );
}

#[tokio::test]
async fn test_inbound_rejects_stage_outside_funnel() {
    let state = create_test_state().await;
    let funnel = seed_funnel(&state.pool).await;
    let other = seed_funnel(&state.pool).await;
    let stage = seed_stage(&state.pool, other.id, "Lead", 0).await;
    let app = build_router(state.clone());

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/webhooks/inbound")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "funnel_id": funnel.id,
                "stage_id": stage.id,
                "title": "Misrouted",
            })
            .to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
