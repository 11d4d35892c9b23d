//! Integration tests for funnel API handlers
mod common;

use crate::common::{create_test_state, seed_funnel, seed_opportunity, seed_stage};

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

use crm_server::build_router;

#[tokio::test]
async fn test_list_funnels_empty() {
    let state = create_test_state().await;
    let app = build_router(state.clone());

    let request = Request::builder()
        .method("GET")
        .uri("/api/v1/funnels")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    let funnels = json["funnels"].as_array().unwrap();
    assert_eq!(funnels.len(), 0);
}

#[tokio::test]
async fn test_create_and_get_funnel() {
    let state = create_test_state().await;
    let app = build_router(state.clone());

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/funnels")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "name": "Enterprise" }).to_string()))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let created: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(created["funnel"]["name"], "Enterprise");

    let funnel_id = created["funnel"]["id"].as_str().unwrap();
    let request = Request::builder()
        .method("GET")
        .uri(format!("/api/v1/funnels/{}", funnel_id))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let fetched: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(fetched["funnel"]["id"], funnel_id);
}

#[tokio::test]
async fn test_create_funnel_empty_name_rejected() {
    let state = create_test_state().await;
    let app = build_router(state.clone());

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/funnels")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "name": "   " }).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(json["error"]["field"], "name");
}

#[tokio::test]
async fn test_get_funnel_not_found() {
    let state = create_test_state().await;
    let app = build_router(state.clone());

    let fake_id = Uuid::new_v4();
    let request = Request::builder()
        .method("GET")
        .uri(format!("/api/v1/funnels/{}", fake_id))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_board_groups_opportunities_by_stage() {
    let state = create_test_state().await;
    let funnel = seed_funnel(&state.pool).await;
    let lead = seed_stage(&state.pool, funnel.id, "Lead", 0).await;
    let proposal = seed_stage(&state.pool, funnel.id, "Proposal", 1).await;
    let first = seed_opportunity(&state.pool, funnel.id, lead.id).await;
    let second = seed_opportunity(&state.pool, funnel.id, lead.id).await;
    seed_opportunity(&state.pool, funnel.id, proposal.id).await;

    let app = build_router(state.clone());

    let request = Request::builder()
        .method("GET")
        .uri(format!("/api/v1/funnels/{}/board", funnel.id))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    let lanes = json["lanes"].as_array().unwrap();
    assert_eq!(lanes.len(), 2);
    assert_eq!(lanes[0]["stage"]["name"], "Lead");
    assert_eq!(lanes[1]["stage"]["name"], "Proposal");

    let lead_lane = lanes[0]["opportunities"].as_array().unwrap();
    assert_eq!(lead_lane.len(), 2);
    assert_eq!(lead_lane[0]["id"], first.id.to_string());
    assert_eq!(lead_lane[1]["id"], second.id.to_string());
    assert_eq!(lanes[1]["opportunities"].as_array().unwrap().len(), 1);
}
