//! Route table for the CRM server.

use crate::api::{funnels, opportunities, stages, webhooks};
use crate::app_state::AppState;
use crate::health::{health_check, liveness_check, readiness_check};

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(health_check))
        .route("/live", get(liveness_check))
        .route("/ready", get(readiness_check))
        // Funnels
        .route(
            "/api/v1/funnels",
            get(funnels::list_funnels).post(funnels::create_funnel),
        )
        .route(
            "/api/v1/funnels/{id}",
            get(funnels::get_funnel)
                .put(funnels::update_funnel)
                .delete(funnels::delete_funnel),
        )
        .route("/api/v1/funnels/{id}/board", get(funnels::get_board))
        .route("/api/v1/funnels/{id}/stages", get(stages::list_stages))
        // Stages
        .route("/api/v1/stages", post(stages::create_stage))
        .route(
            "/api/v1/stages/{id}",
            get(stages::get_stage)
                .put(stages::update_stage)
                .delete(stages::delete_stage),
        )
        .route("/api/v1/stages/{id}/fields", post(stages::add_required_field))
        .route(
            "/api/v1/stages/{id}/opportunities",
            get(opportunities::list_by_stage),
        )
        // Required fields
        .route(
            "/api/v1/fields/{id}",
            axum::routing::put(stages::update_required_field)
                .delete(stages::delete_required_field),
        )
        // Opportunities
        .route(
            "/api/v1/opportunities",
            post(opportunities::create_opportunity),
        )
        .route(
            "/api/v1/opportunities/{id}",
            get(opportunities::get_opportunity)
                .put(opportunities::update_opportunity)
                .delete(opportunities::archive_opportunity),
        )
        .route(
            "/api/v1/opportunities/{id}/move",
            post(opportunities::move_opportunity),
        )
        // Webhooks
        .route(
            "/api/v1/webhooks",
            get(webhooks::list_webhooks).post(webhooks::create_webhook),
        )
        .route(
            "/api/v1/webhooks/{id}",
            axum::routing::delete(webhooks::delete_webhook),
        )
        .route("/api/v1/webhooks/{id}/test", post(webhooks::test_webhook))
        .route(
            "/api/v1/webhooks/inbound",
            post(webhooks::inbound_opportunity),
        )
        .layer(cors)
        .with_state(state)
}
