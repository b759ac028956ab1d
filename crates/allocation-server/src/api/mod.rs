//! HTTP ingress: webhooks, health and read-only diagnostics

pub mod webhooks;

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chat_allocation_core::AllocationService;
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::error::Result;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AllocationService>,
}

/// Create the REST API router
pub fn create_router(service: Arc<AllocationService>) -> Router {
    let state = AppState { service };
    Router::new()
        .route("/health", get(health))
        .route("/webhook/incoming", post(webhooks::incoming))
        .route("/webhook/resolved", post(webhooks::resolved))
        .route("/queue", get(queue))
        .route("/agents/:agent_id/capacity", get(agent_capacity))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.service.health_check().await {
        Ok(()) => (StatusCode::OK, Json(json!({
            "status": "healthy",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "services": { "store": "connected" },
        }))),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, Json(json!({
                "status": "unhealthy",
                "error": e.to_string(),
            })))
        }
    }
}

async fn queue(State(state): State<AppState>) -> Result<Json<Value>> {
    let stats = state.service.queue_stats().await?;
    Ok(Json(json!({
        "stats": stats,
        "dispatch": {
            "state": state.service.dispatch_state(),
            "counters": state.service.dispatch_stats(),
        },
    })))
}

async fn agent_capacity(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> Result<Json<Value>> {
    let active = state.service.inspect_agent_capacity(&agent_id).await?;
    let max = state.service.config().engine.max_concurrent;
    Ok(Json(json!({
        "agent_id": agent_id,
        "active_sessions": active,
        "max_concurrent": max,
        "available_slots": max.saturating_sub(active),
    })))
}
