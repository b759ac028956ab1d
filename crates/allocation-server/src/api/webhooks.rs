//! Omnichannel webhook endpoints

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chat_allocation_core::prelude::{EnqueueOutcome, QueueItem};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::AppState;
use crate::error::{Result, ServerError};

/// Fields of the omnichannel room webhook that matter for allocation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoomWebhook {
    #[serde(default)]
    pub room_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_resolved: bool,
    #[serde(default)]
    pub candidate_agent: Option<CandidateAgent>,
}

/// Agent attached to a room at resolution time
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CandidateAgent {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

fn decode(payload: std::result::Result<Json<RoomWebhook>, JsonRejection>) -> Result<RoomWebhook> {
    payload
        .map(|Json(webhook)| webhook)
        .map_err(|e| ServerError::bad_request(format!("invalid payload: {}", e.body_text())))
}

/// New customer message: queue the room unless it is resolved or already waiting
pub async fn incoming(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RoomWebhook>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>)> {
    let webhook = decode(payload)?;

    if webhook.room_id.is_empty() || webhook.email.is_empty() {
        return Err(ServerError::bad_request("room_id and email are required"));
    }

    if webhook.is_resolved {
        info!("Room {} already resolved, skipping", webhook.room_id);
        return Ok((StatusCode::OK, Json(json!({
            "status": "skipped",
            "message": "Room already resolved",
        }))));
    }

    let item = QueueItem::new(webhook.room_id, webhook.email, webhook.source);
    match state.service.enqueue_session(item).await? {
        EnqueueOutcome::Queued => Ok((StatusCode::ACCEPTED, Json(json!({
            "status": "queued",
            "message": "Customer added to queue successfully",
        })))),
        EnqueueOutcome::AlreadyQueued => Ok((StatusCode::OK, Json(json!({
            "status": "already_queued",
            "message": "Customer already in queue",
        })))),
    }
}

/// Room resolved: give the handling agent's slot back
pub async fn resolved(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RoomWebhook>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>)> {
    let webhook = decode(payload)?;

    if webhook.room_id.is_empty() {
        return Err(ServerError::bad_request("room_id is required"));
    }

    if !webhook.is_resolved {
        info!("Room {} not resolved yet, skipping", webhook.room_id);
        return Ok((StatusCode::OK, Json(json!({
            "status": "skipped",
            "message": "Room not resolved yet",
        }))));
    }

    match webhook.candidate_agent.filter(|agent| agent.id > 0) {
        Some(agent) => {
            let agent_id = agent.id.to_string();
            // Best effort: the room is resolved upstream whatever happens here
            if let Err(e) = state.service.notify_session_resolved(&agent_id).await {
                warn!("Failed to release capacity for agent {} (room {}): {}", agent_id, webhook.room_id, e);
            }
            info!("✅ Room {} resolved by agent {}", webhook.room_id, agent_id);
        }
        None => info!("Room {} resolved without a candidate agent", webhook.room_id),
    }

    Ok((StatusCode::OK, Json(json!({
        "status": "resolved",
        "message": "Chat resolved successfully",
    }))))
}
