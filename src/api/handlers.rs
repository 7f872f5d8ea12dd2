use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;
use validator::Validate;

use crate::api::models::{
    FancySettleRequest, ManualSettleRequest, ManualVoidRequest, SettlementResponse,
};
use crate::broadcast::BroadcastHub;
use crate::error::{AppError, AppResult};
use crate::ledger::repository::UnsettledSummary;
use crate::ledger::LedgerRepository;
use crate::settlement::SettlementOrchestrator;

/// processed_by actor recorded on ledger entries from admin calls
const ADMIN_ACTOR: &str = "admin-api";

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<LedgerRepository>,
    pub orchestrator: Arc<SettlementOrchestrator>,
    pub hub: BroadcastHub,
}

pub async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn manual_settle(
    State(state): State<AppState>,
    Path(match_id): Path<Uuid>,
    Json(req): Json<ManualSettleRequest>,
) -> AppResult<Json<SettlementResponse>> {
    req.validate()
        .map_err(|e| AppError::InvalidInput(e.to_string()))?;

    let report = state
        .orchestrator
        .manual_settle(match_id, &req.winner, req.win_type, req.win_margin, ADMIN_ACTOR)
        .await?;

    Ok(Json(report.into()))
}

pub async fn manual_void(
    State(state): State<AppState>,
    Path(match_id): Path<Uuid>,
    Json(req): Json<ManualVoidRequest>,
) -> AppResult<Json<SettlementResponse>> {
    req.validate()
        .map_err(|e| AppError::InvalidInput(e.to_string()))?;

    let report = state
        .orchestrator
        .manual_void(match_id, &req.reason, ADMIN_ACTOR)
        .await?;

    Ok(Json(report.into()))
}

pub async fn manual_fancy_settle(
    State(state): State<AppState>,
    Path(market_id): Path<Uuid>,
    Json(req): Json<FancySettleRequest>,
) -> AppResult<Json<SettlementResponse>> {
    let report = state
        .orchestrator
        .manual_fancy_settle(market_id, req.result_value, ADMIN_ACTOR)
        .await?;

    Ok(Json(report.into()))
}

pub async fn get_unsettled_summary(
    State(state): State<AppState>,
) -> AppResult<Json<UnsettledSummary>> {
    let summary = state.ledger.unsettled_summary().await?;
    Ok(Json(summary))
}

/// Live settlement/status events for UI consumers
pub async fn events_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| stream_events(socket, state.hub))
}

async fn stream_events(mut socket: WebSocket, hub: BroadcastHub) {
    let mut events = hub.subscribe();
    loop {
        match events.recv().await {
            Ok(event) => {
                let Ok(text) = serde_json::to_string(&event) else {
                    continue;
                };
                if socket.send(Message::Text(text)).await.is_err() {
                    debug!("websocket consumer went away");
                    break;
                }
            }
            // Slow consumers miss events rather than stalling the hub
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                debug!(skipped, "websocket consumer lagged");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}
