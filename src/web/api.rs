//! Defines the Axum API routes and handlers.

use crate::colors::list_colors;
use crate::web::engine_channel::EngineRequest;
use crate::web::models::{ColorsResponse, EffectOverrideRequest, ErrorResponse, StatusResponse};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use tokio::sync::mpsc::Sender;

pub type AppState = Sender<EngineRequest>;

/// Creates the Axum router with all the API endpoints.
pub fn create_router(engine_tx: AppState) -> Router {
    Router::new()
        .route("/api/v1/status", get(get_status).post(push_status))
        .route("/api/v1/effect", post(set_effect))
        .route("/api/v1/colors", get(get_colors))
        .with_state(engine_tx)
}

/// Handler to get the current service and printer status.
async fn get_status(State(engine_tx): State<AppState>) -> Result<Json<StatusResponse>, StatusCode> {
    let (resp_tx, resp_rx) = tokio::sync::oneshot::channel();
    if engine_tx.send(EngineRequest::GetStatus { respond_to: resp_tx }).await.is_err() {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    match resp_rx.await {
        Ok(status) => Ok(Json(status)),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// Handler to push a status payload, for setups where Moonraker is not
/// polled directly. Body uses the same shape as Moonraker's `status` field.
async fn push_status(
    State(engine_tx): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<StatusCode, StatusCode> {
    let (resp_tx, resp_rx) = tokio::sync::oneshot::channel();
    if engine_tx
        .send(EngineRequest::PushStatus {
            status: payload,
            respond_to: resp_tx,
        })
        .await
        .is_err()
    {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    match resp_rx.await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// Handler to install or clear a manual effect override.
async fn set_effect(
    State(engine_tx): State<AppState>,
    Json(payload): Json<EffectOverrideRequest>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    let settings = payload
        .into_settings()
        .map_err(|error| (StatusCode::BAD_REQUEST, Json(ErrorResponse { error })))?;
    let (resp_tx, resp_rx) = tokio::sync::oneshot::channel();
    if engine_tx
        .send(EngineRequest::SetOverride {
            settings,
            respond_to: resp_tx,
        })
        .await
        .is_err()
    {
        return Err(engine_unavailable());
    }
    match resp_rx.await {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(_) => Err(engine_unavailable()),
    }
}

/// Handler listing the named colors accepted in configs and overrides.
async fn get_colors() -> Json<ColorsResponse> {
    Json(ColorsResponse {
        colors: list_colors().iter().map(|name| name.to_string()).collect(),
    })
}

fn engine_unavailable() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "engine unavailable".to_string(),
        }),
    )
}
