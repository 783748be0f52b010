//! Result API handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use tracing::info;

use crate::{error::Result, models::SelectionQuery, AppState};

/// Status used for `/api` paths that have no handler.
const NOT_IMPLEMENTED: u16 = 599;

pub async fn handle_config(State(state): State<AppState>) -> impl IntoResponse {
    let loaded = state.monitor.configuration();
    Json(loaded.targets.clone())
}

pub async fn handle_read(
    State(state): State<AppState>,
    Query(selection): Query<SelectionQuery>,
) -> Result<impl IntoResponse> {
    let result = state.monitor.read(&selection.group, &selection.endpoint)?;
    Ok(Json(result))
}

pub async fn handle_refresh(
    State(state): State<AppState>,
    Query(selection): Query<SelectionQuery>,
) -> Result<impl IntoResponse> {
    info!(
        group = %selection.group,
        endpoint = %selection.endpoint,
        "Refresh requested"
    );
    let result = state
        .monitor
        .refresh(&selection.group, &selection.endpoint)
        .await?;
    Ok(Json(result))
}

pub async fn handle_read_all(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.monitor.read_all())
}

pub async fn handle_refresh_all(State(state): State<AppState>) -> impl IntoResponse {
    info!("Refresh of all endpoints requested");
    Json(state.monitor.refresh_all().await)
}

pub async fn handle_not_implemented(Path(rest): Path<String>) -> impl IntoResponse {
    let status = StatusCode::from_u16(NOT_IMPLEMENTED).unwrap_or(StatusCode::NOT_IMPLEMENTED);
    let details: Vec<&str> = rest.split('/').collect();

    (
        status,
        Json(json!({
            "message": "Not Yet Implemented",
            "details": details,
        })),
    )
}
