//! Route table

use axum::{
    middleware,
    routing::{any, get},
    Router,
};

use super::{api, status};
use crate::{middleware::auth::require_authorization, AppState};

/// `/status` is open; everything under `/api` goes through the authorizer
/// first, including paths that are not implemented.
pub fn create_routes(state: AppState) -> Router<AppState> {
    let api_routes = Router::new()
        .route("/api/config", get(api::handle_config))
        .route("/api/read", get(api::handle_read))
        .route("/api/refresh", get(api::handle_refresh))
        .route("/api/readAll", get(api::handle_read_all))
        .route("/api/refreshAll", get(api::handle_refresh_all))
        .route("/api/*rest", any(api::handle_not_implemented))
        .route_layer(middleware::from_fn_with_state(state, require_authorization));

    Router::new()
        .route("/status", get(status::handle_status))
        .merge(api_routes)
}
