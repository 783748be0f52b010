use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error};

/// Runs the current authorizer against the request headers.
///
/// Misconfiguration is a server fault and logged as one; every other denial
/// is ordinary client traffic.
pub async fn require_authorization(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let loaded = state.monitor.configuration();

    if let Err(denial) = loaded.authorizer.authorize(request.headers()) {
        let path = request.uri().path();
        if denial.code >= 500 {
            error!(path, mode = loaded.authorizer.mode(), "Authorization failed: {}", denial.message);
        } else {
            debug!(path, code = denial.code, "Request denied: {}", denial.message);
        }
        return Err(denial.into());
    }

    Ok(next.run(request).await)
}
