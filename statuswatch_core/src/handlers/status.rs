//! Liveness report

use std::collections::BTreeMap;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use serde_json::json;

use crate::{models::StatusQuery, AppState};

pub async fn handle_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let mut content = json!({
        "status": "up",
        "version": state.version,
        "uptime": format_uptime(state.started.elapsed()),
        "lastUpdate": state.monitor.last_sweep(),
    });

    if query.verbose() {
        let loaded = state.monitor.configuration();

        let mut header: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in headers.iter() {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            header
                .entry(name.as_str().to_string())
                .and_modify(|joined| {
                    joined.push_str(", ");
                    joined.push_str(&value);
                })
                .or_insert(value);
        }

        content["header"] = json!(header);
        content["authError"] = match loaded.authorizer.authorize(&headers) {
            Ok(()) => serde_json::Value::Null,
            Err(denial) => json!(denial),
        };
        content["authorization"] = loaded.authorizer.describe();
    }

    Json(content)
}

/// `1h2m3s` style, whole seconds only.
fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);

    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
