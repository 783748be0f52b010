use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use http::Method;
use serde_json::Value;
use statuswatch_core::{
    create_app,
    models::TRANSPORT_ERROR_CODE,
    probe::{HttpResponse, HttpTransport, ManualClock, TransportError},
    AppState, ConfigHandle, Configuration, LoadedConfiguration, Monitor, ResultStore,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;
use url::Url;

const TARGETS: &str = r#"
title: Integration
refreshInterval: 30
authorization:
  type: client-cert-info
  header: X-SSL-Client-DN
  users: [alice]
groups:
  - name: api
    category: Backend
    url: https://api.test/v1/
    endpoints:
      - name: health
        url: health
      - name: down
        url: down
"#;

struct StubTransport {
    calls: AtomicUsize,
}

#[async_trait]
impl HttpTransport for StubTransport {
    async fn fetch(&self, _method: Method, url: &Url) -> Result<HttpResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match url.path() {
            "/v1/health" => Ok(HttpResponse {
                status: 200,
                content_type: "application/json".to_string(),
                body: br#"{"ok":true}"#.to_vec(),
            }),
            _ => Err(TransportError::Request("connection refused".to_string())),
        }
    }
}

struct TestApp {
    router: Router,
    transport: Arc<StubTransport>,
}

fn app_with(yaml: &str) -> TestApp {
    let loaded = LoadedConfiguration::new(Configuration::from_yaml(yaml).unwrap());
    let transport = Arc::new(StubTransport {
        calls: AtomicUsize::new(0),
    });
    let monitor = Arc::new(Monitor::new(
        ConfigHandle::new(loaded),
        ResultStore::new(),
        transport.clone(),
        Arc::new(ManualClock::new(Utc::now())),
        2,
    ));

    TestApp {
        router: create_app(AppState::new(monitor)),
        transport,
    }
}

fn app() -> TestApp {
    app_with(TARGETS)
}

async fn get(router: &Router, uri: &str, user: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder().uri(uri);
    if let Some(user) = user {
        request = request.header("X-SSL-Client-DN", format!("CN={}, OU=eng", user));
    }

    let response = router
        .clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn test_status_is_not_gated() {
    let app = app();
    let (status, body) = get(&app.router, "/status", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "up");
    assert!(body["lastUpdate"].is_null());
    assert!(body.get("header").is_none());
}

#[tokio::test]
async fn test_verbose_status_reports_authorization() {
    let app = app();

    let (_, body) = get(&app.router, "/status?more=true", None).await;
    assert_eq!(body["authError"]["code"], 401);
    assert_eq!(body["authorization"]["type"], "client-cert-info");

    let (_, body) = get(&app.router, "/status?more=true", Some("alice")).await;
    assert!(body["authError"].is_null());
    assert_eq!(body["header"]["x-ssl-client-dn"], "CN=alice, OU=eng");
}

#[tokio::test]
async fn test_api_requires_authorization() {
    let app = app();

    let (status, body) = get(&app.router, "/api/readAll", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 401);
    assert_eq!(body["message"], "Client not authenticated");

    let (status, body) = get(&app.router, "/api/readAll", Some("mallory")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "User not authorized");

    let (status, _) = get(&app.router, "/api/nothing/here", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.transport.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_config_hides_authorization() {
    let app = app();
    let (status, body) = get(&app.router, "/api/config", Some("alice")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Integration");
    assert_eq!(body["refreshInterval"], 30.0);
    assert_eq!(body["groups"][0]["category"], "Backend");
    assert!(body.get("authorization").is_none());
}

#[tokio::test]
async fn test_refresh_then_read() {
    let app = app();

    let (status, body) = get(&app.router, "/api/refresh?group=api&endpoint=health", Some("alice")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["code"], 200);
    assert_eq!(body["content_type"], "application/json");

    let (status, body) = get(&app.router, "/api/read?group=api&endpoint=health", Some("alice")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (_, body) = get(&app.router, "/api/refresh?group=api&endpoint=health", Some("alice")).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(app.transport.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_invalid_selection_is_bad_request() {
    let app = app();

    for uri in [
        "/api/read?group=api&endpoint=missing",
        "/api/read?group=missing&endpoint=health",
        "/api/read",
        "/api/refresh?group=api",
    ] {
        let (status, body) = get(&app.router, uri, Some("alice")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["message"], "Invalid group/endpoint selection");
    }
}

#[tokio::test]
async fn test_read_before_probe_is_not_found() {
    let app = app();
    let (status, _) = get(&app.router, "/api/read?group=api&endpoint=health", Some("alice")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_refresh_all_returns_every_result() {
    let app = app();

    let (status, body) = get(&app.router, "/api/refreshAll", Some("alice")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["https://api.test/v1/health"]["status"], "healthy");
    assert_eq!(body["https://api.test/v1/down"]["status"], "down");
    assert_eq!(body["https://api.test/v1/down"]["code"], TRANSPORT_ERROR_CODE);

    let (_, body) = get(&app.router, "/api/readAll", Some("alice")).await;
    assert_eq!(body.as_object().unwrap().len(), 2);

    let (_, status_body) = get(&app.router, "/status", None).await;
    assert!(status_body["lastUpdate"].is_string());
}

#[tokio::test]
async fn test_unknown_api_path_is_not_implemented() {
    let app = app();

    let (status, body) = get(&app.router, "/api/stats/daily", Some("alice")).await;
    assert_eq!(status.as_u16(), 599);
    assert_eq!(body["message"], "Not Yet Implemented");
    assert_eq!(body["details"], serde_json::json!(["stats", "daily"]));
}

#[tokio::test]
async fn test_misconfigured_authorization_is_server_error() {
    let yaml = TARGETS.replace("type: client-cert-info", "type: kerberos");
    let app = app_with(&yaml);

    let (status, body) = get(&app.router, "/api/readAll", Some("alice")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Invalid authorization configuration");
}
