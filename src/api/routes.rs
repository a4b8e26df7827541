use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::observability::MetricsRegistry;
use crate::proxy::Gateway;

use super::request::{AGENT_ID_HEADER, MAX_BODY_BYTES};
use super::response::HealthResponse;

/// Shared application state.
pub struct AppState {
    /// Decision pipeline
    pub gateway: Gateway,

    /// Application start time
    pub start_time: Instant,

    /// Application version
    pub version: String,
}

impl AppState {
    pub fn new(gateway: Gateway) -> Self {
        AppState {
            gateway,
            start_time: Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        self.gateway.metrics()
    }
}

/// Create the application router.
///
/// `GET /health` and `GET /metrics` are served locally. Every other request,
/// including other methods on those paths, goes to the proxy endpoint.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handle_health).fallback(handle_proxy))
        .route("/metrics", get(handle_metrics).fallback(handle_proxy))
        .fallback(handle_proxy)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Gate and forward a JSON-RPC request.
async fn handle_proxy(
    State(state): State<Arc<AppState>>,
    method: Method,
    headers: HeaderMap,
    body: Body,
) -> Response {
    if method != Method::POST {
        return (StatusCode::METHOD_NOT_ALLOWED, "method not allowed").into_response();
    }

    let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(e) => {
            debug!(error = %e, "Failed to read request body");
            return (StatusCode::BAD_REQUEST, "read error").into_response();
        }
    };

    // Only an absent header means anonymous; non-UTF-8 bytes are kept lossily
    let agent_id = headers
        .get(AGENT_ID_HEADER)
        .map(|v| String::from_utf8_lossy(v.as_bytes()))
        .unwrap_or_default();

    match state.gateway.handle(body, &agent_id).await {
        Ok(reply) => reply.into_response(),
        Err(e) => {
            debug!(error = %e, "Rejected request body");
            (StatusCode::BAD_REQUEST, "invalid JSON-RPC").into_response()
        }
    }
}

/// Health check endpoint.
async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        policies_loaded: state.gateway.engine().rule_set_count(),
        upstream: state.gateway.upstream_target().map(str::to_string),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// Metrics endpoint (Prometheus format).
async fn handle_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let metrics = format!(
        r#"# HELP toolgate_uptime_seconds Application uptime in seconds
# TYPE toolgate_uptime_seconds counter
toolgate_uptime_seconds {}

# HELP toolgate_rule_sets Number of rule sets loaded
# TYPE toolgate_rule_sets gauge
toolgate_rule_sets {}

{}"#,
        state.start_time.elapsed().as_secs(),
        state.gateway.engine().rule_set_count(),
        state.metrics().to_prometheus(),
    );

    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; charset=utf-8",
        )],
        metrics,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use crate::audit::{EventKind, MemorySink};
    use crate::policy::PolicyEngine;
    use crate::ratelimit::{RateLimiter, RateLimiterConfig};
    use crate::upstream::{Upstream, UpstreamError, UpstreamResponse};
    use async_trait::async_trait;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const BACKEND_BODY: &str = r#"{"jsonrpc":"2.0","id":1,"result":{"content":[{"type":"text","text":"hi"}]}}"#;

    const POLICY: &str = r#"{
        "name": "test",
        "default_action": "deny",
        "rules": [
            {"id": "R1", "action": "allow", "tools": ["read_*"]},
            {"id": "R2", "action": "allow", "tools": ["*"], "agents": ["trusted-*"]}
        ]
    }"#;

    #[derive(Default)]
    struct Backend {
        calls: AtomicUsize,
        last_body: Mutex<Option<Bytes>>,
    }

    #[async_trait]
    impl Upstream for Backend {
        async fn forward(&self, body: Bytes) -> Result<UpstreamResponse, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_body.lock() = Some(body);
            Ok(UpstreamResponse::new(200, BACKEND_BODY))
        }

        fn target(&self) -> &str {
            "http://backend.test/mcp"
        }
    }

    struct TestApp {
        router: Router,
        backend: Arc<Backend>,
        audit: Arc<MemorySink>,
    }

    fn test_app(limiter: RateLimiterConfig) -> TestApp {
        let engine = Arc::new(PolicyEngine::new());
        engine.load_json(POLICY.as_bytes()).unwrap();

        let backend = Arc::new(Backend::default());
        let audit = Arc::new(MemorySink::new());

        let gateway = Gateway::new(engine)
            .with_limiter(Arc::new(RateLimiter::new(limiter)))
            .with_auditor(audit.clone())
            .with_upstream(backend.clone());

        TestApp {
            router: create_router(Arc::new(AppState::new(gateway))),
            backend,
            audit,
        }
    }

    fn default_app() -> TestApp {
        test_app(RateLimiterConfig::new(100.0, 100))
    }

    fn post(body: impl Into<Body>) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .method(Method::POST)
            .uri("/mcp")
            .header("content-type", "application/json")
            .body(body.into())
            .unwrap()
    }

    fn tool_call(tool: &str) -> String {
        format!(
            r#"{{"jsonrpc":"2.0","method":"tools/call","id":1,"params":{{"name":"{}","arguments":{{}}}}}}"#,
            tool
        )
    }

    async fn send(app: &TestApp, request: axum::http::Request<Body>) -> (StatusCode, Bytes) {
        let response = tower::ServiceExt::oneshot(app.router.clone(), request)
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body)
    }

    async fn send_json(app: &TestApp, request: axum::http::Request<Body>) -> serde_json::Value {
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::OK);
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = default_app();

        let request = axum::http::Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let json = send_json(&app, request).await;

        assert_eq!(json["status"], "healthy");
        assert_eq!(json["policies_loaded"], 1);
        assert_eq!(json["upstream"], "http://backend.test/mcp");
    }

    #[tokio::test]
    async fn test_allowed_call_relays_backend_body() {
        let app = default_app();
        let body = tool_call("read_file");

        let (status, response) = send(&app, post(body.clone())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(response, Bytes::from_static(BACKEND_BODY.as_bytes()));
        assert_eq!(app.backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(app.backend.last_body.lock().as_deref(), Some(body.as_bytes()));
    }

    #[tokio::test]
    async fn test_denied_call_returns_json_rpc_error() {
        let app = default_app();

        let json = send_json(&app, post(tool_call("exec_command"))).await;

        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["id"], 1);
        assert_eq!(json["error"]["code"], -32001);
        assert_eq!(app.backend.calls.load(Ordering::SeqCst), 0);
        assert_eq!(app.audit.kinds(), vec![EventKind::Denied]);
    }

    #[tokio::test]
    async fn test_agent_header_is_used() {
        let app = default_app();

        let request = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/")
            .header(AGENT_ID_HEADER, "trusted-bot")
            .body(Body::from(tool_call("exec_command")))
            .unwrap();

        let (status, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Bytes::from_static(BACKEND_BODY.as_bytes()));

        let events = app.audit.events();
        assert_eq!(events[0].agent_id, "trusted-bot");
        assert_eq!(events[0].rule_id, "R2");
    }

    #[tokio::test]
    async fn test_non_ascii_agent_header_is_not_anonymous() {
        let engine = Arc::new(PolicyEngine::new());
        engine
            .load_json(
                br#"{"name": "test", "default_action": "allow",
                     "rules": [{"id": "NO_EVIL", "action": "deny", "agents": ["evil*"]}]}"#,
            )
            .unwrap();
        let backend = Arc::new(Backend::default());
        let audit = Arc::new(MemorySink::new());
        let app = TestApp {
            router: create_router(Arc::new(AppState::new(
                Gateway::new(engine)
                    .with_auditor(audit.clone())
                    .with_upstream(backend.clone()),
            ))),
            backend,
            audit,
        };

        let request = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/mcp")
            .header(
                AGENT_ID_HEADER,
                HeaderValue::from_bytes("evil-\u{e9}".as_bytes()).unwrap(),
            )
            .body(Body::from(tool_call("read_file")))
            .unwrap();

        let json = send_json(&app, request).await;

        assert_eq!(json["error"]["code"], -32001);
        assert_eq!(app.backend.calls.load(Ordering::SeqCst), 0);

        let events = app.audit.events();
        assert_eq!(events[0].agent_id, "evil-\u{e9}");
        assert_eq!(events[0].rule_id, "NO_EVIL");
    }

    #[tokio::test]
    async fn test_post_to_operational_paths_is_proxied() {
        let app = default_app();

        for path in ["/health", "/metrics"] {
            let request = axum::http::Request::builder()
                .method(Method::POST)
                .uri(path)
                .body(Body::from(tool_call("read_file")))
                .unwrap();

            let (status, body) = send(&app, request).await;

            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, Bytes::from_static(BACKEND_BODY.as_bytes()));
        }

        assert_eq!(app.backend.calls.load(Ordering::SeqCst), 2);

        let request = axum::http::Request::builder()
            .method(Method::PUT)
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_passthrough_not_audited() {
        let app = default_app();

        let (status, _) = send(
            &app,
            post(r#"{"jsonrpc":"2.0","method":"tools/list","id":2}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(app.backend.calls.load(Ordering::SeqCst), 1);
        assert!(app.audit.is_empty());
    }

    #[tokio::test]
    async fn test_non_post_rejected() {
        let app = default_app();

        let request = axum::http::Request::builder()
            .method(Method::GET)
            .uri("/mcp")
            .body(Body::empty())
            .unwrap();

        let (status, _) = send(&app, request).await;

        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(app.backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_json_rejected() {
        let app = default_app();

        let (status, body) = send(&app, post("{\"jsonrpc\": ")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, Bytes::from_static(b"invalid JSON-RPC"));
        assert!(app.audit.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let app = default_app();
        let body = vec![b' '; MAX_BODY_BYTES + 1];

        let (status, body) = send(&app, post(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, Bytes::from_static(b"read error"));
        assert_eq!(app.backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_body_at_size_limit_accepted() {
        let app = default_app();
        let mut body = tool_call("read_file").into_bytes();
        body.resize(MAX_BODY_BYTES, b' ');

        let (status, response) = send(&app, post(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(response, Bytes::from_static(BACKEND_BODY.as_bytes()));
        assert_eq!(app.backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            app.backend.last_body.lock().as_ref().map(|b| b.len()),
            Some(MAX_BODY_BYTES)
        );
    }

    #[tokio::test]
    async fn test_rate_limited_over_http() {
        let app = test_app(RateLimiterConfig::new(0.0, 1));

        let (status, _) = send(&app, post(tool_call("read_file"))).await;
        assert_eq!(status, StatusCode::OK);

        let json = send_json(&app, post(tool_call("read_file"))).await;
        assert_eq!(json["error"]["code"], -32000);
        assert_eq!(json["error"]["message"], "rate limited");
        assert_eq!(app.backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_upstream_over_http() {
        let engine = Arc::new(PolicyEngine::new());
        engine.load_json(POLICY.as_bytes()).unwrap();
        let router = create_router(Arc::new(AppState::new(Gateway::new(engine))));

        let response = tower::ServiceExt::oneshot(router, post(tool_call("read_file")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], -32002);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let app = default_app();
        send(&app, post(tool_call("read_file"))).await;

        let request = axum::http::Request::builder()
            .uri("/metrics")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(&app, request).await;
        let text = String::from_utf8(body.to_vec()).unwrap();

        assert_eq!(status, StatusCode::OK);
        assert!(text.contains("toolgate_rule_sets 1"));
        assert!(text.contains("toolgate_tool_calls{outcome=\"allowed\"} 1"));
    }
}
