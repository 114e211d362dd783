//! `HeraldServer`: axum HTTP adapter over the hub.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use futures::StreamExt;
use herald_core::{Event, EventId, HANDSHAKE_HEADERS, HubError, Payload, Retry};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::{HubConfig, ServerConfig};
use crate::hub::lifecycle::{HubController, ShutdownReport};
use crate::hub::sink::channel;
use crate::shutdown::ShutdownCoordinator;
use crate::status::{HubStatus, now_rfc3339};

/// Event name used when a publish request omits one.
pub const DEFAULT_EVENT_NAME: &str = "message";

/// Shared state accessible from axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// The broadcast hub.
    pub hub: Arc<HubController>,
    /// Prometheus handle for `/metrics`, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The HTTP server.
pub struct HeraldServer {
    config: ServerConfig,
    hub: Arc<HubController>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: Option<PrometheusHandle>,
}

impl HeraldServer {
    /// Create a server with a fresh hub.
    pub fn new(config: ServerConfig, hub_config: HubConfig) -> Self {
        Self {
            config,
            hub: Arc::new(HubController::new(hub_config)),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            metrics: None,
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            hub: Arc::clone(&self.hub),
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/", get(root_handler))
            .route("/sse", get(sse_handler))
            .route("/broadcast", post(broadcast_handler))
            .route("/status", get(status_handler))
            .route("/metrics", get(metrics_handler))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind and serve until the shutdown coordinator fires.
    ///
    /// Returns the bound address and the serving task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;

        let router = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(error) = served {
                warn!(%error, "http server exited with error");
            }
        });

        info!(%local_addr, "herald listening");
        Ok((local_addr, handle))
    }

    /// Run the hub shutdown, then stop accepting HTTP requests.
    pub async fn stop(&self) -> ShutdownReport {
        let report = self.hub.on_shutdown().await;
        self.shutdown.shutdown();
        report
    }

    /// The broadcast hub.
    pub fn hub(&self) -> &Arc<HubController> {
        &self.hub
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// The server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Body of `POST /broadcast`. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PublishRequest {
    /// Event name; defaults to `"message"`.
    pub event: Option<String>,
    /// Payload; a diagnostic object is substituted when absent or null.
    pub data: Option<Value>,
    /// Event ID.
    pub id: Option<EventId>,
    /// Reconnection hint, passed through verbatim.
    pub retry: Option<Retry>,
}

impl PublishRequest {
    /// Apply the caller-side defaults and build the event.
    pub fn into_event(self) -> Event {
        let data = match self.data {
            None | Some(Value::Null) => json!({
                "message": "Test broadcast",
                "timestamp": now_rfc3339(),
            }),
            Some(value) => value,
        };
        Event {
            event: Some(self.event.unwrap_or_else(|| DEFAULT_EVENT_NAME.into())),
            id: self.id,
            data: Some(Payload::from(data)),
            retry: self.retry,
        }
    }
}

/// Body returned by `POST /broadcast`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResponse {
    /// Always `true` on success.
    pub ok: bool,
    /// Human-readable confirmation.
    pub message: &'static str,
    /// Subscribers the frame was attempted against.
    pub attempted: usize,
    /// Subscribers still registered after the broadcast.
    pub client_count: usize,
}

fn error_response(status: StatusCode, error: &impl ToString) -> Response {
    (status, Json(json!({ "ok": false, "error": error.to_string() }))).into_response()
}

/// GET /
async fn root_handler() -> &'static str {
    "Hello World!"
}

/// GET /sse
async fn sse_handler(State(state): State<AppState>) -> Response {
    let (sink, stream) = channel(state.hub.config().send_queue_capacity);
    if let Err(error) = state.hub.on_subscribe(Arc::new(sink)).await {
        warn!(%error, "rejected subscriber");
        return error_response(StatusCode::SERVICE_UNAVAILABLE, &error);
    }

    let mut response = Response::new(Body::from_stream(stream.map(Ok::<Bytes, Infallible>)));
    let headers = response.headers_mut();
    for (name, value) in HANDSHAKE_HEADERS {
        let _ = headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }
    response
}

/// POST /broadcast
async fn broadcast_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        PublishRequest::default()
    } else {
        match serde_json::from_slice::<PublishRequest>(&body) {
            Ok(request) => request,
            Err(error) => return error_response(StatusCode::BAD_REQUEST, &error),
        }
    };

    let event = request.into_event();
    match state.hub.publish(&event).await {
        Ok(attempted) => {
            let client_count = state.hub.registry().size();
            info!(
                event = event.event.as_deref().unwrap_or_default(),
                attempted, client_count, "broadcast sent"
            );
            Json(PublishResponse {
                ok: true,
                message: "Broadcast sent",
                attempted,
                client_count,
            })
            .into_response()
        }
        Err(error @ HubError::Encoding(_)) => error_response(StatusCode::BAD_REQUEST, &error),
        Err(error) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &error),
    }
}

/// GET /status
async fn status_handler(State(state): State<AppState>) -> Json<HubStatus> {
    Json(state.hub.status())
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics {
        Some(handle) => (
            [(CONTENT_TYPE, "text/plain; version=0.0.4")],
            crate::metrics::render(&handle),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tower::ServiceExt;

    fn make_server() -> HeraldServer {
        HeraldServer::new(ServerConfig::default(), HubConfig::default())
    }

    async fn json_body(resp: Response) -> Value {
        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_req(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    async fn next_chunk(stream: &mut axum::body::BodyDataStream) -> String {
        let chunk = stream.next().await.unwrap().unwrap();
        String::from_utf8(chunk.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn root_says_hello() {
        let app = make_server().router();
        let resp = app.oneshot(get_req("/")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), 100).await.unwrap();
        assert_eq!(&body[..], b"Hello World!");
    }

    #[tokio::test]
    async fn status_reports_subscribers() {
        let app = make_server().router();
        let resp = app.oneshot(get_req("/status")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let parsed = json_body(resp).await;
        assert_eq!(parsed["connectedSubscribers"], 0);
        assert!(parsed["uptimeSeconds"].is_number());
        assert!(parsed["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn sse_sends_headers_and_connected_comment() {
        let server = make_server();
        let resp = server.router().oneshot(get_req("/sse")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["content-type"], "text/event-stream");
        assert_eq!(resp.headers()["cache-control"], "no-cache");
        assert_eq!(resp.headers()["connection"], "keep-alive");
        assert_eq!(server.hub().registry().size(), 1);

        let mut stream = resp.into_body().into_data_stream();
        assert_eq!(next_chunk(&mut stream).await, ": connected\n\n");
    }

    #[tokio::test]
    async fn broadcast_reaches_open_stream() {
        let server = make_server();
        let resp = server.router().oneshot(get_req("/sse")).await.unwrap();
        let mut stream = resp.into_body().into_data_stream();
        let _ = next_chunk(&mut stream).await;

        let resp = server
            .router()
            .oneshot(post_req(
                "/broadcast",
                r#"{"event":"update","data":{"a":1},"id":5}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let parsed = json_body(resp).await;
        assert_eq!(parsed["ok"], true);
        assert_eq!(parsed["message"], "Broadcast sent");
        assert_eq!(parsed["attempted"], 1);
        assert_eq!(parsed["clientCount"], 1);

        assert_eq!(
            next_chunk(&mut stream).await,
            "id: 5\nevent: update\ndata: {\"a\":1}\n\n"
        );
    }

    #[tokio::test]
    async fn broadcast_defaults_event_and_payload() {
        let server = make_server();
        let resp = server.router().oneshot(get_req("/sse")).await.unwrap();
        let mut stream = resp.into_body().into_data_stream();
        let _ = next_chunk(&mut stream).await;

        let resp = server.router().oneshot(post_req("/broadcast", "")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let frame = next_chunk(&mut stream).await;
        assert!(frame.starts_with("event: message\ndata: {"), "{frame}");
        assert!(frame.contains("\"message\":\"Test broadcast\""), "{frame}");
        assert!(frame.contains("\"timestamp\":"), "{frame}");
    }

    #[tokio::test]
    async fn broadcast_keeps_string_data_verbatim() {
        let req = PublishRequest {
            data: Some(Value::String("plain".into())),
            ..PublishRequest::default()
        };
        let event = req.into_event();
        assert_eq!(event.event.as_deref(), Some("message"));
        assert_eq!(event.data, Some(Payload::Text("plain".into())));
    }

    #[tokio::test]
    async fn broadcast_with_no_subscribers() {
        let app = make_server().router();
        let resp = app.oneshot(post_req("/broadcast", "{}")).await.unwrap();
        let parsed = json_body(resp).await;
        assert_eq!(parsed["attempted"], 0);
        assert_eq!(parsed["clientCount"], 0);
    }

    #[tokio::test]
    async fn retry_tokens_pass_through_unchecked() {
        let server = make_server();
        let resp = server.router().oneshot(get_req("/sse")).await.unwrap();
        let mut stream = resp.into_body().into_data_stream();
        let _ = next_chunk(&mut stream).await;

        for (body, line) in [
            (r#"{"data":"x","retry":"3000"}"#, "retry: 3000\n"),
            (r#"{"data":"x","retry":-1}"#, "retry: -1\n"),
        ] {
            let resp = server.router().oneshot(post_req("/broadcast", body)).await.unwrap();
            assert_eq!(resp.status(), StatusCode::OK, "{body}");
            let frame = next_chunk(&mut stream).await;
            assert_eq!(frame, format!("event: message\n{line}data: x\n\n"));
        }
    }

    #[tokio::test]
    async fn malformed_broadcast_body_is_rejected() {
        let app = make_server().router();
        let resp = app.oneshot(post_req("/broadcast", "{not json")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let parsed = json_body(resp).await;
        assert_eq!(parsed["ok"], false);
        assert!(parsed["error"].is_string());
    }

    #[tokio::test]
    async fn sse_refused_after_shutdown() {
        let server = make_server();
        let report = server.stop().await;
        assert_eq!(report.subscribers, 0);
        assert!(server.shutdown().is_shutting_down());

        let resp = server.router().oneshot(get_req("/sse")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let parsed = json_body(resp).await;
        assert_eq!(parsed["ok"], false);
    }

    #[tokio::test]
    async fn metrics_disabled_without_handle() {
        let app = make_server().router();
        let resp = app.oneshot(get_req("/metrics")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn metrics_served_with_handle() {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let app = make_server().with_metrics(handle).router();
        let resp = app.oneshot(get_req("/metrics")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let app = make_server().router();
        let resp = app.oneshot(get_req("/nonexistent")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cors_headers_present() {
        let app = make_server().router();
        let req = Request::builder()
            .uri("/status")
            .header("origin", "http://example.test")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert!(resp.headers().contains_key("access-control-allow-origin"));
    }

    #[tokio::test]
    async fn listen_binds_ephemeral_port_and_stops() {
        let server = make_server();
        let (addr, handle) = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);
        let _ = server.stop().await;
        handle.await.unwrap();
    }
}
