//! `ParleyServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use parley_core::ConnectionInfo;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::hub::{HubHandle, spawn_hub};
use crate::shutdown::ShutdownCoordinator;
use crate::static_files;
use crate::websocket::{ConnectionTable, run_ws_session};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Front door to the hub task.
    pub hub: HubHandle,
    /// Outbound sinks of open sockets.
    pub table: Arc<ConnectionTable>,
    /// When the server started.
    pub start_time: Instant,
    /// Root of the static file responder.
    pub static_dir: Arc<PathBuf>,
    /// Per-connection outbound queue size.
    pub send_queue_capacity: usize,
    /// Largest accepted inbound message.
    pub max_message_size: usize,
    /// Renders `/metrics` when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The Parley server.
///
/// Creating one starts the hub task, so it must happen inside a Tokio
/// runtime.
pub struct ParleyServer {
    config: ServerConfig,
    hub: HubHandle,
    table: Arc<ConnectionTable>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

impl ParleyServer {
    /// Create a server and start its hub.
    pub fn new(config: ServerConfig, metrics: Option<PrometheusHandle>) -> Self {
        let table = Arc::new(ConnectionTable::new());
        let shutdown = Arc::new(ShutdownCoordinator::new());
        let (hub, hub_task) = spawn_hub(&config.hub_config(), Arc::clone(&table), shutdown.token());
        shutdown.track(hub_task);

        Self {
            config,
            hub,
            table,
            shutdown,
            start_time: Instant::now(),
            metrics,
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            hub: self.hub.clone(),
            table: Arc::clone(&self.table),
            start_time: self.start_time,
            static_dir: Arc::new(self.config.static_dir.clone()),
            send_queue_capacity: self.config.send_queue_capacity,
            max_message_size: self.config.max_message_size,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .fallback(static_handler)
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind `host:port` and start serving in the background.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task,
    /// which finishes once shutdown is signalled.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let addr = listener.local_addr()?;
        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();
        let token = self.shutdown.token();

        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "server error");
            }
        });

        info!(%addr, "Parley server listening on http://{addr}/");
        Ok((addr, handle))
    }

    /// Get the hub handle.
    pub fn hub(&self) -> &HubHandle {
        &self.hub
    }

    /// Get the connection table.
    pub fn table(&self) -> &Arc<ConnectionTable> {
        &self.table
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /ws
async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let mut info = ConnectionInfo::new(peer);
    if let Some(agent) = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
    {
        info = info.with_user_agent(agent);
    }

    ws.max_message_size(state.max_message_size)
        .on_upgrade(move |socket| {
            run_ws_session(
                socket,
                info,
                state.hub,
                state.table,
                state.send_queue_capacity,
            )
        })
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match state.hub.status().await {
        Ok(status) => (
            StatusCode::OK,
            Json(health::health_check(state.start_time, status.connection_count)),
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(health::stopping(state.start_time)),
        ),
    }
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

/// Everything else: static files.
async fn static_handler(method: Method, uri: Uri, State(state): State<AppState>) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }
    let path = uri.path().trim_start_matches('/');
    static_files::serve(&state.static_dir, path).await
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;

    fn make_server(static_dir: PathBuf) -> ParleyServer {
        let config = ServerConfig {
            static_dir,
            ..ServerConfig::default()
        };
        ParleyServer::new(config, None)
    }

    async fn get_path(router: Router, path: &str) -> Response {
        router
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_string(resp: Response) -> String {
        let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn default_config() {
        let server = ParleyServer::new(ServerConfig::default(), None);
        assert_eq!(server.config().host, "127.0.0.1");
        assert_eq!(server.config().port, 0);
        assert!(server.table().is_empty());
        assert!(!server.shutdown().is_shutting_down());
        assert_eq!(server.shutdown().tracked(), 1);
    }

    #[tokio::test]
    async fn hub_starts_with_seeded_log() {
        let server = ParleyServer::new(ServerConfig::default(), None);
        let messages = server.hub().messages().await.unwrap();
        assert_eq!(messages, vec![serde_json::json!("Initial message")]);
    }

    #[tokio::test]
    async fn health_endpoint_reports_connections() {
        let server = ParleyServer::new(ServerConfig::default(), None);

        let resp = get_path(server.router(), "/health").await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["connections"], 0);
    }

    #[tokio::test]
    async fn health_after_shutdown_is_unavailable() {
        let server = ParleyServer::new(ServerConfig::default(), None);
        server.shutdown().graceful_shutdown(None).await;

        let resp = get_path(server.router(), "/health").await;

        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn metrics_without_recorder_is_404() {
        let server = ParleyServer::new(ServerConfig::default(), None);
        let resp = get_path(server.router(), "/metrics").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn metrics_with_recorder_renders() {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let server = ParleyServer::new(ServerConfig::default(), Some(recorder.handle()));
        let resp = get_path(server.router(), "/metrics").await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn root_serves_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<p>parley</p>").unwrap();
        let server = make_server(dir.path().to_path_buf());

        let resp = get_path(server.router(), "/").await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/html"
        );
        assert_eq!(body_string(resp).await, "<p>parley</p>");
    }

    #[tokio::test]
    async fn missing_static_file_is_500() {
        let dir = tempfile::tempdir().unwrap();
        let server = make_server(dir.path().to_path_buf());

        let resp = get_path(server.router(), "/app.js").await;

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(resp).await, "Error loading app.js");
    }

    #[tokio::test]
    async fn static_rejects_post() {
        let dir = tempfile::tempdir().unwrap();
        let server = make_server(dir.path().to_path_buf());

        let resp = server
            .router()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/index.html")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn listen_binds_ephemeral_port() {
        let server = ParleyServer::new(ServerConfig::default(), None);
        let (addr, handle) = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);

        server.shutdown().shutdown();
        handle.await.unwrap();
    }
}
