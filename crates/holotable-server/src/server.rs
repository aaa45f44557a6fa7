//! HTTP router, shared state, and server lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use holotable_store::{GroupSnapshot, SessionStore, StoreError};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use thiserror::Error;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::bus::MessageBus;
use crate::config::ServerConfig;
use crate::handlers;
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::heartbeat::{self, HeartbeatConfig};
use crate::websocket::registry::GroupRegistry;
use crate::websocket::session::run_ws_session;

/// Shared state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    bus: Arc<MessageBus>,
    store: Arc<dyn SessionStore>,
    config: Arc<ServerConfig>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

/// Error body for the JSON endpoints.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The blocking store task failed.
    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!(error = %self, "request failed");
        let body = Json(json!({ "error": self.to_string() }));
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

/// The Holotable server: router, registry, bus and shutdown token.
pub struct HolotableServer {
    config: Arc<ServerConfig>,
    bus: Arc<MessageBus>,
    store: Arc<dyn SessionStore>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

impl HolotableServer {
    /// Create a server whose bus carries the default store-backed handlers.
    pub fn new(config: ServerConfig, store: Arc<dyn SessionStore>) -> Self {
        let mut bus = MessageBus::new(Arc::new(GroupRegistry::new()));
        handlers::register_defaults(&mut bus, &store);
        Self::with_bus(config, bus, store)
    }

    /// Create a server around a pre-built bus.
    pub fn with_bus(config: ServerConfig, bus: MessageBus, store: Arc<dyn SessionStore>) -> Self {
        Self {
            config: Arc::new(config),
            bus: Arc::new(bus),
            store,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
            metrics: None,
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the axum router.
    pub fn router(&self) -> Router {
        let state = AppState {
            bus: Arc::clone(&self.bus),
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
            shutdown: Arc::clone(&self.shutdown),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws/{group_name}/{client_name}", get(ws_handler))
            .route("/groups/{group_name}/state", get(group_state_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(CorsLayer::permissive()),
            )
    }

    /// Bind and serve until the shutdown token fires.
    ///
    /// Returns the bound address and the serving task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();
        info!(%addr, "holotable server listening");

        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = serve.await {
                error!(error = %e, "server stopped with error");
            }
        });
        Ok((addr, handle))
    }

    /// Start the group heartbeat; it stops with the shutdown token.
    pub fn spawn_heartbeat(&self) -> JoinHandle<()> {
        let registry = Arc::clone(self.bus.registry());
        let config = HeartbeatConfig::from_server_config(&self.config);
        let token = self.shutdown.token();
        tokio::spawn(async move {
            let _ = heartbeat::run_heartbeat(registry, config, token).await;
        })
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Group registry.
    pub fn registry(&self) -> &Arc<GroupRegistry> {
        self.bus.registry()
    }

    /// Shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let registry = state.bus.registry();
    Json(health::health_check(
        state.start_time,
        registry.connection_count(),
        registry.group_count(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}

/// GET /ws/{group_name}/{client_name}
async fn ws_handler(
    ws: WebSocketUpgrade,
    Path((group_name, client_name)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Response {
    let token = state.shutdown.token();
    ws.max_message_size(state.config.max_message_size)
        .on_upgrade(move |socket| {
            run_ws_session(socket, group_name, client_name, state.bus, state.config, token)
        })
}

/// GET /groups/{group_name}/state
async fn group_state_handler(
    Path(group_name): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<GroupSnapshot>, ApiError> {
    let store = Arc::clone(&state.store);
    let snapshot = tokio::task::spawn_blocking(move || store.snapshot(&group_name)).await??;
    Ok(Json(snapshot))
}
