//! HTTP server setup: the transport seam around the dispatcher.
//!
//! # Responsibilities
//! - Create the axum Router with a catch-all handler
//! - Wire up middleware (tracing, timeout)
//! - Bind the server to a listener
//! - Swap in fresh dispatcher generations on re-index
//!
//! # Design Decisions
//! - The transport owns socket lifecycle only; all routing semantics
//!   live in the dispatcher
//! - Dispatcher generations are swapped atomically (`arc-swap`): requests
//!   in flight finish against the generation they started with

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::dispatch::Dispatcher;

/// Application state injected into the catch-all handler.
#[derive(Clone)]
pub struct AppState {
    dispatcher: Arc<ArcSwap<Dispatcher>>,
}

impl AppState {
    /// Replace the dispatcher generation. In-flight requests keep the one
    /// they loaded.
    pub fn swap(&self, dispatcher: Dispatcher) {
        self.dispatcher.store(Arc::new(dispatcher));
    }
}

/// HTTP server for the file-serving core.
pub struct ArborServer {
    router: Router,
    state: AppState,
    config: ServerConfig,
}

impl ArborServer {
    /// Create a new server around an indexed dispatcher.
    pub fn new(config: ServerConfig, dispatcher: Dispatcher) -> Self {
        let state = AppState {
            dispatcher: Arc::new(ArcSwap::from_pointee(dispatcher)),
        };
        let router = Self::build_router(&config, state.clone());
        Self {
            router,
            state,
            config,
        }
    }

    /// Build the axum router with all middleware layers.
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(serve_handler))
            .route("/", any(serve_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(TraceLayer::new_for_http())
    }

    /// Handle for swapping dispatcher generations in.
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Run the server, accepting connections on the given listener and
    /// consuming re-index generations from `rebuilds`.
    pub async fn run(
        self,
        listener: TcpListener,
        mut rebuilds: mpsc::UnboundedReceiver<Dispatcher>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "HTTP server starting"
        );

        // Apply fresh generations as they arrive
        let swap_state = self.state.clone();
        tokio::spawn(async move {
            while let Some(dispatcher) = rebuilds.recv().await {
                swap_state.swap(dispatcher);
                tracing::info!("dispatcher generation swapped");
            }
        });

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Catch-all handler: every request flows through the dispatcher of the
/// current generation.
async fn serve_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let dispatcher = state.dispatcher.load_full();
    dispatcher.dispatch(request, Some(addr)).await
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received");
}
