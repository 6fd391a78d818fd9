//! HTTP server configuration and request routing.
//!
//! Requests flow through middleware in order:
//! 1. Request ID generation
//! 2. Request/response logging
//! 3. Timeout enforcement
//! 4. Per-route body limit (ingestion only)
//! 5. Handler execution
//!
//! # Graceful Shutdown
//!
//! The server stops accepting connections on CTRL+C or SIGTERM and waits for
//! in-flight requests before returning.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    extract::{DefaultBodyLimit, Request},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use hookbin_core::{Clock, EventStore, RealClock};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::handlers::{self, MAX_PAYLOAD_SIZE};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Event persistence backend.
    pub store: Arc<dyn EventStore>,
    /// Time source for `received_at` and purge cutoffs.
    pub clock: Arc<dyn Clock>,
    /// Upper bound on a single request's handling time.
    pub request_timeout: Duration,
}

impl AppState {
    /// Creates state over `store` using the system clock.
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store, clock: Arc::new(RealClock::new()), request_timeout: DEFAULT_REQUEST_TIMEOUT }
    }

    /// Replaces the clock, typically with a `TestClock`.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("backend", &self.store.backend_name())
            .field("clock", &self.clock)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Creates the Axum router with all routes and middleware.
///
/// Every route lives under `/api`.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
///
/// use hookbin_api::{create_router, AppState};
/// use hookbin_core::MemoryEventStore;
///
/// let app = create_router(AppState::new(Arc::new(MemoryEventStore::new())));
/// // Serve the app...
/// ```
pub fn create_router(state: AppState) -> Router {
    let probe_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/ping", get(handlers::ping))
        .route("/ready", get(handlers::readiness_check));

    let event_routes = Router::new()
        .route(
            "/events",
            post(handlers::ingest_event)
                .layer(DefaultBodyLimit::max(MAX_PAYLOAD_SIZE))
                .get(handlers::list_events),
        )
        .route("/events/{id}", get(handlers::get_event))
        .route("/events/{id}/preview", get(handlers::preview_event))
        .route("/stats", get(handlers::stats))
        .route("/admin/purge", post(handlers::purge_events));

    let timeout = state.request_timeout;

    Router::new()
        .nest("/api", probe_routes.merge(event_routes))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(inject_request_id))
        .with_state(state)
}

/// Adds an `X-Request-Id` header to every response.
async fn inject_request_id(mut req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    req.extensions_mut().insert(request_id.clone());

    let mut response = next.run(req).await;

    if let Ok(header_value) = request_id.parse() {
        response.headers_mut().insert("X-Request-Id", header_value);
    }

    response
}

/// Starts the HTTP server with graceful shutdown support.
///
/// # Errors
///
/// Returns `std::io::Error` if the address cannot be bound or the
/// connection loop fails.
pub async fn start_server(state: AppState, addr: SocketAddr) -> Result<(), std::io::Error> {
    let backend = state.store.backend_name();
    let app = create_router(state);

    info!(backend, "Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("HTTP server listening on {}", actual_addr);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    info!("HTTP server stopped gracefully");
    Ok(())
}

/// Waits for CTRL+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received CTRL+C, starting graceful shutdown");
        },
        () = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }

    warn!("Draining in-flight requests");
}
