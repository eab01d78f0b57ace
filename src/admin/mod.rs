//! Health and admin HTTP surface.
//!
//! # Routes
//! ```text
//! GET /health            basic liveness + service name (always 200)
//! GET /health/live       process is up (always 200)
//! GET /health/ready      200 unless a critical dependency is down (503)
//! GET /health/detailed   full report, 503 unless everything is healthy
//! GET /admin/breakers         all breaker snapshots   (Bearer auth)
//! GET /admin/breakers/{name}  one breaker, 404 if unknown (Bearer auth)
//! ```
//!
//! # Design Decisions
//! - Admin routes exist only when `admin.enabled` is set
//! - Config is read through `ArcSwap` so hot reloads apply to criticality
//!   and the API key without rebuilding the router

pub mod auth;
pub mod handlers;

use arc_swap::ArcSwap;
use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::InterlinkConfig;
use crate::resilience::registry::BreakerRegistry;

use self::auth::admin_auth_middleware;
use self::handlers::*;

/// Shared state for health and admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub registry: Arc<BreakerRegistry>,
    pub config: Arc<ArcSwap<InterlinkConfig>>,
}

impl AdminState {
    pub fn new(registry: Arc<BreakerRegistry>, config: Arc<ArcSwap<InterlinkConfig>>) -> Self {
        Self { registry, config }
    }
}

/// Build the router with health routes and, if enabled, admin routes.
#[allow(deprecated)]
pub fn router(state: AdminState) -> Router {
    let (timeout, admin_enabled) = {
        let config = state.config.load();
        (Duration::from_secs(config.admin.request_timeout_secs), config.admin.enabled)
    };

    let mut app = Router::new()
        .route("/health", get(health))
        .route("/health/live", get(live))
        .route("/health/ready", get(ready))
        .route("/health/detailed", get(detailed));

    if admin_enabled {
        let admin = Router::new()
            .route("/admin/breakers", get(list_breakers))
            .route("/admin/breakers/{name}", get(get_breaker))
            .route_layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware));
        app = app.merge(admin);
    }

    app.with_state(state)
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
}

/// Serve the router until `shutdown` fires.
pub async fn serve(listener: TcpListener, state: AdminState, shutdown: CancellationToken) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin server starting");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("Admin server stopped");
    Ok(())
}
