//! interlink sidecar
//!
//! Hosts the shared breaker registry for a service and exposes its state.
//!
//! ```text
//!   interlink.toml ──▶ config::loader ──▶ BreakerRegistry ◀── ConfigWatcher (hot reload)
//!                                              │
//!                                              ▼
//!                                   health report / admin API ──▶ /health*, /admin/*
//!                                              │
//!                                   TelemetryObserver ──▶ tracing + Prometheus
//! ```

use arc_swap::ArcSwap;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

use interlink::admin::{self, AdminState};
use interlink::config::{load_config, watcher, ConfigWatcher, InterlinkConfig};
use interlink::lifecycle::{wait_for_signal, Shutdown};
use interlink::observability::{logging, metrics};
use interlink::resilience::BreakerRegistry;

#[derive(Parser)]
#[command(name = "interlink")]
#[command(about = "Circuit breaker registry and health surface for inter-service calls", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => InterlinkConfig::default(),
    };

    logging::init(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "interlink starting");

    tracing::info!(
        service = %config.service_name,
        dependencies = config.dependencies.len(),
        admin_enabled = config.admin.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let shutdown = Shutdown::new();
    let registry = Arc::new(BreakerRegistry::from_config(&config));
    let bind_address = config.admin.bind_address.clone();
    let shared = Arc::new(ArcSwap::from_pointee(config));

    // Hot reload; the watcher handle must outlive the update loop
    let _watcher = match &args.config {
        Some(path) => {
            let (config_watcher, updates) = ConfigWatcher::new(path);
            tokio::spawn(watcher::apply_updates(
                updates,
                registry.clone(),
                shared.clone(),
                shutdown.subscribe(),
            ));
            match config_watcher.run() {
                Ok(handle) => Some(handle),
                Err(e) => {
                    tracing::warn!(error = %e, "Config hot reload disabled");
                    None
                }
            }
        }
        None => None,
    };

    let listener = TcpListener::bind(&bind_address).await?;
    let server = tokio::spawn(admin::serve(
        listener,
        AdminState::new(registry, shared),
        shutdown.subscribe(),
    ));

    wait_for_signal().await;
    shutdown.trigger();
    server.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
