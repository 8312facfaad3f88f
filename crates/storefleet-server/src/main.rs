//! storefleet-server - store provisioning backend
//!
//! REST API over the store orchestrator, with the reconciliation loop running
//! alongside the HTTP server.

use std::sync::Arc;
use storefleet_core::namespace::KubectlNamespaces;
use storefleet_core::release::HelmInstaller;
use storefleet_core::values::ValuesGenerator;
use storefleet_core::{Database, StoreOrchestrator};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod error;
mod routes;
mod state;

use config::{Config, LogFormat};

fn init_logging(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("storefleet_server=info".parse()?)
        .add_directive("storefleet_core=info".parse()?);

    match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    init_logging(config.log_format)?;

    info!("storefleet-server v{}", env!("CARGO_PKG_VERSION"));
    info!("Config loaded from {:?}", config.config_path);

    let db = Arc::new(Database::open_path(&config.database_path)?);
    info!("Database opened at {:?}", config.database_path);

    let installer = HelmInstaller::new(config.helm_config());
    if let Err(e) = installer.check() {
        warn!("{}; installs will fail until it is available", e);
    } else if let Err(e) = installer.ensure_repository().await {
        warn!("Could not prepare chart repository: {}", e);
    }

    let namespaces = KubectlNamespaces::new(config.kubectl_bin.clone());
    if let Err(e) = namespaces.check() {
        warn!("{}; namespace operations will fail until it is available", e);
    }

    let orchestrator = StoreOrchestrator::start(
        Arc::clone(&db),
        Arc::new(namespaces),
        Arc::new(installer),
        ValuesGenerator::new(config.values_config()),
        config.provisioner_config(),
    );
    info!(
        "Reconciling every {}s",
        orchestrator.config().reconcile_interval.as_secs()
    );

    let state = state::AppState::new(db, orchestrator, config.delete_timeout());
    let app = routes::create_router(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(config.listen_addr()).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down...");
    state.orchestrator.shutdown();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
