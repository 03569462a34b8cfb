//! Gateway Coordinator Binary
//!
//! Wires the coordinator with in-memory stores and runs the keep-alive loop
//! until interrupted.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin gateway-coordinator
//! ```
//!
//! # Environment Variables
//!
//! - `GATEWAY_COORDINATOR_CONFIG`: path to the YAML config (default:
//!   `config.yaml`; built-in defaults when the file does not exist)
//! - `RUST_LOG`: log filter (default: `gateway_coordinator=<logging.level>`)

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use gateway_coordinator::application::services::{BrokerGatewayFactory, Notifier};
use gateway_coordinator::application::use_cases::{
    ConnectionLifecycleManager, OrderExecutionCoordinator,
};
use gateway_coordinator::config::{Config, load_config};
use gateway_coordinator::infrastructure::broker::builtin_factory;
use gateway_coordinator::infrastructure::events::TracingEventPublisher;
use gateway_coordinator::infrastructure::persistence::{
    InMemoryOrderExecutionRepository, InMemoryProfileRepository, InMemorySetupRepository,
};
use gateway_coordinator::telemetry::init_tracing;
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Default config file path.
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Time allowed for background tasks to stop.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

type Lifecycle = ConnectionLifecycleManager<InMemoryProfileRepository>;
type Orders = OrderExecutionCoordinator<InMemoryOrderExecutionRepository, InMemorySetupRepository>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    let config = read_config()?;
    init_tracing(&config.logging).context("failed to initialise tracing")?;

    tracing::info!("Starting gateway coordinator");
    log_config(&config);

    let broker = config
        .brokers
        .default_broker_type()
        .context("invalid default broker")?;
    let factory = Arc::new(builtin_factory(&config.brokers));
    let lifecycle = create_lifecycle(&config, Arc::clone(&factory), broker);
    let orders = create_order_coordinator(factory, broker);

    match orders.reconcile_open_orders().await {
        Ok(report) => tracing::info!(
            checked = report.checked,
            updated = report.updated,
            failed = report.failed,
            "Startup reconciliation finished"
        ),
        Err(e) => tracing::warn!(error = %e, "Startup reconciliation failed"),
    }

    let shutdown = CancellationToken::new();
    let keep_alive = Lifecycle::spawn_keep_alive_loop(
        Arc::clone(&lifecycle),
        config.connection.schedule(),
        shutdown.clone(),
    );

    tracing::info!(broker = %broker, "Gateway coordinator ready");

    shutdown_signal().await;
    shutdown.cancel();

    if tokio::time::timeout(SHUTDOWN_TIMEOUT, keep_alive).await.is_err() {
        tracing::warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Keep-alive loop did not stop in time"
        );
    }

    tracing::info!("Gateway coordinator stopped");
    Ok(())
}

/// Load .env file from the current directory, if any.
fn load_dotenv() {
    // a missing .env is normal
    let _ = dotenvy::dotenv();
}

/// Read the config file, falling back to defaults when it does not exist.
fn read_config() -> anyhow::Result<Config> {
    let path = std::env::var("GATEWAY_COORDINATOR_CONFIG")
        .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    if !Path::new(&path).exists() {
        // tracing is not initialised yet
        eprintln!("Config file '{path}' not found, using defaults");
        return Ok(Config::default());
    }

    load_config(Some(&path)).with_context(|| format!("failed to load config from '{path}'"))
}

/// Log the loaded configuration.
fn log_config(config: &Config) {
    tracing::info!(
        default_broker = %config.brokers.default_broker,
        ibkr_base_url = %config.brokers.ibkr.base_url,
        keep_alive_floor_secs = config.connection.keep_alive_floor_secs,
        test_client_id_offset = config.connection.test_client_id_offset,
        "Configuration loaded"
    );
}

/// Create the connection lifecycle manager.
fn create_lifecycle(
    config: &Config,
    factory: Arc<BrokerGatewayFactory>,
    broker: gateway_coordinator::BrokerType,
) -> Arc<Lifecycle> {
    let profiles = Arc::new(InMemoryProfileRepository::new());
    Arc::new(
        ConnectionLifecycleManager::new(profiles, factory, broker)
            .with_test_client_id_offset(config.connection.test_client_id_offset),
    )
}

/// Create the order execution coordinator.
fn create_order_coordinator(
    factory: Arc<BrokerGatewayFactory>,
    broker: gateway_coordinator::BrokerType,
) -> Arc<Orders> {
    let notifier = Arc::new(Notifier::new(Arc::new(TracingEventPublisher)));
    Arc::new(OrderExecutionCoordinator::new(
        Arc::new(InMemoryOrderExecutionRepository::new()),
        Arc::new(InMemorySetupRepository::new()),
        factory,
        notifier,
        broker,
    ))
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
///
/// # Panics
///
/// Panics if signal handlers cannot be installed.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
