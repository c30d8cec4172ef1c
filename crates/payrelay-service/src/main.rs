//! Payrelay Service - HTTP relay in front of the payment processor.
//!
//! This is the main entry point for the payrelay service.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use payrelay_service::{create_router, AppState, ServiceConfig};
use payrelay_store::{RocksStore, Store};

/// How often the processed-event ledger is pruned.
const LEDGER_PRUNE_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,payrelay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Payrelay Service");

    // Load configuration from environment
    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        data_dir = %config.data_dir,
        stripe_configured = %config.stripe_api_key.is_some(),
        webhook_secret_configured = %config.stripe_webhook_secret.is_some(),
        "Service configuration loaded"
    );

    // Initialize RocksDB store
    tracing::info!(path = %config.data_dir, "Opening RocksDB store");
    let store = Arc::new(RocksStore::open(&config.data_dir)?);

    // Periodically prune the processed-event ledger
    spawn_ledger_prune(Arc::clone(&store), config.event_retention_days);

    // Build app state
    let state = AppState::new(store, config.clone());

    // Create the router
    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    // Start HTTP server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Background task dropping ledger entries past the retention window.
fn spawn_ledger_prune(store: Arc<RocksStore>, retention_days: i64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(LEDGER_PRUNE_INTERVAL);
        loop {
            interval.tick().await;
            let cutoff = chrono::Utc::now() - chrono::Duration::days(retention_days);
            match store.prune_processed_events(cutoff) {
                Ok(0) => {}
                Ok(removed) => {
                    tracing::info!(removed = %removed, "Pruned processed-event ledger");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Ledger prune failed");
                }
            }
        }
    });
}
