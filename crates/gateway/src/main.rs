//! Gateway service entry point.

use anyhow::Result;
use gateway::{ws_server, ClientRegistry, RelayConfig, StatusRelay};
use nats_client::NatsClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

/// Clients silent for this long are swept out.
const STALE_CLIENT_TIMEOUT_MS: i64 = 120_000;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("=========================================");
    info!("        GATEWAY SERVICE STARTING        ");
    info!("=========================================");

    // Load configuration
    let nats_url =
        std::env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string());
    let executor_url =
        std::env::var("EXECUTOR_URL").unwrap_or_else(|_| "http://localhost:8084".to_string());
    let port: u16 = std::env::var("GATEWAY_PORT")
        .unwrap_or_else(|_| "8085".to_string())
        .parse()?;

    info!("Configuration:");
    info!("  NATS_URL: {}", nats_url);
    info!("  EXECUTOR_URL: {}", executor_url);
    info!("  GATEWAY_PORT: {}", port);

    // Connect to NATS for the status channel
    info!("Connecting to NATS...");
    let nats_client = Arc::new(NatsClient::connect(&nats_url).await?);
    info!("Connected to NATS at {}", nats_url);

    // Client registry and relay
    let registry = Arc::new(ClientRegistry::new());
    let relay = Arc::new(StatusRelay::new(
        registry.clone(),
        nats_client,
        RelayConfig {
            executor_url,
            ..Default::default()
        },
    ));

    let (relay_shutdown_tx, relay_shutdown_rx) = mpsc::channel(1);
    let relay_handle = tokio::spawn(relay.clone().run(relay_shutdown_rx));

    // Periodic stale-client sweep
    let sweep_registry = registry.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            sweep_registry.cleanup_stale_clients(STALE_CLIENT_TIMEOUT_MS);
        }
    });

    // WebSocket server
    let state = Arc::new(ws_server::AppState { registry, relay });
    let app = ws_server::create_router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;

    info!("=========================================");
    info!("  Gateway service ready on port {}    ", port);
    info!("=========================================");
    info!("Endpoints:");
    info!("  GET /ws       - WebSocket subscriptions");
    info!("  GET /health   - Health check");
    info!("=========================================");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    let _ = relay_shutdown_tx.send(()).await;
    let _ = relay_handle.await;

    Ok(())
}
