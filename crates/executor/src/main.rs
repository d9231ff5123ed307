//! Executor service entry point.
//!
//! Hosts the order API, the worker pool, and the janitor in one process;
//! the status channel decouples it from any number of gateway processes.

use anyhow::Result;
use common::subjects::{JOB_CONSUMER, JOB_STREAM, JOB_SUBJECT};
use common::TokenRegistry;
use dex::venues::{MeteoraVenue, RaydiumVenue};
use dex::{DexRouter, QuoteAggregator, Venue};
use executor::{api, Janitor, JanitorConfig, OrderStore, RpcSettlement, WorkerConfig, WorkerPool};
use nats_client::{JobQueueConfig, NatsClient};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("=========================================");
    info!("       EXECUTOR SERVICE STARTING        ");
    info!("=========================================");

    // Load configuration
    let nats_url =
        std::env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".to_string());
    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    let rpc_url = std::env::var("CHAIN_RPC_URL")
        .unwrap_or_else(|_| "https://api.mainnet-beta.solana.com".to_string());
    let raydium_api = std::env::var("RAYDIUM_API_URL")
        .unwrap_or_else(|_| "https://api-v3.raydium.io".to_string());
    let meteora_api = std::env::var("METEORA_API_URL")
        .unwrap_or_else(|_| "https://amm.meteora.ag".to_string());
    let port: u16 = std::env::var("EXECUTOR_PORT")
        .unwrap_or_else(|_| "8084".to_string())
        .parse()?;
    let concurrency: usize = std::env::var("WORKER_CONCURRENCY")
        .unwrap_or_else(|_| "10".to_string())
        .parse()?;
    let janitor_timeout: u64 = std::env::var("JANITOR_TIMEOUT_SECS")
        .unwrap_or_else(|_| "600".to_string())
        .parse()?;

    info!("Configuration:");
    info!("  NATS_URL: {}", nats_url);
    info!("  REDIS_URL: {}", redis_url);
    info!("  EXECUTOR_PORT: {}", port);
    info!("  WORKER_CONCURRENCY: {}", concurrency);

    // Connect to NATS (job queue + status channel)
    info!("Connecting to NATS...");
    let nats_client = NatsClient::connect(&nats_url).await?;
    info!("Connected to NATS at {}", nats_url);

    // Order store
    let store = OrderStore::new(&redis_url)?;

    // Venue adapters, in priority order (tie-break order for routing)
    let registry = TokenRegistry::mainnet();
    let venues: Vec<Arc<dyn Venue>> = vec![
        Arc::new(RaydiumVenue::new(raydium_api)),
        Arc::new(MeteoraVenue::new(meteora_api)),
    ];
    let aggregator = QuoteAggregator::new(venues);
    let router = Arc::new(DexRouter::new(registry.clone(), aggregator));
    info!("Registered venues: {:?}", router.venues());

    // Settlement client
    let settlement = Arc::new(RpcSettlement::new(rpc_url));

    // Worker pool
    let queue_config = JobQueueConfig::new(JOB_STREAM, JOB_SUBJECT, JOB_CONSUMER);
    let worker_config = WorkerConfig {
        concurrency,
        ..Default::default()
    };
    let pool = Arc::new(WorkerPool::new(
        store.clone(),
        nats_client.clone(),
        router.clone(),
        settlement,
        queue_config,
        worker_config,
    ));

    let (pool_shutdown_tx, pool_shutdown_rx) = mpsc::channel(1);
    let pool_handle = tokio::spawn(pool.clone().run(pool_shutdown_rx));

    // Janitor sweep for stuck orders
    let janitor = Janitor::new(
        store.clone(),
        nats_client.clone(),
        JanitorConfig {
            stuck_timeout: Duration::from_secs(janitor_timeout),
            ..Default::default()
        },
    );
    let (janitor_shutdown_tx, janitor_shutdown_rx) = mpsc::channel(1);
    let janitor_handle = tokio::spawn(janitor.run(janitor_shutdown_rx));

    // HTTP API
    let state = Arc::new(api::AppState {
        store,
        nats: nats_client,
        registry,
        venues: router.venues(),
    });
    let app = api::create_router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;

    info!("=========================================");
    info!("  Executor service ready on port {}   ", port);
    info!("=========================================");
    info!("Endpoints:");
    info!("  POST /orders                - Submit swap order");
    info!("  GET /orders/:id             - Order record");
    info!("  GET /users/:id/orders       - Latest orders for user");
    info!("  GET /health                 - Health check");
    info!("=========================================");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    info!("Shutting down workers...");
    let _ = pool_shutdown_tx.send(()).await;
    let _ = janitor_shutdown_tx.send(()).await;
    let _ = pool_handle.await;
    let _ = janitor_handle.await;

    Ok(())
}
