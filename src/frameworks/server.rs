// Framework bootstrap for the game server runtime.

use crate::frameworks::config;
use crate::interface_adapters::http::health_handler;
use crate::interface_adapters::net::{batch_serializer, ws_handler};
use crate::interface_adapters::state::AppState;
use crate::use_cases::game::world_task;
use crate::use_cases::{GameEvent, ServerStatus, ShipsBatch};

use axum::{Router, extract::ws::Utf8Bytes, routing::get};
use std::io::Result;
use std::net::SocketAddr;
use std::sync::{Arc, atomic::AtomicUsize};
use std::time::Instant;
use tokio::sync::{Notify, broadcast, mpsc, watch};

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    let address = listener.local_addr()?;
    let (state, shutdown) = build_state();

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    tracing::info!(%address, "listening");

    // Serve app and report errors rather than panicking
    let result = axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    });

    // Stop the world task once the server stops serving.
    shutdown.notify_one();
    result
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = SocketAddr::from(([127, 0, 0, 1], config::http_port()));

    // Bind TCP listener with error handling
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}

fn build_state() -> (Arc<AppState>, Arc<Notify>) {
    // Setup channels
    // input_tx/rx: all connection events go to the single world task.
    let (input_tx, input_rx) = mpsc::channel::<GameEvent>(config::INPUT_CHANNEL_CAPACITY);

    // batch_tx/rx: ship batches are broadcast to all connections.
    let (batch_tx, _batch_rx) = broadcast::channel::<ShipsBatch>(config::BATCH_BROADCAST_CAPACITY);

    // batch_bytes_tx/rx: serialized batches shared across all connections.
    let (batch_bytes_tx, _batch_bytes_rx) =
        broadcast::channel::<Utf8Bytes>(config::BATCH_BROADCAST_CAPACITY);
    let (batch_latest_tx, _batch_latest_rx) = watch::channel::<Utf8Bytes>(Utf8Bytes::from(""));

    // status_tx/rx: live counters for the health endpoint.
    let (status_tx, status_rx) = watch::channel(ServerStatus::default());

    let shutdown = Arc::new(Notify::new());

    // Spawn the game loop; it runs independently in its own task.
    tokio::spawn(world_task(
        input_rx,
        batch_tx.clone(),
        status_tx,
        config::TICK_INTERVAL,
        config::TICKS_PER_BATCH,
        shutdown.clone(),
    ));

    // Spawn the batch serializer task in the adapter layer.
    tokio::spawn(batch_serializer(
        batch_tx.subscribe(),
        batch_bytes_tx.clone(),
        batch_latest_tx.clone(),
    ));

    let state = Arc::new(AppState {
        input_tx,
        batch_tx,
        batch_bytes_tx,
        batch_latest_tx,
        status_rx,
        connections: AtomicUsize::new(0),
        started_at: Instant::now(),
    });
    (state, shutdown)
}
