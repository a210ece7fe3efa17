use crate::use_cases::{GameEvent, ServerStatus, ShipsBatch};
use axum::extract::ws::Utf8Bytes;
use std::sync::atomic::AtomicUsize;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc, watch};

pub struct AppState {
    // Connection events flowing from the network into the world task.
    pub input_tx: mpsc::Sender<GameEvent>,
    // Ship batches produced by the world task (domain structs).
    pub batch_tx: broadcast::Sender<ShipsBatch>,
    // Serialized ship batches, shared across all connections.
    pub batch_bytes_tx: broadcast::Sender<Utf8Bytes>,
    // Latest serialized batch for lag recovery.
    pub batch_latest_tx: watch::Sender<Utf8Bytes>,
    // Live player count surfaced on the health endpoint.
    pub status_rx: watch::Receiver<ServerStatus>,
    // Sockets that completed the join handshake.
    pub connections: AtomicUsize,
    pub started_at: Instant,
}
