// Plain HTTP surface: the health endpoint.

use crate::interface_adapters::state::AppState;
use axum::{Json, extract::State};
use std::sync::{Arc, atomic::Ordering};

#[derive(Debug, serde::Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    // Players currently spawned in the world.
    pub players: usize,
    // Sockets that completed the join handshake.
    pub connections: usize,
    pub uptime_seconds: u64,
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        players: state.status_rx.borrow().players,
        connections: state.connections.load(Ordering::Relaxed),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}
