// Use-case level inputs/outputs for the game loop.

use crate::domain::{Controls, InitialState, PlayerUpdate, ShipSnapshot, WorldConfig};
use tokio::sync::mpsc;

/// Runtime configuration mutations arriving over the operator channel.
#[derive(Debug, Clone, Copy)]
pub enum AdminCommand {
    SetSpawnRates { wood: u32, chest: u32, rock: u32 },
    SetSpawnIntervals { wood_ms: u64, chest_ms: u64, rock_ms: u64 },
    SetRockCounts { initial: u32, max: u32 },
    RespawnRocks,
    GetConfig,
}

/// Events flowing from connections into the world task. Drained once per tick.
#[derive(Debug, Clone)]
pub enum GameEvent {
    Join {
        conn_id: u64,
        name: String,
        ship_type: String,
        /// Outbound channel for everything this player should receive.
        events_tx: mpsc::Sender<SessionEvent>,
    },
    Leave {
        conn_id: u64,
    },
    Controls {
        conn_id: u64,
        controls: Controls,
    },
    Fire {
        conn_id: u64,
    },
    RequestShips {
        conn_id: u64,
    },
    Admin {
        conn_id: u64,
        command: AdminCommand,
        /// Reply channel; admin connections are not required to have joined.
        events_tx: mpsc::Sender<SessionEvent>,
    },
}

/// Per-connection outbound events produced by the world task.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Full snapshot sent once, right after the join is processed.
    InitialState(InitialState),
    /// Visibility-scoped per-tick delta.
    Update(PlayerUpdate),
    /// Single-ship refresh, in response to a ship request.
    ShipUpdate(ShipSnapshot),
    /// A ship left the world (its player disconnected).
    ShipRemoved { id: String },
    Killfeed(String),
    /// This player's own ship just died (and respawned).
    Died,
    /// Acknowledgement carrying the full current configuration.
    ConfigSnapshot(WorldConfig),
}

/// Ship-position batch pushed to every connection at the broadcast rate.
#[derive(Debug, Clone)]
pub struct ShipsBatch {
    pub tick: u64,
    pub ships: Vec<ShipSnapshot>,
}

/// Live counters surfaced on the health endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerStatus {
    pub players: usize,
}
