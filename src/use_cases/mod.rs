// Use cases layer: application workflows for the game server.

pub mod game;
pub mod types;

pub use types::{AdminCommand, GameEvent, ServerStatus, SessionEvent, ShipsBatch};
