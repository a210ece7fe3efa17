// Network adapter: WebSocket session handling for game clients.

pub mod client;

pub use client::{batch_serializer, ws_handler};
