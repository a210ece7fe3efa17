use std::{env, time::Duration};

// Runtime/server constants (not gameplay tuning).

pub fn http_port() -> u16 {
    env::var("GAME_SERVER_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3001)
}

pub const INPUT_CHANNEL_CAPACITY: usize = 1024;
pub const BATCH_BROADCAST_CAPACITY: usize = 128;

// 60 Hz simulation; ship batches go out every third tick (~20 Hz).
pub const TICK_INTERVAL: Duration = Duration::from_millis(1000 / 60);
pub const TICKS_PER_BATCH: u64 = 3;
