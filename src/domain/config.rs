// Runtime-mutable spawn parameters, owned by the world and only changed
// through the clamped setters below. Never ambient/global state.

use crate::domain::collision::ShipCollisionModel;

/// Floor applied to spawn intervals so an admin typo cannot spin a spawner
/// every tick.
pub const MIN_SPAWN_INTERVAL_MS: u64 = 100;

#[derive(Debug, Clone, Copy)]
pub struct WorldConfig {
    pub initial_rock_count: u32,
    pub max_rock_count: u32,

    pub wood_spawn_quantity: u32,
    pub chest_spawn_quantity: u32,
    pub rock_spawn_quantity: u32,

    pub wood_spawn_interval_ms: u64,
    pub chest_spawn_interval_ms: u64,
    pub rock_spawn_interval_ms: u64,

    pub initial_wood_count: u32,
    pub max_wood_count: u32,

    pub ship_collision: ShipCollisionModel,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            initial_rock_count: 30,
            max_rock_count: 50,
            wood_spawn_quantity: 3,
            // Chests are disabled by default; flip via the admin channel.
            chest_spawn_quantity: 0,
            rock_spawn_quantity: 1,
            wood_spawn_interval_ms: 10_000,
            chest_spawn_interval_ms: 30_000,
            rock_spawn_interval_ms: 30_000,
            initial_wood_count: 20,
            max_wood_count: 60,
            ship_collision: ShipCollisionModel::Circular,
        }
    }
}

impl WorldConfig {
    /// Set per-interval spawn quantities for each spawner.
    pub fn set_spawn_quantities(&mut self, wood: u32, chest: u32, rock: u32) {
        self.wood_spawn_quantity = wood;
        self.chest_spawn_quantity = chest;
        self.rock_spawn_quantity = rock;
    }

    /// Set spawner periods. Returns true if any period changed, in which case
    /// the caller must restart the spawn timers.
    pub fn set_spawn_intervals(&mut self, wood_ms: u64, chest_ms: u64, rock_ms: u64) -> bool {
        let wood_ms = wood_ms.max(MIN_SPAWN_INTERVAL_MS);
        let chest_ms = chest_ms.max(MIN_SPAWN_INTERVAL_MS);
        let rock_ms = rock_ms.max(MIN_SPAWN_INTERVAL_MS);
        let changed = wood_ms != self.wood_spawn_interval_ms
            || chest_ms != self.chest_spawn_interval_ms
            || rock_ms != self.rock_spawn_interval_ms;
        self.wood_spawn_interval_ms = wood_ms;
        self.chest_spawn_interval_ms = chest_ms;
        self.rock_spawn_interval_ms = rock_ms;
        changed
    }

    /// Set rock population bounds. The cap is raised to the initial count when
    /// an admin sends an inconsistent pair.
    pub fn set_rock_counts(&mut self, initial: u32, max: u32) {
        self.initial_rock_count = initial;
        self.max_rock_count = max.max(initial);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intervals_are_floored_and_report_changes() {
        let mut cfg = WorldConfig::default();
        assert!(cfg.set_spawn_intervals(0, 5_000, 5_000));
        assert_eq!(cfg.wood_spawn_interval_ms, MIN_SPAWN_INTERVAL_MS);

        // Re-applying the same values is not a change.
        assert!(!cfg.set_spawn_intervals(MIN_SPAWN_INTERVAL_MS, 5_000, 5_000));
    }

    #[test]
    fn rock_cap_never_drops_below_initial() {
        let mut cfg = WorldConfig::default();
        cfg.set_rock_counts(40, 10);
        assert_eq!(cfg.initial_rock_count, 40);
        assert_eq!(cfg.max_rock_count, 40);
    }
}
