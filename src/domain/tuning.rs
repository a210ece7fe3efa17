/// Gameplay tuning for player-controlled ships.
///
/// Keep this separate from runtime/server configuration (tick rates, buffer sizes, etc.)
/// and from the runtime-mutable spawn parameters in [`crate::domain::config::WorldConfig`].

#[derive(Debug, Clone, Copy)]
pub struct ShipTuning {
    /// Collision radius at 0 hp, in world units.
    pub base_size: f32,

    /// Upper bound on the hp-derived collision radius.
    pub size_cap: f32,

    /// Maximum hp a ship can heal up to.
    pub max_hp: i32,

    /// Forward speed in world units per second.
    pub move_speed: f32,

    /// Rotation speed in radians per second.
    pub turn_rate: f32,

    /// Hull length as a multiple of `size` (oriented-rectangle model).
    pub hull_length_factor: f32,

    /// Hull beam as a multiple of `size` (oriented-rectangle model).
    pub hull_beam_factor: f32,

    /// Radius scale for ship-vs-ship blocking, below 1.0 so crowds don't
    /// false-positive into a deadlock.
    pub ship_overlap_scale: f32,

    /// Milliseconds between cannon volleys.
    pub cannon_cooldown_ms: f32,

    /// Visibility distance at base size.
    pub base_viewport_radius: f32,

    /// Extra visibility distance per unit of ship size.
    pub viewport_size_factor: f32,

    /// Multiplier applied to the viewport radius for the initial snapshot.
    pub initial_viewport_scale: f32,
}

impl Default for ShipTuning {
    fn default() -> Self {
        Self {
            base_size: 10.0,
            size_cap: 70.0,
            max_hp: 100,
            move_speed: 150.0,
            turn_rate: 2.5,
            hull_length_factor: 2.5,
            hull_beam_factor: 1.5,
            ship_overlap_scale: 0.8,
            cannon_cooldown_ms: 500.0,
            base_viewport_radius: 600.0,
            viewport_size_factor: 10.0,
            initial_viewport_scale: 1.5,
        }
    }
}

/// Gameplay tuning for cannon projectiles.
#[derive(Debug, Clone, Copy)]
pub struct ProjectileTuning {
    /// Projectile speed in world units per second.
    pub speed: f32,

    /// World-space collision radius.
    pub size: f32,

    /// Damage applied per hit.
    pub damage: i32,

    /// Lifetime in milliseconds before the projectile despawns.
    pub max_lifetime_ms: f32,
}

impl Default for ProjectileTuning {
    fn default() -> Self {
        Self {
            speed: 400.0,
            size: 5.0,
            damage: 1,
            max_lifetime_ms: 2000.0,
        }
    }
}

/// Fixed world-level tuning: bounds, clearances, resource shapes.
#[derive(Debug, Clone, Copy)]
pub struct WorldTuning {
    /// World width in world units.
    pub width: f32,

    /// World height in world units.
    pub height: f32,

    /// Inset from the world edge for randomized spawn positions.
    pub spawn_margin: f32,

    /// Clearance required around a player spawn/respawn position.
    pub player_safe_radius: f32,

    /// Clearance required around a periodic resource spawn.
    pub resource_safe_radius: f32,

    /// Clearance required around a periodic rock spawn.
    pub rock_safe_radius: f32,

    /// Random placement attempts before falling back to center jitter.
    pub spawn_attempts: u32,

    /// Jitter radius around world center for the fallback position.
    pub center_jitter: f32,

    /// Collision radius of a wood resource.
    pub wood_size: f32,

    /// Collision radius of a chest resource.
    pub chest_size: f32,

    /// Hp restored per picked-up wood unit.
    pub wood_value: i32,

    /// Nominal value carried by a chest.
    pub chest_value: i32,

    /// Minimum hp required to benefit from a chest's cannon upgrade.
    pub chest_hp_gate: i32,

    /// Scatter radius for wood dropped on a ship's death.
    pub loot_scatter_radius: f32,
}

impl Default for WorldTuning {
    fn default() -> Self {
        Self {
            width: 5000.0,
            height: 5000.0,
            spawn_margin: 100.0,
            player_safe_radius: 100.0,
            resource_safe_radius: 20.0,
            rock_safe_radius: 100.0,
            spawn_attempts: 10,
            center_jitter: 50.0,
            wood_size: 10.0,
            chest_size: 12.0,
            wood_value: 1,
            chest_value: 1,
            chest_hp_gate: 6,
            loot_scatter_radius: 40.0,
        }
    }
}
