// The authoritative world: entity collections, spawning, the fixed-order tick
// update, and per-player visibility/delta computation.
//
// All mutation flows through the public methods here; the world is owned by a
// single task, so there is no locking.

use crate::domain::collision::{self, ShipCollisionModel};
use crate::domain::config::WorldConfig;
use crate::domain::entity::{
    Controls, EntitySnapshot, Projectile, ProjectileSnapshot, Resource, ResourceKind,
    ResourceSnapshot, Rock, RockSnapshot, Ship, ShipSnapshot, Vec2, VisibleCache, normalize_angle,
};
use crate::domain::tuning::{ProjectileTuning, ShipTuning, WorldTuning};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::f32::consts::FRAC_PI_2;
use tracing::{debug, info};

/// Side effects of a tick that the session layer must relay to clients.
#[derive(Debug, Clone)]
pub enum WorldEvent {
    /// Human-readable kill-feed line for everyone.
    Killfeed(String),
    /// The named ship just died (it is already reset and respawned).
    PlayerDied { ship_id: String },
}

/// One entry in a per-player delta list.
#[derive(Debug, Clone)]
pub enum EntityDelta {
    Snapshot(EntitySnapshot),
    Removed { id: String },
}

/// Full initial snapshot for a newly joined player.
#[derive(Debug, Clone)]
pub struct InitialState {
    pub player: ShipSnapshot,
    pub ships: Vec<ShipSnapshot>,
    pub resources: Vec<ResourceSnapshot>,
    pub rocks: Vec<RockSnapshot>,
    pub projectiles: Vec<ProjectileSnapshot>,
}

/// Per-tick visibility-scoped update for one player.
#[derive(Debug, Clone)]
pub struct PlayerUpdate {
    pub player: ShipSnapshot,
    pub entities: Vec<EntityDelta>,
    pub projectiles: Vec<ProjectileSnapshot>,
}

pub struct World {
    width: f32,
    height: f32,
    config: WorldConfig,
    ship_tuning: ShipTuning,
    projectile_tuning: ProjectileTuning,
    tuning: WorldTuning,

    ships: HashMap<String, Ship>,
    resources: HashMap<String, Resource>,
    rocks: HashMap<String, Rock>,
    projectiles: HashMap<String, Projectile>,

    next_id: u64,
    rng: SmallRng,

    // Spawner accumulators in ms; reset when an interval changes.
    wood_timer_ms: f32,
    chest_timer_ms: f32,
    rock_timer_ms: f32,

    events: Vec<WorldEvent>,
}

impl World {
    pub fn new(config: WorldConfig) -> Self {
        Self::with_rng(config, SmallRng::from_entropy())
    }

    /// Deterministic construction for tests.
    pub fn with_seed(config: WorldConfig, seed: u64) -> Self {
        Self::with_rng(config, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(config: WorldConfig, rng: SmallRng) -> Self {
        let tuning = WorldTuning::default();
        let mut world = Self {
            width: tuning.width,
            height: tuning.height,
            config,
            ship_tuning: ShipTuning::default(),
            projectile_tuning: ProjectileTuning::default(),
            tuning,
            ships: HashMap::new(),
            resources: HashMap::new(),
            rocks: HashMap::new(),
            projectiles: HashMap::new(),
            next_id: 0,
            rng,
            wood_timer_ms: 0.0,
            chest_timer_ms: 0.0,
            rock_timer_ms: 0.0,
            events: Vec::new(),
        };
        world.bootstrap();
        world
    }

    fn bootstrap(&mut self) {
        for _ in 0..self.config.initial_rock_count {
            let pos = self.random_point();
            self.spawn_rock_at(pos);
        }
        for _ in 0..self.config.initial_wood_count {
            let pos = self.random_spawn_position(self.tuning.resource_safe_radius);
            self.spawn_resource_at(pos, ResourceKind::Wood);
        }
        info!(
            rocks = self.rocks.len(),
            resources = self.resources.len(),
            "world bootstrapped"
        );
    }

    fn mint_id(&mut self, prefix: char) -> String {
        self.next_id += 1;
        format!("{prefix}{}", self.next_id)
    }

    fn random_point(&mut self) -> Vec2 {
        let m = self.tuning.spawn_margin;
        Vec2::new(
            self.rng.gen_range(m..self.width - m),
            self.rng.gen_range(m..self.height - m),
        )
    }

    /// A position is safe when its clearance to every rock and ship exceeds
    /// `safe_radius` plus that entity's own size.
    fn is_safe(&self, pos: Vec2, safe_radius: f32) -> bool {
        let clear_of = |other: Vec2, other_size: f32| pos.distance(other) > safe_radius + other_size;
        self.rocks.values().all(|r| clear_of(r.pos, r.size))
            && self.ships.values().all(|s| clear_of(s.pos, s.size))
    }

    /// Random placement honoring the clearance rule, falling back to a small
    /// jitter around world center when the map is too dense. The fallback
    /// guarantees termination at the cost of the safety guarantee.
    pub fn random_spawn_position(&mut self, safe_radius: f32) -> Vec2 {
        for _ in 0..self.tuning.spawn_attempts {
            let candidate = self.random_point();
            if self.is_safe(candidate, safe_radius) {
                return candidate;
            }
        }
        let j = self.tuning.center_jitter;
        Vec2::new(
            self.width / 2.0 + self.rng.gen_range(-j..j),
            self.height / 2.0 + self.rng.gen_range(-j..j),
        )
    }

    fn spawn_rock_at(&mut self, pos: Vec2) {
        let id = self.mint_id('k');
        let size: f32 = self.rng.gen_range(20.0..50.0);
        let hp = (size / 10.0).floor() as i32;
        self.rocks.insert(
            id.clone(),
            Rock {
                id,
                pos,
                size,
                hp,
                max_hp: hp,
            },
        );
    }

    fn spawn_resource_at(&mut self, pos: Vec2, kind: ResourceKind) {
        let id = self.mint_id('r');
        let (size, value) = match kind {
            ResourceKind::Wood => (self.tuning.wood_size, self.tuning.wood_value),
            ResourceKind::Chest => (self.tuning.chest_size, self.tuning.chest_value),
        };
        self.resources.insert(
            id.clone(),
            Resource {
                id,
                pos,
                size,
                kind,
                value,
            },
        );
    }

    // ---- Player lifecycle -------------------------------------------------

    pub fn spawn_player(&mut self, name: String, ship_type: String) -> ShipSnapshot {
        let pos = self.random_spawn_position(self.tuning.player_safe_radius);
        let id = self.mint_id('s');
        let ship = Ship::new(id.clone(), name, ship_type, pos, &self.ship_tuning);
        let snapshot = ShipSnapshot::from(&ship);
        self.ships.insert(id, ship);
        snapshot
    }

    /// Removes a disconnected player and scrubs their id from every remaining
    /// player's last-visible cache so the per-tick diff cannot emit a stale
    /// removal after the session layer has already announced it.
    pub fn remove_player(&mut self, ship_id: &str) -> bool {
        if self.ships.remove(ship_id).is_none() {
            return false;
        }
        for ship in self.ships.values_mut() {
            ship.last_visible.ids.remove(ship_id);
        }
        true
    }

    pub fn set_controls(&mut self, ship_id: &str, controls: Controls) {
        // Unknown ids are ignored: the message may race a disconnect.
        if let Some(ship) = self.ships.get_mut(ship_id) {
            ship.controls = controls;
        }
    }

    pub fn player_count(&self) -> usize {
        self.ships.len()
    }

    pub fn ship_snapshots(&self) -> Vec<ShipSnapshot> {
        self.ships.values().map(ShipSnapshot::from).collect()
    }

    // ---- Cannon fire ------------------------------------------------------

    /// Attempt a broadside volley. Fails silently if the ship is unknown, on
    /// cooldown, or under-gunned; returns whether projectiles were spawned.
    pub fn fire(&mut self, ship_id: &str) -> bool {
        let Some(ship) = self.ships.get(ship_id) else {
            return false;
        };
        if ship.cannon_cooldown_ms > 0.0 || ship.cannons < 2 {
            return false;
        }

        let per_side = ship.cannons / 2;
        let pos = ship.pos;
        let angle = ship.angle;
        let length = ship.hull_length(&self.ship_tuning);
        let beam = ship.hull_beam(&self.ship_tuning);
        let owner_id = ship.id.clone();
        let (sin, cos) = angle.sin_cos();
        let forward = Vec2::new(cos, sin);

        let mut spawned = Vec::with_capacity(per_side as usize * 2);
        for side in [-1.0f32, 1.0] {
            // Perpendicular to the hull, pointing out of the firing side.
            let side_angle = normalize_angle(angle + side * FRAC_PI_2);
            let side_dir = Vec2::new(side_angle.cos(), side_angle.sin());
            for i in 0..per_side {
                // Even spacing along the middle 80% of the hull.
                let frac = (i + 1) as f32 / (per_side + 1) as f32 - 0.5;
                let along = frac * 0.8 * length;
                let muzzle = Vec2::new(
                    pos.x + forward.x * along + side_dir.x * 0.6 * beam,
                    pos.y + forward.y * along + side_dir.y * 0.6 * beam,
                );
                spawned.push((muzzle, side_angle));
            }
        }

        for (muzzle, side_angle) in spawned {
            let id = self.mint_id('p');
            self.projectiles.insert(
                id.clone(),
                Projectile {
                    id,
                    pos: muzzle,
                    size: self.projectile_tuning.size,
                    angle: side_angle,
                    speed: self.projectile_tuning.speed,
                    damage: self.projectile_tuning.damage,
                    owner_id: owner_id.clone(),
                    age_ms: 0.0,
                },
            );
        }

        if let Some(ship) = self.ships.get_mut(ship_id) {
            ship.cannon_cooldown_ms = self.ship_tuning.cannon_cooldown_ms;
        }
        true
    }

    // ---- Tick update ------------------------------------------------------

    /// Advance the simulation by `dt_ms`. Fixed order: ship movement with
    /// revert-on-collision, projectile flight and damage, resource pickup,
    /// cooldowns, then the periodic spawners.
    pub fn update(&mut self, dt_ms: f32) -> Vec<WorldEvent> {
        let dt_s = dt_ms / 1000.0;

        self.move_ships(dt_s);
        self.advance_projectiles(dt_s, dt_ms);
        self.resolve_pickups();

        for ship in self.ships.values_mut() {
            ship.cannon_cooldown_ms = (ship.cannon_cooldown_ms - dt_ms).max(0.0);
        }

        self.run_spawners(dt_ms);

        std::mem::take(&mut self.events)
    }

    fn move_ships(&mut self, dt_s: f32) {
        let ship_ids: Vec<String> = self.ships.keys().cloned().collect();
        for id in &ship_ids {
            let Some(ship) = self.ships.get(id) else {
                continue;
            };

            let mut angle = ship.angle;
            if ship.controls.rotate_left {
                angle -= self.ship_tuning.turn_rate * dt_s;
            }
            if ship.controls.rotate_right {
                angle += self.ship_tuning.turn_rate * dt_s;
            }
            angle = normalize_angle(angle);

            let mut candidate = ship.pos;
            if ship.controls.move_forward {
                candidate.x += angle.cos() * self.ship_tuning.move_speed * dt_s;
                candidate.y += angle.sin() * self.ship_tuning.move_speed * dt_s;
            }
            // Ships cannot leave the map; the clamp is inset by their own size.
            let size = ship.size;
            candidate.x = candidate.x.clamp(size, self.width - size);
            candidate.y = candidate.y.clamp(size, self.height - size);

            let blocked = self.ship_blocked_at(id, candidate, angle);

            if let Some(ship) = self.ships.get_mut(id) {
                // Rotation always applies; the tick's translation is reverted
                // wholesale on contact (non-penetration, not sliding).
                ship.angle = angle;
                if !blocked {
                    ship.pos = candidate;
                }
            }
        }
    }

    fn ship_blocked_at(&self, ship_id: &str, candidate: Vec2, candidate_angle: f32) -> bool {
        let Some(ship) = self.ships.get(ship_id) else {
            return false;
        };

        let hits_rock = self.rocks.values().any(|rock| match self.config.ship_collision {
            ShipCollisionModel::Circular => {
                collision::circles_overlap(candidate, ship.size, rock.pos, rock.size)
            }
            ShipCollisionModel::OrientedRect => collision::hull_overlaps_circle(
                candidate,
                candidate_angle,
                ship.hull_length(&self.ship_tuning),
                ship.hull_beam(&self.ship_tuning),
                rock.pos,
                rock.size,
            ),
        });
        if hits_rock {
            return true;
        }

        // Ship-vs-ship always uses the lenient circular check.
        self.ships.values().any(|other| {
            other.id != ship.id
                && collision::ships_overlap(
                    candidate,
                    ship.size,
                    other.pos,
                    other.size,
                    self.ship_tuning.ship_overlap_scale,
                )
        })
    }

    fn advance_projectiles(&mut self, dt_s: f32, dt_ms: f32) {
        // Take the collection so damage/death handling below can borrow the
        // rest of the world freely.
        let mut projectiles = std::mem::take(&mut self.projectiles);
        let mut survivors = HashMap::with_capacity(projectiles.len());

        for (id, mut p) in projectiles.drain() {
            p.pos.x += p.angle.cos() * p.speed * dt_s;
            p.pos.y += p.angle.sin() * p.speed * dt_s;
            p.age_ms += dt_ms;

            if p.age_ms >= self.projectile_tuning.max_lifetime_ms {
                continue;
            }
            if p.pos.x < 0.0 || p.pos.x > self.width || p.pos.y < 0.0 || p.pos.y > self.height {
                continue;
            }

            // At most one resolved collision; rocks are checked first.
            if let Some(rock_id) = self
                .rocks
                .values()
                .find(|r| collision::circles_overlap(p.pos, p.size, r.pos, r.size))
                .map(|r| r.id.clone())
            {
                let destroyed = match self.rocks.get_mut(&rock_id) {
                    Some(rock) => {
                        rock.hp -= p.damage;
                        rock.hp <= 0
                    }
                    None => false,
                };
                if destroyed {
                    self.rocks.remove(&rock_id);
                    debug!(rock_id = %rock_id, "rock destroyed");
                }
                continue;
            }

            if let Some(victim_id) = self
                .ships
                .values()
                .find(|s| {
                    s.id != p.owner_id && collision::circles_overlap(p.pos, p.size, s.pos, s.size)
                })
                .map(|s| s.id.clone())
            {
                self.hit_ship(&victim_id, &p.owner_id, p.damage);
                continue;
            }

            survivors.insert(id, p);
        }

        self.projectiles = survivors;
    }

    fn hit_ship(&mut self, victim_id: &str, owner_id: &str, damage: i32) {
        let Some(victim) = self.ships.get_mut(victim_id) else {
            return;
        };
        let hp_before = victim.hp;
        let lethal = victim.apply_damage(damage, &self.ship_tuning);
        if lethal {
            self.handle_death(victim_id, owner_id, hp_before);
        }
    }

    /// Death is a reset, not a removal: announce, drop loot, then respawn the
    /// same ship at a fresh safe position with base stats.
    fn handle_death(&mut self, victim_id: &str, killer_id: &str, hp_before: i32) {
        let victim_name = match self.ships.get(victim_id) {
            Some(s) => s.name.clone(),
            None => return,
        };
        let feed = match self.ships.get(killer_id) {
            Some(killer) => format!("{} sunk {}", killer.name, victim_name),
            None => format!("{victim_name}: ship destroyed"),
        };
        info!(victim_id, killer_id, "ship sunk");

        // Loot: half the victim's pre-hit hp as wood, scattered nearby. Never chests.
        let death_pos = self.ships.get(victim_id).map(|s| s.pos).unwrap_or_default();
        let scatter = self.tuning.loot_scatter_radius;
        for _ in 0..(hp_before / 2) {
            let pos = Vec2::new(
                death_pos.x + self.rng.gen_range(-scatter..scatter),
                death_pos.y + self.rng.gen_range(-scatter..scatter),
            );
            self.spawn_resource_at(pos, ResourceKind::Wood);
        }

        let spawn = self.random_spawn_position(self.tuning.player_safe_radius);
        if let Some(victim) = self.ships.get_mut(victim_id) {
            victim.reset_after_death(spawn, &self.ship_tuning);
        }

        self.events.push(WorldEvent::Killfeed(feed));
        self.events.push(WorldEvent::PlayerDied {
            ship_id: victim_id.to_string(),
        });
    }

    fn resolve_pickups(&mut self) {
        let mut picked: Vec<(String, String)> = Vec::new();
        for ship in self.ships.values() {
            for resource in self.resources.values() {
                let overlaps = match self.config.ship_collision {
                    ShipCollisionModel::Circular => {
                        collision::circles_overlap(ship.pos, ship.size, resource.pos, resource.size)
                    }
                    ShipCollisionModel::OrientedRect => collision::hull_overlaps_circle(
                        ship.pos,
                        ship.angle,
                        ship.hull_length(&self.ship_tuning),
                        ship.hull_beam(&self.ship_tuning),
                        resource.pos,
                        resource.size,
                    ),
                };
                if overlaps {
                    picked.push((resource.id.clone(), ship.id.clone()));
                }
            }
        }

        for (resource_id, ship_id) in picked {
            // First ship wins; later pairs for the same resource are no-ops.
            let Some(resource) = self.resources.remove(&resource_id) else {
                continue;
            };
            let Some(ship) = self.ships.get_mut(&ship_id) else {
                continue;
            };
            match resource.kind {
                ResourceKind::Wood => ship.add_hp(resource.value, &self.ship_tuning),
                ResourceKind::Chest => {
                    // The chest is consumed even when the hp gate blocks the
                    // upgrade; preserved source behavior.
                    if ship.hp >= self.tuning.chest_hp_gate {
                        ship.cannons += 2;
                    }
                }
            }
        }
    }

    fn run_spawners(&mut self, dt_ms: f32) {
        let has_players = !self.ships.is_empty();

        self.wood_timer_ms += dt_ms;
        let wood_interval = self.config.wood_spawn_interval_ms as f32;
        while self.wood_timer_ms >= wood_interval {
            self.wood_timer_ms -= wood_interval;
            if !has_players {
                continue;
            }
            let wood_count = self
                .resources
                .values()
                .filter(|r| r.kind == ResourceKind::Wood)
                .count();
            let budget = (self.config.max_wood_count as usize).saturating_sub(wood_count);
            for _ in 0..(self.config.wood_spawn_quantity as usize).min(budget) {
                let pos = self.random_spawn_position(self.tuning.resource_safe_radius);
                self.spawn_resource_at(pos, ResourceKind::Wood);
            }
        }

        self.chest_timer_ms += dt_ms;
        let chest_interval = self.config.chest_spawn_interval_ms as f32;
        while self.chest_timer_ms >= chest_interval {
            self.chest_timer_ms -= chest_interval;
            if !has_players {
                continue;
            }
            for _ in 0..self.config.chest_spawn_quantity {
                let pos = self.random_spawn_position(self.tuning.resource_safe_radius);
                self.spawn_resource_at(pos, ResourceKind::Chest);
            }
        }

        self.rock_timer_ms += dt_ms;
        let rock_interval = self.config.rock_spawn_interval_ms as f32;
        while self.rock_timer_ms >= rock_interval {
            self.rock_timer_ms -= rock_interval;
            for _ in 0..self.config.rock_spawn_quantity {
                if self.rocks.len() >= self.config.max_rock_count as usize {
                    break;
                }
                let pos = self.random_spawn_position(self.tuning.rock_safe_radius);
                self.spawn_rock_at(pos);
            }
        }
    }

    // ---- Visibility and deltas --------------------------------------------

    fn visible(center: Vec2, radius: f32, pos: Vec2, size: f32) -> bool {
        center.distance(pos) < radius + size
    }

    /// Full snapshot for a joining player. Uses an enlarged radius, and ships
    /// and resources are included unconditionally so the first frame can
    /// never miss an entity the client immediately needs.
    pub fn initial_state(&self, ship_id: &str) -> Option<InitialState> {
        let ship = self.ships.get(ship_id)?;
        let center = ship.pos;
        let radius =
            ship.viewport_radius(&self.ship_tuning) * self.ship_tuning.initial_viewport_scale;

        Some(InitialState {
            player: ShipSnapshot::from(ship),
            ships: self
                .ships
                .values()
                .filter(|s| s.id != ship_id)
                .map(ShipSnapshot::from)
                .collect(),
            resources: self.resources.values().map(ResourceSnapshot::from).collect(),
            rocks: self
                .rocks
                .values()
                .filter(|r| Self::visible(center, radius, r.pos, r.size))
                .map(RockSnapshot::from)
                .collect(),
            projectiles: self
                .projectiles
                .values()
                .filter(|p| Self::visible(center, radius, p.pos, p.size))
                .map(ProjectileSnapshot::from)
                .collect(),
        })
    }

    /// Visibility-scoped delta for one player, replacing their last-visible
    /// cache wholesale. Ships and resources are always sent in full; rocks
    /// are diffed against the cached fingerprints; anything previously sent
    /// and no longer visible yields exactly one removal marker.
    pub fn player_update(&mut self, ship_id: &str) -> Option<PlayerUpdate> {
        let ship = self.ships.get(ship_id)?;
        let center = ship.pos;
        let radius = ship.viewport_radius(&self.ship_tuning);
        let old_cache = &ship.last_visible;

        let mut entities = Vec::new();
        let mut new_cache = VisibleCache::default();

        for other in self.ships.values() {
            if other.id == *ship_id || !Self::visible(center, radius, other.pos, other.size) {
                continue;
            }
            new_cache.ids.insert(other.id.clone());
            entities.push(EntityDelta::Snapshot(EntitySnapshot::Ship(
                ShipSnapshot::from(other),
            )));
        }

        for resource in self.resources.values() {
            if !Self::visible(center, radius, resource.pos, resource.size) {
                continue;
            }
            new_cache.ids.insert(resource.id.clone());
            entities.push(EntityDelta::Snapshot(EntitySnapshot::Resource(
                ResourceSnapshot::from(resource),
            )));
        }

        for rock in self.rocks.values() {
            if !Self::visible(center, radius, rock.pos, rock.size) {
                continue;
            }
            let fingerprint = rock.fingerprint();
            new_cache.ids.insert(rock.id.clone());
            new_cache.rocks.insert(rock.id.clone(), fingerprint);
            // Unchanged rocks are omitted; new or changed ones go out in full.
            if old_cache.rocks.get(&rock.id) != Some(&fingerprint) {
                entities.push(EntityDelta::Snapshot(EntitySnapshot::Rock(
                    RockSnapshot::from(rock),
                )));
            }
        }

        for prev_id in &old_cache.ids {
            if !new_cache.ids.contains(prev_id) {
                entities.push(EntityDelta::Removed {
                    id: prev_id.clone(),
                });
            }
        }

        let projectiles = self
            .projectiles
            .values()
            .filter(|p| Self::visible(center, radius, p.pos, p.size))
            .map(ProjectileSnapshot::from)
            .collect();

        let ship = self.ships.get_mut(ship_id)?;
        ship.last_visible = new_cache;
        Some(PlayerUpdate {
            player: ShipSnapshot::from(&*ship),
            entities,
            projectiles,
        })
    }

    // ---- Admin ------------------------------------------------------------

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn apply_spawn_rates(&mut self, wood: u32, chest: u32, rock: u32) {
        self.config.set_spawn_quantities(wood, chest, rock);
    }

    pub fn apply_spawn_intervals(&mut self, wood_ms: u64, chest_ms: u64, rock_ms: u64) {
        if self.config.set_spawn_intervals(wood_ms, chest_ms, rock_ms) {
            // Changing a period restarts the timer, it does not inherit the
            // elapsed portion of the old one.
            self.wood_timer_ms = 0.0;
            self.chest_timer_ms = 0.0;
            self.rock_timer_ms = 0.0;
        }
    }

    pub fn apply_rock_counts(&mut self, initial: u32, max: u32) {
        self.config.set_rock_counts(initial, max);
    }

    /// Clears all rocks and regenerates the initial population. Clients learn
    /// about the departed rocks through their next delta.
    pub fn respawn_rocks(&mut self) {
        self.rocks.clear();
        for _ in 0..self.config.initial_rock_count {
            let pos = self.random_point();
            self.spawn_rock_at(pos);
        }
        info!(rocks = self.rocks.len(), "rocks respawned");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::size_for_hp;

    /// Empty map so tests control placement precisely.
    fn empty_world() -> World {
        let config = WorldConfig {
            initial_rock_count: 0,
            initial_wood_count: 0,
            ..WorldConfig::default()
        };
        World::with_seed(config, 7)
    }

    fn place_ship(world: &mut World, pos: Vec2) -> String {
        let snapshot = world.spawn_player("tester".into(), "sloop".into());
        let ship = world.ships.get_mut(&snapshot.id).expect("just spawned");
        ship.pos = pos;
        ship.last_visible = VisibleCache::default();
        snapshot.id
    }

    fn place_rock(world: &mut World, pos: Vec2, size: f32, hp: i32) -> String {
        let id = world.mint_id('k');
        world.rocks.insert(
            id.clone(),
            Rock {
                id: id.clone(),
                pos,
                size,
                hp,
                max_hp: hp,
            },
        );
        id
    }

    fn place_projectile(world: &mut World, pos: Vec2, angle: f32, owner: &str, damage: i32) {
        let id = world.mint_id('p');
        world.projectiles.insert(
            id.clone(),
            Projectile {
                id,
                pos,
                size: world.projectile_tuning.size,
                angle,
                speed: 0.0,
                damage,
                owner_id: owner.to_string(),
                age_ms: 0.0,
            },
        );
    }

    const TICK_MS: f32 = 1000.0 / 60.0;

    #[test]
    fn movement_reverts_fully_when_a_rock_blocks() {
        let mut world = empty_world();
        let ship_id = place_ship(&mut world, Vec2::new(500.0, 500.0));
        // Directly ahead (angle 0 points along +x).
        place_rock(&mut world, Vec2::new(515.0, 500.0), 30.0, 3);

        world.set_controls(
            &ship_id,
            Controls {
                move_forward: true,
                ..Controls::default()
            },
        );
        world.update(TICK_MS);

        let ship = world.ships.get(&ship_id).expect("ship exists");
        assert_eq!(ship.pos, Vec2::new(500.0, 500.0), "no partial penetration");
    }

    #[test]
    fn movement_reverts_when_another_ship_blocks() {
        let mut world = empty_world();
        let a = place_ship(&mut world, Vec2::new(500.0, 500.0));
        let _b = place_ship(&mut world, Vec2::new(516.0, 500.0));

        world.set_controls(
            &a,
            Controls {
                move_forward: true,
                ..Controls::default()
            },
        );
        world.update(TICK_MS);

        assert_eq!(
            world.ships.get(&a).expect("ship exists").pos,
            Vec2::new(500.0, 500.0)
        );
    }

    #[test]
    fn unobstructed_movement_advances_and_clamps_to_bounds() {
        let mut world = empty_world();
        let ship_id = place_ship(&mut world, Vec2::new(500.0, 500.0));
        world.set_controls(
            &ship_id,
            Controls {
                move_forward: true,
                ..Controls::default()
            },
        );
        world.update(TICK_MS);
        let ship = world.ships.get(&ship_id).expect("ship exists");
        assert!(ship.pos.x > 500.0);
        assert_eq!(ship.pos.y, 500.0);
    }

    #[test]
    fn projectile_never_damages_its_owner() {
        let mut world = empty_world();
        let ship_id = place_ship(&mut world, Vec2::new(500.0, 500.0));
        world
            .ships
            .get_mut(&ship_id)
            .expect("ship exists")
            .add_hp(4, &ShipTuning::default());

        place_projectile(&mut world, Vec2::new(500.0, 500.0), 0.0, &ship_id, 99);
        world.update(TICK_MS);

        assert_eq!(world.ships.get(&ship_id).expect("ship exists").hp, 5);
        // The projectile flies on instead of resolving against its owner.
        assert_eq!(world.projectiles.len(), 1);
    }

    #[test]
    fn lethal_hit_drops_half_hp_as_wood_and_resets_the_ship() {
        let mut world = empty_world();
        let victim = place_ship(&mut world, Vec2::new(500.0, 500.0));
        world
            .ships
            .get_mut(&victim)
            .expect("ship exists")
            .add_hp(8, &ShipTuning::default()); // hp 9

        place_projectile(&mut world, Vec2::new(500.0, 500.0), 0.0, "gone", 50);
        let events = world.update(TICK_MS);

        let wood = world
            .resources
            .values()
            .filter(|r| r.kind == ResourceKind::Wood)
            .count();
        assert_eq!(wood, 4, "floor(9/2) wood, no chests");
        assert!(world.resources.values().all(|r| r.kind == ResourceKind::Wood));

        let ship = world.ships.get(&victim).expect("reset, not removed");
        assert_eq!(ship.hp, 1);
        assert_eq!(ship.cannons, 2);

        assert!(events.iter().any(|e| matches!(e, WorldEvent::Killfeed(msg) if msg.contains("destroyed"))));
        assert!(
            events
                .iter()
                .any(|e| matches!(e, WorldEvent::PlayerDied { ship_id } if *ship_id == victim))
        );
    }

    #[test]
    fn killfeed_names_the_killer_when_resolvable() {
        let mut world = empty_world();
        let victim = place_ship(&mut world, Vec2::new(500.0, 500.0));
        let killer = place_ship(&mut world, Vec2::new(2000.0, 2000.0));

        place_projectile(&mut world, Vec2::new(500.0, 500.0), 0.0, &killer, 50);
        let events = world.update(TICK_MS);

        assert!(events.iter().any(
            |e| matches!(e, WorldEvent::Killfeed(msg) if msg.contains("sunk") && !msg.contains("destroyed"))
        ));
        let _ = victim;
    }

    #[test]
    fn rock_survives_two_hits_and_dies_on_the_third() {
        let mut world = empty_world();
        let rock_pos = Vec2::new(800.0, 800.0);
        place_rock(&mut world, rock_pos, 30.0, 3);

        for expected_alive in [true, true, false] {
            place_projectile(&mut world, rock_pos, 0.0, "nobody", 1);
            world.update(TICK_MS);
            assert_eq!(!world.rocks.is_empty(), expected_alive);
            assert!(world.projectiles.is_empty(), "projectile consumed by hit");
        }
    }

    #[test]
    fn wood_pickup_heals_and_resizes_without_unlocking_cannons() {
        let mut world = empty_world();
        let ship_id = place_ship(&mut world, Vec2::new(600.0, 600.0));
        world.spawn_resource_at(Vec2::new(605.0, 600.0), ResourceKind::Wood);

        world.update(TICK_MS);

        let ship = world.ships.get(&ship_id).expect("ship exists");
        assert_eq!(ship.hp, 2);
        assert_eq!(ship.size, size_for_hp(2, &ShipTuning::default()));
        assert_eq!(ship.cannons, 2);
        assert!(world.resources.is_empty(), "wood consumed");
    }

    #[test]
    fn gated_chest_is_consumed_without_granting_the_upgrade() {
        let mut world = empty_world();
        let ship_id = place_ship(&mut world, Vec2::new(600.0, 600.0));
        world.spawn_resource_at(Vec2::new(605.0, 600.0), ResourceKind::Chest);

        world.update(TICK_MS);

        let ship = world.ships.get(&ship_id).expect("ship exists");
        assert_eq!(ship.cannons, 2, "hp 1 is below the chest gate");
        assert!(world.resources.is_empty(), "chest consumed regardless");
    }

    #[test]
    fn chest_upgrades_cannons_at_or_above_the_gate() {
        let mut world = empty_world();
        let ship_id = place_ship(&mut world, Vec2::new(600.0, 600.0));
        world
            .ships
            .get_mut(&ship_id)
            .expect("ship exists")
            .add_hp(5, &ShipTuning::default()); // hp 6, cannons 4
        world.spawn_resource_at(Vec2::new(605.0, 600.0), ResourceKind::Chest);

        world.update(TICK_MS);

        assert_eq!(world.ships.get(&ship_id).expect("ship exists").cannons, 6);
    }

    #[test]
    fn volley_spawns_cannons_projectiles_split_and_mirrored() {
        let mut world = empty_world();
        let ship_id = place_ship(&mut world, Vec2::new(1000.0, 1000.0));
        {
            let ship = world.ships.get_mut(&ship_id).expect("ship exists");
            ship.cannons = 4;
            ship.angle = 0.0;
        }

        assert!(world.fire(&ship_id));
        assert_eq!(world.projectiles.len(), 4);

        let (port, starboard): (Vec<_>, Vec<_>) = world
            .projectiles
            .values()
            .partition(|p| p.pos.y < 1000.0);
        assert_eq!(port.len(), 2);
        assert_eq!(starboard.len(), 2);

        // Mirrored about the hull centerline (y = 1000 for angle 0).
        let mut port_offsets: Vec<(i32, i32)> = port
            .iter()
            .map(|p| (p.pos.x.round() as i32, (1000.0 - p.pos.y).round() as i32))
            .collect();
        let mut starboard_offsets: Vec<(i32, i32)> = starboard
            .iter()
            .map(|p| (p.pos.x.round() as i32, (p.pos.y - 1000.0).round() as i32))
            .collect();
        port_offsets.sort_unstable();
        starboard_offsets.sort_unstable();
        assert_eq!(port_offsets, starboard_offsets);

        // Cooldown engaged: an immediate second volley is rejected.
        assert!(!world.fire(&ship_id));
    }

    #[test]
    fn fire_requires_a_known_ship_and_a_cold_cannon() {
        let mut world = empty_world();
        assert!(!world.fire("nope"));

        let ship_id = place_ship(&mut world, Vec2::new(1000.0, 1000.0));
        assert!(world.fire(&ship_id));
        assert_eq!(world.projectiles.len(), 2);

        // Cooldown expires after enough ticks.
        for _ in 0..40 {
            world.update(TICK_MS);
        }
        assert!(world.fire(&ship_id));
        assert_eq!(world.projectiles.len(), 4);
    }

    #[test]
    fn vanished_rock_produces_exactly_one_removal_marker() {
        let mut world = empty_world();
        let ship_id = place_ship(&mut world, Vec2::new(1000.0, 1000.0));
        let rock_id = place_rock(&mut world, Vec2::new(1100.0, 1000.0), 25.0, 2);

        let first = world.player_update(&ship_id).expect("update");
        assert!(first.entities.iter().any(|d| matches!(
            d,
            EntityDelta::Snapshot(EntitySnapshot::Rock(r)) if r.id == rock_id
        )));

        // Unchanged rock is omitted on the next pass.
        let second = world.player_update(&ship_id).expect("update");
        assert!(!second.entities.iter().any(|d| matches!(
            d,
            EntityDelta::Snapshot(EntitySnapshot::Rock(r)) if r.id == rock_id
        )));

        world.rocks.remove(&rock_id);
        let third = world.player_update(&ship_id).expect("update");
        let removals = third
            .entities
            .iter()
            .filter(|d| matches!(d, EntityDelta::Removed { id } if *id == rock_id))
            .count();
        assert_eq!(removals, 1);

        // And never again.
        let fourth = world.player_update(&ship_id).expect("update");
        assert!(
            !fourth
                .entities
                .iter()
                .any(|d| matches!(d, EntityDelta::Removed { id } if *id == rock_id))
        );
    }

    #[test]
    fn damaged_rock_is_resent_with_new_hp() {
        let mut world = empty_world();
        let ship_id = place_ship(&mut world, Vec2::new(1000.0, 1000.0));
        let rock_id = place_rock(&mut world, Vec2::new(1100.0, 1000.0), 25.0, 3);
        world.player_update(&ship_id);

        world
            .rocks
            .get_mut(&rock_id)
            .expect("rock exists")
            .hp = 1;
        let update = world.player_update(&ship_id).expect("update");
        assert!(update.entities.iter().any(|d| matches!(
            d,
            EntityDelta::Snapshot(EntitySnapshot::Rock(r)) if r.id == rock_id && r.hp == 1
        )));
    }

    #[test]
    fn removing_a_player_scrubs_every_remaining_cache() {
        let mut world = empty_world();
        let a = place_ship(&mut world, Vec2::new(1000.0, 1000.0));
        let b = place_ship(&mut world, Vec2::new(1200.0, 1000.0));

        world.player_update(&a);
        assert!(
            world
                .ships
                .get(&a)
                .expect("ship exists")
                .last_visible
                .ids
                .contains(&b)
        );

        assert!(world.remove_player(&b));
        assert!(
            !world
                .ships
                .get(&a)
                .expect("ship exists")
                .last_visible
                .ids
                .contains(&b)
        );

        // No ghost removal on the next delta.
        let update = world.player_update(&a).expect("update");
        assert!(
            !update
                .entities
                .iter()
                .any(|d| matches!(d, EntityDelta::Removed { id } if *id == b))
        );
    }

    #[test]
    fn initial_state_includes_all_ships_and_resources_regardless_of_distance() {
        let mut world = empty_world();
        let a = place_ship(&mut world, Vec2::new(200.0, 200.0));
        let _b = place_ship(&mut world, Vec2::new(4800.0, 4800.0));
        world.spawn_resource_at(Vec2::new(4700.0, 4700.0), ResourceKind::Wood);
        let far_rock = place_rock(&mut world, Vec2::new(4600.0, 4600.0), 30.0, 3);

        let state = world.initial_state(&a).expect("state");
        assert_eq!(state.ships.len(), 1);
        assert_eq!(state.resources.len(), 1);
        assert!(
            !state.rocks.iter().any(|r| r.id == far_rock),
            "rocks stay distance-filtered"
        );
    }

    #[test]
    fn far_entities_are_invisible_in_regular_updates() {
        let mut world = empty_world();
        let a = place_ship(&mut world, Vec2::new(200.0, 200.0));
        let _b = place_ship(&mut world, Vec2::new(4800.0, 4800.0));
        world.spawn_resource_at(Vec2::new(4700.0, 4700.0), ResourceKind::Wood);

        let update = world.player_update(&a).expect("update");
        assert!(update.entities.is_empty());
        assert!(update.projectiles.is_empty());
    }

    #[test]
    fn wood_spawner_waits_for_players_and_honors_the_cap() {
        let mut world = empty_world();
        world.apply_spawn_rates(5, 0, 0);

        // No players: the interval elapses without spawning.
        world.update(world.config.wood_spawn_interval_ms as f32 + 1.0);
        assert!(world.resources.is_empty());

        let _ship = place_ship(&mut world, Vec2::new(500.0, 500.0));
        world.update(world.config.wood_spawn_interval_ms as f32 + 1.0);
        assert_eq!(world.resources.len(), 5);
    }

    #[test]
    fn rock_spawner_respects_the_max_count() {
        let mut world = empty_world();
        world.apply_rock_counts(0, 2);
        world.apply_spawn_rates(0, 0, 10);

        world.update(world.config.rock_spawn_interval_ms as f32 + 1.0);
        assert_eq!(world.rocks.len(), 2);
    }

    #[test]
    fn interval_change_restarts_the_spawn_timers() {
        let mut world = empty_world();
        let _ship = place_ship(&mut world, Vec2::new(500.0, 500.0));

        // Run most of the way toward the wood interval, then shorten it.
        world.update(9_000.0);
        world.apply_spawn_intervals(8_000, 30_000, 30_000);
        // Old accumulation discarded: nothing fires immediately.
        world.update(1_000.0);
        assert!(world.resources.is_empty());
        world.update(8_000.0);
        assert!(!world.resources.is_empty());
    }

    #[test]
    fn respawn_rocks_clears_and_regenerates() {
        let config = WorldConfig {
            initial_rock_count: 5,
            initial_wood_count: 0,
            ..WorldConfig::default()
        };
        let mut world = World::with_seed(config, 3);
        let old_ids: Vec<String> = world.rocks.keys().cloned().collect();
        world.respawn_rocks();
        assert_eq!(world.rocks.len(), 5);
        assert!(old_ids.iter().all(|id| !world.rocks.contains_key(id)));
    }

    #[test]
    fn spawned_rocks_follow_the_size_hp_rule() {
        let config = WorldConfig {
            initial_rock_count: 25,
            initial_wood_count: 0,
            ..WorldConfig::default()
        };
        let world = World::with_seed(config, 11);
        for rock in world.rocks.values() {
            assert!((20.0..50.0).contains(&rock.size));
            assert_eq!(rock.hp, (rock.size / 10.0).floor() as i32);
            assert_eq!(rock.max_hp, rock.hp);
        }
    }

    #[test]
    fn spawn_position_search_terminates_even_when_dense() {
        let mut world = empty_world();
        // Blanket the map with oversized rocks so no candidate is safe.
        for x in 0..10 {
            for y in 0..10 {
                place_rock(
                    &mut world,
                    Vec2::new(x as f32 * 500.0 + 250.0, y as f32 * 500.0 + 250.0),
                    400.0,
                    40,
                );
            }
        }
        let pos = world.random_spawn_position(100.0);
        // Fallback lands near world center.
        assert!((pos.x - world.width / 2.0).abs() <= world.tuning.center_jitter);
        assert!((pos.y - world.height / 2.0).abs() <= world.tuning.center_jitter);
    }
}
