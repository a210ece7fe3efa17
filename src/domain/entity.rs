// Domain-level simulation entities and snapshot types.
//
// Entities are plain records grouped per kind; cross-entity relations are id
// strings only (a projectile's `owner_id` may point at a ship that no longer
// exists, and lookups must tolerate that).

use crate::domain::tuning::ShipTuning;
use std::collections::{HashMap, HashSet};
use std::f32::consts::TAU;

/// 2D position/direction in world units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Vec2) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Wrap an angle into `[0, 2π)`.
pub fn normalize_angle(angle: f32) -> f32 {
    let wrapped = angle % TAU;
    if wrapped < 0.0 { wrapped + TAU } else { wrapped }
}

/// Latest control intent for a ship. Overwritten, never queued.
#[derive(Debug, Clone, Copy, Default)]
pub struct Controls {
    pub move_forward: bool,
    pub rotate_left: bool,
    pub rotate_right: bool,
}

/// Position/hp fingerprint of a rock as last sent to a player, used to decide
/// whether a visible rock needs re-sending.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RockFingerprint {
    pub x: f32,
    pub y: f32,
    pub hp: i32,
}

/// Per-player cache of what the last delta contained. Replaced wholesale each
/// tick; never shared between players.
#[derive(Debug, Clone, Default)]
pub struct VisibleCache {
    /// Every entity id included in the last update sent to this player.
    pub ids: HashSet<String>,
    /// Fingerprints for the rocks among them.
    pub rocks: HashMap<String, RockFingerprint>,
}

#[derive(Debug)]
pub struct Ship {
    pub id: String,
    pub name: String,
    pub ship_type: String,
    pub pos: Vec2,
    /// Heading in radians, kept normalized to `[0, 2π)`.
    pub angle: f32,
    pub hp: i32,
    pub max_hp: i32,
    /// Collision radius, derived from hp.
    pub size: f32,
    /// Even count, split evenly port/starboard. Monotone non-decreasing
    /// except on death reset.
    pub cannons: u32,
    pub cannon_cooldown_ms: f32,
    pub controls: Controls,
    pub last_visible: VisibleCache,
}

impl Ship {
    pub fn new(id: String, name: String, ship_type: String, pos: Vec2, tuning: &ShipTuning) -> Self {
        let mut ship = Self {
            id,
            name,
            ship_type,
            pos,
            angle: 0.0,
            hp: 1,
            max_hp: tuning.max_hp,
            size: tuning.base_size,
            cannons: 2,
            cannon_cooldown_ms: 0.0,
            controls: Controls::default(),
            last_visible: VisibleCache::default(),
        };
        ship.recompute_stats(tuning);
        ship
    }

    /// Re-derive size and cannon count from hp. Cannons only ever grow here;
    /// death reset is the one place that lowers them.
    pub fn recompute_stats(&mut self, tuning: &ShipTuning) {
        self.size = size_for_hp(self.hp, tuning);
        self.cannons = self.cannons.max(cannons_for_hp(self.hp));
    }

    pub fn add_hp(&mut self, amount: i32, tuning: &ShipTuning) {
        self.hp = (self.hp + amount).min(self.max_hp);
        self.recompute_stats(tuning);
    }

    /// Apply damage and report whether the hit was lethal.
    pub fn apply_damage(&mut self, amount: i32, tuning: &ShipTuning) -> bool {
        self.hp = (self.hp - amount).max(0);
        self.recompute_stats(tuning);
        self.hp == 0
    }

    /// Reset after death: back to base hp and armament, stats re-derived.
    pub fn reset_after_death(&mut self, spawn: Vec2, tuning: &ShipTuning) {
        self.hp = 1;
        self.cannons = 2;
        self.cannon_cooldown_ms = 0.0;
        self.pos = spawn;
        self.size = size_for_hp(self.hp, tuning);
    }

    /// Hull length of the oriented-rectangle model.
    pub fn hull_length(&self, tuning: &ShipTuning) -> f32 {
        self.size * tuning.hull_length_factor
    }

    /// Hull beam of the oriented-rectangle model.
    pub fn hull_beam(&self, tuning: &ShipTuning) -> f32 {
        self.size * tuning.hull_beam_factor
    }

    pub fn viewport_radius(&self, tuning: &ShipTuning) -> f32 {
        tuning.base_viewport_radius + self.size * tuning.viewport_size_factor
    }
}

pub fn size_for_hp(hp: i32, tuning: &ShipTuning) -> f32 {
    (tuning.base_size + hp as f32 * 2.0).clamp(tuning.base_size, tuning.size_cap)
}

pub fn cannons_for_hp(hp: i32) -> u32 {
    2 + 2 * (hp.max(0) as u32 / 5)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Wood,
    Chest,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Wood => "wood",
            ResourceKind::Chest => "chest",
        }
    }
}

#[derive(Debug)]
pub struct Resource {
    pub id: String,
    pub pos: Vec2,
    /// Fixed per kind at creation.
    pub size: f32,
    pub kind: ResourceKind,
    pub value: i32,
}

/// Destructible static obstacle.
#[derive(Debug)]
pub struct Rock {
    pub id: String,
    pub pos: Vec2,
    pub size: f32,
    pub hp: i32,
    pub max_hp: i32,
}

impl Rock {
    pub fn fingerprint(&self) -> RockFingerprint {
        RockFingerprint {
            x: self.pos.x,
            y: self.pos.y,
            hp: self.hp,
        }
    }
}

#[derive(Debug)]
pub struct Projectile {
    pub id: String,
    pub pos: Vec2,
    pub size: f32,
    pub angle: f32,
    pub speed: f32,
    pub damage: i32,
    /// Id of the firing ship; a lookup key, not ownership.
    pub owner_id: String,
    pub age_ms: f32,
}

// Snapshots are the read-only views handed to the session layer; the wire
// DTOs in the adapter layer convert from these.

#[derive(Debug, Clone)]
pub struct ShipSnapshot {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub hp: i32,
    pub size: f32,
    pub ship_type: String,
    pub cannons: u32,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct ResourceSnapshot {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub kind: ResourceKind,
    pub value: i32,
}

#[derive(Debug, Clone)]
pub struct RockSnapshot {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub hp: i32,
    pub max_hp: i32,
}

#[derive(Debug, Clone)]
pub struct ProjectileSnapshot {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub owner_id: String,
}

impl From<&Ship> for ShipSnapshot {
    fn from(s: &Ship) -> Self {
        Self {
            id: s.id.clone(),
            x: s.pos.x,
            y: s.pos.y,
            angle: s.angle,
            hp: s.hp,
            size: s.size,
            ship_type: s.ship_type.clone(),
            cannons: s.cannons,
            name: s.name.clone(),
        }
    }
}

impl From<&Resource> for ResourceSnapshot {
    fn from(r: &Resource) -> Self {
        Self {
            id: r.id.clone(),
            x: r.pos.x,
            y: r.pos.y,
            kind: r.kind,
            value: r.value,
        }
    }
}

impl From<&Rock> for RockSnapshot {
    fn from(r: &Rock) -> Self {
        Self {
            id: r.id.clone(),
            x: r.pos.x,
            y: r.pos.y,
            size: r.size,
            hp: r.hp,
            max_hp: r.max_hp,
        }
    }
}

impl From<&Projectile> for ProjectileSnapshot {
    fn from(p: &Projectile) -> Self {
        Self {
            id: p.id.clone(),
            x: p.pos.x,
            y: p.pos.y,
            angle: p.angle,
            owner_id: p.owner_id.clone(),
        }
    }
}

/// Mixed-type snapshot used in per-player delta lists.
#[derive(Debug, Clone)]
pub enum EntitySnapshot {
    Ship(ShipSnapshot),
    Resource(ResourceSnapshot),
    Rock(RockSnapshot),
    Projectile(ProjectileSnapshot),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuning() -> ShipTuning {
        ShipTuning::default()
    }

    #[test]
    fn size_tracks_hp_with_clamping() {
        let t = tuning();
        assert_eq!(size_for_hp(0, &t), t.base_size);
        assert_eq!(size_for_hp(1, &t), t.base_size + 2.0);
        assert_eq!(size_for_hp(2, &t), t.base_size + 4.0);
        // Far past the cap.
        assert_eq!(size_for_hp(1000, &t), t.size_cap);
    }

    #[test]
    fn size_recomputed_after_damage_and_heal() {
        let t = tuning();
        let mut ship = Ship::new("s1".into(), "a".into(), "sloop".into(), Vec2::default(), &t);
        ship.add_hp(9, &t);
        assert_eq!(ship.size, size_for_hp(10, &t));
        ship.apply_damage(4, &t);
        assert_eq!(ship.size, size_for_hp(6, &t));
        ship.add_hp(2, &t);
        assert_eq!(ship.size, size_for_hp(8, &t));
    }

    #[test]
    fn cannon_unlock_is_monotone_under_hp_swings() {
        let t = tuning();
        let mut ship = Ship::new("s1".into(), "a".into(), "sloop".into(), Vec2::default(), &t);
        assert_eq!(ship.cannons, 2);

        ship.add_hp(4, &t); // hp 5 -> tier 4
        assert_eq!(ship.cannons, 4);
        ship.add_hp(5, &t); // hp 10 -> tier 6
        assert_eq!(ship.cannons, 6);

        // Damage back below the thresholds never lowers the count.
        ship.apply_damage(9, &t);
        assert_eq!(ship.hp, 1);
        assert_eq!(ship.cannons, 6);

        // Healing back up does not double-apply.
        ship.add_hp(9, &t);
        assert_eq!(ship.cannons, 6);
    }

    #[test]
    fn cannons_match_formula_when_reached_by_growth_only() {
        let t = tuning();
        let mut ship = Ship::new("s1".into(), "a".into(), "sloop".into(), Vec2::default(), &t);
        for hp in 2..=30 {
            ship.add_hp(1, &t);
            assert_eq!(ship.hp, hp);
            assert_eq!(ship.cannons, cannons_for_hp(hp));
        }
    }

    #[test]
    fn death_reset_returns_to_base_armament() {
        let t = tuning();
        let mut ship = Ship::new("s1".into(), "a".into(), "sloop".into(), Vec2::default(), &t);
        ship.add_hp(14, &t);
        assert!(ship.cannons > 2);
        ship.reset_after_death(Vec2::new(7.0, 9.0), &t);
        assert_eq!(ship.hp, 1);
        assert_eq!(ship.cannons, 2);
        assert_eq!(ship.size, size_for_hp(1, &t));
        assert_eq!(ship.pos, Vec2::new(7.0, 9.0));
    }

    #[test]
    fn angle_normalization_wraps_into_range() {
        assert!((normalize_angle(-0.1) - (TAU - 0.1)).abs() < 1e-6);
        assert!((normalize_angle(TAU + 0.25) - 0.25).abs() < 1e-6);
        assert_eq!(normalize_angle(0.0), 0.0);
    }
}
