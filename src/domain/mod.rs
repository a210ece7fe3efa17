// Domain layer: core simulation types and rules.

pub mod collision;
pub mod config;
pub mod entity;
pub mod tuning;
pub mod world;

pub use config::WorldConfig;
pub use entity::{
    Controls, EntitySnapshot, ProjectileSnapshot, ResourceKind, ResourceSnapshot, RockSnapshot,
    ShipSnapshot,
};
pub use world::{EntityDelta, InitialState, PlayerUpdate, World, WorldEvent};
