// Wire protocol DTOs and conversions for public game server messages.
//
// Message names and snapshot field sets are the protocol contract with the
// rendering client and the admin UI; every snapshot carries a `type` tag.

use crate::domain::world::{EntityDelta, InitialState, PlayerUpdate};
use crate::domain::{
    Controls, EntitySnapshot, ProjectileSnapshot, ResourceSnapshot, RockSnapshot, ShipSnapshot,
    WorldConfig,
};
use crate::use_cases::{AdminCommand, SessionEvent, ShipsBatch};
use serde::{Deserialize, Serialize};

/// Messages the server sends to connected clients over the WebSocket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    /// Full initial snapshot after a join is processed.
    #[serde(rename = "game:state")]
    GameState(GameStateDto),
    /// Visibility-scoped per-tick delta.
    #[serde(rename = "game:update")]
    GameUpdate(GameUpdateDto),
    /// Reduced-rate ship-position batch shared by all connections.
    #[serde(rename = "ships:batch_update")]
    ShipsBatchUpdate(Vec<ShipDto>),
    /// Standalone removal marker.
    #[serde(rename = "entity:removed")]
    EntityRemoved(RemovedDto),
    /// Single-ship refresh or removal.
    #[serde(rename = "ship:update")]
    ShipUpdate(ShipUpdateDto),
    #[serde(rename = "game:killfeed")]
    Killfeed(String),
    /// The receiving player's own ship died. No payload.
    #[serde(rename = "player:died")]
    PlayerDied,
    /// Acknowledgement of any admin message.
    #[serde(rename = "admin:config:update")]
    ConfigUpdate(ConfigDto),
}

/// Messages the client sends to the server over the WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    #[serde(rename = "player:join")]
    Join(JoinPayload),
    #[serde(rename = "player:controls")]
    Controls(ControlsDto),
    #[serde(rename = "player:fire")]
    Fire,
    #[serde(rename = "request:ships")]
    RequestShips,
    #[serde(rename = "admin:config:spawn_rates")]
    AdminSpawnRates(SpawnRatesDto),
    #[serde(rename = "admin:config:spawn_intervals")]
    AdminSpawnIntervals(SpawnIntervalsDto),
    #[serde(rename = "admin:config:rocks")]
    AdminRockCounts(RockCountsDto),
    #[serde(rename = "admin:action:respawn_rocks")]
    AdminRespawnRocks,
    #[serde(rename = "admin:get_config")]
    AdminGetConfig,
}

/// Join handshake payload.
#[derive(Debug, Clone, Deserialize)]
pub struct JoinPayload {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "shipType")]
    pub ship_type: String,
}

/// Control intent; absent booleans default to false.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ControlsDto {
    #[serde(default, rename = "moveForward")]
    pub move_forward: bool,
    #[serde(default, rename = "rotateLeft")]
    pub rotate_left: bool,
    #[serde(default, rename = "rotateRight")]
    pub rotate_right: bool,
}

impl From<ControlsDto> for Controls {
    fn from(dto: ControlsDto) -> Self {
        Self {
            move_forward: dto.move_forward,
            rotate_left: dto.rotate_left,
            rotate_right: dto.rotate_right,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct SpawnRatesDto {
    #[serde(default)]
    pub wood: u32,
    #[serde(default)]
    pub chest: u32,
    #[serde(default)]
    pub rock: u32,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct SpawnIntervalsDto {
    #[serde(default)]
    pub wood: u64,
    #[serde(default)]
    pub chest: u64,
    #[serde(default)]
    pub rock: u64,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RockCountsDto {
    #[serde(default)]
    pub initial: u32,
    #[serde(default)]
    pub max: u32,
}

impl From<SpawnRatesDto> for AdminCommand {
    fn from(dto: SpawnRatesDto) -> Self {
        AdminCommand::SetSpawnRates {
            wood: dto.wood,
            chest: dto.chest,
            rock: dto.rock,
        }
    }
}

impl From<SpawnIntervalsDto> for AdminCommand {
    fn from(dto: SpawnIntervalsDto) -> Self {
        AdminCommand::SetSpawnIntervals {
            wood_ms: dto.wood,
            chest_ms: dto.chest,
            rock_ms: dto.rock,
        }
    }
}

impl From<RockCountsDto> for AdminCommand {
    fn from(dto: RockCountsDto) -> Self {
        AdminCommand::SetRockCounts {
            initial: dto.initial,
            max: dto.max,
        }
    }
}

/// Ship snapshot for wire transmission.
#[derive(Debug, Clone, Serialize)]
pub struct ShipDto {
    pub id: String,
    pub x: f32,
    pub y: f32,
    #[serde(rename = "type")]
    pub entity_type: &'static str,
    pub angle: f32,
    pub hp: i32,
    pub size: f32,
    #[serde(rename = "shipType")]
    pub ship_type: String,
    pub cannons: u32,
    pub name: String,
}

impl From<&ShipSnapshot> for ShipDto {
    fn from(s: &ShipSnapshot) -> Self {
        Self {
            id: s.id.clone(),
            x: s.x,
            y: s.y,
            entity_type: "ship",
            angle: s.angle,
            hp: s.hp,
            size: s.size,
            ship_type: s.ship_type.clone(),
            cannons: s.cannons,
            name: s.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceDto {
    pub id: String,
    pub x: f32,
    pub y: f32,
    #[serde(rename = "type")]
    pub entity_type: &'static str,
    #[serde(rename = "resourceType")]
    pub resource_type: &'static str,
    pub value: i32,
}

impl From<&ResourceSnapshot> for ResourceDto {
    fn from(r: &ResourceSnapshot) -> Self {
        Self {
            id: r.id.clone(),
            x: r.x,
            y: r.y,
            entity_type: "resource",
            resource_type: r.kind.as_str(),
            value: r.value,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RockDto {
    pub id: String,
    pub x: f32,
    pub y: f32,
    #[serde(rename = "type")]
    pub entity_type: &'static str,
    pub size: f32,
    pub hp: i32,
    #[serde(rename = "maxHp")]
    pub max_hp: i32,
}

impl From<&RockSnapshot> for RockDto {
    fn from(r: &RockSnapshot) -> Self {
        Self {
            id: r.id.clone(),
            x: r.x,
            y: r.y,
            entity_type: "rock",
            size: r.size,
            hp: r.hp,
            max_hp: r.max_hp,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectileDto {
    pub id: String,
    pub x: f32,
    pub y: f32,
    #[serde(rename = "type")]
    pub entity_type: &'static str,
    pub angle: f32,
    #[serde(rename = "ownerId")]
    pub owner_id: String,
}

impl From<&ProjectileSnapshot> for ProjectileDto {
    fn from(p: &ProjectileSnapshot) -> Self {
        Self {
            id: p.id.clone(),
            x: p.x,
            y: p.y,
            entity_type: "projectile",
            angle: p.angle,
            owner_id: p.owner_id.clone(),
        }
    }
}

/// Removal marker for an entity that left the receiver's view.
#[derive(Debug, Clone, Serialize)]
pub struct RemovedDto {
    pub id: String,
    pub removed: bool,
}

impl RemovedDto {
    pub fn new(id: String) -> Self {
        Self { id, removed: true }
    }
}

/// One entry of a `game:update` entity list. Removals travel separately as
/// `entity:removed` messages.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum EntityDto {
    Ship(ShipDto),
    Resource(ResourceDto),
    Rock(RockDto),
    Projectile(ProjectileDto),
}

impl From<&EntitySnapshot> for EntityDto {
    fn from(snapshot: &EntitySnapshot) -> Self {
        match snapshot {
            EntitySnapshot::Ship(s) => EntityDto::Ship(s.into()),
            EntitySnapshot::Resource(r) => EntityDto::Resource(r.into()),
            EntitySnapshot::Rock(r) => EntityDto::Rock(r.into()),
            EntitySnapshot::Projectile(p) => EntityDto::Projectile(p.into()),
        }
    }
}

/// Snapshot or removal for a single ship.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ShipUpdateDto {
    Snapshot(ShipDto),
    Removed(RemovedDto),
}

/// Full initial world view for a joining player.
#[derive(Debug, Clone, Serialize)]
pub struct GameStateDto {
    pub player: ShipDto,
    pub ships: Vec<ShipDto>,
    pub resources: Vec<ResourceDto>,
    pub rocks: Vec<RockDto>,
    pub projectiles: Vec<ProjectileDto>,
}

impl From<&InitialState> for GameStateDto {
    fn from(state: &InitialState) -> Self {
        Self {
            player: ShipDto::from(&state.player),
            ships: state.ships.iter().map(ShipDto::from).collect(),
            resources: state.resources.iter().map(ResourceDto::from).collect(),
            rocks: state.rocks.iter().map(RockDto::from).collect(),
            projectiles: state.projectiles.iter().map(ProjectileDto::from).collect(),
        }
    }
}

/// Per-tick delta for one player.
#[derive(Debug, Clone, Serialize)]
pub struct GameUpdateDto {
    pub player: ShipDto,
    pub entities: Vec<EntityDto>,
    pub projectiles: Vec<ProjectileDto>,
}

impl From<&PlayerUpdate> for GameUpdateDto {
    fn from(update: &PlayerUpdate) -> Self {
        let entities = update
            .entities
            .iter()
            .filter_map(|delta| match delta {
                EntityDelta::Snapshot(snapshot) => Some(EntityDto::from(snapshot)),
                EntityDelta::Removed { .. } => None,
            })
            .collect();
        Self {
            player: ShipDto::from(&update.player),
            entities,
            projectiles: update.projectiles.iter().map(ProjectileDto::from).collect(),
        }
    }
}

/// Full configuration snapshot sent as every admin acknowledgement.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigDto {
    #[serde(rename = "spawnRates")]
    pub spawn_rates: ConfigSpawnRatesDto,
    #[serde(rename = "spawnIntervals")]
    pub spawn_intervals: ConfigSpawnIntervalsDto,
    pub rocks: ConfigRocksDto,
    #[serde(rename = "maxWoodCount")]
    pub max_wood_count: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigSpawnRatesDto {
    pub wood: u32,
    pub chest: u32,
    pub rock: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigSpawnIntervalsDto {
    pub wood: u64,
    pub chest: u64,
    pub rock: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigRocksDto {
    pub initial: u32,
    pub max: u32,
}

impl From<&WorldConfig> for ConfigDto {
    fn from(config: &WorldConfig) -> Self {
        Self {
            spawn_rates: ConfigSpawnRatesDto {
                wood: config.wood_spawn_quantity,
                chest: config.chest_spawn_quantity,
                rock: config.rock_spawn_quantity,
            },
            spawn_intervals: ConfigSpawnIntervalsDto {
                wood: config.wood_spawn_interval_ms,
                chest: config.chest_spawn_interval_ms,
                rock: config.rock_spawn_interval_ms,
            },
            rocks: ConfigRocksDto {
                initial: config.initial_rock_count,
                max: config.max_rock_count,
            },
            max_wood_count: config.max_wood_count,
        }
    }
}

/// Expand a session event into the messages it puts on the wire. A per-tick
/// update fans out into one `game:update` plus one `entity:removed` per
/// entity that left the player's view.
pub fn session_messages(event: SessionEvent) -> Vec<ServerMessage> {
    match event {
        SessionEvent::InitialState(state) => {
            vec![ServerMessage::GameState(GameStateDto::from(&state))]
        }
        SessionEvent::Update(update) => {
            let mut messages = vec![ServerMessage::GameUpdate(GameUpdateDto::from(&update))];
            for delta in &update.entities {
                if let EntityDelta::Removed { id } = delta {
                    messages.push(ServerMessage::EntityRemoved(RemovedDto::new(id.clone())));
                }
            }
            messages
        }
        SessionEvent::ShipUpdate(snapshot) => vec![ServerMessage::ShipUpdate(
            ShipUpdateDto::Snapshot(ShipDto::from(&snapshot)),
        )],
        SessionEvent::ShipRemoved { id } => vec![ServerMessage::ShipUpdate(
            ShipUpdateDto::Removed(RemovedDto::new(id)),
        )],
        SessionEvent::Killfeed(line) => vec![ServerMessage::Killfeed(line)],
        SessionEvent::Died => vec![ServerMessage::PlayerDied],
        SessionEvent::ConfigSnapshot(config) => {
            vec![ServerMessage::ConfigUpdate(ConfigDto::from(&config))]
        }
    }
}

impl From<&ShipsBatch> for ServerMessage {
    fn from(batch: &ShipsBatch) -> Self {
        ServerMessage::ShipsBatchUpdate(batch.ships.iter().map(ShipDto::from).collect())
    }
}
