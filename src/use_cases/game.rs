use super::types::{AdminCommand, GameEvent, ServerStatus, SessionEvent, ShipsBatch};
use crate::domain::{World, WorldConfig, WorldEvent};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

/// A connected, spawned player as the world task sees it.
struct Session {
    ship_id: String,
    events_tx: mpsc::Sender<SessionEvent>,
}

impl Session {
    /// Best-effort delivery: a slow client drops events rather than stalling
    /// the tick.
    fn push(&self, event: SessionEvent) {
        if let Err(mpsc::error::TrySendError::Full(_)) = self.events_tx.try_send(event) {
            debug!(ship_id = %self.ship_id, "session channel full; dropping event");
        }
    }
}

/// The authoritative world loop: drains connection events, advances the
/// simulation once per tick, pushes per-player deltas, and emits the
/// lower-rate ship-position batch.
pub async fn world_task(
    mut input_rx: mpsc::Receiver<GameEvent>,
    batch_tx: broadcast::Sender<ShipsBatch>,
    status_tx: watch::Sender<ServerStatus>,
    tick_interval: Duration,
    ticks_per_batch: u64,
    shutdown: Arc<tokio::sync::Notify>,
) {
    let mut world = World::new(WorldConfig::default());
    let mut sessions: HashMap<u64, Session> = HashMap::new();
    let mut tick: u64 = 0;

    // Drive the fixed-step game loop at the configured tick rate.
    let mut interval = tokio::time::interval(tick_interval);
    let dt_ms = tick_interval.as_secs_f32() * 1000.0;

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                // Exit cleanly on server shutdown; this stops every spawner
                // with the loop.
                break;
            }
            _ = interval.tick() => {}
        }

        while let Ok(event) = input_rx.try_recv() {
            handle_event(&mut world, &mut sessions, event);
        }

        for event in world.update(dt_ms) {
            match event {
                WorldEvent::Killfeed(line) => {
                    for session in sessions.values() {
                        session.push(SessionEvent::Killfeed(line.clone()));
                    }
                }
                WorldEvent::PlayerDied { ship_id } => {
                    if let Some(session) =
                        sessions.values().find(|s| s.ship_id == ship_id)
                    {
                        session.push(SessionEvent::Died);
                    }
                }
            }
        }

        for session in sessions.values() {
            if let Some(update) = world.player_update(&session.ship_id) {
                session.push(SessionEvent::Update(update));
            }
        }

        tick += 1;
        if tick % ticks_per_batch == 0 {
            // Receiver-less sends just mean nobody is connected.
            let _ = batch_tx.send(ShipsBatch {
                tick,
                ships: world.ship_snapshots(),
            });
        }

        let status = ServerStatus {
            players: world.player_count(),
        };
        if *status_tx.borrow() != status {
            let _ = status_tx.send(status);
        }
    }

    info!("world task stopped");
}

fn handle_event(world: &mut World, sessions: &mut HashMap<u64, Session>, event: GameEvent) {
    match event {
        GameEvent::Join {
            conn_id,
            name,
            ship_type,
            events_tx,
        } => {
            let snapshot = world.spawn_player(name, ship_type);
            let ship_id = snapshot.id.clone();
            info!(conn_id, ship_id = %ship_id, "player joined");

            let session = Session { ship_id, events_tx };
            if let Some(state) = world.initial_state(&session.ship_id) {
                session.push(SessionEvent::InitialState(state));
            }
            if let Some(stale) = sessions.insert(conn_id, session) {
                // A replaced connection id should never leave a ghost ship.
                warn!(conn_id, ship_id = %stale.ship_id, "stale session replaced");
                world.remove_player(&stale.ship_id);
            }
        }
        GameEvent::Leave { conn_id } => {
            let Some(session) = sessions.remove(&conn_id) else {
                return;
            };
            info!(conn_id, ship_id = %session.ship_id, "player left");
            world.remove_player(&session.ship_id);
            // Announce once; the caches were scrubbed, so the per-tick diff
            // will not repeat this removal.
            for other in sessions.values() {
                other.push(SessionEvent::ShipRemoved {
                    id: session.ship_id.clone(),
                });
            }
        }
        GameEvent::Controls { conn_id, controls } => {
            // Unknown connection ids race disconnects and are ignored.
            if let Some(session) = sessions.get(&conn_id) {
                world.set_controls(&session.ship_id, controls);
            }
        }
        GameEvent::Fire { conn_id } => {
            if let Some(session) = sessions.get(&conn_id) {
                // A rejected volley (cooldown, unarmed) gets no reply.
                world.fire(&session.ship_id);
            }
        }
        GameEvent::RequestShips { conn_id } => {
            let Some(session) = sessions.get(&conn_id) else {
                return;
            };
            for snapshot in world.ship_snapshots() {
                if snapshot.id != session.ship_id {
                    session.push(SessionEvent::ShipUpdate(snapshot));
                }
            }
        }
        GameEvent::Admin {
            conn_id,
            command,
            events_tx,
        } => {
            apply_admin(world, command);
            info!(conn_id, ?command, "admin command applied");
            // Every admin message is acknowledged with the full config.
            if let Err(mpsc::error::TrySendError::Full(_)) =
                events_tx.try_send(SessionEvent::ConfigSnapshot(*world.config()))
            {
                debug!(conn_id, "admin channel full; dropping config ack");
            }
        }
    }
}

fn apply_admin(world: &mut World, command: AdminCommand) {
    match command {
        AdminCommand::SetSpawnRates { wood, chest, rock } => {
            world.apply_spawn_rates(wood, chest, rock);
        }
        AdminCommand::SetSpawnIntervals {
            wood_ms,
            chest_ms,
            rock_ms,
        } => {
            world.apply_spawn_intervals(wood_ms, chest_ms, rock_ms);
        }
        AdminCommand::SetRockCounts { initial, max } => {
            world.apply_rock_counts(initial, max);
        }
        AdminCommand::RespawnRocks => world.respawn_rocks(),
        AdminCommand::GetConfig => {}
    }
}
