use crate::interface_adapters::protocol::{
    ClientMessage, ServerMessage, session_messages,
};
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::utils::rng::rand_id;
use crate::use_cases::{AdminCommand, GameEvent, SessionEvent, ShipsBatch};

use axum::{
    Error,
    extract::{
        State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
};
use std::{
    sync::{Arc, atomic::Ordering},
    time::{Duration, Instant},
};
use futures_util::SinkExt;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::timeout;
use tracing::{debug, error, info, info_span, warn};

#[derive(Debug)]
enum NetError {
    // Categorizes connection lifecycle failures so callers can decide policy.
    #[allow(dead_code)]
    Ws(axum::Error),
    #[allow(dead_code)]
    Serialization(serde_json::Error),
    InputClosed,
    EventsClosed,
    BatchesClosed,
    JoinRequired,
    JoinTimeout,
    JoinLost,
    ClosedBeforeJoin,
}

impl From<axum::Error> for NetError {
    fn from(e: axum::Error) -> Self {
        NetError::Ws(e)
    }
}

/// Serialize each ship batch once and broadcast the shared bytes to every
/// connection task.
pub async fn batch_serializer(
    mut batch_rx: broadcast::Receiver<ShipsBatch>,
    batch_bytes_tx: broadcast::Sender<Utf8Bytes>,
    batch_latest_tx: watch::Sender<Utf8Bytes>,
) {
    loop {
        match batch_rx.recv().await {
            Ok(batch) => {
                let msg = ServerMessage::from(&batch);
                let txt = match serde_json::to_string(&msg) {
                    Ok(txt) => txt,
                    Err(e) => {
                        error!(error = ?e, "failed to serialize ship batch");
                        continue;
                    }
                };

                let bytes = Utf8Bytes::from(txt);
                // Store the latest bytes for lag recovery.
                let _ = batch_latest_tx.send(bytes.clone());
                let _ = batch_bytes_tx.send(bytes);
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(missed = n, "batch serializer lagged; skipping to latest");
            }
            Err(broadcast::error::RecvError::Closed) => {
                warn!("ship batch channel closed; serializer exiting");
                break;
            }
        }
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    // Separate connection id for correlating logs before/after a ship id exists.
    let conn_id = rand_id();
    let span = info_span!("conn", conn_id, ship_id = tracing::field::Empty);
    let _enter = span.enter();

    let mut ctx = match bootstrap_connection(&mut socket, &state, conn_id).await {
        Ok(ctx) => ctx,
        Err(NetError::ClosedBeforeJoin) => {
            info!("client disconnected before join handshake");
            return;
        }
        Err(e) => {
            error!(error = ?e, "failed to bootstrap connection");
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::POLICY,
                    reason: "bootstrap failed".into(),
                })))
                .await;
            let _ = socket.close().await;
            return;
        }
    };

    state.connections.fetch_add(1, Ordering::Relaxed);
    span.record("ship_id", ctx.ship_id.as_str());
    info!(ship_id = %ctx.ship_id, name = %ctx.name, "client connected");

    if let Err(e) = run_client_loop(&mut socket, &mut ctx).await {
        warn!(error = ?e, "client loop exited with error");
    }
    state.connections.fetch_sub(1, Ordering::Relaxed);
}

async fn send_message(socket: &mut WebSocket, msg: &ServerMessage) -> Result<usize, NetError> {
    let txt = serde_json::to_string(msg).map_err(NetError::Serialization)?;
    let bytes = txt.len();
    socket
        .send(Message::Text(txt.into()))
        .await
        .map_err(NetError::Ws)?;
    Ok(bytes)
}

struct ConnCtx {
    pub conn_id: u64,
    pub ship_id: String,
    pub name: String,
    pub input_tx: mpsc::Sender<GameEvent>,
    // Kept so admin commands can carry their own reply channel.
    pub events_tx: mpsc::Sender<SessionEvent>,
    pub events_rx: mpsc::Receiver<SessionEvent>,
    pub batch_bytes_rx: broadcast::Receiver<Utf8Bytes>,
    pub batch_latest_rx: watch::Receiver<Utf8Bytes>,
    // Count lag recovery batches sent to this client.
    pub lag_recovery_count: u64,

    pub msgs_in: u64,
    pub msgs_out: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,

    pub invalid_json: u32,

    pub last_input_full_log: Instant,
    pub last_batch_lag_log: Instant,
    pub last_invalid_msg_log: Instant,

    pub close_frame: Option<CloseFrame>,
}

#[derive(Debug)]
struct JoinHandshake {
    name: String,
    ship_type: String,
    bytes_in: u64,
    msgs_in: u64,
}

const LOG_THROTTLE: Duration = Duration::from_secs(2);
const MAX_INVALID_JSON: u32 = 10;
const MAX_NAME_LEN: usize = 32;
const JOIN_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
const INITIAL_STATE_TIMEOUT: Duration = Duration::from_secs(5);
const SESSION_EVENT_CAPACITY: usize = 256;

async fn bootstrap_connection(
    socket: &mut WebSocket,
    state: &Arc<AppState>,
    conn_id: u64,
) -> Result<ConnCtx, NetError> {
    // Subscribe to batches *before* any awaits so the first one is not missed.
    let batch_bytes_rx = state.batch_bytes_tx.subscribe();
    let batch_latest_rx = state.batch_latest_tx.subscribe();

    // The very first meaningful client message must be the join request.
    let join = match timeout(JOIN_HANDSHAKE_TIMEOUT, read_join_handshake(socket)).await {
        Ok(result) => result?,
        Err(_) => {
            let _ = send_close_with_reason(socket, close_code::POLICY, "join timeout").await;
            return Err(NetError::JoinTimeout);
        }
    };

    // Tell the world task to spawn a ship; everything this player should
    // receive flows back over this per-connection channel.
    let (events_tx, mut events_rx) = mpsc::channel::<SessionEvent>(SESSION_EVENT_CAPACITY);
    state
        .input_tx
        .send(GameEvent::Join {
            conn_id,
            name: join.name.clone(),
            ship_type: join.ship_type.clone(),
            events_tx: events_tx.clone(),
        })
        .await
        .map_err(|_| NetError::InputClosed)?;

    // The world task replies with the enlarged initial snapshot on the next
    // tick. If anything after Join fails, compensate with Leave so the world
    // never keeps a ship nobody is connected to.
    let (state_msg, ship_id) =
        match timeout(INITIAL_STATE_TIMEOUT, wait_for_initial_state(&mut events_rx)).await {
            Ok(result) => result?,
            Err(_) => {
                let _ = state.input_tx.send(GameEvent::Leave { conn_id }).await;
                return Err(NetError::JoinLost);
            }
        };
    let bytes_out = match send_message(socket, &state_msg).await {
        Ok(bytes) => bytes as u64,
        Err(e) => {
            state
                .input_tx
                .send(GameEvent::Leave { conn_id })
                .await
                .map_err(|_| NetError::InputClosed)?; // InputClosed takes precedence
            return Err(e);
        }
    };

    let now = Instant::now() - LOG_THROTTLE;
    Ok(ConnCtx {
        conn_id,
        ship_id,
        name: join.name,
        input_tx: state.input_tx.clone(),
        events_tx,
        events_rx,
        batch_bytes_rx,
        batch_latest_rx,
        lag_recovery_count: 0,

        msgs_in: join.msgs_in,
        msgs_out: 1,
        bytes_in: join.bytes_in,
        bytes_out,

        invalid_json: 0,

        last_input_full_log: now,
        last_batch_lag_log: now,
        last_invalid_msg_log: now,

        close_frame: None,
    })
}

async fn send_close_with_reason(
    socket: &mut WebSocket,
    code: u16,
    reason: &'static str,
) -> Result<(), NetError> {
    socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await
        .map_err(NetError::Ws)?;
    socket.close().await.map_err(NetError::Ws)
}

async fn read_join_handshake(socket: &mut WebSocket) -> Result<JoinHandshake, NetError> {
    loop {
        let Some(incoming) = socket.recv().await else {
            return Err(NetError::ClosedBeforeJoin);
        };

        let message = incoming.map_err(NetError::Ws)?;
        match message {
            Message::Text(text) => {
                let bytes_in = text.len() as u64;
                let payload = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Join(payload)) => payload,
                    Ok(_) => {
                        let _ = send_close_with_reason(socket, close_code::POLICY, "join required")
                            .await;
                        return Err(NetError::JoinRequired);
                    }
                    Err(_) => {
                        let _ = send_close_with_reason(
                            socket,
                            close_code::POLICY,
                            "invalid join payload",
                        )
                        .await;
                        return Err(NetError::JoinRequired);
                    }
                };

                let mut name = payload.name.trim().to_string();
                if name.is_empty() {
                    name = "sailor".to_string();
                }
                name.truncate(MAX_NAME_LEN);

                return Ok(JoinHandshake {
                    name,
                    ship_type: payload.ship_type,
                    bytes_in,
                    msgs_in: 1,
                });
            }
            Message::Binary(_) => {
                let _ = send_close_with_reason(
                    socket,
                    close_code::UNSUPPORTED,
                    "binary messages not supported",
                )
                .await;
                return Err(NetError::JoinRequired);
            }
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => return Err(NetError::ClosedBeforeJoin),
        }
    }
}

/// Drain session events until the initial snapshot arrives. The world task
/// sends it first, so anything else here means the channel closed under us.
async fn wait_for_initial_state(
    events_rx: &mut mpsc::Receiver<SessionEvent>,
) -> Result<(ServerMessage, String), NetError> {
    loop {
        let Some(event) = events_rx.recv().await else {
            return Err(NetError::EventsClosed);
        };
        if let SessionEvent::InitialState(state) = event {
            let ship_id = state.player.id.clone();
            let mut messages = session_messages(SessionEvent::InitialState(state));
            let Some(msg) = messages.pop() else {
                return Err(NetError::JoinLost);
            };
            return Ok((msg, ship_id));
        }
        // Stray pre-join events are dropped.
    }
}

enum LoopControl {
    Continue,
    Disconnect,
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

fn forward_game_event(
    conn_id: u64,
    input_tx: &mpsc::Sender<GameEvent>,
    event: GameEvent,
    last_input_full_log: &mut Instant,
) -> Result<LoopControl, NetError> {
    match input_tx.try_send(event) {
        Ok(()) => Ok(LoopControl::Continue),
        Err(mpsc::error::TrySendError::Full(_evt)) => {
            if should_log(last_input_full_log) {
                warn!(conn_id, "input channel full; dropping message");
            }
            Ok(LoopControl::Continue)
        }
        Err(mpsc::error::TrySendError::Closed(_evt)) => Err(NetError::InputClosed),
    }
}

async fn run_client_loop(socket: &mut WebSocket, ctx: &mut ConnCtx) -> Result<(), NetError> {
    let conn_id = ctx.conn_id;

    // Split borrows so `tokio::select!` can hold them concurrently.
    let ConnCtx {
        input_tx,
        events_tx,
        events_rx,
        batch_bytes_rx,
        batch_latest_rx,
        lag_recovery_count,
        msgs_in,
        msgs_out,
        bytes_in,
        bytes_out,
        invalid_json,
        last_input_full_log,
        last_batch_lag_log,
        last_invalid_msg_log,
        close_frame,
        ..
    } = ctx;

    let mut fatal: Option<NetError> = None;

    loop {
        // disconnect becomes true on error
        let disconnect: bool = tokio::select! {
            // Incoming message from the client.
            incoming = socket.recv() => {
                match handle_incoming_ws(
                    incoming,
                    conn_id,
                    input_tx,
                    events_tx,
                    msgs_in,
                    bytes_in,
                    invalid_json,
                    last_input_full_log,
                    last_invalid_msg_log,
                    close_frame,
                ) {
                    Ok(LoopControl::Continue) => false,
                    Ok(LoopControl::Disconnect) => true,
                    Err(e) => {
                        fatal = Some(e);
                        true
                    }
                }
            }

            // Per-player events from the world task.
            event = events_rx.recv() => {
                match event {
                    Some(event) => {
                        let mut failed = false;
                        for msg in session_messages(event) {
                            match send_message(socket, &msg).await {
                                Ok(bytes) => {
                                    *msgs_out += 1;
                                    *bytes_out += bytes as u64;
                                }
                                Err(err) => {
                                    warn!(conn_id, error = ?err, "failed to send session event");
                                    failed = true;
                                    break;
                                }
                            }
                        }
                        failed
                    }
                    None => {
                        fatal = Some(NetError::EventsClosed);
                        true
                    }
                }
            }

            // Shared ship batch, already serialized once for everyone.
            batch = batch_bytes_rx.recv() => {
                match batch {
                    Ok(bytes) => match forward_batch_bytes(bytes, socket, msgs_out, bytes_out).await {
                        LoopControl::Continue => false,
                        LoopControl::Disconnect => true,
                    },
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        if should_log(last_batch_lag_log) {
                            warn!(missed = n, "ship batches lagged; sending latest");
                        }

                        // Resync strategy: send the most recent batch.
                        let latest = batch_latest_rx.borrow().clone();
                        if latest.is_empty() {
                            false
                        } else {
                            let bytes_len = latest.len();
                            *lag_recovery_count += 1;
                            let outcome =
                                forward_batch_bytes(latest, socket, msgs_out, bytes_out).await;

                            if should_log(last_batch_lag_log) {
                                debug!(
                                    conn_id,
                                    bytes = bytes_len,
                                    count = *lag_recovery_count,
                                    "sent lag recovery batch"
                                );
                            }

                            match outcome {
                                LoopControl::Continue => false,
                                LoopControl::Disconnect => true,
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        fatal = Some(NetError::BatchesClosed);
                        true
                    }
                }
            }
        };

        if disconnect {
            if let Some(frame) = close_frame.take() {
                let _ = socket.send(Message::Close(Some(frame))).await;
            }
            if let Err(err) = socket.close().await.map_err(NetError::Ws) {
                debug!(error = ?err, "socket close error");
            }
            break;
        }
    }

    if let Err(e) = disconnect_cleanup(
        conn_id,
        input_tx,
        *msgs_in,
        *msgs_out,
        *bytes_in,
        *bytes_out,
        *invalid_json,
        *lag_recovery_count,
    )
    .await
    {
        warn!(error = ?e, "error during disconnect cleanup");
        if fatal.is_none() {
            fatal = Some(e);
        }
    }

    if let Some(err) = fatal {
        Err(err)
    } else {
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_incoming_ws(
    incoming: Option<Result<Message, Error>>,
    conn_id: u64,
    input_tx: &mpsc::Sender<GameEvent>,
    events_tx: &mpsc::Sender<SessionEvent>,
    msgs_in: &mut u64,
    bytes_in: &mut u64,
    invalid_json: &mut u32,
    last_input_full_log: &mut Instant,
    last_invalid_msg_log: &mut Instant,
    close_frame: &mut Option<CloseFrame>,
) -> Result<LoopControl, NetError> {
    match incoming {
        Some(Ok(msg)) => match msg {
            Message::Text(text) => {
                *msgs_in += 1;
                *bytes_in += text.len() as u64;

                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Join(_)) => {
                        // Repeated joins after bootstrap keep the existing ship.
                        if should_log(last_invalid_msg_log) {
                            warn!(conn_id, "duplicate join ignored");
                        }
                        Ok(LoopControl::Continue)
                    }
                    Ok(ClientMessage::Controls(controls)) => forward_game_event(
                        conn_id,
                        input_tx,
                        GameEvent::Controls {
                            conn_id,
                            controls: controls.into(),
                        },
                        last_input_full_log,
                    ),
                    Ok(ClientMessage::Fire) => forward_game_event(
                        conn_id,
                        input_tx,
                        GameEvent::Fire { conn_id },
                        last_input_full_log,
                    ),
                    Ok(ClientMessage::RequestShips) => forward_game_event(
                        conn_id,
                        input_tx,
                        GameEvent::RequestShips { conn_id },
                        last_input_full_log,
                    ),
                    Ok(message) => {
                        // Remaining variants are all admin commands; each one
                        // is acknowledged with the full config over this
                        // connection's event channel.
                        let command = match message {
                            ClientMessage::AdminSpawnRates(dto) => AdminCommand::from(dto),
                            ClientMessage::AdminSpawnIntervals(dto) => AdminCommand::from(dto),
                            ClientMessage::AdminRockCounts(dto) => AdminCommand::from(dto),
                            ClientMessage::AdminRespawnRocks => AdminCommand::RespawnRocks,
                            _ => AdminCommand::GetConfig,
                        };
                        forward_game_event(
                            conn_id,
                            input_tx,
                            GameEvent::Admin {
                                conn_id,
                                command,
                                events_tx: events_tx.clone(),
                            },
                            last_input_full_log,
                        )
                    }
                    Err(parse_err) => {
                        *invalid_json += 1;
                        if should_log(last_invalid_msg_log) {
                            warn!(
                                conn_id,
                                bytes = text.len(),
                                error = %parse_err,
                                "failed to parse client message"
                            );
                        }

                        if *invalid_json > MAX_INVALID_JSON {
                            *close_frame = Some(CloseFrame {
                                code: close_code::POLICY,
                                reason: "too many invalid messages".into(),
                            });
                            return Ok(LoopControl::Disconnect);
                        }

                        Ok(LoopControl::Continue)
                    }
                }
            }
            Message::Binary(_) => {
                *close_frame = Some(CloseFrame {
                    code: close_code::UNSUPPORTED,
                    reason: "binary messages not supported".into(),
                });
                Ok(LoopControl::Disconnect)
            }
            Message::Ping(_) | Message::Pong(_) => Ok(LoopControl::Continue),
            Message::Close(_) => Ok(LoopControl::Disconnect),
        },
        Some(Err(e)) => {
            warn!(conn_id, error = %e, "websocket recv error");
            Ok(LoopControl::Disconnect)
        }
        None => {
            info!(conn_id, "websocket closed");
            Ok(LoopControl::Disconnect)
        }
    }
}

async fn forward_batch_bytes(
    batch: Utf8Bytes,
    socket: &mut WebSocket,
    msgs_out: &mut u64,
    bytes_out: &mut u64,
) -> LoopControl {
    let bytes_len = batch.len();
    match socket.send(Message::Text(batch)).await.map_err(NetError::Ws) {
        Ok(()) => {
            *msgs_out += 1;
            *bytes_out += bytes_len as u64;
            LoopControl::Continue
        }
        Err(err) => {
            warn!(error = ?err, "failed to send ship batch");
            LoopControl::Disconnect
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn disconnect_cleanup(
    conn_id: u64,
    input_tx: &mpsc::Sender<GameEvent>,
    msgs_in: u64,
    msgs_out: u64,
    bytes_in: u64,
    bytes_out: u64,
    invalid_json: u32,
    lag_recovery_count: u64,
) -> Result<(), NetError> {
    // Despawn the ship; the world task announces the removal to everyone else.
    input_tx
        .send(GameEvent::Leave { conn_id })
        .await
        .map_err(|_| NetError::InputClosed)?;

    debug!(
        conn_id,
        msgs_in,
        msgs_out,
        bytes_in,
        bytes_out,
        invalid_json,
        lag_recovery_count,
        "connection stats"
    );
    info!(conn_id, "client disconnected");
    Ok(())
}
