//! Per-connection WebSocket session handling.
//!
//! Each session runs one `tokio::select!` loop over the socket, its outbound
//! queue, the heartbeat timer, and the shutdown signal.  Protocol errors get
//! a typed `error` frame and the connection stays open; only heartbeat
//! timeouts and shutdown close it.

use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use lv_model::ws::{close_codes, error_codes, ClientOp, ServerMessage};
use lv_model::{keys, Tier};

use crate::state::{AppState, MAX_SUBSCRIPTIONS_PER_CONN};

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(10);
/// Presence counter TTL; refreshed on every subscribe.
const PRESENCE_TTL: Duration = Duration::from_secs(120);
/// Event-stream entries replayed to a fresh tier-1 subscriber.
const EVENT_REPLAY_LIMIT: usize = 100;
/// Outbound queue depth per connection; a slow consumer drops deltas rather
/// than stalling the bridge.
const OUTBOUND_QUEUE: usize = 256;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn send_json(socket: &mut WebSocket, message: &ServerMessage) -> bool {
    match serde_json::to_string(message) {
        Ok(json) => socket.send(Message::Text(json)).await.is_ok(),
        Err(_) => true,
    }
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4().simple().to_string()[..12].to_owned();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_QUEUE);
    state.registry.register(&connection_id, outbound_tx).await;
    info!(connection_id, "ws connected");

    // Welcome frame so the client learns its identity and limits.
    let welcome = ServerMessage::state(serde_json::json!({
        "connection_id": connection_id,
        "max_subscriptions": MAX_SUBSCRIPTIONS_PER_CONN,
        "heartbeat_interval": HEARTBEAT_INTERVAL.as_secs(),
    }));
    if !send_json(&mut socket, &welcome).await {
        cleanup(&state, &connection_id).await;
        return;
    }

    let mut last_activity = Instant::now();
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await; // immediate first tick

    let mut shutdown = state.shutdown.clone();
    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        last_activity = Instant::now();
                        handle_client_frame(&mut socket, &state, &connection_id, &text).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        last_activity = Instant::now();
                        let _ = socket.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        last_activity = Instant::now();
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!(connection_id, "ws disconnected");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        debug!(connection_id, error = %err, "ws receive error");
                        break;
                    }
                }
            }
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(message) => {
                        if !send_json(&mut socket, &message).await {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = heartbeat.tick() => {
                if last_activity.elapsed() > HEARTBEAT_INTERVAL + HEARTBEAT_TIMEOUT {
                    warn!(connection_id, "heartbeat timeout, closing");
                    let _ = socket.send(Message::Close(Some(CloseFrame {
                        code: close_codes::HEARTBEAT_TIMEOUT,
                        reason: "heartbeat timeout".into(),
                    }))).await;
                    break;
                }
                if !send_json(&mut socket, &ServerMessage::ping()).await {
                    break;
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    let _ = socket.send(Message::Close(Some(CloseFrame {
                        code: close_codes::SERVER_SHUTDOWN,
                        reason: "server shutdown".into(),
                    }))).await;
                    break;
                }
            }
        }
    }

    cleanup(&state, &connection_id).await;
}

async fn cleanup(state: &AppState, connection_id: &str) {
    let channels = state.registry.unregister(connection_id).await;
    for channel in channels {
        if let Err(err) = state.bus.decr_presence(&channel, PRESENCE_TTL).await {
            debug!(connection_id, channel, error = %err, "presence decrement failed");
        }
    }
}

async fn send_error(socket: &mut WebSocket, code: &str, message: &str) {
    let _ = send_json(socket, &ServerMessage::error(code, message)).await;
}

async fn handle_client_frame(
    socket: &mut WebSocket,
    state: &AppState,
    connection_id: &str,
    text: &str,
) {
    let op: ClientOp = match serde_json::from_str(text) {
        Ok(op) => op,
        Err(err) => {
            let code = if text.trim_start().starts_with('{') && text.contains("\"op\"") {
                error_codes::UNKNOWN_OP
            } else {
                error_codes::INVALID_JSON
            };
            debug!(connection_id, error = %err, "bad client frame");
            send_error(socket, code, "malformed or unknown operation").await;
            return;
        }
    };

    match op {
        ClientOp::Subscribe { match_id, tiers } => {
            handle_subscribe(socket, state, connection_id, &match_id, &tiers).await;
        }
        ClientOp::Unsubscribe { match_id, tiers } => {
            handle_unsubscribe(socket, state, connection_id, &match_id, &tiers).await;
        }
        ClientOp::Ping => {
            let _ = send_json(socket, &ServerMessage::pong()).await;
        }
    }
}

fn validated_tiers(raw: &[u8]) -> Option<Vec<Tier>> {
    let tiers: Vec<Tier> = raw.iter().filter_map(|&t| Tier::from_u8(t)).collect();
    if tiers.is_empty() {
        None
    } else {
        Some(tiers)
    }
}

async fn handle_subscribe(
    socket: &mut WebSocket,
    state: &AppState,
    connection_id: &str,
    match_id: &str,
    raw_tiers: &[u8],
) {
    let Ok(match_id) = Uuid::parse_str(match_id) else {
        send_error(socket, error_codes::INVALID_MATCH_ID, "match_id must be a valid UUID").await;
        return;
    };
    let Some(tiers) = validated_tiers(raw_tiers) else {
        send_error(socket, error_codes::INVALID_TIER, "tiers must be within 0..=2").await;
        return;
    };

    let channels: Vec<String> = tiers
        .iter()
        .map(|&tier| keys::fanout_channel(match_id, tier))
        .collect();

    let (added, all) = match state.registry.subscribe(connection_id, &channels).await {
        Ok(result) => result,
        Err(_) => {
            send_error(
                socket,
                error_codes::SUBSCRIPTION_LIMIT,
                &format!("maximum {MAX_SUBSCRIPTIONS_PER_CONN} subscriptions per connection"),
            )
            .await;
            return;
        }
    };

    for channel in &added {
        if let Err(err) = state.bus.incr_presence(channel, PRESENCE_TTL).await {
            debug!(connection_id, channel, error = %err, "presence increment failed");
        }
    }

    debug!(connection_id, match_id = %match_id, channels = ?added, "ws subscribed");
    let _ = send_json(
        socket,
        &ServerMessage::state(serde_json::json!({ "subscribed": all })),
    )
    .await;

    // Replay-on-subscribe: latest snapshot per tier, then the event stream
    // tail for tier 1.
    for &tier in &tiers {
        send_replay(socket, state, match_id, tier).await;
    }
}

async fn send_replay(socket: &mut WebSocket, state: &AppState, match_id: Uuid, tier: Tier) {
    match state
        .bus
        .get_snapshot(&keys::snapshot_key(match_id, tier))
        .await
    {
        Ok(Some(raw)) => {
            if let Ok(data) = serde_json::from_str::<serde_json::Value>(&raw) {
                let _ = send_json(socket, &ServerMessage::snapshot(match_id, tier, data)).await;
            }
        }
        Ok(None) => {}
        Err(err) => debug!(match_id = %match_id, tier = %tier, error = %err,
                           "snapshot fetch failed"),
    }

    if tier == Tier::Events {
        match state.bus.event_stream_tail(match_id, EVENT_REPLAY_LIMIT).await {
            Ok(entries) if !entries.is_empty() => {
                let events: Vec<serde_json::Value> = entries
                    .iter()
                    .filter_map(|e| serde_json::from_str(e).ok())
                    .collect();
                if !events.is_empty() {
                    let _ = send_json(
                        socket,
                        &ServerMessage::snapshot(match_id, tier, serde_json::Value::Array(events)),
                    )
                    .await;
                }
            }
            Ok(_) => {}
            Err(err) => debug!(match_id = %match_id, error = %err, "event tail fetch failed"),
        }
    }
}

async fn handle_unsubscribe(
    socket: &mut WebSocket,
    state: &AppState,
    connection_id: &str,
    match_id: &str,
    raw_tiers: &[u8],
) {
    let Ok(match_id) = Uuid::parse_str(match_id) else {
        send_error(socket, error_codes::INVALID_MATCH_ID, "match_id must be a valid UUID").await;
        return;
    };
    let channels: Vec<String> = raw_tiers
        .iter()
        .filter_map(|&t| Tier::from_u8(t))
        .map(|tier| keys::fanout_channel(match_id, tier))
        .collect();

    let (removed, remaining) = state.registry.unsubscribe(connection_id, &channels).await;
    for channel in &removed {
        if let Err(err) = state.bus.decr_presence(channel, PRESENCE_TTL).await {
            debug!(connection_id, channel, error = %err, "presence decrement failed");
        }
    }

    let _ = send_json(
        socket,
        &ServerMessage::state(serde_json::json!({ "subscribed": remaining })),
    )
    .await;
}
