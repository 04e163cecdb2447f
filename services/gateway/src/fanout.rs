//! Bus -> WebSocket fan-out bridge.
//!
//! A single pattern subscription on `fanout:match:*:tier:*` feeds every
//! connection on this instance.  Delivery to clients is best-effort: a full
//! outbound queue drops the frame for that connection (it will converge on
//! the next delta or on replay after reconnect).

use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use lv_model::keys;
use lv_model::ws::ServerMessage;

use crate::state::AppState;

pub async fn run_bridge(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let mut backoff = Duration::from_secs(1);
    'reconnect: while !*shutdown.borrow() {
        let mut pubsub = match state.bus.pubsub().await {
            Ok(ps) => ps,
            Err(err) => {
                warn!(error = %err, delay_s = backoff.as_secs(), "bridge subscribe failed, retrying");
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    _ = shutdown.changed() => {}
                }
                backoff = (backoff * 2).min(Duration::from_secs(30));
                continue;
            }
        };
        if let Err(err) = pubsub.psubscribe(keys::FANOUT_PATTERN).await {
            warn!(error = %err, "fan-out pattern subscribe failed");
            continue;
        }
        backoff = Duration::from_secs(1);
        info!(pattern = keys::FANOUT_PATTERN, "fan-out bridge started");

        let mut stream = pubsub.on_message();
        loop {
            tokio::select! {
                message = stream.next() => {
                    let Some(message) = message else {
                        warn!("bus connection lost, bridge reconnecting");
                        continue 'reconnect;
                    };
                    let channel = message.get_channel_name().to_owned();
                    let payload: String = message.get_payload().unwrap_or_default();
                    fan_out(&state, &channel, &payload).await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break 'reconnect;
                    }
                }
            }
        }
    }
    info!("fan-out bridge stopped");
}

async fn fan_out(state: &AppState, channel: &str, payload: &str) {
    let Some((match_id, tier)) = keys::parse_fanout_channel(channel) else {
        return;
    };
    let senders = state.registry.senders_for(channel).await;
    if senders.is_empty() {
        return;
    }
    let Ok(data) = serde_json::from_str::<serde_json::Value>(payload) else {
        debug!(channel, "unparseable fan-out payload");
        return;
    };

    let message = ServerMessage::delta(match_id, tier, data);
    let mut delivered = 0usize;
    for sender in &senders {
        // try_send keeps one slow client from stalling the whole bridge.
        if sender.try_send(message.clone()).is_ok() {
            delivered += 1;
        }
    }
    debug!(channel, subscribers = senders.len(), delivered, "delta fanned out");
}
