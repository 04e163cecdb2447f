//! Builder service wiring: fan-out subscribers plus the periodic sweep.
//!
//! Two pattern subscriptions drive everything: tier-0 deltas feed synthetic
//! generation, tier-1 deltas feed reconciliation.  Previous scoreboards are
//! cached in memory and mirrored to the bus so a restart does not re-emit a
//! full match's worth of synthetic events.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use sqlx::PgPool;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use lv_bus::Bus;
use lv_model::{keys, MatchEvent, Scoreboard, Sport, Tier};
use lv_store::repo::{events, matches};

use crate::reconcile::ReconcileEngine;
use crate::synthetic;

/// Previous-scoreboard mirror TTL.
const PREV_SNAP_TTL: Duration = Duration::from_secs(3600);
/// Sport lookups are immutable; cache generously.
const SPORT_CACHE_TTL: Duration = Duration::from_secs(7200);
/// Terminal matches are swept from the in-memory map on this cadence.
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

pub struct BuilderService {
    bus: Bus,
    pool: PgPool,
    reconciler: ReconcileEngine,
    prev_scoreboards: Mutex<HashMap<Uuid, Scoreboard>>,
}

impl BuilderService {
    pub fn new(bus: Bus, pool: PgPool) -> Arc<BuilderService> {
        Arc::new(BuilderService {
            bus,
            reconciler: ReconcileEngine::new(pool.clone()),
            pool,
            prev_scoreboards: Mutex::new(HashMap::new()),
        })
    }

    pub async fn run(self: Arc<Self>, shutdown: watch::Receiver<bool>) {
        let scoreboard_task = tokio::spawn(self.clone().subscriber_loop(
            keys::SCOREBOARD_FANOUT_PATTERN,
            shutdown.clone(),
            SubscriberKind::Scoreboard,
        ));
        let events_task = tokio::spawn(self.clone().subscriber_loop(
            keys::EVENTS_FANOUT_PATTERN,
            shutdown.clone(),
            SubscriberKind::Events,
        ));
        let sweep_task = tokio::spawn(self.clone().sweep_loop(shutdown));

        let _ = tokio::join!(scoreboard_task, events_task, sweep_task);
        info!("builder service stopped");
    }

    /// One pattern subscription pumped until shutdown, reconnecting with
    /// bounded backoff on bus loss.
    async fn subscriber_loop(
        self: Arc<Self>,
        pattern: &'static str,
        mut shutdown: watch::Receiver<bool>,
        kind: SubscriberKind,
    ) {
        let mut backoff = Duration::from_secs(1);
        'reconnect: while !*shutdown.borrow() {
            let mut pubsub = match self.bus.pubsub().await {
                Ok(ps) => ps,
                Err(err) => {
                    warn!(pattern, error = %err, "bus subscribe failed, retrying");
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = shutdown.changed() => {}
                    }
                    backoff = (backoff * 2).min(Duration::from_secs(30));
                    continue;
                }
            };
            if let Err(err) = pubsub.psubscribe(pattern).await {
                warn!(pattern, error = %err, "pattern subscribe failed");
                continue;
            }
            backoff = Duration::from_secs(1);
            info!(pattern, "builder subscribed");

            let mut stream = pubsub.on_message();
            loop {
                tokio::select! {
                    message = stream.next() => {
                        let Some(message) = message else {
                            warn!(pattern, "bus connection lost, reconnecting");
                            continue 'reconnect;
                        };
                        let channel = message.get_channel_name().to_owned();
                        let payload: String = message.get_payload().unwrap_or_default();
                        match kind {
                            SubscriberKind::Scoreboard => {
                                self.handle_scoreboard_delta(&channel, &payload).await;
                            }
                            SubscriberKind::Events => {
                                self.handle_events_delta(&channel, &payload).await;
                            }
                        }
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break 'reconnect;
                        }
                    }
                }
            }
        }
    }

    async fn handle_scoreboard_delta(&self, channel: &str, payload: &str) {
        let Some((match_id, Tier::Scoreboard)) = keys::parse_fanout_channel(channel) else {
            return;
        };
        let current: Scoreboard = match serde_json::from_str(payload) {
            Ok(board) => board,
            Err(err) => {
                warn!(match_id = %match_id, error = %err, "unparseable scoreboard delta");
                return;
            }
        };

        let Some(sport) = self.resolve_sport(match_id).await else {
            debug!(match_id = %match_id, "sport unknown, skipping synthetic generation");
            return;
        };

        let previous = self.load_previous(match_id).await;
        let generated = synthetic::generate(match_id, sport, previous.as_ref(), &current);

        if !generated.is_empty() {
            match self.persist_synthetic(match_id, &generated).await {
                Ok(accepted) if accepted > 0 => {
                    info!(match_id = %match_id, count = accepted,
                          types = ?generated.iter().map(|e| e.event_type).collect::<Vec<_>>(),
                          "synthetic events generated");
                }
                Ok(_) => {}
                Err(err) => error!(match_id = %match_id, error = %err,
                                   "synthetic event persistence failed"),
            }
        }

        self.save_previous(match_id, current).await;
    }

    async fn handle_events_delta(&self, channel: &str, payload: &str) {
        let Some((match_id, Tier::Events)) = keys::parse_fanout_channel(channel) else {
            return;
        };
        let batch: Vec<MatchEvent> = match serde_json::from_str(payload) {
            Ok(events) => events,
            Err(err) => {
                warn!(match_id = %match_id, error = %err, "unparseable events delta");
                return;
            }
        };
        // Only authoritative events retire synthetic ones; our own synthetic
        // batches come back over the same channel.
        let real: Vec<MatchEvent> = batch.into_iter().filter(|e| !e.synthetic).collect();
        if real.is_empty() {
            return;
        }

        match self.reconciler.reconcile(match_id, &real).await {
            Ok(superseded) if superseded > 0 => {
                info!(match_id = %match_id, superseded, "reconciliation completed");
            }
            Ok(_) => {}
            Err(err) => error!(match_id = %match_id, error = %err, "reconciliation failed"),
        }
    }

    /// Persist synthetic events with per-match seqs, mirror them into the
    /// replay stream, and announce the batch on tier 1.
    async fn persist_synthetic(
        &self,
        match_id: Uuid,
        generated: &[MatchEvent],
    ) -> Result<usize, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let mut accepted = Vec::new();
        for event in generated {
            if let Some(seq) = events::insert_if_absent(&mut tx, event).await? {
                let mut stored = event.clone();
                stored.seq = seq;
                accepted.push(stored);
            }
        }
        tx.commit().await?;

        for event in &accepted {
            if let Ok(json) = serde_json::to_string(event) {
                if let Err(err) = self.bus.append_event_stream(match_id, &json).await {
                    warn!(match_id = %match_id, error = %err, "event stream append failed");
                }
            }
        }
        if !accepted.is_empty() {
            if let Ok(batch) = serde_json::to_string(&accepted) {
                if let Err(err) = self.bus.publish_delta(match_id, Tier::Events, &batch).await {
                    warn!(match_id = %match_id, error = %err, "synthetic batch publish failed");
                }
            }
        }
        Ok(accepted.len())
    }

    async fn resolve_sport(&self, match_id: Uuid) -> Option<Sport> {
        let cache_key = keys::sport_cache_key(match_id);
        if let Ok(Some(cached)) = self.bus.get_value(&cache_key).await {
            if let Some(sport) = Sport::parse(&cached) {
                return Some(sport);
            }
        }
        match matches::sport_of(&self.pool, match_id).await {
            Ok(Some(sport)) => {
                let _ = self
                    .bus
                    .set_value(&cache_key, sport.as_str(), SPORT_CACHE_TTL)
                    .await;
                Some(sport)
            }
            Ok(None) => None,
            Err(err) => {
                warn!(match_id = %match_id, error = %err, "sport lookup failed");
                None
            }
        }
    }

    async fn load_previous(&self, match_id: Uuid) -> Option<Scoreboard> {
        if let Some(board) = self.prev_scoreboards.lock().await.get(&match_id) {
            return Some(board.clone());
        }
        let raw = self
            .bus
            .get_value(&keys::prev_snapshot_key(match_id))
            .await
            .ok()??;
        match serde_json::from_str::<Scoreboard>(&raw) {
            Ok(board) => {
                self.prev_scoreboards
                    .lock()
                    .await
                    .insert(match_id, board.clone());
                Some(board)
            }
            Err(err) => {
                warn!(match_id = %match_id, error = %err, "previous scoreboard parse error");
                None
            }
        }
    }

    async fn save_previous(&self, match_id: Uuid, board: Scoreboard) {
        if let Ok(json) = serde_json::to_string(&board) {
            if let Err(err) = self
                .bus
                .set_value(&keys::prev_snapshot_key(match_id), &json, PREV_SNAP_TTL)
                .await
            {
                warn!(match_id = %match_id, error = %err, "previous scoreboard mirror failed");
            }
        }
        self.prev_scoreboards.lock().await.insert(match_id, board);
    }

    /// Evict terminal matches from the in-memory previous map.
    async fn sweep_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(SWEEP_INTERVAL) => {}
                _ = shutdown.changed() => {}
            }
            if *shutdown.borrow() {
                break;
            }
            let mut prev = self.prev_scoreboards.lock().await;
            let before = prev.len();
            prev.retain(|_, board| !board.phase.is_terminal());
            let removed = before - prev.len();
            drop(prev);
            if removed > 0 {
                info!(removed, "previous scoreboard cache swept");
            }
        }
    }
}

enum SubscriberKind {
    Scoreboard,
    Events,
}
