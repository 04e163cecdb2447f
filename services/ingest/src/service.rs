//! Poll-command consumer.
//!
//! A single subscription on `ingest:poll_commands` feeds a bounded pool of
//! in-flight polls.  Commands are never requeued: a failed poll records a
//! health sample and waits for the scheduler to reissue on the next due
//! interval.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{watch, Semaphore};
use tracing::{error, info, warn};

use lv_bus::Bus;
use lv_model::{keys, PollCommand, Tier};
use lv_normalize::{NormalizeError, Normalizer};
use lv_providers::{ProviderRegistry, TierPayload};

pub struct IngestService {
    bus: Bus,
    registry: Arc<ProviderRegistry>,
    normalizer: Normalizer,
    semaphore: Arc<Semaphore>,
}

impl IngestService {
    pub fn new(
        bus: Bus,
        registry: Arc<ProviderRegistry>,
        normalizer: Normalizer,
        max_concurrent: usize,
    ) -> IngestService {
        IngestService {
            bus,
            registry,
            normalizer,
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    /// Subscribe and pump commands until shutdown.  A dropped bus connection
    /// is re-established with bounded backoff; commands in flight during the
    /// gap are simply lost to the next scheduler tick.
    pub async fn listen(&self, mut shutdown: watch::Receiver<bool>) {
        let mut backoff = Duration::from_secs(1);
        'reconnect: while !*shutdown.borrow() {
            let mut pubsub = match self.bus.pubsub().await {
                Ok(ps) => ps,
                Err(err) => {
                    warn!(error = %err, delay_s = backoff.as_secs(), "bus subscribe failed, retrying");
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = shutdown.changed() => {}
                    }
                    backoff = (backoff * 2).min(Duration::from_secs(30));
                    continue;
                }
            };
            if let Err(err) = pubsub.subscribe(keys::POLL_COMMANDS_CHANNEL).await {
                warn!(error = %err, "poll command subscribe failed");
                continue;
            }
            backoff = Duration::from_secs(1);
            info!(channel = keys::POLL_COMMANDS_CHANNEL, "ingest listening");

            let mut stream = pubsub.on_message();
            loop {
                tokio::select! {
                    message = stream.next() => {
                        let Some(message) = message else {
                            warn!("bus connection lost, reconnecting");
                            continue 'reconnect;
                        };
                        let payload: String = message.get_payload().unwrap_or_default();
                        match serde_json::from_str::<PollCommand>(&payload) {
                            Ok(command) => self.dispatch(command).await,
                            Err(err) => warn!(error = %err, "invalid poll command json"),
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
        info!("ingest listener stopped");
    }

    /// Run one command under the concurrency cap.
    async fn dispatch(&self, command: PollCommand) {
        let permit = match self.semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };
        let registry = self.registry.clone();
        let normalizer = self.normalizer.clone();
        tokio::spawn(async move {
            let _permit = permit;
            process_command(&registry, &normalizer, command).await;
        });
    }
}

async fn process_command(
    registry: &ProviderRegistry,
    normalizer: &Normalizer,
    command: PollCommand,
) {
    let match_id = command.canonical_match_id;
    let (provider_name, provider) = match registry
        .select(match_id, command.tier, command.sport)
        .await
    {
        Ok(selected) => selected,
        Err(err) => {
            warn!(match_id = %match_id, tier = %command.tier, error = %err,
                  "no provider for poll command");
            return;
        }
    };

    let outcome = match command.tier {
        Tier::Scoreboard => {
            provider
                .fetch_scoreboard(
                    command.sport,
                    &command.league_provider_id,
                    &command.match_provider_id,
                )
                .await
        }
        Tier::Events => {
            provider
                .fetch_events(
                    command.sport,
                    &command.league_provider_id,
                    &command.match_provider_id,
                )
                .await
        }
        Tier::Stats => {
            provider
                .fetch_stats(
                    command.sport,
                    &command.league_provider_id,
                    &command.match_provider_id,
                )
                .await
        }
    };
    registry.record_outcome(&outcome).await;

    if !outcome.success {
        warn!(match_id = %match_id, tier = %command.tier, provider = %provider_name,
              error = outcome.error.as_deref().unwrap_or("unknown"),
              rate_limited = outcome.rate_limited, "tier fetch failed");
        return;
    }

    let result: Result<(), NormalizeError> = match outcome.payload {
        Some(TierPayload::Scoreboard(board)) => normalizer
            .normalize_scoreboard(match_id, &board, provider_name)
            .await
            .map(|_| ()),
        Some(TierPayload::Events(events)) => normalizer
            .normalize_events(match_id, events, provider_name)
            .await
            .map(|_| ()),
        Some(TierPayload::Stats(stats)) => normalizer
            .normalize_stats(match_id, &stats, provider_name)
            .await
            .map(|_| ()),
        // Success with nothing to report for this tier.
        None => Ok(()),
    };

    match result {
        Ok(()) => {}
        // Invariant rejections are already logged at error by the normalizer.
        Err(NormalizeError::Invariant(_)) => {}
        Err(err) => {
            error!(match_id = %match_id, tier = %command.tier, error = %err,
                   "normalization failed");
        }
    }
}
