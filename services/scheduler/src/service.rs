//! The leader-elected scheduling loop.
//!
//! Exactly one instance drives polling at a time.  The loop ticks every
//! second: renew (or try to acquire) leadership, periodically reconcile the
//! task set against the database, then dispatch poll commands for tasks
//! whose adaptive interval has elapsed.

use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use sqlx::PgPool;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use lv_bus::Bus;
use lv_model::{keys, MatchPhase, PollCommand, ProviderName, Sport, Tier};
use lv_providers::HealthScorer;
use lv_store::repo::{mappings, matches};

use crate::config::SchedulerSettings;
use crate::polling::{compute_interval, IntervalInputs, IntervalLimits};

const LEADER_ROLE: &str = "scheduler";
/// Reconcile the task set every N ticks (~10 s at the default tick).
const RECONCILE_EVERY_N_TICKS: u32 = 10;
/// Recently finished matches stay polled for final-score confirmation.
const RECENTLY_FINISHED_WINDOW_MIN: i64 = 15;

/// One poll task per (match, tier).
struct PollTask {
    match_id: Uuid,
    sport: Sport,
    tier: Tier,
    phase: MatchPhase,
    league_provider_id: String,
    match_provider_id: String,
    provider: ProviderName,
    next_poll_at: Instant,
}

pub struct SchedulerService {
    bus: Bus,
    pool: PgPool,
    scorer: HealthScorer,
    settings: SchedulerSettings,
    tasks: HashMap<(Uuid, Tier), PollTask>,
    is_leader: bool,
}

impl SchedulerService {
    pub fn new(bus: Bus, pool: PgPool, scorer: HealthScorer, settings: SchedulerSettings) -> Self {
        SchedulerService {
            bus,
            pool,
            scorer,
            settings,
            tasks: HashMap::new(),
            is_leader: false,
        }
    }

    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        let mut reconcile_counter = RECONCILE_EVERY_N_TICKS; // reconcile on first leader tick

        loop {
            if *shutdown.borrow() {
                break;
            }

            if !self.ensure_leadership().await {
                // Not the leader: stay idle but keep trying to acquire.
                tokio::select! {
                    _ = tokio::time::sleep(self.settings.leader_renew) => {}
                    _ = shutdown.changed() => {}
                }
                continue;
            }

            reconcile_counter += 1;
            if reconcile_counter >= RECONCILE_EVERY_N_TICKS {
                if let Err(err) = self.reconcile_tasks().await {
                    error!(error = %err, "task reconcile failed");
                }
                reconcile_counter = 0;
            }

            self.dispatch_due_tasks().await;

            tokio::select! {
                _ = tokio::time::sleep(self.settings.tick_interval) => {}
                _ = shutdown.changed() => {}
            }
        }

        if self.is_leader {
            match self
                .bus
                .release_leader(LEADER_ROLE, &self.settings.instance_id)
                .await
            {
                Ok(true) => info!(instance_id = %self.settings.instance_id, "leadership released"),
                Ok(false) => {}
                Err(err) => warn!(error = %err, "leadership release failed"),
            }
        }
        self.tasks.clear();
    }

    /// Renew if leading, otherwise try to acquire.  On a failed renewal all
    /// in-memory tasks are dropped; the next leader rebuilds them from the
    /// database.
    async fn ensure_leadership(&mut self) -> bool {
        if self.is_leader {
            match self
                .bus
                .renew_leader(
                    LEADER_ROLE,
                    &self.settings.instance_id,
                    self.settings.leader_ttl,
                )
                .await
            {
                Ok(true) => return true,
                Ok(false) => {
                    warn!(instance_id = %self.settings.instance_id, "leadership lost");
                    self.is_leader = false;
                    self.tasks.clear();
                    return false;
                }
                Err(err) => {
                    // Bus unreachable: treat as lost to avoid split-brain past
                    // the lock TTL.
                    warn!(error = %err, "leadership renewal errored, assuming lost");
                    self.is_leader = false;
                    self.tasks.clear();
                    return false;
                }
            }
        }

        match self
            .bus
            .try_acquire_leader(
                LEADER_ROLE,
                &self.settings.instance_id,
                self.settings.leader_ttl,
            )
            .await
        {
            Ok(true) => {
                info!(instance_id = %self.settings.instance_id, "leadership acquired");
                self.is_leader = true;
                true
            }
            Ok(false) => false,
            Err(err) => {
                warn!(error = %err, "leadership acquire errored");
                false
            }
        }
    }

    /// Synchronize poll tasks with the active match set: create missing
    /// tasks, refresh phases, drop tasks for matches that left the set.
    async fn reconcile_tasks(&mut self) -> Result<(), sqlx::Error> {
        let now = chrono::Utc::now();
        let active = matches::discover_active(
            &self.pool,
            now,
            chrono::Duration::minutes(RECENTLY_FINISHED_WINDOW_MIN),
        )
        .await?;

        let mut active_keys = std::collections::HashSet::new();
        let mut live_by_sport: HashMap<Sport, usize> = HashMap::new();

        for m in &active {
            if m.phase.is_live() {
                *live_by_sport.entry(m.sport).or_default() += 1;
            }

            let tiers: &[Tier] = if m.phase.is_live() {
                &Tier::ALL
            } else {
                &[Tier::Scoreboard]
            };

            for &tier in tiers {
                let key = (m.match_id, tier);
                active_keys.insert(key);

                if let Some(task) = self.tasks.get_mut(&key) {
                    task.phase = m.phase;
                    continue;
                }

                let match_pids = mappings::mappings_for(&self.pool, "match", m.match_id).await?;
                let league_pids = mappings::mappings_for(&self.pool, "league", m.league_id).await?;

                // First cascade provider with a match mapping wins.
                let mut provider = ProviderName::Espn;
                let mut match_pid = String::new();
                let mut league_pid = String::new();
                for &candidate in &self.settings.provider_order {
                    if let Some(row) = match_pids
                        .iter()
                        .find(|r| r.provider == candidate.as_str())
                    {
                        provider = candidate;
                        match_pid = row.provider_id.clone();
                        league_pid = league_pids
                            .iter()
                            .find(|r| r.provider == candidate.as_str())
                            .map(|r| r.provider_id.clone())
                            .unwrap_or_default();
                        break;
                    }
                }
                if match_pid.is_empty() {
                    debug!(match_id = %m.match_id, "no provider mapping, skipping task");
                    continue;
                }

                info!(match_id = %m.match_id, tier = %tier, sport = %m.sport,
                      phase = %m.phase, "poll task created");
                self.tasks.insert(
                    key,
                    PollTask {
                        match_id: m.match_id,
                        sport: m.sport,
                        tier,
                        phase: m.phase,
                        league_provider_id: league_pid,
                        match_provider_id: match_pid,
                        provider,
                        next_poll_at: Instant::now(),
                    },
                );
            }
        }

        let stale: Vec<(Uuid, Tier)> = self
            .tasks
            .keys()
            .filter(|k| !active_keys.contains(k))
            .copied()
            .collect();
        for key in stale {
            if let Some(task) = self.tasks.remove(&key) {
                info!(match_id = %task.match_id, tier = %task.tier, "poll task removed");
            }
        }

        info!(
            active_tasks = self.tasks.len(),
            live_matches = live_by_sport.values().sum::<usize>(),
            "tasks reconciled"
        );
        Ok(())
    }

    /// Dispatch poll commands for every task whose interval has elapsed and
    /// schedule its next due time.
    async fn dispatch_due_tasks(&mut self) {
        let now = Instant::now();
        let limits = IntervalLimits {
            min_s: self.settings.min_poll_interval_s,
            max_s: self.settings.max_poll_interval_s,
            jitter_factor: self.settings.jitter_factor,
        };

        let due: Vec<(Uuid, Tier)> = self
            .tasks
            .iter()
            .filter(|(_, t)| now >= t.next_poll_at)
            .map(|(k, _)| *k)
            .collect();

        for key in due {
            let (provider, sport, phase, tier, match_id) = {
                let t = &self.tasks[&key];
                (t.provider, t.sport, t.phase, t.tier, t.match_id)
            };

            let health = self.scorer.compute(provider).await;
            let quota_usage = self.bus.quota_usage(provider).await.unwrap_or(0);
            let subscribers = self
                .bus
                .presence_count(&keys::fanout_channel(match_id, tier))
                .await
                .unwrap_or(0);

            let interval = compute_interval(
                &IntervalInputs {
                    sport,
                    phase,
                    tier,
                    subscribers,
                    provider_score: health.score,
                    quota_usage,
                    quota_limit: self.settings.rpm_limit(provider),
                },
                &limits,
            );

            let Some(task) = self.tasks.get_mut(&key) else {
                continue;
            };
            task.next_poll_at = now + Duration::from_secs_f64(interval);

            let command = PollCommand {
                canonical_match_id: task.match_id,
                tier: task.tier,
                sport: task.sport,
                league_provider_id: task.league_provider_id.clone(),
                match_provider_id: task.match_provider_id.clone(),
                provider: task.provider,
                timestamp: SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs_f64())
                    .unwrap_or(0.0),
            };
            match serde_json::to_string(&command) {
                Ok(json) => {
                    if let Err(err) = self.bus.publish(keys::POLL_COMMANDS_CHANNEL, &json).await {
                        warn!(match_id = %command.canonical_match_id, error = %err,
                              "poll command publish failed");
                    } else {
                        debug!(match_id = %command.canonical_match_id, tier = %command.tier,
                               next_in = format!("{interval:.2}"), "poll command dispatched");
                    }
                }
                Err(err) => error!(error = %err, "poll command serialization failed"),
            }
        }
    }
}
