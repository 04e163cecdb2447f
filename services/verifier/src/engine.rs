//! The continuous verification loop.
//!
//! Each cycle: load every live/break match, locate it on a secondary
//! source's league scoreboard, arbitrate confidence, and either correct the
//! canonical state through the normalizer, log the mismatch, or flag a
//! dispute.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use sqlx::PgPool;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use lv_bus::Bus;
use lv_model::{keys, LeagueRef, ProviderName, Score, Scoreboard, ScoreboardExtra, TeamRef};
use lv_normalize::Normalizer;
use lv_store::repo::{mappings, matches};
use lv_store::repo::matches::LiveMatchRow;

use crate::config::VerifierSettings;
use crate::confidence::{
    compute_confidence, current_matches_recommended, CurrentState, Disposition, SourceState,
};
use crate::limits::{CircuitBreaker, DomainRateLimiter};
use crate::sources::{
    team_names_match, EspnVerificationSource, TheSportsDbVerificationSource, VerificationSource,
};

/// ESPN league path by the league's ESPN provider id.
fn espn_league_path(espn_league_id: &str) -> Option<String> {
    let sport_prefix = match espn_league_id {
        "nba" | "wnba" | "mens-college-basketball" | "womens-college-basketball" => "basketball",
        "nhl" => "hockey",
        "mlb" => "baseball",
        "nfl" => "football",
        _ if espn_league_id.contains('.') => "soccer",
        _ => return None,
    };
    Some(format!("{sport_prefix}/{espn_league_id}"))
}

/// Threshold between the fast and slow verification cadences.
const HIGH_DEMAND_MATCH_COUNT: usize = 20;
const CONFIDENCE_TTL: Duration = Duration::from_secs(3600);

pub struct VerificationEngine {
    pool: PgPool,
    bus: Bus,
    normalizer: Normalizer,
    settings: VerifierSettings,
    rate_limiter: DomainRateLimiter,
    circuit: CircuitBreaker,
    espn: EspnVerificationSource,
    thesportsdb: TheSportsDbVerificationSource,
    semaphore: Arc<Semaphore>,
    /// league_id -> espn league path, refreshed per cycle.
    league_paths: tokio::sync::Mutex<HashMap<Uuid, Option<String>>>,
}

impl VerificationEngine {
    pub fn new(pool: PgPool, bus: Bus, settings: VerifierSettings) -> VerificationEngine {
        let normalizer = Normalizer::new(pool.clone(), bus.clone());
        VerificationEngine {
            rate_limiter: DomainRateLimiter::new(
                settings.per_domain_rpm,
                settings.per_domain_burst,
                settings.backoff_on_429,
            ),
            circuit: CircuitBreaker::new(
                settings.circuit_failure_threshold,
                settings.circuit_recovery,
            ),
            espn: EspnVerificationSource::new(settings.fetch_timeout)
                .expect("failed to build ESPN verification source"),
            thesportsdb: TheSportsDbVerificationSource::new(
                settings.thesportsdb_api_key.as_deref(),
                settings.fetch_timeout,
            )
            .expect("failed to build TheSportsDB verification source"),
            semaphore: Arc::new(Semaphore::new(settings.max_concurrent_requests)),
            league_paths: tokio::sync::Mutex::new(HashMap::new()),
            pool,
            bus,
            normalizer,
            settings,
        }
    }

    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("verification loop started");
        loop {
            if *shutdown.borrow() {
                break;
            }

            let live = match matches::live_matches(&self.pool).await {
                Ok(rows) => rows,
                Err(err) => {
                    error!(error = %err, "live match query failed");
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_secs(30)) => {}
                        _ = shutdown.changed() => {}
                    }
                    continue;
                }
            };

            if live.is_empty() {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(60)) => {}
                    _ = shutdown.changed() => {}
                }
                continue;
            }

            for snap in &live {
                if *shutdown.borrow() {
                    break;
                }
                if let Err(err) = self.verify_one(snap).await {
                    error!(match_id = %snap.match_id, error = %err, "verification failed");
                }
            }

            let delay = self.cycle_delay(live.len());
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => {}
            }
        }
        info!("verification loop stopped");
    }

    /// uniform(5, 10) s under light load, uniform(20, 60) s otherwise, with
    /// +/-20% jitter.
    fn cycle_delay(&self, match_count: usize) -> Duration {
        let (lo, hi) = if match_count <= HIGH_DEMAND_MATCH_COUNT {
            self.settings.high_demand_interval
        } else {
            self.settings.low_demand_interval
        };
        let mut rng = rand::thread_rng();
        let base = rng.gen_range(lo..=hi);
        let jitter = base * self.settings.jitter_factor * (2.0 * rng.gen::<f64>() - 1.0);
        Duration::from_secs_f64((base + jitter).max(1.0))
    }

    async fn league_path_for(&self, league_id: Uuid) -> Option<String> {
        {
            let cache = self.league_paths.lock().await;
            if let Some(cached) = cache.get(&league_id) {
                return cached.clone();
            }
        }
        let resolved = match mappings::mappings_for(&self.pool, "league", league_id).await {
            Ok(rows) => rows
                .iter()
                .find(|r| r.provider == ProviderName::Espn.as_str())
                .and_then(|r| espn_league_path(&r.provider_id)),
            Err(err) => {
                warn!(league_id = %league_id, error = %err, "league mapping lookup failed");
                None
            }
        };
        self.league_paths
            .lock()
            .await
            .insert(league_id, resolved.clone());
        resolved
    }

    /// Fetch one source's view of the match, under the per-domain rate
    /// limit, the circuit breaker, and the global concurrency cap.
    async fn fetch_source_states(
        &self,
        source: &dyn VerificationSource,
        league_path: &str,
        snap: &LiveMatchRow,
    ) -> Vec<SourceState> {
        let url = source.base_url();

        if !self.rate_limiter.allow_request(url).await
            && !self
                .rate_limiter
                .wait_for_slot(url, Duration::from_secs(15))
                .await
        {
            debug!(source = source.source_name(), "rate limit slot unavailable, skipping");
            return Vec::new();
        }
        if !self.circuit.allow_request(url).await {
            debug!(source = source.source_name(), "circuit open, skipping");
            return Vec::new();
        }

        let result = {
            let _permit = self.semaphore.acquire().await;
            source.fetch_league_scoreboard(league_path, snap.sport).await
        };

        match result {
            Ok(reports) => {
                self.circuit.record_success(url).await;
                reports
                    .into_iter()
                    .find(|r| {
                        team_names_match(&snap.home_name, &snap.away_name, &r.home_name, &r.away_name)
                    })
                    .map(|r| vec![r.state])
                    .unwrap_or_default()
            }
            Err(err) => {
                if err.is_rate_limited() {
                    self.rate_limiter.record_429(url).await;
                }
                self.circuit.record_failure(url).await;
                debug!(source = source.source_name(), league_path, error = %err,
                       "source scoreboard fetch failed");
                Vec::new()
            }
        }
    }

    async fn verify_one(&self, snap: &LiveMatchRow) -> Result<(), lv_bus::BusError> {
        let current = CurrentState {
            score_home: snap.score_home,
            score_away: snap.score_away,
            phase: snap.phase,
            clock: snap.clock.clone(),
            period: snap.period.clone(),
            version: snap.version,
        };

        let mut verified: Vec<SourceState> = Vec::new();
        if let Some(path) = self.league_path_for(snap.league_id).await {
            verified.extend(self.fetch_source_states(&self.espn, &path, snap).await);
        }
        verified.extend(self.fetch_source_states(&self.thesportsdb, "", snap).await);

        self.set_last_checked(snap.match_id).await?;
        if verified.is_empty() {
            return Ok(());
        }

        let (confidence, _disposition, recommended) = compute_confidence(&current, &verified);
        self.bus
            .set_value(
                &keys::confidence_key(snap.match_id),
                &confidence.to_string(),
                CONFIDENCE_TTL,
            )
            .await?;

        let Some(recommended) = recommended else {
            return Ok(());
        };
        if current_matches_recommended(&current, recommended) {
            return Ok(());
        }

        let disposition = if confidence >= self.settings.confidence_high {
            Disposition::High
        } else if confidence >= self.settings.confidence_medium {
            Disposition::Medium
        } else {
            Disposition::Disputed
        };

        match disposition {
            Disposition::High => {
                let corrected = self.corrected_scoreboard(snap, recommended);
                match self
                    .normalizer
                    .normalize_scoreboard(snap.match_id, &corrected, ProviderName::Espn)
                    .await
                {
                    Ok(true) => info!(match_id = %snap.match_id, confidence,
                        score = format!("{}-{}", recommended.score_home, recommended.score_away),
                        "verification correction applied"),
                    Ok(false) => {}
                    Err(err) => warn!(match_id = %snap.match_id, error = %err,
                                      "verification correction rejected"),
                }
            }
            Disposition::Medium => {
                warn!(match_id = %snap.match_id, confidence,
                      ours = format!("{}-{} {}", current.score_home, current.score_away, current.phase),
                      theirs = format!("{}-{} {}", recommended.score_home, recommended.score_away, recommended.phase),
                      "verification mismatch at medium confidence, rechecking next cycle");
            }
            Disposition::Disputed => {
                let payload = serde_json::json!({
                    "match_id": snap.match_id,
                    "current": {
                        "score_home": current.score_home,
                        "score_away": current.score_away,
                        "phase": current.phase,
                    },
                    "verified_sources": verified.iter().map(|v| serde_json::json!({
                        "source": v.source,
                        "score_home": v.score_home,
                        "score_away": v.score_away,
                        "phase": v.phase,
                    })).collect::<Vec<_>>(),
                    "confidence": confidence,
                    "at": Utc::now().to_rfc3339(),
                });
                self.bus
                    .flag_dispute(
                        snap.match_id,
                        &payload.to_string(),
                        self.settings.dispute_ttl,
                    )
                    .await?;
                warn!(match_id = %snap.match_id, confidence, "verification dispute flagged");
            }
        }
        Ok(())
    }

    async fn set_last_checked(&self, match_id: Uuid) -> Result<(), lv_bus::BusError> {
        self.bus
            .set_value(
                &keys::last_checked_key(match_id),
                &Utc::now().to_rfc3339(),
                self.settings.last_checked_ttl,
            )
            .await
    }

    /// Rebuild a tier-0 payload around the recommended state so the
    /// correction flows through the exact same normalize path as ingest.
    fn corrected_scoreboard(&self, snap: &LiveMatchRow, recommended: &SourceState) -> Scoreboard {
        Scoreboard {
            match_id: snap.match_id,
            league: LeagueRef {
                id: snap.league_id,
                name: snap.league_name.clone(),
                sport: snap.sport,
                country: snap.league_country.clone(),
                logo_url: None,
            },
            home_team: TeamRef {
                id: snap.home_team_id,
                name: snap.home_name.clone(),
                short_name: snap.home_short_name.clone(),
                logo_url: None,
            },
            away_team: TeamRef {
                id: snap.away_team_id,
                name: snap.away_name.clone(),
                short_name: snap.away_short_name.clone(),
                logo_url: None,
            },
            score: Score::new(recommended.score_home, recommended.score_away),
            phase: recommended.phase,
            clock: recommended.clock.clone(),
            period: recommended.period.clone(),
            start_time: snap.start_time,
            extra: ScoreboardExtra::default(),
            version: 0,
            seq: 0,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::espn_league_path;

    #[test]
    fn league_paths_cover_soccer_and_us_sports() {
        assert_eq!(espn_league_path("eng.1").as_deref(), Some("soccer/eng.1"));
        assert_eq!(
            espn_league_path("uefa.champions").as_deref(),
            Some("soccer/uefa.champions")
        );
        assert_eq!(espn_league_path("nba").as_deref(), Some("basketball/nba"));
        assert_eq!(espn_league_path("nhl").as_deref(), Some("hockey/nhl"));
        assert_eq!(espn_league_path("mlb").as_deref(), Some("baseball/mlb"));
        assert_eq!(espn_league_path("nfl").as_deref(), Some("football/nfl"));
        assert_eq!(espn_league_path("totally-unknown"), None);
    }
}
