//! Provider registry: pin-aware, health-gated cascade selection.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use lv_bus::Bus;
use lv_model::{HealthSample, ProviderName, Sport, Tier};

use crate::health::HealthScorer;
use crate::outcome::FetchOutcome;
use crate::provider::SportsProvider;

#[derive(Debug, Error)]
pub enum SelectError {
    #[error("no provider available for match={match_id} tier={tier} sport={sport}")]
    NoProvider {
        match_id: Uuid,
        tier: Tier,
        sport: Sport,
    },
}

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Cascade order of preference; ties in health score resolve to the
    /// earlier entry.
    pub cascade: Vec<ProviderName>,
    pub health_threshold: f64,
    /// Anti-flap pin TTL.
    pub flap_ttl: Duration,
    pub health_window: Duration,
    /// Requests-per-minute ceiling per provider.
    pub rpm_limits: HashMap<ProviderName, i64>,
}

impl RegistryConfig {
    fn rpm_limit(&self, provider: ProviderName) -> i64 {
        self.rpm_limits.get(&provider).copied().unwrap_or(1000)
    }
}

pub struct ProviderRegistry {
    providers: HashMap<ProviderName, Arc<dyn SportsProvider>>,
    scorer: HealthScorer,
    bus: Bus,
    config: RegistryConfig,
}

impl ProviderRegistry {
    pub fn new(
        providers: Vec<Arc<dyn SportsProvider>>,
        scorer: HealthScorer,
        bus: Bus,
        config: RegistryConfig,
    ) -> ProviderRegistry {
        let providers = providers.into_iter().map(|p| (p.name(), p)).collect();
        ProviderRegistry {
            providers,
            scorer,
            bus,
            config,
        }
    }

    pub fn get(&self, name: ProviderName) -> Option<Arc<dyn SportsProvider>> {
        self.providers.get(&name).cloned()
    }

    pub fn scorer(&self) -> &HealthScorer {
        &self.scorer
    }

    async fn under_quota(&self, provider: ProviderName) -> bool {
        match self.bus.quota_usage(provider).await {
            Ok(usage) => usage < self.config.rpm_limit(provider),
            // A bus hiccup must not stall polling; assume quota is fine.
            Err(_) => true,
        }
    }

    /// Pick a provider for `(match_id, tier, sport)`.
    ///
    /// 1. An unexpired pin that is still healthy, sport-compatible and under
    ///    quota wins outright.
    /// 2. Otherwise the cascade is scored and the best healthy candidate is
    ///    pinned for the anti-flap TTL.
    /// 3. Desperation: if nothing clears the threshold, the first cascade
    ///    provider supporting the sport is used anyway.
    pub async fn select(
        &self,
        match_id: Uuid,
        tier: Tier,
        sport: Sport,
    ) -> Result<(ProviderName, Arc<dyn SportsProvider>), SelectError> {
        if let Ok(Some(pinned)) = self.bus.pinned_selection(match_id, tier).await {
            if let Some(provider) = self.providers.get(&pinned) {
                if provider.supports(sport) {
                    let health = self.scorer.compute(pinned).await;
                    if health.score >= self.config.health_threshold
                        && self.under_quota(pinned).await
                    {
                        return Ok((pinned, provider.clone()));
                    }
                    info!(provider = %pinned, match_id = %match_id, tier = %tier,
                          score = health.score, "pinned provider unfit, re-selecting");
                }
            }
        }

        let mut candidates: Vec<(f64, ProviderName)> = Vec::new();
        for &name in &self.config.cascade {
            let Some(provider) = self.providers.get(&name) else {
                continue;
            };
            if !provider.supports(sport) {
                continue;
            }
            let health = self.scorer.compute(name).await;
            if health.score < self.config.health_threshold {
                debug!(provider = %name, score = health.score,
                       threshold = self.config.health_threshold, "provider below threshold");
                continue;
            }
            if !self.under_quota(name).await {
                debug!(provider = %name, "provider quota full");
                continue;
            }
            candidates.push((health.score, name));
        }

        if candidates.is_empty() {
            // Desperation mode: cascade order regardless of health.
            warn!(match_id = %match_id, tier = %tier, sport = %sport,
                  "all providers degraded, falling back to cascade order");
            for &name in &self.config.cascade {
                if let Some(provider) = self.providers.get(&name) {
                    if provider.supports(sport) {
                        let _ = self
                            .bus
                            .pin_selection(match_id, tier, name, self.config.flap_ttl)
                            .await;
                        return Ok((name, provider.clone()));
                    }
                }
            }
            return Err(SelectError::NoProvider {
                match_id,
                tier,
                sport,
            });
        }

        // Stable sort: cascade order breaks score ties.
        candidates.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        let (score, best) = candidates[0];

        if let Err(err) = self
            .bus
            .pin_selection(match_id, tier, best, self.config.flap_ttl)
            .await
        {
            warn!(provider = %best, error = %err, "failed to pin provider selection");
        }
        info!(provider = %best, match_id = %match_id, tier = %tier, score, "provider selected");
        Ok((best, self.providers[&best].clone()))
    }

    /// Record a fetch outcome as a health sample and quota tick.
    pub async fn record_outcome(&self, outcome: &FetchOutcome) {
        let sample = HealthSample {
            ts: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0),
            latency_ms: outcome.latency_ms,
            error: !outcome.success,
            rate_limited: outcome.rate_limited,
        };
        if let Err(err) = self
            .bus
            .record_health_sample(outcome.provider, &sample, self.config.health_window)
            .await
        {
            warn!(provider = %outcome.provider, error = %err, "failed to record health sample");
        }
        if let Err(err) = self.bus.incr_quota(outcome.provider).await {
            warn!(provider = %outcome.provider, error = %err, "failed to bump quota counter");
        }
    }
}
