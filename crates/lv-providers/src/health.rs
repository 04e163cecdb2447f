//! Rolling-window provider health scoring.
//!
//! score = 0.40*(1 - error_rate)
//!       + 0.25*(1 - min(avg_latency_ms/5000, 1))
//!       + 0.20*(1 - min(rate_limit_hits/10, 1))
//!       + 0.15*(1 - min(freshness_lag_ms/10000, 1))
//!
//! All components sit in [0, 1] with 1 = good.  An empty window scores 0.8
//! (benefit of the doubt on cold start); a window with samples but no
//! successes drives the freshness component to its floor.

use std::time::Duration;

use lv_bus::Bus;
use lv_model::{HealthSample, ProviderHealth, ProviderName};

const W_ERROR_RATE: f64 = 0.40;
const W_LATENCY: f64 = 0.25;
const W_RATE_LIMIT: f64 = 0.20;
const W_FRESHNESS: f64 = 0.15;

const MAX_LATENCY_MS: f64 = 5000.0;
const MAX_RATE_LIMIT_HITS: f64 = 10.0;
const MAX_FRESHNESS_LAG_MS: f64 = 10_000.0;

const COLD_START_SCORE: f64 = 0.8;

/// Pure scoring over an already-fetched sample list.
pub fn compute_health(
    provider: ProviderName,
    samples: &[HealthSample],
    now_unix: f64,
    window: Duration,
) -> ProviderHealth {
    let window_s = window.as_secs_f64();
    let recent: Vec<&HealthSample> = samples
        .iter()
        .filter(|s| now_unix - s.ts <= window_s)
        .collect();

    if recent.is_empty() {
        return ProviderHealth {
            provider,
            error_rate: 0.0,
            avg_latency_ms: 0.0,
            rate_limit_hits: 0,
            freshness_lag_ms: 0.0,
            score: COLD_START_SCORE,
            sample_count: 0,
        };
    }

    let total = recent.len();
    let errors = recent.iter().filter(|s| s.error).count();
    let rate_limit_hits = recent.iter().filter(|s| s.rate_limited).count();
    let avg_latency_ms = recent.iter().map(|s| s.latency_ms).sum::<f64>() / total as f64;

    let freshness_lag_ms = recent
        .iter()
        .filter(|s| !s.error)
        .map(|s| s.ts)
        .fold(None::<f64>, |acc, ts| Some(acc.map_or(ts, |m| m.max(ts))))
        .map_or(MAX_FRESHNESS_LAG_MS, |last| (now_unix - last) * 1000.0);

    let error_rate = errors as f64 / total as f64;

    let err_component = 1.0 - error_rate;
    let lat_component = 1.0 - (avg_latency_ms / MAX_LATENCY_MS).min(1.0);
    let rl_component = 1.0 - (rate_limit_hits as f64 / MAX_RATE_LIMIT_HITS).min(1.0);
    let fresh_component = 1.0 - (freshness_lag_ms / MAX_FRESHNESS_LAG_MS).min(1.0);

    let score = (W_ERROR_RATE * err_component
        + W_LATENCY * lat_component
        + W_RATE_LIMIT * rl_component
        + W_FRESHNESS * fresh_component)
        .clamp(0.0, 1.0);

    ProviderHealth {
        provider,
        error_rate,
        avg_latency_ms,
        rate_limit_hits: rate_limit_hits as u32,
        freshness_lag_ms,
        score,
        sample_count: total,
    }
}

/// Bus-backed scorer shared by the registry and the scheduler.
#[derive(Clone)]
pub struct HealthScorer {
    bus: Bus,
    window: Duration,
}

impl HealthScorer {
    pub fn new(bus: Bus, window: Duration) -> HealthScorer {
        HealthScorer { bus, window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub async fn compute(&self, provider: ProviderName) -> ProviderHealth {
        let samples = self.bus.health_samples(provider).await.unwrap_or_default();
        let now_unix = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        compute_health(provider, &samples, now_unix, self.window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(ts: f64, latency_ms: f64, error: bool, rate_limited: bool) -> HealthSample {
        HealthSample {
            ts,
            latency_ms,
            error,
            rate_limited,
        }
    }

    const WINDOW: Duration = Duration::from_secs(300);

    #[test]
    fn cold_start_scores_point_eight() {
        let health = compute_health(ProviderName::Espn, &[], 1000.0, WINDOW);
        assert!((health.score - 0.8).abs() < f64::EPSILON);
        assert_eq!(health.sample_count, 0);
    }

    #[test]
    fn perfect_recent_samples_score_near_one() {
        let now = 1000.0;
        let samples: Vec<_> = (0..10)
            .map(|i| sample(now - f64::from(i), 100.0, false, false))
            .collect();
        let health = compute_health(ProviderName::Espn, &samples, now, WINDOW);
        assert!(health.score > 0.95, "score = {}", health.score);
        assert_eq!(health.sample_count, 10);
        assert!(health.error_rate.abs() < f64::EPSILON);
    }

    #[test]
    fn all_errors_drive_score_below_threshold() {
        // Five consecutive failures: error rate 1.0 and freshness at its
        // ceiling must sink the score beneath the 0.4 selection threshold.
        let now = 1000.0;
        let samples: Vec<_> = (0..5)
            .map(|i| sample(now - f64::from(i), 200.0, true, false))
            .collect();
        let health = compute_health(ProviderName::Sportradar, &samples, now, WINDOW);
        assert!(health.score < 0.4, "score = {}", health.score);
        assert!((health.error_rate - 1.0).abs() < f64::EPSILON);
        assert!((health.freshness_lag_ms - 10_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rate_limit_hits_cost_up_to_the_cap() {
        let now = 1000.0;
        let samples: Vec<_> = (0..20)
            .map(|i| sample(now - f64::from(i), 100.0, false, i < 10))
            .collect();
        let health = compute_health(ProviderName::Thesportsdb, &samples, now, WINDOW);
        assert_eq!(health.rate_limit_hits, 10);
        // Rate-limit component fully gone (0.20), everything else healthy.
        assert!(health.score < 0.82);
        assert!(health.score > 0.7);
    }

    #[test]
    fn samples_outside_the_window_are_ignored() {
        let now = 10_000.0;
        let samples = vec![
            sample(now - 400.0, 5000.0, true, true),
            sample(now - 1.0, 50.0, false, false),
        ];
        let health = compute_health(ProviderName::Espn, &samples, now, WINDOW);
        assert_eq!(health.sample_count, 1);
        assert!(health.error_rate.abs() < f64::EPSILON);
    }
}
