//! Verifier configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct VerifierSettings {
    pub database_url: String,
    pub redis_url: String,

    /// Per-match cadence when few matches are live.
    pub high_demand_interval: (f64, f64),
    /// Per-match cadence when many matches are live.
    pub low_demand_interval: (f64, f64),
    pub jitter_factor: f64,

    pub max_concurrent_requests: usize,
    pub per_domain_rpm: u32,
    pub per_domain_burst: u32,

    pub fetch_timeout: Duration,
    pub backoff_on_429: Duration,

    /// At or above this confidence a correction is applied.
    pub confidence_high: f64,
    /// At or above this (but below high) the mismatch is logged and
    /// rechecked next cycle.
    pub confidence_medium: f64,

    pub circuit_failure_threshold: u32,
    pub circuit_recovery: Duration,

    pub last_checked_ttl: Duration,
    pub dispute_ttl: Duration,

    /// TheSportsDB key for the secondary source; the free tier works without
    /// one.
    pub thesportsdb_api_key: Option<String>,
}

impl VerifierSettings {
    pub fn from_env() -> VerifierSettings {
        VerifierSettings {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            redis_url: env::var("REDIS_URL").expect("REDIS_URL must be set"),
            high_demand_interval: (
                env_or("LV_VERIFIER_HIGH_INTERVAL_MIN_S", 5.0),
                env_or("LV_VERIFIER_HIGH_INTERVAL_MAX_S", 10.0),
            ),
            low_demand_interval: (
                env_or("LV_VERIFIER_LOW_INTERVAL_MIN_S", 20.0),
                env_or("LV_VERIFIER_LOW_INTERVAL_MAX_S", 60.0),
            ),
            jitter_factor: env_or("LV_VERIFIER_JITTER_FACTOR", 0.2),
            max_concurrent_requests: env_or("LV_VERIFIER_MAX_CONCURRENT", 10),
            per_domain_rpm: env_or("LV_VERIFIER_PER_DOMAIN_RPM", 60),
            per_domain_burst: env_or("LV_VERIFIER_PER_DOMAIN_BURST", 6),
            fetch_timeout: Duration::from_secs_f64(env_or("LV_VERIFIER_FETCH_TIMEOUT_S", 10.0)),
            backoff_on_429: Duration::from_secs_f64(env_or("LV_VERIFIER_BACKOFF_ON_429_S", 60.0)),
            confidence_high: env_or("LV_VERIFIER_CONFIDENCE_HIGH", 0.8),
            confidence_medium: env_or("LV_VERIFIER_CONFIDENCE_MEDIUM", 0.5),
            circuit_failure_threshold: env_or("LV_VERIFIER_CIRCUIT_FAILURES", 5),
            circuit_recovery: Duration::from_secs_f64(env_or("LV_VERIFIER_CIRCUIT_RECOVERY_S", 120.0)),
            last_checked_ttl: Duration::from_secs(env_or("LV_VERIFIER_LAST_CHECKED_TTL_S", 86_400)),
            dispute_ttl: Duration::from_secs(env_or("LV_VERIFIER_DISPUTE_TTL_S", 7 * 86_400)),
            thesportsdb_api_key: env::var("LV_THESPORTSDB_API_KEY")
                .ok()
                .filter(|v| !v.trim().is_empty()),
        }
    }
}
