//! Ingest configuration from environment variables.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use lv_model::ProviderName;

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub database_url: String,
    pub redis_url: String,
    pub provider_order: Vec<ProviderName>,
    pub health_threshold: f64,
    pub health_window: Duration,
    pub flap_ttl: Duration,
    pub request_timeout: Duration,
    pub rpm_limits: HashMap<ProviderName, i64>,
    pub sportradar_api_key: Option<String>,
    pub football_data_api_key: Option<String>,
    pub thesportsdb_api_key: Option<String>,
    pub max_concurrent_polls: usize,
}

impl IngestSettings {
    pub fn from_env() -> IngestSettings {
        let provider_order = env::var("LV_PROVIDER_ORDER")
            .map(|raw| {
                raw.split(',')
                    .filter_map(|p| ProviderName::parse(p.trim()))
                    .collect::<Vec<_>>()
            })
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| ProviderName::ALL.to_vec());

        let mut rpm_limits = HashMap::new();
        rpm_limits.insert(
            ProviderName::Sportradar,
            env_or("LV_SPORTRADAR_RPM_LIMIT", 1000),
        );
        rpm_limits.insert(ProviderName::Espn, env_or("LV_ESPN_RPM_LIMIT", 600));
        rpm_limits.insert(
            ProviderName::Thesportsdb,
            env_or("LV_THESPORTSDB_RPM_LIMIT", 300),
        );
        rpm_limits.insert(
            ProviderName::FootballData,
            env_or("LV_FOOTBALL_DATA_RPM_LIMIT", 60),
        );

        IngestSettings {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            redis_url: env::var("REDIS_URL").expect("REDIS_URL must be set"),
            provider_order,
            health_threshold: env_or("LV_PROVIDER_HEALTH_THRESHOLD", 0.4),
            health_window: Duration::from_secs(env_or("LV_PROVIDER_HEALTH_WINDOW_S", 300)),
            flap_ttl: Duration::from_secs(env_or("LV_PROVIDER_FLAP_TTL_S", 60)),
            request_timeout: Duration::from_secs_f64(env_or("LV_PROVIDER_REQUEST_TIMEOUT_S", 10.0)),
            rpm_limits,
            sportradar_api_key: env_opt("LV_SPORTRADAR_API_KEY"),
            football_data_api_key: env_opt("LV_FOOTBALL_DATA_API_KEY"),
            thesportsdb_api_key: env_opt("LV_THESPORTSDB_API_KEY"),
            max_concurrent_polls: env_or("LV_INGEST_MAX_CONCURRENT", 20),
        }
    }
}
