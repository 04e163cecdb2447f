//! Scheduler configuration from environment variables.

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

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub database_url: String,
    pub redis_url: String,
    pub instance_id: String,
    pub tick_interval: Duration,
    pub min_poll_interval_s: f64,
    pub max_poll_interval_s: f64,
    pub jitter_factor: f64,
    pub leader_ttl: Duration,
    pub leader_renew: Duration,
    pub provider_order: Vec<ProviderName>,
    pub rpm_limits: HashMap<ProviderName, i64>,
    pub health_window: Duration,
    pub request_timeout: Duration,
}

impl SchedulerSettings {
    pub fn from_env() -> SchedulerSettings {
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

        SchedulerSettings {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            redis_url: env::var("REDIS_URL").expect("REDIS_URL must be set"),
            instance_id: env::var("LV_INSTANCE_ID")
                .unwrap_or_else(|_| uuid::Uuid::new_v4().to_string()[..8].to_owned()),
            tick_interval: Duration::from_secs_f64(env_or("LV_SCHEDULER_TICK_INTERVAL_S", 1.0)),
            min_poll_interval_s: env_or("LV_SCHEDULER_MIN_POLL_INTERVAL_S", 1.0),
            max_poll_interval_s: env_or("LV_SCHEDULER_MAX_POLL_INTERVAL_S", 120.0),
            jitter_factor: env_or("LV_SCHEDULER_JITTER_FACTOR", 0.15),
            leader_ttl: Duration::from_secs(env_or("LV_SCHEDULER_LEADER_TTL_S", 30)),
            leader_renew: Duration::from_secs(env_or("LV_SCHEDULER_LEADER_RENEW_S", 10)),
            provider_order,
            rpm_limits,
            health_window: Duration::from_secs(env_or("LV_PROVIDER_HEALTH_WINDOW_S", 300)),
            request_timeout: Duration::from_secs_f64(env_or("LV_PROVIDER_REQUEST_TIMEOUT_S", 10.0)),
        }
    }

    pub fn rpm_limit(&self, provider: ProviderName) -> i64 {
        self.rpm_limits.get(&provider).copied().unwrap_or(1000)
    }
}
