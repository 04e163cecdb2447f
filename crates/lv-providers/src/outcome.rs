use chrono::{DateTime, Utc};

use lv_model::{MatchEvent, MatchPhase, MatchStatsPayload, ProviderName, Scoreboard, Tier};

use crate::http::ProviderError;

/// Canonical payload for one tier fetch.
#[derive(Debug, Clone)]
pub enum TierPayload {
    Scoreboard(Scoreboard),
    Events(Vec<MatchEvent>),
    Stats(MatchStatsPayload),
}

/// Tagged result of a tier fetch.  `success == false` never carries a
/// payload; a success may still carry none when the provider has nothing for
/// that tier (the ingest side treats it as a no-op).
#[derive(Debug)]
pub struct FetchOutcome {
    pub provider: ProviderName,
    pub tier: Tier,
    pub success: bool,
    pub latency_ms: f64,
    pub payload: Option<TierPayload>,
    pub error: Option<String>,
    pub rate_limited: bool,
}

impl FetchOutcome {
    pub fn ok(
        provider: ProviderName,
        tier: Tier,
        latency_ms: f64,
        payload: TierPayload,
    ) -> FetchOutcome {
        FetchOutcome {
            provider,
            tier,
            success: true,
            latency_ms,
            payload: Some(payload),
            error: None,
            rate_limited: false,
        }
    }

    /// Success with nothing to report for this tier.
    pub fn empty(provider: ProviderName, tier: Tier, latency_ms: f64) -> FetchOutcome {
        FetchOutcome {
            provider,
            tier,
            success: true,
            latency_ms,
            payload: None,
            error: None,
            rate_limited: false,
        }
    }

    pub fn failed(
        provider: ProviderName,
        tier: Tier,
        latency_ms: f64,
        err: &ProviderError,
    ) -> FetchOutcome {
        FetchOutcome {
            provider,
            tier,
            success: false,
            latency_ms,
            payload: None,
            error: Some(err.to_string()),
            rate_limited: err.is_rate_limited(),
        }
    }
}

/// One side of a scheduled fixture as the provider reports it.
#[derive(Debug, Clone)]
pub struct ScheduleTeam {
    pub provider_team_id: String,
    pub name: String,
    pub short_name: String,
    pub logo_url: Option<String>,
    pub score: i32,
    pub aggregate: Option<i32>,
}

/// A fixture from a league schedule fetch, consumed by schedule sync.
#[derive(Debug, Clone)]
pub struct ScheduleEntry {
    pub provider_match_id: String,
    pub home: ScheduleTeam,
    pub away: ScheduleTeam,
    pub start_time: DateTime<Utc>,
    pub phase: MatchPhase,
    pub clock: Option<String>,
    pub venue: Option<String>,
}
