use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::enums::{EventType, MatchPhase, ProviderName};

// ---------------------------------------------------------------------------
// Reference entities
// ---------------------------------------------------------------------------

/// League reference carried inside tier-0 payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeagueRef {
    pub id: Uuid,
    pub name: String,
    pub sport: crate::Sport,
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
}

/// Team reference carried inside tier-0 payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRef {
    pub id: Uuid,
    pub name: String,
    pub short_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Score
// ---------------------------------------------------------------------------

/// Period-level score breakdown (quarters, halves, innings, periods).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub period: String,
    pub home: i32,
    pub away: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub home: i32,
    pub away: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub breakdown: Vec<ScoreBreakdown>,
}

impl Score {
    pub fn new(home: i32, away: i32) -> Score {
        Score {
            home,
            away,
            breakdown: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Scoreboard (tier 0)
// ---------------------------------------------------------------------------

/// Two-leg aggregates and other oddments that ride along with the state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreboardExtra {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate_home: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate_away: Option<i32>,
}

impl ScoreboardExtra {
    pub fn is_empty(&self) -> bool {
        self.aggregate_home.is_none() && self.aggregate_away.is_none()
    }
}

/// Tier 0: minimal scoreboard pushed at the highest frequency.
///
/// `version` and `seq` increase strictly on every observed change; clients
/// apply a payload only when its version exceeds their cached version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scoreboard {
    pub match_id: Uuid,
    pub league: LeagueRef,
    pub home_team: TeamRef,
    pub away_team: TeamRef,
    pub score: Score,
    pub phase: MatchPhase,
    /// Provider clock string, preserved verbatim (e.g. `"45+3'"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clock: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "ScoreboardExtra::is_empty")]
    pub extra: ScoreboardExtra,
    #[serde(default)]
    pub version: i32,
    #[serde(default)]
    pub seq: i64,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Match event (tier 1)
// ---------------------------------------------------------------------------

/// Tier 1: an individual match event (goal, card, substitution, ...).
///
/// Append-only per match.  `(match_id, source_provider, provider_event_id)`
/// is unique whenever `provider_event_id` is present; synthetic events carry
/// a `synthetic:` prefixed id and a confidence score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEvent {
    pub id: Uuid,
    pub match_id: Uuid,
    pub event_type: EventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minute: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_home: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_away: Option<i32>,
    #[serde(default)]
    pub synthetic: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_provider: Option<ProviderName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_event_id: Option<String>,
    #[serde(default)]
    pub seq: i64,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Match stats (tier 2)
// ---------------------------------------------------------------------------

/// Flat per-team statistics.  Unknown provider fields land in `extra` so a
/// structural comparison of two normalized blobs sees everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub possession: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shots: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shots_on_target: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corners: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fouls: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offsides: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yellow_cards: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub red_cards: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rebounds: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assists: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turnovers: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steals: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hits: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_plays: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub penalty_minutes: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runs: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strikeouts: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_runs: Option<i32>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Tier 2: full per-match statistics, same version/seq discipline as the
/// scoreboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchStatsPayload {
    pub match_id: Uuid,
    #[serde(default)]
    pub home_stats: TeamStats,
    #[serde(default)]
    pub away_stats: TeamStats,
    #[serde(default)]
    pub version: i32,
    #[serde(default)]
    pub seq: i64,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Provider health
// ---------------------------------------------------------------------------

/// One health observation appended per provider call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSample {
    /// Unix seconds.
    pub ts: f64,
    pub latency_ms: f64,
    pub error: bool,
    pub rate_limited: bool,
}

/// Composite health over the rolling sample window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub provider: ProviderName,
    pub error_rate: f64,
    pub avg_latency_ms: f64,
    pub rate_limit_hits: u32,
    pub freshness_lag_ms: f64,
    /// [0, 1], 1 = good.
    pub score: f64,
    pub sample_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_stats_structural_equality_includes_extra_fields() {
        let mut a = TeamStats {
            shots: Some(10),
            ..TeamStats::default()
        };
        let b = a.clone();
        assert_eq!(a, b);
        a.extra
            .insert("faceoff_wins".to_owned(), serde_json::json!(12));
        assert_ne!(a, b);
    }

    #[test]
    fn scoreboard_extra_omitted_when_empty() {
        let extra = ScoreboardExtra::default();
        assert!(extra.is_empty());
        let with_agg = ScoreboardExtra {
            aggregate_home: Some(3),
            aggregate_away: Some(1),
        };
        let json = serde_json::to_value(&with_agg).unwrap();
        assert_eq!(json["aggregate_home"], 3);
    }

    #[test]
    fn match_event_serde_omits_absent_fields() {
        let evt = MatchEvent {
            id: Uuid::nil(),
            match_id: Uuid::nil(),
            event_type: EventType::Goal,
            minute: Some(23),
            second: None,
            period: None,
            team_id: None,
            player_name: None,
            detail: None,
            score_home: Some(1),
            score_away: Some(0),
            synthetic: false,
            confidence: None,
            source_provider: Some(ProviderName::Espn),
            provider_event_id: Some("e1".to_owned()),
            seq: 4,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&evt).unwrap();
        assert_eq!(json["event_type"], "goal");
        assert_eq!(json["minute"], 23);
        assert!(json.get("player_name").is_none());
        let back: MatchEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back.seq, 4);
    }
}
