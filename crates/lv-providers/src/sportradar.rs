//! Sportradar connector (soccer trial API).
//!
//! Sport event ids look like `sr:sport_event:12345`; summaries carry the
//! sport event status plus a timeline when the subscription includes it.

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use lv_model::{
    parse_clock_minute, placeholder_id, EventType, LeagueRef, MatchEvent, ProviderName, Score,
    Scoreboard, ScoreboardExtra, Sport, TeamRef, Tier,
};

use crate::http::{ProviderError, ProviderHttpClient};
use crate::outcome::{FetchOutcome, ScheduleEntry, ScheduleTeam, TierPayload};
use crate::phase::sportradar_phase;
use crate::provider::SportsProvider;

const BASE: &str = "https://api.sportradar.com/soccer/trial/v4/en";

pub struct SportradarConnector {
    http: ProviderHttpClient,
    api_key: String,
}

impl SportradarConnector {
    pub fn new(api_key: &str, timeout: std::time::Duration) -> Result<SportradarConnector, String> {
        Ok(SportradarConnector {
            http: ProviderHttpClient::new(ProviderName::Sportradar, timeout)?,
            api_key: api_key.to_owned(),
        })
    }

    async fn fetch_summary(&self, match_provider_id: &str) -> Result<Value, ProviderError> {
        self.http
            .get_json(
                &format!("{BASE}/sport_events/{match_provider_id}/summary.json"),
                &[("api_key", self.api_key.clone())],
                &[],
            )
            .await
    }
}

#[async_trait]
impl SportsProvider for SportradarConnector {
    fn name(&self) -> ProviderName {
        ProviderName::Sportradar
    }

    fn supports(&self, sport: Sport) -> bool {
        sport == Sport::Soccer
    }

    async fn fetch_scoreboard(
        &self,
        sport: Sport,
        _league_provider_id: &str,
        match_provider_id: &str,
    ) -> FetchOutcome {
        let start = Instant::now();
        let result = self.fetch_summary(match_provider_id).await;
        let latency = start.elapsed().as_secs_f64() * 1000.0;
        match result {
            Ok(doc) => match parse_summary_scoreboard(&doc, sport) {
                Some(board) => FetchOutcome::ok(
                    ProviderName::Sportradar,
                    Tier::Scoreboard,
                    latency,
                    TierPayload::Scoreboard(board),
                ),
                None => FetchOutcome::failed(
                    ProviderName::Sportradar,
                    Tier::Scoreboard,
                    latency,
                    &ProviderError::Decode("summary missing sport_event".to_owned()),
                ),
            },
            Err(err) => {
                FetchOutcome::failed(ProviderName::Sportradar, Tier::Scoreboard, latency, &err)
            }
        }
    }

    async fn fetch_events(
        &self,
        _sport: Sport,
        _league_provider_id: &str,
        match_provider_id: &str,
    ) -> FetchOutcome {
        let start = Instant::now();
        let result = self.fetch_summary(match_provider_id).await;
        let latency = start.elapsed().as_secs_f64() * 1000.0;
        match result {
            Ok(doc) => {
                let events = parse_timeline_events(&doc, match_provider_id);
                FetchOutcome::ok(
                    ProviderName::Sportradar,
                    Tier::Events,
                    latency,
                    TierPayload::Events(events),
                )
            }
            Err(err) => FetchOutcome::failed(ProviderName::Sportradar, Tier::Events, latency, &err),
        }
    }

    async fn fetch_stats(
        &self,
        _sport: Sport,
        _league_provider_id: &str,
        _match_provider_id: &str,
    ) -> FetchOutcome {
        // Statistics live on a separate subscription tier; not carried here.
        FetchOutcome::empty(ProviderName::Sportradar, Tier::Stats, 0.0)
    }

    async fn fetch_league_schedule(
        &self,
        sport: Sport,
        _league_provider_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<ScheduleEntry>, ProviderError> {
        let doc = self
            .http
            .get_json(
                &format!(
                    "{BASE}/schedules/{}/summaries.json",
                    date.format("%Y-%m-%d")
                ),
                &[("api_key", self.api_key.clone())],
                &[],
            )
            .await?;
        let summaries = doc["summaries"].as_array().cloned().unwrap_or_default();
        Ok(summaries
            .iter()
            .filter_map(|s| parse_schedule_entry(s, sport))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn competitor_ref(competitor: &Value) -> Option<(TeamRef, bool)> {
    let provider_team_id = competitor["id"].as_str()?;
    let name = competitor["name"].as_str()?.to_owned();
    let is_home = competitor["qualifier"].as_str() == Some("home");
    let short_name = competitor["abbreviation"]
        .as_str()
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| name.chars().take(3).collect::<String>().to_uppercase());
    Some((
        TeamRef {
            id: placeholder_id(ProviderName::Sportradar, "team", provider_team_id),
            name,
            short_name,
            logo_url: None,
        },
        is_home,
    ))
}

fn parse_summary_scoreboard(doc: &Value, sport: Sport) -> Option<Scoreboard> {
    let sport_event = doc.get("sport_event")?;
    let provider_match_id = sport_event["id"].as_str()?;
    let status = doc["sport_event_status"].as_object()?;

    let mut home_team = None;
    let mut away_team = None;
    for competitor in sport_event["competitors"].as_array()? {
        let (team, is_home) = competitor_ref(competitor)?;
        if is_home {
            home_team = Some(team);
        } else {
            away_team = Some(team);
        }
    }

    let phase = sportradar_phase(
        status
            .get("match_status")
            .and_then(Value::as_str)
            .or_else(|| status.get("status").and_then(Value::as_str))
            .unwrap_or(""),
    );
    let clock = status
        .get("clock")
        .and_then(|c| c["played"].as_str())
        .map(ToOwned::to_owned);

    let league = sport_event["sport_event_context"]["competition"].clone();
    let league_provider_id = league["id"].as_str().unwrap_or("unknown");

    Some(Scoreboard {
        match_id: placeholder_id(ProviderName::Sportradar, "match", provider_match_id),
        league: LeagueRef {
            id: placeholder_id(ProviderName::Sportradar, "league", league_provider_id),
            name: league["name"].as_str().unwrap_or("Unknown").to_owned(),
            sport,
            country: sport_event["sport_event_context"]["category"]["name"]
                .as_str()
                .unwrap_or("International")
                .to_owned(),
            logo_url: None,
        },
        home_team: home_team?,
        away_team: away_team?,
        score: Score::new(
            status.get("home_score").and_then(Value::as_i64).unwrap_or(0) as i32,
            status.get("away_score").and_then(Value::as_i64).unwrap_or(0) as i32,
        ),
        phase,
        clock,
        period: status
            .get("period")
            .and_then(Value::as_i64)
            .map(|p| p.to_string()),
        start_time: sport_event["start_time"]
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now),
        extra: ScoreboardExtra::default(),
        version: 0,
        seq: 0,
        updated_at: Utc::now(),
    })
}

fn timeline_event_type(kind: &str) -> Option<EventType> {
    match kind {
        "score_change" | "goal" => Some(EventType::Goal),
        "yellow_card" => Some(EventType::YellowCard),
        "red_card" | "yellow_red_card" => Some(EventType::RedCard),
        "substitution" => Some(EventType::Substitution),
        "penalty_awarded" => Some(EventType::Penalty),
        "penalty_missed" => Some(EventType::PenaltyMiss),
        "corner_kick" => Some(EventType::Corner),
        "offside" => Some(EventType::Offside),
        "free_kick" => Some(EventType::FreeKick),
        "shot_on_target" | "shot_off_target" => Some(EventType::Shot),
        "match_started" | "period_start" => Some(EventType::PeriodStart),
        "period_score" | "break_start" => Some(EventType::PeriodEnd),
        "match_ended" => Some(EventType::MatchEnd),
        // Possession changes and the like carry no timeline value for us.
        _ => None,
    }
}

fn parse_timeline_events(doc: &Value, match_provider_id: &str) -> Vec<MatchEvent> {
    let match_id = placeholder_id(ProviderName::Sportradar, "match", match_provider_id);
    let timeline = doc["timeline"].as_array().cloned().unwrap_or_default();
    timeline
        .iter()
        .filter_map(|entry| {
            let kind = entry["type"].as_str()?;
            let event_type = timeline_event_type(kind)?;
            let provider_event_id = entry["id"].as_i64()?.to_string();
            let minute = entry["match_time"]
                .as_i64()
                .map(|m| m as i32)
                .or_else(|| entry["match_clock"].as_str().and_then(parse_clock_minute));
            let team_side = entry["competitor"].as_str();
            Some(MatchEvent {
                id: uuid::Uuid::new_v4(),
                match_id,
                event_type,
                minute,
                second: None,
                period: entry["period"].as_i64().map(|p| p.to_string()),
                // Timeline names sides, not team ids; side-scoped placeholder
                // keeps the id deterministic per match.
                team_id: team_side.map(|side| {
                    placeholder_id(
                        ProviderName::Sportradar,
                        "team",
                        &format!("{match_provider_id}:{side}"),
                    )
                }),
                player_name: entry["players"]
                    .as_array()
                    .and_then(|p| p.first())
                    .and_then(|p| p["name"].as_str())
                    .map(ToOwned::to_owned),
                detail: None,
                score_home: entry["home_score"].as_i64().map(|v| v as i32),
                score_away: entry["away_score"].as_i64().map(|v| v as i32),
                synthetic: false,
                confidence: None,
                source_provider: Some(ProviderName::Sportradar),
                provider_event_id: Some(provider_event_id),
                seq: 0,
                created_at: Utc::now(),
            })
        })
        .collect()
}

fn parse_schedule_entry(summary: &Value, sport: Sport) -> Option<ScheduleEntry> {
    let board = parse_summary_scoreboard(summary, sport)?;
    let sport_event = summary.get("sport_event")?;
    let competitors = sport_event["competitors"].as_array()?;
    let mut home = None;
    let mut away = None;
    for competitor in competitors {
        let provider_team_id = competitor["id"].as_str()?.to_owned();
        let (team, is_home) = competitor_ref(competitor)?;
        let entry = ScheduleTeam {
            provider_team_id,
            name: team.name,
            short_name: team.short_name,
            logo_url: None,
            score: if is_home {
                board.score.home
            } else {
                board.score.away
            },
            aggregate: None,
        };
        if is_home {
            home = Some(entry);
        } else {
            away = Some(entry);
        }
    }
    Some(ScheduleEntry {
        provider_match_id: sport_event["id"].as_str()?.to_owned(),
        home: home?,
        away: away?,
        start_time: board.start_time,
        phase: board.phase,
        clock: board.clock,
        venue: sport_event["venue"]["name"].as_str().map(ToOwned::to_owned),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lv_model::MatchPhase;
    use serde_json::json;

    fn sample_summary() -> Value {
        json!({
            "sport_event": {
                "id": "sr:sport_event:41840",
                "start_time": "2025-03-01T15:00:00+00:00",
                "sport_event_context": {
                    "competition": {"id": "sr:competition:17", "name": "Premier League"},
                    "category": {"name": "England"}
                },
                "competitors": [
                    {"id": "sr:competitor:42", "name": "Arsenal", "qualifier": "home", "abbreviation": "ARS"},
                    {"id": "sr:competitor:38", "name": "Chelsea", "qualifier": "away", "abbreviation": "CHE"}
                ]
            },
            "sport_event_status": {
                "status": "live",
                "match_status": "2nd_half",
                "home_score": 2,
                "away_score": 1,
                "clock": {"played": "67:12"}
            },
            "timeline": [
                {"id": 11, "type": "score_change", "match_time": 23,
                 "competitor": "home", "home_score": 1, "away_score": 0},
                {"id": 12, "type": "possession", "match_time": 24}
            ]
        })
    }

    #[test]
    fn summary_scoreboard_parses_status_block() {
        let board = parse_summary_scoreboard(&sample_summary(), Sport::Soccer).unwrap();
        assert_eq!(board.score.home, 2);
        assert_eq!(board.phase, MatchPhase::LiveSecondHalf);
        assert_eq!(board.clock.as_deref(), Some("67:12"));
        assert_eq!(board.league.name, "Premier League");
    }

    #[test]
    fn timeline_keeps_only_mapped_event_types() {
        let events = parse_timeline_events(&sample_summary(), "sr:sport_event:41840");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::Goal);
        assert_eq!(events[0].minute, Some(23));
        assert_eq!(events[0].score_home, Some(1));
    }
}
