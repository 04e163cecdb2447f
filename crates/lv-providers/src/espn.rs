//! ESPN connector.
//!
//! ESPN's site API is keyed by sport slug + league slug; matches are
//! "events" inside a league scoreboard document and detail comes from the
//! per-event summary document.  Everything is normalized here; raw ESPN
//! shapes never leave this module.

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use lv_model::{
    parse_clock_minute, placeholder_id, EventType, LeagueRef, MatchEvent, MatchStatsPayload,
    ProviderName, Score, ScoreBreakdown, Scoreboard, ScoreboardExtra, Sport, TeamRef, TeamStats,
    Tier,
};

use crate::http::{ProviderError, ProviderHttpClient};
use crate::outcome::{FetchOutcome, ScheduleEntry, ScheduleTeam, TierPayload};
use crate::phase::espn_phase;
use crate::provider::SportsProvider;

const ESPN_BASE: &str = "https://site.api.espn.com/apis/site/v2/sports";

pub struct EspnConnector {
    http: ProviderHttpClient,
}

impl EspnConnector {
    pub fn new(timeout: std::time::Duration) -> Result<EspnConnector, String> {
        Ok(EspnConnector {
            http: ProviderHttpClient::new(ProviderName::Espn, timeout)?,
        })
    }

    fn sport_slug(sport: Sport) -> &'static str {
        // ESPN slugs happen to equal our sport tags.
        sport.as_str()
    }

    fn scoreboard_url(sport: Sport, league: &str) -> String {
        format!("{ESPN_BASE}/{}/{league}/scoreboard", Self::sport_slug(sport))
    }

    fn summary_url(sport: Sport, league: &str) -> String {
        format!("{ESPN_BASE}/{}/{league}/summary", Self::sport_slug(sport))
    }

    async fn fetch_event_doc(
        &self,
        sport: Sport,
        league: &str,
        match_provider_id: &str,
    ) -> Result<Value, ProviderError> {
        let doc = self
            .http
            .get_json(&Self::scoreboard_url(sport, league), &[], &[])
            .await?;
        let events = doc["events"].as_array().cloned().unwrap_or_default();
        events
            .into_iter()
            .find(|e| e["id"].as_str() == Some(match_provider_id))
            .ok_or_else(|| ProviderError::Decode(format!("event {match_provider_id} not in scoreboard")))
    }
}

#[async_trait]
impl SportsProvider for EspnConnector {
    fn name(&self) -> ProviderName {
        ProviderName::Espn
    }

    fn supports(&self, _sport: Sport) -> bool {
        true
    }

    async fn fetch_scoreboard(
        &self,
        sport: Sport,
        league_provider_id: &str,
        match_provider_id: &str,
    ) -> FetchOutcome {
        let start = Instant::now();
        let result = self
            .fetch_event_doc(sport, league_provider_id, match_provider_id)
            .await;
        let latency = start.elapsed().as_secs_f64() * 1000.0;
        match result {
            Ok(event) => match parse_event_scoreboard(&event, sport, league_provider_id) {
                Some(board) => FetchOutcome::ok(
                    ProviderName::Espn,
                    Tier::Scoreboard,
                    latency,
                    TierPayload::Scoreboard(board),
                ),
                None => FetchOutcome::failed(
                    ProviderName::Espn,
                    Tier::Scoreboard,
                    latency,
                    &ProviderError::Decode("scoreboard event missing competitors".to_owned()),
                ),
            },
            Err(err) => FetchOutcome::failed(ProviderName::Espn, Tier::Scoreboard, latency, &err),
        }
    }

    async fn fetch_events(
        &self,
        sport: Sport,
        league_provider_id: &str,
        match_provider_id: &str,
    ) -> FetchOutcome {
        let start = Instant::now();
        let result = self
            .http
            .get_json(
                &Self::summary_url(sport, league_provider_id),
                &[("event", match_provider_id.to_owned())],
                &[],
            )
            .await;
        let latency = start.elapsed().as_secs_f64() * 1000.0;
        match result {
            Ok(doc) => {
                let events = parse_summary_events(&doc, sport, match_provider_id);
                FetchOutcome::ok(
                    ProviderName::Espn,
                    Tier::Events,
                    latency,
                    TierPayload::Events(events),
                )
            }
            Err(err) => FetchOutcome::failed(ProviderName::Espn, Tier::Events, latency, &err),
        }
    }

    async fn fetch_stats(
        &self,
        sport: Sport,
        league_provider_id: &str,
        match_provider_id: &str,
    ) -> FetchOutcome {
        let start = Instant::now();
        let result = self
            .http
            .get_json(
                &Self::summary_url(sport, league_provider_id),
                &[("event", match_provider_id.to_owned())],
                &[],
            )
            .await;
        let latency = start.elapsed().as_secs_f64() * 1000.0;
        match result {
            Ok(doc) => match parse_summary_stats(&doc, match_provider_id) {
                Some(stats) => FetchOutcome::ok(
                    ProviderName::Espn,
                    Tier::Stats,
                    latency,
                    TierPayload::Stats(stats),
                ),
                None => FetchOutcome::empty(ProviderName::Espn, Tier::Stats, latency),
            },
            Err(err) => FetchOutcome::failed(ProviderName::Espn, Tier::Stats, latency, &err),
        }
    }

    async fn fetch_league_schedule(
        &self,
        sport: Sport,
        league_provider_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<ScheduleEntry>, ProviderError> {
        let date_str = date.format("%Y%m%d").to_string();
        let doc = self
            .http
            .get_json(
                &Self::scoreboard_url(sport, league_provider_id),
                &[("dates", date_str)],
                &[],
            )
            .await?;
        let events = doc["events"].as_array().cloned().unwrap_or_default();
        Ok(events
            .iter()
            .filter_map(|e| parse_schedule_entry(e, sport))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Document parsing
// ---------------------------------------------------------------------------

// ESPN emits both full RFC 3339 timestamps and the short "2025-03-01T15:00Z".
fn parse_espn_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%MZ")
        .ok()
        .map(|n| n.and_utc())
}

fn parse_score(v: &Value) -> i32 {
    v.as_str()
        .and_then(|s| s.parse().ok())
        .or_else(|| v.as_i64().map(|n| n as i32))
        .unwrap_or(0)
}

fn team_ref_from(competitor: &Value) -> Option<TeamRef> {
    let team = competitor.get("team")?;
    let provider_team_id = team["id"].as_str()?;
    let name = team["displayName"]
        .as_str()
        .or_else(|| team["name"].as_str())?
        .to_owned();
    let short_name = team["abbreviation"]
        .as_str()
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| name.chars().take(3).collect::<String>().to_uppercase());
    Some(TeamRef {
        id: placeholder_id(ProviderName::Espn, "team", provider_team_id),
        name,
        short_name,
        logo_url: team["logo"].as_str().map(ToOwned::to_owned),
    })
}

fn breakdown_from(competitor: &Value) -> Vec<(String, i32)> {
    competitor["linescores"]
        .as_array()
        .map(|lines| {
            lines
                .iter()
                .enumerate()
                .filter_map(|(i, line)| {
                    let value = line["value"].as_f64().map(|v| v as i32)?;
                    Some((format!("{}", i + 1), value))
                })
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn parse_event_scoreboard(
    event: &Value,
    sport: Sport,
    league_provider_id: &str,
) -> Option<Scoreboard> {
    let match_provider_id = event["id"].as_str()?;
    let comp = event["competitions"].as_array()?.first()?;
    let competitors = comp["competitors"].as_array()?;

    let mut home_ref = None;
    let mut away_ref = None;
    let mut score = Score::default();
    let mut extra = ScoreboardExtra::default();
    let mut home_lines = Vec::new();
    let mut away_lines = Vec::new();

    for competitor in competitors {
        let team_ref = team_ref_from(competitor)?;
        let team_score = parse_score(&competitor["score"]);
        let aggregate = competitor
            .get("aggregateScore")
            .and_then(Value::as_i64)
            .map(|v| v as i32);
        if competitor["homeAway"].as_str() == Some("home") {
            score.home = team_score;
            extra.aggregate_home = aggregate;
            home_lines = breakdown_from(competitor);
            home_ref = Some(team_ref);
        } else {
            score.away = team_score;
            extra.aggregate_away = aggregate;
            away_lines = breakdown_from(competitor);
            away_ref = Some(team_ref);
        }
    }
    let home_team = home_ref?;
    let away_team = away_ref?;

    for (period, home) in home_lines {
        let away = away_lines
            .iter()
            .find(|(p, _)| *p == period)
            .map(|(_, v)| *v)
            .unwrap_or(0);
        score.breakdown.push(ScoreBreakdown { period, home, away });
    }

    let status = if comp.get("status").is_some() {
        &comp["status"]
    } else {
        &event["status"]
    };
    let state = status["type"]["state"].as_str().unwrap_or("");
    let detail = status["type"]["detail"].as_str().unwrap_or("");
    let clock = status["displayClock"].as_str().map(ToOwned::to_owned);
    let period_num = status["period"].as_i64();
    let phase = espn_phase(state, detail, sport, clock.as_deref(), period_num);

    let start_time = event["date"]
        .as_str()
        .and_then(parse_espn_date)
        .unwrap_or_else(Utc::now);

    let league_name = event["leagues"]
        .as_array()
        .and_then(|l| l.first())
        .and_then(|l| l["name"].as_str())
        .unwrap_or(league_provider_id)
        .to_owned();

    Some(Scoreboard {
        match_id: placeholder_id(ProviderName::Espn, "match", match_provider_id),
        league: LeagueRef {
            id: placeholder_id(ProviderName::Espn, "league", league_provider_id),
            name: league_name,
            sport,
            country: "International".to_owned(),
            logo_url: None,
        },
        home_team,
        away_team,
        score,
        phase,
        clock,
        period: period_num.map(|p| p.to_string()),
        start_time,
        extra,
        version: 0,
        seq: 0,
        updated_at: Utc::now(),
    })
}

/// Map an ESPN play/key-event type label to the canonical event type.
pub(crate) fn map_event_type(label: &str, sport: Sport) -> EventType {
    let l = label.to_ascii_lowercase();
    if l.contains("own goal") {
        return EventType::OwnGoal;
    }
    if l.contains("penalty") {
        return if l.contains("miss") {
            EventType::PenaltyMiss
        } else {
            EventType::Penalty
        };
    }
    if l.contains("yellow card") {
        return EventType::YellowCard;
    }
    if l.contains("red card") {
        return EventType::RedCard;
    }
    if l.contains("substitution") {
        return EventType::Substitution;
    }
    if l.contains("var") {
        return EventType::VarDecision;
    }
    if l.contains("corner") {
        return EventType::Corner;
    }
    if l.contains("offside") {
        return EventType::Offside;
    }
    if l.contains("free kick") {
        return EventType::FreeKick;
    }
    if l.contains("throw in") || l.contains("throw-in") {
        return EventType::ThrowIn;
    }
    if l.contains("three point") {
        return EventType::ThreePointer;
    }
    if l.contains("free throw") {
        return EventType::FreeThrow;
    }
    if l.contains("rebound") {
        return EventType::Rebound;
    }
    if l.contains("turnover") {
        return EventType::Turnover;
    }
    if l.contains("steal") {
        return EventType::Steal;
    }
    if l.contains("block") {
        return EventType::Block;
    }
    if l.contains("timeout") {
        return EventType::Timeout;
    }
    if l.contains("home run") {
        return EventType::HomeRun;
    }
    if l.contains("strikeout") {
        return EventType::Strikeout;
    }
    if l.contains("walk") {
        return EventType::Walk;
    }
    if matches!(sport, Sport::Basketball)
        && (l.contains("field goal") || l.contains("dunk") || l.contains("layup") || l.contains("jumper"))
    {
        return EventType::Basket;
    }
    if matches!(sport, Sport::Baseball)
        && (l.contains("single") || l.contains("double") || l.contains("triple"))
    {
        return EventType::Hit;
    }
    if l.contains("shot") {
        return EventType::Shot;
    }
    if l.contains("foul") {
        return EventType::Foul;
    }
    if l.contains("goal") {
        return EventType::Goal;
    }
    EventType::Generic
}

pub(crate) fn parse_summary_events(
    doc: &Value,
    sport: Sport,
    match_provider_id: &str,
) -> Vec<MatchEvent> {
    // Soccer summaries carry keyEvents; the US sports carry plays.
    let raw = doc["keyEvents"]
        .as_array()
        .or_else(|| doc["plays"].as_array())
        .cloned()
        .unwrap_or_default();
    let match_id = placeholder_id(ProviderName::Espn, "match", match_provider_id);

    raw.iter()
        .filter_map(|play| {
            let provider_event_id = match &play["id"] {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return None,
            };
            let label = play["type"]["text"]
                .as_str()
                .or_else(|| play["text"].as_str())
                .unwrap_or("");
            let clock = play["clock"]["displayValue"].as_str();
            let minute = clock.and_then(parse_clock_minute);
            let team_id = play["team"]["id"]
                .as_str()
                .map(|id| placeholder_id(ProviderName::Espn, "team", id));
            let player_name = play["athletesInvolved"]
                .as_array()
                .and_then(|a| a.first())
                .and_then(|a| a["displayName"].as_str())
                .map(ToOwned::to_owned);
            let score_home = play["homeScore"].as_i64().map(|v| v as i32);
            let score_away = play["awayScore"].as_i64().map(|v| v as i32);

            Some(MatchEvent {
                id: uuid::Uuid::new_v4(),
                match_id,
                event_type: map_event_type(label, sport),
                minute,
                second: None,
                period: play["period"]["number"].as_i64().map(|p| p.to_string()),
                team_id,
                player_name,
                detail: play["text"].as_str().map(ToOwned::to_owned),
                score_home,
                score_away,
                synthetic: false,
                confidence: None,
                source_provider: Some(ProviderName::Espn),
                provider_event_id: Some(provider_event_id),
                seq: 0,
                created_at: Utc::now(),
            })
        })
        .collect()
}

fn stat_value(display: &str) -> Value {
    let cleaned = display.trim().trim_end_matches('%');
    if let Ok(n) = cleaned.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(f) = cleaned.parse::<f64>() {
        return Value::from(f);
    }
    Value::from(display.to_owned())
}

fn team_stats_from(statistics: &Value) -> TeamStats {
    let mut stats = TeamStats::default();
    let Some(entries) = statistics.as_array() else {
        return stats;
    };
    for entry in entries {
        let Some(name) = entry["name"].as_str() else {
            continue;
        };
        let display = entry["displayValue"].as_str().unwrap_or("");
        let value = stat_value(display);
        let as_i32 = value.as_i64().map(|v| v as i32);
        match name {
            "possessionPct" => stats.possession = value.as_f64(),
            "totalShots" | "shots" => stats.shots = as_i32,
            "shotsOnTarget" => stats.shots_on_target = as_i32,
            "wonCorners" | "cornerKicks" => stats.corners = as_i32,
            "foulsCommitted" | "fouls" => stats.fouls = as_i32,
            "offsides" => stats.offsides = as_i32,
            "yellowCards" => stats.yellow_cards = as_i32,
            "redCards" => stats.red_cards = as_i32,
            "totalRebounds" | "rebounds" => stats.rebounds = as_i32,
            "assists" => stats.assists = as_i32,
            "turnovers" => stats.turnovers = as_i32,
            "steals" => stats.steals = as_i32,
            "blocks" => stats.blocks = as_i32,
            "hits" => stats.hits = as_i32,
            "powerPlays" => stats.power_plays = as_i32,
            "penaltyMinutes" => stats.penalty_minutes = as_i32,
            "runs" => stats.runs = as_i32,
            "strikeouts" => stats.strikeouts = as_i32,
            "homeRuns" => stats.home_runs = as_i32,
            other => {
                stats.extra.insert(other.to_owned(), value);
            }
        }
    }
    stats
}

pub(crate) fn parse_summary_stats(doc: &Value, match_provider_id: &str) -> Option<MatchStatsPayload> {
    let teams = doc["boxscore"]["teams"].as_array()?;
    if teams.is_empty() {
        return None;
    }
    let mut home_stats = TeamStats::default();
    let mut away_stats = TeamStats::default();
    let mut saw_any = false;
    for team in teams {
        let side = team["homeAway"].as_str().unwrap_or("");
        let parsed = team_stats_from(&team["statistics"]);
        saw_any = true;
        if side == "home" {
            home_stats = parsed;
        } else {
            away_stats = parsed;
        }
    }
    if !saw_any {
        return None;
    }
    Some(MatchStatsPayload {
        match_id: placeholder_id(ProviderName::Espn, "match", match_provider_id),
        home_stats,
        away_stats,
        version: 0,
        seq: 0,
        updated_at: Utc::now(),
    })
}

fn parse_schedule_entry(event: &Value, sport: Sport) -> Option<ScheduleEntry> {
    let board = parse_event_scoreboard(event, sport, "")?;
    let provider_match_id = event["id"].as_str()?.to_owned();
    let comp = event["competitions"].as_array()?.first()?;
    let competitors = comp["competitors"].as_array()?;

    let mut home = None;
    let mut away = None;
    for competitor in competitors {
        let team = competitor.get("team")?;
        let entry = ScheduleTeam {
            provider_team_id: team["id"].as_str()?.to_owned(),
            name: board_team_name(competitor),
            short_name: team["abbreviation"]
                .as_str()
                .unwrap_or_default()
                .to_owned(),
            logo_url: team["logo"].as_str().map(ToOwned::to_owned),
            score: parse_score(&competitor["score"]),
            aggregate: competitor
                .get("aggregateScore")
                .and_then(Value::as_i64)
                .map(|v| v as i32),
        };
        if competitor["homeAway"].as_str() == Some("home") {
            home = Some(entry);
        } else {
            away = Some(entry);
        }
    }

    let venue = comp["venue"]["fullName"]
        .as_str()
        .or_else(|| comp["venue"]["name"].as_str())
        .map(ToOwned::to_owned);

    Some(ScheduleEntry {
        provider_match_id,
        home: home?,
        away: away?,
        start_time: board.start_time,
        phase: board.phase,
        clock: board.clock,
        venue,
    })
}

fn board_team_name(competitor: &Value) -> String {
    competitor["team"]["displayName"]
        .as_str()
        .or_else(|| competitor["team"]["name"].as_str())
        .unwrap_or("Unknown")
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lv_model::MatchPhase;
    use serde_json::json;

    fn sample_event() -> Value {
        json!({
            "id": "401584",
            "date": "2025-03-01T15:00:00Z",
            "leagues": [{"name": "Premier League"}],
            "competitions": [{
                "competitors": [
                    {
                        "homeAway": "home",
                        "score": "2",
                        "linescores": [{"value": 1.0}, {"value": 1.0}],
                        "team": {"id": "359", "displayName": "Arsenal", "abbreviation": "ARS"}
                    },
                    {
                        "homeAway": "away",
                        "score": "1",
                        "linescores": [{"value": 0.0}, {"value": 1.0}],
                        "team": {"id": "361", "displayName": "Chelsea", "abbreviation": "CHE"}
                    }
                ],
                "venue": {"fullName": "Emirates Stadium"},
                "status": {
                    "displayClock": "67'",
                    "period": 2,
                    "type": {"state": "in", "detail": "67'"}
                }
            }]
        })
    }

    #[test]
    fn scoreboard_parses_scores_phase_and_breakdown() {
        let board = parse_event_scoreboard(&sample_event(), Sport::Soccer, "eng.1").unwrap();
        assert_eq!(board.score.home, 2);
        assert_eq!(board.score.away, 1);
        assert_eq!(board.phase, MatchPhase::LiveSecondHalf);
        assert_eq!(board.clock.as_deref(), Some("67'"));
        assert_eq!(board.home_team.name, "Arsenal");
        assert_eq!(board.score.breakdown.len(), 2);
        assert_eq!(board.score.breakdown[1].away, 1);
        // Deterministic placeholder ids.
        assert_eq!(
            board.home_team.id,
            placeholder_id(ProviderName::Espn, "team", "359")
        );
    }

    #[test]
    fn schedule_entry_carries_both_sides() {
        let entry = parse_schedule_entry(&sample_event(), Sport::Soccer).unwrap();
        assert_eq!(entry.provider_match_id, "401584");
        assert_eq!(entry.home.name, "Arsenal");
        assert_eq!(entry.away.score, 1);
        assert_eq!(entry.venue.as_deref(), Some("Emirates Stadium"));
    }

    #[test]
    fn summary_events_map_key_events() {
        let doc = json!({
            "keyEvents": [
                {
                    "id": "9901",
                    "type": {"text": "Goal"},
                    "text": "Goal! Arsenal 1, Chelsea 0",
                    "clock": {"displayValue": "23'"},
                    "period": {"number": 1},
                    "team": {"id": "359"},
                    "homeScore": 1,
                    "awayScore": 0
                },
                {
                    "id": "9902",
                    "type": {"text": "Yellow Card"},
                    "clock": {"displayValue": "31'"},
                    "team": {"id": "361"}
                }
            ]
        });
        let events = parse_summary_events(&doc, Sport::Soccer, "401584");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, EventType::Goal);
        assert_eq!(events[0].minute, Some(23));
        assert_eq!(events[0].score_home, Some(1));
        assert_eq!(events[0].provider_event_id.as_deref(), Some("9901"));
        assert_eq!(events[1].event_type, EventType::YellowCard);
    }

    #[test]
    fn event_type_mapping_is_sport_aware() {
        assert_eq!(map_event_type("Own Goal", Sport::Soccer), EventType::OwnGoal);
        assert_eq!(
            map_event_type("Penalty - Missed", Sport::Soccer),
            EventType::PenaltyMiss
        );
        assert_eq!(
            map_event_type("Driving Dunk", Sport::Basketball),
            EventType::Basket
        );
        assert_eq!(
            map_event_type("Three Point Jumper", Sport::Basketball),
            EventType::ThreePointer
        );
        assert_eq!(map_event_type("Home Run", Sport::Baseball), EventType::HomeRun);
        assert_eq!(map_event_type("lineout", Sport::Football), EventType::Generic);
    }

    #[test]
    fn summary_stats_split_home_and_away() {
        let doc = json!({
            "boxscore": {"teams": [
                {
                    "homeAway": "home",
                    "statistics": [
                        {"name": "possessionPct", "displayValue": "61%"},
                        {"name": "totalShots", "displayValue": "14"},
                        {"name": "bigChances", "displayValue": "3"}
                    ]
                },
                {
                    "homeAway": "away",
                    "statistics": [{"name": "totalShots", "displayValue": "6"}]
                }
            ]}
        });
        let stats = parse_summary_stats(&doc, "401584").unwrap();
        assert_eq!(stats.home_stats.possession, Some(61.0));
        assert_eq!(stats.home_stats.shots, Some(14));
        assert_eq!(stats.home_stats.extra["bigChances"], 3);
        assert_eq!(stats.away_stats.shots, Some(6));
    }
}
