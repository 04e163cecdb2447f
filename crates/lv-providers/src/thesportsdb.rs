//! TheSportsDB connector.
//!
//! Free-tier API keyed by a numeric API key in the URL path ("3" on the
//! public tier).  Live data comes from `livescore.php`; day schedules from
//! `eventsday.php`.  Coverage is soccer-centric and event timelines carry
//! only goal-level granularity, so tiers 1 and 2 lean on the `strProgress`
//! and score fields.

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value;

use lv_model::{
    parse_clock_minute, placeholder_id, LeagueRef, MatchStatsPayload, ProviderName, Score,
    Scoreboard, ScoreboardExtra, Sport, TeamRef, TeamStats, Tier,
};

use crate::http::{ProviderError, ProviderHttpClient};
use crate::outcome::{FetchOutcome, ScheduleEntry, ScheduleTeam, TierPayload};
use crate::phase::thesportsdb_phase;
use crate::provider::SportsProvider;

const BASE: &str = "https://www.thesportsdb.com/api/v1/json";

pub struct TheSportsDbConnector {
    http: ProviderHttpClient,
    api_key: String,
}

impl TheSportsDbConnector {
    pub fn new(
        api_key: Option<&str>,
        timeout: std::time::Duration,
    ) -> Result<TheSportsDbConnector, String> {
        Ok(TheSportsDbConnector {
            http: ProviderHttpClient::new(ProviderName::Thesportsdb, timeout)?,
            // "3" is the public free-tier key.
            api_key: api_key.unwrap_or("3").to_owned(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{BASE}/{}/{endpoint}", self.api_key)
    }

    async fn fetch_event(&self, match_provider_id: &str) -> Result<Value, ProviderError> {
        let doc = self
            .http
            .get_json(
                &self.url("lookupevent.php"),
                &[("id", match_provider_id.to_owned())],
                &[],
            )
            .await?;
        doc["events"]
            .as_array()
            .and_then(|events| events.first().cloned())
            .ok_or_else(|| ProviderError::Decode(format!("event {match_provider_id} not found")))
    }
}

#[async_trait]
impl SportsProvider for TheSportsDbConnector {
    fn name(&self) -> ProviderName {
        ProviderName::Thesportsdb
    }

    fn supports(&self, sport: Sport) -> bool {
        matches!(
            sport,
            Sport::Soccer | Sport::Basketball | Sport::Hockey | Sport::Baseball
        )
    }

    async fn fetch_scoreboard(
        &self,
        sport: Sport,
        _league_provider_id: &str,
        match_provider_id: &str,
    ) -> FetchOutcome {
        let start = Instant::now();
        let result = self.fetch_event(match_provider_id).await;
        let latency = start.elapsed().as_secs_f64() * 1000.0;
        match result {
            Ok(event) => match parse_event_scoreboard(&event, sport) {
                Some(board) => FetchOutcome::ok(
                    ProviderName::Thesportsdb,
                    Tier::Scoreboard,
                    latency,
                    TierPayload::Scoreboard(board),
                ),
                None => FetchOutcome::failed(
                    ProviderName::Thesportsdb,
                    Tier::Scoreboard,
                    latency,
                    &ProviderError::Decode("event missing team fields".to_owned()),
                ),
            },
            Err(err) => {
                FetchOutcome::failed(ProviderName::Thesportsdb, Tier::Scoreboard, latency, &err)
            }
        }
    }

    async fn fetch_events(
        &self,
        _sport: Sport,
        _league_provider_id: &str,
        _match_provider_id: &str,
    ) -> FetchOutcome {
        // The free tier exposes no play-by-play; the Builder fills the gap
        // with synthetic events inferred from scoreboard deltas.
        FetchOutcome::empty(ProviderName::Thesportsdb, Tier::Events, 0.0)
    }

    async fn fetch_stats(
        &self,
        _sport: Sport,
        _league_provider_id: &str,
        match_provider_id: &str,
    ) -> FetchOutcome {
        let start = Instant::now();
        let result = self.fetch_event(match_provider_id).await;
        let latency = start.elapsed().as_secs_f64() * 1000.0;
        match result {
            Ok(event) => match parse_event_stats(&event) {
                Some(stats) => FetchOutcome::ok(
                    ProviderName::Thesportsdb,
                    Tier::Stats,
                    latency,
                    TierPayload::Stats(stats),
                ),
                None => FetchOutcome::empty(ProviderName::Thesportsdb, Tier::Stats, latency),
            },
            Err(err) => FetchOutcome::failed(ProviderName::Thesportsdb, Tier::Stats, latency, &err),
        }
    }

    async fn fetch_league_schedule(
        &self,
        sport: Sport,
        league_provider_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<ScheduleEntry>, ProviderError> {
        let doc = self
            .http
            .get_json(
                &self.url("eventsday.php"),
                &[
                    ("d", date.format("%Y-%m-%d").to_string()),
                    ("l", league_provider_id.to_owned()),
                ],
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
// Parsing
// ---------------------------------------------------------------------------

fn int_field(event: &Value, key: &str) -> Option<i32> {
    event[key]
        .as_str()
        .and_then(|s| s.parse().ok())
        .or_else(|| event[key].as_i64().map(|v| v as i32))
}

fn event_minute(event: &Value) -> Option<i32> {
    int_field(event, "intProgress")
        .or_else(|| event["strProgress"].as_str().and_then(parse_clock_minute))
}

fn event_start_time(event: &Value) -> DateTime<Utc> {
    let date = event["dateEvent"].as_str().unwrap_or("");
    let time = event["strTime"].as_str().unwrap_or("00:00:00");
    NaiveDateTime::new(
        NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap_or_default(),
        NaiveTime::parse_from_str(time, "%H:%M:%S").unwrap_or_default(),
    )
    .and_utc()
}

fn team_ref(event: &Value, id_key: &str, name_key: &str) -> Option<TeamRef> {
    let provider_team_id = event[id_key].as_str()?;
    let name = event[name_key].as_str()?.to_owned();
    let short_name = name.chars().take(3).collect::<String>().to_uppercase();
    Some(TeamRef {
        id: placeholder_id(ProviderName::Thesportsdb, "team", provider_team_id),
        name,
        short_name,
        logo_url: None,
    })
}

fn parse_event_scoreboard(event: &Value, sport: Sport) -> Option<Scoreboard> {
    let provider_match_id = event["idEvent"].as_str()?;
    let home_team = team_ref(event, "idHomeTeam", "strHomeTeam")?;
    let away_team = team_ref(event, "idAwayTeam", "strAwayTeam")?;
    let minute = event_minute(event);
    let status = event["strStatus"].as_str().unwrap_or("In Progress");
    let phase = thesportsdb_phase(status, minute);

    let league_id = event["idLeague"].as_str().unwrap_or("0");
    Some(Scoreboard {
        match_id: placeholder_id(ProviderName::Thesportsdb, "match", provider_match_id),
        league: LeagueRef {
            id: placeholder_id(ProviderName::Thesportsdb, "league", league_id),
            name: event["strLeague"].as_str().unwrap_or("Unknown").to_owned(),
            sport,
            country: event["strCountry"]
                .as_str()
                .unwrap_or("International")
                .to_owned(),
            logo_url: None,
        },
        home_team,
        away_team,
        score: Score::new(
            int_field(event, "intHomeScore").unwrap_or(0),
            int_field(event, "intAwayScore").unwrap_or(0),
        ),
        phase,
        clock: minute.map(|m| format!("{m}'")),
        period: None,
        start_time: event_start_time(event),
        extra: ScoreboardExtra::default(),
        version: 0,
        seq: 0,
        updated_at: Utc::now(),
    })
}

fn parse_event_stats(event: &Value) -> Option<MatchStatsPayload> {
    let provider_match_id = event["idEvent"].as_str()?;
    let home_shots = int_field(event, "intHomeShots");
    let away_shots = int_field(event, "intAwayShots");
    home_shots.or(away_shots)?;
    Some(MatchStatsPayload {
        match_id: placeholder_id(ProviderName::Thesportsdb, "match", provider_match_id),
        home_stats: TeamStats {
            shots: home_shots,
            ..TeamStats::default()
        },
        away_stats: TeamStats {
            shots: away_shots,
            ..TeamStats::default()
        },
        version: 0,
        seq: 0,
        updated_at: Utc::now(),
    })
}

fn parse_schedule_entry(event: &Value, sport: Sport) -> Option<ScheduleEntry> {
    let board = parse_event_scoreboard(event, sport)?;
    Some(ScheduleEntry {
        provider_match_id: event["idEvent"].as_str()?.to_owned(),
        home: ScheduleTeam {
            provider_team_id: event["idHomeTeam"].as_str()?.to_owned(),
            name: board.home_team.name.clone(),
            short_name: board.home_team.short_name.clone(),
            logo_url: None,
            score: board.score.home,
            aggregate: None,
        },
        away: ScheduleTeam {
            provider_team_id: event["idAwayTeam"].as_str()?.to_owned(),
            name: board.away_team.name.clone(),
            short_name: board.away_team.short_name.clone(),
            logo_url: None,
            score: board.score.away,
            aggregate: None,
        },
        start_time: board.start_time,
        phase: board.phase,
        clock: board.clock,
        venue: event["strVenue"].as_str().map(ToOwned::to_owned),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lv_model::MatchPhase;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "idEvent": "2070522",
            "idLeague": "4328",
            "strLeague": "Premier League",
            "strCountry": "England",
            "idHomeTeam": "133604",
            "strHomeTeam": "Arsenal",
            "idAwayTeam": "133610",
            "strAwayTeam": "Chelsea",
            "intHomeScore": "1",
            "intAwayScore": "0",
            "strStatus": "1H",
            "strProgress": "38",
            "dateEvent": "2025-03-01",
            "strTime": "15:00:00"
        })
    }

    #[test]
    fn scoreboard_from_livescore_shape() {
        let board = parse_event_scoreboard(&sample(), Sport::Soccer).unwrap();
        assert_eq!(board.score.home, 1);
        assert_eq!(board.score.away, 0);
        assert_eq!(board.phase, MatchPhase::LiveFirstHalf);
        assert_eq!(board.clock.as_deref(), Some("38'"));
        assert_eq!(board.league.name, "Premier League");
    }

    #[test]
    fn numeric_scores_also_accepted() {
        let mut event = sample();
        event["intHomeScore"] = json!(3);
        let board = parse_event_scoreboard(&event, Sport::Soccer).unwrap();
        assert_eq!(board.score.home, 3);
    }

    #[test]
    fn stats_absent_when_no_shot_fields() {
        assert!(parse_event_stats(&sample()).is_none());
        let mut event = sample();
        event["intHomeShots"] = json!("9");
        let stats = parse_event_stats(&event).unwrap();
        assert_eq!(stats.home_stats.shots, Some(9));
    }
}
