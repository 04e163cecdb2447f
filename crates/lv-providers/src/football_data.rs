//! football-data.org connector (v4 API).
//!
//! Auth is an `X-Auth-Token` header; matches are fetched directly by id.
//! The API carries no play-by-play or team statistics on the free tier, so
//! tiers 1 and 2 report success-with-nothing and the Builder's synthetic
//! timeline covers the gap.

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use lv_model::{
    placeholder_id, LeagueRef, ProviderName, Score, Scoreboard, ScoreboardExtra, Sport, TeamRef,
    Tier,
};

use crate::http::{ProviderError, ProviderHttpClient};
use crate::outcome::{FetchOutcome, ScheduleEntry, ScheduleTeam, TierPayload};
use crate::phase::football_data_phase;
use crate::provider::SportsProvider;

const BASE: &str = "https://api.football-data.org/v4";

pub struct FootballDataConnector {
    http: ProviderHttpClient,
    api_key: String,
}

impl FootballDataConnector {
    pub fn new(api_key: &str, timeout: std::time::Duration) -> Result<FootballDataConnector, String> {
        Ok(FootballDataConnector {
            http: ProviderHttpClient::new(ProviderName::FootballData, timeout)?,
            api_key: api_key.to_owned(),
        })
    }

    async fn fetch_match(&self, match_provider_id: &str) -> Result<Value, ProviderError> {
        self.http
            .get_json(
                &format!("{BASE}/matches/{match_provider_id}"),
                &[],
                &[("X-Auth-Token", self.api_key.as_str())],
            )
            .await
    }
}

#[async_trait]
impl SportsProvider for FootballDataConnector {
    fn name(&self) -> ProviderName {
        ProviderName::FootballData
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
        let result = self.fetch_match(match_provider_id).await;
        let latency = start.elapsed().as_secs_f64() * 1000.0;
        match result {
            Ok(doc) => match parse_match_scoreboard(&doc, sport) {
                Some(board) => FetchOutcome::ok(
                    ProviderName::FootballData,
                    Tier::Scoreboard,
                    latency,
                    TierPayload::Scoreboard(board),
                ),
                None => FetchOutcome::failed(
                    ProviderName::FootballData,
                    Tier::Scoreboard,
                    latency,
                    &ProviderError::Decode("match document missing teams".to_owned()),
                ),
            },
            Err(err) => {
                FetchOutcome::failed(ProviderName::FootballData, Tier::Scoreboard, latency, &err)
            }
        }
    }

    async fn fetch_events(
        &self,
        _sport: Sport,
        _league_provider_id: &str,
        _match_provider_id: &str,
    ) -> FetchOutcome {
        FetchOutcome::empty(ProviderName::FootballData, Tier::Events, 0.0)
    }

    async fn fetch_stats(
        &self,
        _sport: Sport,
        _league_provider_id: &str,
        _match_provider_id: &str,
    ) -> FetchOutcome {
        FetchOutcome::empty(ProviderName::FootballData, Tier::Stats, 0.0)
    }

    async fn fetch_league_schedule(
        &self,
        sport: Sport,
        league_provider_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<ScheduleEntry>, ProviderError> {
        let date_str = date.format("%Y-%m-%d").to_string();
        let doc = self
            .http
            .get_json(
                &format!("{BASE}/competitions/{league_provider_id}/matches"),
                &[("dateFrom", date_str.clone()), ("dateTo", date_str)],
                &[("X-Auth-Token", self.api_key.as_str())],
            )
            .await?;
        let matches = doc["matches"].as_array().cloned().unwrap_or_default();
        Ok(matches
            .iter()
            .filter_map(|m| parse_schedule_entry(m, sport))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn team_ref(team: &Value) -> Option<TeamRef> {
    let provider_team_id = team["id"].as_i64()?.to_string();
    let name = team["name"].as_str()?.to_owned();
    Some(TeamRef {
        id: placeholder_id(ProviderName::FootballData, "team", &provider_team_id),
        name,
        short_name: team["tla"].as_str().unwrap_or_default().to_owned(),
        logo_url: team["crest"].as_str().map(ToOwned::to_owned),
    })
}

fn parse_match_scoreboard(doc: &Value, sport: Sport) -> Option<Scoreboard> {
    // /matches/{id} nests under "match" on some plans and is flat on others.
    let m = doc.get("match").unwrap_or(doc);
    let provider_match_id = m["id"].as_i64()?.to_string();
    let home_team = team_ref(&m["homeTeam"])?;
    let away_team = team_ref(&m["awayTeam"])?;

    let status = m["status"].as_str().unwrap_or("SCHEDULED");
    let minute = m["minute"].as_i64().map(|v| v as i32);
    let phase = football_data_phase(status, minute);

    let competition = &m["competition"];
    let league_provider_id = competition["id"]
        .as_i64()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "unknown".to_owned());

    Some(Scoreboard {
        match_id: placeholder_id(ProviderName::FootballData, "match", &provider_match_id),
        league: LeagueRef {
            id: placeholder_id(ProviderName::FootballData, "league", &league_provider_id),
            name: competition["name"].as_str().unwrap_or("Unknown").to_owned(),
            sport,
            country: m["area"]["name"]
                .as_str()
                .unwrap_or("International")
                .to_owned(),
            logo_url: None,
        },
        home_team,
        away_team,
        score: Score::new(
            m["score"]["fullTime"]["home"].as_i64().unwrap_or(0) as i32,
            m["score"]["fullTime"]["away"].as_i64().unwrap_or(0) as i32,
        ),
        phase,
        clock: minute.map(|v| format!("{v}'")),
        period: None,
        start_time: m["utcDate"]
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

fn parse_schedule_entry(m: &Value, sport: Sport) -> Option<ScheduleEntry> {
    let board = parse_match_scoreboard(m, sport)?;
    let inner = m.get("match").unwrap_or(m);
    Some(ScheduleEntry {
        provider_match_id: inner["id"].as_i64()?.to_string(),
        home: ScheduleTeam {
            provider_team_id: inner["homeTeam"]["id"].as_i64()?.to_string(),
            name: board.home_team.name.clone(),
            short_name: board.home_team.short_name.clone(),
            logo_url: board.home_team.logo_url.clone(),
            score: board.score.home,
            aggregate: None,
        },
        away: ScheduleTeam {
            provider_team_id: inner["awayTeam"]["id"].as_i64()?.to_string(),
            name: board.away_team.name.clone(),
            short_name: board.away_team.short_name.clone(),
            logo_url: board.away_team.logo_url.clone(),
            score: board.score.away,
            aggregate: None,
        },
        start_time: board.start_time,
        phase: board.phase,
        clock: board.clock,
        venue: inner["venue"].as_str().map(ToOwned::to_owned),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lv_model::MatchPhase;
    use serde_json::json;

    #[test]
    fn flat_match_document_parses() {
        let doc = json!({
            "id": 327117,
            "utcDate": "2025-03-01T15:00:00Z",
            "status": "IN_PLAY",
            "minute": 67,
            "competition": {"id": 2021, "name": "Premier League"},
            "area": {"name": "England"},
            "homeTeam": {"id": 57, "name": "Arsenal FC", "tla": "ARS"},
            "awayTeam": {"id": 61, "name": "Chelsea FC", "tla": "CHE"},
            "score": {"fullTime": {"home": 2, "away": 1}}
        });
        let board = parse_match_scoreboard(&doc, Sport::Soccer).unwrap();
        assert_eq!(board.score.home, 2);
        assert_eq!(board.phase, MatchPhase::LiveSecondHalf);
        assert_eq!(board.home_team.short_name, "ARS");
        assert_eq!(board.clock.as_deref(), Some("67'"));
    }
}
