//! Verification sources.
//!
//! A source reports canonical states for whole leagues; the engine locates
//! the match of interest by fuzzy team-name comparison.  Sources must not
//! raise past their fetch result.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde_json::Value;

use lv_model::Sport;
use lv_providers::phase::espn_phase;
use lv_providers::{ProviderError, ProviderHttpClient};

use crate::confidence::SourceState;

/// One match as reported by a source's league scoreboard.
#[derive(Debug, Clone)]
pub struct SourceReport {
    pub home_name: String,
    pub away_name: String,
    pub provider_event_id: String,
    pub state: SourceState,
}

#[async_trait]
pub trait VerificationSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    /// Base URL, used as the rate-limit/circuit domain key.
    fn base_url(&self) -> &'static str;

    /// All matches on the league's scoreboard right now.
    async fn fetch_league_scoreboard(
        &self,
        league_path: &str,
        sport: Sport,
    ) -> Result<Vec<SourceReport>, ProviderError>;
}

// ---------------------------------------------------------------------------
// ESPN
// ---------------------------------------------------------------------------

const ESPN_BASE: &str = "https://site.api.espn.com/apis/site/v2/sports";

pub struct EspnVerificationSource {
    http: ProviderHttpClient,
}

impl EspnVerificationSource {
    pub fn new(timeout: std::time::Duration) -> Result<EspnVerificationSource, String> {
        Ok(EspnVerificationSource {
            http: ProviderHttpClient::new(lv_model::ProviderName::Espn, timeout)?,
        })
    }

    pub fn scoreboard_url(league_path: &str) -> String {
        format!("{ESPN_BASE}/{league_path}/scoreboard")
    }
}

#[async_trait]
impl VerificationSource for EspnVerificationSource {
    fn source_name(&self) -> &'static str {
        "espn"
    }

    fn base_url(&self) -> &'static str {
        ESPN_BASE
    }

    async fn fetch_league_scoreboard(
        &self,
        league_path: &str,
        sport: Sport,
    ) -> Result<Vec<SourceReport>, ProviderError> {
        let doc = self
            .http
            .get_json(&Self::scoreboard_url(league_path), &[], &[])
            .await?;
        let fetched_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        let events = doc["events"].as_array().cloned().unwrap_or_default();
        Ok(events
            .iter()
            .filter_map(|e| parse_report(e, sport, fetched_at))
            .collect())
    }
}

fn parse_score(v: &Value) -> i32 {
    v.as_str()
        .and_then(|s| s.parse().ok())
        .or_else(|| v.as_i64().map(|n| n as i32))
        .unwrap_or(0)
}

fn parse_report(event: &Value, sport: Sport, fetched_at: f64) -> Option<SourceReport> {
    let provider_event_id = event["id"].as_str()?.to_owned();
    let comp = event["competitions"].as_array()?.first()?;
    let competitors = comp["competitors"].as_array()?;

    let mut home_name = None;
    let mut away_name = None;
    let mut score_home = 0;
    let mut score_away = 0;
    for competitor in competitors {
        let name = competitor["team"]["displayName"]
            .as_str()
            .or_else(|| competitor["team"]["name"].as_str())?
            .to_owned();
        let score = parse_score(&competitor["score"]);
        if competitor["homeAway"].as_str() == Some("home") {
            home_name = Some(name);
            score_home = score;
        } else {
            away_name = Some(name);
            score_away = score;
        }
    }

    let status = if comp.get("status").is_some() {
        &comp["status"]
    } else {
        &event["status"]
    };
    let clock = status["displayClock"].as_str().map(ToOwned::to_owned);
    let period = status["period"].as_i64();
    let phase = espn_phase(
        status["type"]["state"].as_str().unwrap_or(""),
        status["type"]["detail"].as_str().unwrap_or(""),
        sport,
        clock.as_deref(),
        period,
    );

    Some(SourceReport {
        home_name: home_name?,
        away_name: away_name?,
        provider_event_id,
        state: SourceState {
            score_home,
            score_away,
            phase,
            clock,
            period: period.map(|p| p.to_string()),
            source: "espn".to_owned(),
            fetched_at,
        },
    })
}

// ---------------------------------------------------------------------------
// TheSportsDB
// ---------------------------------------------------------------------------

const THESPORTSDB_BASE: &str = "https://www.thesportsdb.com";

/// Secondary source: TheSportsDB's live scoreboard.
///
/// The free livescore endpoint is sport-wide rather than per-league, so the
/// `league_path` is ignored and the engine narrows by team names.
pub struct TheSportsDbVerificationSource {
    http: ProviderHttpClient,
    api_key: String,
}

impl TheSportsDbVerificationSource {
    pub fn new(
        api_key: Option<&str>,
        timeout: std::time::Duration,
    ) -> Result<TheSportsDbVerificationSource, String> {
        Ok(TheSportsDbVerificationSource {
            http: ProviderHttpClient::new(lv_model::ProviderName::Thesportsdb, timeout)?,
            // "3" is the public free-tier key.
            api_key: api_key.unwrap_or("3").to_owned(),
        })
    }

    pub fn livescore_url(&self) -> String {
        format!("{THESPORTSDB_BASE}/api/v1/json/{}/livescore.php", self.api_key)
    }

    fn sport_label(sport: Sport) -> &'static str {
        match sport {
            Sport::Soccer => "Soccer",
            Sport::Basketball => "Basketball",
            Sport::Hockey => "Ice Hockey",
            Sport::Baseball => "Baseball",
            Sport::Football => "American Football",
        }
    }
}

#[async_trait]
impl VerificationSource for TheSportsDbVerificationSource {
    fn source_name(&self) -> &'static str {
        "thesportsdb"
    }

    fn base_url(&self) -> &'static str {
        THESPORTSDB_BASE
    }

    async fn fetch_league_scoreboard(
        &self,
        _league_path: &str,
        sport: Sport,
    ) -> Result<Vec<SourceReport>, ProviderError> {
        let doc = self
            .http
            .get_json(
                &self.livescore_url(),
                &[("s", Self::sport_label(sport).to_owned())],
                &[],
            )
            .await?;
        let fetched_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        let events = doc["events"].as_array().cloned().unwrap_or_default();
        Ok(events
            .iter()
            .filter_map(|e| parse_livescore_report(e, fetched_at))
            .collect())
    }
}

fn livescore_int(event: &Value, key: &str) -> Option<i32> {
    event[key]
        .as_str()
        .and_then(|s| s.parse().ok())
        .or_else(|| event[key].as_i64().map(|v| v as i32))
}

fn parse_livescore_report(event: &Value, fetched_at: f64) -> Option<SourceReport> {
    let provider_event_id = event["idEvent"].as_str()?.to_owned();
    let home_name = event["strHomeTeam"].as_str()?.to_owned();
    let away_name = event["strAwayTeam"].as_str()?.to_owned();
    let minute = livescore_int(event, "intProgress")
        .or_else(|| event["strProgress"].as_str().and_then(lv_model::parse_clock_minute));
    let status = event["strStatus"].as_str().unwrap_or("In Progress");
    let phase = lv_providers::phase::thesportsdb_phase(status, minute);

    Some(SourceReport {
        home_name,
        away_name,
        provider_event_id,
        state: SourceState {
            score_home: livescore_int(event, "intHomeScore").unwrap_or(0),
            score_away: livescore_int(event, "intAwayScore").unwrap_or(0),
            phase,
            clock: minute.map(|m| format!("{m}'")),
            period: None,
            source: "thesportsdb".to_owned(),
            fetched_at,
        },
    })
}

/// Loose team-name comparison: case-insensitive prefix equality or mutual
/// containment, both truncated to keep sponsor suffixes from spoiling it.
pub fn team_names_match(home: &str, away: &str, source_home: &str, source_away: &str) -> bool {
    fn norm(s: &str) -> String {
        s.trim().to_lowercase().chars().take(30).collect()
    }
    let (h, a) = (norm(home), norm(away));
    let (sh, sa) = (norm(source_home), norm(source_away));
    (h == sh && a == sa) || (sh.contains(&h) && sa.contains(&a)) || (h.contains(&sh) && a.contains(&sa))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lv_model::MatchPhase;
    use serde_json::json;

    #[test]
    fn fuzzy_team_names() {
        assert!(team_names_match("Arsenal", "Chelsea", "Arsenal", "Chelsea"));
        assert!(team_names_match("Arsenal", "Chelsea", "Arsenal FC", "Chelsea FC"));
        assert!(team_names_match("Arsenal FC", "Chelsea FC", "Arsenal", "Chelsea"));
        assert!(!team_names_match("Arsenal", "Chelsea", "Chelsea", "Arsenal"));
        assert!(!team_names_match("Arsenal", "Chelsea", "Liverpool", "Everton"));
    }

    #[test]
    fn livescore_report_parses() {
        let event = json!({
            "idEvent": "2070522",
            "strHomeTeam": "Arsenal",
            "strAwayTeam": "Chelsea",
            "intHomeScore": "2",
            "intAwayScore": "1",
            "strStatus": "2H",
            "strProgress": "70"
        });
        let report = parse_livescore_report(&event, 55.0).unwrap();
        assert_eq!(report.home_name, "Arsenal");
        assert_eq!(report.state.score_home, 2);
        assert_eq!(report.state.phase, MatchPhase::LiveSecondHalf);
        assert_eq!(report.state.source, "thesportsdb");
    }

    #[test]
    fn report_parses_scoreboard_event() {
        let event = json!({
            "id": "401584",
            "competitions": [{
                "competitors": [
                    {"homeAway": "home", "score": "2",
                     "team": {"displayName": "Arsenal"}},
                    {"homeAway": "away", "score": "1",
                     "team": {"displayName": "Chelsea"}}
                ],
                "status": {"displayClock": "70'", "period": 2,
                           "type": {"state": "in", "detail": "70'"}}
            }]
        });
        let report = parse_report(&event, Sport::Soccer, 123.0).unwrap();
        assert_eq!(report.home_name, "Arsenal");
        assert_eq!(report.state.score_home, 2);
        assert_eq!(report.state.score_away, 1);
        assert_eq!(report.state.phase, MatchPhase::LiveSecondHalf);
        assert!((report.state.fetched_at - 123.0).abs() < f64::EPSILON);
    }
}
