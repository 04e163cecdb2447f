use async_trait::async_trait;
use chrono::NaiveDate;

use lv_model::Sport;

use crate::http::ProviderError;
use crate::outcome::{FetchOutcome, ScheduleEntry};

/// Contract for one provider x sport family of fetchers.
///
/// Implementations are stateless beyond their HTTP client and API key.  Tier
/// fetchers must not raise: every network or parse failure is folded into a
/// `FetchOutcome` with `success == false`.
#[async_trait]
pub trait SportsProvider: Send + Sync {
    fn name(&self) -> lv_model::ProviderName;

    fn supports(&self, sport: Sport) -> bool;

    /// Tier 0: the current scoreboard for one match.
    async fn fetch_scoreboard(
        &self,
        sport: Sport,
        league_provider_id: &str,
        match_provider_id: &str,
    ) -> FetchOutcome;

    /// Tier 1: the event timeline for one match.
    async fn fetch_events(
        &self,
        sport: Sport,
        league_provider_id: &str,
        match_provider_id: &str,
    ) -> FetchOutcome;

    /// Tier 2: per-team statistics for one match.
    async fn fetch_stats(
        &self,
        sport: Sport,
        league_provider_id: &str,
        match_provider_id: &str,
    ) -> FetchOutcome;

    /// The day's fixtures for a league, for schedule sync.
    async fn fetch_league_schedule(
        &self,
        sport: Sport,
        league_provider_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<ScheduleEntry>, ProviderError>;
}
