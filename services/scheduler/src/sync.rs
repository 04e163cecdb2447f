//! Schedule sync: periodic discovery of upcoming matches.
//!
//! Every four hours (plus once shortly after startup) the configured league
//! set is walked for the next seven days and League / Team / Match /
//! ProviderMapping rows are upserted idempotently.  MatchState stays
//! untouched here; it is created on first normalization.

use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use lv_model::{ProviderName, Sport};
use lv_providers::{EspnConnector, ScheduleEntry, SportsProvider};
use lv_store::repo::{leagues, mappings, matches, sports, teams};

const SYNC_INTERVAL: Duration = Duration::from_secs(4 * 3600);
const STARTUP_DELAY: Duration = Duration::from_secs(10);
const SYNC_DAYS: u32 = 7;

struct LeagueSpec {
    sport: Sport,
    espn_league: &'static str,
    name: &'static str,
    country: &'static str,
}

const SYNC_LEAGUES: &[LeagueSpec] = &[
    LeagueSpec { sport: Sport::Soccer, espn_league: "eng.1", name: "Premier League", country: "England" },
    LeagueSpec { sport: Sport::Soccer, espn_league: "eng.2", name: "Championship", country: "England" },
    LeagueSpec { sport: Sport::Soccer, espn_league: "eng.fa", name: "FA Cup", country: "England" },
    LeagueSpec { sport: Sport::Soccer, espn_league: "esp.1", name: "La Liga", country: "Spain" },
    LeagueSpec { sport: Sport::Soccer, espn_league: "ger.1", name: "Bundesliga", country: "Germany" },
    LeagueSpec { sport: Sport::Soccer, espn_league: "ita.1", name: "Serie A", country: "Italy" },
    LeagueSpec { sport: Sport::Soccer, espn_league: "fra.1", name: "Ligue 1", country: "France" },
    LeagueSpec { sport: Sport::Soccer, espn_league: "ned.1", name: "Eredivisie", country: "Netherlands" },
    LeagueSpec { sport: Sport::Soccer, espn_league: "por.1", name: "Liga Portugal", country: "Portugal" },
    LeagueSpec { sport: Sport::Soccer, espn_league: "usa.1", name: "MLS", country: "USA" },
    LeagueSpec { sport: Sport::Soccer, espn_league: "uefa.champions", name: "Champions League", country: "Europe" },
    LeagueSpec { sport: Sport::Soccer, espn_league: "uefa.europa", name: "Europa League", country: "Europe" },
    LeagueSpec { sport: Sport::Basketball, espn_league: "nba", name: "NBA", country: "USA" },
    LeagueSpec { sport: Sport::Basketball, espn_league: "wnba", name: "WNBA", country: "USA" },
    LeagueSpec { sport: Sport::Hockey, espn_league: "nhl", name: "NHL", country: "USA" },
    LeagueSpec { sport: Sport::Baseball, espn_league: "mlb", name: "MLB", country: "USA" },
    LeagueSpec { sport: Sport::Football, espn_league: "nfl", name: "NFL", country: "USA" },
];

pub struct ScheduleSync {
    pool: PgPool,
    espn: EspnConnector,
}

impl ScheduleSync {
    pub fn new(pool: PgPool, espn: EspnConnector) -> ScheduleSync {
        ScheduleSync { pool, espn }
    }

    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tokio::select! {
            _ = tokio::time::sleep(STARTUP_DELAY) => {}
            _ = shutdown.changed() => return,
        }
        self.sync_once().await;

        loop {
            tokio::select! {
                _ = tokio::time::sleep(SYNC_INTERVAL) => {}
                _ = shutdown.changed() => {}
            }
            if *shutdown.borrow() {
                break;
            }
            self.sync_once().await;
        }
    }

    async fn sync_once(&self) {
        let today = chrono::Utc::now().date_naive();
        let mut total_new = 0usize;
        let mut total_updated = 0usize;

        for day in 0..SYNC_DAYS {
            let date = today + chrono::Duration::days(i64::from(day));
            for spec in SYNC_LEAGUES {
                match self
                    .espn
                    .fetch_league_schedule(spec.sport, spec.espn_league, date)
                    .await
                {
                    Ok(entries) => match self.upsert_league_day(spec, &entries).await {
                        Ok((new, updated)) => {
                            total_new += new;
                            total_updated += updated;
                        }
                        Err(err) => warn!(league = spec.name, date = %date, error = %err,
                                          "schedule sync upsert failed"),
                    },
                    Err(err) => warn!(league = spec.name, date = %date, error = %err,
                                      "schedule fetch failed"),
                }
            }
        }

        info!(new_matches = total_new, updated_matches = total_updated, "schedule sync completed");
    }

    async fn upsert_league_day(
        &self,
        spec: &LeagueSpec,
        entries: &[ScheduleEntry],
    ) -> Result<(usize, usize), sqlx::Error> {
        if entries.is_empty() {
            return Ok((0, 0));
        }

        let mut tx = self.pool.begin().await?;
        let sport_id = sports::get_or_create(&mut tx, spec.sport).await?;
        let league_id =
            leagues::get_or_create(&mut tx, sport_id, spec.name, spec.name, spec.country).await?;
        mappings::ensure_mapping(
            &mut tx,
            "league",
            league_id,
            ProviderName::Espn,
            spec.espn_league,
        )
        .await?;

        let mut new_count = 0usize;
        let mut updated_count = 0usize;
        for entry in entries {
            match self
                .upsert_match(&mut tx, spec, sport_id, league_id, entry)
                .await
            {
                Ok(true) => new_count += 1,
                Ok(false) => updated_count += 1,
                Err(err) => debug!(provider_match_id = %entry.provider_match_id, error = %err,
                                   "schedule entry upsert failed"),
            }
        }
        tx.commit().await?;
        Ok((new_count, updated_count))
    }

    async fn upsert_team(
        &self,
        tx: &mut sqlx::PgConnection,
        spec: &LeagueSpec,
        sport_id: Uuid,
        team: &lv_providers::ScheduleTeam,
    ) -> Result<Uuid, sqlx::Error> {
        // Scope provider team ids by league to dodge cross-league collisions.
        let scoped_id = format!("{}:{}", spec.espn_league, team.provider_team_id);
        if let Some(existing) =
            mappings::resolve_canonical_id(&mut *tx, "team", ProviderName::Espn, &scoped_id).await?
        {
            return Ok(existing);
        }
        let short_name = if team.short_name.is_empty() {
            team.name.chars().take(3).collect::<String>().to_uppercase()
        } else {
            team.short_name.clone()
        };
        let team_id = teams::create(
            &mut *tx,
            sport_id,
            &team.name,
            &short_name,
            team.logo_url.as_deref(),
        )
        .await?;
        mappings::ensure_mapping(&mut *tx, "team", team_id, ProviderName::Espn, &scoped_id).await?;
        Ok(team_id)
    }

    /// Upsert one fixture.  Returns true when a new match row was created.
    async fn upsert_match(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        spec: &LeagueSpec,
        sport_id: Uuid,
        league_id: Uuid,
        entry: &ScheduleEntry,
    ) -> Result<bool, sqlx::Error> {
        let existing = mappings::resolve_canonical_id(
            &mut **tx,
            "match",
            ProviderName::Espn,
            &entry.provider_match_id,
        )
        .await?;

        if let Some(match_id) = existing {
            // Refresh schedule-level fields; live state belongs to the
            // normalizer, so phase only moves while the match is pre-live.
            sqlx::query(
                "UPDATE matches SET start_time = $2, venue = COALESCE($3, venue),
                        phase = CASE WHEN phase IN ('scheduled', 'pre_match') THEN $4 ELSE phase END,
                        updated_at = now()
                 WHERE id = $1",
            )
            .bind(match_id)
            .bind(entry.start_time)
            .bind(&entry.venue)
            .bind(entry.phase.as_str())
            .execute(&mut **tx)
            .await?;
            return Ok(false);
        }

        let home_team_id = self.upsert_team(&mut *tx, spec, sport_id, &entry.home).await?;
        let away_team_id = self.upsert_team(&mut *tx, spec, sport_id, &entry.away).await?;
        if home_team_id == away_team_id {
            // Provider glitch; the matches table would reject it anyway.
            return Ok(false);
        }

        let match_id = matches::create(
            &mut *tx,
            league_id,
            home_team_id,
            away_team_id,
            entry.start_time,
            entry.venue.as_deref(),
            entry.phase,
        )
        .await?;
        mappings::ensure_mapping(
            &mut **tx,
            "match",
            match_id,
            ProviderName::Espn,
            &entry.provider_match_id,
        )
        .await?;
        Ok(true)
    }
}
