use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgExecutor, PgPool, Row};
use uuid::Uuid;

use lv_model::{MatchPhase, Sport};

/// A match the scheduler should be polling, with enough context to build
/// poll tasks.
#[derive(Debug, Clone)]
pub struct ActiveMatchRow {
    pub match_id: Uuid,
    pub league_id: Uuid,
    pub phase: MatchPhase,
    pub start_time: DateTime<Utc>,
    pub sport: Sport,
}

/// A live match joined with its state and display references, as consumed by
/// the verifier.
#[derive(Debug, Clone)]
pub struct LiveMatchRow {
    pub match_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub sport: Sport,
    pub league_id: Uuid,
    pub league_name: String,
    pub league_country: String,
    pub home_team_id: Uuid,
    pub home_name: String,
    pub home_short_name: String,
    pub away_team_id: Uuid,
    pub away_name: String,
    pub away_short_name: String,
    pub score_home: i32,
    pub score_away: i32,
    pub phase: MatchPhase,
    pub clock: Option<String>,
    pub period: Option<String>,
    pub version: i32,
}

fn phase_or_scheduled(raw: &str) -> MatchPhase {
    MatchPhase::parse(raw).unwrap_or(MatchPhase::Scheduled)
}

/// Matches that need active polling: live phases, pre-match, matches starting
/// inside the [-5 min, +10 min] window, and recently finished matches still
/// awaiting final-score confirmation.
pub async fn discover_active(
    pool: &PgPool,
    now: DateTime<Utc>,
    recently_finished_window: chrono::Duration,
) -> Result<Vec<ActiveMatchRow>, sqlx::Error> {
    let active_phases: Vec<String> = [
        MatchPhase::PreMatch,
        MatchPhase::LiveFirstHalf,
        MatchPhase::LiveHalftime,
        MatchPhase::LiveSecondHalf,
        MatchPhase::LiveExtraTime,
        MatchPhase::LivePenalties,
        MatchPhase::LiveQ1,
        MatchPhase::LiveQ2,
        MatchPhase::LiveQ3,
        MatchPhase::LiveQ4,
        MatchPhase::LiveOt,
        MatchPhase::LiveP1,
        MatchPhase::LiveP2,
        MatchPhase::LiveP3,
        MatchPhase::LiveInning,
        MatchPhase::Break,
        MatchPhase::Suspended,
    ]
    .iter()
    .map(|p| p.as_str().to_owned())
    .collect();

    let rows = sqlx::query(
        "SELECT m.id, m.phase, m.start_time, m.league_id, s.sport_type
         FROM matches m
         JOIN leagues l ON l.id = m.league_id
         JOIN sports s ON s.id = l.sport_id
         WHERE m.phase = ANY($1)
            OR m.start_time BETWEEN $2 AND $3
            OR (m.phase = 'finished' AND m.updated_at >= $4)",
    )
    .bind(&active_phases)
    .bind(now - chrono::Duration::minutes(5))
    .bind(now + chrono::Duration::minutes(10))
    .bind(now - recently_finished_window)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(|r| {
            let sport = Sport::parse(r.get::<String, _>("sport_type").as_str())?;
            Some(ActiveMatchRow {
                match_id: r.get("id"),
                league_id: r.get("league_id"),
                phase: phase_or_scheduled(r.get::<String, _>("phase").as_str()),
                start_time: r.get("start_time"),
                sport,
            })
        })
        .collect())
}

/// All matches currently in a live or break phase, for verification.
pub async fn live_matches(pool: &PgPool) -> Result<Vec<LiveMatchRow>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT m.id, m.start_time, m.league_id,
                l.name AS league_name, l.country AS league_country, s.sport_type,
                ht.id AS home_team_id, ht.name AS home_name, ht.short_name AS home_short_name,
                aw.id AS away_team_id, aw.name AS away_name, aw.short_name AS away_short_name,
                COALESCE(st.score_home, 0) AS score_home,
                COALESCE(st.score_away, 0) AS score_away,
                COALESCE(st.phase, m.phase) AS state_phase,
                st.clock, st.period, COALESCE(st.version, 0) AS version
         FROM matches m
         JOIN leagues l ON l.id = m.league_id
         JOIN sports s ON s.id = l.sport_id
         JOIN teams ht ON ht.id = m.home_team_id
         JOIN teams aw ON aw.id = m.away_team_id
         LEFT JOIN match_state st ON st.match_id = m.id
         WHERE m.phase LIKE 'live%' OR m.phase = 'break'",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(|r| {
            let sport = Sport::parse(r.get::<String, _>("sport_type").as_str())?;
            Some(LiveMatchRow {
                match_id: r.get("id"),
                start_time: r.get("start_time"),
                sport,
                league_id: r.get("league_id"),
                league_name: r.get("league_name"),
                league_country: r.get("league_country"),
                home_team_id: r.get("home_team_id"),
                home_name: r.get("home_name"),
                home_short_name: r.get("home_short_name"),
                away_team_id: r.get("away_team_id"),
                away_name: r.get("away_name"),
                away_short_name: r.get("away_short_name"),
                score_home: r.get("score_home"),
                score_away: r.get("score_away"),
                phase: phase_or_scheduled(r.get::<String, _>("state_phase").as_str()),
                clock: r.get("clock"),
                period: r.get("period"),
                version: r.get("version"),
            })
        })
        .collect())
}

/// The sport a match belongs to, via its league.
pub async fn sport_of<'e, E: PgExecutor<'e>>(
    executor: E,
    match_id: Uuid,
) -> Result<Option<Sport>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT s.sport_type
         FROM matches m
         JOIN leagues l ON l.id = m.league_id
         JOIN sports s ON s.id = l.sport_id
         WHERE m.id = $1",
    )
    .bind(match_id)
    .fetch_optional(executor)
    .await?;
    Ok(row.and_then(|r| Sport::parse(r.get::<String, _>("sport_type").as_str())))
}

pub async fn exists<'e, E: PgExecutor<'e>>(executor: E, match_id: Uuid) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT 1 AS one FROM matches WHERE id = $1")
        .bind(match_id)
        .fetch_optional(executor)
        .await?;
    Ok(row.is_some())
}

/// Update the match-level phase alongside a state write.
pub async fn set_phase(
    conn: &mut PgConnection,
    match_id: Uuid,
    phase: MatchPhase,
    version: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE matches SET phase = $2, version = $3, updated_at = now() WHERE id = $1")
        .bind(match_id)
        .bind(phase.as_str())
        .bind(version)
        .execute(conn)
        .await?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn create(
    conn: &mut PgConnection,
    league_id: Uuid,
    home_team_id: Uuid,
    away_team_id: Uuid,
    start_time: DateTime<Utc>,
    venue: Option<&str>,
    phase: MatchPhase,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO matches (id, league_id, home_team_id, away_team_id, start_time, venue, phase)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(id)
    .bind(league_id)
    .bind(home_team_id)
    .bind(away_team_id)
    .bind(start_time)
    .bind(venue)
    .bind(phase.as_str())
    .execute(conn)
    .await?;
    Ok(id)
}
