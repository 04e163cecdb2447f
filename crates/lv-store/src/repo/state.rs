use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgExecutor, Row};
use uuid::Uuid;

use lv_model::MatchPhase;

/// The one-to-one state row for a match.
#[derive(Debug, Clone)]
pub struct MatchStateRow {
    pub match_id: Uuid,
    pub score_home: i32,
    pub score_away: i32,
    pub score_breakdown: serde_json::Value,
    pub clock: Option<String>,
    pub phase: MatchPhase,
    pub period: Option<String>,
    pub extra: serde_json::Value,
    pub version: i32,
    pub seq: i64,
    pub updated_at: DateTime<Utc>,
}

/// Fields written by a state upsert.  `version`/`seq` are assigned by the
/// caller, which has read the current row inside the same transaction.
#[derive(Debug, Clone)]
pub struct StateWrite {
    pub score_home: i32,
    pub score_away: i32,
    pub score_breakdown: serde_json::Value,
    pub clock: Option<String>,
    pub phase: MatchPhase,
    pub period: Option<String>,
    pub extra: serde_json::Value,
    pub version: i32,
    pub seq: i64,
}

pub async fn get<'e, E: PgExecutor<'e>>(
    executor: E,
    match_id: Uuid,
) -> Result<Option<MatchStateRow>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT match_id, score_home, score_away, score_breakdown, clock, phase, period,
                extra, version, seq, updated_at
         FROM match_state WHERE match_id = $1",
    )
    .bind(match_id)
    .fetch_optional(executor)
    .await?;
    Ok(row.map(|r| MatchStateRow {
        match_id: r.get("match_id"),
        score_home: r.get("score_home"),
        score_away: r.get("score_away"),
        score_breakdown: r.get("score_breakdown"),
        clock: r.get("clock"),
        phase: MatchPhase::parse(r.get::<String, _>("phase").as_str())
            .unwrap_or(MatchPhase::Scheduled),
        period: r.get("period"),
        extra: r.get("extra"),
        version: r.get("version"),
        seq: r.get("seq"),
        updated_at: r.get("updated_at"),
    }))
}

pub async fn upsert(
    conn: &mut PgConnection,
    match_id: Uuid,
    write: &StateWrite,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO match_state
            (match_id, score_home, score_away, score_breakdown, clock, phase, period, extra,
             version, seq, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, now())
         ON CONFLICT (match_id) DO UPDATE SET
            score_home = EXCLUDED.score_home,
            score_away = EXCLUDED.score_away,
            score_breakdown = EXCLUDED.score_breakdown,
            clock = EXCLUDED.clock,
            phase = EXCLUDED.phase,
            period = EXCLUDED.period,
            extra = EXCLUDED.extra,
            version = EXCLUDED.version,
            seq = EXCLUDED.seq,
            updated_at = now()",
    )
    .bind(match_id)
    .bind(write.score_home)
    .bind(write.score_away)
    .bind(&write.score_breakdown)
    .bind(&write.clock)
    .bind(write.phase.as_str())
    .bind(&write.period)
    .bind(&write.extra)
    .bind(write.version)
    .bind(write.seq)
    .execute(conn)
    .await?;
    Ok(())
}
