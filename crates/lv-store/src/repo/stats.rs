use sqlx::{PgConnection, PgExecutor, Row};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct MatchStatsRow {
    pub match_id: Uuid,
    pub home_stats: serde_json::Value,
    pub away_stats: serde_json::Value,
    pub version: i32,
    pub seq: i64,
}

pub async fn get<'e, E: PgExecutor<'e>>(
    executor: E,
    match_id: Uuid,
) -> Result<Option<MatchStatsRow>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT match_id, home_stats, away_stats, version, seq
         FROM match_stats WHERE match_id = $1",
    )
    .bind(match_id)
    .fetch_optional(executor)
    .await?;
    Ok(row.map(|r| MatchStatsRow {
        match_id: r.get("match_id"),
        home_stats: r.get("home_stats"),
        away_stats: r.get("away_stats"),
        version: r.get("version"),
        seq: r.get("seq"),
    }))
}

pub async fn upsert(
    conn: &mut PgConnection,
    match_id: Uuid,
    home_stats: &serde_json::Value,
    away_stats: &serde_json::Value,
    version: i32,
    seq: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO match_stats (id, match_id, home_stats, away_stats, version, seq, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, now())
         ON CONFLICT ON CONSTRAINT uq_match_stats DO UPDATE SET
            home_stats = EXCLUDED.home_stats,
            away_stats = EXCLUDED.away_stats,
            version = EXCLUDED.version,
            seq = EXCLUDED.seq,
            updated_at = now()",
    )
    .bind(Uuid::new_v4())
    .bind(match_id)
    .bind(home_stats)
    .bind(away_stats)
    .bind(version)
    .bind(seq)
    .execute(conn)
    .await?;
    Ok(())
}
