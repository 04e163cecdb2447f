use sqlx::{PgConnection, PgExecutor, Row};
use uuid::Uuid;

use lv_model::{EventType, MatchEvent};

/// The subset of a stored event the reconciliation engine compares against.
#[derive(Debug, Clone)]
pub struct SyntheticEventRow {
    pub id: Uuid,
    pub event_type: EventType,
    pub minute: Option<i32>,
    pub team_id: Option<Uuid>,
    pub score_home: Option<i32>,
    pub score_away: Option<i32>,
}

/// Insert an event unless `(match_id, source_provider, provider_event_id)`
/// already exists.  Assigns the next per-match `seq` inside the caller's
/// transaction and returns it, or `None` for a duplicate.
pub async fn insert_if_absent(
    conn: &mut PgConnection,
    event: &MatchEvent,
) -> Result<Option<i64>, sqlx::Error> {
    let next_seq: i64 = sqlx::query(
        "SELECT COALESCE(MAX(seq), 0) + 1 AS next_seq FROM match_events WHERE match_id = $1",
    )
    .bind(event.match_id)
    .fetch_one(&mut *conn)
    .await?
    .get("next_seq");

    let inserted = sqlx::query(
        "INSERT INTO match_events
            (id, match_id, event_type, minute, second, period, team_id, player_name, detail,
             score_home, score_away, synthetic, confidence, source_provider, provider_event_id,
             seq, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
         ON CONFLICT ON CONSTRAINT uq_match_event_provider DO NOTHING
         RETURNING seq",
    )
    .bind(event.id)
    .bind(event.match_id)
    .bind(event.event_type.as_str())
    .bind(event.minute)
    .bind(event.second)
    .bind(&event.period)
    .bind(event.team_id)
    .bind(&event.player_name)
    .bind(&event.detail)
    .bind(event.score_home)
    .bind(event.score_away)
    .bind(event.synthetic)
    .bind(event.confidence)
    .bind(event.source_provider.map(|p| p.as_str()))
    .bind(&event.provider_event_id)
    .bind(next_seq)
    .bind(event.created_at)
    .fetch_optional(conn)
    .await?;

    Ok(inserted.map(|r| r.get("seq")))
}

/// The most recent synthetic events for a match, newest first.
pub async fn recent_synthetic<'e, E: PgExecutor<'e>>(
    executor: E,
    match_id: Uuid,
    limit: i64,
) -> Result<Vec<SyntheticEventRow>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT id, event_type, minute, team_id, score_home, score_away
         FROM match_events
         WHERE match_id = $1 AND synthetic
         ORDER BY seq DESC
         LIMIT $2",
    )
    .bind(match_id)
    .bind(limit)
    .fetch_all(executor)
    .await?;
    Ok(rows
        .into_iter()
        .filter_map(|r| {
            let event_type = EventType::parse(r.get::<String, _>("event_type").as_str())?;
            Some(SyntheticEventRow {
                id: r.get("id"),
                event_type,
                minute: r.get("minute"),
                team_id: r.get("team_id"),
                score_home: r.get("score_home"),
                score_away: r.get("score_away"),
            })
        })
        .collect())
}

/// Hard-delete a synthetic event superseded by a real one.
pub async fn delete_synthetic<'e, E: PgExecutor<'e>>(
    executor: E,
    event_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM match_events WHERE id = $1 AND synthetic")
        .bind(event_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}
