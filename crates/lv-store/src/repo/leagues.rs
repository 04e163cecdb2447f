use sqlx::{PgConnection, Row};
use uuid::Uuid;

/// Find a league by (sport, name) or create it.  Used by schedule sync,
/// which must stay idempotent across runs.
pub async fn get_or_create(
    conn: &mut PgConnection,
    sport_id: Uuid,
    name: &str,
    short_name: &str,
    country: &str,
) -> Result<Uuid, sqlx::Error> {
    let existing = sqlx::query("SELECT id FROM leagues WHERE sport_id = $1 AND name = $2")
        .bind(sport_id)
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;
    if let Some(row) = existing {
        return Ok(row.get("id"));
    }
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO leagues (id, sport_id, name, short_name, country)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(id)
    .bind(sport_id)
    .bind(name)
    .bind(short_name)
    .bind(country)
    .execute(conn)
    .await?;
    Ok(id)
}
