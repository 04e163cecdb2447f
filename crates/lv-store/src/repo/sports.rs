use sqlx::{PgConnection, PgExecutor, Row};
use std::collections::HashMap;
use uuid::Uuid;

use lv_model::Sport;

/// Map of sport_type -> sport id for every row in the sports table.
pub async fn all_by_type<'e, E: PgExecutor<'e>>(
    executor: E,
) -> Result<HashMap<String, Uuid>, sqlx::Error> {
    let rows = sqlx::query("SELECT id, sport_type FROM sports")
        .fetch_all(executor)
        .await?;
    Ok(rows
        .into_iter()
        .map(|r| (r.get("sport_type"), r.get("id")))
        .collect())
}

pub async fn get_or_create(conn: &mut PgConnection, sport: Sport) -> Result<Uuid, sqlx::Error> {
    let existing = sqlx::query("SELECT id FROM sports WHERE sport_type = $1")
        .bind(sport.as_str())
        .fetch_optional(&mut *conn)
        .await?;
    if let Some(row) = existing {
        return Ok(row.get("id"));
    }
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO sports (id, name, sport_type) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(sport.as_str())
        .bind(sport.as_str())
        .execute(conn)
        .await?;
    Ok(id)
}
