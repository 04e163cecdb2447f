use sqlx::PgConnection;
use uuid::Uuid;

pub async fn create(
    conn: &mut PgConnection,
    sport_id: Uuid,
    name: &str,
    short_name: &str,
    logo_url: Option<&str>,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO teams (id, sport_id, name, short_name, logo_url)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(id)
    .bind(sport_id)
    .bind(name)
    .bind(short_name)
    .bind(logo_url)
    .execute(conn)
    .await?;
    Ok(id)
}
