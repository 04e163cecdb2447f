use sqlx::{PgConnection, PgExecutor, Row};
use uuid::Uuid;

use lv_model::ProviderName;

/// One external identifier for a canonical entity.
#[derive(Debug, Clone)]
pub struct MappingRow {
    pub provider: String,
    pub provider_id: String,
}

/// Look up the canonical UUID for a provider-owned identifier.
pub async fn resolve_canonical_id<'e, E: PgExecutor<'e>>(
    executor: E,
    entity_type: &str,
    provider: ProviderName,
    provider_id: &str,
) -> Result<Option<Uuid>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT canonical_id FROM provider_mappings
         WHERE entity_type = $1 AND provider = $2 AND provider_id = $3",
    )
    .bind(entity_type)
    .bind(provider.as_str())
    .bind(provider_id)
    .fetch_optional(executor)
    .await?;
    Ok(row.map(|r| r.get("canonical_id")))
}

/// Idempotently create or repoint a provider mapping.
pub async fn ensure_mapping(
    conn: &mut PgConnection,
    entity_type: &str,
    canonical_id: Uuid,
    provider: ProviderName,
    provider_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO provider_mappings (id, entity_type, canonical_id, provider, provider_id)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT ON CONSTRAINT uq_provider_mapping
         DO UPDATE SET canonical_id = EXCLUDED.canonical_id, updated_at = now()",
    )
    .bind(Uuid::new_v4())
    .bind(entity_type)
    .bind(canonical_id)
    .bind(provider.as_str())
    .bind(provider_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// All provider identifiers recorded for one canonical entity.
pub async fn mappings_for<'e, E: PgExecutor<'e>>(
    executor: E,
    entity_type: &str,
    canonical_id: Uuid,
) -> Result<Vec<MappingRow>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT provider, provider_id FROM provider_mappings
         WHERE entity_type = $1 AND canonical_id = $2",
    )
    .bind(entity_type)
    .bind(canonical_id)
    .fetch_all(executor)
    .await?;
    Ok(rows
        .into_iter()
        .map(|r| MappingRow {
            provider: r.get("provider"),
            provider_id: r.get("provider_id"),
        })
        .collect())
}
