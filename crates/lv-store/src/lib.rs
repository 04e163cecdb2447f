// lv-store: Postgres access for the canonical data store.
//
// Repositories are free functions over executors in `repo::*`, mirroring the
// schema one to one.  Writers that must be atomic (the normalizer, the
// builder's persistence) open a transaction and pass the connection down.

pub mod repo;

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await
}

/// Create the pool with bounded exponential backoff, for services that may
/// start before Postgres is reachable.
pub async fn create_pool_with_retry(
    database_url: &str,
    max_attempts: u32,
    base_delay: Duration,
) -> Result<PgPool, sqlx::Error> {
    let mut attempt = 0;
    loop {
        match create_pool(database_url).await {
            Ok(pool) => {
                info!("database connected");
                return Ok(pool);
            }
            Err(err) => {
                attempt += 1;
                if attempt >= max_attempts {
                    return Err(err);
                }
                let delay = base_delay * 2u32.pow(attempt - 1);
                warn!(attempt, max_attempts, error = %err, delay_s = delay.as_secs(), "database connect failed, retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
