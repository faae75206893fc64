//! Postgres connection pool

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Maximum pooled connections per process
const MAX_CONNECTIONS: u32 = 10;

/// Create a database connection pool
///
/// The managed database sits behind a pooler, so connections are kept few
/// and acquisition fails fast rather than queueing webhook work.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(300))
        .connect(database_url)
        .await?;

    tracing::info!(max_connections = MAX_CONNECTIONS, "Database pool created");
    Ok(pool)
}
