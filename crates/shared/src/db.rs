//! Database utilities and connection management

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::{str::FromStr, time::Duration};

use crate::types::UserId;

/// Session setting the row-level policies read the caller's identity from
pub const REQUEST_USER_SETTING: &str = "request.jwt.claim.sub";

/// Create the request-path database pool
/// Note: Disables statement cache for PgBouncer compatibility
/// Uses conservative connection limits to stay within the Supabase pooler's pool_size
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    // PgBouncer in transaction mode doesn't support prepared statements
    let options = PgConnectOptions::from_str(database_url)?.statement_cache_capacity(0);

    PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(0)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(60))
        .max_lifetime(Duration::from_secs(300))
        .connect_with(options)
        .await
}

/// Create the privileged pool used by the payment webhook
///
/// Connects with the service-role credential, which is not subject to the
/// per-user row-level policies. Only the credit ledger writes through it.
pub async fn create_service_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let options = PgConnectOptions::from_str(database_url)?.statement_cache_capacity(0);

    PgPoolOptions::new()
        .max_connections(2)
        .min_connections(0)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(60))
        .max_lifetime(Duration::from_secs(300))
        .connect_with(options)
        .await
}

/// Begin a request-path transaction acting as `user_id`
///
/// The identity is set with `is_local = true`, so it ends with the transaction
/// and never leaks to the next borrower of a pooled (or PgBouncer) connection.
/// The row-level policies only let the transaction see that user's rows.
pub async fn begin_user_scope(
    pool: &PgPool,
    user_id: UserId,
) -> Result<Transaction<'static, Postgres>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("SELECT set_config($1, $2, true)")
        .bind(REQUEST_USER_SETTING)
        .bind(user_id.to_string())
        .execute(&mut *tx)
        .await?;
    Ok(tx)
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await
}
