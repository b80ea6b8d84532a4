//! Pool construction and liveness checks.

use sqlx_core::pool::PoolOptions;
use sqlx_core::query::query;
use sqlx_postgres::{PgPool, Postgres};
use tracing::{debug, instrument};

use crate::config::PostgresConfig;
use crate::error::{PostgresError, Result};

/// Opens a pool sized and timed by `config`.
#[instrument(skip_all, fields(url = %redact_url(&config.url), max = config.max_connections))]
pub async fn connect(config: &PostgresConfig) -> Result<PgPool> {
    if config.max_connections == 0 {
        return Err(PostgresError::config("max_connections must be greater than 0"));
    }

    let pool = PoolOptions::<Postgres>::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .connect(&config.url)
        .await?;

    debug!("connection pool open");
    Ok(pool)
}

/// Round-trips `SELECT 1`.
pub async fn ping(pool: &PgPool) -> Result<()> {
    query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Hides the password of a connection URL so it can be logged.
pub(crate) fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((userinfo, host)) = rest.split_once('@') else {
        return url.to_string();
    };
    match userinfo.split_once(':') {
        Some((user, _)) => format!("{scheme}://{user}:****@{host}"),
        None => url.to_string(),
    }
}
