//! Connection pool for the explore store.

use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, warn};

use agora_core::{Error, Result};

/// Explore requests fan out into a count, a page and one count per facet,
/// so the pool is sized for a handful of concurrent requests.
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Sizing and scoping of the explore pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// Schema placed ahead of `public` on every connection, used to isolate
    /// test runs.
    pub search_path: Option<String>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            search_path: None,
        }
    }
}

impl PoolConfig {
    /// `DB_MAX_CONNECTIONS` and `DB_ACQUIRE_TIMEOUT_SECS` over the defaults.
    /// Unparseable or zero values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(n) = positive_env::<u32>("DB_MAX_CONNECTIONS") {
            config.max_connections = n;
        }
        if let Some(secs) = positive_env::<u64>("DB_ACQUIRE_TIMEOUT_SECS") {
            config.acquire_timeout = Duration::from_secs(secs);
        }
        config
    }

    pub fn max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }

    pub fn search_path(mut self, schema: impl Into<String>) -> Self {
        self.search_path = Some(schema.into());
        self
    }
}

fn positive_env<T>(name: &str) -> Option<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => Some(value),
        _ => {
            warn!(subsystem = "db", variable = name, value = %raw, "Ignoring invalid pool setting");
            None
        }
    }
}

/// Open a pool against `database_url`.
pub async fn create_pool(database_url: &str, config: &PoolConfig) -> Result<PgPool> {
    let start = Instant::now();

    let mut options = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout);

    if let Some(schema) = &config.search_path {
        let statement = format!("SET search_path TO {}, public", quote_ident(schema)?);
        options = options.after_connect(move |conn, _meta| {
            let statement = statement.clone();
            Box::pin(async move {
                sqlx::query(&statement).execute(conn).await?;
                Ok(())
            })
        });
    }

    let pool = options
        .connect(database_url)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "db",
        component = "pool",
        max_connections = config.max_connections,
        search_path = config.search_path.as_deref().unwrap_or("public"),
        duration_ms = start.elapsed().as_millis() as u64,
        "Explore pool ready"
    );
    Ok(pool)
}

/// Warn when every pooled connection is checked out.
pub fn log_pool_metrics(pool: &PgPool) {
    let (size, idle) = (pool.size(), pool.num_idle());
    if size > 0 && idle == 0 {
        warn!(subsystem = "db", component = "pool", pool_size = size, "No idle connections");
    } else {
        info!(subsystem = "db", component = "pool", pool_size = size, pool_idle = idle, "Pool status");
    }
}

/// Lowercase identifiers only; anything else is rejected rather than escaped.
fn quote_ident(name: &str) -> Result<String> {
    let valid = (1..=63).contains(&name.len())
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if !valid {
        return Err(Error::Config(format!("Invalid schema name: {}", name)));
    }
    Ok(format!("\"{}\"", name))
}
