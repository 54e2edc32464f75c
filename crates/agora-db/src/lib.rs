//! # agora-db
//!
//! PostgreSQL store for the agora explore engine.
//!
//! This crate provides:
//! - Connection pool management
//! - Rendering of [`Predicate`] trees into parameterised SQL
//! - [`PgExploreRepository`], the [`ExploreStore`] implementation
//! - [`PgFilterVectorRepository`] for filter-vector maintenance
//!
//! ## Example
//!
//! ```rust,ignore
//! use agora_db::Database;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/agora").await?;
//!     let updated = db
//!         .filter_vectors
//!         .refresh_filter_vectors(agora_db::EntityKind::Events, None)
//!         .await?;
//!     println!("Refreshed {} events", updated);
//!     Ok(())
//! }
//! ```
pub mod explore;
pub mod filter_vectors;
pub mod pool;
pub mod sql;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use agora_core::*;

/// Escape LIKE/ILIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

pub use explore::PgExploreRepository;
pub use filter_vectors::PgFilterVectorRepository;
pub use pool::{create_pool, log_pool_metrics, PoolConfig};
pub use sql::{from_clause, render_predicate, SqlWriter};

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Explore queries.
    pub explore: PgExploreRepository,
    /// Filter vector maintenance.
    pub filter_vectors: PgFilterVectorRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            explore: PgExploreRepository::new(pool.clone()),
            filter_vectors: PgFilterVectorRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_config(url, PoolConfig::default()).await
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool(url, &config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
