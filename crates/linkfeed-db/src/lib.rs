//! # linkfeed-db
//!
//! PostgreSQL storage layer for linkfeed.
//!
//! This crate provides:
//! - Connection pool management
//! - [`PgPostRepository`]: idempotent bulk insert and ordered/paginated reads
//! - [`MemoryPostRepository`]: the same contract without a database
//!
//! ## Example
//!
//! ```rust,ignore
//! use linkfeed_db::{Database, FetchedLink, PostRepository};
//!
//! let db = Database::connect("postgres://localhost/linkfeed").await?;
//! db.migrate().await?;
//! db.posts
//!     .insert_ignoring_duplicates(&[FetchedLink::new("https://example.com", "Example")])
//!     .await?;
//! ```

pub mod memory;
pub mod pool;
pub mod posts;

// Re-export core types
pub use linkfeed_core::*;

pub use memory::MemoryPostRepository;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use posts::PgPostRepository;

/// Database context: the pool plus its repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Post repository.
    pub posts: PgPostRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            posts: PgPostRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
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

    /// Close the pool, waiting for checked-out connections to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
