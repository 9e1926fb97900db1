//! Repository layer for database operations
//!
//! Each area exposes a trait so services stay agnostic of the backend. The
//! PostgreSQL implementations are the production path; [`memory::MemoryStore`]
//! backs development runs and tests.

pub mod books;
pub mod loans;
pub mod memory;
pub mod users;

use std::{sync::Arc, time::Duration};

use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    Pool, Postgres,
};

use crate::{config::DatabaseConfig, error::AppResult};

pub use books::BooksRepository;
pub use loans::LoansRepository;
pub use users::UsersRepository;

/// Main repository struct holding the store handles
#[derive(Clone)]
pub struct Repository {
    pool: Option<Pool<Postgres>>,
    pub users: Arc<dyn UsersRepository>,
    pub books: Arc<dyn BooksRepository>,
    pub loans: Arc<dyn LoansRepository>,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            users: Arc::new(users::PgUsersRepository::new(pool.clone())),
            books: Arc::new(books::PgBooksRepository::new(pool.clone())),
            loans: Arc::new(loans::PgLoansRepository::new(pool.clone())),
            pool: Some(pool),
        }
    }

    /// Repository backed by a single in-process store
    pub fn in_memory(store: Arc<memory::MemoryStore>) -> Self {
        Self {
            pool: None,
            users: store.clone(),
            books: store.clone(),
            loans: store,
        }
    }

    /// Open the store described by `config`, running migrations for PostgreSQL
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        if config.is_memory() {
            tracing::warn!("Using in-memory store; data is lost on shutdown");
            return Ok(Self::in_memory(Arc::new(memory::MemoryStore::with_demo_books())));
        }

        let options: PgConnectOptions = config.url.parse()?;
        let options = options.options([(
            "statement_timeout",
            format!("{}s", config.statement_timeout_secs),
        )]);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect_with(options)
            .await?;

        tracing::info!("Connected to database");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| crate::error::AppError::Internal(format!("Migration failed: {}", e)))?;

        tracing::info!("Database migrations completed");

        Ok(Self::new(pool))
    }

    /// Check the store answers
    pub async fn ping(&self) -> AppResult<()> {
        if let Some(pool) = &self.pool {
            sqlx::query("SELECT 1").execute(pool).await?;
        }
        Ok(())
    }

    /// Release pooled connections
    pub async fn close(&self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
