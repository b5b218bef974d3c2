//! Connection handle shared by every unit of work in the process

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use talentbase_common::{Config, Result};
use tracing::{info, warn};

use crate::uow::UnitOfWork;

/// Boxed future borrowed from a unit of work
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Process-wide handle to the relational store.
///
/// Cheap to clone; each clone hands out independent transactions.
#[derive(Clone, Debug)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool from configuration
    pub async fn connect(config: &Config) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.database_url)
            .await?;

        info!(
            max_connections = config.max_connections,
            "Database connection established"
        );
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Begin a new unit of work
    pub async fn begin(&self, read_only: bool) -> Result<UnitOfWork> {
        UnitOfWork::begin(&self.pool, read_only).await
    }

    /// Run `work` inside a fresh unit of work.
    ///
    /// Commits when `work` succeeds, rolls back when it fails. The closure
    /// must return a boxed future borrowing the unit of work:
    ///
    /// ```ignore
    /// let talent = db
    ///     .transaction(move |uow| {
    ///         Box::pin(async move {
    ///             Repository::<Talent>::new().add(uow, &mut talent).await?;
    ///             Ok(talent)
    ///         })
    ///     })
    ///     .await?;
    /// ```
    pub async fn transaction<T, F>(&self, work: F) -> Result<T>
    where
        F: for<'a> FnOnce(&'a mut UnitOfWork) -> BoxFuture<'a, Result<T>>,
    {
        let mut uow = self.begin(false).await?;
        match work(&mut uow).await {
            Ok(value) => {
                uow.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    warn!(uow = %uow.id(), error = %rollback_err, "Rollback failed");
                }
                Err(err)
            }
        }
    }
}

/// Begin a unit of work on `db`
pub async fn new_unit_of_work(db: &Database, read_only: bool) -> Result<UnitOfWork> {
    db.begin(read_only).await
}
