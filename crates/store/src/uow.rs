//! Unit of Work: one transaction shared by every repository call of an operation
//!
//! A unit of work is threaded explicitly through service calls as
//! `&mut UnitOfWork`. It is never shared between tasks; nested calls that
//! reuse it run sequentially.

use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgConnection, PgPool, Postgres, Transaction};
use talentbase_common::{Error, Result};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::query::Fragment;
use crate::state::{UnitOfWorkEvent, UnitOfWorkState, UnitOfWorkStateMachine};
use crate::value::arguments;

pub struct UnitOfWork {
    id: Uuid,
    tx: Option<Transaction<'static, Postgres>>,
    read_only: bool,
    state: UnitOfWorkState,
}

impl UnitOfWork {
    pub(crate) async fn begin(pool: &PgPool, read_only: bool) -> Result<Self> {
        let tx = pool.begin().await?;
        let id = Uuid::new_v4();
        debug!(uow = %id, read_only, "Unit of work started");
        Ok(Self {
            id,
            tx: Some(tx),
            read_only,
            state: UnitOfWorkState::Open,
        })
    }

    /// Correlation id used in log lines
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Read-only units of work are advisory: writes are logged, not refused
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn state(&self) -> UnitOfWorkState {
        self.state
    }

    /// Commit every write issued under this unit of work.
    ///
    /// Committing a terminal unit of work is caller misuse. If the store
    /// rejects the commit, the unit of work ends rolled back and the error
    /// is returned; the operation must be treated as failed.
    pub async fn commit(&mut self) -> Result<()> {
        let next = UnitOfWorkStateMachine::transition(self.state, UnitOfWorkEvent::Commit)
            .map_err(|e| Error::Misuse(e.to_string()))?;
        let tx = self
            .tx
            .take()
            .ok_or_else(|| Error::Internal("Open unit of work without a transaction".into()))?;

        match tx.commit().await {
            Ok(()) => {
                self.state = next;
                info!(uow = %self.id, "Unit of work committed");
                Ok(())
            }
            Err(e) => {
                self.state = UnitOfWorkState::RolledBack;
                warn!(uow = %self.id, error = %e, "Commit failed, unit of work rolled back");
                Err(e.into())
            }
        }
    }

    /// Undo every write issued under this unit of work.
    ///
    /// Safe to call from any error path: on a terminal unit of work it does
    /// nothing and succeeds.
    pub async fn rollback(&mut self) -> Result<()> {
        let next = match UnitOfWorkStateMachine::transition(self.state, UnitOfWorkEvent::Rollback) {
            Ok(next) => next,
            Err(_) => {
                debug!(uow = %self.id, state = %self.state, "Rollback ignored");
                return Ok(());
            }
        };
        self.state = next;

        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
        }
        info!(uow = %self.id, "Unit of work rolled back");
        Ok(())
    }

    fn connection(&mut self) -> Result<&mut PgConnection> {
        if self.state.is_terminal() {
            return Err(Error::Misuse(format!(
                "Unit of work {} is {} and cannot be reused",
                self.id, self.state
            )));
        }
        self.tx
            .as_deref_mut()
            .ok_or_else(|| Error::Internal("Open unit of work without a transaction".into()))
    }

    pub(crate) async fn fetch_all<T>(&mut self, statement: &Fragment) -> Result<Vec<T>>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let (sql, binds) = statement.render()?;
        debug!(uow = %self.id, sql = %sql, binds = binds.len(), "fetch_all");
        let args = arguments(binds)?;
        let conn = self.connection()?;
        let rows = sqlx::query_as_with::<Postgres, T, _>(&sql, args)
            .fetch_all(conn)
            .await?;
        Ok(rows)
    }

    pub(crate) async fn fetch_optional<T>(&mut self, statement: &Fragment) -> Result<Option<T>>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let (sql, binds) = statement.render()?;
        debug!(uow = %self.id, sql = %sql, binds = binds.len(), "fetch_optional");
        let args = arguments(binds)?;
        let conn = self.connection()?;
        let row = sqlx::query_as_with::<Postgres, T, _>(&sql, args)
            .fetch_optional(conn)
            .await?;
        Ok(row)
    }

    pub(crate) async fn fetch_count(&mut self, statement: &Fragment) -> Result<i64> {
        let (sql, binds) = statement.render()?;
        debug!(uow = %self.id, sql = %sql, binds = binds.len(), "fetch_count");
        let args = arguments(binds)?;
        let conn = self.connection()?;
        let count = sqlx::query_scalar_with::<Postgres, i64, _>(&sql, args)
            .fetch_one(conn)
            .await?;
        Ok(count)
    }

    pub(crate) async fn fetch_flag(&mut self, statement: &Fragment) -> Result<bool> {
        let (sql, binds) = statement.render()?;
        debug!(uow = %self.id, sql = %sql, binds = binds.len(), "fetch_flag");
        let args = arguments(binds)?;
        let conn = self.connection()?;
        let flag = sqlx::query_scalar_with::<Postgres, bool, _>(&sql, args)
            .fetch_one(conn)
            .await?;
        Ok(flag)
    }

    /// Run a write; returns rows affected
    pub(crate) async fn execute(&mut self, statement: &Fragment) -> Result<u64> {
        let (sql, binds) = statement.render()?;
        if self.read_only {
            warn!(uow = %self.id, sql = %sql, "Write issued on a read-only unit of work");
        }
        debug!(uow = %self.id, sql = %sql, binds = binds.len(), "execute");
        let args = arguments(binds)?;
        let conn = self.connection()?;
        let result = sqlx::query_with::<Postgres, _>(&sql, args).execute(conn).await?;
        Ok(result.rows_affected())
    }
}

impl std::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("id", &self.id)
            .field("read_only", &self.read_only)
            .field("state", &self.state)
            .finish()
    }
}

impl Drop for UnitOfWork {
    #[mutants::skip] // Only logs; the driver discards the open transaction
    fn drop(&mut self) {
        if self.state == UnitOfWorkState::Open {
            warn!(uow = %self.id, "Unit of work dropped without commit or rollback");
        }
    }
}
