//! Storable entity shapes
//!
//! An entity declares its table, its primary key, the audit block every
//! tenant-scoped row carries, and the values of its remaining columns. The
//! repository derives every statement from this narrow description.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::FromRow;
use talentbase_common::{Error, Result};
use uuid::Uuid;

use crate::query::Preload;
use crate::uow::UnitOfWork;
use crate::value::Value;

/// Tenant and actor bookkeeping shared by every persisted row.
///
/// A non-null `deleted_at` marks the row as logically absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Audit {
    pub tenant_id: Uuid,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
    pub deleted_by: Option<Uuid>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Audit {
    /// Audit block for a row about to be created by `actor` in `tenant_id`
    pub fn new(tenant_id: Uuid, actor: Uuid) -> Self {
        Self {
            tenant_id,
            created_by: Some(actor),
            updated_by: Some(actor),
            ..Self::default()
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub(crate) fn insert_values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("tenant_id", self.tenant_id.into()),
            ("created_by", self.created_by.into()),
            ("updated_by", self.updated_by.into()),
            ("created_at", self.created_at.into()),
            ("updated_at", self.updated_at.into()),
        ]
    }
}

/// Link table of a pure many-to-many relation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTable {
    pub table: &'static str,
    pub owner_column: &'static str,
    pub target_column: &'static str,
    /// Tenant-scoped table the target column references
    pub target_table: &'static str,
}

#[async_trait]
pub trait Entity: for<'r> FromRow<'r, PgRow> + Send + Sync + Unpin + 'static {
    const TABLE: &'static str;

    /// `None` until the row has been assigned a key
    fn id(&self) -> Option<Uuid>;

    fn set_id(&mut self, id: Uuid);

    fn audit(&self) -> &Audit;

    fn audit_mut(&mut self) -> &mut Audit;

    /// Every writable column except the key and the audit block.
    ///
    /// Optional fields report `None` as a typed NULL: `update` skips them,
    /// `save` writes them.
    fn values(&self) -> Vec<(&'static str, Value)>;

    /// Many-to-many relation named `relation`, if any
    fn link_table(_relation: &str) -> Option<LinkTable> {
        None
    }

    /// Insert one-to-many children carried on the struct. Called by `add`
    /// after the parent row exists.
    async fn insert_children(&mut self, _uow: &mut UnitOfWork) -> Result<()> {
        Ok(())
    }

    /// Eagerly load `preload.relation` into every row of `rows`
    async fn load_association(
        _uow: &mut UnitOfWork,
        _rows: &mut [Self],
        preload: &Preload,
    ) -> Result<()> {
        Err(Error::Misuse(format!(
            "{} has no relation named {:?}",
            Self::TABLE,
            preload.relation
        )))
    }
}
