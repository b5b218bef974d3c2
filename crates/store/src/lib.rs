//! Tenant-aware data access for Talentbase
//!
//! Services open a [`UnitOfWork`], describe an operation as an ordered list
//! of [`QueryProcessor`]s, call one [`Repository`] method (or the
//! [`reconciler`]) and then commit or roll back:
//!
//! ```ignore
//! let mut uow = db.begin(true).await?;
//! let total = TotalCount::new();
//! let page = Repository::<Talent>::new()
//!     .get_all_in_order_for_tenant(
//!         &mut uow,
//!         tenant_id,
//!         "talents.created_at DESC",
//!         &[filter("city = ?", ["Pune"]), paginate(20, 0, &total)],
//!     )
//!     .await;
//! uow.rollback().await?;
//! ```
//!
//! Every entity read and write is scoped to one tenant and hides
//! soft-deleted rows unless the caller explicitly opts out.

pub mod association;
pub mod db;
pub mod entity;
pub mod query;
pub mod reconciler;
pub mod repository;
pub mod state;
pub mod uow;
pub mod value;

pub use db::{new_unit_of_work, BoxFuture, Database};
pub use entity::{Audit, Entity, LinkTable};
pub use query::{
    filter, filter_with_operator, group_by, having, join, join_with, order_by, paginate,
    paginate_without_model, preload_associations, preload_with_custom_condition, raw_query,
    select, table, with_deleted, Arg, Fragment, Preload, QueryContext, QueryProcessor, Scope,
    SubQuery, TotalCount,
};
pub use reconciler::{reconcile, Child, ParentRef, ReconcileOutcome, ReconcilePlan};
pub use repository::{fields, FieldMap, Repository};
pub use state::{UnitOfWorkState, TransitionError};
pub use uow::UnitOfWork;
pub use value::Value;

pub use talentbase_common::{Error, Result};
