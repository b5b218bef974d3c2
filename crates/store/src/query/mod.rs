//! Composable query pipeline
//!
//! A repository call receives an ordered list of [`QueryProcessor`]s, folds
//! them into a [`QueryContext`] and compiles the context into a
//! [`Fragment`]. Everything here is side-effect free; execution lives in the
//! repository.

pub mod context;
pub mod filter;
pub mod fragment;
pub mod processor;

pub use context::{QueryContext, Scope};
pub use filter::{Connective, OperatorFilter};
pub use fragment::{Arg, Fragment, SubQuery};
pub use processor::{
    filter, filter_with_operator, group_by, having, join, join_with, order_by, paginate,
    paginate_without_model, preload_associations, preload_with_custom_condition, raw_query,
    select, table, with_deleted, Preload, QueryProcessor, TotalCount,
};
