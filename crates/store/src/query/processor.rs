//! Query processors: ordered instructions that mutate a query context

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use talentbase_common::Result;

use super::context::{QueryContext, Window};
use super::filter::OperatorFilter;
use super::fragment::{Arg, Fragment};

/// Shared sink written by a paginated fetch with the unwindowed row count
#[derive(Debug, Clone, Default)]
pub struct TotalCount(Arc<AtomicI64>);

impl TotalCount {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn set(&self, total: i64) {
        self.0.store(total, Ordering::SeqCst);
    }
}

/// Eager-load instruction for one named relation
#[derive(Debug, Clone)]
pub struct Preload {
    pub relation: String,
    /// Applied to the related collection only, never to the parent query
    pub processors: Vec<QueryProcessor>,
}

/// One step of the query-building pipeline.
///
/// Processors are applied strictly in the order given. A `Join` must come
/// before any `Filter` that references its alias.
#[derive(Debug, Clone)]
pub enum QueryProcessor {
    Filter(Fragment),
    FilterWithOperator(OperatorFilter),
    Join(Fragment),
    Select(Vec<String>),
    Table(String),
    GroupBy(String),
    OrderBy(String),
    Having(Fragment),
    Paginate {
        limit: i64,
        offset: i64,
        total: TotalCount,
    },
    PaginateWithoutModel {
        limit: i64,
        offset: i64,
        total: TotalCount,
    },
    Preload(Preload),
    Raw(Fragment),
    WithDeleted,
}

impl QueryProcessor {
    pub fn apply(&self, ctx: &mut QueryContext) -> Result<()> {
        match self {
            QueryProcessor::Filter(predicate) => {
                if !predicate.is_empty() {
                    ctx.predicates.push(predicate.clone());
                }
            }
            QueryProcessor::FilterWithOperator(filter) => {
                if let Some(predicate) = filter.build()? {
                    ctx.predicates.push(predicate);
                }
            }
            QueryProcessor::Join(clause) => ctx.joins.push(clause.clone()),
            QueryProcessor::Select(columns) => ctx.columns = columns.clone(),
            QueryProcessor::Table(name) => ctx.table = name.clone(),
            QueryProcessor::GroupBy(clause) => ctx.group_by.push(clause.clone()),
            QueryProcessor::OrderBy(clause) => ctx.order_by.push(clause.clone()),
            QueryProcessor::Having(clause) => ctx.having.push(clause.clone()),
            QueryProcessor::Paginate {
                limit,
                offset,
                total,
            } => {
                ctx.window = Some(Window {
                    limit: *limit,
                    offset: *offset,
                    total: Some(total.clone()),
                    model_bound: true,
                });
            }
            QueryProcessor::PaginateWithoutModel {
                limit,
                offset,
                total,
            } => {
                ctx.window = Some(Window {
                    limit: *limit,
                    offset: *offset,
                    total: Some(total.clone()),
                    model_bound: false,
                });
            }
            QueryProcessor::Preload(preload) => ctx.preloads.push(preload.clone()),
            QueryProcessor::Raw(statement) => ctx.raw = Some(statement.clone()),
            QueryProcessor::WithDeleted => ctx.with_deleted = true,
        }
        Ok(())
    }
}

/// Predicate ANDed with every other filter
pub fn filter<I>(template: impl Into<String>, values: I) -> QueryProcessor
where
    I: IntoIterator,
    I::Item: Into<Arg>,
{
    QueryProcessor::Filter(Fragment::new(
        template,
        values.into_iter().map(Into::into).collect(),
    ))
}

/// One compound predicate from parallel column/condition/operator/value sequences.
///
/// A `None` value pairs with a condition that binds nothing.
pub fn filter_with_operator<S, V>(
    columns: impl IntoIterator<Item = S>,
    conditions: impl IntoIterator<Item = S>,
    operators: impl IntoIterator<Item = S>,
    values: impl IntoIterator<Item = V>,
) -> QueryProcessor
where
    S: Into<String>,
    V: Into<Option<Arg>>,
{
    QueryProcessor::FilterWithOperator(OperatorFilter {
        columns: columns.into_iter().map(Into::into).collect(),
        conditions: conditions.into_iter().map(Into::into).collect(),
        operators: operators.into_iter().map(Into::into).collect(),
        values: values.into_iter().map(Into::into).collect(),
    })
}

pub fn join(clause: impl Into<String>) -> QueryProcessor {
    QueryProcessor::Join(Fragment::text(clause))
}

/// Join clause with bound values of its own
pub fn join_with<I>(clause: impl Into<String>, values: I) -> QueryProcessor
where
    I: IntoIterator,
    I::Item: Into<Arg>,
{
    QueryProcessor::Join(Fragment::new(
        clause,
        values.into_iter().map(Into::into).collect(),
    ))
}

pub fn select<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> QueryProcessor {
    QueryProcessor::Select(columns.into_iter().map(Into::into).collect())
}

pub fn table(name: impl Into<String>) -> QueryProcessor {
    QueryProcessor::Table(name.into())
}

pub fn group_by(clause: impl Into<String>) -> QueryProcessor {
    QueryProcessor::GroupBy(clause.into())
}

pub fn order_by(clause: impl Into<String>) -> QueryProcessor {
    QueryProcessor::OrderBy(clause.into())
}

pub fn having<I>(template: impl Into<String>, values: I) -> QueryProcessor
where
    I: IntoIterator,
    I::Item: Into<Arg>,
{
    QueryProcessor::Having(Fragment::new(
        template,
        values.into_iter().map(Into::into).collect(),
    ))
}

/// Bounded window plus a count of every matching row written to `total`.
///
/// `limit <= 0` means no limit.
pub fn paginate(limit: i64, offset: i64, total: &TotalCount) -> QueryProcessor {
    QueryProcessor::Paginate {
        limit,
        offset,
        total: total.clone(),
    }
}

/// Like [`paginate`], but also applies to raw statements and custom projections
pub fn paginate_without_model(limit: i64, offset: i64, total: &TotalCount) -> QueryProcessor {
    QueryProcessor::PaginateWithoutModel {
        limit,
        offset,
        total: total.clone(),
    }
}

pub fn preload_associations<S: Into<String>>(
    relations: impl IntoIterator<Item = S>,
) -> Vec<QueryProcessor> {
    relations
        .into_iter()
        .map(|relation| {
            QueryProcessor::Preload(Preload {
                relation: relation.into(),
                processors: Vec::new(),
            })
        })
        .collect()
}

pub fn preload_with_custom_condition(
    relation: impl Into<String>,
    processors: Vec<QueryProcessor>,
) -> QueryProcessor {
    QueryProcessor::Preload(Preload {
        relation: relation.into(),
        processors,
    })
}

/// Replace the composed statement; `?` takes values or sub-queries positionally
pub fn raw_query<I>(template: impl Into<String>, args: I) -> QueryProcessor
where
    I: IntoIterator,
    I::Item: Into<Arg>,
{
    QueryProcessor::Raw(Fragment::new(
        template,
        args.into_iter().map(Into::into).collect(),
    ))
}

/// Bypass the soft-delete predicate
pub fn with_deleted() -> QueryProcessor {
    QueryProcessor::WithDeleted
}
