//! Query context: the accumulator built by the processor pipeline, and the
//! statement compiler that turns it into SQL

use talentbase_common::{Error, Result};
use uuid::Uuid;

use super::filter::is_column_reference;
use super::fragment::Fragment;
use super::processor::{Preload, QueryProcessor, TotalCount};
use crate::value::Value;

/// Implicit predicates every entity query carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope {
    pub tenant: Option<Uuid>,
    pub soft_delete: bool,
}

impl Scope {
    /// Restricted to one tenant, soft-deleted rows hidden
    pub fn tenant(tenant_id: Uuid) -> Self {
        Self {
            tenant: Some(tenant_id),
            soft_delete: true,
        }
    }

    /// Any tenant, soft-deleted rows hidden
    pub fn all_tenants() -> Self {
        Self {
            tenant: None,
            soft_delete: true,
        }
    }

    /// No implicit predicates at all
    pub fn unscoped() -> Self {
        Self {
            tenant: None,
            soft_delete: false,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Window {
    pub limit: i64,
    pub offset: i64,
    pub total: Option<TotalCount>,
    pub model_bound: bool,
}

/// Mutable description of one statement. Created per repository call.
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub(crate) table: String,
    pub(crate) columns: Vec<String>,
    pub(crate) joins: Vec<Fragment>,
    pub(crate) predicates: Vec<Fragment>,
    pub(crate) group_by: Vec<String>,
    pub(crate) having: Vec<Fragment>,
    pub(crate) order_by: Vec<String>,
    pub(crate) window: Option<Window>,
    pub(crate) preloads: Vec<Preload>,
    pub(crate) raw: Option<Fragment>,
    pub(crate) with_deleted: bool,
    pub(crate) scope: Scope,
}

impl QueryContext {
    pub fn new(table: impl Into<String>, scope: Scope) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            joins: Vec::new(),
            predicates: Vec::new(),
            group_by: Vec::new(),
            having: Vec::new(),
            order_by: Vec::new(),
            window: None,
            preloads: Vec::new(),
            raw: None,
            with_deleted: false,
            scope,
        }
    }

    /// Build a context by applying `processors` left to right
    pub fn build(
        table: impl Into<String>,
        scope: Scope,
        processors: &[QueryProcessor],
    ) -> Result<Self> {
        let mut ctx = Self::new(table, scope);
        ctx.apply_all(processors)?;
        Ok(ctx)
    }

    pub fn apply_all(&mut self, processors: &[QueryProcessor]) -> Result<()> {
        for processor in processors {
            processor.apply(self)?;
        }
        Ok(())
    }

    pub fn preloads(&self) -> &[Preload] {
        &self.preloads
    }

    pub fn is_raw(&self) -> bool {
        self.raw.is_some()
    }

    pub(crate) fn total_sink(&self) -> Option<&TotalCount> {
        self.window.as_ref().and_then(|w| w.total.as_ref())
    }

    pub(crate) fn push_predicate(&mut self, predicate: Fragment) {
        self.predicates.push(predicate);
    }

    /// Fetch at most one row, keeping any offset the caller asked for
    pub(crate) fn limit_to_one(&mut self) {
        let offset = self.window.as_ref().map_or(0, |w| w.offset);
        self.window = Some(Window {
            limit: 1,
            offset,
            total: None,
            model_bound: false,
        });
    }

    pub(crate) fn has_conditions(&self) -> bool {
        self.scope.tenant.is_some() || !self.predicates.is_empty()
    }

    /// Name used to qualify columns of the base table: its alias if one is given
    pub fn table_ref(&self) -> &str {
        self.table
            .split_whitespace()
            .last()
            .unwrap_or(self.table.as_str())
    }

    fn where_clause(&self) -> Fragment {
        let table_ref = self.table_ref();
        let mut clauses: Vec<Fragment> = Vec::new();

        if let Some(tenant) = self.scope.tenant {
            clauses.push(Fragment::new(
                format!("{table_ref}.tenant_id = ?"),
                vec![tenant.into()],
            ));
        }
        if self.scope.soft_delete && !self.with_deleted {
            clauses.push(Fragment::text(format!("{table_ref}.deleted_at IS NULL")));
        }
        for predicate in &self.predicates {
            let mut wrapped = Fragment::text("(");
            wrapped.push(predicate).push_sql(")");
            clauses.push(wrapped);
        }

        let mut fragment = Fragment::default();
        for (i, clause) in clauses.iter().enumerate() {
            fragment.push_sql(if i == 0 { " WHERE " } else { " AND " });
            fragment.push(clause);
        }
        fragment
    }

    fn projection(&self) -> String {
        if self.columns.is_empty() {
            format!("{}.*", self.table_ref())
        } else {
            self.columns.join(", ")
        }
    }

    /// SELECT without ORDER BY / LIMIT / OFFSET
    fn unwindowed_select(&self, projection: &str) -> Fragment {
        let mut fragment = Fragment::text(format!("SELECT {projection} FROM {}", self.table));
        for join in &self.joins {
            fragment.push_sql(" ").push(join);
        }
        fragment.push(&self.where_clause());
        if !self.group_by.is_empty() {
            fragment
                .push_sql(" GROUP BY ")
                .push_sql(&self.group_by.join(", "));
        }
        for (i, having) in self.having.iter().enumerate() {
            fragment.push_sql(if i == 0 { " HAVING (" } else { " AND (" });
            fragment.push(having).push_sql(")");
        }
        fragment
    }

    fn push_window(&self, fragment: &mut Fragment) {
        if let Some(window) = &self.window {
            if window.limit > 0 {
                fragment.push_sql(" LIMIT ").push_bind(window.limit);
            }
            if window.offset > 0 {
                fragment.push_sql(" OFFSET ").push_bind(window.offset);
            }
        }
    }

    /// The full statement for a fetch: composed select, or the raw statement
    pub fn select_statement(&self) -> Result<Fragment> {
        if let Some(raw) = &self.raw {
            let mut fragment = raw.clone();
            if let Some(window) = &self.window {
                if window.model_bound {
                    return Err(Error::Misuse(
                        "Paginate cannot window a raw statement; use PaginateWithoutModel"
                            .to_string(),
                    ));
                }
                self.push_window(&mut fragment);
            }
            return Ok(fragment);
        }

        let mut fragment = self.unwindowed_select(&self.projection());
        if !self.order_by.is_empty() {
            fragment
                .push_sql(" ORDER BY ")
                .push_sql(&self.order_by.join(", "));
        }
        self.push_window(&mut fragment);
        Ok(fragment)
    }

    /// Count of every row the select would return, ignoring any window
    pub fn count_statement(&self) -> Result<Fragment> {
        let inner = match &self.raw {
            Some(raw) => {
                if matches!(&self.window, Some(w) if w.model_bound) {
                    return Err(Error::Misuse(
                        "Paginate cannot count a raw statement; use PaginateWithoutModel"
                            .to_string(),
                    ));
                }
                raw.clone()
            }
            None => self.unwindowed_select(&self.projection()),
        };
        let mut fragment = Fragment::text("SELECT COUNT(*) FROM (");
        fragment.push(&inner).push_sql(") AS counted");
        Ok(fragment)
    }

    /// `SELECT EXISTS (...)` over the unwindowed select
    pub fn exists_statement(&self) -> Result<Fragment> {
        let inner = match &self.raw {
            Some(raw) => raw.clone(),
            None => self.unwindowed_select("1"),
        };
        let mut fragment = Fragment::text("SELECT EXISTS (");
        fragment.push(&inner).push_sql(")");
        Ok(fragment)
    }

    /// `UPDATE` of the named columns for every row matching the context
    pub fn update_statement(&self, assignments: &[(String, Value)]) -> Result<Fragment> {
        if self.raw.is_some() {
            return Err(Error::Misuse(
                "A raw statement cannot be combined with an update".to_string(),
            ));
        }
        if !self.joins.is_empty() || !self.group_by.is_empty() || self.window.is_some() {
            return Err(Error::Misuse(
                "Updates accept filters only; joins, grouping and pagination are not allowed"
                    .to_string(),
            ));
        }
        if assignments.is_empty() {
            return Err(Error::Misuse("Update without any field".to_string()));
        }

        let mut fragment = Fragment::text(format!("UPDATE {} SET ", self.table));
        for (i, (column, value)) in assignments.iter().enumerate() {
            if !is_column_reference(column) || column.contains('.') {
                return Err(Error::Misuse(format!("Invalid column name: {column:?}")));
            }
            if i > 0 {
                fragment.push_sql(", ");
            }
            fragment.push_sql(column).push_sql(" = ").push_bind(value.clone());
        }
        fragment.push(&self.where_clause());
        Ok(fragment)
    }
}
