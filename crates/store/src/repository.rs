//! Generic repository over any [`Entity`]
//!
//! Every method takes the unit of work it runs under and an ordered list of
//! query processors. Errors are returned on the first failure; the caller
//! owns the decision to roll back.

use std::collections::{BTreeMap, BTreeSet};
use std::marker::PhantomData;

use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::FromRow;
use talentbase_common::{Error, Result};
use tracing::debug;
use uuid::Uuid;

use crate::entity::Entity;
use crate::query::{Fragment, QueryContext, QueryProcessor, Scope, SubQuery};
use crate::uow::UnitOfWork;
use crate::value::Value;

/// Column name → new value for partial updates
pub type FieldMap = BTreeMap<String, Value>;

/// Build a [`FieldMap`] from `(column, value)` pairs
pub fn fields<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> FieldMap
where
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

pub struct Repository<E> {
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Repository<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for Repository<E> {}

impl<E> Default for Repository<E> {
    fn default() -> Self {
        Self {
            _entity: PhantomData,
        }
    }
}

impl<E> std::fmt::Debug for Repository<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("entity", &std::any::type_name::<E>())
            .finish()
    }
}

impl<E: Entity> Repository<E> {
    pub fn new() -> Self {
        Self::default()
    }

    fn context(scope: Scope, processors: &[QueryProcessor]) -> Result<QueryContext> {
        QueryContext::build(E::TABLE, scope, processors)
    }

    fn by_id(ctx: &mut QueryContext, id: Uuid) {
        let predicate = Fragment::new(format!("{}.id = ?", ctx.table_ref()), vec![id.into()]);
        ctx.push_predicate(predicate);
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert `entity` and any one-to-many children it carries.
    ///
    /// Assigns a fresh key when the entity has none (a nil key counts as
    /// none) and stamps the creation timestamps. Nested children are
    /// inserted, not reconciled.
    pub async fn add(&self, uow: &mut UnitOfWork, entity: &mut E) -> Result<()> {
        let id = match entity.id().filter(|id| !id.is_nil()) {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4();
                entity.set_id(id);
                id
            }
        };

        let now = Utc::now();
        let audit = entity.audit_mut();
        audit.created_at.get_or_insert(now);
        audit.updated_at = Some(now);
        if audit.updated_by.is_none() {
            audit.updated_by = audit.created_by;
        }

        let mut columns: Vec<(&'static str, Value)> = vec![("id", id.into())];
        columns.extend(entity.audit().insert_values());
        columns.extend(entity.values());

        let mut statement = Fragment::text(format!("INSERT INTO {} (", E::TABLE));
        statement.push_sql(
            &columns
                .iter()
                .map(|(column, _)| *column)
                .collect::<Vec<_>>()
                .join(", "),
        );
        statement.push_sql(") VALUES (");
        for (i, (_, value)) in columns.into_iter().enumerate() {
            if i > 0 {
                statement.push_sql(", ");
            }
            statement.push_bind(value);
        }
        statement.push_sql(")");

        uow.execute(&statement).await?;
        debug!(table = E::TABLE, %id, "Row inserted");

        entity.insert_children(uow).await
    }

    /// Overwrite the row by key with every present (non-NULL) field.
    ///
    /// `None` fields are left untouched; required columns are always
    /// written. Use [`Self::update_fields_for_tenant`] when a required
    /// column must be left as stored. Returns not-found when no live row of
    /// the entity's tenant has that key.
    pub async fn update(&self, uow: &mut UnitOfWork, entity: &mut E) -> Result<()> {
        self.write_row(uow, entity, false).await
    }

    /// Overwrite the row by key with every field, writing NULL for `None`
    pub async fn save(&self, uow: &mut UnitOfWork, entity: &mut E) -> Result<()> {
        self.write_row(uow, entity, true).await
    }

    async fn write_row(&self, uow: &mut UnitOfWork, entity: &mut E, full: bool) -> Result<()> {
        let id = entity.id().ok_or_else(|| {
            Error::Misuse(format!("Cannot update {} without a primary key", E::TABLE))
        })?;

        let now = Utc::now();
        entity.audit_mut().updated_at = Some(now);
        let audit = entity.audit().clone();

        let mut assignments: Vec<(String, Value)> = vec![("updated_at".to_string(), now.into())];
        let mut candidates: Vec<(&'static str, Value)> = vec![("updated_by", audit.updated_by.into())];
        if full {
            candidates.push(("created_by", audit.created_by.into()));
            if audit.created_at.is_some() {
                candidates.push(("created_at", audit.created_at.into()));
            }
        }
        candidates.extend(entity.values());
        assignments.extend(
            candidates
                .into_iter()
                .filter(|(_, value)| full || !value.is_null())
                .map(|(column, value)| (column.to_string(), value)),
        );

        let mut ctx = Self::context(Scope::tenant(audit.tenant_id), &[])?;
        Self::by_id(&mut ctx, id);
        let affected = uow.execute(&ctx.update_statement(&assignments)?).await?;
        if affected == 0 {
            return Err(Error::NotFound(format!("{} {} not found", E::TABLE, id)));
        }
        debug!(table = E::TABLE, %id, full, "Row updated");
        Ok(())
    }

    /// Set only the named fields on every live row matching `processors`.
    ///
    /// `updated_at` is refreshed unless the map sets it. Matching zero rows
    /// is not an error. Refuses to run without any condition.
    pub async fn update_with_map(
        &self,
        uow: &mut UnitOfWork,
        fields: FieldMap,
        processors: &[QueryProcessor],
    ) -> Result<u64> {
        self.update_matching(uow, Scope::all_tenants(), fields, processors)
            .await
    }

    pub async fn update_with_map_for_tenant(
        &self,
        uow: &mut UnitOfWork,
        tenant_id: Uuid,
        fields: FieldMap,
        processors: &[QueryProcessor],
    ) -> Result<u64> {
        self.update_matching(uow, Scope::tenant(tenant_id), fields, processors)
            .await
    }

    async fn update_matching(
        &self,
        uow: &mut UnitOfWork,
        scope: Scope,
        mut fields: FieldMap,
        processors: &[QueryProcessor],
    ) -> Result<u64> {
        let ctx = Self::context(scope, processors)?;
        if !ctx.has_conditions() {
            return Err(Error::Misuse(format!(
                "Refusing to update every row of {}",
                E::TABLE
            )));
        }
        fields
            .entry("updated_at".to_string())
            .or_insert_with(|| Utc::now().into());

        let assignments: Vec<(String, Value)> = fields.into_iter().collect();
        let affected = uow.execute(&ctx.update_statement(&assignments)?).await?;
        debug!(table = E::TABLE, affected, "Fields updated");
        Ok(affected)
    }

    /// Set only the named fields on the live row keyed `id`.
    ///
    /// Columns missing from `fields` keep their stored values. Returns
    /// not-found when no live row of `tenant_id` has that key.
    pub async fn update_fields_for_tenant(
        &self,
        uow: &mut UnitOfWork,
        tenant_id: Uuid,
        id: Uuid,
        mut fields: FieldMap,
    ) -> Result<()> {
        fields
            .entry("updated_at".to_string())
            .or_insert_with(|| Utc::now().into());
        let assignments: Vec<(String, Value)> = fields.into_iter().collect();

        let mut ctx = Self::context(Scope::tenant(tenant_id), &[])?;
        Self::by_id(&mut ctx, id);
        let affected = uow.execute(&ctx.update_statement(&assignments)?).await?;
        if affected == 0 {
            return Err(Error::NotFound(format!("{} {} not found", E::TABLE, id)));
        }
        debug!(table = E::TABLE, %id, "Fields updated by key");
        Ok(())
    }

    /// Soft-delete one row of `tenant_id`, crediting `actor`
    pub async fn delete_for_tenant(
        &self,
        uow: &mut UnitOfWork,
        tenant_id: Uuid,
        id: Uuid,
        actor: Uuid,
    ) -> Result<u64> {
        let now = Utc::now();
        let assignments: Vec<(String, Value)> = vec![
            ("deleted_by".to_string(), actor.into()),
            ("deleted_at".to_string(), now.into()),
            ("updated_by".to_string(), actor.into()),
            ("updated_at".to_string(), now.into()),
        ];
        let mut ctx = Self::context(Scope::tenant(tenant_id), &[])?;
        Self::by_id(&mut ctx, id);
        uow.execute(&ctx.update_statement(&assignments)?).await
    }

    /// Replace every link of a many-to-many relation for `entity`.
    ///
    /// Delete-then-insert; duplicate targets collapse, so repeating the call
    /// with the same set leaves the link table unchanged. Every target must
    /// be a live row of the owner's tenant, otherwise not-found is returned
    /// and the caller should roll back.
    pub async fn replace_associations(
        &self,
        uow: &mut UnitOfWork,
        entity: &E,
        relation: &str,
        targets: &[Uuid],
    ) -> Result<()> {
        let link = E::link_table(relation).ok_or_else(|| {
            Error::Misuse(format!(
                "{} has no many-to-many relation named {relation:?}",
                E::TABLE
            ))
        })?;
        let owner = entity.id().ok_or_else(|| {
            Error::Misuse(format!(
                "Cannot link {} without a primary key",
                E::TABLE
            ))
        })?;
        let tenant_id = entity.audit().tenant_id;

        let delete = Fragment::new(
            format!("DELETE FROM {} WHERE {} = ?", link.table, link.owner_column),
            vec![owner.into()],
        );
        uow.execute(&delete).await?;

        let unique: Vec<Uuid> = targets
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if !unique.is_empty() {
            let insert = Fragment::new(
                format!(
                    "INSERT INTO {link_table} ({owner}, {target}) \
                     SELECT ?, t.id FROM {targets} t \
                     WHERE t.id = ANY(?) AND t.tenant_id = ? AND t.deleted_at IS NULL",
                    link_table = link.table,
                    owner = link.owner_column,
                    target = link.target_column,
                    targets = link.target_table,
                ),
                vec![owner.into(), unique.clone().into(), tenant_id.into()],
            );
            let linked = uow.execute(&insert).await?;
            if linked != unique.len() as u64 {
                return Err(Error::NotFound(format!(
                    "{} of {} {} not found for tenant {}",
                    unique.len() as u64 - linked,
                    unique.len(),
                    link.target_table,
                    tenant_id
                )));
            }
        }
        debug!(table = link.table, %owner, links = unique.len(), "Associations replaced");
        Ok(())
    }

    /// Run a raw statement (set with `raw_query`) and return rows affected
    pub async fn execute(&self, uow: &mut UnitOfWork, processors: &[QueryProcessor]) -> Result<u64> {
        let ctx = Self::context(Scope::unscoped(), processors)?;
        let statement = ctx
            .raw
            .clone()
            .ok_or_else(|| Error::Misuse("execute requires a raw statement".to_string()))?;
        uow.execute(&statement).await
    }

    // =========================================================================
    // Reads
    // =========================================================================

    async fn fetch_one(&self, uow: &mut UnitOfWork, mut ctx: QueryContext) -> Result<E> {
        ctx.limit_to_one();
        let row: Option<E> = uow.fetch_optional(&ctx.select_statement()?).await?;
        let row = row.ok_or_else(|| Error::NotFound(format!("{} not found", E::TABLE)))?;
        let mut rows = vec![row];
        for preload in ctx.preloads() {
            E::load_association(uow, &mut rows, preload).await?;
        }
        rows.pop()
            .ok_or_else(|| Error::Internal("Preload dropped the fetched row".to_string()))
    }

    async fn fetch_many<T>(&self, uow: &mut UnitOfWork, ctx: &QueryContext) -> Result<Vec<T>>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let rows: Vec<T> = uow.fetch_all(&ctx.select_statement()?).await?;
        if let Some(total) = ctx.total_sink() {
            let count = uow.fetch_count(&ctx.count_statement()?).await?;
            total.set(count);
        }
        Ok(rows)
    }

    async fn fetch_entities(&self, uow: &mut UnitOfWork, ctx: QueryContext) -> Result<Vec<E>> {
        let mut rows: Vec<E> = self.fetch_many(uow, &ctx).await?;
        for preload in ctx.preloads() {
            if !rows.is_empty() {
                E::load_association(uow, &mut rows, preload).await?;
            }
        }
        Ok(rows)
    }

    /// Fetch the live row of `tenant_id` with key `id`, or not-found
    pub async fn get_for_tenant(
        &self,
        uow: &mut UnitOfWork,
        tenant_id: Uuid,
        id: Uuid,
        processors: &[QueryProcessor],
    ) -> Result<E> {
        let mut ctx = Self::context(Scope::tenant(tenant_id), processors)?;
        Self::by_id(&mut ctx, id);
        self.fetch_one(uow, ctx).await
    }

    /// Fetch the first live row of `tenant_id` matching `processors`, or not-found
    pub async fn get_record_for_tenant(
        &self,
        uow: &mut UnitOfWork,
        tenant_id: Uuid,
        processors: &[QueryProcessor],
    ) -> Result<E> {
        let ctx = Self::context(Scope::tenant(tenant_id), processors)?;
        self.fetch_one(uow, ctx).await
    }

    /// Every live row matching `processors`, across tenants
    pub async fn get_all(
        &self,
        uow: &mut UnitOfWork,
        processors: &[QueryProcessor],
    ) -> Result<Vec<E>> {
        let ctx = Self::context(Scope::all_tenants(), processors)?;
        self.fetch_entities(uow, ctx).await
    }

    pub async fn get_all_for_tenant(
        &self,
        uow: &mut UnitOfWork,
        tenant_id: Uuid,
        processors: &[QueryProcessor],
    ) -> Result<Vec<E>> {
        let ctx = Self::context(Scope::tenant(tenant_id), processors)?;
        self.fetch_entities(uow, ctx).await
    }

    fn ordered_context(scope: Scope, order: &str, processors: &[QueryProcessor]) -> Result<QueryContext> {
        if order.trim().is_empty() {
            return Err(Error::Misuse(
                "Ordered fetch requires an order clause".to_string(),
            ));
        }
        let mut ctx = QueryContext::new(E::TABLE, scope);
        ctx.apply_all(&[QueryProcessor::OrderBy(order.to_string())])?;
        ctx.apply_all(processors)?;
        Ok(ctx)
    }

    /// Like [`get_all`](Self::get_all), ordered by `order` before any other ordering
    pub async fn get_all_in_order(
        &self,
        uow: &mut UnitOfWork,
        order: &str,
        processors: &[QueryProcessor],
    ) -> Result<Vec<E>> {
        let ctx = Self::ordered_context(Scope::all_tenants(), order, processors)?;
        self.fetch_entities(uow, ctx).await
    }

    pub async fn get_all_in_order_for_tenant(
        &self,
        uow: &mut UnitOfWork,
        tenant_id: Uuid,
        order: &str,
        processors: &[QueryProcessor],
    ) -> Result<Vec<E>> {
        let ctx = Self::ordered_context(Scope::tenant(tenant_id), order, processors)?;
        self.fetch_entities(uow, ctx).await
    }

    /// Count live rows matching `processors`; any pagination window is ignored
    pub async fn get_count(
        &self,
        uow: &mut UnitOfWork,
        processors: &[QueryProcessor],
    ) -> Result<i64> {
        let ctx = Self::context(Scope::all_tenants(), processors)?;
        uow.fetch_count(&ctx.count_statement()?).await
    }

    pub async fn get_count_for_tenant(
        &self,
        uow: &mut UnitOfWork,
        tenant_id: Uuid,
        processors: &[QueryProcessor],
    ) -> Result<i64> {
        let ctx = Self::context(Scope::tenant(tenant_id), processors)?;
        uow.fetch_count(&ctx.count_statement()?).await
    }

    /// `Ok(false)` when nothing matches; errors only on execution failure
    pub async fn does_record_exist(
        &self,
        uow: &mut UnitOfWork,
        processors: &[QueryProcessor],
    ) -> Result<bool> {
        let ctx = Self::context(Scope::all_tenants(), processors)?;
        uow.fetch_flag(&ctx.exists_statement()?).await
    }

    pub async fn does_record_exist_for_tenant(
        &self,
        uow: &mut UnitOfWork,
        tenant_id: Uuid,
        processors: &[QueryProcessor],
    ) -> Result<bool> {
        let ctx = Self::context(Scope::tenant(tenant_id), processors)?;
        uow.fetch_flag(&ctx.exists_statement()?).await
    }

    /// Run an aggregate or custom projection into an arbitrary row shape
    pub async fn scan<T>(&self, uow: &mut UnitOfWork, processors: &[QueryProcessor]) -> Result<Vec<T>>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let ctx = Self::context(Scope::all_tenants(), processors)?;
        self.fetch_many(uow, &ctx).await
    }

    pub async fn scan_for_tenant<T>(
        &self,
        uow: &mut UnitOfWork,
        tenant_id: Uuid,
        processors: &[QueryProcessor],
    ) -> Result<Vec<T>>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let ctx = Self::context(Scope::tenant(tenant_id), processors)?;
        self.fetch_many(uow, &ctx).await
    }

    // =========================================================================
    // Composition
    // =========================================================================

    /// Compile `processors` into a fragment for an enclosing `raw_query`,
    /// `filter` or another sub-query
    pub fn sub_query(&self, processors: &[QueryProcessor]) -> Result<SubQuery> {
        Self::compile(Scope::all_tenants(), processors)
    }

    pub fn sub_query_for_tenant(
        &self,
        tenant_id: Uuid,
        processors: &[QueryProcessor],
    ) -> Result<SubQuery> {
        Self::compile(Scope::tenant(tenant_id), processors)
    }

    fn compile(scope: Scope, processors: &[QueryProcessor]) -> Result<SubQuery> {
        let ctx = Self::context(scope, processors)?;
        if ctx.total_sink().is_some() {
            return Err(Error::Misuse(
                "A sub-query cannot carry a pagination count".to_string(),
            ));
        }
        let statement = ctx.select_statement()?;
        // Fail now on placeholder/argument mismatches rather than in the outer query.
        statement.render()?;
        Ok(SubQuery(statement))
    }
}
