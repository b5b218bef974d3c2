//! Talent repository
//!
//! Each public method is one service operation: it opens a unit of work,
//! drives the generic store repository, then commits or rolls back. Writes
//! delegate to the `_tx` functions in [`super::transactions`].

use talentbase_common::Result;
use talentbase_store::{
    fields, filter, filter_with_operator, group_by, having, join, order_by, paginate,
    paginate_without_model, preload_associations, select, table, Arg, Database, QueryProcessor,
    ReconcileOutcome, Repository, TotalCount, Value,
};
use tracing::{info, warn};
use uuid::Uuid;

use super::transactions::{create_talent_tx, delete_talent_tx, update_talent_tx};
use crate::domain::entities::{
    CityHeadcount, Experience, Talent, TalentChanges, TalentStatus, Technology,
};

const DEFAULT_ORDER: &str = "talents.created_at DESC, talents.id";

/// Optional search fields; every present field narrows the result
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TalentSearch {
    /// Case-insensitive match on first or last name
    pub name: Option<String>,
    pub city: Option<String>,
    pub min_experience: Option<i32>,
    pub status: Option<TalentStatus>,
    /// Whether the talent has a phone number on record
    pub has_phone: Option<bool>,
    /// Exact technology name
    pub technology: Option<String>,
}

impl TalentSearch {
    /// Processors narrowing a talents query of `tenant_id` to this search
    pub fn processors(&self, tenant_id: Uuid) -> Result<Vec<QueryProcessor>> {
        let mut processors = Vec::new();

        if let Some(name) = self.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            let pattern = format!("%{name}%");
            processors.push(filter_with_operator(
                ["talents.first_name", "talents.last_name"],
                ["ILIKE ?", "ILIKE ?"],
                ["OR", "OR"],
                vec![Arg::from(pattern.clone()), Arg::from(pattern)],
            ));
        }

        let mut columns = Vec::new();
        let mut conditions = Vec::new();
        let mut values: Vec<Option<Arg>> = Vec::new();
        if let Some(city) = &self.city {
            columns.push("talents.city");
            conditions.push("= ?");
            values.push(Some(city.into()));
        }
        if let Some(years) = self.min_experience {
            columns.push("talents.experience_years");
            conditions.push(">= ?");
            values.push(Some(years.into()));
        }
        if let Some(status) = self.status {
            columns.push("talents.status");
            conditions.push("= ?");
            values.push(Some(Value::from(status).into()));
        }
        if let Some(has_phone) = self.has_phone {
            columns.push("talents.phone");
            conditions.push(if has_phone { "IS NOT NULL" } else { "IS NULL" });
            values.push(None);
        }
        let operators = vec!["AND"; columns.len()];
        processors.push(filter_with_operator(columns, conditions, operators, values));

        if let Some(technology) = &self.technology {
            let linked = Repository::<Technology>::new().sub_query_for_tenant(
                tenant_id,
                &[
                    table("technologies tech"),
                    join("JOIN talent_technologies tt ON tt.technology_id = tech.id"),
                    select(["tt.talent_id"]),
                    filter("tech.name = ?", [technology]),
                ],
            )?;
            processors.push(filter("talents.id IN ?", [linked]));
        }

        Ok(processors)
    }
}

/// One page of a talent listing
#[derive(Debug, Clone, PartialEq)]
pub struct TalentPage {
    pub talents: Vec<Talent>,
    /// Matching talents across all pages
    pub total: i64,
}

/// Result of a talent update
#[derive(Debug, Clone, PartialEq)]
pub struct TalentUpdate {
    /// The talent as stored after the update, every relation loaded
    pub talent: Talent,
    pub academics: ReconcileOutcome,
    pub experiences: ReconcileOutcome,
}

#[derive(Clone, Debug)]
pub struct TalentRepository {
    db: Database,
    talents: Repository<Talent>,
}

impl TalentRepository {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            talents: Repository::new(),
        }
    }

    /// Create a talent with its academics and experiences, and link technologies
    pub async fn create(
        &self,
        tenant_id: Uuid,
        actor: Uuid,
        mut talent: Talent,
        technology_ids: Vec<Uuid>,
    ) -> Result<Talent> {
        let created = self
            .db
            .transaction(move |uow| {
                Box::pin(async move {
                    create_talent_tx(uow, tenant_id, actor, &mut talent, &technology_ids).await?;
                    Ok(talent)
                })
            })
            .await?;

        info!(talent_id = ?created.id, tenant_id = %tenant_id, "Talent created");
        Ok(created)
    }

    /// Find a talent with every relation loaded
    pub async fn find(&self, tenant_id: Uuid, talent_id: Uuid) -> Result<Talent> {
        let mut uow = self.db.begin(true).await?;
        let result = self
            .talents
            .get_for_tenant(
                &mut uow,
                tenant_id,
                talent_id,
                &preload_associations(["academics", "experiences", "technologies"]),
            )
            .await;
        uow.rollback().await?;
        result
    }

    /// Find a live talent by email
    pub async fn find_by_email(&self, tenant_id: Uuid, email: &str) -> Result<Talent> {
        let mut uow = self.db.begin(true).await?;
        let result = self
            .talents
            .get_record_for_tenant(&mut uow, tenant_id, &[filter("talents.email = ?", [email])])
            .await;
        uow.rollback().await?;
        result
    }

    /// One page of talents matching `search`, newest first
    pub async fn list(
        &self,
        tenant_id: Uuid,
        search: &TalentSearch,
        limit: i64,
        offset: i64,
    ) -> Result<TalentPage> {
        let total = TotalCount::new();
        let mut processors = search.processors(tenant_id)?;
        processors.push(paginate(limit, offset, &total));
        processors.extend(preload_associations(["technologies"]));

        let mut uow = self.db.begin(true).await?;
        let result = self
            .talents
            .get_all_in_order_for_tenant(&mut uow, tenant_id, DEFAULT_ORDER, &processors)
            .await;
        uow.rollback().await?;

        Ok(TalentPage {
            talents: result?,
            total: total.get(),
        })
    }

    /// Whether a live talent of the tenant already uses `email`
    pub async fn email_exists(&self, tenant_id: Uuid, email: &str) -> Result<bool> {
        let mut uow = self.db.begin(true).await?;
        let result = self
            .talents
            .does_record_exist_for_tenant(
                &mut uow,
                tenant_id,
                &[filter("lower(talents.email) = lower(?)", [email])],
            )
            .await;
        uow.rollback().await?;
        result
    }

    /// Apply `changes` to a talent; fields left out of `changes` keep their stored values
    pub async fn update(
        &self,
        tenant_id: Uuid,
        actor: Uuid,
        talent_id: Uuid,
        mut changes: TalentChanges,
    ) -> Result<TalentUpdate> {
        let mut uow = self.db.begin(false).await?;
        match update_talent_tx(&mut uow, tenant_id, actor, talent_id, &mut changes).await {
            Ok(outcome) => {
                uow.commit().await?;
                info!(talent_id = %talent_id, tenant_id = %tenant_id, "Talent updated");
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rollback_err) = uow.rollback().await {
                    warn!(error = %rollback_err, "Rollback after failed talent update failed");
                }
                Err(e)
            }
        }
    }

    /// Soft-delete a talent and its children
    pub async fn delete(&self, tenant_id: Uuid, actor: Uuid, talent_id: Uuid) -> Result<()> {
        self.db
            .transaction(move |uow| {
                Box::pin(async move { delete_talent_tx(uow, tenant_id, actor, talent_id).await })
            })
            .await?;

        info!(talent_id = %talent_id, tenant_id = %tenant_id, "Talent deleted");
        Ok(())
    }

    /// Move every listed talent of the tenant to `status`; returns talents changed
    pub async fn set_status(
        &self,
        tenant_id: Uuid,
        actor: Uuid,
        talent_ids: Vec<Uuid>,
        status: TalentStatus,
    ) -> Result<u64> {
        let talents = self.talents;
        self.db
            .transaction(move |uow| {
                Box::pin(async move {
                    talents
                        .update_with_map_for_tenant(
                            uow,
                            tenant_id,
                            fields([
                                ("status", Value::from(status)),
                                ("updated_by", Value::from(actor)),
                            ]),
                            &[filter("talents.id = ANY(?)", [talent_ids])],
                        )
                        .await
                })
            })
            .await
    }

    /// Headcount per city, optionally limited to talents who worked at `company`.
    ///
    /// Cities with fewer than `min_headcount` talents are left out.
    pub async fn city_report(
        &self,
        tenant_id: Uuid,
        company: Option<&str>,
        min_headcount: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<CityHeadcount>, i64)> {
        let total = TotalCount::new();
        let mut processors = vec![
            select([
                "talents.city AS city",
                "COUNT(*) AS headcount",
                "AVG(talents.experience_years)::float8 AS avg_experience",
            ]),
            filter("talents.city IS NOT NULL", Vec::<Value>::new()),
        ];
        if let Some(company) = company {
            let worked_there = Repository::<Experience>::new().sub_query_for_tenant(
                tenant_id,
                &[
                    select(["experiences.talent_id"]),
                    filter("experiences.company = ?", [company]),
                ],
            )?;
            processors.push(filter("talents.id IN ?", [worked_there]));
        }
        processors.extend([
            group_by("talents.city"),
            having("COUNT(*) >= ?", [min_headcount]),
            order_by("headcount DESC, city"),
            paginate_without_model(limit, offset, &total),
        ]);

        let mut uow = self.db.begin(true).await?;
        let result = self
            .talents
            .scan_for_tenant::<CityHeadcount>(&mut uow, tenant_id, &processors)
            .await;
        uow.rollback().await?;

        Ok((result?, total.get()))
    }
}
