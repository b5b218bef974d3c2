//! Eager loading of related collections
//!
//! Entities call these from [`Entity::load_association`]; each related
//! collection is fetched with one statement for all parents, filtered by the
//! preload's own processors, then grouped back onto the parents.

use std::collections::{BTreeSet, HashMap};

use talentbase_common::Result;
use uuid::Uuid;

use crate::entity::{Entity, LinkTable};
use crate::query::{Fragment, Preload, QueryContext, Scope};
use crate::uow::UnitOfWork;

fn parent_keys<P: Entity>(parents: &[P]) -> (Vec<Uuid>, Vec<Uuid>) {
    let ids: BTreeSet<Uuid> = parents.iter().filter_map(|p| p.id()).collect();
    let tenants: BTreeSet<Uuid> = parents.iter().map(|p| p.audit().tenant_id).collect();
    (ids.into_iter().collect(), tenants.into_iter().collect())
}

async fn fetch_related<C: Entity>(
    uow: &mut UnitOfWork,
    tenants: Vec<Uuid>,
    key_column: &str,
    keys: Vec<Uuid>,
    preload: &Preload,
) -> Result<Vec<C>> {
    let mut ctx = QueryContext::build(C::TABLE, Scope::all_tenants(), &preload.processors)?;
    let table_ref = ctx.table_ref().to_string();
    ctx.push_predicate(Fragment::new(
        format!("{table_ref}.tenant_id = ANY(?)"),
        vec![tenants.into()],
    ));
    ctx.push_predicate(Fragment::new(
        format!("{table_ref}.{key_column} = ANY(?)"),
        vec![keys.into()],
    ));

    let mut rows: Vec<C> = uow.fetch_all(&ctx.select_statement()?).await?;
    for nested in ctx.preloads() {
        if !rows.is_empty() {
            C::load_association(uow, &mut rows, nested).await?;
        }
    }
    Ok(rows)
}

/// Children of a one-to-many relation whose `foreign_key` points at one of `parents`
pub async fn load_has_many<P: Entity, C: Entity>(
    uow: &mut UnitOfWork,
    parents: &[P],
    foreign_key: &str,
    preload: &Preload,
) -> Result<Vec<C>> {
    let (ids, tenants) = parent_keys(parents);
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    fetch_related(uow, tenants, foreign_key, ids, preload).await
}

/// Targets of a many-to-many relation, keyed by owning parent id.
///
/// Each parent's targets keep the order the preload's processors produced.
pub async fn load_many_to_many<P: Entity, C: Entity + Clone>(
    uow: &mut UnitOfWork,
    parents: &[P],
    link: &LinkTable,
    preload: &Preload,
) -> Result<HashMap<Uuid, Vec<C>>> {
    let (ids, tenants) = parent_keys(parents);
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let links_statement = Fragment::new(
        format!(
            "SELECT {owner}, {target} FROM {table} WHERE {owner} = ANY(?)",
            owner = link.owner_column,
            target = link.target_column,
            table = link.table
        ),
        vec![ids.into()],
    );
    let links: Vec<(Uuid, Uuid)> = uow.fetch_all(&links_statement).await?;
    if links.is_empty() {
        return Ok(HashMap::new());
    }

    let mut owners_by_target: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for (owner, target) in &links {
        owners_by_target.entry(*target).or_default().push(*owner);
    }
    let targets: Vec<Uuid> = owners_by_target.keys().copied().collect();

    let related: Vec<C> = fetch_related(uow, tenants, "id", targets, preload).await?;

    let mut grouped: HashMap<Uuid, Vec<C>> = HashMap::new();
    for target in related {
        let Some(target_id) = target.id() else {
            continue;
        };
        if let Some(owners) = owners_by_target.get(&target_id) {
            for owner in owners {
                grouped.entry(*owner).or_default().push(target.clone());
            }
        }
    }
    Ok(grouped)
}

/// Group children by the parent key `key` reads from each child
pub fn group_by_parent<C>(children: Vec<C>, key: impl Fn(&C) -> Option<Uuid>) -> HashMap<Uuid, Vec<C>> {
    let mut grouped: HashMap<Uuid, Vec<C>> = HashMap::new();
    for child in children {
        if let Some(parent) = key(&child) {
            grouped.entry(parent).or_default().push(child);
        }
    }
    grouped
}
