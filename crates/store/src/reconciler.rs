//! Association reconciliation for one-to-many child collections
//!
//! Given the children persisted for a parent and the children a caller
//! submitted, every child is classified by key:
//!
//! - submitted without a key, or with a key never persisted: insert
//! - key in both sets: update (creator carried over from storage)
//! - key only in the persisted set: soft delete
//!
//! An empty submission therefore deletes every persisted child. Callers that
//! want to leave a collection alone must not call the reconciler.

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use talentbase_common::Result;
use tracing::debug;
use uuid::Uuid;

use crate::entity::{Audit, Entity};
use crate::query::filter;
use crate::repository::{fields, Repository};
use crate::uow::UnitOfWork;
use crate::value::Value;

/// A row owned by a parent through a foreign key
pub trait Child: Entity {
    /// Point this child at its parent
    fn attach_to(&mut self, parent_id: Uuid);
}

/// The parent whose collection is reconciled, and who is changing it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentRef {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub actor: Uuid,
}

/// Classification of a submission against the persisted collection
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Indexes into the submitted collection
    pub inserts: Vec<usize>,
    /// `(submitted index, previous index)` pairs
    pub updates: Vec<(usize, usize)>,
    /// Keys of persisted children absent from the submission
    pub deletes: Vec<Uuid>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: u64,
}

fn usable_key(key: Option<Uuid>) -> Option<Uuid> {
    key.filter(|id| !id.is_nil())
}

/// Plan from raw keys. A nil key counts as absent.
///
/// Repeated submitted keys are planned once, at their first occurrence.
pub fn plan_keys(previous: &[Option<Uuid>], submitted: &[Option<Uuid>]) -> ReconcilePlan {
    let previous_index: HashMap<Uuid, usize> = previous
        .iter()
        .enumerate()
        .filter_map(|(i, key)| usable_key(*key).map(|id| (id, i)))
        .collect();
    let previous_ids: BTreeSet<Uuid> = previous_index.keys().copied().collect();

    let mut plan = ReconcilePlan::default();
    let mut submitted_ids: BTreeSet<Uuid> = BTreeSet::new();

    for (i, key) in submitted.iter().enumerate() {
        let Some(id) = usable_key(*key) else {
            plan.inserts.push(i);
            continue;
        };
        if !submitted_ids.insert(id) {
            continue;
        }
        match previous_index.get(&id) {
            Some(&p) => plan.updates.push((i, p)),
            None => plan.inserts.push(i),
        }
    }

    plan.deletes = previous_ids.difference(&submitted_ids).copied().collect();
    plan
}

pub fn plan<C: Entity>(previous: &[C], submitted: &[C]) -> ReconcilePlan {
    let previous_keys: Vec<Option<Uuid>> = previous.iter().map(|c| c.id()).collect();
    let submitted_keys: Vec<Option<Uuid>> = submitted.iter().map(|c| c.id()).collect();
    plan_keys(&previous_keys, &submitted_keys)
}

/// Bring the persisted children of `parent` in line with `submitted`.
///
/// Inserted children get their keys written back into `submitted`, so
/// reconciling the same slice again updates instead of duplicating.
pub async fn reconcile<C: Child>(
    uow: &mut UnitOfWork,
    parent: ParentRef,
    previous: &[C],
    submitted: &mut [C],
) -> Result<ReconcileOutcome> {
    let plan = plan(previous, submitted);
    let repo = Repository::<C>::new();
    let mut outcome = ReconcileOutcome::default();

    for &i in &plan.inserts {
        let child = &mut submitted[i];
        child.attach_to(parent.id);
        *child.audit_mut() = Audit::new(parent.tenant_id, parent.actor);
        repo.add(uow, child).await?;
        outcome.inserted += 1;
    }

    for &(i, p) in &plan.updates {
        let stored = previous[p].audit();
        let child = &mut submitted[i];
        child.attach_to(parent.id);
        let audit = child.audit_mut();
        audit.tenant_id = parent.tenant_id;
        audit.created_by = stored.created_by;
        audit.created_at = stored.created_at;
        audit.updated_by = Some(parent.actor);
        audit.deleted_by = None;
        audit.deleted_at = None;
        repo.save(uow, child).await?;
        outcome.updated += 1;
    }

    if !plan.deletes.is_empty() {
        let deletion = fields([
            ("deleted_by", Value::from(parent.actor)),
            ("deleted_at", Value::from(Utc::now())),
            ("updated_by", Value::from(parent.actor)),
        ]);
        outcome.deleted = repo
            .update_with_map_for_tenant(
                uow,
                parent.tenant_id,
                deletion,
                &[filter(
                    format!("{}.id = ANY(?)", C::TABLE),
                    [plan.deletes.clone()],
                )],
            )
            .await?;
    }

    debug!(
        table = C::TABLE,
        parent = %parent.id,
        inserted = outcome.inserted,
        updated = outcome.updated,
        deleted = outcome.deleted,
        "Children reconciled"
    );
    Ok(outcome)
}
