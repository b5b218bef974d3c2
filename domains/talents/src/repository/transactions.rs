//! Transactional free functions for the talents domain
//!
//! Each runs under a caller-owned unit of work and never commits, so several
//! can be composed into one atomic operation.

use chrono::Utc;
use talentbase_common::{Error, Result};
use talentbase_store::{
    fields, filter, preload_associations, reconcile, Audit, FieldMap, ParentRef, ReconcileOutcome,
    Repository, UnitOfWork, Value,
};
use uuid::Uuid;

use super::talents::TalentUpdate;
use crate::domain::entities::{Academic, Experience, Talent, TalentChanges};

/// Insert a talent with its children and link `technology_ids` within an existing unit of work.
pub async fn create_talent_tx(
    uow: &mut UnitOfWork,
    tenant_id: Uuid,
    actor: Uuid,
    talent: &mut Talent,
    technology_ids: &[Uuid],
) -> Result<()> {
    let repo = Repository::<Talent>::new();
    talent.audit = Audit::new(tenant_id, actor);
    repo.add(uow, talent).await?;
    if !technology_ids.is_empty() {
        repo.replace_associations(uow, talent, "technologies", technology_ids)
            .await?;
    }
    Ok(())
}

/// Apply `changes` to a stored talent within an existing unit of work.
///
/// Only supplied fields are written. Supplied child collections are
/// reconciled against the stored ones, so children missing from them are
/// soft-deleted; inserted children get their keys written back. Returns the
/// talent as stored afterwards, or not-found when it does not exist for
/// `tenant_id`.
pub async fn update_talent_tx(
    uow: &mut UnitOfWork,
    tenant_id: Uuid,
    actor: Uuid,
    talent_id: Uuid,
    changes: &mut TalentChanges,
) -> Result<TalentUpdate> {
    let repo = Repository::<Talent>::new();
    let stored = repo
        .get_for_tenant(
            uow,
            tenant_id,
            talent_id,
            &preload_associations(["academics", "experiences"]),
        )
        .await?;

    repo.update_fields_for_tenant(uow, tenant_id, talent_id, changes.fields(actor))
        .await?;

    let parent = ParentRef {
        id: talent_id,
        tenant_id,
        actor,
    };
    let academics = match changes.academics.as_mut() {
        Some(submitted) => {
            reconcile::<Academic>(uow, parent, &stored.academics, submitted).await?
        }
        None => ReconcileOutcome::default(),
    };
    let experiences = match changes.experiences.as_mut() {
        Some(submitted) => {
            reconcile::<Experience>(uow, parent, &stored.experiences, submitted).await?
        }
        None => ReconcileOutcome::default(),
    };

    if let Some(ids) = &changes.technology_ids {
        repo.replace_associations(uow, &stored, "technologies", ids)
            .await?;
    }

    let talent = repo
        .get_for_tenant(
            uow,
            tenant_id,
            talent_id,
            &preload_associations(["academics", "experiences", "technologies"]),
        )
        .await?;

    Ok(TalentUpdate {
        talent,
        academics,
        experiences,
    })
}

fn deletion(actor: Uuid) -> FieldMap {
    fields([
        ("deleted_by", Value::from(actor)),
        ("deleted_at", Value::from(Utc::now())),
        ("updated_by", Value::from(actor)),
    ])
}

/// Soft-delete a talent and its children within an existing unit of work.
///
/// Technology links are kept; the talent no longer appears through them.
pub async fn delete_talent_tx(
    uow: &mut UnitOfWork,
    tenant_id: Uuid,
    actor: Uuid,
    talent_id: Uuid,
) -> Result<()> {
    let deleted = Repository::<Talent>::new()
        .delete_for_tenant(uow, tenant_id, talent_id, actor)
        .await?;
    if deleted == 0 {
        return Err(Error::NotFound(format!("Talent {talent_id} not found")));
    }

    Repository::<Academic>::new()
        .update_with_map_for_tenant(
            uow,
            tenant_id,
            deletion(actor),
            &[filter("academics.talent_id = ?", [talent_id])],
        )
        .await?;
    Repository::<Experience>::new()
        .update_with_map_for_tenant(
            uow,
            tenant_id,
            deletion(actor),
            &[filter("experiences.talent_id = ?", [talent_id])],
        )
        .await?;
    Ok(())
}
