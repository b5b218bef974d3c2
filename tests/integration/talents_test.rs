//! Talents domain integration tests
//!
//! Drive `TalentRepository` end to end: nested create, preloaded reads,
//! searches, reconciled updates, soft deletes and reports.

use anyhow::Result;
use serial_test::serial;
use talentbase_common::Error;
use talentbase_store::{Audit, ReconcileOutcome, Repository};
use talentbase_talents::{
    TalentChanges, TalentRepository, TalentSearch, TalentStatus, Technology,
};
use uuid::Uuid;

use crate::common::{academic, experience, talent, technology, TestApp};

async fn seed_technology(app: &TestApp, name: &str) -> Result<Uuid> {
    let mut tech: Technology = technology(name);
    tech.audit = Audit::new(app.tenant_id, app.actor);
    let mut uow = app.db.begin(false).await?;
    Repository::<Technology>::new().add(&mut uow, &mut tech).await?;
    uow.commit().await?;
    tech.id
        .ok_or_else(|| anyhow::anyhow!("technology was not assigned a key"))
}

#[test_log::test(tokio::test)]
#[ignore] // Requires database setup
#[serial]
async fn test_create_then_find_loads_every_relation() -> Result<()> {
    let app = TestApp::new().await?;
    let repo = TalentRepository::new(app.db.clone());
    let rust = seed_technology(&app, "Rust").await?;

    let mut new_talent = talent("Asha");
    new_talent.academics = vec![academic("B.E."), academic("M.Tech.")];
    new_talent.experiences = vec![experience("Acme")];

    let created = repo
        .create(app.tenant_id, app.actor, new_talent, vec![rust])
        .await?;
    let id = created.id.unwrap();
    assert!(created.academics.iter().all(|a| a.talent_id == Some(id)));

    let found = repo.find(app.tenant_id, id).await?;
    assert_eq!(found.academics.len(), 2);
    assert_eq!(found.experiences.len(), 1);
    assert_eq!(found.technologies.len(), 1);
    assert_eq!(found.technologies[0].name, "Rust");
    assert_eq!(found.audit.created_by, Some(app.actor));
    assert_eq!(found.academics[0].audit.tenant_id, app.tenant_id);

    let by_email = repo.find_by_email(app.tenant_id, &created.email).await?;
    assert_eq!(by_email.id, Some(id));
    assert!(repo.email_exists(app.tenant_id, &created.email.to_uppercase()).await?);
    assert!(!repo.email_exists(app.other_tenant(), &created.email).await?);
    Ok(())
}

#[test_log::test(tokio::test)]
#[ignore] // Requires database setup
#[serial]
async fn test_failed_create_leaves_nothing_behind() -> Result<()> {
    let app = TestApp::new().await?;
    let repo = TalentRepository::new(app.db.clone());

    let mut new_talent = talent("Dev");
    new_talent.academics = vec![academic("B.Com.")];
    let email = new_talent.email.clone();

    // Linking an unknown technology fails after the talent row was written
    let err = repo
        .create(app.tenant_id, app.actor, new_talent, vec![Uuid::new_v4()])
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {err:?}");
    assert!(!repo.email_exists(app.tenant_id, &email).await?);
    Ok(())
}

#[test_log::test(tokio::test)]
#[ignore] // Requires database setup
#[serial]
async fn test_list_filters_and_counts() -> Result<()> {
    let app = TestApp::new().await?;
    let repo = TalentRepository::new(app.db.clone());
    let rust = seed_technology(&app, "Rust").await?;

    for (name, city, years, techs) in [
        ("Asha", "Pune", 5, vec![rust]),
        ("Ashok", "Pune", 1, vec![]),
        ("Bela", "Mumbai", 7, vec![rust]),
        ("Chetan", "Pune", 8, vec![rust]),
    ] {
        let mut t = talent(name);
        t.city = Some(city.to_string());
        t.experience_years = Some(years);
        repo.create(app.tenant_id, app.actor, t, techs).await?;
    }

    let page = repo
        .list(app.tenant_id, &TalentSearch::default(), 2, 0)
        .await?;
    assert_eq!(page.talents.len(), 2);
    assert_eq!(page.total, 4);

    let pune_seniors = TalentSearch {
        city: Some("Pune".to_string()),
        min_experience: Some(3),
        ..TalentSearch::default()
    };
    let page = repo.list(app.tenant_id, &pune_seniors, 10, 0).await?;
    let mut names: Vec<String> = page.talents.iter().map(|t| t.first_name.clone()).collect();
    names.sort();
    assert_eq!(names, vec!["Asha", "Chetan"]);
    assert_eq!(page.total, 2);

    let ash = TalentSearch {
        name: Some("ash".to_string()),
        ..TalentSearch::default()
    };
    assert_eq!(repo.list(app.tenant_id, &ash, 10, 0).await?.total, 2);

    let rustaceans = TalentSearch {
        technology: Some("Rust".to_string()),
        city: Some("Pune".to_string()),
        ..TalentSearch::default()
    };
    let page = repo.list(app.tenant_id, &rustaceans, 10, 0).await?;
    assert_eq!(page.total, 2);
    assert!(page
        .talents
        .iter()
        .all(|t| t.technologies.iter().any(|tech| tech.name == "Rust")));

    let elsewhere = repo
        .list(app.other_tenant(), &TalentSearch::default(), 10, 0)
        .await?;
    assert_eq!(elsewhere.total, 0);
    Ok(())
}

#[test_log::test(tokio::test)]
#[ignore] // Requires database setup
#[serial]
async fn test_update_reconciles_children_and_links() -> Result<()> {
    let app = TestApp::new().await?;
    let repo = TalentRepository::new(app.db.clone());
    let rust = seed_technology(&app, "Rust").await?;
    let go = seed_technology(&app, "Go").await?;

    let mut new_talent = talent("Meera");
    new_talent.academics = vec![academic("A"), academic("B")];
    let created = repo
        .create(app.tenant_id, app.actor, new_talent, vec![rust])
        .await?;
    let id = created.id.unwrap();

    let stored = repo.find(app.tenant_id, id).await?;
    let mut academics = stored.academics.clone();
    academics.retain(|a| a.degree == "B");
    academics.push(academic("C"));

    let editor = Uuid::new_v4();
    let changes = TalentChanges {
        city: Some(Some("Nagpur".to_string())),
        academics: Some(academics),
        experiences: Some(vec![experience("Initech")]),
        technology_ids: Some(vec![go]),
        ..TalentChanges::default()
    };
    let outcome = repo.update(app.tenant_id, editor, id, changes).await?;
    assert_eq!(outcome.academics.inserted, 1);
    assert_eq!(outcome.academics.updated, 1);
    assert_eq!(outcome.academics.deleted, 1);
    assert_eq!(outcome.experiences.inserted, 1);

    let reloaded = outcome.talent;
    assert_eq!(reloaded.city.as_deref(), Some("Nagpur"));
    assert_eq!(reloaded.first_name, "Meera");
    assert_eq!(reloaded.audit.created_by, Some(app.actor));
    assert_eq!(reloaded.audit.updated_by, Some(editor));
    let mut degrees: Vec<&str> = reloaded.academics.iter().map(|a| a.degree.as_str()).collect();
    degrees.sort();
    assert_eq!(degrees, vec!["B", "C"]);
    assert_eq!(reloaded.experiences.len(), 1);
    let techs: Vec<&str> = reloaded.technologies.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(techs, vec!["Go"]);

    // Resubmitting the stored children only updates them
    let changes = TalentChanges {
        academics: Some(reloaded.academics.clone()),
        ..TalentChanges::default()
    };
    let outcome = repo.update(app.tenant_id, editor, id, changes).await?;
    assert_eq!(outcome.academics.inserted, 0);
    assert_eq!(outcome.academics.deleted, 0);
    assert_eq!(outcome.academics.updated, 2);
    assert_eq!(outcome.experiences, ReconcileOutcome::default());
    assert_eq!(outcome.talent.experiences.len(), 1);
    assert_eq!(outcome.talent.technologies.len(), 1);
    Ok(())
}

#[test_log::test(tokio::test)]
#[ignore] // Requires database setup
#[serial]
async fn test_update_keeps_fields_left_out_of_the_changes() -> Result<()> {
    let app = TestApp::new().await?;
    let repo = TalentRepository::new(app.db.clone());
    let mut new_talent = talent("Isha");
    new_talent.phone = Some("+91 98200 11111".to_string());
    let created = repo
        .create(app.tenant_id, app.actor, new_talent, vec![])
        .await?;
    let id = created.id.unwrap();
    repo.set_status(app.tenant_id, app.actor, vec![id], TalentStatus::Placed)
        .await?;

    let changes = TalentChanges {
        city: Some(Some("Nashik".to_string())),
        ..TalentChanges::default()
    };
    let updated = repo.update(app.tenant_id, app.actor, id, changes).await?.talent;
    assert_eq!(updated.city.as_deref(), Some("Nashik"));
    assert_eq!(updated.status, TalentStatus::Placed);
    assert_eq!(updated.first_name, "Isha");
    assert_eq!(updated.email, created.email);
    assert_eq!(updated.phone.as_deref(), Some("+91 98200 11111"));

    let changes = TalentChanges {
        phone: Some(None),
        ..TalentChanges::default()
    };
    let cleared = repo.update(app.tenant_id, app.actor, id, changes).await?.talent;
    assert_eq!(cleared.phone, None);
    assert_eq!(cleared.city.as_deref(), Some("Nashik"));
    assert_eq!(cleared.status, TalentStatus::Placed);
    Ok(())
}

#[test_log::test(tokio::test)]
#[ignore] // Requires database setup
#[serial]
async fn test_update_from_another_tenant_is_not_found() -> Result<()> {
    let app = TestApp::new().await?;
    let repo = TalentRepository::new(app.db.clone());
    let created = repo
        .create(app.tenant_id, app.actor, talent("Owned"), vec![])
        .await?;
    let id = created.id.unwrap();

    let hijack = TalentChanges {
        city: Some(Some("Elsewhere".to_string())),
        ..TalentChanges::default()
    };
    let err = repo
        .update(app.other_tenant(), app.actor, id, hijack)
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let untouched = repo.find(app.tenant_id, id).await?;
    assert_eq!(untouched.city.as_deref(), Some("Pune"));
    Ok(())
}

#[test_log::test(tokio::test)]
#[ignore] // Requires database setup
#[serial]
async fn test_delete_soft_deletes_talent_and_children() -> Result<()> {
    let app = TestApp::new().await?;
    let repo = TalentRepository::new(app.db.clone());
    let mut new_talent = talent("Leaving");
    new_talent.academics = vec![academic("B.A.")];
    let created = repo
        .create(app.tenant_id, app.actor, new_talent, vec![])
        .await?;
    let id = created.id.unwrap();

    repo.delete(app.tenant_id, app.actor, id).await?;
    assert!(repo.find(app.tenant_id, id).await.unwrap_err().is_not_found());

    let mut uow = app.db.begin(true).await?;
    let live_children = Repository::<talentbase_talents::Academic>::new()
        .get_count_for_tenant(
            &mut uow,
            app.tenant_id,
            &[talentbase_store::filter("academics.talent_id = ?", [id])],
        )
        .await?;
    uow.rollback().await?;
    assert_eq!(live_children, 0);

    let err = repo.delete(app.tenant_id, app.actor, id).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    Ok(())
}

#[test_log::test(tokio::test)]
#[ignore] // Requires database setup
#[serial]
async fn test_set_status_updates_only_listed_talents() -> Result<()> {
    let app = TestApp::new().await?;
    let repo = TalentRepository::new(app.db.clone());
    let placed = repo
        .create(app.tenant_id, app.actor, talent("Placed"), vec![])
        .await?;
    let waiting = repo
        .create(app.tenant_id, app.actor, talent("Waiting"), vec![])
        .await?;

    let changed = repo
        .set_status(
            app.tenant_id,
            app.actor,
            vec![placed.id.unwrap()],
            TalentStatus::Placed,
        )
        .await?;
    assert_eq!(changed, 1);

    assert_eq!(
        repo.find(app.tenant_id, placed.id.unwrap()).await?.status,
        TalentStatus::Placed
    );
    assert_eq!(
        repo.find(app.tenant_id, waiting.id.unwrap()).await?.status,
        TalentStatus::Active
    );

    let by_status = TalentSearch {
        status: Some(TalentStatus::Placed),
        ..TalentSearch::default()
    };
    assert_eq!(repo.list(app.tenant_id, &by_status, 10, 0).await?.total, 1);
    Ok(())
}

#[test_log::test(tokio::test)]
#[ignore] // Requires database setup
#[serial]
async fn test_city_report_groups_and_counts_groups() -> Result<()> {
    let app = TestApp::new().await?;
    let repo = TalentRepository::new(app.db.clone());

    for (name, city, years, company) in [
        ("A", "Pune", 2, "Acme"),
        ("B", "Pune", 4, "Acme"),
        ("C", "Pune", 6, "Globex"),
        ("D", "Mumbai", 3, "Acme"),
        ("E", "Delhi", 1, "Globex"),
    ] {
        let mut t = talent(name);
        t.city = Some(city.to_string());
        t.experience_years = Some(years);
        t.experiences = vec![experience(company)];
        repo.create(app.tenant_id, app.actor, t, vec![]).await?;
    }

    let (rows, total) = repo.city_report(app.tenant_id, None, 1, 2, 0).await?;
    assert_eq!(total, 3);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].city, "Pune");
    assert_eq!(rows[0].headcount, 3);
    assert_eq!(rows[0].avg_experience, Some(4.0));

    let (acme, total) = repo
        .city_report(app.tenant_id, Some("Acme"), 1, 0, 0)
        .await?;
    assert_eq!(total, 2);
    let pune = acme.iter().find(|r| r.city == "Pune").unwrap();
    assert_eq!(pune.headcount, 2);

    let (crowded, total) = repo.city_report(app.tenant_id, None, 2, 0, 0).await?;
    assert_eq!(total, 1);
    assert_eq!(crowded[0].city, "Pune");
    Ok(())
}

mod common;
