//! Domain entities for the Talentbase talents domain
//!
//! A talent owns two reconciled child collections (academic records and
//! work experiences) and links to shared technologies through a
//! many-to-many table. Field-level validation lives with the callers.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use talentbase_common::{Error, Result};
use talentbase_store::association::{group_by_parent, load_has_many, load_many_to_many};
use talentbase_store::{
    Audit, Child, Entity, FieldMap, LinkTable, Preload, Repository, UnitOfWork, Value,
};
use uuid::Uuid;

/// Pipeline stage of a talent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TalentStatus {
    #[default]
    Active,
    Placed,
    Blacklisted,
}

impl std::fmt::Display for TalentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TalentStatus::Active => write!(f, "active"),
            TalentStatus::Placed => write!(f, "placed"),
            TalentStatus::Blacklisted => write!(f, "blacklisted"),
        }
    }
}

impl std::str::FromStr for TalentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(TalentStatus::Active),
            "placed" => Ok(TalentStatus::Placed),
            "blacklisted" => Ok(TalentStatus::Blacklisted),
            other => Err(Error::Validation(format!("Unknown talent status: {other}"))),
        }
    }
}

impl TryFrom<String> for TalentStatus {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TalentStatus> for Value {
    fn from(status: TalentStatus) -> Self {
        Value::from(status.to_string())
    }
}

/// Talent entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Talent {
    pub id: Option<Uuid>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub experience_years: Option<i32>,
    #[sqlx(try_from = "String")]
    pub status: TalentStatus,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub audit: Audit,
    #[sqlx(skip)]
    #[serde(default)]
    pub academics: Vec<Academic>,
    #[sqlx(skip)]
    #[serde(default)]
    pub experiences: Vec<Experience>,
    #[sqlx(skip)]
    #[serde(default)]
    pub technologies: Vec<Technology>,
}

impl Talent {
    pub fn new(first_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: None,
            first_name: first_name.into(),
            last_name: None,
            email: email.into(),
            phone: None,
            city: None,
            experience_years: None,
            status: TalentStatus::default(),
            audit: Audit::default(),
            academics: Vec::new(),
            experiences: Vec::new(),
            technologies: Vec::new(),
        }
    }

    /// Full display name
    pub fn full_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {}", self.first_name, last),
            None => self.first_name.clone(),
        }
    }

    fn child_audit(&self) -> Audit {
        Audit {
            tenant_id: self.audit.tenant_id,
            created_by: self.audit.created_by,
            updated_by: self.audit.created_by,
            ..Audit::default()
        }
    }
}

/// Requested changes to a stored talent.
///
/// `None` leaves the stored value alone. For nullable columns `Some(None)`
/// clears the column. Child collections are reconciled only when present,
/// so `Some(vec![])` removes every child.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TalentChanges {
    pub first_name: Option<String>,
    pub last_name: Option<Option<String>>,
    pub email: Option<String>,
    pub phone: Option<Option<String>>,
    pub city: Option<Option<String>>,
    pub experience_years: Option<Option<i32>>,
    pub status: Option<TalentStatus>,
    pub academics: Option<Vec<Academic>>,
    pub experiences: Option<Vec<Experience>>,
    /// Replaces every technology link when present
    pub technology_ids: Option<Vec<Uuid>>,
}

impl TalentChanges {
    /// Column assignments for the supplied scalar fields, crediting `actor`
    pub fn fields(&self, actor: Uuid) -> FieldMap {
        let mut map = FieldMap::new();
        map.insert("updated_by".to_string(), actor.into());
        if let Some(first_name) = &self.first_name {
            map.insert("first_name".to_string(), first_name.into());
        }
        if let Some(last_name) = &self.last_name {
            map.insert("last_name".to_string(), last_name.clone().into());
        }
        if let Some(email) = &self.email {
            map.insert("email".to_string(), email.into());
        }
        if let Some(phone) = &self.phone {
            map.insert("phone".to_string(), phone.clone().into());
        }
        if let Some(city) = &self.city {
            map.insert("city".to_string(), city.clone().into());
        }
        if let Some(years) = self.experience_years {
            map.insert("experience_years".to_string(), years.into());
        }
        if let Some(status) = self.status {
            map.insert("status".to_string(), status.into());
        }
        map
    }
}

#[async_trait]
impl Entity for Talent {
    const TABLE: &'static str = "talents";

    fn id(&self) -> Option<Uuid> {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = Some(id);
    }

    fn audit(&self) -> &Audit {
        &self.audit
    }

    fn audit_mut(&mut self) -> &mut Audit {
        &mut self.audit
    }

    fn values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("first_name", self.first_name.clone().into()),
            ("last_name", self.last_name.clone().into()),
            ("email", self.email.clone().into()),
            ("phone", self.phone.clone().into()),
            ("city", self.city.clone().into()),
            ("experience_years", self.experience_years.into()),
            ("status", self.status.into()),
        ]
    }

    fn link_table(relation: &str) -> Option<LinkTable> {
        match relation {
            "technologies" => Some(LinkTable {
                table: "talent_technologies",
                owner_column: "talent_id",
                target_column: "technology_id",
                target_table: Technology::TABLE,
            }),
            _ => None,
        }
    }

    async fn insert_children(&mut self, uow: &mut UnitOfWork) -> Result<()> {
        let Some(id) = self.id else {
            return Err(Error::Internal(
                "Talent children inserted before the talent has a key".to_string(),
            ));
        };
        let audit = self.child_audit();

        let academics = Repository::<Academic>::new();
        for academic in &mut self.academics {
            academic.attach_to(id);
            academic.audit = audit.clone();
            academics.add(uow, academic).await?;
        }

        let experiences = Repository::<Experience>::new();
        for experience in &mut self.experiences {
            experience.attach_to(id);
            experience.audit = audit.clone();
            experiences.add(uow, experience).await?;
        }
        Ok(())
    }

    async fn load_association(
        uow: &mut UnitOfWork,
        rows: &mut [Self],
        preload: &Preload,
    ) -> Result<()> {
        match preload.relation.as_str() {
            "academics" => {
                let children: Vec<Academic> =
                    load_has_many(uow, &*rows, "talent_id", preload).await?;
                let mut grouped = group_by_parent(children, |c| c.talent_id);
                for row in rows.iter_mut() {
                    row.academics = row.id.and_then(|id| grouped.remove(&id)).unwrap_or_default();
                }
            }
            "experiences" => {
                let children: Vec<Experience> =
                    load_has_many(uow, &*rows, "talent_id", preload).await?;
                let mut grouped = group_by_parent(children, |c| c.talent_id);
                for row in rows.iter_mut() {
                    row.experiences =
                        row.id.and_then(|id| grouped.remove(&id)).unwrap_or_default();
                }
            }
            "technologies" => {
                let link = Self::link_table("technologies").ok_or_else(|| {
                    Error::Internal("technologies link table missing".to_string())
                })?;
                let mut grouped =
                    load_many_to_many::<Self, Technology>(uow, &*rows, &link, preload).await?;
                for row in rows.iter_mut() {
                    row.technologies =
                        row.id.and_then(|id| grouped.remove(&id)).unwrap_or_default();
                }
            }
            other => {
                return Err(Error::Misuse(format!("talents has no relation named {other:?}")));
            }
        }
        Ok(())
    }
}

/// Academic record of a talent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Academic {
    pub id: Option<Uuid>,
    pub talent_id: Option<Uuid>,
    pub degree: String,
    pub institution: String,
    pub passout_year: i32,
    pub percentage: Option<f64>,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub audit: Audit,
}

impl Academic {
    pub fn new(degree: impl Into<String>, institution: impl Into<String>, passout_year: i32) -> Self {
        Self {
            id: None,
            talent_id: None,
            degree: degree.into(),
            institution: institution.into(),
            passout_year,
            percentage: None,
            audit: Audit::default(),
        }
    }
}

impl Entity for Academic {
    const TABLE: &'static str = "academics";

    fn id(&self) -> Option<Uuid> {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = Some(id);
    }

    fn audit(&self) -> &Audit {
        &self.audit
    }

    fn audit_mut(&mut self) -> &mut Audit {
        &mut self.audit
    }

    fn values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("talent_id", self.talent_id.into()),
            ("degree", self.degree.clone().into()),
            ("institution", self.institution.clone().into()),
            ("passout_year", self.passout_year.into()),
            ("percentage", self.percentage.into()),
        ]
    }
}

impl Child for Academic {
    fn attach_to(&mut self, parent_id: Uuid) {
        self.talent_id = Some(parent_id);
    }
}

/// Work experience of a talent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Experience {
    pub id: Option<Uuid>,
    pub talent_id: Option<Uuid>,
    pub company: String,
    pub designation: String,
    pub from_date: Option<NaiveDate>,
    /// `None` while the talent still works there
    pub to_date: Option<NaiveDate>,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub audit: Audit,
}

impl Experience {
    pub fn new(company: impl Into<String>, designation: impl Into<String>) -> Self {
        Self {
            id: None,
            talent_id: None,
            company: company.into(),
            designation: designation.into(),
            from_date: None,
            to_date: None,
            audit: Audit::default(),
        }
    }

    pub fn is_current(&self) -> bool {
        self.to_date.is_none()
    }
}

impl Entity for Experience {
    const TABLE: &'static str = "experiences";

    fn id(&self) -> Option<Uuid> {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = Some(id);
    }

    fn audit(&self) -> &Audit {
        &self.audit
    }

    fn audit_mut(&mut self) -> &mut Audit {
        &mut self.audit
    }

    fn values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("talent_id", self.talent_id.into()),
            ("company", self.company.clone().into()),
            ("designation", self.designation.clone().into()),
            ("from_date", self.from_date.into()),
            ("to_date", self.to_date.into()),
        ]
    }
}

impl Child for Experience {
    fn attach_to(&mut self, parent_id: Uuid) {
        self.talent_id = Some(parent_id);
    }
}

/// Technology shared by many talents of a tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Technology {
    pub id: Option<Uuid>,
    pub name: String,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub audit: Audit,
}

impl Technology {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            audit: Audit::default(),
        }
    }
}

impl Entity for Technology {
    const TABLE: &'static str = "technologies";

    fn id(&self) -> Option<Uuid> {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = Some(id);
    }

    fn audit(&self) -> &Audit {
        &self.audit
    }

    fn audit_mut(&mut self) -> &mut Audit {
        &mut self.audit
    }

    fn values(&self) -> Vec<(&'static str, Value)> {
        vec![("name", self.name.clone().into())]
    }
}

/// Headcount of live talents per city
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CityHeadcount {
    pub city: String,
    pub headcount: i64,
    pub avg_experience: Option<f64>,
}
