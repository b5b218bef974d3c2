//! Talents domain: talents, academic records, work experiences, technologies

pub mod domain;
pub mod repository;

// Re-export domain types at the crate root for convenience
pub use domain::entities::*;
pub use repository::{
    create_talent_tx, delete_talent_tx, update_talent_tx, TalentPage, TalentRepository,
    TalentSearch, TalentUpdate,
};
