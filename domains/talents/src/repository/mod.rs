//! Repository implementations for the talents domain

pub mod talents;
pub mod transactions;

pub use talents::{TalentPage, TalentRepository, TalentSearch, TalentUpdate};
pub use transactions::{create_talent_tx, delete_talent_tx, update_talent_tx};
