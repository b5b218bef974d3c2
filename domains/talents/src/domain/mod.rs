//! Domain logic for the talents domain

pub mod entities;
