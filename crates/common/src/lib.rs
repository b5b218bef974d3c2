//! Shared utilities, configuration, and error handling for Talentbase
//!
//! This crate provides common functionality used across the workspace:
//! - Configuration management following 12-factor principles
//! - Error types and handling
//! - Tracing subscriber setup

pub mod config;
pub mod error;
pub mod telemetry;

pub use config::Config;
pub use error::{Error, Result};
