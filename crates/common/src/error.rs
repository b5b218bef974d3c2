//! Common error types and handling for Talentbase
//!
//! The data-access core reports failures in four classes: not-found,
//! constraint violations raised by the store, execution failures
//! (connectivity, timeouts, syntax), and caller misuse. Translating these
//! into user-facing messages is left to the service layer.

use sqlx::error::ErrorKind;

/// Common result type
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the Talentbase application
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unexpected error: {0}")]
    Unexpected(#[from] anyhow::Error),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Misuse: {0}")]
    Misuse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get the stable error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Unexpected(_) => "UNEXPECTED_ERROR",
            Error::Database(_) => "DATABASE_ERROR",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Constraint(_) => "CONSTRAINT_VIOLATION",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::Misuse(_) => "CALLER_MISUSE",
            Error::Configuration(_) => "CONFIGURATION_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether this is the distinguished "zero rows where one was expected" condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Whether the store rejected the write because of a constraint
    pub fn is_constraint(&self) -> bool {
        matches!(self, Error::Constraint(_))
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) => match db_err.kind() {
                ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation => {
                    let detail = match db_err.constraint() {
                        Some(constraint) => format!("{} ({})", db_err.message(), constraint),
                        None => db_err.message().to_string(),
                    };
                    Error::Constraint(detail)
                }
                _ => Error::Database(sqlx::Error::Database(db_err)),
            },
            other => Error::Database(other),
        }
    }
}
