//! Error types for the Schola system.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScholaError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Email already in use: {email}")]
    DuplicateEmail { email: String },

    #[error("Student identifier already in use: {identifier}")]
    DuplicateIdentifier { identifier: String },

    /// Deliberately covers "never existed", "expired" and "already
    /// used" so callers cannot enumerate codes.
    #[error("Invalid or expired access code")]
    InvalidOrExpiredCode,

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Upload is not valid text: {message}")]
    Encoding { message: String },

    #[error("Import contains no rows")]
    EmptyImport,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScholaError {
    /// Stable, enumerable reason code for the transport boundary.
    pub fn reason_code(&self) -> &'static str {
        match self {
            ScholaError::NotFound { .. } => "NOT_FOUND",
            ScholaError::DuplicateEmail { .. } => "DUPLICATE_EMAIL",
            ScholaError::DuplicateIdentifier { .. } => "DUPLICATE_IDENTIFIER",
            ScholaError::InvalidOrExpiredCode => "INVALID_OR_EXPIRED",
            ScholaError::Validation { .. } => "VALIDATION",
            ScholaError::Encoding { .. } | ScholaError::EmptyImport => "EXTERNAL_ENCODING",
            ScholaError::Database(_) => "DATABASE",
            ScholaError::Internal(_) => "INTERNAL",
        }
    }
}

pub type ScholaResult<T> = Result<T, ScholaError>;
