//! Database-specific error types and conversions.

use schola_core::error::ScholaError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },
}

impl From<DbError> for ScholaError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ScholaError::NotFound { entity, id },
            other => ScholaError::Database(other.to_string()),
        }
    }
}
