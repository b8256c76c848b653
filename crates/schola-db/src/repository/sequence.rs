//! SurrealDB implementation of [`SequenceRepository`].
//!
//! One counter record per (school, year), keyed deterministically so
//! the increment is a single `UPDATE ... SET value += 1` statement —
//! atomic at the storage layer, which is what makes concurrent student
//! number allocation safe.

use schola_core::error::ScholaResult;
use schola_core::repository::SequenceRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct SequenceRow {
    value: u32,
}

/// Deterministic record key for a (school, year) counter.
fn sequence_key(school_id: Uuid, year: i32) -> String {
    format!("{school_id}_{year}")
}

/// SurrealDB implementation of the Sequence repository.
#[derive(Clone)]
pub struct SurrealSequenceRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealSequenceRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> SequenceRepository for SurrealSequenceRepository<C> {
    async fn increment(&self, school_id: Uuid, year: i32) -> ScholaResult<Option<u32>> {
        let mut result = self
            .db
            .query(
                "UPDATE type::record('student_sequence', $key) \
                 SET value += 1 RETURN AFTER",
            )
            .bind(("key", sequence_key(school_id, year)))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SequenceRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().next().map(|row| row.value))
    }

    async fn initialize(&self, school_id: Uuid, year: i32, value: u32) -> ScholaResult<Option<u32>> {
        let result = self
            .db
            .query(
                "CREATE type::record('student_sequence', $key) SET \
                 school_id = $school_id, \
                 year = $year, \
                 value = $value",
            )
            .bind(("key", sequence_key(school_id, year)))
            .bind(("school_id", school_id.to_string()))
            .bind(("year", year))
            .bind(("value", value))
            .await
            .map_err(DbError::from)?;

        match result.check() {
            Ok(_) => Ok(Some(value)),
            // A concurrent initializer created the record first.
            Err(e) if e.to_string().contains("already exists") => Ok(None),
            Err(e) => Err(DbError::Migration(e.to_string()).into()),
        }
    }
}
