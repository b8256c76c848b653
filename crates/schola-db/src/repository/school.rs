//! SurrealDB implementation of [`SchoolRepository`].

use chrono::{DateTime, Utc};
use schola_core::error::ScholaResult;
use schola_core::models::school::{CreateSchool, School};
use schola_core::repository::SchoolRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct SchoolRow {
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SchoolRow {
    fn into_school(self, id: Uuid) -> School {
        School {
            id,
            name: self.name,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// SurrealDB implementation of the School repository.
#[derive(Clone)]
pub struct SurrealSchoolRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealSchoolRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> SchoolRepository for SurrealSchoolRepository<C> {
    async fn create(&self, input: CreateSchool) -> ScholaResult<School> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query("CREATE type::record('school', $id) SET name = $name")
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<SchoolRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "school".into(),
            id: id_str,
        })?;

        Ok(row.into_school(id))
    }

    async fn get_by_id(&self, id: Uuid) -> ScholaResult<School> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('school', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<SchoolRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "school".into(),
            id: id_str,
        })?;

        Ok(row.into_school(id))
    }
}
