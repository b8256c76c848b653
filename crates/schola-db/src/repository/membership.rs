//! SurrealDB implementation of [`MembershipRepository`].
//!
//! Students and teachers attach to classes and classrooms through
//! four association tables. Attachment is check-then-create with the
//! composite unique index as the last line of defense against races;
//! an attachment that already exists reports `false`, never an error.

use chrono::{DateTime, Utc};
use schola_core::error::ScholaResult;
use schola_core::models::membership::{Class, Classroom, CreateClass, CreateClassroom};
use schola_core::repository::MembershipRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct TargetRow {
    school_id: String,
    name: String,
    created_at: DateTime<Utc>,
}

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

impl TargetRow {
    fn into_class(self, id: Uuid) -> Result<Class, DbError> {
        let school_id = Uuid::parse_str(&self.school_id)
            .map_err(|e| DbError::Migration(format!("invalid school UUID: {e}")))?;
        Ok(Class {
            id,
            school_id,
            name: self.name,
            created_at: self.created_at,
        })
    }

    fn into_classroom(self, id: Uuid) -> Result<Classroom, DbError> {
        let school_id = Uuid::parse_str(&self.school_id)
            .map_err(|e| DbError::Migration(format!("invalid school UUID: {e}")))?;
        Ok(Classroom {
            id,
            school_id,
            name: self.name,
            created_at: self.created_at,
        })
    }
}

/// SurrealDB implementation of the Membership repository.
#[derive(Clone)]
pub struct SurrealMembershipRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealMembershipRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn create_target(
        &self,
        table: &'static str,
        school_id: Uuid,
        name: String,
    ) -> ScholaResult<(Uuid, TargetRow)> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(format!(
                "CREATE type::record('{table}', $id) SET \
                 school_id = $school_id, name = $name"
            ))
            .bind(("id", id_str.clone()))
            .bind(("school_id", school_id.to_string()))
            .bind(("name", name))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<TargetRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: table.into(),
            id: id_str,
        })?;

        Ok((id, row))
    }

    async fn find_target(
        &self,
        table: &'static str,
        school_id: Uuid,
        id: Uuid,
    ) -> ScholaResult<Option<TargetRow>> {
        let mut result = self
            .db
            .query(format!(
                "SELECT * FROM type::record('{table}', $id) \
                 WHERE school_id = $school_id"
            ))
            .bind(("id", id.to_string()))
            .bind(("school_id", school_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TargetRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().next())
    }

    /// Shared attach body for the four association tables.
    async fn attach(
        &self,
        table: &'static str,
        target_field: &'static str,
        target_id: Uuid,
        member_field: &'static str,
        member_id: Uuid,
    ) -> ScholaResult<bool> {
        let mut existing = self
            .db
            .query(format!(
                "SELECT count() AS total FROM {table} \
                 WHERE {target_field} = $target_id \
                 AND {member_field} = $member_id GROUP ALL"
            ))
            .bind(("target_id", target_id.to_string()))
            .bind(("member_id", member_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let counts: Vec<CountRow> = existing.take(0).map_err(DbError::from)?;
        if counts.first().map(|c| c.total).unwrap_or(0) > 0 {
            return Ok(false);
        }

        let result = self
            .db
            .query(format!(
                "CREATE {table} SET \
                 {target_field} = $target_id, \
                 {member_field} = $member_id"
            ))
            .bind(("target_id", target_id.to_string()))
            .bind(("member_id", member_id.to_string()))
            .await
            .map_err(DbError::from)?;

        match result.check() {
            Ok(_) => Ok(true),
            // Lost a race; the unique index caught the duplicate.
            Err(e) if e.to_string().contains("idx_") => Ok(false),
            Err(e) => Err(DbError::Migration(e.to_string()).into()),
        }
    }
}

impl<C: Connection> MembershipRepository for SurrealMembershipRepository<C> {
    async fn create_class(&self, input: CreateClass) -> ScholaResult<Class> {
        let (id, row) = self
            .create_target("class", input.school_id, input.name)
            .await?;
        Ok(row.into_class(id)?)
    }

    async fn create_classroom(&self, input: CreateClassroom) -> ScholaResult<Classroom> {
        let (id, row) = self
            .create_target("classroom", input.school_id, input.name)
            .await?;
        Ok(row.into_classroom(id)?)
    }

    async fn find_class(&self, school_id: Uuid, id: Uuid) -> ScholaResult<Option<Class>> {
        match self.find_target("class", school_id, id).await? {
            Some(row) => Ok(Some(row.into_class(id)?)),
            None => Ok(None),
        }
    }

    async fn find_classroom(&self, school_id: Uuid, id: Uuid) -> ScholaResult<Option<Classroom>> {
        match self.find_target("classroom", school_id, id).await? {
            Some(row) => Ok(Some(row.into_classroom(id)?)),
            None => Ok(None),
        }
    }

    async fn enroll_student_in_class(
        &self,
        class_id: Uuid,
        student_id: Uuid,
    ) -> ScholaResult<bool> {
        self.attach(
            "class_enrollment",
            "class_id",
            class_id,
            "student_id",
            student_id,
        )
        .await
    }

    async fn assign_teacher_to_class(
        &self,
        class_id: Uuid,
        teacher_id: Uuid,
    ) -> ScholaResult<bool> {
        self.attach(
            "class_assignment",
            "class_id",
            class_id,
            "teacher_id",
            teacher_id,
        )
        .await
    }

    async fn add_student_to_classroom(
        &self,
        classroom_id: Uuid,
        student_id: Uuid,
    ) -> ScholaResult<bool> {
        self.attach(
            "classroom_student",
            "classroom_id",
            classroom_id,
            "student_id",
            student_id,
        )
        .await
    }

    async fn add_teacher_to_classroom(
        &self,
        classroom_id: Uuid,
        teacher_id: Uuid,
    ) -> ScholaResult<bool> {
        self.attach(
            "classroom_teacher",
            "classroom_id",
            classroom_id,
            "teacher_id",
            teacher_id,
        )
        .await
    }
}
