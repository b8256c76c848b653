//! SurrealDB implementation of [`TrashRepository`].
//!
//! Soft-delete, restore, and purge each run as a single SurrealDB
//! transaction so the user row and its trash record can never drift
//! apart: a live user has no trash record, a trashed user with a
//! retention window has exactly one.

use chrono::{DateTime, Utc};
use schola_core::error::ScholaResult;
use schola_core::models::trash::TrashRecord;
use schola_core::repository::TrashRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

use super::user::is_transaction_conflict;

/// Sentinel thrown when the user is not in the state the transition
/// requires; cancels the transaction.
const WRONG_STATE: &str = "wrong-state";

/// Outcome of a guarded state transition: the sentinel throw and an
/// optimistic transaction conflict both mean the user was not in the
/// required state from this caller's point of view.
fn map_transition_result(result: surrealdb::IndexedResults) -> ScholaResult<bool> {
    match result.check() {
        Ok(_) => Ok(true),
        Err(e) => {
            let msg = e.to_string();
            if msg.contains(WRONG_STATE) || is_transaction_conflict(&msg) {
                Ok(false)
            } else {
                Err(DbError::Migration(msg).into())
            }
        }
    }
}

#[derive(Debug, SurrealValue)]
struct TrashRowWithId {
    record_id: String,
    user_id: String,
    school_id: String,
    deleted_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TrashRowWithId {
    fn try_into_record(self) -> Result<TrashRecord, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Migration(format!("invalid UUID: {e}")))?;
        let user_id = Uuid::parse_str(&self.user_id)
            .map_err(|e| DbError::Migration(format!("invalid user UUID: {e}")))?;
        let school_id = Uuid::parse_str(&self.school_id)
            .map_err(|e| DbError::Migration(format!("invalid school UUID: {e}")))?;
        Ok(TrashRecord {
            id,
            user_id,
            school_id,
            deleted_at: self.deleted_at,
            expires_at: self.expires_at,
        })
    }
}

/// SurrealDB implementation of the Trash repository.
#[derive(Clone)]
pub struct SurrealTrashRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealTrashRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> TrashRepository for SurrealTrashRepository<C> {
    async fn soft_delete_user(
        &self,
        school_id: Uuid,
        user_id: Uuid,
        trash_expires_at: Option<DateTime<Utc>>,
    ) -> ScholaResult<bool> {
        let trash_id = Uuid::new_v4();

        let result = self
            .db
            .query(format!(
                "BEGIN TRANSACTION; \
                 LET $users = UPDATE type::record('user', $user_id) SET \
                     deleted_at = time::now(), updated_at = time::now() \
                     WHERE school_id = $school_id AND deleted_at = NONE; \
                 IF array::len($users) == 0 {{ THROW '{WRONG_STATE}' }}; \
                 IF $expires_at != NONE {{ \
                     CREATE type::record('user_trash', $trash_id) SET \
                         user_id = $user_id, \
                         school_id = $school_id, \
                         deleted_at = time::now(), \
                         expires_at = $expires_at; \
                 }}; \
                 COMMIT TRANSACTION;"
            ))
            .bind(("user_id", user_id.to_string()))
            .bind(("school_id", school_id.to_string()))
            .bind(("trash_id", trash_id.to_string()))
            .bind(("expires_at", trash_expires_at))
            .await
            .map_err(DbError::from)?;

        map_transition_result(result)
    }

    async fn restore_user(&self, school_id: Uuid, user_id: Uuid) -> ScholaResult<bool> {
        let result = self
            .db
            .query(format!(
                "BEGIN TRANSACTION; \
                 LET $users = UPDATE type::record('user', $user_id) SET \
                     deleted_at = NONE, updated_at = time::now() \
                     WHERE school_id = $school_id AND deleted_at != NONE; \
                 IF array::len($users) == 0 {{ THROW '{WRONG_STATE}' }}; \
                 DELETE user_trash WHERE user_id = $user_id; \
                 COMMIT TRANSACTION;"
            ))
            .bind(("user_id", user_id.to_string()))
            .bind(("school_id", school_id.to_string()))
            .await
            .map_err(DbError::from)?;

        map_transition_result(result)
    }

    async fn find_by_user(&self, user_id: Uuid) -> ScholaResult<Option<TrashRecord>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user_trash \
                 WHERE user_id = $user_id",
            )
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TrashRowWithId> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.try_into_record()?)),
            None => Ok(None),
        }
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> ScholaResult<Vec<TrashRecord>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user_trash \
                 WHERE expires_at <= $now \
                 ORDER BY expires_at ASC",
            )
            .bind(("now", now))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<TrashRowWithId> = result.take(0).map_err(DbError::from)?;
        let records = rows
            .into_iter()
            .map(|row| row.try_into_record())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(records)
    }

    async fn purge(&self, record: &TrashRecord) -> ScholaResult<()> {
        // Referential cleanup lives here, not in the retention logic:
        // memberships and codes tied to the identity go with it.
        self.db
            .query(
                "BEGIN TRANSACTION; \
                 DELETE type::record('user', $user_id); \
                 DELETE class_enrollment WHERE student_id = $user_id; \
                 DELETE class_assignment WHERE teacher_id = $user_id; \
                 DELETE classroom_student WHERE student_id = $user_id; \
                 DELETE classroom_teacher WHERE teacher_id = $user_id; \
                 DELETE access_code WHERE invited_user_id = $user_id; \
                 DELETE type::record('user_trash', $trash_id); \
                 COMMIT TRANSACTION;",
            )
            .bind(("user_id", record.user_id.to_string()))
            .bind(("trash_id", record.id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        Ok(())
    }
}
