//! SurrealDB implementation of [`AccessCodeRepository`].
//!
//! Code consumption pairs the "mark used" mutation with the identity
//! mutation (activate-existing or create-new) inside a single SurrealDB
//! transaction: a `THROW` cancels the whole unit when the code is
//! already used, expired, or missing, so a half-consumed code is never
//! observable.

use chrono::{DateTime, Utc};
use schola_core::error::{ScholaError, ScholaResult};
use schola_core::models::access_code::{AccessCode, CreateAccessCode};
use schola_core::models::user::{CreateUser, User};
use schola_core::repository::AccessCodeRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

use super::user::{
    UserRow, hash_password, is_transaction_conflict, map_write_error, role_to_string,
};

/// Sentinel thrown inside consumption transactions when the code is
/// not available; cancels the transaction.
const CODE_UNAVAILABLE: &str = "code-unavailable";

#[derive(Debug, SurrealValue)]
struct CodeRow {
    code: String,
    school_id: String,
    created_by_id: String,
    invited_user_id: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    is_used: bool,
    used_by_id: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct CodeRowWithId {
    record_id: String,
    code: String,
    school_id: String,
    created_by_id: String,
    invited_user_id: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    is_used: bool,
    used_by_id: Option<String>,
    created_at: DateTime<Utc>,
}

fn parse_opt_uuid(s: Option<String>, what: &str) -> Result<Option<Uuid>, DbError> {
    match s {
        None => Ok(None),
        Some(raw) => Uuid::parse_str(&raw)
            .map(Some)
            .map_err(|e| DbError::Migration(format!("invalid {what} UUID: {e}"))),
    }
}

impl CodeRow {
    fn into_access_code(self, id: Uuid) -> Result<AccessCode, DbError> {
        let school_id = Uuid::parse_str(&self.school_id)
            .map_err(|e| DbError::Migration(format!("invalid school UUID: {e}")))?;
        let created_by_id = Uuid::parse_str(&self.created_by_id)
            .map_err(|e| DbError::Migration(format!("invalid creator UUID: {e}")))?;
        Ok(AccessCode {
            id,
            code: self.code,
            school_id,
            created_by_id,
            invited_user_id: parse_opt_uuid(self.invited_user_id, "invited user")?,
            expires_at: self.expires_at,
            is_used: self.is_used,
            used_by_id: parse_opt_uuid(self.used_by_id, "consumer")?,
            created_at: self.created_at,
        })
    }
}

impl CodeRowWithId {
    fn try_into_access_code(self) -> Result<AccessCode, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Migration(format!("invalid UUID: {e}")))?;
        CodeRow {
            code: self.code,
            school_id: self.school_id,
            created_by_id: self.created_by_id,
            invited_user_id: self.invited_user_id,
            expires_at: self.expires_at,
            is_used: self.is_used,
            used_by_id: self.used_by_id,
            created_at: self.created_at,
        }
        .into_access_code(id)
    }
}

/// SurrealDB implementation of the AccessCode repository.
#[derive(Clone)]
pub struct SurrealAccessCodeRepository<C: Connection> {
    db: Surreal<C>,
    /// Optional server-side pepper for password hashing.
    pepper: Option<String>,
}

impl<C: Connection> SurrealAccessCodeRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db, pepper: None }
    }

    pub fn with_pepper(db: Surreal<C>, pepper: String) -> Self {
        Self {
            db,
            pepper: Some(pepper),
        }
    }

    /// Fetch a user by id after a successful consumption transaction.
    async fn fetch_user(&self, user_id: Uuid) -> ScholaResult<User> {
        let id_str = user_id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('user', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.into_user(user_id)?)
    }
}

/// Map a consumption transaction failure: the sentinel throw becomes
/// the deliberately vague invalid-or-expired error. A transaction
/// conflict means a concurrent consumer spent the code first, which
/// must look exactly like any other unavailable code.
fn map_consume_error(e: surrealdb::Error, email: &str) -> ScholaError {
    let msg = e.to_string();
    if msg.contains(CODE_UNAVAILABLE) || is_transaction_conflict(&msg) {
        ScholaError::InvalidOrExpiredCode
    } else {
        map_write_error(e, email)
    }
}

impl<C: Connection> AccessCodeRepository for SurrealAccessCodeRepository<C> {
    async fn create(&self, input: CreateAccessCode) -> ScholaResult<AccessCode> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('access_code', $id) SET \
                 code = $code, \
                 school_id = $school_id, \
                 created_by_id = $created_by_id, \
                 invited_user_id = $invited_user_id, \
                 expires_at = $expires_at, \
                 is_used = false, \
                 used_by_id = NONE",
            )
            .bind(("id", id_str.clone()))
            .bind(("code", input.code))
            .bind(("school_id", input.school_id.to_string()))
            .bind(("created_by_id", input.created_by_id.to_string()))
            .bind((
                "invited_user_id",
                input.invited_user_id.map(|u| u.to_string()),
            ))
            .bind(("expires_at", input.expires_at))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::Migration(e.to_string()))?;

        let rows: Vec<CodeRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "access_code".into(),
            id: id_str,
        })?;

        Ok(row.into_access_code(id)?)
    }

    async fn find_by_code(&self, code: &str) -> ScholaResult<Option<AccessCode>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM access_code \
                 WHERE code = $code",
            )
            .bind(("code", code.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CodeRowWithId> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.try_into_access_code()?)),
            None => Ok(None),
        }
    }

    async fn consume_for_activation(
        &self,
        code: &str,
        user_id: Uuid,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> ScholaResult<User> {
        let password_hash = hash_password(password, self.pepper.as_deref())?;

        let result = self
            .db
            .query(format!(
                "BEGIN TRANSACTION; \
                 LET $codes = UPDATE access_code SET \
                     is_used = true, used_by_id = $user_id \
                     WHERE code = $code AND is_used = false \
                     AND (expires_at = NONE OR expires_at > time::now()); \
                 IF array::len($codes) == 0 {{ THROW '{CODE_UNAVAILABLE}' }}; \
                 UPDATE type::record('user', $user_id) SET \
                     is_active = true, \
                     password_hash = $password_hash, \
                     first_name = $first_name, \
                     last_name = $last_name, \
                     updated_at = time::now(); \
                 COMMIT TRANSACTION;"
            ))
            .bind(("code", code.to_string()))
            .bind(("user_id", user_id.to_string()))
            .bind(("password_hash", password_hash))
            .bind(("first_name", first_name.to_string()))
            .bind(("last_name", last_name.to_string()))
            .await
            .map_err(DbError::from)?;

        result.check().map_err(|e| map_consume_error(e, ""))?;

        self.fetch_user(user_id).await
    }

    async fn consume_for_registration(&self, code: &str, input: CreateUser) -> ScholaResult<User> {
        let user_id = Uuid::new_v4();
        let password_hash = hash_password(&input.password, self.pepper.as_deref())?;

        // Only unbound codes may register a brand-new identity.
        let result = self
            .db
            .query(format!(
                "BEGIN TRANSACTION; \
                 LET $codes = UPDATE access_code SET \
                     is_used = true, used_by_id = $user_id \
                     WHERE code = $code AND is_used = false \
                     AND invited_user_id = NONE \
                     AND (expires_at = NONE OR expires_at > time::now()); \
                 IF array::len($codes) == 0 {{ THROW '{CODE_UNAVAILABLE}' }}; \
                 CREATE type::record('user', $user_id) SET \
                     school_id = $school_id, \
                     email = $email, \
                     password_hash = $password_hash, \
                     first_name = $first_name, \
                     last_name = $last_name, \
                     role = $role, \
                     is_active = $is_active, \
                     deleted_at = NONE, \
                     student_number = NONE, \
                     student_number_source = NONE; \
                 COMMIT TRANSACTION;"
            ))
            .bind(("code", code.to_string()))
            .bind(("user_id", user_id.to_string()))
            .bind(("school_id", input.school_id.to_string()))
            .bind(("email", input.email.clone()))
            .bind(("password_hash", password_hash))
            .bind(("first_name", input.first_name))
            .bind(("last_name", input.last_name))
            .bind(("role", role_to_string(input.role).to_string()))
            .bind(("is_active", input.is_active))
            .await
            .map_err(DbError::from)?;

        result
            .check()
            .map_err(|e| map_consume_error(e, &input.email))?;

        self.fetch_user(user_id).await
    }
}
