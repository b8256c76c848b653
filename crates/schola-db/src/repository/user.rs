//! SurrealDB implementation of [`UserRepository`].
//!
//! Password hashing uses Argon2id with OWASP-recommended parameters
//! (memory: 19 MiB, iterations: 2, parallelism: 1). Salt is randomly
//! generated per hash. An optional pepper (server-side secret) can be
//! provided at construction time.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use chrono::{DateTime, Utc};
use schola_core::error::{ScholaError, ScholaResult};
use schola_core::models::user::{CreateUser, StudentNumberSource, UpdateUser, User, UserRole};
use schola_core::repository::UserRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
pub(crate) struct UserRow {
    school_id: String,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    role: String,
    is_active: bool,
    deleted_at: Option<DateTime<Utc>>,
    student_number: Option<String>,
    student_number_source: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
pub(crate) struct UserRowWithId {
    record_id: String,
    school_id: String,
    email: String,
    password_hash: String,
    first_name: String,
    last_name: String,
    role: String,
    is_active: bool,
    deleted_at: Option<DateTime<Utc>>,
    student_number: Option<String>,
    student_number_source: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

pub(crate) fn parse_role(s: &str) -> Result<UserRole, DbError> {
    match s {
        "Admin" => Ok(UserRole::Admin),
        "Teacher" => Ok(UserRole::Teacher),
        "Student" => Ok(UserRole::Student),
        other => Err(DbError::Migration(format!("unknown user role: {other}"))),
    }
}

pub(crate) fn role_to_string(r: UserRole) -> &'static str {
    match r {
        UserRole::Admin => "Admin",
        UserRole::Teacher => "Teacher",
        UserRole::Student => "Student",
    }
}

fn parse_number_source(s: Option<&str>) -> Result<Option<StudentNumberSource>, DbError> {
    match s {
        None => Ok(None),
        Some("Auto") => Ok(Some(StudentNumberSource::Auto)),
        Some("Manual") => Ok(Some(StudentNumberSource::Manual)),
        Some(other) => Err(DbError::Migration(format!(
            "unknown student number source: {other}"
        ))),
    }
}

pub(crate) fn number_source_to_string(s: StudentNumberSource) -> &'static str {
    match s {
        StudentNumberSource::Auto => "Auto",
        StudentNumberSource::Manual => "Manual",
    }
}

impl UserRow {
    pub(crate) fn into_user(self, id: Uuid) -> Result<User, DbError> {
        let school_id = Uuid::parse_str(&self.school_id)
            .map_err(|e| DbError::Migration(format!("invalid school UUID: {e}")))?;
        Ok(User {
            id,
            school_id,
            email: self.email,
            password_hash: self.password_hash,
            first_name: self.first_name,
            last_name: self.last_name,
            role: parse_role(&self.role)?,
            is_active: self.is_active,
            deleted_at: self.deleted_at,
            student_number: self.student_number,
            student_number_source: parse_number_source(self.student_number_source.as_deref())?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl UserRowWithId {
    pub(crate) fn try_into_user(self) -> Result<User, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Migration(format!("invalid UUID: {e}")))?;
        let school_id = Uuid::parse_str(&self.school_id)
            .map_err(|e| DbError::Migration(format!("invalid school UUID: {e}")))?;
        Ok(User {
            id,
            school_id,
            email: self.email,
            password_hash: self.password_hash,
            first_name: self.first_name,
            last_name: self.last_name,
            role: parse_role(&self.role)?,
            is_active: self.is_active,
            deleted_at: self.deleted_at,
            student_number: self.student_number,
            student_number_source: parse_number_source(self.student_number_source.as_deref())?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Hash a password with Argon2id using OWASP-recommended parameters.
///
/// If a pepper is provided, it is prepended to the password before
/// hashing. The salt is randomly generated for each call.
pub(crate) fn hash_password(password: &str, pepper: Option<&str>) -> Result<String, DbError> {
    // OWASP ASVS recommended: m=19456 (19 MiB), t=2, p=1
    let params = argon2::Params::new(19456, 2, 1, None)
        .map_err(|e| DbError::Migration(format!("argon2 params error: {e}")))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let peppered: String;
    let input = match pepper {
        Some(p) => {
            peppered = format!("{p}{password}");
            peppered.as_bytes()
        }
        None => password.as_bytes(),
    };

    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let hash = argon2
        .hash_password(input, &salt)
        .map_err(|e| DbError::Migration(format!("password hash error: {e}")))?;

    Ok(hash.to_string())
}

/// Whether a SurrealDB error reports an optimistic transaction
/// conflict rather than a statement failure. Guarded transactions
/// treat a conflict as "the concurrent writer won", not as an error.
pub(crate) fn is_transaction_conflict(msg: &str) -> bool {
    msg.contains("failed transaction") || msg.contains("read or write conflict")
}

/// Map a write failure onto the email-uniqueness conflict when the
/// unique index rejected the row; everything else is a database error.
pub(crate) fn map_write_error(e: surrealdb::Error, email: &str) -> ScholaError {
    let msg = e.to_string();
    if msg.contains("idx_user_email") {
        ScholaError::DuplicateEmail {
            email: email.to_string(),
        }
    } else {
        DbError::Migration(msg).into()
    }
}

/// SurrealDB implementation of the User repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
    /// Optional server-side pepper for password hashing.
    pepper: Option<String>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db, pepper: None }
    }

    pub fn with_pepper(db: Surreal<C>, pepper: String) -> Self {
        Self {
            db,
            pepper: Some(pepper),
        }
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: CreateUser) -> ScholaResult<User> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let school_id_str = input.school_id.to_string();

        let password_hash = hash_password(&input.password, self.pepper.as_deref())?;

        let result = self
            .db
            .query(
                "CREATE type::record('user', $id) SET \
                 school_id = $school_id, \
                 email = $email, \
                 password_hash = $password_hash, \
                 first_name = $first_name, \
                 last_name = $last_name, \
                 role = $role, \
                 is_active = $is_active, \
                 deleted_at = NONE, \
                 student_number = $student_number, \
                 student_number_source = $student_number_source",
            )
            .bind(("id", id_str.clone()))
            .bind(("school_id", school_id_str))
            .bind(("email", input.email.clone()))
            .bind(("password_hash", password_hash))
            .bind(("first_name", input.first_name))
            .bind(("last_name", input.last_name))
            .bind(("role", role_to_string(input.role).to_string()))
            .bind(("is_active", input.is_active))
            .bind(("student_number", input.student_number))
            .bind((
                "student_number_source",
                input
                    .student_number_source
                    .map(|s| number_source_to_string(s).to_string()),
            ))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(|e| map_write_error(e, &input.email))?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.into_user(id)?)
    }

    async fn get_by_id(&self, school_id: Uuid, id: Uuid) -> ScholaResult<User> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT * FROM type::record('user', $id) \
                 WHERE school_id = $school_id",
            )
            .bind(("id", id_str.clone()))
            .bind(("school_id", school_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.into_user(id)?)
    }

    async fn find_by_email(&self, email: &str) -> ScholaResult<Option<User>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE email = $email",
            )
            .bind(("email", email.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.try_into_user()?)),
            None => Ok(None),
        }
    }

    async fn find_by_emails(&self, emails: &[String]) -> ScholaResult<Vec<User>> {
        if emails.is_empty() {
            return Ok(Vec::new());
        }

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE email IN $emails",
            )
            .bind(("emails", emails.to_vec()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;
        let users = rows
            .into_iter()
            .map(|row| row.try_into_user())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(users)
    }

    async fn find_by_student_number(
        &self,
        school_id: Uuid,
        student_number: &str,
    ) -> ScholaResult<Option<User>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE school_id = $school_id \
                 AND student_number = $student_number",
            )
            .bind(("school_id", school_id.to_string()))
            .bind(("student_number", student_number.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(row.try_into_user()?)),
            None => Ok(None),
        }
    }

    async fn list_student_numbers_with_prefix(
        &self,
        school_id: Uuid,
        prefix: &str,
    ) -> ScholaResult<Vec<String>> {
        // Only the auto-allocated family participates in sequence
        // derivation; admin-supplied numbers are a disjoint namespace.
        let mut result = self
            .db
            .query(
                "SELECT VALUE student_number FROM user \
                 WHERE school_id = $school_id \
                 AND student_number != NONE \
                 AND student_number_source = 'Auto' \
                 AND string::starts_with(student_number, $prefix)",
            )
            .bind(("school_id", school_id.to_string()))
            .bind(("prefix", prefix.to_string()))
            .await
            .map_err(DbError::from)?;

        let numbers: Vec<String> = result.take(0).map_err(DbError::from)?;
        Ok(numbers)
    }

    async fn update(&self, school_id: Uuid, id: Uuid, input: UpdateUser) -> ScholaResult<User> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.email.is_some() {
            sets.push("email = $email");
        }
        if input.password.is_some() {
            sets.push("password_hash = $password_hash");
        }
        if input.first_name.is_some() {
            sets.push("first_name = $first_name");
        }
        if input.last_name.is_some() {
            sets.push("last_name = $last_name");
        }
        if input.is_active.is_some() {
            sets.push("is_active = $is_active");
        }
        if input.deleted_at.is_some() {
            sets.push("deleted_at = $deleted_at");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('user', $id) SET {} \
             WHERE school_id = $school_id",
            sets.join(", ")
        );

        let email_for_error = input.email.clone().unwrap_or_default();

        let mut builder = self
            .db
            .query(&query)
            .bind(("id", id_str.clone()))
            .bind(("school_id", school_id.to_string()));

        if let Some(email) = input.email {
            builder = builder.bind(("email", email));
        }
        if let Some(password) = input.password {
            let password_hash = hash_password(&password, self.pepper.as_deref())?;
            builder = builder.bind(("password_hash", password_hash));
        }
        if let Some(first_name) = input.first_name {
            builder = builder.bind(("first_name", first_name));
        }
        if let Some(last_name) = input.last_name {
            builder = builder.bind(("last_name", last_name));
        }
        if let Some(is_active) = input.is_active {
            builder = builder.bind(("is_active", is_active));
        }
        if let Some(deleted_at) = input.deleted_at {
            // deleted_at is Option<Option<..>>: Some(Some(t)) = set, Some(None) = clear
            builder = builder.bind(("deleted_at", deleted_at));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| map_write_error(e, &email_for_error))?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.into_user(id)?)
    }

    async fn delete(&self, school_id: Uuid, id: Uuid) -> ScholaResult<()> {
        self.db
            .query(
                "DELETE type::record('user', $id) \
                 WHERE school_id = $school_id",
            )
            .bind(("id", id.to_string()))
            .bind(("school_id", school_id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }
}

/// Verify a password against an Argon2id hash.
///
/// Public for use by callers that authenticate against stored
/// credentials.
pub fn verify_password(password: &str, hash: &str, pepper: Option<&str>) -> Result<bool, DbError> {
    use argon2::PasswordVerifier;

    let peppered: String;
    let input = match pepper {
        Some(p) => {
            peppered = format!("{p}{password}");
            peppered.as_bytes()
        }
        None => password.as_bytes(),
    };

    let parsed_hash = argon2::PasswordHash::new(hash)
        .map_err(|e| DbError::Migration(format!("invalid hash format: {e}")))?;

    let argon2 = Argon2::default();
    match argon2.verify_password(input, &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(DbError::Migration(format!("verify error: {e}"))),
    }
}
