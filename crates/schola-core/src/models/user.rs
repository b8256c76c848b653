//! User domain model.
//!
//! One unified identity type for all roles (admin, teacher, student),
//! scoped to a school. Students additionally carry a human-readable
//! student number of the form `{year}-{sequence}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum UserRole {
    Admin,
    Teacher,
    Student,
}

/// How a student number came to be: allocated by the engine or supplied
/// by an administrator. Only `Auto` numbers participate in sequence
/// derivation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StudentNumberSource {
    Auto,
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub school_id: Uuid,
    /// Unique across the whole system, not just within the school.
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub is_active: bool,
    /// `None` = live; `Some` = soft-deleted (in trash).
    pub deleted_at: Option<DateTime<Utc>>,
    /// Unique within the school when present.
    pub student_number: Option<String>,
    pub student_number_source: Option<StudentNumberSource>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A user is live when it has not been soft-deleted.
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Fields required to create a new user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub school_id: Uuid,
    pub email: String,
    /// Raw password (hashed with Argon2id before storage).
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub is_active: bool,
    pub student_number: Option<String>,
    pub student_number_source: Option<StudentNumberSource>,
}

/// Fields that can be updated on an existing user.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateUser {
    pub email: Option<String>,
    /// Raw password; hashed before storage.
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_active: Option<bool>,
    /// `Some(Some(t))` = set, `Some(None)` = clear, `None` = no change.
    pub deleted_at: Option<Option<DateTime<Utc>>>,
}
