//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode for data integrity.
//! UUIDs are stored as strings. Enums are stored as strings with
//! ASSERT constraints for validation.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial_schema",
        sql: SCHEMA_V1,
    },
    Migration {
        version: 2,
        name: "access_code_invited_user",
        sql: SCHEMA_V2,
    },
];

// -----------------------------------------------------------------------
// Schema v1 — initial table definitions
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Schools (the multi-tenancy anchor)
-- =======================================================================
DEFINE TABLE school SCHEMAFULL;
DEFINE FIELD name ON TABLE school TYPE string;
DEFINE FIELD created_at ON TABLE school TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE school TYPE datetime \
    DEFAULT time::now();

-- =======================================================================
-- Users (admins, teachers, students — scoped to a school)
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD school_id ON TABLE user TYPE string;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD password_hash ON TABLE user TYPE string;
DEFINE FIELD first_name ON TABLE user TYPE string;
DEFINE FIELD last_name ON TABLE user TYPE string;
DEFINE FIELD role ON TABLE user TYPE string \
    ASSERT $value IN ['Admin', 'Teacher', 'Student'];
DEFINE FIELD is_active ON TABLE user TYPE bool DEFAULT true;
DEFINE FIELD deleted_at ON TABLE user TYPE option<datetime>;
DEFINE FIELD student_number ON TABLE user TYPE option<string>;
DEFINE FIELD student_number_source ON TABLE user TYPE option<string> \
    ASSERT $value == NONE OR $value IN ['Auto', 'Manual'];
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
-- Email is unique across the whole system, not per school.
DEFINE INDEX idx_user_email ON TABLE user COLUMNS email UNIQUE;
DEFINE INDEX idx_user_school_role ON TABLE user COLUMNS school_id, role;
DEFINE INDEX idx_user_school_number ON TABLE user \
    COLUMNS school_id, student_number;

-- =======================================================================
-- Access codes (single-use teacher invitations)
-- =======================================================================
DEFINE TABLE access_code SCHEMAFULL;
DEFINE FIELD code ON TABLE access_code TYPE string;
DEFINE FIELD school_id ON TABLE access_code TYPE string;
DEFINE FIELD created_by_id ON TABLE access_code TYPE string;
DEFINE FIELD expires_at ON TABLE access_code TYPE option<datetime>;
DEFINE FIELD is_used ON TABLE access_code TYPE bool DEFAULT false;
DEFINE FIELD used_by_id ON TABLE access_code TYPE option<string>;
DEFINE FIELD created_at ON TABLE access_code TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_access_code_code ON TABLE access_code \
    COLUMNS code UNIQUE;

-- =======================================================================
-- Trash records (retention for soft-deleted identities)
-- =======================================================================
DEFINE TABLE user_trash SCHEMAFULL;
DEFINE FIELD user_id ON TABLE user_trash TYPE string;
DEFINE FIELD school_id ON TABLE user_trash TYPE string;
DEFINE FIELD deleted_at ON TABLE user_trash TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD expires_at ON TABLE user_trash TYPE datetime;
DEFINE INDEX idx_user_trash_user ON TABLE user_trash \
    COLUMNS user_id UNIQUE;
DEFINE INDEX idx_user_trash_expiry ON TABLE user_trash \
    COLUMNS expires_at;

-- =======================================================================
-- Student number sequences (per school and year, atomic increment)
-- =======================================================================
DEFINE TABLE student_sequence SCHEMAFULL;
DEFINE FIELD school_id ON TABLE student_sequence TYPE string;
DEFINE FIELD year ON TABLE student_sequence TYPE int;
DEFINE FIELD value ON TABLE student_sequence TYPE int;

-- =======================================================================
-- Membership targets and association rows
-- =======================================================================
DEFINE TABLE class SCHEMAFULL;
DEFINE FIELD school_id ON TABLE class TYPE string;
DEFINE FIELD name ON TABLE class TYPE string;
DEFINE FIELD created_at ON TABLE class TYPE datetime \
    DEFAULT time::now();

DEFINE TABLE classroom SCHEMAFULL;
DEFINE FIELD school_id ON TABLE classroom TYPE string;
DEFINE FIELD name ON TABLE classroom TYPE string;
DEFINE FIELD created_at ON TABLE classroom TYPE datetime \
    DEFAULT time::now();

DEFINE TABLE class_enrollment SCHEMAFULL;
DEFINE FIELD class_id ON TABLE class_enrollment TYPE string;
DEFINE FIELD student_id ON TABLE class_enrollment TYPE string;
DEFINE FIELD joined_at ON TABLE class_enrollment TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_class_enrollment ON TABLE class_enrollment \
    COLUMNS class_id, student_id UNIQUE;

DEFINE TABLE class_assignment SCHEMAFULL;
DEFINE FIELD class_id ON TABLE class_assignment TYPE string;
DEFINE FIELD teacher_id ON TABLE class_assignment TYPE string;
DEFINE FIELD assigned_at ON TABLE class_assignment TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_class_assignment ON TABLE class_assignment \
    COLUMNS class_id, teacher_id UNIQUE;

DEFINE TABLE classroom_student SCHEMAFULL;
DEFINE FIELD classroom_id ON TABLE classroom_student TYPE string;
DEFINE FIELD student_id ON TABLE classroom_student TYPE string;
DEFINE FIELD joined_at ON TABLE classroom_student TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_classroom_student ON TABLE classroom_student \
    COLUMNS classroom_id, student_id UNIQUE;

DEFINE TABLE classroom_teacher SCHEMAFULL;
DEFINE FIELD classroom_id ON TABLE classroom_teacher TYPE string;
DEFINE FIELD teacher_id ON TABLE classroom_teacher TYPE string;
DEFINE FIELD assigned_at ON TABLE classroom_teacher TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_classroom_teacher ON TABLE classroom_teacher \
    COLUMNS classroom_id, teacher_id UNIQUE;
";

// -----------------------------------------------------------------------
// Schema v2 — bound invitations
// -----------------------------------------------------------------------

const SCHEMA_V2: &str = "\
DEFINE FIELD invited_user_id ON TABLE access_code TYPE option<string>;
DEFINE INDEX idx_access_code_invited_user ON TABLE access_code \
    COLUMNS invited_user_id;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies
/// each migration whose version exceeds the current maximum.
/// All DEFINE statements are idempotent so re-running is safe.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    // Ensure migration tracking table exists (idempotent).
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    // Determine current schema version.
    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            db.query(migration.sql).await?.check().map_err(|e| {
                DbError::Migration(format!(
                    "Migration v{} '{}' failed: {}",
                    migration.version, migration.name, e,
                ))
            })?;

            // Record the applied migration.
            db.query(
                "CREATE _migration SET version = $version, \
                 name = $name",
            )
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

            info!(
                version = migration.version,
                "Migration applied successfully"
            );
        }
    }

    Ok(())
}
