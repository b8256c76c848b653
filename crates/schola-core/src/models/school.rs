//! School domain model.
//!
//! A school is the multi-tenancy anchor: every identity, access code,
//! class, and trash record belongs to exactly one school.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A school is an isolated organization using the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct School {
    pub id: Uuid,
    /// Human-readable name.
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a new school.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSchool {
    pub name: String,
}
