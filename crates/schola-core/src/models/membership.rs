//! Class and classroom domain models.
//!
//! Classes and classrooms are the two membership targets a roster
//! import (or single creation) can attach an identity to. Students
//! enroll; teachers are assigned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Class {
    pub id: Uuid,
    pub school_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classroom {
    pub id: Uuid,
    pub school_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Fields required to create a class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateClass {
    pub school_id: Uuid,
    pub name: String,
}

/// Fields required to create a classroom.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateClassroom {
    pub school_id: Uuid,
    pub name: String,
}
