//! Trash record domain model.
//!
//! Tracks soft-deleted identities whose role carries a retention
//! window. Once `expires_at` passes, the sweep purges the record
//! together with the underlying identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrashRecord {
    pub id: Uuid,
    /// The soft-deleted identity. At most one trash record per user.
    pub user_id: Uuid,
    pub school_id: Uuid,
    pub deleted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
