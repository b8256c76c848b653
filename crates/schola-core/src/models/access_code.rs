//! Access code domain model.
//!
//! Single-use, time-limited invitation tokens that let an invited
//! teacher activate an account in a specific school. A code may be
//! bound to a pre-created (inactive) identity; unbound codes are the
//! legacy self-registration path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessCode {
    pub id: Uuid,
    /// The raw code string handed to the invitee.
    pub code: String,
    pub school_id: Uuid,
    /// The admin who issued the invitation.
    pub created_by_id: Uuid,
    /// The pre-created identity this code activates, if any.
    pub invited_user_id: Option<Uuid>,
    /// `None` = never expires.
    pub expires_at: Option<DateTime<Utc>>,
    pub is_used: bool,
    /// The identity that consumed the code.
    pub used_by_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl AccessCode {
    /// Whether the code can still be consumed at `now`.
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        !self.is_used && self.expires_at.is_none_or(|exp| exp > now)
    }
}

/// Fields required to issue a new access code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccessCode {
    pub code: String,
    pub school_id: Uuid,
    pub created_by_id: Uuid,
    pub invited_user_id: Option<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
}
