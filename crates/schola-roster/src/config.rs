//! Roster engine configuration.

use chrono::Duration;
use schola_core::models::user::UserRole;

/// Retention windows per role, in days. `None` means the role has no
/// trash retention: soft-delete leaves no trash record and the sweep
/// never touches the identity.
///
/// Modeled as data rather than a role check so adding retention for
/// another role is a configuration change, not a code change.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    pub admin_days: Option<i64>,
    pub teacher_days: Option<i64>,
    pub student_days: Option<i64>,
}

impl RetentionPolicy {
    /// The retention window for a role, if it has one.
    pub fn window_for(&self, role: UserRole) -> Option<Duration> {
        let days = match role {
            UserRole::Admin => self.admin_days,
            UserRole::Teacher => self.teacher_days,
            UserRole::Student => self.student_days,
        };
        days.map(Duration::days)
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            admin_days: None,
            teacher_days: None,
            student_days: Some(30),
        }
    }
}

/// Configuration for the roster engine services.
#[derive(Debug, Clone)]
pub struct RosterConfig {
    /// Length of generated access codes (default: 8).
    pub code_length: usize,
    /// Access code lifetime in days (default: 7).
    pub code_ttl_days: i64,
    /// Retention windows per role.
    pub retention: RetentionPolicy,
    /// Domain used for synthesized student email addresses.
    pub placeholder_email_domain: String,
    /// Maximum row errors reported verbatim at the transport boundary;
    /// the rest are collapsed into an omitted count.
    pub max_reported_row_errors: usize,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            code_length: 8,
            code_ttl_days: 7,
            retention: RetentionPolicy::default(),
            placeholder_email_domain: "roster.invalid".into(),
            max_reported_row_errors: 5,
        }
    }
}
