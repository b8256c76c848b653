//! Soft-delete, restore, and the retention sweep.
//!
//! Deleting a user moves it to the trash: the identity keeps its row
//! (email and student number stay reserved) but is excluded from live
//! queries. Roles with a retention window get a trash record whose
//! expiry drives the sweep; roles without one stay in the trash until
//! restored.

use chrono::Utc;
use schola_core::error::{ScholaError, ScholaResult};
use schola_core::repository::{TrashRepository, UserRepository};
use uuid::Uuid;

use crate::config::RetentionPolicy;

/// Soft-delete lifecycle for user identities.
#[derive(Clone)]
pub struct RetentionService<U, T> {
    users: U,
    trash: T,
    policy: RetentionPolicy,
}

impl<U, T> RetentionService<U, T>
where
    U: UserRepository,
    T: TrashRepository,
{
    pub fn new(users: U, trash: T, policy: RetentionPolicy) -> Self {
        Self {
            users,
            trash,
            policy,
        }
    }

    /// Move a live user to the trash. Absent and already-trashed users
    /// both report `NotFound`; the role's retention window decides
    /// whether a purge deadline is recorded.
    pub async fn soft_delete(&self, school_id: Uuid, user_id: Uuid) -> ScholaResult<()> {
        let user = self.users.get_by_id(school_id, user_id).await?;
        let expires_at = self
            .policy
            .window_for(user.role)
            .map(|window| Utc::now() + window);

        let deleted = self
            .trash
            .soft_delete_user(school_id, user_id, expires_at)
            .await?;
        if !deleted {
            return Err(ScholaError::NotFound {
                entity: "user".into(),
                id: user_id.to_string(),
            });
        }
        tracing::info!(%school_id, %user_id, ?expires_at, "user moved to trash");
        Ok(())
    }

    /// Bring a trashed user back. `NotFound` when the user is absent or
    /// not in the trash.
    pub async fn restore(&self, school_id: Uuid, user_id: Uuid) -> ScholaResult<()> {
        let restored = self.trash.restore_user(school_id, user_id).await?;
        if !restored {
            return Err(ScholaError::NotFound {
                entity: "user".into(),
                id: user_id.to_string(),
            });
        }
        tracing::info!(%school_id, %user_id, "user restored from trash");
        Ok(())
    }

    /// Permanently purge every trash record past its deadline. Each
    /// purge is its own transaction, so a failure mid-sweep leaves the
    /// remainder for the next run; running with nothing expired is a
    /// no-op. Returns the number of identities purged.
    pub async fn sweep(&self) -> ScholaResult<usize> {
        let expired = self.trash.list_expired(Utc::now()).await?;
        let total = expired.len();
        for record in &expired {
            self.trash.purge(record).await?;
            tracing::debug!(user_id = %record.user_id, "purged expired trash record");
        }
        if total > 0 {
            tracing::info!(purged = total, "retention sweep finished");
        }
        Ok(total)
    }
}
