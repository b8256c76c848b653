//! Membership attachment targets for bulk import.
//!
//! An import batch optionally attaches every row to one target (a
//! class or a classroom). The role decides which association table an
//! attachment lands in; the pairing is picked once per batch, not per
//! row.

use schola_core::error::{ScholaError, ScholaResult};
use schola_core::repository::MembershipRepository;
use uuid::Uuid;

/// Which side of an association a member joins as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipKind {
    Student,
    Teacher,
}

/// What a batch attaches its members to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipTarget {
    Class(Uuid),
    Classroom(Uuid),
}

/// Fail with `NotFound` unless the target exists in `school_id`.
pub(crate) async fn validate_target<M: MembershipRepository>(
    memberships: &M,
    school_id: Uuid,
    target: MembershipTarget,
) -> ScholaResult<()> {
    let found = match target {
        MembershipTarget::Class(id) => memberships.find_class(school_id, id).await?.is_some(),
        MembershipTarget::Classroom(id) => {
            memberships.find_classroom(school_id, id).await?.is_some()
        }
    };
    if found {
        Ok(())
    } else {
        let (entity, id) = match target {
            MembershipTarget::Class(id) => ("class", id),
            MembershipTarget::Classroom(id) => ("classroom", id),
        };
        Err(ScholaError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        })
    }
}

/// One (kind, repository) pairing reused for every row of a batch.
pub(crate) struct MembershipAttacher<'a, M> {
    kind: MembershipKind,
    memberships: &'a M,
}

impl<'a, M: MembershipRepository> MembershipAttacher<'a, M> {
    pub(crate) fn new(kind: MembershipKind, memberships: &'a M) -> Self {
        Self { kind, memberships }
    }

    /// Attach `member_id` to `target`. `false` means the attachment
    /// already existed.
    pub(crate) async fn attach(
        &self,
        target: MembershipTarget,
        member_id: Uuid,
    ) -> ScholaResult<bool> {
        match (self.kind, target) {
            (MembershipKind::Student, MembershipTarget::Class(id)) => {
                self.memberships.enroll_student_in_class(id, member_id).await
            }
            (MembershipKind::Teacher, MembershipTarget::Class(id)) => {
                self.memberships.assign_teacher_to_class(id, member_id).await
            }
            (MembershipKind::Student, MembershipTarget::Classroom(id)) => {
                self.memberships
                    .add_student_to_classroom(id, member_id)
                    .await
            }
            (MembershipKind::Teacher, MembershipTarget::Classroom(id)) => {
                self.memberships
                    .add_teacher_to_classroom(id, member_id)
                    .await
            }
        }
    }
}
