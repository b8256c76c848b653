//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. School-scoped repositories
//! require a `school_id` parameter to enforce tenant isolation; the
//! exceptions are the email lookups on [`UserRepository`], which are
//! global because email uniqueness is global.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::ScholaResult;
use crate::models::{
    access_code::{AccessCode, CreateAccessCode},
    membership::{Class, Classroom, CreateClass, CreateClassroom},
    school::{CreateSchool, School},
    trash::TrashRecord,
    user::{CreateUser, UpdateUser, User},
};

pub trait SchoolRepository: Send + Sync {
    fn create(&self, input: CreateSchool) -> impl Future<Output = ScholaResult<School>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = ScholaResult<School>> + Send;
}

pub trait UserRepository: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = ScholaResult<User>> + Send;
    fn get_by_id(
        &self,
        school_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = ScholaResult<User>> + Send;
    /// Global lookup — email uniqueness spans all schools.
    fn find_by_email(&self, email: &str) -> impl Future<Output = ScholaResult<Option<User>>> + Send;
    /// Bulk lookup used by import pre-resolution; a single query keyed
    /// by the set of emails.
    fn find_by_emails(
        &self,
        emails: &[String],
    ) -> impl Future<Output = ScholaResult<Vec<User>>> + Send;
    fn find_by_student_number(
        &self,
        school_id: Uuid,
        student_number: &str,
    ) -> impl Future<Output = ScholaResult<Option<User>>> + Send;
    /// All auto-family candidate numbers for one school starting with
    /// `prefix` (e.g. `"2026-"`). Suffix filtering happens in the
    /// allocator; this is only the raw scan.
    fn list_student_numbers_with_prefix(
        &self,
        school_id: Uuid,
        prefix: &str,
    ) -> impl Future<Output = ScholaResult<Vec<String>>> + Send;
    fn update(
        &self,
        school_id: Uuid,
        id: Uuid,
        input: UpdateUser,
    ) -> impl Future<Output = ScholaResult<User>> + Send;
    /// Hard delete. Only the retention purge calls this.
    fn delete(&self, school_id: Uuid, id: Uuid) -> impl Future<Output = ScholaResult<()>> + Send;
}

pub trait AccessCodeRepository: Send + Sync {
    fn create(
        &self,
        input: CreateAccessCode,
    ) -> impl Future<Output = ScholaResult<AccessCode>> + Send;
    fn find_by_code(
        &self,
        code: &str,
    ) -> impl Future<Output = ScholaResult<Option<AccessCode>>> + Send;
    /// Atomically mark an available code used and activate the bound
    /// identity (set active, store the real credential, update names,
    /// record the consumer). Both mutations are one transaction: if the
    /// code is already used or expired nothing changes and
    /// `InvalidOrExpiredCode` is returned.
    fn consume_for_activation(
        &self,
        code: &str,
        user_id: Uuid,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> impl Future<Output = ScholaResult<User>> + Send;
    /// Atomically mark an available unbound code used and create a new
    /// identity in the code's school, recording it as the consumer.
    /// Same transactional guarantee as [`consume_for_activation`].
    ///
    /// [`consume_for_activation`]: AccessCodeRepository::consume_for_activation
    fn consume_for_registration(
        &self,
        code: &str,
        input: CreateUser,
    ) -> impl Future<Output = ScholaResult<User>> + Send;
}

pub trait TrashRepository: Send + Sync {
    /// Soft-delete a live user: set `deleted_at` and, when
    /// `trash_expires_at` is given, create the trash record in the same
    /// transaction. Returns `false` if the user is absent or already
    /// trashed.
    fn soft_delete_user(
        &self,
        school_id: Uuid,
        user_id: Uuid,
        trash_expires_at: Option<DateTime<Utc>>,
    ) -> impl Future<Output = ScholaResult<bool>> + Send;
    /// Restore a trashed user: clear `deleted_at` and drop the trash
    /// record if present. Returns `false` if the user is absent or not
    /// trashed.
    fn restore_user(
        &self,
        school_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = ScholaResult<bool>> + Send;
    fn find_by_user(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = ScholaResult<Option<TrashRecord>>> + Send;
    fn list_expired(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = ScholaResult<Vec<TrashRecord>>> + Send;
    /// Permanently delete the underlying identity, its dependent rows
    /// (memberships, bound codes), and the trash record itself, as one
    /// transaction.
    fn purge(&self, record: &TrashRecord) -> impl Future<Output = ScholaResult<()>> + Send;
}

/// Per-(school, year) student number sequence.
///
/// `increment` is a single atomic statement at the storage layer, so
/// concurrent allocations for the same school and year cannot observe
/// the same value.
pub trait SequenceRepository: Send + Sync {
    /// Increment and return the counter, or `None` if no counter exists
    /// yet for this school/year.
    fn increment(
        &self,
        school_id: Uuid,
        year: i32,
    ) -> impl Future<Output = ScholaResult<Option<u32>>> + Send;
    /// Create the counter seeded at `value`, returning it. `None` means
    /// a concurrent initializer won; callers should retry `increment`.
    fn initialize(
        &self,
        school_id: Uuid,
        year: i32,
        value: u32,
    ) -> impl Future<Output = ScholaResult<Option<u32>>> + Send;
}

pub trait MembershipRepository: Send + Sync {
    fn create_class(&self, input: CreateClass) -> impl Future<Output = ScholaResult<Class>> + Send;
    fn create_classroom(
        &self,
        input: CreateClassroom,
    ) -> impl Future<Output = ScholaResult<Classroom>> + Send;
    fn find_class(
        &self,
        school_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = ScholaResult<Option<Class>>> + Send;
    fn find_classroom(
        &self,
        school_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = ScholaResult<Option<Classroom>>> + Send;
    /// Attach operations return `false` when the attachment already
    /// existed (counted as skipped by the importer, never an error).
    fn enroll_student_in_class(
        &self,
        class_id: Uuid,
        student_id: Uuid,
    ) -> impl Future<Output = ScholaResult<bool>> + Send;
    fn assign_teacher_to_class(
        &self,
        class_id: Uuid,
        teacher_id: Uuid,
    ) -> impl Future<Output = ScholaResult<bool>> + Send;
    fn add_student_to_classroom(
        &self,
        classroom_id: Uuid,
        student_id: Uuid,
    ) -> impl Future<Output = ScholaResult<bool>> + Send;
    fn add_teacher_to_classroom(
        &self,
        classroom_id: Uuid,
        teacher_id: Uuid,
    ) -> impl Future<Output = ScholaResult<bool>> + Send;
}
