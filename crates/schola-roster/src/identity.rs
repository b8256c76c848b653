//! Identity upsert: single-student creation with uniqueness guarantees.
//!
//! Email uniqueness is global; student number uniqueness is per school.
//! Students without an email get a synthesized placeholder address so
//! the global unique index holds for everyone.

use chrono::{Datelike, Utc};
use rand::Rng;
use schola_core::error::{ScholaError, ScholaResult};
use schola_core::models::user::{CreateUser, StudentNumberSource, User, UserRole};
use schola_core::repository::{SequenceRepository, UserRepository};
use uuid::Uuid;

use crate::codes::{generate_secret, normalize_email};
use crate::config::RosterConfig;
use crate::identifier::StudentNumberAllocator;

fn sanitize_name_part(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Build a placeholder address like `jane.doe.9f2c01ab@roster.invalid`.
/// The random tag keeps same-named students apart.
pub(crate) fn synthesize_email(first_name: &str, last_name: &str, domain: &str) -> String {
    let mut rng = rand::rng();
    let tag: [u8; 4] = rng.random();
    format!(
        "{}.{}.{}@{}",
        sanitize_name_part(first_name),
        sanitize_name_part(last_name),
        hex::encode(tag),
        domain
    )
}

#[derive(Debug, Clone)]
pub struct CreateStudentInput {
    pub school_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    /// Omitted or blank means a placeholder address is synthesized.
    pub email: Option<String>,
    /// Omitted means a throwaway credential is generated.
    pub password: Option<String>,
    /// Omitted means the next number is allocated automatically.
    pub student_number: Option<String>,
}

/// A freshly created student. `generated_password` is set only when
/// the caller supplied none; it is surfaced exactly once, here.
#[derive(Debug, Clone)]
pub struct NewStudent {
    pub user: User,
    pub generated_password: Option<String>,
}

/// Creates student identities with globally unique emails and
/// per-school unique student numbers.
#[derive(Clone)]
pub struct IdentityService<U, Q> {
    users: U,
    allocator: StudentNumberAllocator<U, Q>,
    config: RosterConfig,
}

impl<U, Q> IdentityService<U, Q>
where
    U: UserRepository + Clone,
    Q: SequenceRepository,
{
    pub fn new(users: U, sequences: Q, config: RosterConfig) -> Self {
        let allocator = StudentNumberAllocator::new(users.clone(), sequences);
        Self {
            users,
            allocator,
            config,
        }
    }

    /// Create a single student.
    ///
    /// A supplied email that is taken anywhere in the system fails with
    /// `DuplicateEmail`; a supplied student number taken within the
    /// school fails with `DuplicateIdentifier`. Nothing is written on
    /// either failure.
    pub async fn create_student(&self, input: CreateStudentInput) -> ScholaResult<NewStudent> {
        let first_name = input.first_name.trim().to_string();
        let last_name = input.last_name.trim().to_string();
        if first_name.is_empty() || last_name.is_empty() {
            return Err(ScholaError::Validation {
                message: "first and last name are required".into(),
            });
        }

        let email = match input.email.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => {
                let email = normalize_email(raw);
                if self.users.find_by_email(&email).await?.is_some() {
                    return Err(ScholaError::DuplicateEmail { email });
                }
                email
            }
            _ => self.fresh_placeholder_email(&first_name, &last_name).await?,
        };

        let generated_password = input.password.is_none().then(generate_secret);
        let password = match input.password {
            Some(p) => p,
            None => generated_password.clone().unwrap_or_default(),
        };

        let user = self
            .create_student_resolved(
                input.school_id,
                first_name,
                last_name,
                email,
                password,
                input.student_number,
            )
            .await?;

        Ok(NewStudent {
            user,
            generated_password,
        })
    }

    /// Creation body without the email existence check, for callers
    /// that already resolved emails in bulk. Handles student number
    /// provenance and allocation; the unique email index still
    /// backstops races.
    pub(crate) async fn create_student_resolved(
        &self,
        school_id: Uuid,
        first_name: String,
        last_name: String,
        email: String,
        password: String,
        student_number: Option<String>,
    ) -> ScholaResult<User> {
        let (student_number, source) = match student_number.as_deref().map(str::trim) {
            Some(number) if !number.is_empty() => {
                if self
                    .users
                    .find_by_student_number(school_id, number)
                    .await?
                    .is_some()
                {
                    return Err(ScholaError::DuplicateIdentifier {
                        identifier: number.to_string(),
                    });
                }
                (number.to_string(), StudentNumberSource::Manual)
            }
            _ => {
                let year = Utc::now().year();
                let number = self.allocator.allocate(school_id, year).await?;
                (number, StudentNumberSource::Auto)
            }
        };

        self.users
            .create(CreateUser {
                school_id,
                email,
                password,
                first_name,
                last_name,
                role: UserRole::Student,
                is_active: true,
                student_number: Some(student_number),
                student_number_source: Some(source),
            })
            .await
    }

    /// Synthesize a placeholder address that no existing identity
    /// holds. One retry covers a random tag collision.
    pub(crate) async fn fresh_placeholder_email(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> ScholaResult<String> {
        let domain = &self.config.placeholder_email_domain;
        for _ in 0..2 {
            let candidate = synthesize_email(first_name, last_name, domain);
            if self.users.find_by_email(&candidate).await?.is_none() {
                return Ok(candidate);
            }
        }
        Err(ScholaError::Internal(
            "could not synthesize an unused placeholder email".into(),
        ))
    }
}
