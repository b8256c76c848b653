//! Access code ledger: teacher invitations and activation.
//!
//! Codes are short, single-use, time-limited tokens drawn from an
//! alphabet without lookalike characters. A code issued by
//! [`AccessCodeService::invite_teacher`] is bound to a pre-created
//! inactive identity; unbound codes (issued out of band) fall back to
//! self-registration on consumption.

use chrono::{Duration, Utc};
use rand::Rng;
use schola_core::error::{ScholaError, ScholaResult};
use schola_core::models::access_code::{AccessCode, CreateAccessCode};
use schola_core::models::user::{CreateUser, User, UserRole};
use schola_core::repository::{AccessCodeRepository, UserRepository};
use uuid::Uuid;

use crate::config::RosterConfig;

/// Uppercase letters and digits minus the lookalikes `0`, `O`, `1`, `I`.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Generate a random access code of `length` characters.
pub fn generate_access_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Throwaway credential for identities created without one. Replaced
/// by the invitee's real password on activation.
pub(crate) fn generate_secret() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    hex::encode(bytes)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone)]
pub struct InviteTeacherInput {
    pub school_id: Uuid,
    pub invited_by: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// Result of inviting a teacher: the inactive identity and the code
/// that will activate it. The raw code is only surfaced here.
#[derive(Debug, Clone)]
pub struct TeacherInvite {
    pub user: User,
    pub code: AccessCode,
}

#[derive(Debug, Clone)]
pub struct ActivateTeacherInput {
    pub code: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Issues and consumes teacher invitation codes.
#[derive(Clone)]
pub struct AccessCodeService<A, U> {
    codes: A,
    users: U,
    config: RosterConfig,
}

impl<A, U> AccessCodeService<A, U>
where
    A: AccessCodeRepository,
    U: UserRepository,
{
    pub fn new(codes: A, users: U, config: RosterConfig) -> Self {
        Self {
            codes,
            users,
            config,
        }
    }

    /// Invite a teacher: pre-create an inactive identity and issue a
    /// code bound to it. Fails with `DuplicateEmail` when the email is
    /// already taken anywhere in the system.
    pub async fn invite_teacher(&self, input: InviteTeacherInput) -> ScholaResult<TeacherInvite> {
        let email = normalize_email(&input.email);
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(ScholaError::DuplicateEmail { email });
        }
        self.invite_teacher_resolved(
            input.school_id,
            input.invited_by,
            email,
            input.first_name,
            input.last_name,
        )
        .await
    }

    /// Invitation body without the email existence check, for callers
    /// that already resolved the email in bulk. The unique index still
    /// backstops races.
    pub(crate) async fn invite_teacher_resolved(
        &self,
        school_id: Uuid,
        invited_by: Uuid,
        email: String,
        first_name: String,
        last_name: String,
    ) -> ScholaResult<TeacherInvite> {
        let user = self
            .users
            .create(CreateUser {
                school_id,
                email,
                password: generate_secret(),
                first_name,
                last_name,
                role: UserRole::Teacher,
                is_active: false,
                student_number: None,
                student_number_source: None,
            })
            .await?;

        let code = self
            .codes
            .create(CreateAccessCode {
                code: generate_access_code(self.config.code_length),
                school_id,
                created_by_id: invited_by,
                invited_user_id: Some(user.id),
                expires_at: Some(Utc::now() + Duration::days(self.config.code_ttl_days)),
            })
            .await?;

        tracing::info!(%school_id, user_id = %user.id, "issued teacher invitation code");
        Ok(TeacherInvite { user, code })
    }

    /// Check a code without consuming it, returning the school it
    /// belongs to. Never reveals whether a failing code is unknown,
    /// used, or expired.
    pub async fn verify(&self, code: &str) -> ScholaResult<Uuid> {
        let record = self
            .codes
            .find_by_code(code.trim())
            .await?
            .ok_or(ScholaError::InvalidOrExpiredCode)?;
        if !record.is_available(Utc::now()) {
            return Err(ScholaError::InvalidOrExpiredCode);
        }
        Ok(record.school_id)
    }

    /// Consume a code and produce an active teacher identity.
    ///
    /// Bound codes activate their pre-created identity; the submitted
    /// email must match the invitation. Unbound codes register a fresh
    /// identity in the code's school. Consumption and the identity
    /// mutation commit together, so a code can never be spent twice.
    pub async fn activate(&self, input: ActivateTeacherInput) -> ScholaResult<User> {
        let code = input.code.trim().to_string();
        let record = self
            .codes
            .find_by_code(&code)
            .await?
            .ok_or(ScholaError::InvalidOrExpiredCode)?;
        if !record.is_available(Utc::now()) {
            return Err(ScholaError::InvalidOrExpiredCode);
        }

        let email = normalize_email(&input.email);
        match record.invited_user_id {
            Some(invited_id) => {
                let invited = self
                    .users
                    .get_by_id(record.school_id, invited_id)
                    .await
                    .map_err(|_| ScholaError::InvalidOrExpiredCode)?;
                // The code only works for the address it was sent to.
                if normalize_email(&invited.email) != email {
                    return Err(ScholaError::InvalidOrExpiredCode);
                }
                self.codes
                    .consume_for_activation(
                        &code,
                        invited_id,
                        &input.password,
                        &input.first_name,
                        &input.last_name,
                    )
                    .await
            }
            None => {
                if self.users.find_by_email(&email).await?.is_some() {
                    return Err(ScholaError::DuplicateEmail { email });
                }
                self.codes
                    .consume_for_registration(
                        &code,
                        CreateUser {
                            school_id: record.school_id,
                            email,
                            password: input.password,
                            first_name: input.first_name,
                            last_name: input.last_name,
                            role: UserRole::Teacher,
                            is_active: true,
                            student_number: None,
                            student_number_source: None,
                        },
                    )
                    .await
            }
        }
    }
}
