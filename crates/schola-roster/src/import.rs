//! Bulk roster reconciliation.
//!
//! Imports a CSV of people into a school, reconciling against existing
//! identities by email. Rows are processed in file order with per-row
//! error isolation: a bad row is reported and the batch keeps going.
//! All known emails are resolved in one bulk query before the row loop
//! so reconciliation does not pay a lookup per row.

use std::collections::{HashMap, HashSet};

use schola_core::error::ScholaResult;
use schola_core::models::user::{User, UserRole};
use schola_core::repository::{
    AccessCodeRepository, MembershipRepository, SequenceRepository, UserRepository,
};
use serde::Serialize;
use uuid::Uuid;

use crate::codes::{AccessCodeService, generate_secret, normalize_email};
use crate::config::RosterConfig;
use crate::identity::IdentityService;
use crate::membership::{MembershipAttacher, MembershipKind, MembershipTarget, validate_target};
use crate::tabular::{RosterRow, parse_roster};

/// An invitation code issued for one imported teacher row. This is the
/// only place the raw code surfaces for bulk invitations.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedInvitation {
    pub row: usize,
    pub email: String,
    pub code: String,
}

/// Outcome of one import batch.
///
/// Every row lands in exactly one count: `created` (new identity),
/// `enrolled` (existing or new identity attached to the target),
/// `skipped` (nothing to change), or one entry in `errors`. A row that
/// both creates and attaches counts in `created` and `enrolled`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub created: usize,
    pub enrolled: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub invitations: Vec<IssuedInvitation>,
}

impl ImportReport {
    /// The first `max` errors plus how many were omitted, for
    /// transports that cap the error list.
    pub fn clipped_errors(&self, max: usize) -> (&[String], usize) {
        let shown = self.errors.len().min(max);
        (&self.errors[..shown], self.errors.len() - shown)
    }
}

/// Bulk CSV importer for students and teachers.
#[derive(Clone)]
pub struct ImportService<U, Q, A, M> {
    users: U,
    identity: IdentityService<U, Q>,
    codes: AccessCodeService<A, U>,
    memberships: M,
    config: RosterConfig,
}

impl<U, Q, A, M> ImportService<U, Q, A, M>
where
    U: UserRepository + Clone,
    Q: SequenceRepository,
    A: AccessCodeRepository,
    M: MembershipRepository,
{
    pub fn new(users: U, sequences: Q, codes: A, memberships: M, config: RosterConfig) -> Self {
        let identity = IdentityService::new(users.clone(), sequences, config.clone());
        let codes = AccessCodeService::new(codes, users.clone(), config.clone());
        Self {
            users,
            identity,
            codes,
            memberships,
            config,
        }
    }

    /// Import a student roster. Rows without an email get a placeholder
    /// address; rows without a student number get the next allocated
    /// one. `target` optionally attaches every row to a class or
    /// classroom; a row's own `class_id` column overrides it.
    pub async fn import_students(
        &self,
        school_id: Uuid,
        data: &[u8],
        target: Option<MembershipTarget>,
    ) -> ScholaResult<ImportReport> {
        let rows = parse_roster(data)?;
        if let Some(t) = target {
            validate_target(&self.memberships, school_id, t).await?;
        }
        let resolved = self.resolve_emails(&rows).await?;
        let attacher = MembershipAttacher::new(MembershipKind::Student, &self.memberships);

        let mut report = ImportReport::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut class_cache: HashMap<Uuid, bool> = HashMap::new();

        for row in &rows {
            let (first_name, last_name) = match required_names(row) {
                Ok(names) => names,
                Err(message) => {
                    report.errors.push(message);
                    continue;
                }
            };

            let email = if row.email.trim().is_empty() {
                match self
                    .identity
                    .fresh_placeholder_email(&first_name, &last_name)
                    .await
                {
                    Ok(email) => email,
                    Err(e) => {
                        report.errors.push(format!("row {}: {e}", row.line));
                        continue;
                    }
                }
            } else {
                normalize_email(&row.email)
            };

            if !seen.insert(email.clone()) {
                report.skipped += 1;
                continue;
            }

            let (user, is_new) = match resolved.get(&email) {
                Some(existing) => {
                    if let Err(message) =
                        check_reusable(existing, school_id, UserRole::Student, row.line)
                    {
                        report.errors.push(message);
                        continue;
                    }
                    (existing.clone(), false)
                }
                None => {
                    let student_number =
                        (!row.student_number.trim().is_empty()).then(|| row.student_number.clone());
                    match self
                        .identity
                        .create_student_resolved(
                            school_id,
                            first_name,
                            last_name,
                            email,
                            generate_secret(),
                            student_number,
                        )
                        .await
                    {
                        Ok(user) => {
                            report.created += 1;
                            (user, true)
                        }
                        Err(e) => {
                            report.errors.push(format!("row {}: {e}", row.line));
                            continue;
                        }
                    }
                }
            };

            let row_target = match self
                .row_target(school_id, row, target, &mut class_cache)
                .await
            {
                Ok(t) => t,
                Err(message) => {
                    report.errors.push(message);
                    continue;
                }
            };
            self.attach_row(&attacher, row_target, &user, is_new, &mut report, row.line)
                .await;
        }

        tracing::info!(
            %school_id,
            created = report.created,
            enrolled = report.enrolled,
            skipped = report.skipped,
            errors = report.errors.len(),
            "student import finished"
        );
        Ok(report)
    }

    /// Import a teacher roster. New emails get an inactive identity and
    /// a bound invitation code, reported in `invitations`; emails are
    /// mandatory for teachers.
    pub async fn import_teachers(
        &self,
        school_id: Uuid,
        invited_by: Uuid,
        data: &[u8],
        target: Option<MembershipTarget>,
    ) -> ScholaResult<ImportReport> {
        let rows = parse_roster(data)?;
        if let Some(t) = target {
            validate_target(&self.memberships, school_id, t).await?;
        }
        let resolved = self.resolve_emails(&rows).await?;
        let attacher = MembershipAttacher::new(MembershipKind::Teacher, &self.memberships);

        let mut report = ImportReport::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut class_cache: HashMap<Uuid, bool> = HashMap::new();

        for row in &rows {
            let (first_name, last_name) = match required_names(row) {
                Ok(names) => names,
                Err(message) => {
                    report.errors.push(message);
                    continue;
                }
            };
            if row.email.trim().is_empty() {
                report
                    .errors
                    .push(format!("row {}: teachers require an email address", row.line));
                continue;
            }
            let email = normalize_email(&row.email);

            if !seen.insert(email.clone()) {
                report.skipped += 1;
                continue;
            }

            let (user, is_new) = match resolved.get(&email) {
                Some(existing) => {
                    if let Err(message) =
                        check_reusable(existing, school_id, UserRole::Teacher, row.line)
                    {
                        report.errors.push(message);
                        continue;
                    }
                    (existing.clone(), false)
                }
                None => {
                    match self
                        .codes
                        .invite_teacher_resolved(
                            school_id,
                            invited_by,
                            email.clone(),
                            first_name,
                            last_name,
                        )
                        .await
                    {
                        Ok(invite) => {
                            report.created += 1;
                            report.invitations.push(IssuedInvitation {
                                row: row.line,
                                email,
                                code: invite.code.code,
                            });
                            (invite.user, true)
                        }
                        Err(e) => {
                            report.errors.push(format!("row {}: {e}", row.line));
                            continue;
                        }
                    }
                }
            };

            let row_target = match self
                .row_target(school_id, row, target, &mut class_cache)
                .await
            {
                Ok(t) => t,
                Err(message) => {
                    report.errors.push(message);
                    continue;
                }
            };
            self.attach_row(&attacher, row_target, &user, is_new, &mut report, row.line)
                .await;
        }

        tracing::info!(
            %school_id,
            created = report.created,
            enrolled = report.enrolled,
            skipped = report.skipped,
            errors = report.errors.len(),
            "teacher import finished"
        );
        Ok(report)
    }

    /// Maximum verbatim row errors for this engine's configuration.
    pub fn max_reported_row_errors(&self) -> usize {
        self.config.max_reported_row_errors
    }

    /// One bulk query resolving every email mentioned in the batch to
    /// its existing identity, keyed by normalized address.
    async fn resolve_emails(&self, rows: &[RosterRow]) -> ScholaResult<HashMap<String, User>> {
        let mut emails: Vec<String> = rows
            .iter()
            .filter(|r| !r.email.trim().is_empty())
            .map(|r| normalize_email(&r.email))
            .collect();
        emails.sort();
        emails.dedup();

        let users = self.users.find_by_emails(&emails).await?;
        Ok(users
            .into_iter()
            .map(|u| (normalize_email(&u.email), u))
            .collect())
    }

    /// The target for one row: its own `class_id` column when present,
    /// otherwise the batch-level target. Per-row classes are validated
    /// against the school once each, cached across the batch.
    async fn row_target(
        &self,
        school_id: Uuid,
        row: &RosterRow,
        batch_target: Option<MembershipTarget>,
        class_cache: &mut HashMap<Uuid, bool>,
    ) -> Result<Option<MembershipTarget>, String> {
        let raw = row.class_id.trim();
        if raw.is_empty() {
            return Ok(batch_target);
        }
        let class_id = Uuid::parse_str(raw)
            .map_err(|_| format!("row {}: invalid class id {raw:?}", row.line))?;

        let known = match class_cache.get(&class_id) {
            Some(&known) => known,
            None => {
                let known = self
                    .memberships
                    .find_class(school_id, class_id)
                    .await
                    .map_err(|e| format!("row {}: {e}", row.line))?
                    .is_some();
                class_cache.insert(class_id, known);
                known
            }
        };
        if !known {
            return Err(format!("row {}: class {class_id} not found", row.line));
        }
        Ok(Some(MembershipTarget::Class(class_id)))
    }

    /// Attach one row's identity to its target and account for the
    /// outcome. An existing identity with nothing to attach is a
    /// skipped row.
    async fn attach_row(
        &self,
        attacher: &MembershipAttacher<'_, M>,
        target: Option<MembershipTarget>,
        user: &User,
        is_new: bool,
        report: &mut ImportReport,
        line: usize,
    ) {
        match target {
            Some(t) => match attacher.attach(t, user.id).await {
                Ok(true) => report.enrolled += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => report.errors.push(format!("row {line}: {e}")),
            },
            None if !is_new => report.skipped += 1,
            None => {}
        }
    }
}

fn required_names(row: &RosterRow) -> Result<(String, String), String> {
    let first = row.first_name.trim();
    let last = row.last_name.trim();
    if first.is_empty() || last.is_empty() {
        return Err(format!(
            "row {}: first and last name are required",
            row.line
        ));
    }
    Ok((first.to_string(), last.to_string()))
}

/// Whether an existing identity may stand in for this row.
fn check_reusable(
    user: &User,
    school_id: Uuid,
    role: UserRole,
    line: usize,
) -> Result<(), String> {
    if user.school_id != school_id {
        return Err(format!(
            "row {line}: email {} belongs to another school",
            user.email
        ));
    }
    if user.role != role {
        return Err(format!(
            "row {line}: email {} belongs to an account with a different role",
            user.email
        ));
    }
    if !user.is_live() {
        return Err(format!("row {line}: account {} is in the trash", user.email));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clipped_errors_reports_omitted_count() {
        let report = ImportReport {
            errors: (1..=8).map(|i| format!("row {i}: boom")).collect(),
            ..Default::default()
        };
        let (shown, omitted) = report.clipped_errors(5);
        assert_eq!(shown.len(), 5);
        assert_eq!(omitted, 3);

        let (shown, omitted) = report.clipped_errors(20);
        assert_eq!(shown.len(), 8);
        assert_eq!(omitted, 0);
    }
}
