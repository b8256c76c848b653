//! Student number allocation.
//!
//! Student numbers look like `2026-001`: the allocation year, a dash,
//! and a zero-padded per-school sequence. Allocation goes through the
//! atomic per-(school, year) counter; the historical scan of existing
//! numbers is only used once, to seed a counter for a school/year that
//! predates the counter table.

use schola_core::error::{ScholaError, ScholaResult};
use schola_core::repository::{SequenceRepository, UserRepository};
use uuid::Uuid;

/// Render a student number. Sequences below 1000 are padded to three
/// digits; beyond that the number simply widens.
pub fn format_student_number(year: i32, sequence: u32) -> String {
    format!("{year}-{sequence:03}")
}

/// Extract the numeric suffix of a student number in `year`'s auto
/// family. Returns `None` for numbers from other years or with
/// non-numeric suffixes (manually assigned identifiers are free-form).
pub fn parse_auto_suffix(number: &str, year: i32) -> Option<u32> {
    let suffix = number.strip_prefix(&format!("{year}-"))?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

/// Allocates student numbers for a school, one counter per year.
#[derive(Clone)]
pub struct StudentNumberAllocator<U, Q> {
    users: U,
    sequences: Q,
}

impl<U, Q> StudentNumberAllocator<U, Q>
where
    U: UserRepository,
    Q: SequenceRepository,
{
    pub fn new(users: U, sequences: Q) -> Self {
        Self { users, sequences }
    }

    /// Allocate the next student number for `school_id` in `year`.
    ///
    /// The fast path is a single atomic counter increment. If no
    /// counter exists yet, one is seeded from the highest existing
    /// auto-family suffix; losing the seeding race to a concurrent
    /// allocator is fine, the counter exists afterwards either way.
    pub async fn allocate(&self, school_id: Uuid, year: i32) -> ScholaResult<String> {
        if let Some(seq) = self.sequences.increment(school_id, year).await? {
            return Ok(format_student_number(year, seq));
        }

        let prefix = format!("{year}-");
        let existing = self
            .users
            .list_student_numbers_with_prefix(school_id, &prefix)
            .await?;
        let highest = existing
            .iter()
            .filter_map(|n| parse_auto_suffix(n, year))
            .max()
            .unwrap_or(0);

        if let Some(seq) = self
            .sequences
            .initialize(school_id, year, highest + 1)
            .await?
        {
            tracing::debug!(%school_id, year, seeded_at = seq, "seeded student number counter");
            return Ok(format_student_number(year, seq));
        }

        let seq = self
            .sequences
            .increment(school_id, year)
            .await?
            .ok_or_else(|| {
                ScholaError::Internal("student number counter missing after initialization".into())
            })?;
        Ok(format_student_number(year, seq))
    }
}
