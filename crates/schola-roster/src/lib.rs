//! Schola Roster — the roster & identity lifecycle engine.
//!
//! Creates, reconciles, and retires user identities across bulk
//! imports, invitation codes, and soft-delete/retention. Generic over
//! the `schola-core` repository traits so it has no dependency on the
//! database crate.

pub mod codes;
pub mod config;
pub mod identifier;
pub mod identity;
pub mod import;
pub mod membership;
pub mod retention;
pub mod tabular;

pub use codes::{AccessCodeService, ActivateTeacherInput, InviteTeacherInput, TeacherInvite};
pub use config::{RetentionPolicy, RosterConfig};
pub use identifier::StudentNumberAllocator;
pub use identity::{CreateStudentInput, IdentityService, NewStudent};
pub use import::{ImportReport, ImportService, IssuedInvitation};
pub use membership::{MembershipKind, MembershipTarget};
pub use retention::RetentionService;
