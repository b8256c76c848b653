//! SurrealDB repository implementations.

mod access_code;
mod membership;
mod school;
mod sequence;
mod trash;
mod user;

pub use access_code::SurrealAccessCodeRepository;
pub use membership::SurrealMembershipRepository;
pub use school::SurrealSchoolRepository;
pub use sequence::SurrealSequenceRepository;
pub use trash::SurrealTrashRepository;
pub use user::{SurrealUserRepository, verify_password};
