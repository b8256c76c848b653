//! Domain models for Schola.
//!
//! These are the core types shared across all crates.

pub mod access_code;
pub mod membership;
pub mod school;
pub mod trash;
pub mod user;
