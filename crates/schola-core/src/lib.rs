//! Schola Core — domain models, repository traits, and the error
//! taxonomy shared across all crates.

pub mod error;
pub mod models;
pub mod repository;
