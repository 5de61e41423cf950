//! Domain layer - Pure business abstractions
//!
//! This layer contains NO framework dependencies (no Axum).
//! Trait definitions, validation rules, access rules and domain error types.

pub mod errors;
pub mod permissions;
pub mod repositories;
pub mod validation;

pub use errors::{DomainError, FieldErrors, NON_FIELD_ERRORS};
pub use permissions::Access;
pub use repositories::*;
pub use validation::WriteMode;
