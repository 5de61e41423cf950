//! Domain error types
//!
//! These errors are framework-agnostic and represent business-level failures.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Key used for errors that are not tied to a single input field.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Validation messages keyed by the offending input field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(())` when no error was recorded, otherwise a validation error.
    pub fn into_result(self) -> Result<(), DomainError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(DomainError::Validation(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join(" ")))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

#[derive(Debug, Error)]
pub enum DomainError {
    /// Resource not found
    #[error("Not found.")]
    NotFound,
    /// Requested page lies past the last page
    #[error("Invalid page.")]
    InvalidPage,
    /// Field-scoped validation failure
    #[error("Validation error: {0}")]
    Validation(FieldErrors),
    /// No credentials were supplied for a protected operation
    #[error("Authentication credentials were not provided.")]
    NotAuthenticated,
    /// Credentials were supplied but rejected
    #[error("{0}")]
    AuthenticationFailed(String),
    /// Authenticated but not allowed to touch this resource
    #[error("You do not have permission to perform this action.")]
    Forbidden,
    /// Database/persistence error
    #[error("Database error: {0}")]
    Database(String),
    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        DomainError::Validation(FieldErrors::single(field, message))
    }
}

// Conversion from SeaORM errors (used in infrastructure layer)
impl From<sea_orm::DbErr> for DomainError {
    fn from(e: sea_orm::DbErr) -> Self {
        if let Some(sea_orm::SqlErr::UniqueConstraintViolation(detail)) = e.sql_err() {
            tracing::debug!("Unique constraint violation: {}", detail);
            return DomainError::field(NON_FIELD_ERRORS, "A record with these values already exists.");
        }
        DomainError::Database(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_errors_collect_messages_per_field() {
        let mut errors = FieldErrors::new();
        errors.add("email", "Enter a valid email address.");
        errors.add("email", "An author with this email already exists.");
        errors.add("first_name", "This field is required.");

        assert_eq!(errors.get("email").map(<[String]>::len), Some(2));
        assert!(errors.contains("first_name"));
        assert!(!errors.contains("last_name"));

        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["first_name"][0], "This field is required.");
    }

    #[test]
    fn empty_field_errors_are_ok() {
        assert!(FieldErrors::new().into_result().is_ok());
        let err = FieldErrors::single("rating", "bad").into_result().unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
