//! Field-level validation for inbound payloads
//!
//! Checks here are pure: anything that needs the database (uniqueness,
//! foreign keys) is done by the repositories and reported with the same
//! field-scoped shape.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;

use super::errors::{FieldErrors, NON_FIELD_ERRORS};
use super::repositories::{AuthorInput, BookInput, CategoryInput, PublisherInput, ReviewInput};
use super::DomainError;
use crate::models::BookStatus;

pub const REQUIRED: &str = "This field is required.";
pub const BLANK: &str = "This field may not be blank.";
pub const RATING_RANGE: &str = "Rating must be between 1 and 5.";
pub const PASSWORD_MISMATCH: &str = "Password fields didn't match.";

pub const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_SIMILARITY: f64 = 0.7;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));
static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("valid slug regex"));
static ATTRIBUTE_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\W+").expect("valid split regex"));

/// Passwords rejected outright regardless of length.
const COMMON_PASSWORDS: &[&str] = &[
    "123456", "12345678", "123456789", "1234567890", "password", "password1",
    "password123", "qwerty", "qwerty123", "qwertyuiop", "abc123", "abcd1234",
    "111111", "11111111", "000000", "00000000", "iloveyou", "letmein", "welcome",
    "welcome1", "monkey", "dragon", "sunshine", "princess", "football", "baseball",
    "superman", "batman", "trustno1", "master", "shadow", "michael", "jennifer",
    "computer", "starwars", "whatever", "freedom", "passw0rd", "p@ssword",
    "p@ssw0rd", "admin", "admin123", "administrator", "changeme", "secret",
    "login", "hello123", "access", "mustang", "zaq12wsx", "1q2w3e4r", "asdfghjkl",
];

/// How much of a payload a write must supply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    Replace,
    Partial,
}

impl WriteMode {
    fn requires_all(self) -> bool {
        !matches!(self, WriteMode::Partial)
    }
}

fn check_text(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<&String>,
    required: bool,
    allow_blank: bool,
    max_len: Option<usize>,
) {
    match value {
        None if required => errors.add(field, REQUIRED),
        None => {}
        Some(v) => {
            if !allow_blank && v.trim().is_empty() {
                errors.add(field, BLANK);
            } else if let Some(max) = max_len {
                if v.chars().count() > max {
                    errors.add(
                        field,
                        format!("Ensure this field has no more than {} characters.", max),
                    );
                }
            }
        }
    }
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value.trim())
}

pub fn is_valid_slug(value: &str) -> bool {
    SLUG_RE.is_match(value)
}

/// Absolute http(s) URL with a host
pub fn is_valid_url(value: &str) -> bool {
    match url::Url::parse(value) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host().is_some(),
        Err(_) => false,
    }
}

fn check_website(errors: &mut FieldErrors, value: Option<&String>) {
    check_text(errors, "website", value, false, true, Some(200));
    if let Some(website) = value {
        if !website.is_empty() && !is_valid_url(website) {
            errors.add("website", "Enter a valid URL.");
        }
    }
}

pub fn validate_author(input: &AuthorInput, mode: WriteMode) -> Result<(), DomainError> {
    let mut errors = FieldErrors::new();
    let required = mode.requires_all();

    check_text(&mut errors, "first_name", input.first_name.as_ref(), required, false, Some(100));
    check_text(&mut errors, "last_name", input.last_name.as_ref(), required, false, Some(100));
    check_text(&mut errors, "email", input.email.as_ref(), required, false, Some(254));
    if let Some(email) = &input.email {
        if !email.trim().is_empty() && !is_valid_email(email) {
            errors.add("email", "Enter a valid email address.");
        }
    }
    check_website(&mut errors, input.website.as_ref());

    errors.into_result()
}

pub fn validate_category(input: &CategoryInput, mode: WriteMode) -> Result<(), DomainError> {
    let mut errors = FieldErrors::new();
    let required = mode.requires_all();

    check_text(&mut errors, "name", input.name.as_ref(), required, false, Some(100));
    check_text(&mut errors, "slug", input.slug.as_ref(), required, false, Some(50));
    if let Some(slug) = &input.slug {
        if !slug.is_empty() && !is_valid_slug(slug) {
            errors.add(
                "slug",
                "Enter a valid \"slug\" consisting of letters, numbers, underscores or hyphens.",
            );
        }
    }

    errors.into_result()
}

pub fn validate_publisher(input: &PublisherInput, mode: WriteMode) -> Result<(), DomainError> {
    let mut errors = FieldErrors::new();

    check_text(&mut errors, "name", input.name.as_ref(), mode.requires_all(), false, Some(200));
    check_text(&mut errors, "city", input.city.as_ref(), false, true, Some(100));
    check_text(&mut errors, "country", input.country.as_ref(), false, true, Some(100));
    check_website(&mut errors, input.website.as_ref());

    errors.into_result()
}

/// Price fits a 6-digit decimal with 2 decimal places and is not negative
pub fn price_errors(price: Decimal) -> Vec<String> {
    let mut messages = Vec::new();
    if price.is_sign_negative() && !price.is_zero() {
        messages.push("Ensure this value is greater than or equal to 0.".to_string());
    }
    let normalized = price.normalize();
    if normalized.scale() > 2 {
        messages.push("Ensure that there are no more than 2 decimal places.".to_string());
    } else if normalized.abs() >= Decimal::new(10_000, 0) {
        messages.push("Ensure that there are no more than 4 digits before the decimal point.".to_string());
    }
    messages
}

pub fn validate_book(input: &BookInput, mode: WriteMode) -> Result<(), DomainError> {
    let mut errors = FieldErrors::new();
    let required = mode.requires_all();

    check_text(&mut errors, "title", input.title.as_ref(), required, false, Some(200));
    check_text(&mut errors, "subtitle", input.subtitle.as_ref(), false, true, Some(200));
    check_text(&mut errors, "isbn", input.isbn.as_ref(), required, false, Some(13));

    if required && input.author_id.is_none() {
        errors.add("author_id", REQUIRED);
    }
    if required && input.category_ids.is_none() {
        errors.add("category_ids", REQUIRED);
    }
    if required && input.publication_date.is_none() {
        errors.add("publication_date", REQUIRED);
    }

    match input.pages {
        None if required => errors.add("pages", REQUIRED),
        Some(pages) if pages < 1 => {
            errors.add("pages", "Ensure this value is greater than or equal to 1.")
        }
        _ => {}
    }

    match input.price {
        None if required => errors.add("price", REQUIRED),
        Some(price) => {
            for message in price_errors(price) {
                errors.add("price", message);
            }
        }
        None => {}
    }

    if let Some(status) = &input.status {
        if BookStatus::parse(status).is_none() {
            errors.add("status", format!("\"{}\" is not a valid choice.", status));
        }
    }

    errors.into_result()
}

pub fn validate_rating(rating: i64) -> Result<i32, DomainError> {
    if (1..=5).contains(&rating) {
        Ok(rating as i32)
    } else {
        Err(DomainError::field("rating", RATING_RANGE))
    }
}

pub fn validate_review(input: &ReviewInput, mode: WriteMode) -> Result<(), DomainError> {
    let mut errors = FieldErrors::new();
    let required = mode.requires_all();

    if required && input.book.is_none() {
        errors.add("book", REQUIRED);
    }
    match input.rating {
        None if required => errors.add("rating", REQUIRED),
        Some(rating) if !(1..=5).contains(&rating) => errors.add("rating", RATING_RANGE),
        _ => {}
    }
    check_text(&mut errors, "title", input.title.as_ref(), required, false, Some(200));
    check_text(&mut errors, "comment", input.comment.as_ref(), required, false, None);

    errors.into_result()
}

/// Password policy: length, numeric-only, common list, similarity to the
/// user's own attributes. Returns every failed rule.
pub fn password_errors(password: &str, user_attributes: &[&str]) -> Vec<String> {
    let mut messages = Vec::new();
    let lowered = password.to_lowercase();

    for attribute in user_attributes.iter().filter(|a| !a.is_empty()) {
        let attribute = attribute.to_lowercase();
        let mut candidates: Vec<&str> = ATTRIBUTE_SPLIT_RE.split(&attribute).collect();
        candidates.push(&attribute);
        let too_similar = candidates
            .iter()
            .filter(|part| !part.is_empty())
            .any(|part| strsim::normalized_levenshtein(&lowered, part) >= MAX_SIMILARITY);
        if too_similar {
            messages.push("The password is too similar to your personal information.".to_string());
            break;
        }
    }

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        messages.push(format!(
            "This password is too short. It must contain at least {} characters.",
            MIN_PASSWORD_LENGTH
        ));
    }

    if COMMON_PASSWORDS.contains(&lowered.trim()) {
        messages.push("This password is too common.".to_string());
    }

    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        messages.push("This password is entirely numeric.".to_string());
    }

    messages
}

/// Registration payload checks that need no database access
pub fn validate_registration(
    username: &str,
    email: &str,
    password: &str,
    password2: &str,
    first_name: &str,
    last_name: &str,
) -> FieldErrors {
    let mut errors = FieldErrors::new();

    if username.trim().is_empty() {
        errors.add("username", REQUIRED);
    } else if username.chars().count() > 150 {
        errors.add("username", "Ensure this field has no more than 150 characters.");
    } else if !username
        .chars()
        .all(|c| c.is_alphanumeric() || "@.+-_".contains(c))
    {
        errors.add(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    }

    if email.trim().is_empty() {
        errors.add("email", REQUIRED);
    } else if !is_valid_email(email) {
        errors.add("email", "Enter a valid email address.");
    }

    if password != password2 {
        errors.add("password", PASSWORD_MISMATCH);
    }

    for message in password_errors(password, &[username, email, first_name, last_name]) {
        errors.add("password", message);
    }

    errors
}

/// Mean of the ratings rounded to two decimal places; `None` without reviews.
pub fn average_rating(total: Option<i64>, count: i64) -> Option<f64> {
    match total {
        Some(total) if count > 0 => {
            let mean = total as f64 / count as f64;
            Some((mean * 100.0).round() / 100.0)
        }
        _ => None,
    }
}

/// Record a uniqueness failure on `field`.
pub fn unique_violation(field: &str, message: &str) -> DomainError {
    DomainError::field(field, message)
}

/// Record a uniqueness failure spanning several fields.
pub fn unique_together_violation(fields: &[&str]) -> DomainError {
    DomainError::field(
        NON_FIELD_ERRORS,
        format!("The fields {} must make a unique set.", fields.join(", ")),
    )
}
