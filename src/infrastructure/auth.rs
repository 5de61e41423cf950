use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use rand::RngCore;

use crate::api::error::ApiError;
use crate::domain::{CurrentUser, DomainError};
use crate::infrastructure::state::AppState;

/// Tokens are 20 random bytes rendered as 40 hex characters.
const TOKEN_BYTES: usize = 20;

pub fn hash_password(password: &str) -> Result<String, DomainError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| DomainError::Internal(e.to_string()))?
        .to_string();
    Ok(password_hash)
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, DomainError> {
    let parsed_hash =
        PasswordHash::new(password_hash).map_err(|e| DomainError::Internal(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn generate_token_key() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Pull the token key out of `Authorization: Token <key>` or
/// `Authorization: Bearer <key>`. Other schemes are ignored.
pub fn token_from_headers(headers: &HeaderMap) -> Result<Option<String>, DomainError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| {
        DomainError::AuthenticationFailed(
            "Invalid token header. Token string should not contain invalid characters."
                .to_string(),
        )
    })?;

    let mut parts = value.split_whitespace();
    let scheme = parts.next().unwrap_or_default();
    if !scheme.eq_ignore_ascii_case("token") && !scheme.eq_ignore_ascii_case("bearer") {
        return Ok(None);
    }

    match (parts.next(), parts.next()) {
        (None, _) => Err(DomainError::AuthenticationFailed(
            "Invalid token header. No credentials provided.".to_string(),
        )),
        (Some(_), Some(_)) => Err(DomainError::AuthenticationFailed(
            "Invalid token header. Token string should not contain spaces.".to_string(),
        )),
        (Some(key), None) => Ok(Some(key.to_string())),
    }
}

async fn resolve_user(parts: &Parts, state: &AppState) -> Result<Option<CurrentUser>, DomainError> {
    let Some(key) = token_from_headers(&parts.headers)? else {
        return Ok(None);
    };

    let user = state
        .user_repo
        .find_by_token(&key)
        .await?
        .ok_or_else(|| DomainError::AuthenticationFailed("Invalid token.".to_string()))?;

    if !user.is_active {
        return Err(DomainError::AuthenticationFailed(
            "User inactive or deleted.".to_string(),
        ));
    }
    Ok(Some(user))
}

/// Authenticated caller; rejects anonymous requests with 401
#[derive(Debug, Clone)]
pub struct AuthUser(pub CurrentUser);

/// Caller identity when present. A malformed or unknown token is still
/// rejected, only a missing header yields `None`.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<CurrentUser>);

impl MaybeUser {
    pub fn user(&self) -> Option<&CurrentUser> {
        self.0.as_ref()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(resolve_user(parts, state).await?))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match resolve_user(parts, state).await? {
            Some(user) => Ok(AuthUser(user)),
            None => Err(DomainError::NotAuthenticated.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn password_round_trip() {
        let hash = hash_password("correct-horse-battery").unwrap();
        assert!(verify_password("correct-horse-battery", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn token_keys_are_40_hex_chars() {
        let key = generate_token_key();
        assert_eq!(key.len(), 40);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(key, generate_token_key());
    }

    #[test]
    fn both_token_schemes_are_accepted() {
        assert_eq!(
            token_from_headers(&headers("Token abc123")).unwrap(),
            Some("abc123".to_string())
        );
        assert_eq!(
            token_from_headers(&headers("Bearer abc123")).unwrap(),
            Some("abc123".to_string())
        );
        assert_eq!(token_from_headers(&HeaderMap::new()).unwrap(), None);
        assert_eq!(token_from_headers(&headers("Basic Zm9vOmJhcg==")).unwrap(), None);
    }

    #[test]
    fn malformed_token_headers_are_rejected() {
        assert!(token_from_headers(&headers("Token")).is_err());
        assert!(token_from_headers(&headers("Token a b")).is_err());
    }
}
