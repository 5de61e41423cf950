//! HTTP mapping for domain errors

use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::domain::DomainError;

static VERBOSE_ERRORS: AtomicBool = AtomicBool::new(false);

/// Include internal error messages in 500 bodies (DEBUG mode)
pub fn set_verbose_errors(enabled: bool) {
    VERBOSE_ERRORS.store(enabled, Ordering::Relaxed);
}

#[derive(Debug)]
pub enum ApiError {
    Domain(DomainError),
    /// Request could not be decoded at all
    BadRequest(String),
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        ApiError::Domain(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("JSON parse error - {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

fn detail(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "detail": message.into() }))).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = match self {
            ApiError::BadRequest(message) => return detail(StatusCode::BAD_REQUEST, message),
            ApiError::Domain(err) => err,
        };

        match err {
            DomainError::Validation(errors) => {
                (StatusCode::BAD_REQUEST, Json(errors)).into_response()
            }
            DomainError::NotFound | DomainError::InvalidPage => {
                detail(StatusCode::NOT_FOUND, err.to_string())
            }
            DomainError::NotAuthenticated | DomainError::AuthenticationFailed(_) => {
                let mut response = detail(StatusCode::UNAUTHORIZED, err.to_string());
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, header::HeaderValue::from_static("Token"));
                response
            }
            DomainError::Forbidden => detail(StatusCode::FORBIDDEN, err.to_string()),
            DomainError::Database(_) | DomainError::Internal(_) => {
                tracing::error!("Request failed: {}", err);
                if VERBOSE_ERRORS.load(Ordering::Relaxed) {
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({ "detail": "Internal server error", "error": err.to_string() })),
                    )
                        .into_response()
                } else {
                    detail(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        let cases = [
            (DomainError::NotFound, StatusCode::NOT_FOUND),
            (DomainError::InvalidPage, StatusCode::NOT_FOUND),
            (DomainError::field("rating", "bad"), StatusCode::BAD_REQUEST),
            (DomainError::NotAuthenticated, StatusCode::UNAUTHORIZED),
            (DomainError::Forbidden, StatusCode::FORBIDDEN),
            (DomainError::Database("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn unauthenticated_responses_name_the_scheme() {
        let response = ApiError::from(DomainError::NotAuthenticated).into_response();
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Token");
    }
}
