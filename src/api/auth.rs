use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use serde_json::{Value, json};

use super::error::ApiError;
use crate::domain::UserProfile;
use crate::infrastructure::AppState;
use crate::infrastructure::auth::AuthUser;
use crate::services::auth_service::{
    self, AuthResponse, ChangePasswordRequest, LoginRequest, RegisterRequest,
};

#[utoipa::path(
    post,
    path = "/api/auth/register/",
    request_body = RegisterRequest,
    responses(
        (status = 201, body = AuthResponse),
        (status = 400, description = "Validation failed")
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let Json(request) = payload?;
    let response = auth_service::register(state.user_repo.as_ref(), request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    post,
    path = "/api/auth/login/",
    request_body = LoginRequest,
    responses(
        (status = 200, body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(request) = payload?;
    tracing::info!("Login attempt for user: {}", request.username);
    let response = auth_service::login(state.user_repo.as_ref(), request).await?;
    Ok(Json(response))
}

/// Token-obtain endpoint: `{"token": "..."}` only
#[utoipa::path(
    post,
    path = "/api/token/",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token for the given credentials"),
        (status = 400, description = "Invalid credentials")
    ),
    tag = "auth"
)]
pub async fn obtain_token(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let token = auth_service::obtain_token(state.user_repo.as_ref(), request).await?;
    Ok(Json(json!({ "token": token })))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout/",
    responses(
        (status = 200, description = "Token deleted"),
        (status = 401, description = "Not authenticated")
    ),
    security(("token" = [])),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>, ApiError> {
    auth_service::logout(state.user_repo.as_ref(), &user).await?;
    Ok(Json(json!({ "detail": "Successfully logged out." })))
}

#[utoipa::path(
    post,
    path = "/api/auth/change-password/",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed, new token issued"),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Not authenticated")
    ),
    security(("token" = [])),
    tag = "auth"
)]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let token = auth_service::change_password(state.user_repo.as_ref(), &user, request).await?;
    Ok(Json(json!({ "detail": "Password updated successfully.", "token": token })))
}

#[utoipa::path(
    get,
    path = "/api/auth/profile/",
    responses(
        (status = 200, body = UserProfile),
        (status = 401, description = "Not authenticated")
    ),
    security(("token" = [])),
    tag = "auth"
)]
pub async fn profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<UserProfile>, ApiError> {
    Ok(Json(auth_service::profile(state.user_repo.as_ref(), &user).await?))
}
