//! Auth Service - registration, login and token lifecycle
//!
//! Handlers call these functions with the user repository; nothing here
//! knows about HTTP.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::validation::{REQUIRED, password_errors, validate_registration};
use crate::domain::{
    CurrentUser, DomainError, FieldErrors, NON_FIELD_ERRORS, NewUser, UserProfile,
    UserRepository,
};
use crate::infrastructure::auth::{hash_password, verify_password};

pub const INVALID_CREDENTIALS: &str = "Unable to log in with provided credentials.";

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password2: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

/// Token plus the profile it belongs to
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

async fn load_profile(users: &dyn UserRepository, id: i32) -> Result<UserProfile, DomainError> {
    users.profile(id).await?.ok_or(DomainError::NotFound)
}

pub async fn register(
    users: &dyn UserRepository,
    request: RegisterRequest,
) -> Result<AuthResponse, DomainError> {
    let username = request.username.trim().to_string();
    let email = request.email.trim().to_string();

    let mut errors = validate_registration(
        &username,
        &email,
        &request.password,
        &request.password2,
        &request.first_name,
        &request.last_name,
    );
    if !errors.contains("username") && users.username_exists(&username).await? {
        errors.add("username", "A user with that username already exists.");
    }
    if !errors.contains("email") && users.email_exists(&email).await? {
        errors.add("email", "A user with that email already exists.");
    }
    errors.into_result()?;

    let user = users
        .create(NewUser {
            username,
            email,
            first_name: request.first_name,
            last_name: request.last_name,
            password_hash: hash_password(&request.password)?,
            is_staff: false,
            is_superuser: false,
        })
        .await?;
    let token = users.get_or_create_token(user.id).await?;
    tracing::info!("Registered user {}", user.username);

    Ok(AuthResponse {
        token,
        user: load_profile(users, user.id).await?,
    })
}

/// Verify credentials and hand out the user's token, creating it on first
/// login. Unknown users, wrong passwords and inactive accounts all fail the
/// same way.
pub async fn login(
    users: &dyn UserRepository,
    request: LoginRequest,
) -> Result<AuthResponse, DomainError> {
    let mut errors = FieldErrors::new();
    if request.username.trim().is_empty() {
        errors.add("username", REQUIRED);
    }
    if request.password.is_empty() {
        errors.add("password", REQUIRED);
    }
    errors.into_result()?;

    let Some(credentials) = users.find_credentials(request.username.trim()).await? else {
        tracing::warn!("Login attempt for unknown user: {}", request.username);
        return Err(DomainError::AuthenticationFailed(INVALID_CREDENTIALS.to_string()));
    };
    if !credentials.user.is_active
        || !verify_password(&request.password, &credentials.password_hash)?
    {
        tracing::warn!("Password verification failed for user: {}", credentials.user.username);
        return Err(DomainError::AuthenticationFailed(INVALID_CREDENTIALS.to_string()));
    }

    let user = credentials.user;
    let token = users.get_or_create_token(user.id).await?;
    users.record_login(user.id).await?;
    tracing::info!("User {} logged in", user.username);

    Ok(AuthResponse {
        token,
        user: load_profile(users, user.id).await?,
    })
}

/// Same check as `login`, reported the way the token endpoint reports it
pub async fn obtain_token(
    users: &dyn UserRepository,
    request: LoginRequest,
) -> Result<String, DomainError> {
    match login(users, request).await {
        Ok(response) => Ok(response.token),
        Err(DomainError::AuthenticationFailed(message)) => {
            Err(DomainError::field(NON_FIELD_ERRORS, message))
        }
        Err(e) => Err(e),
    }
}

pub async fn logout(users: &dyn UserRepository, user: &CurrentUser) -> Result<(), DomainError> {
    users.delete_token(user.id).await?;
    tracing::info!("User {} logged out", user.username);
    Ok(())
}

/// Set a new password and rotate the token, so other sessions lose access.
pub async fn change_password(
    users: &dyn UserRepository,
    user: &CurrentUser,
    request: ChangePasswordRequest,
) -> Result<String, DomainError> {
    let credentials = users
        .find_by_id(user.id)
        .await?
        .ok_or(DomainError::NotAuthenticated)?;

    let mut errors = FieldErrors::new();
    if request.old_password.is_empty() {
        errors.add("old_password", REQUIRED);
    } else if !verify_password(&request.old_password, &credentials.password_hash)? {
        errors.add("old_password", "Old password is not correct.");
    }
    if request.new_password.is_empty() {
        errors.add("new_password", REQUIRED);
    } else {
        let profile = load_profile(users, user.id).await?;
        let attributes = [
            profile.username.as_str(),
            profile.email.as_str(),
            profile.first_name.as_str(),
            profile.last_name.as_str(),
        ];
        for message in password_errors(&request.new_password, &attributes) {
            errors.add("new_password", message);
        }
    }
    errors.into_result()?;

    users
        .set_password(user.id, hash_password(&request.new_password)?)
        .await?;
    let token = users.rotate_token(user.id).await?;
    tracing::info!("User {} changed their password", user.username);
    Ok(token)
}

pub async fn profile(users: &dyn UserRepository, user: &CurrentUser) -> Result<UserProfile, DomainError> {
    load_profile(users, user.id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::{SeaOrmUserRepository, db};

    async fn repo() -> SeaOrmUserRepository {
        let db = db::init_db("sqlite::memory:").await.unwrap();
        SeaOrmUserRepository::new(db)
    }

    fn registration(username: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: "Tr1cky-Passphrase".to_string(),
            password2: "Tr1cky-Passphrase".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn register_then_login_reuses_token() {
        let users = repo().await;
        let registered = register(&users, registration("reader", "reader@example.com"))
            .await
            .unwrap();
        assert_eq!(registered.user.username, "reader");
        assert_eq!(registered.token.len(), 40);

        let logged_in = login(
            &users,
            LoginRequest {
                username: "reader".into(),
                password: "Tr1cky-Passphrase".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(logged_in.token, registered.token);
    }

    #[tokio::test]
    async fn duplicate_username_and_email_are_field_errors() {
        let users = repo().await;
        register(&users, registration("reader", "reader@example.com"))
            .await
            .unwrap();

        match register(&users, registration("reader", "reader@example.com")).await {
            Err(DomainError::Validation(errors)) => {
                assert!(errors.contains("username"));
                assert!(errors.contains("email"));
            }
            other => panic!("expected validation error, got {:?}", other.map(|r| r.token)),
        }
    }

    #[tokio::test]
    async fn wrong_password_on_token_endpoint_is_non_field_error() {
        let users = repo().await;
        register(&users, registration("reader", "reader@example.com"))
            .await
            .unwrap();

        let err = obtain_token(
            &users,
            LoginRequest {
                username: "reader".into(),
                password: "nope".into(),
            },
        )
        .await
        .unwrap_err();
        match err {
            DomainError::Validation(errors) => {
                assert_eq!(errors.get(NON_FIELD_ERRORS).unwrap()[0], INVALID_CREDENTIALS)
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn change_password_rotates_token() {
        let users = repo().await;
        let registered = register(&users, registration("reader", "reader@example.com"))
            .await
            .unwrap();
        let current = users.find_by_token(&registered.token).await.unwrap().unwrap();

        let wrong = change_password(
            &users,
            &current,
            ChangePasswordRequest {
                old_password: "not-it".into(),
                new_password: "An0ther-Passphrase".into(),
            },
        )
        .await;
        assert!(matches!(wrong, Err(DomainError::Validation(_))));

        let token = change_password(
            &users,
            &current,
            ChangePasswordRequest {
                old_password: "Tr1cky-Passphrase".into(),
                new_password: "An0ther-Passphrase".into(),
            },
        )
        .await
        .unwrap();
        assert_ne!(token, registered.token);
        assert!(users.find_by_token(&registered.token).await.unwrap().is_none());
    }
}
