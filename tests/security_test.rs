mod common;

use axum::http::StatusCode;
use bookstore_api::auth::{hash_password, verify_password};
use common::{PASSWORD, setup_app};
use serde_json::json;

#[tokio::test]
async fn test_password_hashing() {
    let password = "super_secret_password";
    let hash = hash_password(password).expect("Failed to hash password");

    assert_ne!(password, hash);
    assert!(hash.starts_with("$argon2"));
    assert!(verify_password(password, &hash).unwrap());
    assert!(!verify_password("wrong_password", &hash).unwrap());
}

#[tokio::test]
async fn test_register_login_logout_flow() {
    let t = setup_app().await;

    let (status, body) = t
        .post(
            "/api/auth/register/",
            None,
            json!({
                "username": "margaret",
                "email": "margaret@example.com",
                "password": PASSWORD,
                "password2": PASSWORD,
                "first_name": "Margaret",
                "last_name": "Hamilton",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["username"], "margaret");
    assert!(body["user"].get("password").is_none());
    let registered_token = body["token"].as_str().unwrap().to_string();

    let (status, body) = t
        .post(
            "/api/auth/login/",
            None,
            json!({ "username": "margaret", "password": PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();
    // One token per user
    assert_eq!(token, registered_token);

    let (status, body) = t.get("/api/auth/profile/", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "margaret@example.com");
    assert_eq!(body["reviews_count"], 0);

    let (status, body) = t
        .send("POST", "/api/auth/logout/", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["detail"], "Successfully logged out.");

    let (status, _) = t.get("/api/auth/profile/", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_duplicate_registration_rejected() {
    let t = setup_app().await;
    t.register("grace").await;

    let (status, body) = t
        .post(
            "/api/auth/register/",
            None,
            json!({
                "username": "grace",
                "email": "other@example.com",
                "password": PASSWORD,
                "password2": PASSWORD,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["username"].is_array());

    let (status, body) = t
        .post(
            "/api/auth/register/",
            None,
            json!({
                "username": "grace2",
                "email": "grace@example.com",
                "password": PASSWORD,
                "password2": PASSWORD,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["email"].is_array());
}

#[tokio::test]
async fn test_weak_or_mismatched_password_rejected() {
    let t = setup_app().await;

    let (status, body) = t
        .post(
            "/api/auth/register/",
            None,
            json!({
                "username": "shorty",
                "email": "shorty@example.com",
                "password": "12345",
                "password2": "12345",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let messages = body["password"].as_array().unwrap();
    assert!(messages.len() >= 2);

    let (status, body) = t
        .post(
            "/api/auth/register/",
            None,
            json!({
                "username": "typo",
                "email": "typo@example.com",
                "password": PASSWORD,
                "password2": "Something-Else-99",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["password"].is_array());
}

#[tokio::test]
async fn test_bad_credentials() {
    let t = setup_app().await;
    t.register("linus").await;

    let (status, _) = t
        .post(
            "/api/auth/login/",
            None,
            json!({ "username": "linus", "password": "not-the-password" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = t
        .post(
            "/api/token/",
            None,
            json!({ "username": "linus", "password": "not-the-password" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["non_field_errors"][0],
        "Unable to log in with provided credentials."
    );

    let (status, body) = t
        .post(
            "/api/token/",
            None,
            json!({ "username": "linus", "password": PASSWORD }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());
}

#[tokio::test]
async fn test_change_password_rotates_token() {
    let t = setup_app().await;
    let token = t.register("barbara").await;

    let (status, body) = t
        .post(
            "/api/auth/change-password/",
            Some(&token),
            json!({ "old_password": "wrong", "new_password": "Another-Passphrase-7" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["old_password"].is_array());

    let (status, body) = t
        .post(
            "/api/auth/change-password/",
            Some(&token),
            json!({ "old_password": PASSWORD, "new_password": "Another-Passphrase-7" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let new_token = body["token"].as_str().unwrap().to_string();
    assert_ne!(new_token, token);

    let (status, _) = t.get("/api/auth/profile/", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = t.get("/api/auth/profile/", Some(&new_token)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = t
        .post(
            "/api/auth/login/",
            None,
            json!({ "username": "barbara", "password": "Another-Passphrase-7" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_writes_require_authentication() {
    let t = setup_app().await;

    let (status, _) = t
        .post(
            "/api/authors/",
            None,
            json!({ "first_name": "Anon", "last_name": "Ymous", "email": "anon@example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = t.get("/api/authors/", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = t.get("/api/auth/profile/", Some("not-a-real-token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_review_owner_permissions() {
    let t = setup_app().await;
    let author_token = t.register("alice").await;
    let intruder = t.register("mallory").await;

    let author = t.create_author(&author_token, "Niklaus", "Wirth").await;
    let category = t.create_category(&author_token, "Pascal", "pascal").await;
    let book = t
        .create_book(&author_token, "Algorithms + Data Structures", "9780130224187", author, &[category], None)
        .await;
    let (_, review) = t.create_review(&author_token, book, 5).await;
    let review_uri = format!("/api/reviews/{}/", review["id"]);

    let (status, _) = t
        .send("PATCH", &review_uri, Some(&intruder), Some(json!({ "rating": 1 })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = t.send("DELETE", &review_uri, Some(&intruder), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = t.get(&review_uri, None).await;
    assert_eq!(body["rating"], 5);

    let (status, body) = t
        .send("PATCH", &review_uri, Some(&author_token), Some(json!({ "rating": 3 })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rating"], 3);

    let (_, body) = t.get("/api/reviews/?my_reviews=true", Some(&intruder)).await;
    assert_eq!(body["count"], 0);
    let (_, body) = t.get("/api/reviews/?my_reviews=true", Some(&author_token)).await;
    assert_eq!(body["count"], 1);
    let (status, _) = t.get("/api/reviews/?my_reviews=true", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_book_writes_limited_to_owner_or_staff() {
    let t = setup_app().await;
    let owner = t.register("owner").await;
    let other = t.register("other").await;
    let staff = t.staff_token().await;

    let author = t.create_author(&owner, "Alan", "Kay").await;
    let category = t.create_category(&owner, "Objects", "objects").await;
    let book = t
        .create_book(&owner, "Smalltalk Notes", "4444444444444", author, &[category], None)
        .await;
    let uri = format!("/api/books/{}/", book);

    let (status, _) = t
        .send("PATCH", &uri, Some(&other), Some(json!({ "pages": 10 })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t
        .send("PATCH", &uri, Some(&owner), Some(json!({ "pages": 10 })))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = t.send("DELETE", &uri, Some(&staff), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_admin_endpoints_are_staff_only() {
    let t = setup_app().await;
    let user = t.register("regular").await;

    let (status, _) = t.get("/api/admin/stats/", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = t.get("/api/admin/stats/", Some(&user)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = t.get("/api/admin/export/books/", Some(&user)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let staff = t.staff_token().await;
    let (status, _) = t.get("/api/admin/stats/", Some(&staff)).await;
    assert_eq!(status, StatusCode::OK);
}
