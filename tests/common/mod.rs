#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use bookstore_api::config::Config;
use bookstore_api::db;
use bookstore_api::infrastructure::AppState;
use bookstore_api::server::build_app;
use sea_orm::DatabaseConnection;
use serde_json::{Value, json};
use tower::util::ServiceExt; // for `oneshot`

pub const PASSWORD: &str = "Sturdy-Passphrase-42";

pub struct TestApp {
    pub app: Router,
    pub db: DatabaseConnection,
}

pub async fn setup_app() -> TestApp {
    let db = db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB");
    let state = AppState::new(db.clone(), Config::from_lookup(|_| None));
    TestApp {
        app: build_app(state),
        db,
    }
}

impl TestApp {
    /// Send a request and return the status plus the JSON body (`Null` when empty).
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Token {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send("GET", uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send("POST", uri, token, Some(body)).await
    }

    /// Register a user and return its token
    pub async fn register(&self, username: &str) -> String {
        let (status, body) = self
            .post(
                "/api/auth/register/",
                None,
                json!({
                    "username": username,
                    "email": format!("{}@example.com", username),
                    "password": PASSWORD,
                    "password2": PASSWORD,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        body["token"].as_str().unwrap().to_string()
    }

    /// Create a staff account through the superuser bootstrap and log it in
    pub async fn staff_token(&self) -> String {
        bookstore_api::seed::ensure_superuser(&self.db, "admin", "admin@example.com", PASSWORD)
            .await
            .unwrap();
        let (status, body) = self
            .post(
                "/api/auth/login/",
                None,
                json!({ "username": "admin", "password": PASSWORD }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn create_author(&self, token: &str, first: &str, last: &str) -> i64 {
        let (status, body) = self
            .post(
                "/api/authors/",
                Some(token),
                json!({
                    "first_name": first,
                    "last_name": last,
                    "email": format!("{}.{}@example.com", first, last).to_lowercase(),
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "author failed: {}", body);
        body["id"].as_i64().unwrap()
    }

    pub async fn create_category(&self, token: &str, name: &str, slug: &str) -> i64 {
        let (status, body) = self
            .post(
                "/api/categories/",
                Some(token),
                json!({ "name": name, "slug": slug }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "category failed: {}", body);
        body["id"].as_i64().unwrap()
    }

    pub async fn create_publisher(&self, token: &str, name: &str) -> i64 {
        let (status, body) = self
            .post("/api/publishers/", Some(token), json!({ "name": name }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "publisher failed: {}", body);
        body["id"].as_i64().unwrap()
    }

    pub async fn create_book(
        &self,
        token: &str,
        title: &str,
        isbn: &str,
        author_id: i64,
        category_ids: &[i64],
        publisher_id: Option<i64>,
    ) -> i64 {
        let (status, body) = self
            .post(
                "/api/books/",
                Some(token),
                json!({
                    "title": title,
                    "isbn": isbn,
                    "author_id": author_id,
                    "category_ids": category_ids,
                    "publisher_id": publisher_id,
                    "publication_date": "2020-05-01",
                    "pages": 320,
                    "price": "29.99",
                    "description": "A book about things.",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "book failed: {}", body);
        body["id"].as_i64().unwrap()
    }

    pub async fn create_review(&self, token: &str, book_id: i64, rating: i64) -> (StatusCode, Value) {
        self.post(
            "/api/reviews/",
            Some(token),
            json!({
                "book": book_id,
                "rating": rating,
                "title": "Worth reading",
                "comment": "Clear and well paced.",
            }),
        )
        .await
    }
}
