pub mod admin;
pub mod auth;
pub mod authors;
pub mod books;
pub mod categories;
pub mod error;
pub mod health;
pub mod pagination;
pub mod publishers;
pub mod reviews;

use axum::{
    Json, Router,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Map, Value};
use utoipa::IntoParams;

use crate::infrastructure::AppState;
use pagination::RequestUrl;

/// `search` and `ordering` shared by the plain catalog lists
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    /// Whitespace or comma separated terms, all of which must match
    pub search: Option<String>,
    /// Comma separated fields, `-` prefix for descending
    pub ordering: Option<String>,
}

const RESOURCES: &[&str] = &["authors", "categories", "publishers", "books", "reviews"];

/// Browsable root: resource name to absolute list URL
pub async fn api_root(url: RequestUrl) -> Json<Value> {
    let mut base = url.0;
    base.set_query(None);
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    let links: Map<String, Value> = RESOURCES
        .iter()
        .filter_map(|name| {
            base.join(&format!("{}/", name))
                .ok()
                .map(|link| (name.to_string(), Value::String(link.to_string())))
        })
        .collect();
    Json(Value::Object(links))
}

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/", get(api_root))
        .route("/health/", get(health::health_check))
        // Auth
        .route("/auth/register/", post(auth::register))
        .route("/auth/login/", post(auth::login))
        .route("/auth/logout/", post(auth::logout))
        .route("/auth/change-password/", post(auth::change_password))
        .route("/auth/profile/", get(auth::profile))
        .route("/token/", post(auth::obtain_token))
        // Authors
        .route(
            "/authors/",
            get(authors::list_authors).post(authors::create_author),
        )
        .route(
            "/authors/:id/",
            get(authors::get_author)
                .put(authors::update_author)
                .patch(authors::partial_update_author)
                .delete(authors::delete_author),
        )
        .route("/authors/:id/books/", get(authors::author_books))
        // Categories
        .route(
            "/categories/",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/categories/:id/",
            get(categories::get_category)
                .put(categories::update_category)
                .patch(categories::partial_update_category)
                .delete(categories::delete_category),
        )
        .route("/categories/:id/books/", get(categories::category_books))
        // Publishers
        .route(
            "/publishers/",
            get(publishers::list_publishers).post(publishers::create_publisher),
        )
        .route(
            "/publishers/:id/",
            get(publishers::get_publisher)
                .put(publishers::update_publisher)
                .patch(publishers::partial_update_publisher)
                .delete(publishers::delete_publisher),
        )
        .route("/publishers/:id/books/", get(publishers::publisher_books))
        // Books
        .route("/books/", get(books::list_books).post(books::create_book))
        .route("/books/available/", get(books::available_books))
        .route("/books/bestsellers/", get(books::bestsellers))
        .route(
            "/books/:id/",
            get(books::get_book)
                .put(books::update_book)
                .patch(books::partial_update_book)
                .delete(books::delete_book),
        )
        .route("/books/:id/reviews/", get(books::book_reviews))
        // Reviews
        .route(
            "/reviews/",
            get(reviews::list_reviews).post(reviews::create_review),
        )
        .route(
            "/reviews/:id/",
            get(reviews::get_review)
                .put(reviews::update_review)
                .patch(reviews::partial_update_review)
                .delete(reviews::delete_review),
        )
        // Admin
        .route("/admin/stats/", get(admin::stats))
        .route("/admin/users/", get(admin::users))
        .route("/admin/export/:resource/", get(admin::export))
}
