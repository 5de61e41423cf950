use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::Value;
use utoipa::IntoParams;

use super::error::ApiError;
use super::pagination::{Page, PageParams, RequestUrl};
use crate::domain::permissions::{Access, authenticated_or_read_only, book_owner_or_staff};
use crate::domain::validation::{WriteMode, validate_book};
use crate::domain::{
    BookDetail, BookFilter, BookInput, BookSummary, DomainError, FieldErrors, ListQuery, Review,
};
use crate::infrastructure::AppState;
use crate::infrastructure::auth::MaybeUser;
use crate::infrastructure::cache::BOOK_LIST_TTL;
use crate::models::BookStatus;

const BESTSELLER_LIMIT: u64 = 10;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BookParams {
    /// available, out_of_stock or coming_soon
    pub status: Option<String>,
    /// Author id
    pub author: Option<String>,
    /// Category id
    pub categories: Option<String>,
    /// Publisher id
    pub publisher: Option<String>,
    /// Terms matched against title, subtitle, isbn and description
    pub search: Option<String>,
    /// title, price, publication_date or created_at; prefix with `-` to reverse
    pub ordering: Option<String>,
}

fn invalid_choice(value: &str) -> String {
    format!(
        "Select a valid choice. {} is not one of the available choices.",
        value
    )
}

fn parse_id(errors: &mut FieldErrors, field: &str, value: Option<&str>) -> Option<i32> {
    let value = value.map(str::trim).filter(|v| !v.is_empty())?;
    match value.parse::<i32>() {
        Ok(id) => Some(id),
        Err(_) => {
            errors.add(field, invalid_choice(value));
            None
        }
    }
}

impl BookParams {
    fn into_filter(self) -> Result<BookFilter, DomainError> {
        let mut errors = FieldErrors::new();

        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(value) => {
                let parsed = BookStatus::parse(value);
                if parsed.is_none() {
                    errors.add("status", invalid_choice(value));
                }
                parsed
            }
        };
        let author = parse_id(&mut errors, "author", self.author.as_deref());
        let category = parse_id(&mut errors, "categories", self.categories.as_deref());
        let publisher = parse_id(&mut errors, "publisher", self.publisher.as_deref());
        errors.into_result()?;

        Ok(BookFilter {
            status,
            author,
            publisher,
            category,
            query: ListQuery {
                search: self.search,
                ordering: self.ordering,
            },
        })
    }
}

/// Resolve the stored cover reference to a public URL
fn present(state: &AppState, mut book: BookDetail) -> BookDetail {
    book.cover_image = book
        .cover_image
        .filter(|reference| !reference.is_empty())
        .map(|reference| state.config.cover_url(&reference));
    book
}

/// Book list, cached per full request URL
#[utoipa::path(
    get,
    path = "/api/books/",
    params(BookParams, PageParams),
    responses((status = 200, body = BookPage), (status = 404, description = "Invalid page")),
    tag = "books"
)]
pub async fn list_books(
    State(state): State<AppState>,
    url: RequestUrl,
    Query(page): Query<PageParams>,
    Query(params): Query<BookParams>,
) -> Result<Json<Value>, ApiError> {
    let key = format!("{}{}", state.book_list_prefix(), url.0);
    if let Some(cached) = state.cache.get(&key).await {
        tracing::debug!("Book list cache hit: {}", key);
        return Ok(Json(cached));
    }

    let request = page.to_request()?;
    let filter = params.into_filter()?;
    let result = state.book_repo.find_page(filter, request).await?;
    let page = Page::build(&url, request, result)?;

    let body = serde_json::to_value(&page).map_err(|e| DomainError::Internal(e.to_string()))?;
    state.cache.set(&key, &body, BOOK_LIST_TTL).await;
    Ok(Json(body))
}

#[utoipa::path(
    post,
    path = "/api/books/",
    request_body = BookInput,
    responses(
        (status = 201, body = BookDetail),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Not authenticated")
    ),
    tag = "books"
)]
pub async fn create_book(
    State(state): State<AppState>,
    caller: MaybeUser,
    payload: Result<Json<BookInput>, JsonRejection>,
) -> Result<(StatusCode, Json<BookDetail>), ApiError> {
    authenticated_or_read_only(caller.user(), Access::Write)?;
    let Json(input) = payload?;
    validate_book(&input, WriteMode::Create)?;

    let owner = caller.user().map(|user| user.id);
    let book = state.book_repo.create(input, owner).await?;
    state.invalidate_book_lists().await;
    Ok((StatusCode::CREATED, Json(present(&state, book))))
}

#[utoipa::path(
    get,
    path = "/api/books/{id}/",
    params(("id" = i32, Path, description = "Book id")),
    responses((status = 200, body = BookDetail), (status = 404, description = "Not found")),
    tag = "books"
)]
pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<BookDetail>, ApiError> {
    let book = state
        .book_repo
        .find_by_id(id)
        .await?
        .ok_or(DomainError::NotFound)?;
    Ok(Json(present(&state, book)))
}

async fn write_book(
    state: AppState,
    caller: MaybeUser,
    id: i32,
    payload: Result<Json<BookInput>, JsonRejection>,
    mode: WriteMode,
) -> Result<Json<BookDetail>, ApiError> {
    authenticated_or_read_only(caller.user(), Access::Write)?;
    let existing = state
        .book_repo
        .find_by_id(id)
        .await?
        .ok_or(DomainError::NotFound)?;
    book_owner_or_staff(caller.user(), existing.owner_id, Access::Write)?;

    let Json(input) = payload?;
    validate_book(&input, mode)?;

    let book = state.book_repo.update(id, input).await?;
    state.invalidate_book_lists().await;
    Ok(Json(present(&state, book)))
}

#[utoipa::path(
    put,
    path = "/api/books/{id}/",
    params(("id" = i32, Path, description = "Book id")),
    request_body = BookInput,
    responses(
        (status = 200, body = BookDetail),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not found")
    ),
    tag = "books"
)]
pub async fn update_book(
    State(state): State<AppState>,
    caller: MaybeUser,
    Path(id): Path<i32>,
    payload: Result<Json<BookInput>, JsonRejection>,
) -> Result<Json<BookDetail>, ApiError> {
    write_book(state, caller, id, payload, WriteMode::Replace).await
}

#[utoipa::path(
    patch,
    path = "/api/books/{id}/",
    params(("id" = i32, Path, description = "Book id")),
    request_body = BookInput,
    responses(
        (status = 200, body = BookDetail),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not found")
    ),
    tag = "books"
)]
pub async fn partial_update_book(
    State(state): State<AppState>,
    caller: MaybeUser,
    Path(id): Path<i32>,
    payload: Result<Json<BookInput>, JsonRejection>,
) -> Result<Json<BookDetail>, ApiError> {
    write_book(state, caller, id, payload, WriteMode::Partial).await
}

#[utoipa::path(
    delete,
    path = "/api/books/{id}/",
    params(("id" = i32, Path, description = "Book id")),
    responses(
        (status = 204, description = "Deleted with its reviews"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not found")
    ),
    tag = "books"
)]
pub async fn delete_book(
    State(state): State<AppState>,
    caller: MaybeUser,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    authenticated_or_read_only(caller.user(), Access::Write)?;
    let existing = state
        .book_repo
        .find_by_id(id)
        .await?
        .ok_or(DomainError::NotFound)?;
    book_owner_or_staff(caller.user(), existing.owner_id, Access::Write)?;

    state.book_repo.delete(id).await?;
    state.invalidate_book_lists().await;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/books/{id}/reviews/",
    params(("id" = i32, Path, description = "Book id")),
    responses((status = 200, body = [Review]), (status = 404, description = "Not found")),
    tag = "books"
)]
pub async fn book_reviews(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Vec<Review>>, ApiError> {
    if state.book_repo.find_by_id(id).await?.is_none() {
        return Err(DomainError::NotFound.into());
    }
    Ok(Json(state.review_repo.find_by_book(id).await?))
}

#[utoipa::path(
    get,
    path = "/api/books/available/",
    responses((status = 200, body = [BookSummary])),
    tag = "books"
)]
pub async fn available_books(
    State(state): State<AppState>,
) -> Result<Json<Vec<BookSummary>>, ApiError> {
    Ok(Json(state.book_repo.available().await?))
}

/// Most reviewed books first
#[utoipa::path(
    get,
    path = "/api/books/bestsellers/",
    responses((status = 200, body = [BookSummary])),
    tag = "books"
)]
pub async fn bestsellers(
    State(state): State<AppState>,
) -> Result<Json<Vec<BookSummary>>, ApiError> {
    Ok(Json(state.book_repo.bestsellers(BESTSELLER_LIMIT).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_parse_ids_and_status() {
        let params = BookParams {
            status: Some("out_of_stock".into()),
            author: Some("3".into()),
            categories: Some("".into()),
            ..Default::default()
        };
        let filter = params.into_filter().unwrap();
        assert_eq!(filter.status, Some(BookStatus::OutOfStock));
        assert_eq!(filter.author, Some(3));
        assert_eq!(filter.category, None);
    }

    #[test]
    fn bad_filters_are_field_errors() {
        let params = BookParams {
            status: Some("lost".into()),
            publisher: Some("abc".into()),
            ..Default::default()
        };
        match params.into_filter() {
            Err(DomainError::Validation(errors)) => {
                assert!(errors.contains("status"));
                assert!(errors.contains("publisher"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
