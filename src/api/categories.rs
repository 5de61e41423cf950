use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};

use super::SearchParams;
use super::error::ApiError;
use super::pagination::{Page, PageParams, RequestUrl};
use crate::domain::permissions::{Access, authenticated_or_read_only};
use crate::domain::validation::{WriteMode, validate_category};
use crate::domain::{Category, CategoryInput, BookSummary, DomainError, ListQuery};
use crate::infrastructure::AppState;
use crate::infrastructure::auth::MaybeUser;

#[utoipa::path(
    get,
    path = "/api/categories/",
    params(SearchParams, PageParams),
    responses((status = 200, body = CategoryPage)),
    tag = "categories"
)]
pub async fn list_categories(
    State(state): State<AppState>,
    url: RequestUrl,
    Query(page): Query<PageParams>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Page<Category>>, ApiError> {
    let request = page.to_request()?;
    let query = ListQuery {
        search: params.search,
        ordering: params.ordering,
    };

    let result = state.category_repo.find_page(query, request).await?;
    Ok(Json(Page::build(&url, request, result)?))
}

#[utoipa::path(
    post,
    path = "/api/categories/",
    request_body = CategoryInput,
    responses(
        (status = 201, body = Category),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Not authenticated")
    ),
    tag = "categories"
)]
pub async fn create_category(
    State(state): State<AppState>,
    caller: MaybeUser,
    payload: Result<Json<CategoryInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    authenticated_or_read_only(caller.user(), Access::Write)?;
    let Json(input) = payload?;
    validate_category(&input, WriteMode::Create)?;

    let category = state.category_repo.create(input).await?;
    state.invalidate_book_lists().await;
    Ok((StatusCode::CREATED, Json(category)))
}

#[utoipa::path(
    get,
    path = "/api/categories/{id}/",
    params(("id" = i32, Path, description = "Category id")),
    responses((status = 200, body = Category), (status = 404, description = "Not found")),
    tag = "categories"
)]
pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Category>, ApiError> {
    let category = state
        .category_repo
        .find_by_id(id)
        .await?
        .ok_or(DomainError::NotFound)?;
    Ok(Json(category))
}

async fn write_category(
    state: AppState,
    caller: MaybeUser,
    id: i32,
    payload: Result<Json<CategoryInput>, JsonRejection>,
    mode: WriteMode,
) -> Result<Json<Category>, ApiError> {
    authenticated_or_read_only(caller.user(), Access::Write)?;
    if state.category_repo.find_by_id(id).await?.is_none() {
        return Err(DomainError::NotFound.into());
    }
    let Json(input) = payload?;
    validate_category(&input, mode)?;

    let category = state.category_repo.update(id, input).await?;
    state.invalidate_book_lists().await;
    Ok(Json(category))
}

#[utoipa::path(
    put,
    path = "/api/categories/{id}/",
    params(("id" = i32, Path, description = "Category id")),
    request_body = CategoryInput,
    responses((status = 200, body = Category), (status = 400, description = "Validation failed"), (status = 401, description = "Not authenticated"), (status = 404, description = "Not found")),
    tag = "categories"
)]
pub async fn update_category(
    State(state): State<AppState>,
    caller: MaybeUser,
    Path(id): Path<i32>,
    payload: Result<Json<CategoryInput>, JsonRejection>,
) -> Result<Json<Category>, ApiError> {
    write_category(state, caller, id, payload, WriteMode::Replace).await
}

#[utoipa::path(
    patch,
    path = "/api/categories/{id}/",
    params(("id" = i32, Path, description = "Category id")),
    request_body = CategoryInput,
    responses((status = 200, body = Category), (status = 400, description = "Validation failed"), (status = 401, description = "Not authenticated"), (status = 404, description = "Not found")),
    tag = "categories"
)]
pub async fn partial_update_category(
    State(state): State<AppState>,
    caller: MaybeUser,
    Path(id): Path<i32>,
    payload: Result<Json<CategoryInput>, JsonRejection>,
) -> Result<Json<Category>, ApiError> {
    write_category(state, caller, id, payload, WriteMode::Partial).await
}

/// Deleting a category unlinks its books.
#[utoipa::path(
    delete,
    path = "/api/categories/{id}/",
    params(("id" = i32, Path, description = "Category id")),
    responses((status = 204, description = "Deleted"), (status = 401, description = "Not authenticated"), (status = 404, description = "Not found")),
    tag = "categories"
)]
pub async fn delete_category(
    State(state): State<AppState>,
    caller: MaybeUser,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    authenticated_or_read_only(caller.user(), Access::Write)?;
    state.category_repo.delete(id).await?;
    state.invalidate_book_lists().await;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/categories/{id}/books/",
    params(("id" = i32, Path, description = "Category id")),
    responses((status = 200, body = [BookSummary]), (status = 404, description = "Not found")),
    tag = "categories"
)]
pub async fn category_books(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Vec<BookSummary>>, ApiError> {
    Ok(Json(state.category_repo.books(id).await?))
}
