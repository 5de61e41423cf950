use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};

use super::SearchParams;
use super::error::ApiError;
use super::pagination::{Page, PageParams, RequestUrl};
use crate::domain::permissions::{Access, authenticated_or_read_only};
use crate::domain::validation::{WriteMode, validate_author};
use crate::domain::{Author, AuthorInput, BookSummary, DomainError, ListQuery};
use crate::infrastructure::AppState;
use crate::infrastructure::auth::MaybeUser;

#[utoipa::path(
    get,
    path = "/api/authors/",
    params(SearchParams, PageParams),
    responses((status = 200, body = AuthorPage)),
    tag = "authors"
)]
pub async fn list_authors(
    State(state): State<AppState>,
    url: RequestUrl,
    Query(page): Query<PageParams>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Page<Author>>, ApiError> {
    let request = page.to_request()?;
    let query = ListQuery {
        search: params.search,
        ordering: params.ordering,
    };

    let result = state.author_repo.find_page(query, request).await?;
    Ok(Json(Page::build(&url, request, result)?))
}

#[utoipa::path(
    post,
    path = "/api/authors/",
    request_body = AuthorInput,
    responses(
        (status = 201, body = Author),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Not authenticated")
    ),
    tag = "authors"
)]
pub async fn create_author(
    State(state): State<AppState>,
    caller: MaybeUser,
    payload: Result<Json<AuthorInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Author>), ApiError> {
    authenticated_or_read_only(caller.user(), Access::Write)?;
    let Json(input) = payload?;
    validate_author(&input, WriteMode::Create)?;

    let author = state.author_repo.create(input).await?;
    state.invalidate_book_lists().await;
    Ok((StatusCode::CREATED, Json(author)))
}

#[utoipa::path(
    get,
    path = "/api/authors/{id}/",
    params(("id" = i32, Path, description = "Author id")),
    responses((status = 200, body = Author), (status = 404, description = "Not found")),
    tag = "authors"
)]
pub async fn get_author(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Author>, ApiError> {
    let author = state
        .author_repo
        .find_by_id(id)
        .await?
        .ok_or(DomainError::NotFound)?;
    Ok(Json(author))
}

async fn write_author(
    state: AppState,
    caller: MaybeUser,
    id: i32,
    payload: Result<Json<AuthorInput>, JsonRejection>,
    mode: WriteMode,
) -> Result<Json<Author>, ApiError> {
    authenticated_or_read_only(caller.user(), Access::Write)?;
    if state.author_repo.find_by_id(id).await?.is_none() {
        return Err(DomainError::NotFound.into());
    }
    let Json(input) = payload?;
    validate_author(&input, mode)?;

    let author = state.author_repo.update(id, input).await?;
    state.invalidate_book_lists().await;
    Ok(Json(author))
}

#[utoipa::path(
    put,
    path = "/api/authors/{id}/",
    params(("id" = i32, Path, description = "Author id")),
    request_body = AuthorInput,
    responses((status = 200, body = Author), (status = 400, description = "Validation failed"), (status = 401, description = "Not authenticated"), (status = 404, description = "Not found")),
    tag = "authors"
)]
pub async fn update_author(
    State(state): State<AppState>,
    caller: MaybeUser,
    Path(id): Path<i32>,
    payload: Result<Json<AuthorInput>, JsonRejection>,
) -> Result<Json<Author>, ApiError> {
    write_author(state, caller, id, payload, WriteMode::Replace).await
}

#[utoipa::path(
    patch,
    path = "/api/authors/{id}/",
    params(("id" = i32, Path, description = "Author id")),
    request_body = AuthorInput,
    responses((status = 200, body = Author), (status = 400, description = "Validation failed"), (status = 401, description = "Not authenticated"), (status = 404, description = "Not found")),
    tag = "authors"
)]
pub async fn partial_update_author(
    State(state): State<AppState>,
    caller: MaybeUser,
    Path(id): Path<i32>,
    payload: Result<Json<AuthorInput>, JsonRejection>,
) -> Result<Json<Author>, ApiError> {
    write_author(state, caller, id, payload, WriteMode::Partial).await
}

/// Deleting an author also deletes every book they wrote.
#[utoipa::path(
    delete,
    path = "/api/authors/{id}/",
    params(("id" = i32, Path, description = "Author id")),
    responses((status = 204, description = "Deleted"), (status = 401, description = "Not authenticated"), (status = 404, description = "Not found")),
    tag = "authors"
)]
pub async fn delete_author(
    State(state): State<AppState>,
    caller: MaybeUser,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    authenticated_or_read_only(caller.user(), Access::Write)?;
    state.author_repo.delete(id).await?;
    state.invalidate_book_lists().await;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/authors/{id}/books/",
    params(("id" = i32, Path, description = "Author id")),
    responses((status = 200, body = [BookSummary]), (status = 404, description = "Not found")),
    tag = "authors"
)]
pub async fn author_books(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Vec<BookSummary>>, ApiError> {
    Ok(Json(state.author_repo.books(id).await?))
}
