use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};

use super::SearchParams;
use super::error::ApiError;
use super::pagination::{Page, PageParams, RequestUrl};
use crate::domain::permissions::{Access, authenticated_or_read_only};
use crate::domain::validation::{WriteMode, validate_publisher};
use crate::domain::{Publisher, PublisherInput, BookSummary, DomainError, ListQuery};
use crate::infrastructure::AppState;
use crate::infrastructure::auth::MaybeUser;

#[utoipa::path(
    get,
    path = "/api/publishers/",
    params(SearchParams, PageParams),
    responses((status = 200, body = PublisherPage)),
    tag = "publishers"
)]
pub async fn list_publishers(
    State(state): State<AppState>,
    url: RequestUrl,
    Query(page): Query<PageParams>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Page<Publisher>>, ApiError> {
    let request = page.to_request()?;
    let query = ListQuery {
        search: params.search,
        ordering: params.ordering,
    };

    let result = state.publisher_repo.find_page(query, request).await?;
    Ok(Json(Page::build(&url, request, result)?))
}

#[utoipa::path(
    post,
    path = "/api/publishers/",
    request_body = PublisherInput,
    responses(
        (status = 201, body = Publisher),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Not authenticated")
    ),
    tag = "publishers"
)]
pub async fn create_publisher(
    State(state): State<AppState>,
    caller: MaybeUser,
    payload: Result<Json<PublisherInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Publisher>), ApiError> {
    authenticated_or_read_only(caller.user(), Access::Write)?;
    let Json(input) = payload?;
    validate_publisher(&input, WriteMode::Create)?;

    let publisher = state.publisher_repo.create(input).await?;
    state.invalidate_book_lists().await;
    Ok((StatusCode::CREATED, Json(publisher)))
}

#[utoipa::path(
    get,
    path = "/api/publishers/{id}/",
    params(("id" = i32, Path, description = "Publisher id")),
    responses((status = 200, body = Publisher), (status = 404, description = "Not found")),
    tag = "publishers"
)]
pub async fn get_publisher(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Publisher>, ApiError> {
    let publisher = state
        .publisher_repo
        .find_by_id(id)
        .await?
        .ok_or(DomainError::NotFound)?;
    Ok(Json(publisher))
}

async fn write_publisher(
    state: AppState,
    caller: MaybeUser,
    id: i32,
    payload: Result<Json<PublisherInput>, JsonRejection>,
    mode: WriteMode,
) -> Result<Json<Publisher>, ApiError> {
    authenticated_or_read_only(caller.user(), Access::Write)?;
    if state.publisher_repo.find_by_id(id).await?.is_none() {
        return Err(DomainError::NotFound.into());
    }
    let Json(input) = payload?;
    validate_publisher(&input, mode)?;

    let publisher = state.publisher_repo.update(id, input).await?;
    state.invalidate_book_lists().await;
    Ok(Json(publisher))
}

#[utoipa::path(
    put,
    path = "/api/publishers/{id}/",
    params(("id" = i32, Path, description = "Publisher id")),
    request_body = PublisherInput,
    responses((status = 200, body = Publisher), (status = 400, description = "Validation failed"), (status = 401, description = "Not authenticated"), (status = 404, description = "Not found")),
    tag = "publishers"
)]
pub async fn update_publisher(
    State(state): State<AppState>,
    caller: MaybeUser,
    Path(id): Path<i32>,
    payload: Result<Json<PublisherInput>, JsonRejection>,
) -> Result<Json<Publisher>, ApiError> {
    write_publisher(state, caller, id, payload, WriteMode::Replace).await
}

#[utoipa::path(
    patch,
    path = "/api/publishers/{id}/",
    params(("id" = i32, Path, description = "Publisher id")),
    request_body = PublisherInput,
    responses((status = 200, body = Publisher), (status = 400, description = "Validation failed"), (status = 401, description = "Not authenticated"), (status = 404, description = "Not found")),
    tag = "publishers"
)]
pub async fn partial_update_publisher(
    State(state): State<AppState>,
    caller: MaybeUser,
    Path(id): Path<i32>,
    payload: Result<Json<PublisherInput>, JsonRejection>,
) -> Result<Json<Publisher>, ApiError> {
    write_publisher(state, caller, id, payload, WriteMode::Partial).await
}

/// Books of a deleted publisher keep existing without one.
#[utoipa::path(
    delete,
    path = "/api/publishers/{id}/",
    params(("id" = i32, Path, description = "Publisher id")),
    responses((status = 204, description = "Deleted"), (status = 401, description = "Not authenticated"), (status = 404, description = "Not found")),
    tag = "publishers"
)]
pub async fn delete_publisher(
    State(state): State<AppState>,
    caller: MaybeUser,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    authenticated_or_read_only(caller.user(), Access::Write)?;
    state.publisher_repo.delete(id).await?;
    state.invalidate_book_lists().await;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/publishers/{id}/books/",
    params(("id" = i32, Path, description = "Publisher id")),
    responses((status = 200, body = [BookSummary]), (status = 404, description = "Not found")),
    tag = "publishers"
)]
pub async fn publisher_books(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Vec<BookSummary>>, ApiError> {
    Ok(Json(state.publisher_repo.books(id).await?))
}
