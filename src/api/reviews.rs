use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::Deserialize;
use utoipa::IntoParams;

use super::error::ApiError;
use super::pagination::{Page, PageParams, RequestUrl};
use crate::domain::permissions::{Access, authenticated_or_read_only, owner_or_read_only};
use crate::domain::validation::{WriteMode, validate_review};
use crate::domain::{DomainError, FieldErrors, Review, ReviewFilter, ReviewInput};
use crate::infrastructure::AppState;
use crate::infrastructure::auth::MaybeUser;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReviewParams {
    /// Book id
    pub book: Option<String>,
    /// User id
    pub user: Option<String>,
    pub rating: Option<String>,
    /// Only the caller's reviews; needs authentication
    pub my_reviews: Option<String>,
    /// rating or created_at; prefix with `-` to reverse
    pub ordering: Option<String>,
}

fn parse_number(errors: &mut FieldErrors, field: &str, value: Option<&str>) -> Option<i32> {
    let value = value.map(str::trim).filter(|v| !v.is_empty())?;
    match value.parse::<i32>() {
        Ok(number) => Some(number),
        Err(_) => {
            errors.add(field, "Enter a number.");
            None
        }
    }
}

fn is_truthy(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("true" | "1" | "yes")
    )
}

#[utoipa::path(
    get,
    path = "/api/reviews/",
    params(ReviewParams, PageParams),
    responses(
        (status = 200, body = ReviewPage),
        (status = 401, description = "my_reviews without credentials")
    ),
    tag = "reviews"
)]
pub async fn list_reviews(
    State(state): State<AppState>,
    caller: MaybeUser,
    url: RequestUrl,
    Query(page): Query<PageParams>,
    Query(params): Query<ReviewParams>,
) -> Result<Json<Page<Review>>, ApiError> {
    let request = page.to_request()?;

    let mut errors = FieldErrors::new();
    let mut filter = ReviewFilter {
        book: parse_number(&mut errors, "book", params.book.as_deref()),
        user: parse_number(&mut errors, "user", params.user.as_deref()),
        rating: parse_number(&mut errors, "rating", params.rating.as_deref()),
        ordering: params.ordering,
    };
    errors.into_result()?;

    if is_truthy(params.my_reviews.as_deref()) {
        let user = caller.user().ok_or(DomainError::NotAuthenticated)?;
        filter.user = Some(user.id);
    }

    let result = state.review_repo.find_page(filter, request).await?;
    Ok(Json(Page::build(&url, request, result)?))
}

/// The review is recorded under the calling user.
#[utoipa::path(
    post,
    path = "/api/reviews/",
    request_body = ReviewInput,
    responses(
        (status = 201, body = Review),
        (status = 400, description = "Invalid rating or book already reviewed"),
        (status = 401, description = "Not authenticated")
    ),
    tag = "reviews"
)]
pub async fn create_review(
    State(state): State<AppState>,
    caller: MaybeUser,
    payload: Result<Json<ReviewInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Review>), ApiError> {
    authenticated_or_read_only(caller.user(), Access::Write)?;
    let user = caller.user().ok_or(DomainError::NotAuthenticated)?;
    let Json(input) = payload?;
    validate_review(&input, WriteMode::Create)?;

    let review = state.review_repo.create(user.id, input).await?;
    state.invalidate_book_lists().await;
    Ok((StatusCode::CREATED, Json(review)))
}

#[utoipa::path(
    get,
    path = "/api/reviews/{id}/",
    params(("id" = i32, Path, description = "Review id")),
    responses((status = 200, body = Review), (status = 404, description = "Not found")),
    tag = "reviews"
)]
pub async fn get_review(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Review>, ApiError> {
    let review = state
        .review_repo
        .find_by_id(id)
        .await?
        .ok_or(DomainError::NotFound)?;
    Ok(Json(review))
}

/// Load a review and make sure the caller wrote it
async fn owned_review(state: &AppState, caller: &MaybeUser, id: i32) -> Result<Review, ApiError> {
    authenticated_or_read_only(caller.user(), Access::Write)?;
    let review = state
        .review_repo
        .find_by_id(id)
        .await?
        .ok_or(DomainError::NotFound)?;
    owner_or_read_only(caller.user(), review.user_id, Access::Write)?;
    Ok(review)
}

async fn write_review(
    state: AppState,
    caller: MaybeUser,
    id: i32,
    payload: Result<Json<ReviewInput>, JsonRejection>,
    mode: WriteMode,
) -> Result<Json<Review>, ApiError> {
    owned_review(&state, &caller, id).await?;
    let Json(input) = payload?;
    validate_review(&input, mode)?;

    let review = state.review_repo.update(id, input).await?;
    state.invalidate_book_lists().await;
    Ok(Json(review))
}

#[utoipa::path(
    put,
    path = "/api/reviews/{id}/",
    params(("id" = i32, Path, description = "Review id")),
    request_body = ReviewInput,
    responses(
        (status = 200, body = Review),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Not the author of the review"),
        (status = 404, description = "Not found")
    ),
    tag = "reviews"
)]
pub async fn update_review(
    State(state): State<AppState>,
    caller: MaybeUser,
    Path(id): Path<i32>,
    payload: Result<Json<ReviewInput>, JsonRejection>,
) -> Result<Json<Review>, ApiError> {
    write_review(state, caller, id, payload, WriteMode::Replace).await
}

#[utoipa::path(
    patch,
    path = "/api/reviews/{id}/",
    params(("id" = i32, Path, description = "Review id")),
    request_body = ReviewInput,
    responses(
        (status = 200, body = Review),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Not the author of the review"),
        (status = 404, description = "Not found")
    ),
    tag = "reviews"
)]
pub async fn partial_update_review(
    State(state): State<AppState>,
    caller: MaybeUser,
    Path(id): Path<i32>,
    payload: Result<Json<ReviewInput>, JsonRejection>,
) -> Result<Json<Review>, ApiError> {
    write_review(state, caller, id, payload, WriteMode::Partial).await
}

#[utoipa::path(
    delete,
    path = "/api/reviews/{id}/",
    params(("id" = i32, Path, description = "Review id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the author of the review"),
        (status = 404, description = "Not found")
    ),
    tag = "reviews"
)]
pub async fn delete_review(
    State(state): State<AppState>,
    caller: MaybeUser,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    owned_review(&state, &caller, id).await?;
    state.review_repo.delete(id).await?;
    state.invalidate_book_lists().await;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn my_reviews_flag_accepts_common_truthy_values() {
        assert!(is_truthy(Some("true")));
        assert!(is_truthy(Some("1")));
        assert!(!is_truthy(Some("false")));
        assert!(!is_truthy(None));
    }
}
