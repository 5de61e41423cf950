//! Staff-only catalog administration: statistics, users, exports

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use sea_orm::sea_query::Expr;
use sea_orm::{EntityTrait, PaginatorTrait, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::{IntoParams, ToSchema};

use super::error::ApiError;
use crate::domain::permissions::admin_only;
use crate::domain::validation::average_rating;
use crate::domain::{DomainError, UserProfile};
use crate::infrastructure::AppState;
use crate::infrastructure::auth::MaybeUser;
use crate::models::{author, book, category, publisher, review, user};

#[derive(Debug, Serialize, ToSchema)]
pub struct CatalogStats {
    pub authors: u64,
    pub categories: u64,
    pub publishers: u64,
    pub books: u64,
    pub reviews: u64,
    pub users: u64,
    pub books_by_status: BTreeMap<String, i64>,
    pub average_rating: Option<f64>,
}

#[utoipa::path(
    get,
    path = "/api/admin/stats/",
    responses(
        (status = 200, body = CatalogStats),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Staff only")
    ),
    security(("token" = [])),
    tag = "admin"
)]
pub async fn stats(
    State(state): State<AppState>,
    caller: MaybeUser,
) -> Result<Json<CatalogStats>, ApiError> {
    admin_only(caller.user())?;
    let db = state.db();

    let (rating_total, rating_count) = review::Entity::find()
        .select_only()
        .column_as(Expr::col(review::Column::Rating).sum(), "total")
        .column_as(Expr::col(review::Column::Id).count(), "count")
        .into_tuple::<(Option<i64>, i64)>()
        .one(db)
        .await
        .map_err(DomainError::from)?
        .unwrap_or((None, 0));

    let by_status = book::Entity::find()
        .select_only()
        .column(book::Column::Status)
        .column_as(Expr::col(book::Column::Id).count(), "count")
        .group_by(book::Column::Status)
        .into_tuple::<(String, i64)>()
        .all(db)
        .await
        .map_err(DomainError::from)?;

    Ok(Json(CatalogStats {
        authors: author::Entity::find().count(db).await.map_err(DomainError::from)?,
        categories: category::Entity::find().count(db).await.map_err(DomainError::from)?,
        publishers: publisher::Entity::find().count(db).await.map_err(DomainError::from)?,
        books: book::Entity::find().count(db).await.map_err(DomainError::from)?,
        reviews: rating_count.max(0) as u64,
        users: user::Entity::find().count(db).await.map_err(DomainError::from)?,
        books_by_status: by_status.into_iter().collect(),
        average_rating: average_rating(rating_total, rating_count),
    }))
}

#[utoipa::path(
    get,
    path = "/api/admin/users/",
    responses(
        (status = 200, body = [UserProfile]),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Staff only")
    ),
    security(("token" = [])),
    tag = "admin"
)]
pub async fn users(
    State(state): State<AppState>,
    caller: MaybeUser,
) -> Result<Json<Vec<UserProfile>>, ApiError> {
    admin_only(caller.user())?;
    Ok(Json(state.user_repo.list_profiles().await?))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExportParams {
    pub format: Option<ExportFormat>,
}

fn to_csv<T: Serialize>(rows: &[T]) -> Result<Vec<u8>, DomainError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| DomainError::Internal(e.to_string()))?;
    }
    writer
        .into_inner()
        .map_err(|e| DomainError::Internal(e.to_string()))
}

fn encode<T: Serialize>(rows: &[T], format: ExportFormat) -> Result<Vec<u8>, DomainError> {
    match format {
        ExportFormat::Csv => to_csv(rows),
        ExportFormat::Json => {
            serde_json::to_vec_pretty(rows).map_err(|e| DomainError::Internal(e.to_string()))
        }
    }
}

/// Dump one catalog table as CSV or JSON
#[utoipa::path(
    get,
    path = "/api/admin/export/{resource}/",
    params(
        ("resource" = String, Path, description = "authors, categories, publishers, books or reviews"),
        ExportParams
    ),
    responses(
        (status = 200, description = "File download"),
        (status = 403, description = "Staff only"),
        (status = 404, description = "Unknown resource")
    ),
    security(("token" = [])),
    tag = "admin"
)]
pub async fn export(
    State(state): State<AppState>,
    caller: MaybeUser,
    Path(resource): Path<String>,
    Query(params): Query<ExportParams>,
) -> Result<Response, ApiError> {
    admin_only(caller.user())?;
    let db = state.db();
    let format = params.format.unwrap_or_default();

    let body = match resource.as_str() {
        "authors" => encode(
            &author::Entity::find()
                .order_by_asc(author::Column::Id)
                .all(db)
                .await
                .map_err(DomainError::from)?,
            format,
        )?,
        "categories" => encode(
            &category::Entity::find()
                .order_by_asc(category::Column::Id)
                .all(db)
                .await
                .map_err(DomainError::from)?,
            format,
        )?,
        "publishers" => encode(
            &publisher::Entity::find()
                .order_by_asc(publisher::Column::Id)
                .all(db)
                .await
                .map_err(DomainError::from)?,
            format,
        )?,
        "books" => encode(
            &book::Entity::find()
                .order_by_asc(book::Column::Id)
                .all(db)
                .await
                .map_err(DomainError::from)?,
            format,
        )?,
        "reviews" => encode(
            &review::Entity::find()
                .order_by_asc(review::Column::Id)
                .all(db)
                .await
                .map_err(DomainError::from)?,
            format,
        )?,
        _ => return Err(DomainError::NotFound.into()),
    };

    let (content_type, extension) = match format {
        ExportFormat::Csv => ("text/csv; charset=utf-8", "csv"),
        ExportFormat::Json => ("application/json", "json"),
    };
    let filename = format!(
        "{}_{}.{}",
        resource,
        chrono::Utc::now().format("%Y-%m-%d"),
        extension
    );
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
        .map_err(|e| DomainError::Internal(e.to_string()))?;

    tracing::info!("Exported {} as {}", resource, extension);
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content_type)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        id: i32,
        name: &'static str,
    }

    #[test]
    fn csv_export_has_header_row() {
        let rows = [Row { id: 1, name: "Rust" }, Row { id: 2, name: "Go" }];
        let text = String::from_utf8(encode(&rows, ExportFormat::Csv).unwrap()).unwrap();
        assert_eq!(text, "id,name\n1,Rust\n2,Go\n");
    }
}
