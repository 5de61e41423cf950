//! SeaORM implementation of ReviewRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult,
    IntoActiveModel, JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    RelationTrait, Select, Set,
};

use super::invalid_pk;
use crate::domain::validation::{unique_together_violation, validate_rating};
use crate::domain::{
    DomainError, PageRequest, Paginated, Review, ReviewFilter, ReviewInput, ReviewRepository,
};
use crate::infrastructure::query::parse_ordering;
use crate::models::{book, review, user};

const ORDERING_FIELDS: &[&str] = &["rating", "created_at"];
const DEFAULT_ORDERING: &str = "-created_at";

#[derive(Debug, FromQueryResult)]
struct ReviewRow {
    id: i32,
    book_id: i32,
    user_id: i32,
    rating: i32,
    title: String,
    comment: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    book_title: String,
    username: String,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Review {
            id: row.id,
            book: row.book_id,
            book_title: row.book_title,
            user: row.username,
            rating: row.rating,
            title: row.title,
            comment: row.comment,
            created_at: row.created_at,
            updated_at: row.updated_at,
            user_id: row.user_id,
        }
    }
}

fn review_query() -> Select<review::Entity> {
    review::Entity::find()
        .column_as(Expr::col((book::Entity, book::Column::Title)), "book_title")
        .column_as(Expr::col((user::Entity, user::Column::Username)), "username")
        .join(JoinType::InnerJoin, review::Relation::Book.def())
        .join(JoinType::InnerJoin, review::Relation::User.def())
}

fn order_column(field: &str) -> Option<review::Column> {
    match field {
        "rating" => Some(review::Column::Rating),
        "created_at" => Some(review::Column::CreatedAt),
        _ => None,
    }
}

pub struct SeaOrmReviewRepository {
    db: DatabaseConnection,
}

impl SeaOrmReviewRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn check_book(&self, book_id: i32) -> Result<(), DomainError> {
        if book::Entity::find_by_id(book_id).count(&self.db).await? == 0 {
            return Err(DomainError::field("book", invalid_pk(book_id)));
        }
        Ok(())
    }

    /// A user reviews each book at most once
    async fn check_not_reviewed(
        &self,
        book_id: i32,
        user_id: i32,
        exclude: Option<i32>,
    ) -> Result<(), DomainError> {
        let mut select = review::Entity::find()
            .filter(review::Column::BookId.eq(book_id))
            .filter(review::Column::UserId.eq(user_id));
        if let Some(id) = exclude {
            select = select.filter(review::Column::Id.ne(id));
        }
        if select.count(&self.db).await? > 0 {
            return Err(unique_together_violation(&["book", "user"]));
        }
        Ok(())
    }
}

#[async_trait]
impl ReviewRepository for SeaOrmReviewRepository {
    async fn find_page(
        &self,
        filter: ReviewFilter,
        page: PageRequest,
    ) -> Result<Paginated<Review>, DomainError> {
        let mut select = review_query();

        if let Some(book_id) = filter.book {
            select = select.filter(review::Column::BookId.eq(book_id));
        }
        if let Some(user_id) = filter.user {
            select = select.filter(review::Column::UserId.eq(user_id));
        }
        if let Some(rating) = filter.rating {
            select = select.filter(review::Column::Rating.eq(rating));
        }

        for (field, direction) in
            parse_ordering(filter.ordering.as_deref(), ORDERING_FIELDS, DEFAULT_ORDERING)
        {
            if let Some(column) = order_column(field) {
                select = select.order_by(column, direction.into());
            }
        }
        select = select.order_by_desc(review::Column::Id);

        let paginator = select
            .into_model::<ReviewRow>()
            .paginate(&self.db, page.page_size);
        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(page.page - 1).await?;

        Ok(Paginated {
            items: rows.into_iter().map(Review::from).collect(),
            total,
        })
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<Review>, DomainError> {
        let row = review_query()
            .filter(review::Column::Id.eq(id))
            .into_model::<ReviewRow>()
            .one(&self.db)
            .await?;

        Ok(row.map(Review::from))
    }

    async fn find_by_book(&self, book_id: i32) -> Result<Vec<Review>, DomainError> {
        let rows = review_query()
            .filter(review::Column::BookId.eq(book_id))
            .order_by_desc(review::Column::CreatedAt)
            .order_by_desc(review::Column::Id)
            .into_model::<ReviewRow>()
            .all(&self.db)
            .await?;

        Ok(rows.into_iter().map(Review::from).collect())
    }

    async fn create(&self, user_id: i32, input: ReviewInput) -> Result<Review, DomainError> {
        let book_id = input
            .book
            .ok_or_else(|| DomainError::field("book", "This field is required."))?;
        let rating = validate_rating(input.rating.unwrap_or_default())?;

        self.check_book(book_id).await?;
        self.check_not_reviewed(book_id, user_id, None).await?;

        let now = Utc::now();
        let review = review::ActiveModel {
            book_id: Set(book_id),
            user_id: Set(user_id),
            rating: Set(rating),
            title: Set(input.title.unwrap_or_default()),
            comment: Set(input.comment.unwrap_or_default()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let model = review.insert(&self.db).await?;
        tracing::debug!("User {} reviewed book {}", user_id, book_id);

        self.find_by_id(model.id).await?.ok_or(DomainError::NotFound)
    }

    async fn update(&self, id: i32, input: ReviewInput) -> Result<Review, DomainError> {
        let existing = review::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(DomainError::NotFound)?;

        let user_id = existing.user_id;
        let current_book = existing.book_id;
        let mut active = existing.into_active_model();

        if let Some(book_id) = input.book {
            if book_id != current_book {
                self.check_book(book_id).await?;
                self.check_not_reviewed(book_id, user_id, Some(id)).await?;
            }
            active.book_id = Set(book_id);
        }
        if let Some(rating) = input.rating {
            active.rating = Set(validate_rating(rating)?);
        }
        if let Some(title) = input.title {
            active.title = Set(title);
        }
        if let Some(comment) = input.comment {
            active.comment = Set(comment);
        }
        active.updated_at = Set(Utc::now());
        active.update(&self.db).await?;

        self.find_by_id(id).await?.ok_or(DomainError::NotFound)
    }

    async fn delete(&self, id: i32) -> Result<(), DomainError> {
        let result = review::Entity::delete_by_id(id).exec(&self.db).await?;

        if result.rows_affected == 0 {
            return Err(DomainError::NotFound);
        }

        Ok(())
    }
}
