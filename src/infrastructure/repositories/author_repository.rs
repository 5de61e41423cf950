//! SeaORM implementation of AuthorRepository

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult,
    IntoActiveModel, JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    RelationTrait, Select, Set, TransactionTrait,
};

use super::book_repository::{load_summaries, summary_query};
use crate::domain::validation::unique_violation;
use crate::domain::{
    Author, AuthorInput, AuthorRepository, BookSummary, DomainError, ListQuery, PageRequest,
    Paginated,
};
use crate::infrastructure::query::{parse_ordering, search_condition};
use crate::models::{author, book, book_category, review};

const ORDERING_FIELDS: &[&str] = &["last_name", "created_at"];
const DEFAULT_ORDERING: &str = "last_name";
const DUPLICATE_EMAIL: &str = "An author with this email already exists.";

#[derive(Debug, FromQueryResult)]
pub(crate) struct AuthorRow {
    id: i32,
    first_name: String,
    last_name: String,
    birth_date: Option<NaiveDate>,
    biography: String,
    email: String,
    website: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    books_count: i64,
}

impl From<AuthorRow> for Author {
    fn from(row: AuthorRow) -> Self {
        Author {
            full_name: format!("{} {}", row.first_name, row.last_name),
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            birth_date: row.birth_date,
            biography: row.biography,
            email: row.email,
            website: row.website,
            books_count: row.books_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Authors with their number of books, one grouped query
pub(crate) fn author_query() -> Select<author::Entity> {
    author::Entity::find()
        .column_as(Expr::col((book::Entity, book::Column::Id)).count(), "books_count")
        .join(JoinType::LeftJoin, author::Relation::Book.def())
        .group_by(author::Column::Id)
}

fn order_column(field: &str) -> Option<author::Column> {
    match field {
        "last_name" => Some(author::Column::LastName),
        "created_at" => Some(author::Column::CreatedAt),
        _ => None,
    }
}

/// SeaORM-based implementation of AuthorRepository
pub struct SeaOrmAuthorRepository {
    db: DatabaseConnection,
}

impl SeaOrmAuthorRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn email_taken(&self, email: &str, exclude: Option<i32>) -> Result<bool, DomainError> {
        let mut select = author::Entity::find().filter(author::Column::Email.eq(email));
        if let Some(id) = exclude {
            select = select.filter(author::Column::Id.ne(id));
        }
        Ok(select.count(&self.db).await? > 0)
    }
}

#[async_trait]
impl AuthorRepository for SeaOrmAuthorRepository {
    async fn find_page(
        &self,
        query: ListQuery,
        page: PageRequest,
    ) -> Result<Paginated<Author>, DomainError> {
        let mut select = author_query();

        if let Some(condition) = search_condition(
            query.search.as_deref(),
            &[
                author::Column::FirstName,
                author::Column::LastName,
                author::Column::Email,
            ],
        ) {
            select = select.filter(condition);
        }

        for (field, direction) in
            parse_ordering(query.ordering.as_deref(), ORDERING_FIELDS, DEFAULT_ORDERING)
        {
            if let Some(column) = order_column(field) {
                select = select.order_by(column, direction.into());
            }
        }
        select = select.order_by_asc(author::Column::Id);

        let paginator = select
            .into_model::<AuthorRow>()
            .paginate(&self.db, page.page_size);
        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(page.page - 1).await?;

        Ok(Paginated {
            items: rows.into_iter().map(Author::from).collect(),
            total,
        })
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<Author>, DomainError> {
        let row = author_query()
            .filter(author::Column::Id.eq(id))
            .into_model::<AuthorRow>()
            .one(&self.db)
            .await?;

        Ok(row.map(Author::from))
    }

    async fn create(&self, input: AuthorInput) -> Result<Author, DomainError> {
        let email = input.email.unwrap_or_default().trim().to_string();
        if self.email_taken(&email, None).await? {
            return Err(unique_violation("email", DUPLICATE_EMAIL));
        }

        let now = Utc::now();
        let author = author::ActiveModel {
            first_name: Set(input.first_name.unwrap_or_default()),
            last_name: Set(input.last_name.unwrap_or_default()),
            birth_date: Set(input.birth_date.flatten()),
            biography: Set(input.biography.unwrap_or_default()),
            email: Set(email),
            website: Set(input.website.unwrap_or_default()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = author.insert(&self.db).await?;
        tracing::debug!("Created author {} ({})", model.id, model.full_name());

        Ok(Author {
            full_name: model.full_name(),
            id: model.id,
            first_name: model.first_name,
            last_name: model.last_name,
            birth_date: model.birth_date,
            biography: model.biography,
            email: model.email,
            website: model.website,
            books_count: 0,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }

    async fn update(&self, id: i32, input: AuthorInput) -> Result<Author, DomainError> {
        let existing = author::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(DomainError::NotFound)?;

        let mut active = existing.into_active_model();
        if let Some(email) = input.email {
            let email = email.trim().to_string();
            if self.email_taken(&email, Some(id)).await? {
                return Err(unique_violation("email", DUPLICATE_EMAIL));
            }
            active.email = Set(email);
        }
        if let Some(first_name) = input.first_name {
            active.first_name = Set(first_name);
        }
        if let Some(last_name) = input.last_name {
            active.last_name = Set(last_name);
        }
        if let Some(birth_date) = input.birth_date {
            active.birth_date = Set(birth_date);
        }
        if let Some(biography) = input.biography {
            active.biography = Set(biography);
        }
        if let Some(website) = input.website {
            active.website = Set(website);
        }
        active.updated_at = Set(Utc::now());
        active.update(&self.db).await?;

        self.find_by_id(id).await?.ok_or(DomainError::NotFound)
    }

    async fn delete(&self, id: i32) -> Result<(), DomainError> {
        let books_of_author = Query::select()
            .column(book::Column::Id)
            .from(book::Entity)
            .and_where(book::Column::AuthorId.eq(id))
            .to_owned();

        let txn = self.db.begin().await?;

        review::Entity::delete_many()
            .filter(review::Column::BookId.in_subquery(books_of_author.clone()))
            .exec(&txn)
            .await?;
        book_category::Entity::delete_many()
            .filter(book_category::Column::BookId.in_subquery(books_of_author))
            .exec(&txn)
            .await?;
        let books = book::Entity::delete_many()
            .filter(book::Column::AuthorId.eq(id))
            .exec(&txn)
            .await?;
        let result = author::Entity::delete_by_id(id).exec(&txn).await?;

        if result.rows_affected == 0 {
            txn.rollback().await?;
            return Err(DomainError::NotFound);
        }

        txn.commit().await?;
        tracing::info!("Deleted author {} and {} book(s)", id, books.rows_affected);
        Ok(())
    }

    async fn books(&self, id: i32) -> Result<Vec<BookSummary>, DomainError> {
        let exists = author::Entity::find_by_id(id).count(&self.db).await? > 0;
        if !exists {
            return Err(DomainError::NotFound);
        }

        let select = summary_query()
            .filter(book::Column::AuthorId.eq(id))
            .order_by_desc(book::Column::CreatedAt)
            .order_by_desc(book::Column::Id);
        load_summaries(&self.db, select).await
    }
}
