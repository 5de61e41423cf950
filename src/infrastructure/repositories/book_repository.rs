//! SeaORM implementation of BookRepository

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    FromQueryResult, IntoActiveModel, JoinType, Order, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, RelationTrait, Select, Set, TransactionTrait,
};
use std::collections::{BTreeSet, HashMap};

use super::author_repository::{AuthorRow, author_query};
use super::category_repository::{CategoryRow, category_query};
use super::invalid_pk;
use super::publisher_repository::{PublisherRow, publisher_query};
use crate::domain::validation::{average_rating, unique_violation};
use crate::domain::{
    Author, BookDetail, BookFilter, BookInput, BookRepository, BookSummary, Category, DomainError,
    FieldErrors, PageRequest, Paginated, Publisher,
};
use crate::infrastructure::query::{parse_ordering, search_condition};
use crate::models::{BookStatus, author, book, book_category, category, review};

const ORDERING_FIELDS: &[&str] = &["title", "price", "publication_date", "created_at"];
const DEFAULT_ORDERING: &str = "-created_at";
const DUPLICATE_ISBN: &str = "book with this isbn already exists.";

/// A book with its author's name and review aggregates
#[derive(Debug, FromQueryResult)]
pub(crate) struct BookRow {
    id: i32,
    title: String,
    subtitle: String,
    isbn: String,
    author_id: i32,
    publisher_id: Option<i32>,
    owner_id: Option<i32>,
    publication_date: NaiveDate,
    pages: i32,
    price: Decimal,
    description: String,
    cover_image: Option<String>,
    status: BookStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    author_first_name: String,
    author_last_name: String,
    reviews_count: i64,
    rating_total: Option<i64>,
}

/// Prices always carry exactly two decimal places, whatever scale the
/// backend hands back (SQLite returns `30` for `30.00`).
fn money(price: Decimal) -> Decimal {
    let mut price = price.round_dp(2);
    price.rescale(2);
    price
}

impl BookRow {
    fn into_summary(self, categories: Vec<String>) -> BookSummary {
        BookSummary {
            average_rating: average_rating(self.rating_total, self.reviews_count),
            author_name: format!("{} {}", self.author_first_name, self.author_last_name),
            id: self.id,
            title: self.title,
            categories,
            price: money(self.price),
            status: self.status,
            reviews_count: self.reviews_count,
            publication_date: self.publication_date,
        }
    }
}

/// Books joined with their author and grouped over their reviews
pub(crate) fn summary_query() -> Select<book::Entity> {
    book::Entity::find()
        .column_as(
            Expr::col((author::Entity, author::Column::FirstName)),
            "author_first_name",
        )
        .column_as(
            Expr::col((author::Entity, author::Column::LastName)),
            "author_last_name",
        )
        .column_as(
            Expr::col((review::Entity, review::Column::Id)).count(),
            "reviews_count",
        )
        .column_as(
            Expr::col((review::Entity, review::Column::Rating)).sum(),
            "rating_total",
        )
        .join(JoinType::InnerJoin, book::Relation::Author.def())
        .join(JoinType::LeftJoin, book::Relation::Reviews.def())
        .group_by(book::Column::Id)
        .group_by(author::Column::Id)
}

/// Category names for a set of books, fetched in one query
async fn category_names<C>(db: &C, book_ids: &[i32]) -> Result<HashMap<i32, Vec<String>>, DbErr>
where
    C: ConnectionTrait,
{
    let mut names: HashMap<i32, Vec<String>> = HashMap::new();
    if book_ids.is_empty() {
        return Ok(names);
    }

    let links = book_category::Entity::find()
        .filter(book_category::Column::BookId.is_in(book_ids.to_vec()))
        .find_also_related(category::Entity)
        .order_by_asc(category::Column::Name)
        .all(db)
        .await?;

    for (link, category) in links {
        if let Some(category) = category {
            names.entry(link.book_id).or_default().push(category.name);
        }
    }
    Ok(names)
}

async fn into_summaries<C>(db: &C, rows: Vec<BookRow>) -> Result<Vec<BookSummary>, DomainError>
where
    C: ConnectionTrait,
{
    let ids: Vec<i32> = rows.iter().map(|row| row.id).collect();
    let mut names = category_names(db, &ids).await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let categories = names.remove(&row.id).unwrap_or_default();
            row.into_summary(categories)
        })
        .collect())
}

/// Run a summary query and attach category names
pub(crate) async fn load_summaries<C>(
    db: &C,
    select: Select<book::Entity>,
) -> Result<Vec<BookSummary>, DomainError>
where
    C: ConnectionTrait,
{
    let rows = select.into_model::<BookRow>().all(db).await?;
    into_summaries(db, rows).await
}

fn books_in_category(category_id: i32) -> sea_orm::sea_query::SelectStatement {
    Query::select()
        .column(book_category::Column::BookId)
        .from(book_category::Entity)
        .and_where(book_category::Column::CategoryId.eq(category_id))
        .to_owned()
}

pub(crate) fn filter_by_category(select: Select<book::Entity>, category_id: i32) -> Select<book::Entity> {
    select.filter(book::Column::Id.in_subquery(books_in_category(category_id)))
}

fn order_column(field: &str) -> Option<book::Column> {
    match field {
        "title" => Some(book::Column::Title),
        "price" => Some(book::Column::Price),
        "publication_date" => Some(book::Column::PublicationDate),
        "created_at" => Some(book::Column::CreatedAt),
        _ => None,
    }
}

/// Replace the category links of a book
async fn set_categories<C>(db: &C, book_id: i32, category_ids: &[i32]) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    book_category::Entity::delete_many()
        .filter(book_category::Column::BookId.eq(book_id))
        .exec(db)
        .await?;

    let unique: BTreeSet<i32> = category_ids.iter().copied().collect();
    if unique.is_empty() {
        return Ok(());
    }

    let links = unique.into_iter().map(|category_id| book_category::ActiveModel {
        book_id: Set(book_id),
        category_id: Set(category_id),
    });
    book_category::Entity::insert_many(links)
        .exec_without_returning(db)
        .await?;
    Ok(())
}

/// SeaORM-based implementation of BookRepository
pub struct SeaOrmBookRepository {
    db: DatabaseConnection,
}

impl SeaOrmBookRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Referenced author, publisher and categories must exist
    async fn check_references(&self, input: &BookInput) -> Result<(), DomainError> {
        let mut errors = FieldErrors::new();

        if let Some(author_id) = input.author_id {
            if author::Entity::find_by_id(author_id).count(&self.db).await? == 0 {
                errors.add("author_id", invalid_pk(author_id));
            }
        }

        if let Some(Some(publisher_id)) = input.publisher_id {
            let found = crate::models::publisher::Entity::find_by_id(publisher_id)
                .count(&self.db)
                .await?;
            if found == 0 {
                errors.add("publisher_id", invalid_pk(publisher_id));
            }
        }

        if let Some(category_ids) = &input.category_ids {
            let wanted: BTreeSet<i32> = category_ids.iter().copied().collect();
            if !wanted.is_empty() {
                let found: BTreeSet<i32> = category::Entity::find()
                    .filter(category::Column::Id.is_in(wanted.iter().copied()))
                    .all(&self.db)
                    .await?
                    .into_iter()
                    .map(|c| c.id)
                    .collect();
                for missing in wanted.difference(&found) {
                    errors.add("category_ids", invalid_pk(*missing));
                }
            }
        }

        errors.into_result()
    }

    async fn isbn_taken(&self, isbn: &str, exclude: Option<i32>) -> Result<bool, DomainError> {
        let mut select = book::Entity::find().filter(book::Column::Isbn.eq(isbn));
        if let Some(id) = exclude {
            select = select.filter(book::Column::Id.ne(id));
        }
        Ok(select.count(&self.db).await? > 0)
    }

    async fn detail(&self, id: i32) -> Result<Option<BookDetail>, DomainError> {
        let Some(row) = summary_query()
            .filter(book::Column::Id.eq(id))
            .into_model::<BookRow>()
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };

        let author: Author = author_query()
            .filter(author::Column::Id.eq(row.author_id))
            .into_model::<AuthorRow>()
            .one(&self.db)
            .await?
            .ok_or_else(|| DomainError::Internal(format!("book {} has no author", id)))?
            .into();

        let publisher: Option<Publisher> = match row.publisher_id {
            Some(publisher_id) => publisher_query()
                .filter(crate::models::publisher::Column::Id.eq(publisher_id))
                .into_model::<PublisherRow>()
                .one(&self.db)
                .await?
                .map(Publisher::from),
            None => None,
        };

        let categories: Vec<Category> = category_query()
            .filter(category::Column::Id.in_subquery(
                Query::select()
                    .column(book_category::Column::CategoryId)
                    .from(book_category::Entity)
                    .and_where(book_category::Column::BookId.eq(id))
                    .to_owned(),
            ))
            .order_by_asc(category::Column::Name)
            .into_model::<CategoryRow>()
            .all(&self.db)
            .await?
            .into_iter()
            .map(Category::from)
            .collect();

        Ok(Some(BookDetail {
            average_rating: average_rating(row.rating_total, row.reviews_count),
            id: row.id,
            title: row.title,
            subtitle: row.subtitle,
            isbn: row.isbn,
            author,
            categories,
            publisher,
            publication_date: row.publication_date,
            pages: row.pages,
            price: money(row.price),
            description: row.description,
            cover_image: row.cover_image,
            status: row.status,
            reviews_count: row.reviews_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
            owner_id: row.owner_id,
        }))
    }
}

#[async_trait]
impl BookRepository for SeaOrmBookRepository {
    async fn find_page(
        &self,
        filter: BookFilter,
        page: PageRequest,
    ) -> Result<Paginated<BookSummary>, DomainError> {
        let mut select = summary_query();

        if let Some(status) = filter.status {
            select = select.filter(book::Column::Status.eq(status));
        }
        if let Some(author_id) = filter.author {
            select = select.filter(book::Column::AuthorId.eq(author_id));
        }
        if let Some(publisher_id) = filter.publisher {
            select = select.filter(book::Column::PublisherId.eq(publisher_id));
        }
        if let Some(category_id) = filter.category {
            select = filter_by_category(select, category_id);
        }
        if let Some(condition) = search_condition(
            filter.query.search.as_deref(),
            &[
                book::Column::Title,
                book::Column::Subtitle,
                book::Column::Isbn,
                book::Column::Description,
            ],
        ) {
            select = select.filter(condition);
        }

        for (field, direction) in parse_ordering(
            filter.query.ordering.as_deref(),
            ORDERING_FIELDS,
            DEFAULT_ORDERING,
        ) {
            if let Some(column) = order_column(field) {
                select = select.order_by(column, direction.into());
            }
        }
        select = select.order_by_asc(book::Column::Id);

        let paginator = select
            .into_model::<BookRow>()
            .paginate(&self.db, page.page_size);
        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(page.page - 1).await?;

        Ok(Paginated {
            items: into_summaries(&self.db, rows).await?,
            total,
        })
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<BookDetail>, DomainError> {
        self.detail(id).await
    }

    async fn create(
        &self,
        input: BookInput,
        owner_id: Option<i32>,
    ) -> Result<BookDetail, DomainError> {
        self.check_references(&input).await?;

        let isbn = input.isbn.unwrap_or_default().trim().to_string();
        if self.isbn_taken(&isbn, None).await? {
            return Err(unique_violation("isbn", DUPLICATE_ISBN));
        }

        let status = match input.status.as_deref() {
            Some(value) => BookStatus::parse(value)
                .ok_or_else(|| DomainError::field("status", format!("\"{}\" is not a valid choice.", value)))?,
            None => BookStatus::default(),
        };
        let author_id = input
            .author_id
            .ok_or_else(|| DomainError::field("author_id", "This field is required."))?;
        let publication_date = input
            .publication_date
            .ok_or_else(|| DomainError::field("publication_date", "This field is required."))?;

        let now = Utc::now();
        let book = book::ActiveModel {
            title: Set(input.title.unwrap_or_default()),
            subtitle: Set(input.subtitle.unwrap_or_default()),
            isbn: Set(isbn),
            author_id: Set(author_id),
            publisher_id: Set(input.publisher_id.flatten()),
            owner_id: Set(owner_id),
            publication_date: Set(publication_date),
            pages: Set(input.pages.unwrap_or(1)),
            price: Set(input.price.unwrap_or_default()),
            description: Set(input.description.unwrap_or_default()),
            cover_image: Set(input.cover_image.flatten()),
            status: Set(status),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        let txn = self.db.begin().await?;
        let model = book.insert(&txn).await?;
        set_categories(&txn, model.id, input.category_ids.as_deref().unwrap_or_default()).await?;
        txn.commit().await?;

        tracing::info!("Created book {} ({})", model.id, model.title);
        self.detail(model.id).await?.ok_or(DomainError::NotFound)
    }

    async fn update(&self, id: i32, input: BookInput) -> Result<BookDetail, DomainError> {
        let existing = book::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(DomainError::NotFound)?;

        self.check_references(&input).await?;

        let mut active = existing.into_active_model();
        if let Some(isbn) = input.isbn {
            let isbn = isbn.trim().to_string();
            if self.isbn_taken(&isbn, Some(id)).await? {
                return Err(unique_violation("isbn", DUPLICATE_ISBN));
            }
            active.isbn = Set(isbn);
        }
        if let Some(status) = input.status.as_deref() {
            let status = BookStatus::parse(status).ok_or_else(|| {
                DomainError::field("status", format!("\"{}\" is not a valid choice.", status))
            })?;
            active.status = Set(status);
        }
        if let Some(title) = input.title {
            active.title = Set(title);
        }
        if let Some(subtitle) = input.subtitle {
            active.subtitle = Set(subtitle);
        }
        if let Some(author_id) = input.author_id {
            active.author_id = Set(author_id);
        }
        if let Some(publisher_id) = input.publisher_id {
            active.publisher_id = Set(publisher_id);
        }
        if let Some(publication_date) = input.publication_date {
            active.publication_date = Set(publication_date);
        }
        if let Some(pages) = input.pages {
            active.pages = Set(pages);
        }
        if let Some(price) = input.price {
            active.price = Set(price);
        }
        if let Some(description) = input.description {
            active.description = Set(description);
        }
        if let Some(cover_image) = input.cover_image {
            active.cover_image = Set(cover_image);
        }
        active.updated_at = Set(Utc::now());

        let txn = self.db.begin().await?;
        active.update(&txn).await?;
        if let Some(category_ids) = &input.category_ids {
            set_categories(&txn, id, category_ids).await?;
        }
        txn.commit().await?;

        self.detail(id).await?.ok_or(DomainError::NotFound)
    }

    async fn delete(&self, id: i32) -> Result<(), DomainError> {
        let txn = self.db.begin().await?;

        review::Entity::delete_many()
            .filter(review::Column::BookId.eq(id))
            .exec(&txn)
            .await?;
        book_category::Entity::delete_many()
            .filter(book_category::Column::BookId.eq(id))
            .exec(&txn)
            .await?;
        let result = book::Entity::delete_by_id(id).exec(&txn).await?;

        if result.rows_affected == 0 {
            txn.rollback().await?;
            return Err(DomainError::NotFound);
        }

        txn.commit().await?;
        tracing::info!("Deleted book {}", id);
        Ok(())
    }

    async fn available(&self) -> Result<Vec<BookSummary>, DomainError> {
        let select = summary_query()
            .filter(book::Column::Status.eq(BookStatus::Available))
            .order_by_desc(book::Column::CreatedAt)
            .order_by_desc(book::Column::Id);
        load_summaries(&self.db, select).await
    }

    async fn bestsellers(&self, limit: u64) -> Result<Vec<BookSummary>, DomainError> {
        let select = summary_query()
            .order_by(
                Expr::col((review::Entity, review::Column::Id)).count(),
                Order::Desc,
            )
            .order_by_asc(book::Column::Id)
            .limit(limit);
        load_summaries(&self.db, select).await
    }
}
