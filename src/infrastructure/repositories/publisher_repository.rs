//! SeaORM implementation of PublisherRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult,
    IntoActiveModel, JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    RelationTrait, Select, Set, TransactionTrait,
};

use super::book_repository::{load_summaries, summary_query};
use crate::domain::validation::unique_violation;
use crate::domain::{
    BookSummary, DomainError, ListQuery, PageRequest, Paginated, Publisher, PublisherInput,
    PublisherRepository,
};
use crate::infrastructure::query::{parse_ordering, search_condition};
use crate::models::{book, publisher};

const ORDERING_FIELDS: &[&str] = &["name", "created_at"];
const DEFAULT_ORDERING: &str = "name";
const DUPLICATE_NAME: &str = "publisher with this name already exists.";

#[derive(Debug, FromQueryResult)]
pub(crate) struct PublisherRow {
    id: i32,
    name: String,
    address: String,
    city: String,
    country: String,
    website: String,
    created_at: DateTime<Utc>,
    books_count: i64,
}

impl From<PublisherRow> for Publisher {
    fn from(row: PublisherRow) -> Self {
        Publisher {
            id: row.id,
            name: row.name,
            address: row.address,
            city: row.city,
            country: row.country,
            website: row.website,
            books_count: row.books_count,
            created_at: row.created_at,
        }
    }
}

/// Publishers with their number of books
pub(crate) fn publisher_query() -> Select<publisher::Entity> {
    publisher::Entity::find()
        .column_as(Expr::col((book::Entity, book::Column::Id)).count(), "books_count")
        .join(JoinType::LeftJoin, publisher::Relation::Book.def())
        .group_by(publisher::Column::Id)
}

fn order_column(field: &str) -> Option<publisher::Column> {
    match field {
        "name" => Some(publisher::Column::Name),
        "created_at" => Some(publisher::Column::CreatedAt),
        _ => None,
    }
}

pub struct SeaOrmPublisherRepository {
    db: DatabaseConnection,
}

impl SeaOrmPublisherRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn name_taken(&self, name: &str, exclude: Option<i32>) -> Result<bool, DomainError> {
        let mut select = publisher::Entity::find().filter(publisher::Column::Name.eq(name));
        if let Some(id) = exclude {
            select = select.filter(publisher::Column::Id.ne(id));
        }
        Ok(select.count(&self.db).await? > 0)
    }
}

#[async_trait]
impl PublisherRepository for SeaOrmPublisherRepository {
    async fn find_page(
        &self,
        query: ListQuery,
        page: PageRequest,
    ) -> Result<Paginated<Publisher>, DomainError> {
        let mut select = publisher_query();

        if let Some(condition) = search_condition(
            query.search.as_deref(),
            &[
                publisher::Column::Name,
                publisher::Column::City,
                publisher::Column::Country,
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
        select = select.order_by_asc(publisher::Column::Id);

        let paginator = select
            .into_model::<PublisherRow>()
            .paginate(&self.db, page.page_size);
        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(page.page - 1).await?;

        Ok(Paginated {
            items: rows.into_iter().map(Publisher::from).collect(),
            total,
        })
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<Publisher>, DomainError> {
        let row = publisher_query()
            .filter(publisher::Column::Id.eq(id))
            .into_model::<PublisherRow>()
            .one(&self.db)
            .await?;

        Ok(row.map(Publisher::from))
    }

    async fn create(&self, input: PublisherInput) -> Result<Publisher, DomainError> {
        let name = input.name.unwrap_or_default().trim().to_string();
        if self.name_taken(&name, None).await? {
            return Err(unique_violation("name", DUPLICATE_NAME));
        }

        let publisher = publisher::ActiveModel {
            name: Set(name),
            address: Set(input.address.unwrap_or_default()),
            city: Set(input.city.unwrap_or_default()),
            country: Set(input.country.unwrap_or_default()),
            website: Set(input.website.unwrap_or_default()),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        let model = publisher.insert(&self.db).await?;
        tracing::debug!("Created publisher {} ({})", model.id, model.name);

        Ok(Publisher {
            id: model.id,
            name: model.name,
            address: model.address,
            city: model.city,
            country: model.country,
            website: model.website,
            books_count: 0,
            created_at: model.created_at,
        })
    }

    async fn update(&self, id: i32, input: PublisherInput) -> Result<Publisher, DomainError> {
        let existing = publisher::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(DomainError::NotFound)?;

        let mut active = existing.into_active_model();
        if let Some(name) = input.name {
            let name = name.trim().to_string();
            if self.name_taken(&name, Some(id)).await? {
                return Err(unique_violation("name", DUPLICATE_NAME));
            }
            active.name = Set(name);
        }
        if let Some(address) = input.address {
            active.address = Set(address);
        }
        if let Some(city) = input.city {
            active.city = Set(city);
        }
        if let Some(country) = input.country {
            active.country = Set(country);
        }
        if let Some(website) = input.website {
            active.website = Set(website);
        }
        if active.is_changed() {
            active.update(&self.db).await?;
        }

        self.find_by_id(id).await?.ok_or(DomainError::NotFound)
    }

    async fn delete(&self, id: i32) -> Result<(), DomainError> {
        let txn = self.db.begin().await?;

        // Books outlive their publisher
        book::Entity::update_many()
            .col_expr(book::Column::PublisherId, Expr::value(Option::<i32>::None))
            .filter(book::Column::PublisherId.eq(id))
            .exec(&txn)
            .await?;
        let result = publisher::Entity::delete_by_id(id).exec(&txn).await?;

        if result.rows_affected == 0 {
            txn.rollback().await?;
            return Err(DomainError::NotFound);
        }

        txn.commit().await?;
        Ok(())
    }

    async fn books(&self, id: i32) -> Result<Vec<BookSummary>, DomainError> {
        if publisher::Entity::find_by_id(id).count(&self.db).await? == 0 {
            return Err(DomainError::NotFound);
        }

        let select = summary_query()
            .filter(book::Column::PublisherId.eq(id))
            .order_by_desc(book::Column::CreatedAt)
            .order_by_desc(book::Column::Id);
        load_summaries(&self.db, select).await
    }
}
