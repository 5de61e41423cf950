//! SeaORM implementation of CategoryRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult,
    IntoActiveModel, JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    RelationTrait, Select, Set, TransactionTrait,
};

use super::book_repository::{filter_by_category, load_summaries, summary_query};
use crate::domain::{
    BookSummary, Category, CategoryInput, CategoryRepository, DomainError, FieldErrors, ListQuery,
    PageRequest, Paginated,
};
use crate::infrastructure::query::{parse_ordering, search_condition};
use crate::models::{book, book_category, category};

const ORDERING_FIELDS: &[&str] = &["name", "created_at"];
const DEFAULT_ORDERING: &str = "name";

#[derive(Debug, FromQueryResult)]
pub(crate) struct CategoryRow {
    id: i32,
    name: String,
    description: String,
    slug: String,
    created_at: DateTime<Utc>,
    books_count: i64,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: row.id,
            name: row.name,
            description: row.description,
            slug: row.slug,
            books_count: row.books_count,
            created_at: row.created_at,
        }
    }
}

/// Categories with the number of linked books
pub(crate) fn category_query() -> Select<category::Entity> {
    category::Entity::find()
        .column_as(
            Expr::col((book_category::Entity, book_category::Column::BookId)).count(),
            "books_count",
        )
        .join(JoinType::LeftJoin, category::Relation::BookCategory.def())
        .group_by(category::Column::Id)
}

fn order_column(field: &str) -> Option<category::Column> {
    match field {
        "name" => Some(category::Column::Name),
        "created_at" => Some(category::Column::CreatedAt),
        _ => None,
    }
}

pub struct SeaOrmCategoryRepository {
    db: DatabaseConnection,
}

impl SeaOrmCategoryRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn check_unique(
        &self,
        name: Option<&str>,
        slug: Option<&str>,
        exclude: Option<i32>,
    ) -> Result<(), DomainError> {
        let mut errors = FieldErrors::new();

        if let Some(name) = name {
            let mut select = category::Entity::find().filter(category::Column::Name.eq(name));
            if let Some(id) = exclude {
                select = select.filter(category::Column::Id.ne(id));
            }
            if select.count(&self.db).await? > 0 {
                errors.add("name", "category with this name already exists.");
            }
        }

        if let Some(slug) = slug {
            let mut select = category::Entity::find().filter(category::Column::Slug.eq(slug));
            if let Some(id) = exclude {
                select = select.filter(category::Column::Id.ne(id));
            }
            if select.count(&self.db).await? > 0 {
                errors.add("slug", "category with this slug already exists.");
            }
        }

        errors.into_result()
    }
}

#[async_trait]
impl CategoryRepository for SeaOrmCategoryRepository {
    async fn find_page(
        &self,
        query: ListQuery,
        page: PageRequest,
    ) -> Result<Paginated<Category>, DomainError> {
        let mut select = category_query();

        if let Some(condition) = search_condition(
            query.search.as_deref(),
            &[category::Column::Name, category::Column::Description],
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
        select = select.order_by_asc(category::Column::Id);

        let paginator = select
            .into_model::<CategoryRow>()
            .paginate(&self.db, page.page_size);
        let total = paginator.num_items().await?;
        let rows = paginator.fetch_page(page.page - 1).await?;

        Ok(Paginated {
            items: rows.into_iter().map(Category::from).collect(),
            total,
        })
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<Category>, DomainError> {
        let row = category_query()
            .filter(category::Column::Id.eq(id))
            .into_model::<CategoryRow>()
            .one(&self.db)
            .await?;

        Ok(row.map(Category::from))
    }

    async fn create(&self, input: CategoryInput) -> Result<Category, DomainError> {
        let name = input.name.unwrap_or_default().trim().to_string();
        let slug = input.slug.unwrap_or_default().trim().to_string();
        self.check_unique(Some(&name), Some(&slug), None).await?;

        let category = category::ActiveModel {
            name: Set(name),
            description: Set(input.description.unwrap_or_default()),
            slug: Set(slug),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        let model = category.insert(&self.db).await?;
        tracing::debug!("Created category {} ({})", model.id, model.slug);

        Ok(Category {
            id: model.id,
            name: model.name,
            description: model.description,
            slug: model.slug,
            books_count: 0,
            created_at: model.created_at,
        })
    }

    async fn update(&self, id: i32, input: CategoryInput) -> Result<Category, DomainError> {
        let existing = category::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(DomainError::NotFound)?;

        let name = input.name.map(|n| n.trim().to_string());
        let slug = input.slug.map(|s| s.trim().to_string());
        self.check_unique(name.as_deref(), slug.as_deref(), Some(id))
            .await?;

        let mut active = existing.into_active_model();
        if let Some(name) = name {
            active.name = Set(name);
        }
        if let Some(slug) = slug {
            active.slug = Set(slug);
        }
        if let Some(description) = input.description {
            active.description = Set(description);
        }
        if active.is_changed() {
            active.update(&self.db).await?;
        }

        self.find_by_id(id).await?.ok_or(DomainError::NotFound)
    }

    async fn delete(&self, id: i32) -> Result<(), DomainError> {
        let txn = self.db.begin().await?;

        book_category::Entity::delete_many()
            .filter(book_category::Column::CategoryId.eq(id))
            .exec(&txn)
            .await?;
        let result = category::Entity::delete_by_id(id).exec(&txn).await?;

        if result.rows_affected == 0 {
            txn.rollback().await?;
            return Err(DomainError::NotFound);
        }

        txn.commit().await?;
        Ok(())
    }

    async fn books(&self, id: i32) -> Result<Vec<BookSummary>, DomainError> {
        if category::Entity::find_by_id(id).count(&self.db).await? == 0 {
            return Err(DomainError::NotFound);
        }

        let select = filter_by_category(summary_query(), id)
            .order_by_desc(book::Column::CreatedAt)
            .order_by_desc(book::Column::Id);
        load_summaries(&self.db, select).await
    }
}
