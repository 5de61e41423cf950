use std::time::Duration;

use sea_orm::sea_query::Index;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema,
    Statement,
};

use crate::models::{auth_token, author, book, book_category, category, publisher, review, user};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const RETRY_INTERVAL: Duration = Duration::from_secs(2);

pub async fn init_db(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = connect(database_url).await?;

    run_migrations(&db).await?;

    Ok(db)
}

pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(database_url.to_owned());
    options.connect_timeout(CONNECT_TIMEOUT);
    Database::connect(options).await
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<(), DbErr>
where
    E: EntityTrait,
{
    let backend = db.get_database_backend();
    let mut table = schema.create_table_from_entity(entity);
    table.if_not_exists();
    db.execute(backend.build(&table)).await?;

    for mut index in schema.create_index_from_entity(entity) {
        index.if_not_exists();
        db.execute(backend.build(&index)).await?;
    }
    Ok(())
}

/// Create every table in foreign-key order. Safe to run on each start.
async fn run_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    let schema = Schema::new(db.get_database_backend());

    create_table(db, &schema, user::Entity).await?;
    create_table(db, &schema, auth_token::Entity).await?;
    create_table(db, &schema, author::Entity).await?;
    create_table(db, &schema, category::Entity).await?;
    create_table(db, &schema, publisher::Entity).await?;
    create_table(db, &schema, book::Entity).await?;
    create_table(db, &schema, book_category::Entity).await?;
    create_table(db, &schema, review::Entity).await?;

    // One review per user and book
    let unique_review = Index::create()
        .name("idx_reviews_book_user")
        .table(review::Entity)
        .col(review::Column::BookId)
        .col(review::Column::UserId)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(db.get_database_backend().build(&unique_review))
        .await?;

    let book_status = Index::create()
        .name("idx_books_status")
        .table(book::Entity)
        .col(book::Column::Status)
        .if_not_exists()
        .to_owned();
    db.execute(db.get_database_backend().build(&book_status))
        .await?;

    tracing::debug!("Database schema is up to date");
    Ok(())
}

/// Run a trivial query against the database
pub async fn ping(db: &DatabaseConnection) -> Result<(), DbErr> {
    db.execute(Statement::from_string(
        db.get_database_backend(),
        "SELECT 1".to_owned(),
    ))
    .await?;
    Ok(())
}

/// Block until the database accepts connections.
///
/// Retries every two seconds; `max_attempts = None` waits forever.
pub async fn wait_for_db(database_url: &str, max_attempts: Option<u32>) -> Result<(), DbErr> {
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let result = match tokio::time::timeout(CONNECT_TIMEOUT, connect(database_url)).await {
            Ok(Ok(db)) => {
                let pinged = ping(&db).await;
                let _ = db.close().await;
                pinged
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(DbErr::Conn(sea_orm::RuntimeErr::Internal(
                "connection attempt timed out".to_string(),
            ))),
        };

        match result {
            Ok(()) => {
                tracing::info!("Database is available");
                return Ok(());
            }
            Err(e) => {
                if let Some(max) = max_attempts {
                    if attempt >= max {
                        tracing::error!("Database unavailable after {} attempts: {}", attempt, e);
                        return Err(e);
                    }
                }
                tracing::info!("Database unavailable, retrying in 2 seconds ({})", e);
                tokio::time::sleep(RETRY_INTERVAL).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let db = init_db("sqlite::memory:").await.unwrap();
        run_migrations(&db).await.unwrap();
        ping(&db).await.unwrap();
    }

    #[tokio::test]
    async fn wait_for_db_gives_up_after_max_attempts() {
        let result = wait_for_db("postgres://nobody@127.0.0.1:1/none", Some(1)).await;
        assert!(result.is_err());
    }
}
