//! Application state containing repositories and shared resources

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::domain::{
    AuthorRepository, BookRepository, CategoryRepository, PublisherRepository, ReviewRepository,
    UserRepository,
};
use crate::infrastructure::cache::{self, InMemoryCache, ResponseCache};
use crate::infrastructure::config::Config;
use crate::infrastructure::{
    SeaOrmAuthorRepository, SeaOrmBookRepository, SeaOrmCategoryRepository,
    SeaOrmPublisherRepository, SeaOrmReviewRepository, SeaOrmUserRepository,
};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    db: DatabaseConnection,
    pub config: Arc<Config>,
    pub author_repo: Arc<dyn AuthorRepository>,
    pub category_repo: Arc<dyn CategoryRepository>,
    pub publisher_repo: Arc<dyn PublisherRepository>,
    pub book_repo: Arc<dyn BookRepository>,
    pub review_repo: Arc<dyn ReviewRepository>,
    pub user_repo: Arc<dyn UserRepository>,
    /// Book list response cache
    pub cache: Arc<dyn ResponseCache>,
    cache_namespace: String,
}

impl AppState {
    /// Create a new AppState with all repositories initialized and an
    /// in-process cache
    pub fn new(db: DatabaseConnection, config: Config) -> Self {
        let cache_namespace = cache::namespace(&config.secret_key);

        Self {
            author_repo: Arc::new(SeaOrmAuthorRepository::new(db.clone())),
            category_repo: Arc::new(SeaOrmCategoryRepository::new(db.clone())),
            publisher_repo: Arc::new(SeaOrmPublisherRepository::new(db.clone())),
            book_repo: Arc::new(SeaOrmBookRepository::new(db.clone())),
            review_repo: Arc::new(SeaOrmReviewRepository::new(db.clone())),
            user_repo: Arc::new(SeaOrmUserRepository::new(db.clone())),
            cache: Arc::new(InMemoryCache::new()),
            config: Arc::new(config),
            cache_namespace,
            db,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn ResponseCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Prefix shared by every cached book list
    pub fn book_list_prefix(&self) -> String {
        format!("{}books:", self.cache_namespace)
    }

    /// Drop cached book lists after any catalog write
    pub async fn invalidate_book_lists(&self) {
        self.cache.invalidate_prefix(&self.book_list_prefix()).await;
    }
}

impl AsRef<DatabaseConnection> for AppState {
    fn as_ref(&self) -> &DatabaseConnection {
        &self.db
    }
}

// Implement FromRef to allow extracting DatabaseConnection from AppState
impl axum::extract::FromRef<AppState> for DatabaseConnection {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}
