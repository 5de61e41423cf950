//! Repository trait definitions
//!
//! These traits define the contract for data access.
//! Implementations live in the infrastructure layer.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use super::DomainError;
use crate::models::BookStatus;

/// Distinguishes "field absent" from "field explicitly null" in PATCH bodies.
pub fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Free-text search and ordering shared by every list endpoint
#[derive(Debug, Default, Clone)]
pub struct ListQuery {
    pub search: Option<String>,
    pub ordering: Option<String>,
}

/// 1-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub page_size: u64,
}

impl PageRequest {
    pub const DEFAULT_PAGE_SIZE: u64 = 10;
    pub const MAX_PAGE_SIZE: u64 = 100;

    pub fn new(page: u64, page_size: u64) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.clamp(1, Self::MAX_PAGE_SIZE),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, Self::DEFAULT_PAGE_SIZE)
    }
}

/// Paginated result with total count
#[derive(Debug)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: u64,
}

// ---------------------------------------------------------------------------
// Authors
// ---------------------------------------------------------------------------

/// Author data for API responses
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Author {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub birth_date: Option<NaiveDate>,
    pub biography: String,
    pub email: String,
    pub website: String,
    pub books_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Writable author fields. Every field is optional so the same payload
/// serves create, full update and partial update.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct AuthorInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    #[schema(value_type = Option<NaiveDate>)]
    pub birth_date: Option<Option<NaiveDate>>,
    pub biography: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
}

#[async_trait]
pub trait AuthorRepository: Send + Sync {
    async fn find_page(
        &self,
        query: ListQuery,
        page: PageRequest,
    ) -> Result<Paginated<Author>, DomainError>;

    async fn find_by_id(&self, id: i32) -> Result<Option<Author>, DomainError>;

    async fn create(&self, input: AuthorInput) -> Result<Author, DomainError>;

    async fn update(&self, id: i32, input: AuthorInput) -> Result<Author, DomainError>;

    /// Delete an author together with all of their books
    async fn delete(&self, id: i32) -> Result<(), DomainError>;

    async fn books(&self, id: i32) -> Result<Vec<BookSummary>, DomainError>;
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Category {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub slug: String,
    pub books_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CategoryInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub slug: Option<String>,
}

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn find_page(
        &self,
        query: ListQuery,
        page: PageRequest,
    ) -> Result<Paginated<Category>, DomainError>;

    async fn find_by_id(&self, id: i32) -> Result<Option<Category>, DomainError>;

    async fn create(&self, input: CategoryInput) -> Result<Category, DomainError>;

    async fn update(&self, id: i32, input: CategoryInput) -> Result<Category, DomainError>;

    async fn delete(&self, id: i32) -> Result<(), DomainError>;

    async fn books(&self, id: i32) -> Result<Vec<BookSummary>, DomainError>;
}

// ---------------------------------------------------------------------------
// Publishers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Publisher {
    pub id: i32,
    pub name: String,
    pub address: String,
    pub city: String,
    pub country: String,
    pub website: String,
    pub books_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct PublisherInput {
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub website: Option<String>,
}

#[async_trait]
pub trait PublisherRepository: Send + Sync {
    async fn find_page(
        &self,
        query: ListQuery,
        page: PageRequest,
    ) -> Result<Paginated<Publisher>, DomainError>;

    async fn find_by_id(&self, id: i32) -> Result<Option<Publisher>, DomainError>;

    async fn create(&self, input: PublisherInput) -> Result<Publisher, DomainError>;

    async fn update(&self, id: i32, input: PublisherInput) -> Result<Publisher, DomainError>;

    /// Delete a publisher; its books stay in the catalog without a publisher
    async fn delete(&self, id: i32) -> Result<(), DomainError>;

    async fn books(&self, id: i32) -> Result<Vec<BookSummary>, DomainError>;
}

// ---------------------------------------------------------------------------
// Books
// ---------------------------------------------------------------------------

/// Lightweight book record used by list views
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookSummary {
    pub id: i32,
    pub title: String,
    pub author_name: String,
    pub categories: Vec<String>,
    #[schema(value_type = String, example = "29.99")]
    pub price: Decimal,
    pub status: BookStatus,
    pub average_rating: Option<f64>,
    pub reviews_count: i64,
    pub publication_date: NaiveDate,
}

/// Full book record with nested relations
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookDetail {
    pub id: i32,
    pub title: String,
    pub subtitle: String,
    pub isbn: String,
    pub author: Author,
    pub categories: Vec<Category>,
    pub publisher: Option<Publisher>,
    pub publication_date: NaiveDate,
    pub pages: i32,
    #[schema(value_type = String, example = "29.99")]
    pub price: Decimal,
    pub description: String,
    pub cover_image: Option<String>,
    pub status: BookStatus,
    pub reviews_count: i64,
    pub average_rating: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub owner_id: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct BookInput {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub isbn: Option<String>,
    pub author_id: Option<i32>,
    pub category_ids: Option<Vec<i32>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    #[schema(value_type = Option<i32>)]
    pub publisher_id: Option<Option<i32>>,
    pub publication_date: Option<NaiveDate>,
    pub pages: Option<i32>,
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    #[schema(value_type = Option<String>)]
    pub cover_image: Option<Option<String>>,
    pub status: Option<String>,
}

/// Filter criteria for book queries
#[derive(Debug, Default, Clone)]
pub struct BookFilter {
    pub status: Option<BookStatus>,
    pub author: Option<i32>,
    pub publisher: Option<i32>,
    pub category: Option<i32>,
    pub query: ListQuery,
}

#[async_trait]
pub trait BookRepository: Send + Sync {
    /// Find all books matching the filter criteria with pagination support
    async fn find_page(
        &self,
        filter: BookFilter,
        page: PageRequest,
    ) -> Result<Paginated<BookSummary>, DomainError>;

    async fn find_by_id(&self, id: i32) -> Result<Option<BookDetail>, DomainError>;

    /// Create a book owned by `owner_id`
    async fn create(&self, input: BookInput, owner_id: Option<i32>)
    -> Result<BookDetail, DomainError>;

    async fn update(&self, id: i32, input: BookInput) -> Result<BookDetail, DomainError>;

    /// Delete a book and its reviews
    async fn delete(&self, id: i32) -> Result<(), DomainError>;

    /// Books currently on sale
    async fn available(&self) -> Result<Vec<BookSummary>, DomainError>;

    /// Most reviewed books first
    async fn bestsellers(&self, limit: u64) -> Result<Vec<BookSummary>, DomainError>;
}

// ---------------------------------------------------------------------------
// Reviews
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Review {
    pub id: i32,
    pub book: i32,
    pub book_title: String,
    /// Username of the reviewer
    pub user: String,
    pub rating: i32,
    pub title: String,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub user_id: i32,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ReviewInput {
    pub book: Option<i32>,
    pub rating: Option<i64>,
    pub title: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ReviewFilter {
    pub book: Option<i32>,
    pub user: Option<i32>,
    pub rating: Option<i32>,
    pub ordering: Option<String>,
}

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    async fn find_page(
        &self,
        filter: ReviewFilter,
        page: PageRequest,
    ) -> Result<Paginated<Review>, DomainError>;

    async fn find_by_id(&self, id: i32) -> Result<Option<Review>, DomainError>;

    /// All reviews of one book, newest first
    async fn find_by_book(&self, book_id: i32) -> Result<Vec<Review>, DomainError>;

    /// Create a review authored by `user_id`
    async fn create(&self, user_id: i32, input: ReviewInput) -> Result<Review, DomainError>;

    async fn update(&self, id: i32, input: ReviewInput) -> Result<Review, DomainError>;

    async fn delete(&self, id: i32) -> Result<(), DomainError>;
}

// ---------------------------------------------------------------------------
// Users & tokens
// ---------------------------------------------------------------------------

/// Authenticated identity attached to a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub is_staff: bool,
    pub is_active: bool,
}

/// Public user record
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub reviews_count: i64,
}

/// Stored credentials for a user, used by the login flow
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: CurrentUser,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_credentials(&self, username: &str)
    -> Result<Option<UserCredentials>, DomainError>;

    async fn find_by_id(&self, id: i32) -> Result<Option<UserCredentials>, DomainError>;

    /// Resolve a token key to the owning user
    async fn find_by_token(&self, key: &str) -> Result<Option<CurrentUser>, DomainError>;

    async fn username_exists(&self, username: &str) -> Result<bool, DomainError>;

    async fn email_exists(&self, email: &str) -> Result<bool, DomainError>;

    async fn create(&self, user: NewUser) -> Result<CurrentUser, DomainError>;

    async fn set_password(&self, id: i32, password_hash: String) -> Result<(), DomainError>;

    async fn record_login(&self, id: i32) -> Result<(), DomainError>;

    async fn profile(&self, id: i32) -> Result<Option<UserProfile>, DomainError>;

    async fn list_profiles(&self) -> Result<Vec<UserProfile>, DomainError>;

    /// Return the user's token, creating one when missing
    async fn get_or_create_token(&self, user_id: i32) -> Result<String, DomainError>;

    /// Replace any existing token with a fresh one
    async fn rotate_token(&self, user_id: i32) -> Result<String, DomainError>;

    async fn delete_token(&self, user_id: i32) -> Result<(), DomainError>;
}
