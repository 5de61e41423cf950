//! Repository implementations using SeaORM

pub mod author_repository;
pub mod book_repository;
pub mod category_repository;
pub mod publisher_repository;
pub mod review_repository;
pub mod user_repository;

pub use author_repository::SeaOrmAuthorRepository;
pub use book_repository::SeaOrmBookRepository;
pub use category_repository::SeaOrmCategoryRepository;
pub use publisher_repository::SeaOrmPublisherRepository;
pub use review_repository::SeaOrmReviewRepository;
pub use user_repository::SeaOrmUserRepository;

/// Message for a foreign key that points nowhere
pub(crate) fn invalid_pk(id: i32) -> String {
    format!("Invalid pk \"{}\" - object does not exist.", id)
}
