pub mod auth_token;
pub mod author;
pub mod book;
pub mod book_category;
pub mod category;
pub mod publisher;
pub mod review;
pub mod user;

pub use book::BookStatus;
