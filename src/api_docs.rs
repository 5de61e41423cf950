use crate::api;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// `Authorization: Token <key>` (or `Bearer <key>`)
struct TokenAuth;

impl Modify for TokenAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "token",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "Authorization",
                    "Token <key>",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        api::health::health_check,
        api::auth::register,
        api::auth::login,
        api::auth::obtain_token,
        api::auth::logout,
        api::auth::change_password,
        api::auth::profile,
        api::authors::list_authors,
        api::authors::create_author,
        api::authors::get_author,
        api::authors::update_author,
        api::authors::partial_update_author,
        api::authors::delete_author,
        api::authors::author_books,
        api::categories::list_categories,
        api::categories::create_category,
        api::categories::get_category,
        api::categories::update_category,
        api::categories::partial_update_category,
        api::categories::delete_category,
        api::categories::category_books,
        api::publishers::list_publishers,
        api::publishers::create_publisher,
        api::publishers::get_publisher,
        api::publishers::update_publisher,
        api::publishers::partial_update_publisher,
        api::publishers::delete_publisher,
        api::publishers::publisher_books,
        api::books::list_books,
        api::books::create_book,
        api::books::get_book,
        api::books::update_book,
        api::books::partial_update_book,
        api::books::delete_book,
        api::books::book_reviews,
        api::books::available_books,
        api::books::bestsellers,
        api::reviews::list_reviews,
        api::reviews::create_review,
        api::reviews::get_review,
        api::reviews::update_review,
        api::reviews::partial_update_review,
        api::reviews::delete_review,
        api::admin::stats,
        api::admin::users,
        api::admin::export,
    ),
    components(
        schemas(
            crate::domain::Author,
            crate::domain::AuthorInput,
            crate::domain::Category,
            crate::domain::CategoryInput,
            crate::domain::Publisher,
            crate::domain::PublisherInput,
            crate::domain::BookSummary,
            crate::domain::BookDetail,
            crate::domain::BookInput,
            crate::domain::Review,
            crate::domain::ReviewInput,
            crate::domain::UserProfile,
            crate::models::BookStatus,
            crate::services::auth_service::RegisterRequest,
            crate::services::auth_service::LoginRequest,
            crate::services::auth_service::ChangePasswordRequest,
            crate::services::auth_service::AuthResponse,
            api::admin::CatalogStats,
            api::admin::ExportFormat,
            api::pagination::AuthorPage,
            api::pagination::CategoryPage,
            api::pagination::PublisherPage,
            api::pagination::BookPage,
            api::pagination::ReviewPage,
        )
    ),
    modifiers(&TokenAuth),
    tags(
        (name = "bookstore", description = "Bookstore catalog API")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_catalog_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/books/"));
        assert!(doc.paths.paths.contains_key("/api/reviews/{id}/"));
        assert!(doc.components.unwrap().security_schemes.contains_key("token"));
    }
}
