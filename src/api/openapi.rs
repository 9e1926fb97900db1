//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, books, health, loans, users};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Shelfkeeper API",
        version = "0.1.0",
        description = "Book lending REST API"
    ),
    servers(
        (url = "/api", description = "API")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::register,
        auth::login,
        // Profile
        users::get_profile,
        users::update_profile,
        users::delete_profile,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        // Loans
        loans::borrow_book,
        loans::return_book,
        loans::get_borrowed,
    ),
    components(
        schemas(
            // Auth
            auth::LoginRequest,
            auth::LoginResponse,
            auth::RegisterResponse,
            // Users
            crate::models::user::User,
            crate::models::user::Role,
            crate::models::user::RegisterUser,
            crate::models::user::UpdateProfile,
            crate::models::user::DeleteProfile,
            users::ProfileResponse,
            users::MessageResponse,
            // Books
            crate::models::book::Book,
            crate::models::book::NewBook,
            books::BookResponse,
            // Loans
            crate::models::loan::Loan,
            crate::models::loan::LoanDetails,
            loans::BorrowRequest,
            loans::ReturnRequest,
            loans::LoanResponse,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Registration and login"),
        (name = "profile", description = "Own account management"),
        (name = "books", description = "Catalog"),
        (name = "loans", description = "Borrow and return")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
