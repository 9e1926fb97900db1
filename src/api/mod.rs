//! API handlers for Shelfkeeper REST endpoints

pub mod auth;
pub mod books;
pub mod health;
pub mod loans;
pub mod openapi;
pub mod users;

use std::time::Duration;

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Request},
    http::{header::AUTHORIZATION, request::Parts, HeaderValue},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use validator::{Validate, ValidationErrors};

use crate::{config::CorsConfig, error::AppError, models::user::UserClaims, AppState};

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // Get the Authorization header
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AppError::MissingToken)?;

        // Check for Bearer token
        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::InvalidToken("Invalid authorization header format".to_string()))?
            .trim();

        let claims = state.services.users.authenticate(token)?;

        Ok(AuthenticatedUser(claims))
    }
}

/// JSON body that is deserialized and then checked with `validator`.
/// Both failures surface as `400 Validation`.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;

        value
            .validate()
            .map_err(|errors| AppError::Validation(validation_message(&errors)))?;

        Ok(ValidatedJson(value))
    }
}

fn validation_message(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field))
            })
        })
        .collect();
    messages.sort();
    messages.join(", ")
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origin = if config.allows_any() {
        AllowOrigin::from(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin: {}", o);
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors);
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    let api = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Authentication
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        // Profile
        .route(
            "/profile",
            get(users::get_profile)
                .put(users::update_profile)
                .delete(users::delete_profile),
        )
        // Catalog
        .route("/books", get(books::list_books).post(books::create_book))
        .route("/books/:id", get(books::get_book))
        // Lending
        .route("/borrow", post(loans::borrow_book))
        .route("/return", post(loans::return_book))
        .route("/borrowed/:email", get(loans::get_borrowed))
        .with_state(state);

    Router::new()
        .nest("/api", api)
        .merge(openapi::create_openapi_router())
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::RegisterUser;

    #[test]
    fn test_validation_message_lists_fields() {
        let request = RegisterUser {
            name: String::new(),
            email: "not-an-email".to_string(),
            phone: "1".to_string(),
            password: String::new(),
            role: None,
        };
        let errors = request.validate().unwrap_err();
        assert_eq!(
            validation_message(&errors),
            "a valid email is required, name is required, password is required"
        );
    }
}
