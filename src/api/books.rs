//! Catalog endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::book::{Book, NewBook},
};

use super::{AuthenticatedUser, ValidatedJson};

/// Book intake response
#[derive(Serialize, ToSchema)]
pub struct BookResponse {
    pub message: String,
    pub book: Book,
}

/// List books available for borrowing
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Available books by id", body = Vec<Book>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_books(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.catalog.list_available().await?;
    Ok(Json(books))
}

/// Get book details by ID
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.get_book(id).await?;
    Ok(Json(book))
}

/// Add a book to the catalog (admin only)
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = NewBook,
    responses(
        (status = 201, description = "Book saved", body = BookResponse),
        (status = 400, description = "Missing fields"),
        (status = 403, description = "Administrator privileges required")
    )
)]
pub async fn create_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ValidatedJson(book): ValidatedJson<NewBook>,
) -> AppResult<(StatusCode, Json<BookResponse>)> {
    claims.require_admin()?;

    let book = state.services.catalog.add_book(book).await?;

    Ok((
        StatusCode::CREATED,
        Json(BookResponse {
            message: "Book saved to catalog".to_string(),
            book,
        }),
    ))
}
