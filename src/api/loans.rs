//! Borrow and return endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::loan::{Loan, LoanDetails},
};

use super::{AuthenticatedUser, ValidatedJson};

/// Borrow request
#[derive(Deserialize, Validate, ToSchema)]
pub struct BorrowRequest {
    /// Book ID
    pub book_id: Option<i32>,
}

/// Return request
#[derive(Deserialize, Validate, ToSchema)]
pub struct ReturnRequest {
    /// Book ID
    pub book_id: Option<i32>,
    /// Borrower; defaults to the caller, admins may name anyone
    pub user_email: Option<String>,
}

/// Ledger mutation response
#[derive(Serialize, ToSchema)]
pub struct LoanResponse {
    pub message: String,
    pub loan: Loan,
}

fn require_book_id(book_id: Option<i32>) -> AppResult<i32> {
    book_id.ok_or_else(|| AppError::Validation("book_id is required".to_string()))
}

/// Borrow a book as the authenticated user
#[utoipa::path(
    post,
    path = "/borrow",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = BorrowRequest,
    responses(
        (status = 201, description = "Book borrowed", body = LoanResponse),
        (status = 400, description = "Book unavailable or book_id missing"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn borrow_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ValidatedJson(request): ValidatedJson<BorrowRequest>,
) -> AppResult<(StatusCode, Json<LoanResponse>)> {
    let book_id = require_book_id(request.book_id)?;

    let loan = state.services.loans.borrow(book_id, claims.email()).await?;

    Ok((
        StatusCode::CREATED,
        Json(LoanResponse {
            message: "Book borrowed successfully".to_string(),
            loan,
        }),
    ))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = ReturnRequest,
    responses(
        (status = 200, description = "Book returned", body = LoanResponse),
        (status = 403, description = "user_email names another user"),
        (status = 404, description = "No open loan for this book and user")
    )
)]
pub async fn return_book(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ValidatedJson(request): ValidatedJson<ReturnRequest>,
) -> AppResult<Json<LoanResponse>> {
    let book_id = require_book_id(request.book_id)?;
    let email = claims.resolve_target(request.user_email.as_deref())?;

    let loan = state.services.loans.return_book(book_id, &email).await?;

    Ok(Json(LoanResponse {
        message: "Book returned successfully".to_string(),
        loan,
    }))
}

/// Loan history of a borrower
#[utoipa::path(
    get,
    path = "/borrowed/{email}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("email" = String, Path, description = "Borrower email")
    ),
    responses(
        (status = 200, description = "Loans, newest first", body = Vec<LoanDetails>),
        (status = 403, description = "Email names another user")
    )
)]
pub async fn get_borrowed(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(email): Path<String>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    let email = claims.resolve_target(Some(&email))?;

    let loans = state.services.loans.get_user_loans(&email).await?;
    Ok(Json(loans))
}
