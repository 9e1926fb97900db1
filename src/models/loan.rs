//! Loan (borrow ledger entry) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::book::Book;

/// Loan model from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i32,
    pub book_id: i32,
    /// Borrower identity key
    pub user_email: String,
    pub borrowed_at: DateTime<Utc>,
    pub returned: bool,
    pub returned_at: Option<DateTime<Utc>>,
}

impl Loan {
    pub fn is_open(&self) -> bool {
        !self.returned
    }
}

/// Loan joined with a snapshot of its book, for a borrower's history
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LoanDetails {
    pub loan_id: i32,
    #[sqlx(flatten)]
    pub book: Book,
    pub borrowed_at: DateTime<Utc>,
    pub returned: bool,
    pub returned_at: Option<DateTime<Utc>>,
}
