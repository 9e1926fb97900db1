//! Loans repository: the borrow/return ledger

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::loan::{Loan, LoanDetails},
};

/// Ledger store. Both mutations are all-or-nothing: a loan row and the
/// book's availability flag always change together.
#[async_trait]
pub trait LoansRepository: Send + Sync {
    /// Claim an available book for `user_email` and record the loan.
    /// Fails with `BookUnavailable` if another open loan holds it and
    /// `BookNotFound` if the book does not exist.
    async fn borrow(&self, book_id: i32, user_email: &str) -> AppResult<Loan>;

    /// Close the borrower's open loan on `book_id` and release the book.
    /// Fails with `NoOpenLoan` when there is nothing to return.
    async fn return_book(&self, book_id: i32, user_email: &str) -> AppResult<Loan>;

    /// Loan history of a borrower, newest first
    async fn get_user_loans(&self, user_email: &str) -> AppResult<Vec<LoanDetails>>;
}

#[derive(Clone)]
pub struct PgLoansRepository {
    pool: Pool<Postgres>,
}

impl PgLoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoansRepository for PgLoansRepository {
    async fn borrow(&self, book_id: i32, user_email: &str) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        // Conditional update: the affected-row count decides the race
        let claimed = sqlx::query(
            "UPDATE books SET available = FALSE WHERE id = $1 AND available = TRUE",
        )
        .bind(book_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if claimed == 0 {
            tx.rollback().await?;

            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE id = $1)")
                    .bind(book_id)
                    .fetch_one(&self.pool)
                    .await?;

            return Err(if exists {
                AppError::BookUnavailable(book_id)
            } else {
                AppError::BookNotFound(book_id)
            });
        }

        let loan = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (book_id, user_email, borrowed_at, returned)
            VALUES ($1, $2, $3, FALSE)
            RETURNING *
            "#,
        )
        .bind(book_id)
        .bind(user_email)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                AppError::UserNotFound(user_email.to_string())
            }
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::BookUnavailable(book_id)
            }
            other => other.into(),
        })?;

        tx.commit().await?;
        Ok(loan)
    }

    async fn return_book(&self, book_id: i32, user_email: &str) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        let loan = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans
            SET returned = TRUE, returned_at = $3
            WHERE book_id = $1 AND user_email = $2 AND NOT returned
            RETURNING *
            "#,
        )
        .bind(book_id)
        .bind(user_email)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(loan) = loan else {
            tx.rollback().await?;
            return Err(AppError::NoOpenLoan {
                book_id,
                user_email: user_email.to_string(),
            });
        };

        sqlx::query("UPDATE books SET available = TRUE WHERE id = $1")
            .bind(book_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(loan)
    }

    async fn get_user_loans(&self, user_email: &str) -> AppResult<Vec<LoanDetails>> {
        let loans = sqlx::query_as::<_, LoanDetails>(
            r#"
            SELECT l.id AS loan_id, l.borrowed_at, l.returned, l.returned_at,
                   b.id, b.title, b.author, b.isbn, b.price, b.available
            FROM loans l
            JOIN books b ON b.id = l.book_id
            WHERE l.user_email = $1
            ORDER BY l.borrowed_at DESC, l.id DESC
            "#,
        )
        .bind(user_email)
        .fetch_all(&self.pool)
        .await?;

        Ok(loans)
    }
}
