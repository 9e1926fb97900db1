//! Lending ledger service
//!
//! Callers pass an already-authenticated borrower email; how it was
//! authenticated is not this service's concern.

use crate::{
    error::{AppError, AppResult},
    models::loan::{Loan, LoanDetails},
    repository::Repository,
};

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
}

impl LoansService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Borrow a book. No retry: a lost race is reported as `BookUnavailable`.
    pub async fn borrow(&self, book_id: i32, user_email: &str) -> AppResult<Loan> {
        match self.repository.loans.borrow(book_id, user_email).await {
            Ok(loan) => {
                tracing::info!(loan_id = loan.id, book_id, user_email, "Book borrowed");
                Ok(loan)
            }
            Err(e @ AppError::BookUnavailable(_)) => {
                tracing::debug!(book_id, user_email, "Borrow rejected, book is out");
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Return a borrowed book
    pub async fn return_book(&self, book_id: i32, user_email: &str) -> AppResult<Loan> {
        let loan = self.repository.loans.return_book(book_id, user_email).await?;
        tracing::info!(loan_id = loan.id, book_id, user_email, "Book returned");
        Ok(loan)
    }

    /// Get loans for a user, newest first
    pub async fn get_user_loans(&self, user_email: &str) -> AppResult<Vec<LoanDetails>> {
        self.repository.loans.get_user_loans(user_email).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        models::user::{NewUser, Role},
        repository::memory::MemoryStore,
    };

    async fn ledger_with_readers(emails: &[&str]) -> (LoansService, Repository) {
        let repository = Repository::in_memory(Arc::new(MemoryStore::with_demo_books()));
        for email in emails {
            repository
                .users
                .create(&NewUser {
                    name: "Reader".to_string(),
                    email: email.to_string(),
                    phone: "1".to_string(),
                    password_hash: "hash".to_string(),
                    role: Role::User,
                })
                .await
                .unwrap();
        }
        (LoansService::new(repository.clone()), repository)
    }

    #[tokio::test]
    async fn test_borrow_return_round_trip() {
        let (ledger, repository) = ledger_with_readers(&["a@x.com"]).await;

        ledger.borrow(1, "a@x.com").await.unwrap();
        let shelf = repository.books.list_available().await.unwrap();
        assert!(shelf.iter().all(|b| b.id != 1));

        let returned = ledger.return_book(1, "a@x.com").await.unwrap();
        assert!(returned.returned);
        assert!(returned.returned_at.is_some());

        let shelf = repository.books.list_available().await.unwrap();
        assert!(shelf.iter().any(|b| b.id == 1));
    }

    #[tokio::test]
    async fn test_second_borrow_by_same_user_rejected() {
        let (ledger, _) = ledger_with_readers(&["a@x.com"]).await;
        ledger.borrow(1, "a@x.com").await.unwrap();
        assert!(matches!(
            ledger.borrow(1, "a@x.com").await,
            Err(AppError::BookUnavailable(1))
        ));
    }

    #[tokio::test]
    async fn test_only_borrower_can_return() {
        let (ledger, _) = ledger_with_readers(&["a@x.com", "b@x.com"]).await;
        ledger.borrow(2, "a@x.com").await.unwrap();
        assert!(matches!(
            ledger.return_book(2, "b@x.com").await,
            Err(AppError::NoOpenLoan { .. })
        ));
        ledger.return_book(2, "a@x.com").await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_borrows_single_winner() {
        let emails: Vec<String> = (0..16).map(|i| format!("reader{}@x.com", i)).collect();
        let refs: Vec<&str> = emails.iter().map(String::as_str).collect();
        let (ledger, _) = ledger_with_readers(&refs).await;
        let ledger = Arc::new(ledger);

        let handles: Vec<_> = emails
            .iter()
            .cloned()
            .map(|email| {
                let ledger = ledger.clone();
                tokio::spawn(async move { ledger.borrow(1, &email).await })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(AppError::BookUnavailable(1)) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_history_newest_first() {
        let (ledger, _) = ledger_with_readers(&["a@x.com"]).await;
        ledger.borrow(1, "a@x.com").await.unwrap();
        ledger.return_book(1, "a@x.com").await.unwrap();
        ledger.borrow(2, "a@x.com").await.unwrap();

        let history = ledger.get_user_loans("a@x.com").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].book.id, 2);
        assert!(!history[0].returned);
        assert_eq!(history[1].book.id, 1);
        assert!(history[1].returned);
    }
}
