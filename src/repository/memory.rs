//! In-process store implementing every repository trait.
//!
//! All tables live behind one async mutex, so each operation observes and
//! mutates a consistent snapshot. That gives borrow/return the same
//! single-winner, all-or-nothing behaviour the PostgreSQL transactions give.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, NewBook},
        loan::{Loan, LoanDetails},
        user::{NewUser, User},
    },
};

use super::{BooksRepository, LoansRepository, UsersRepository};

#[derive(Default)]
struct Tables {
    users: BTreeMap<String, User>,
    books: BTreeMap<i32, Book>,
    loans: Vec<Loan>,
    next_user_id: i32,
    next_book_id: i32,
    next_loan_id: i32,
}

impl Tables {
    fn next_id(counter: &mut i32) -> i32 {
        *counter += 1;
        *counter
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with the demo catalog
    pub fn with_demo_books() -> Self {
        let mut tables = Tables::default();
        for (title, author, isbn, price) in [
            ("The Silent Patient", "Alex Michaelides", "1234", 250),
            ("Year of the Water Horse", "Jane Doe", "5678", 210),
            ("The Fault in Our Stars", "John Green", "91011", 100),
        ] {
            let id = Tables::next_id(&mut tables.next_book_id);
            tables.books.insert(
                id,
                Book {
                    id,
                    title: title.to_string(),
                    author: author.to_string(),
                    isbn: isbn.to_string(),
                    price: Decimal::from(price),
                    available: true,
                },
            );
        }
        Self {
            tables: Mutex::new(tables),
        }
    }

    /// Copy of every book and loan row, taken under one lock
    pub async fn snapshot(&self) -> (Vec<Book>, Vec<Loan>) {
        let tables = self.tables.lock().await;
        (
            tables.books.values().cloned().collect(),
            tables.loans.clone(),
        )
    }
}

#[async_trait]
impl UsersRepository for MemoryStore {
    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self.tables.lock().await.users.get(email).cloned())
    }

    async fn create(&self, user: &NewUser) -> AppResult<User> {
        let mut tables = self.tables.lock().await;
        if tables.users.contains_key(&user.email) {
            return Err(AppError::DuplicateIdentity(user.email.clone()));
        }
        let created = User {
            id: Tables::next_id(&mut tables.next_user_id),
            name: user.name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            password_hash: user.password_hash.clone(),
            role: user.role,
            created_at: Utc::now(),
        };
        tables.users.insert(created.email.clone(), created.clone());
        Ok(created)
    }

    async fn update_profile(
        &self,
        email: &str,
        name: &str,
        password_hash: Option<&str>,
    ) -> AppResult<Option<User>> {
        let mut tables = self.tables.lock().await;
        let Some(user) = tables.users.get_mut(email) else {
            return Ok(None);
        };
        user.name = name.to_string();
        if let Some(hash) = password_hash {
            user.password_hash = hash.to_string();
        }
        Ok(Some(user.clone()))
    }

    async fn delete(&self, email: &str) -> AppResult<bool> {
        let mut tables = self.tables.lock().await;
        if !tables.users.contains_key(email) {
            return Ok(false);
        }
        if tables
            .loans
            .iter()
            .any(|l| l.user_email == email && l.is_open())
        {
            return Err(AppError::AccountHasOpenLoans(email.to_string()));
        }
        tables.users.remove(email);
        tables.loans.retain(|l| l.user_email != email);
        Ok(true)
    }
}

#[async_trait]
impl BooksRepository for MemoryStore {
    async fn list_available(&self) -> AppResult<Vec<Book>> {
        let tables = self.tables.lock().await;
        // BTreeMap iteration is already id-ascending
        Ok(tables
            .books
            .values()
            .filter(|b| b.available)
            .cloned()
            .collect())
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Option<Book>> {
        Ok(self.tables.lock().await.books.get(&id).cloned())
    }

    async fn create(&self, book: &NewBook) -> AppResult<Book> {
        let mut tables = self.tables.lock().await;
        let id = Tables::next_id(&mut tables.next_book_id);
        let created = Book {
            id,
            title: book.title.clone(),
            author: book.author.clone(),
            isbn: book.isbn.clone(),
            price: book.price.unwrap_or_default(),
            available: true,
        };
        tables.books.insert(id, created.clone());
        Ok(created)
    }
}

#[async_trait]
impl LoansRepository for MemoryStore {
    async fn borrow(&self, book_id: i32, user_email: &str) -> AppResult<Loan> {
        let mut tables = self.tables.lock().await;

        // Same precedence as the PostgreSQL path: book state, then borrower
        match tables.books.get(&book_id) {
            None => return Err(AppError::BookNotFound(book_id)),
            Some(book) if !book.available => return Err(AppError::BookUnavailable(book_id)),
            Some(_) => {}
        }
        if !tables.users.contains_key(user_email) {
            return Err(AppError::UserNotFound(user_email.to_string()));
        }

        if let Some(book) = tables.books.get_mut(&book_id) {
            book.available = false;
        }

        let loan = Loan {
            id: Tables::next_id(&mut tables.next_loan_id),
            book_id,
            user_email: user_email.to_string(),
            borrowed_at: Utc::now(),
            returned: false,
            returned_at: None,
        };
        tables.loans.push(loan.clone());
        Ok(loan)
    }

    async fn return_book(&self, book_id: i32, user_email: &str) -> AppResult<Loan> {
        let mut tables = self.tables.lock().await;

        let loan = tables
            .loans
            .iter_mut()
            .find(|l| l.book_id == book_id && l.user_email == user_email && l.is_open())
            .ok_or_else(|| AppError::NoOpenLoan {
                book_id,
                user_email: user_email.to_string(),
            })?;
        loan.returned = true;
        loan.returned_at = Some(Utc::now());
        let loan = loan.clone();

        if let Some(book) = tables.books.get_mut(&book_id) {
            book.available = true;
        }
        Ok(loan)
    }

    async fn get_user_loans(&self, user_email: &str) -> AppResult<Vec<LoanDetails>> {
        let tables = self.tables.lock().await;
        let mut loans: Vec<LoanDetails> = tables
            .loans
            .iter()
            .filter(|l| l.user_email == user_email)
            .filter_map(|l| {
                tables.books.get(&l.book_id).map(|book| LoanDetails {
                    loan_id: l.id,
                    book: book.clone(),
                    borrowed_at: l.borrowed_at,
                    returned: l.returned,
                    returned_at: l.returned_at,
                })
            })
            .collect();
        loans.sort_by(|a, b| {
            b.borrowed_at
                .cmp(&a.borrowed_at)
                .then(b.loan_id.cmp(&a.loan_id))
        });
        Ok(loans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::Role;

    async fn store_with_reader(email: &str) -> MemoryStore {
        let store = MemoryStore::with_demo_books();
        UsersRepository::create(
            &store,
            &NewUser {
                name: "Reader".to_string(),
                email: email.to_string(),
                phone: "1".to_string(),
                password_hash: "hash".to_string(),
                role: Role::User,
            },
        )
        .await
        .unwrap();
        store
    }

    #[tokio::test]
    async fn test_borrow_flips_availability() {
        let store = store_with_reader("a@x.com").await;

        let loan = store.borrow(1, "a@x.com").await.unwrap();
        assert!(loan.is_open());

        let available = store.list_available().await.unwrap();
        assert_eq!(available.iter().map(|b| b.id).collect::<Vec<_>>(), vec![2, 3]);

        assert!(matches!(
            store.borrow(1, "a@x.com").await,
            Err(AppError::BookUnavailable(1))
        ));
        assert!(matches!(
            store.borrow(99, "a@x.com").await,
            Err(AppError::BookNotFound(99))
        ));
    }

    #[tokio::test]
    async fn test_borrow_error_precedence() {
        let store = store_with_reader("a@x.com").await;
        store.borrow(1, "a@x.com").await.unwrap();

        assert!(matches!(
            store.borrow(1, "ghost@x.com").await,
            Err(AppError::BookUnavailable(1))
        ));
        assert!(matches!(
            store.borrow(99, "ghost@x.com").await,
            Err(AppError::BookNotFound(99))
        ));

        let before = store.snapshot().await;
        assert!(matches!(
            store.borrow(2, "ghost@x.com").await,
            Err(AppError::UserNotFound(_))
        ));
        assert_eq!(store.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_return_without_loan_changes_nothing() {
        let store = store_with_reader("a@x.com").await;
        let before = store.snapshot().await;

        assert!(matches!(
            store.return_book(2, "a@x.com").await,
            Err(AppError::NoOpenLoan { book_id: 2, .. })
        ));
        assert_eq!(store.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_delete_refused_with_open_loan() {
        let store = store_with_reader("a@x.com").await;
        store.borrow(3, "a@x.com").await.unwrap();

        assert!(matches!(
            UsersRepository::delete(&store, "a@x.com").await,
            Err(AppError::AccountHasOpenLoans(_))
        ));

        store.return_book(3, "a@x.com").await.unwrap();
        assert!(UsersRepository::delete(&store, "a@x.com").await.unwrap());

        let (_, loans) = store.snapshot().await;
        assert!(loans.is_empty());
        assert!(!UsersRepository::delete(&store, "a@x.com").await.unwrap());
    }
}
