//! Catalog service

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, NewBook},
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Books currently on the shelf, by id ascending
    pub async fn list_available(&self) -> AppResult<Vec<Book>> {
        self.repository.books.list_available().await
    }

    /// Get a book by ID
    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.repository
            .books
            .get_by_id(id)
            .await?
            .ok_or(AppError::BookNotFound(id))
    }

    /// Add a book to the catalog
    pub async fn add_book(&self, mut book: NewBook) -> AppResult<Book> {
        book.title = book.title.trim().to_string();
        book.author = book.author.trim().to_string();
        book.isbn = book.isbn.trim().to_string();

        if book.title.is_empty() || book.author.is_empty() || book.isbn.is_empty() {
            return Err(AppError::Validation(
                "title, author, isbn and price are required".to_string(),
            ));
        }
        match book.price {
            None => {
                return Err(AppError::Validation(
                    "title, author, isbn and price are required".to_string(),
                ))
            }
            Some(price) if price.is_sign_negative() => {
                return Err(AppError::Validation("price must not be negative".to_string()))
            }
            Some(_) => {}
        }

        let created = self.repository.books.create(&book).await?;
        tracing::info!(book_id = created.id, isbn = %created.isbn, "Book added to catalog");
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::repository::memory::MemoryStore;
    use rust_decimal::Decimal;

    fn new_book(price: Option<Decimal>) -> NewBook {
        NewBook {
            title: " Dune ".to_string(),
            author: "Frank Herbert".to_string(),
            isbn: "9780441013593".to_string(),
            price,
        }
    }

    #[tokio::test]
    async fn test_list_available_ordered() {
        let repository = Repository::in_memory(Arc::new(MemoryStore::with_demo_books()));
        let catalog = CatalogService::new(repository);
        let books = catalog.list_available().await.unwrap();
        assert_eq!(books.iter().map(|b| b.id).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(books.iter().all(|b| b.available));
    }

    #[tokio::test]
    async fn test_add_book() {
        let catalog = CatalogService::new(Repository::in_memory(Arc::new(MemoryStore::new())));
        let book = catalog.add_book(new_book(Some(Decimal::new(1999, 2)))).await.unwrap();
        assert_eq!(book.title, "Dune");
        assert!(book.available);
        assert_eq!(catalog.get_book(book.id).await.unwrap(), book);

        assert!(matches!(
            catalog.add_book(new_book(None)).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            catalog.add_book(new_book(Some(Decimal::new(-1, 0)))).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(catalog.get_book(42).await, Err(AppError::BookNotFound(42))));
    }
}
