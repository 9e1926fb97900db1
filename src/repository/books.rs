//! Books repository (catalog)

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::book::{Book, NewBook},
};

#[async_trait]
pub trait BooksRepository: Send + Sync {
    /// Books with no open loan, by id ascending
    async fn list_available(&self) -> AppResult<Vec<Book>>;

    async fn get_by_id(&self, id: i32) -> AppResult<Option<Book>>;

    /// Add a book to the catalog; new books start available
    async fn create(&self, book: &NewBook) -> AppResult<Book>;
}

#[derive(Clone)]
pub struct PgBooksRepository {
    pool: Pool<Postgres>,
}

impl PgBooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BooksRepository for PgBooksRepository {
    async fn list_available(&self) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            "SELECT * FROM books WHERE available = TRUE ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(book)
    }

    async fn create(&self, book: &NewBook) -> AppResult<Book> {
        let created = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, author, isbn, price, available)
            VALUES ($1, $2, $3, $4, TRUE)
            RETURNING *
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(book.price.unwrap_or_default())
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }
}
