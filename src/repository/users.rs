//! Users repository (credential store)

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::user::{NewUser, User},
};

#[async_trait]
pub trait UsersRepository: Send + Sync {
    /// Get user by email (identity key)
    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>>;

    /// Insert a user; fails with `DuplicateIdentity` when the email is taken
    async fn create(&self, user: &NewUser) -> AppResult<User>;

    /// Set the display name, and the credential hash when given.
    /// Returns `None` when no user has this email.
    async fn update_profile(
        &self,
        email: &str,
        name: &str,
        password_hash: Option<&str>,
    ) -> AppResult<Option<User>>;

    /// Delete a user and their returned-loan history.
    /// Returns `false` when no user has this email; fails with
    /// `AccountHasOpenLoans` while a book is still out.
    async fn delete(&self, email: &str) -> AppResult<bool>;
}

#[derive(Clone)]
pub struct PgUsersRepository {
    pool: Pool<Postgres>,
}

impl PgUsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UsersRepository for PgUsersRepository {
    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn create(&self, user: &NewUser) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, phone, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(user.role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::DuplicateIdentity(user.email.clone())
            }
            other => other.into(),
        })
    }

    async fn update_profile(
        &self,
        email: &str,
        name: &str,
        password_hash: Option<&str>,
    ) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = $1, password_hash = COALESCE($2, password_hash)
            WHERE email = $3
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(password_hash)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn delete(&self, email: &str) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;

        // Row lock conflicts with the key-share lock a concurrent loan insert takes
        let found: Option<i32> =
            sqlx::query_scalar("SELECT id FROM users WHERE email = $1 FOR UPDATE")
                .bind(email)
                .fetch_optional(&mut *tx)
                .await?;

        if found.is_none() {
            tx.rollback().await?;
            return Ok(false);
        }

        let has_open_loans: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM loans WHERE user_email = $1 AND NOT returned)",
        )
        .bind(email)
        .fetch_one(&mut *tx)
        .await?;

        if has_open_loans {
            tx.rollback().await?;
            return Err(AppError::AccountHasOpenLoans(email.to_string()));
        }

        sqlx::query("DELETE FROM users WHERE email = $1")
            .bind(email)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }
}
