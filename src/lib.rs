//! Shelfkeeper book lending server
//!
//! A REST JSON API for registering readers, browsing the shelf, and
//! borrowing and returning books. The lending ledger guarantees that a book
//! is never out on two loans at once.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}

impl AppState {
    pub fn new(config: AppConfig, repository: repository::Repository) -> AppResult<Self> {
        let services = services::Services::new(repository, config.auth.clone())?;
        Ok(Self {
            config: Arc::new(config),
            services: Arc::new(services),
        })
    }
}
