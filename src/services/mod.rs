//! Business logic services

pub mod catalog;
pub mod loans;
pub mod users;

use crate::{config::AuthConfig, error::AppResult, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub repository: Repository,
    pub users: users::UsersService,
    pub catalog: catalog::CatalogService,
    pub loans: loans::LoansService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, auth_config: AuthConfig) -> AppResult<Self> {
        Ok(Self {
            users: users::UsersService::new(repository.clone(), auth_config)?,
            catalog: catalog::CatalogService::new(repository.clone()),
            loans: loans::LoansService::new(repository.clone()),
            repository,
        })
    }
}
