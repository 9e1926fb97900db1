//! Authentication and user account service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::user::{normalize_email, NewUser, RegisterUser, Role, User, UserClaims},
    repository::Repository,
};

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    config: AuthConfig,
    /// Verified against when the email is unknown, so both login failures cost the same
    dummy_hash: String,
}

impl UsersService {
    pub fn new(repository: Repository, config: AuthConfig) -> AppResult<Self> {
        let dummy_hash = hash_password("shelfkeeper-dummy-password")?;
        Ok(Self {
            repository,
            config,
            dummy_hash,
        })
    }

    /// Register a new account
    pub async fn register(&self, request: RegisterUser) -> AppResult<User> {
        let email = normalize_email(&request.email);
        let name = request.name.trim();
        let phone = request.phone.trim();

        if name.is_empty() || phone.is_empty() || request.password.trim().is_empty() {
            return Err(AppError::Validation("Please fill all fields".to_string()));
        }

        let role = request.role.unwrap_or_default();
        if role == Role::Admin && !self.config.allow_admin_registration {
            return Err(AppError::Validation(
                "Registering administrator accounts is disabled".to_string(),
            ));
        }

        if self.repository.users.get_by_email(&email).await?.is_some() {
            return Err(AppError::DuplicateIdentity(email));
        }

        let password_hash = hash_password(&request.password)?;

        // The unique constraint still settles concurrent registrations
        let user = self
            .repository
            .users
            .create(&NewUser {
                name: name.to_string(),
                email,
                phone: phone.to_string(),
                password_hash,
                role,
            })
            .await?;

        tracing::info!(user_id = user.id, role = %user.role, "User registered");
        Ok(user)
    }

    /// Authenticate by email and password, returning a signed token
    pub async fn login(&self, email: &str, password: &str) -> AppResult<(String, User)> {
        let email = normalize_email(email);

        let Some(user) = self.repository.users.get_by_email(&email).await? else {
            let _ = verify_password(&self.dummy_hash, password);
            return Err(AppError::InvalidCredentials);
        };

        if !verify_password(&user.password_hash, password)? {
            return Err(AppError::InvalidCredentials);
        }

        let token = self.create_token_for_user(&user)?;
        tracing::debug!(user_id = user.id, "Login succeeded");
        Ok((token, user))
    }

    /// Create JWT token for a user
    fn create_token_for_user(&self, user: &User) -> AppResult<String> {
        UserClaims::for_user(user, self.config.jwt_expiration_hours)
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    /// Verify a bearer token and return its claims
    pub fn authenticate(&self, token: &str) -> AppResult<UserClaims> {
        if token.is_empty() {
            return Err(AppError::MissingToken);
        }
        UserClaims::from_token(token, &self.config.jwt_secret)
            .map_err(|e| AppError::InvalidToken(e.to_string()))
    }

    /// Get user by email
    pub async fn get_by_email(&self, email: &str) -> AppResult<User> {
        self.repository
            .users
            .get_by_email(email)
            .await?
            .ok_or_else(|| AppError::UserNotFound(email.to_string()))
    }

    /// Update display name, and password when a non-blank one is supplied
    pub async fn update_profile(
        &self,
        email: &str,
        name: &str,
        password: Option<&str>,
    ) -> AppResult<User> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Email and name are required".to_string()));
        }

        let password_hash = match password {
            Some(p) if !p.trim().is_empty() => Some(hash_password(p)?),
            _ => None,
        };

        let user = self
            .repository
            .users
            .update_profile(email, name, password_hash.as_deref())
            .await?
            .ok_or_else(|| AppError::UserNotFound(email.to_string()))?;

        tracing::info!(
            user_id = user.id,
            password_changed = password_hash.is_some(),
            "Profile updated"
        );
        Ok(user)
    }

    /// Delete an account
    pub async fn delete_account(&self, email: &str) -> AppResult<()> {
        if !self.repository.users.delete(email).await? {
            return Err(AppError::UserNotFound(email.to_string()));
        }
        tracing::info!(email, "Account deleted");
        Ok(())
    }
}

/// Hash a password using Argon2 with a random salt
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Check a password against a stored PHC hash
pub fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::repository::memory::MemoryStore;
    use tokio_test::{assert_err, assert_ok};

    fn service(allow_admin: bool) -> UsersService {
        let config = AuthConfig {
            allow_admin_registration: allow_admin,
            ..AuthConfig::default()
        };
        UsersService::new(Repository::in_memory(Arc::new(MemoryStore::new())), config).unwrap()
    }

    fn registration(email: &str, password: &str) -> RegisterUser {
        RegisterUser {
            name: "A".to_string(),
            email: email.to_string(),
            phone: "1".to_string(),
            password: password.to_string(),
            role: None,
        }
    }

    #[test]
    fn test_hash_is_salted() {
        let first = hash_password("p").unwrap();
        let second = hash_password("p").unwrap();
        assert_ne!(first, second);
        assert!(verify_password(&first, "p").unwrap());
        assert!(!verify_password(&first, "q").unwrap());
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let users = service(false);
        let user = users.register(registration("A@X.com", "p")).await.unwrap();
        assert_eq!(user.email, "a@x.com");
        assert_eq!(user.role, Role::User);
        assert_ne!(user.password_hash, "p");

        let (token, logged_in) = users.login("a@x.com", "p").await.unwrap();
        assert_eq!(logged_in.id, user.id);
        let claims = assert_ok!(users.authenticate(&token));
        assert_eq!(claims.email(), "a@x.com");
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let users = service(false);
        users.register(registration("a@x.com", "p")).await.unwrap();

        let wrong_password = assert_err!(users.login("a@x.com", "nope").await);
        let unknown_email = assert_err!(users.login("b@x.com", "p").await);
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
        assert!(matches!(wrong_password, AppError::InvalidCredentials));
        assert!(matches!(unknown_email, AppError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_duplicate_registration() {
        let users = service(false);
        users.register(registration("a@x.com", "p")).await.unwrap();
        let err = assert_err!(users.register(registration(" a@x.com", "q")).await);
        assert!(matches!(err, AppError::DuplicateIdentity(_)));
    }

    #[tokio::test]
    async fn test_admin_registration_gated() {
        let mut request = registration("root@x.com", "p");
        request.role = Some(Role::Admin);
        assert!(matches!(
            service(false).register(request).await,
            Err(AppError::Validation(_))
        ));

        let mut request = registration("root@x.com", "p");
        request.role = Some(Role::Admin);
        let admin = service(true).register(request).await.unwrap();
        assert_eq!(admin.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_update_profile_password_optional() {
        let users = service(false);
        users.register(registration("a@x.com", "p")).await.unwrap();

        let renamed = users.update_profile("a@x.com", "B", Some("  ")).await.unwrap();
        assert_eq!(renamed.name, "B");
        assert_ok!(users.login("a@x.com", "p").await);

        users.update_profile("a@x.com", "B", Some("new")).await.unwrap();
        assert_err!(users.login("a@x.com", "p").await);
        assert_ok!(users.login("a@x.com", "new").await);

        assert!(matches!(
            users.update_profile("z@x.com", "Z", None).await,
            Err(AppError::UserNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_account() {
        let users = service(false);
        users.register(registration("a@x.com", "p")).await.unwrap();
        assert_ok!(users.delete_account("a@x.com").await);
        assert!(matches!(
            users.delete_account("a@x.com").await,
            Err(AppError::UserNotFound(_))
        ));
        assert_err!(users.login("a@x.com", "p").await);
    }

    #[test]
    fn test_authenticate_rejects_garbage() {
        let users = service(false);
        assert!(matches!(users.authenticate(""), Err(AppError::MissingToken)));
        assert!(matches!(
            users.authenticate("not.a.jwt"),
            Err(AppError::InvalidToken(_))
        ));
    }
}
