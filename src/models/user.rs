//! User model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;
use validator::Validate;

use crate::error::AppError;

/// User role, fixed at registration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

// Stored as TEXT
impl sqlx::Type<Postgres> for Role {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for Role {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<Postgres>>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for Role {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Registered user. The credential hash never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub phone: String,
    /// Hashed password (argon2)
    #[serde(skip_serializing, default)]
    #[schema(read_only)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Row to insert on registration, password already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub role: Role,
}

/// Registration request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterUser {
    #[serde(default)]
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[serde(default)]
    #[validate(email(message = "a valid email is required"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "phone is required"))]
    pub phone: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
    /// Defaults to `user`
    pub role: Option<Role>,
}

/// Update own profile request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProfile {
    /// Legacy identity field; must name the caller unless the caller is admin
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    /// New password; blank leaves the current one in place
    pub password: Option<String>,
}

/// Delete account request body (optional)
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct DeleteProfile {
    pub email: Option<String>,
}

/// Canonical form of the identity key
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// JWT claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    /// User ID
    pub sub: String,
    /// Email, the identity key
    pub email: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    pub fn for_user(user: &User, ttl_hours: u64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role,
            exp: now + (ttl_hours as i64 * 3600),
            iat: now,
        }
    }

    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse and verify a JWT token (signature and expiry)
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Require admin privileges
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Administrator privileges required".to_string()))
        }
    }

    /// Resolve which account a request targets. Without an explicit email the
    /// caller acts on themself; naming someone else needs admin rights.
    pub fn resolve_target(&self, requested: Option<&str>) -> Result<String, AppError> {
        match requested.map(normalize_email) {
            None => Ok(self.email.clone()),
            Some(email) if email.is_empty() || email == self.email => Ok(self.email.clone()),
            Some(email) if self.is_admin() => Ok(email),
            Some(_) => Err(AppError::Forbidden(
                "Cannot act on another user's account".to_string(),
            )),
        }
    }
}
