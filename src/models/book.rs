//! Book (catalog entry) model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Book as stored in the catalog.
///
/// `available` is owned by the lending ledger: it is flipped only by borrow
/// and return, and is `true` exactly when the book has no open loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub isbn: String,
    #[schema(value_type = String, example = "250.00")]
    pub price: Decimal,
    pub available: bool,
}

/// Book intake request (admin)
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewBook {
    #[serde(default)]
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "author is required"))]
    pub author: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "isbn is required"))]
    pub isbn: String,
    #[schema(value_type = Option<String>, example = "250.00")]
    pub price: Option<Decimal>,
}
