//! Registration and login endpoints

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::AppResult,
    models::user::{RegisterUser, User},
};

use super::ValidatedJson;

/// Login request
#[derive(Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    /// Email address
    #[serde(default)]
    #[validate(length(min = 1, message = "Please enter email and password"))]
    pub email: String,
    /// Password
    #[serde(default)]
    #[validate(length(min = 1, message = "Please enter email and password"))]
    pub password: String,
}

/// Login response
#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub message: String,
    /// JWT access token
    pub token: String,
    /// Token type (always "Bearer")
    pub token_type: String,
    pub user: User,
}

/// Registration response
#[derive(Serialize, ToSchema)]
pub struct RegisterResponse {
    pub message: String,
    pub user: User,
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/register",
    tag = "auth",
    request_body = RegisterUser,
    responses(
        (status = 201, description = "Registration successful", body = RegisterResponse),
        (status = 400, description = "Missing fields or email already registered", body = crate::error::ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<crate::AppState>,
    ValidatedJson(request): ValidatedJson<RegisterUser>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    let user = state.services.users.register(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Registration successful".to_string(),
            user,
        }),
    ))
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Invalid email or password", body = crate::error::ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<crate::AppState>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let (token, user) = state
        .services
        .users
        .login(&request.email, &request.password)
        .await?;

    Ok(Json(LoginResponse {
        message: "Login successful".to_string(),
        token,
        token_type: "Bearer".to_string(),
        user,
    }))
}
