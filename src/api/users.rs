//! Profile endpoints

use axum::{body::Bytes, extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::user::{DeleteProfile, UpdateProfile, User},
};

use super::{AuthenticatedUser, ValidatedJson};

/// Profile update response
#[derive(Serialize, ToSchema)]
pub struct ProfileResponse {
    pub message: String,
    pub user: User,
}

/// Plain acknowledgement
#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Get the current user's profile
#[utoipa::path(
    get,
    path = "/profile",
    tag = "profile",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Account no longer exists")
    )
)]
pub async fn get_profile(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<User>> {
    let user = state.services.users.get_by_email(claims.email()).await?;
    Ok(Json(user))
}

/// Update name and optionally password
#[utoipa::path(
    put,
    path = "/profile",
    tag = "profile",
    security(("bearer_auth" = [])),
    request_body = UpdateProfile,
    responses(
        (status = 200, description = "Profile updated", body = ProfileResponse),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Email names another user"),
        (status = 404, description = "User not found")
    )
)]
pub async fn update_profile(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ValidatedJson(profile): ValidatedJson<UpdateProfile>,
) -> AppResult<Json<ProfileResponse>> {
    let email = claims.resolve_target(profile.email.as_deref())?;

    let user = state
        .services
        .users
        .update_profile(&email, &profile.name, profile.password.as_deref())
        .await?;

    Ok(Json(ProfileResponse {
        message: "Profile updated successfully".to_string(),
        user,
    }))
}

/// Delete an account
#[utoipa::path(
    delete,
    path = "/profile",
    tag = "profile",
    security(("bearer_auth" = [])),
    request_body = DeleteProfile,
    responses(
        (status = 200, description = "Profile deleted", body = MessageResponse),
        (status = 403, description = "Email names another user"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Account still has books on loan")
    )
)]
pub async fn delete_profile(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    body: Bytes,
) -> AppResult<Json<MessageResponse>> {
    let request = parse_delete_body(&body)?;
    let email = claims.resolve_target(request.email.as_deref())?;

    state.services.users.delete_account(&email).await?;

    Ok(Json(MessageResponse {
        message: "Profile deleted successfully".to_string(),
    }))
}

/// An empty body targets the caller; any other body must be valid JSON,
/// whatever its content type.
fn parse_delete_body(body: &[u8]) -> AppResult<DeleteProfile> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(DeleteProfile::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("Invalid request body: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_delete_body() {
        assert!(parse_delete_body(b"").unwrap().email.is_none());
        assert!(parse_delete_body(b" \n").unwrap().email.is_none());
        assert_eq!(
            parse_delete_body(br#"{"email":"b@x.com"}"#).unwrap().email.as_deref(),
            Some("b@x.com")
        );
        assert!(matches!(
            parse_delete_body(br#"{"email":5}"#),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            parse_delete_body(b"email=b@x.com"),
            Err(AppError::Validation(_))
        ));
    }
}
