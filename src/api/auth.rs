use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{request::Parts, HeaderMap, StatusCode},
    Json,
};
use std::sync::Arc;

use crate::auth::{AuthError, AuthResult};
use crate::db::{
    ForgotPasswordRequest, LoginRequest, MessageResponse, RefreshRequest, RegisterRequest,
    ResetPasswordRequest, UpdateProfileRequest, User, UserResponse,
};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{
    non_blank, validate_email, validate_optional, validate_password_strength,
};

const MAX_NAME_LENGTH: usize = 100;

/// Same body for known and unknown addresses
const RESET_REQUESTED_MESSAGE: &str =
    "If an account exists for that email, a password reset link has been sent";

/// Extract a bearer token from the Authorization header
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// The user behind a valid access token
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// A signed-in admin
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

        match state.auth.authenticate(token).await {
            Ok(user) => Ok(CurrentUser(user)),
            Err(AuthError::Authentication) => {
                Err(ApiError::unauthorized("Invalid or expired access token"))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.role.is_admin() {
            return Err(ApiError::forbidden("Admin access required"));
        }
        Ok(AdminUser(user))
    }
}

fn validate_register_request(req: &RegisterRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors
        .check("email", validate_email(&req.email))
        .check("password", validate_password_strength(&req.password))
        .check(
            "firstName",
            validate_optional(&req.first_name, "First name", MAX_NAME_LENGTH),
        )
        .check(
            "lastName",
            validate_optional(&req.last_name, "Last name", MAX_NAME_LENGTH),
        );
    errors.finish()
}

/// Register a new account and sign it in
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResult>), ApiError> {
    validate_register_request(&request)?;

    let result = state
        .auth
        .register(
            &request.email,
            &request.password,
            non_blank(request.first_name),
            non_blank(request.last_name),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(result)))
}

/// Login endpoint
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResult>, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if request.email.trim().is_empty() {
        errors.add("email", "Email is required");
    }
    if request.password.is_empty() {
        errors.add("password", "Password is required");
    }
    errors.finish()?;

    let result = state.auth.login(&request.email, &request.password).await?;
    Ok(Json(result))
}

/// Exchange a refresh token for a new token pair
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<AuthResult>, ApiError> {
    if request.refresh_token.trim().is_empty() {
        return Err(ApiError::validation_field(
            "refreshToken",
            "Refresh token is required",
        ));
    }

    let result = state.auth.refresh(request.refresh_token.trim()).await?;
    Ok(Json(result))
}

/// Request a password reset. Answers identically whether or not the email is registered.
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if let Err(e) = validate_email(&request.email) {
        return Err(ApiError::validation_field("email", e));
    }

    match state.auth.forgot_password(&request.email).await {
        Ok(ticket) => state.reset_notifier.deliver(&ticket),
        Err(AuthError::NotFound) => {
            tracing::debug!("Password reset requested for unknown email");
        }
        Err(e) => return Err(e.into()),
    }

    Ok(Json(MessageResponse::new(RESET_REQUESTED_MESSAGE)))
}

/// Set a new password using a reset token
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if request.token.trim().is_empty() {
        errors.add("token", "Reset token is required");
    }
    errors.check("newPassword", validate_password_strength(&request.new_password));
    errors.finish()?;

    state
        .auth
        .reset_password(request.token.trim(), &request.new_password)
        .await?;

    Ok(Json(MessageResponse::new("Password has been reset")))
}

/// Get the signed-in user
pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(user.into())
}

/// Update the signed-in user's name
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors
        .check(
            "firstName",
            validate_optional(&request.first_name, "First name", MAX_NAME_LENGTH),
        )
        .check(
            "lastName",
            validate_optional(&request.last_name, "Last name", MAX_NAME_LENGTH),
        );
    errors.finish()?;

    let first_name = request.first_name.as_deref().map(str::trim);
    let last_name = request.last_name.as_deref().map(str::trim);

    let updated = state
        .auth
        .update_profile(&user.id, first_name, last_name)
        .await?;

    Ok(Json(updated.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert("Authorization", HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));

        headers.insert("Authorization", HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert("Authorization", HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
