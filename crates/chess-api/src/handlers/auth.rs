//! Authentication API handlers
//!
//! Registration, login, token refresh and profile endpoints.

use crate::audit::{audit_log, AuditEvent, RequestContext};
use crate::auth::{
    AuthenticatedPrincipal, ChangePasswordRequest, LoginRequest, RefreshRequest,
    RegisterRequest, TokenPair, UpdateProfileRequest,
};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chess_core::UserPublic;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// Plain acknowledgement
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Register a new user account
///
/// Role defaults to jugador. Admin accounts cannot be self-registered.
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered successfully", body = UserPublic),
        (status = 400, description = "Invalid input or email already registered", body = crate::error::ApiError),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let ctx = RequestContext::from_headers(&headers);
    let user = state.auth.register(request, &ctx).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Login with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenPair),
        (status = 401, description = "Invalid credentials or inactive user", body = crate::error::ApiError),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenPair>, AppError> {
    let ctx = RequestContext::from_headers(&headers);
    let pair = state.auth.login(request, &ctx).await?;

    Ok(Json(pair))
}

/// Refresh access token
///
/// Returns a new access token and the same refresh token.
#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Token refreshed successfully", body = TokenPair),
        (status = 401, description = "Invalid refresh token", body = crate::error::ApiError),
    )
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, AppError> {
    let ctx = RequestContext::from_headers(&headers);
    let pair = state.auth.refresh(request, &ctx).await?;

    Ok(Json(pair))
}

/// Get current user profile
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current user profile", body = UserPublic),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    principal: AuthenticatedPrincipal,
) -> Result<Json<UserPublic>, AppError> {
    let user = state.auth.get_user(principal.user_id).await?;
    Ok(Json(user))
}

/// Update current user profile
#[utoipa::path(
    put,
    path = "/auth/me",
    tag = "auth",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = UserPublic),
        (status = 400, description = "Invalid input or email already registered", body = crate::error::ApiError),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_me_handler(
    State(state): State<Arc<AppState>>,
    principal: AuthenticatedPrincipal,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<UserPublic>, AppError> {
    let user = state
        .auth
        .update_profile(principal.user_id, request)
        .await?;
    Ok(Json(user))
}

/// Change password of the current user
#[utoipa::path(
    put,
    path = "/auth/change-password",
    tag = "auth",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Incorrect current password or weak new password", body = crate::error::ApiError),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn change_password_handler(
    State(state): State<Arc<AppState>>,
    principal: AuthenticatedPrincipal,
    headers: HeaderMap,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let ctx = RequestContext::from_headers(&headers);
    state
        .auth
        .change_password(principal.user_id, request, &ctx)
        .await?;

    Ok(Json(MessageResponse::new("Password changed successfully")))
}

/// Logout
///
/// Tokens are stateless: the client discards them. Issued tokens stay valid
/// until they expire.
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Logout acknowledged", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn logout_handler(
    principal: AuthenticatedPrincipal,
    headers: HeaderMap,
) -> Json<MessageResponse> {
    let ctx = RequestContext::from_headers(&headers);
    audit_log(&AuditEvent::Logout {
        user_id: principal.user_id,
        email: principal.email,
        ip_address: ctx.ip_address,
    });

    Json(MessageResponse::new(
        "Logged out successfully. Discard your tokens on the client.",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_response_serialization() {
        let json = serde_json::to_string(&MessageResponse::new("Logged out")).unwrap();
        assert_eq!(json, r#"{"message":"Logged out"}"#);
    }
}
