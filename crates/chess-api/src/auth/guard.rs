//! Request authentication
//!
//! Runs once per request, in order:
//! 1. Read the bearer token from the Authorization header
//! 2. Verify it as an access token
//! 3. Resolve the user by the token's `user_id`
//! 4. Reject deactivated users
//!
//! On success an [`AuthenticatedPrincipal`] is attached to the request
//! extensions. Role checks run afterwards, see [`super::policy`].
//!
//! The role of the principal comes from the stored user record, not from the
//! token, so a role change or deactivation applies to tokens already issued.

use super::jwt::TokenKind;
use super::tokens::{InvalidReason, TokenService, Verification};
use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chess_core::{Role, StoreError, UserDirectory};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use utoipa::ToSchema;

/// Identity attached to an authenticated request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedPrincipal {
    pub user_id: i64,
    pub email: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
}

/// Why a request was not let through
#[derive(Debug, Error)]
pub enum AuthRejection {
    #[error("Missing or malformed Authorization header")]
    MissingCredentials,

    #[error("Invalid token: {0}")]
    InvalidToken(InvalidReason),

    #[error("User not found")]
    UnknownUser,

    #[error("Inactive user")]
    InactiveUser,

    #[error("Insufficient role")]
    InsufficientRole { allowed: &'static [Role] },

    #[error("User lookup failed: {0}")]
    Directory(#[from] StoreError),
}

impl AuthRejection {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthRejection::InsufficientRole { .. } => StatusCode::FORBIDDEN,
            AuthRejection::Directory(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AuthRejection::MissingCredentials => ApiError::unauthorized("Not authenticated"),
            // Every token failure looks the same from outside
            AuthRejection::InvalidToken(_) => ApiError::unauthorized("Invalid or expired token"),
            AuthRejection::UnknownUser => ApiError::unauthorized("User not found"),
            AuthRejection::InactiveUser => ApiError::unauthorized("Inactive user"),
            AuthRejection::InsufficientRole { allowed } => ApiError::forbidden(format!(
                "Insufficient permissions. Required role: {}",
                role_list(allowed)
            )),
            AuthRejection::Directory(e) => {
                tracing::error!(error = %e, "User lookup failed during authentication");
                ApiError::internal_error()
            }
        };

        if status == StatusCode::UNAUTHORIZED {
            (status, [(header::WWW_AUTHENTICATE, "Bearer")], Json(body)).into_response()
        } else {
            (status, Json(body)).into_response()
        }
    }
}

pub(crate) fn role_list(roles: &[Role]) -> String {
    roles
        .iter()
        .map(Role::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Bearer token from the Authorization header
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthRejection> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthRejection::MissingCredentials)?
        .to_str()
        .map_err(|_| AuthRejection::MissingCredentials)?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or(AuthRejection::MissingCredentials)?;
    let token = token.trim();

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthRejection::MissingCredentials);
    }
    Ok(token)
}

/// Resolve the caller of a request
pub async fn authenticate(
    tokens: &TokenService,
    users: &dyn UserDirectory,
    headers: &HeaderMap,
) -> Result<AuthenticatedPrincipal, AuthRejection> {
    let token = bearer_token(headers)?;

    let claims = match tokens.verify(token, TokenKind::Access) {
        Verification::Valid(claims) => claims,
        Verification::Invalid(reason) => return Err(AuthRejection::InvalidToken(reason)),
    };

    let user = users
        .find_user_by_id(claims.user_id)
        .await?
        .ok_or(AuthRejection::UnknownUser)?;

    if !user.active {
        return Err(AuthRejection::InactiveUser);
    }

    Ok(AuthenticatedPrincipal {
        user_id: user.id,
        email: user.email,
        role: user.role,
        first_name: user.first_name,
        last_name: user.last_name,
    })
}

/// Middleware that requires an authenticated, active user
///
/// ```ignore
/// let protected = Router::new()
///     .route("/auth/me", get(me))
///     .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));
/// ```
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthRejection> {
    let principal = match authenticate(&state.tokens, state.store.as_ref(), request.headers()).await
    {
        Ok(principal) => principal,
        Err(rejection) => {
            let reason = match &rejection {
                AuthRejection::InvalidToken(reason) => Some(reason.to_string()),
                AuthRejection::UnknownUser => Some("unknown_user".to_string()),
                AuthRejection::InactiveUser => Some("inactive_user".to_string()),
                _ => None,
            };
            if let Some(reason) = reason {
                audit_log(&AuditEvent::InvalidToken {
                    ip_address: extract_ip_address(request.headers()),
                    user_agent: extract_user_agent(request.headers()),
                    reason,
                });
            }
            return Err(rejection);
        }
    };

    tracing::debug!(user_id = principal.user_id, role = %principal.role, "Request authenticated");
    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedPrincipal
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedPrincipal>()
            .cloned()
            .ok_or(AuthRejection::MissingCredentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tokens::test_token_service;
    use chess_core::{JsonStore, User};
    use chrono::Utc;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, value.parse().unwrap());
        headers
    }

    async fn store_with_user(active: bool) -> (tempfile::TempDir, JsonStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();
        store
            .insert_with(|id| User {
                id,
                email: "a@x.com".to_string(),
                first_name: "Ana".to_string(),
                last_name: "Paz".to_string(),
                role: Role::Player,
                password_hash: "unused".to_string(),
                created_at: Utc::now(),
                updated_at: None,
                active,
            })
            .await
            .unwrap();
        (dir, store)
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token(&headers_with("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
        assert_eq!(bearer_token(&headers_with("bearer abc")).unwrap(), "abc");

        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(AuthRejection::MissingCredentials)
        ));
        assert!(bearer_token(&headers_with("Basic dXNlcjpwYXNz")).is_err());
        assert!(bearer_token(&headers_with("Bearer")).is_err());
        assert!(bearer_token(&headers_with("Bearer   ")).is_err());
    }

    #[tokio::test]
    async fn test_authenticate_active_user() {
        let (_dir, store) = store_with_user(true).await;
        let tokens = test_token_service();
        let token = tokens.issue_access(1, "a@x.com", Role::Player).unwrap();

        let principal = authenticate(&tokens, &store, &headers_with(&format!("Bearer {token}")))
            .await
            .unwrap();

        assert_eq!(principal.user_id, 1);
        assert_eq!(principal.role, Role::Player);
        assert_eq!(principal.first_name, "Ana");
    }

    #[tokio::test]
    async fn test_user_deactivated_after_issuance_is_rejected() {
        let (_dir, store) = store_with_user(true).await;
        let tokens = test_token_service();
        let token = tokens.issue_access(1, "a@x.com", Role::Player).unwrap();
        let headers = headers_with(&format!("Bearer {token}"));

        assert!(authenticate(&tokens, &store, &headers).await.is_ok());

        store.update(1, |u: &mut User| u.active = false).await.unwrap();

        let result = authenticate(&tokens, &store, &headers).await;
        assert!(matches!(result, Err(AuthRejection::InactiveUser)));
    }

    #[tokio::test]
    async fn test_unknown_user_is_rejected() {
        let (_dir, store) = store_with_user(true).await;
        let tokens = test_token_service();
        let token = tokens.issue_access(42, "ghost@x.com", Role::Admin).unwrap();

        let result = authenticate(&tokens, &store, &headers_with(&format!("Bearer {token}"))).await;
        assert!(matches!(result, Err(AuthRejection::UnknownUser)));
    }

    #[tokio::test]
    async fn test_refresh_token_is_not_an_access_token() {
        let (_dir, store) = store_with_user(true).await;
        let tokens = test_token_service();
        let token = tokens.issue_refresh(1, "a@x.com", Role::Player).unwrap();

        let result = authenticate(&tokens, &store, &headers_with(&format!("Bearer {token}"))).await;
        assert!(matches!(
            result,
            Err(AuthRejection::InvalidToken(InvalidReason::WrongKind { .. }))
        ));
    }

    #[test]
    fn test_rejection_responses() {
        let response = AuthRejection::InvalidToken(InvalidReason::Expired).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");

        let response = AuthRejection::InactiveUser.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = AuthRejection::InsufficientRole {
            allowed: &[Role::Admin],
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
    }
}
