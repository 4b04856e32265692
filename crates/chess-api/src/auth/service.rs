//! Account service
//!
//! Registration, login, token refresh and profile management on top of the
//! JSON user store. Password hashing and token issuance are delegated to
//! [`PasswordHasher`] and [`TokenService`].

use super::password::PasswordHasher;
use super::tokens::{RefreshError, TokenPair, TokenService};
use crate::audit::{audit_log, AuditEvent, RequestContext};
use crate::error::AppError;
use chess_core::{JsonStore, Role, User, UserDirectory, UserPublic};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

const INVALID_CREDENTIALS: &str = "Incorrect email or password";
const EMAIL_TAKEN: &str = "Email already registered";

/// User registration request
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters long"))]
    pub password: String,
    #[validate(length(min = 2, max = 50))]
    pub first_name: String,
    #[validate(length(min = 2, max = 50))]
    pub last_name: String,
    /// Defaults to jugador
    #[serde(default)]
    pub role: Option<Role>,
}

/// User login request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Token refresh request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Profile update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(length(min = 2, max = 50))]
    pub first_name: Option<String>,
    #[validate(length(min = 2, max = 50))]
    pub last_name: Option<String>,
}

/// Password change request
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters long"))]
    pub new_password: String,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Account operations shared by the HTTP handlers and the CLI
#[derive(Clone)]
pub struct AuthService {
    store: Arc<JsonStore>,
    hasher: PasswordHasher,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(store: Arc<JsonStore>, hasher: PasswordHasher, tokens: TokenService) -> Self {
        Self {
            store,
            hasher,
            tokens,
        }
    }

    /// Self-service registration
    ///
    /// Admin accounts cannot be self-registered.
    pub async fn register(
        &self,
        request: RegisterRequest,
        ctx: &RequestContext,
    ) -> Result<UserPublic, AppError> {
        let email = normalize_email(&request.email);
        let result = if request.role == Some(Role::Admin) {
            Err(AppError::BadRequest(
                "Admin accounts cannot be self-registered".to_string(),
            ))
        } else {
            self.create_user(request).await
        };

        match &result {
            Ok(user) => audit_log(&AuditEvent::RegistrationSuccess {
                user_id: user.id,
                email: user.email.clone(),
                role: user.role.to_string(),
                ip_address: ctx.ip_address.clone(),
                user_agent: ctx.user_agent.clone(),
            }),
            Err(AppError::BadRequest(reason)) => audit_log(&AuditEvent::RegistrationFailure {
                email,
                reason: reason.clone(),
                ip_address: ctx.ip_address.clone(),
                user_agent: ctx.user_agent.clone(),
            }),
            Err(_) => {}
        }

        result
    }

    /// Create an account with any role
    pub async fn create_user(&self, request: RegisterRequest) -> Result<UserPublic, AppError> {
        request.validate()?;

        let email = normalize_email(&request.email);
        let password_hash = self.hasher.hash_async(request.password.clone()).await?;
        let role = request.role.unwrap_or_default();

        let user = self
            .store
            .modify(|users: &mut Vec<User>| {
                if users.iter().any(|u| u.email.eq_ignore_ascii_case(&email)) {
                    return Err(AppError::BadRequest(EMAIL_TAKEN.to_string()));
                }

                let user = User {
                    id: chess_core::store::next_id(users),
                    email,
                    first_name: request.first_name.trim().to_string(),
                    last_name: request.last_name.trim().to_string(),
                    role,
                    password_hash,
                    created_at: Utc::now(),
                    updated_at: None,
                    active: true,
                };
                users.push(user.clone());
                Ok(user)
            })
            .await?;

        tracing::info!(user_id = user.id, role = %user.role, "User created");
        Ok(user.to_public())
    }

    /// Check credentials and issue a token pair
    ///
    /// Unknown email and wrong password produce the same error; a dummy hash
    /// is verified for unknown emails so both take the same time.
    pub async fn login(
        &self,
        request: LoginRequest,
        ctx: &RequestContext,
    ) -> Result<TokenPair, AppError> {
        let email = normalize_email(&request.email);
        let fail = |reason: &str, message: &str| {
            audit_log(&AuditEvent::LoginFailure {
                email: email.clone(),
                reason: reason.to_string(),
                ip_address: ctx.ip_address.clone(),
                user_agent: ctx.user_agent.clone(),
            });
            AppError::Unauthorized(message.to_string())
        };

        let user = match self.store.find_user_by_email(&email).await? {
            Some(user) => user,
            None => {
                self.hasher.verify_dummy_async(request.password).await?;
                return Err(fail("unknown_email", INVALID_CREDENTIALS));
            }
        };

        let matches = self
            .hasher
            .verify_async(request.password, user.password_hash.clone())
            .await?;
        if !matches {
            return Err(fail("invalid_password", INVALID_CREDENTIALS));
        }

        if !user.active {
            return Err(fail("inactive_user", "Inactive user"));
        }

        let pair = self.tokens.issue_pair(user.id, &user.email, user.role)?;

        audit_log(&AuditEvent::LoginSuccess {
            user_id: user.id,
            email: user.email,
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
        });

        Ok(pair)
    }

    /// Exchange a refresh token for a new access token
    ///
    /// The same refresh token is returned alongside the new access token.
    pub async fn refresh(
        &self,
        request: RefreshRequest,
        ctx: &RequestContext,
    ) -> Result<TokenPair, AppError> {
        let refreshed = match self.tokens.refresh(&request.refresh_token) {
            Ok(refreshed) => refreshed,
            Err(RefreshError::Invalid(reason)) => {
                audit_log(&AuditEvent::InvalidToken {
                    ip_address: ctx.ip_address.clone(),
                    user_agent: ctx.user_agent.clone(),
                    reason: format!("refresh: {reason}"),
                });
                return Err(AppError::Unauthorized(
                    "Invalid or expired refresh token".to_string(),
                ));
            }
            Err(RefreshError::Issue(e)) => return Err(e.into()),
        };

        audit_log(&AuditEvent::TokenRefresh {
            user_id: refreshed.identity.user_id,
            email: refreshed.identity.email,
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
        });

        Ok(TokenPair::bearer(refreshed.access_token, request.refresh_token))
    }

    pub async fn get_user(&self, user_id: i64) -> Result<UserPublic, AppError> {
        self.store
            .find_user_by_id(user_id)
            .await?
            .map(|user| user.to_public())
            .ok_or_else(|| AppError::NotFound(format!("User {user_id}")))
    }

    pub async fn list_users(&self) -> Result<Vec<UserPublic>, AppError> {
        let users = self.store.load::<User>().await?;
        Ok(users.iter().map(User::to_public).collect())
    }

    /// Update name and email of a user
    pub async fn update_profile(
        &self,
        user_id: i64,
        request: UpdateProfileRequest,
    ) -> Result<UserPublic, AppError> {
        request.validate()?;
        let email = request.email.as_deref().map(normalize_email);

        let user = self
            .store
            .modify(|users: &mut Vec<User>| {
                if let Some(email) = &email {
                    if users
                        .iter()
                        .any(|u| u.id != user_id && u.email.eq_ignore_ascii_case(email))
                    {
                        return Err(AppError::BadRequest(EMAIL_TAKEN.to_string()));
                    }
                }

                let user = users
                    .iter_mut()
                    .find(|u| u.id == user_id)
                    .ok_or_else(|| AppError::NotFound(format!("User {user_id}")))?;

                if let Some(email) = email {
                    user.email = email;
                }
                if let Some(first_name) = &request.first_name {
                    user.first_name = first_name.trim().to_string();
                }
                if let Some(last_name) = &request.last_name {
                    user.last_name = last_name.trim().to_string();
                }
                user.updated_at = Some(Utc::now());
                Ok(user.clone())
            })
            .await?;

        Ok(user.to_public())
    }

    /// Replace a password after checking the current one
    pub async fn change_password(
        &self,
        user_id: i64,
        request: ChangePasswordRequest,
        ctx: &RequestContext,
    ) -> Result<(), AppError> {
        request.validate()?;

        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {user_id}")))?;

        let matches = self
            .hasher
            .verify_async(request.current_password, user.password_hash.clone())
            .await?;
        if !matches {
            return Err(AppError::BadRequest(
                "Incorrect current password".to_string(),
            ));
        }

        let password_hash = self.hasher.hash_async(request.new_password).await?;
        self.store
            .update(user_id, |u: &mut User| {
                u.password_hash = password_hash;
                u.updated_at = Some(Utc::now());
            })
            .await?;

        audit_log(&AuditEvent::PasswordChange {
            user_id,
            email: user.email,
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
        });

        Ok(())
    }

    /// Activate or deactivate an account
    ///
    /// Deactivation takes effect on the next request: the guard checks the
    /// flag on every call.
    pub async fn set_active(
        &self,
        user_id: i64,
        active: bool,
        changed_by: Option<i64>,
    ) -> Result<UserPublic, AppError> {
        if changed_by == Some(user_id) && !active {
            return Err(AppError::BadRequest(
                "Administrators cannot deactivate themselves".to_string(),
            ));
        }

        let user = self
            .store
            .update(user_id, |u: &mut User| {
                u.active = active;
                u.updated_at = Some(Utc::now());
            })
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {user_id}")))?;

        audit_log(&AuditEvent::AccountStatusChange {
            user_id,
            email: user.email.clone(),
            active,
            changed_by,
        });

        Ok(user.to_public())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::TokenKind;
    use crate::auth::password::test_hasher;
    use crate::auth::tokens::test_token_service;

    fn service() -> (tempfile::TempDir, AuthService) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonStore::open(dir.path()).unwrap());
        (dir, AuthService::new(store, test_hasher(), test_token_service()))
    }

    fn register_request(email: &str, role: Option<Role>) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: "password123".to_string(),
            first_name: "Ana".to_string(),
            last_name: "Paz".to_string(),
            role,
        }
    }

    fn login_request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let (_dir, service) = service();
        let ctx = RequestContext::default();

        let user = service
            .register(register_request(" Ana@X.com ", None), &ctx)
            .await
            .unwrap();
        assert_eq!(user.id, 1);
        assert_eq!(user.email, "ana@x.com");
        assert_eq!(user.role, Role::Player);

        let pair = service
            .login(login_request("ana@x.com", "password123"), &ctx)
            .await
            .unwrap();
        assert_eq!(pair.token_type, "bearer");

        let claims = service
            .tokens
            .verify(&pair.access_token, TokenKind::Access)
            .into_claims()
            .unwrap();
        assert_eq!(claims.user_id, 1);
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates_and_admin() {
        let (_dir, service) = service();
        let ctx = RequestContext::default();

        service
            .register(register_request("a@x.com", None), &ctx)
            .await
            .unwrap();

        let duplicate = service
            .register(register_request("A@x.com", Some(Role::Organizer)), &ctx)
            .await;
        assert!(matches!(duplicate, Err(AppError::BadRequest(msg)) if msg == EMAIL_TAKEN));

        let admin = service
            .register(register_request("root@x.com", Some(Role::Admin)), &ctx)
            .await;
        assert!(matches!(admin, Err(AppError::BadRequest(_))));

        // Admins can still be created directly
        let admin = service
            .create_user(register_request("root@x.com", Some(Role::Admin)))
            .await
            .unwrap();
        assert_eq!(admin.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_register_validation() {
        let (_dir, service) = service();
        let ctx = RequestContext::default();

        let mut short = register_request("a@x.com", None);
        short.password = "short".to_string();
        assert!(matches!(
            service.register(short, &ctx).await,
            Err(AppError::BadRequest(_))
        ));

        let mut bad_name = register_request("a@x.com", None);
        bad_name.first_name = "A".to_string();
        assert!(matches!(
            service.register(bad_name, &ctx).await,
            Err(AppError::BadRequest(_))
        ));

        assert!(matches!(
            service.register(register_request("not-an-email", None), &ctx).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let (_dir, service) = service();
        let ctx = RequestContext::default();
        service
            .register(register_request("a@x.com", None), &ctx)
            .await
            .unwrap();

        let wrong_password = service
            .login(login_request("a@x.com", "wrong-password"), &ctx)
            .await;
        let unknown = service
            .login(login_request("nobody@x.com", "password123"), &ctx)
            .await;

        match (wrong_password, unknown) {
            (Err(AppError::Unauthorized(a)), Err(AppError::Unauthorized(b))) => {
                assert_eq!(a, b);
                assert_eq!(a, INVALID_CREDENTIALS);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_inactive_user_cannot_login() {
        let (_dir, service) = service();
        let ctx = RequestContext::default();
        let user = service
            .register(register_request("a@x.com", None), &ctx)
            .await
            .unwrap();
        service.set_active(user.id, false, None).await.unwrap();

        let result = service
            .login(login_request("a@x.com", "password123"), &ctx)
            .await;
        assert!(matches!(result, Err(AppError::Unauthorized(msg)) if msg == "Inactive user"));
    }

    #[tokio::test]
    async fn test_refresh_echoes_refresh_token() {
        let (_dir, service) = service();
        let ctx = RequestContext::default();
        service
            .register(register_request("a@x.com", None), &ctx)
            .await
            .unwrap();
        let pair = service
            .login(login_request("a@x.com", "password123"), &ctx)
            .await
            .unwrap();

        let refreshed = service
            .refresh(
                RefreshRequest {
                    refresh_token: pair.refresh_token.clone(),
                },
                &ctx,
            )
            .await
            .unwrap();
        assert_eq!(refreshed.refresh_token, pair.refresh_token);
        assert!(service
            .tokens
            .verify(&refreshed.access_token, TokenKind::Access)
            .is_valid());

        let with_access = service
            .refresh(
                RefreshRequest {
                    refresh_token: pair.access_token,
                },
                &ctx,
            )
            .await;
        assert!(matches!(with_access, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_update_profile_email_collision() {
        let (_dir, service) = service();
        let ctx = RequestContext::default();
        let a = service
            .register(register_request("a@x.com", None), &ctx)
            .await
            .unwrap();
        service
            .register(register_request("b@x.com", None), &ctx)
            .await
            .unwrap();

        let collision = service
            .update_profile(
                a.id,
                UpdateProfileRequest {
                    email: Some("B@x.com".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(collision, Err(AppError::BadRequest(_))));

        let updated = service
            .update_profile(
                a.id,
                UpdateProfileRequest {
                    email: Some("a@x.com".to_string()),
                    first_name: Some("Anita".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.first_name, "Anita");
        assert!(updated.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_change_password() {
        let (_dir, service) = service();
        let ctx = RequestContext::default();
        let user = service
            .register(register_request("a@x.com", None), &ctx)
            .await
            .unwrap();

        let wrong = service
            .change_password(
                user.id,
                ChangePasswordRequest {
                    current_password: "not-my-password".to_string(),
                    new_password: "new-password-1".to_string(),
                },
                &ctx,
            )
            .await;
        assert!(matches!(wrong, Err(AppError::BadRequest(_))));

        service
            .change_password(
                user.id,
                ChangePasswordRequest {
                    current_password: "password123".to_string(),
                    new_password: "new-password-1".to_string(),
                },
                &ctx,
            )
            .await
            .unwrap();

        assert!(service
            .login(login_request("a@x.com", "password123"), &ctx)
            .await
            .is_err());
        assert!(service
            .login(login_request("a@x.com", "new-password-1"), &ctx)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_admin_cannot_deactivate_self() {
        let (_dir, service) = service();
        let admin = service
            .create_user(register_request("root@x.com", Some(Role::Admin)))
            .await
            .unwrap();

        let result = service.set_active(admin.id, false, Some(admin.id)).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));

        let missing = service.set_active(99, false, Some(admin.id)).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }
}
