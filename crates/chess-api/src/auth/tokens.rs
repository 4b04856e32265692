//! Access/refresh token lifecycle
//!
//! Issues token pairs, verifies incoming tokens against an expected kind and
//! mints new access tokens from refresh tokens. Verification is pure: it never
//! touches storage and never returns an error, only a [`Verification`].
//!
//! Refresh tokens are not rotated. A refresh token stays usable until its own
//! expiry even after it has been exchanged.

use super::jwt::{now_secs, Claims, JwtError, TokenCodec, TokenKind};
use chess_core::{AuthConfig, Role};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// Why a token was not accepted
///
/// Only used internally and in logs; clients always see one generic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    Malformed,
    BadSignature,
    Expired,
    WrongKind { expected: TokenKind, found: TokenKind },
}

impl InvalidReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidReason::Malformed => "malformed",
            InvalidReason::BadSignature => "bad_signature",
            InvalidReason::Expired => "expired",
            InvalidReason::WrongKind { .. } => "wrong_kind",
        }
    }
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of verifying a token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Valid(Claims),
    Invalid(InvalidReason),
}

impl Verification {
    /// Claims when valid, `None` otherwise
    pub fn into_claims(self) -> Option<Claims> {
        match self {
            Verification::Valid(claims) => Some(claims),
            Verification::Invalid(_) => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Verification::Valid(_))
    }
}

/// Refresh failures
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("Invalid refresh token: {0}")]
    Invalid(InvalidReason),

    #[error(transparent)]
    Issue(#[from] JwtError),
}

/// Token pair returned on login
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Always "bearer"
    pub token_type: String,
}

impl TokenPair {
    pub fn bearer(access_token: String, refresh_token: String) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "bearer".to_string(),
        }
    }
}

/// Access token minted by [`TokenService::refresh`]
#[derive(Debug, Clone)]
pub struct RefreshedAccess {
    pub access_token: String,
    /// Claims of the refresh token that was exchanged
    pub identity: Claims,
}

/// Issues and verifies tokens for one immutable [`AuthConfig`]
#[derive(Clone)]
pub struct TokenService {
    codec: TokenCodec,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            codec: TokenCodec::from_config(config),
            access_ttl: config.access_ttl(),
            refresh_ttl: config.refresh_ttl(),
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Issue an access token with the configured lifetime
    pub fn issue_access(&self, user_id: i64, email: &str, role: Role) -> Result<String, JwtError> {
        self.issue(user_id, email, role, TokenKind::Access, self.access_ttl)
    }

    /// Issue a refresh token with the configured lifetime
    pub fn issue_refresh(&self, user_id: i64, email: &str, role: Role) -> Result<String, JwtError> {
        self.issue(user_id, email, role, TokenKind::Refresh, self.refresh_ttl)
    }

    /// Issue both tokens for a user whose credentials were already checked
    pub fn issue_pair(&self, user_id: i64, email: &str, role: Role) -> Result<TokenPair, JwtError> {
        Ok(TokenPair::bearer(
            self.issue_access(user_id, email, role)?,
            self.issue_refresh(user_id, email, role)?,
        ))
    }

    /// Issue a token of any kind with an explicit lifetime
    pub fn issue(
        &self,
        user_id: i64,
        email: &str,
        role: Role,
        kind: TokenKind,
        ttl: Duration,
    ) -> Result<String, JwtError> {
        let now = now_secs()?;
        let exp = now
            .checked_add(ttl.as_secs())
            .ok_or(JwtError::LifetimeOverflow(ttl))?;
        let claims = Claims {
            user_id,
            email: email.to_string(),
            role,
            iat: now,
            exp,
            kind,
            jti: Uuid::new_v4().to_string(),
        };

        self.codec.encode(&claims)
    }

    /// Verify a token and check that it was issued for `expected`
    pub fn verify(&self, token: &str, expected: TokenKind) -> Verification {
        let claims = match self.codec.decode(token) {
            Ok(claims) => claims,
            Err(JwtError::Expired) => return Verification::Invalid(InvalidReason::Expired),
            Err(JwtError::InvalidSignature) => {
                return Verification::Invalid(InvalidReason::BadSignature)
            }
            Err(_) => return Verification::Invalid(InvalidReason::Malformed),
        };

        if claims.kind != expected {
            return Verification::Invalid(InvalidReason::WrongKind {
                expected,
                found: claims.kind,
            });
        }

        Verification::Valid(claims)
    }

    /// Mint a new access token carrying the identity of a refresh token
    pub fn refresh(&self, refresh_token: &str) -> Result<RefreshedAccess, RefreshError> {
        match self.verify(refresh_token, TokenKind::Refresh) {
            Verification::Valid(claims) => Ok(RefreshedAccess {
                access_token: self.issue_access(claims.user_id, &claims.email, claims.role)?,
                identity: claims,
            }),
            Verification::Invalid(reason) => Err(RefreshError::Invalid(reason)),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_token_service() -> TokenService {
    TokenService::new(&AuthConfig {
        jwt_secret: super::jwt::TEST_SECRET.to_string(),
        ..AuthConfig::default()
    })
}
