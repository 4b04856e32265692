//! Security audit logging for authentication events
//!
//! Every event is logged at INFO level on the "audit" target, so it can be
//! filtered and routed apart from application logs. Events carry identities
//! and request context only: passwords, hashes and raw tokens never appear.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Security audit events for authentication and authorization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Successful user login
    LoginSuccess {
        user_id: i64,
        email: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Failed login attempt
    LoginFailure {
        email: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Stateless logout acknowledgement
    Logout {
        user_id: i64,
        email: String,
        ip_address: Option<String>,
    },

    /// Access token minted from a refresh token
    TokenRefresh {
        user_id: i64,
        email: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Successful user registration
    RegistrationSuccess {
        user_id: i64,
        email: String,
        role: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Failed registration attempt
    RegistrationFailure {
        email: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Password change
    PasswordChange {
        user_id: i64,
        email: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Request rejected by the role policy
    AccessDenied {
        user_id: Option<i64>,
        email: Option<String>,
        resource: String,
        required_roles: Option<String>,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Invalid or expired token used, or its user can no longer sign in
    InvalidToken {
        ip_address: Option<String>,
        user_agent: Option<String>,
        reason: String,
    },

    /// Account activated or deactivated by an administrator
    AccountStatusChange {
        user_id: i64,
        email: String,
        active: bool,
        changed_by: Option<i64>,
    },
}

/// Request metadata attached to audit events
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn from_headers(headers: &axum::http::HeaderMap) -> Self {
        Self {
            ip_address: extract_ip_address(headers),
            user_agent: extract_user_agent(headers),
        }
    }
}

impl AuditEvent {
    /// Short description used as the log message
    pub fn summary(&self) -> &'static str {
        match self {
            AuditEvent::LoginSuccess { .. } => "Login successful",
            AuditEvent::LoginFailure { .. } => "Login failed",
            AuditEvent::Logout { .. } => "User logout",
            AuditEvent::TokenRefresh { .. } => "Token refresh",
            AuditEvent::RegistrationSuccess { .. } => "Registration successful",
            AuditEvent::RegistrationFailure { .. } => "Registration failed",
            AuditEvent::PasswordChange { .. } => "Password changed",
            AuditEvent::AccessDenied { .. } => "Access denied",
            AuditEvent::InvalidToken { .. } => "Invalid token",
            AuditEvent::AccountStatusChange { .. } => "Account status changed",
        }
    }

    /// User the event is about, when known
    pub fn subject(&self) -> (Option<i64>, Option<&str>) {
        match self {
            AuditEvent::LoginSuccess { user_id, email, .. }
            | AuditEvent::Logout { user_id, email, .. }
            | AuditEvent::TokenRefresh { user_id, email, .. }
            | AuditEvent::RegistrationSuccess { user_id, email, .. }
            | AuditEvent::PasswordChange { user_id, email, .. }
            | AuditEvent::AccountStatusChange { user_id, email, .. } => {
                (Some(*user_id), Some(email.as_str()))
            }
            AuditEvent::LoginFailure { email, .. }
            | AuditEvent::RegistrationFailure { email, .. } => (None, Some(email.as_str())),
            AuditEvent::AccessDenied { user_id, email, .. } => (*user_id, email.as_deref()),
            AuditEvent::InvalidToken { .. } => (None, None),
        }
    }

    pub fn ip_address(&self) -> Option<&str> {
        match self {
            AuditEvent::LoginSuccess { ip_address, .. }
            | AuditEvent::LoginFailure { ip_address, .. }
            | AuditEvent::Logout { ip_address, .. }
            | AuditEvent::TokenRefresh { ip_address, .. }
            | AuditEvent::RegistrationSuccess { ip_address, .. }
            | AuditEvent::RegistrationFailure { ip_address, .. }
            | AuditEvent::PasswordChange { ip_address, .. }
            | AuditEvent::AccessDenied { ip_address, .. }
            | AuditEvent::InvalidToken { ip_address, .. } => ip_address.as_deref(),
            AuditEvent::AccountStatusChange { .. } => None,
        }
    }
}

/// Log a security audit event
///
/// The subject and client address are separate fields; the full event rides
/// along as one JSON field for log aggregators.
pub fn audit_log(event: &AuditEvent) {
    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));
    let (user_id, email) = event.subject();

    info!(
        target: "audit",
        timestamp = %Utc::now(),
        user_id = ?user_id,
        email = ?email,
        ip_address = ?event.ip_address(),
        event = %event_json,
        "{}",
        event.summary()
    );
}

/// Client IP from X-Forwarded-For (first hop) or X-Real-IP
pub fn extract_ip_address(headers: &axum::http::HeaderMap) -> Option<String> {
    if let Some(first_ip) = headers
        .get("x-forwarded-for")
        .and_then(|xff| xff.to_str().ok())
        .and_then(|xff| xff.split(',').next())
    {
        return Some(first_ip.trim().to_string());
    }

    headers
        .get("x-real-ip")
        .and_then(|ip| ip.to_str().ok())
        .map(|ip| ip.to_string())
}

/// Extract user agent from request headers
pub fn extract_user_agent(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}
