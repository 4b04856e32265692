//! Role policy table
//!
//! Each gated operation is an [`Action`]; the roles allowed to perform it are
//! listed once in [`Action::allowed_roles`] and checked by [`authorize`].

use super::guard::{role_list, AuthRejection, AuthenticatedPrincipal};
use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use chess_core::Role;

/// Operations restricted to a subset of roles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateTournament,
    UpdateTournament,
    Enroll,
    CreateMatch,
    RecordResult,
    RecordRating,
    ManageUsers,
}

impl Action {
    pub const ALL: [Action; 7] = [
        Action::CreateTournament,
        Action::UpdateTournament,
        Action::Enroll,
        Action::CreateMatch,
        Action::RecordResult,
        Action::RecordRating,
        Action::ManageUsers,
    ];

    pub fn allowed_roles(&self) -> &'static [Role] {
        match self {
            Action::CreateTournament | Action::UpdateTournament => &[Role::Organizer, Role::Admin],
            Action::Enroll => &[Role::Player],
            Action::CreateMatch => &[Role::Arbiter, Role::Organizer, Role::Admin],
            Action::RecordResult | Action::RecordRating => &[Role::Arbiter, Role::Admin],
            Action::ManageUsers => &[Role::Admin],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::CreateTournament => "create_tournament",
            Action::UpdateTournament => "update_tournament",
            Action::Enroll => "enroll",
            Action::CreateMatch => "create_match",
            Action::RecordResult => "record_result",
            Action::RecordRating => "record_rating",
            Action::ManageUsers => "manage_users",
        }
    }
}

/// Check a principal against the policy table
pub fn authorize(principal: &AuthenticatedPrincipal, action: Action) -> Result<(), AuthRejection> {
    let allowed = action.allowed_roles();
    if allowed.contains(&principal.role) {
        Ok(())
    } else {
        Err(AuthRejection::InsufficientRole { allowed })
    }
}

/// Middleware enforcing one [`Action`]; must run after `require_auth`
///
/// ```ignore
/// post(create_tournament)
///     .route_layer(middleware::from_fn_with_state(Action::CreateTournament, enforce_policy))
/// ```
pub async fn enforce_policy(
    State(action): State<Action>,
    request: Request,
    next: Next,
) -> Result<Response, AuthRejection> {
    let principal = request
        .extensions()
        .get::<AuthenticatedPrincipal>()
        .ok_or(AuthRejection::MissingCredentials)?;

    if let Err(rejection) = authorize(principal, action) {
        audit_log(&AuditEvent::AccessDenied {
            user_id: Some(principal.user_id),
            email: Some(principal.email.clone()),
            resource: format!("{} {}", request.method(), request.uri().path()),
            required_roles: Some(role_list(action.allowed_roles())),
            ip_address: extract_ip_address(request.headers()),
            user_agent: extract_user_agent(request.headers()),
        });
        return Err(rejection);
    }

    Ok(next.run(request).await)
}
