//! OpenAPI document and Swagger UI

use crate::auth::{
    AuthenticatedPrincipal, ChangePasswordRequest, LoginRequest, RefreshRequest,
    RegisterRequest, TokenPair, UpdateProfileRequest,
};
use crate::error::ApiError;
use crate::handlers::auth::MessageResponse;
use crate::handlers::health::{HealthResponse, ReadinessChecks, ReadinessResponse, RootResponse};
use crate::handlers::tournaments::{
    CreateMatchRequest, CreateTournamentRequest, RecordResultRequest,
    UpdateTournamentRequest,
};
use crate::handlers::users::{RecordRatingRequest, SetActiveRequest};
use axum::Router;
use chess_core::{
    Enrollment, Match, MatchResult, Rating, Role, Standing, Tournament, TournamentFormat,
    TournamentStatus, UserPublic,
};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Chess Tournament API",
        description = "Tournament management with JWT authentication and role-based access"
    ),
    paths(
        crate::handlers::health::root,
        crate::handlers::health::health_check,
        crate::handlers::health::readiness_check,
        crate::handlers::auth::register_handler,
        crate::handlers::auth::login_handler,
        crate::handlers::auth::refresh_handler,
        crate::handlers::auth::me_handler,
        crate::handlers::auth::update_me_handler,
        crate::handlers::auth::change_password_handler,
        crate::handlers::auth::logout_handler,
        crate::handlers::tournaments::list_tournaments,
        crate::handlers::tournaments::get_tournament,
        crate::handlers::tournaments::create_tournament,
        crate::handlers::tournaments::update_tournament,
        crate::handlers::tournaments::get_standings,
        crate::handlers::tournaments::enroll,
        crate::handlers::tournaments::list_enrollments,
        crate::handlers::tournaments::my_enrollments,
        crate::handlers::tournaments::create_match,
        crate::handlers::tournaments::list_matches,
        crate::handlers::tournaments::record_result,
        crate::handlers::users::list_ratings,
        crate::handlers::users::record_rating,
        crate::handlers::users::list_users,
        crate::handlers::users::set_user_active,
    ),
    components(schemas(
        ApiError,
        MessageResponse,
        RootResponse,
        HealthResponse,
        ReadinessResponse,
        ReadinessChecks,
        RegisterRequest,
        LoginRequest,
        RefreshRequest,
        UpdateProfileRequest,
        ChangePasswordRequest,
        TokenPair,
        AuthenticatedPrincipal,
        Role,
        UserPublic,
        Tournament,
        TournamentFormat,
        TournamentStatus,
        CreateTournamentRequest,
        UpdateTournamentRequest,
        Enrollment,
        Match,
        MatchResult,
        CreateMatchRequest,
        RecordResultRequest,
        Standing,
        Rating,
        RecordRatingRequest,
        SetActiveRequest,
    )),
    tags(
        (name = "health", description = "Liveness and readiness probes"),
        (name = "auth", description = "Registration, login, tokens and profile"),
        (name = "tournaments", description = "Tournaments and standings"),
        (name = "enrollments", description = "Tournament enrollments"),
        (name = "matches", description = "Pairings and results"),
        (name = "ratings", description = "Rating history"),
        (name = "users", description = "Account administration"),
    ),
    modifiers(&SecurityAddon),
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Access token from /auth/login"))
                        .build(),
                ),
            )
        }
    }
}

/// Swagger UI at `/docs`, document at `/api-docs/openapi.json`
pub fn swagger_ui_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    SwaggerUi::new("/docs")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_gated_paths() {
        let doc = ApiDoc::openapi();
        for path in [
            "/auth/login",
            "/tournaments",
            "/tournaments/{id}/matches",
            "/matches/{id}/result",
            "/users/{id}/active",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn test_bearer_scheme_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
