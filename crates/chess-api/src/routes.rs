//! API route definitions

use crate::auth::{enforce_policy, require_auth, Action};
use crate::handlers::{auth, health, tournaments, users};
use crate::state::AppState;
use axum::{
    handler::Handler,
    middleware,
    routing::{get, post, put, MethodRouter},
    Router,
};
use std::sync::Arc;

type AppRoute = MethodRouter<Arc<AppState>>;

/// Attach a policy check for `action` to a method route
fn gated(route: AppRoute, action: Action) -> AppRoute {
    route.route_layer(middleware::from_fn_with_state(action, enforce_policy))
}

fn gated_post<H, T>(handler: H, action: Action) -> AppRoute
where
    H: Handler<T, Arc<AppState>>,
    T: 'static,
{
    gated(post(handler), action)
}

fn gated_put<H, T>(handler: H, action: Action) -> AppRoute
where
    H: Handler<T, Arc<AppState>>,
    T: 'static,
{
    gated(put(handler), action)
}

/// Probes and service banner
pub fn health_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
}

/// Create API routes
///
/// Everything except registration, login and refresh sits behind
/// `require_auth`; write endpoints additionally carry their policy layer.
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/refresh", post(auth::refresh_handler));

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route(
            "/auth/me",
            get(auth::me_handler).put(auth::update_me_handler),
        )
        .route("/auth/change-password", put(auth::change_password_handler))
        .route("/auth/logout", post(auth::logout_handler))
        // Tournaments
        .route(
            "/tournaments",
            get(tournaments::list_tournaments).merge(gated_post(
                tournaments::create_tournament,
                Action::CreateTournament,
            )),
        )
        .route(
            "/tournaments/:id",
            get(tournaments::get_tournament).merge(gated_put(
                tournaments::update_tournament,
                Action::UpdateTournament,
            )),
        )
        .route("/tournaments/:id/standings", get(tournaments::get_standings))
        // Enrollments
        .route(
            "/tournaments/:id/enrollments",
            get(tournaments::list_enrollments)
                .merge(gated_post(tournaments::enroll, Action::Enroll)),
        )
        .route("/enrollments/me", get(tournaments::my_enrollments))
        // Matches
        .route(
            "/tournaments/:id/matches",
            get(tournaments::list_matches)
                .merge(gated_post(tournaments::create_match, Action::CreateMatch)),
        )
        .route(
            "/matches/:id/result",
            gated_put(tournaments::record_result, Action::RecordResult),
        )
        // Ratings
        .route(
            "/users/:id/ratings",
            get(users::list_ratings)
                .merge(gated_post(users::record_rating, Action::RecordRating)),
        )
        // User administration
        .route("/users", gated(get(users::list_users), Action::ManageUsers))
        .route(
            "/users/:id/active",
            gated_put(users::set_user_active, Action::ManageUsers),
        )
        .route_layer(middleware::from_fn_with_state(state, require_auth));

    // Combine routes
    Router::new().merge(public_routes).merge(protected_routes)
}
