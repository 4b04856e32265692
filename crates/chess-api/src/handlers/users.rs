//! User administration and rating history handlers

use crate::auth::AuthenticatedPrincipal;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chess_core::{Rating, User, UserDirectory, UserPublic};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RecordRatingRequest {
    #[validate(range(max = 3000))]
    pub rating: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SetActiveRequest {
    pub active: bool,
}

async fn ensure_user_exists(state: &AppState, user_id: i64) -> Result<User, AppError> {
    state
        .store
        .find_user_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {user_id}")))
}

/// Rating history of a user, oldest first
#[utoipa::path(
    get,
    path = "/users/{id}/ratings",
    tag = "ratings",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "Ratings", body = Vec<Rating>),
        (status = 404, description = "Not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_ratings(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<Rating>>, AppError> {
    ensure_user_exists(&state, user_id).await?;

    let mut ratings = state
        .store
        .filter(|r: &Rating| r.user_id == user_id)
        .await?;
    ratings.sort_by_key(|r| (r.recorded_at, r.id));
    Ok(Json(ratings))
}

/// Record a new rating for a user
#[utoipa::path(
    post,
    path = "/users/{id}/ratings",
    tag = "ratings",
    params(("id" = i64, Path, description = "User id")),
    request_body = RecordRatingRequest,
    responses(
        (status = 201, description = "Rating recorded", body = Rating),
        (status = 400, description = "Rating out of range", body = crate::error::ApiError),
        (status = 403, description = "Requires arbitro or admin", body = crate::error::ApiError),
        (status = 404, description = "Not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn record_rating(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    Json(request): Json<RecordRatingRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    ensure_user_exists(&state, user_id).await?;

    let rating = state
        .store
        .insert_with(|id| Rating {
            id,
            user_id,
            rating: request.rating,
            recorded_at: Utc::now(),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(rating)))
}

/// List all accounts
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    responses(
        (status = 200, description = "Users", body = Vec<UserPublic>),
        (status = 403, description = "Requires admin", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<UserPublic>>, AppError> {
    Ok(Json(state.auth.list_users().await?))
}

/// Activate or deactivate an account
#[utoipa::path(
    put,
    path = "/users/{id}/active",
    tag = "users",
    params(("id" = i64, Path, description = "User id")),
    request_body = SetActiveRequest,
    responses(
        (status = 200, description = "Account updated", body = UserPublic),
        (status = 400, description = "Cannot deactivate own account", body = crate::error::ApiError),
        (status = 403, description = "Requires admin", body = crate::error::ApiError),
        (status = 404, description = "Not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn set_user_active(
    State(state): State<Arc<AppState>>,
    principal: AuthenticatedPrincipal,
    Path(user_id): Path<i64>,
    Json(request): Json<SetActiveRequest>,
) -> Result<Json<UserPublic>, AppError> {
    let user = state
        .auth
        .set_active(user_id, request.active, Some(principal.user_id))
        .await?;
    Ok(Json(user))
}
