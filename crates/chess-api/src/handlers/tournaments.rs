//! Tournament, enrollment and match handlers
//!
//! Role checks for the write endpoints run in the policy layer before these
//! handlers; the only rule enforced here is tournament ownership for
//! organizers.

use crate::auth::AuthenticatedPrincipal;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chess_core::{
    standings, Enrollment, JsonStore, Match, MatchResult, Rating, Role, Standing, Tournament,
    TournamentFormat, TournamentStatus, User,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

// ============================================================================
// Request types
// ============================================================================

fn default_max_rounds() -> u32 {
    7
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateTournamentRequest {
    #[validate(length(min = 3, max = 100))]
    pub name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub format: TournamentFormat,
    #[serde(default = "default_max_rounds")]
    #[validate(range(min = 1, max = 20))]
    pub max_rounds: u32,
    #[serde(default)]
    pub status: TournamentStatus,
}

/// Partial tournament update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateTournamentRequest {
    #[validate(length(min = 3, max = 100))]
    pub name: Option<String>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub format: Option<TournamentFormat>,
    #[validate(range(min = 1, max = 20))]
    pub max_rounds: Option<u32>,
    pub status: Option<TournamentStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateMatchRequest {
    #[validate(range(min = 1))]
    pub round: u32,
    pub white_id: i64,
    pub black_id: i64,
    pub result: Option<MatchResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecordResultRequest {
    pub result: MatchResult,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TournamentFilter {
    /// Only tournaments in this state
    pub status: Option<TournamentStatus>,
}

// ============================================================================
// Helpers
// ============================================================================

async fn load_tournament(store: &JsonStore, id: i64) -> Result<Tournament, AppError> {
    store
        .get::<Tournament>(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Tournament {id}")))
}

/// Organizers may only manage tournaments they created
fn ensure_can_manage(
    principal: &AuthenticatedPrincipal,
    tournament: &Tournament,
) -> Result<(), AppError> {
    if principal.role == Role::Organizer && tournament.organizer_id != principal.user_id {
        return Err(AppError::Forbidden(
            "Only the tournament's organizer or an admin can manage it".to_string(),
        ));
    }
    Ok(())
}

/// Move enrollment points from `previous` to `current` for one game
async fn credit_points(
    store: &JsonStore,
    game: &Match,
    previous: Option<MatchResult>,
) -> Result<(), AppError> {
    let (old_white, old_black) = previous.map(|r| r.points()).unwrap_or((0.0, 0.0));
    let (new_white, new_black) = game.result.map(|r| r.points()).unwrap_or((0.0, 0.0));

    if (old_white, old_black) == (new_white, new_black) {
        return Ok(());
    }

    store
        .modify(|enrollments: &mut Vec<Enrollment>| {
            for enrollment in enrollments
                .iter_mut()
                .filter(|e| e.tournament_id == game.tournament_id)
            {
                if enrollment.user_id == game.white_id {
                    enrollment.points += new_white - old_white;
                } else if enrollment.user_id == game.black_id {
                    enrollment.points += new_black - old_black;
                }
            }
            Ok::<_, AppError>(())
        })
        .await
}

// ============================================================================
// Tournaments
// ============================================================================

/// List tournaments
#[utoipa::path(
    get,
    path = "/tournaments",
    tag = "tournaments",
    params(TournamentFilter),
    responses((status = 200, description = "Tournaments", body = Vec<Tournament>)),
    security(("bearer_auth" = []))
)]
pub async fn list_tournaments(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<TournamentFilter>,
) -> Result<Json<Vec<Tournament>>, AppError> {
    let tournaments = state
        .store
        .filter(|t: &Tournament| filter.status.map_or(true, |status| t.status == status))
        .await?;
    Ok(Json(tournaments))
}

/// Get one tournament
#[utoipa::path(
    get,
    path = "/tournaments/{id}",
    tag = "tournaments",
    params(("id" = i64, Path, description = "Tournament id")),
    responses(
        (status = 200, description = "Tournament", body = Tournament),
        (status = 404, description = "Not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_tournament(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Tournament>, AppError> {
    Ok(Json(load_tournament(&state.store, id).await?))
}

/// Create a tournament organized by the caller
#[utoipa::path(
    post,
    path = "/tournaments",
    tag = "tournaments",
    request_body = CreateTournamentRequest,
    responses(
        (status = 201, description = "Tournament created", body = Tournament),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 403, description = "Requires organizador or admin", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_tournament(
    State(state): State<Arc<AppState>>,
    principal: AuthenticatedPrincipal,
    Json(request): Json<CreateTournamentRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;
    Tournament::check_dates(request.start_date, request.end_date)?;

    let tournament = state
        .store
        .insert_with(|id| Tournament {
            id,
            name: request.name.trim().to_string(),
            description: request.description,
            start_date: request.start_date,
            end_date: request.end_date,
            format: request.format,
            max_rounds: request.max_rounds,
            status: request.status,
            organizer_id: principal.user_id,
            created_at: Utc::now(),
            updated_at: None,
        })
        .await?;

    tracing::info!(tournament_id = tournament.id, organizer_id = principal.user_id, "Tournament created");
    Ok((StatusCode::CREATED, Json(tournament)))
}

/// Update a tournament
#[utoipa::path(
    put,
    path = "/tournaments/{id}",
    tag = "tournaments",
    params(("id" = i64, Path, description = "Tournament id")),
    request_body = UpdateTournamentRequest,
    responses(
        (status = 200, description = "Tournament updated", body = Tournament),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 403, description = "Not the organizer of this tournament", body = crate::error::ApiError),
        (status = 404, description = "Not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_tournament(
    State(state): State<Arc<AppState>>,
    principal: AuthenticatedPrincipal,
    Path(id): Path<i64>,
    Json(request): Json<UpdateTournamentRequest>,
) -> Result<Json<Tournament>, AppError> {
    request.validate()?;

    let highest_round = match request.max_rounds {
        Some(_) => state
            .store
            .filter(|m: &Match| m.tournament_id == id)
            .await?
            .iter()
            .map(|m| m.round)
            .max(),
        None => None,
    };

    let tournament = state
        .store
        .modify(|tournaments: &mut Vec<Tournament>| {
            let tournament = tournaments
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or_else(|| AppError::NotFound(format!("Tournament {id}")))?;
            ensure_can_manage(&principal, tournament)?;

            if let (Some(max_rounds), Some(highest)) = (request.max_rounds, highest_round) {
                if highest > max_rounds {
                    return Err(AppError::BadRequest(format!(
                        "max_rounds cannot be lower than existing round {highest}"
                    )));
                }
            }

            let start_date = request.start_date.unwrap_or(tournament.start_date);
            let end_date = request.end_date.or(tournament.end_date);
            Tournament::check_dates(start_date, end_date)?;

            if let Some(name) = &request.name {
                tournament.name = name.trim().to_string();
            }
            if request.description.is_some() {
                tournament.description = request.description.clone();
            }
            tournament.start_date = start_date;
            tournament.end_date = end_date;
            if let Some(format) = request.format {
                tournament.format = format;
            }
            if let Some(max_rounds) = request.max_rounds {
                tournament.max_rounds = max_rounds;
            }
            if let Some(status) = request.status {
                tournament.status = status;
            }
            tournament.updated_at = Some(Utc::now());
            Ok::<_, AppError>(tournament.clone())
        })
        .await?;

    Ok(Json(tournament))
}

/// Standings of a tournament
#[utoipa::path(
    get,
    path = "/tournaments/{id}/standings",
    tag = "tournaments",
    params(("id" = i64, Path, description = "Tournament id")),
    responses(
        (status = 200, description = "Standings, best first", body = Vec<Standing>),
        (status = 404, description = "Not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_standings(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Standing>>, AppError> {
    load_tournament(&state.store, id).await?;

    let enrollments = state
        .store
        .filter(|e: &Enrollment| e.tournament_id == id)
        .await?;
    let matches = state.store.filter(|m: &Match| m.tournament_id == id).await?;
    let users = state.store.load::<User>().await?;

    Ok(Json(standings::compute(&enrollments, &matches, &users)))
}

// ============================================================================
// Enrollments
// ============================================================================

/// Enroll the caller in a tournament
///
/// The starting rating is the caller's latest recorded rating, or 1200. Any
/// request body is ignored.
#[utoipa::path(
    post,
    path = "/tournaments/{id}/enrollments",
    tag = "enrollments",
    params(("id" = i64, Path, description = "Tournament id")),
    responses(
        (status = 201, description = "Enrolled", body = Enrollment),
        (status = 400, description = "Tournament closed or already enrolled", body = crate::error::ApiError),
        (status = 403, description = "Requires jugador", body = crate::error::ApiError),
        (status = 404, description = "Not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn enroll(
    State(state): State<Arc<AppState>>,
    principal: AuthenticatedPrincipal,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let tournament = load_tournament(&state.store, id).await?;
    if tournament.status != TournamentStatus::Open {
        return Err(AppError::BadRequest(
            "Tournament is not open for enrollment".to_string(),
        ));
    }

    let initial_rating = state
        .store
        .filter(|r: &Rating| r.user_id == principal.user_id)
        .await?
        .into_iter()
        .max_by_key(|r| (r.recorded_at, r.id))
        .map(|r| r.rating)
        .unwrap_or_else(Enrollment::default_rating);

    let user_id = principal.user_id;
    let enrollment = state
        .store
        .modify(|enrollments: &mut Vec<Enrollment>| {
            if enrollments
                .iter()
                .any(|e| e.tournament_id == id && e.user_id == user_id)
            {
                return Err(AppError::BadRequest(
                    "Already enrolled in this tournament".to_string(),
                ));
            }

            let enrollment = Enrollment {
                id: chess_core::store::next_id(enrollments),
                user_id,
                tournament_id: id,
                initial_rating,
                enrolled_at: Utc::now(),
                points: 0.0,
            };
            enrollments.push(enrollment.clone());
            Ok(enrollment)
        })
        .await?;

    Ok((StatusCode::CREATED, Json(enrollment)))
}

/// Enrollments of a tournament
#[utoipa::path(
    get,
    path = "/tournaments/{id}/enrollments",
    tag = "enrollments",
    params(("id" = i64, Path, description = "Tournament id")),
    responses(
        (status = 200, description = "Enrollments", body = Vec<Enrollment>),
        (status = 404, description = "Not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_enrollments(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Enrollment>>, AppError> {
    load_tournament(&state.store, id).await?;
    let enrollments = state
        .store
        .filter(|e: &Enrollment| e.tournament_id == id)
        .await?;
    Ok(Json(enrollments))
}

/// Enrollments of the caller
#[utoipa::path(
    get,
    path = "/enrollments/me",
    tag = "enrollments",
    responses((status = 200, description = "Enrollments", body = Vec<Enrollment>)),
    security(("bearer_auth" = []))
)]
pub async fn my_enrollments(
    State(state): State<Arc<AppState>>,
    principal: AuthenticatedPrincipal,
) -> Result<Json<Vec<Enrollment>>, AppError> {
    let enrollments = state
        .store
        .filter(|e: &Enrollment| e.user_id == principal.user_id)
        .await?;
    Ok(Json(enrollments))
}

// ============================================================================
// Matches
// ============================================================================

/// Pair two enrolled players
#[utoipa::path(
    post,
    path = "/tournaments/{id}/matches",
    tag = "matches",
    params(("id" = i64, Path, description = "Tournament id")),
    request_body = CreateMatchRequest,
    responses(
        (status = 201, description = "Match created", body = Match),
        (status = 400, description = "Invalid pairing", body = crate::error::ApiError),
        (status = 403, description = "Requires arbitro, organizador or admin", body = crate::error::ApiError),
        (status = 404, description = "Not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_match(
    State(state): State<Arc<AppState>>,
    principal: AuthenticatedPrincipal,
    Path(id): Path<i64>,
    Json(request): Json<CreateMatchRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;

    let tournament = load_tournament(&state.store, id).await?;
    ensure_can_manage(&principal, &tournament)?;

    if request.round > tournament.max_rounds {
        return Err(AppError::BadRequest(format!(
            "Round must be between 1 and {}",
            tournament.max_rounds
        )));
    }
    if request.white_id == request.black_id {
        return Err(AppError::BadRequest(
            "A player cannot be paired against themselves".to_string(),
        ));
    }

    let enrolled = state
        .store
        .filter(|e: &Enrollment| e.tournament_id == id)
        .await?;
    for player in [request.white_id, request.black_id] {
        if !enrolled.iter().any(|e| e.user_id == player) {
            return Err(AppError::BadRequest(format!(
                "Player {player} is not enrolled in this tournament"
            )));
        }
    }

    let now = Utc::now();
    let game = state
        .store
        .insert_with(|match_id| Match {
            id: match_id,
            tournament_id: id,
            round: request.round,
            white_id: request.white_id,
            black_id: request.black_id,
            result: request.result,
            created_at: now,
            result_at: request.result.map(|_| now),
        })
        .await?;

    credit_points(&state.store, &game, None).await?;

    Ok((StatusCode::CREATED, Json(game)))
}

/// Matches of a tournament, by round
#[utoipa::path(
    get,
    path = "/tournaments/{id}/matches",
    tag = "matches",
    params(("id" = i64, Path, description = "Tournament id")),
    responses(
        (status = 200, description = "Matches", body = Vec<Match>),
        (status = 404, description = "Not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_matches(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Match>>, AppError> {
    load_tournament(&state.store, id).await?;
    let mut matches = state.store.filter(|m: &Match| m.tournament_id == id).await?;
    matches.sort_by_key(|m| (m.round, m.id));
    Ok(Json(matches))
}

/// Record or correct a match result
///
/// Enrollment points follow the result: a correction removes the points of
/// the previous result before crediting the new one.
#[utoipa::path(
    put,
    path = "/matches/{id}/result",
    tag = "matches",
    params(("id" = i64, Path, description = "Match id")),
    request_body = RecordResultRequest,
    responses(
        (status = 200, description = "Result recorded", body = Match),
        (status = 403, description = "Requires arbitro or admin", body = crate::error::ApiError),
        (status = 404, description = "Not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn record_result(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(request): Json<RecordResultRequest>,
) -> Result<Json<Match>, AppError> {
    let (game, previous) = state
        .store
        .modify(|matches: &mut Vec<Match>| {
            let game = matches
                .iter_mut()
                .find(|m| m.id == id)
                .ok_or_else(|| AppError::NotFound(format!("Match {id}")))?;
            let previous = game.result.replace(request.result);
            game.result_at = Some(Utc::now());
            Ok::<_, AppError>((game.clone(), previous))
        })
        .await?;

    credit_points(&state.store, &game, previous).await?;

    tracing::info!(match_id = game.id, result = ?game.result, "Match result recorded");
    Ok(Json(game))
}
