//! Domain records for the tournament service
//!
//! Each record is stored as one element of a JSON array in its own file
//! (see [`crate::store`]). Enum values keep the wire strings existing data
//! files and issued tokens already use.

use crate::store::Record;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ============================================================================
// Roles
// ============================================================================

/// User role
///
/// - Player: enrolls in tournaments
/// - Organizer: creates and runs tournaments
/// - Arbiter: pairs matches and records results
/// - Admin: full access including user management
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
pub enum Role {
    #[default]
    #[serde(rename = "jugador")]
    Player,
    #[serde(rename = "organizador")]
    Organizer,
    #[serde(rename = "arbitro")]
    Arbiter,
    #[serde(rename = "admin")]
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Player, Role::Organizer, Role::Arbiter, Role::Admin];

    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Player => "jugador",
            Role::Organizer => "organizador",
            Role::Arbiter => "arbitro",
            Role::Admin => "admin",
        }
    }

    /// Parse role from its wire representation
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|role| role.as_str() == s)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Users
// ============================================================================

/// Stored user account
///
/// `password_hash` is a self-describing Argon2 PHC string. It never leaves
/// the process: responses go through [`User::to_public`] and `Debug` omits it.
#[derive(Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub role: Role,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

impl User {
    /// Convert user to public representation (without the password hash)
    pub fn to_public(&self) -> UserPublic {
        UserPublic {
            id: self.id,
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            role: self.role,
            created_at: self.created_at,
            updated_at: self.updated_at,
            active: self.active,
        }
    }
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

impl Record for User {
    const COLLECTION: &'static str = "users";

    fn id(&self) -> i64 {
        self.id
    }
}

/// Public user representation (safe for API responses)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserPublic {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub active: bool,
}

// ============================================================================
// Tournaments
// ============================================================================

/// Pairing system of a tournament
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub enum TournamentFormat {
    #[default]
    #[serde(rename = "suizo")]
    Swiss,
    #[serde(rename = "round_robin")]
    RoundRobin,
    #[serde(rename = "eliminacion")]
    Elimination,
}

/// Lifecycle of a tournament
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub enum TournamentStatus {
    #[default]
    #[serde(rename = "abierto")]
    Open,
    #[serde(rename = "en_curso")]
    InProgress,
    #[serde(rename = "finalizado")]
    Finished,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Tournament {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub format: TournamentFormat,
    pub max_rounds: u32,
    #[serde(default)]
    pub status: TournamentStatus,
    pub organizer_id: i64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Tournament {
    /// Check the invariants that span several fields
    pub fn check_dates(
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<(), crate::ChessError> {
        match end {
            Some(end) if end <= start => Err(crate::ChessError::ValidationError(
                "End date must be after the start date".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

impl Record for Tournament {
    const COLLECTION: &'static str = "tournaments";

    fn id(&self) -> i64 {
        self.id
    }
}

// ============================================================================
// Enrollments
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Enrollment {
    pub id: i64,
    pub user_id: i64,
    pub tournament_id: i64,
    #[serde(default = "Enrollment::default_rating")]
    pub initial_rating: u32,
    pub enrolled_at: DateTime<Utc>,
    #[serde(default)]
    pub points: f64,
}

impl Enrollment {
    pub fn default_rating() -> u32 {
        1200
    }
}

impl Record for Enrollment {
    const COLLECTION: &'static str = "enrollments";

    fn id(&self) -> i64 {
        self.id
    }
}

// ============================================================================
// Matches
// ============================================================================

/// Outcome of a single game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum MatchResult {
    #[serde(rename = "blancas_ganan")]
    WhiteWins,
    #[serde(rename = "negras_ganan")]
    BlackWins,
    #[serde(rename = "tablas")]
    Draw,
    #[serde(rename = "no_jugada")]
    NotPlayed,
}

impl MatchResult {
    /// Points credited to (white, black)
    pub fn points(&self) -> (f64, f64) {
        match self {
            MatchResult::WhiteWins => (1.0, 0.0),
            MatchResult::BlackWins => (0.0, 1.0),
            MatchResult::Draw => (0.5, 0.5),
            MatchResult::NotPlayed => (0.0, 0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Match {
    pub id: i64,
    pub tournament_id: i64,
    pub round: u32,
    pub white_id: i64,
    pub black_id: i64,
    pub result: Option<MatchResult>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub result_at: Option<DateTime<Utc>>,
}

impl Record for Match {
    const COLLECTION: &'static str = "matches";

    fn id(&self) -> i64 {
        self.id
    }
}

// ============================================================================
// Ratings
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Rating {
    pub id: i64,
    pub user_id: i64,
    pub rating: u32,
    pub recorded_at: DateTime<Utc>,
}

impl Record for Rating {
    const COLLECTION: &'static str = "ratings";

    fn id(&self) -> i64 {
        self.id
    }
}
