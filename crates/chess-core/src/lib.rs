//! Chess Core - Domain models, configuration and persistence
//!
//! This crate defines the shared pieces of the tournament service:
//! - Domain records (users, tournaments, enrollments, matches, ratings)
//! - Role and enum vocabularies used on the wire and inside tokens
//! - Configuration management (environment and TOML)
//! - The JSON-file record store and the `UserDirectory` lookup contract
//! - Standings computed from enrollments and match results
//! - Common error types

pub mod config;
pub mod models;
pub mod standings;
pub mod store;

pub use config::{
    AppConfig, AuthConfig, ConfigError, JwtAlgorithm, LoggingConfig, PasswordHashConfig,
    ServerConfig, StorageConfig,
};
pub use models::{
    Enrollment, Match, MatchResult, Rating, Role, Tournament, TournamentFormat, TournamentStatus,
    User, UserPublic,
};
pub use standings::Standing;
pub use store::{JsonStore, Record, StoreError, UserDirectory};

use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for tournament operations
#[derive(Error, Debug)]
pub enum ChessError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, ChessError>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ChessError::NotFound("Tournament 3".to_string());
        assert_eq!(err.to_string(), "Not found: Tournament 3");

        let err: ChessError = ConfigError::MissingRequired("JWT_SECRET".to_string()).into();
        assert!(err.to_string().contains("JWT_SECRET"));
    }
}
