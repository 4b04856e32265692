//! Configuration Management
//!
//! Handles configuration from environment variables and TOML files.
//! Everything except the signing secret has a development default; the
//! secret must always be supplied and a missing or invalid value is a
//! fatal startup error.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Minimum accepted length of the HMAC signing secret (256 bits)
pub const MIN_SECRET_LENGTH: usize = 32;

/// Longest accepted access token lifetime (one day)
pub const MAX_ACCESS_TOKEN_MINUTES: u64 = 24 * 60;

/// Longest accepted refresh token lifetime (one year)
pub const MAX_REFRESH_TOKEN_DAYS: u64 = 365;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Token and password hashing configuration
    pub auth: AuthConfig,

    /// JSON data directory
    pub storage: StorageConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables and validate it
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup and validate it
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    ///
    /// The result is not validated yet: the secret usually arrives through
    /// the environment, so call [`AppConfig::with_env_override`] next.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence) and validate
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())?;
        self.validate()?;
        Ok(self)
    }

    /// Load from an optional TOML file, then apply the environment
    pub fn load(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path)?.with_env_override(),
            None => Self::from_env(),
        }
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server
        if let Some(host) = lookup("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("API_PORT") {
            self.server.port = parse_value("API_PORT", port)?;
        }
        if let Some(origins) = lookup("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Tokens
        if let Some(secret) = lookup("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(algorithm) = lookup("JWT_ALGORITHM") {
            self.auth.algorithm = algorithm.parse()?;
        }
        if let Some(minutes) = lookup("ACCESS_TOKEN_EXPIRE_MINUTES") {
            self.auth.access_token_expire_minutes =
                parse_value("ACCESS_TOKEN_EXPIRE_MINUTES", minutes)?;
        }
        if let Some(days) = lookup("REFRESH_TOKEN_EXPIRE_DAYS") {
            self.auth.refresh_token_expire_days = parse_value("REFRESH_TOKEN_EXPIRE_DAYS", days)?;
        }

        // Password hashing cost
        if let Some(memory) = lookup("PASSWORD_HASH_MEMORY_KIB") {
            self.auth.password.memory_cost_kib = parse_value("PASSWORD_HASH_MEMORY_KIB", memory)?;
        }
        if let Some(iterations) = lookup("PASSWORD_HASH_ITERATIONS") {
            self.auth.password.iterations = parse_value("PASSWORD_HASH_ITERATIONS", iterations)?;
        }
        if let Some(parallelism) = lookup("PASSWORD_HASH_PARALLELISM") {
            self.auth.password.parallelism =
                parse_value("PASSWORD_HASH_PARALLELISM", parallelism)?;
        }

        // Storage
        if let Some(dir) = lookup("DATA_DIR") {
            self.storage.data_dir = PathBuf::from(dir);
        }

        // Logging
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            self.logging.json_format = format.eq_ignore_ascii_case("json");
        }

        Ok(())
    }

    /// Check every value the server cannot start without
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.auth.validate()
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Allowed origins for CORS ("*" allows any)
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
        }
    }
}

/// Token signing and password hashing configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret shared by every token issued and verified
    pub jwt_secret: String,

    /// Signing algorithm; tokens signed with anything else are rejected
    pub algorithm: JwtAlgorithm,

    /// Access token lifetime in minutes
    pub access_token_expire_minutes: u64,

    /// Refresh token lifetime in days
    pub refresh_token_expire_days: u64,

    /// Argon2 cost parameters
    pub password: PasswordHashConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            algorithm: JwtAlgorithm::HS256,
            access_token_expire_minutes: 30,
            refresh_token_expire_days: 7,
            password: PasswordHashConfig::default(),
        }
    }
}

impl AuthConfig {
    /// Access token lifetime
    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_token_expire_minutes.saturating_mul(60))
    }

    /// Refresh token lifetime
    pub fn refresh_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_token_expire_days.saturating_mul(24 * 60 * 60))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::MissingRequired("JWT_SECRET".to_string()));
        }
        if self.jwt_secret.len() < MIN_SECRET_LENGTH {
            return Err(ConfigError::WeakSecret {
                min_len: MIN_SECRET_LENGTH,
            });
        }
        check_range(
            "ACCESS_TOKEN_EXPIRE_MINUTES",
            self.access_token_expire_minutes,
            MAX_ACCESS_TOKEN_MINUTES,
        )?;
        check_range(
            "REFRESH_TOKEN_EXPIRE_DAYS",
            self.refresh_token_expire_days,
            MAX_REFRESH_TOKEN_DAYS,
        )?;
        self.password.validate()
    }
}

/// Lifetimes must be non-zero and bounded so `iat + ttl` always fits in a `u64`
fn check_range(key: &str, value: u64, max: u64) -> Result<(), ConfigError> {
    if value == 0 || value > max {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}

// The secret must never end up in logs.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("algorithm", &self.algorithm)
            .field(
                "access_token_expire_minutes",
                &self.access_token_expire_minutes,
            )
            .field("refresh_token_expire_days", &self.refresh_token_expire_days)
            .field("password", &self.password)
            .finish()
    }
}

/// Supported HMAC signing algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JwtAlgorithm {
    HS256,
    HS384,
    HS512,
}

impl JwtAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
        }
    }
}

impl std::str::FromStr for JwtAlgorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "HS256" => Ok(Self::HS256),
            "HS384" => Ok(Self::HS384),
            "HS512" => Ok(Self::HS512),
            _ => Err(ConfigError::InvalidValue {
                key: "JWT_ALGORITHM".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Argon2id cost parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordHashConfig {
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub memory_cost_kib: u32,

    /// Time cost (iterations)
    pub iterations: u32,

    /// Degree of parallelism (lanes)
    pub parallelism: u32,
}

impl Default for PasswordHashConfig {
    fn default() -> Self {
        Self {
            memory_cost_kib: 65536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

impl PasswordHashConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.parallelism == 0 {
            return Err(ConfigError::InvalidValue {
                key: "PASSWORD_HASH_PARALLELISM".to_string(),
                value: self.parallelism.to_string(),
            });
        }
        if self.iterations == 0 {
            return Err(ConfigError::InvalidValue {
                key: "PASSWORD_HASH_ITERATIONS".to_string(),
                value: self.iterations.to_string(),
            });
        }
        // Argon2 needs at least 8 KiB per lane
        if self.memory_cost_kib < 8 * self.parallelism {
            return Err(ConfigError::InvalidValue {
                key: "PASSWORD_HASH_MEMORY_KIB".to_string(),
                value: self.memory_cost_kib.to_string(),
            });
        }
        Ok(())
    }
}

/// Persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one JSON file per collection
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("JWT_SECRET must be at least {min_len} bytes long")]
    WeakSecret { min_len: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "0123456789abcdef0123456789abcdef-test";

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_with_secret() {
        let config = AppConfig::from_lookup(lookup_from(&[("JWT_SECRET", SECRET)])).unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.auth.algorithm, JwtAlgorithm::HS256);
        assert_eq!(config.auth.access_ttl(), Duration::from_secs(30 * 60));
        assert_eq!(config.auth.refresh_ttl(), Duration::from_secs(7 * 86_400));
        assert_eq!(config.storage.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn test_missing_secret_is_fatal() {
        let result = AppConfig::from_lookup(lookup_from(&[]));
        assert!(matches!(result, Err(ConfigError::MissingRequired(key)) if key == "JWT_SECRET"));
    }

    #[test]
    fn test_short_secret_is_rejected() {
        let result = AppConfig::from_lookup(lookup_from(&[("JWT_SECRET", "short")]));
        assert!(matches!(result, Err(ConfigError::WeakSecret { .. })));
    }

    #[test]
    fn test_invalid_ttl_is_rejected() {
        let result = AppConfig::from_lookup(lookup_from(&[
            ("JWT_SECRET", SECRET),
            ("ACCESS_TOKEN_EXPIRE_MINUTES", "soon"),
        ]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { key, .. }) if key == "ACCESS_TOKEN_EXPIRE_MINUTES"));

        let result = AppConfig::from_lookup(lookup_from(&[
            ("JWT_SECRET", SECRET),
            ("REFRESH_TOKEN_EXPIRE_DAYS", "0"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_oversized_ttl_is_rejected() {
        let result = AppConfig::from_lookup(lookup_from(&[
            ("JWT_SECRET", SECRET),
            ("REFRESH_TOKEN_EXPIRE_DAYS", "300000000000000"),
        ]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { key, .. }) if key == "REFRESH_TOKEN_EXPIRE_DAYS"));

        let result = AppConfig::from_lookup(lookup_from(&[
            ("JWT_SECRET", SECRET),
            ("ACCESS_TOKEN_EXPIRE_MINUTES", "18446744073709551615"),
        ]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { key, .. }) if key == "ACCESS_TOKEN_EXPIRE_MINUTES"));

        let config = AppConfig::from_lookup(lookup_from(&[
            ("JWT_SECRET", SECRET),
            ("ACCESS_TOKEN_EXPIRE_MINUTES", "1440"),
            ("REFRESH_TOKEN_EXPIRE_DAYS", "365"),
        ]))
        .unwrap();
        assert_eq!(config.auth.refresh_ttl(), Duration::from_secs(365 * 86_400));
    }

    #[test]
    fn test_algorithm_parse() {
        assert_eq!("hs512".parse::<JwtAlgorithm>().unwrap(), JwtAlgorithm::HS512);
        assert!("RS256".parse::<JwtAlgorithm>().is_err());
        assert!("none".parse::<JwtAlgorithm>().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("JWT_SECRET", SECRET),
            ("JWT_ALGORITHM", "HS384"),
            ("ACCESS_TOKEN_EXPIRE_MINUTES", "5"),
            ("API_PORT", "9090"),
            ("CORS_ORIGINS", "http://a.test, http://b.test,"),
            ("LOG_FORMAT", "JSON"),
        ]))
        .unwrap();

        assert_eq!(config.auth.algorithm, JwtAlgorithm::HS384);
        assert_eq!(config.auth.access_ttl(), Duration::from_secs(300));
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.cors_origins, vec!["http://a.test", "http://b.test"]);
        assert!(config.logging.json_format);
    }

    #[test]
    fn test_password_cost_validation() {
        let result = AppConfig::from_lookup(lookup_from(&[
            ("JWT_SECRET", SECRET),
            ("PASSWORD_HASH_PARALLELISM", "4"),
            ("PASSWORD_HASH_MEMORY_KIB", "16"),
        ]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { key, .. }) if key == "PASSWORD_HASH_MEMORY_KIB"));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = AppConfig::from_lookup(lookup_from(&[("JWT_SECRET", SECRET)])).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains(SECRET));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_toml_file_then_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chess.toml");
        std::fs::write(
            &path,
            format!(
                "[auth]\njwt_secret = \"{SECRET}\"\naccess_token_expire_minutes = 15\n\n[storage]\ndata_dir = \"/var/lib/chess\"\n"
            ),
        )
        .unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        config.validate().unwrap();
        assert_eq!(config.auth.access_token_expire_minutes, 15);
        assert_eq!(config.auth.refresh_token_expire_days, 7);
        assert_eq!(config.storage.data_dir, PathBuf::from("/var/lib/chess"));
    }
}
