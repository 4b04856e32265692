//! Application state management

use crate::auth::{AuthService, PasswordHasher, TokenService};
use anyhow::Context;
use chess_core::{AppConfig, JsonStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers
///
/// Built once from a validated [`AppConfig`] and never mutated afterwards,
/// apart from the readiness flag.
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// JSON record store
    pub store: Arc<JsonStore>,
    /// Token issuance and verification
    pub tokens: TokenService,
    /// Account operations
    pub auth: AuthService,
    /// Server start time
    pub start_time: Instant,
    /// Ready status
    pub is_ready: AtomicBool,
}

impl AppState {
    /// Create application state, opening the data directory
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let store = Arc::new(
            JsonStore::open(&config.storage.data_dir).with_context(|| {
                format!(
                    "Failed to open data directory {}",
                    config.storage.data_dir.display()
                )
            })?,
        );
        let hasher = PasswordHasher::new(&config.auth.password)
            .context("Invalid password hashing parameters")?;

        Ok(Self::with_store(config, store, hasher))
    }

    /// Create application state around an existing store
    pub fn with_store(config: AppConfig, store: Arc<JsonStore>, hasher: PasswordHasher) -> Self {
        let tokens = TokenService::new(&config.auth);
        let auth = AuthService::new(store.clone(), hasher, tokens.clone());

        Self {
            config,
            store,
            tokens,
            auth,
            start_time: Instant::now(),
            is_ready: AtomicBool::new(true),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Check if service is ready
    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    /// Set ready status
    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::SeqCst);
    }
}
