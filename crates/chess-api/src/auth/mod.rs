//! Authentication and authorization
//!
//! - `password`: Argon2id hashing and verification
//! - `jwt`: signed token encoding and decoding
//! - `tokens`: access/refresh issuance, verification and refresh
//! - `guard`: per-request bearer authentication
//! - `policy`: role policy table for gated operations
//! - `service`: registration, login and profile management

pub mod guard;
pub mod jwt;
pub mod password;
pub mod policy;
pub mod service;
pub mod tokens;

pub use guard::{authenticate, bearer_token, require_auth, AuthRejection, AuthenticatedPrincipal};
pub use jwt::{Claims, JwtError, TokenCodec, TokenKind};
pub use password::{validate_password_strength, PasswordError, PasswordHasher};
pub use policy::{authorize, enforce_policy, Action};
pub use service::{
    AuthService, ChangePasswordRequest, LoginRequest, RefreshRequest, RegisterRequest,
    UpdateProfileRequest,
};
pub use tokens::{
    InvalidReason, RefreshError, RefreshedAccess, TokenPair, TokenService, Verification,
};
