//! JWT encoding and decoding
//!
//! Tokens are compact `header.payload.signature` strings signed with a single
//! configured HMAC algorithm. The decoder only accepts that algorithm, checks
//! the signature and the `exp` claim in one step, and applies no leeway.

use chess_core::{AuthConfig, JwtAlgorithm, Role};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Which purpose a token was issued for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT claims
///
/// Every field is required: a token missing `user_id`, `email`, `role`,
/// `exp` or `type` does not decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Numeric user id
    pub user_id: i64,
    /// User's email address at issuance
    pub email: String,
    /// User's role at issuance
    pub role: Role,
    /// Issued at timestamp (Unix epoch seconds)
    pub iat: u64,
    /// Expiration timestamp (Unix epoch seconds)
    pub exp: u64,
    /// Access or refresh
    #[serde(rename = "type")]
    pub kind: TokenKind,
    /// Unique token id
    pub jti: String,
}

/// Token encoding/decoding errors
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode JWT: {0}")]
    EncodingError(#[source] jsonwebtoken::errors::Error),

    #[error("Invalid token format")]
    Malformed,

    #[error("Token has expired")]
    Expired,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token lifetime of {0:?} does not fit in an expiry timestamp")]
    LifetimeOverflow(std::time::Duration),

    #[error("System time error: {0}")]
    SystemTimeError(#[from] std::time::SystemTimeError),
}

/// Signs and verifies tokens with one secret and one algorithm
#[derive(Clone)]
pub struct TokenCodec {
    header: Header,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(secret: &[u8], algorithm: JwtAlgorithm) -> Self {
        let algorithm = match algorithm {
            JwtAlgorithm::HS256 => Algorithm::HS256,
            JwtAlgorithm::HS384 => Algorithm::HS384,
            JwtAlgorithm::HS512 => Algorithm::HS512,
        };

        let mut validation = Validation::new(algorithm);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            header: Header::new(algorithm),
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.jwt_secret.as_bytes(), config.algorithm)
    }

    /// Sign claims into a compact token
    pub fn encode(&self, claims: &Claims) -> Result<String, JwtError> {
        encode(&self.header, claims, &self.encoding_key).map_err(JwtError::EncodingError)
    }

    /// Verify signature and expiry, then extract claims
    pub fn decode(&self, token: &str) -> Result<Claims, JwtError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::Expired,
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    JwtError::InvalidSignature
                }
                _ => JwtError::Malformed,
            })
    }
}

/// Current Unix time in seconds
pub fn now_secs() -> Result<u64, JwtError> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

#[cfg(test)]
pub(crate) const TEST_SECRET: &str = "test-secret-key-that-is-long-enough-0123456789";

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use uuid::Uuid;

    fn claims(kind: TokenKind, exp: u64) -> Claims {
        let now = now_secs().unwrap();
        Claims {
            user_id: 7,
            email: "a@x.com".to_string(),
            role: Role::Player,
            iat: now,
            exp,
            kind,
            jti: Uuid::new_v4().to_string(),
        }
    }

    fn codec() -> TokenCodec {
        TokenCodec::new(TEST_SECRET.as_bytes(), JwtAlgorithm::HS256)
    }

    #[test]
    fn test_encode_and_decode_token() {
        let codec = codec();
        let original = claims(TokenKind::Access, now_secs().unwrap() + 1800);

        let token = codec.encode(&original).expect("Failed to encode token");
        assert_eq!(token.split('.').count(), 3);

        let decoded = codec.decode(&token).expect("Failed to decode token");
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_wire_claims() {
        let codec = codec();
        let token = codec
            .encode(&claims(TokenKind::Refresh, now_secs().unwrap() + 60))
            .unwrap();

        let payload = token.split('.').nth(1).unwrap();
        let json = URL_SAFE_NO_PAD.decode(payload).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();

        assert_eq!(value["type"], "refresh");
        assert_eq!(value["role"], "jugador");
        assert_eq!(value["user_id"], 7);
        assert!(value["exp"].is_u64());
    }

    #[test]
    fn test_invalid_token() {
        let result = codec().decode("invalid.token.here");
        assert!(matches!(result, Err(JwtError::Malformed)));

        let result = codec().decode("");
        assert!(matches!(result, Err(JwtError::Malformed)));
    }

    #[test]
    fn test_wrong_secret() {
        let other = TokenCodec::new(b"another-secret-that-is-also-long-enough!", JwtAlgorithm::HS256);
        let token = other
            .encode(&claims(TokenKind::Access, now_secs().unwrap() + 60))
            .unwrap();

        let result = codec().decode(&token);
        assert!(matches!(result, Err(JwtError::InvalidSignature)));
    }

    #[test]
    fn test_other_algorithm_is_rejected() {
        let hs512 = TokenCodec::new(TEST_SECRET.as_bytes(), JwtAlgorithm::HS512);
        let token = hs512
            .encode(&claims(TokenKind::Access, now_secs().unwrap() + 60))
            .unwrap();

        assert!(hs512.decode(&token).is_ok());
        assert!(matches!(codec().decode(&token), Err(JwtError::InvalidSignature)));
    }

    #[test]
    fn test_expired_token() {
        let now = now_secs().unwrap();
        let token = codec().encode(&claims(TokenKind::Access, now - 1)).unwrap();

        let result = codec().decode(&token);
        assert!(matches!(result, Err(JwtError::Expired)));
    }

    #[test]
    fn test_tampered_signature() {
        let codec = codec();
        let token = codec
            .encode(&claims(TokenKind::Access, now_secs().unwrap() + 60))
            .unwrap();

        let (rest, signature) = token.rsplit_once('.').unwrap();
        let mut bytes = signature.as_bytes().to_vec();
        bytes[0] = if bytes[0] == b'A' { b'B' } else { b'A' };
        let tampered = format!("{rest}.{}", String::from_utf8(bytes).unwrap());

        assert!(codec.decode(&tampered).is_err());
    }

    #[test]
    fn test_missing_claim_is_malformed() {
        #[derive(Serialize)]
        struct Partial {
            email: String,
            exp: u64,
            #[serde(rename = "type")]
            kind: TokenKind,
        }

        let token = encode(
            &Header::new(Algorithm::HS256),
            &Partial {
                email: "a@x.com".to_string(),
                exp: now_secs().unwrap() + 60,
                kind: TokenKind::Access,
            },
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .unwrap();

        assert!(matches!(codec().decode(&token), Err(JwtError::Malformed)));
    }
}
