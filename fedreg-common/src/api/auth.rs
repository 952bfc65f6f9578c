//! Session tokens and password hashing
//!
//! # Architecture
//!
//! - Passwords are stored as an iterated, salted SHA-256 digest (hex) next to
//!   a random per-user salt.
//! - Sessions are stateless HS256 JWTs carrying the user id, username and role.
//!   A token stays valid until it expires; logout is client-side.
//!
//! # Pure Functions
//!
//! This module contains ONLY pure functions. No HTTP framework dependencies:
//! the server wraps these in axum extractors.

use chrono::{Duration, Utc};
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Digest rounds applied to every password
const PASSWORD_HASH_ROUNDS: usize = 10_000;

/// Salt length in bytes (hex-encoded to twice this)
const SALT_BYTES: usize = 16;

// ========================================
// Error Types
// ========================================

/// Authentication error types
///
/// The `Display` text of each variant is the message returned to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiAuthError {
    /// No `Authorization` header
    MissingToken,

    /// Header present but not `Bearer <token>`
    InvalidFormat,

    /// Signature valid, `exp` in the past
    Expired,

    /// Bad signature, malformed token or wrong algorithm
    InvalidToken,

    /// Token could not be produced
    Encoding(String),
}

impl std::fmt::Display for ApiAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiAuthError::MissingToken => write!(f, "Token is missing"),
            ApiAuthError::InvalidFormat => write!(f, "Invalid token format"),
            ApiAuthError::Expired => write!(f, "Token has expired"),
            ApiAuthError::InvalidToken => write!(f, "Invalid token"),
            ApiAuthError::Encoding(err) => write!(f, "Token encoding failed: {}", err),
        }
    }
}

impl std::error::Error for ApiAuthError {}

// ========================================
// Password Hashing
// ========================================

/// Generate a random hex salt
pub fn generate_salt() -> String {
    let bytes: [u8; SALT_BYTES] = rand::thread_rng().gen();
    to_hex(&bytes)
}

/// Hash a password with its salt
///
/// # Examples
///
/// ```
/// use fedreg_common::api::auth::hash_password;
///
/// let a = hash_password("secret", "00ff");
/// let b = hash_password("secret", "00ff");
/// assert_eq!(a, b);
/// assert_eq!(a.len(), 64);
/// assert_ne!(a, hash_password("secret", "ff00"));
/// ```
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut digest = Sha256::new()
        .chain_update(salt.as_bytes())
        .chain_update(password.as_bytes())
        .finalize();

    for _ in 1..PASSWORD_HASH_ROUNDS {
        digest = Sha256::new()
            .chain_update(digest)
            .chain_update(salt.as_bytes())
            .finalize();
    }

    format!("{:x}", digest)
}

/// Check a password against a stored hash
pub fn verify_password(password: &str, salt: &str, expected_hash: &str) -> bool {
    let calculated = hash_password(password, salt);
    constant_time_eq(calculated.as_bytes(), expected_hash.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

// ========================================
// Session Tokens
// ========================================

/// JWT claims carried by every session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: i64,
    pub username: String,
    pub role: String,
    /// Issued-at, seconds since epoch
    pub iat: i64,
    /// Expiry, seconds since epoch
    pub exp: i64,
}

/// Issue a token valid for `ttl_hours`
pub fn issue_token(
    user_id: i64,
    username: &str,
    role: &str,
    secret: &str,
    ttl_hours: i64,
) -> Result<String, ApiAuthError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        role: role.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::hours(ttl_hours)).timestamp(),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiAuthError::Encoding(e.to_string()))
}

/// Verify a token's signature and expiry
pub fn decode_token(token: &str, secret: &str) -> Result<Claims, ApiAuthError> {
    let validation = Validation::new(Algorithm::HS256);

    jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => ApiAuthError::Expired,
            _ => ApiAuthError::InvalidToken,
        })
}

/// Extract the token from an `Authorization` header value
///
/// # Examples
///
/// ```
/// use fedreg_common::api::auth::{bearer_token, ApiAuthError};
///
/// assert_eq!(bearer_token(Some("Bearer abc.def")), Ok("abc.def"));
/// assert_eq!(bearer_token(None), Err(ApiAuthError::MissingToken));
/// assert_eq!(bearer_token(Some("Token abc")), Err(ApiAuthError::InvalidFormat));
/// ```
pub fn bearer_token(header: Option<&str>) -> Result<&str, ApiAuthError> {
    let header = header.ok_or(ApiAuthError::MissingToken)?;
    let mut parts = header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(ApiAuthError::InvalidFormat),
    }
}
