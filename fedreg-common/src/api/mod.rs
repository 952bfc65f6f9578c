//! Shared HTTP API primitives
//!
//! # Design Principle
//!
//! This module contains ONLY:
//! - Pure functions (no HTTP framework dependencies)
//! - Shared wire types
//!
//! The server wraps these with framework-specific extractors and responses.

pub mod auth;
pub mod types;

pub use auth::{
    bearer_token, decode_token, generate_salt, hash_password, issue_token, verify_password,
    ApiAuthError, Claims,
};
pub use types::{ApiEnvelope, PageInfo, PagedList};
