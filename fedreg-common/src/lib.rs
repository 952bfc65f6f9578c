//! # Federated Registry Common Library
//!
//! Shared code for the federated registry service:
//! - Configuration loading (TOML + environment + CLI overrides)
//! - Database schema initialization and row models
//! - Session token and password primitives
//! - The JSON response envelope used by every endpoint
//! - Time and identifier helpers

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod ids;
pub mod time;

pub use error::{Error, Result};
