//! Error type shared by the registry crates
//!
//! Row-level failures surface as `Database`; caller mistakes that the
//! common helpers can detect themselves (malformed dates) get their own
//! variant so the HTTP layer can answer 400 instead of 500.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unreadable TOML or an unknown enumerated setting
    #[error("Configuration error: {0}")]
    Config(String),

    /// A row that should exist is missing or soft-deleted
    #[error("Not found: {0}")]
    NotFound(String),

    /// Range bound that is not a `YYYY-MM-DD` calendar date
    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    /// Invariant broken inside the service (row vanished after insert)
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_date_message_names_the_value() {
        let err = Error::InvalidDate("yesterday".to_string());
        assert_eq!(err.to_string(), "Invalid date 'yesterday', expected YYYY-MM-DD");
    }
}
