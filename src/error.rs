// ⚠️ Error types shared by the library, the CLI and the API server

use crate::forms::FormErrors;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid form input")]
    Validation(FormErrors),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Access denied")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    /// The account does not belong to any purse yet
    #[error("No purse: create one first")]
    NoPurse,

    /// The account has purses but none is selected as default
    #[error("No default purse selected")]
    NoDefaultPurse,

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error("Invalid stored data: {0}")]
    Corrupt(String),

    #[error("Background task failed: {0}")]
    Background(String),
}

impl TrackerError {
    /// Shorthand for a single-field validation failure
    pub fn field(field: &str, message: &str) -> Self {
        let mut errors = FormErrors::new();
        errors.add(field, message);
        TrackerError::Validation(errors)
    }
}

impl From<FormErrors> for TrackerError {
    fn from(errors: FormErrors) -> Self {
        TrackerError::Validation(errors)
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
