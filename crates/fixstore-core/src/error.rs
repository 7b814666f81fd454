//! Error types shared across fixstore crates.

use thiserror::Error;

use crate::timestamp::TimestampError;

/// Result type alias using the core [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for fixstore-core.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Layered configuration could not be extracted
    #[error("Configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),

    /// Timestamp could not be encoded or decoded
    #[error("{0}")]
    Timestamp(#[from] TimestampError),

    /// Session identity is incomplete
    #[error("Invalid session id: {0}")]
    InvalidSessionId(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be rendered as TOML
    #[error("TOML error: {0}")]
    Toml(#[from] toml::ser::Error),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Figment(Box::new(err))
    }
}

impl Error {
    /// Get a recovery suggestion for this error.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Error::Config(_) | Error::Figment(_) => {
                Some("Check ~/.config/fixstore/config.toml and ./fixstore.toml")
            }
            Error::Timestamp(_) => {
                Some("The session file is corrupt; reset the store to write a fresh creation time")
            }
            Error::InvalidSessionId(_) => {
                Some("Provide begin string, sender and target comp ids")
            }
            _ => None,
        }
    }
}

/// Format an error with its recovery suggestion.
pub fn format_error_with_suggestion(error: &Error) -> String {
    let mut output = error.to_string();
    if let Some(suggestion) = error.recovery_suggestion() {
        output.push_str(&format!("\n  Suggestion: {}", suggestion));
    }
    output
}
