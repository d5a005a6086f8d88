use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the runner
#[derive(Error, Debug)]
pub enum HedgeError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Missing required configuration: {}", .0.join(", "))]
    MissingConfig(Vec<String>),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Venue session setup
    #[error(transparent)]
    Auth(#[from] AuthError),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for HedgeError
pub type Result<T> = std::result::Result<T, HedgeError>;

/// Venue session errors. The current cycle is skipped; the next one retries.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Passcode generation failed: {0}")]
    Totp(String),

    #[error("Venue unreachable: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Venue returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Venue rejected login: {message} (code: {code})")]
    Rejected { message: String, code: String },

    #[error("Malformed login response: {0}")]
    Malformed(String),
}

/// Control-plane catalog errors. The cycle continues with zero strategies.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Control-plane unreachable: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Control-plane returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Control-plane reported failure: {0}")]
    Rejected(String),

    #[error("Malformed catalog response: {0}")]
    Malformed(#[source] serde_json::Error),
}

impl FetchError {
    /// Failures worth another attempt within the same fetch
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Transport(_) => true,
            FetchError::Status { status, .. } => *status >= 500 || *status == 429,
            FetchError::Rejected(_) | FetchError::Malformed(_) => false,
        }
    }
}

/// Per-strategy record problems. Only the offending strategy is skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("required field is empty: {0}")]
    EmptyField(&'static str),

    #[error("executable not found: {}", .0.display())]
    ExecutableNotFound(PathBuf),

    #[error("executable is not a regular file: {}", .0.display())]
    ExecutableNotAFile(PathBuf),

    #[error("executable is not readable: {}: {reason}", .path.display())]
    ExecutableInaccessible { path: PathBuf, reason: String },

    #[error("parameters are not valid JSON: {0}")]
    InvalidParameters(String),

    #[error("malformed catalog entry: {0}")]
    MalformedRecord(String),
}
