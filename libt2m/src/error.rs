//! Error types for t2m

use thiserror::Error;

pub type Result<T> = std::result::Result<T, T2mError>;

#[derive(Error, Debug)]
pub enum T2mError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error(
        "No associated mastodon account for twitter account '{0}'. \
         Use the '-m' option to provide one."
    )]
    MissingLink(String),

    #[error(
        "Mastodon handle '{destination}' needs the instance name. \
         Please add it using: t2m add {account} {destination}@theinstance.com"
    )]
    MalformedDestination { account: String, destination: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl T2mError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            T2mError::InvalidInput(_) => 3,
            T2mError::Platform(PlatformError::Authentication(_)) => 2,
            T2mError::Platform(_) => 1,
            T2mError::MissingLink(_) => 1,
            T2mError::MalformedDestination { .. } => 1,
            T2mError::Config(_) => 1,
            T2mError::Ledger(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Invalid content warning rule '{label}': {reason}")]
    InvalidRule { label: String, reason: String },
}

/// Failures reading or writing the forwarding ledger.
///
/// Always fatal: continuing without a trustworthy ledger would either resend
/// posts or silently drop de-duplication state.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Failed to read ledger {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse ledger {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("Failed to write ledger {path}: {reason}")]
    Write { path: String, reason: String },
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Media transfer failed: {0}")]
    Media(String),
}
