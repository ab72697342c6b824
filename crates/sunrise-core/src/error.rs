//! Core error types for sunrise-core.
//!
//! Each concern (storage, configuration, OAuth, telemetry, rendering, engine)
//! gets its own thiserror enum; [`CoreError`] aggregates them for callers that
//! do not care which layer failed.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for sunrise-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// OAuth-related errors
    #[error("OAuth error: {0}")]
    OAuth(#[from] OAuthError),

    /// Telemetry provider errors
    #[error("Telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    /// Alarm engine errors
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// A previous holder of the connection panicked
    #[error("Database connection mutex poisoned")]
    Poisoned,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Missing required configuration key
    #[error("Missing required configuration key: {0}")]
    MissingKey(String),

    /// The data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// OAuth-specific errors.
#[derive(Error, Debug)]
pub enum OAuthError {
    /// No pending authorization matches the callback, or it outlived its TTL
    #[error("Authorization expired or unknown; start the authorization again")]
    AuthorizationExpired,

    /// Token exchange failed
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    /// Token refresh failed in transport or with a server error
    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    /// The provider rejected the refresh token itself
    #[error("Refresh token rejected by provider: {0}")]
    InvalidGrant(String),

    /// Credentials not configured
    #[error("OAuth client credentials not configured")]
    CredentialsNotConfigured,

    /// The OS random source failed
    #[error("Failed to generate random bytes: {0}")]
    Randomness(String),

    /// Malformed authorize/token URL
    #[error("Invalid OAuth URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Failure of a single provider API call, as seen by the auth session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// HTTP 401: the access token is no longer accepted
    #[error("Unauthorized")]
    Unauthorized,

    /// Network errors, rate limiting and 5xx responses
    #[error("Transient API failure: {0}")]
    Transient(String),

    /// Any other 4xx or an undecodable body
    #[error("Permanent API failure: {0}")]
    Permanent(String),
}

/// Errors surfaced by the telemetry client.
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The user never linked a telemetry account
    #[error("No credential stored for user {user_id}")]
    NoCredential { user_id: i64 },

    /// The refresh token is invalid; the user must link their account again
    #[error("User {user_id} must reconnect their fitness account")]
    ReauthorizationRequired { user_id: i64 },

    /// Network, rate-limit or server-side failure
    #[error("Transient telemetry failure: {0}")]
    Transient(String),

    /// Request rejected or response unusable
    #[error("Telemetry request failed: {0}")]
    Permanent(String),

    #[error(transparent)]
    Store(#[from] DatabaseError),
}

impl TelemetryError {
    /// Map a non-401 API failure into the telemetry taxonomy.
    pub(crate) fn from_api(err: ApiError, user_id: i64) -> Self {
        match err {
            ApiError::Unauthorized => TelemetryError::ReauthorizationRequired { user_id },
            ApiError::Transient(msg) => TelemetryError::Transient(msg),
            ApiError::Permanent(msg) => TelemetryError::Permanent(msg),
        }
    }
}

/// Errors returned by an audio render gateway.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The render did not finish within the configured bound
    #[error("Render timed out after {secs}s")]
    TimedOut { secs: u64 },

    /// The backend reported a failure
    #[error("Render failed: {0}")]
    Failed(String),

    #[error("Render IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned by [`crate::alarm::AlarmEngine::evaluate`].
#[derive(Error, Debug)]
pub enum EngineError {
    /// An alarm matched but no playable sound was produced
    #[error("Alarm {alarm_id} matched but rendering failed: {source}")]
    RenderFailed {
        alarm_id: i64,
        #[source]
        source: RenderError,
    },

    /// Ambiguous or malformed alarm rows
    #[error("Alarm configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Store(#[from] DatabaseError),
}

// Helper implementations for converting from other error types

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg)
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy =>
            {
                DatabaseError::Locked
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for DatabaseError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        DatabaseError::Poisoned
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
