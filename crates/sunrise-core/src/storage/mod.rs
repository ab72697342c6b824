mod config;
pub mod database;

pub use config::{Config, EngineSettings, ProviderConfig};
pub use database::{Database, NewAlarm, SleepRecord, UserRecord};

use std::path::PathBuf;

use crate::alarm::Alarm;
use crate::error::{ConfigError, DatabaseError};
use crate::integrations::oauth::Credential;

/// Returns `~/.config/sunrise[-dev]/` based on SUNRISE_ENV.
///
/// Set SUNRISE_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("SUNRISE_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("sunrise-dev")
    } else {
        base_dir.join("sunrise")
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(e.to_string()))?;
    Ok(dir)
}

/// Persistence the alarm engine and telemetry client depend on.
///
/// Every method is atomic on its own. Implementations must be shareable
/// across concurrently running evaluations.
pub trait EngineStore: Send + Sync {
    /// Current credential for a user, if they linked a telemetry account.
    fn get_credential(&self, user_id: i64) -> Result<Option<Credential>, DatabaseError>;

    /// Store a credential unconditionally (initial link).
    fn save_credential(&self, user_id: i64, credential: &Credential) -> Result<(), DatabaseError>;

    /// Replace the stored token pair only if the stored refresh token still
    /// equals `expected_refresh`. Returns `false` when another writer won.
    fn replace_credential(
        &self,
        user_id: i64,
        expected_refresh: &str,
        credential: &Credential,
    ) -> Result<bool, DatabaseError>;

    /// Telemetry subject linked to the user.
    fn linked_subject(&self, user_id: i64) -> Result<Option<String>, DatabaseError>;

    fn get_resting_rate(&self, subject_id: &str) -> Result<Option<u32>, DatabaseError>;

    fn save_resting_rate(&self, subject_id: &str, rate: u32) -> Result<(), DatabaseError>;

    /// Enabled alarms for the user in ascending id order.
    fn list_enabled_alarms(&self, user_id: i64) -> Result<Vec<Alarm>, DatabaseError>;
}
