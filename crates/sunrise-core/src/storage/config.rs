//! TOML-based application configuration.
//!
//! Stores:
//! - Fitness provider OAuth client settings and endpoint URLs
//! - Alarm engine settings (time zone offset, pan effect, sound/output
//!   directories, render timeout)
//!
//! Configuration is stored at `~/.config/sunrise/config.toml`. The client id,
//! client secret and redirect URL can be overridden with `SUNRISE_CLIENT_ID`,
//! `SUNRISE_CLIENT_SECRET` and `SUNRISE_REDIRECT_URL`.

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::data_dir;
use crate::error::ConfigError;

/// OAuth client registration and provider endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    /// Per-request timeout for provider calls, in seconds.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

/// Alarm engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Fixed offset of the deployment's time zone, in minutes east of UTC.
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
    #[serde(default = "default_true")]
    pub pan_enabled: bool,
    #[serde(default = "default_sounds_dir")]
    pub sounds_dir: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_output_extension")]
    pub output_extension: String,
    #[serde(default = "default_render_timeout_secs")]
    pub render_timeout_secs: u64,
    /// How far back the intraday heart-rate query reaches.
    #[serde(default = "default_heart_rate_window_minutes")]
    pub heart_rate_window_minutes: u32,
    /// Lifetime of a PKCE verifier waiting for its callback.
    #[serde(default = "default_authorization_ttl_minutes")]
    pub authorization_ttl_minutes: u32,
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/sunrise/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub engine: EngineSettings,
}

// Default functions
fn default_redirect_uri() -> String {
    "http://localhost:3000/auth/callback".into()
}
fn default_authorize_url() -> String {
    "https://www.fitbit.com/oauth2/authorize".into()
}
fn default_token_url() -> String {
    "https://api.fitbit.com/oauth2/token".into()
}
fn default_api_base_url() -> String {
    "https://api.fitbit.com".into()
}
fn default_scopes() -> Vec<String> {
    vec!["sleep".into(), "heartrate".into(), "profile".into()]
}
fn default_http_timeout_secs() -> u64 {
    10
}
fn default_utc_offset_minutes() -> i32 {
    9 * 60
}
fn default_true() -> bool {
    true
}
fn default_sounds_dir() -> PathBuf {
    PathBuf::from("sounds")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("rendered")
}
fn default_output_extension() -> String {
    "mp3".into()
}
fn default_render_timeout_secs() -> u64 {
    30
}
fn default_heart_rate_window_minutes() -> u32 {
    15
}
fn default_authorization_ttl_minutes() -> u32 {
    10
}
fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: default_redirect_uri(),
            authorize_url: default_authorize_url(),
            token_url: default_token_url(),
            api_base_url: default_api_base_url(),
            scopes: default_scopes(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            utc_offset_minutes: default_utc_offset_minutes(),
            pan_enabled: true,
            sounds_dir: default_sounds_dir(),
            output_dir: default_output_dir(),
            output_extension: default_output_extension(),
            render_timeout_secs: default_render_timeout_secs(),
            heart_rate_window_minutes: default_heart_rate_window_minutes(),
            authorization_ttl_minutes: default_authorization_ttl_minutes(),
            ffmpeg_path: default_ffmpeg_path(),
        }
    }
}

impl ProviderConfig {
    pub fn has_client_credentials(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl EngineSettings {
    /// The configured deployment time zone.
    pub fn utc_offset(&self) -> Result<FixedOffset, ConfigError> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "engine.utc_offset_minutes".into(),
                message: format!("{} is not a valid UTC offset", self.utc_offset_minutes),
            })
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let unknown = || ConfigError::MissingKey(key.to_string());

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        let n = value
                            .parse::<i64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as integer")))?;
                        serde_json::Value::Number(n.into())
                    }
                    serde_json::Value::Array(_) => serde_json::Value::Array(
                        value
                            .split(',')
                            .map(|s| serde_json::Value::String(s.trim().to_string()))
                            .collect(),
                    ),
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk or return (and write) the default.
    ///
    /// Environment overrides are applied after loading.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        let mut cfg = Self::load_file()?;
        cfg.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(cfg)
    }

    /// Load from disk without environment overrides, for editing the file.
    pub fn load_file() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        let cfg = match std::fs::read_to_string(&path) {
            Ok(content) => Self::from_toml(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.clone(),
                message: e.to_string(),
            })?,
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                cfg
            }
        };
        Ok(cfg)
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Persist to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Overlay `SUNRISE_*` variables looked up through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(id) = lookup("SUNRISE_CLIENT_ID") {
            self.provider.client_id = id;
        }
        if let Some(secret) = lookup("SUNRISE_CLIENT_SECRET") {
            self.provider.client_secret = secret;
        }
        if let Some(redirect) = lookup("SUNRISE_REDIRECT_URL") {
            self.provider.redirect_uri = redirect;
        }
    }

    /// Check value ranges. Client credentials are only required when
    /// `needs_provider` is set.
    pub fn validate(&self, needs_provider: bool) -> Result<(), ConfigError> {
        self.engine.utc_offset()?;
        if self.engine.render_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "engine.render_timeout_secs".into(),
                message: "must be greater than zero".into(),
            });
        }
        if self.engine.heart_rate_window_minutes == 0 || self.engine.heart_rate_window_minutes > 60 {
            return Err(ConfigError::InvalidValue {
                key: "engine.heart_rate_window_minutes".into(),
                message: "must be between 1 and 60".into(),
            });
        }
        if needs_provider && !self.provider.has_client_credentials() {
            return Err(ConfigError::MissingKey("provider.client_id / provider.client_secret".into()));
        }
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key in memory. Returns error if key is unknown.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed = Config::from_toml(&toml_str).unwrap();
        assert_eq!(parsed.engine.utc_offset_minutes, 540);
        assert!(parsed.engine.pan_enabled);
        assert_eq!(parsed.provider.scopes, vec!["sleep", "heartrate", "profile"]);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let cfg = Config::from_toml(
            "[engine]\nutc_offset_minutes = 60\npan_enabled = false\n",
        )
        .unwrap();
        assert_eq!(cfg.engine.utc_offset_minutes, 60);
        assert!(!cfg.engine.pan_enabled);
        assert_eq!(cfg.engine.render_timeout_secs, 30);
        assert_eq!(cfg.provider.token_url, "https://api.fitbit.com/oauth2/token");
    }

    #[test]
    fn utc_offset_is_validated() {
        let mut cfg = Config::default();
        assert_eq!(
            cfg.engine.utc_offset().unwrap(),
            FixedOffset::east_opt(9 * 3600).unwrap()
        );
        cfg.engine.utc_offset_minutes = 24 * 60;
        assert!(cfg.engine.utc_offset().is_err());
        assert!(cfg.validate(false).is_err());
    }

    #[test]
    fn huge_utc_offset_is_an_error_not_an_overflow() {
        for minutes in [40_000_000, i32::MAX, i32::MIN] {
            let mut cfg = Config::default();
            cfg.set("engine.utc_offset_minutes", &minutes.to_string()).unwrap();
            assert!(matches!(
                cfg.engine.utc_offset(),
                Err(ConfigError::InvalidValue { .. })
            ));
            assert!(cfg.validate(false).is_err());
            assert!(crate::alarm::EngineOptions::from_settings(&cfg.engine).is_err());
        }
    }

    #[test]
    fn validate_requires_client_credentials_only_when_asked() {
        let mut cfg = Config::default();
        assert!(cfg.validate(false).is_ok());
        assert!(matches!(cfg.validate(true), Err(ConfigError::MissingKey(_))));
        cfg.provider.client_id = "id".into();
        cfg.provider.client_secret = "secret".into();
        assert!(cfg.validate(true).is_ok());
    }

    #[test]
    fn zero_render_timeout_is_rejected() {
        let mut cfg = Config::default();
        cfg.engine.render_timeout_secs = 0;
        assert!(cfg.validate(false).is_err());
    }

    #[test]
    fn env_overrides_replace_provider_credentials() {
        let mut cfg = Config::default();
        cfg.apply_env_overrides(|name| match name {
            "SUNRISE_CLIENT_ID" => Some("23ABCD".to_string()),
            "SUNRISE_CLIENT_SECRET" => Some("s3cret".to_string()),
            _ => None,
        });
        assert_eq!(cfg.provider.client_id, "23ABCD");
        assert_eq!(cfg.provider.client_secret, "s3cret");
        assert_eq!(cfg.provider.redirect_uri, "http://localhost:3000/auth/callback");
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("engine.pan_enabled").as_deref(), Some("true"));
        assert_eq!(cfg.get("engine.render_timeout_secs").as_deref(), Some("30"));
        assert!(cfg.get("engine.missing_key").is_none());
    }

    #[test]
    fn set_updates_typed_values() {
        let mut cfg = Config::default();
        cfg.set("engine.pan_enabled", "false").unwrap();
        cfg.set("engine.utc_offset_minutes", "-300").unwrap();
        cfg.set("provider.scopes", "sleep, heartrate").unwrap();
        assert!(!cfg.engine.pan_enabled);
        assert_eq!(cfg.engine.utc_offset_minutes, -300);
        assert_eq!(cfg.provider.scopes, vec!["sleep", "heartrate"]);
    }

    #[test]
    fn set_rejects_unknown_key_and_bad_type() {
        let mut cfg = Config::default();
        assert!(cfg.set("engine.nonexistent", "1").is_err());
        assert!(cfg.set("engine.pan_enabled", "maybe").is_err());
        assert!(cfg.set("engine.render_timeout_secs", "-1").is_err());
    }
}
