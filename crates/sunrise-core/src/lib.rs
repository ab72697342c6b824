//! # Sunrise Core Library
//!
//! Core logic for Sunrise, an alarm that adapts its sound to how deeply the
//! user is sleeping when it goes off. The CLI binary is a thin layer over
//! this crate.
//!
//! ## Architecture
//!
//! - **Alarm engine**: a wall-clock evaluation the caller polls once per
//!   minute per user. It matches stored alarms, reads heart-rate telemetry,
//!   builds a mix plan and renders the sound.
//! - **Telemetry**: OAuth2 client for the fitness provider. Every call goes
//!   through a session that refreshes an expired token at most once.
//! - **Sleep**: the heart-rate classifier plus sleep-cycle recommendations.
//! - **Storage**: SQLite persistence and TOML configuration.
//!
//! ## Key Components
//!
//! - [`AlarmEngine`]: per-minute trigger evaluation
//! - [`AuthSession`]: refresh-once-then-fail wrapper for provider calls
//! - [`classify`] and [`build_plan`]: sleep depth score and the mix derived from it
//! - [`Database`]: users, credentials, alarms and sleep history
//! - [`Config`]: provider and engine configuration

pub mod alarm;
pub mod error;
pub mod integrations;
pub mod mixer;
pub mod sleep;
pub mod storage;

pub use alarm::{AlarmEngine, Alarm, EngineOptions, FiredAlarm, TriggerDecision};
pub use error::{
    ApiError, ConfigError, CoreError, DatabaseError, EngineError, OAuthError, RenderError,
    TelemetryError,
};
pub use integrations::{
    AuthSession, AuthorizationFlow, Credential, FitbitClient, OAuthClient, TelemetrySource,
};
pub use mixer::{build_plan, FfmpegGateway, MixPlan, RenderGateway};
pub use sleep::{classify, SleepDepth};
pub use storage::{Config, Database, EngineStore};
