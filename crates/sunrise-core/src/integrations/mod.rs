//! Fitness provider integration.
//!
//! - [`oauth`]: token endpoint client and the stored [`Credential`]
//! - [`pkce`]: one-time authorization-code flow that links an account
//! - [`session`]: refresh-once wrapper around every authenticated call
//! - [`fitbit`]: sleep, profile and intraday heart-rate endpoints

pub mod fitbit;
pub mod oauth;
pub mod pkce;
pub mod session;

pub use fitbit::{FitbitClient, HeartSnapshot, TelemetrySource};
pub use oauth::{Credential, OAuthClient, TokenResponse};
pub use pkce::{AuthorizationFlow, AuthorizationRequest};
pub use session::{AuthSession, RefreshPolicy};
