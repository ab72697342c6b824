//! PKCE authorization-code flow that links a user to the provider.
//!
//! The verifier lives in the database only between [`AuthorizationFlow::begin`]
//! and the matching [`AuthorizationFlow::complete`]; it is removed when the
//! callback is processed whether or not the exchange succeeds.

use base64::prelude::*;
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use url::Url;
use uuid::Uuid;

use super::oauth::{Credential, OAuthClient};
use crate::error::OAuthError;
use crate::storage::database::PendingAuthorization;
use crate::storage::{Database, EngineStore};

/// Generate a PKCE code verifier: 32 random bytes, base64url without padding.
pub fn generate_verifier() -> Result<String, OAuthError> {
    let mut bytes = [0u8; 32];
    getrandom::getrandom(&mut bytes).map_err(|e| OAuthError::Randomness(e.to_string()))?;
    Ok(BASE64_URL_SAFE_NO_PAD.encode(bytes))
}

/// S256 code challenge for a verifier.
pub fn code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    BASE64_URL_SAFE_NO_PAD.encode(digest)
}

/// Where to send the user, plus the state value the callback will carry.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: Url,
    pub state: String,
}

pub struct AuthorizationFlow<'a> {
    db: &'a Database,
    oauth: &'a OAuthClient,
    ttl: Duration,
}

impl<'a> AuthorizationFlow<'a> {
    pub fn new(db: &'a Database, oauth: &'a OAuthClient, ttl_minutes: u32) -> Self {
        Self {
            db,
            oauth,
            ttl: Duration::minutes(i64::from(ttl_minutes)),
        }
    }

    /// Start an authorization for `user_id`, persisting a fresh verifier.
    pub fn begin(&self, user_id: i64, now: DateTime<Utc>) -> Result<AuthorizationRequest, OAuthError> {
        // Stale verifiers of abandoned attempts are dropped here.
        self.db.purge_pending_authorizations(now - self.ttl)?;

        let verifier = generate_verifier()?;
        let challenge = code_challenge(&verifier);
        let state = Uuid::new_v4().simple().to_string();
        let url = self.oauth.authorization_url(&challenge, &state)?;

        self.db.put_pending_authorization(
            &state,
            &PendingAuthorization {
                user_id,
                verifier,
                created_at: now,
            },
        )?;
        tracing::debug!(user_id, "authorization started");
        Ok(AuthorizationRequest { url, state })
    }

    /// Handle the provider callback: exchange `code` and store the credential.
    ///
    /// Returns the id of the linked user.
    pub async fn complete(
        &self,
        state: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<(i64, Credential), OAuthError> {
        let pending = self
            .db
            .take_pending_authorization(state)?
            .ok_or(OAuthError::AuthorizationExpired)?;
        if now - pending.created_at > self.ttl {
            tracing::warn!(user_id = pending.user_id, "authorization callback arrived after TTL");
            return Err(OAuthError::AuthorizationExpired);
        }

        let credential = self
            .oauth
            .exchange_code(code, &pending.verifier)
            .await?
            .into_credential();
        self.db.save_credential(pending.user_id, &credential)?;
        tracing::info!(
            user_id = pending.user_id,
            subject_id = %credential.subject_id,
            "telemetry account linked"
        );
        Ok((pending.user_id, credential))
    }
}
