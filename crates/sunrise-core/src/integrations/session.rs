//! Authenticated provider session with refresh-on-401.
//!
//! [`AuthSession::fetch_with_auth`] wraps any single idempotent API call:
//!
//! ```text
//! load credential ── call ──► Ok
//!                      │
//!                  Unauthorized
//!                      │
//!           refresh once (per-user lock + CAS)
//!                      │
//!                   call again ──► Ok
//!                      │
//!                  Unauthorized ──► ReauthorizationRequired
//! ```
//!
//! Other failure classes are returned after the first attempt.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use super::oauth::{Credential, OAuthClient};
use crate::error::{ApiError, OAuthError, TelemetryError};
use crate::storage::EngineStore;

/// How an `Unauthorized` response is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    /// Refresh the token pair once and retry the call once.
    #[default]
    Once,
    /// Report `ReauthorizationRequired` immediately.
    Never,
}

/// Per-user async locks guarding the refresh critical section.
#[derive(Default)]
struct RefreshLocks {
    inner: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl RefreshLocks {
    fn for_user(&self, user_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        map.entry(user_id).or_default().clone()
    }
}

/// Provider session shared by every telemetry endpoint.
pub struct AuthSession<S> {
    store: Arc<S>,
    oauth: OAuthClient,
    policy: RefreshPolicy,
    locks: RefreshLocks,
}

impl<S: EngineStore> AuthSession<S> {
    pub fn new(store: Arc<S>, oauth: OAuthClient) -> Self {
        Self {
            store,
            oauth,
            policy: RefreshPolicy::Once,
            locks: RefreshLocks::default(),
        }
    }

    pub fn with_policy(mut self, policy: RefreshPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Run `api_call` with the user's bearer token, refreshing at most once.
    pub async fn fetch_with_auth<T, F, Fut>(
        &self,
        user_id: i64,
        api_call: F,
    ) -> Result<T, TelemetryError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let credential = self
            .store
            .get_credential(user_id)?
            .ok_or(TelemetryError::NoCredential { user_id })?;

        match api_call(credential.access_token.clone()).await {
            Ok(value) => return Ok(value),
            Err(ApiError::Unauthorized) => {}
            Err(other) => return Err(TelemetryError::from_api(other, user_id)),
        }

        if self.policy == RefreshPolicy::Never {
            return Err(TelemetryError::ReauthorizationRequired { user_id });
        }

        tracing::info!(user_id, "access token rejected, refreshing");
        let fresh = self.refresh(user_id, &credential).await?;

        // A second Unauthorized maps to ReauthorizationRequired in from_api.
        api_call(fresh.access_token)
            .await
            .map_err(|err| TelemetryError::from_api(err, user_id))
    }

    /// Replace `stale` with a fresh token pair, unless a concurrent caller
    /// already did so.
    async fn refresh(&self, user_id: i64, stale: &Credential) -> Result<Credential, TelemetryError> {
        let lock = self.locks.for_user(user_id);
        let _guard = lock.lock().await;

        let current = self
            .store
            .get_credential(user_id)?
            .ok_or(TelemetryError::NoCredential { user_id })?;
        if current.access_token != stale.access_token {
            tracing::debug!(user_id, "token pair already rotated by another caller");
            return Ok(current);
        }

        let fresh = match self.oauth.refresh(&current.refresh_token).await {
            Ok(tokens) => tokens.into_credential(),
            Err(OAuthError::InvalidGrant(reason)) => {
                tracing::warn!(user_id, %reason, "refresh token rejected");
                return Err(TelemetryError::ReauthorizationRequired { user_id });
            }
            Err(err) => return Err(TelemetryError::Transient(err.to_string())),
        };

        if self
            .store
            .replace_credential(user_id, &current.refresh_token, &fresh)?
        {
            tracing::info!(user_id, "token pair refreshed");
            return Ok(fresh);
        }

        // Lost a race against a writer outside this process.
        self.store
            .get_credential(user_id)?
            .ok_or(TelemetryError::NoCredential { user_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Database, ProviderConfig};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn session(db: Arc<Database>, token_url: String) -> AuthSession<Database> {
        AuthSession::new(
            db,
            OAuthClient::new(ProviderConfig {
                client_id: "id".into(),
                client_secret: "secret".into(),
                token_url,
                ..ProviderConfig::default()
            }),
        )
    }

    fn linked_user(db: &Database, access: &str) -> i64 {
        let user = db.create_user("sleeper@example.com").unwrap();
        db.save_credential(
            user,
            &Credential {
                subject_id: "SUBJ".into(),
                access_token: access.into(),
                refresh_token: "rt-old".into(),
            },
        )
        .unwrap();
        user
    }

    #[tokio::test]
    async fn missing_credential_is_reported() {
        let db = Arc::new(Database::open_memory().unwrap());
        let user = db.create_user("a@example.com").unwrap();
        let session = session(db, "http://127.0.0.1:9/token".into());
        let result = session
            .fetch_with_auth(user, |_token| async { Ok::<_, ApiError>(1) })
            .await;
        assert!(matches!(result, Err(TelemetryError::NoCredential { .. })));
    }

    #[tokio::test]
    async fn transient_failure_is_not_retried() {
        let db = Arc::new(Database::open_memory().unwrap());
        let user = linked_user(&db, "at-old");
        let session = session(db, "http://127.0.0.1:9/token".into());
        let calls = AtomicUsize::new(0);
        let result: Result<u32, _> = session
            .fetch_with_auth(user, |_token| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ApiError::Transient("503".into())) }
            })
            .await;
        assert!(matches!(result, Err(TelemetryError::Transient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn never_policy_skips_refresh() {
        let db = Arc::new(Database::open_memory().unwrap());
        let user = linked_user(&db, "at-old");
        let session =
            session(db.clone(), "http://127.0.0.1:9/token".into()).with_policy(RefreshPolicy::Never);
        let result: Result<u32, _> = session
            .fetch_with_auth(user, |_token| async { Err(ApiError::Unauthorized) })
            .await;
        assert!(matches!(
            result,
            Err(TelemetryError::ReauthorizationRequired { .. })
        ));
        assert_eq!(db.get_credential(user).unwrap().unwrap().access_token, "at-old");
    }

    #[tokio::test]
    async fn already_rotated_token_is_reused_without_refresh() {
        let mut server = mockito::Server::new_async().await;
        let token = server
            .mock("POST", "/token")
            .expect(0)
            .create_async()
            .await;

        let db = Arc::new(Database::open_memory().unwrap());
        let user = linked_user(&db, "at-new");
        let session = session(db, format!("{}/token", server.url()));
        let stale = Credential {
            subject_id: "SUBJ".into(),
            access_token: "at-old".into(),
            refresh_token: "rt-older".into(),
        };
        let fresh = session.refresh(user, &stale).await.unwrap();
        assert_eq!(fresh.access_token, "at-new");
        token.assert_async().await;
    }
}
