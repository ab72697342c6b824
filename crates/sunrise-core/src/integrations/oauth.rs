//! OAuth2 token endpoint client for the fitness provider.
//!
//! 1. Builds the authorization URL carrying a PKCE challenge
//! 2. Exchanges an authorization code + verifier for the initial token pair
//! 3. Exchanges a refresh token for a new token pair
//!
//! Both grants authenticate the client with HTTP Basic credentials and send
//! a form-encoded body.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::OAuthError;
use crate::storage::ProviderConfig;

/// Tokens linking one user to their telemetry subject.
///
/// Both tokens are always replaced together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub subject_id: String,
    pub access_token: String,
    pub refresh_token: String,
}

/// Token endpoint response body.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Provider-side user id (the telemetry subject).
    pub user_id: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenResponse {
    pub fn into_credential(self) -> Credential {
        Credential {
            subject_id: self.user_id,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct ErrorEntry {
    #[serde(rename = "errorType", default)]
    error_type: String,
    #[serde(default)]
    message: String,
}

/// Client for the provider's OAuth2 endpoints.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    config: ProviderConfig,
    http: Client,
}

impl OAuthClient {
    pub fn new(config: ProviderConfig) -> Self {
        let http = Client::builder()
            .timeout(config.http_timeout())
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { config, http }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Authorization URL the user must visit.
    pub fn authorization_url(&self, challenge: &str, state: &str) -> Result<Url, OAuthError> {
        if self.config.client_id.is_empty() {
            return Err(OAuthError::CredentialsNotConfigured);
        }
        let scopes = self.config.scopes.join(" ");
        let url = Url::parse_with_params(
            &self.config.authorize_url,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("response_type", "code"),
                ("code_challenge", challenge),
                ("code_challenge_method", "S256"),
                ("scope", scopes.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("state", state),
            ],
        )?;
        Ok(url)
    }

    /// Exchange an authorization code and its PKCE verifier for tokens.
    pub async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
    ) -> Result<TokenResponse, OAuthError> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("code_verifier", verifier),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];
        self.post_token(&params)
            .await
            .map_err(|failure| OAuthError::TokenExchangeFailed(failure.message()))
    }

    /// Exchange a refresh token for a new token pair.
    ///
    /// A rejected refresh token (400/401) is `InvalidGrant`; anything else
    /// is `TokenRefreshFailed`.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, OAuthError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        self.post_token(&params).await.map_err(|failure| match failure {
            TokenFailure::Rejected(msg) => OAuthError::InvalidGrant(msg),
            other => OAuthError::TokenRefreshFailed(other.message()),
        })
    }

    async fn post_token(&self, params: &[(&str, &str)]) -> Result<TokenResponse, TokenFailure> {
        if !self.config.has_client_credentials() {
            return Err(TokenFailure::Other(
                OAuthError::CredentialsNotConfigured.to_string(),
            ));
        }

        let resp = self
            .http
            .post(&self.config.token_url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(params)
            .send()
            .await
            .map_err(|e| TokenFailure::Other(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return resp
                .json::<TokenResponse>()
                .await
                .map_err(|e| TokenFailure::Other(format!("malformed token response: {e}")));
        }

        let body = resp.text().await.unwrap_or_default();
        let detail = describe_error(&body).unwrap_or_else(|| format!("HTTP {status}"));
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            Err(TokenFailure::Rejected(detail))
        } else {
            Err(TokenFailure::Other(detail))
        }
    }
}

enum TokenFailure {
    Rejected(String),
    Other(String),
}

impl TokenFailure {
    fn message(self) -> String {
        match self {
            TokenFailure::Rejected(msg) | TokenFailure::Other(msg) => msg,
        }
    }
}

fn describe_error(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let first = parsed.errors.first()?;
    Some(format!("{}: {}", first.error_type, first.message))
}
