//! HTTP client for the Learning Hub identity provider.
//!
//! The provider is the backend's `/auth/*` surface. It hides the Google
//! client secret, so the client only ever sees the authorization URL, the
//! exchanged tokens, and the user profile.

use std::time::Duration;

use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::models::{Session, UserProfile};

use super::ApiError;

/// HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
struct AuthUrlResponse {
    auth_url: String,
}

#[derive(Debug, Serialize)]
struct CodeExchangeRequest<'a> {
    code: &'a str,
}

#[derive(Debug, Deserialize)]
struct CodeExchangeResponse {
    success: bool,
    #[serde(default)]
    user: Option<UserProfile>,
    #[serde(default)]
    tokens: Option<TokenBundle>,
}

#[derive(Debug, Deserialize)]
struct TokenBundle {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    user: UserProfile,
}

/// Identity provider client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct IdentityClient {
    client: Client,
    base_url: Url,
}

impl IdentityClient {
    /// Create a client for the provider rooted at `base_url`.
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_http_client(client, base_url))
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    pub fn with_http_client(client: Client, mut base_url: Url) -> Self {
        // Url::join replaces the last segment unless the base ends in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::InvalidResponse(format!("Bad endpoint {}: {}", path, e)))
    }

    /// `GET /auth/google`: ask the provider where to send the browser.
    pub async fn authorization_url(&self) -> Result<Url, ApiError> {
        let url = self.endpoint("auth/google")?;
        debug!(%url, "Requesting authorization URL");

        let response = self.client.get(url).send().await?;
        let body: AuthUrlResponse = Self::read_json(response).await?;

        Url::parse(&body.auth_url).map_err(|e| {
            ApiError::InvalidResponse(format!("Provider returned an unusable auth_url: {}", e))
        })
    }

    /// `POST /auth/google/callback`: trade an authorization code for a session.
    pub async fn exchange_code(&self, code: &str) -> Result<Session, ApiError> {
        let url = self.endpoint("auth/google/callback")?;
        debug!(%url, "Exchanging authorization code");

        let response = self
            .client
            .post(url)
            .json(&CodeExchangeRequest { code })
            .send()
            .await?;
        let body: CodeExchangeResponse = Self::read_json(response).await?;

        let (user, tokens) = match (body.success, body.user, body.tokens) {
            (true, Some(user), Some(tokens)) => (user, tokens),
            (false, _, _) => {
                return Err(ApiError::InvalidResponse(
                    "Provider reported an unsuccessful code exchange".to_string(),
                ))
            }
            _ => {
                return Err(ApiError::InvalidResponse(
                    "Code exchange response is missing user or tokens".to_string(),
                ))
            }
        };

        if tokens.access_token.is_empty() {
            return Err(ApiError::InvalidResponse(
                "Code exchange returned an empty access token".to_string(),
            ));
        }

        Ok(Session::new(tokens.access_token, user)
            .with_refresh_token(tokens.refresh_token)
            .expiring_in(tokens.expires_in))
    }

    /// `GET /auth/user?access_token=...`: re-read the profile behind a token.
    pub async fn fetch_user(&self, access_token: &str) -> Result<UserProfile, ApiError> {
        let url = self.endpoint("auth/user")?;
        debug!(%url, "Fetching user profile");

        let response = self
            .client
            .get(url)
            .query(&[("access_token", access_token)])
            .send()
            .await?;
        let body: UserResponse = Self::read_json(response).await?;
        Ok(body.user)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Read a successful response as JSON. Decoding failures are reported as
    /// invalid responses rather than network errors.
    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let response = Self::check_response(response).await?;
        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }
}
