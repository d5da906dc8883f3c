use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::UserProfile;

/// Buffer time before expiry to trigger refresh (5 minutes)
const TOKEN_REFRESH_BUFFER_MINUTES: i64 = 5;

/// Credentials and identity of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user: UserProfile,
    /// Absent when the provider did not report `expires_in`, or when the
    /// session came from redirect parameters.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(access_token: impl Into<String>, user: UserProfile) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            user,
            expires_at: None,
        }
    }

    /// Attach a refresh token. Empty strings are treated as "no token";
    /// the provider sends `""` when Google withheld one.
    #[must_use]
    pub fn with_refresh_token(mut self, token: Option<String>) -> Self {
        self.refresh_token = token.filter(|t| !t.is_empty());
        self
    }

    /// Set the expiry from a provider `expires_in` value in seconds.
    #[must_use]
    pub fn expiring_in(mut self, expires_in: Option<i64>) -> Self {
        self.expires_at = expires_in
            .filter(|secs| *secs > 0)
            .map(|secs| Utc::now() + Duration::seconds(secs));
        self
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() > at)
    }

    /// Check if the access token will expire soon and should be refreshed
    pub fn needs_refresh(&self) -> bool {
        self.expires_at.is_some_and(|at| {
            Utc::now() > at - Duration::minutes(TOKEN_REFRESH_BUFFER_MINUTES)
        })
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> Option<i64> {
        self.expires_at
            .map(|at| (at - Utc::now()).num_minutes().max(0))
    }
}
