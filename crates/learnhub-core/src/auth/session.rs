use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::models::{Session, UserProfile};
use crate::store::ClientStore;

pub const ACCESS_TOKEN_KEY: &str = "google_access_token";
pub const REFRESH_TOKEN_KEY: &str = "google_refresh_token";
pub const USER_KEY: &str = "google_user";
pub const EXPIRES_AT_KEY: &str = "google_token_expires_at";

/// Every key a session occupies; cleared together.
pub const SESSION_KEYS: [&str; 4] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY, EXPIRES_AT_KEY];

/// Typed view of the session entries in a client store.
///
/// A session is only restored when both the access token and the profile
/// are present and readable. Anything less is leftover state and is wiped.
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn ClientStore>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn ClientStore>) -> Self {
        Self { store }
    }

    /// Load the persisted session, clearing partial or expired leftovers.
    pub fn load(&self) -> Result<Option<Session>> {
        let token = self
            .store
            .get(ACCESS_TOKEN_KEY)
            .context("Failed to read access token")?
            .filter(|t| !t.is_empty());
        let user_json = self.store.get(USER_KEY).context("Failed to read user profile")?;

        let user = user_json.as_deref().and_then(|json| {
            serde_json::from_str::<UserProfile>(json)
                .map_err(|e| warn!(error = %e, "Stored user profile is unreadable"))
                .ok()
        });

        let (token, user) = match (token, user) {
            (Some(token), Some(user)) => (token, user),
            (None, None) if user_json.is_none() => {
                if self.store.get(REFRESH_TOKEN_KEY)?.is_some()
                    || self.store.get(EXPIRES_AT_KEY)?.is_some()
                {
                    debug!("Clearing orphaned session entries");
                    self.clear()?;
                }
                return Ok(None);
            }
            (token, _) => {
                debug!(
                    has_token = token.is_some(),
                    has_user = user_json.is_some(),
                    "Clearing partial session"
                );
                self.clear()?;
                return Ok(None);
            }
        };

        let expires_at = self
            .store
            .get(EXPIRES_AT_KEY)
            .context("Failed to read token expiry")?
            .and_then(|raw| {
                DateTime::parse_from_rfc3339(&raw)
                    .map(|at| at.with_timezone(&Utc))
                    .map_err(|e| warn!(error = %e, "Stored token expiry is unreadable"))
                    .ok()
            });

        let refresh_token = self
            .store
            .get(REFRESH_TOKEN_KEY)
            .context("Failed to read refresh token")?;

        let session = Session {
            access_token: token,
            refresh_token: refresh_token.filter(|t| !t.is_empty()),
            user,
            expires_at,
        };

        if session.is_expired() {
            debug!("Stored session has expired");
            self.clear()?;
            return Ok(None);
        }

        Ok(Some(session))
    }

    /// Persist a session, replacing whatever was stored before.
    pub fn save(&self, session: &Session) -> Result<()> {
        // Access token goes last: an interrupted save leaves a partial
        // session, which the next load discards.
        match session.refresh_token {
            Some(ref token) => self.store.set(REFRESH_TOKEN_KEY, token)?,
            None => self.store.remove(REFRESH_TOKEN_KEY)?,
        }
        match session.expires_at {
            Some(at) => self.store.set(EXPIRES_AT_KEY, &at.to_rfc3339())?,
            None => self.store.remove(EXPIRES_AT_KEY)?,
        }
        self.save_user(&session.user)?;
        self.store
            .set(ACCESS_TOKEN_KEY, &session.access_token)
            .context("Failed to store access token")
    }

    /// Replace only the stored profile.
    pub fn save_user(&self, user: &UserProfile) -> Result<()> {
        let json = serde_json::to_string(user)?;
        self.store
            .set(USER_KEY, &json)
            .context("Failed to store user profile")
    }

    /// Remove every session entry. Attempts all keys before reporting the
    /// first failure.
    pub fn clear(&self) -> Result<()> {
        let mut first_error = None;
        for key in SESSION_KEYS {
            if let Err(e) = self.store.remove(key) {
                warn!(key, error = %e, "Failed to remove session entry");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
