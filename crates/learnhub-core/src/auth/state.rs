use serde::Serialize;

use crate::models::{Session, UserProfile};

/// Snapshot of the session manager, published to subscribers on every change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub session: Option<Session>,
    pub loading: bool,
    pub error: Option<String>,
}

impl AuthState {
    /// Derived from session presence; never tracked separately.
    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn user(&self) -> Option<&UserProfile> {
        self.session.as_ref().map(|s| &s.user)
    }

    pub fn access_token(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.access_token.as_str())
    }

    pub fn view(&self) -> AuthView {
        AuthView {
            user: self.user().cloned(),
            access_token: self.access_token().map(str::to_string),
            loading: self.loading,
            error: self.error.clone(),
            is_authenticated: self.is_authenticated(),
        }
    }
}

/// What the UI layer renders from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct AuthView {
    pub user: Option<UserProfile>,
    pub access_token: Option<String>,
    pub loading: bool,
    pub error: Option<String>,
    pub is_authenticated: bool,
}
