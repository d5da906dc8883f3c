//! Parsing of the parameters the provider appends when it sends the browser
//! back to the application.

use std::collections::HashMap;

use url::Url;

use crate::models::{Session, UserProfile};

/// Query parameters that belong to the sign-in handshake.
const CALLBACK_PARAMS: &[&str] = &[
    "code",
    "error",
    "access_token",
    "refresh_token",
    "user_id",
    "user_email",
    "user_name",
    "user_picture",
    // Google appends these alongside the code
    "state",
    "scope",
    "authuser",
    "prompt",
    "hd",
];

/// Fallback when the provider sends `?error=` with no message.
const UNSPECIFIED_ERROR: &str = "Authentication failed";

/// A sign-in handshake waiting to be completed, as found on the landing URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingCompletion {
    /// The provider reported a failure.
    Error(String),
    /// The provider already exchanged the code and put the result on the URL.
    DirectGrant(Session),
    /// An authorization code still to be exchanged.
    Code(String),
}

impl PendingCompletion {
    /// Inspect `url` for handshake parameters.
    ///
    /// Precedence is error, then direct grant, then code. Returns `None` for
    /// an ordinary page load.
    pub fn from_url(url: &Url) -> Option<Self> {
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();

        if let Some(message) = params.get("error") {
            let message = message.trim();
            let message = if message.is_empty() {
                UNSPECIFIED_ERROR
            } else {
                message
            };
            return Some(Self::Error(message.to_string()));
        }

        if let Some(access_token) = params.get("access_token").filter(|t| !t.is_empty()) {
            let Some(user_id) = params.get("user_id").filter(|id| !id.is_empty()) else {
                return Some(Self::Error(
                    "Sign-in response did not include a user id".to_string(),
                ));
            };
            let field = |name: &str| params.get(name).cloned().unwrap_or_default();
            let user = UserProfile {
                id: user_id.clone(),
                email: field("user_email"),
                name: field("user_name"),
                picture: field("user_picture"),
                // The provider only redirects after Google verified the account
                verified_email: true,
            };
            let session = Session::new(access_token.clone(), user)
                .with_refresh_token(params.get("refresh_token").cloned());
            return Some(Self::DirectGrant(session));
        }

        params
            .get("code")
            .filter(|code| !code.is_empty())
            .map(|code| Self::Code(code.clone()))
    }

    /// Short label for logs. Never includes tokens or codes.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Error(_) => "error",
            Self::DirectGrant(_) => "direct_grant",
            Self::Code(_) => "code",
        }
    }
}

/// `url` with every handshake parameter removed, so reloading or navigating
/// back cannot replay it. Unrelated parameters are kept.
pub fn strip_callback_params(url: &Url) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .into_owned()
        .filter(|(key, _)| !CALLBACK_PARAMS.contains(&key.as_str()))
        .collect();

    let mut stripped = url.clone();
    stripped.set_fragment(None);
    if kept.is_empty() {
        stripped.set_query(None);
    } else {
        stripped.query_pairs_mut().clear().extend_pairs(kept);
    }
    stripped
}
