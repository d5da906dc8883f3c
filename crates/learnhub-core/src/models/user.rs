use serde::{Deserialize, Serialize};

use super::null_as_default;

/// Identity snapshot returned by the provider.
///
/// Only `id` is mandatory. The provider forwards Google's userinfo fields
/// verbatim, so any of the others may arrive as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct UserProfile {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub picture: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub verified_email: bool,
}

impl UserProfile {
    /// Name to show in greetings, falling back to the email address.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.email
        } else {
            &self.name
        }
    }
}
