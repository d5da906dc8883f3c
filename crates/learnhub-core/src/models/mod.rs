//! Domain models shared by the identity client, the stores, and the UI layer.
//!
//! Field names on the wire and in persisted state match what the identity
//! provider sends (`verified_email`, not `verifiedEmail`), so a profile can
//! round-trip between the provider and the client store unchanged.

pub mod session;
pub mod user;

pub use session::Session;
pub use user::UserProfile;

use serde::{Deserialize, Deserializer};

/// Decode `null` (or a missing field, together with `#[serde(default)]`) as
/// the type's default value.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
