//! Persistent client stores.
//!
//! A client store is durable string key/value storage that survives
//! restarts, the same role local storage plays in a browser. The session
//! manager is its only writer.
//!
//! - `FileStore`: JSON file in the cache directory
//! - `KeyringStore`: OS keychain, one entry per key
//! - `MemoryStore`: process-local map for ephemeral sessions

pub mod file;
pub mod keychain;
pub mod memory;

pub use self::file::FileStore;
pub use self::keychain::KeyringStore;
pub use self::memory::MemoryStore;

use anyhow::Result;

pub trait ClientStore: Send + Sync {
    /// Read a value; `Ok(None)` when the key has never been set.
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a key. Removing a missing key succeeds.
    fn remove(&self, key: &str) -> Result<()>;
}
