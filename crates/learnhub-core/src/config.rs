//! Application configuration management.
//!
//! Holds where the identity provider lives, where the application itself is
//! served from, and which client store keeps the session.
//!
//! Configuration is stored at `~/.config/learning-hub/config.json`.
//! `LEARNHUB_API_URL`, `LEARNHUB_APP_URL` and `LEARNHUB_STORE` override the
//! file.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::api::{ApiError, IdentityClient, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::store::{ClientStore, FileStore, KeyringStore, MemoryStore};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "learning-hub";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_APP_URL: &str = "http://localhost:5173/";

/// Which client store keeps the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    File,
    Keyring,
    Memory,
}

impl FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(StoreKind::File),
            "keyring" | "keychain" => Ok(StoreKind::Keyring),
            "memory" => Ok(StoreKind::Memory),
            other => Err(anyhow::anyhow!("Unknown store kind: {}", other)),
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreKind::File => "file",
            StoreKind::Keyring => "keyring",
            StoreKind::Memory => "memory",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the identity provider (the backend's `/auth/*` routes).
    pub api_url: Url,
    /// Where the application is served; the provider redirects back here.
    pub app_url: Url,
    pub store: StoreKind,
    /// Trust tokens the provider appends to the redirect URL. When off,
    /// only code exchange signs users in.
    pub accept_direct_grant: bool,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.parse().expect("valid default URL"),
            app_url: DEFAULT_APP_URL.parse().expect("valid default URL"),
            store: StoreKind::default(),
            accept_direct_grant: true,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `LEARNHUB_*` environment overrides.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("LEARNHUB_API_URL") {
            self.api_url = raw.parse().context("Invalid LEARNHUB_API_URL")?;
        }
        if let Some(raw) = lookup("LEARNHUB_APP_URL") {
            self.app_url = raw.parse().context("Invalid LEARNHUB_APP_URL")?;
        }
        if let Some(raw) = lookup("LEARNHUB_STORE") {
            self.store = raw.parse().context("Invalid LEARNHUB_STORE")?;
        }
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn identity_client(&self) -> Result<IdentityClient, ApiError> {
        IdentityClient::new(self.api_url.clone(), self.request_timeout())
    }

    /// Open the configured client store.
    pub fn client_store(&self) -> Result<Arc<dyn ClientStore>> {
        Ok(match self.store {
            StoreKind::File => Arc::new(FileStore::new(self.cache_dir()?)),
            StoreKind::Keyring => Arc::new(KeyringStore::new()),
            StoreKind::Memory => Arc::new(MemoryStore::new()),
        })
    }
}
