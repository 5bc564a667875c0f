//! Application configuration management.
//!
//! This module handles loading the application configuration: the OAuth
//! client id and scope, the backend URL, the redirect listener and the
//! storage backend for the session.
//!
//! Configuration is stored at `~/.config/ghsession/config.json`. Every field
//! is optional in the file and can be overridden from the environment.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::client::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::oauth::loopback::{DEFAULT_AUTHORIZATION_TIMEOUT_SECS, DEFAULT_CALLBACK_PORT};
use crate::storage::{FileStore, KeyValueStore, KeyringStore};

/// Application name used for config/data directory paths
const APP_NAME: &str = "ghsession";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// OAuth app registered for the backend
pub const DEFAULT_CLIENT_ID: &str = "aea42fc7b540f9e7e886";

/// Only the public profile is needed
pub const DEFAULT_SCOPE: &str = "read:user";

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:4000";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// JSON file in the data directory
    #[default]
    File,
    /// OS keychain
    Keyring,
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(StorageBackend::File),
            "keyring" | "keychain" => Ok(StorageBackend::Keyring),
            other => Err(anyhow::anyhow!("Unknown storage backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub client_id: String,
    pub scope: String,
    pub api_base_url: String,
    pub callback_port: u16,
    pub authorization_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub storage: StorageBackend,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: DEFAULT_CLIENT_ID.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            callback_port: DEFAULT_CALLBACK_PORT,
            authorization_timeout_secs: DEFAULT_AUTHORIZATION_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            storage: StorageBackend::default(),
        }
    }
}

impl Config {
    /// Load the config file (if any) and apply environment overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        debug!(?config, "Config loaded");
        Ok(config)
    }

    /// Apply `GHSESSION_*` overrides read through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("GHSESSION_CLIENT_ID") {
            self.client_id = v;
        }
        if let Some(v) = lookup("GHSESSION_SCOPE") {
            self.scope = v;
        }
        if let Some(v) = lookup("GHSESSION_API_URL") {
            self.api_base_url = v;
        }
        if let Some(v) = lookup("GHSESSION_CALLBACK_PORT") {
            self.callback_port = v
                .trim()
                .parse()
                .with_context(|| format!("Invalid GHSESSION_CALLBACK_PORT: {}", v))?;
        }
        if let Some(v) = lookup("GHSESSION_STORAGE") {
            self.storage = v.parse()?;
        }
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the file-backed session storage
    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn authorization_timeout(&self) -> Duration {
        Duration::from_secs(self.authorization_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Open the configured storage backend
    pub fn open_storage(&self) -> Result<Box<dyn KeyValueStore>> {
        let store: Box<dyn KeyValueStore> = match self.storage {
            StorageBackend::File => Box::new(FileStore::in_dir(&self.data_dir()?)),
            StorageBackend::Keyring => {
                if !KeyringStore::is_persistent() {
                    anyhow::bail!("No OS keychain is available on this platform; use file storage");
                }
                Box::new(KeyringStore::default())
            }
        };
        Ok(store)
    }
}
