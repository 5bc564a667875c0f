//! Durable key-value storage for the session.
//!
//! This module provides:
//! - `KeyValueStore`: async string store with single and multi-key calls
//! - `FileStore`: one JSON file, every write applied atomically
//! - `KeyringStore`: OS keychain entries via keyring
//! - `MemoryStore`: process-local store
//!
//! The session occupies two keys, `@mobile:user` and `@mobile:token`.

pub mod file;
pub mod keychain;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use file::FileStore;
pub use keychain::KeyringStore;
pub use memory::MemoryStore;

/// Storage key for the JSON-serialized user
pub const USER_STORAGE_KEY: &str = "@mobile:user";

/// Storage key for the raw bearer token
pub const TOKEN_STORAGE_KEY: &str = "@mobile:token";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removing a missing key is not an error
    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// Write several entries. Backends that can apply them atomically override this.
    async fn multi_set(&self, entries: &[(&str, &str)]) -> Result<(), StorageError> {
        for (key, value) in entries {
            self.set_item(key, value).await?;
        }
        Ok(())
    }

    async fn multi_remove(&self, keys: &[&str]) -> Result<(), StorageError> {
        for key in keys {
            self.remove_item(key).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<T: KeyValueStore + ?Sized> KeyValueStore for Box<T> {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get_item(key).await
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set_item(key, value).await
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove_item(key).await
    }

    async fn multi_set(&self, entries: &[(&str, &str)]) -> Result<(), StorageError> {
        (**self).multi_set(entries).await
    }

    async fn multi_remove(&self, keys: &[&str]) -> Result<(), StorageError> {
        (**self).multi_remove(keys).await
    }
}

#[async_trait]
impl<T: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<T> {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get_item(key).await
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set_item(key, value).await
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove_item(key).await
    }

    async fn multi_set(&self, entries: &[(&str, &str)]) -> Result<(), StorageError> {
        (**self).multi_set(entries).await
    }

    async fn multi_remove(&self, keys: &[&str]) -> Result<(), StorageError> {
        (**self).multi_remove(keys).await
    }
}
