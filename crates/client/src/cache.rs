//! Persisted local cache.
//!
//! A small key/value store of JSON blobs that survives restarts, playing the
//! role browser local storage plays for a web storefront. The synchronizer
//! owns the `cart_items` and `wishlist_items` keys; the session holder owns
//! `auth_user`.
//!
//! Writes are synchronous and happen after every in-memory change.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// Cache keys.
pub mod keys {
    /// Cart entries.
    pub const CART_ITEMS: &str = "cart_items";

    /// Wishlist entries.
    pub const WISHLIST_ITEMS: &str = "wishlist_items";

    /// The authenticated user.
    pub const AUTH_USER: &str = "auth_user";
}

/// Errors that can occur reading or writing the cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem error.
    #[error("Cache I/O error for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },

    /// A stored blob is not valid JSON or has the wrong shape.
    #[error("Corrupt cache entry {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Key contains characters that cannot be used as a file name.
    #[error("Invalid cache key: {0}")]
    InvalidKey(String),
}

/// Storage for independently-keyed JSON blobs.
pub trait LocalCache: Send + Sync {
    /// Read a blob. Absent keys yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns error if the blob exists but cannot be read or parsed.
    fn load(&self, key: &str) -> Result<Option<Value>, CacheError>;

    /// Write a blob, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns error if the blob cannot be written.
    fn store(&self, key: &str, value: &Value) -> Result<(), CacheError>;

    /// Delete a blob. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns error if the blob exists but cannot be deleted.
    fn remove(&self, key: &str) -> Result<(), CacheError>;
}

// =============================================================================
// Typed helpers
// =============================================================================

/// Load a typed value, treating absent, unreadable or corrupt blobs as `None`.
pub fn load_or_none<T: DeserializeOwned>(cache: &dyn LocalCache, key: &str) -> Option<T> {
    let value = match cache.load(key) {
        Ok(value) => value?,
        Err(e) => {
            warn!(key, error = %e, "Ignoring unreadable cache entry");
            return None;
        }
    };

    match serde_json::from_value(value) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(key, error = %e, "Ignoring cache entry with unexpected shape");
            None
        }
    }
}

/// Serialize and store a value, logging (not propagating) failures.
pub fn store_or_warn<T: Serialize + ?Sized>(cache: &dyn LocalCache, key: &str, value: &T) {
    let result = serde_json::to_value(value)
        .map_err(|source| CacheError::Corrupt {
            key: key.to_string(),
            source,
        })
        .and_then(|value| cache.store(key, &value));

    if let Err(e) = result {
        warn!(key, error = %e, "Failed to write cache entry");
    }
}

// =============================================================================
// FileCache
// =============================================================================

/// Cache storing one `<key>.json` file per key in a directory.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// Cache rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, CacheError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(CacheError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl LocalCache for FileCache {
    fn load(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let path = self.path_for(key)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CacheError::Io {
                    key: key.to_string(),
                    source,
                });
            }
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| CacheError::Corrupt {
                key: key.to_string(),
                source,
            })
    }

    fn store(&self, key: &str, value: &Value) -> Result<(), CacheError> {
        let path = self.path_for(key)?;
        let io_err = |source| CacheError::Io {
            key: key.to_string(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(io_err)?;

        let bytes = serde_json::to_vec(value).map_err(|source| CacheError::Corrupt {
            key: key.to_string(),
            source,
        })?;

        // Write-then-rename so a crash never leaves a half-written blob
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes).map_err(io_err)?;
        fs::rename(&tmp, &path).map_err(io_err)
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        let path = self.path_for(key)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CacheError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }
}

// =============================================================================
// MemoryCache
// =============================================================================

/// In-process cache, for tests and embedders that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryCache {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a stored value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

impl LocalCache for MemoryCache {
    fn load(&self, key: &str) -> Result<Option<Value>, CacheError> {
        Ok(self.get(key))
    }

    fn store(&self, key: &str, value: &Value) -> Result<(), CacheError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}
