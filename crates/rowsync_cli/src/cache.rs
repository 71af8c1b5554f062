//! Persistent node id cache.
//!
//! One JSON file holds the device key (minted on first use) and the
//! node id leased by the server, so a device keeps its identity across
//! restarts and re-registrations.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Errors reading or writing the cache file.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem failure.
    #[error("cache I/O error: {0}")]
    Io(#[from] io::Error),

    /// The cache file exists but is not valid JSON.
    #[error("malformed cache file: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    device_key: String,
    node_id: Option<u16>,
}

/// The on-disk `{device_key, node_id}` cache.
#[derive(Debug)]
pub struct NodeIdCache {
    path: PathBuf,
    contents: CacheFile,
}

impl NodeIdCache {
    /// Loads the cache at `path`, creating it with a fresh device key
    /// if it does not exist yet.
    pub fn load_or_create(path: &Path) -> Result<Self, CacheError> {
        if path.exists() {
            let raw = fs::read_to_string(path)?;
            let contents: CacheFile = serde_json::from_str(&raw)?;
            return Ok(Self {
                path: path.to_path_buf(),
                contents,
            });
        }

        let cache = Self {
            path: path.to_path_buf(),
            contents: CacheFile {
                device_key: Uuid::new_v4().to_string(),
                node_id: None,
            },
        };
        cache.save()?;
        Ok(cache)
    }

    /// The stable key identifying this device to the registry.
    pub fn device_key(&self) -> &str {
        &self.contents.device_key
    }

    /// The cached node id, if one was ever leased.
    pub fn node_id(&self) -> Option<u16> {
        self.contents.node_id
    }

    /// Persists a leased node id.
    pub fn store_node_id(&mut self, node_id: u16) -> Result<(), CacheError> {
        self.contents.node_id = Some(node_id);
        self.save()
    }

    fn save(&self) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(&self.contents)?;
        fs::write(&self.path, raw)?;
        Ok(())
    }
}
