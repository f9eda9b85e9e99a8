//! Single-slot "latest result" cache
//!
//! One JSON document per `(source, cache type)` pair. Writing a new result
//! replaces the previous one — the slot always holds the latest value, which
//! is what lets a `download` reuse the chapter listing a `chapters` call just
//! fetched without another network round trip.
//!
//! The slot is not guarded by any lock: two concurrent writers of the same
//! type race and the last write wins. The cache is per-downloader state and
//! operations on one downloader run sequentially in practice, so this is a
//! documented limitation rather than a supported mode.

use crate::error::Result;
use crate::types::CacheType;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Per-source latest-value cache backed by one JSON file per slot
#[derive(Clone, Debug)]
pub struct ResultCache {
    dir: PathBuf,
    source: String,
}

impl ResultCache {
    /// Create a cache for `source` rooted at `cache_dir`
    pub fn new(cache_dir: &Path, source: &str) -> Self {
        Self {
            dir: cache_dir.to_path_buf(),
            source: source.to_string(),
        }
    }

    fn slot_path(&self, cache_type: CacheType) -> PathBuf {
        self.dir
            .join(format!("{}_{}.json", self.source, cache_type.as_str()))
    }

    /// Replace the slot for `cache_type` with `payload`
    pub fn save<T: Serialize>(&self, cache_type: CacheType, payload: &T) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.slot_path(cache_type);
        let json = serde_json::to_vec_pretty(payload)?;
        std::fs::write(&path, json)?;
        tracing::debug!(slot = %path.display(), "cache slot written");
        Ok(())
    }

    /// Load the current value of the slot, if one exists
    pub fn load<T: DeserializeOwned>(&self, cache_type: CacheType) -> Result<Option<T>> {
        let path = self.slot_path(cache_type);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Discard the slot for `cache_type`, if present
    pub fn clear(&self, cache_type: CacheType) -> Result<()> {
        let path = self.slot_path(cache_type);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
