//! Per-asset decryption key cache
//!
//! Captured keys are only valid for the calendar day they were recovered on,
//! so records are stored one file per `(asset_id, date)` under a key-store
//! subdirectory, named `<asset_id>_<YYYY_MM_DD>.bin`. Lookup returns the
//! newest non-future-dated record; every store first sweeps records dated
//! strictly before today, for all assets alike, keeping the directory from
//! accumulating stale material.
//!
//! Actually recovering a key is the job of an external collaborator (a
//! headless page load that intercepts the in-page decrypt call); the crate
//! only sees it as the [`KeyCapture`] trait.

use crate::error::{Error, KeyError, Result};
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Subdirectory of the cache dir holding key records
const KEY_SUBDIR: &str = "aes_key";

/// Date format used in key record file names
const DATE_FORMAT: &str = "%Y_%m_%d";

fn date_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"_(\d{4}_\d{2}_\d{2})\.bin$").unwrap_or_else(|_| unreachable!())
    })
}

/// External collaborator that recovers key material for an asset
///
/// Implementations typically drive a headless browser against the chapter's
/// reader page and intercept the in-page AES decrypt call. The crate ships no
/// implementation; tests use doubles.
#[async_trait]
pub trait KeyCapture: Send + Sync {
    /// Recover raw key material for the resource at `url`
    ///
    /// # Errors
    ///
    /// Implementations should fail when the page never performs a decrypt
    /// call within their timeout; the store surfaces that as
    /// [`KeyError::CaptureFailed`].
    async fn capture(&self, url: &str) -> Result<Vec<u8>>;
}

/// Flatten a CryptoJS-style 32-bit word array into key bytes (big-endian)
pub fn words_to_key_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_be_bytes()).collect()
}

/// Capture collaborator that always fails
///
/// Default when no collaborator is configured. Sources that serve
/// unencrypted pages never hit it; encrypted chapters fail with a clear
/// message instead of hanging on a capture that can never happen.
pub struct NoKeyCapture;

#[async_trait]
impl KeyCapture for NoKeyCapture {
    async fn capture(&self, url: &str) -> Result<Vec<u8>> {
        Err(KeyError::CaptureFailed {
            asset_id: url.to_string(),
            reason: "no key capture collaborator configured".to_string(),
        }
        .into())
    }
}

/// On-disk cache of per-asset decryption keys with date-based invalidation
#[derive(Clone, Debug)]
pub struct KeyStore {
    dir: PathBuf,
}

impl KeyStore {
    /// Create a key store rooted under the given cache directory
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            dir: cache_dir.join(KEY_SUBDIR),
        }
    }

    /// Directory holding the key records
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Return the newest cached key for `asset_id`, if any
    ///
    /// Scans the store for records prefixed by the asset id with a parseable
    /// date suffix and returns the bytes of the most recent one. Records
    /// dated after today are never returned.
    pub fn lookup(&self, asset_id: &str) -> Result<Option<Vec<u8>>> {
        self.lookup_dated(asset_id, Local::now().date_naive())
    }

    fn lookup_dated(&self, asset_id: &str, today: NaiveDate) -> Result<Option<Vec<u8>>> {
        if !self.dir.exists() {
            return Ok(None);
        }
        let prefix = format!("{asset_id}_");
        let mut newest: Option<(NaiveDate, PathBuf)> = None;
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.starts_with(&prefix) {
                continue;
            }
            let Some(date) = record_date(name) else {
                continue;
            };
            if date > today {
                continue;
            }
            if newest.as_ref().is_none_or(|(d, _)| date > *d) {
                newest = Some((date, entry.path()));
            }
        }
        match newest {
            Some((_, path)) => {
                let bytes = std::fs::read(&path).map_err(|source| KeyError::Store {
                    path: path.clone(),
                    source,
                })?;
                tracing::debug!(asset_id, path = %path.display(), "key cache hit");
                Ok(Some(bytes))
            }
            None => Ok(None),
        }
    }

    /// Write a dated key record for `asset_id`, sweeping stale records first
    ///
    /// The sweep removes every record in the store dated strictly before
    /// today, regardless of asset. Returns the path of the new record.
    pub fn store(&self, asset_id: &str, key_bytes: &[u8]) -> Result<PathBuf> {
        let today = Local::now().date_naive();
        std::fs::create_dir_all(&self.dir)?;
        self.sweep_stale(today);
        let path = self
            .dir
            .join(format!("{asset_id}_{}.bin", today.format(DATE_FORMAT)));
        std::fs::write(&path, key_bytes).map_err(|source| KeyError::Store {
            path: path.clone(),
            source,
        })?;
        tracing::info!(asset_id, path = %path.display(), "stored key record");
        Ok(path)
    }

    fn sweep_stale(&self, today: NaiveDate) {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %self.dir.display(), error = %e, "key sweep skipped");
                return;
            }
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(date) = record_date(name) else {
                continue;
            };
            if date < today {
                let path = entry.path();
                match std::fs::remove_file(&path) {
                    Ok(()) => tracing::debug!(path = %path.display(), "removed stale key record"),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "failed to remove stale key record");
                    }
                }
            }
        }
    }

    /// Return the cached key for `asset_id`, capturing and storing it on miss
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::CaptureFailed`] when the collaborator cannot
    /// recover a key, [`KeyError::EmptyKey`] when it returns no bytes.
    pub async fn ensure(
        &self,
        asset_id: &str,
        url: &str,
        capture: &dyn KeyCapture,
    ) -> Result<Vec<u8>> {
        if let Some(key) = self.lookup(asset_id)? {
            return Ok(key);
        }
        self.refresh(asset_id, url, capture).await
    }

    /// Force a re-capture for `asset_id`, replacing today's record
    ///
    /// Used when decryption with a cached key fails and the key may have
    /// rotated since it was captured.
    pub async fn refresh(
        &self,
        asset_id: &str,
        url: &str,
        capture: &dyn KeyCapture,
    ) -> Result<Vec<u8>> {
        tracing::info!(asset_id, url, "capturing decryption key");
        let key = match capture.capture(url).await {
            Ok(key) => key,
            // Collaborators reporting a key error already carry the context.
            Err(e @ Error::Key(_)) => return Err(e),
            Err(e) => {
                return Err(KeyError::CaptureFailed {
                    asset_id: asset_id.to_string(),
                    reason: e.to_string(),
                }
                .into());
            }
        };
        if key.is_empty() {
            return Err(KeyError::EmptyKey {
                asset_id: asset_id.to_string(),
            }
            .into());
        }
        self.store(asset_id, &key)?;
        Ok(key)
    }
}

/// Parse the date suffix out of a record file name
fn record_date(file_name: &str) -> Option<NaiveDate> {
    let captures = date_suffix_re().captures(file_name)?;
    NaiveDate::parse_from_str(captures.get(1)?.as_str(), DATE_FORMAT).ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct FixedCapture {
        key: Vec<u8>,
        calls: AtomicUsize,
    }

    impl FixedCapture {
        fn new(key: &[u8]) -> Self {
            Self {
                key: key.to_vec(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl KeyCapture for FixedCapture {
        async fn capture(&self, _url: &str) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.key.clone())
        }
    }

    fn write_record(store: &KeyStore, asset_id: &str, date: NaiveDate, bytes: &[u8]) {
        std::fs::create_dir_all(store.dir()).unwrap();
        let path = store
            .dir()
            .join(format!("{asset_id}_{}.bin", date.format(DATE_FORMAT)));
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn words_flatten_big_endian() {
        assert_eq!(
            words_to_key_bytes(&[0x0102_0304, 0xA1B2_C3D4]),
            vec![0x01, 0x02, 0x03, 0x04, 0xA1, 0xB2, 0xC3, 0xD4]
        );
    }

    #[test]
    fn lookup_returns_newest_non_future_record() {
        let dir = tempdir().unwrap();
        let store = KeyStore::new(dir.path());
        let today = Local::now().date_naive();

        write_record(&store, "m1_7", today - Duration::days(2), b"old");
        write_record(&store, "m1_7", today, b"new");
        write_record(&store, "m1_7", today + Duration::days(1), b"future");
        write_record(&store, "m2_1", today, b"other-asset");

        let key = store.lookup("m1_7").unwrap().unwrap();
        assert_eq!(key, b"new");
    }

    #[test]
    fn lookup_misses_on_empty_store() {
        let dir = tempdir().unwrap();
        let store = KeyStore::new(dir.path());
        assert!(store.lookup("m1_7").unwrap().is_none());
    }

    #[test]
    fn store_sweeps_yesterdays_records_across_assets() {
        let dir = tempdir().unwrap();
        let store = KeyStore::new(dir.path());
        let today = Local::now().date_naive();
        let yesterday = today - Duration::days(1);

        write_record(&store, "m1_7", yesterday, b"stale");
        write_record(&store, "unrelated_3", yesterday, b"stale-too");
        write_record(&store, "m2_1", today, b"fresh");

        store.store("m1_7", b"key").unwrap();

        let names: Vec<String> = std::fs::read_dir(store.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 2, "stale records gone, today's retained: {names:?}");
        assert!(names.iter().all(|n| n.contains(&today.format(DATE_FORMAT).to_string())));

        // Today's record for the stored asset is retrievable.
        assert_eq!(store.lookup("m1_7").unwrap().unwrap(), b"key");
        assert_eq!(store.lookup("m2_1").unwrap().unwrap(), b"fresh");
    }

    #[tokio::test]
    async fn ensure_captures_once_then_hits_cache() {
        let dir = tempdir().unwrap();
        let store = KeyStore::new(dir.path());
        let capture = FixedCapture::new(b"0123456789abcdef");

        let key = store
            .ensure("m1_7", "https://example.com/ch/7", &capture)
            .await
            .unwrap();
        assert_eq!(key, b"0123456789abcdef");
        assert_eq!(capture.calls.load(Ordering::SeqCst), 1);

        let key = store
            .ensure("m1_7", "https://example.com/ch/7", &capture)
            .await
            .unwrap();
        assert_eq!(key, b"0123456789abcdef");
        assert_eq!(capture.calls.load(Ordering::SeqCst), 1, "second call served from cache");
    }

    #[tokio::test]
    async fn capture_key_errors_surface_unwrapped() {
        let dir = tempdir().unwrap();
        let store = KeyStore::new(dir.path());

        let err = store
            .ensure("m1_7", "https://example.com/ch/7", &NoKeyCapture)
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert_eq!(
            msg.matches("key capture failed").count(),
            1,
            "collaborator error must not be wrapped again: {msg}"
        );
    }

    #[test]
    fn empty_capture_result_is_an_error() {
        let dir = tempdir().unwrap();
        let store = KeyStore::new(dir.path());
        let capture = FixedCapture::new(b"");

        let err = tokio_test::block_on(store.ensure("m1_7", "https://example.com/ch/7", &capture))
            .unwrap_err();
        assert!(err.to_string().contains("no key material"));
    }
}
