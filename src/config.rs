//! Configuration types for comic-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Download behavior configuration (directories, concurrency, image encoding)
///
/// Groups settings related to how pages are fetched, stored, and re-encoded.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Output directory for downloaded titles (default: "./comics")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Cache directory for listing slots and key records (default: "./cache")
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Maximum in-flight page downloads across all chapters (default: 10)
    ///
    /// One counting semaphore of this capacity is shared by every page task of
    /// a downloader instance; chapters are processed sequentially, so this is
    /// the system-wide bound.
    #[serde(default = "default_max_concurrent_pages")]
    pub max_concurrent_pages: usize,

    /// JPEG quality used when re-encoding normalized pages (default: 85)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            cache_dir: default_cache_dir(),
            max_concurrent_pages: default_max_concurrent_pages(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

/// Retry behavior for transient page-fetch failures
///
/// Backoff is a fixed interval: a failed attempt always sleeps the same
/// duration before the next attempt, whether or not a mirror rotation
/// happened in between.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retry attempts per mirror domain before the budget moves on (default: 3)
    #[serde(default = "default_max_retries_per_domain")]
    pub max_retries_per_domain: u32,

    /// Fixed backoff between attempts, in milliseconds (default: 1000)
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    /// Per-attempt network timeout, in seconds (default: 30)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl RetryConfig {
    /// Fixed backoff interval as a [`Duration`]
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    /// Per-attempt timeout as a [`Duration`]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries_per_domain: default_max_retries_per_domain(),
            backoff_ms: default_backoff_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Mirror rotation behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Consecutive failures on the active domain before rotating (default: 2)
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
        }
    }
}

/// Main configuration for [`ComicDownloader`](crate::ComicDownloader)
///
/// Fields are organized into logical sub-configs:
/// - [`download`](DownloadConfig) — directories, concurrency, image encoding
/// - [`retry`](RetryConfig) — attempt budgets, backoff, timeouts
/// - [`mirror`](MirrorConfig) — rotation threshold
///
/// All sub-config fields are flattened for serialization, so the JSON/TOML
/// format stays flat (no nesting). Commonly used fields are also reachable via
/// accessor methods on `Config` without spelling out the sub-config.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Mirror domains serving equivalent content, in preference order
    /// (at least one required), e.g. `["img.example.com", "img2.example.com"]`
    pub mirrors: Vec<String>,

    /// Download behavior settings
    #[serde(flatten)]
    pub download: DownloadConfig,

    /// Retry behavior for transient failures
    #[serde(flatten)]
    pub retry: RetryConfig,

    /// Mirror rotation behavior
    #[serde(flatten)]
    pub mirror: MirrorConfig,
}

// Convenience accessors — keep call sites short without reaching through
// the sub-config structs.
impl Config {
    /// Output directory for downloaded titles
    pub fn output_dir(&self) -> &PathBuf {
        &self.download.output_dir
    }

    /// Cache directory for listing slots and key records
    pub fn cache_dir(&self) -> &PathBuf {
        &self.download.cache_dir
    }

    /// Total request attempt budget for one logical resource:
    /// `max_retries_per_domain * mirrors.len()`
    pub fn attempt_budget(&self) -> usize {
        self.retry.max_retries_per_domain as usize * self.mirrors.len()
    }

    /// Validate the configuration, rejecting states no download can recover from
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when no mirror domains are configured, when
    /// the concurrency bound is zero, or when the rotation threshold is zero.
    pub fn validate(&self) -> Result<()> {
        if self.mirrors.is_empty() {
            return Err(Error::Config {
                message: "at least one mirror domain is required".to_string(),
                key: Some("mirrors".to_string()),
            });
        }
        for domain in &self.mirrors {
            let candidate = if domain.contains("://") {
                domain.clone()
            } else {
                format!("https://{domain}")
            };
            let parsed = url::Url::parse(&candidate);
            if !parsed.is_ok_and(|u| u.has_host()) {
                return Err(Error::Config {
                    message: format!("mirror domain '{domain}' is not a valid host"),
                    key: Some("mirrors".to_string()),
                });
            }
        }
        if self.download.max_concurrent_pages == 0 {
            return Err(Error::Config {
                message: "max_concurrent_pages must be at least 1".to_string(),
                key: Some("max_concurrent_pages".to_string()),
            });
        }
        if self.mirror.failure_threshold == 0 {
            return Err(Error::Config {
                message: "failure_threshold must be at least 1".to_string(),
                key: Some("failure_threshold".to_string()),
            });
        }
        Ok(())
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./comics")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./cache")
}

fn default_max_concurrent_pages() -> usize {
    10
}

fn default_jpeg_quality() -> u8 {
    85
}

fn default_max_retries_per_domain() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_failure_threshold() -> u32 {
    2
}
