//! Error types for comic-dl
//!
//! This module provides the error handling surface for the library:
//! - Domain-specific error types (Spec, Key, Decrypt, Assemble)
//! - A crate-level [`Error`] enum with conversions from library errors
//! - A [`Result`] alias used throughout

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for comic-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for comic-dl
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "mirrors")
        key: Option<String>,
    },

    /// Chapter selection expression could not be resolved
    #[error("chapter spec error: {0}")]
    Spec(#[from] SpecError),

    /// The origin answered with a non-success status; eligible for retry
    #[error("transient fetch failure: HTTP status {status}")]
    TransientFetch {
        /// HTTP status code returned by the origin
        status: u16,
    },

    /// Every configured mirror was tried up to its retry budget and all failed
    #[error("all mirrors exhausted after {attempts} attempts")]
    AllMirrorsExhausted {
        /// Total number of request attempts made across all mirrors
        attempts: usize,
    },

    /// Decryption key lookup or capture failed
    #[error("key error: {0}")]
    Key(#[from] KeyError),

    /// Page decryption failed
    #[error("decrypt error: {0}")]
    Decrypt(#[from] DecryptError),

    /// Artifact assembly failed
    #[error("assembly error: {0}")]
    Assemble(#[from] AssembleError),

    /// Image decode or re-encode failed
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Chapter selection expression errors
///
/// These are caller input errors: they are surfaced verbatim and never retried.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpecError {
    /// The expression is not `all`, a single number, or a `start-end` range
    #[error("invalid chapter spec {spec:?}: expected \"all\", a chapter number, or \"start-end\"")]
    InvalidFormat {
        /// The offending selection expression
        spec: String,
    },

    /// A single chapter index falls outside `1..=len`
    #[error("invalid chapter index {index}: must be between 1 and {len}")]
    InvalidIndex {
        /// The requested 1-based index
        index: usize,
        /// Number of chapters available
        len: usize,
    },

    /// A chapter range is empty or falls outside `1..=len`
    #[error("invalid chapter range {start}-{end}: must satisfy 1 <= start <= end <= {len}")]
    InvalidRange {
        /// Requested 1-based range start (inclusive)
        start: usize,
        /// Requested 1-based range end (inclusive)
        end: usize,
        /// Number of chapters available
        len: usize,
    },
}

/// Decryption key cache and capture errors
#[derive(Debug, Error)]
pub enum KeyError {
    /// The external capture collaborator could not recover key material
    #[error("key capture failed for {asset_id}: {reason}")]
    CaptureFailed {
        /// Asset the key was requested for
        asset_id: String,
        /// Collaborator-supplied failure description
        reason: String,
    },

    /// The capture collaborator returned empty key material
    #[error("key capture for {asset_id} returned no key material")]
    EmptyKey {
        /// Asset the key was requested for
        asset_id: String,
    },

    /// Reading or writing a key record failed
    #[error("key store I/O failure at {path}: {source}")]
    Store {
        /// The key record path involved
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },
}

/// Page decryption errors
#[derive(Debug, Error)]
pub enum DecryptError {
    /// Key material is not a valid AES key length
    #[error("bad key length {len}: expected 16, 24 or 32 bytes")]
    BadKeyLength {
        /// Length of the key material in bytes
        len: usize,
    },

    /// Ciphertext is not a whole number of cipher blocks or has invalid padding
    #[error("cipher error: {0}")]
    Cipher(String),
}

/// Artifact assembly errors
#[derive(Debug, Error)]
pub enum AssembleError {
    /// The chapter directory could not be read
    #[error("failed to read chapter directory {path}: {source}")]
    ReadDir {
        /// The chapter directory
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Writing the archive failed
    #[error("failed to write artifact {path}: {reason}")]
    Write {
        /// The artifact path
        path: PathBuf,
        /// Failure description
        reason: String,
    },
}
