//! Download façade tying the collaborators together
//!
//! [`ComicDownloader`] owns the per-run state (HTTP fetcher with mirror
//! failover, key store, result cache, page semaphore) and exposes the three
//! public operations: [`search`](ComicDownloader::search),
//! [`chapters`](ComicDownloader::chapters), and
//! [`download`](ComicDownloader::download).
//!
//! Submodules:
//! - `chapter`: per-chapter orchestration and tallying
//! - `page`: the single-page task state machine

mod chapter;
mod page;

use crate::cache::ResultCache;
use crate::config::Config;
use crate::error::Result;
use crate::keystore::{KeyCapture, KeyStore, NoKeyCapture};
use crate::mirror::Fetcher;
use crate::selection::ChapterSpec;
use crate::source::Source;
use crate::types::{CacheType, DownloadSummary, TitleListing};
use crate::utils::sanitize_name;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;

use chapter::{ChapterContext, download_chapter};

/// Chapter listing cache payload, keyed by the title reference it was
/// fetched for so a download for a different title never reuses it.
#[derive(Serialize, Deserialize)]
struct CachedListing {
    title_ref: String,
    listing: TitleListing,
}

/// Orchestrates search, listing, and chapter downloads for one source
///
/// One instance per source site. All state lives here; the [`Source`] is a
/// stateless collaborator describing the site.
pub struct ComicDownloader<S: Source> {
    source: S,
    config: Config,
    fetcher: Arc<Fetcher>,
    keys: KeyStore,
    cache: ResultCache,
    capture: Arc<dyn KeyCapture>,
    semaphore: Arc<Semaphore>,
}

impl<S: Source> ComicDownloader<S> {
    /// Create a downloader with no key-capture collaborator
    ///
    /// Encrypted chapters will fail their key lookup unless a key is already
    /// cached on disk; use [`with_key_capture`](Self::with_key_capture) for
    /// sources that obfuscate pages.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) when the configuration
    /// fails validation, or a network error when the HTTP client cannot be
    /// built.
    pub fn new(source: S, config: Config) -> Result<Self> {
        Self::with_key_capture(source, config, Arc::new(NoKeyCapture))
    }

    /// Create a downloader with an external key-capture collaborator
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_key_capture(
        source: S,
        config: Config,
        capture: Arc<dyn KeyCapture>,
    ) -> Result<Self> {
        config.validate()?;
        let fetcher = Arc::new(Fetcher::new(&config)?);
        let keys = KeyStore::new(config.cache_dir());
        let cache = ResultCache::new(config.cache_dir(), source.name());
        let semaphore = Arc::new(Semaphore::new(config.download.max_concurrent_pages));
        Ok(Self {
            source,
            config,
            fetcher,
            keys,
            cache,
            capture,
            semaphore,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run a search against the source and cache the raw result
    ///
    /// The newest result replaces the previous one in the single search
    /// cache slot.
    ///
    /// # Errors
    ///
    /// Returns a fetch error when the search request fails; cache write
    /// errors are logged and swallowed.
    pub async fn search(&self, query: &str, page: u32) -> Result<serde_json::Value> {
        tracing::info!(query, page, source = self.source.name(), "searching");
        let results = self.source.search(&self.fetcher, query, page).await?;
        if let Err(e) = self.cache.save(CacheType::Search, &results) {
            tracing::warn!(error = %e, "failed to cache search results");
        }
        Ok(results)
    }

    /// Fetch the full chapter listing for a title and cache it
    ///
    /// Always fetches fresh; [`download`](Self::download) is the consumer of
    /// the cached copy.
    ///
    /// # Errors
    ///
    /// Returns a fetch error when the listing request fails.
    pub async fn chapters(&self, title: &str) -> Result<TitleListing> {
        let listing = self.source.list_chapters(&self.fetcher, title).await?;
        tracing::info!(
            title = %listing.title,
            chapters = listing.chapters.len(),
            "listed chapters"
        );
        self.cache_listing(title, &listing);
        Ok(listing)
    }

    /// Download the chapters selected by `spec` for a title
    ///
    /// `spec` is `"all"`, a 1-based chapter number, or a 1-based inclusive
    /// range like `"3-7"`. Chapters run sequentially; pages within them run
    /// concurrently up to the configured bound. Per-chapter failures are
    /// recorded in the summary, never propagated.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError`](crate::SpecError) variants for an unparseable or
    /// out-of-bounds spec, a fetch error when no usable chapter listing can
    /// be obtained, or an I/O error when the output directory cannot be
    /// created.
    pub async fn download(&self, title: &str, spec: &str) -> Result<DownloadSummary> {
        let spec = ChapterSpec::parse(spec)?;
        let listing = self.listing_for(title).await?;
        let selected = spec.resolve(&listing.chapters)?;
        tracing::info!(
            title = %listing.title,
            selected = selected.len(),
            total = listing.chapters.len(),
            "starting download"
        );

        let title_dir = self.config.output_dir().join(sanitize_name(&listing.title));
        tokio::fs::create_dir_all(&title_dir).await?;

        let ctx = ChapterContext {
            fetcher: Arc::clone(&self.fetcher),
            keys: self.keys.clone(),
            capture: Arc::clone(&self.capture),
            semaphore: Arc::clone(&self.semaphore),
            jpeg_quality: self.config.download.jpeg_quality,
        };

        let mut chapters = Vec::with_capacity(selected.len());
        for chapter in &selected {
            let report = download_chapter(&ctx, &self.source, &title_dir, chapter).await;
            tracing::info!("{report}");
            chapters.push(report);
        }

        Ok(DownloadSummary {
            title: listing.title,
            chapters,
        })
    }

    /// Cached listing when it matches `title`, otherwise a fresh fetch
    async fn listing_for(&self, title: &str) -> Result<TitleListing> {
        match self.cache.load::<CachedListing>(CacheType::Chapters) {
            Ok(Some(cached)) if cached.title_ref == title => {
                tracing::debug!(title, "reusing cached chapter listing");
                return Ok(cached.listing);
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "failed to read cached chapter listing");
            }
        }
        let listing = self.source.list_chapters(&self.fetcher, title).await?;
        self.cache_listing(title, &listing);
        Ok(listing)
    }

    fn cache_listing(&self, title: &str, listing: &TitleListing) {
        let payload = CachedListing {
            title_ref: title.to_string(),
            listing: listing.clone(),
        };
        if let Err(e) = self.cache.save(CacheType::Chapters, &payload) {
            tracing::warn!(error = %e, "failed to cache chapter listing");
        }
    }
}
