//! The per-site capability interface
//!
//! Everything site-specific — markup/JSON parsing, URL schemes, page naming —
//! lives behind [`Source`]. The orchestrator is generic over it, so adding a
//! site means implementing one trait, not duplicating the download pipeline.
//! Network access still flows through the crate's [`Fetcher`] so every
//! request gets mirror failover and retry for free.

use crate::error::Result;
use crate::mirror::Fetcher;
use crate::types::{Chapter, TitleListing};
use async_trait::async_trait;

/// How a chapter's pages are addressed remotely
///
/// Produced per chapter by [`Source::chapter_layout`]; consumed by the
/// orchestrator when expanding the chapter into page tasks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChapterLayout {
    /// Total number of pages (1-based addressing)
    pub page_count: u32,
    /// Remote file extension, e.g. `"jpg"`, `"webp"` or `"enc.webp"`
    pub file_ext: String,
    /// Whether page bytes are obfuscated and need the decrypt path
    pub encrypted: bool,
    /// URL prefix pages hang off: a mirror-relative path (`/comic/<id>/<tok>`)
    /// or an absolute URL for assets hosted off-mirror
    pub path_prefix: String,
}

/// Site-specific collaborator: listing, page layout, and naming
///
/// Implementations are expected to be cheap to call and stateless; per-run
/// state (caches, key store, mirror pool) belongs to the downloader.
#[async_trait]
pub trait Source: Send + Sync {
    /// Stable short name for this source, used in cache slot file names
    fn name(&self) -> &str;

    /// Run a search against the site and return its raw result document
    ///
    /// The payload is deliberately opaque JSON: the downloader caches and
    /// returns it, but never interprets it.
    async fn search(&self, fetcher: &Fetcher, query: &str, page: u32)
    -> Result<serde_json::Value>;

    /// List the full ordered chapter sequence for a title
    ///
    /// `title` is the source's own title reference (a path word, a slug, or a
    /// full URL, whatever the site uses).
    async fn list_chapters(&self, fetcher: &Fetcher, title: &str) -> Result<TitleListing>;

    /// Resolve how one chapter's pages are addressed
    async fn chapter_layout(&self, fetcher: &Fetcher, chapter: &Chapter) -> Result<ChapterLayout>;

    /// Remote location of one page, 1-based
    ///
    /// The default joins the layout prefix with the zero-padded page number
    /// and the remote extension. Returned values starting with `http` are
    /// treated as absolute URLs; anything else is a mirror-relative path.
    fn page_location(&self, layout: &ChapterLayout, page: u32) -> String {
        format!(
            "{}/{:04}.{}",
            layout.path_prefix.trim_end_matches('/'),
            page,
            layout.file_ext
        )
    }

    /// Stable identifier keying cached decryption material for a chapter
    ///
    /// The default derives it from the chapter URL; sources with nicer
    /// identifiers (title id + chapter number) should override this.
    fn asset_id(&self, chapter: &Chapter) -> String {
        let stripped = chapter
            .url
            .split_once("://")
            .map_or(chapter.url.as_str(), |(_, rest)| rest);
        stripped
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect()
    }
}
