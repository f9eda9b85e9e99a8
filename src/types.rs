//! Core types shared across the library

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One downloadable unit consisting of an ordered set of pages
///
/// Chapters are produced by the listing collaborator, identified by their
/// position in the listed sequence, and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    /// Human-readable chapter name as listed by the source
    pub name: String,
    /// Absolute URL of the chapter's reader page
    pub url: String,
    /// Zero-based position in the listed sequence
    pub index: usize,
}

/// A title together with its full ordered chapter sequence
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleListing {
    /// Display name of the title
    pub title: String,
    /// Chapters in reading order
    pub chapters: Vec<Chapter>,
}

/// Which "latest" cache slot a payload belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheType {
    /// Search result payloads
    Search,
    /// Chapter listing payloads
    Chapters,
}

impl CacheType {
    /// Stable slot name used in cache file names
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheType::Search => "search",
            CacheType::Chapters => "chapters",
        }
    }
}

/// Terminal outcome of one page task
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageOutcome {
    /// The page file was written (downloaded this run)
    Saved,
    /// The page file already existed; no network request was made
    Skipped,
    /// The page could not be produced after its retry budget
    Failed(String),
}

impl PageOutcome {
    /// Whether the page file is present on disk after the task settled
    pub fn is_success(&self) -> bool {
        matches!(self, PageOutcome::Saved | PageOutcome::Skipped)
    }
}

/// Per-chapter result reported after all page tasks settle
#[derive(Clone, Debug)]
pub struct ChapterReport {
    /// Chapter name
    pub chapter: String,
    /// Pages present on disk after settling (downloaded or pre-existing)
    pub succeeded: usize,
    /// Total pages in the chapter
    pub total: usize,
    /// Path of the assembled artifact, when assembly ran and produced one
    pub artifact: Option<PathBuf>,
    /// Chapter-level failure (listing/layout fetch failed); page-level
    /// failures only lower `succeeded`
    pub error: Option<String>,
}

impl fmt::Display for ChapterReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            Some(e) => write!(f, "{}: {}", self.chapter, e),
            None => write!(
                f,
                "{}: succeeded {}/{} pages",
                self.chapter, self.succeeded, self.total
            ),
        }
    }
}

/// Aggregate result of one download operation
#[derive(Clone, Debug)]
pub struct DownloadSummary {
    /// Title the operation ran against
    pub title: String,
    /// One report per selected chapter, in selection order
    pub chapters: Vec<ChapterReport>,
}

impl DownloadSummary {
    /// Whether every selected chapter produced all of its pages
    pub fn is_complete(&self) -> bool {
        self.chapters
            .iter()
            .all(|c| c.error.is_none() && c.succeeded == c.total)
    }
}

impl fmt::Display for DownloadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} download finished:", self.title)?;
        for report in &self.chapters {
            writeln!(f, "{report}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn chapter_report_formats_success_line() {
        let report = ChapterReport {
            chapter: "Chapter 3".to_string(),
            succeeded: 12,
            total: 14,
            artifact: None,
            error: None,
        };
        assert_eq!(report.to_string(), "Chapter 3: succeeded 12/14 pages");
    }

    #[test]
    fn chapter_report_formats_error_line() {
        let report = ChapterReport {
            chapter: "Chapter 3".to_string(),
            succeeded: 0,
            total: 0,
            artifact: None,
            error: Some("layout fetch failed".to_string()),
        };
        assert_eq!(report.to_string(), "Chapter 3: layout fetch failed");
    }

    #[test]
    fn summary_complete_requires_all_pages() {
        let summary = DownloadSummary {
            title: "Title".to_string(),
            chapters: vec![ChapterReport {
                chapter: "c1".to_string(),
                succeeded: 3,
                total: 4,
                artifact: None,
                error: None,
            }],
        };
        assert!(!summary.is_complete());
    }

    #[test]
    fn cache_type_slot_names_are_stable() {
        assert_eq!(CacheType::Search.as_str(), "search");
        assert_eq!(CacheType::Chapters.as_str(), "chapters");
    }
}
