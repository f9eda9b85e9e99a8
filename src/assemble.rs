//! Chapter artifact assembly
//!
//! After a chapter's page tasks settle, whatever pages are present on disk
//! get merged into one CBZ archive. Page files are named with fixed-width
//! zero-padded numbers, so lexical sort order equals page order and
//! out-of-order download completion never matters here.
//!
//! On success every merged source file is deleted; a deletion failure is
//! logged and does not roll back the merge. Partial chapters keep their page
//! files for a later resumed run.

use crate::error::{AssembleError, Result};
use regex::Regex;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use zip::CompressionMethod;
use zip::write::FileOptions;

fn page_file_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}\.jpg$").unwrap_or_else(|_| unreachable!()))
}

/// Result of an assembly pass over a chapter directory
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssembleOutcome {
    /// An artifact was written containing `pages` page files
    Archived {
        /// Path of the written artifact
        path: PathBuf,
        /// Number of page files merged
        pages: usize,
    },
    /// The directory held no page files; nothing to assemble
    Empty,
}

/// Merge the page files in `chapter_dir` into a CBZ at `artifact_path`
///
/// Pages are stored uncompressed (they are already JPEG-compressed) in
/// lexical name order. The archive is written to a sibling temp file first
/// and renamed into place, then the merged sources are removed.
///
/// # Errors
///
/// Returns [`AssembleError`] when the directory cannot be read or the
/// archive cannot be written. An empty directory is not an error; it yields
/// [`AssembleOutcome::Empty`].
pub fn assemble_chapter(chapter_dir: &Path, artifact_path: &Path) -> Result<AssembleOutcome> {
    let mut pages: Vec<PathBuf> = std::fs::read_dir(chapter_dir)
        .map_err(|source| AssembleError::ReadDir {
            path: chapter_dir.to_path_buf(),
            source,
        })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| page_file_re().is_match(n))
        })
        .collect();

    if pages.is_empty() {
        tracing::info!(dir = %chapter_dir.display(), "nothing to assemble");
        return Ok(AssembleOutcome::Empty);
    }
    pages.sort();

    let tmp_path = artifact_path.with_extension("cbz.tmp");
    write_archive(&pages, &tmp_path).map_err(|reason| AssembleError::Write {
        path: artifact_path.to_path_buf(),
        reason,
    })?;
    std::fs::rename(&tmp_path, artifact_path).map_err(|e| AssembleError::Write {
        path: artifact_path.to_path_buf(),
        reason: e.to_string(),
    })?;
    tracing::info!(
        artifact = %artifact_path.display(),
        pages = pages.len(),
        "assembled chapter artifact"
    );

    for page in &pages {
        if let Err(e) = std::fs::remove_file(page) {
            tracing::warn!(page = %page.display(), error = %e, "failed to remove merged page");
        }
    }

    Ok(AssembleOutcome::Archived {
        path: artifact_path.to_path_buf(),
        pages: pages.len(),
    })
}

fn write_archive(pages: &[PathBuf], tmp_path: &Path) -> std::result::Result<(), String> {
    let file = File::create(tmp_path).map_err(|e| e.to_string())?;
    let mut writer = zip::ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);

    for page in pages {
        let name = page
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| format!("unrepresentable page name: {}", page.display()))?;
        let bytes = std::fs::read(page).map_err(|e| format!("{}: {e}", page.display()))?;
        writer.start_file(name, options).map_err(|e| e.to_string())?;
        writer.write_all(&bytes).map_err(|e| e.to_string())?;
    }
    writer.finish().map_err(|e| e.to_string())?;
    Ok(())
}
