//! Chapter orchestration — expand a chapter into page tasks, settle them all,
//! tally, and hand the directory to the assembler.
//!
//! Phases:
//! 1. Resolve the chapter's page layout through the source
//! 2. Pre-warm the decryption key for obfuscated chapters
//! 3. Dispatch one task per page, all sharing the global semaphore
//! 4. Wait for every task to settle (a failure never cancels siblings)
//! 5. Assemble whatever pages are on disk into the chapter artifact

use crate::assemble::{AssembleOutcome, assemble_chapter};
use crate::keystore::{KeyCapture, KeyStore};
use crate::mirror::Fetcher;
use crate::source::Source;
use crate::types::{Chapter, ChapterReport, PageOutcome};
use crate::utils::{page_file_name, sanitize_name};
use futures::future::join_all;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;

use super::page::{PageTask, download_page};

/// Shared collaborators for one downloader instance's page tasks
pub(crate) struct ChapterContext {
    /// HTTP fetcher with mirror failover
    pub(crate) fetcher: Arc<Fetcher>,
    /// Per-asset decryption key cache
    pub(crate) keys: KeyStore,
    /// External key-capture collaborator
    pub(crate) capture: Arc<dyn KeyCapture>,
    /// Global in-flight page bound, shared across chapters
    pub(crate) semaphore: Arc<Semaphore>,
    /// JPEG quality for normalized pages
    pub(crate) jpeg_quality: u8,
}

/// Download one chapter to a settled [`ChapterReport`]
///
/// Chapter-level failures (layout fetch, directory creation) produce a report
/// carrying an error string; page-level failures only lower the tally.
pub(crate) async fn download_chapter(
    ctx: &ChapterContext,
    source: &dyn Source,
    title_dir: &Path,
    chapter: &Chapter,
) -> ChapterReport {
    tracing::info!(chapter = %chapter.name, url = %chapter.url, "starting chapter");

    let layout = match source.chapter_layout(&ctx.fetcher, chapter).await {
        Ok(layout) => layout,
        Err(e) => {
            tracing::warn!(chapter = %chapter.name, error = %e, "chapter layout failed");
            return failed_report(chapter, format!("layout fetch failed: {e}"));
        }
    };
    if layout.page_count == 0 {
        return failed_report(chapter, "chapter reports zero pages".to_string());
    }

    let chapter_name = sanitize_name(&chapter.name);
    let chapter_dir = title_dir.join(&chapter_name);
    if let Err(e) = tokio::fs::create_dir_all(&chapter_dir).await {
        return failed_report(chapter, format!("cannot create chapter directory: {e}"));
    }

    let asset_id = source.asset_id(chapter);
    if layout.encrypted {
        // One capture up front instead of every page racing to capture on a
        // cold cache. Best-effort: pages re-attempt through `ensure` anyway.
        if let Err(e) = ctx
            .keys
            .ensure(&asset_id, &chapter.url, ctx.capture.as_ref())
            .await
        {
            tracing::warn!(chapter = %chapter.name, error = %e, "key pre-warm failed");
        }
    }

    let tasks: Vec<PageTask> = (1..=layout.page_count)
        .map(|page| PageTask {
            page,
            location: source.page_location(&layout, page),
            referer: chapter.url.clone(),
            final_path: chapter_dir.join(page_file_name(page)),
            encrypted: layout.encrypted,
            asset_id: asset_id.clone(),
        })
        .collect();

    let outcomes = join_all(tasks.into_iter().map(|task| download_page(ctx, task))).await;
    let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
    let total = outcomes.len();
    let downloaded = outcomes
        .iter()
        .filter(|o| matches!(o, PageOutcome::Saved))
        .count();
    tracing::info!(
        chapter = %chapter.name,
        succeeded,
        total,
        downloaded,
        "chapter settled"
    );

    let mut report = ChapterReport {
        chapter: chapter.name.clone(),
        succeeded,
        total,
        artifact: None,
        error: None,
    };

    if succeeded == 0 {
        return report;
    }

    // At least one page is on disk (pre-existing or fresh): assemble.
    let artifact_path = chapter_dir.join(format!("{chapter_name}.cbz"));
    let dir = chapter_dir.clone();
    let target = artifact_path.clone();
    let assembled =
        tokio::task::spawn_blocking(move || assemble_chapter(&dir, &target)).await;
    match assembled {
        Ok(Ok(AssembleOutcome::Archived { path, pages })) => {
            tracing::info!(chapter = %chapter.name, pages, artifact = %path.display(), "artifact written");
            report.artifact = Some(path);
        }
        Ok(Ok(AssembleOutcome::Empty)) => {
            // Tally said pages exist but the directory disagrees; report it.
            report.error = Some("nothing to assemble".to_string());
        }
        Ok(Err(e)) => {
            tracing::warn!(chapter = %chapter.name, error = %e, "assembly failed");
            report.error = Some(format!("assembly failed: {e}"));
        }
        Err(e) => {
            report.error = Some(format!("assembly worker panicked: {e}"));
        }
    }

    report
}

fn failed_report(chapter: &Chapter, error: String) -> ChapterReport {
    ChapterReport {
        chapter: chapter.name.clone(),
        succeeded: 0,
        total: 0,
        artifact: None,
        error: Some(error),
    }
}
