//! Single page download — fetch, optional decrypt, normalize, atomic save.
//!
//! One task per page. Tasks are independent: a failed page is reported and
//! lowers the chapter tally, but never aborts its siblings. The caller
//! dispatches all of a chapter's tasks concurrently; the shared semaphore in
//! [`ChapterContext`](super::chapter::ChapterContext) is what actually bounds
//! parallelism.

use crate::decrypt::decrypt_page;
use crate::error::{Error, Result};
use crate::imaging::normalize_page;
use crate::types::PageOutcome;
use crate::utils::atomic_write;
use std::path::PathBuf;

use super::chapter::ChapterContext;

/// Everything needed to produce one page file on disk
#[derive(Clone, Debug)]
pub(crate) struct PageTask {
    /// 1-based page number (for logging and tallies)
    pub(crate) page: u32,
    /// Remote location: a mirror-relative path, or an absolute URL for
    /// off-mirror assets
    pub(crate) location: String,
    /// Chapter reader URL, sent as the Referer and used for key capture
    pub(crate) referer: String,
    /// Final local path (`NNNN.jpg`); its existence is the idempotence check
    pub(crate) final_path: PathBuf,
    /// Whether the remote bytes are obfuscated
    pub(crate) encrypted: bool,
    /// Key-cache identifier for the chapter (only read when `encrypted`)
    pub(crate) asset_id: String,
}

/// Run one page task to a terminal outcome
///
/// Never returns an error: every failure mode collapses into
/// [`PageOutcome::Failed`] so the chapter loop can keep settling siblings.
pub(crate) async fn download_page(ctx: &ChapterContext, task: PageTask) -> PageOutcome {
    // Idempotence: a page already on disk is done, no network, no permit.
    if task.final_path.exists() {
        tracing::debug!(page = task.page, path = %task.final_path.display(), "page already present");
        return PageOutcome::Skipped;
    }

    let _permit = match ctx.semaphore.acquire().await {
        Ok(permit) => permit,
        Err(_) => return PageOutcome::Failed("download limiter closed".to_string()),
    };

    match produce_page(ctx, &task).await {
        Ok(()) => PageOutcome::Saved,
        Err(e) => {
            tracing::warn!(
                page = task.page,
                location = %task.location,
                error = %e,
                "page failed"
            );
            PageOutcome::Failed(e.to_string())
        }
    }
}

async fn produce_page(ctx: &ChapterContext, task: &PageTask) -> Result<()> {
    let raw = fetch_bytes(ctx, task).await?;

    let plain = if task.encrypted {
        decrypt_with_recapture(ctx, task, &raw).await?
    } else {
        raw
    };

    // Decode/re-encode is CPU-bound; keep it off the cooperative scheduler.
    let quality = ctx.jpeg_quality;
    let jpeg = tokio::task::spawn_blocking(move || normalize_page(&plain, quality))
        .await
        .map_err(|e| Error::Other(format!("image worker panicked: {e}")))??;

    atomic_write(&task.final_path, &jpeg).await?;
    tracing::debug!(page = task.page, path = %task.final_path.display(), "page saved");
    Ok(())
}

async fn fetch_bytes(ctx: &ChapterContext, task: &PageTask) -> Result<Vec<u8>> {
    if task.location.starts_with("http://") || task.location.starts_with("https://") {
        ctx.fetcher.get_url(&task.location, Some(&task.referer)).await
    } else {
        ctx.fetcher.get_path(&task.location, Some(&task.referer)).await
    }
}

/// Decrypt page bytes, forcing one key re-capture if the cached key fails
///
/// Obfuscated pages are staged to disk before decryption so a crash
/// mid-decrypt leaves evidence; the stage file is removed once the task
/// settles, whether decryption succeeded or not.
async fn decrypt_with_recapture(
    ctx: &ChapterContext,
    task: &PageTask,
    raw: &[u8],
) -> Result<Vec<u8>> {
    let stage = task.final_path.with_extension("enc.tmp");
    tokio::fs::write(&stage, raw).await?;

    let result = decrypt_with_key_retry(ctx, task, raw).await;

    if let Err(e) = tokio::fs::remove_file(&stage).await {
        tracing::warn!(stage = %stage.display(), error = %e, "failed to remove stage file");
    }
    result
}

async fn decrypt_with_key_retry(
    ctx: &ChapterContext,
    task: &PageTask,
    raw: &[u8],
) -> Result<Vec<u8>> {
    let key = ctx
        .keys
        .ensure(&task.asset_id, &task.referer, ctx.capture.as_ref())
        .await?;

    match decrypt_page(raw, &key) {
        Ok(plain) => Ok(plain),
        Err(first) => {
            // The key may have rotated since it was cached: re-capture once
            // and retry exactly once.
            tracing::info!(
                page = task.page,
                asset_id = %task.asset_id,
                error = %first,
                "decrypt failed with cached key, forcing re-capture"
            );
            let key = ctx
                .keys
                .refresh(&task.asset_id, &task.referer, ctx.capture.as_ref())
                .await?;
            Ok(decrypt_page(raw, &key)?)
        }
    }
}
