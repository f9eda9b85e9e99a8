//! Utility functions for naming and file operations

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

fn unsafe_chars_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s.-]").unwrap_or_else(|_| unreachable!()))
}

/// Sanitize a title or chapter name for use as a directory component
///
/// Keeps word characters, whitespace, `.` and `-`; everything else is
/// dropped. An empty result falls back to `"untitled"` so path joins never
/// collapse.
///
/// # Examples
///
/// ```
/// use comic_dl::utils::sanitize_name;
///
/// assert_eq!(sanitize_name("One/Two: Three?"), "OneTwo Three");
/// assert_eq!(sanitize_name("///"), "untitled");
/// ```
pub fn sanitize_name(name: &str) -> String {
    let cleaned = unsafe_chars_re().replace_all(name, "");
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Local file name for a saved page, 1-based
///
/// Fixed-width zero padding makes lexical sort order equal page order, which
/// is what the assembler relies on.
pub fn page_file_name(page: u32) -> String {
    format!("{page:04}.jpg")
}

/// Write `bytes` to `path` atomically (write to a sibling temp file, then rename)
///
/// A crash mid-write leaves a `.tmp` file behind, never a truncated page the
/// idempotence check would wrongly skip.
pub async fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = tmp_sibling(path);
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn sanitize_drops_path_and_punctuation_characters() {
        assert_eq!(sanitize_name("第1话 去死吧!"), "第1话 去死吧");
        assert_eq!(sanitize_name("a/b\\c:d*e"), "abcde");
        assert_eq!(sanitize_name("  spaced out  "), "spaced out");
    }

    #[test]
    fn page_names_sort_lexically_in_page_order() {
        let mut names: Vec<String> = [102u32, 3, 21, 1, 1000].iter().map(|&p| page_file_name(p)).collect();
        names.sort();
        assert_eq!(names, vec!["0001.jpg", "0003.jpg", "0021.jpg", "0102.jpg", "1000.jpg"]);
    }

    #[tokio::test]
    async fn atomic_write_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("0001.jpg");
        atomic_write(&target, b"bytes").await.unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"bytes");
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .filter(|n| n.to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
