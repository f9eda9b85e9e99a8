//! Chapter selection expressions
//!
//! A selection expression picks an ordered sub-sequence out of a listed
//! chapter sequence:
//!
//! - `"all"` (any case) — the entire sequence
//! - `"7"` — a single 1-based chapter
//! - `"3-10"` — a 1-based inclusive range
//!
//! Parsing and resolution are pure; bounds are checked against the sequence
//! length at resolution time.

use crate::error::SpecError;
use crate::types::Chapter;

/// A parsed chapter selection expression
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChapterSpec {
    /// The full sequence in its listed order
    All,
    /// A single 1-based chapter index
    Single(usize),
    /// A 1-based inclusive range
    Range(usize, usize),
}

impl ChapterSpec {
    /// Parse a selection expression
    ///
    /// Surrounding whitespace is ignored. Bounds are not checked here — only
    /// at [`resolve`](Self::resolve), where the sequence length is known.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::InvalidFormat`] for anything that is not `all`,
    /// a positive number, or `number-number`.
    pub fn parse(spec: &str) -> Result<Self, SpecError> {
        let trimmed = spec.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(ChapterSpec::All);
        }
        if let Some((start, end)) = trimmed.split_once('-') {
            let start = start.trim().parse::<usize>();
            let end = end.trim().parse::<usize>();
            return match (start, end) {
                (Ok(start), Ok(end)) => Ok(ChapterSpec::Range(start, end)),
                _ => Err(SpecError::InvalidFormat {
                    spec: spec.to_string(),
                }),
            };
        }
        match trimmed.parse::<usize>() {
            Ok(n) => Ok(ChapterSpec::Single(n)),
            Err(_) => Err(SpecError::InvalidFormat {
                spec: spec.to_string(),
            }),
        }
    }

    /// Materialize the selection against a chapter sequence
    ///
    /// The result preserves the sequence order and is read-only input for one
    /// download invocation.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::InvalidIndex`] when a single index falls outside
    /// `1..=len`, and [`SpecError::InvalidRange`] when a range is empty or out
    /// of bounds.
    pub fn resolve(&self, chapters: &[Chapter]) -> Result<Vec<Chapter>, SpecError> {
        let len = chapters.len();
        match *self {
            ChapterSpec::All => Ok(chapters.to_vec()),
            ChapterSpec::Single(n) => {
                if n < 1 || n > len {
                    return Err(SpecError::InvalidIndex { index: n, len });
                }
                Ok(vec![chapters[n - 1].clone()])
            }
            ChapterSpec::Range(start, end) => {
                if start < 1 || end > len || start > end {
                    return Err(SpecError::InvalidRange { start, end, len });
                }
                Ok(chapters[start - 1..end].to_vec())
            }
        }
    }

    /// Parse and resolve in one step
    pub fn select(spec: &str, chapters: &[Chapter]) -> Result<Vec<Chapter>, SpecError> {
        Self::parse(spec)?.resolve(chapters)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sequence(n: usize) -> Vec<Chapter> {
        (0..n)
            .map(|i| Chapter {
                name: format!("Chapter {}", i + 1),
                url: format!("https://example.com/title/{}", i + 1),
                index: i,
            })
            .collect()
    }

    #[test]
    fn all_is_case_insensitive_and_returns_full_sequence() {
        let chapters = sequence(5);
        for spec in ["all", "ALL", "All", "  aLl "] {
            let selected = ChapterSpec::select(spec, &chapters).unwrap();
            assert_eq!(selected, chapters);
        }
    }

    #[test]
    fn single_index_selects_exactly_that_chapter() {
        let chapters = sequence(5);
        for n in 1..=5 {
            let selected = ChapterSpec::select(&n.to_string(), &chapters).unwrap();
            assert_eq!(selected, vec![chapters[n - 1].clone()]);
        }
    }

    #[test]
    fn single_index_out_of_bounds_is_invalid_index() {
        let chapters = sequence(5);
        assert_eq!(
            ChapterSpec::select("0", &chapters),
            Err(SpecError::InvalidIndex { index: 0, len: 5 })
        );
        assert_eq!(
            ChapterSpec::select("6", &chapters),
            Err(SpecError::InvalidIndex { index: 6, len: 5 })
        );
    }

    #[test]
    fn range_is_inclusive_and_preserves_order() {
        let chapters = sequence(10);
        let selected = ChapterSpec::select("3-7", &chapters).unwrap();
        assert_eq!(selected, chapters[2..7].to_vec());

        // Degenerate single-element range.
        let selected = ChapterSpec::select("4-4", &chapters).unwrap();
        assert_eq!(selected, vec![chapters[3].clone()]);
    }

    #[test]
    fn reversed_or_out_of_bounds_range_is_invalid_range() {
        let chapters = sequence(5);
        assert_eq!(
            ChapterSpec::select("4-2", &chapters),
            Err(SpecError::InvalidRange {
                start: 4,
                end: 2,
                len: 5
            })
        );
        assert_eq!(
            ChapterSpec::select("0-3", &chapters),
            Err(SpecError::InvalidRange {
                start: 0,
                end: 3,
                len: 5
            })
        );
        assert_eq!(
            ChapterSpec::select("2-6", &chapters),
            Err(SpecError::InvalidRange {
                start: 2,
                end: 6,
                len: 5
            })
        );
    }

    #[test]
    fn garbage_tokens_are_invalid_format() {
        let chapters = sequence(3);
        for spec in ["", "latest", "1_3", "a-b", "1-2-3", "-2", "2-"] {
            assert!(matches!(
                ChapterSpec::select(spec, &chapters),
                Err(SpecError::InvalidFormat { .. })
            ));
        }
    }
}
