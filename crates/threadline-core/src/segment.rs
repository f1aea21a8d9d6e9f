//! Blank-line text segmenter.
//!
//! Splits raw, stream-of-consciousness input into [`TextUnit`]s. A unit
//! boundary is a run of two or more consecutive `\n` characters; a single
//! newline stays inside its unit. Lines that hold only spaces are not
//! boundaries, and `\r` is treated as ordinary text.
//!
//! # Algorithm
//!
//! 1. Trim the input.
//! 2. Collapse every run of two or more `\n` into exactly `\n\n`.
//! 3. Split on `\n\n` and trim each piece.
//!
//! Empty pieces are not filtered here; an empty input yields one empty
//! unit, and `"a\n\n \n\nb"` yields an empty middle unit. Consumers must
//! tolerate empty-string units.
//!
//! # Example
//!
//! ```rust
//! use threadline_core::segment::segment;
//!
//! let units = segment("I keep waking at 4am.\n\n\n\nMaybe it's the coffee.");
//! assert_eq!(units.len(), 2);
//! assert_eq!(units[1].text, "Maybe it's the coffee.");
//! ```

use sha2::{Digest, Sha256};

use crate::models::TextUnit;

/// Collapse runs of two or more `\n` into one blank line.
fn collapse_blank_runs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut newlines = 0usize;
    for ch in text.chars() {
        if ch == '\n' {
            newlines += 1;
            continue;
        }
        match newlines {
            0 => {}
            1 => out.push('\n'),
            _ => out.push_str("\n\n"),
        }
        newlines = 0;
        out.push(ch);
    }
    out
}

/// Split text into units on blank-line boundaries.
pub fn segment(raw: &str) -> Vec<TextUnit> {
    collapse_blank_runs(raw.trim())
        .split("\n\n")
        .map(|piece| TextUnit::new(piece.trim()))
        .collect()
}

/// Re-join units with exactly one blank line between them.
pub fn join_units(units: &[TextUnit]) -> String {
    units
        .iter()
        .map(|u| u.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// SHA-256 over the unit sequence. Two texts with the same segmentation
/// share a fingerprint regardless of surrounding whitespace.
pub fn segment_fingerprint(units: &[TextUnit]) -> String {
    let mut hasher = Sha256::new();
    for unit in units {
        hasher.update(unit.text.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(units: &[TextUnit]) -> Vec<&str> {
        units.iter().map(|u| u.text.as_str()).collect()
    }

    #[test]
    fn test_single_paragraph() {
        let units = segment("  just one thought  ");
        assert_eq!(texts(&units), vec!["just one thought"]);
    }

    #[test]
    fn test_collapses_runs_of_blank_lines() {
        let units = segment("alpha\n\n\n\n\nbeta\n\ngamma");
        assert_eq!(texts(&units), vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_single_newline_stays_inside_unit() {
        let units = segment("line one\nline two\n\nnext");
        assert_eq!(texts(&units), vec!["line one\nline two", "next"]);
    }

    #[test]
    fn test_whitespace_only_line_is_not_a_boundary() {
        let units = segment("alpha\n  \nbeta");
        assert_eq!(texts(&units), vec!["alpha\n  \nbeta"]);
    }

    #[test]
    fn test_spaces_between_blank_runs_leave_empty_unit() {
        let units = segment("a\n\n \n\nb");
        assert_eq!(texts(&units), vec!["a", "", "b"]);
    }

    #[test]
    fn test_trailing_spaces_before_boundary_are_trimmed() {
        let units = segment("a \n\n\n b");
        assert_eq!(texts(&units), vec!["a", "b"]);
    }

    #[test]
    fn test_crlf_is_not_a_boundary() {
        let units = segment("alpha\r\n\r\nbeta\r\n");
        assert_eq!(texts(&units), vec!["alpha\r\n\r\nbeta"]);
    }

    #[test]
    fn test_empty_input_yields_one_empty_unit() {
        assert_eq!(texts(&segment("")), vec![""]);
        assert_eq!(texts(&segment("\n\n  \n")), vec![""]);
    }

    #[test]
    fn test_idempotent_over_rejoin() {
        let inputs = [
            "a\n\nb\n\n\nc",
            "  first thought\nstill first\n\n\n\nsecond  ",
            "solo",
            "x\n \ny\n\n\n\n\nz\n",
        ];
        for input in inputs {
            let once = segment(input);
            let twice = segment(&join_units(&once));
            assert_eq!(once, twice, "not idempotent for {:?}", input);
        }
    }

    #[test]
    fn test_fingerprint_ignores_surrounding_whitespace() {
        let a = segment("one\n\ntwo");
        let b = segment("\n\n one \n\n\n\n two\n");
        assert_eq!(segment_fingerprint(&a), segment_fingerprint(&b));
    }

    #[test]
    fn test_fingerprint_distinguishes_boundaries() {
        let merged = segment("one\ntwo");
        let split = segment("one\n\ntwo");
        assert_ne!(segment_fingerprint(&merged), segment_fingerprint(&split));
    }
}
