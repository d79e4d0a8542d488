//! Escape-aware string splitting.
//!
//! Tag names, property strings and legacy property values are all split on a
//! single delimiter character, except where the delimiter sits between a pair
//! of escape markers (a backtick by default):
//!
//! ```rust
//! use modx_parser::split::esc_split;
//!
//! let parts = esc_split(',', "a,`b,c`,d", '`', 0);
//! assert_eq!(parts, vec!["a", "`b,c`", "d"]);
//! ```
//!
//! Segments are trimmed and empty segments are dropped. The escape markers
//! themselves are kept; stripping them is up to the caller.

/// The escape marker used throughout tag syntax.
pub const ESCAPE: char = '`';

/// Splits `text` on `delimiter`, ignoring delimiters between escape markers.
///
/// Every occurrence of `escape` toggles an "inside escape" flag; a delimiter
/// only splits while the flag is off. Segments are trimmed and empty ones are
/// skipped.
///
/// If `delimiter` does not occur at all the result is the trimmed input as a
/// single segment (even when that is empty).
///
/// A `limit` greater than zero stops once that many segments have been
/// collected. Whatever follows is discarded, not appended to the last segment.
pub fn esc_split(delimiter: char, text: &str, escape: char, limit: usize) -> Vec<String> {
    if !text.contains(delimiter) {
        return vec![text.trim().to_string()];
    }

    let mut segments = Vec::new();
    let mut segment_start = 0;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if ch == escape {
            escaped = !escaped;
            continue;
        }
        if escaped || ch != delimiter {
            continue;
        }

        let segment = text[segment_start..i].trim();
        if !segment.is_empty() {
            segments.push(segment.to_string());
            if limit > 0 && segments.len() >= limit {
                return segments;
            }
        }
        segment_start = i + ch.len_utf8();
    }

    let tail = text[segment_start..].trim();
    if !tail.is_empty() {
        segments.push(tail.to_string());
    }

    segments
}

/// Splits on `delimiter` with the default backtick escape and no limit.
pub fn split(delimiter: char, text: &str) -> Vec<String> {
    esc_split(delimiter, text, ESCAPE, 0)
}
