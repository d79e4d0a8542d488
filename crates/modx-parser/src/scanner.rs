//! Delimiter scanner.
//!
//! Finds the outermost `[[...]]` spans in a piece of content. Nesting is
//! handled by counting: every additional opening delimiter seen before a
//! closing one pushes the close position out by one more closing delimiter.
//! The delimiters are uniform, so a depth counter is all that is needed.
//!
//! ```rust
//! use modx_parser::scanner::collect_element_tags;
//!
//! let tags = collect_element_tags("a [[$outer? &x=`[[+y]]`]] b [[+z]]", "[[", "]]");
//! let outers: Vec<_> = tags.iter().map(|t| t.outer).collect();
//! assert_eq!(outers, vec!["[[$outer? &x=`[[+y]]`]]", "[[+z]]"]);
//! assert_eq!(tags[0].inner, "$outer? &x=`[[+y]]`");
//! ```
//!
//! Only the outermost spans are returned; inner tags are picked up when the
//! engine resolves the outer one.

/// One tag found by the scanner.
///
/// Both strings borrow from the scanned content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagMatch<'a> {
    /// The full tag including its delimiters.
    pub outer: &'a str,
    /// The text between the delimiters.
    pub inner: &'a str,
    /// Byte offset of `outer` in the scanned content.
    pub start: usize,
}

impl TagMatch<'_> {
    /// Byte offset just past the closing delimiter.
    pub fn end(&self) -> usize {
        self.start + self.outer.len()
    }
}

/// Collects every top-level tag in `content`, in order of appearance.
///
/// Content without an opening delimiter, or whose last closing delimiter
/// comes before the first opening one, yields no tags. An opening delimiter
/// with no closing delimiter after it ends the scan.
pub fn collect_element_tags<'a>(content: &'a str, prefix: &str, suffix: &str) -> Vec<TagMatch<'a>> {
    let mut matches = Vec::new();
    if prefix.is_empty() || suffix.is_empty() {
        return matches;
    }

    let find = |needle: &str, from: usize| -> Option<usize> {
        content.get(from..).and_then(|rest| rest.find(needle)).map(|i| i + from)
    };

    let Some(mut start) = content.find(prefix) else {
        return matches;
    };
    let Some(last_suffix) = content.rfind(suffix) else {
        return matches;
    };
    let stop = last_suffix + suffix.len();

    while start < stop {
        let mut offset = start + prefix.len();
        let Some(mut close) = find(suffix, offset) else {
            break;
        };

        // Opens seen before the current close each need one more close.
        let mut open_count = 0usize;
        let mut next_open = find(prefix, offset);
        while let Some(open) = next_open.filter(|&open| open < close) {
            open_count += 1;
            offset = open + prefix.len();
            next_open = find(prefix, offset);
        }

        let mut next_close = find(suffix, close + suffix.len());
        while open_count > 0 {
            let Some(candidate) = next_close else {
                break;
            };
            open_count -= 1;
            close = candidate;

            next_open = find(prefix, offset);
            while let Some(open) = next_open.filter(|&open| open < close) {
                open_count += 1;
                offset = open + prefix.len();
                next_open = find(prefix, offset);
            }
            next_close = find(suffix, close + suffix.len());
        }

        let end = close + suffix.len();
        matches.push(TagMatch {
            outer: &content[start..end],
            inner: &content[start + prefix.len()..close],
            start,
        });

        match next_open.filter(|&open| open >= end).or_else(|| find(prefix, end)) {
            Some(open) => start = open,
            None => break,
        }
    }

    matches
}
