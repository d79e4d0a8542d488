//! Simultaneous literal replacement.
//!
//! All search strings are matched against the original text in a single
//! left-to-right pass, longest match first. Replacement text is never
//! searched again, so a tag's output that happens to contain another tag's
//! text is left alone.
//!
//! Search strings are grouped by their first byte. Text between bytes that
//! can start a match is copied in one go, and at a candidate position only
//! the distinct lengths of that group are looked up.

use std::collections::HashMap;

/// Search strings sharing a first byte.
#[derive(Default)]
struct Bucket<'a> {
    /// Distinct search lengths, longest first.
    lengths: Vec<usize>,
    replacements: HashMap<&'a str, &'a str>,
}

impl<'a> Bucket<'a> {
    fn insert(&mut self, search: &'a str, replacement: &'a str) {
        if !self.lengths.contains(&search.len()) {
            self.lengths.push(search.len());
            self.lengths.sort_unstable_by(|a, b| b.cmp(a));
        }
        self.replacements.entry(search).or_insert(replacement);
    }

    /// The longest search string at the start of `rest`.
    fn longest_match(&self, rest: &str) -> Option<(usize, &'a str)> {
        self.lengths.iter().find_map(|&len| {
            let candidate = rest.get(..len)?;
            self.replacements.get(candidate).map(|r| (len, *r))
        })
    }
}

/// Replaces every occurrence of each search string with its replacement.
///
/// At each position the longest matching search string wins; among equal
/// lengths the first pair wins. Empty search strings are ignored.
///
/// ```rust
/// use modx_parser::replace::replace_all;
///
/// let out = replace_all("a ab b", &[("a", "b"), ("b", "a"), ("ab", "X")]);
/// assert_eq!(out, "b X a");
/// ```
pub fn replace_all<K, V>(text: &str, pairs: &[(K, V)]) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut buckets: HashMap<u8, Bucket<'_>> = HashMap::new();
    for (search, replacement) in pairs {
        let (search, replacement) = (search.as_ref(), replacement.as_ref());
        if let Some(&first) = search.as_bytes().first() {
            buckets.entry(first).or_default().insert(search, replacement);
        }
    }
    if buckets.is_empty() || text.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while !rest.is_empty() {
        // A first byte of a search string is never a continuation byte, so
        // this always lands on a char boundary.
        let Some(skip) = rest.bytes().position(|b| buckets.contains_key(&b)) else {
            out.push_str(rest);
            break;
        };
        out.push_str(&rest[..skip]);
        rest = &rest[skip..];

        let matched = buckets
            .get(&rest.as_bytes()[0])
            .and_then(|bucket| bucket.longest_match(rest));
        match matched {
            Some((len, replacement)) => {
                out.push_str(replacement);
                rest = &rest[len..];
            }
            None => {
                let width = rest.chars().next().map_or(1, char::len_utf8);
                out.push_str(&rest[..width]);
                rest = &rest[width..];
            }
        }
    }
    out
}
