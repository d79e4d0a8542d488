//! Error types for tag resolution.
//!
//! Most problems inside a tag are not errors at all: a malformed property
//! segment is dropped, an unknown filter is skipped and an unresolved
//! placeholder is left in place (or removed). [`ParseError`] covers the few
//! conditions that abort a whole resolution.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort tag resolution.
#[derive(Debug, Error)]
pub enum ParseError {
    /// A chunk tag names a chunk that does not exist.
    #[error("chunk not found: {name} (looked for {})", path.display())]
    ChunkNotFound {
        /// Chunk name as written in the tag
        name: String,
        /// Location that was searched
        path: PathBuf,
    },

    /// The chunk exists but could not be read as UTF-8 text.
    #[error("failed to read chunk {}: {source}", path.display())]
    ChunkRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A tag was reached again while its own content was still being resolved.
    #[error("cyclic tag reference: {tag} (via {})", chain.join(" -> "))]
    CyclicReference {
        /// The tag that closed the cycle
        tag: String,
        /// Tags being resolved when the cycle was detected, outermost first
        chain: Vec<String>,
    },

    /// Tags nested deeper than the configured limit.
    #[error("tag nesting exceeds {limit} levels at {tag}")]
    NestingTooDeep {
        /// The tag that would have gone one level too deep
        tag: String,
        limit: usize,
    },
}

impl ParseError {
    /// Create a chunk-not-found error.
    pub fn chunk_not_found(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::ChunkNotFound {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Result type for tag resolution.
pub type Result<T> = std::result::Result<T, ParseError>;
