//! Chunk sources.
//!
//! A chunk is a named fragment of template text, referenced as `[[$name]]`.
//! Where chunk text comes from is behind the [`ChunkSource`] trait:
//!
//! - [`ChunkDir`] reads `<root>/<name>.tpl` from disk on every lookup, so
//!   edits are visible on the next render.
//! - [`MemoryChunks`] holds chunks in a map, for tests and for hosts that
//!   keep their fragments elsewhere.
//!
//! ## Name Resolution
//!
//! | Tag | File |
//! |-----|------|
//! | `[[$header]]` | `<root>/header.tpl` |
//! | `[[$blog/card]]` | `<root>/blog/card.tpl` |
//! | `[[$../secret]]` | rejected, reported as not found |
//!
//! Names may contain subdirectories but never leave the root.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{ParseError, Result};

/// File extension of chunk files.
pub const CHUNK_EXTENSION: &str = "tpl";

/// Provides the raw text of chunks by name.
pub trait ChunkSource {
    /// Returns the unprocessed text of the named chunk.
    fn load(&self, name: &str) -> Result<String>;
}

impl<T: ChunkSource + ?Sized> ChunkSource for Box<T> {
    fn load(&self, name: &str) -> Result<String> {
        (**self).load(name)
    }
}

/// Chunks stored as `.tpl` files under a directory.
#[derive(Debug, Clone)]
pub struct ChunkDir {
    root: PathBuf,
}

impl ChunkDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The file a chunk name maps to, or `None` if the name would escape the
    /// root directory.
    pub fn path_for(&self, name: &str) -> Option<PathBuf> {
        let relative = Path::new(name);
        let plain = !name.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        plain.then(|| self.root.join(format!("{name}.{CHUNK_EXTENSION}")))
    }
}

impl ChunkSource for ChunkDir {
    fn load(&self, name: &str) -> Result<String> {
        let Some(path) = self.path_for(name) else {
            warn!(name, root = %self.root.display(), "rejected chunk name");
            return Err(ParseError::chunk_not_found(name, self.root.join(name)));
        };

        match fs::read_to_string(&path) {
            Ok(content) => {
                debug!(name, path = %path.display(), bytes = content.len(), "loaded chunk");
                Ok(content)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(ParseError::chunk_not_found(name, path))
            }
            Err(source) => Err(ParseError::ChunkRead { path, source }),
        }
    }
}

/// Chunks held in memory.
///
/// ```rust
/// use modx_parser::{ChunkSource, MemoryChunks};
///
/// let chunks: MemoryChunks = [("greeting", "Hello [[+name]]")].into_iter().collect();
/// assert_eq!(chunks.load("greeting").unwrap(), "Hello [[+name]]");
/// assert!(chunks.load("missing").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryChunks {
    chunks: HashMap<String, String>,
}

impl MemoryChunks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a chunk.
    pub fn insert(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.chunks.insert(name.into(), content.into());
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MemoryChunks {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut chunks = Self::new();
        for (name, content) in iter {
            chunks.insert(name, content);
        }
        chunks
    }
}

impl ChunkSource for MemoryChunks {
    fn load(&self, name: &str) -> Result<String> {
        self.chunks
            .get(name)
            .cloned()
            .ok_or_else(|| ParseError::chunk_not_found(name, format!("<memory>/{name}")))
    }
}
