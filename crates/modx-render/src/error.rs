//! Error types for rendering.

use std::fmt;
use std::io;
use std::path::PathBuf;

use modx_parser::ParseError;

/// What kind of file was missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundKind {
    Template,
    Chunk,
}

impl fmt::Display for NotFoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotFoundKind::Template => write!(f, "template"),
            NotFoundKind::Chunk => write!(f, "chunk"),
        }
    }
}

/// Errors that can occur while setting up a renderer or rendering.
///
/// A render either returns the whole output or one of these; there is no
/// partial output.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The renderer configuration is unusable.
    #[error("Invalid renderer configuration: {0}")]
    Config(String),

    /// A template or chunk file does not exist.
    #[error("The {kind} `{name}` does not exist (looked for {})", path.display())]
    NotFound {
        kind: NotFoundKind,
        name: String,
        path: PathBuf,
    },

    /// Render data uses a reserved key.
    #[error("Duplicate {0} key found in render data")]
    DuplicateKey(String),

    /// A tag includes itself through other tags.
    #[error("Cyclic tag reference: {tag} (via {})", chain.join(" -> "))]
    CyclicReference { tag: String, chain: Vec<String> },

    /// Tags nest deeper than the parser allows.
    #[error("Tag nesting exceeds {limit} levels at {tag}")]
    NestingTooDeep { tag: String, limit: usize },

    /// Reading a template or chunk failed.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing rendered output failed.
    #[error("Failed to write rendered output: {0}")]
    Write(#[source] io::Error),

    /// Render data could not be converted to placeholder values.
    #[error("Render data is not serializable: {0}")]
    Serialization(#[source] serde_json::Error),

    /// A settings file could not be parsed.
    #[error("Invalid settings file {}: {source}", path.display())]
    Settings {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

impl RenderError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a missing-template error.
    pub fn template_not_found(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::NotFound {
            kind: NotFoundKind::Template,
            name: name.into(),
            path: path.into(),
        }
    }
}

impl From<ParseError> for RenderError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::ChunkNotFound { name, path } => Self::NotFound {
                kind: NotFoundKind::Chunk,
                name,
                path,
            },
            ParseError::ChunkRead { path, source } => Self::Io { path, source },
            ParseError::CyclicReference { tag, chain } => Self::CyclicReference { tag, chain },
            ParseError::NestingTooDeep { tag, limit } => Self::NestingTooDeep { tag, limit },
        }
    }
}

/// Result type for rendering.
pub type Result<T> = std::result::Result<T, RenderError>;
