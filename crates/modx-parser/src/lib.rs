//! # modx-parser
//!
//! A resolution engine for MODX-style template tags.
//!
//! Content refers to two kinds of things with `[[...]]` tags:
//!
//! - **Chunks**, `[[$name]]`: named fragments of template text, loaded through
//!   a [`ChunkSource`].
//! - **Placeholders**, `[[+name]]`: values in the [`PlaceholderStore`].
//!
//! Tags nest. A chunk may contain tags, a tag's properties may contain tags,
//! and everything is resolved inside out until nothing changes or the pass
//! budget runs out.
//!
//! ## Quick Start
//!
//! ```rust
//! use modx_parser::{MemoryChunks, Parser};
//! use serde_json::json;
//!
//! let chunks: MemoryChunks = [
//!     ("card", "<h2>[[+title]]</h2>[[+body:default=`(empty)`]]"),
//! ].into_iter().collect();
//!
//! let mut parser = Parser::new(chunks);
//! parser.placeholders_mut().to_placeholders(&json!({"site": {"name": "Sepia"}}), "", ".");
//!
//! let out = parser.process("[[+site.name]]: [[$card? &title=`Welcome`]]").unwrap();
//! assert_eq!(out, "Sepia: <h2>Welcome</h2>(empty)");
//! ```
//!
//! ## Tag Syntax
//!
//! ```text
//! [[$chunk]]                          chunk
//! [[+key]]                            placeholder (also any other token)
//! [[$chunk? &a=`1` &b=`two`]]         properties, visible to the chunk as [[+a]]
//! [[+key:is=`x`:then=`y`:else=`z`]]   filters, see FilterChain
//! [[!+key]]                           uncacheable: only resolved when allowed
//! [[- a comment]]                     removed
//! ```
//!
//! Backticks quote property values and filter arguments; a doubled backtick
//! is a literal one.
//!
//! ## Errors
//!
//! Resolution fails only for a missing or unreadable chunk, a tag that
//! (indirectly) includes itself, or nesting deeper than
//! [`ParserOptions::max_nesting`]; see [`ParseError`]. Everything else, from a
//! malformed property to an unknown filter, degrades quietly.

mod chunks;
mod context;
mod error;
mod filter;
mod parser;
mod placeholders;
mod properties;
pub mod replace;
pub mod scanner;
pub mod split;
mod tag;

// Re-export public API
pub use chunks::{ChunkDir, ChunkSource, MemoryChunks, CHUNK_EXTENSION};
pub use context::ProcessingContext;
pub use error::{ParseError, Result};
pub use filter::{Filter, FilterArgs, FilterChain, FilterMethod, FilterStep};
pub use parser::{
    Parser, ParserOptions, ProcessOptions, PropertyPrecedence, DEFAULT_MAX_ITERATIONS,
    DEFAULT_MAX_NESTING,
};
pub use placeholders::{scalar_to_string, PlaceholderScope, PlaceholderStore, DEFAULT_SEPARATOR};
pub use properties::{
    parse_properties, parse_property_definitions, FieldType, Properties, PropertyDefinition,
    PropertyOption,
};
pub use scanner::{collect_element_tags, TagMatch};
pub use split::esc_split;
pub use tag::{Tag, TagKind};
