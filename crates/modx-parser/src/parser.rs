//! The resolution engine.
//!
//! [`Parser`] owns the placeholder store and the chunk source for one render
//! and resolves tags in content:
//!
//! ```rust
//! use modx_parser::{MemoryChunks, Parser};
//!
//! let chunks: MemoryChunks = [("greeting", "Hello, [[+name]]!")].into_iter().collect();
//! let mut parser = Parser::new(chunks);
//! parser.placeholders_mut().set("name", "world");
//!
//! assert_eq!(parser.process("[[$greeting]]").unwrap(), "Hello, world!");
//! ```
//!
//! # Passes
//!
//! [`Parser::process_element_tags`] works in passes. Each pass scans the
//! content for top-level tags, resolves each one, then substitutes every
//! result back into the content at once. If anything changed and the depth
//! budget allows, another pass runs over the new content, so a chunk that
//! introduces further tags is fully resolved.
//!
//! Per tag, in order:
//!
//! 1. `[[- ...]]` is a comment and becomes empty.
//! 2. `[[!...]]` is uncacheable. It is only resolved when the call allows
//!    uncacheable tags; otherwise it stays in place, or is removed when
//!    removing unprocessed tags before any uncacheable processing started.
//! 3. With a token allowlist, tags with other tokens are skipped.
//! 4. A tag identical to the tag whose content is being resolved is removed.
//! 5. Anything else is resolved by [`Parser::process_tag`]. A tag that
//!    yields nothing stays in place, or is removed when removing unprocessed
//!    tags.
//!
//! Resolving a tag whose content eventually contains the same tag again is
//! reported as [`ParseError::CyclicReference`](crate::ParseError).

use std::collections::HashMap;

use serde::Deserialize;
use tracing::{debug, trace};

use crate::chunks::ChunkSource;
use crate::context::ProcessingContext;
use crate::error::Result;
use crate::placeholders::{scalar_to_string, PlaceholderStore};
use crate::properties::Properties;
use crate::replace::replace_all;
use crate::scanner::collect_element_tags;
use crate::split::{esc_split, ESCAPE};
use crate::tag::{Tag, TagKind};

/// Default number of passes for a full resolution.
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Default limit on tags resolved inside one another.
pub const DEFAULT_MAX_NESTING: usize = DEFAULT_MAX_ITERATIONS * 10;

/// How a tag's own properties and the placeholder store combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyPrecedence {
    /// Store values override properties passed in the tag.
    #[default]
    StoreWins,
    /// Properties passed in the tag override store values.
    ExplicitWins,
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ParserOptions {
    /// Pass budget for chunk and placeholder content.
    pub max_iterations: usize,
    /// How deep chunks and placeholders may nest before resolution fails
    /// with [`ParseError::NestingTooDeep`](crate::ParseError).
    pub max_nesting: usize,
    pub precedence: PropertyPrecedence,
    /// Prefix retried when a placeholder name is not found as written.
    pub site_prefix: String,
    /// Opening tag delimiter.
    pub prefix: String,
    /// Closing tag delimiter.
    pub suffix: String,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_nesting: DEFAULT_MAX_NESTING,
            precedence: PropertyPrecedence::default(),
            site_prefix: "+".to_string(),
            prefix: "[[".to_string(),
            suffix: "]]".to_string(),
        }
    }
}

/// Options for one [`Parser::process_element_tags`] call.
///
/// ```rust
/// use modx_parser::ProcessOptions;
///
/// let opts = ProcessOptions::new()
///     .process_uncacheable(true)
///     .remove_unprocessed(true)
///     .max_depth(10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOptions {
    self_tag: String,
    process_uncacheable: bool,
    remove_unprocessed: bool,
    prefix: Option<String>,
    suffix: Option<String>,
    tokens: Vec<char>,
    max_depth: usize,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            self_tag: String::new(),
            process_uncacheable: false,
            remove_unprocessed: false,
            prefix: None,
            suffix: None,
            tokens: Vec::new(),
            max_depth: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl ProcessOptions {
    /// Up to [`DEFAULT_MAX_ITERATIONS`] passes that leave uncacheable and
    /// unresolved tags alone.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag text removed on sight, used to stop a tag including itself.
    pub fn self_tag(mut self, tag: impl Into<String>) -> Self {
        self.self_tag = tag.into();
        self
    }

    pub fn process_uncacheable(mut self, yes: bool) -> Self {
        self.process_uncacheable = yes;
        self
    }

    pub fn remove_unprocessed(mut self, yes: bool) -> Self {
        self.remove_unprocessed = yes;
        self
    }

    /// Overrides the opening delimiter for this call.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Overrides the closing delimiter for this call.
    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    /// Only process tags whose token is in `tokens`. Empty means all.
    pub fn tokens(mut self, tokens: impl IntoIterator<Item = char>) -> Self {
        self.tokens = tokens.into_iter().collect();
        self
    }

    /// Maximum number of passes. Zero and one both mean a single pass.
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}

/// What one scan looks for.
struct Scan<'a> {
    self_tag: &'a str,
    prefix: &'a str,
    suffix: &'a str,
    tokens: &'a [char],
}

/// The tag resolution engine.
pub struct Parser {
    options: ParserOptions,
    chunks: Box<dyn ChunkSource>,
    placeholders: PlaceholderStore,
    started_processing_uncacheable: bool,
    processing_element: bool,
}

impl std::fmt::Debug for Parser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser")
            .field("options", &self.options)
            .field("placeholders", &self.placeholders.len())
            .field("started_processing_uncacheable", &self.started_processing_uncacheable)
            .finish_non_exhaustive()
    }
}

impl Parser {
    /// Creates a parser with default options.
    pub fn new(chunks: impl ChunkSource + 'static) -> Self {
        Self::with_options(chunks, ParserOptions::default())
    }

    pub fn with_options(chunks: impl ChunkSource + 'static, options: ParserOptions) -> Self {
        Self {
            options,
            chunks: Box::new(chunks),
            placeholders: PlaceholderStore::new(),
            started_processing_uncacheable: false,
            processing_element: false,
        }
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    pub fn chunk_source(&self) -> &dyn ChunkSource {
        self.chunks.as_ref()
    }

    pub fn placeholders(&self) -> &PlaceholderStore {
        &self.placeholders
    }

    pub fn placeholders_mut(&mut self) -> &mut PlaceholderStore {
        &mut self.placeholders
    }

    /// True once any call has allowed uncacheable tags. Never reset.
    pub fn started_processing_uncacheable(&self) -> bool {
        self.started_processing_uncacheable
    }

    /// True once a tag has started processing. Callers clear it themselves.
    pub fn is_processing_element(&self) -> bool {
        self.processing_element
    }

    pub fn set_processing_element(&mut self, processing: bool) {
        self.processing_element = processing;
    }

    /// Looks up a placeholder as tag output.
    ///
    /// The name is tried as written, then with the site prefix in front.
    pub fn lookup_placeholder(&self, name: &str) -> Option<String> {
        if let Some(text) = self.placeholders.get(name).and_then(scalar_to_string) {
            return Some(text);
        }
        if self.options.site_prefix.is_empty() {
            return None;
        }
        self.placeholders
            .get(&format!("{}{}", self.options.site_prefix, name))
            .and_then(scalar_to_string)
    }

    /// Fully resolves `content`: uncacheable tags included, unresolved tags
    /// kept, up to `max_iterations` passes.
    pub fn process(&mut self, content: &str) -> Result<String> {
        let opts = ProcessOptions::new()
            .process_uncacheable(true)
            .max_depth(self.options.max_iterations);
        let (content, _) = self.process_element_tags(content, &opts)?;
        Ok(content)
    }

    /// Resolves the tags in `content`.
    ///
    /// Returns the new content and the number of tags whose output differed
    /// from their text, summed over all passes.
    pub fn process_element_tags(&mut self, content: &str, opts: &ProcessOptions) -> Result<(String, usize)> {
        let prefix = opts.prefix.clone().unwrap_or_else(|| self.options.prefix.clone());
        let suffix = opts.suffix.clone().unwrap_or_else(|| self.options.suffix.clone());
        let scan = Scan {
            self_tag: &opts.self_tag,
            prefix: &prefix,
            suffix: &suffix,
            tokens: &opts.tokens,
        };
        let ctx = ProcessingContext::new(opts.process_uncacheable, opts.remove_unprocessed, opts.max_depth)
            .with_max_nesting(self.options.max_nesting);

        let mut content = content.to_string();
        let processed = self.run_passes(&mut content, &scan, &ctx)?;
        Ok((content, processed))
    }

    /// Resolves one tag given its full text and its inner text.
    ///
    /// Returns `None` when the tag cannot be resolved.
    pub fn process_tag(&mut self, outer: &str, inner: &str, ctx: &ProcessingContext) -> Result<Option<String>> {
        let prefix = self.options.prefix.clone();
        let suffix = self.options.suffix.clone();
        self.resolve_tag(outer, inner, ctx, &prefix, &suffix)
    }

    fn resolve_tag(
        &mut self,
        outer: &str,
        inner: &str,
        ctx: &ProcessingContext,
        prefix: &str,
        suffix: &str,
    ) -> Result<Option<String>> {
        if inner.starts_with('-') {
            return Ok(Some(String::new()));
        }

        // Tags inside the tag itself (in property values or filter
        // arguments) are resolved first, in a single pass.
        let mut inner = inner.to_string();
        let nested = Scan {
            self_tag: outer,
            prefix,
            suffix,
            tokens: &[],
        };
        self.run_passes(&mut inner, &nested, &ctx.with_remove_unprocessed(false).with_max_depth(0))?;
        let rebuilt = format!("{prefix}{inner}{suffix}");

        let mut parts = esc_split('?', &inner, ESCAPE, 2).into_iter();
        let tag_name = parts.next().unwrap_or_default();
        let raw_properties = parts.next();

        let (tag_name, cacheable) = match tag_name.strip_prefix('!') {
            Some(_) if !ctx.process_uncacheable => return Ok(Some(rebuilt)),
            Some(rest) => (rest, false),
            None => (tag_name.as_str(), true),
        };

        let mut chars = tag_name.chars();
        let kind = TagKind::from_token(chars.next());
        let mut tag = Tag::new(kind, chars.as_str());
        tag.set_tag(rebuilt.clone());
        let explicit = match raw_properties {
            Some(raw) => tag.set_raw_properties(raw),
            None => Properties::new(),
        };

        // Content of a cacheable tag must not bake in uncacheable results.
        let child_ctx = ctx.with_uncacheable(ctx.process_uncacheable && !cacheable);
        let output = tag.process(self, &child_ctx, &explicit)?;

        trace!(outer, inner = %inner, output = ?output, "processed tag");

        Ok(match output {
            None if rebuilt != outer => Some(rebuilt),
            other => other,
        })
    }

    /// Resolves a chunk by name outside of any template.
    ///
    /// `properties` are visible to the chunk body as placeholders.
    pub fn get_chunk(&mut self, name: &str, properties: impl Into<Properties>) -> Result<String> {
        let properties = properties.into();
        let ctx = ProcessingContext::new(true, false, self.options.max_iterations)
            .with_max_nesting(self.options.max_nesting);
        if ctx.process_uncacheable {
            self.started_processing_uncacheable = true;
        }
        let mut tag = Tag::chunk(name);
        let output = tag.process(self, &ctx, &properties)?;
        Ok(output.unwrap_or_default())
    }

    /// Resolves the tags in a tag's content, with that tag as the self tag.
    pub(crate) fn resolve_nested(&mut self, self_tag: &str, content: &mut String, ctx: &ProcessingContext) -> Result<usize> {
        let prefix = self.options.prefix.clone();
        let suffix = self.options.suffix.clone();
        let scan = Scan {
            self_tag,
            prefix: &prefix,
            suffix: &suffix,
            tokens: &[],
        };
        self.run_passes(content, &scan, ctx)
    }

    fn run_passes(&mut self, content: &mut String, scan: &Scan<'_>, ctx: &ProcessingContext) -> Result<usize> {
        if ctx.process_uncacheable {
            self.started_processing_uncacheable = true;
        }

        let mut total = 0;
        let mut remaining = ctx.max_depth;
        let mut pass = 0;
        loop {
            pass += 1;
            remaining = remaining.saturating_sub(1);

            let (collected, processed) = self.single_pass(content, scan, ctx)?;
            total += processed;
            debug!(pass, collected, processed, depth = ctx.resolving().len(), "tag pass");

            if collected == 0 || processed == 0 || remaining == 0 {
                break;
            }
        }
        Ok(total)
    }

    /// One scan-resolve-substitute pass. Returns (tags collected, tags processed).
    fn single_pass(&mut self, content: &mut String, scan: &Scan<'_>, ctx: &ProcessingContext) -> Result<(usize, usize)> {
        let found: Vec<(String, String)> = collect_element_tags(content, scan.prefix, scan.suffix)
            .into_iter()
            .map(|m| (m.outer.to_string(), m.inner.to_string()))
            .collect();
        if found.is_empty() {
            return Ok((0, 0));
        }

        let mut processed = 0;
        let mut order: Vec<String> = Vec::new();
        let mut tag_map: HashMap<String, String> = HashMap::new();
        let mut record = |outer: &str, output: String| {
            if tag_map.insert(outer.to_string(), output).is_none() {
                order.push(outer.to_string());
            }
        };

        for (outer, inner) in &found {
            let (outer, inner) = (outer.as_str(), inner.as_str());
            if inner.starts_with('-') {
                record(outer, String::new());
                processed += 1;
                continue;
            }

            if inner.starts_with('!') && !ctx.process_uncacheable {
                if ctx.remove_unprocessed && !self.started_processing_uncacheable {
                    record(outer, String::new());
                    processed += 1;
                }
                continue;
            }

            let token = inner.strip_prefix('!').unwrap_or(inner).chars().next();
            if !scan.tokens.is_empty() && !token.is_some_and(|t| scan.tokens.contains(&t)) {
                continue;
            }

            if outer == scan.self_tag {
                record(outer, String::new());
                processed += 1;
                continue;
            }

            match self.resolve_tag(outer, inner, ctx, scan.prefix, scan.suffix)? {
                Some(output) => {
                    if output != outer {
                        processed += 1;
                    }
                    record(outer, output);
                }
                None if ctx.remove_unprocessed => {
                    record(outer, String::new());
                    processed += 1;
                }
                None => {}
            }
        }

        if !tag_map.is_empty() {
            let pairs: Vec<(&str, &str)> = order
                .iter()
                .filter_map(|outer| tag_map.get(outer).map(|output| (outer.as_str(), output.as_str())))
                .collect();
            *content = replace_all(content, &pairs);
        }

        Ok((found.len(), processed))
    }
}
