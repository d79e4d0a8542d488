//! The tag model.
//!
//! A [`Tag`] is one occurrence of `[[...]]` being resolved. It is created by
//! the parser when it meets a tag, lives for that one resolution and is then
//! dropped. Its [`TagKind`] decides where raw content comes from:
//!
//! | Token | Kind | Content |
//! |-------|------|---------|
//! | `$` | [`TagKind::Chunk`] | the named chunk from the parser's [`ChunkSource`](crate::ChunkSource) |
//! | `+` or anything else | [`TagKind::Placeholder`] | the named value from the placeholder store |
//!
//! Processing a tag computes its effective properties, loads its content,
//! resolves any tags inside that content, and runs the filter chain from the
//! tag name over the result.

use tracing::trace;

use crate::context::ProcessingContext;
use crate::error::Result;
use crate::filter::FilterChain;
use crate::parser::{Parser, PropertyPrecedence};
use crate::placeholders::scalar_to_string;
use crate::properties::{parse_properties, Properties};

/// The variant of a tag, selected by its token character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    Chunk,
    Placeholder,
}

impl TagKind {
    /// Selects the kind for a token; unrecognized or missing tokens are
    /// placeholders.
    pub fn from_token(token: Option<char>) -> Self {
        match token {
            Some('$') => TagKind::Chunk,
            _ => TagKind::Placeholder,
        }
    }

    /// The canonical token of this kind.
    pub fn token(&self) -> char {
        match self {
            TagKind::Chunk => '$',
            TagKind::Placeholder => '+',
        }
    }

    /// Whether tags of this kind may keep a computed result. Neither kind
    /// does: both are resolved fresh on every pass.
    pub fn is_cacheable(&self) -> bool {
        false
    }
}

/// One tag being resolved.
#[derive(Debug, Clone)]
pub struct Tag {
    kind: TagKind,
    /// Lookup name, without token or filters.
    name: String,
    /// Name as written after the token, filters included.
    raw_name: String,
    filters: FilterChain,
    defaults: Properties,
    /// Property string passed after `?`, as written.
    raw_properties: Option<String>,
    properties: Properties,
    content: Option<String>,
    output: Option<String>,
    processed: bool,
    tag: Option<String>,
}

impl Tag {
    /// Creates a tag from its name as written after the token.
    ///
    /// A filter suffix (`name:is=`x`:then=`y``) is split off here.
    pub fn new(kind: TagKind, raw_name: impl Into<String>) -> Self {
        let raw_name = raw_name.into();
        let (name, filters) = FilterChain::split_name(&raw_name);
        Self {
            kind,
            name: name.to_string(),
            filters,
            raw_name,
            defaults: Properties::new(),
            raw_properties: None,
            properties: Properties::new(),
            content: None,
            output: None,
            processed: false,
            tag: None,
        }
    }

    pub fn chunk(name: impl Into<String>) -> Self {
        Self::new(TagKind::Chunk, name)
    }

    pub fn placeholder(name: impl Into<String>) -> Self {
        Self::new(TagKind::Placeholder, name)
    }

    pub fn kind(&self) -> TagKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn filters(&self) -> &FilterChain {
        &self.filters
    }

    /// Default properties set on the tag itself.
    pub fn defaults(&self) -> &Properties {
        &self.defaults
    }

    pub fn raw_properties(&self) -> Option<&str> {
        self.raw_properties.as_deref()
    }

    /// Records the property string passed with the tag and returns its
    /// parsed form.
    pub fn set_raw_properties(&mut self, raw: impl Into<String>) -> Properties {
        let raw = raw.into();
        let parsed = parse_properties(&raw);
        self.raw_properties = Some(raw);
        parsed
    }

    /// Effective values of the tag's own properties (defaults and explicit)
    /// from the last [`process`](Tag::process) call.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Raw content loaded by the last [`process`](Tag::process) call.
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    pub fn is_processed(&self) -> bool {
        self.processed
    }

    pub fn is_cacheable(&self) -> bool {
        self.kind.is_cacheable()
    }

    /// Has no effect: chunk and placeholder tags are never cacheable.
    pub fn set_cacheable(&mut self, _cacheable: bool) {}

    /// Sets the default properties of this tag.
    ///
    /// Accepts anything convertible to [`Properties`], including a property
    /// string. With `merge`, the new values are layered over the existing
    /// defaults instead of replacing them.
    pub fn set_properties(&mut self, properties: impl Into<Properties>, merge: bool) {
        let properties = properties.into();
        if merge {
            self.defaults.merge(&properties);
        } else {
            self.defaults = properties;
        }
    }

    /// Overrides the tag text used to recognise self-reference.
    pub fn set_tag(&mut self, tag: impl Into<String>) {
        self.tag = Some(tag.into());
    }

    /// The tag as text.
    ///
    /// Unless set explicitly, this is built from the token, the name as
    /// written and the default properties: `[[$card?title=`Hi`]]`.
    pub fn tag_string(&self) -> String {
        if let Some(tag) = &self.tag {
            return tag.clone();
        }
        let mut tag = format!("[[{}{}", self.kind.token(), self.raw_name);
        if !self.defaults.is_empty() {
            tag.push('?');
            tag.push_str(&self.defaults.to_property_string());
        }
        tag.push_str("]]");
        tag
    }

    /// Resolves the tag.
    ///
    /// `explicit` are the properties passed in the tag (or by the caller).
    /// Returns `None` when a placeholder has no value and no filters to
    /// supply one.
    pub fn process(
        &mut self,
        parser: &mut Parser,
        ctx: &ProcessingContext,
        explicit: &Properties,
    ) -> Result<Option<String>> {
        parser.set_processing_element(true);

        let mut own = self.defaults.clone();
        own.merge(explicit);
        self.properties = effective_properties(&own, parser);

        if self.tag.is_none() {
            self.tag = Some(self.tag_string());
        }
        if self.processed {
            return Ok(self.output.clone());
        }

        self.content = self.load_content(parser)?;
        let mut output = match self.content.clone() {
            Some(content) if !content.is_empty() => Some(self.resolve_content(parser, ctx, content)?),
            other => other,
        };

        if !self.filters.is_empty() {
            output = Some(self.filters.apply(output.as_deref().unwrap_or_default()));
        }

        trace!(
            kind = ?self.kind,
            name = %self.name,
            resolved = output.is_some(),
            "tag processed"
        );

        if output.is_some() || parser.started_processing_uncacheable() {
            self.processed = true;
        }
        self.output = output;
        Ok(self.output.clone())
    }

    fn load_content(&self, parser: &Parser) -> Result<Option<String>> {
        match self.kind {
            TagKind::Chunk => parser.chunk_source().load(&self.name).map(Some),
            TagKind::Placeholder => Ok(parser.lookup_placeholder(&self.name)),
        }
    }

    /// Resolves the tags inside this tag's content.
    ///
    /// Chunk properties are visible as placeholders while the chunk body is
    /// resolved, and only then.
    fn resolve_content(
        &self,
        parser: &mut Parser,
        ctx: &ProcessingContext,
        mut content: String,
    ) -> Result<String> {
        let self_tag = self.tag_string();
        let nesting = match ctx.max_nesting {
            0 => parser.options().max_nesting,
            limit => limit,
        };
        let inner_ctx = ctx
            .with_max_nesting(nesting)
            .enter(&self_tag)?
            .with_max_depth(parser.options().max_iterations);

        let scope = match self.kind {
            TagKind::Chunk => Some(parser.placeholders_mut().push_properties(&self.properties)),
            TagKind::Placeholder => None,
        };

        let result = parser.resolve_nested(&self_tag, &mut content, &inner_ctx);
        if let Some(scope) = scope {
            parser.placeholders_mut().restore(scope);
        }
        result?;
        Ok(content)
    }
}

/// Values of the tag's own properties after layering the placeholder store
/// according to the parser's precedence policy.
///
/// Store keys the tag does not name are already visible as placeholders, so
/// only the tag's own keys are looked up.
fn effective_properties(own: &Properties, parser: &Parser) -> Properties {
    let store = parser.placeholders();
    own.iter()
        .map(|(key, value)| {
            let stored = match parser.options().precedence {
                PropertyPrecedence::StoreWins => store.get(key).and_then(scalar_to_string),
                PropertyPrecedence::ExplicitWins => None,
            };
            (key.to_string(), stored.unwrap_or_else(|| value.to_string()))
        })
        .collect()
}
