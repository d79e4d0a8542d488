//! File-backed template rendering.

use std::fs;
use std::io::Write;
use std::path::Path;

use modx_parser::{ChunkDir, Parser, ParserOptions, ProcessOptions, DEFAULT_MAX_ITERATIONS};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::config::RendererConfig;
use crate::error::{RenderError, Result};

/// Data key reserved by the renderer.
pub const TEMPLATE_KEY: &str = "template";

/// Renders templates from a directory, resolving chunks from another.
///
/// Site attributes are exposed to templates under the site prefix, so with
/// the default `+` prefix the attribute `site_name` is available as
/// `[[++site_name]]` (and as `[[+site_name]]` when no render data shadows it).
/// Nested attributes flatten with `.`: `[[++site_css.sepia]]`.
///
/// Every render starts from a clean placeholder store; nothing from one
/// render leaks into the next.
#[derive(Debug, Clone)]
pub struct Renderer {
    config: RendererConfig,
    attributes: Map<String, Value>,
}

impl Renderer {
    /// Creates a renderer after checking that both directories are usable.
    ///
    /// `site` must be a mapping or null.
    pub fn new(config: RendererConfig, site: Value) -> Result<Self> {
        config.validate()?;
        let attributes = into_mapping(site, "site attributes")?;
        Ok(Self { config, attributes })
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Replaces all site attributes.
    pub fn set_attributes(&mut self, attributes: Map<String, Value>) {
        self.attributes = attributes;
    }

    pub fn add_attribute(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Renders `template` (a path relative to the template directory) with
    /// `data` as placeholders.
    ///
    /// `data` must serialize to a mapping (or nothing) and may not use the
    /// key `template`.
    pub fn render<T: Serialize + ?Sized>(&self, template: &str, data: &T) -> Result<String> {
        let data = serde_json::to_value(data).map_err(RenderError::Serialization)?;
        let data = into_mapping(data, "render data")?;
        if data.contains_key(TEMPLATE_KEY) {
            return Err(RenderError::DuplicateKey(TEMPLATE_KEY.to_string()));
        }

        let content = self.read_template(template)?;
        let mut parser = self.parser();
        parser
            .placeholders_mut()
            .to_placeholders(&Value::Object(data), "", ".");

        let opts = ProcessOptions::new()
            .process_uncacheable(true)
            .remove_unprocessed(false)
            .max_depth(DEFAULT_MAX_ITERATIONS);
        let (output, processed) = parser.process_element_tags(&content, &opts)?;

        info!(
            template,
            bytes = output.len(),
            processed,
            "rendered template"
        );
        Ok(output)
    }

    /// Renders into `writer` instead of returning the text.
    ///
    /// Nothing is written when rendering fails.
    pub fn render_to<W, T>(&self, writer: &mut W, template: &str, data: &T) -> Result<()>
    where
        W: Write + ?Sized,
        T: Serialize + ?Sized,
    {
        let output = self.render(template, data)?;
        writer
            .write_all(output.as_bytes())
            .and_then(|()| writer.flush())
            .map_err(RenderError::Write)
    }

    fn read_template(&self, template: &str) -> Result<String> {
        let path = self.config.template_path.join(template);
        if !is_inside(template) || !path.is_file() {
            return Err(RenderError::template_not_found(template, path));
        }
        debug!(path = %path.display(), "loading template");
        fs::read_to_string(&path).map_err(|source| RenderError::Io { path, source })
    }

    fn parser(&self) -> Parser {
        let options = ParserOptions {
            site_prefix: self.config.site_prefix.clone(),
            ..ParserOptions::default()
        };
        let mut parser = Parser::with_options(ChunkDir::new(self.config.chunk_path.clone()), options);
        let store = parser.placeholders_mut();
        for (key, value) in &self.attributes {
            let key = format!("{}{}", self.config.site_prefix, key);
            store.to_placeholder(&key, value, "", ".");
        }
        parser
    }
}

fn into_mapping(value: Value, what: &str) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(RenderError::config(format!(
            "{what} must be a mapping, got {}",
            kind_of(&other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

// Template names may use subdirectories but not climb out of the root.
fn is_inside(template: &str) -> bool {
    use std::path::Component;
    !template.is_empty()
        && Path::new(template)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
