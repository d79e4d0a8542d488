//! # modx-render
//!
//! Renders MODX-style templates from disk.
//!
//! A [`Renderer`] reads templates from one directory and chunks (`name.tpl`)
//! from another, exposes a set of site attributes to every template, and
//! resolves tags with [`modx_parser`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use modx_render::{Renderer, RendererConfig};
//! use serde_json::json;
//!
//! let config = RendererConfig::new("templates", "chunks");
//! let renderer = Renderer::new(config, json!({"site_name": "Sepia"}))?;
//!
//! // templates/page.tpl: "<title>[[++site_name]]</title>[[+body]]"
//! let html = renderer.render("page.tpl", &json!({"body": "Hello"}))?;
//! # Ok::<(), modx_render::RenderError>(())
//! ```
//!
//! ## Settings Files
//!
//! [`Settings::load`] reads a YAML file with a `renderer` section (a
//! [`RendererConfig`]) and a `site` section (the site attributes). The
//! `modx-render` binary is a thin command line wrapper around it.

mod config;
mod error;
mod renderer;

// Re-export public API
pub use config::{RendererConfig, Settings, DEFAULT_SITE_PREFIX};
pub use error::{NotFoundKind, RenderError, Result};
pub use renderer::{Renderer, TEMPLATE_KEY};

pub use modx_parser;
