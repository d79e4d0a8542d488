//! Renderer configuration and the settings file.
//!
//! A settings file is YAML with a `renderer` section and an optional `site`
//! section:
//!
//! ```yaml
//! renderer:
//!   template_path: ./templates
//!   chunk_path: ./chunks
//!   site_prefix: "+"
//! site:
//!   site_name: My Site
//!   site_css:
//!     sepia: color sepia
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::error::{RenderError, Result};

/// Prefix put in front of every site attribute key.
pub const DEFAULT_SITE_PREFIX: &str = "+";

fn default_site_prefix() -> String {
    DEFAULT_SITE_PREFIX.to_string()
}

/// Where templates and chunks live, and how site attributes are named.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RendererConfig {
    pub template_path: PathBuf,
    pub chunk_path: PathBuf,
    /// An empty prefix exposes site attributes under their bare names.
    #[serde(default = "default_site_prefix")]
    pub site_prefix: String,
}

impl RendererConfig {
    pub fn new(template_path: impl Into<PathBuf>, chunk_path: impl Into<PathBuf>) -> Self {
        Self {
            template_path: template_path.into(),
            chunk_path: chunk_path.into(),
            site_prefix: default_site_prefix(),
        }
    }

    pub fn site_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.site_prefix = prefix.into();
        self
    }

    /// Checks that both paths are readable directories.
    pub fn validate(&self) -> Result<()> {
        check_dir("template_path", &self.template_path)?;
        check_dir("chunk_path", &self.chunk_path)
    }
}

fn check_dir(field: &str, path: &Path) -> Result<()> {
    if !path.is_dir() {
        return Err(RenderError::config(format!(
            "{field} {} is not a directory",
            path.display()
        )));
    }
    fs::read_dir(path).map_err(|e| {
        RenderError::config(format!("{field} {} is not readable: {e}", path.display()))
    })?;
    Ok(())
}

/// Contents of a settings file.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub renderer: RendererConfig,
    #[serde(default)]
    pub site: Value,
}

impl Settings {
    /// Reads and parses a YAML settings file.
    ///
    /// Relative template and chunk paths are taken relative to the file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| RenderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut settings = Self::from_yaml(&text).map_err(|source| RenderError::Settings {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(base) = path.parent() {
            settings.renderer.template_path = base.join(&settings.renderer.template_path);
            settings.renderer.chunk_path = base.join(&settings.renderer.chunk_path);
        }
        Ok(settings)
    }

    pub fn from_yaml(text: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_site_prefix_defaults_to_plus() {
        let settings = Settings::from_yaml("renderer:\n  template_path: t\n  chunk_path: c\n").unwrap();
        assert_eq!(settings.renderer.site_prefix, "+");
        assert!(settings.site.is_null());
    }

    #[test]
    fn test_empty_site_prefix_is_kept() {
        let yaml = "renderer:\n  template_path: t\n  chunk_path: c\n  site_prefix: \"\"\nsite:\n  name: x\n";
        let settings = Settings::from_yaml(yaml).unwrap();
        assert_eq!(settings.renderer.site_prefix, "");
        assert_eq!(settings.site, json!({"name": "x"}));
    }

    #[test]
    fn test_missing_renderer_section_fails() {
        assert!(Settings::from_yaml("site:\n  name: x\n").is_err());
    }

    #[test]
    fn test_load_resolves_paths_against_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("settings.yml");
        fs::write(&file, "renderer:\n  template_path: templates\n  chunk_path: chunks\n").unwrap();

        let settings = Settings::load(&file).unwrap();
        assert_eq!(settings.renderer.template_path, dir.path().join("templates"));
        assert_eq!(settings.renderer.chunk_path, dir.path().join("chunks"));
    }

    #[test]
    fn test_load_reports_bad_yaml() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("settings.yml");
        fs::write(&file, "renderer: [unclosed").unwrap();
        assert!(matches!(Settings::load(&file), Err(RenderError::Settings { .. })));
    }

    #[test]
    fn test_validate_rejects_files_and_missing_dirs() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("not-a-dir");
        fs::write(&file, "").unwrap();

        let config = RendererConfig::new(&file, dir.path());
        assert!(matches!(config.validate(), Err(RenderError::Config(_))));

        let config = RendererConfig::new(dir.path(), dir.path().join("missing"));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("chunk_path"));

        assert!(RendererConfig::new(dir.path(), dir.path()).validate().is_ok());
    }
}
