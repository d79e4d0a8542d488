use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Parser;
use modx_render::{Renderer, RendererConfig, Settings};
use serde_json::{Map, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "modx-render",
    version,
    about = "Render a MODX-style template with chunks and site settings",
    after_help = "Set RUST_LOG=modx_parser=debug to watch tag resolution passes."
)]
struct Args {
    /// Template to render, relative to the template directory
    template: String,

    /// YAML settings file with `renderer` and `site` sections
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Template directory (overrides the settings file)
    #[arg(long)]
    templates: Option<PathBuf>,

    /// Chunk directory (overrides the settings file)
    #[arg(long)]
    chunks: Option<PathBuf>,

    /// Prefix for site attribute placeholders (overrides the settings file)
    #[arg(long)]
    site_prefix: Option<String>,

    /// Render data as a JSON or YAML file
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Extra render data, applied after --data
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    set: Vec<(String, String)>,

    /// Write the output here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got `{raw}`")),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = Args::parse();
    let renderer = build_renderer(&args)?;

    let mut data = match &args.data {
        Some(path) => load_data(path)?,
        None => Map::new(),
    };
    for (key, value) in &args.set {
        data.insert(key.clone(), Value::String(value.clone()));
    }

    match &args.output {
        Some(path) => {
            let output = renderer.render(&args.template, &data)?;
            fs::write(path, output)
                .with_context(|| format!("writing {}", path.display()))?;
        }
        None => {
            let stdout = io::stdout();
            renderer.render_to(&mut stdout.lock(), &args.template, &data)?;
        }
    }
    Ok(())
}

fn build_renderer(args: &Args) -> anyhow::Result<Renderer> {
    let (config, site) = match &args.settings {
        Some(path) => {
            let settings = Settings::load(path)?;
            (Some(settings.renderer), settings.site)
        }
        None => (None, Value::Null),
    };

    let mut config = match (config, &args.templates, &args.chunks) {
        (Some(config), _, _) => config,
        (None, Some(templates), Some(chunks)) => RendererConfig::new(templates, chunks),
        (None, _, _) => bail!("pass --settings, or both --templates and --chunks"),
    };
    if let Some(templates) = &args.templates {
        config.template_path = templates.clone();
    }
    if let Some(chunks) = &args.chunks {
        config.chunk_path = chunks.clone();
    }
    if let Some(prefix) = &args.site_prefix {
        config.site_prefix = prefix.clone();
    }

    Ok(Renderer::new(config, site)?)
}

fn load_data(path: &Path) -> anyhow::Result<Map<String, Value>> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let value: Value = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&text)
            .with_context(|| format!("parsing {} as JSON", path.display()))?,
        _ => serde_yaml::from_str(&text)
            .with_context(|| format!("parsing {} as YAML", path.display()))?,
    };
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => bail!("{} must contain a mapping", path.display()),
    }
}
