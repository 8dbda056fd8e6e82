use crate::config::{Config, load_config};
use crate::inspector::Inspector;
use crate::render::{render_svg, write_output_svg};
use crate::scene::Scene;
use crate::scene_dump::{SceneDump, write_scene_dump};
use crate::theme::Theme;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tourview", version, about = "Render solved routing tours to SVG or PNG")]
pub struct Args {
    /// Solution JSON file or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file (svg/png). Defaults to stdout for SVG if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Drawing backend
    #[arg(short = 'b', long = "backend", value_enum, default_value = "vector")]
    pub backend: Backend,

    /// Config JSON file (theme name, themeVariables, scene and render sections)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Width
    #[arg(short = 'w', long = "width")]
    pub width: Option<u32>,

    /// Height
    #[arg(short = 'H', long = "height")]
    pub height: Option<u32>,

    /// Padding around the projected points
    #[arg(short = 'p', long = "padding")]
    pub padding: Option<u32>,

    /// Built-in theme, overriding the config file
    #[arg(long = "theme", value_enum)]
    pub theme: Option<ThemeName>,

    /// Highlight an original point (upload order)
    #[arg(long = "select-original", conflicts_with = "select_route")]
    pub select_original: Option<usize>,

    /// Highlight a route stop (visiting order)
    #[arg(long = "select-route")]
    pub select_route: Option<usize>,

    /// Write the scene and point table as JSON
    #[arg(long = "dump-scene")]
    pub dump_scene: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Svg,
    Png,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Retained shape tree, serialized as SVG
    Vector,
    /// Immediate-mode painting into a pixmap
    Raster,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeName {
    Light,
    Dark,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing();
    let mut config = load_config(args.config.as_deref())?;
    apply_overrides(&mut config, &args);

    let input = read_input(args.input.as_deref())?;
    let mut inspector = Inspector::new(config.render.viewport());
    let issues = inspector
        .load_json(&input)
        .context("Failed to parse solution")?;
    if !issues.is_empty() {
        tracing::warn!(count = issues.len(), "solution loaded with problems");
    }

    let update = match (args.select_original, args.select_route) {
        (Some(idx), _) => Some(inspector.select_original_point(Some(idx))),
        (None, Some(idx)) => Some(inspector.select_route_point(Some(idx))),
        (None, None) => None,
    };
    if let Some(issue) = update.and_then(|update| update.issue) {
        tracing::warn!(%issue, "ignoring selection");
    }

    let outcome = inspector.render(&config.theme, &config.scene);
    for issue in &outcome.issues {
        tracing::warn!(%issue, "rendered placeholder");
    }

    if let Some(path) = args.dump_scene.as_deref() {
        let dump = SceneDump::new(
            &inspector.solution().id,
            inspector.solution().total_distance,
            &outcome.scene,
            inspector.metrics(),
            inspector.selection(),
            inspector.linked_selection(),
            inspector.table_rows(),
        );
        write_scene_dump(path, &dump)?;
    }

    match args.output_format {
        OutputFormat::Svg => {
            if args.backend == Backend::Raster {
                return Err(anyhow::anyhow!("The raster backend only produces png output"));
            }
            write_output_svg(&render_svg(&outcome.scene), args.output.as_deref())?;
        }
        OutputFormat::Png => {
            let output = ensure_output(&args.output, "png")?;
            write_png(&outcome.scene, args.backend, &output, &config.theme)?;
        }
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("TOURVIEW_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(width) = args.width {
        config.render.width = width;
    }
    if let Some(height) = args.height {
        config.render.height = height;
    }
    if let Some(padding) = args.padding {
        config.render.padding = padding;
    }
    match args.theme {
        Some(ThemeName::Light) => config.theme = Theme::light(),
        Some(ThemeName::Dark) => config.theme = Theme::dark(),
        None => {}
    }
}

#[cfg(feature = "png")]
fn write_png(scene: &Scene, backend: Backend, output: &Path, theme: &Theme) -> Result<()> {
    use crate::render::{PixmapSurface, RasterRenderer, SceneRenderer, write_output_png};

    match backend {
        Backend::Vector => write_output_png(&render_svg(scene), output, &theme.font_family),
        Backend::Raster => {
            let surface = PixmapSurface::new(scene.width as u32, scene.height as u32)?;
            let mut renderer = RasterRenderer::new(surface);
            renderer.render(scene);
            renderer.into_surface().save_png(output)
        }
    }
}

#[cfg(not(feature = "png"))]
fn write_png(_scene: &Scene, _backend: Backend, _output: &Path, _theme: &Theme) -> Result<()> {
    Err(anyhow::anyhow!("PNG output requires the `png` feature"))
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()));
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}
