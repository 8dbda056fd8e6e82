//! Scene backends.
//!
//! Both backends consume the same [`Scene`]. The raster backend re-issues
//! every draw command on each pass; the vector backend keeps the previous
//! shape tree and reports only the patches a host has to apply.

#[cfg(feature = "png")]
mod glyphs;
pub mod raster;
pub mod vector;

use anyhow::Result;
use std::path::Path;

use crate::scene::Scene;

pub use raster::{CommandRecorder, DrawCommand, RasterRenderer, RasterSurface};
#[cfg(feature = "png")]
pub use raster::PixmapSurface;
pub use vector::{ShapeNode, ShapePatch, ShapeTree, VectorFrame, VectorRenderer, diff};

/// A backend that turns a scene into its own output form.
pub trait SceneRenderer {
    type Output;

    fn render(&mut self, scene: &Scene) -> Self::Output;
}

/// Convenience for one-shot SVG output of a scene.
pub fn render_svg(scene: &Scene) -> String {
    ShapeTree::from_scene(scene).to_svg()
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

/// Rasterizes an SVG document through resvg.
#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, font_family: &str) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.font_family = font_family
        .split(',')
        .next()
        .map(|family| family.trim().trim_matches('"').to_string())
        .unwrap_or_else(|| "sans-serif".to_string());
    opt.fontdb_mut().load_system_fonts();

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

pub(crate) fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
