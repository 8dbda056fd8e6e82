//! Immediate-mode backend: every pass clears the surface and replays the
//! whole scene as imperative draw calls.

use serde::Serialize;

use super::SceneRenderer;
use crate::scene::{Primitive, Scene, TextAnchor};

/// A fixed-resolution drawing surface with no retained structure.
pub trait RasterSurface {
    fn size(&self) -> (u32, u32);
    fn clear(&mut self);
    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: &str);
    fn stroke_line(&mut self, from: (f64, f64), to: (f64, f64), color: &str, width: f64);
    fn fill_polygon(&mut self, points: &[(f64, f64)], color: &str);
    fn fill_circle(&mut self, cx: f64, cy: f64, r: f64, color: &str);
    fn stroke_circle(&mut self, cx: f64, cy: f64, r: f64, color: &str, width: f64);
    #[allow(clippy::too_many_arguments)]
    fn fill_text(&mut self, x: f64, y: f64, text: &str, font_size: f64, font_family: &str, color: &str, anchor: TextAnchor);
}

/// One recorded surface call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum DrawCommand {
    Clear,
    FillRect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        color: String,
    },
    StrokeLine {
        from: (f64, f64),
        to: (f64, f64),
        color: String,
        width: f64,
    },
    FillPolygon {
        points: Vec<(f64, f64)>,
        color: String,
    },
    FillCircle {
        cx: f64,
        cy: f64,
        r: f64,
        color: String,
    },
    StrokeCircle {
        cx: f64,
        cy: f64,
        r: f64,
        color: String,
        width: f64,
    },
    FillText {
        x: f64,
        y: f64,
        text: String,
        font_size: f64,
        font_family: String,
        color: String,
        anchor: TextAnchor,
    },
}

/// Surface that only records what was asked of it. `clear` drops the
/// previous frame, so `commands()` is always exactly one pass.
#[derive(Debug, Clone, Default)]
pub struct CommandRecorder {
    width: u32,
    height: u32,
    commands: Vec<DrawCommand>,
}

impl CommandRecorder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            commands: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }
}

impl RasterSurface for CommandRecorder {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self) {
        self.commands.clear();
        self.commands.push(DrawCommand::Clear);
    }

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: &str) {
        self.commands.push(DrawCommand::FillRect {
            x,
            y,
            width,
            height,
            color: color.to_string(),
        });
    }

    fn stroke_line(&mut self, from: (f64, f64), to: (f64, f64), color: &str, width: f64) {
        self.commands.push(DrawCommand::StrokeLine {
            from,
            to,
            color: color.to_string(),
            width,
        });
    }

    fn fill_polygon(&mut self, points: &[(f64, f64)], color: &str) {
        self.commands.push(DrawCommand::FillPolygon {
            points: points.to_vec(),
            color: color.to_string(),
        });
    }

    fn fill_circle(&mut self, cx: f64, cy: f64, r: f64, color: &str) {
        self.commands.push(DrawCommand::FillCircle {
            cx,
            cy,
            r,
            color: color.to_string(),
        });
    }

    fn stroke_circle(&mut self, cx: f64, cy: f64, r: f64, color: &str, width: f64) {
        self.commands.push(DrawCommand::StrokeCircle {
            cx,
            cy,
            r,
            color: color.to_string(),
            width,
        });
    }

    fn fill_text(&mut self, x: f64, y: f64, text: &str, font_size: f64, font_family: &str, color: &str, anchor: TextAnchor) {
        self.commands.push(DrawCommand::FillText {
            x,
            y,
            text: text.to_string(),
            font_size,
            font_family: font_family.to_string(),
            color: color.to_string(),
            anchor,
        });
    }
}

/// Drives a [`RasterSurface`] from scenes.
#[derive(Debug)]
pub struct RasterRenderer<S> {
    surface: S,
    passes: usize,
}

impl<S: RasterSurface> RasterRenderer<S> {
    pub fn new(surface: S) -> Self {
        Self { surface, passes: 0 }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }

    /// Completed passes so far.
    pub fn passes(&self) -> usize {
        self.passes
    }

    fn draw(&mut self, scene: &Scene) {
        let surface = &mut self.surface;
        surface.clear();
        for item in &scene.items {
            match &item.primitive {
                Primitive::Rect {
                    x,
                    y,
                    width,
                    height,
                    fill,
                } => surface.fill_rect(*x, *y, *width, *height, fill),
                Primitive::Line {
                    x1,
                    y1,
                    x2,
                    y2,
                    color,
                    width,
                } => surface.stroke_line((*x1, *y1), (*x2, *y2), color, *width),
                Primitive::Polygon { points, fill } => surface.fill_polygon(points, fill),
                Primitive::Circle {
                    cx,
                    cy,
                    r,
                    fill,
                    stroke,
                    stroke_width,
                } => {
                    if let Some(fill) = fill {
                        surface.fill_circle(*cx, *cy, *r, fill);
                    }
                    if let Some(stroke) = stroke {
                        surface.stroke_circle(*cx, *cy, *r, stroke, *stroke_width);
                    }
                }
                Primitive::Label {
                    x,
                    y,
                    text,
                    font_size,
                    color,
                    anchor,
                } => surface.fill_text(*x, *y, text, *font_size, &scene.font_family, color, *anchor),
            }
        }
    }
}

impl<S: RasterSurface> SceneRenderer for RasterRenderer<S> {
    type Output = ();

    fn render(&mut self, scene: &Scene) {
        let _span = tracing::debug_span!("raster_pass", items = scene.items.len()).entered();
        let (width, height) = self.surface.size();
        if width as f64 != scene.width || height as f64 != scene.height {
            tracing::debug!(width, height, scene_width = scene.width, scene_height = scene.height, "scene and surface sizes differ");
        }
        self.draw(scene);
        self.passes += 1;
    }
}

/// Maps a recorded pass back to scene primitives. A fill immediately
/// followed by a stroke of the same circle is one circle primitive.
pub fn commands_to_primitives(commands: &[DrawCommand]) -> Vec<Primitive> {
    let mut primitives = Vec::new();
    let mut iter = commands.iter().peekable();
    while let Some(command) = iter.next() {
        let primitive = match command {
            DrawCommand::Clear => continue,
            DrawCommand::FillRect {
                x,
                y,
                width,
                height,
                color,
            } => Primitive::Rect {
                x: *x,
                y: *y,
                width: *width,
                height: *height,
                fill: color.clone(),
            },
            DrawCommand::StrokeLine {
                from,
                to,
                color,
                width,
            } => Primitive::Line {
                x1: from.0,
                y1: from.1,
                x2: to.0,
                y2: to.1,
                color: color.clone(),
                width: *width,
            },
            DrawCommand::FillPolygon { points, color } => Primitive::Polygon {
                points: points.clone(),
                fill: color.clone(),
            },
            DrawCommand::FillCircle { cx, cy, r, color } => {
                let paired = match iter.peek() {
                    Some(DrawCommand::StrokeCircle {
                        cx: sx,
                        cy: sy,
                        r: sr,
                        color,
                        width,
                    }) if sx == cx && sy == cy && sr == r => Some((color.clone(), *width)),
                    _ => None,
                };
                if paired.is_some() {
                    iter.next();
                }
                let (stroke, stroke_width) = match paired {
                    Some((color, width)) => (Some(color), width),
                    None => (None, 0.0),
                };
                Primitive::Circle {
                    cx: *cx,
                    cy: *cy,
                    r: *r,
                    fill: Some(color.clone()),
                    stroke,
                    stroke_width,
                }
            }
            DrawCommand::StrokeCircle {
                cx,
                cy,
                r,
                color,
                width,
            } => Primitive::Circle {
                cx: *cx,
                cy: *cy,
                r: *r,
                fill: None,
                stroke: Some(color.clone()),
                stroke_width: *width,
            },
            DrawCommand::FillText {
                x,
                y,
                text,
                font_size,
                color,
                anchor,
                ..
            } => Primitive::Label {
                x: *x,
                y: *y,
                text: text.clone(),
                font_size: *font_size,
                color: color.clone(),
                anchor: *anchor,
            },
        };
        primitives.push(primitive);
    }
    primitives
}

#[cfg(feature = "png")]
pub use pixmap::PixmapSurface;

#[cfg(feature = "png")]
mod pixmap {
    use resvg::tiny_skia::{
        Color, FillRule, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform,
    };
    use std::path::Path;

    use super::RasterSurface;
    use crate::render::glyphs;
    use crate::scene::TextAnchor;

    /// A tiny-skia pixmap. Text is filled from system font outlines;
    /// labels are skipped when no font can be found.
    pub struct PixmapSurface {
        pixmap: Pixmap,
    }

    impl PixmapSurface {
        pub fn new(width: u32, height: u32) -> anyhow::Result<Self> {
            let pixmap = Pixmap::new(width.max(1), height.max(1))
                .ok_or_else(|| anyhow::anyhow!("Failed to allocate {width}x{height} pixmap"))?;
            Ok(Self { pixmap })
        }

        pub fn pixmap(&self) -> &Pixmap {
            &self.pixmap
        }

        pub fn encode_png(&self) -> anyhow::Result<Vec<u8>> {
            Ok(self.pixmap.encode_png()?)
        }

        pub fn save_png(&self, path: &Path) -> anyhow::Result<()> {
            self.pixmap.save_png(path)?;
            Ok(())
        }

        fn paint(color: &str) -> Paint<'static> {
            let mut paint = Paint::default();
            paint.set_color(parse_color(color));
            paint.anti_alias = true;
            paint
        }
    }

    impl RasterSurface for PixmapSurface {
        fn size(&self) -> (u32, u32) {
            (self.pixmap.width(), self.pixmap.height())
        }

        fn clear(&mut self) {
            self.pixmap.fill(Color::TRANSPARENT);
        }

        fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64, color: &str) {
            let Some(rect) = Rect::from_xywh(x as f32, y as f32, width as f32, height as f32) else {
                return;
            };
            self.pixmap
                .fill_rect(rect, &Self::paint(color), Transform::identity(), None);
        }

        fn stroke_line(&mut self, from: (f64, f64), to: (f64, f64), color: &str, width: f64) {
            let mut pb = PathBuilder::new();
            pb.move_to(from.0 as f32, from.1 as f32);
            pb.line_to(to.0 as f32, to.1 as f32);
            let Some(path) = pb.finish() else {
                return;
            };
            let stroke = Stroke {
                width: width as f32,
                ..Stroke::default()
            };
            self.pixmap
                .stroke_path(&path, &Self::paint(color), &stroke, Transform::identity(), None);
        }

        fn fill_polygon(&mut self, points: &[(f64, f64)], color: &str) {
            let Some((first, rest)) = points.split_first() else {
                return;
            };
            let mut pb = PathBuilder::new();
            pb.move_to(first.0 as f32, first.1 as f32);
            for (x, y) in rest {
                pb.line_to(*x as f32, *y as f32);
            }
            pb.close();
            let Some(path) = pb.finish() else {
                return;
            };
            self.pixmap.fill_path(
                &path,
                &Self::paint(color),
                FillRule::Winding,
                Transform::identity(),
                None,
            );
        }

        fn fill_circle(&mut self, cx: f64, cy: f64, r: f64, color: &str) {
            let Some(path) = PathBuilder::from_circle(cx as f32, cy as f32, r as f32) else {
                return;
            };
            self.pixmap.fill_path(
                &path,
                &Self::paint(color),
                FillRule::Winding,
                Transform::identity(),
                None,
            );
        }

        fn stroke_circle(&mut self, cx: f64, cy: f64, r: f64, color: &str, width: f64) {
            let Some(path) = PathBuilder::from_circle(cx as f32, cy as f32, r as f32) else {
                return;
            };
            let stroke = Stroke {
                width: width as f32,
                ..Stroke::default()
            };
            self.pixmap
                .stroke_path(&path, &Self::paint(color), &stroke, Transform::identity(), None);
        }

        fn fill_text(&mut self, x: f64, y: f64, text: &str, font_size: f64, font_family: &str, color: &str, anchor: TextAnchor) {
            let Some(path) = glyphs::text_path(text, x as f32, y as f32, font_size as f32, font_family, anchor) else {
                tracing::debug!(text, font_family, "no outline for label");
                return;
            };
            self.pixmap.fill_path(
                &path,
                &Self::paint(color),
                FillRule::Winding,
                Transform::identity(),
                None,
            );
        }
    }

    /// `#RGB`, `#RRGGBB` and `#RRGGBBAA`; anything else paints black.
    pub(crate) fn parse_color(value: &str) -> Color {
        parse_hex(value.trim().trim_start_matches('#')).unwrap_or_else(|| {
            tracing::warn!(color = value, "unsupported color, painting black");
            Color::BLACK
        })
    }

    fn parse_hex(hex: &str) -> Option<Color> {
        if !hex.is_ascii() {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            3 => {
                let r = channel(&hex[0..1])? * 17;
                let g = channel(&hex[1..2])? * 17;
                let b = channel(&hex[2..3])? * 17;
                Some(Color::from_rgba8(r, g, b, 255))
            }
            6 | 8 => {
                let r = channel(&hex[0..2])?;
                let g = channel(&hex[2..4])?;
                let b = channel(&hex[4..6])?;
                let a = if hex.len() == 8 { channel(&hex[6..8])? } else { 255 };
                Some(Color::from_rgba8(r, g, b, a))
            }
            _ => None,
        }
    }

}
