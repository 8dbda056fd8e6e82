//! Renderer-agnostic scene description.
//!
//! [`build_scene`] turns projected geometry, route metrics and the active
//! selection into an ordered list of typed primitives (back to front).
//! Both backends consume this list and differ only in how a primitive
//! becomes output.

use serde::Serialize;

use crate::config::SceneConfig;
use crate::metrics::RouteMetrics;
use crate::projection::{Bounds, ProjectedPoint, Viewport};
use crate::selection::Selection;
use crate::theme::Theme;

/// Grid lines closer than this are drawn at this spacing.
pub const MIN_GRID_SPACING: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Layer {
    Background,
    Grid,
    Segments,
    Markers,
    Highlights,
    Captions,
}

impl Layer {
    pub const ALL: [Layer; 6] = [
        Layer::Background,
        Layer::Grid,
        Layer::Segments,
        Layer::Markers,
        Layer::Highlights,
        Layer::Captions,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Layer::Background => "background",
            Layer::Grid => "grid",
            Layer::Segments => "segments",
            Layer::Markers => "markers",
            Layer::Highlights => "highlights",
            Layer::Captions => "captions",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TextAnchor {
    Start,
    Middle,
    End,
}

impl TextAnchor {
    pub fn as_svg(self) -> &'static str {
        match self {
            TextAnchor::Start => "start",
            TextAnchor::Middle => "middle",
            TextAnchor::End => "end",
        }
    }

    pub fn from_svg(value: &str) -> Option<Self> {
        match value {
            "start" => Some(TextAnchor::Start),
            "middle" => Some(TextAnchor::Middle),
            "end" => Some(TextAnchor::End),
            _ => None,
        }
    }
}

/// One typed draw primitive, in viewport pixels.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Primitive {
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        fill: String,
    },
    Line {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        color: String,
        width: f64,
    },
    Polygon {
        points: Vec<(f64, f64)>,
        fill: String,
    },
    Circle {
        cx: f64,
        cy: f64,
        r: f64,
        fill: Option<String>,
        stroke: Option<String>,
        stroke_width: f64,
    },
    Label {
        x: f64,
        y: f64,
        text: String,
        font_size: f64,
        color: String,
        anchor: TextAnchor,
    },
}

/// A primitive with the stable key a retained host diffs on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneItem {
    pub key: String,
    pub layer: Layer,
    pub primitive: Primitive,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub width: f64,
    pub height: f64,
    pub font_family: String,
    pub items: Vec<SceneItem>,
}

impl Scene {
    pub fn primitives(&self) -> Vec<Primitive> {
        self.items.iter().map(|item| item.primitive.clone()).collect()
    }

    pub fn layer(&self, layer: Layer) -> impl Iterator<Item = &SceneItem> {
        self.items.iter().filter(move |item| item.layer == layer)
    }

    pub fn item(&self, key: &str) -> Option<&SceneItem> {
        self.items.iter().find(|item| item.key == key)
    }

    pub fn is_placeholder(&self) -> bool {
        self.item(PLACEHOLDER_KEY).is_some()
    }
}

pub const PLACEHOLDER_KEY: &str = "placeholder";
pub const HIGHLIGHT_KEY: &str = "highlight";

/// Everything the builder reads besides selection, theme and config.
#[derive(Debug, Clone, Copy)]
pub struct SceneInput<'a> {
    pub viewport: Viewport,
    /// Original points, upload order.
    pub points: &'a [ProjectedPoint],
    /// Route stops, visiting order.
    pub route: &'a [ProjectedPoint],
    /// Problem-space distances of `route`.
    pub metrics: &'a RouteMetrics,
    /// Original index of the tour origin, when known.
    pub origin: Option<usize>,
    /// Problem-space extent, for the axis captions.
    pub bounds: Option<Bounds>,
}

struct SceneBuilder<'a> {
    theme: &'a Theme,
    config: &'a SceneConfig,
    items: Vec<SceneItem>,
}

impl SceneBuilder<'_> {
    fn push(&mut self, key: impl Into<String>, layer: Layer, primitive: Primitive) {
        self.items.push(SceneItem {
            key: key.into(),
            layer,
            primitive,
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn label(&mut self, key: String, layer: Layer, x: f64, y: f64, text: String, font_size: f64, color: &str, anchor: TextAnchor) {
        self.push(
            key,
            layer,
            Primitive::Label {
                x,
                y,
                text,
                font_size,
                color: color.to_string(),
                anchor,
            },
        );
    }

    fn background(&mut self, width: f64, height: f64) {
        self.push(
            "background",
            Layer::Background,
            Primitive::Rect {
                x: 0.0,
                y: 0.0,
                width,
                height,
                fill: self.theme.background.clone(),
            },
        );
    }

    fn grid(&mut self, width: f64, height: f64) {
        if self.config.grid_spacing <= 0.0 || !self.config.grid_spacing.is_finite() {
            return;
        }
        let spacing = self.config.grid_spacing.max(MIN_GRID_SPACING);
        let theme = self.theme;
        let color = &theme.grid_color;
        let line_width = self.config.grid_width;
        let mut lines = Vec::new();
        let mut idx = 1;
        while idx as f64 * spacing < width {
            let x = idx as f64 * spacing;
            lines.push((format!("grid-v-{idx}"), x, 0.0, x, height));
            idx += 1;
        }
        idx = 1;
        while idx as f64 * spacing < height {
            let y = idx as f64 * spacing;
            lines.push((format!("grid-h-{idx}"), 0.0, y, width, y));
            idx += 1;
        }
        for (key, x1, y1, x2, y2) in lines {
            self.push(
                key,
                Layer::Grid,
                Primitive::Line {
                    x1,
                    y1,
                    x2,
                    y2,
                    color: color.clone(),
                    width: line_width,
                },
            );
        }
    }

    fn segments(&mut self, route: &[ProjectedPoint], metrics: &RouteMetrics) {
        let len = route.len();
        if len < 2 {
            return;
        }
        for idx in 0..len {
            let from = route[idx];
            let to = route[(idx + 1) % len];
            let start_radius = if idx == 0 {
                self.config.origin_radius
            } else {
                self.config.marker_radius
            };
            let end_radius = if (idx + 1) % len == 0 {
                self.config.origin_radius
            } else {
                self.config.marker_radius
            };
            self.segment(idx, from, to, start_radius, end_radius, metrics.segment(idx).unwrap_or(0.0));
        }
    }

    fn segment(&mut self, idx: usize, from: ProjectedPoint, to: ProjectedPoint, start_radius: f64, end_radius: f64, distance: f64) {
        let dx = to.x - from.x;
        let dy = to.y - from.y;
        let length = dx.hypot(dy);
        let (ux, uy) = if length > 0.0 {
            (dx / length, dy / length)
        } else {
            (0.0, 0.0)
        };
        let route_color = self.theme.route_color.clone();
        let width = self.config.route_width;

        let arrow_length = self.config.arrow_length;
        if length > start_radius + end_radius + arrow_length {
            let (sx, sy) = (from.x + ux * start_radius, from.y + uy * start_radius);
            let (tip_x, tip_y) = (to.x - ux * end_radius, to.y - uy * end_radius);
            let (base_x, base_y) = (tip_x - ux * arrow_length, tip_y - uy * arrow_length);
            self.push(
                format!("segment-{idx}-line"),
                Layer::Segments,
                Primitive::Line {
                    x1: sx,
                    y1: sy,
                    x2: base_x,
                    y2: base_y,
                    color: route_color,
                    width,
                },
            );
            let half = self.config.arrow_width / 2.0;
            let (nx, ny) = (-uy, ux);
            self.push(
                format!("segment-{idx}-arrow"),
                Layer::Segments,
                Primitive::Polygon {
                    points: vec![
                        (tip_x, tip_y),
                        (base_x + nx * half, base_y + ny * half),
                        (base_x - nx * half, base_y - ny * half),
                    ],
                    fill: self.theme.arrow_color.clone(),
                },
            );
        } else if length > 0.0 {
            self.push(
                format!("segment-{idx}-line"),
                Layer::Segments,
                Primitive::Line {
                    x1: from.x,
                    y1: from.y,
                    x2: to.x,
                    y2: to.y,
                    color: route_color,
                    width,
                },
            );
        }

        // Labels sit on opposite sides of the segment, off its midpoint.
        let (nx, ny) = if length > 0.0 { (-uy, ux) } else { (0.0, -1.0) };
        let mid_x = (from.x + to.x) / 2.0;
        let mid_y = (from.y + to.y) / 2.0;
        let offset = self.config.label_offset;
        let font_size = self.config.label_font_size;
        // Baseline shift so the glyph box, not the baseline, is centered.
        let baseline = font_size * 0.35;
        if self.config.show_order_labels {
            let color = self.theme.order_label_color.clone();
            self.label(
                format!("segment-{idx}-order"),
                Layer::Segments,
                mid_x + nx * offset,
                mid_y + ny * offset + baseline,
                (idx + 1).to_string(),
                font_size,
                &color,
                TextAnchor::Middle,
            );
        }
        if self.config.show_distance_labels {
            let color = self.theme.distance_label_color.clone();
            self.label(
                format!("segment-{idx}-distance"),
                Layer::Segments,
                mid_x - nx * offset,
                mid_y - ny * offset + baseline,
                format_distance(distance, self.config.distance_precision),
                font_size,
                &color,
                TextAnchor::Middle,
            );
        }
    }

    fn markers(&mut self, points: &[ProjectedPoint], origin: Option<usize>) {
        for (idx, point) in points.iter().enumerate() {
            let is_origin = origin == Some(idx);
            let (r, fill) = if is_origin {
                (self.config.origin_radius, self.theme.origin_fill.clone())
            } else {
                (self.config.marker_radius, self.theme.marker_fill.clone())
            };
            self.push(
                format!("marker-{idx}"),
                Layer::Markers,
                Primitive::Circle {
                    cx: point.x,
                    cy: point.y,
                    r,
                    fill: Some(fill),
                    stroke: Some(self.theme.marker_stroke.clone()),
                    stroke_width: self.config.marker_stroke_width,
                },
            );
        }
    }

    fn highlight(&mut self, selection: Selection, points: &[ProjectedPoint], route: &[ProjectedPoint]) {
        let target = match selection {
            Selection::None => None,
            Selection::Original(idx) => points.get(idx),
            Selection::Route(idx) => route.get(idx),
        };
        let Some(target) = target else {
            return;
        };
        self.push(
            HIGHLIGHT_KEY,
            Layer::Highlights,
            Primitive::Circle {
                cx: target.x,
                cy: target.y,
                r: self.config.highlight_radius,
                fill: None,
                stroke: Some(self.theme.highlight_color.clone()),
                stroke_width: self.config.highlight_width,
            },
        );
    }

    fn captions(&mut self, width: f64, height: f64, bounds: Option<Bounds>, metrics: &RouteMetrics) {
        let Some(bounds) = bounds else {
            return;
        };
        let font_size = self.theme.font_size as f64;
        let margin = self.config.caption_margin;
        let color = self.theme.caption_color.clone();
        self.label(
            "caption-x".to_string(),
            Layer::Captions,
            width / 2.0,
            height - margin,
            format!("x: {} to {}", format_value(bounds.min_x), format_value(bounds.max_x)),
            font_size,
            &color,
            TextAnchor::Middle,
        );
        self.label(
            "caption-y".to_string(),
            Layer::Captions,
            margin,
            margin + font_size,
            format!("y: {} to {}", format_value(bounds.min_y), format_value(bounds.max_y)),
            font_size,
            &color,
            TextAnchor::Start,
        );
        if !metrics.is_empty() {
            self.label(
                "caption-total".to_string(),
                Layer::Captions,
                width - margin,
                margin + font_size,
                format!(
                    "total: {}",
                    format_distance(metrics.total, self.config.distance_precision)
                ),
                font_size,
                &color,
                TextAnchor::End,
            );
        }
    }

    fn finish(self, viewport: &Viewport) -> Scene {
        Scene {
            width: viewport.width as f64,
            height: viewport.height as f64,
            font_family: self.theme.font_family.clone(),
            items: self.items,
        }
    }
}

/// Builds the full scene. Pure: equal arguments give equal scenes.
pub fn build_scene(input: &SceneInput<'_>, selection: Selection, theme: &Theme, config: &SceneConfig) -> Scene {
    let _span = tracing::debug_span!(
        "build_scene",
        points = input.points.len(),
        stops = input.route.len()
    )
    .entered();
    if input.points.is_empty() && input.route.is_empty() {
        return build_placeholder_scene(&input.viewport, theme, config);
    }
    let width = input.viewport.width as f64;
    let height = input.viewport.height as f64;
    let mut builder = SceneBuilder {
        theme,
        config,
        items: Vec::new(),
    };
    builder.background(width, height);
    builder.grid(width, height);
    builder.segments(input.route, input.metrics);
    builder.markers(input.points, input.origin);
    builder.highlight(selection, input.points, input.route);
    builder.captions(width, height, input.bounds, input.metrics);
    let scene = builder.finish(&input.viewport);
    tracing::debug!(items = scene.items.len(), "scene built");
    scene
}

/// Background plus a centered message; used whenever there is nothing
/// to project.
pub fn build_placeholder_scene(viewport: &Viewport, theme: &Theme, config: &SceneConfig) -> Scene {
    let width = viewport.width as f64;
    let height = viewport.height as f64;
    let mut builder = SceneBuilder {
        theme,
        config,
        items: Vec::new(),
    };
    builder.background(width, height);
    let color = theme.placeholder_color.clone();
    builder.label(
        PLACEHOLDER_KEY.to_string(),
        Layer::Captions,
        width / 2.0,
        height / 2.0,
        config.placeholder_text.clone(),
        theme.font_size as f64,
        &color,
        TextAnchor::Middle,
    );
    builder.finish(viewport)
}

pub fn format_distance(value: f64, precision: usize) -> String {
    format!("{value:.precision$}")
}

/// Integral values print without decimals; others with two.
pub fn format_value(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    if (rounded - rounded.round()).abs() < 0.001 {
        format!("{:.0}", rounded)
    } else {
        format!("{:.2}", rounded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::RouteMetrics;

    fn triangle() -> (Vec<ProjectedPoint>, RouteMetrics) {
        let points = vec![
            ProjectedPoint::new(100.0, 100.0),
            ProjectedPoint::new(300.0, 100.0),
            ProjectedPoint::new(200.0, 250.0),
        ];
        let metrics = RouteMetrics::compute(&[(0.0, 0.0), (4.0, 0.0), (2.0, 3.0)]);
        (points, metrics)
    }

    fn input<'a>(points: &'a [ProjectedPoint], metrics: &'a RouteMetrics) -> SceneInput<'a> {
        SceneInput {
            viewport: Viewport::new(400, 300, 20),
            points,
            route: points,
            metrics,
            origin: Some(0),
            bounds: Bounds::from_points([(0.0, 0.0), (4.0, 3.0)]),
        }
    }

    #[test]
    fn layers_are_in_draw_order() {
        let (points, metrics) = triangle();
        let scene = build_scene(
            &input(&points, &metrics),
            Selection::Original(1),
            &Theme::light(),
            &SceneConfig::default(),
        );
        let layers: Vec<Layer> = scene.items.iter().map(|item| item.layer).collect();
        let mut sorted = layers.clone();
        sorted.sort();
        assert_eq!(layers, sorted);
        assert_eq!(scene.items[0].key, "background");
        assert!(scene.item(HIGHLIGHT_KEY).is_some());
        assert!(scene.item("caption-total").is_some());
    }

    #[test]
    fn tiny_grid_spacing_is_clamped_to_one_pixel() {
        let (points, metrics) = triangle();
        let config = SceneConfig {
            grid_spacing: 1e-9,
            ..SceneConfig::default()
        };
        let scene = build_scene(&input(&points, &metrics), Selection::None, &Theme::light(), &config);
        // 399 vertical and 299 horizontal lines in a 400x300 viewport.
        assert_eq!(scene.layer(Layer::Grid).count(), 399 + 299);
    }

    #[test]
    fn each_segment_has_line_arrow_and_labels() {
        let (points, metrics) = triangle();
        let scene = build_scene(
            &input(&points, &metrics),
            Selection::None,
            &Theme::light(),
            &SceneConfig::default(),
        );
        for idx in 0..3 {
            for part in ["line", "arrow", "order", "distance"] {
                let key = format!("segment-{idx}-{part}");
                assert!(scene.item(&key).is_some(), "missing {key}");
            }
        }
        let Some(SceneItem {
            primitive: Primitive::Label { text, .. },
            ..
        }) = scene.item("segment-0-distance")
        else {
            panic!("distance label is not a label");
        };
        assert_eq!(text, "4.00");
        assert!(scene.item(HIGHLIGHT_KEY).is_none());
    }

    #[test]
    fn labels_are_offset_perpendicular_to_segment() {
        let (points, metrics) = triangle();
        let config = SceneConfig::default();
        let scene = build_scene(&input(&points, &metrics), Selection::None, &Theme::light(), &config);
        let baseline = config.label_font_size * 0.35;
        // Segment 0 is horizontal, so labels move only vertically.
        for (key, sign) in [("segment-0-order", 1.0), ("segment-0-distance", -1.0)] {
            let Some(SceneItem {
                primitive: Primitive::Label { x, y, .. },
                ..
            }) = scene.item(key)
            else {
                panic!("{key} missing");
            };
            assert!((x - 200.0).abs() < 1e-9);
            assert!((y - (100.0 + sign * config.label_offset + baseline)).abs() < 1e-9);
        }
    }

    #[test]
    fn origin_marker_is_distinguished() {
        let (points, metrics) = triangle();
        let theme = Theme::light();
        let config = SceneConfig::default();
        let scene = build_scene(&input(&points, &metrics), Selection::None, &theme, &config);
        let radius_and_fill = |key: &str| match scene.item(key).map(|item| &item.primitive) {
            Some(Primitive::Circle { r, fill, .. }) => (*r, fill.clone()),
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(radius_and_fill("marker-0"), (config.origin_radius, Some(theme.origin_fill.clone())));
        assert_eq!(radius_and_fill("marker-1"), (config.marker_radius, Some(theme.marker_fill.clone())));
    }

    #[test]
    fn route_selection_highlights_route_stop() {
        let (points, metrics) = triangle();
        let route = vec![points[2], points[0], points[1]];
        let mut scene_input = input(&points, &metrics);
        scene_input.route = &route;
        let scene = build_scene(&scene_input, Selection::Route(0), &Theme::light(), &SceneConfig::default());
        match scene.item(HIGHLIGHT_KEY).map(|item| &item.primitive) {
            Some(Primitive::Circle { cx, cy, fill, .. }) => {
                assert_eq!((*cx, *cy), (200.0, 250.0));
                assert!(fill.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn out_of_range_selection_draws_no_ring() {
        let (points, metrics) = triangle();
        let scene = build_scene(
            &input(&points, &metrics),
            Selection::Original(99),
            &Theme::light(),
            &SceneConfig::default(),
        );
        assert!(scene.item(HIGHLIGHT_KEY).is_none());
    }

    #[test]
    fn empty_input_falls_back_to_placeholder() {
        let metrics = RouteMetrics::default();
        let scene = build_scene(
            &SceneInput {
                viewport: Viewport::default(),
                points: &[],
                route: &[],
                metrics: &metrics,
                origin: None,
                bounds: None,
            },
            Selection::Original(0),
            &Theme::dark(),
            &SceneConfig::default(),
        );
        assert!(scene.is_placeholder());
        assert_eq!(scene.items.len(), 2);
    }

    #[test]
    fn theme_only_changes_colors() {
        let (points, metrics) = triangle();
        let light = build_scene(&input(&points, &metrics), Selection::None, &Theme::light(), &SceneConfig::default());
        let dark = build_scene(&input(&points, &metrics), Selection::None, &Theme::dark(), &SceneConfig::default());
        assert_ne!(light, dark);
        let keys = |scene: &Scene| scene.items.iter().map(|item| item.key.clone()).collect::<Vec<_>>();
        assert_eq!(keys(&light), keys(&dark));
    }

    #[test]
    fn formats_caption_values() {
        assert_eq!(format_value(3.0), "3");
        assert_eq!(format_value(-1.256), "-1.26");
        assert_eq!(format_distance(5.0, 2), "5.00");
    }
}
