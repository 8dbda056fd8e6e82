//! Retained-mode backend: a keyed shape tree that a host keeps alive and
//! patches. Only nodes whose attributes changed between two scenes show
//! up in the patch list.

use serde::Serialize;
use std::collections::BTreeMap;

use super::{SceneRenderer, escape_xml};
use crate::scene::{Layer, Primitive, Scene, TextAnchor};

pub const ROOT_KEY: &str = "root";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Number(f64),
    Text(String),
    Points(Vec<(f64, f64)>),
}

impl AttrValue {
    fn to_svg(&self) -> String {
        match self {
            AttrValue::Number(value) => format_number(*value),
            AttrValue::Text(value) => escape_xml(value),
            AttrValue::Points(points) => points
                .iter()
                .map(|(x, y)| format!("{},{}", format_number(*x), format_number(*y)))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            AttrValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(value) => Some(value),
            _ => None,
        }
    }
}

fn format_number(value: f64) -> String {
    let text = format!("{value:.2}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" { "0".to_string() } else { text.to_string() }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShapeNode {
    pub key: String,
    pub tag: String,
    pub attrs: BTreeMap<String, AttrValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ShapeNode>,
}

impl ShapeNode {
    fn new(key: impl Into<String>, tag: &str) -> Self {
        Self {
            key: key.into(),
            tag: tag.to_string(),
            attrs: BTreeMap::new(),
            text: None,
            children: Vec::new(),
        }
    }

    fn num(mut self, name: &str, value: f64) -> Self {
        self.attrs.insert(name.to_string(), AttrValue::Number(value));
        self
    }

    fn str(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attrs.insert(name.to_string(), AttrValue::Text(value.into()));
        self
    }

    fn find_mut(&mut self, key: &str) -> Option<&mut ShapeNode> {
        if self.key == key {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| child.find_mut(key))
    }

    pub fn find(&self, key: &str) -> Option<&ShapeNode> {
        if self.key == key {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(key))
    }

    fn number(&self, name: &str) -> f64 {
        self.attrs.get(name).and_then(AttrValue::as_number).unwrap_or(0.0)
    }

    fn text_attr(&self, name: &str) -> Option<String> {
        self.attrs
            .get(name)
            .and_then(AttrValue::as_text)
            .filter(|value| *value != "none")
            .map(str::to_string)
    }

    fn write_svg(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        for (name, value) in &self.attrs {
            out.push_str(&format!(" {name}=\"{}\"", value.to_svg()));
        }
        if self.text.is_none() && self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        if let Some(text) = &self.text {
            out.push_str(&escape_xml(text));
        }
        for child in &self.children {
            child.write_svg(out);
        }
        out.push_str(&format!("</{}>", self.tag));
    }

    fn to_primitive(&self) -> Option<Primitive> {
        let primitive = match self.tag.as_str() {
            "rect" => Primitive::Rect {
                x: self.number("x"),
                y: self.number("y"),
                width: self.number("width"),
                height: self.number("height"),
                fill: self.text_attr("fill").unwrap_or_default(),
            },
            "line" => Primitive::Line {
                x1: self.number("x1"),
                y1: self.number("y1"),
                x2: self.number("x2"),
                y2: self.number("y2"),
                color: self.text_attr("stroke").unwrap_or_default(),
                width: self.number("stroke-width"),
            },
            "polygon" => Primitive::Polygon {
                points: match self.attrs.get("points") {
                    Some(AttrValue::Points(points)) => points.clone(),
                    _ => Vec::new(),
                },
                fill: self.text_attr("fill").unwrap_or_default(),
            },
            "circle" => Primitive::Circle {
                cx: self.number("cx"),
                cy: self.number("cy"),
                r: self.number("r"),
                fill: self.text_attr("fill"),
                stroke: self.text_attr("stroke"),
                stroke_width: self.number("stroke-width"),
            },
            "text" => Primitive::Label {
                x: self.number("x"),
                y: self.number("y"),
                text: self.text.clone().unwrap_or_default(),
                font_size: self.number("font-size"),
                color: self.text_attr("fill").unwrap_or_default(),
                anchor: self
                    .attrs
                    .get("text-anchor")
                    .and_then(AttrValue::as_text)
                    .and_then(TextAnchor::from_svg)
                    .unwrap_or(TextAnchor::Start),
            },
            _ => return None,
        };
        Some(primitive)
    }
}

fn primitive_node(key: &str, primitive: &Primitive) -> ShapeNode {
    match primitive {
        Primitive::Rect {
            x,
            y,
            width,
            height,
            fill,
        } => ShapeNode::new(key, "rect")
            .num("x", *x)
            .num("y", *y)
            .num("width", *width)
            .num("height", *height)
            .str("fill", fill.as_str()),
        Primitive::Line {
            x1,
            y1,
            x2,
            y2,
            color,
            width,
        } => ShapeNode::new(key, "line")
            .num("x1", *x1)
            .num("y1", *y1)
            .num("x2", *x2)
            .num("y2", *y2)
            .str("stroke", color.as_str())
            .num("stroke-width", *width),
        Primitive::Polygon { points, fill } => {
            let mut node = ShapeNode::new(key, "polygon").str("fill", fill.as_str());
            node.attrs
                .insert("points".to_string(), AttrValue::Points(points.clone()));
            node
        }
        Primitive::Circle {
            cx,
            cy,
            r,
            fill,
            stroke,
            stroke_width,
        } => ShapeNode::new(key, "circle")
            .num("cx", *cx)
            .num("cy", *cy)
            .num("r", *r)
            .str("fill", fill.as_deref().unwrap_or("none"))
            .str("stroke", stroke.as_deref().unwrap_or("none"))
            .num("stroke-width", *stroke_width),
        Primitive::Label {
            x,
            y,
            text,
            font_size,
            color,
            anchor,
        } => {
            let mut node = ShapeNode::new(key, "text")
                .num("x", *x)
                .num("y", *y)
                .num("font-size", *font_size)
                .str("fill", color.as_str())
                .str("text-anchor", anchor.as_svg());
            node.text = Some(text.clone());
            node
        }
    }
}

fn layer_key(layer: Layer) -> String {
    format!("layer-{}", layer.name())
}

/// The retained scene: an `svg` root with one group per non-empty layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShapeTree {
    pub root: ShapeNode,
}

impl ShapeTree {
    pub fn from_scene(scene: &Scene) -> Self {
        let mut root = ShapeNode::new(ROOT_KEY, "svg")
            .str("xmlns", "http://www.w3.org/2000/svg")
            .num("width", scene.width)
            .num("height", scene.height)
            .str(
                "viewBox",
                format!("0 0 {} {}", format_number(scene.width), format_number(scene.height)),
            )
            .str("font-family", scene.font_family.as_str());
        for layer in Layer::ALL {
            let children: Vec<ShapeNode> = scene
                .layer(layer)
                .map(|item| primitive_node(&item.key, &item.primitive))
                .collect();
            if children.is_empty() {
                continue;
            }
            let mut group = ShapeNode::new(layer_key(layer), "g").str("class", layer.name());
            group.children = children;
            root.children.push(group);
        }
        Self { root }
    }

    pub fn find(&self, key: &str) -> Option<&ShapeNode> {
        self.root.find(key)
    }

    pub fn node_count(&self) -> usize {
        fn count(node: &ShapeNode) -> usize {
            1 + node.children.iter().map(count).sum::<usize>()
        }
        count(&self.root)
    }

    pub fn to_svg(&self) -> String {
        let mut out = String::new();
        self.root.write_svg(&mut out);
        out
    }

    /// Primitives in draw order, for comparison with other backends.
    pub fn primitives(&self) -> Vec<Primitive> {
        self.root
            .children
            .iter()
            .flat_map(|group| group.children.iter())
            .filter_map(ShapeNode::to_primitive)
            .collect()
    }

    /// Applies patches produced by [`diff`] against this tree.
    pub fn apply(&mut self, patches: &[ShapePatch]) {
        for patch in patches {
            match patch {
                ShapePatch::Remove { parent, key } => {
                    if let Some(parent) = self.root.find_mut(parent) {
                        parent.children.retain(|child| &child.key != key);
                    }
                }
                ShapePatch::Insert {
                    parent,
                    index,
                    node,
                } => {
                    if let Some(parent) = self.root.find_mut(parent) {
                        let index = (*index).min(parent.children.len());
                        parent.children.insert(index, node.clone());
                    }
                }
                ShapePatch::SetAttrs { key, set, removed } => {
                    if let Some(node) = self.root.find_mut(key) {
                        for (name, value) in set {
                            node.attrs.insert(name.clone(), value.clone());
                        }
                        for name in removed {
                            node.attrs.remove(name);
                        }
                    }
                }
                ShapePatch::SetText { key, text } => {
                    if let Some(node) = self.root.find_mut(key) {
                        node.text = text.clone();
                    }
                }
            }
        }
    }
}

/// One retained-tree mutation, addressed by node key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum ShapePatch {
    Insert {
        parent: String,
        index: usize,
        node: ShapeNode,
    },
    Remove {
        parent: String,
        key: String,
    },
    SetAttrs {
        key: String,
        set: Vec<(String, AttrValue)>,
        removed: Vec<String>,
    },
    SetText {
        key: String,
        text: Option<String>,
    },
}

/// Keyed diff of two trees. Surviving keys are assumed to keep their
/// relative order, which holds for trees built from scenes.
pub fn diff(old: &ShapeTree, new: &ShapeTree) -> Vec<ShapePatch> {
    let mut patches = Vec::new();
    diff_node(&old.root, &new.root, &mut patches);
    patches
}

fn diff_node(old: &ShapeNode, new: &ShapeNode, patches: &mut Vec<ShapePatch>) {
    let set: Vec<(String, AttrValue)> = new
        .attrs
        .iter()
        .filter(|(name, value)| old.attrs.get(*name) != Some(*value))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    let removed: Vec<String> = old
        .attrs
        .keys()
        .filter(|name| !new.attrs.contains_key(*name))
        .cloned()
        .collect();
    if !set.is_empty() || !removed.is_empty() {
        patches.push(ShapePatch::SetAttrs {
            key: new.key.clone(),
            set,
            removed,
        });
    }
    if old.text != new.text {
        patches.push(ShapePatch::SetText {
            key: new.key.clone(),
            text: new.text.clone(),
        });
    }
    diff_children(old, new, patches);
}

fn diff_children(old: &ShapeNode, new: &ShapeNode, patches: &mut Vec<ShapePatch>) {
    let new_index: BTreeMap<&str, &ShapeNode> = new
        .children
        .iter()
        .map(|child| (child.key.as_str(), child))
        .collect();
    let old_index: BTreeMap<&str, &ShapeNode> = old
        .children
        .iter()
        .map(|child| (child.key.as_str(), child))
        .collect();

    for child in &old.children {
        let survives = new_index
            .get(child.key.as_str())
            .is_some_and(|next| next.tag == child.tag);
        if !survives {
            patches.push(ShapePatch::Remove {
                parent: old.key.clone(),
                key: child.key.clone(),
            });
        }
    }
    for (index, child) in new.children.iter().enumerate() {
        match old_index.get(child.key.as_str()) {
            Some(previous) if previous.tag == child.tag => diff_node(previous, child, patches),
            _ => patches.push(ShapePatch::Insert {
                parent: new.key.clone(),
                index,
                node: child.clone(),
            }),
        }
    }
}

/// Output of one vector pass.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorFrame {
    pub tree: ShapeTree,
    /// Patches from the previous frame; `None` on the first pass, when
    /// the host has to mount the whole tree.
    pub patches: Option<Vec<ShapePatch>>,
}

/// Builds shape trees and diffs each against the last one it produced.
#[derive(Debug, Default)]
pub struct VectorRenderer {
    previous: Option<ShapeTree>,
}

impl VectorRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&ShapeTree> {
        self.previous.as_ref()
    }

    /// Forgets the mounted tree, so the next pass mounts from scratch.
    pub fn reset(&mut self) {
        self.previous = None;
    }
}

impl SceneRenderer for VectorRenderer {
    type Output = VectorFrame;

    fn render(&mut self, scene: &Scene) -> VectorFrame {
        let _span = tracing::debug_span!("vector_pass", items = scene.items.len()).entered();
        let tree = ShapeTree::from_scene(scene);
        let patches = self.previous.as_ref().map(|previous| diff(previous, &tree));
        if let Some(patches) = &patches {
            tracing::debug!(patches = patches.len(), nodes = tree.node_count(), "vector diff");
        }
        self.previous = Some(tree.clone());
        VectorFrame { tree, patches }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SceneConfig;
    use crate::metrics::RouteMetrics;
    use crate::projection::{ProjectedPoint, Viewport};
    use crate::scene::{HIGHLIGHT_KEY, SceneInput, build_scene};
    use crate::selection::Selection;
    use crate::theme::Theme;

    fn scene_with(points: &[ProjectedPoint], selection: Selection, theme: &Theme) -> Scene {
        let coords: Vec<(f64, f64)> = points.iter().map(|p| (p.x, p.y)).collect();
        let metrics = RouteMetrics::compute(&coords);
        build_scene(
            &SceneInput {
                viewport: Viewport::new(300, 200, 10),
                points,
                route: points,
                metrics: &metrics,
                origin: Some(0),
                bounds: None,
            },
            selection,
            theme,
            &SceneConfig::default(),
        )
    }

    fn points() -> Vec<ProjectedPoint> {
        vec![
            ProjectedPoint::new(30.0, 30.0),
            ProjectedPoint::new(250.0, 40.0),
            ProjectedPoint::new(150.0, 170.0),
        ]
    }

    #[test]
    fn first_pass_mounts_whole_tree() {
        let mut renderer = VectorRenderer::new();
        let frame = renderer.render(&scene_with(&points(), Selection::None, &Theme::light()));
        assert!(frame.patches.is_none());
        assert!(frame.tree.find("layer-markers").is_some());
        assert!(frame.tree.find("marker-2").is_some());
        assert!(frame.tree.find(HIGHLIGHT_KEY).is_none());
    }

    #[test]
    fn selection_change_patches_only_the_highlight() {
        let mut renderer = VectorRenderer::new();
        renderer.render(&scene_with(&points(), Selection::None, &Theme::light()));
        let frame = renderer.render(&scene_with(&points(), Selection::Original(1), &Theme::light()));
        let patches = frame.patches.unwrap();
        assert_eq!(patches.len(), 1);
        match &patches[0] {
            ShapePatch::Insert { parent, node, .. } => {
                assert_eq!(parent, ROOT_KEY);
                assert_eq!(node.key, "layer-highlights");
                assert_eq!(node.children[0].key, HIGHLIGHT_KEY);
            }
            other => panic!("unexpected patch {other:?}"),
        }

        let frame = renderer.render(&scene_with(&points(), Selection::Original(2), &Theme::light()));
        let patches = frame.patches.unwrap();
        assert!(patches.iter().all(|patch| matches!(
            patch,
            ShapePatch::SetAttrs { key, .. } if key == HIGHLIGHT_KEY
        )));
    }

    #[test]
    fn identical_scenes_produce_no_patches() {
        let mut renderer = VectorRenderer::new();
        let scene = scene_with(&points(), Selection::Route(0), &Theme::dark());
        renderer.render(&scene);
        assert_eq!(renderer.render(&scene).patches, Some(Vec::new()));
    }

    #[test]
    fn applying_diff_reproduces_new_tree() {
        let old = ShapeTree::from_scene(&scene_with(&points(), Selection::Original(0), &Theme::light()));
        let mut moved = points();
        moved.push(ProjectedPoint::new(60.0, 120.0));
        let new = ShapeTree::from_scene(&scene_with(&moved, Selection::None, &Theme::dark()));
        let mut mounted = old.clone();
        mounted.apply(&diff(&old, &new));
        assert_eq!(mounted, new);

        let mut shrunk = new.clone();
        shrunk.apply(&diff(&new, &old));
        assert_eq!(shrunk, old);
    }

    #[test]
    fn svg_serialization_trims_numbers() {
        assert_eq!(format_number(12.0), "12");
        assert_eq!(format_number(12.345), "12.35");
        assert_eq!(format_number(-0.001), "0");
        let tree = ShapeTree::from_scene(&scene_with(&points(), Selection::None, &Theme::light()));
        let svg = tree.to_svg();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("<g class=\"markers\">"));
        assert!(svg.contains("<circle"));
        assert!(svg.contains(">1</text>"));
    }
}
