//! Text outlines for the pixmap surface, from system fonts.

use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use once_cell::sync::Lazy;
use resvg::tiny_skia::{Path, PathBuilder};
use std::collections::HashMap;
use std::sync::Mutex;
use ttf_parser::{Face, OutlineBuilder};

use crate::scene::TextAnchor;

static FONTS: Lazy<Mutex<FontCache>> = Lazy::new(|| Mutex::new(FontCache::new()));

/// Outline of `text` with its baseline starting at `(x, y)`, shifted
/// horizontally for `anchor`. `None` when no font face is available or
/// the text has no visible glyphs.
pub(crate) fn text_path(text: &str, x: f32, y: f32, font_size: f32, font_family: &str, anchor: TextAnchor) -> Option<Path> {
    if text.is_empty() || font_size <= 0.0 {
        return None;
    }
    let mut guard = FONTS.lock().ok()?;
    let font = guard.font(font_family)?;
    let face = Face::parse(&font.data, font.index).ok()?;
    let scale = font_size / face.units_per_em().max(1) as f32;

    let advance_of = |ch: char| {
        face.glyph_index(ch)
            .and_then(|id| face.glyph_hor_advance(id))
            .map(|adv| adv as f32 * scale)
            .unwrap_or(font_size * 0.56)
    };
    let width: f32 = text.chars().map(&advance_of).sum();
    let mut pen_x = match anchor {
        TextAnchor::Start => x,
        TextAnchor::Middle => x - width / 2.0,
        TextAnchor::End => x - width,
    };

    let mut builder = GlyphPathBuilder {
        builder: PathBuilder::new(),
        origin_x: pen_x,
        baseline: y,
        scale,
    };
    for ch in text.chars() {
        if let Some(id) = face.glyph_index(ch) {
            builder.origin_x = pen_x;
            face.outline_glyph(id, &mut builder);
        }
        pen_x += advance_of(ch);
    }
    builder.builder.finish()
}

struct GlyphPathBuilder {
    builder: PathBuilder,
    origin_x: f32,
    baseline: f32,
    scale: f32,
}

impl GlyphPathBuilder {
    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (self.origin_x + x * self.scale, self.baseline - y * self.scale)
    }
}

impl OutlineBuilder for GlyphPathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x, y) = self.map(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x2, y2) = self.map(x2, y2);
        let (x, y) = self.map(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

struct FontData {
    data: Vec<u8>,
    index: u32,
}

struct FontCache {
    db: Database,
    loaded_system_fonts: bool,
    faces: HashMap<String, Option<FontData>>,
}

impl FontCache {
    fn new() -> Self {
        Self {
            db: Database::new(),
            loaded_system_fonts: false,
            faces: HashMap::new(),
        }
    }

    fn font(&mut self, font_family: &str) -> Option<&FontData> {
        let key = normalize_family_key(font_family);
        if !self.faces.contains_key(&key) {
            let face = self.load(font_family);
            self.faces.insert(key.clone(), face);
        }
        self.faces.get(&key).and_then(Option::as_ref)
    }

    fn load(&mut self, font_family: &str) -> Option<FontData> {
        let names: Vec<&str> = font_family
            .split(',')
            .map(|part| part.trim().trim_matches('"').trim_matches('\''))
            .filter(|part| !part.is_empty())
            .collect();
        let mut families: Vec<Family<'_>> = names
            .iter()
            .map(|name| match name.to_ascii_lowercase().as_str() {
                "serif" => Family::Serif,
                "sans-serif" | "system-ui" | "-apple-system" | "ui-sans-serif" => Family::SansSerif,
                "monospace" | "ui-monospace" => Family::Monospace,
                "cursive" => Family::Cursive,
                "fantasy" => Family::Fantasy,
                _ => Family::Name(*name),
            })
            .collect();
        families.push(Family::SansSerif);

        if !self.loaded_system_fonts {
            self.db.load_system_fonts();
            self.loaded_system_fonts = true;
        }

        let query = Query {
            families: &families,
            weight: Weight::NORMAL,
            stretch: Stretch::Normal,
            style: Style::Normal,
        };
        let Some(id) = self.db.query(&query) else {
            tracing::warn!(font_family, "no system font matches, labels will not be painted");
            return None;
        };
        self.db.with_face_data(id, |data, index| FontData {
            data: data.to_vec(),
            index,
        })
    }
}

fn normalize_family_key(font_family: &str) -> String {
    let trimmed = font_family.trim();
    if trimmed.is_empty() {
        "sans-serif".to_string()
    } else {
        trimmed.to_string()
    }
}
