use serde::{Deserialize, Serialize};

/// Semantic colors for one render. Passed explicitly into every render
/// call; nothing in the crate reads an ambient theme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f32,
    pub background: String,
    pub grid_color: String,
    pub route_color: String,
    pub arrow_color: String,
    pub order_label_color: String,
    pub distance_label_color: String,
    pub marker_fill: String,
    pub marker_stroke: String,
    pub origin_fill: String,
    pub highlight_color: String,
    pub caption_color: String,
    pub placeholder_color: String,
}

impl Theme {
    pub fn light() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 12.0,
            background: "#FFFFFF".to_string(),
            grid_color: "#E6EAF0".to_string(),
            route_color: "#7A8AA6".to_string(),
            arrow_color: "#56647D".to_string(),
            order_label_color: "#1C2430".to_string(),
            distance_label_color: "#6B7A90".to_string(),
            marker_fill: "#3B82F6".to_string(),
            marker_stroke: "#FFFFFF".to_string(),
            origin_fill: "#E5484D".to_string(),
            highlight_color: "#F5A524".to_string(),
            caption_color: "#444C5A".to_string(),
            placeholder_color: "#8A94A6".to_string(),
        }
    }

    pub fn dark() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 12.0,
            background: "#14181F".to_string(),
            grid_color: "#232A35".to_string(),
            route_color: "#7F8EA8".to_string(),
            arrow_color: "#A9B6CC".to_string(),
            order_label_color: "#E6EAF0".to_string(),
            distance_label_color: "#9AA6BA".to_string(),
            marker_fill: "#60A5FA".to_string(),
            marker_stroke: "#14181F".to_string(),
            origin_fill: "#FF6369".to_string(),
            highlight_color: "#FFC53D".to_string(),
            caption_color: "#C2CAD6".to_string(),
            placeholder_color: "#6B7588".to_string(),
        }
    }

    pub fn by_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "light" | "default" => Some(Self::light()),
            "dark" => Some(Self::dark()),
            _ => None,
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::light()
    }
}
