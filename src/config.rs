use crate::projection::Viewport;
use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Geometry of the drawn elements, in pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SceneConfig {
    pub marker_radius: f64,
    pub origin_radius: f64,
    pub marker_stroke_width: f64,
    pub highlight_radius: f64,
    pub highlight_width: f64,
    pub grid_spacing: f64,
    pub grid_width: f64,
    pub route_width: f64,
    pub arrow_length: f64,
    pub arrow_width: f64,
    pub label_offset: f64,
    pub label_font_size: f64,
    pub caption_margin: f64,
    pub distance_precision: usize,
    pub show_order_labels: bool,
    pub show_distance_labels: bool,
    pub hit_radius: f64,
    pub placeholder_text: String,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            marker_radius: 5.0,
            origin_radius: 8.0,
            marker_stroke_width: 1.5,
            highlight_radius: 13.0,
            highlight_width: 3.0,
            grid_spacing: 50.0,
            grid_width: 1.0,
            route_width: 1.5,
            arrow_length: 9.0,
            arrow_width: 7.0,
            label_offset: 10.0,
            label_font_size: 10.0,
            caption_margin: 6.0,
            distance_precision: 2,
            show_order_labels: true,
            show_distance_labels: true,
            hit_radius: 10.0,
            placeholder_text: "No points to display".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub padding: u32,
}

impl RenderConfig {
    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.width, self.height, self.padding)
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            padding: 40,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub theme: Theme,
    pub scene: SceneConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThemeVariables {
    font_family: Option<String>,
    font_size: Option<f32>,
    background: Option<String>,
    grid_color: Option<String>,
    route_color: Option<String>,
    arrow_color: Option<String>,
    order_label_color: Option<String>,
    distance_label_color: Option<String>,
    marker_fill: Option<String>,
    marker_stroke: Option<String>,
    origin_fill: Option<String>,
    highlight_color: Option<String>,
    caption_color: Option<String>,
    placeholder_color: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariables>,
    scene: Option<SceneConfig>,
    render: Option<RenderConfig>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let parsed: ConfigFile = serde_json::from_str(contents)?;

    if let Some(theme_name) = parsed.theme.as_deref() {
        match Theme::by_name(theme_name) {
            Some(theme) => config.theme = theme,
            None => tracing::warn!(theme = theme_name, "unknown theme name, keeping default"),
        }
    }

    if let Some(vars) = parsed.theme_variables {
        apply_theme_variables(&mut config.theme, vars);
    }
    if let Some(scene) = parsed.scene {
        config.scene = scene;
    }
    if let Some(render) = parsed.render {
        config.render = render;
    }
    Ok(config)
}

fn apply_theme_variables(theme: &mut Theme, vars: ThemeVariables) {
    if let Some(v) = vars.font_family {
        theme.font_family = v;
    }
    if let Some(v) = vars.font_size {
        theme.font_size = v;
    }
    let colors = [
        (vars.background, &mut theme.background),
        (vars.grid_color, &mut theme.grid_color),
        (vars.route_color, &mut theme.route_color),
        (vars.arrow_color, &mut theme.arrow_color),
        (vars.order_label_color, &mut theme.order_label_color),
        (vars.distance_label_color, &mut theme.distance_label_color),
        (vars.marker_fill, &mut theme.marker_fill),
        (vars.marker_stroke, &mut theme.marker_stroke),
        (vars.origin_fill, &mut theme.origin_fill),
        (vars.highlight_color, &mut theme.highlight_color),
        (vars.caption_color, &mut theme.caption_color),
        (vars.placeholder_color, &mut theme.placeholder_color),
    ];
    for (value, slot) in colors {
        if let Some(value) = value {
            *slot = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn theme_name_and_variables_apply() {
        let config = parse_config(
            r##"{"theme": "dark", "themeVariables": {"highlightColor": "#00FF00", "fontSize": 14}}"##,
        )
        .unwrap();
        assert_eq!(config.theme.background, Theme::dark().background);
        assert_eq!(config.theme.highlight_color, "#00FF00");
        assert_eq!(config.theme.font_size, 14.0);
    }

    #[test]
    fn partial_scene_keeps_defaults() {
        let config = parse_config(r#"{"scene": {"gridSpacing": 25}, "render": {"width": 320}}"#).unwrap();
        assert_eq!(config.scene.grid_spacing, 25.0);
        assert_eq!(config.scene.marker_radius, SceneConfig::default().marker_radius);
        assert_eq!(config.render.viewport(), Viewport::new(320, 600, 40));
    }

    #[test]
    fn missing_path_is_default() {
        let config = load_config(None).unwrap();
        assert_eq!(config.theme, Theme::light());
    }
}
