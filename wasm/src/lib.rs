use serde::{Deserialize, Serialize};
use tourview::{RenderOptions, RenderedSvg, Selection, Theme, Viewport, render_solution_svg as render_svg};
use wasm_bindgen::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TourRenderOptions {
    theme: Option<String>,
    font_family: Option<String>,
    font_size: Option<f32>,
    width: Option<u32>,
    height: Option<u32>,
    padding: Option<u32>,
    select_original: Option<usize>,
    select_route: Option<usize>,
}

fn build_render_options(options: TourRenderOptions) -> RenderOptions {
    let mut render_options = RenderOptions {
        theme: options
            .theme
            .as_deref()
            .and_then(Theme::by_name)
            .unwrap_or_default(),
        ..RenderOptions::default()
    };

    if let Some(font_family) = options.font_family {
        render_options.theme.font_family = font_family;
    }
    if let Some(font_size) = options.font_size {
        render_options.theme.font_size = font_size;
    }

    let defaults = Viewport::default();
    render_options.viewport = Viewport::new(
        options.width.unwrap_or(defaults.width),
        options.height.unwrap_or(defaults.height),
        options.padding.unwrap_or(defaults.padding),
    );
    render_options.selection = match (options.select_original, options.select_route) {
        (Some(idx), _) => Selection::Original(idx),
        (None, Some(idx)) => Selection::Route(idx),
        (None, None) => Selection::None,
    };
    render_options
}

/// JSON handed back to the host: the SVG plus one message per issue.
#[derive(Debug, Serialize)]
struct TourRenderResult {
    svg: String,
    issues: Vec<String>,
}

impl From<RenderedSvg> for TourRenderResult {
    fn from(rendered: RenderedSvg) -> Self {
        Self {
            svg: rendered.svg,
            issues: rendered.issues.iter().map(ToString::to_string).collect(),
        }
    }
}

fn render_to_json(solution_json: &str, options: TourRenderOptions) -> Result<String, String> {
    let rendered = render_svg(solution_json, &build_render_options(options)).map_err(|error| error.to_string())?;
    serde_json::to_string(&TourRenderResult::from(rendered)).map_err(|error| error.to_string())
}

/// Returns `{"svg": "...", "issues": ["..."]}`. Only non-JSON input throws.
#[wasm_bindgen]
pub fn render_solution_svg(solution_json: &str, options_json: Option<String>) -> Result<String, JsValue> {
    let options = if let Some(raw_options) = options_json {
        serde_json::from_str::<TourRenderOptions>(&raw_options)
            .map_err(|error| JsValue::from_str(&error.to_string()))?
    } else {
        TourRenderOptions::default()
    };

    render_to_json(solution_json, options).map_err(|error| JsValue::from_str(&error))
}

#[cfg(test)]
mod tests {
    use serde_json::Value;
    use tourview::{Selection, Theme};

    use crate::{TourRenderOptions, build_render_options, render_to_json};

    const SOLUTION: &str = r#"{
        "id": "wasm",
        "pointCount": 3,
        "status": "SOLVED",
        "originalPoints": [{"x": 0, "y": 0}, {"x": 4, "y": 0}, {"x": 2, "y": 3}],
        "route": [{"x": 0, "y": 0, "order": 0}, {"x": 4, "y": 0, "order": 1}, {"x": 2, "y": 3, "order": 2}]
    }"#;

    #[test]
    fn renders_solved_tour_with_selection() {
        let options: TourRenderOptions =
            serde_json::from_str(r#"{"theme": "dark", "width": 300, "selectRoute": 1}"#).unwrap();
        let options = build_render_options(options);
        assert_eq!(options.selection, Selection::Route(1));
        assert_eq!(options.theme.background, Theme::dark().background);

        let options: TourRenderOptions =
            serde_json::from_str(r#"{"theme": "dark", "width": 300, "selectRoute": 1}"#).unwrap();
        let result: Value = serde_json::from_str(&render_to_json(SOLUTION, options).unwrap()).unwrap();
        let svg = result["svg"].as_str().unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("width=\"300\""));
        assert!(svg.contains(&Theme::dark().highlight_color));
        assert_eq!(result["issues"], serde_json::json!([]));
    }

    #[test]
    fn issues_reach_the_host() {
        let options: TourRenderOptions = serde_json::from_str(r#"{"selectOriginal": 7}"#).unwrap();
        let result: Value = serde_json::from_str(&render_to_json(SOLUTION, options).unwrap()).unwrap();
        let issues = result["issues"].as_array().unwrap();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].as_str().unwrap().contains("out of range"));

        assert!(render_to_json("not json", TourRenderOptions::default()).is_err());
    }
}
