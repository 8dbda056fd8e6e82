#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod inspector;
pub mod metrics;
pub mod projection;
pub mod render;
pub mod scene;
pub mod scene_dump;
pub mod selection;
pub mod solution;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, RenderConfig, SceneConfig};
pub use error::{Result, TourViewError};
pub use inspector::{Inspector, PointRow, RenderOutcome};
pub use projection::{ProjectedPoint, Viewport};
pub use scene::Scene;
pub use selection::{Selection, SelectionChange};
pub use solution::{Point, RoutePoint, Solution, SolutionStatus};
pub use theme::Theme;

/// Everything a one-shot render needs besides the solution itself.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub theme: Theme,
    pub scene: SceneConfig,
    pub viewport: Viewport,
    pub selection: Selection,
}

impl RenderOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            theme: config.theme.clone(),
            scene: config.scene.clone(),
            viewport: config.render.viewport(),
            selection: Selection::None,
        }
    }
}

/// SVG from [`render_solution_svg`] together with every problem met while
/// loading, selecting and rendering. A placeholder picture always comes
/// with at least one issue.
#[derive(Debug)]
pub struct RenderedSvg {
    pub svg: String,
    pub issues: Vec<TourViewError>,
}

impl RenderedSvg {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Parses a solution and renders it to SVG. Structural problems degrade
/// the picture and are returned in [`RenderedSvg::issues`]; only non-JSON
/// input fails.
pub fn render_solution_svg(input: &str, options: &RenderOptions) -> Result<RenderedSvg> {
    let mut inspector = Inspector::new(options.viewport);
    let mut issues = inspector.load_json(input)?;
    let update = match options.selection {
        Selection::None => None,
        Selection::Original(idx) => Some(inspector.select_original_point(Some(idx))),
        Selection::Route(idx) => Some(inspector.select_route_point(Some(idx))),
    };
    issues.extend(update.and_then(|update| update.issue));
    let outcome = inspector.render(&options.theme, &options.scene);
    for issue in outcome.issues {
        if !issues.contains(&issue) {
            issues.push(issue);
        }
    }
    Ok(RenderedSvg {
        svg: render::render_svg(&outcome.scene),
        issues,
    })
}
