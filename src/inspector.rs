//! Stateful front end tying one solution to both views.
//!
//! The inspector owns the loaded solution, the shared selection and a
//! memoized projection. Selection and theme changes only rebuild the
//! scene; projection re-runs when the solution or the viewport changes.

use serde::Serialize;

use crate::config::SceneConfig;
use crate::error::{Result, TourViewError};
use crate::metrics::RouteMetrics;
use crate::projection::{ProjectedPoint, ProjectionParams, Viewport, hit_test, project};
use crate::scene::{Scene, SceneInput, build_placeholder_scene, build_scene};
use crate::selection::{LinkedSelection, Selection, SelectionChange, SelectionLinker, SelectionState, SelectionUpdate};
use crate::solution::{Point, Solution};
use crate::theme::Theme;

/// A scene plus everything that went wrong while producing it.
#[derive(Debug)]
pub struct RenderOutcome {
    pub scene: Scene,
    pub issues: Vec<TourViewError>,
}

/// One row of the point table, in upload order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointRow {
    pub index: usize,
    pub x: f64,
    pub y: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Position of this point in the visiting order.
    pub route_order: Option<usize>,
    /// Length of the segment leaving this stop.
    pub outgoing_distance: Option<f64>,
    pub highlighted: bool,
}

#[derive(Debug, Clone)]
struct Geometry {
    points: Vec<ProjectedPoint>,
    route: Vec<ProjectedPoint>,
    params: ProjectionParams,
}

#[derive(Debug)]
struct ProjectionCache {
    solution_id: String,
    viewport: Viewport,
    geometry: Option<Geometry>,
}

type Listener = Box<dyn FnMut(&SelectionChange)>;

pub struct Inspector {
    solution: Solution,
    linker: SelectionLinker,
    metrics: RouteMetrics,
    viewport: Viewport,
    selection: SelectionState,
    cache: Option<ProjectionCache>,
    projection_runs: usize,
    listeners: Vec<Listener>,
}

impl Default for Inspector {
    fn default() -> Self {
        Self::new(Viewport::default())
    }
}

impl Inspector {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            solution: Solution::empty(""),
            linker: SelectionLinker::default(),
            metrics: RouteMetrics::default(),
            viewport,
            selection: SelectionState::default(),
            cache: None,
            projection_runs: 0,
            listeners: Vec::new(),
        }
    }

    /// Replaces the displayed solution and clears the selection. Returns
    /// the structural problems found in `solution`.
    pub fn load_solution(&mut self, solution: Solution) -> Vec<TourViewError> {
        let issues = solution.validate();
        if solution != self.solution {
            self.cache = None;
        }
        let coords: Vec<(f64, f64)> = solution.route_points().iter().map(|stop| stop.point.xy()).collect();
        self.metrics = RouteMetrics::compute(&coords);
        self.linker = SelectionLinker::new(&solution);
        self.solution = solution;
        if let Some(previous) = self.selection.clear() {
            self.notify(SelectionChange {
                previous,
                current: Selection::None,
                linked: LinkedSelection::default(),
            });
        }
        issues
    }

    /// Parses the wire form and loads it. Only input that is not JSON is
    /// an error; everything else comes back as issues.
    pub fn load_json(&mut self, input: &str) -> Result<Vec<TourViewError>> {
        let parsed = Solution::from_json(input)?;
        let mut issues = parsed.issues;
        for issue in self.load_solution(parsed.solution) {
            if !issues.contains(&issue) {
                issues.push(issue);
            }
        }
        Ok(issues)
    }

    pub fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn solution(&self) -> &Solution {
        &self.solution
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn metrics(&self) -> &RouteMetrics {
        &self.metrics
    }

    pub fn linker(&self) -> &SelectionLinker {
        &self.linker
    }

    pub fn selection(&self) -> Selection {
        self.selection.current()
    }

    pub fn linked_selection(&self) -> LinkedSelection {
        self.linker.link(self.selection.current())
    }

    /// How many times projection actually ran.
    pub fn projection_runs(&self) -> usize {
        self.projection_runs
    }

    /// Registers a callback for every selection change.
    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: FnMut(&SelectionChange) + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Table-view selection event.
    pub fn select_original_point(&mut self, index: Option<usize>) -> SelectionUpdate {
        let update = self.selection.select_original(index, &self.linker);
        if let Some(change) = update.change {
            self.notify(change);
        }
        update
    }

    /// Geometric-view selection event.
    pub fn select_route_point(&mut self, index: Option<usize>) -> SelectionUpdate {
        let update = self.selection.select_route(index, &self.linker);
        if let Some(change) = update.change {
            self.notify(change);
        }
        update
    }

    /// Original point under the pointer, in viewport pixels.
    pub fn point_at(&mut self, x: f64, y: f64, radius: f64) -> Option<usize> {
        let geometry = self.geometry()?;
        hit_test(ProjectedPoint::new(x, y), &geometry.points, radius)
    }

    /// Selects whatever is under the pointer. Clicking the highlighted
    /// marker again toggles it off; clicking empty space clears.
    pub fn select_at(&mut self, x: f64, y: f64, config: &SceneConfig) -> SelectionUpdate {
        let hit = self.point_at(x, y, config.hit_radius);
        self.select_original_point(hit)
    }

    /// Problem-space coordinates under a viewport pixel.
    pub fn problem_coordinates(&mut self, x: f64, y: f64) -> Option<(f64, f64)> {
        let params = self.geometry()?.params;
        params.invert(ProjectedPoint::new(x, y))
    }

    pub fn table_rows(&self) -> Vec<PointRow> {
        let highlighted = self.linked_selection().original_index;
        self.solution
            .original_points
            .iter()
            .enumerate()
            .map(|(index, point)| {
                let route_order = self.linker.route_index_of(index);
                PointRow {
                    index,
                    x: point.x,
                    y: point.y,
                    address: point.address.clone(),
                    route_order,
                    outgoing_distance: route_order.and_then(|order| self.metrics.segment(order)),
                    highlighted: highlighted == Some(index),
                }
            })
            .collect()
    }

    /// Builds the scene for the current state. Always returns a scene:
    /// when nothing can be projected it is the placeholder.
    pub fn render(&mut self, theme: &Theme, config: &SceneConfig) -> RenderOutcome {
        let viewport = self.viewport;
        let selection = self.selection.current();
        let origin = self.linker.original_index_of(0);
        let fallback = self.fallback_issue();
        self.geometry();
        let geometry = self.cache.as_ref().and_then(|cache| cache.geometry.as_ref());

        match geometry {
            Some(geometry) => {
                let scene = build_scene(
                    &SceneInput {
                        viewport,
                        points: &geometry.points,
                        route: &geometry.route,
                        metrics: &self.metrics,
                        origin,
                        bounds: Some(geometry.params.bounds),
                    },
                    selection,
                    theme,
                    config,
                );
                RenderOutcome {
                    scene,
                    issues: Vec::new(),
                }
            }
            None => {
                let issue = fallback.unwrap_or(TourViewError::EmptyGeometry);
                tracing::debug!(%issue, "rendering placeholder");
                RenderOutcome {
                    scene: build_placeholder_scene(&viewport, theme, config),
                    issues: vec![issue],
                }
            }
        }
    }

    fn cache_matches(&self, cache: &ProjectionCache) -> bool {
        cache.solution_id == self.solution.id && cache.viewport == self.viewport
    }

    fn fallback_issue(&self) -> Option<TourViewError> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Some(TourViewError::InvalidViewport {
                width: self.viewport.width,
                height: self.viewport.height,
            });
        }
        (self.solution.original_points.is_empty() && self.solution.route_points().is_empty())
            .then_some(TourViewError::EmptyGeometry)
    }

    fn geometry(&mut self) -> Option<&Geometry> {
        let fresh = match &self.cache {
            Some(cache) => !self.cache_matches(cache),
            None => true,
        };
        if fresh {
            tracing::debug!(solution = %self.solution.id, "projection cache miss");
            self.projection_runs += 1;
            let geometry = compute_geometry(&self.solution, &self.viewport)
                .inspect_err(|err| tracing::debug!(%err, "projection skipped"))
                .ok();
            self.cache = Some(ProjectionCache {
                solution_id: self.solution.id.clone(),
                viewport: self.viewport,
                geometry,
            });
        }
        self.cache.as_ref().and_then(|cache| cache.geometry.as_ref())
    }

    fn notify(&mut self, change: SelectionChange) {
        for listener in &mut self.listeners {
            listener(&change);
        }
    }
}

/// Originals and route stops share one projection so they line up.
fn compute_geometry(solution: &Solution, viewport: &Viewport) -> Result<Geometry> {
    let originals = solution.original_points.iter().map(Point::xy);
    let stops = solution.route_points().iter().map(|stop| stop.point.xy());
    let (mut points, params) = project(originals.chain(stops), viewport)?;
    let route = points.split_off(solution.original_points.len());
    Ok(Geometry {
        points,
        route,
        params,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::HIGHLIGHT_KEY;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn five_point() -> Solution {
        Solution::new(
            "five",
            vec![
                Point::new(0.0, 0.0).with_address("depot"),
                Point::new(3.0, 4.0),
                Point::new(6.0, 0.0),
                Point::new(3.0, -4.0),
                Point::new(-3.0, 2.0),
            ],
        )
        .with_route_indices(&[0, 2, 1, 4, 3])
    }

    fn inspector() -> Inspector {
        let mut inspector = Inspector::new(Viewport::new(400, 300, 20));
        assert!(inspector.load_solution(five_point()).is_empty());
        inspector
    }

    #[test]
    fn selection_changes_do_not_reproject() {
        let mut inspector = inspector();
        let config = SceneConfig::default();
        inspector.render(&Theme::light(), &config);
        inspector.select_original_point(Some(1));
        let outcome = inspector.render(&Theme::light(), &config);
        assert!(outcome.issues.is_empty());
        assert!(outcome.scene.item(HIGHLIGHT_KEY).is_some());
        inspector.render(&Theme::dark(), &config);
        assert_eq!(inspector.projection_runs(), 1);

        inspector.resize(Viewport::new(200, 200, 10));
        inspector.render(&Theme::dark(), &config);
        assert_eq!(inspector.projection_runs(), 2);
    }

    #[test]
    fn listeners_see_linked_indices() {
        let mut inspector = inspector();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        inspector.subscribe(move |change| sink.borrow_mut().push(*change));

        inspector.select_original_point(Some(1));
        inspector.select_route_point(Some(1));
        inspector.select_route_point(Some(1));

        let seen = seen.borrow();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].current, Selection::Original(1));
        assert_eq!(seen[0].linked.route_index, Some(2));
        assert_eq!(seen[1].previous, Selection::Original(1));
        assert_eq!(seen[1].linked.original_index, Some(2));
        assert_eq!(seen[2].current, Selection::None);
    }

    #[test]
    fn out_of_range_selection_is_reported_and_cleared() {
        let mut inspector = inspector();
        inspector.select_route_point(Some(0));
        let update = inspector.select_original_point(Some(9));
        assert_eq!(update.issue, Some(TourViewError::SelectionOutOfRange { index: 9, len: 5 }));
        assert_eq!(inspector.selection(), Selection::None);
    }

    #[test]
    fn empty_solution_renders_placeholder() {
        let mut inspector = Inspector::default();
        inspector.load_solution(Solution::empty("none"));
        let outcome = inspector.render(&Theme::light(), &SceneConfig::default());
        assert!(outcome.scene.is_placeholder());
        assert_eq!(outcome.issues, vec![TourViewError::EmptyGeometry]);
    }

    #[test]
    fn zero_viewport_renders_placeholder() {
        let mut inspector = inspector();
        inspector.resize(Viewport::new(0, 300, 20));
        let outcome = inspector.render(&Theme::light(), &SceneConfig::default());
        assert!(outcome.scene.is_placeholder());
        assert_eq!(
            outcome.issues,
            vec![TourViewError::InvalidViewport { width: 0, height: 300 }]
        );
        inspector.render(&Theme::light(), &SceneConfig::default());
        assert_eq!(inspector.projection_runs(), 1);
    }

    #[test]
    fn table_rows_follow_upload_order() {
        let mut inspector = inspector();
        inspector.select_route_point(Some(3));
        let rows = inspector.table_rows();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].address.as_deref(), Some("depot"));
        assert_eq!(rows[0].route_order, Some(0));
        assert_eq!(rows[0].outgoing_distance, Some(6.0));
        assert_eq!(rows[2].route_order, Some(1));
        assert_eq!(rows[2].outgoing_distance, Some(5.0));
        let highlighted: Vec<usize> = rows.iter().filter(|row| row.highlighted).map(|row| row.index).collect();
        assert_eq!(highlighted, vec![4]);
    }

    #[test]
    fn pointer_hits_nearest_marker() {
        let mut inspector = inspector();
        let origin = inspector.render(&Theme::light(), &SceneConfig::default());
        let Some(crate::scene::SceneItem {
            primitive: crate::scene::Primitive::Circle { cx, cy, .. },
            ..
        }) = origin.scene.item("marker-2")
        else {
            panic!("marker-2 missing");
        };
        let (cx, cy) = (*cx, *cy);
        assert_eq!(inspector.point_at(cx + 2.0, cy - 2.0, 10.0), Some(2));
        assert_eq!(inspector.point_at(cx + 50.0, cy + 50.0, 10.0), None);

        let (x, y) = inspector.problem_coordinates(cx, cy).unwrap();
        assert!((x - 6.0).abs() < 1e-9 && y.abs() < 1e-9);

        let config = SceneConfig::default();
        inspector.select_at(cx, cy, &config);
        assert_eq!(inspector.selection(), Selection::Original(2));
        inspector.select_at(cx, cy, &config);
        assert_eq!(inspector.selection(), Selection::None);
        inspector.select_at(cx, cy, &config);
        inspector.select_at(1.0, 1.0, &config);
        assert_eq!(inspector.selection(), Selection::None);
    }

    #[test]
    fn loading_a_new_solution_clears_selection() {
        let mut inspector = inspector();
        let seen = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&seen);
        inspector.subscribe(move |_| *counter.borrow_mut() += 1);
        inspector.select_original_point(Some(0));
        inspector.load_solution(Solution::new("other", vec![Point::new(1.0, 1.0)]));
        assert_eq!(inspector.selection(), Selection::None);
        assert_eq!(*seen.borrow(), 2);
    }
}
