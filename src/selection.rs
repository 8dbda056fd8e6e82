use serde::Serialize;

use crate::error::TourViewError;
use crate::solution::{Point, PointId, RoutePoint, Solution};

/// Absolute per-axis tolerance for coordinate matching.
pub const COORDINATE_TOLERANCE: f64 = 1e-3;

fn coordinates_match(a: &Point, b: &Point) -> bool {
    (a.x - b.x).abs() <= COORDINATE_TOLERANCE && (a.y - b.y).abs() <= COORDINATE_TOLERANCE
}

/// First route stop whose coordinates match `original_points[original_index]`.
///
/// Best effort: duplicate or near-duplicate points all resolve to the
/// first match.
pub fn resolve_route_index_from_original(
    original_index: usize,
    original_points: &[Point],
    route: &[RoutePoint],
) -> Option<usize> {
    let target = original_points.get(original_index)?;
    route
        .iter()
        .position(|stop| coordinates_match(&stop.point, target))
}

/// First original point whose coordinates match `route[route_index]`.
pub fn resolve_original_index_from_route(
    route_index: usize,
    original_points: &[Point],
    route: &[RoutePoint],
) -> Option<usize> {
    let target = &route.get(route_index)?.point;
    original_points
        .iter()
        .position(|point| coordinates_match(point, target))
}

/// Which view owns the highlight. At most one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "kind", content = "index", rename_all = "camelCase")]
pub enum Selection {
    #[default]
    None,
    Original(usize),
    Route(usize),
}

impl Selection {
    pub fn is_none(&self) -> bool {
        matches!(self, Selection::None)
    }
}

/// Both indices of the selected point, as far as they can be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedSelection {
    pub original_index: Option<usize>,
    pub route_index: Option<usize>,
}

/// Identity-based mapping between upload order and visiting order for
/// one solution. Built once per solution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionLinker {
    original_to_route: Vec<Option<usize>>,
    route_to_original: Vec<Option<usize>>,
}

impl SelectionLinker {
    /// Route stops with a `source` identity link by identity. Stops
    /// without one use the coordinate matcher.
    pub fn new(solution: &Solution) -> Self {
        let points = &solution.original_points;
        let route = solution.route_points();
        let mut original_to_route = vec![None; points.len()];
        let mut route_to_original = vec![None; route.len()];

        for (route_idx, stop) in route.iter().enumerate() {
            let original = match stop.source {
                Some(PointId(idx)) if idx < points.len() => Some(idx),
                _ => resolve_original_index_from_route(route_idx, points, route),
            };
            route_to_original[route_idx] = original;
            if let Some(idx) = original
                && original_to_route[idx].is_none()
            {
                original_to_route[idx] = Some(route_idx);
            }
        }

        Self {
            original_to_route,
            route_to_original,
        }
    }

    pub fn route_index_of(&self, original_index: usize) -> Option<usize> {
        self.original_to_route.get(original_index).copied().flatten()
    }

    pub fn original_index_of(&self, route_index: usize) -> Option<usize> {
        self.route_to_original.get(route_index).copied().flatten()
    }

    pub fn original_len(&self) -> usize {
        self.original_to_route.len()
    }

    pub fn route_len(&self) -> usize {
        self.route_to_original.len()
    }

    pub fn link(&self, selection: Selection) -> LinkedSelection {
        match selection {
            Selection::None => LinkedSelection::default(),
            Selection::Original(idx) => LinkedSelection {
                original_index: Some(idx),
                route_index: self.route_index_of(idx),
            },
            Selection::Route(idx) => LinkedSelection {
                original_index: self.original_index_of(idx),
                route_index: Some(idx),
            },
        }
    }
}

/// Emitted whenever the active selection changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionChange {
    pub previous: Selection,
    pub current: Selection,
    pub linked: LinkedSelection,
}

/// The single shared selection of both views.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionState {
    current: Selection,
}

/// Outcome of one selection event.
#[derive(Debug, PartialEq)]
pub struct SelectionUpdate {
    pub change: Option<SelectionChange>,
    pub issue: Option<TourViewError>,
}

impl SelectionState {
    pub fn current(&self) -> Selection {
        self.current
    }

    pub fn clear(&mut self) -> Option<Selection> {
        let previous = std::mem::take(&mut self.current);
        (!previous.is_none()).then_some(previous)
    }

    /// Activates `index` in the table view. Re-selecting the active index
    /// toggles it off; an out of range index acts as `None`.
    pub fn select_original(&mut self, index: Option<usize>, linker: &SelectionLinker) -> SelectionUpdate {
        let len = linker.original_len();
        self.apply(index, len, Selection::Original, linker)
    }

    /// Activates `index` in the geometric view.
    pub fn select_route(&mut self, index: Option<usize>, linker: &SelectionLinker) -> SelectionUpdate {
        let len = linker.route_len();
        self.apply(index, len, Selection::Route, linker)
    }

    fn apply(
        &mut self,
        index: Option<usize>,
        len: usize,
        make: fn(usize) -> Selection,
        linker: &SelectionLinker,
    ) -> SelectionUpdate {
        let mut issue = None;
        let requested = match index {
            Some(idx) if idx < len => make(idx),
            Some(idx) => {
                tracing::warn!(index = idx, len, "selection out of range, clearing");
                issue = Some(TourViewError::SelectionOutOfRange { index: idx, len });
                Selection::None
            }
            None => Selection::None,
        };
        let next = if requested == self.current {
            Selection::None
        } else {
            requested
        };
        let previous = self.current;
        self.current = next;
        let change = (previous != next).then(|| SelectionChange {
            previous,
            current: next,
            linked: linker.link(next),
        });
        SelectionUpdate { change, issue }
    }
}
