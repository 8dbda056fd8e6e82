//! Property-based invariant tests for projection, route metrics and
//! selection linking.
//!
//! 1. Projected points stay inside the padded viewport, for any finite
//!    coordinates.
//! 2. Projection is deterministic.
//! 3. Segment distances sum to the total.
//! 4. Cumulative distances are non-decreasing and end at the total.
//! 5. Linking is symmetric for pairwise-distinct points.
//! 6. Degenerate routes never panic.
//! 7. Applying a tree diff reproduces the target tree.

use proptest::prelude::*;
use tourview::metrics::{RouteMetrics, cumulative_distances, segment_distances, total_distance};
use tourview::projection::{Viewport, project};
use tourview::render::{ShapeTree, diff};
use tourview::scene::{SceneInput, build_scene};
use tourview::selection::{SelectionLinker, resolve_original_index_from_route, resolve_route_index_from_original};
use tourview::{Point, SceneConfig, Selection, Solution, Theme};

// ── Helpers ─────────────────────────────────────────────────────────────

fn coord_strategy() -> impl Strategy<Value = (f64, f64)> {
    (-1.0e4..1.0e4f64, -1.0e4..1.0e4f64)
}

fn points_strategy(max: usize) -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop::collection::vec(coord_strategy(), 1..max)
}

fn viewport_strategy() -> impl Strategy<Value = Viewport> {
    (1u32..=2000, 1u32..=2000, 0u32..=400).prop_map(|(w, h, p)| Viewport::new(w, h, p))
}

/// Integer grid points, deduplicated so coordinate matching is exact.
fn distinct_points_strategy() -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop::collection::btree_set((-500i32..500, -500i32..500), 1..40)
        .prop_map(|set| set.into_iter().map(|(x, y)| (x as f64, y as f64)).collect())
}

fn relative_error(a: f64, b: f64) -> f64 {
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() / scale
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Containment
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn projected_points_stay_in_viewport(points in points_strategy(64), viewport in viewport_strategy()) {
        let (projected, params) = project(points.iter().copied(), &viewport).unwrap();
        prop_assert_eq!(projected.len(), points.len());
        prop_assert!(params.scale >= 0.0);
        for point in &projected {
            prop_assert!(point.x >= 0.0 && point.x <= viewport.width as f64, "x out of range: {:?}", point);
            prop_assert!(point.y >= 0.0 && point.y <= viewport.height as f64, "y out of range: {:?}", point);
        }
    }

    #[test]
    fn full_range_coordinates_stay_in_viewport(
        points in prop::collection::vec((prop::num::f64::NORMAL, prop::num::f64::NORMAL), 1..16),
        viewport in viewport_strategy(),
    ) {
        let (projected, params) = project(points.iter().copied(), &viewport).unwrap();
        prop_assert!(params.scale.is_finite() && params.scale >= 0.0);
        prop_assert!(params.offset_x.is_finite() && params.offset_y.is_finite());
        for point in &projected {
            prop_assert!(point.x >= 0.0 && point.x <= viewport.width as f64, "x out of range: {:?}", point);
            prop_assert!(point.y >= 0.0 && point.y <= viewport.height as f64, "y out of range: {:?}", point);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Determinism
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn projection_is_deterministic(points in points_strategy(32), viewport in viewport_strategy()) {
        let first = project(points.iter().copied(), &viewport).unwrap();
        let second = project(points.iter().copied(), &viewport).unwrap();
        prop_assert_eq!(first, second);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Distance decomposition
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn segments_sum_to_total(route in points_strategy(64)) {
        let segments = segment_distances(&route);
        prop_assert_eq!(segments.len(), route.len());
        let sum: f64 = segments.iter().sum();
        let total = total_distance(&route);
        prop_assert!(relative_error(sum, total) <= 1e-9, "sum={} total={}", sum, total);
        prop_assert!(segments.iter().all(|segment| *segment >= 0.0));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Cumulative monotonicity
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn cumulative_is_monotone_and_ends_at_total(route in points_strategy(64)) {
        let metrics = RouteMetrics::compute(&route);
        let cumulative = cumulative_distances(&metrics.segments);
        prop_assert_eq!(&cumulative, &metrics.cumulative);
        for pair in cumulative.windows(2) {
            prop_assert!(pair[0] <= pair[1]);
        }
        let last = cumulative.last().copied().unwrap_or(0.0);
        prop_assert!(relative_error(last, metrics.total) <= 1e-9);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Selection symmetry
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn linking_round_trips_for_distinct_points(
        (coords, order) in distinct_points_strategy().prop_flat_map(|coords| {
            let len = coords.len();
            (Just(coords), Just((0..len).collect::<Vec<usize>>()).prop_shuffle())
        })
    ) {
        let points: Vec<Point> = coords.iter().map(|&(x, y)| Point::new(x, y)).collect();
        let solution = Solution::new("prop", points).with_route_indices(&order);
        let linker = SelectionLinker::new(&solution);
        let route = solution.route_points();
        for original in 0..coords.len() {
            let route_idx = resolve_route_index_from_original(original, &solution.original_points, route);
            prop_assert!(route_idx.is_some());
            let back = route_idx.and_then(|idx| resolve_original_index_from_route(idx, &solution.original_points, route));
            prop_assert_eq!(back, Some(original));
            prop_assert_eq!(linker.route_index_of(original), route_idx);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 6. Degenerate inputs
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn single_stop_route_has_one_zero_segment(point in coord_strategy()) {
        let metrics = RouteMetrics::compute(&[point]);
        prop_assert_eq!(metrics.segments, vec![0.0]);
        prop_assert_eq!(metrics.total, 0.0);
    }

    #[test]
    fn out_of_range_lookups_are_none(index in 0usize..1000) {
        let solution = Solution::new("one", vec![Point::new(1.0, 2.0)]).with_route_indices(&[0]);
        let route = solution.route_points();
        let expected = (index == 0).then_some(0);
        prop_assert_eq!(resolve_route_index_from_original(index, &solution.original_points, route), expected);
        prop_assert_eq!(resolve_original_index_from_route(index, &solution.original_points, route), expected);
    }

    #[test]
    fn identical_points_never_panic(point in coord_strategy(), count in 1usize..20, viewport in viewport_strategy()) {
        let points = vec![point; count];
        let (projected, _) = project(points.iter().copied(), &viewport).unwrap();
        prop_assert!(projected.windows(2).all(|pair| pair[0] == pair[1]));
        let metrics = RouteMetrics::compute(&points);
        prop_assert!(metrics.segments.iter().all(|segment| *segment == 0.0));
    }
}

#[test]
fn empty_route_is_empty() {
    let metrics = RouteMetrics::compute(&[]);
    assert!(metrics.segments.is_empty());
    assert!(metrics.cumulative.is_empty());
    assert_eq!(metrics.total, 0.0);
}

// ═════════════════════════════════════════════════════════════════════════
// 7. Retained diff
// ═════════════════════════════════════════════════════════════════════════

fn tree_for(coords: &[(f64, f64)], selection: Selection, theme: &Theme) -> ShapeTree {
    let viewport = Viewport::new(400, 300, 20);
    let (projected, params) = project(coords.iter().copied(), &viewport).unwrap();
    let metrics = RouteMetrics::compute(coords);
    let scene = build_scene(
        &SceneInput {
            viewport,
            points: &projected,
            route: &projected,
            metrics: &metrics,
            origin: Some(0),
            bounds: Some(params.bounds),
        },
        selection,
        theme,
        &SceneConfig::default(),
    );
    ShapeTree::from_scene(&scene)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn diff_then_apply_reaches_target(
        old in points_strategy(12),
        new in points_strategy(12),
        old_sel in 0usize..12,
        dark in any::<bool>(),
    ) {
        let old_tree = tree_for(&old, Selection::Original(old_sel), &Theme::light());
        let theme = if dark { Theme::dark() } else { Theme::light() };
        let new_tree = tree_for(&new, Selection::Route(0), &theme);
        let mut mounted = old_tree.clone();
        mounted.apply(&diff(&old_tree, &new_tree));
        prop_assert_eq!(mounted, new_tree);
    }
}
