use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TourViewError};
use crate::selection::COORDINATE_TOLERANCE;

/// Stable identity of an original point: its upload position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PointId(pub usize);

/// A location in problem space (Cartesian, y grows upward).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            address: None,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn xy(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

/// A stop of the tour. `order` is the 0-based position in the visiting
/// sequence; `source` links back to the original point it visits.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutePoint {
    pub point: Point,
    pub order: usize,
    pub source: Option<PointId>,
}

impl RoutePoint {
    pub fn new(point: Point, order: usize) -> Self {
        Self {
            point,
            order,
            source: None,
        }
    }

    pub fn with_source(mut self, source: PointId) -> Self {
        self.source = Some(source);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolutionStatus {
    #[default]
    Uploaded,
    Geocoded,
    Solving,
    Solved,
    Error,
}

impl SolutionStatus {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_uppercase().as_str() {
            "UPLOADED" => Some(Self::Uploaded),
            "GEOCODED" => Some(Self::Geocoded),
            "SOLVING" => Some(Self::Solving),
            "SOLVED" => Some(Self::Solved),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub id: String,
    pub point_count: usize,
    pub original_points: Vec<Point>,
    pub route: Option<Vec<RoutePoint>>,
    pub status: SolutionStatus,
    pub total_distance: Option<f64>,
}

/// Result of defensive parsing: always a usable solution, plus whatever
/// validation failures were found on the way.
#[derive(Debug)]
pub struct ParsedSolution {
    pub solution: Solution,
    pub issues: Vec<TourViewError>,
}

impl Solution {
    /// An unsolved solution over `original_points`; original point `i`
    /// has identity `PointId(i)`.
    pub fn new(id: impl Into<String>, original_points: Vec<Point>) -> Self {
        Self {
            id: id.into(),
            point_count: original_points.len(),
            original_points,
            route: None,
            status: SolutionStatus::Uploaded,
            total_distance: None,
        }
    }

    /// Attaches a route and assigns identities the caller did not supply.
    pub fn with_route(mut self, route: Vec<RoutePoint>) -> Self {
        self.route = Some(route);
        self.status = SolutionStatus::Solved;
        self.assign_route_identities();
        self
    }

    /// Convenience for a route given as original indices in visiting order.
    pub fn with_route_indices(self, order: &[usize]) -> Self {
        let route = order
            .iter()
            .enumerate()
            .filter_map(|(position, &idx)| {
                self.original_points.get(idx).map(|point| {
                    RoutePoint::new(point.clone(), position).with_source(PointId(idx))
                })
            })
            .collect();
        self.with_route(route)
    }

    pub fn with_status(mut self, status: SolutionStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_total_distance(mut self, total: f64) -> Self {
        self.total_distance = Some(total);
        self
    }

    pub fn empty(id: impl Into<String>) -> Self {
        Self::new(id, Vec::new())
    }

    pub fn route_points(&self) -> &[RoutePoint] {
        self.route.as_deref().unwrap_or(&[])
    }

    pub fn is_solved(&self) -> bool {
        self.route.is_some()
    }

    /// Checks the structural invariants without modifying anything.
    pub fn validate(&self) -> Vec<TourViewError> {
        let mut issues = Vec::new();
        if self.original_points.len() != self.point_count {
            issues.push(TourViewError::malformed(format!(
                "pointCount is {} but {} points were supplied",
                self.point_count,
                self.original_points.len()
            )));
        }
        if let Some(route) = &self.route
            && route.len() != self.original_points.len()
        {
            issues.push(TourViewError::malformed(format!(
                "route has {} stops but the solution has {} points",
                route.len(),
                self.original_points.len()
            )));
        }
        issues
    }

    /// Fills in `source` for route stops that arrived without one.
    ///
    /// Claims the first unclaimed original point within the matching
    /// tolerance. This is a best-effort fallback: duplicated coordinates
    /// are resolved in upload order.
    fn assign_route_identities(&mut self) {
        let Some(route) = self.route.as_mut() else {
            return;
        };
        let count = self.original_points.len();
        let mut claimed = vec![false; count];
        for stop in route.iter_mut() {
            match stop.source {
                Some(PointId(idx)) if idx < count && !claimed[idx] => claimed[idx] = true,
                _ => stop.source = None,
            }
        }
        for stop in route.iter_mut().filter(|stop| stop.source.is_none()) {
            let found = self.original_points.iter().enumerate().position(|(idx, point)| {
                !claimed[idx]
                    && (point.x - stop.point.x).abs() <= COORDINATE_TOLERANCE
                    && (point.y - stop.point.y).abs() <= COORDINATE_TOLERANCE
            });
            if let Some(idx) = found {
                claimed[idx] = true;
                stop.source = Some(PointId(idx));
            } else {
                tracing::debug!(order = stop.order, "route stop has no matching original point");
            }
        }
    }

    /// Parses the camelCase wire form. Only non-JSON input is an error;
    /// every structural problem is coerced and reported in `issues`.
    pub fn from_json(input: &str) -> Result<ParsedSolution> {
        let value: Value = serde_json::from_str(input)?;
        Ok(Self::from_value(&value))
    }

    pub fn from_value(value: &Value) -> ParsedSolution {
        let mut issues = Vec::new();
        let Some(record) = value.as_object() else {
            issues.push(TourViewError::malformed("solution is not an object"));
            return ParsedSolution {
                solution: Solution::empty(""),
                issues,
            };
        };

        let id = match record.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };

        let status = match record.get("status").and_then(Value::as_str) {
            Some(token) => SolutionStatus::from_token(token).unwrap_or_else(|| {
                issues.push(TourViewError::malformed(format!("unknown status {token:?}")));
                SolutionStatus::Error
            }),
            None => SolutionStatus::Uploaded,
        };

        let original_points = match record.get("originalPoints") {
            Some(Value::Array(items)) => match parse_points(items) {
                Ok(points) => points,
                Err(issue) => {
                    issues.push(issue);
                    Vec::new()
                }
            },
            Some(_) => {
                issues.push(TourViewError::malformed("originalPoints is not a sequence"));
                Vec::new()
            }
            None => {
                issues.push(TourViewError::malformed("originalPoints is missing"));
                Vec::new()
            }
        };

        let original_points = match record.get("pointCount") {
            None | Some(Value::Null) => original_points,
            Some(declared) => match declared.as_u64() {
                Some(count) if count == original_points.len() as u64 => original_points,
                Some(count) => {
                    issues.push(TourViewError::malformed(format!(
                        "pointCount is {count} but {} points were supplied",
                        original_points.len()
                    )));
                    Vec::new()
                }
                None => {
                    issues.push(TourViewError::malformed(format!(
                        "pointCount {declared} is not a non-negative integer"
                    )));
                    Vec::new()
                }
            },
        };

        let mut solution = Solution::new(id, original_points).with_status(status);
        solution.total_distance = record.get("totalDistance").and_then(Value::as_f64);

        match record.get("route") {
            None | Some(Value::Null) => {}
            Some(Value::Array(items)) => match parse_route(items) {
                Ok(route) if route.len() == solution.point_count => {
                    let status = solution.status;
                    solution = solution.with_route(route).with_status(status);
                }
                Ok(route) => issues.push(TourViewError::malformed(format!(
                    "route has {} stops but the solution has {} points",
                    route.len(),
                    solution.point_count
                ))),
                Err(issue) => issues.push(issue),
            },
            Some(_) => issues.push(TourViewError::malformed("route is not a sequence")),
        }

        for issue in &issues {
            tracing::warn!(solution = %solution.id, %issue, "solution coerced");
        }
        ParsedSolution { solution, issues }
    }
}

fn parse_point(value: &Value, position: usize) -> Result<Point> {
    let coord = |key: &str| {
        value.get(key).and_then(Value::as_f64).filter(|v| v.is_finite()).ok_or_else(|| {
            TourViewError::malformed(format!("point {position} has no finite {key:?}"))
        })
    };
    Ok(Point {
        x: coord("x")?,
        y: coord("y")?,
        address: value
            .get("address")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

fn parse_points(items: &[Value]) -> Result<Vec<Point>> {
    items
        .iter()
        .enumerate()
        .map(|(idx, item)| parse_point(item, idx))
        .collect()
}

fn parse_route(items: &[Value]) -> Result<Vec<RoutePoint>> {
    let mut route = items
        .iter()
        .enumerate()
        .map(|(position, item)| {
            let point = parse_point(item, position)?;
            let order = item
                .get("order")
                .and_then(Value::as_u64)
                .map(|order| order as usize)
                .unwrap_or(position);
            let source = item
                .get("originalIndex")
                .and_then(Value::as_u64)
                .map(|idx| PointId(idx as usize));
            Ok(RoutePoint {
                point,
                order,
                source,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    route.sort_by_key(|stop| stop.order);
    for (position, stop) in route.iter_mut().enumerate() {
        stop.order = position;
    }
    Ok(route)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOLVED: &str = r#"{
        "id": "abc",
        "pointCount": 3,
        "status": "SOLVED",
        "totalDistance": 12.0,
        "originalPoints": [
            {"x": 0, "y": 0, "address": "Depot"},
            {"x": 3, "y": 4},
            {"x": 6, "y": 0}
        ],
        "route": [
            {"x": 0, "y": 0, "order": 0},
            {"x": 6, "y": 0, "order": 2},
            {"x": 3, "y": 4, "order": 1}
        ]
    }"#;

    #[test]
    fn parses_solved_record() {
        let parsed = Solution::from_json(SOLVED).unwrap();
        assert!(parsed.issues.is_empty(), "{:?}", parsed.issues);
        let solution = parsed.solution;
        assert_eq!(solution.id, "abc");
        assert_eq!(solution.status, SolutionStatus::Solved);
        assert_eq!(solution.original_points[0].address.as_deref(), Some("Depot"));
        let route = solution.route_points();
        assert_eq!(route[1].point.xy(), (3.0, 4.0));
        assert_eq!(route[1].order, 1);
        assert_eq!(route[1].source, Some(PointId(1)));
        assert_eq!(route[2].source, Some(PointId(2)));
    }

    #[test]
    fn missing_points_coerce_to_empty() {
        let parsed = Solution::from_json(r#"{"id": 7, "pointCount": 2}"#).unwrap();
        assert_eq!(parsed.solution.id, "7");
        assert!(parsed.solution.original_points.is_empty());
        assert_eq!(
            parsed.issues,
            vec![TourViewError::malformed("originalPoints is missing")]
        );
    }

    #[test]
    fn non_sequence_points_coerce_to_empty() {
        let parsed = Solution::from_json(r#"{"originalPoints": {"x": 1}}"#).unwrap();
        assert!(parsed.solution.original_points.is_empty());
        assert_eq!(parsed.issues.len(), 1);
    }

    #[test]
    fn point_count_mismatch_is_reported() {
        let parsed = Solution::from_json(
            r#"{"pointCount": 5, "originalPoints": [{"x": 1, "y": 2}]}"#,
        )
        .unwrap();
        assert!(parsed.solution.original_points.is_empty());
        assert!(matches!(
            parsed.issues[0],
            TourViewError::MalformedSolution { .. }
        ));
    }

    #[test]
    fn non_integer_point_count_is_reported() {
        for declared in ["-1", "\"1\"", "1.5", "true"] {
            let input = format!(r#"{{"pointCount": {declared}, "originalPoints": [{{"x": 1, "y": 2}}]}}"#);
            let parsed = Solution::from_json(&input).unwrap();
            assert!(parsed.solution.original_points.is_empty(), "{declared}");
            assert_eq!(parsed.issues.len(), 1, "{declared}");
            assert!(matches!(parsed.issues[0], TourViewError::MalformedSolution { .. }));
        }

        let parsed = Solution::from_json(r#"{"pointCount": null, "originalPoints": [{"x": 1, "y": 2}]}"#).unwrap();
        assert!(parsed.issues.is_empty());
        assert_eq!(parsed.solution.original_points.len(), 1);
    }

    #[test]
    fn syntax_error_is_json_error() {
        let err = Solution::from_json("{not json").unwrap_err();
        assert!(matches!(err, TourViewError::Json(_)));
    }

    #[test]
    fn duplicate_coordinates_claim_distinct_identities() {
        let solution = Solution::new(
            "dup",
            vec![Point::new(1.0, 1.0), Point::new(1.0, 1.0), Point::new(2.0, 2.0)],
        )
        .with_route(vec![
            RoutePoint::new(Point::new(2.0, 2.0), 0),
            RoutePoint::new(Point::new(1.0, 1.0), 1),
            RoutePoint::new(Point::new(1.0, 1.0), 2),
        ]);
        let sources: Vec<_> = solution.route_points().iter().map(|s| s.source).collect();
        assert_eq!(
            sources,
            vec![Some(PointId(2)), Some(PointId(0)), Some(PointId(1))]
        );
    }

    #[test]
    fn explicit_original_index_wins_over_coordinates() {
        let parsed = Solution::from_json(
            r#"{"originalPoints": [{"x": 1, "y": 1}, {"x": 1, "y": 1}],
                "route": [{"x": 1, "y": 1, "originalIndex": 1}, {"x": 1, "y": 1, "originalIndex": 0}]}"#,
        )
        .unwrap();
        let sources: Vec<_> = parsed
            .solution
            .route_points()
            .iter()
            .map(|s| s.source)
            .collect();
        assert_eq!(sources, vec![Some(PointId(1)), Some(PointId(0))]);
    }

    #[test]
    fn route_length_mismatch_drops_route() {
        let parsed = Solution::from_json(
            r#"{"originalPoints": [{"x": 0, "y": 0}, {"x": 1, "y": 1}],
                "route": [{"x": 0, "y": 0}]}"#,
        )
        .unwrap();
        assert!(parsed.solution.route.is_none());
        assert_eq!(parsed.issues.len(), 1);
    }
}
