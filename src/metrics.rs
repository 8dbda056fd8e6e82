use serde::Serialize;

/// Distances of a closed tour, in problem-space units.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RouteMetrics {
    /// `segments[i]` runs from stop `i` to stop `(i + 1) % len`.
    pub segments: Vec<f64>,
    /// `cumulative[i]` is the sum of `segments[0..=i]`.
    pub cumulative: Vec<f64>,
    pub total: f64,
}

impl RouteMetrics {
    pub fn compute(route: &[(f64, f64)]) -> Self {
        let segments = segment_distances(route);
        let cumulative = cumulative_distances(&segments);
        let total = cumulative.last().copied().unwrap_or(0.0);
        Self {
            segments,
            cumulative,
            total,
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segment(&self, idx: usize) -> Option<f64> {
        self.segments.get(idx).copied()
    }
}

pub fn segment_distances(route: &[(f64, f64)]) -> Vec<f64> {
    let len = route.len();
    if len < 2 {
        return vec![0.0; len];
    }
    (0..len)
        .map(|idx| {
            let (x1, y1) = route[idx];
            let (x2, y2) = route[(idx + 1) % len];
            (x2 - x1).hypot(y2 - y1)
        })
        .collect()
}

pub fn cumulative_distances(segments: &[f64]) -> Vec<f64> {
    segments
        .iter()
        .scan(0.0_f64, |acc, segment| {
            *acc += segment;
            Some(*acc)
        })
        .collect()
}

pub fn total_distance(route: &[(f64, f64)]) -> f64 {
    segment_distances(route).iter().sum()
}
