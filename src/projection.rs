use serde::{Deserialize, Serialize};

use crate::error::{Result, TourViewError};

/// Target drawing surface, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub padding: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32, padding: u32) -> Self {
        Self {
            width,
            height,
            padding,
        }
    }

    /// Padding clamped so the padded area never has negative extent.
    pub fn effective_padding(&self) -> f64 {
        let half_side = self.width.min(self.height) as f64 / 2.0;
        (self.padding as f64).min(half_side)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(800, 600, 40)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectedPoint {
    pub x: f64,
    pub y: f64,
}

impl ProjectedPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Absorbs rounding at the viewport edges.
    fn clamp_to(self, width: f64, height: f64) -> Self {
        Self {
            x: self.x.clamp(0.0, width),
            y: self.y.clamp(0.0, height),
        }
    }

    pub fn distance_to(&self, other: &ProjectedPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Problem-space bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut iter = points.into_iter();
        let (x0, y0) = iter.next()?;
        let mut bounds = Bounds {
            min_x: x0,
            min_y: y0,
            max_x: x0,
            max_y: y0,
        };
        for (x, y) in iter {
            bounds.min_x = bounds.min_x.min(x);
            bounds.min_y = bounds.min_y.min(y);
            bounds.max_x = bounds.max_x.max(x);
            bounds.max_y = bounds.max_y.max(y);
        }
        Some(bounds)
    }

    /// Half the horizontal extent. Halving first keeps the difference finite
    /// for coordinates near `f64::MAX`.
    pub fn half_range_x(&self) -> f64 {
        non_degenerate(self.max_x / 2.0 - self.min_x / 2.0)
    }

    pub fn half_range_y(&self) -> f64 {
        non_degenerate(self.max_y / 2.0 - self.min_y / 2.0)
    }

    pub fn center(&self) -> (f64, f64) {
        (self.min_x / 2.0 + self.max_x / 2.0, self.min_y / 2.0 + self.max_y / 2.0)
    }
}

// A flat axis counts as one unit wide.
fn non_degenerate(half_range: f64) -> f64 {
    if half_range == 0.0 { 0.5 } else { half_range }
}

/// The affine transform produced by [`project`]. Viewport coordinates are
/// `((x - center_x)*scale + offset_x, height - ((y - center_y)*scale + offset_y))`,
/// where `(offset_x, offset_y)` is the middle of the padded viewport.
/// Subtracting the center first keeps every term finite.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectionParams {
    pub scale: f64,
    pub center_x: f64,
    pub center_y: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    pub height: f64,
    pub bounds: Bounds,
}

impl ProjectionParams {
    pub fn fit(bounds: Bounds, viewport: &Viewport) -> Result<Self> {
        if viewport.width == 0 || viewport.height == 0 {
            return Err(TourViewError::InvalidViewport {
                width: viewport.width,
                height: viewport.height,
            });
        }
        let width = viewport.width as f64;
        let height = viewport.height as f64;
        let padding = viewport.effective_padding();
        let avail_w = width - 2.0 * padding;
        let avail_h = height - 2.0 * padding;

        let scale = (avail_w / 2.0 / bounds.half_range_x()).min(avail_h / 2.0 / bounds.half_range_y());
        // Subnormal extents overflow the division.
        let scale = if scale.is_finite() { scale } else { f64::MAX };
        let (center_x, center_y) = bounds.center();

        Ok(Self {
            scale,
            center_x,
            center_y,
            offset_x: padding + avail_w / 2.0,
            offset_y: padding + avail_h / 2.0,
            height,
            bounds,
        })
    }

    pub fn apply(&self, x: f64, y: f64) -> ProjectedPoint {
        ProjectedPoint {
            x: (x - self.center_x) * self.scale + self.offset_x,
            y: self.height - ((y - self.center_y) * self.scale + self.offset_y),
        }
    }

    /// Viewport to problem space. `None` when the scale collapsed to zero.
    pub fn invert(&self, point: ProjectedPoint) -> Option<(f64, f64)> {
        if self.scale == 0.0 || !self.scale.is_finite() {
            return None;
        }
        let x = (point.x - self.offset_x) / self.scale + self.center_x;
        let y = (self.height - point.y - self.offset_y) / self.scale + self.center_y;
        Some((x, y))
    }
}

/// Projects `points` into `viewport` with one uniform scale, centered and
/// with the vertical axis flipped.
pub fn project<I>(points: I, viewport: &Viewport) -> Result<(Vec<ProjectedPoint>, ProjectionParams)>
where
    I: IntoIterator<Item = (f64, f64)>,
    I::IntoIter: Clone,
{
    let points = points.into_iter();
    let _span = tracing::debug_span!("project", width = viewport.width, height = viewport.height)
        .entered();
    let bounds = Bounds::from_points(points.clone()).ok_or(TourViewError::EmptyGeometry)?;
    let params = ProjectionParams::fit(bounds, viewport)?;
    let width = viewport.width as f64;
    let projected = points
        .map(|(x, y)| params.apply(x, y).clamp_to(width, params.height))
        .collect();
    Ok((projected, params))
}

/// Index of the projected point nearest to `pointer`, if any lies within
/// `radius` pixels. Ties resolve to the lowest index.
pub fn hit_test(pointer: ProjectedPoint, projected: &[ProjectedPoint], radius: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, point) in projected.iter().enumerate() {
        let distance = point.distance_to(&pointer);
        if distance > radius {
            continue;
        }
        match best {
            Some((_, current)) if current <= distance => {}
            _ => best = Some((idx, distance)),
        }
    }
    best.map(|(idx, _)| idx)
}
