use crate::error::{invalid, shape, Result};
use log::trace;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FramingSettings {
    /// Lower bound on the half-width of the window.
    pub min_spread: f64,
    /// Factor applied to the trajectory's extent before flooring.
    pub scale: f64,
}

impl Default for FramingSettings {
    fn default() -> Self {
        Self {
            min_spread: 5.0,
            scale: 1.1,
        }
    }
}

impl FramingSettings {
    pub fn validate(&self) -> Result<()> {
        if !self.min_spread.is_finite() || self.min_spread <= 0.0 {
            return Err(invalid(format!(
                "min_spread must be finite and positive, got {}",
                self.min_spread
            )));
        }
        if !self.scale.is_finite() || self.scale < 1.0 {
            return Err(invalid(format!(
                "scale must be finite and at least 1, got {}",
                self.scale
            )));
        }
        Ok(())
    }
}

/// Axis-aligned window around a trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Viewport {
    Interval {
        x_min: f64,
        x_max: f64,
    },
    Rectangle {
        x_min: f64,
        x_max: f64,
        y_min: f64,
        y_max: f64,
    },
}

impl Viewport {
    pub fn dimension(&self) -> usize {
        match self {
            Viewport::Interval { .. } => 1,
            Viewport::Rectangle { .. } => 2,
        }
    }

    pub fn x_range(&self) -> (f64, f64) {
        match *self {
            Viewport::Interval { x_min, x_max } | Viewport::Rectangle { x_min, x_max, .. } => {
                (x_min, x_max)
            }
        }
    }

    pub fn y_range(&self) -> Option<(f64, f64)> {
        match *self {
            Viewport::Interval { .. } => None,
            Viewport::Rectangle { y_min, y_max, .. } => Some((y_min, y_max)),
        }
    }

    pub fn width(&self) -> f64 {
        let (lo, hi) = self.x_range();
        hi - lo
    }

    pub fn height(&self) -> Option<f64> {
        self.y_range().map(|(lo, hi)| hi - lo)
    }

    fn is_finite(&self) -> bool {
        let (x_min, x_max) = self.x_range();
        let finite = |(lo, hi): (f64, f64)| lo.is_finite() && hi.is_finite();
        finite((x_min, x_max)) && self.y_range().map_or(true, finite)
    }

    /// Returns true if `point` lies inside the window (bounds included).
    pub fn contains(&self, point: &[f64]) -> bool {
        if point.len() != self.dimension() {
            return false;
        }
        let inside = |v: f64, (lo, hi): (f64, f64)| lo <= v && v <= hi;
        inside(point[0], self.x_range())
            && self.y_range().map_or(true, |range| inside(point[1], range))
    }
}

/// Frames a 1-D or 2-D trajectory.
///
/// The window is centred on the mean of each coordinate. Its half-width is
/// `max(extent * scale, min_spread)`, where in 2-D the extent is the larger of
/// the x and y ranges so both axes share one spread. Trajectories whose window
/// would not fit in the finite range of `f64` are rejected.
pub fn frame<P: AsRef<[f64]>>(points: &[P], settings: &FramingSettings) -> Result<Viewport> {
    settings.validate()?;
    let first = points
        .first()
        .ok_or_else(|| shape("cannot frame an empty trajectory"))?;
    let dim = first.as_ref().len();
    if dim != 1 && dim != 2 {
        return Err(shape(format!(
            "trajectory must be 1- or 2-dimensional, got dimension {dim}"
        )));
    }
    if let Some(bad) = points.iter().position(|p| p.as_ref().len() != dim) {
        return Err(shape(format!(
            "point {bad} has dimension {}, expected {dim}",
            points[bad].as_ref().len()
        )));
    }
    if points.iter().flat_map(|p| p.as_ref()).any(|v| !v.is_finite()) {
        return Err(invalid("trajectory contains non-finite coordinates"));
    }

    let axes: Vec<AxisStats> = (0..dim)
        .map(|axis| AxisStats::collect(points.iter().map(|p| p.as_ref()[axis])))
        .collect();
    let extent = axes.iter().map(AxisStats::extent).fold(0.0, f64::max);
    // Far from the origin `min_spread` can vanish below the spacing of f64;
    // a few ulps of the largest center keep the bounds distinct.
    let largest_center = axes.iter().map(|a| a.center.abs()).fold(0.0, f64::max);
    let resolution = largest_center * 4.0 * f64::EPSILON;
    let spread = (extent * settings.scale)
        .max(settings.min_spread)
        .max(resolution);

    let x = &axes[0];
    let viewport = match axes.get(1) {
        None => Viewport::Interval {
            x_min: x.center - spread,
            x_max: x.center + spread,
        },
        Some(y) => Viewport::Rectangle {
            x_min: x.center - spread,
            x_max: x.center + spread,
            y_min: y.center - spread,
            y_max: y.center + spread,
        },
    };
    if !viewport.is_finite() {
        return Err(invalid(format!(
            "trajectory is too large to frame: extent {extent}, spread {spread}"
        )));
    }
    trace!("framed {} points into {viewport:?}", points.len());
    Ok(viewport)
}

struct AxisStats {
    center: f64,
    min: f64,
    max: f64,
}

impl AxisStats {
    /// `values` must be finite and non-empty.
    fn collect(values: impl ExactSizeIterator<Item = f64>) -> Self {
        let count = values.len() as f64;
        let mut center = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        // Dividing before summing keeps the partial sums within max(|v|).
        for v in values {
            center += v / count;
            min = min.min(v);
            max = max.max(v);
        }
        Self {
            center: center.clamp(min, max),
            min,
            max,
        }
    }

    fn extent(&self) -> f64 {
        (self.max - self.min).abs()
    }
}
