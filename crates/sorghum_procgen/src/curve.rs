use serde::{Deserialize, Serialize};
use sorghum_core::{Error, Result};

/// Response curve over [0, 1]: control points joined by cubic Hermite
/// segments, with explicit slopes at the first and last point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseCurve {
    /// (x, y) pairs, x strictly increasing within [0, 1]
    pub points: Vec<[f32; 2]>,
    /// dy/dx at the first point
    pub start_tangent: f32,
    /// dy/dx at the last point
    pub end_tangent: f32,
}

impl Default for ResponseCurve {
    fn default() -> Self {
        Self::constant(1.0)
    }
}

impl ResponseCurve {
    /// Straight line from `start` at x=0 to `end` at x=1
    pub fn new(start: f32, end: f32) -> Self {
        let slope = end - start;
        Self {
            points: vec![[0.0, start], [1.0, end]],
            start_tangent: slope,
            end_tangent: slope,
        }
    }

    pub fn constant(value: f32) -> Self {
        Self::new(value, value)
    }

    pub fn with_points(points: Vec<[f32; 2]>, start_tangent: f32, end_tangent: f32) -> Self {
        Self {
            points,
            start_tangent,
            end_tangent,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.points.is_empty() {
            return Err(Error::config("response curve has no control points"));
        }
        for point in &self.points {
            if !(0.0..=1.0).contains(&point[0]) || !point[1].is_finite() {
                return Err(Error::config(format!(
                    "response curve control point {:?} outside [0, 1]",
                    point
                )));
            }
        }
        if self.points.windows(2).any(|w| w[1][0] <= w[0][0]) {
            return Err(Error::config(
                "response curve control points must have increasing x",
            ));
        }
        Ok(())
    }

    /// Evaluate at `t`, clamped to [0, 1] and then to the control point span
    pub fn evaluate(&self, t: f32) -> f32 {
        let (first, last) = match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return 0.0,
        };
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        if t <= first[0] || self.points.len() == 1 {
            return first[1];
        }
        if t >= last[0] {
            return last[1];
        }

        let k = self
            .points
            .windows(2)
            .position(|w| t <= w[1][0])
            .unwrap_or(self.points.len() - 2);
        let p0 = self.points[k];
        let p1 = self.points[k + 1];
        let h = p1[0] - p0[0];
        if h <= 0.0 {
            return p0[1];
        }

        let m0 = self.slope_at(k);
        let m1 = self.slope_at(k + 1);
        let s = (t - p0[0]) / h;
        let s2 = s * s;
        let s3 = s2 * s;

        let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
        let h10 = s3 - 2.0 * s2 + s;
        let h01 = -2.0 * s3 + 3.0 * s2;
        let h11 = s3 - s2;

        h00 * p0[1] + h10 * h * m0 + h01 * p1[1] + h11 * h * m1
    }

    fn slope_at(&self, index: usize) -> f32 {
        let last = self.points.len() - 1;
        if index == 0 {
            return self.start_tangent;
        }
        if index == last {
            return self.end_tangent;
        }
        let prev = self.points[index - 1];
        let next = self.points[index + 1];
        let dx = next[0] - prev[0];
        if dx > 0.0 {
            (next[1] - prev[1]) / dx
        } else {
            0.0
        }
    }
}
