use glam::{Quat, Vec3};

use crate::spline::{SplineNode, SplineSettings};

/// Smallest cross-section half-angle, degrees
const MIN_THETA: f32 = 1e-3;

/// Cross-section shape at one node, used while tessellating
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeafSegment {
    pub position: Vec3,
    pub front: Vec3,
    pub up: Vec3,
    pub half_width: f32,
    /// Degrees
    pub theta: f32,
    pub left_flatness: f32,
    pub right_flatness: f32,
    pub left_flatness_factor: f32,
    pub right_flatness_factor: f32,
    pub push: f32,
}

impl LeafSegment {
    pub fn from_node(node: &SplineNode, settings: &SplineSettings) -> Self {
        let up = Quat::from_axis_angle(node.axis, node.roll.to_radians()) * node.up;
        let (flatness, factor) = if node.is_leaf {
            (settings.edge_flatness, settings.edge_flatness_factor)
        } else {
            (0.0, 1.0)
        };
        Self {
            position: node.position,
            front: node.axis,
            up,
            half_width: node.width.max(0.0) * 0.5,
            theta: node.theta.max(MIN_THETA),
            left_flatness: flatness,
            right_flatness: flatness,
            left_flatness_factor: factor,
            right_flatness_factor: factor,
            push: node.surface_push,
        }
    }

    /// Surface point at `angle` degrees around the section.
    ///
    /// Below 90 degrees the section is a circular arc of radius
    /// `half_width / sin(theta)` whose edges are pulled down by the flatness
    /// terms; otherwise it is a plain circle of radius `half_width`.
    pub fn point(&self, angle: f32) -> Vec3 {
        let direction = Quat::from_axis_angle(self.front, angle.to_radians()) * self.up;
        if self.theta >= 90.0 {
            return self.position - direction * self.half_width;
        }

        let radius = self.half_width / self.theta.to_radians().sin();
        let distance = radius * angle.to_radians().abs().cos();
        let (flatness, factor) = if angle < 0.0 {
            (self.left_flatness, self.left_flatness_factor)
        } else {
            (self.right_flatness, self.right_flatness_factor)
        };
        let actual_height = (radius - distance) * flatness;
        let center = self.position + self.up * (radius - self.half_width * (1.0 - self.push));

        let mut compress = (actual_height / self.half_width).powf(factor);
        if !compress.is_finite() {
            compress = 0.0;
        }
        center - direction * radius - self.up * (actual_height * compress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(half_width: f32, theta: f32) -> LeafSegment {
        LeafSegment {
            position: Vec3::ZERO,
            front: Vec3::Z,
            up: Vec3::Y,
            half_width,
            theta,
            left_flatness: 0.0,
            right_flatness: 0.0,
            left_flatness_factor: 1.0,
            right_flatness_factor: 1.0,
            push: 0.0,
        }
    }

    #[test]
    fn test_round_section() {
        let s = segment(0.5, 180.0);
        assert!((s.point(0.0) - Vec3::new(0.0, -0.5, 0.0)).length() < 1e-6);
        assert!((s.point(90.0).length() - 0.5).abs() < 1e-6);
        assert!((s.point(180.0) - s.point(-180.0)).length() < 1e-5);
    }

    #[test]
    fn test_arc_spans_half_width() {
        let s = segment(0.1, 45.0);
        let left = s.point(-45.0);
        let right = s.point(45.0);
        assert!(((right - left).length() - 0.2).abs() < 1e-5);
        // Midrib sits one half-width below the node when not pushed
        assert!((s.point(0.0) - Vec3::new(0.0, -0.1, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_full_push_puts_midrib_on_node() {
        let mut s = segment(0.1, 60.0);
        s.push = 1.0;
        assert!(s.point(0.0).length() < 1e-6);
    }

    #[test]
    fn test_flatness_lowers_edges() {
        let plain = segment(0.1, 60.0);
        let mut flat = plain;
        flat.left_flatness = 0.5;
        flat.right_flatness = 0.5;
        assert!(flat.point(50.0).y < plain.point(50.0).y);
        assert!((flat.point(0.0) - plain.point(0.0)).length() < 1e-6);
    }

    #[test]
    fn test_zero_width_collapses_without_nan() {
        let mut s = segment(0.0, 60.0);
        s.left_flatness = 0.3;
        s.right_flatness = 0.3;
        for angle in [-60.0, -10.0, 0.0, 30.0, 60.0] {
            let p = s.point(angle);
            assert!(!p.is_nan());
            assert!(p.length() < 1e-6);
        }
    }
}
