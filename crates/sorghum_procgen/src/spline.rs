//! Stem and leaf skeletons.
//!
//! Each organ is an ordered run of [`SplineNode`]s built in one pass from a
//! ready descriptor. Splines are rebuilt wholesale on regeneration and never
//! edited in place.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::descriptor::{LeafDescriptor, StemDescriptor};
use crate::tropism::apply_tropism;

/// Sheath rings sit slightly outside the stem surface
const SHEATH_WRAP: f32 = 1.1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplineSettings {
    /// Arc length between consecutive nodes
    pub unit_length: f32,
    /// Quads around each cross-section
    pub ring_segments: u32,
    /// Extra cross-sections between two nodes
    pub subdivisions: u32,
    /// Nodes of the sheath wrapped around the stem
    pub sheath_units: u32,
    /// Half-angle of the folded blade cross-section, degrees
    pub blade_fold_angle: f32,
    pub min_stem_width: f32,
    pub edge_flatness: f32,
    pub edge_flatness_factor: f32,
}

impl Default for SplineSettings {
    fn default() -> Self {
        Self {
            unit_length: 0.05,
            ring_segments: 12,
            subdivisions: 2,
            sheath_units: 4,
            blade_fold_angle: 60.0,
            min_stem_width: 0.003,
            edge_flatness: 0.2,
            edge_flatness_factor: 2.0,
        }
    }
}

impl SplineSettings {
    /// Coarse settings for large batches
    pub fn low_detail() -> Self {
        Self {
            unit_length: 0.1,
            ring_segments: 6,
            subdivisions: 0,
            sheath_units: 2,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplineNode {
    pub position: Vec3,
    /// Cross-section half-angle in degrees; >= 90 means a round section
    pub theta: f32,
    /// Waviness roll about `axis`, degrees
    pub roll: f32,
    /// Full cross-section width
    pub width: f32,
    /// Heading
    pub axis: Vec3,
    /// Cross-section reference, orthogonal to `axis`
    pub up: Vec3,
    pub is_leaf: bool,
    pub surface_push: f32,
    /// Arc length from the organ start
    pub distance: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrganKind {
    Stem,
    Leaf { index: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrganSpline {
    pub kind: OrganKind,
    pub nodes: Vec<SplineNode>,
}

/// Stem frame interpolated at an arc length
#[derive(Debug, Clone, Copy)]
pub struct StemFrame {
    pub position: Vec3,
    pub axis: Vec3,
    pub up: Vec3,
    pub width: f32,
}

impl OrganSpline {
    pub fn length(&self) -> f32 {
        self.nodes.last().map_or(0.0, |n| n.distance)
    }

    pub fn first(&self) -> Option<&SplineNode> {
        self.nodes.first()
    }

    pub fn last(&self) -> Option<&SplineNode> {
        self.nodes.last()
    }

    /// Interpolated frame at `fraction` of the spline length
    pub fn frame_at(&self, fraction: f32) -> Option<StemFrame> {
        let first = self.nodes.first()?;
        let target = fraction.clamp(0.0, 1.0) * self.length();

        let Some(k) = self.nodes.windows(2).position(|w| target <= w[1].distance) else {
            let last = self.nodes.last().unwrap_or(first);
            return Some(StemFrame {
                position: last.position,
                axis: last.axis,
                up: last.up,
                width: last.width,
            });
        };
        let a = &self.nodes[k];
        let b = &self.nodes[k + 1];
        let span = b.distance - a.distance;
        let t = if span > 0.0 {
            (target - a.distance) / span
        } else {
            0.0
        };
        let axis = a.axis.lerp(b.axis, t).normalize_or_zero();
        let up = a.up.lerp(b.up, t);
        let up = (up - axis * up.dot(axis)).normalize_or_zero();
        Some(StemFrame {
            position: a.position.lerp(b.position, t),
            axis: if axis == Vec3::ZERO { a.axis } else { axis },
            up: if up == Vec3::ZERO { a.up } else { up },
            width: a.width + (b.width - a.width) * t,
        })
    }
}

fn unit_count(length: f32, unit_length: f32) -> usize {
    if !(unit_length > 0.0) || !(length > 0.0) {
        return 1;
    }
    ((length / unit_length).round() as usize).max(1)
}

/// Stem skeleton starting at the origin
pub fn build_stem(stem: &StemDescriptor, settings: &SplineSettings) -> OrganSpline {
    let n = unit_count(stem.length, settings.unit_length);
    let step = stem.length.max(0.0) / n as f32;

    let mut front = stem.direction.normalize_or_zero();
    if front == Vec3::ZERO {
        front = Vec3::Y;
    }
    let reference = if front.x.abs() > 0.9 { Vec3::Z } else { Vec3::X };
    let mut up = front.cross(reference).cross(front).normalize();
    let mut position = Vec3::ZERO;

    let mut nodes = Vec::with_capacity(n + 1);
    for i in 0..=n {
        let t = i as f32 / n as f32;
        let width = (stem.width_max * stem.width_distribution.evaluate(t)).max(settings.min_stem_width);
        nodes.push(SplineNode {
            position,
            theta: 180.0,
            roll: 0.0,
            width,
            axis: front,
            up,
            is_leaf: false,
            surface_push: 0.0,
            distance: i as f32 * step,
        });
        if i < n {
            apply_tropism(Vec3::NEG_Y, stem.gravitropism_factor, &mut front, &mut up);
            position += front * step;
        }
    }

    OrganSpline {
        kind: OrganKind::Stem,
        nodes,
    }
}

/// Leaf skeleton: sheath nodes along the stem followed by the blade
pub fn build_leaf(stem: &OrganSpline, leaf: &LeafDescriptor, settings: &SplineSettings) -> OrganSpline {
    let kind = OrganKind::Leaf {
        index: leaf.leaf_index,
    };
    let Some(base) = stem.frame_at(leaf.starting_point) else {
        return OrganSpline {
            kind,
            nodes: Vec::new(),
        };
    };

    let unit = settings.unit_length.max(1e-4);
    let sheath_width = base.width * SHEATH_WRAP;
    let mut nodes = Vec::new();
    let mut position = base.position;
    let mut distance = 0.0;

    for _ in 0..settings.sheath_units {
        nodes.push(SplineNode {
            position,
            theta: 180.0,
            roll: 0.0,
            width: sheath_width,
            axis: base.axis,
            up: base.up,
            is_leaf: false,
            surface_push: 0.0,
            distance,
        });
        position += base.axis * unit;
        distance += unit;
    }

    // Blade heading: stem axis tilted by the branching angle toward the
    // outward direction picked by the roll angle
    let outward = Quat::from_axis_angle(base.axis, leaf.roll_angle.to_radians()) * base.up;
    let branching = leaf.branching_angle.to_radians();
    let mut front = (base.axis * branching.cos() + outward * branching.sin()).normalize_or_zero();
    if front == Vec3::ZERO {
        front = base.axis;
    }
    let left = outward.cross(base.axis).normalize_or_zero();
    let mut up = left.cross(front).normalize_or_zero();
    if up == Vec3::ZERO {
        up = base.up;
    }

    let n = unit_count(leaf.length, unit);
    let step = leaf.length.max(0.0) / n as f32;
    let blade_start = distance;
    let decrease_start = leaf.width_decrease_start.clamp(0.0, 1.0);

    for k in 0..=n {
        let t = k as f32 / n as f32;
        let width = if t < decrease_start {
            sheath_width + (leaf.leaf_max_width - sheath_width) * (t / decrease_start)
        } else if decrease_start < 1.0 {
            leaf.leaf_max_width * (1.0 - (t - decrease_start) / (1.0 - decrease_start))
        } else {
            leaf.leaf_max_width
        };
        let along = k as f32 * step;
        let roll = if leaf.waviness_period > 0.0 {
            leaf.waviness * (std::f32::consts::TAU * along / leaf.waviness_period).sin()
        } else {
            0.0
        };
        let surface_push = if settings.sheath_units > 0 {
            (1.0 - k as f32 / settings.sheath_units as f32).max(0.0)
        } else {
            0.0
        };

        nodes.push(SplineNode {
            position,
            theta: settings.blade_fold_angle,
            roll,
            width: width.max(0.0),
            axis: front,
            up,
            is_leaf: true,
            surface_push,
            distance: blade_start + along,
        });

        if k < n {
            let bend = (leaf.gravitropism + k as f32 * leaf.gravitropism_factor).to_radians();
            let max_angle = front.dot(Vec3::NEG_Y).clamp(-1.0, 1.0).acos();
            if max_angle > 1e-6 {
                apply_tropism(Vec3::NEG_Y, bend / max_angle, &mut front, &mut up);
            }
            position += front * step;
        }
    }

    OrganSpline { kind, nodes }
}
