//! Sweep leaf-segment rings along an organ spline.

use glam::Vec3;
use sorghum_core::{Mesh, MeshVertex};

use crate::leaf_segment::LeafSegment;
use crate::spline::{OrganKind, OrganSpline, SplineNode, SplineSettings};

/// Semantic vertex colors read back by the scanner's part decoding
pub const STEM_COLOR: [f32; 3] = [0.0, 0.0, 1.0];
pub const SHEATH_COLOR: [f32; 3] = [1.0, 0.0, 0.0];
pub const BLADE_COLOR: [f32; 3] = [0.0, 1.0, 0.0];

fn node_color(kind: OrganKind, node: &SplineNode) -> [f32; 3] {
    match kind {
        OrganKind::Stem => STEM_COLOR,
        OrganKind::Leaf { .. } if node.is_leaf => BLADE_COLOR,
        OrganKind::Leaf { .. } => SHEATH_COLOR,
    }
}

/// Cross-section between two nodes on the cubic Bezier through them
fn interpolate(a: &SplineNode, b: &SplineNode, t: f32) -> SplineNode {
    let chord = a.position.distance(b.position);
    let p0 = a.position;
    let p1 = a.position + a.axis * chord * 0.2;
    let p2 = b.position - b.axis * chord * 0.2;
    let p3 = b.position;

    let u = 1.0 - t;
    let position = p0 * (u * u * u) + p1 * (3.0 * u * u * t) + p2 * (3.0 * u * t * t) + p3 * (t * t * t);
    let tangent = (p1 - p0) * (3.0 * u * u) + (p2 - p1) * (6.0 * u * t) + (p3 - p2) * (3.0 * t * t);
    let axis = match tangent.try_normalize() {
        Some(axis) => axis,
        None => a.axis.lerp(b.axis, t).normalize_or_zero(),
    };
    let up = a.up.lerp(b.up, t);
    let up = (up - axis * up.dot(axis)).normalize_or_zero();

    SplineNode {
        position,
        theta: a.theta + (b.theta - a.theta) * t,
        roll: a.roll + (b.roll - a.roll) * t,
        width: a.width + (b.width - a.width) * t,
        axis,
        up: if up == Vec3::ZERO { a.up } else { up },
        is_leaf: a.is_leaf,
        surface_push: a.surface_push + (b.surface_push - a.surface_push) * t,
        distance: a.distance + (b.distance - a.distance) * t,
    }
}

/// Every cross-section of the organ, nodes plus subdivisions
fn sections(spline: &OrganSpline, subdivisions: u32) -> Vec<SplineNode> {
    let mut out = Vec::new();
    for pair in spline.nodes.windows(2) {
        out.push(pair[0]);
        for s in 1..=subdivisions {
            let t = s as f32 / (subdivisions + 1) as f32;
            out.push(interpolate(&pair[0], &pair[1], t));
        }
    }
    if let Some(last) = spline.nodes.last() {
        out.push(*last);
    }
    out
}

/// Triangulated surface of one organ. Fewer than two nodes yields an empty
/// mesh.
pub fn tessellate_organ(spline: &OrganSpline, settings: &SplineSettings) -> Mesh {
    if spline.nodes.len() < 2 {
        return Mesh::default();
    }
    let segments = settings.ring_segments.max(1) as usize;
    let ring = segments + 1;
    let sections = sections(spline, settings.subdivisions);
    let total = spline.length().max(f32::EPSILON);

    let mut vertices = Vec::with_capacity(sections.len() * ring);
    for node in &sections {
        let segment = LeafSegment::from_node(node, settings);
        let span = if segment.theta < 90.0 { segment.theta } else { 180.0 };
        let color = node_color(spline.kind, node);
        let v = node.distance / total;

        for j in 0..ring {
            let fraction = j as f32 / segments as f32;
            let angle = -span + 2.0 * span * fraction;
            vertices.push(MeshVertex::new(segment.point(angle), color, [fraction, v]));
        }
    }

    let mut indices = Vec::with_capacity((sections.len() - 1) * segments * 6);
    for s in 0..sections.len() - 1 {
        let base = (s * ring) as u32;
        for j in 0..segments as u32 {
            let i0 = base + j;
            let i1 = i0 + 1;
            let i2 = i0 + ring as u32;
            let i3 = i2 + 1;

            indices.extend_from_slice(&[i0, i2, i1, i1, i2, i3]);
        }
    }

    let mut mesh = Mesh::new(vertices, indices);
    mesh.recalculate_normals();
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{LeafDescriptor, StemDescriptor};
    use crate::spline::{build_leaf, build_stem};

    #[test]
    fn test_ring_counts() {
        let settings = SplineSettings {
            unit_length: 0.125,
            ring_segments: 8,
            subdivisions: 1,
            ..Default::default()
        };
        let stem = build_stem(&StemDescriptor::default(), &settings);
        let mesh = tessellate_organ(&stem, &settings);

        // 8 nodes, one extra section per gap
        let sections = 8 + 7;
        assert_eq!(mesh.vertices.len(), sections * 9);
        assert_eq!(mesh.triangle_count(), (sections - 1) * 8 * 2);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()));
        assert!(mesh.vertices.iter().all(|v| v.color == STEM_COLOR));
    }

    #[test]
    fn test_leaf_colors_split_sheath_and_blade() {
        let settings = SplineSettings::default();
        let stem = build_stem(&StemDescriptor::default(), &settings);
        let leaf = build_leaf(&stem, &LeafDescriptor::default(), &settings);
        let mesh = tessellate_organ(&leaf, &settings);
        assert!(mesh.vertices.iter().any(|v| v.color == SHEATH_COLOR));
        assert!(mesh.vertices.iter().any(|v| v.color == BLADE_COLOR));
    }

    #[test]
    fn test_degenerate_spline_is_safe() {
        let settings = SplineSettings::default();
        let stem = build_stem(
            &StemDescriptor {
                length: 0.0,
                width_max: 0.0,
                ..Default::default()
            },
            &SplineSettings {
                min_stem_width: 0.0,
                ..settings
            },
        );
        let mesh = tessellate_organ(&stem, &settings);
        for v in &mesh.vertices {
            assert!(!Vec3::from_array(v.position).is_nan());
            assert!(!Vec3::from_array(v.normal).is_nan());
        }

        let single = OrganSpline {
            kind: OrganKind::Stem,
            nodes: stem.nodes[..1].to_vec(),
        };
        assert!(tessellate_organ(&single, &settings).is_empty());
    }

    #[test]
    fn test_leaf_tip_collapses() {
        let settings = SplineSettings::default();
        let stem = build_stem(&StemDescriptor::default(), &settings);
        let leaf = build_leaf(&stem, &LeafDescriptor::default(), &settings);
        let mesh = tessellate_organ(&leaf, &settings);
        let ring = settings.ring_segments as usize + 1;
        let tip = &mesh.vertices[mesh.vertices.len() - ring..];
        let first = Vec3::from_array(tip[0].position);
        assert!(tip
            .iter()
            .all(|v| Vec3::from_array(v.position).distance(first) < 1e-6));
    }
}
