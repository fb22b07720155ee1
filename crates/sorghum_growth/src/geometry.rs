use glam::Vec3;
use sorghum_core::{Mesh, MeshVertex};
use sorghum_procgen::tessellate::STEM_COLOR;

use crate::internode::{InternodeArena, InternodeId, PlantType};

pub const BARK_COLOR: [f32; 3] = [0.4, 0.26, 0.13];

fn plant_color(plant_type: PlantType) -> [f32; 3] {
    match plant_type {
        PlantType::GeneralTree => BARK_COLOR,
        PlantType::Sorghum => STEM_COLOR,
    }
}

/// One open cylinder per internode, tapered from its thickness down to
/// the thickness of its thickest child.
pub fn generate_plant_mesh(arena: &InternodeArena, root: InternodeId, radial_segments: u32) -> Mesh {
    let radial_segments = radial_segments.max(3) as usize;
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for id in arena.descendants(root) {
        let Some(node) = arena.get(id) else { continue };
        let start = node.position;
        let end = node.end_position();
        let direction = (end - start).normalize_or_zero();
        if direction == Vec3::ZERO {
            continue;
        }
        let start_thickness = node.growth.thickness;
        let end_thickness = node
            .children
            .iter()
            .filter_map(|&c| arena.get(c))
            .map(|c| c.growth.thickness)
            .fold(None, |acc: Option<f32>, t| Some(acc.map_or(t, |a| a.max(t))))
            .unwrap_or(start_thickness);
        let color = plant_color(node.info.plant_type);

        let arbitrary = if direction.y.abs() > 0.9 { Vec3::X } else { Vec3::Y };
        let tangent = direction.cross(arbitrary).normalize();
        let bitangent = direction.cross(tangent).normalize();

        let base_index = vertices.len() as u32;
        for ring in 0..2 {
            let (position, thickness) = if ring == 0 {
                (start, start_thickness)
            } else {
                (end, end_thickness)
            };
            for i in 0..radial_segments {
                let angle = (i as f32 / radial_segments as f32) * std::f32::consts::TAU;
                let normal = (tangent * angle.cos() + bitangent * angle.sin()).normalize();
                let mut vertex = MeshVertex::new(
                    position + normal * thickness,
                    color,
                    [i as f32 / radial_segments as f32, ring as f32],
                );
                vertex.normal = normal.to_array();
                vertices.push(vertex);
            }
        }

        for i in 0..radial_segments {
            let next = (i + 1) % radial_segments;
            let i0 = base_index + i as u32;
            let i1 = base_index + next as u32;
            let i2 = base_index + (radial_segments + i) as u32;
            let i3 = base_index + (radial_segments + next) as u32;
            indices.extend_from_slice(&[i0, i2, i1, i1, i2, i3]);
        }
    }

    Mesh::new(vertices, indices)
}
