use glam::{Mat4, Vec3};

use crate::bounds::Aabb;

/// Vertex layout shared by plant organs, grown trees and the field ground.
/// `color` carries the semantic part code read back by the scanner.
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 3],
    pub uv: [f32; 2],
}

impl MeshVertex {
    pub fn new(position: Vec3, color: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position: position.to_array(),
            normal: [0.0, 1.0, 0.0],
            color,
            uv,
        }
    }
}

/// Indexed triangle mesh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn new(vertices: Vec<MeshVertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Append another mesh, re-basing its indices
    pub fn append(&mut self, other: &Mesh) {
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.indices.extend(other.indices.iter().map(|i| i + base));
    }

    /// Copy with positions and normals moved by `transform`
    pub fn transformed(&self, transform: &Mat4) -> Mesh {
        let vertices = self
            .vertices
            .iter()
            .map(|v| MeshVertex {
                position: transform.transform_point3(Vec3::from_array(v.position)).to_array(),
                normal: transform
                    .transform_vector3(Vec3::from_array(v.normal))
                    .normalize_or_zero()
                    .to_array(),
                ..*v
            })
            .collect();
        Mesh {
            vertices,
            indices: self.indices.clone(),
        }
    }

    pub fn bounds(&self) -> Option<Aabb> {
        if self.vertices.is_empty() {
            return None;
        }
        Some(Aabb::from_points(
            self.vertices.iter().map(|v| Vec3::from_array(v.position)),
        ))
    }

    /// Smooth normals by averaging area-weighted face normals.
    /// Vertices touching only degenerate faces get a zero normal.
    pub fn recalculate_normals(&mut self) {
        let mut accumulated = vec![Vec3::ZERO; self.vertices.len()];

        for triangle in self.indices.chunks_exact(3) {
            let i0 = triangle[0] as usize;
            let i1 = triangle[1] as usize;
            let i2 = triangle[2] as usize;

            let p0 = Vec3::from_array(self.vertices[i0].position);
            let p1 = Vec3::from_array(self.vertices[i1].position);
            let p2 = Vec3::from_array(self.vertices[i2].position);

            let face_normal = (p1 - p0).cross(p2 - p0);
            accumulated[i0] += face_normal;
            accumulated[i1] += face_normal;
            accumulated[i2] += face_normal;
        }

        for (vertex, normal) in self.vertices.iter_mut().zip(accumulated) {
            vertex.normal = normal.normalize_or_zero().to_array();
        }
    }
}
