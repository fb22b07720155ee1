use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};
use sorghum_core::{Entity, Mesh, MeshRenderer, MeshVertex, Result, SceneGraph, Transform};

use crate::noise_util::{fbm, FbmSettings};

pub const SOIL_COLOR: [f32; 3] = [0.35, 0.25, 0.15];

/// Rough rectangular patch of soil under a field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldGround {
    /// Extent along X and Z
    pub size: Vec2,
    /// Cells along X and Z
    pub resolution: [u32; 2],
    pub noise: FbmSettings,
}

impl Default for FieldGround {
    fn default() -> Self {
        Self {
            size: Vec2::new(10.0, 10.0),
            resolution: [100, 100],
            noise: FbmSettings::default(),
        }
    }
}

/// Marks the ground entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroundTag;

impl FieldGround {
    /// Grid centred on the origin with heights `fbm * roughness`
    pub fn generate_mesh(&self, roughness: f32) -> Mesh {
        let [cells_x, cells_z] = [self.resolution[0].max(1), self.resolution[1].max(1)];
        let grid_x = cells_x + 1;
        let grid_z = cells_z + 1;
        let step = Vec2::new(self.size.x / cells_x as f32, self.size.y / cells_z as f32);
        let half = self.size * 0.5;

        let mut vertices = Vec::with_capacity((grid_x * grid_z) as usize);
        for z in 0..grid_z {
            for x in 0..grid_x {
                let local = Vec2::new(x as f32 * step.x - half.x, z as f32 * step.y - half.y);
                let height = fbm(local, &self.noise) * roughness;
                vertices.push(MeshVertex::new(
                    Vec3::new(local.x, height, local.y),
                    SOIL_COLOR,
                    [x as f32 / cells_x as f32, z as f32 / cells_z as f32],
                ));
            }
        }

        let mut indices = Vec::with_capacity((cells_x * cells_z * 6) as usize);
        for z in 0..cells_z {
            for x in 0..cells_x {
                let top_left = z * grid_x + x;
                let top_right = top_left + 1;
                let bottom_left = (z + 1) * grid_x + x;
                let bottom_right = bottom_left + 1;
                indices.extend_from_slice(&[
                    top_left,
                    bottom_left,
                    top_right,
                    top_right,
                    bottom_left,
                    bottom_right,
                ]);
            }
        }

        let mut mesh = Mesh::new(vertices, indices);
        mesh.recalculate_normals();
        mesh
    }
}

/// Register a ground mesh raised by `height_offset`, with its own surface handle
pub fn spawn_ground<S: SceneGraph>(scene: &mut S, mesh: Mesh, height_offset: f32) -> Result<Entity> {
    let entity = scene.create_entity("Ground");
    scene.set_component(
        entity,
        Transform::from_matrix(Mat4::from_translation(Vec3::new(0.0, height_offset, 0.0))),
    )?;
    let handle = scene.allocate_surface_handle();
    scene.set_component(
        entity,
        MeshRenderer {
            handle,
            mesh: Arc::new(mesh),
        },
    )?;
    scene.set_component(entity, GroundTag)?;
    log::debug!("Ground spawned with handle {} at height {}", handle, height_offset);
    Ok(entity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sorghum_core::Scene;

    #[test]
    fn test_grid_counts() {
        let ground = FieldGround {
            resolution: [4, 3],
            ..Default::default()
        };
        let mesh = ground.generate_mesh(0.1);
        assert_eq!(mesh.vertices.len(), 5 * 4);
        assert_eq!(mesh.triangle_count(), 4 * 3 * 2);
    }

    #[test]
    fn test_flat_ground_faces_up() {
        let ground = FieldGround {
            resolution: [2, 2],
            ..Default::default()
        };
        let mesh = ground.generate_mesh(0.0);
        let bounds = mesh.bounds().unwrap();
        assert_eq!(bounds.min.y, 0.0);
        assert_eq!(bounds.max.y, 0.0);
        assert!((bounds.size().x - 10.0).abs() < 1e-5);
        assert!(mesh.vertices.iter().all(|v| v.normal[1] > 0.99));
    }

    #[test]
    fn test_roughness_bounds_height() {
        let mesh = FieldGround::default().generate_mesh(0.15);
        let bounds = mesh.bounds().unwrap();
        assert!(bounds.min.y >= -0.15 && bounds.max.y <= 0.15);
        assert!(bounds.max.y > bounds.min.y);
    }

    #[test]
    fn test_spawn_ground() {
        let mut scene = Scene::new();
        let mesh = FieldGround::default().generate_mesh(0.1);
        let entity = spawn_ground(&mut scene, mesh, 0.05).unwrap();
        let renderer = scene.component::<MeshRenderer>(entity).unwrap();
        assert!(renderer.handle > 0);
        assert!(scene.has_component::<GroundTag>(entity));
    }
}
