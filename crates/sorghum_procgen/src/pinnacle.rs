use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sorghum_core::{Mesh, MeshVertex};

use crate::descriptor::PinnacleDescriptor;

pub const PINNACLE_COLOR: [f32; 3] = [0.0, 0.0, 0.5];

/// Seed head above the stem tip: `seed_amount` small octahedra scattered
/// through the ellipsoid `pinnacle_size`. Empty when the plant has none.
pub fn generate_pinnacle(pinnacle: &PinnacleDescriptor, tip: Vec3, axis: Vec3, seed: u64) -> Mesh {
    let mut mesh = Mesh::default();
    if !pinnacle.has_pinnacle || pinnacle.seed_amount == 0 {
        return mesh;
    }

    let axis = axis.try_normalize().unwrap_or(Vec3::Y);
    let half = pinnacle.pinnacle_size * 0.5;
    let center = tip + axis * half.y;
    let (side, forward) = axis.any_orthonormal_pair();
    let mut rng = StdRng::seed_from_u64(seed);

    for _ in 0..pinnacle.seed_amount {
        // Rejection sample inside the unit ball
        let local = loop {
            let p = Vec3::new(
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(-1.0..=1.0),
            );
            if p.length_squared() <= 1.0 {
                break p;
            }
        };
        let offset = side * (local.x * half.x) + axis * (local.y * half.y) + forward * (local.z * half.z);
        mesh.append(&octahedron(center + offset, pinnacle.seed_radius));
    }

    mesh.recalculate_normals();
    mesh
}

fn octahedron(center: Vec3, radius: f32) -> Mesh {
    let corners = [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z];
    let vertices = corners
        .iter()
        .map(|c| MeshVertex::new(center + *c * radius, PINNACLE_COLOR, [0.0, 0.0]))
        .collect();
    let indices = vec![
        0, 2, 4, 4, 2, 1, 1, 2, 5, 5, 2, 0, //
        4, 3, 0, 1, 3, 4, 5, 3, 1, 0, 3, 5,
    ];
    Mesh::new(vertices, indices)
}
