//! Brute-force CPU implementation of [`RayTraceOracle`].
//!
//! Triangles are pre-transformed to world space on upload and grouped per
//! instance behind a bounding box. Albedo is the interpolated vertex color.
//! Illumination is the unoccluded fraction of a cosine-weighted sky
//! hemisphere; `bounce_limit` is accepted but only direct sky light is
//! traced.

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::bounds::Aabb;
use crate::error::Result;
use crate::raytrace::{
    IlluminationSettings, LightProbe, MeshInstance, PointCloudSample, RayTraceOracle, SurfaceHandle,
};

const EPSILON: f32 = 1e-7;
const NORMAL_PUSH: f32 = 1e-3;

#[derive(Debug, Clone)]
struct Triangle {
    corners: [Vec3; 3],
    colors: [Vec3; 3],
}

#[derive(Debug, Clone)]
struct Batch {
    handle: SurfaceHandle,
    bounds: Aabb,
    triangles: Vec<Triangle>,
}

#[derive(Debug, Clone, Copy)]
struct Hit {
    distance: f32,
    position: Vec3,
    albedo: Vec3,
    handle: SurfaceHandle,
}

#[derive(Debug, Default)]
pub struct CpuRayTracer {
    batches: Vec<Batch>,
}

impl CpuRayTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn triangle_count(&self) -> usize {
        self.batches.iter().map(|b| b.triangles.len()).sum()
    }

    fn closest_hit(&self, origin: Vec3, direction: Vec3) -> Option<Hit> {
        let inv_direction = direction.recip();
        let mut best: Option<Hit> = None;

        for batch in &self.batches {
            let limit = best.map_or(f32::MAX, |h| h.distance);
            if batch.bounds.intersect_ray(origin, inv_direction, limit).is_none() {
                continue;
            }
            for triangle in &batch.triangles {
                let Some((t, u, v)) = intersect_triangle(origin, direction, &triangle.corners) else {
                    continue;
                };
                if best.map_or(true, |h| t < h.distance) {
                    let albedo = triangle.colors[0] * (1.0 - u - v)
                        + triangle.colors[1] * u
                        + triangle.colors[2] * v;
                    best = Some(Hit {
                        distance: t,
                        position: origin + direction * t,
                        albedo,
                        handle: batch.handle,
                    });
                }
            }
        }
        best
    }

    fn occluded(&self, origin: Vec3, direction: Vec3) -> bool {
        let inv_direction = direction.recip();
        self.batches.iter().any(|batch| {
            batch.bounds.intersect_ray(origin, inv_direction, f32::MAX).is_some()
                && batch
                    .triangles
                    .iter()
                    .any(|t| intersect_triangle(origin, direction, &t.corners).is_some())
        })
    }
}

impl RayTraceOracle for CpuRayTracer {
    fn update_scene(&mut self, instances: Vec<MeshInstance>) {
        self.batches = instances
            .into_iter()
            .filter(|instance| !instance.mesh.is_empty())
            .map(|instance| {
                let world = instance.mesh.transformed(&instance.transform);
                let triangles: Vec<Triangle> = world
                    .indices
                    .chunks_exact(3)
                    .map(|t| {
                        let v = |i: u32| &world.vertices[i as usize];
                        Triangle {
                            corners: [
                                Vec3::from_array(v(t[0]).position),
                                Vec3::from_array(v(t[1]).position),
                                Vec3::from_array(v(t[2]).position),
                            ],
                            colors: [
                                Vec3::from_array(v(t[0]).color),
                                Vec3::from_array(v(t[1]).color),
                                Vec3::from_array(v(t[2]).color),
                            ],
                        }
                    })
                    .collect();
                Batch {
                    handle: instance.handle,
                    bounds: world.bounds().unwrap_or_default(),
                    triangles,
                }
            })
            .collect();
        log::debug!(
            "CPU tracer scene updated: {} batches, {} triangles",
            self.batches.len(),
            self.triangle_count()
        );
    }

    fn sample_point_cloud(&self, samples: &mut [PointCloudSample]) -> Result<()> {
        samples.par_iter_mut().for_each(|sample| {
            match self.closest_hit(sample.origin, sample.direction) {
                Some(hit) => {
                    sample.hit = true;
                    sample.position = hit.position;
                    sample.albedo = hit.albedo;
                    sample.handle = hit.handle;
                }
                None => {
                    sample.hit = false;
                    sample.handle = 0;
                }
            }
        });
        Ok(())
    }

    fn estimate_illumination(
        &self,
        settings: &IlluminationSettings,
        probes: &mut [LightProbe],
    ) -> Result<()> {
        let sample_count = settings.num_point_samples.max(1);

        probes.par_iter_mut().enumerate().for_each(|(i, probe)| {
            let mut rng = StdRng::seed_from_u64(
                settings.seed ^ (i as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15),
            );
            let normal = if probe.normal.length_squared() > EPSILON {
                probe.normal.normalize()
            } else {
                Vec3::Y
            };
            let (tangent, bitangent) = normal.any_orthonormal_pair();
            let origin = if settings.push_normal {
                probe.position + normal * NORMAL_PUSH
            } else {
                probe.position
            };

            let mut visible = 0u32;
            let mut direction_sum = Vec3::ZERO;
            for _ in 0..sample_count {
                let phi = std::f32::consts::TAU * rng.gen::<f32>();
                let r2: f32 = rng.gen();
                let sin_theta = r2.sqrt();
                let cos_theta = (1.0 - r2).sqrt();
                let direction = (tangent * phi.cos() * sin_theta
                    + bitangent * phi.sin() * sin_theta
                    + normal * cos_theta)
                    .normalize_or_zero();

                if !self.occluded(origin, direction) {
                    visible += 1;
                    direction_sum += direction;
                }
            }

            probe.energy = settings.skylight_power * visible as f32 / sample_count as f32;
            probe.incoming_direction = direction_sum.normalize_or_zero();
        });
        Ok(())
    }
}

/// Möller–Trumbore. Returns (distance, u, v) for hits in front of the origin.
fn intersect_triangle(origin: Vec3, direction: Vec3, corners: &[Vec3; 3]) -> Option<(f32, f32, f32)> {
    let edge1 = corners[1] - corners[0];
    let edge2 = corners[2] - corners[0];
    let p = direction.cross(edge2);
    let det = edge1.dot(p);
    if det.abs() < EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;
    let s = origin - corners[0];
    let u = s.dot(p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(edge1);
    let v = direction.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = edge2.dot(q) * inv_det;
    if t > EPSILON {
        Some((t, u, v))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{Mesh, MeshVertex};
    use glam::Mat4;
    use std::sync::Arc;

    fn plane(y: f32, color: [f32; 3]) -> Mesh {
        Mesh::new(
            vec![
                MeshVertex::new(Vec3::new(-1.0, y, -1.0), color, [0.0, 0.0]),
                MeshVertex::new(Vec3::new(-1.0, y, 1.0), color, [0.0, 1.0]),
                MeshVertex::new(Vec3::new(1.0, y, -1.0), color, [1.0, 0.0]),
                MeshVertex::new(Vec3::new(1.0, y, 1.0), color, [1.0, 1.0]),
            ],
            vec![0, 1, 2, 2, 1, 3],
        )
    }

    fn tracer() -> CpuRayTracer {
        let mut tracer = CpuRayTracer::new();
        tracer.update_scene(vec![
            MeshInstance {
                handle: 1,
                mesh: Arc::new(plane(0.0, [0.0, 0.0, 1.0])),
                transform: Mat4::IDENTITY,
            },
            MeshInstance {
                handle: 2,
                mesh: Arc::new(plane(1.0, [1.0, 0.0, 0.0])),
                transform: Mat4::from_translation(Vec3::new(0.0, 0.0, 0.5)),
            },
        ]);
        tracer
    }

    #[test]
    fn test_closest_hit_wins() {
        let tracer = tracer();
        assert_eq!(tracer.triangle_count(), 4);
        let mut samples = vec![
            PointCloudSample::ray(Vec3::new(0.0, 5.0, 0.0), Vec3::NEG_Y),
            PointCloudSample::ray(Vec3::new(0.0, 5.0, -0.9), Vec3::NEG_Y),
            PointCloudSample::ray(Vec3::new(5.0, 5.0, 0.0), Vec3::NEG_Y),
        ];
        tracer.sample_point_cloud(&mut samples).unwrap();

        assert!(samples[0].hit);
        assert_eq!(samples[0].handle, 2);
        assert!((samples[0].position.y - 1.0).abs() < 1e-5);
        assert!((samples[0].albedo - Vec3::X).length() < 1e-5);

        // Outside the translated upper plane, lands on the lower one
        assert!(samples[1].hit);
        assert_eq!(samples[1].handle, 1);

        assert!(!samples[2].hit);
        assert_eq!(samples[2].handle, 0);
    }

    #[test]
    fn test_illumination_open_sky_and_shaded() {
        let tracer = tracer();
        let settings = IlluminationSettings {
            num_point_samples: 64,
            skylight_power: 2.0,
            ..Default::default()
        };
        let mut probes = vec![
            LightProbe::new(Vec3::new(0.0, 2.0, 0.0), Vec3::Y),
            LightProbe::new(Vec3::new(0.0, 0.5, 0.5), Vec3::Y),
        ];
        tracer.estimate_illumination(&settings, &mut probes).unwrap();

        assert!((probes[0].energy - 2.0).abs() < 1e-6);
        assert!(probes[0].incoming_direction.y > 0.5);
        assert!(probes[1].energy < probes[0].energy);
    }
}
