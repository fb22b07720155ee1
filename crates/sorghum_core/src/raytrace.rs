//! Ray-trace oracle interface.
//!
//! The oracle is synchronous: callers block until every sample or probe has
//! been resolved. A stalled oracle stalls the caller.

use std::sync::Arc;

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::mesh::Mesh;

/// Opaque surface identity reported with each hit. 0 means "no surface".
pub type SurfaceHandle = u64;

/// One ray of a scan and its resolved hit
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointCloudSample {
    pub origin: Vec3,
    pub direction: Vec3,
    pub hit: bool,
    pub position: Vec3,
    pub albedo: Vec3,
    pub handle: SurfaceHandle,
}

impl PointCloudSample {
    pub fn ray(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
            ..Default::default()
        }
    }
}

/// Illumination query point; `energy` and `incoming_direction` are filled by
/// the oracle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LightProbe {
    pub position: Vec3,
    pub normal: Vec3,
    pub energy: f32,
    pub incoming_direction: Vec3,
}

impl LightProbe {
    pub fn new(position: Vec3, normal: Vec3) -> Self {
        Self {
            position,
            normal,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IlluminationSettings {
    pub bounce_limit: u32,
    pub num_point_samples: u32,
    pub seed: u64,
    pub skylight_power: f32,
    pub push_normal: bool,
}

impl Default for IlluminationSettings {
    fn default() -> Self {
        Self {
            bounce_limit: 1,
            num_point_samples: 100,
            seed: 0,
            skylight_power: 1.0,
            push_normal: true,
        }
    }
}

/// Geometry uploaded to the oracle
#[derive(Debug, Clone)]
pub struct MeshInstance {
    pub handle: SurfaceHandle,
    pub mesh: Arc<Mesh>,
    pub transform: Mat4,
}

pub trait RayTraceOracle {
    /// Replace the traced geometry
    fn update_scene(&mut self, instances: Vec<MeshInstance>);

    /// Resolve every sample in place (hit flag, position, albedo, handle)
    fn sample_point_cloud(&self, samples: &mut [PointCloudSample]) -> Result<()>;

    /// Fill `energy` and `incoming_direction` of every probe
    fn estimate_illumination(
        &self,
        settings: &IlluminationSettings,
        probes: &mut [LightProbe],
    ) -> Result<()>;
}
