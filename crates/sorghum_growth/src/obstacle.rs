use glam::Vec3;
use serde::{Deserialize, Serialize};
use sorghum_core::Aabb;

/// Axis-aligned volume; internodes ending inside an enabled obstacle are pruned
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CubeVolume {
    pub bounds: Aabb,
    pub enabled: bool,
    pub as_obstacle: bool,
}

impl CubeVolume {
    pub fn obstacle(min: Vec3, max: Vec3) -> Self {
        Self {
            bounds: Aabb::new(min, max),
            enabled: true,
            as_obstacle: true,
        }
    }

    /// Slab just below the ground plane
    pub fn ground() -> Self {
        Self::obstacle(Vec3::new(-500.0, -10.0, -500.0), Vec3::new(500.0, -0.1, 500.0))
    }

    pub fn blocks(&self, point: Vec3) -> bool {
        self.enabled && self.as_obstacle && self.bounds.contains(point)
    }
}
