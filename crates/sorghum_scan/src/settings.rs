use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Scanner layout and output window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointCloudSampleSettings {
    /// Kept heights relative to the focal plant, (min, max)
    pub height_range: Vec2,
    /// Ray spacing along the plane's left (x) and up (y) axes
    pub point_distance: Vec2,
    /// Tilt of each scan plane from vertical, degrees
    pub scanner_angle: f32,
    /// Fit the output window to the focal plant
    pub adjust_bounding_box: bool,
    /// Half-width of the scan planes and of the fixed window
    pub bounding_box_radius: f32,
    pub adjustment_factor: f32,
    pub min_output_radius: f32,
    /// Std-dev of neighbour placement jitter
    pub position_variance: f32,
}

impl Default for PointCloudSampleSettings {
    fn default() -> Self {
        Self {
            height_range: Vec2::new(0.0, 2.0),
            point_distance: Vec2::new(0.005, 0.005),
            scanner_angle: 30.0,
            adjust_bounding_box: true,
            bounding_box_radius: 1.0,
            adjustment_factor: 1.2,
            min_output_radius: 0.25,
            position_variance: 0.0,
        }
    }
}

impl PointCloudSampleSettings {
    pub fn height(&self) -> f32 {
        self.height_range.y - self.height_range.x
    }

    pub fn height_center(&self) -> f32 {
        (self.height_range.x + self.height_range.y) * 0.5
    }

    /// Plane extent: `(2r + h / cos(angle), 2r)`
    pub fn plane_size(&self) -> Vec2 {
        let r2 = self.bounding_box_radius * 2.0;
        Vec2::new(r2 + self.height() / self.scanner_angle.to_radians().cos(), r2)
    }

    /// Rays per plane as (columns, rows)
    pub fn grid(&self) -> (u32, u32) {
        let size = self.plane_size();
        (
            (size.x / self.point_distance.x).floor() as u32,
            (size.y / self.point_distance.y).floor() as u32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_size() {
        let settings = PointCloudSampleSettings {
            scanner_angle: 60.0,
            height_range: Vec2::new(0.0, 1.0),
            bounding_box_radius: 0.5,
            point_distance: Vec2::new(0.1, 0.1),
            ..Default::default()
        };
        let size = settings.plane_size();
        assert!((size.x - 3.0).abs() < 1e-4);
        assert!((size.y - 1.0).abs() < 1e-6);
        let (columns, rows) = settings.grid();
        assert!(columns == 29 || columns == 30);
        assert!(rows == 9 || rows == 10);
    }

    #[test]
    fn test_defaults_from_partial_json() {
        let settings: PointCloudSampleSettings =
            serde_json::from_str(r#"{ "scanner_angle": 10.0 }"#).unwrap();
        assert_eq!(settings.scanner_angle, 10.0);
        assert_eq!(settings.min_output_radius, 0.25);
    }
}
