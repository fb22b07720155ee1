use std::fs;
use std::path::{Path, PathBuf};

use glam::Vec2;
use serde::{Deserialize, Serialize};
use sorghum_core::{Error, Result};
use sorghum_field::{FieldGround, PositionsField};
use sorghum_growth::{GrowthSettings, PlantType, TreeParameters};
use sorghum_scan::PointCloudSampleSettings;

/// Grown-tree export settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeDatasetConfig {
    pub plant_type: PlantType,
    pub count: u32,
    /// Distance between plants along X
    pub spacing: f32,
    pub iterations: u32,
    pub parameters: TreeParameters,
    pub growth: GrowthSettings,
}

impl Default for TreeDatasetConfig {
    fn default() -> Self {
        Self {
            plant_type: PlantType::GeneralTree,
            count: 1,
            spacing: 3.0,
            iterations: 8,
            parameters: TreeParameters::general_tree(),
            growth: GrowthSettings::default(),
        }
    }
}

/// Everything a dataset run needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub output_dir: PathBuf,
    pub seed: u32,
    pub sample_count: u32,
    pub field: PositionsField,
    /// Plants within this distance of the focal plant are instantiated
    pub instantiate_radius: f32,
    pub ground: FieldGround,
    /// Per-sample ground roughness drawn from [x, y)
    pub ground_roughness: Vec2,
    /// Per-sample ground height offset drawn from [x, y)
    pub ground_height: Vec2,
    pub scan: PointCloudSampleSettings,
    pub tree: TreeDatasetConfig,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("Datasets"),
            seed: 0,
            sample_count: 4,
            field: PositionsField::default(),
            instantiate_radius: 2.5,
            ground: FieldGround::default(),
            ground_roughness: Vec2::new(0.12, 0.17),
            ground_height: Vec2::new(0.0, 0.15),
            scan: PointCloudSampleSettings {
                point_distance: Vec2::new(0.01, 0.01),
                ..Default::default()
            },
            tree: TreeDatasetConfig::default(),
        }
    }
}

impl DatasetConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config: DatasetConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text).map_err(|e| Error::io(path, e))
    }

    pub fn validate(&self) -> Result<()> {
        if self.ground_roughness.x > self.ground_roughness.y {
            return Err(Error::config("ground_roughness must be an increasing range"));
        }
        if self.ground_height.x > self.ground_height.y {
            return Err(Error::config("ground_height must be an increasing range"));
        }
        if self.instantiate_radius < 0.0 {
            return Err(Error::config("instantiate_radius must not be negative"));
        }
        Ok(())
    }

    pub fn point_cloud_dir(&self) -> PathBuf {
        self.output_dir.join("PointCloud")
    }

    pub fn csv_dir(&self) -> PathBuf {
        self.output_dir.join("CSV")
    }

    pub fn tree_dir(&self) -> PathBuf {
        self.output_dir.join("Trees")
    }
}
