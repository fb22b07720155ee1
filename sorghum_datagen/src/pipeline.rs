//! Point-cloud dataset capture.
//!
//! Each sample walks Idle -> BeforeGrowth -> Growth -> AfterGrowth -> Idle:
//! build ground and field, (grow), scan and export, then tear down.

use std::fs;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sorghum_core::scene::collect_mesh_instances;
use sorghum_core::{Entity, Error, RayTraceOracle, Result, Scene, SceneGraph};
use sorghum_field::{spawn_ground, FieldInstance};
use sorghum_procgen::{PlantSeed, PlantTag};
use sorghum_scan::{scan_point_cloud_labeled, write_leaf_csv, write_ply};

use crate::config::DatasetConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStatus {
    Idle,
    BeforeGrowth,
    Growth,
    AfterGrowth,
}

/// Outcome of a whole run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureSummary {
    pub exported: u32,
    pub skipped: u32,
    pub failed: u32,
}

struct CurrentSample {
    field: Option<FieldInstance>,
    ground: Option<Entity>,
}

pub struct PointCloudCapture {
    config: DatasetConfig,
    scene: Scene,
    oracle: Box<dyn RayTraceOracle>,
    status: PipelineStatus,
    sample: u32,
    prefix: String,
    current: CurrentSample,
    rng: StdRng,
    summary: CaptureSummary,
}

impl PointCloudCapture {
    pub fn new(config: DatasetConfig, oracle: Box<dyn RayTraceOracle>) -> Self {
        let rng = StdRng::seed_from_u64(u64::from(config.seed));
        Self {
            config,
            scene: Scene::new(),
            oracle,
            status: PipelineStatus::Idle,
            sample: 0,
            prefix: String::new(),
            current: CurrentSample {
                field: None,
                ground: None,
            },
            rng,
            summary: CaptureSummary::default(),
        }
    }

    pub fn status(&self) -> PipelineStatus {
        self.status
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn summary(&self) -> CaptureSummary {
        self.summary
    }

    pub fn is_finished(&self) -> bool {
        self.status == PipelineStatus::Idle && self.sample >= self.config.sample_count
    }

    /// Create the output folders
    pub fn start(&self) -> Result<()> {
        for dir in [self.config.point_cloud_dir(), self.config.csv_dir()] {
            fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        }
        Ok(())
    }

    /// Advance the state machine by one stage
    pub fn step(&mut self) {
        match self.status {
            PipelineStatus::Idle => {
                if self.sample < self.config.sample_count {
                    self.prefix = format!("sample_{:05}", self.sample);
                    self.status = PipelineStatus::BeforeGrowth;
                }
            }
            PipelineStatus::BeforeGrowth => match self.on_before_growth() {
                Ok(()) => self.status = PipelineStatus::Growth,
                Err(e) => {
                    log::error!("{}: setup failed: {}", self.prefix, e);
                    self.summary.skipped += 1;
                    self.finish_sample();
                }
            },
            // procedural plants are complete when spawned
            PipelineStatus::Growth => self.status = PipelineStatus::AfterGrowth,
            PipelineStatus::AfterGrowth => {
                match self.on_after_growth() {
                    Ok(()) => self.summary.exported += 1,
                    Err(e) => {
                        log::error!("{}: export failed: {}", self.prefix, e);
                        self.summary.failed += 1;
                    }
                }
                self.finish_sample();
            }
        }
    }

    /// Run every sample to completion
    pub fn run(&mut self) -> Result<CaptureSummary> {
        self.start()?;
        while !self.is_finished() {
            self.step();
        }
        log::info!(
            "Capture done: {} exported, {} skipped, {} failed",
            self.summary.exported,
            self.summary.skipped,
            self.summary.failed
        );
        Ok(self.summary)
    }

    fn on_before_growth(&mut self) -> Result<()> {
        let roughness = sample_range(&mut self.rng, self.config.ground_roughness.into());
        let height = sample_range(&mut self.rng, self.config.ground_height.into());
        let mesh = self.config.ground.generate_mesh(roughness);
        self.current.ground = Some(spawn_ground(&mut self.scene, mesh, height)?);

        let positions = self.config.field.positions().len();
        if positions == 0 {
            return Err(Error::unavailable("positions field is empty"));
        }
        let seed = PlantSeed::new(self.config.seed).for_sample(self.sample);
        let index = seed.value as usize % positions;
        let instance = self.config.field.instantiate_around_index(
            &mut self.scene,
            index,
            self.config.instantiate_radius,
            self.config.scan.position_variance,
            seed,
        )?;
        if !self.scene.is_valid(instance.field) || !self.scene.is_valid(instance.focal) {
            return Err(Error::unavailable("invalid sorghum or field entity"));
        }
        self.current.field = Some(instance);
        Ok(())
    }

    fn on_after_growth(&mut self) -> Result<()> {
        let (Some(instance), Some(ground)) = (self.current.field.as_ref(), self.current.ground) else {
            return Err(Error::unavailable("no field to scan"));
        };

        self.oracle.update_scene(collect_mesh_instances(&self.scene));
        let cloud = scan_point_cloud_labeled(
            &self.scene,
            self.oracle.as_ref(),
            instance.field,
            instance.focal,
            ground,
            instance.center,
            &self.config.scan,
        )?;

        let ply_path = self.config.point_cloud_dir().join(format!("{}.ply", self.prefix));
        write_ply(&ply_path, &cloud)?;

        let records = self
            .scene
            .component::<PlantTag>(instance.focal)
            .map(|tag| tag.records.clone())
            .unwrap_or_default();
        let csv_path = self.config.csv_dir().join(format!("{}.csv", self.prefix));
        write_leaf_csv(&csv_path, &records)?;
        Ok(())
    }

    fn finish_sample(&mut self) {
        if let Some(instance) = self.current.field.take() {
            if self.scene.is_valid(instance.field) {
                self.scene.delete_entity(instance.field);
            }
        }
        if let Some(ground) = self.current.ground.take() {
            if self.scene.is_valid(ground) {
                self.scene.delete_entity(ground);
            }
        }
        self.sample += 1;
        self.status = PipelineStatus::Idle;
    }
}

fn sample_range(rng: &mut StdRng, range: [f32; 2]) -> f32 {
    if range[1] > range[0] {
        rng.gen_range(range[0]..range[1])
    } else {
        range[0]
    }
}
