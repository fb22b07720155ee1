//! Plant placement on a row/column grid.

use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};
use sorghum_core::{Entity, Error, Result, SceneGraph, Transform};
use sorghum_procgen::{
    spawn_plant, GaussianSource, PlantSeed, ProceduralDescriptor, SeededGaussian, SorghumPlant,
    SplineSettings,
};

/// Rectangular planting grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionsField {
    pub rows: u32,
    pub columns: u32,
    /// Distance between columns (x) and between rows (y)
    pub spacing: Vec2,
    pub descriptor: ProceduralDescriptor,
    pub spline_settings: SplineSettings,
}

impl Default for PositionsField {
    fn default() -> Self {
        Self {
            rows: 5,
            columns: 20,
            spacing: Vec2::new(0.25, 0.75),
            descriptor: ProceduralDescriptor::default(),
            spline_settings: SplineSettings::default(),
        }
    }
}

/// Entities created by [`PositionsField::instantiate_around_index`]
#[derive(Debug, Clone)]
pub struct FieldInstance {
    pub field: Entity,
    pub focal: Entity,
    /// Every plant under `field`, focal included
    pub plants: Vec<Entity>,
    /// Field-space position of the focal plant
    pub center: Vec2,
}

impl PositionsField {
    /// Grid positions in row-major order
    pub fn positions(&self) -> Vec<Vec2> {
        let mut positions = Vec::with_capacity(self.rows as usize * self.columns as usize);
        for row in 0..self.rows {
            for column in 0..self.columns {
                positions.push(Vec2::new(
                    column as f32 * self.spacing.x,
                    row as f32 * self.spacing.y,
                ));
            }
        }
        positions
    }

    /// Spawn a plant at every grid position within `radius` of position
    /// `index`. Positions are re-centred so the focal plant sits at the
    /// origin; the other plants are jittered by N(0, `variance`) in X and Z.
    pub fn instantiate_around_index<S: SceneGraph>(
        &self,
        scene: &mut S,
        index: usize,
        radius: f32,
        variance: f32,
        seed: PlantSeed,
    ) -> Result<FieldInstance> {
        let positions = self.positions();
        if positions.is_empty() {
            return Err(Error::unavailable("positions field has no positions"));
        }
        let center = *positions.get(index).ok_or_else(|| {
            Error::config(format!(
                "field index {} out of range ({} positions)",
                index,
                positions.len()
            ))
        })?;

        let field = scene.create_entity("Field");
        let spawned = self.populate(scene, field, &positions, index, center, radius, variance, seed);
        let (focal, plants) = match spawned {
            Ok(spawned) => spawned,
            Err(e) => {
                scene.delete_entity(field);
                return Err(e);
            }
        };

        log::info!(
            "Instantiated {} plants around index {} (center {:?})",
            plants.len(),
            index,
            center
        );
        Ok(FieldInstance {
            field,
            focal,
            plants,
            center,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn populate<S: SceneGraph>(
        &self,
        scene: &mut S,
        field: Entity,
        positions: &[Vec2],
        index: usize,
        center: Vec2,
        radius: f32,
        variance: f32,
        seed: PlantSeed,
    ) -> Result<(Entity, Vec<Entity>)> {
        scene.set_component(field, Transform::default())?;

        let mut jitter = SeededGaussian::new(seed.combine(u32::MAX).as_u64());
        let mut plants = Vec::new();
        let mut focal = None;
        for (i, position) in positions.iter().enumerate() {
            if position.distance(center) > radius {
                continue;
            }
            let is_focal = i == index;
            let mut offset = *position - center;
            if !is_focal {
                offset += Vec2::new(jitter.sample(0.0, variance), jitter.sample(0.0, variance));
            }

            let plant_seed = seed.combine(i as u32);
            let mut descriptor = self.descriptor.clone();
            if let Err(e) = descriptor.ready(&mut SeededGaussian::new(plant_seed.as_u64())) {
                log::warn!("Plant {} spawned without leaves: {}", i, e);
            }
            let plant = SorghumPlant::build(&descriptor, &self.spline_settings, plant_seed.as_u64());
            let transform = Mat4::from_translation(Vec3::new(offset.x, 0.0, offset.y));
            let entities = spawn_plant(scene, &plant, transform, Some(field), &format!("Sorghum {}", i))?;
            if is_focal {
                focal = Some(entities.plant);
            }
            plants.push(entities.plant);
        }

        let focal = focal.ok_or_else(|| Error::unavailable("focal plant was not spawned"))?;
        Ok((focal, plants))
    }
}
