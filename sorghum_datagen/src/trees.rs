use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use glam::{Mat4, Vec3};
use sorghum_core::{Error, MeshInstance, RayTraceOracle, Result, SurfaceHandle};
use sorghum_field::FieldGround;
use sorghum_growth::GrowthSimulation;
use sorghum_procgen::write_obj;

use crate::config::DatasetConfig;

const GROUND_HANDLE: SurfaceHandle = 1;

/// Grow a row of plants and write one OBJ per plant into `<out>/Trees`
pub fn grow_trees(config: &DatasetConfig, oracle: &mut dyn RayTraceOracle) -> Result<Vec<PathBuf>> {
    let tree = &config.tree;
    let dir = config.tree_dir();
    fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;

    let mut simulation = GrowthSimulation::new(tree.growth.clone());
    let ground = FieldGround {
        size: glam::Vec2::splat(tree.spacing * tree.count.max(1) as f32 + 10.0),
        resolution: [16, 16],
        ..config.ground.clone()
    };
    simulation.set_static_geometry(vec![MeshInstance {
        handle: GROUND_HANDLE,
        mesh: Arc::new(ground.generate_mesh(0.0)),
        transform: Mat4::IDENTITY,
    }]);

    let offset = (tree.count.saturating_sub(1)) as f32 * tree.spacing * 0.5;
    let plants: Vec<_> = (0..tree.count)
        .map(|i| {
            let position = Vec3::new(i as f32 * tree.spacing - offset, 0.0, 0.0);
            simulation.create_plant(tree.plant_type, position, tree.parameters.clone())
        })
        .collect();

    let grew = simulation.grow_iterations(tree.iterations, oracle)?;
    if !grew {
        log::warn!("No plant grew in {} iterations", tree.iterations);
    }

    let mut written = Vec::with_capacity(plants.len());
    for (i, plant) in plants.into_iter().enumerate() {
        let Some(mesh) = simulation.plant_mesh(plant) else {
            continue;
        };
        let path = dir.join(format!("tree_{:03}.obj", i));
        write_obj(&path, &mesh, &format!("tree_{:03}", i))?;
        log::info!(
            "Plant {}: {} internodes -> {}",
            plant,
            simulation.internodes_of(plant).len(),
            path.display()
        );
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sorghum_core::CpuRayTracer;
    use sorghum_growth::{PlantType, TreeParameters};

    #[test]
    fn test_grow_and_export() {
        let mut config = DatasetConfig {
            output_dir: std::env::temp_dir().join(format!("sorghum_trees_{}", std::process::id())),
            ..Default::default()
        };
        config.tree.count = 2;
        config.tree.iterations = 3;
        config.tree.plant_type = PlantType::Sorghum;
        config.tree.parameters = TreeParameters::sorghum();
        config.tree.growth.illumination.num_point_samples = 8;

        let mut oracle = CpuRayTracer::new();
        let written = grow_trees(&config, &mut oracle).unwrap();
        assert_eq!(written.len(), 2);
        let text = fs::read_to_string(&written[0]).unwrap();
        assert!(text.starts_with("o tree_000"));
        assert!(text.lines().any(|l| l.starts_with("f ")));
        let _ = fs::remove_dir_all(&config.output_dir);
    }
}
