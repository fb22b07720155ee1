//! Plant assembly: descriptor -> organ splines -> meshes, and registration
//! of the result in a scene.

use std::sync::Arc;

use glam::{Mat4, Vec3};
use sorghum_core::{Entity, Mesh, MeshRenderer, Result, SceneGraph, Transform};

use crate::descriptor::ProceduralDescriptor;
use crate::pinnacle::generate_pinnacle;
use crate::spline::{build_leaf, build_stem, OrganKind, OrganSpline, SplineSettings};
use crate::tessellate::tessellate_organ;

/// Per-leaf summary exported with each point cloud
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeafRecord {
    pub leaf_index: u32,
    pub sheath: Vec3,
    pub tip: Vec3,
    pub branching_angle: f32,
    pub roll_angle: f32,
}

#[derive(Debug, Clone)]
pub struct Organ {
    pub spline: OrganSpline,
    pub mesh: Mesh,
}

#[derive(Debug, Clone)]
pub struct SorghumPlant {
    pub stem: Organ,
    pub leaves: Vec<Organ>,
    pub pinnacle: Mesh,
    pub records: Vec<LeafRecord>,
}

impl SorghumPlant {
    /// Build every organ from a descriptor that has been made ready
    pub fn build(descriptor: &ProceduralDescriptor, settings: &SplineSettings, seed: u64) -> Self {
        let stem_spline = build_stem(&descriptor.stem, settings);
        let stem = Organ {
            mesh: tessellate_organ(&stem_spline, settings),
            spline: stem_spline,
        };

        let mut leaves = Vec::with_capacity(descriptor.leaves.len());
        let mut records = Vec::with_capacity(descriptor.leaves.len());
        for leaf in &descriptor.leaves {
            let spline = build_leaf(&stem.spline, leaf, settings);
            if let (Some(first), Some(last)) = (spline.first(), spline.last()) {
                records.push(LeafRecord {
                    leaf_index: leaf.leaf_index,
                    sheath: first.position,
                    tip: last.position,
                    branching_angle: leaf.branching_angle,
                    roll_angle: leaf.roll_angle,
                });
            }
            leaves.push(Organ {
                mesh: tessellate_organ(&spline, settings),
                spline,
            });
        }
        records.sort_by_key(|r| r.leaf_index);

        let pinnacle = match stem.spline.last() {
            Some(tip) => generate_pinnacle(&descriptor.pinnacle, tip.position, tip.axis, seed),
            None => Mesh::default(),
        };

        Self {
            stem,
            leaves,
            pinnacle,
            records,
        }
    }

    /// All organs merged into one mesh in plant space
    pub fn combined_mesh(&self) -> Mesh {
        let mut mesh = self.stem.mesh.clone();
        for leaf in &self.leaves {
            mesh.append(&leaf.mesh);
        }
        mesh.append(&self.pinnacle);
        mesh
    }

    pub fn leaf_records(&self) -> &[LeafRecord] {
        &self.records
    }
}

/// Marks a plant root entity
#[derive(Debug, Clone, PartialEq)]
pub struct PlantTag {
    pub records: Vec<LeafRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StemPart;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafPart {
    pub index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinnaclePart;

/// Entities created for one plant
#[derive(Debug, Clone)]
pub struct PlantEntities {
    pub plant: Entity,
    pub stem: Entity,
    pub leaves: Vec<Entity>,
    pub pinnacle: Option<Entity>,
}

fn spawn_part<S: SceneGraph>(scene: &mut S, parent: Entity, name: &str, mesh: &Mesh) -> Result<Entity> {
    let part = scene.create_entity(name);
    scene.set_parent(part, parent)?;
    let geometry = scene.create_entity(&format!("{} geometry", name));
    scene.set_parent(geometry, part)?;
    let handle = scene.allocate_surface_handle();
    scene.set_component(
        geometry,
        MeshRenderer {
            handle,
            mesh: Arc::new(mesh.clone()),
        },
    )?;
    Ok(part)
}

/// Register `plant` under `parent` (or as a root) with the plant -> part ->
/// geometry hierarchy the scanner resolves handles through. On failure the
/// partially built plant is removed again.
pub fn spawn_plant<S: SceneGraph>(
    scene: &mut S,
    plant: &SorghumPlant,
    transform: Mat4,
    parent: Option<Entity>,
    name: &str,
) -> Result<PlantEntities> {
    let root = scene.create_entity(name);
    match attach_plant(scene, root, plant, transform, parent) {
        Ok(entities) => Ok(entities),
        Err(e) => {
            scene.delete_entity(root);
            Err(e)
        }
    }
}

fn attach_plant<S: SceneGraph>(
    scene: &mut S,
    root: Entity,
    plant: &SorghumPlant,
    transform: Mat4,
    parent: Option<Entity>,
) -> Result<PlantEntities> {
    if let Some(parent) = parent {
        scene.set_parent(root, parent)?;
    }
    scene.set_component(root, Transform::from_matrix(transform))?;
    scene.set_component(
        root,
        PlantTag {
            records: plant.records.clone(),
        },
    )?;

    let stem = spawn_part(scene, root, "Stem", &plant.stem.mesh)?;
    scene.set_component(stem, StemPart)?;

    let mut leaves = Vec::with_capacity(plant.leaves.len());
    for leaf in &plant.leaves {
        let OrganKind::Leaf { index } = leaf.spline.kind else {
            continue;
        };
        let entity = spawn_part(scene, root, &format!("Leaf {}", index), &leaf.mesh)?;
        scene.set_component(entity, LeafPart { index })?;
        leaves.push(entity);
    }

    let pinnacle = if plant.pinnacle.is_empty() {
        None
    } else {
        let entity = spawn_part(scene, root, "Pinnacle", &plant.pinnacle)?;
        scene.set_component(entity, PinnaclePart)?;
        Some(entity)
    };

    Ok(PlantEntities {
        plant: root,
        stem,
        leaves,
        pinnacle,
    })
}
