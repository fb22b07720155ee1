use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use glam::{Mat4, Quat, Vec3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use sorghum_core::{IlluminationSettings, LightProbe, Mesh, MeshInstance, RayTraceOracle, Result, SurfaceHandle};

use crate::geometry::generate_plant_mesh;
use crate::internode::{
    Bud, Candidate, CollisionProxy, Illumination, Internode, InternodeArena, InternodeGrowth,
    InternodeId, InternodeInfo, InternodeStatistics, PlantId, PlantType,
};
use crate::obstacle::CubeVolume;
use crate::parameters::TreeParameters;
use crate::resource::ResourceParcel;
use crate::strategy::{
    bud_weight, gaussian, has_lateral_buds, propose_rotation, prune_targets, update_statistics,
    uses_collision_proxies,
};

/// Nutrient pool every plant draws from each tick
const NUTRIENT_POOL: f32 = 5_000_000.0;

/// Plant surfaces are numbered from here so they never collide with scene handles
const PLANT_HANDLE_BASE: SurfaceHandle = 1 << 32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrowthSettings {
    pub delta_time: f32,
    pub illumination: IlluminationSettings,
    pub radial_segments: u32,
    pub seed: u64,
}

impl Default for GrowthSettings {
    fn default() -> Self {
        Self {
            delta_time: 1.0,
            illumination: IlluminationSettings::default(),
            radial_segments: 6,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlantRecord {
    pub plant_type: PlantType,
    pub parameters: TreeParameters,
    pub root: InternodeId,
    pub handle: SurfaceHandle,
    pub mesh: Arc<Mesh>,
}

/// Resource-driven growth of every plant in a shared arena
pub struct GrowthSimulation {
    settings: GrowthSettings,
    arena: InternodeArena,
    plants: BTreeMap<PlantId, PlantRecord>,
    next_plant: PlantId,
    obstacles: Vec<CubeVolume>,
    static_geometry: Vec<MeshInstance>,
    global_time: f32,
    age: u32,
    rng: StdRng,
}

impl GrowthSimulation {
    pub fn new(settings: GrowthSettings) -> Self {
        let rng = StdRng::seed_from_u64(settings.seed);
        Self {
            settings,
            arena: InternodeArena::new(),
            plants: BTreeMap::new(),
            next_plant: 0,
            obstacles: vec![CubeVolume::ground()],
            static_geometry: Vec::new(),
            global_time: 0.0,
            age: 0,
            rng,
        }
    }

    pub fn settings(&self) -> &GrowthSettings {
        &self.settings
    }

    pub fn global_time(&self) -> f32 {
        self.global_time
    }

    pub fn arena(&self) -> &InternodeArena {
        &self.arena
    }

    pub fn internode(&self, id: InternodeId) -> Option<&Internode> {
        self.arena.get(id)
    }

    pub fn plant(&self, id: PlantId) -> Option<&PlantRecord> {
        self.plants.get(&id)
    }

    pub fn plant_ids(&self) -> Vec<PlantId> {
        self.plants.keys().copied().collect()
    }

    /// Pre-order internodes of a plant, root first
    pub fn internodes_of(&self, id: PlantId) -> Vec<InternodeId> {
        self.plants
            .get(&id)
            .map(|p| self.arena.descendants(p.root))
            .unwrap_or_default()
    }

    pub fn plant_mesh(&self, id: PlantId) -> Option<Arc<Mesh>> {
        self.plants.get(&id).map(|p| p.mesh.clone())
    }

    pub fn obstacles(&self) -> &[CubeVolume] {
        &self.obstacles
    }

    pub fn add_obstacle(&mut self, obstacle: CubeVolume) {
        self.obstacles.push(obstacle);
    }

    /// Non-plant geometry (ground, other scene meshes) traced alongside the plants
    pub fn set_static_geometry(&mut self, instances: Vec<MeshInstance>) {
        self.static_geometry = instances;
    }

    /// Plant a single upright root internode carrying one apical bud
    pub fn create_plant(
        &mut self,
        plant_type: PlantType,
        position: Vec3,
        parameters: TreeParameters,
    ) -> PlantId {
        let id = self.next_plant;
        self.next_plant += 1;

        let root = self.arena.insert(Internode {
            info: InternodeInfo {
                plant: id,
                plant_type,
                start_age: self.age,
                start_global_time: self.global_time,
                order: 0,
                level: 0,
                length: parameters.internode_length,
            },
            growth: InternodeGrowth::default(),
            statistics: InternodeStatistics::default(),
            illumination: Illumination::default(),
            position,
            rotation: Quat::from_rotation_x(std::f32::consts::FRAC_PI_2),
            parent: None,
            children: Vec::new(),
            buds: vec![Bud::apical()],
            collision: uses_collision_proxies(plant_type).then(CollisionProxy::default),
        });
        update_statistics(&mut self.arena, root, &parameters);

        let handle = PLANT_HANDLE_BASE + id as SurfaceHandle;
        let mesh = Arc::new(generate_plant_mesh(&self.arena, root, self.settings.radial_segments));
        self.plants.insert(
            id,
            PlantRecord {
                plant_type,
                parameters,
                root,
                handle,
                mesh,
            },
        );
        log::info!("Created {:?} plant {} at {:?}", plant_type, id, position);
        id
    }

    pub fn delete_plant(&mut self, id: PlantId) -> bool {
        match self.plants.remove(&id) {
            Some(record) => {
                let removed = self.arena.remove_subtree(record.root);
                log::debug!("Deleted plant {} ({} internodes)", id, removed);
                true
            }
            None => false,
        }
    }

    pub fn delete_all_plants(&mut self) {
        for id in self.plant_ids() {
            self.delete_plant(id);
        }
        self.arena.clear();
        self.global_time = 0.0;
        self.age = 0;
    }

    /// Run one tick. Returns `false` when no bud could grow, in which case
    /// pruning and statistics are skipped.
    pub fn grow(&mut self) -> bool {
        let started = Instant::now();
        self.allocate_resources();
        self.global_time += self.settings.delta_time;
        self.age += 1;

        let candidates = self.form_candidates();
        if candidates.is_empty() {
            log::debug!("No candidates at t={}", self.global_time);
            return false;
        }
        let count = candidates.len();
        let formed = started.elapsed();
        self.instantiate(candidates);

        let pruned = self.prune();
        let structured = started.elapsed();
        let roots: Vec<(InternodeId, TreeParameters)> = self
            .plants
            .values()
            .map(|p| (p.root, p.parameters.clone()))
            .collect();
        for (root, parameters) in roots {
            update_statistics(&mut self.arena, root, &parameters);
        }
        log::debug!(
            "Tick t={}: {} new internodes, {} pruned, {} live (form {:?}, prune {:?}, stats {:?})",
            self.global_time,
            count,
            pruned,
            self.arena.len(),
            formed,
            structured - formed,
            started.elapsed() - structured
        );
        true
    }

    /// Run `iterations` ticks, then refresh meshes and illumination once if
    /// anything grew.
    pub fn grow_iterations(&mut self, iterations: u32, oracle: &mut dyn RayTraceOracle) -> Result<bool> {
        let mut grew = false;
        for _ in 0..iterations {
            grew |= self.grow();
        }
        if grew {
            self.refresh(oracle)?;
        }
        Ok(grew)
    }

    /// Rebuild plant meshes, upload them with the static geometry and
    /// recompute internode illumination.
    pub fn refresh(&mut self, oracle: &mut dyn RayTraceOracle) -> Result<()> {
        let radial_segments = self.settings.radial_segments;
        for record in self.plants.values_mut() {
            record.mesh = Arc::new(generate_plant_mesh(&self.arena, record.root, radial_segments));
        }

        let mut instances = self.static_geometry.clone();
        instances.extend(
            self.plants
                .values()
                .filter(|p| !p.mesh.is_empty())
                .map(|p| MeshInstance {
                    handle: p.handle,
                    mesh: p.mesh.clone(),
                    transform: Mat4::IDENTITY,
                }),
        );
        oracle.update_scene(instances);
        self.calculate_illumination(oracle)
    }

    fn calculate_illumination(&mut self, oracle: &dyn RayTraceOracle) -> Result<()> {
        let (ids, mut probes): (Vec<InternodeId>, Vec<LightProbe>) = self
            .arena
            .iter()
            .map(|(id, node)| (id, LightProbe::new(node.end_position(), node.front())))
            .unzip();
        if probes.is_empty() {
            return Ok(());
        }
        oracle.estimate_illumination(&self.settings.illumination, &mut probes)?;

        let delta_time = self.settings.delta_time;
        for (id, probe) in ids.into_iter().zip(probes) {
            if let Some(node) = self.arena.get_mut(id) {
                node.illumination.accumulated_direction += probe.incoming_direction * delta_time;
                node.illumination.current_intensity = probe.energy;
            }
        }
        Ok(())
    }

    fn collect_resources(&self, record: &PlantRecord) -> ResourceParcel {
        let intensity: f32 = self
            .arena
            .descendants(record.root)
            .into_iter()
            .filter_map(|id| self.arena.get(id))
            .map(|n| n.illumination.current_intensity)
            .sum();
        let p = &record.parameters;
        ResourceParcel::new(
            NUTRIENT_POOL.min(p.resource_cap.nutrient),
            (p.base_carbon + p.carbon_per_intensity * intensity).min(p.resource_cap.carbon),
        )
    }

    fn allocate_resources(&mut self) {
        let plans: Vec<(ResourceParcel, PlantRecord)> = self
            .plants
            .values()
            .map(|record| (self.collect_resources(record), record.clone()))
            .collect();

        for (collected, record) in plans {
            let ids = self.arena.descendants(record.root);
            let parameters = &record.parameters;

            let mut total_weight = 0.0;
            for &id in &ids {
                let Some(node) = self.arena.get(id) else { continue };
                let weights: Vec<(bool, f32)> =
                    node.buds.iter().map(|b| bud_weight(node, b, parameters)).collect();
                if let Some(node) = self.arena.get_mut(id) {
                    for (bud, (active, weight)) in node.buds.iter_mut().zip(weights) {
                        bud.is_active = active;
                        bud.resource_weight = weight;
                        if active {
                            total_weight += weight;
                        }
                    }
                }
            }
            if total_weight <= 0.0 {
                continue;
            }

            for &id in &ids {
                if let Some(node) = self.arena.get_mut(id) {
                    for bud in node.buds.iter_mut().filter(|b| b.is_active) {
                        let share = collected * (bud.resource_weight / total_weight);
                        bud.current_resource = (bud.current_resource + share).capped(&parameters.resource_cap);
                        bud.is_enough = bud.current_resource.is_enough();
                    }
                }
            }
        }
    }

    fn form_candidates(&mut self) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        let records: Vec<PlantRecord> = self.plants.values().cloned().collect();

        for record in records {
            let parameters = &record.parameters;
            let lateral_count = if has_lateral_buds(record.plant_type, parameters) {
                parameters.lateral_bud_count
            } else {
                0
            };

            for id in self.arena.descendants(record.root) {
                let Some(node) = self.arena.get(id) else { continue };
                let ready: Vec<Bud> = node
                    .buds
                    .iter()
                    .filter(|b| b.is_active && b.is_enough)
                    .copied()
                    .collect();
                if ready.is_empty() {
                    continue;
                }
                let parent = node.clone();

                for bud in &ready {
                    let rotation = propose_rotation(&parent, bud, parameters, &mut self.rng);
                    let carried = bud
                        .current_resource
                        .saturating_sub(&parameters.internode_cost);
                    let mut buds = vec![Bud {
                        current_resource: carried,
                        ..Bud::apical()
                    }];
                    for i in 0..lateral_count {
                        let roll = parameters.roll_angle_mean * (i + 1) as f32
                            + gaussian(&mut self.rng, 0.0, parameters.roll_angle_variance);
                        buds.push(Bud::lateral(roll));
                    }

                    let (order, level) = if bud.is_apical {
                        (parent.info.order, parent.info.level)
                    } else {
                        (parent.info.order + 1, parent.info.level + 1)
                    };
                    candidates.push(Candidate {
                        parent: id,
                        info: InternodeInfo {
                            plant: parent.info.plant,
                            plant_type: parent.info.plant_type,
                            start_age: self.age,
                            start_global_time: self.global_time,
                            order,
                            level,
                            length: parameters.internode_length,
                        },
                        position: parent.end_position(),
                        rotation,
                        buds,
                    });
                }

                if let Some(node) = self.arena.get_mut(id) {
                    node.buds.retain(|b| !(b.is_active && b.is_enough));
                }
            }
        }
        candidates
    }

    fn instantiate(&mut self, candidates: Vec<Candidate>) {
        for candidate in candidates {
            let collision = uses_collision_proxies(candidate.info.plant_type).then(CollisionProxy::default);
            self.arena.insert(Internode {
                info: candidate.info,
                growth: InternodeGrowth::default(),
                statistics: InternodeStatistics::default(),
                illumination: Illumination::default(),
                position: candidate.position,
                rotation: candidate.rotation,
                parent: Some(candidate.parent),
                children: Vec::new(),
                buds: candidate.buds,
                collision,
            });
        }
    }

    fn prune(&mut self) -> usize {
        prune_targets(&self.arena, &self.obstacles)
            .into_iter()
            .map(|id| self.arena.remove_subtree(id))
            .sum()
    }
}
