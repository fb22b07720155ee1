//! Two-plane labelled point-cloud scan of a field.

use std::collections::HashMap;

use glam::{DVec3, Quat, Vec2, Vec3};
use rayon::prelude::*;
use sorghum_core::scene::global_transform;
use sorghum_core::{
    Entity, Error, MeshRenderer, PointCloudSample, RayTraceOracle, Result, SceneGraph,
    SurfaceHandle,
};
use sorghum_procgen::{LeafPart, PinnaclePart, StemPart};

use crate::settings::PointCloudSampleSettings;

const SCAN_FRONT: Vec3 = Vec3::new(0.0, -1.0, 0.0);
const SCAN_UP: Vec3 = Vec3::new(0.0, 0.0, -1.0);
const SCAN_LEFT: Vec3 = Vec3::new(1.0, 0.0, 0.0);

/// Which plant and organ a surface belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceLabel {
    /// 0 for the focal plant, j for the j-th neighbour
    pub plant_index: i32,
    /// 0 for stem and pinnacle, leaf index + 1 for leaves
    pub organ_index: i32,
}

/// Surface handle lookup built from the scene before a scan
#[derive(Debug, Clone, Default)]
pub struct HandleTables {
    pub ground: SurfaceHandle,
    pub focal: HashMap<SurfaceHandle, i32>,
    pub labels: HashMap<SurfaceHandle, SurfaceLabel>,
    pub neighbour_count: usize,
}

fn part_organ_index<S: SceneGraph>(scene: &S, part: Entity) -> Option<i32> {
    if scene.has_component::<StemPart>(part) || scene.has_component::<PinnaclePart>(part) {
        Some(0)
    } else {
        scene
            .component::<LeafPart>(part)
            .map(|leaf| leaf.index as i32 + 1)
    }
}

impl HandleTables {
    /// Walk field -> plants -> parts -> geometry renderers
    pub fn from_scene<S: SceneGraph>(
        scene: &S,
        field: Entity,
        focal: Entity,
        ground: Entity,
    ) -> Result<Self> {
        for (entity, what) in [(field, "field"), (focal, "focal plant"), (ground, "ground")] {
            if !scene.is_valid(entity) {
                return Err(Error::unavailable(format!("invalid {} entity", what)));
            }
        }
        let ground = scene
            .component::<MeshRenderer>(ground)
            .map(|r| r.handle)
            .ok_or_else(|| Error::unavailable("ground has no mesh renderer"))?;

        let mut tables = HandleTables {
            ground,
            ..Default::default()
        };
        for plant in scene.children(field) {
            let plant_index = if plant == focal {
                0
            } else {
                tables.neighbour_count += 1;
                tables.neighbour_count as i32
            };
            for part in scene.children(plant) {
                let Some(organ_index) = part_organ_index(scene, part) else {
                    continue;
                };
                for geometry in scene.children(part) {
                    let Some(renderer) = scene.component::<MeshRenderer>(geometry) else {
                        continue;
                    };
                    tables.labels.insert(
                        renderer.handle,
                        SurfaceLabel {
                            plant_index,
                            organ_index,
                        },
                    );
                    if plant_index == 0 {
                        tables.focal.insert(renderer.handle, organ_index);
                    }
                }
            }
        }
        if tables.focal.is_empty() {
            log::warn!("Focal plant has no renderable surfaces");
        }
        Ok(tables)
    }

    pub fn is_focal(&self, handle: SurfaceHandle) -> bool {
        self.focal.contains_key(&handle)
    }
}

/// X/Z window that hits must fall in
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputWindow {
    pub min: Vec2,
    pub max: Vec2,
}

impl OutputWindow {
    /// Square of half-width `radius` around `center`
    pub fn fixed(center: Vec2, radius: f32) -> Self {
        Self {
            min: center - Vec2::splat(radius),
            max: center + Vec2::splat(radius),
        }
    }

    /// Expand the extent of `min..max` around its centre by `factor`, never
    /// closer to the centre than `min_radius`
    pub fn fitted(min: Vec2, max: Vec2, factor: f32, min_radius: f32) -> Self {
        let center = (min + max) * 0.5;
        let low = (min - center) * factor;
        let high = (max - center) * factor;
        Self {
            min: center + Vec2::new(low.x.min(-min_radius), low.y.min(-min_radius)),
            max: center + Vec2::new(high.x.max(min_radius), high.y.max(min_radius)),
        }
    }

    pub fn contains(&self, x: f32, z: f32) -> bool {
        x >= self.min.x && x <= self.max.x && z >= self.min.y && z <= self.max.y
    }
}

/// Labelled points, one entry per kept hit in every array
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabeledPointCloud {
    pub points: Vec<DVec3>,
    pub colors: Vec<Vec3>,
    pub leaf_index: Vec<i32>,
    pub leaf_part_index: Vec<i32>,
    pub is_main_plant: Vec<i32>,
    pub plant_index: Vec<i32>,
    pub is_ground: Vec<i32>,
}

impl LabeledPointCloud {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Leaf sub-part code from the surface colour: red 1, green 2, otherwise 3
pub fn leaf_part_from_albedo(albedo: Vec3) -> i32 {
    if albedo.x != 0.0 {
        1
    } else if albedo.y != 0.0 {
        2
    } else {
        3
    }
}

/// Upper bound on `columns * rows` for one scan plane
pub const MAX_RAYS_PER_PLANE: usize = 1 << 26;

/// Rays of both scan planes, `2 * columns * rows` in total, the +angle plane first
pub fn generate_scan_rays(plant_position: Vec3, settings: &PointCloudSampleSettings) -> Result<Vec<PointCloudSample>> {
    let cos = settings.scanner_angle.to_radians().cos();
    if cos <= 1e-4 {
        return Err(Error::config(format!(
            "scanner angle {} leaves the planes parallel to the ground",
            settings.scanner_angle
        )));
    }
    if settings.point_distance.x <= 0.0 || settings.point_distance.y <= 0.0 {
        return Err(Error::config("scanner point distance must be positive"));
    }

    let (columns, rows) = settings.grid();
    let size = (columns as usize)
        .checked_mul(rows as usize)
        .filter(|&n| n <= MAX_RAYS_PER_PLANE)
        .ok_or_else(|| {
            Error::config(format!(
                "scan grid of {} x {} rays is too dense (point distance {:?})",
                columns, rows, settings.point_distance
            ))
        })?;
    let column_start = -((columns / 2) as i32);
    let row_start = -((rows / 2) as i32);
    let distance = settings.point_distance;
    let offset = settings.height() / 2.0 / cos;

    let mut samples = vec![PointCloudSample::default(); size * 2];
    if size == 0 {
        return Ok(samples);
    }
    for (plane, angle) in [settings.scanner_angle, -settings.scanner_angle]
        .into_iter()
        .enumerate()
    {
        let direction = (Quat::from_axis_angle(SCAN_UP, angle.to_radians()) * SCAN_FRONT).normalize();
        let center = plant_position + Vec3::new(0.0, settings.height_center(), 0.0) - direction * offset;
        samples[plane * size..(plane + 1) * size]
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, sample)| {
                let column = (i / rows as usize) as i32 + column_start;
                let row = (i % rows as usize) as i32 + row_start;
                let origin = center
                    + SCAN_LEFT * (column as f32 * distance.x)
                    + SCAN_UP * (row as f32 * distance.y);
                *sample = PointCloudSample::ray(origin, direction);
            });
    }
    Ok(samples)
}

/// Extent of the focal plant's hits, or `None` when nothing hit it
pub fn focal_extent(samples: &[PointCloudSample], tables: &HandleTables) -> Option<(Vec2, Vec2)> {
    samples
        .par_iter()
        .filter(|s| s.hit && tables.is_focal(s.handle))
        .map(|s| {
            let p = Vec2::new(s.position.x, s.position.z);
            (p, p)
        })
        .reduce_with(|a, b| (a.0.min(b.0), a.1.max(b.1)))
}

/// Window used to keep hits: fitted to the focal plant when enabled and
/// possible, otherwise the fixed square around the plant
pub fn output_window(
    samples: &[PointCloudSample],
    tables: &HandleTables,
    plant_position: Vec3,
    settings: &PointCloudSampleSettings,
) -> OutputWindow {
    let plant = Vec2::new(plant_position.x, plant_position.z);
    if !settings.adjust_bounding_box {
        return OutputWindow::fixed(plant, settings.bounding_box_radius);
    }
    match focal_extent(samples, tables) {
        Some((min, max)) => OutputWindow::fitted(
            min,
            max,
            settings.adjustment_factor,
            settings.min_output_radius,
        ),
        None => {
            log::warn!("No focal plant hits, falling back to the fixed window");
            OutputWindow::fixed(plant, settings.bounding_box_radius)
        }
    }
}

/// Filter resolved samples and attach labels. Output positions are Z-up
/// `(x + cx, z + cz, y)`.
pub fn label_samples(
    samples: &[PointCloudSample],
    tables: &HandleTables,
    plant_position: Vec3,
    field_center: Vec2,
    settings: &PointCloudSampleSettings,
) -> LabeledPointCloud {
    let window = output_window(samples, tables, plant_position, settings);
    let range = settings.height_range;

    let kept: Vec<&PointCloudSample> = samples
        .iter()
        .filter(|s| s.hit)
        .filter(|s| {
            let height = s.position.y - plant_position.y;
            window.contains(s.position.x, s.position.z) && height >= range.x && height <= range.y
        })
        .collect();

    let labels: Vec<(i32, i32, i32, i32, i32)> = kept
        .par_iter()
        .map(|s| {
            let part = leaf_part_from_albedo(s.albedo);
            let is_ground = i32::from(s.handle == tables.ground);
            match tables.labels.get(&s.handle) {
                Some(label) => (
                    label.organ_index,
                    part,
                    i32::from(label.plant_index == 0),
                    label.plant_index,
                    is_ground,
                ),
                None => (0, part, 0, 0, is_ground),
            }
        })
        .collect();

    let mut cloud = LabeledPointCloud::default();
    for (sample, (leaf, part, main, plant, ground)) in kept.iter().zip(labels) {
        cloud.points.push(DVec3::new(
            sample.position.x as f64 + field_center.x as f64,
            sample.position.z as f64 + field_center.y as f64,
            sample.position.y as f64,
        ));
        cloud.colors.push(sample.albedo);
        cloud.leaf_index.push(leaf);
        cloud.leaf_part_index.push(part);
        cloud.is_main_plant.push(main);
        cloud.plant_index.push(plant);
        cloud.is_ground.push(ground);
    }
    cloud
}

/// Full scan: build handle tables, cast both planes and label the hits.
/// The oracle must already hold the scene geometry.
pub fn scan_point_cloud_labeled<S: SceneGraph>(
    scene: &S,
    oracle: &dyn RayTraceOracle,
    field: Entity,
    focal: Entity,
    ground: Entity,
    field_center: Vec2,
    settings: &PointCloudSampleSettings,
) -> Result<LabeledPointCloud> {
    let tables = HandleTables::from_scene(scene, field, focal, ground)?;
    let plant_position = global_transform(scene, focal).w_axis.truncate();

    let mut samples = generate_scan_rays(plant_position, settings)?;
    log::debug!("Casting {} scan rays", samples.len());
    oracle.sample_point_cloud(&mut samples)?;

    let cloud = label_samples(&samples, &tables, plant_position, field_center, settings);
    log::info!(
        "Scan kept {} of {} rays ({} neighbours)",
        cloud.len(),
        samples.len(),
        tables.neighbour_count
    );
    Ok(cloud)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sorghum_core::{IlluminationSettings, LightProbe, MeshInstance, Mesh, Scene};
    use sorghum_procgen::{spawn_plant, ProceduralDescriptor, SeededGaussian, SorghumPlant, SplineSettings};
    use std::sync::Arc;

    fn hit(position: Vec3, albedo: Vec3, handle: SurfaceHandle) -> PointCloudSample {
        PointCloudSample {
            hit: true,
            position,
            albedo,
            handle,
            ..Default::default()
        }
    }

    fn plant(leaf_count: u32) -> SorghumPlant {
        let mut descriptor = ProceduralDescriptor::default();
        descriptor.l1.leaf_count = leaf_count;
        descriptor.ready(&mut SeededGaussian::new(5)).unwrap();
        SorghumPlant::build(&descriptor, &SplineSettings::low_detail(), 5)
    }

    struct Synthetic {
        scene: Scene,
        field: Entity,
        focal: Entity,
        ground: Entity,
    }

    fn synthetic_scene() -> Synthetic {
        let mut scene = Scene::new();
        let field = scene.create_entity("Field");
        let neighbour = plant(2);
        let focal_plant = plant(3);
        spawn_plant(&mut scene, &neighbour, glam::Mat4::IDENTITY, Some(field), "Neighbour").unwrap();
        let focal = spawn_plant(&mut scene, &focal_plant, glam::Mat4::IDENTITY, Some(field), "Focal")
            .unwrap()
            .plant;
        let ground = scene.create_entity("Ground");
        let handle = scene.allocate_surface_handle();
        scene
            .set_component(
                ground,
                MeshRenderer {
                    handle,
                    mesh: Arc::new(Mesh::default()),
                },
            )
            .unwrap();
        Synthetic {
            scene,
            field,
            focal,
            ground,
        }
    }

    fn handle_of(tables: &HandleTables, plant_index: i32, organ_index: i32) -> SurfaceHandle {
        *tables
            .labels
            .iter()
            .find(|(_, l)| l.plant_index == plant_index && l.organ_index == organ_index)
            .unwrap()
            .0
    }

    #[test]
    fn test_handle_tables() {
        let s = synthetic_scene();
        let tables = HandleTables::from_scene(&s.scene, s.field, s.focal, s.ground).unwrap();
        // focal: stem + 3 leaves, neighbour: stem + 2 leaves
        assert_eq!(tables.focal.len(), 4);
        assert_eq!(tables.labels.len(), 7);
        assert_eq!(tables.neighbour_count, 1);
        let mut organs: Vec<i32> = tables.focal.values().copied().collect();
        organs.sort();
        assert_eq!(organs, vec![0, 1, 2, 3]);
        assert!(!tables.labels.contains_key(&tables.ground));
    }

    #[test]
    fn test_missing_ground_renderer() {
        let mut s = synthetic_scene();
        let bare = s.scene.create_entity("Bare ground");
        let result = HandleTables::from_scene(&s.scene, s.field, s.focal, bare);
        assert!(matches!(result, Err(Error::CollaboratorUnavailable(_))));

        s.scene.delete_entity(s.focal);
        let result = HandleTables::from_scene(&s.scene, s.field, s.focal, s.ground);
        assert!(matches!(result, Err(Error::CollaboratorUnavailable(_))));
    }

    #[test]
    fn test_forced_hits_are_labelled() {
        let s = synthetic_scene();
        let tables = HandleTables::from_scene(&s.scene, s.field, s.focal, s.ground).unwrap();
        let settings = PointCloudSampleSettings {
            adjust_bounding_box: false,
            ..Default::default()
        };

        let leaf2 = handle_of(&tables, 0, 3);
        let stem = handle_of(&tables, 0, 0);
        let neighbour_leaf = handle_of(&tables, 1, 1);
        let samples = vec![
            hit(Vec3::new(0.1, 0.5, 0.0), Vec3::new(0.0, 1.0, 0.0), leaf2),
            hit(Vec3::new(0.0, 0.2, 0.0), Vec3::new(0.0, 0.0, 1.0), stem),
            hit(Vec3::new(0.0, 0.0, 0.1), Vec3::new(0.3, 0.2, 0.1), tables.ground),
            hit(Vec3::new(-0.2, 0.6, 0.2), Vec3::new(1.0, 0.0, 0.0), neighbour_leaf),
            PointCloudSample::default(),
            hit(Vec3::new(0.0, 0.5, 0.0), Vec3::ZERO, 999_999),
        ];

        let cloud = label_samples(&samples, &tables, Vec3::ZERO, Vec2::ZERO, &settings);
        assert_eq!(cloud.len(), 5);
        for len in [
            cloud.colors.len(),
            cloud.leaf_index.len(),
            cloud.leaf_part_index.len(),
            cloud.is_main_plant.len(),
            cloud.plant_index.len(),
            cloud.is_ground.len(),
        ] {
            assert_eq!(len, cloud.len());
        }

        // (isGround, leafIndex, isMainPlant)
        let triples: Vec<(i32, i32, i32)> = (0..cloud.len())
            .map(|i| (cloud.is_ground[i], cloud.leaf_index[i], cloud.is_main_plant[i]))
            .collect();
        assert_eq!(triples, vec![(0, 3, 1), (0, 0, 1), (1, 0, 0), (0, 1, 0), (0, 0, 0)]);
        assert_eq!(cloud.plant_index, vec![0, 0, 0, 1, 0]);
        assert_eq!(cloud.leaf_part_index, vec![2, 3, 1, 1, 3]);
    }

    #[test]
    fn test_output_is_z_up_with_center() {
        let s = synthetic_scene();
        let tables = HandleTables::from_scene(&s.scene, s.field, s.focal, s.ground).unwrap();
        let settings = PointCloudSampleSettings {
            adjust_bounding_box: false,
            ..Default::default()
        };
        let samples = vec![hit(Vec3::new(0.1, 0.5, 0.2), Vec3::ONE, tables.ground)];
        let cloud = label_samples(&samples, &tables, Vec3::ZERO, Vec2::new(10.0, 20.0), &settings);
        let p = cloud.points[0];
        assert!((p.x - 10.1).abs() < 1e-6);
        assert!((p.y - 20.2).abs() < 1e-6);
        assert!((p.z - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_height_filter() {
        let s = synthetic_scene();
        let tables = HandleTables::from_scene(&s.scene, s.field, s.focal, s.ground).unwrap();
        let settings = PointCloudSampleSettings {
            adjust_bounding_box: false,
            height_range: Vec2::new(0.1, 1.0),
            ..Default::default()
        };
        let samples = vec![
            hit(Vec3::new(0.0, 1.05, 0.0), Vec3::ONE, tables.ground),
            hit(Vec3::new(0.0, 1.5, 0.0), Vec3::ONE, tables.ground),
            hit(Vec3::new(0.0, 0.5, 0.0), Vec3::ONE, tables.ground),
        ];
        let cloud = label_samples(&samples, &tables, Vec3::new(0.0, 0.1, 0.0), Vec2::ZERO, &settings);
        assert_eq!(cloud.len(), 2);
    }

    #[test]
    fn test_fitted_window_exact() {
        let s = synthetic_scene();
        let tables = HandleTables::from_scene(&s.scene, s.field, s.focal, s.ground).unwrap();
        let stem = handle_of(&tables, 0, 0);
        let settings = PointCloudSampleSettings {
            adjustment_factor: 1.5,
            min_output_radius: 0.25,
            ..Default::default()
        };
        // rectangle x in [-1, 1], z in [2, 2.2]
        let samples = vec![
            hit(Vec3::new(-1.0, 0.5, 2.0), Vec3::ZERO, stem),
            hit(Vec3::new(1.0, 0.5, 2.2), Vec3::ZERO, stem),
            hit(Vec3::new(0.0, 0.5, 2.1), Vec3::ZERO, stem),
            hit(Vec3::new(50.0, 0.5, 50.0), Vec3::ZERO, tables.ground),
        ];
        let window = output_window(&samples, &tables, Vec3::ZERO, &settings);
        assert!((window.min.x - -1.5).abs() < 1e-5);
        assert!((window.max.x - 1.5).abs() < 1e-5);
        // z half-extent 0.1 * 1.5 is below the minimum radius
        assert!((window.min.y - 1.85).abs() < 1e-5);
        assert!((window.max.y - 2.35).abs() < 1e-5);
    }

    #[test]
    fn test_window_falls_back_without_focal_hits() {
        let s = synthetic_scene();
        let tables = HandleTables::from_scene(&s.scene, s.field, s.focal, s.ground).unwrap();
        let settings = PointCloudSampleSettings::default();
        let samples = vec![hit(Vec3::new(0.0, 0.5, 0.0), Vec3::ZERO, tables.ground)];
        let window = output_window(&samples, &tables, Vec3::new(1.0, 0.0, 1.0), &settings);
        assert_eq!(window, OutputWindow::fixed(Vec2::new(1.0, 1.0), settings.bounding_box_radius));
    }

    #[test]
    fn test_scan_rays_layout() {
        let settings = PointCloudSampleSettings {
            point_distance: Vec2::new(0.25, 0.25),
            ..Default::default()
        };
        let (columns, rows) = settings.grid();
        let rays = generate_scan_rays(Vec3::ZERO, &settings).unwrap();
        assert_eq!(rays.len(), (2 * columns * rows) as usize);

        let half = rays.len() / 2;
        let down_a = rays[0].direction;
        let down_b = rays[half].direction;
        assert!(down_a.y < 0.0 && down_b.y < 0.0);
        assert!((down_a.x + down_b.x).abs() < 1e-5);
        let expected = settings.scanner_angle.to_radians().cos();
        assert!((-down_a.y - expected).abs() < 1e-5);
        assert!(rays.iter().all(|r| !r.hit && (r.direction.length() - 1.0).abs() < 1e-5));
    }

    #[test]
    fn test_bad_angle_rejected() {
        let settings = PointCloudSampleSettings {
            scanner_angle: 90.0,
            ..Default::default()
        };
        assert!(matches!(generate_scan_rays(Vec3::ZERO, &settings), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_oversized_grid_rejected() {
        let settings = PointCloudSampleSettings {
            point_distance: Vec2::new(1e-7, 1e-7),
            ..Default::default()
        };
        let (columns, rows) = settings.grid();
        assert!(columns as u64 * rows as u64 > u32::MAX as u64);
        assert!(matches!(generate_scan_rays(Vec3::ZERO, &settings), Err(Error::Configuration(_))));
    }

    struct FixedOracle {
        handle: SurfaceHandle,
    }

    impl RayTraceOracle for FixedOracle {
        fn update_scene(&mut self, _instances: Vec<MeshInstance>) {}

        fn sample_point_cloud(&self, samples: &mut [PointCloudSample]) -> Result<()> {
            // every ray pointing towards +x hits at the origin column
            for sample in samples.iter_mut() {
                if sample.direction.x > 0.0 && sample.origin.z.abs() < 0.05 {
                    sample.hit = true;
                    sample.position = Vec3::new(0.0, 0.5, 0.0);
                    sample.albedo = Vec3::new(0.0, 1.0, 0.0);
                    sample.handle = self.handle;
                }
            }
            Ok(())
        }

        fn estimate_illumination(&self, _: &IlluminationSettings, _: &mut [LightProbe]) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_scan_with_fixed_oracle() {
        let s = synthetic_scene();
        let tables = HandleTables::from_scene(&s.scene, s.field, s.focal, s.ground).unwrap();
        let oracle = FixedOracle {
            handle: handle_of(&tables, 0, 1),
        };
        let settings = PointCloudSampleSettings {
            point_distance: Vec2::new(0.1, 0.1),
            ..Default::default()
        };
        let cloud = scan_point_cloud_labeled(
            &s.scene,
            &oracle,
            s.field,
            s.focal,
            s.ground,
            Vec2::ZERO,
            &settings,
        )
        .unwrap();
        assert!(!cloud.is_empty());
        assert!(cloud.is_main_plant.iter().all(|&m| m == 1));
        assert!(cloud.leaf_index.iter().all(|&l| l == 1));
        assert!(cloud.leaf_part_index.iter().all(|&p| p == 2));
    }
}
