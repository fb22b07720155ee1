//! Per-plant-type growth rules.
//!
//! Every rule dispatches on [`PlantType`] so the growth loop stays agnostic
//! of which species it is advancing.

use std::collections::HashMap;

use glam::{Mat3, Quat, Vec3};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use sorghum_procgen::apply_tropism;

use crate::internode::{Bud, Internode, InternodeArena, InternodeId, PlantType};
use crate::obstacle::CubeVolume;
use crate::parameters::TreeParameters;

/// Largest sag applied when computing the desired pose, radians
const MAX_SAG: f32 = std::f32::consts::FRAC_PI_2;

pub fn has_lateral_buds(plant_type: PlantType, parameters: &TreeParameters) -> bool {
    match plant_type {
        PlantType::GeneralTree => parameters.lateral_bud_count > 0,
        PlantType::Sorghum => false,
    }
}

pub fn uses_collision_proxies(plant_type: PlantType) -> bool {
    match plant_type {
        PlantType::GeneralTree => true,
        PlantType::Sorghum => false,
    }
}

/// Activity flag and resource weight of a bud on `internode`
pub fn bud_weight(internode: &Internode, bud: &Bud, parameters: &TreeParameters) -> (bool, f32) {
    if bud.is_apical {
        return (true, parameters.apical_dominance);
    }
    match internode.info.plant_type {
        PlantType::Sorghum => (false, 0.0),
        PlantType::GeneralTree => {
            let inhibitor = internode.growth.inhibitor;
            if inhibitor < parameters.lateral_activation_threshold {
                (true, parameters.lateral_weight / (1.0 + inhibitor))
            } else {
                (false, 0.0)
            }
        }
    }
}

/// Draw from N(mean, std_dev); a degenerate deviation yields the mean
pub fn gaussian<R: Rng>(rng: &mut R, mean: f32, std_dev: f32) -> f32 {
    if !(std_dev > 0.0) {
        return mean;
    }
    match Normal::new(mean, std_dev) {
        Ok(normal) => normal.sample(rng),
        Err(_) => mean,
    }
}

/// Rotation whose -Z is `front` and whose +Y is `up`
pub fn rotation_from_frame(front: Vec3, up: Vec3) -> Quat {
    let front = front.normalize_or_zero();
    let mut right = front.cross(up).normalize_or_zero();
    if right == Vec3::ZERO {
        let reference = if front.x.abs() > 0.9 { Vec3::Z } else { Vec3::X };
        right = front.cross(reference).normalize_or_zero();
        if right == Vec3::ZERO {
            return Quat::IDENTITY;
        }
    }
    let up = right.cross(front).normalize();
    Quat::from_mat3(&Mat3::from_cols(right, up, -front)).normalize()
}

/// Heading of the internode grown from `bud`
pub fn propose_rotation<R: Rng>(
    parent: &Internode,
    bud: &Bud,
    parameters: &TreeParameters,
    rng: &mut R,
) -> Quat {
    let mut front = parent.front();
    let mut up = parent.up();

    if bud.is_apical {
        let yaw = gaussian(rng, 0.0, parameters.apical_angle_variance).to_radians();
        let pitch = gaussian(rng, 0.0, parameters.apical_angle_variance).to_radians();
        let right = front.cross(up).normalize_or_zero();
        let turn = Quat::from_axis_angle(up, yaw) * Quat::from_axis_angle(right, pitch);
        front = (turn * front).normalize();
        up = (turn * up).normalize();
    } else {
        let roll = gaussian(rng, bud.roll, parameters.roll_angle_variance).to_radians();
        up = (Quat::from_axis_angle(front, roll) * up).normalize();
        let branching = gaussian(
            rng,
            parameters.branching_angle_mean,
            parameters.branching_angle_variance,
        )
        .to_radians();
        let (sin, cos) = branching.sin_cos();
        let new_front = front * cos + up * sin;
        up = (up * cos - front * sin).normalize();
        front = new_front.normalize();
    }

    apply_tropism(Vec3::NEG_Y, parameters.gravitropism, &mut front, &mut up);
    let light = parent.illumination.accumulated_direction;
    if light.length_squared() > 0.0 {
        apply_tropism(light, parameters.phototropism, &mut front, &mut up);
    }
    rotation_from_frame(front, up)
}

/// Internodes that must be removed because their end lies in an obstacle.
/// Plant roots are never returned.
pub fn prune_targets(arena: &InternodeArena, obstacles: &[CubeVolume]) -> Vec<InternodeId> {
    arena
        .iter()
        .filter(|(_, node)| node.parent.is_some())
        .filter(|(_, node)| {
            let end = node.end_position();
            obstacles.iter().any(|o| o.blocks(end))
        })
        .map(|(id, _)| id)
        .collect()
}

/// Recompute structural statistics, thickness and inhibitor for one plant
pub fn update_statistics(arena: &mut InternodeArena, root: InternodeId, parameters: &TreeParameters) {
    let order = arena.descendants(root);

    // leaves up
    for &id in order.iter().rev() {
        let Some(node) = arena.get(id) else { continue };
        let children: Vec<(InternodeId, Internode)> = node
            .children
            .iter()
            .filter_map(|&c| arena.get(c).map(|n| (c, n.clone())))
            .collect();
        let own_length = node.info.length;
        let own_order = node.info.order;
        let end = node.end_position();
        let own_production = if node.has_apical_bud() {
            parameters.inhibitor_production
        } else {
            0.0
        };

        let max_child = children
            .iter()
            .max_by(|a, b| {
                a.1.statistics
                    .children_end_node_amount
                    .cmp(&b.1.statistics.children_end_node_amount)
                    .then(b.0.cmp(&a.0))
            })
            .map(|(c, _)| *c);

        let mut stats = node.statistics;
        stats.is_end_node = children.is_empty();
        stats.total_length = own_length;
        stats.max_child_order = own_order;
        let mut thickness_sum = 0.0;
        let mut mass = 0.0;
        let mut weighted_position = Vec3::ZERO;
        let mut inhibitor = own_production;

        if stats.is_end_node {
            stats.children_end_node_amount = 1;
            stats.distance_to_branch_end = 0;
            stats.longest_distance_to_any_end_node = 0;
        } else {
            stats.children_end_node_amount = 0;
            stats.longest_distance_to_any_end_node = 0;
            for (child_id, child) in &children {
                let s = &child.statistics;
                stats.children_end_node_amount += s.children_end_node_amount;
                stats.longest_distance_to_any_end_node = stats
                    .longest_distance_to_any_end_node
                    .max(s.longest_distance_to_any_end_node + 1);
                stats.total_length += s.total_length;
                stats.max_child_order = stats.max_child_order.max(s.max_child_order);
                if Some(*child_id) == max_child {
                    stats.distance_to_branch_end = s.distance_to_branch_end + 1;
                }

                thickness_sum += child.growth.thickness.powf(parameters.thickness_exponent);
                let child_mass = child.growth.thickness.powi(2) * child.info.length;
                let center = (child.position + child.end_position()) * 0.5;
                mass += child.growth.mass_of_children + child_mass;
                weighted_position += child.growth.child_mean_position * child.growth.mass_of_children
                    + center * child_mass;
                inhibitor += child.growth.inhibitor * child.growth.inhibitor_transmit_factor;
            }
        }

        let thickness = if stats.is_end_node {
            parameters.end_node_thickness
        } else {
            thickness_sum
                .powf(1.0 / parameters.thickness_exponent)
                .max(parameters.end_node_thickness)
        };
        let mean_position = if mass > 0.0 { weighted_position / mass } else { end };
        let torque = (mean_position - end).cross(Vec3::NEG_Y * mass);

        for (child_id, _) in &children {
            if let Some(child) = arena.get_mut(*child_id) {
                child.statistics.is_max_child = Some(*child_id) == max_child;
            }
        }
        if let Some(node) = arena.get_mut(id) {
            node.statistics = stats;
            node.growth.thickness = thickness;
            node.growth.mass_of_children = mass;
            node.growth.child_mean_position = mean_position;
            node.growth.children_total_torque = torque;
            node.growth.sagging = parameters.sagging_factor * mass / thickness.powi(2).max(1e-6);
            node.growth.inhibitor = inhibitor;
            node.growth.inhibitor_transmit_factor = parameters.inhibitor_transmit_factor;
        }
    }

    // root down
    let mut desired_rotations: HashMap<InternodeId, Quat> = HashMap::with_capacity(order.len());
    for &id in &order {
        let Some(node) = arena.get(id) else { continue };
        let parent = node.parent.and_then(|p| arena.get(p).map(|n| (p, n.clone())));
        let mut front = node.front();
        let mut up = node.up();
        let sag = node.growth.sagging.clamp(0.0, MAX_SAG);
        if sag > 0.0 {
            let max_angle = front.dot(Vec3::NEG_Y).clamp(-1.0, 1.0).acos();
            if max_angle > 1e-4 {
                apply_tropism(Vec3::NEG_Y, sag / max_angle, &mut front, &mut up);
            }
        }
        let desired_global = rotation_from_frame(front, up);

        let (distance_to_root, level, branch_start, desired_position, local) = match parent {
            None => (0.0, 0, 0, node.position, desired_global),
            Some((parent_id, p)) => {
                let parent_desired = desired_rotations
                    .get(&parent_id)
                    .copied()
                    .unwrap_or(p.rotation);
                let position = p.growth.desired_global_position
                    + parent_desired * Vec3::NEG_Z * p.info.length;
                if node.statistics.is_max_child {
                    (
                        p.growth.distance_to_root + p.info.length,
                        p.info.level,
                        p.statistics.distance_to_branch_start + 1,
                        position,
                        parent_desired.inverse() * desired_global,
                    )
                } else {
                    (
                        p.growth.distance_to_root + p.info.length,
                        p.info.level + 1,
                        0,
                        position,
                        parent_desired.inverse() * desired_global,
                    )
                }
            }
        };
        desired_rotations.insert(id, desired_global);
        if let Some(node) = arena.get_mut(id) {
            node.growth.distance_to_root = distance_to_root;
            node.info.level = level;
            node.statistics.distance_to_branch_start = branch_start;
            node.growth.desired_global_position = desired_position;
            node.growth.desired_local_rotation = local;
        }
    }

    // levels are only final after the top-down pass
    for &id in order.iter().rev() {
        let Some(node) = arena.get(id) else { continue };
        let level = node
            .children
            .iter()
            .filter_map(|&c| arena.get(c))
            .map(|c| c.statistics.max_child_level)
            .fold(node.info.level, u32::max);
        if let Some(node) = arena.get_mut(id) {
            node.statistics.max_child_level = level;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internode::{
        CollisionProxy, Illumination, InternodeGrowth, InternodeInfo, InternodeStatistics,
    };
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn upright() -> Quat {
        Quat::from_rotation_x(std::f32::consts::FRAC_PI_2)
    }

    fn internode(parent: Option<InternodeId>, position: Vec3, rotation: Quat, buds: Vec<Bud>) -> Internode {
        Internode {
            info: InternodeInfo {
                plant: 0,
                plant_type: PlantType::GeneralTree,
                start_age: 0,
                start_global_time: 0.0,
                order: 0,
                level: 0,
                length: 1.0,
            },
            growth: InternodeGrowth::default(),
            statistics: InternodeStatistics::default(),
            illumination: Illumination::default(),
            position,
            rotation,
            parent,
            children: Vec::new(),
            buds,
            collision: Some(CollisionProxy::default()),
        }
    }

    #[test]
    fn test_frame_round_trip() {
        let front = Vec3::new(0.3, 0.8, -0.2).normalize();
        let up = front.cross(Vec3::X).cross(front).normalize();
        let q = rotation_from_frame(front, up);
        assert!((q * Vec3::NEG_Z - front).length() < 1e-4);
        assert!((q * Vec3::Y - up).length() < 1e-4);
    }

    #[test]
    fn test_lateral_inhibited() {
        let params = TreeParameters::general_tree();
        let mut node = internode(None, Vec3::ZERO, upright(), vec![]);
        let bud = Bud::lateral(0.0);
        node.growth.inhibitor = params.lateral_activation_threshold + 1.0;
        assert_eq!(bud_weight(&node, &bud, &params), (false, 0.0));
        node.growth.inhibitor = 0.0;
        let (active, weight) = bud_weight(&node, &bud, &params);
        assert!(active);
        assert!((weight - params.lateral_weight).abs() < 1e-6);
        assert_eq!(bud_weight(&node, &Bud::apical(), &params), (true, params.apical_dominance));
    }

    #[test]
    fn test_apical_without_variance_keeps_heading() {
        let mut params = TreeParameters::sorghum();
        params.apical_angle_variance = 0.0;
        params.gravitropism = 0.0;
        let parent = internode(None, Vec3::ZERO, upright(), vec![]);
        let mut rng = StdRng::seed_from_u64(1);
        let q = propose_rotation(&parent, &Bud::apical(), &params, &mut rng);
        assert!((q * Vec3::NEG_Z - Vec3::Y).length() < 1e-4);
    }

    #[test]
    fn test_lateral_branches_off_axis() {
        let mut params = TreeParameters::general_tree();
        params.branching_angle_variance = 0.0;
        params.roll_angle_variance = 0.0;
        params.gravitropism = 0.0;
        let parent = internode(None, Vec3::ZERO, upright(), vec![]);
        let mut rng = StdRng::seed_from_u64(1);
        let q = propose_rotation(&parent, &Bud::lateral(0.0), &params, &mut rng);
        let angle = (q * Vec3::NEG_Z).dot(Vec3::Y).clamp(-1.0, 1.0).acos().to_degrees();
        assert!((angle - params.branching_angle_mean).abs() < 0.1);
    }

    #[test]
    fn test_statistics_chain_and_branch() {
        let params = TreeParameters::general_tree();
        let mut arena = InternodeArena::new();
        let root = arena.insert(internode(None, Vec3::ZERO, upright(), vec![]));
        let main = arena.insert(internode(Some(root), Vec3::Y, upright(), vec![]));
        let side = arena.insert(internode(
            Some(root),
            Vec3::Y,
            rotation_from_frame(Vec3::X, Vec3::Y),
            vec![Bud::apical()],
        ));
        let tip = arena.insert(internode(Some(main), Vec3::Y * 2.0, upright(), vec![Bud::apical()]));

        update_statistics(&mut arena, root, &params);

        let r = arena.get(root).unwrap();
        assert_eq!(r.statistics.children_end_node_amount, 2);
        assert_eq!(r.statistics.longest_distance_to_any_end_node, 2);
        assert_eq!(r.statistics.distance_to_branch_end, 2);
        assert!((r.statistics.total_length - 4.0).abs() < 1e-5);
        assert!(!r.statistics.is_end_node);

        let m = arena.get(main).unwrap();
        let s = arena.get(side).unwrap();
        let t = arena.get(tip).unwrap();
        assert!(m.statistics.is_max_child);
        assert!(!s.statistics.is_max_child);
        assert!(t.statistics.is_end_node);
        assert_eq!(m.info.level, 0);
        assert_eq!(s.info.level, 1);
        assert_eq!(r.statistics.max_child_level, 1);
        assert_eq!(t.statistics.distance_to_branch_start, 2);
        assert!((t.growth.distance_to_root - 2.0).abs() < 1e-5);

        // pipe model
        let expected = (2.0 * params.end_node_thickness.powf(params.thickness_exponent))
            .powf(1.0 / params.thickness_exponent);
        assert!((r.growth.thickness - expected).abs() < 1e-6);
        assert!(r.growth.thickness > t.growth.thickness);

        // root carries no apical bud so its inhibitor comes only from children
        let transmit = params.inhibitor_transmit_factor;
        let main_inhibitor = params.inhibitor_production * transmit;
        assert!((m.growth.inhibitor - main_inhibitor).abs() < 1e-5);
        let root_inhibitor = main_inhibitor * transmit + params.inhibitor_production * transmit;
        assert!((r.growth.inhibitor - root_inhibitor).abs() < 1e-5);
    }

    #[test]
    fn test_prune_skips_roots() {
        let mut arena = InternodeArena::new();
        let root = arena.insert(internode(None, Vec3::ZERO, upright(), vec![]));
        let child = arena.insert(internode(Some(root), Vec3::Y, upright(), vec![]));
        let everywhere = CubeVolume::obstacle(Vec3::splat(-10.0), Vec3::splat(10.0));
        assert_eq!(prune_targets(&arena, &[everywhere]), vec![child]);
    }
}
