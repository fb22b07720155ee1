use serde::{Deserialize, Serialize};

use crate::resource::ResourceParcel;

/// Growth parameters of one plant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeParameters {
    pub internode_length: f32,
    /// Spent by a bud to form one internode
    pub internode_cost: ResourceParcel,
    pub lateral_bud_count: u32,
    /// Degrees between the parent heading and a lateral shoot
    pub branching_angle_mean: f32,
    pub branching_angle_variance: f32,
    /// Degrees added around the parent axis for each successive lateral bud
    pub roll_angle_mean: f32,
    pub roll_angle_variance: f32,
    /// Std-dev of the apical heading jitter, degrees
    pub apical_angle_variance: f32,
    pub gravitropism: f32,
    pub phototropism: f32,
    /// Resource weight of an apical bud
    pub apical_dominance: f32,
    /// Resource weight of an uninhibited lateral bud
    pub lateral_weight: f32,
    /// Inhibitor produced by an internode that still carries its apical bud
    pub inhibitor_production: f32,
    pub inhibitor_transmit_factor: f32,
    /// Lateral buds stay dormant while the inhibitor is at or above this
    pub lateral_activation_threshold: f32,
    pub end_node_thickness: f32,
    /// Pipe-model exponent
    pub thickness_exponent: f32,
    pub sagging_factor: f32,
    /// Carbon collected without any light
    pub base_carbon: f32,
    pub carbon_per_intensity: f32,
    /// Per-tick upper bound on collected resource
    pub resource_cap: ResourceParcel,
}

impl Default for TreeParameters {
    fn default() -> Self {
        Self::general_tree()
    }
}

impl TreeParameters {
    /// Branching broadleaf tree
    pub fn general_tree() -> Self {
        Self {
            internode_length: 0.3,
            internode_cost: ResourceParcel::new(1.0, 1.0),
            lateral_bud_count: 2,
            branching_angle_mean: 40.0,
            branching_angle_variance: 5.0,
            roll_angle_mean: 137.5,
            roll_angle_variance: 10.0,
            apical_angle_variance: 3.0,
            gravitropism: 0.05,
            phototropism: 0.1,
            apical_dominance: 3.0,
            lateral_weight: 1.0,
            inhibitor_production: 1.0,
            inhibitor_transmit_factor: 0.6,
            lateral_activation_threshold: 1.2,
            end_node_thickness: 0.02,
            thickness_exponent: 2.0,
            sagging_factor: 0.0001,
            base_carbon: 3.0,
            carbon_per_intensity: 2.0,
            resource_cap: ResourceParcel::new(40.0, 40.0),
        }
    }

    /// Single culm with no lateral shoots
    pub fn sorghum() -> Self {
        Self {
            internode_length: 0.1,
            lateral_bud_count: 0,
            branching_angle_mean: 0.0,
            branching_angle_variance: 0.0,
            apical_angle_variance: 1.0,
            gravitropism: 0.0,
            phototropism: 0.05,
            end_node_thickness: 0.01,
            sagging_factor: 0.0,
            ..Self::general_tree()
        }
    }
}
