use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::resource::ResourceParcel;

/// Arena handle. Slot indices are reused after removal; the generation is
/// drawn from an arena-wide counter so a stale id never resolves to a later
/// occupant, even after `clear`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InternodeId {
    index: u32,
    generation: u32,
}

impl InternodeId {
    pub fn index(&self) -> u32 {
        self.index
    }
}

/// Identifies a plant owned by a `GrowthSimulation`
pub type PlantId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlantType {
    GeneralTree,
    Sorghum,
}

/// Dormant or active growth point on an internode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bud {
    pub is_apical: bool,
    pub is_active: bool,
    pub is_enough: bool,
    pub resource_weight: f32,
    pub current_resource: ResourceParcel,
    /// Degrees around the parent axis, lateral buds only
    pub roll: f32,
}

impl Bud {
    pub fn apical() -> Self {
        Self {
            is_apical: true,
            is_active: true,
            is_enough: false,
            resource_weight: 0.0,
            current_resource: ResourceParcel::default(),
            roll: 0.0,
        }
    }

    pub fn lateral(roll: f32) -> Self {
        Self {
            is_apical: false,
            roll,
            ..Self::apical()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InternodeInfo {
    pub plant: PlantId,
    pub plant_type: PlantType,
    pub start_age: u32,
    pub start_global_time: f32,
    /// Branching depth; laterals increment it
    pub order: u32,
    /// Rank along the main axis chain
    pub level: u32,
    pub length: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InternodeGrowth {
    pub inhibitor: f32,
    pub inhibitor_transmit_factor: f32,
    pub distance_to_root: f32,
    pub thickness: f32,
    pub sagging: f32,
    pub mass_of_children: f32,
    pub children_total_torque: Vec3,
    pub child_mean_position: Vec3,
    pub desired_local_rotation: Quat,
    pub desired_global_position: Vec3,
}

impl Default for InternodeGrowth {
    fn default() -> Self {
        Self {
            inhibitor: 0.0,
            inhibitor_transmit_factor: 1.0,
            distance_to_root: 0.0,
            thickness: 0.0,
            sagging: 0.0,
            mass_of_children: 0.0,
            children_total_torque: Vec3::ZERO,
            child_mean_position: Vec3::ZERO,
            desired_local_rotation: Quat::IDENTITY,
            desired_global_position: Vec3::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InternodeStatistics {
    pub max_child_order: u32,
    pub max_child_level: u32,
    pub children_end_node_amount: u32,
    pub distance_to_branch_end: u32,
    pub longest_distance_to_any_end_node: u32,
    pub total_length: f32,
    pub distance_to_branch_start: u32,
    pub is_max_child: bool,
    pub is_end_node: bool,
}

/// Light gathered at the internode end
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Illumination {
    pub accumulated_direction: Vec3,
    pub current_intensity: f32,
}

/// Sphere used by branching trees to keep shoots apart
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionProxy {
    pub radius: f32,
}

impl Default for CollisionProxy {
    fn default() -> Self {
        Self { radius: 0.1 }
    }
}

/// One skeleton segment
#[derive(Debug, Clone, PartialEq)]
pub struct Internode {
    pub info: InternodeInfo,
    pub growth: InternodeGrowth,
    pub statistics: InternodeStatistics,
    pub illumination: Illumination,
    /// World-space start point
    pub position: Vec3,
    pub rotation: Quat,
    pub parent: Option<InternodeId>,
    pub children: Vec<InternodeId>,
    pub buds: Vec<Bud>,
    pub collision: Option<CollisionProxy>,
}

impl Internode {
    pub fn front(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    pub fn end_position(&self) -> Vec3 {
        self.position + self.front() * self.info.length
    }

    pub fn has_apical_bud(&self) -> bool {
        self.buds.iter().any(|b| b.is_apical)
    }
}

/// Proposed internode awaiting instantiation
#[derive(Debug, Clone)]
pub struct Candidate {
    pub parent: InternodeId,
    pub info: InternodeInfo,
    pub position: Vec3,
    pub rotation: Quat,
    pub buds: Vec<Bud>,
}

#[derive(Debug, Default, Clone)]
struct Slot {
    generation: u32,
    internode: Option<Internode>,
}

/// Slot storage for internodes. Vacated slots go on a free list and are
/// reused by later inserts.
#[derive(Debug, Default, Clone)]
pub struct InternodeArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    next_generation: u32,
}

impl InternodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, internode: Internode) -> InternodeId {
        let parent = internode.parent;
        let generation = self.next_generation;
        self.next_generation = self.next_generation.wrapping_add(1);
        let slot = Slot {
            generation,
            internode: Some(internode),
        };
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = slot;
                index
            }
            None => {
                self.slots.push(slot);
                (self.slots.len() - 1) as u32
            }
        };
        let id = InternodeId { index, generation };
        if let Some(p) = parent.and_then(|p| self.get_mut(p)) {
            p.children.push(id);
        }
        self.live += 1;
        id
    }

    fn slot(&self, id: InternodeId) -> Option<&Slot> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
    }

    pub fn get(&self, id: InternodeId) -> Option<&Internode> {
        self.slot(id).and_then(|s| s.internode.as_ref())
    }

    pub fn get_mut(&mut self, id: InternodeId) -> Option<&mut Internode> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.internode.as_mut())
    }

    pub fn contains(&self, id: InternodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of allocated slots, live or vacant
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Drops every internode and releases the slot storage. Ids handed out
    /// before stay invalid.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.live = 0;
    }

    /// Removes `id` and all descendants, detaching it from its parent.
    /// Returns how many internodes were removed.
    pub fn remove_subtree(&mut self, id: InternodeId) -> usize {
        let Some(parent) = self.get(id).map(|n| n.parent) else {
            return 0;
        };
        if let Some(p) = parent.and_then(|p| self.get_mut(p)) {
            p.children.retain(|&c| c != id);
        }

        let mut removed = 0;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let taken = self
                .slots
                .get_mut(current.index as usize)
                .filter(|s| s.generation == current.generation)
                .and_then(|s| s.internode.take());
            if let Some(node) = taken {
                stack.extend(node.children);
                self.free.push(current.index);
                removed += 1;
            }
        }
        self.live -= removed;
        if self.live == 0 {
            self.clear();
        }
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = (InternodeId, &Internode)> {
        self.slots.iter().enumerate().filter_map(|(index, s)| {
            let id = InternodeId {
                index: index as u32,
                generation: s.generation,
            };
            s.internode.as_ref().map(|n| (id, n))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (InternodeId, &mut Internode)> {
        self.slots.iter_mut().enumerate().filter_map(|(index, s)| {
            let id = InternodeId {
                index: index as u32,
                generation: s.generation,
            };
            s.internode.as_mut().map(|n| (id, n))
        })
    }

    /// Pre-order walk from `root`
    pub fn descendants(&self, root: InternodeId) -> Vec<InternodeId> {
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.get(current) {
                order.push(current);
                stack.extend(node.children.iter().rev());
            }
        }
        order
    }
}
