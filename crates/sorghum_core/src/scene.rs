//! Entity/scene capability interface and an in-memory implementation.
//!
//! Plant assembly, field layout and the scanner only talk to the scene
//! through [`SceneGraph`]: create/delete entities, typed components,
//! parent/child links and "all entities with component X" queries.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use glam::Mat4;

use crate::error::{Error, Result};
use crate::mesh::Mesh;
use crate::raytrace::{MeshInstance, SurfaceHandle};

/// Generational entity handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity {
    index: u32,
    generation: u32,
}

impl Entity {
    pub fn index(&self) -> u32 {
        self.index
    }
}

/// Anything storable as a component
pub trait Component: Any + Send + Sync + Clone {}
impl<T: Any + Send + Sync + Clone> Component for T {}

/// Local transform relative to the parent entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub local: Mat4,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            local: Mat4::IDENTITY,
        }
    }
}

impl Transform {
    pub fn from_matrix(local: Mat4) -> Self {
        Self { local }
    }
}

/// Renderable geometry with the surface handle reported by ray hits
#[derive(Debug, Clone)]
pub struct MeshRenderer {
    pub handle: SurfaceHandle,
    pub mesh: Arc<Mesh>,
}

pub trait SceneGraph {
    fn create_entity(&mut self, name: &str) -> Entity;
    /// Deletes the entity and its whole subtree
    fn delete_entity(&mut self, entity: Entity);
    fn is_valid(&self, entity: Entity) -> bool;
    fn name(&self, entity: Entity) -> Option<&str>;

    fn set_parent(&mut self, child: Entity, parent: Entity) -> Result<()>;
    fn parent(&self, entity: Entity) -> Option<Entity>;
    fn children(&self, entity: Entity) -> Vec<Entity>;

    fn set_component<C: Component>(&mut self, entity: Entity, component: C) -> Result<()>;
    fn component<C: Component>(&self, entity: Entity) -> Option<&C>;
    fn component_mut<C: Component>(&mut self, entity: Entity) -> Option<&mut C>;
    fn remove_component<C: Component>(&mut self, entity: Entity);
    fn has_component<C: Component>(&self, entity: Entity) -> bool {
        self.component::<C>(entity).is_some()
    }
    /// Valid entities carrying `C`, ordered by entity index
    fn entities_with<C: Component>(&self) -> Vec<Entity>;

    /// Fresh surface identity for a new renderer
    fn allocate_surface_handle(&mut self) -> SurfaceHandle;
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    alive: bool,
    name: String,
    parent: Option<Entity>,
    children: Vec<Entity>,
}

/// In-memory scene used by the dataset pipeline and by tests
#[derive(Default)]
pub struct Scene {
    slots: Vec<Slot>,
    free: Vec<u32>,
    components: HashMap<TypeId, HashMap<Entity, Box<dyn Any + Send + Sync>>>,
    next_handle: SurfaceHandle,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity_count(&self) -> usize {
        self.slots.iter().filter(|s| s.alive).count()
    }

    fn slot(&self, entity: Entity) -> Option<&Slot> {
        self.slots
            .get(entity.index as usize)
            .filter(|s| s.alive && s.generation == entity.generation)
    }

    fn require(&self, entity: Entity) -> Result<()> {
        if self.is_valid(entity) {
            Ok(())
        } else {
            Err(Error::unavailable(format!("invalid entity {:?}", entity)))
        }
    }

    fn detach(&mut self, child: Entity) {
        if let Some(parent) = self.slot(child).and_then(|s| s.parent) {
            if let Some(slot) = self.slots.get_mut(parent.index as usize) {
                slot.children.retain(|c| *c != child);
            }
        }
    }
}

impl SceneGraph for Scene {
    fn create_entity(&mut self, name: &str) -> Entity {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.generation += 1;
        slot.alive = true;
        slot.name = name.to_string();
        slot.parent = None;
        slot.children.clear();
        Entity {
            index,
            generation: slot.generation,
        }
    }

    fn delete_entity(&mut self, entity: Entity) {
        if !self.is_valid(entity) {
            return;
        }
        self.detach(entity);

        let mut stack = vec![entity];
        while let Some(current) = stack.pop() {
            let slot = &mut self.slots[current.index as usize];
            stack.append(&mut slot.children);
            slot.alive = false;
            slot.parent = None;
            self.free.push(current.index);
            for store in self.components.values_mut() {
                store.remove(&current);
            }
        }
    }

    fn is_valid(&self, entity: Entity) -> bool {
        self.slot(entity).is_some()
    }

    fn name(&self, entity: Entity) -> Option<&str> {
        self.slot(entity).map(|s| s.name.as_str())
    }

    fn set_parent(&mut self, child: Entity, parent: Entity) -> Result<()> {
        self.require(child)?;
        self.require(parent)?;
        if child == parent {
            return Err(Error::config("entity cannot parent itself"));
        }
        // Reject cycles: parent must not be a descendant of child
        let mut cursor = Some(parent);
        while let Some(current) = cursor {
            if current == child {
                return Err(Error::config("parent link would create a cycle"));
            }
            cursor = self.parent(current);
        }

        self.detach(child);
        self.slots[child.index as usize].parent = Some(parent);
        self.slots[parent.index as usize].children.push(child);
        Ok(())
    }

    fn parent(&self, entity: Entity) -> Option<Entity> {
        self.slot(entity).and_then(|s| s.parent)
    }

    fn children(&self, entity: Entity) -> Vec<Entity> {
        self.slot(entity)
            .map(|s| s.children.clone())
            .unwrap_or_default()
    }

    fn set_component<C: Component>(&mut self, entity: Entity, component: C) -> Result<()> {
        self.require(entity)?;
        self.components
            .entry(TypeId::of::<C>())
            .or_default()
            .insert(entity, Box::new(component));
        Ok(())
    }

    fn component<C: Component>(&self, entity: Entity) -> Option<&C> {
        if !self.is_valid(entity) {
            return None;
        }
        self.components
            .get(&TypeId::of::<C>())?
            .get(&entity)?
            .downcast_ref::<C>()
    }

    fn component_mut<C: Component>(&mut self, entity: Entity) -> Option<&mut C> {
        if !self.is_valid(entity) {
            return None;
        }
        self.components
            .get_mut(&TypeId::of::<C>())?
            .get_mut(&entity)?
            .downcast_mut::<C>()
    }

    fn remove_component<C: Component>(&mut self, entity: Entity) {
        if let Some(store) = self.components.get_mut(&TypeId::of::<C>()) {
            store.remove(&entity);
        }
    }

    fn entities_with<C: Component>(&self) -> Vec<Entity> {
        let mut entities: Vec<Entity> = self
            .components
            .get(&TypeId::of::<C>())
            .map(|store| store.keys().copied().filter(|e| self.is_valid(*e)).collect())
            .unwrap_or_default();
        entities.sort();
        entities
    }

    fn allocate_surface_handle(&mut self) -> SurfaceHandle {
        // 0 is reserved for "no surface"
        self.next_handle += 1;
        self.next_handle
    }
}

/// World matrix of `entity`, composing `Transform`s up the parent chain
pub fn global_transform<S: SceneGraph>(scene: &S, entity: Entity) -> Mat4 {
    let mut matrix = Mat4::IDENTITY;
    let mut cursor = Some(entity);
    while let Some(current) = cursor {
        if let Some(transform) = scene.component::<Transform>(current) {
            matrix = transform.local * matrix;
        }
        cursor = scene.parent(current);
    }
    matrix
}

/// Every renderer in the scene as a world-space oracle instance
pub fn collect_mesh_instances<S: SceneGraph>(scene: &S) -> Vec<MeshInstance> {
    scene
        .entities_with::<MeshRenderer>()
        .into_iter()
        .filter_map(|entity| {
            let renderer = scene.component::<MeshRenderer>(entity)?;
            Some(MeshInstance {
                handle: renderer.handle,
                mesh: Arc::clone(&renderer.mesh),
                transform: global_transform(scene, entity),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[derive(Debug, Clone, PartialEq)]
    struct Tag(u32);

    #[test]
    fn test_component_roundtrip() {
        let mut scene = Scene::new();
        let e = scene.create_entity("plant");
        scene.set_component(e, Tag(7)).unwrap();
        assert!(scene.has_component::<Tag>(e));
        assert_eq!(scene.component::<Tag>(e), Some(&Tag(7)));
        scene.component_mut::<Tag>(e).unwrap().0 = 9;
        assert_eq!(scene.component::<Tag>(e), Some(&Tag(9)));
        assert_eq!(scene.entities_with::<Tag>(), vec![e]);
    }

    #[test]
    fn test_delete_subtree_invalidates_handles() {
        let mut scene = Scene::new();
        let root = scene.create_entity("field");
        let child = scene.create_entity("plant");
        let grandchild = scene.create_entity("leaf");
        scene.set_parent(child, root).unwrap();
        scene.set_parent(grandchild, child).unwrap();
        scene.set_component(grandchild, Tag(1)).unwrap();

        scene.delete_entity(child);
        assert!(scene.is_valid(root));
        assert!(!scene.is_valid(child));
        assert!(!scene.is_valid(grandchild));
        assert!(scene.children(root).is_empty());
        assert!(scene.entities_with::<Tag>().is_empty());

        // Recycled slot gets a new generation
        let reused = scene.create_entity("other");
        assert_ne!(reused, child);
        assert!(!scene.is_valid(child));
    }

    #[test]
    fn test_set_parent_rejects_cycle() {
        let mut scene = Scene::new();
        let a = scene.create_entity("a");
        let b = scene.create_entity("b");
        scene.set_parent(b, a).unwrap();
        assert!(scene.set_parent(a, b).is_err());
    }

    #[test]
    fn test_global_transform_composes() {
        let mut scene = Scene::new();
        let parent = scene.create_entity("parent");
        let child = scene.create_entity("child");
        scene.set_parent(child, parent).unwrap();
        scene
            .set_component(parent, Transform::from_matrix(Mat4::from_translation(Vec3::X)))
            .unwrap();
        scene
            .set_component(child, Transform::from_matrix(Mat4::from_translation(Vec3::Y)))
            .unwrap();
        let world = global_transform(&scene, child);
        assert_eq!(world.transform_point3(Vec3::ZERO), Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_collect_mesh_instances() {
        let mut scene = Scene::new();
        let e = scene.create_entity("ground");
        let handle = scene.allocate_surface_handle();
        scene
            .set_component(
                e,
                MeshRenderer {
                    handle,
                    mesh: Arc::new(Mesh::default()),
                },
            )
            .unwrap();
        let instances = collect_mesh_instances(&scene);
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].handle, handle);
        assert_ne!(handle, 0);
    }
}
