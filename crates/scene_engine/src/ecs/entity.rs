//! Entity implementation
//!
//! An entity owns a transform node, a map of components keyed by type id and
//! a cached bounding snapshot refreshed by the indexing phase.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use slotmap::new_key_type;

use super::component::{ComponentKind, ComponentRef, ComponentTypeId};
use super::transform::TransformNode;
use crate::foundation::math::{Mat4, Transform, Vec3};
use crate::spatial::Aabb;

new_key_type! {
    /// Generation-checked entity handle, never reused while the entity is alive
    pub struct EntityId;
}

/// Cached world-space bounds of an entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntitySnapshot {
    /// Maps the entity's local box (as a unit cube) into world space
    pub world: Mat4,
    /// Local box the snapshot was built from
    pub local: Aabb,
    /// World-space minimum corner
    pub min: Vec3,
    /// World-space maximum corner
    pub max: Vec3,
    /// Distance to the camera when the snapshot was taken
    pub distance: f32,
    /// Normalized visibility from the last culling pass
    pub visibility: f32,
}

impl Default for EntitySnapshot {
    fn default() -> Self {
        let local = Aabb::unit();
        Self {
            world: Mat4::identity(),
            local,
            min: local.min,
            max: local.max,
            distance: 0.0,
            visibility: 1.0,
        }
    }
}

impl EntitySnapshot {
    /// Build a snapshot from a world transform and a local box
    pub fn compute(world_transform: &Mat4, local: Aabb, camera: Option<Vec3>) -> Self {
        let bounds = local.transformed(world_transform);
        let extents = local.extents();
        let world = world_transform
            * Mat4::new_translation(&local.center())
            * Mat4::new_nonuniform_scaling(&extents);
        let distance = camera.map_or(0.0, |position| (bounds.center() - position).norm());

        Self {
            world,
            local,
            min: bounds.min,
            max: bounds.max,
            distance,
            visibility: 1.0,
        }
    }

    /// World-space axis-aligned box
    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.min, self.max)
    }

    /// Bounding radius of the world box
    pub fn radius(&self) -> f32 {
        self.bounds().radius()
    }
}

/// Scene object owning a transform and a set of components
pub struct Entity {
    id: EntityId,
    name: RwLock<String>,
    active: AtomicBool,
    dirty: AtomicBool,
    transform: RwLock<TransformNode>,
    components: RwLock<BTreeMap<ComponentTypeId, ComponentRef>>,
    snapshot: RwLock<EntitySnapshot>,
}

impl Entity {
    /// Create a detached entity
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: RwLock::new(name.into()),
            active: AtomicBool::new(true),
            dirty: AtomicBool::new(false),
            transform: RwLock::new(TransformNode::default()),
            components: RwLock::new(BTreeMap::new()),
            snapshot: RwLock::new(EntitySnapshot::default()),
        }
    }

    /// Entity handle
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Entity name
    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    /// Rename the entity
    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.write() = name.into();
    }

    /// Whether the entity is active
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn swap_active(&self, active: bool) -> bool {
        self.active.swap(active, Ordering::AcqRel)
    }

    /// Whether the transform changed since the last indexing pass
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Set the dirty flag, returning the previous value
    pub(crate) fn swap_dirty(&self, dirty: bool) -> bool {
        self.dirty.swap(dirty, Ordering::AcqRel)
    }

    /// Local transform
    pub fn transform(&self) -> Transform {
        self.transform.read().local
    }

    pub(crate) fn set_local_transform(&self, transform: Transform) {
        self.transform.write().local = transform;
    }

    /// World matrix resolved by the last indexing pass
    pub fn world_matrix(&self) -> Mat4 {
        self.transform.read().world
    }

    pub(crate) fn set_world_matrix(&self, world: Mat4) {
        self.transform.write().world = world;
    }

    /// Parent entity
    pub fn parent(&self) -> Option<EntityId> {
        self.transform.read().parent
    }

    /// Direct children
    pub fn children(&self) -> Vec<EntityId> {
        self.transform.read().children.clone()
    }

    pub(crate) fn transform_node(&self) -> &RwLock<TransformNode> {
        &self.transform
    }

    /// Cached bounding snapshot
    pub fn snapshot(&self) -> EntitySnapshot {
        *self.snapshot.read()
    }

    pub(crate) fn set_snapshot(&self, snapshot: EntitySnapshot) {
        *self.snapshot.write() = snapshot;
    }

    pub(crate) fn set_visibility(&self, distance: f32, visibility: f32) {
        let mut snapshot = self.snapshot.write();
        snapshot.distance = distance;
        snapshot.visibility = visibility;
    }

    /// Component of the given type
    pub fn component(&self, type_id: ComponentTypeId) -> Option<ComponentRef> {
        self.components.read().get(&type_id).cloned()
    }

    /// Component of a concrete type
    pub fn component_of<T: ComponentKind>(&self) -> Option<ComponentRef> {
        self.component(T::TYPE)
    }

    /// Whether a component of the given type is attached
    pub fn has_component(&self, type_id: ComponentTypeId) -> bool {
        self.components.read().contains_key(&type_id)
    }

    /// Every attached component, ordered by type id
    pub fn components(&self) -> Vec<ComponentRef> {
        self.components.read().values().cloned().collect()
    }

    /// Attach a component, returning the one it replaces
    pub(crate) fn insert_component(&self, component: ComponentRef) -> Option<ComponentRef> {
        debug_assert_eq!(component.owner(), self.id, "component owned by another entity");
        self.components.write().insert(component.component_type(), component)
    }

    /// Detach a component if it is still the one stored under its type
    pub(crate) fn remove_component(&self, component: &ComponentRef) -> bool {
        let mut components = self.components.write();
        match components.get(&component.component_type()) {
            Some(current) if std::sync::Arc::ptr_eq(current, component) => {
                components.remove(&component.component_type());
                true
            }
            _ => false,
        }
    }

    /// Union of every component's local bounds, the unit cube when none
    pub fn local_bounds(&self) -> Aabb {
        self.components
            .read()
            .values()
            .filter_map(|component| component.read().local_bounds())
            .reduce(|a, b| a.merge(&b))
            .unwrap_or_else(Aabb::unit)
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.id)
            .field("name", &*self.name.read())
            .field("active", &self.is_active())
            .field("components", &self.components.read().len())
            .finish()
    }
}
