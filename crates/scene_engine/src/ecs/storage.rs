//! Component storage
//!
//! One storage per component type: a dense pool of the active components of
//! that type paired with the cosmos indexing their owners' world boxes. The
//! scene only mutates the cosmos from its finalize phase.

use super::component::{ComponentId, ComponentRef, ComponentTypeId};
use crate::foundation::collections::DensePool;
use crate::spatial::{Aabb, Cosmos, SpatialQuery};

/// Dense pool plus cosmos for one component type
pub struct ComponentStorage {
    type_id: ComponentTypeId,
    pool: DensePool<ComponentId, ComponentRef>,
    cosmos: Cosmos<ComponentId>,
}

impl ComponentStorage {
    /// Create an empty storage
    pub fn new(type_id: ComponentTypeId, capacity: usize, margin: usize) -> Self {
        Self {
            type_id,
            pool: DensePool::new(capacity, margin),
            cosmos: Cosmos::new(),
        }
    }

    /// Component type stored here
    pub fn component_type(&self) -> ComponentTypeId {
        self.type_id
    }

    /// Add an active component to the pool; false if already present
    pub fn register(&mut self, component: &ComponentRef) -> bool {
        debug_assert_eq!(component.component_type(), self.type_id);
        self.pool.insert(component.id(), component.clone())
    }

    /// Remove a component from the pool
    pub fn unregister(&mut self, id: ComponentId) -> Option<ComponentRef> {
        self.pool.remove(&id)
    }

    /// Pooled component by id
    pub fn get(&self, id: ComponentId) -> Option<&ComponentRef> {
        self.pool.get(&id)
    }

    /// Dense slice of every pooled component
    pub fn pool(&self) -> &[ComponentRef] {
        self.pool.as_slice()
    }

    /// Number of pooled components
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    /// Whether the pool is empty
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Spatial index of pooled components
    pub fn cosmos(&self) -> &Cosmos<ComponentId> {
        &self.cosmos
    }

    /// Bring one component's cosmos entry in line with its state
    ///
    /// Inactive components leave the cosmos; active ones are inserted the
    /// first time and moved afterwards.
    pub fn update_cosmos(&mut self, component: &ComponentRef, bounds: &Aabb) {
        if !component.is_active() {
            self.cosmos.remove(&component.id());
            component.set_indexed(false);
        } else if component.is_indexed() {
            self.cosmos.update(component.id(), bounds.min, bounds.max);
        } else {
            self.cosmos.insert(component.id(), bounds.min, bounds.max);
            component.set_indexed(true);
        }
    }

    /// Remove every component from the cosmos
    pub fn clear_cosmos(&mut self) {
        for component in self.pool.iter() {
            component.set_indexed(false);
        }
        self.cosmos.clear();
    }

    /// Pooled components whose cosmos box passes `query`
    pub fn query<Q: SpatialQuery + ?Sized>(&self, query: &Q) -> Vec<ComponentRef> {
        let mut found = Vec::new();
        self.cosmos.query_with(query, |id, _| {
            if let Some(component) = self.pool.get(id) {
                found.push(component.clone());
            }
        });
        found
    }
}

impl std::fmt::Debug for ComponentStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentStorage")
            .field("type_id", &self.type_id)
            .field("pooled", &self.pool.len())
            .field("indexed", &self.cosmos.len())
            .finish()
    }
}
