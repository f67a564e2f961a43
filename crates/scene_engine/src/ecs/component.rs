//! Component trait and the shared cell every component lives in
//!
//! A component is a polymorphic behavior unit attached to exactly one
//! [`Entity`]. Its [`ActorSet`] declares which frame phases it takes part in;
//! the scene reads the set once, when the component is created.

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use bitflags::bitflags;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};

use super::entity::{Entity, EntityId};
use crate::content::ContentManager;
use crate::events::Event;
use crate::foundation::time::Clock;
use crate::render::drawable::Drawable;
use crate::scene::{SceneGraph, SnapshotError};
use crate::spatial::Aabb;

/// Stable numeric key identifying a component type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentTypeId(pub u64);

impl std::fmt::Display for ComponentTypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Process-unique component identity, used as the cosmos and pool handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u64);

impl ComponentId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value
    pub fn raw(self) -> u64 {
        self.0
    }
}

bitflags! {
    /// Frame phases and capabilities a component opts into
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ActorSet: u32 {
        /// Receives `update` during gameplay
        const UPDATE = 1 << 0;
        /// Receives `synchronize` in parallel after gameplay
        const SYNCHRONIZE = 1 << 1;
        /// Receives `animate` in parallel after gameplay
        const ANIMATE = 1 << 2;
        /// Receives scene-wide broadcast events
        const MESSAGE = 1 << 3;
        /// Indexed in its storage's cosmos
        const CULLABLE = 1 << 4;
        /// Drawn by the drawable renderer
        const DRAWABLE = 1 << 5;
    }
}

/// Access to the scene from inside a component callback
pub struct ComponentContext<'a> {
    /// Scene owning the component
    pub scene: &'a SceneGraph,
    /// Entity owning the component
    pub entity: &'a Arc<Entity>,
    /// Cell of the component being called
    pub component: &'a ComponentRef,
}

/// Behavior unit attached to an entity
///
/// Every hook has an empty default; a component only overrides the phases it
/// declares in [`Component::actors`]. Hooks run with the component's cell
/// write-locked, so a component must not look itself up through the scene.
pub trait Component: Any + Send + Sync {
    /// Type key of this component
    fn component_type(&self) -> ComponentTypeId;

    /// Human readable type name
    fn type_name(&self) -> &'static str;

    /// Downcast support
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcast support
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Phases this component participates in
    fn actors(&self) -> ActorSet {
        ActorSet::empty()
    }

    /// Called once per component on the entity when `added` joins it;
    /// the joining component itself receives `None`
    fn activate(&mut self, _ctx: &ComponentContext<'_>, _added: Option<&ComponentRef>) {}

    /// Called before the component leaves its entity
    fn deactivate(&mut self, _ctx: &ComponentContext<'_>) {}

    /// Gameplay update, single threaded, may mutate the scene
    fn update(&mut self, _ctx: &ComponentContext<'_>, _clock: &Clock) {}

    /// Parallel animation step
    fn animate(&mut self, _ctx: &ComponentContext<'_>, _clock: &Clock) {}

    /// Parallel push of component state toward device-facing data
    fn synchronize(&mut self, _ctx: &ComponentContext<'_>, _clock: &Clock) {}

    /// Event delivery
    fn message(&mut self, _ctx: &ComponentContext<'_>, _event: &Event) {}

    /// Box this component contributes to its entity's local bounds
    fn local_bounds(&self) -> Option<Aabb> {
        None
    }

    /// Drawing interface for `DRAWABLE` components
    fn as_drawable(&self) -> Option<&dyn Drawable> {
        None
    }

    /// Opaque metadata persisted in scene snapshots
    fn save(&self) -> Option<String> {
        None
    }

    /// Restore from snapshot metadata
    fn load(&mut self, _metadata: &str, _content: &dyn ContentManager) -> Result<(), SnapshotError> {
        Ok(())
    }
}

/// Static identity of a concrete component type
pub trait ComponentKind: Component + Sized {
    /// Type key
    const TYPE: ComponentTypeId;
    /// Type name
    const NAME: &'static str;
}

/// Implements the identity and downcast methods of [`Component`] from [`ComponentKind`]
#[macro_export]
macro_rules! component_identity {
    () => {
        fn component_type(&self) -> $crate::ecs::ComponentTypeId {
            <Self as $crate::ecs::ComponentKind>::TYPE
        }

        fn type_name(&self) -> &'static str {
            <Self as $crate::ecs::ComponentKind>::NAME
        }

        fn as_any(&self) -> &dyn ::std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
            self
        }
    };
}

/// Shared handle on a component cell
pub type ComponentRef = Arc<ComponentCell>;

/// Lifecycle state and interior of one component
pub struct ComponentCell {
    id: ComponentId,
    type_id: ComponentTypeId,
    type_name: &'static str,
    actors: ActorSet,
    owner: EntityId,
    entity: Weak<Entity>,
    active: AtomicBool,
    attached: AtomicBool,
    indexed: AtomicBool,
    inner: RwLock<Box<dyn Component>>,
}

impl ComponentCell {
    /// Wrap a component for `entity`; the owner never changes afterwards
    pub fn new(entity: &Arc<Entity>, component: Box<dyn Component>) -> ComponentRef {
        Arc::new(Self {
            id: ComponentId::next(),
            type_id: component.component_type(),
            type_name: component.type_name(),
            actors: component.actors(),
            owner: entity.id(),
            entity: Arc::downgrade(entity),
            active: AtomicBool::new(false),
            attached: AtomicBool::new(false),
            indexed: AtomicBool::new(false),
            inner: RwLock::new(component),
        })
    }

    /// Component identity
    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// Component type key
    pub fn component_type(&self) -> ComponentTypeId {
        self.type_id
    }

    /// Component type name
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Phases this component participates in
    pub fn actors(&self) -> ActorSet {
        self.actors
    }

    /// Owning entity handle
    pub fn owner(&self) -> EntityId {
        self.owner
    }

    /// Owning entity, if still alive
    pub fn entity(&self) -> Option<Arc<Entity>> {
        self.entity.upgrade()
    }

    /// Whether the component is registered with the scene
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Swap the active flag, returning the previous value
    pub(crate) fn swap_active(&self, active: bool) -> bool {
        self.active.swap(active, Ordering::AcqRel)
    }

    /// Whether the entity's other components have been told about this one
    ///
    /// Until then the component cannot be activated.
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    pub(crate) fn set_attached(&self) {
        self.attached.store(true, Ordering::Release);
    }

    /// Whether the component currently sits in its storage's cosmos
    pub fn is_indexed(&self) -> bool {
        self.indexed.load(Ordering::Acquire)
    }

    pub(crate) fn set_indexed(&self, indexed: bool) {
        self.indexed.store(indexed, Ordering::Release);
    }

    /// Shared access to the component
    pub fn read(&self) -> RwLockReadGuard<'_, Box<dyn Component>> {
        self.inner.read()
    }

    /// Exclusive access to the component
    pub fn write(&self) -> RwLockWriteGuard<'_, Box<dyn Component>> {
        self.inner.write()
    }

    /// Run `f` on the component if it is a `T`
    pub fn with<T: Component, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let guard = self.inner.read();
        guard.as_any().downcast_ref::<T>().map(f)
    }

    /// Run `f` on the component mutably if it is a `T`
    pub fn with_mut<T: Component, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut guard = self.inner.write();
        guard.as_any_mut().downcast_mut::<T>().map(f)
    }

    /// Whether the component is a `T`
    pub fn is<T: ComponentKind>(&self) -> bool {
        self.type_id == T::TYPE
    }
}

impl std::fmt::Debug for ComponentCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentCell")
            .field("id", &self.id)
            .field("type", &self.type_name)
            .field("owner", &self.owner)
            .field("active", &self.is_active())
            .field("indexed", &self.is_indexed())
            .finish()
    }
}
