//! Scene graph state and structural operations
//!
//! Entities, components, materials, the camera and the event plumbing.
//! Frame phases live in `pipeline.rs`, spatial queries in `queries.rs`.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::{FrameStats, SceneDesc};
use crate::core::{RenderConfig, SceneConfig};
use crate::ecs::{
    ActorSet, Component, ComponentCell, ComponentContext, ComponentId, ComponentRef, ComponentStorage,
    ComponentTypeId, Entity, EntityId,
};
use crate::events::{Event, EventArg, EventBus, EventTarget, ListenerId, MutationVerb, MUTATION_EVENT};
use crate::foundation::collections::{DensePool, SlotMap};
use crate::foundation::math::{Mat4, Transform};
use crate::physics::Simulator;
use crate::render::camera::Camera;
use crate::render::material::{Material, MaterialRef, MaterialSurface, UNASSIGNED_SLOT};
use crate::tasks::{TaskHandle, TaskQueue, WorkerPool};

/// Deferred structural mutation
pub(super) type Transaction = Box<dyn FnOnce(&SceneGraph) + Send>;

/// Shared storage of one component type
pub type StorageRef = Arc<RwLock<ComponentStorage>>;

/// Components waiting for a cosmos update, FIFO per type
#[derive(Default)]
pub(super) struct PendingChanges {
    order: HashMap<ComponentTypeId, VecDeque<ComponentRef>>,
    queued: HashSet<ComponentId>,
}

impl PendingChanges {
    /// Queue a component once; later pushes keep its original position
    pub(super) fn push(&mut self, component: &ComponentRef) {
        if self.queued.insert(component.id()) {
            self.order
                .entry(component.component_type())
                .or_default()
                .push_back(Arc::clone(component));
        }
    }

    /// Take at most `limit` components of every type, oldest first
    pub(super) fn drain(&mut self, limit: usize) -> Vec<(ComponentTypeId, Vec<ComponentRef>)> {
        let mut batches = Vec::with_capacity(self.order.len());
        for (&type_id, queue) in &mut self.order {
            let count = limit.min(queue.len());
            let batch: Vec<_> = queue.drain(..count).collect();
            for component in &batch {
                self.queued.remove(&component.id());
            }
            if !batch.is_empty() {
                batches.push((type_id, batch));
            }
        }
        self.order.retain(|_, queue| !queue.is_empty());
        batches
    }

    pub(super) fn len(&self) -> usize {
        self.queued.len()
    }

    pub(super) fn len_of(&self, type_id: ComponentTypeId) -> usize {
        self.order.get(&type_id).map_or(0, VecDeque::len)
    }
}

/// Marks the scene busy while alive; transactions issued meanwhile are deferred
pub(super) struct BusyGuard<'a>(&'a AtomicUsize);

impl<'a> BusyGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

type ActorList = RwLock<DensePool<ComponentId, ComponentRef>>;

/// Owner of every live entity and component of one scene
pub struct SceneGraph {
    pub(super) config: SceneConfig,
    pub(super) render_config: RenderConfig,
    pub(super) pool: Arc<WorkerPool>,
    pub(super) simulator: Option<Arc<Mutex<dyn Simulator>>>,

    pub(super) entities: RwLock<SlotMap<EntityId, Arc<Entity>>>,
    pub(super) storages: RwLock<HashMap<ComponentTypeId, StorageRef>>,

    pub(super) updaters: ActorList,
    pub(super) synchronizers: ActorList,
    pub(super) animators: ActorList,
    pub(super) messengers: ActorList,

    pub(super) materials: RwLock<Vec<MaterialRef>>,
    pub(super) loading_material: MaterialRef,
    pub(super) camera: RwLock<Option<ComponentRef>>,

    pub(super) dirty: Mutex<Vec<EntityId>>,
    pub(super) pending: Mutex<PendingChanges>,
    pub(super) cosmos_resets: Mutex<Vec<ComponentTypeId>>,

    pub(super) events: EventBus,
    pub(super) transactions: Mutex<VecDeque<Transaction>>,
    pub(super) executing: Mutex<()>,
    pub(super) busy: AtomicUsize,

    pub(super) processing: TaskQueue,
    pub(super) rendering: TaskQueue,

    pub(super) stats: Mutex<FrameStats>,
}

impl SceneGraph {
    /// Create an empty scene
    ///
    /// The placeholder "loading" material is registered in slot 0.
    pub fn new(desc: SceneDesc) -> Arc<Self> {
        let SceneDesc {
            settings,
            pool,
            simulator,
        } = desc;

        if let Err(error) = settings.validate() {
            log::warn!("Scene created with invalid settings: {}", error);
        }
        log::info!(
            "Creating scene ({} workers, {} cosmos updates per frame)",
            pool.threads(),
            settings.scene.max_updates
        );

        let actor_list = || RwLock::new(DensePool::new(settings.scene.pool_capacity, settings.scene.pool_margin));
        let loading_material = Arc::new(Material::new("loading", MaterialSurface::default()));
        loading_material.set_slot(0);

        Arc::new(Self {
            updaters: actor_list(),
            synchronizers: actor_list(),
            animators: actor_list(),
            messengers: actor_list(),
            config: settings.scene,
            render_config: settings.render,
            pool,
            simulator,
            entities: RwLock::new(SlotMap::with_key()),
            storages: RwLock::new(HashMap::new()),
            materials: RwLock::new(vec![Arc::clone(&loading_material)]),
            loading_material,
            camera: RwLock::new(None),
            dirty: Mutex::new(Vec::new()),
            pending: Mutex::new(PendingChanges::default()),
            cosmos_resets: Mutex::new(Vec::new()),
            events: EventBus::new(),
            transactions: Mutex::new(VecDeque::new()),
            executing: Mutex::new(()),
            busy: AtomicUsize::new(0),
            processing: TaskQueue::new("processing"),
            rendering: TaskQueue::new("rendering"),
            stats: Mutex::new(FrameStats::default()),
        })
    }

    /// Scene settings
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    /// Render settings handed to cameras
    pub fn render_config(&self) -> &RenderConfig {
        &self.render_config
    }

    /// Shared worker pool
    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Counters of the last frame
    pub fn stats(&self) -> FrameStats {
        *self.stats.lock()
    }

    pub(super) fn busy(&self) -> BusyGuard<'_> {
        BusyGuard::new(&self.busy)
    }

    // ---------------------------------------------------------------
    // Entities
    // ---------------------------------------------------------------

    /// Create an entity, optionally under a parent
    ///
    /// # Panics
    ///
    /// Panics if `parent` does not belong to this scene.
    pub fn create_entity(&self, name: impl Into<String>, parent: Option<EntityId>) -> EntityId {
        let name = name.into();
        let entity = {
            let mut entities = self.entities.write();
            let id = entities.insert_with_key(|id| Arc::new(Entity::new(id, name)));
            Arc::clone(&entities[id])
        };

        if let Some(parent) = parent {
            assert!(self.set_parent(entity.id(), Some(parent)), "parent {:?} is not in this scene", parent);
        }
        self.mark_dirty(&entity);
        log::trace!("Created entity '{}' ({:?})", entity.name(), entity.id());
        self.mutate_entity(entity.id(), MutationVerb::Created);
        entity.id()
    }

    /// Entity by handle
    pub fn entity(&self, id: EntityId) -> Option<Arc<Entity>> {
        self.entities.read().get(id).cloned()
    }

    /// First entity with the given name
    pub fn find_entity_by_name(&self, name: &str) -> Option<Arc<Entity>> {
        self.entities.read().values().find(|entity| entity.name() == name).cloned()
    }

    /// Number of live entities
    pub fn entity_count(&self) -> usize {
        self.entities.read().len()
    }

    /// Every live entity
    pub fn entities(&self) -> Vec<Arc<Entity>> {
        self.entities.read().values().cloned().collect()
    }

    /// Replace an entity's local transform; marks its subtree dirty
    pub fn set_transform(&self, id: EntityId, transform: Transform) -> bool {
        let Some(entity) = self.entity(id) else {
            return false;
        };
        entity.set_local_transform(transform);
        self.mark_subtree_dirty(&entity);
        self.mutate_entity(id, MutationVerb::Modified);
        true
    }

    /// Move an entity under another one, or to the root with `None`
    ///
    /// Returns false when either entity is missing or the move would create
    /// a cycle.
    pub fn set_parent(&self, child: EntityId, parent: Option<EntityId>) -> bool {
        let Some(entity) = self.entity(child) else {
            return false;
        };

        let new_parent = match parent {
            Some(parent_id) => {
                let Some(parent) = self.entity(parent_id) else {
                    return false;
                };
                if self.is_ancestor(child, parent_id) {
                    log::warn!("Refusing to parent {:?} under its own descendant {:?}", child, parent_id);
                    return false;
                }
                Some(parent)
            }
            None => None,
        };

        let old_parent = entity.parent().and_then(|id| self.entity(id));
        if let Some(old) = old_parent {
            old.transform_node().write().remove_child(child);
        }
        if let Some(new) = &new_parent {
            new.transform_node().write().add_child(child);
        }
        entity.transform_node().write().parent = parent;

        self.mark_subtree_dirty(&entity);
        true
    }

    /// Activate or deactivate every component of an entity
    ///
    /// Components still waiting for their attach transaction are activated
    /// by that transaction instead.
    pub fn set_entity_active(&self, id: EntityId, active: bool) -> bool {
        let Some(entity) = self.entity(id) else {
            return false;
        };
        if entity.swap_active(active) == active {
            return true;
        }
        for component in entity.components() {
            self.set_component_active(&component, active);
        }
        self.mutate_entity(id, MutationVerb::Modified);
        true
    }

    /// Remove an entity and its descendants; deferred through a transaction
    pub fn remove_entity(&self, id: EntityId) {
        self.transaction(move |scene| scene.retire_entity(id));
    }

    fn retire_entity(&self, id: EntityId) {
        let Some(entity) = self.entity(id) else {
            return;
        };

        for child in entity.children() {
            self.retire_entity(child);
        }
        for component in entity.components() {
            self.retire_component(&component);
        }
        if let Some(parent) = entity.parent().and_then(|parent| self.entity(parent)) {
            parent.transform_node().write().remove_child(id);
        }

        self.entities.write().remove(id);
        self.events.purge_entity(id);
        log::trace!("Removed entity '{}' ({:?})", entity.name(), id);
        self.mutate_entity(id, MutationVerb::Removed);
    }

    fn is_ancestor(&self, ancestor: EntityId, mut id: EntityId) -> bool {
        loop {
            if id == ancestor {
                return true;
            }
            match self.entity(id).and_then(|entity| entity.parent()) {
                Some(parent) => id = parent,
                None => return false,
            }
        }
    }

    pub(super) fn mark_dirty(&self, entity: &Entity) {
        if !entity.swap_dirty(true) {
            self.dirty.lock().push(entity.id());
        }
    }

    fn mark_subtree_dirty(&self, entity: &Entity) {
        self.mark_dirty(entity);
        for child in entity.children() {
            if let Some(child) = self.entity(child) {
                self.mark_subtree_dirty(&child);
            }
        }
    }

    /// World matrix from the local transforms up the parent chain
    pub(super) fn resolve_world(&self, entity: &Entity) -> Mat4 {
        let (mut world, mut parent) = {
            let node = entity.transform_node().read();
            (node.local.to_matrix(), node.parent)
        };
        while let Some(parent_id) = parent {
            let Some(ancestor) = self.entity(parent_id) else {
                break;
            };
            let node = ancestor.transform_node().read();
            world = node.local.to_matrix() * world;
            parent = node.parent;
        }
        world
    }

    /// Number of entities waiting for the indexing phase
    pub fn dirty_count(&self) -> usize {
        self.dirty.lock().len()
    }

    // ---------------------------------------------------------------
    // Components
    // ---------------------------------------------------------------

    /// Attach a component, replacing any component of the same type
    ///
    /// The component is stored on the entity right away. Activation runs
    /// through the transaction queue: every other component of the entity
    /// is told about the newcomer, the newcomer is activated and, if the
    /// entity is active, registered with its storage and actor lists.
    ///
    /// # Panics
    ///
    /// Panics if the entity does not belong to this scene.
    pub fn add_component(&self, entity_id: EntityId, component: Box<dyn Component>) -> ComponentRef {
        let entity = self
            .entity(entity_id)
            .unwrap_or_else(|| panic!("entity {:?} is not in this scene", entity_id));

        let cell = ComponentCell::new(&entity, component);
        let replaced = entity.insert_component(Arc::clone(&cell));
        let added = Arc::clone(&cell);
        self.transaction(move |scene| scene.attach_component(replaced, added));
        cell
    }

    fn attach_component(&self, replaced: Option<ComponentRef>, added: ComponentRef) {
        if let Some(replaced) = replaced {
            self.retire_component(&replaced);
        }

        let Some(entity) = added.entity() else {
            return;
        };
        let still_current = entity
            .component(added.component_type())
            .is_some_and(|current| Arc::ptr_eq(&current, &added));
        if !still_current {
            return;
        }

        for other in entity.components() {
            if !Arc::ptr_eq(&other, &added) {
                self.with_context(&other, |component, ctx| component.activate(ctx, Some(&added)));
            }
        }
        self.with_context(&added, |component, ctx| component.activate(ctx, None));
        added.set_attached();

        if entity.is_active() {
            self.set_component_active(&added, true);
        }
        self.mutate_component(&added, MutationVerb::Created);
    }

    /// Detach and release a component; deferred through a transaction
    pub fn remove_component(&self, component: &ComponentRef) {
        let component = Arc::clone(component);
        self.transaction(move |scene| scene.retire_component(&component));
    }

    pub(super) fn retire_component(&self, component: &ComponentRef) {
        if let Some(entity) = component.entity() {
            entity.remove_component(component);
        }
        if component.is_active() {
            self.with_context(component, |inner, ctx| inner.deactivate(ctx));
        }
        self.set_component_active(component, false);

        {
            let mut camera = self.camera.write();
            if camera.as_ref().is_some_and(|current| Arc::ptr_eq(current, component)) {
                log::debug!("Active camera removed");
                *camera = None;
            }
        }

        self.events.purge_component(component.id());
        self.mutate_component(component, MutationVerb::Removed);
    }

    /// Register or unregister a component with its storage and actor lists
    ///
    /// Setting the current value again changes nothing; the cosmos is
    /// notified either way. A component cannot be activated before it is
    /// attached.
    pub fn set_component_active(&self, component: &ComponentRef, active: bool) {
        if active && !component.is_attached() {
            log::trace!("{} {:?} not attached yet; activation deferred", component.type_name(), component.id());
            return;
        }
        if component.swap_active(active) != active {
            if active {
                self.register(component);
            } else {
                self.unregister(component);
            }
        }
        self.notify_cosmos(component);
    }

    fn register(&self, component: &ComponentRef) {
        let storage = self.storage_or_create(component.component_type());
        storage.write().register(component);

        let actors = component.actors();
        for list in self.actor_lists(actors) {
            list.write().insert(component.id(), Arc::clone(component));
        }
    }

    fn unregister(&self, component: &ComponentRef) {
        if let Some(storage) = self.storage(component.component_type()) {
            storage.write().unregister(component.id());
        }
        for list in self.actor_lists(component.actors()) {
            list.write().remove(&component.id());
        }
    }

    fn actor_lists(&self, actors: ActorSet) -> impl Iterator<Item = &ActorList> {
        [
            (ActorSet::UPDATE, &self.updaters),
            (ActorSet::SYNCHRONIZE, &self.synchronizers),
            (ActorSet::ANIMATE, &self.animators),
            (ActorSet::MESSAGE, &self.messengers),
        ]
        .into_iter()
        .filter(move |(flag, _)| actors.contains(*flag))
        .map(|(_, list)| list)
    }

    /// Queue a cullable component for its next cosmos update
    ///
    /// Active components wait for their entity to be re-indexed; inactive
    /// ones are queued for removal directly.
    pub fn notify_cosmos(&self, component: &ComponentRef) {
        if !component.actors().contains(ActorSet::CULLABLE) {
            return;
        }
        if component.is_active() {
            if let Some(entity) = component.entity() {
                self.mark_dirty(&entity);
            }
        } else {
            self.pending.lock().push(component);
        }
    }

    /// Rebuild the cosmos of a type from scratch during the next finalize
    pub fn clear_cosmos(&self, type_id: ComponentTypeId) {
        let mut resets = self.cosmos_resets.lock();
        if !resets.contains(&type_id) {
            resets.push(type_id);
        }
    }

    /// Components waiting for a cosmos update
    pub fn pending_changes(&self) -> usize {
        self.pending.lock().len()
    }

    /// Components of one type waiting for a cosmos update
    pub fn pending_changes_of(&self, type_id: ComponentTypeId) -> usize {
        self.pending.lock().len_of(type_id)
    }

    /// Storage of a component type, if any component of it was ever active
    pub fn storage(&self, type_id: ComponentTypeId) -> Option<StorageRef> {
        self.storages.read().get(&type_id).cloned()
    }

    fn storage_or_create(&self, type_id: ComponentTypeId) -> StorageRef {
        if let Some(storage) = self.storage(type_id) {
            return storage;
        }
        let mut storages = self.storages.write();
        Arc::clone(storages.entry(type_id).or_insert_with(|| {
            log::debug!("Created storage for component type {}", type_id);
            Arc::new(RwLock::new(ComponentStorage::new(
                type_id,
                self.config.pool_capacity,
                self.config.pool_margin,
            )))
        }))
    }

    /// Run a hook with exclusive access to a component
    ///
    /// Skipped when the owning entity is gone.
    pub(super) fn with_context<R>(
        &self,
        component: &ComponentRef,
        f: impl FnOnce(&mut dyn Component, &ComponentContext<'_>) -> R,
    ) -> Option<R> {
        let entity = component.entity()?;
        let ctx = ComponentContext {
            scene: self,
            entity: &entity,
            component,
        };
        let mut inner = component.write();
        Some(f(&mut **inner, &ctx))
    }

    // ---------------------------------------------------------------
    // Camera
    // ---------------------------------------------------------------

    /// Make a camera component the point of view of [`publish`](Self::publish)
    ///
    /// # Panics
    ///
    /// Panics if the component is not a [`Camera`].
    pub fn set_camera(&self, camera: Option<&ComponentRef>) {
        if let Some(camera) = camera {
            assert!(camera.is::<Camera>(), "{} is not a camera", camera.type_name());
            if let Some(entity) = camera.entity() {
                self.mark_dirty(&entity);
            }
        }
        *self.camera.write() = camera.cloned();
    }

    /// Active camera
    pub fn camera(&self) -> Option<ComponentRef> {
        self.camera.read().clone()
    }

    // ---------------------------------------------------------------
    // Transactions
    // ---------------------------------------------------------------

    /// Run a structural mutation now if the scene is quiescent, else at the
    /// next transactions phase
    ///
    /// Quiescent means no phase is running, both task queues are idle, no
    /// event is pending and no earlier transaction is still waiting.
    pub fn transaction<F>(&self, f: F)
    where
        F: FnOnce(&SceneGraph) + Send + 'static,
    {
        if self.is_quiescent() {
            if let Some(_executing) = self.executing.try_lock() {
                let _busy = self.busy();
                f(self);
                return;
            }
        }
        self.transactions.lock().push_back(Box::new(f));
    }

    fn is_quiescent(&self) -> bool {
        self.busy.load(Ordering::Acquire) == 0
            && self.transactions.lock().is_empty()
            && self.events.is_empty()
            && self.processing.is_idle()
            && self.rendering.is_idle()
    }

    /// Transactions waiting for the next transactions phase
    pub fn pending_transactions(&self) -> usize {
        self.transactions.lock().len()
    }

    /// Track a task on the processing queue
    pub fn watch_processing(&self, handle: TaskHandle) {
        self.processing.watch(handle);
    }

    /// Track a task on the rendering queue
    pub fn watch_rendering(&self, handle: TaskHandle) {
        self.rendering.watch(handle);
    }

    // ---------------------------------------------------------------
    // Materials
    // ---------------------------------------------------------------

    /// Register a material and assign it the next slot
    pub fn add_material(&self, material: &MaterialRef) -> usize {
        if let Some(slot) = material.slot() {
            let materials = self.materials.read();
            if materials.get(slot).is_some_and(|current| Arc::ptr_eq(current, material)) {
                return slot;
            }
        }

        let slot = {
            let mut materials = self.materials.write();
            materials.push(Arc::clone(material));
            materials.len() - 1
        };
        material.set_slot(slot);
        log::debug!("Material '{}' assigned slot {}", material.name(), slot);
        self.mutate_material(material, MutationVerb::Created);
        slot
    }

    /// Unregister a material and compact the slots behind it
    ///
    /// Deferred through a transaction. The loading material stays.
    pub fn delete_material(&self, material: &MaterialRef) {
        let material = Arc::clone(material);
        self.transaction(move |scene| {
            if Arc::ptr_eq(&material, &scene.loading_material) {
                log::warn!("The loading material cannot be deleted");
                return;
            }

            {
                let mut materials = scene.materials.write();
                let Some(index) = materials.iter().position(|current| Arc::ptr_eq(current, &material)) else {
                    return;
                };
                materials.remove(index);
                for (slot, moved) in materials.iter().enumerate().skip(index) {
                    moved.set_slot(slot);
                }
            }
            material.set_slot(UNASSIGNED_SLOT);
            scene.mutate_material(&material, MutationVerb::Removed);
        });
    }

    /// Registered material by name
    pub fn material_by_name(&self, name: &str) -> Option<MaterialRef> {
        self.materials.read().iter().find(|material| material.name() == name).cloned()
    }

    /// Registered material by slot
    pub fn material_by_slot(&self, slot: usize) -> Option<MaterialRef> {
        self.materials.read().get(slot).cloned()
    }

    /// Every registered material in slot order
    pub fn materials(&self) -> Vec<MaterialRef> {
        self.materials.read().clone()
    }

    /// Placeholder material in slot 0
    pub fn loading_material(&self) -> &MaterialRef {
        &self.loading_material
    }

    // ---------------------------------------------------------------
    // Events
    // ---------------------------------------------------------------

    /// Queue an event for the next events phase
    pub fn push_event(&self, event: Event) {
        self.events.push(event);
    }

    /// Events waiting for the next events phase
    pub fn pending_events(&self) -> usize {
        self.events.pending()
    }

    /// Call `callback` for every event named `name`
    pub fn listen<F>(&self, name: impl Into<String>, callback: F) -> ListenerId
    where
        F: Fn(&SceneGraph, &Event) + Send + Sync + 'static,
    {
        self.events.listen(name, None, Arc::new(callback))
    }

    /// Like [`listen`](Self::listen), dropped when `owner` is removed
    pub fn listen_for<F>(&self, owner: &ComponentRef, name: impl Into<String>, callback: F) -> ListenerId
    where
        F: Fn(&SceneGraph, &Event) + Send + Sync + 'static,
    {
        self.events.listen(name, Some(owner.id()), Arc::new(callback))
    }

    /// Remove a listener
    pub fn unlisten(&self, id: ListenerId) -> bool {
        self.events.unlisten(id)
    }

    /// Deliver an event to its recipients, then to its named listeners
    pub fn resolve_event(&self, event: &Event) {
        match event.target() {
            EventTarget::Scene => {
                let messengers = self.messengers.read().snapshot();
                for component in messengers.iter() {
                    self.deliver(component, event);
                }
            }
            EventTarget::Entity(id) => {
                if let Some(entity) = self.entity(*id) {
                    for component in entity.components() {
                        self.deliver(&component, event);
                    }
                }
            }
            EventTarget::Component(component) => self.deliver(component, event),
            EventTarget::Listeners => {}
        }

        for listener in self.events.listeners_for(event.name()) {
            listener(self, event);
        }
    }

    fn deliver(&self, component: &ComponentRef, event: &Event) {
        if component.is_active() {
            self.with_context(component, |inner, ctx| inner.message(ctx, event));
        }
    }

    /// Publish an entity mutation when mutation events are enabled
    pub fn mutate_entity(&self, id: EntityId, verb: MutationVerb) {
        if self.config.mutations {
            self.events.push(Self::mutation(verb).with_arg("entity", EventArg::Entity(id)));
        }
    }

    /// Publish a component mutation when mutation events are enabled
    pub fn mutate_component(&self, component: &ComponentRef, verb: MutationVerb) {
        if self.config.mutations {
            self.events.push(
                Self::mutation(verb)
                    .with_arg("entity", EventArg::Entity(component.owner()))
                    .with_arg("component", EventArg::Component(Arc::clone(component))),
            );
        }
    }

    /// Publish a material mutation when mutation events are enabled
    pub fn mutate_material(&self, material: &MaterialRef, verb: MutationVerb) {
        if self.config.mutations {
            self.events.push(Self::mutation(verb).with_arg("material", EventArg::Material(Arc::clone(material))));
        }
    }

    fn mutation(verb: MutationVerb) -> Event {
        Event::new(MUTATION_EVENT, EventTarget::Listeners).with_arg("verb", EventArg::Text(verb.as_str().to_string()))
    }
}

impl std::fmt::Debug for SceneGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneGraph")
            .field("entities", &self.entity_count())
            .field("storages", &self.storages.read().len())
            .field("materials", &self.materials.read().len())
            .field("pending_events", &self.events.pending())
            .field("pending_transactions", &self.transactions.lock().len())
            .field("stats", &self.stats())
            .finish()
    }
}
