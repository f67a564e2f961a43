//! Event bus
//!
//! Key principles:
//! - Key-value arguments (no order dependency)
//! - One serial queue, drained to empty at the start of every frame
//! - Events are addressed to the scene, an entity, a component, or to
//!   listeners only; named listeners see every event of their name

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::ecs::{ComponentId, ComponentRef, EntityId};
use crate::foundation::math::Vec3;
use crate::render::material::MaterialRef;
use crate::scene::SceneGraph;

/// Name of the events published by the scene's mutation hooks
pub const MUTATION_EVENT: &str = "mutation";

/// Variant for event arguments
#[derive(Debug, Clone)]
pub enum EventArg {
    /// Boolean flag
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f32),
    /// Text value
    Text(String),
    /// 3D vector
    Vector(Vec3),
    /// Entity handle
    Entity(EntityId),
    /// Component reference
    Component(ComponentRef),
    /// Material reference
    Material(MaterialRef),
}

/// Recipients of an event besides its named listeners
#[derive(Debug, Clone)]
pub enum EventTarget {
    /// Every `MESSAGE` component in the scene
    Scene,
    /// Every component of one entity
    Entity(EntityId),
    /// One component
    Component(ComponentRef),
    /// Named listeners only
    Listeners,
}

/// Named event with key-value arguments
#[derive(Debug, Clone)]
pub struct Event {
    name: String,
    args: HashMap<String, EventArg>,
    target: EventTarget,
}

impl Event {
    /// Create an event without arguments
    pub fn new(name: impl Into<String>, target: EventTarget) -> Self {
        Self {
            name: name.into(),
            args: HashMap::new(),
            target,
        }
    }

    /// Add an argument (builder pattern)
    pub fn with_arg(mut self, key: impl Into<String>, value: EventArg) -> Self {
        self.args.insert(key.into(), value);
        self
    }

    /// Event name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Event recipients
    pub fn target(&self) -> &EventTarget {
        &self.target
    }

    /// Get an argument by key
    pub fn arg(&self, key: &str) -> Option<&EventArg> {
        self.args.get(key)
    }

    /// Boolean argument
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.arg(key) {
            Some(EventArg::Bool(value)) => Some(*value),
            _ => None,
        }
    }

    /// Integer argument
    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.arg(key) {
            Some(EventArg::Int(value)) => Some(*value),
            _ => None,
        }
    }

    /// Float argument
    pub fn get_float(&self, key: &str) -> Option<f32> {
        match self.arg(key) {
            Some(EventArg::Float(value)) => Some(*value),
            _ => None,
        }
    }

    /// Text argument
    pub fn get_text(&self, key: &str) -> Option<&str> {
        match self.arg(key) {
            Some(EventArg::Text(value)) => Some(value),
            _ => None,
        }
    }

    /// Entity argument
    pub fn get_entity(&self, key: &str) -> Option<EntityId> {
        match self.arg(key) {
            Some(EventArg::Entity(value)) => Some(*value),
            _ => None,
        }
    }

    fn is_mutation(&self) -> bool {
        self.name == MUTATION_EVENT
    }

    /// Whether the event refers to `entity` in its target or arguments
    fn mentions_entity(&self, entity: EntityId) -> bool {
        matches!(&self.target, EventTarget::Entity(id) if *id == entity)
            || matches!(&self.target, EventTarget::Component(c) if c.owner() == entity)
            || self.args.values().any(|arg| match arg {
                EventArg::Entity(id) => *id == entity,
                EventArg::Component(c) => c.owner() == entity,
                _ => false,
            })
    }

    /// Whether the event refers to `component` in its target or arguments
    fn mentions_component(&self, component: ComponentId) -> bool {
        matches!(&self.target, EventTarget::Component(c) if c.id() == component)
            || self.args.values().any(|arg| matches!(arg, EventArg::Component(c) if c.id() == component))
    }
}

/// What a mutation event reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationVerb {
    /// Object was created or attached
    Created,
    /// Object state changed
    Modified,
    /// Object was removed
    Removed,
}

impl MutationVerb {
    /// Verb as carried in the `verb` argument
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }
}

/// Handle returned by [`EventBus::listen`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Listener callback
pub type ListenerFn = Arc<dyn Fn(&SceneGraph, &Event) + Send + Sync>;

struct Listener {
    id: ListenerId,
    name: String,
    owner: Option<ComponentId>,
    callback: ListenerFn,
}

/// Serial event queue plus named listener table
pub struct EventBus {
    queue: Mutex<VecDeque<Event>>,
    listeners: RwLock<Vec<Listener>>,
    next_listener: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            listeners: RwLock::new(Vec::new()),
            next_listener: AtomicU64::new(1),
        }
    }

    /// Enqueue an event
    pub fn push(&self, event: Event) {
        log::trace!("Queued event '{}'", event.name());
        self.queue.lock().push_back(event);
    }

    /// Take the oldest queued event
    pub fn pop(&self) -> Option<Event> {
        self.queue.lock().pop_front()
    }

    /// Number of queued events
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Whether no event is queued
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Register a named listener, optionally owned by a component
    pub fn listen(&self, name: impl Into<String>, owner: Option<ComponentId>, callback: ListenerFn) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push(Listener {
            id,
            name: name.into(),
            owner,
            callback,
        });
        id
    }

    /// Remove a listener; false if it was not registered
    pub fn unlisten(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|listener| listener.id != id);
        listeners.len() != before
    }

    /// Callbacks registered under `name`, in registration order
    pub fn listeners_for(&self, name: &str) -> Vec<ListenerFn> {
        self.listeners
            .read()
            .iter()
            .filter(|listener| listener.name == name)
            .map(|listener| Arc::clone(&listener.callback))
            .collect()
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Drop queued events and listeners that refer to a removed component
    ///
    /// Mutation events are kept so editors still see the removal.
    pub fn purge_component(&self, component: ComponentId) {
        self.queue
            .lock()
            .retain(|event| event.is_mutation() || !event.mentions_component(component));
        self.listeners.write().retain(|listener| listener.owner != Some(component));
    }

    /// Drop queued events that refer to a removed entity, except mutations
    pub fn purge_entity(&self, entity: EntityId) {
        self.queue
            .lock()
            .retain(|event| event.is_mutation() || !event.mentions_entity(entity));
    }
}
