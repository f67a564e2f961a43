//! # Scene Graph
//!
//! Top-level orchestrator of the scene core. A [`SceneGraph`] owns every
//! entity, one [`ComponentStorage`](crate::ecs::ComponentStorage) per
//! component type, the active camera, the event bus, the transaction queue
//! and the two task queues (processing and rendering).
//!
//! ## Frame
//!
//! [`SceneGraph::dispatch`] runs the pipeline in a fixed order:
//!
//! 1. events
//! 2. transactions
//! 3. gameplay
//! 4. simulate, animate and synchronize (overlapped on the worker pool)
//! 5. indexing
//! 6. finalize, the only phase that mutates a cosmos
//!
//! [`SceneGraph::publish`] then renders the active camera.

mod pipeline;
mod queries;
mod scene_graph;
mod snapshot;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::content::ContentError;
use crate::core::EngineSettings;
use crate::ecs::ComponentTypeId;
use crate::physics::Simulator;
use crate::tasks::WorkerPool;

pub use scene_graph::{SceneGraph, StorageRef};
pub use snapshot::{ComponentRecord, EntityRecord, MaterialRecord, SceneSnapshot, SnapshotIndexMap};

/// Snapshot capture and restore errors
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// ron serialization failed
    #[error("Failed to serialize snapshot: {0}")]
    Serialize(String),

    /// ron parsing failed
    #[error("Failed to parse snapshot: {0}")]
    Parse(String),

    /// No factory is registered for a component type
    #[error("Unknown component type {0}")]
    UnknownComponent(ComponentTypeId),

    /// A parent index does not point at an earlier entity
    #[error("Entity {entity} has invalid parent index {parent}")]
    InvalidParent {
        /// Index of the entity record
        entity: usize,
        /// Offending parent index
        parent: usize,
    },

    /// A referenced resource could not be loaded
    #[error("Content error: {0}")]
    Content(#[from] ContentError),

    /// A component rejected its metadata
    #[error("Invalid {type_name} metadata: {reason}")]
    Metadata {
        /// Component type name
        type_name: &'static str,
        /// What went wrong
        reason: String,
    },
}

/// Counters describing the most recent frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frames dispatched since the scene was created
    pub dispatched_frames: u64,
    /// Cosmos entries touched by the last finalize
    pub cosmos_updates: usize,
    /// Draw calls issued by the last publish
    pub draw_calls: usize,
}

/// Everything a scene is built from
pub struct SceneDesc {
    /// Scene, render and worker settings
    pub settings: EngineSettings,
    /// Worker pool shared by the parallel phases
    pub pool: Arc<WorkerPool>,
    /// Physics world stepped by the simulate phase
    pub simulator: Option<Arc<Mutex<dyn Simulator>>>,
}

impl SceneDesc {
    /// Description with a worker pool sized from the settings
    pub fn new(settings: EngineSettings) -> Self {
        let pool = Arc::new(WorkerPool::from_config(&settings.workers));
        Self {
            settings,
            pool,
            simulator: None,
        }
    }

    /// Share an existing worker pool
    pub fn with_pool(mut self, pool: Arc<WorkerPool>) -> Self {
        self.pool = pool;
        self
    }

    /// Attach a physics simulator
    pub fn with_simulator(mut self, simulator: Arc<Mutex<dyn Simulator>>) -> Self {
        self.simulator = Some(simulator);
        self
    }
}

impl Default for SceneDesc {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}

impl std::fmt::Debug for SceneDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneDesc")
            .field("settings", &self.settings)
            .field("threads", &self.pool.threads())
            .field("simulator", &self.simulator.is_some())
            .finish()
    }
}
