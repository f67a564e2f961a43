//! # Scene Engine
//!
//! Entity-component runtime and rendering orchestration core of a real-time
//! 3D engine.
//!
//! ## Features
//!
//! - **Entities and Components**: generation-checked entities owning typed,
//!   polymorphic components that opt into frame phases
//! - **Spatial Indexing**: one bounding-volume tree ("cosmos") per component type
//! - **Frame Pipeline**: events, transactions, gameplay, then overlapped
//!   simulation, animation and synchronization on a worker pool
//! - **Render Orchestration**: per-camera render systems with frustum and
//!   occlusion culling and instance batching
//! - **Snapshots**: ron-serializable scene pictures rebuilt through a
//!   component registry
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scene_engine::prelude::*;
//!
//! scene_engine::foundation::logging::init();
//! let scene = SceneGraph::new(SceneDesc::new(EngineSettings::default()));
//!
//! let camera_entity = scene.create_entity("camera", None);
//! let viewer = Viewer::perspective(std::f32::consts::FRAC_PI_3, 16.0 / 9.0, 0.1, 1000.0);
//! let camera = scene.add_component(camera_entity, Box::new(Camera::for_scene(&scene, viewer)));
//! scene.set_camera(Some(&camera));
//!
//! let rock = scene.create_entity("rock", None);
//! scene.set_transform(rock, Transform::from_position(Vec3::new(0.0, 0.0, -10.0)));
//! scene.add_component(rock, Box::new(MeshComponent::new(GeometryId(1), None, None)));
//!
//! let mut device = HeadlessDevice::new();
//! let mut timer = Timer::new();
//! for _ in 0..3 {
//!     let clock = timer.update();
//!     scene.dispatch(&clock);
//!     scene.publish(&mut device, &clock).expect("render failed");
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

// Shared settings
pub mod config;
pub mod core;

// Building blocks
pub mod foundation;
pub mod spatial;
pub mod tasks;

// Runtime
pub mod ecs;
pub mod events;
pub mod render;
pub mod scene;

// External collaborators
pub mod content;
pub mod physics;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        content::{ContentError, ContentManager, ContentManagerExt, MemoryContent},
        core::{EngineSettings, RenderConfig, SceneConfig, WorkerConfig},
        ecs::{
            ActorSet, Component, ComponentContext, ComponentKind, ComponentRef, ComponentRegistry, ComponentTypeId,
            Entity, EntityId,
        },
        events::{Event, EventArg, EventTarget, ListenerId, MutationVerb},
        foundation::{
            math::{Mat4, Transform, Vec3},
            time::{Clock, Timer},
        },
        physics::Simulator,
        render::{
            Camera, GeometryId, GraphicsDevice, HeadlessDevice, Material, MaterialRef, MaterialSurface, MeshComponent,
            RenderError, Renderer, Viewer,
        },
        scene::{SceneDesc, SceneGraph, SceneSnapshot, SnapshotError},
        spatial::{Aabb, Frustum, Ray},
        tasks::WorkerPool,
    };
}
