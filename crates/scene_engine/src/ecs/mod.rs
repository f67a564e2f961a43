//! Entity-Component model
//!
//! Entities live in the scene's slot map and own their components through
//! shared cells; each cell keeps a weak back-reference to its entity.
//! Components of one type are pooled and spatially indexed by a
//! [`ComponentStorage`].

pub mod component;
pub mod entity;
pub mod registry;
pub mod storage;
pub mod transform;

pub use component::{
    ActorSet, Component, ComponentCell, ComponentContext, ComponentId, ComponentKind, ComponentRef,
    ComponentTypeId,
};
pub use entity::{Entity, EntityId, EntitySnapshot};
pub use registry::ComponentRegistry;
pub use storage::ComponentStorage;
pub use transform::TransformNode;
