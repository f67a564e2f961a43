//! Hierarchical transform node
//!
//! Parent and child links are entity handles into the scene's slot map,
//! never pointers.

use super::entity::EntityId;
use crate::foundation::math::{Mat4, Transform};

/// Transform of one entity within the hierarchy
#[derive(Debug, Clone, PartialEq)]
pub struct TransformNode {
    /// Transform relative to the parent
    pub local: Transform,
    /// Parent entity
    pub parent: Option<EntityId>,
    /// Child entities in attachment order
    pub children: Vec<EntityId>,
    /// Resolved world matrix
    pub world: Mat4,
}

impl Default for TransformNode {
    fn default() -> Self {
        Self {
            local: Transform::identity(),
            parent: None,
            children: Vec::new(),
            world: Mat4::identity(),
        }
    }
}

impl TransformNode {
    /// Attach a child, ignoring duplicates
    pub fn add_child(&mut self, child: EntityId) {
        if !self.children.contains(&child) {
            self.children.push(child);
        }
    }

    /// Detach a child
    pub fn remove_child(&mut self, child: EntityId) {
        self.children.retain(|&id| id != child);
    }
}
