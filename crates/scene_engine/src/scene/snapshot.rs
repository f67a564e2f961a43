//! Scene snapshots
//!
//! A [`SceneSnapshot`] is a flat, serializable picture of the scene:
//! entities in parent-before-child order with parent links as indices,
//! components as `(type id, metadata)` pairs and materials by resource path.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::scene_graph::SceneGraph;
use super::SnapshotError;
use crate::content::{ContentManager, ContentManagerExt};
use crate::ecs::{ComponentRegistry, ComponentTypeId, EntityId};
use crate::foundation::math::Transform;
use crate::render::material::{Material, MaterialSurface};

/// Saved component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRecord {
    /// Registered type key
    pub type_id: ComponentTypeId,
    /// Component-defined ron metadata
    pub metadata: Option<String>,
}

/// Saved entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Entity name
    pub name: String,
    /// Whether the entity was active
    pub active: bool,
    /// Local transform
    pub transform: Transform,
    /// Index of the parent record, always lower than this record's index
    pub parent: Option<usize>,
    /// Attached components
    pub components: Vec<ComponentRecord>,
}

/// Saved material reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialRecord {
    /// Material name
    pub name: String,
    /// Resource path the material was loaded from
    pub path: Option<String>,
}

/// Serializable picture of a scene
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    /// Entities, parents first
    pub entities: Vec<EntityRecord>,
    /// Materials other than the loading material
    pub materials: Vec<MaterialRecord>,
}

impl SceneSnapshot {
    /// Serialize to pretty ron
    pub fn to_ron(&self) -> Result<String, SnapshotError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| SnapshotError::Serialize(e.to_string()))
    }

    /// Parse from ron
    pub fn from_ron(text: &str) -> Result<Self, SnapshotError> {
        ron::from_str(text).map_err(|e| SnapshotError::Parse(e.to_string()))
    }

    fn validate(&self, registry: &ComponentRegistry) -> Result<(), SnapshotError> {
        for (index, record) in self.entities.iter().enumerate() {
            if let Some(parent) = record.parent {
                if parent >= index {
                    return Err(SnapshotError::InvalidParent { entity: index, parent });
                }
            }
            for component in &record.components {
                if !registry.contains(component.type_id) {
                    return Err(SnapshotError::UnknownComponent(component.type_id));
                }
            }
        }
        Ok(())
    }
}

/// Stable integer references for the entities of a scene
///
/// Parents always come before their children.
#[derive(Debug, Clone, Default)]
pub struct SnapshotIndexMap {
    ids: Vec<EntityId>,
    indices: HashMap<EntityId, usize>,
}

impl SnapshotIndexMap {
    fn push(&mut self, id: EntityId) {
        self.indices.insert(id, self.ids.len());
        self.ids.push(id);
    }

    /// Index of an entity
    pub fn index_of(&self, id: EntityId) -> Option<usize> {
        self.indices.get(&id).copied()
    }

    /// Entity at an index
    pub fn entity_at(&self, index: usize) -> Option<EntityId> {
        self.ids.get(index).copied()
    }

    /// Entities in index order
    pub fn ids(&self) -> &[EntityId] {
        &self.ids
    }

    /// Number of entities
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl SceneGraph {
    /// Index every entity, parents before children
    pub fn snapshot_index_map(&self) -> SnapshotIndexMap {
        let mut map = SnapshotIndexMap::default();
        let mut stack: Vec<EntityId> = self
            .entities()
            .iter()
            .filter(|entity| entity.parent().is_none())
            .map(|entity| entity.id())
            .collect();
        stack.reverse();

        while let Some(id) = stack.pop() {
            let Some(entity) = self.entity(id) else {
                continue;
            };
            map.push(id);
            stack.extend(entity.children().into_iter().rev());
        }
        map
    }

    /// Capture the scene
    pub fn capture_snapshot(&self) -> SceneSnapshot {
        let map = self.snapshot_index_map();
        let entities = map
            .ids()
            .iter()
            .filter_map(|&id| self.entity(id))
            .map(|entity| EntityRecord {
                name: entity.name(),
                active: entity.is_active(),
                transform: entity.transform(),
                parent: entity.parent().and_then(|parent| map.index_of(parent)),
                components: entity
                    .components()
                    .iter()
                    .map(|component| ComponentRecord {
                        type_id: component.component_type(),
                        metadata: component.read().save(),
                    })
                    .collect(),
            })
            .collect();

        let materials = self
            .materials()
            .iter()
            .filter(|material| !Arc::ptr_eq(material, self.loading_material()))
            .map(|material| MaterialRecord {
                name: material.name().to_string(),
                path: material.path().map(str::to_string),
            })
            .collect();

        SceneSnapshot { entities, materials }
    }

    /// Recreate the entities, components and materials of a snapshot
    ///
    /// The snapshot is validated before anything is created. Components are
    /// built by `registry` and fed their metadata; resources come from
    /// `content`. Returns the index map of the created entities.
    pub fn restore_snapshot(
        &self,
        snapshot: &SceneSnapshot,
        registry: &ComponentRegistry,
        content: &dyn ContentManager,
    ) -> Result<SnapshotIndexMap, SnapshotError> {
        snapshot.validate(registry)?;

        for record in &snapshot.materials {
            let material = match &record.path {
                Some(path) => content.load::<Material>(path)?,
                None => Arc::new(Material::new(record.name.clone(), MaterialSurface::default())),
            };
            self.add_material(&material);
        }

        let mut map = SnapshotIndexMap::default();
        for record in &snapshot.entities {
            let parent = record.parent.and_then(|index| map.entity_at(index));
            let id = self.create_entity(record.name.clone(), parent);
            self.set_transform(id, record.transform);

            for saved in &record.components {
                let mut component = registry
                    .create(saved.type_id)
                    .ok_or(SnapshotError::UnknownComponent(saved.type_id))?;
                if let Some(metadata) = &saved.metadata {
                    component.load(metadata, content)?;
                }
                self.add_component(id, component);
            }

            if !record.active {
                self.set_entity_active(id, false);
            }
            map.push(id);
        }

        log::info!(
            "Restored {} entities and {} materials",
            map.len(),
            snapshot.materials.len()
        );
        Ok(map)
    }
}
