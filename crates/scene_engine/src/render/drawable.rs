//! Drawable components
//!
//! Components flagged `DRAWABLE` expose [`Drawable`] so renderers can read
//! the geometry and material to submit without knowing the concrete type.

use serde::{Deserialize, Serialize};

use super::backend::GeometryId;
use super::culling::DrawCategory;
use super::material::{Material, MaterialRef};
use crate::content::{ContentManager, ContentManagerExt};
use crate::ecs::{ActorSet, Component, ComponentKind, ComponentTypeId};
use crate::scene::SnapshotError;
use crate::spatial::Aabb;

/// Read access renderers need from a drawable component
pub trait Drawable {
    /// Geometry to draw
    fn geometry(&self) -> GeometryId;

    /// Material to draw with
    fn material(&self) -> Option<MaterialRef>;

    /// Culled list the drawable belongs to
    fn category(&self) -> DrawCategory {
        self.material()
            .map_or(DrawCategory::Opaque, |material| DrawCategory::from(material.blend()))
    }
}

/// Geometry drawn with one material
#[derive(Debug, Default)]
pub struct MeshComponent {
    /// Geometry handle
    pub geometry: GeometryId,
    /// Material, if any
    pub material: Option<MaterialRef>,
    /// Local-space bounds of the geometry
    pub bounds: Option<Aabb>,
}

#[derive(Serialize, Deserialize)]
struct MeshMetadata {
    geometry: GeometryId,
    material: Option<String>,
    bounds: Option<Aabb>,
}

impl MeshComponent {
    /// Mesh with a material and local bounds
    pub fn new(geometry: GeometryId, material: Option<MaterialRef>, bounds: Option<Aabb>) -> Self {
        Self { geometry, material, bounds }
    }
}

impl Component for MeshComponent {
    crate::component_identity!();

    fn actors(&self) -> ActorSet {
        ActorSet::CULLABLE | ActorSet::DRAWABLE
    }

    fn local_bounds(&self) -> Option<Aabb> {
        self.bounds
    }

    fn as_drawable(&self) -> Option<&dyn Drawable> {
        Some(self)
    }

    fn save(&self) -> Option<String> {
        let metadata = MeshMetadata {
            geometry: self.geometry,
            material: self.material.as_ref().and_then(|m| m.path().map(str::to_string)),
            bounds: self.bounds,
        };
        match ron::to_string(&metadata) {
            Ok(text) => Some(text),
            Err(error) => {
                log::warn!("Failed to serialize mesh metadata: {}", error);
                None
            }
        }
    }

    fn load(&mut self, metadata: &str, content: &dyn ContentManager) -> Result<(), SnapshotError> {
        let metadata: MeshMetadata = ron::from_str(metadata).map_err(|e| SnapshotError::Metadata {
            type_name: Self::NAME,
            reason: e.to_string(),
        })?;

        self.geometry = metadata.geometry;
        self.bounds = metadata.bounds;
        self.material = match metadata.material {
            Some(path) => Some(content.load::<Material>(&path)?),
            None => None,
        };
        Ok(())
    }
}

impl ComponentKind for MeshComponent {
    const TYPE: ComponentTypeId = ComponentTypeId(1);
    const NAME: &'static str = "Mesh";
}

impl Drawable for MeshComponent {
    fn geometry(&self) -> GeometryId {
        self.geometry
    }

    fn material(&self) -> Option<MaterialRef> {
        self.material.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::MemoryContent;
    use crate::foundation::math::Vec3;
    use crate::render::material::{BlendMode, MaterialSurface};
    use std::sync::Arc;

    #[test]
    fn test_category_follows_material_blend() {
        let glass = Arc::new(Material::new("glass", MaterialSurface {
            blend: BlendMode::Additive,
            ..MaterialSurface::default()
        }));
        let mesh = MeshComponent::new(GeometryId(4), Some(glass), None);
        assert_eq!(mesh.category(), DrawCategory::Additive);
        assert_eq!(MeshComponent::default().category(), DrawCategory::Opaque);
    }

    #[test]
    fn test_metadata_restores_material_from_content() {
        let rock: MaterialRef = Arc::new(Material::new("rock", MaterialSurface::default()).with_path("rock.mat"));
        let mut content = MemoryContent::new();
        content.insert("rock.mat", Arc::clone(&rock));

        let bounds = Aabb::new(Vec3::repeat(-2.0), Vec3::repeat(2.0));
        let saved = MeshComponent::new(GeometryId(9), Some(rock.clone()), Some(bounds)).save().unwrap();

        let mut loaded = MeshComponent::default();
        loaded.load(&saved, &content).unwrap();
        assert_eq!(loaded.geometry, GeometryId(9));
        assert_eq!(loaded.bounds, Some(bounds));
        assert!(Arc::ptr_eq(loaded.material.as_ref().unwrap(), &rock));
    }
}
