//! Scene materials
//!
//! A material is a shared bag of surface properties. The scene assigns each
//! registered material a dense slot in the GPU material buffer; slots are
//! compacted whenever a material is deleted.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use parking_lot::RwLock;

use crate::foundation::math::{Vec3, Vec4};

/// Slot value of a material that is not registered with a scene
pub const UNASSIGNED_SLOT: usize = usize::MAX;

/// Blending applied when drawing with a material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    /// Depth-tested, depth-writing, no blending
    #[default]
    Opaque,
    /// Alpha blended, drawn back to front
    Transparent,
    /// Additively blended
    Additive,
}

/// Surface properties of a material
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialSurface {
    /// Base color (RGBA)
    pub diffuse: Vec4,
    /// Emission color
    pub emissive: Vec3,
    /// Metallic factor (0.0 = dielectric, 1.0 = metallic)
    pub metallic: f32,
    /// Roughness factor (0.0 = mirror, 1.0 = completely rough)
    pub roughness: f32,
    /// Blend mode
    pub blend: BlendMode,
}

impl Default for MaterialSurface {
    fn default() -> Self {
        Self {
            diffuse: Vec4::new(0.8, 0.8, 0.8, 1.0),
            emissive: Vec3::zeros(),
            metallic: 0.0,
            roughness: 0.5,
            blend: BlendMode::Opaque,
        }
    }
}

/// Shared handle on a material
pub type MaterialRef = Arc<Material>;

/// Named, optionally file-backed surface description
#[derive(Debug)]
pub struct Material {
    name: String,
    path: Option<String>,
    slot: AtomicUsize,
    surface: RwLock<MaterialSurface>,
}

impl Material {
    /// Create an unregistered material
    pub fn new(name: impl Into<String>, surface: MaterialSurface) -> Self {
        Self {
            name: name.into(),
            path: None,
            slot: AtomicUsize::new(UNASSIGNED_SLOT),
            surface: RwLock::new(surface),
        }
    }

    /// Record the resource path the material was loaded from
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Material name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resource path, if loaded from content
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Slot in the scene's material buffer
    pub fn slot(&self) -> Option<usize> {
        match self.slot.load(Ordering::Acquire) {
            UNASSIGNED_SLOT => None,
            slot => Some(slot),
        }
    }

    pub(crate) fn set_slot(&self, slot: usize) {
        self.slot.store(slot, Ordering::Release);
    }

    /// Current surface properties
    pub fn surface(&self) -> MaterialSurface {
        *self.surface.read()
    }

    /// Replace the surface properties
    pub fn set_surface(&self, surface: MaterialSurface) {
        *self.surface.write() = surface;
    }

    /// Replace the base color
    pub fn set_diffuse(&self, diffuse: Vec4) {
        self.surface.write().diffuse = diffuse;
    }

    /// Blend mode
    pub fn blend(&self) -> BlendMode {
        self.surface.read().blend
    }
}

/// GPU record of one material, laid out for a std430 storage buffer
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MaterialData {
    /// Base color (RGBA)
    pub diffuse: [f32; 4],
    /// Emission (RGB), W unused
    pub emissive: [f32; 4],
    /// Metallic, roughness, blend mode index, padding
    pub params: [f32; 4],
}

impl MaterialData {
    /// Pack a material's current surface
    pub fn from_material(material: &Material) -> Self {
        let surface = material.surface();
        let blend = match surface.blend {
            BlendMode::Opaque => 0.0,
            BlendMode::Transparent => 1.0,
            BlendMode::Additive => 2.0,
        };

        Self {
            diffuse: [surface.diffuse.x, surface.diffuse.y, surface.diffuse.z, surface.diffuse.w],
            emissive: [surface.emissive.x, surface.emissive.y, surface.emissive.z, 0.0],
            params: [surface.metallic, surface.roughness, blend, 0.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_starts_unassigned() {
        let material = Material::new("rock", MaterialSurface::default()).with_path("materials/rock.ron");
        assert_eq!(material.slot(), None);
        material.set_slot(3);
        assert_eq!(material.slot(), Some(3));
        assert_eq!(material.path(), Some("materials/rock.ron"));
    }

    #[test]
    fn test_material_data_layout() {
        assert_eq!(std::mem::size_of::<MaterialData>(), 48);

        let material = Material::new("glass", MaterialSurface {
            blend: BlendMode::Transparent,
            ..MaterialSurface::default()
        });
        let data = MaterialData::from_material(&material);
        assert_eq!(data.params[2], 1.0);
        assert_eq!(bytemuck::bytes_of(&data).len(), 48);
    }
}
