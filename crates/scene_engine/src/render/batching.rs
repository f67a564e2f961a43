//! Instance batching
//!
//! Draw items are sorted on a hash of their (geometry, material) key and
//! adjacent runs with the same key are coalesced into one instanced draw.
//! Order within a key is unspecified.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use super::backend::GeometryId;
use crate::foundation::math::Mat4;

/// One drawable instance ready for submission
#[derive(Debug, Clone, PartialEq)]
pub struct DrawItem {
    /// Geometry to draw
    pub geometry: GeometryId,
    /// Material slot in the material buffer
    pub material_slot: u32,
    /// Box or model transform of the instance
    pub transform: Mat4,
}

/// Instances sharing geometry and material
#[derive(Debug, Clone, PartialEq)]
pub struct DrawBatch {
    /// Geometry to draw
    pub geometry: GeometryId,
    /// Material slot in the material buffer
    pub material_slot: u32,
    /// Instance transforms
    pub transforms: Vec<Mat4>,
}

fn batch_key(geometry: GeometryId, material_slot: u32) -> u64 {
    let mut hasher = DefaultHasher::new();
    (geometry, material_slot).hash(&mut hasher);
    hasher.finish()
}

/// Group items by (geometry, material)
pub fn batch_instances(mut items: Vec<DrawItem>) -> Vec<DrawBatch> {
    // The pair breaks hash ties so equal keys always end up adjacent
    items.sort_by_cached_key(|item| (batch_key(item.geometry, item.material_slot), item.geometry, item.material_slot));

    let mut batches: Vec<DrawBatch> = Vec::new();
    for item in items {
        match batches.last_mut() {
            Some(batch) if batch.geometry == item.geometry && batch.material_slot == item.material_slot => {
                batch.transforms.push(item.transform);
            }
            _ => batches.push(DrawBatch {
                geometry: item.geometry,
                material_slot: item.material_slot,
                transforms: vec![item.transform],
            }),
        }
    }
    batches
}

/// One batch per item, preserving order
pub fn unbatched(items: Vec<DrawItem>) -> Vec<DrawBatch> {
    items
        .into_iter()
        .map(|item| DrawBatch {
            geometry: item.geometry,
            material_slot: item.material_slot,
            transforms: vec![item.transform],
        })
        .collect()
}
