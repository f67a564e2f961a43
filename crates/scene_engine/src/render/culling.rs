//! Per-category culled draw lists
//!
//! Renderers cache the visible drawables of each category and rebuild the
//! cache every `refresh_frames` frames. Nested (depth) subpasses always
//! rebuild, since their viewer differs from the camera's.

use super::material::BlendMode;
use super::render_system::RenderState;
use crate::ecs::{ActorSet, ComponentRef, ComponentStorage};

/// Draw list a drawable is sorted into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawCategory {
    /// Depth-writing geometry, drawn front to back
    Opaque,
    /// Alpha blended geometry, drawn back to front
    Transparent,
    /// Additively blended geometry
    Additive,
}

impl From<BlendMode> for DrawCategory {
    fn from(blend: BlendMode) -> Self {
        match blend {
            BlendMode::Opaque => Self::Opaque,
            BlendMode::Transparent => Self::Transparent,
            BlendMode::Additive => Self::Additive,
        }
    }
}

/// A visible drawable with its camera distance
#[derive(Debug, Clone)]
pub struct CulledItem {
    /// Drawable component
    pub component: ComponentRef,
    /// Distance from the viewer
    pub distance: f32,
    /// Normalized visibility
    pub visibility: f32,
}

/// Visible drawables of one storage, split by category
#[derive(Debug, Default)]
pub struct CulledLists {
    /// Opaque drawables, nearest first
    pub opaque: Vec<CulledItem>,
    /// Transparent drawables, farthest first
    pub transparent: Vec<CulledItem>,
    /// Additive drawables
    pub additive: Vec<CulledItem>,
    built_frame: Option<u64>,
}

impl CulledLists {
    /// Whether the cache must be rebuilt for the current pass
    pub fn needs_refresh(&self, state: &RenderState) -> bool {
        if state.is_nested() {
            return true;
        }
        match self.built_frame {
            None => true,
            Some(built) => state.frame().saturating_sub(built) >= u64::from(state.config().refresh_frames.max(1)),
        }
    }

    /// Rebuild from a storage
    ///
    /// With culling enabled the storage's cosmos is queried with the viewer;
    /// otherwise every pooled component is considered.
    pub fn rebuild(&mut self, storage: &ComponentStorage, state: &mut RenderState) {
        self.opaque.clear();
        self.transparent.clear();
        self.additive.clear();

        let candidates = if state.config().culling {
            storage.query(state.viewer())
        } else {
            storage.pool().to_vec()
        };

        for component in candidates {
            if !component.is_active() || !component.actors().contains(ActorSet::DRAWABLE) {
                continue;
            }

            let category = {
                let inner = component.read();
                match inner.as_drawable() {
                    Some(drawable) => drawable.category(),
                    None => continue,
                }
            };

            let (distance, visibility) = state.fetch_visibility(&component, category);
            if visibility <= 0.0 {
                continue;
            }

            let item = CulledItem { component, distance, visibility };
            match category {
                DrawCategory::Opaque => self.opaque.push(item),
                DrawCategory::Transparent => self.transparent.push(item),
                DrawCategory::Additive => self.additive.push(item),
            }
        }

        self.opaque.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        self.transparent.sort_by(|a, b| b.distance.total_cmp(&a.distance));

        if !state.is_nested() {
            self.built_frame = Some(state.frame());
        }
    }

    /// Total number of cached drawables
    pub fn len(&self) -> usize {
        self.opaque.len() + self.transparent.len() + self.additive.len()
    }

    /// Whether nothing is cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lists in draw order: opaque, transparent, additive
    pub fn in_draw_order(&self) -> [(DrawCategory, &[CulledItem]); 3] {
        [
            (DrawCategory::Opaque, self.opaque.as_slice()),
            (DrawCategory::Transparent, self.transparent.as_slice()),
            (DrawCategory::Additive, self.additive.as_slice()),
        ]
    }
}
