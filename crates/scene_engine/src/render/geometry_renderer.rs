//! Standard renderer for drawable components
//!
//! Culls the storages of the configured component types into per-category
//! lists, then submits them in draw order, batched into instanced draws
//! when instancing is enabled.

use std::any::Any;
use std::collections::HashMap;

use super::batching::{batch_instances, unbatched, DrawItem};
use super::culling::CulledLists;
use super::render_system::{RenderContext, RenderError, Renderer};
use crate::ecs::{ComponentKind, ComponentTypeId};
use crate::render::drawable::MeshComponent;

/// Draws every visible drawable of a set of component types
#[derive(Debug)]
pub struct DrawableRenderer {
    types: Vec<ComponentTypeId>,
    lists: HashMap<ComponentTypeId, CulledLists>,
    nested_lists: HashMap<ComponentTypeId, CulledLists>,
}

impl Default for DrawableRenderer {
    fn default() -> Self {
        Self::new(vec![MeshComponent::TYPE])
    }
}

impl DrawableRenderer {
    /// Renderer over the given drawable component types
    pub fn new(types: Vec<ComponentTypeId>) -> Self {
        Self {
            types,
            lists: HashMap::new(),
            nested_lists: HashMap::new(),
        }
    }

    /// Cached culled lists of a type from the last top-level pass
    pub fn culled(&self, type_id: ComponentTypeId) -> Option<&CulledLists> {
        self.lists.get(&type_id)
    }

    fn submit(lists: &CulledLists, ctx: &mut RenderContext<'_>) -> Result<(), RenderError> {
        for (_, items) in lists.in_draw_order() {
            let mut draws = Vec::with_capacity(items.len());
            for item in items {
                if !item.component.is_active() {
                    continue;
                }
                let Some(entity) = item.component.entity() else {
                    continue;
                };

                let inner = item.component.read();
                let Some(drawable) = inner.as_drawable() else {
                    continue;
                };
                let material_slot = drawable
                    .material()
                    .and_then(|material| material.slot())
                    .unwrap_or(0);

                draws.push(DrawItem {
                    geometry: drawable.geometry(),
                    material_slot: u32::try_from(material_slot).unwrap_or(u32::MAX),
                    transform: entity.world_matrix(),
                });
            }

            let batches = if ctx.state.config().instancing {
                batch_instances(draws)
            } else {
                unbatched(draws)
            };

            for batch in &batches {
                ctx.device.draw_instances(batch.geometry, batch.material_slot, &batch.transforms)?;
            }
            ctx.state.add_draw_calls(batches.len());
        }
        Ok(())
    }
}

impl Renderer for DrawableRenderer {
    fn name(&self) -> &'static str {
        "drawables"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn render_pass(&mut self, ctx: &mut RenderContext<'_>) -> Result<(), RenderError> {
        let nested = ctx.state.is_nested();
        for &type_id in &self.types {
            let Some(storage) = ctx.scene.storage(type_id) else {
                continue;
            };

            let cache = if nested { &mut self.nested_lists } else { &mut self.lists };
            let lists = cache.entry(type_id).or_default();
            if lists.needs_refresh(ctx.state) {
                let storage = storage.read();
                lists.rebuild(&storage, ctx.state);
            }

            Self::submit(lists, ctx)?;
        }
        Ok(())
    }
}
