//! Camera component
//!
//! A camera owns the render system used when it is the scene's active
//! camera. Its viewer follows the owning entity's world matrix.

use super::geometry_renderer::DrawableRenderer;
use super::render_system::RenderSystem;
use super::viewer::Viewer;
use crate::core::RenderConfig;
use crate::ecs::{Component, ComponentKind, ComponentTypeId};
use crate::scene::SceneGraph;

/// Component turning its entity into a point of view
pub struct Camera {
    render_system: RenderSystem,
}

impl Camera {
    /// Camera with a standard drawable renderer and the scene's render settings
    pub fn for_scene(scene: &SceneGraph, viewer: Viewer) -> Self {
        Self::new(viewer, scene.render_config().clone())
    }

    /// Camera with a standard drawable renderer
    pub fn new(viewer: Viewer, config: RenderConfig) -> Self {
        let mut render_system = RenderSystem::new(viewer, config);
        render_system.add_renderer(Box::new(DrawableRenderer::default()));
        Self { render_system }
    }

    /// Camera with no renderers
    pub fn empty(viewer: Viewer, config: RenderConfig) -> Self {
        Self {
            render_system: RenderSystem::new(viewer, config),
        }
    }

    /// Camera render system
    pub fn render_system(&self) -> &RenderSystem {
        &self.render_system
    }

    /// Camera render system, mutably
    pub fn render_system_mut(&mut self) -> &mut RenderSystem {
        &mut self.render_system
    }

    /// Camera viewer
    pub fn viewer(&self) -> &Viewer {
        self.render_system.viewer()
    }
}

impl Component for Camera {
    crate::component_identity!();
}

impl ComponentKind for Camera {
    const TYPE: ComponentTypeId = ComponentTypeId(2);
    const NAME: &'static str = "Camera";
}

impl std::fmt::Debug for Camera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Camera").field("render_system", &self.render_system).finish()
    }
}
