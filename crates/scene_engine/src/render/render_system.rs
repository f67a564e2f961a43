//! Per-camera render orchestration
//!
//! A [`RenderSystem`] owns the camera's [`RenderState`] (viewer, culling and
//! occlusion state) and an ordered list of [`Renderer`]s. Each render runs
//! the same four passes across every renderer:
//! `begin_pass` → `render_prepass` → `render_pass` → `end_pass`.

use std::any::Any;

use super::backend::{DeviceError, GraphicsDevice};
use super::culling::DrawCategory;
use super::occlusion::OcclusionCuller;
use super::viewer::Viewer;
use crate::core::RenderConfig;
use crate::ecs::ComponentRef;
use crate::foundation::time::Clock;
use crate::scene::SceneGraph;

/// Render failures
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    /// The device failed
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// A renderer failed
    #[error("Renderer '{renderer}' failed: {message}")]
    Renderer {
        /// Renderer name
        renderer: &'static str,
        /// What went wrong
        message: String,
    },
}

/// View and culling state shared by the renderers of one camera
#[derive(Debug)]
pub struct RenderState {
    viewer: Viewer,
    config: RenderConfig,
    occlusion: OcclusionCuller,
    frame: u64,
    nested: bool,
    draw_calls: usize,
}

impl RenderState {
    /// Create state for a viewer
    pub fn new(viewer: Viewer, config: RenderConfig) -> Self {
        Self {
            viewer,
            occlusion: OcclusionCuller::new(&config),
            config,
            frame: 0,
            nested: false,
            draw_calls: 0,
        }
    }

    /// Active viewer (the subpass viewer inside a subpass)
    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    /// Render settings
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Occlusion state
    pub fn occlusion(&self) -> &OcclusionCuller {
        &self.occlusion
    }

    /// Frames rendered so far
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Whether a nested depth subpass is running
    pub fn is_nested(&self) -> bool {
        self.nested
    }

    /// Draw calls issued during the current render
    pub fn draw_calls(&self) -> usize {
        self.draw_calls
    }

    /// Count submitted draw calls
    pub fn add_draw_calls(&mut self, count: usize) {
        self.draw_calls += count;
    }

    /// Normalized visibility of a component for the current viewer
    ///
    /// Returns `(distance, visibility)` with visibility
    /// `1 - distance / (far + radius)`. Within the occlusion distance of a
    /// top-level pass, the last occlusion result gates the value and opaque
    /// objects are queued for a fresh query. The result is cached in the
    /// owner's snapshot.
    pub fn fetch_visibility(&mut self, component: &ComponentRef, category: DrawCategory) -> (f32, f32) {
        let Some(entity) = component.entity() else {
            return (0.0, 0.0);
        };

        let snapshot = entity.snapshot();
        let bounds = snapshot.bounds();
        let radius = bounds.radius();
        let distance = (bounds.center() - self.viewer.position).norm();
        let mut visibility = (1.0 - distance / (self.viewer.far + radius)).clamp(0.0, 1.0);

        let occlusion_eligible = self.config.occlusion_culling
            && distance <= self.config.occlusion_distance
            && !self.nested;

        // A viewer inside the box would test against its own proxy
        if occlusion_eligible && !bounds.contains_point(self.viewer.position) {
            if !self.occlusion.is_visible(component.id()) {
                visibility = 0.0;
            }
            if category == DrawCategory::Opaque {
                self.occlusion.request(component.id(), snapshot.world, self.frame);
            }
        }

        if !self.nested {
            entity.set_visibility(distance, visibility);
        }
        (distance, visibility)
    }
}

/// Everything a renderer can reach during a pass
pub struct RenderContext<'a> {
    /// Scene being rendered
    pub scene: &'a SceneGraph,
    /// Graphics device
    pub device: &'a mut dyn GraphicsDevice,
    /// Camera render state
    pub state: &'a mut RenderState,
    /// Frame time
    pub clock: Clock,
}

/// Pluggable contributor of geometry or effect passes
pub trait Renderer: Any + Send + Sync {
    /// Renderer name used in logs and errors
    fn name(&self) -> &'static str;

    /// Downcast support
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcast support
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Called first, for every renderer
    fn begin_pass(&mut self, _ctx: &mut RenderContext<'_>) -> Result<(), RenderError> {
        Ok(())
    }

    /// Depth or setup work ahead of the main pass
    fn render_prepass(&mut self, _ctx: &mut RenderContext<'_>) -> Result<(), RenderError> {
        Ok(())
    }

    /// Main pass; also the only pass run inside nested subpasses
    fn render_pass(&mut self, ctx: &mut RenderContext<'_>) -> Result<(), RenderError>;

    /// Called last, for every renderer
    fn end_pass(&mut self, _ctx: &mut RenderContext<'_>) -> Result<(), RenderError> {
        Ok(())
    }
}

/// Camera-owned render state plus its ordered renderers
pub struct RenderSystem {
    renderers: Vec<Box<dyn Renderer>>,
    state: RenderState,
}

impl RenderSystem {
    /// Create a render system without renderers
    pub fn new(viewer: Viewer, config: RenderConfig) -> Self {
        Self {
            renderers: Vec::new(),
            state: RenderState::new(viewer, config),
        }
    }

    /// Append a renderer
    pub fn add_renderer(&mut self, renderer: Box<dyn Renderer>) {
        log::debug!("Added renderer '{}'", renderer.name());
        self.renderers.push(renderer);
    }

    /// Remove the first renderer of type `T`
    pub fn remove_renderer<T: Renderer>(&mut self) -> Option<Box<dyn Renderer>> {
        let index = self.renderers.iter().position(|r| r.as_any().is::<T>())?;
        Some(self.renderers.remove(index))
    }

    /// First renderer of type `T`
    pub fn renderer<T: Renderer>(&self) -> Option<&T> {
        self.renderers.iter().find_map(|r| r.as_any().downcast_ref::<T>())
    }

    /// First renderer of type `T`, mutably
    pub fn renderer_mut<T: Renderer>(&mut self) -> Option<&mut T> {
        self.renderers.iter_mut().find_map(|r| r.as_any_mut().downcast_mut::<T>())
    }

    /// Number of renderers
    pub fn renderer_count(&self) -> usize {
        self.renderers.len()
    }

    /// Camera viewer
    pub fn viewer(&self) -> &Viewer {
        &self.state.viewer
    }

    /// Camera viewer, mutably
    pub fn viewer_mut(&mut self) -> &mut Viewer {
        &mut self.state.viewer
    }

    /// Render state
    pub fn state(&self) -> &RenderState {
        &self.state
    }

    /// Run one full render; returns the number of draw calls issued
    pub fn render(
        &mut self,
        scene: &SceneGraph,
        device: &mut dyn GraphicsDevice,
        clock: &Clock,
    ) -> Result<usize, RenderError> {
        let Self { renderers, state } = self;
        state.frame += 1;
        state.draw_calls = 0;
        state.nested = false;

        if state.config.occlusion_culling {
            state.occlusion.poll(device)?;
        }

        let frame = state.frame;
        let mut ctx = RenderContext { scene, device, state, clock: *clock };

        for renderer in renderers.iter_mut() {
            renderer.begin_pass(&mut ctx)?;
        }
        for renderer in renderers.iter_mut() {
            renderer.render_prepass(&mut ctx)?;
        }
        for renderer in renderers.iter_mut() {
            renderer.render_pass(&mut ctx)?;
        }

        if ctx.state.config.occlusion_culling {
            ctx.state.occlusion.issue(ctx.device, frame)?;
        }

        for renderer in renderers.iter_mut() {
            renderer.end_pass(&mut ctx)?;
        }

        log::trace!("Frame {} rendered with {} draw calls", frame, ctx.state.draw_calls);
        Ok(ctx.state.draw_calls)
    }

    /// Run the main pass of every renderer from a temporary viewer
    ///
    /// Used for depth-style passes (shadow maps, reflection faces). Culled
    /// lists are rebuilt for the subpass and occlusion is not consulted.
    /// Returns the number of draw calls the subpass issued.
    pub fn render_subpass(
        &mut self,
        scene: &SceneGraph,
        device: &mut dyn GraphicsDevice,
        clock: &Clock,
        viewer: Viewer,
    ) -> Result<usize, RenderError> {
        let Self { renderers, state } = self;
        let saved_viewer = std::mem::replace(&mut state.viewer, viewer);
        let saved_nested = std::mem::replace(&mut state.nested, true);
        let draws_before = state.draw_calls;

        let mut result = Ok(());
        {
            let mut ctx = RenderContext { scene, device, state: &mut *state, clock: *clock };
            for renderer in renderers.iter_mut() {
                result = renderer.render_pass(&mut ctx);
                if result.is_err() {
                    break;
                }
            }
        }

        state.viewer = saved_viewer;
        state.nested = saved_nested;
        result?;
        Ok(state.draw_calls - draws_before)
    }

    /// Give every occlusion query back to the device
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        self.state.occlusion.release(device);
    }
}

impl std::fmt::Debug for RenderSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderSystem")
            .field("renderers", &self.renderers.iter().map(|r| r.name()).collect::<Vec<_>>())
            .field("state", &self.state)
            .finish()
    }
}
