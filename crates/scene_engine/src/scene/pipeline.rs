//! Frame pipeline
//!
//! `dispatch` runs the phases in order; `publish` renders the result. The
//! processing queue collects the tasks the overlapped phases spawn and
//! finalize blocks on it before touching any cosmos. Each phase keeps the
//! scene busy until its tasks are watched, so a transaction issued from a
//! task is deferred.

use std::sync::Arc;

use super::scene_graph::SceneGraph;
use crate::ecs::{ActorSet, ComponentRef, EntitySnapshot};
use crate::foundation::math::translation_of;
use crate::foundation::time::Clock;
use crate::render::backend::GraphicsDevice;
use crate::render::camera::Camera;
use crate::render::material::MaterialData;
use crate::render::render_system::RenderError;

impl SceneGraph {
    /// Run one frame of the pipeline
    pub fn dispatch(self: &Arc<Self>, clock: &Clock) {
        self.step_events();
        self.step_transactions();
        self.step_gameplay(clock);
        self.step_simulate(clock);
        self.step_animate(clock);
        self.step_synchronize(clock);
        self.step_indexing();
        self.step_finalize();

        self.stats.lock().dispatched_frames += 1;
        log::trace!("Dispatched frame {}", clock.frame);
    }

    /// Deliver queued events until the queue is empty
    ///
    /// Events pushed by recipients are delivered in the same phase.
    pub fn step_events(&self) {
        let _busy = self.busy();
        let mut delivered = 0usize;
        while let Some(event) = self.events.pop() {
            self.resolve_event(&event);
            delivered += 1;
        }
        if delivered > 0 {
            log::trace!("Delivered {} events", delivered);
        }
    }

    /// Wait for rendering to finish, then run every deferred transaction
    pub fn step_transactions(&self) {
        self.rendering.await_all();

        let _executing = self.executing.lock();
        let mut executed = 0usize;
        loop {
            let Some(transaction) = self.transactions.lock().pop_front() else {
                break;
            };
            let _busy = self.busy();
            transaction(self);
            executed += 1;
        }
        if executed > 0 {
            log::trace!("Executed {} transactions", executed);
        }
    }

    /// Run `update` on every active updater, in registration order
    pub fn step_gameplay(&self, clock: &Clock) {
        let _busy = self.busy();
        let updaters = self.updaters.read().snapshot();
        for component in updaters.iter() {
            if component.is_active() {
                self.with_context(component, |inner, ctx| inner.update(ctx, clock));
            }
        }
    }

    /// Step the physics simulator on the processing queue
    pub fn step_simulate(&self, clock: &Clock) {
        let Some(simulator) = &self.simulator else {
            return;
        };
        let _busy = self.busy();
        let simulator = Arc::clone(simulator);
        let delta = clock.delta;
        self.processing.watch(self.pool.spawn(move || simulator.lock().step(delta)));
    }

    /// Run `animate` in parallel and fade the loading material
    pub fn step_animate(self: &Arc<Self>, clock: &Clock) {
        let _busy = self.busy();
        let level = 0.5 + 0.5 * (clock.total * self.config.loading_fade_speed).sin();
        let mut diffuse = self.loading_material.surface().diffuse;
        diffuse.x = level;
        diffuse.y = level;
        diffuse.z = level;
        self.loading_material.set_diffuse(diffuse);

        let animators = self.animators.read().snapshot();
        let scene = Arc::clone(self);
        let clock = *clock;
        let handle = self.pool.parallel_for(animators, self.config.min_chunk, move |component: &ComponentRef| {
            if component.is_active() {
                scene.with_context(component, |inner, ctx| inner.animate(ctx, &clock));
            }
        });
        self.processing.watch(handle);
    }

    /// Run `synchronize` in parallel
    pub fn step_synchronize(self: &Arc<Self>, clock: &Clock) {
        let _busy = self.busy();
        let synchronizers = self.synchronizers.read().snapshot();
        let scene = Arc::clone(self);
        let clock = *clock;
        let handle = self.pool.parallel_for(synchronizers, self.config.min_chunk, move |component: &ComponentRef| {
            if component.is_active() {
                scene.with_context(component, |inner, ctx| inner.synchronize(ctx, &clock));
            }
        });
        self.processing.watch(handle);
    }

    /// Refresh world transforms and snapshots of dirty entities in parallel
    ///
    /// Skipped without an active camera or dirty entity. Every active
    /// cullable component of a refreshed entity is queued for a cosmos update.
    pub fn step_indexing(self: &Arc<Self>) {
        let Some(camera_entity) = self.camera().and_then(|camera| camera.entity()) else {
            return;
        };
        let _busy = self.busy();
        let dirty: Arc<[_]> = {
            let mut dirty = self.dirty.lock();
            if dirty.is_empty() {
                return;
            }
            std::mem::take(&mut *dirty).into()
        };

        let camera_position = translation_of(&self.resolve_world(&camera_entity));
        log::trace!("Indexing {} dirty entities", dirty.len());

        let scene = Arc::clone(self);
        let handle = self.pool.parallel_for(dirty, self.config.min_chunk, move |&id| {
            let Some(entity) = scene.entity(id) else {
                return;
            };
            entity.swap_dirty(false);

            let world = scene.resolve_world(&entity);
            entity.set_world_matrix(world);
            entity.set_snapshot(EntitySnapshot::compute(&world, entity.local_bounds(), Some(camera_position)));

            let cullable: Vec<_> = entity
                .components()
                .into_iter()
                .filter(|component| component.is_active() && component.actors().contains(ActorSet::CULLABLE))
                .collect();
            if !cullable.is_empty() {
                let mut pending = scene.pending.lock();
                for component in &cullable {
                    pending.push(component);
                }
            }
        });
        self.processing.watch(handle);
    }

    /// Wait for the processing queue, then apply pending cosmos updates
    ///
    /// At most `max_updates` components per type are applied; the rest stay
    /// queued in order for the next frame.
    pub fn step_finalize(&self) {
        let _busy = self.busy();
        self.processing.await_all();

        let resets = std::mem::take(&mut *self.cosmos_resets.lock());
        for type_id in resets {
            let Some(storage) = self.storage(type_id) else {
                continue;
            };
            let mut storage = storage.write();
            storage.clear_cosmos();
            let mut pending = self.pending.lock();
            for component in storage.pool() {
                if component.actors().contains(ActorSet::CULLABLE) {
                    pending.push(component);
                }
            }
            log::debug!("Cosmos of component type {} reset", type_id);
        }

        let batches = self.pending.lock().drain(self.config.max_updates);
        let mut updates = 0usize;
        for (type_id, components) in batches {
            let Some(storage) = self.storage(type_id) else {
                continue;
            };
            let mut storage = storage.write();
            for component in &components {
                let bounds = component
                    .entity()
                    .map(|entity| entity.snapshot().bounds())
                    .unwrap_or_default();
                storage.update_cosmos(component, &bounds);
            }
            updates += components.len();
        }

        self.stats.lock().cosmos_updates = updates;
        if updates > 0 {
            log::trace!("Applied {} cosmos updates", updates);
        }
    }

    /// Render the active camera; returns the number of draw calls
    ///
    /// Returns zero without an active camera.
    ///
    /// # Panics
    ///
    /// Panics if the device rejects the material buffer.
    pub fn publish(&self, device: &mut dyn GraphicsDevice, clock: &Clock) -> Result<usize, RenderError> {
        let Some(camera) = self.camera() else {
            return Ok(0);
        };
        let Some(entity) = camera.entity() else {
            return Ok(0);
        };
        let _busy = self.busy();

        let records: Vec<MaterialData> = self
            .materials
            .read()
            .iter()
            .map(|material| MaterialData::from_material(material))
            .collect();
        if let Err(error) = device.update_material_buffer(bytemuck::cast_slice(&records)) {
            panic!("Failed to regenerate the material buffer: {}", error);
        }

        let world = entity.world_matrix();
        let draw_calls = camera
            .with_mut::<Camera, _>(|camera| {
                let render_system = camera.render_system_mut();
                render_system.viewer_mut().update(&world);
                render_system.render(self, device, clock)
            })
            .unwrap_or(Ok(0))?;

        self.stats.lock().draw_calls = draw_calls;
        Ok(draw_calls)
    }
}
