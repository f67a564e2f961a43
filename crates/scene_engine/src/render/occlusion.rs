//! Hardware occlusion-query culling
//!
//! Visibility comes from queries issued in earlier frames: results are polled
//! without blocking at the start of each render and feed the next frame's
//! visibility. Queries come from a bounded, reusable pool, and objects whose
//! state is known are re-tested only every few frames.

use std::collections::HashMap;

use super::backend::{DeviceResult, GraphicsDevice, QueryId};
use crate::core::RenderConfig;
use crate::ecs::ComponentId;
use crate::foundation::math::Mat4;

/// Entries not requested for this many frames are dropped
const STALE_FRAMES: u64 = 120;

/// Statistics from the last render
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OcclusionStats {
    /// Queries issued
    pub issued: u32,
    /// Results received
    pub resolved: u32,
    /// Requests skipped by the skip counters
    pub skipped: u32,
    /// Requests dropped because the query pool was exhausted
    pub starved: u32,
}

#[derive(Debug, Clone, Copy)]
struct OcclusionEntry {
    visible: bool,
    query: Option<QueryId>,
    last_tested: Option<u64>,
    last_seen: u64,
}

/// Per-camera occlusion state
#[derive(Debug)]
pub struct OcclusionCuller {
    entries: HashMap<ComponentId, OcclusionEntry>,
    requests: Vec<(ComponentId, Mat4)>,
    free_queries: Vec<QueryId>,
    live_queries: usize,
    max_queries: usize,
    occluder_skips: u64,
    occludee_skips: u64,
    stats: OcclusionStats,
}

impl OcclusionCuller {
    /// Create a culler from render settings
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            entries: HashMap::new(),
            requests: Vec::new(),
            free_queries: Vec::new(),
            live_queries: 0,
            max_queries: config.max_queries,
            occluder_skips: u64::from(config.occluder_skips),
            occludee_skips: u64::from(config.occludee_skips),
            stats: OcclusionStats::default(),
        }
    }

    /// Last known visibility of a component; unknown components are visible
    pub fn is_visible(&self, component: ComponentId) -> bool {
        self.entries.get(&component).map_or(true, |entry| entry.visible)
    }

    /// Ask for a fresh query of a component's box this frame
    ///
    /// Ignored while a query for the component is in flight, and while the
    /// component is inside its skip window.
    pub fn request(&mut self, component: ComponentId, bounds: Mat4, frame: u64) {
        let entry = self.entries.entry(component).or_insert(OcclusionEntry {
            visible: true,
            query: None,
            last_tested: None,
            last_seen: frame,
        });
        entry.last_seen = frame;

        if entry.query.is_some() {
            return;
        }

        if let Some(last) = entry.last_tested {
            let window = if entry.visible { self.occluder_skips } else { self.occludee_skips };
            if frame.saturating_sub(last) < window {
                self.stats.skipped += 1;
                return;
            }
        }

        self.requests.push((component, bounds));
    }

    /// Collect finished results without blocking
    pub fn poll(&mut self, device: &mut dyn GraphicsDevice) -> DeviceResult<()> {
        self.stats = OcclusionStats::default();

        for entry in self.entries.values_mut() {
            let Some(query) = entry.query else {
                continue;
            };
            if let Some(visible) = device.poll_occlusion_query(query)? {
                entry.visible = visible;
                entry.query = None;
                self.free_queries.push(query);
                self.stats.resolved += 1;
            }
        }
        Ok(())
    }

    /// Issue every query requested this frame
    pub fn issue(&mut self, device: &mut dyn GraphicsDevice, frame: u64) -> DeviceResult<()> {
        let requests = std::mem::take(&mut self.requests);
        for (component, bounds) in requests {
            let Some(query) = self.acquire(device)? else {
                self.stats.starved += 1;
                continue;
            };

            if let Err(error) = device.issue_occlusion_query(query, &bounds) {
                self.free_queries.push(query);
                return Err(error);
            }
            if let Some(entry) = self.entries.get_mut(&component) {
                entry.query = Some(query);
                entry.last_tested = Some(frame);
            }
            self.stats.issued += 1;
        }

        if self.stats.starved > 0 {
            log::trace!("Occlusion query pool exhausted; {} requests deferred", self.stats.starved);
        }

        self.prune(frame);
        Ok(())
    }

    /// Drop stale entries and release every query back to the device
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        for query in self.free_queries.drain(..) {
            device.destroy_occlusion_query(query);
        }
        for entry in self.entries.values_mut() {
            if let Some(query) = entry.query.take() {
                device.destroy_occlusion_query(query);
            }
        }
        self.entries.clear();
        self.requests.clear();
        self.live_queries = 0;
    }

    /// Statistics from the last render
    pub fn stats(&self) -> OcclusionStats {
        self.stats
    }

    /// Number of queries created so far
    pub fn live_queries(&self) -> usize {
        self.live_queries
    }

    /// Requests waiting for the next issue
    pub fn pending_requests(&self) -> usize {
        self.requests.len()
    }

    /// Number of created queries waiting for reuse
    pub fn idle_queries(&self) -> usize {
        self.free_queries.len()
    }

    fn acquire(&mut self, device: &mut dyn GraphicsDevice) -> DeviceResult<Option<QueryId>> {
        if let Some(query) = self.free_queries.pop() {
            return Ok(Some(query));
        }
        if self.live_queries >= self.max_queries {
            return Ok(None);
        }
        let query = device.create_occlusion_query()?;
        self.live_queries += 1;
        Ok(Some(query))
    }

    fn prune(&mut self, frame: u64) {
        self.entries.retain(|_, entry| {
            entry.query.is_some() || frame.saturating_sub(entry.last_seen) < STALE_FRAMES
        });
    }
}
