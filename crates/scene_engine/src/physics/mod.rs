//! Physics simulator interface
//!
//! The scene does not simulate anything itself. A [`Simulator`] injected
//! through [`crate::scene::SceneDesc`] is stepped once per frame on the
//! processing queue, overlapping animation and synchronization.

/// Physics world advanced by the scene pipeline
pub trait Simulator: Send {
    /// Advance the simulation by `delta` seconds
    fn step(&mut self, delta: f32);
}
