//! # Rendering Orchestration
//!
//! Camera-side rendering for the scene core. The graphics API itself stays
//! behind [`GraphicsDevice`]; this module decides what to draw.
//!
//! ## Architecture
//!
//! - **Viewer**: view, projection and cube-face matrices plus the culling volume
//! - **Render System**: per-camera state and an ordered list of renderers
//! - **Culling**: cosmos or flat visibility queries into per-category lists
//! - **Occlusion**: bounded pool of hardware queries with one frame of latency
//! - **Batching**: (geometry, material) instancing

pub mod backend;
pub mod batching;
pub mod camera;
pub mod culling;
pub mod drawable;
pub mod geometry_renderer;
pub mod material;
pub mod occlusion;
pub mod render_system;
pub mod viewer;

pub use backend::{DeviceError, GeometryId, GraphicsDevice, HeadlessDevice, QueryId, RecordedDraw};
pub use batching::{batch_instances, DrawBatch, DrawItem};
pub use camera::Camera;
pub use culling::{CulledItem, CulledLists, DrawCategory};
pub use drawable::{Drawable, MeshComponent};
pub use geometry_renderer::DrawableRenderer;
pub use material::{BlendMode, Material, MaterialData, MaterialRef, MaterialSurface};
pub use occlusion::{OcclusionCuller, OcclusionStats};
pub use render_system::{RenderContext, RenderError, RenderState, RenderSystem, Renderer};
pub use viewer::{CullingMode, Viewer};
