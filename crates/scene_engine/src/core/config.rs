//! # Unified Configuration System
//!
//! Settings for the scene pipeline, the render system and the worker pool,
//! gathered under [`EngineSettings`] so a single file can drive all three.
//!
//! ## Configuration Categories
//!
//! - **Scene Config**: cosmos update budget, pool sizing, parallel chunking, mutation events
//! - **Render Config**: culling, occlusion queries, cached list refresh, instancing
//! - **Worker Config**: thread count of the shared worker pool

use serde::{Serialize, Deserialize};

pub use crate::config::{Config, ConfigError, ConfigFormat};

/// # Scene Configuration
///
/// Tunables for the scene graph's per-frame pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SceneConfig {
    /// Maximum cosmos updates applied per component type per frame
    pub max_updates: usize,
    /// Initial capacity of component pools and actor lists
    pub pool_capacity: usize,
    /// Pools grow when free slots drop to this margin
    pub pool_margin: usize,
    /// Minimum number of items handed to one worker in a parallel-for
    pub min_chunk: usize,
    /// Whether mutation events are published for external observers
    pub mutations: bool,
    /// Speed of the loading material fade, in radians per second
    pub loading_fade_speed: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            max_updates: 256,
            pool_capacity: 64,
            pool_margin: 16,
            min_chunk: 16,
            mutations: false,
            loading_fade_speed: 4.0,
        }
    }
}

impl SceneConfig {
    /// Check values that would stall or break the pipeline
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_updates == 0 {
            return Err(ConfigError::Invalid {
                field: "max_updates",
                reason: "at least one cosmos update per frame is required".to_string(),
            });
        }
        if self.min_chunk == 0 {
            return Err(ConfigError::Invalid {
                field: "min_chunk",
                reason: "chunks must hold at least one item".to_string(),
            });
        }
        Ok(())
    }
}

/// # Render Configuration
///
/// Culling and occlusion settings shared by every render system created
/// through [`crate::render::RenderSystem::new`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    /// Use the cosmos for visibility queries instead of flat iteration
    pub culling: bool,
    /// Enable hardware occlusion queries
    pub occlusion_culling: bool,
    /// Objects farther than this from the viewer skip occlusion queries
    pub occlusion_distance: f32,
    /// Frames between re-tests of objects that were visible
    pub occluder_skips: u32,
    /// Frames between re-tests of objects that were occluded
    pub occludee_skips: u32,
    /// Maximum number of live occlusion queries
    pub max_queries: usize,
    /// Cached culled lists are rebuilt every this many frames
    pub refresh_frames: u32,
    /// Group drawables by (geometry, material) into instanced draws
    pub instancing: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            culling: true,
            occlusion_culling: false,
            occlusion_distance: 100.0,
            occluder_skips: 8,
            occludee_skips: 3,
            max_queries: 16384,
            refresh_frames: 1,
            instancing: true,
        }
    }
}

impl RenderConfig {
    /// Check values that would break the render loop
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_frames == 0 {
            return Err(ConfigError::Invalid {
                field: "refresh_frames",
                reason: "culled lists must refresh at least every frame".to_string(),
            });
        }
        if self.occlusion_culling && self.max_queries == 0 {
            return Err(ConfigError::Invalid {
                field: "max_queries",
                reason: "occlusion culling needs at least one query".to_string(),
            });
        }
        Ok(())
    }
}

/// # Worker Configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WorkerConfig {
    /// Worker thread count; zero runs every task inline on the caller
    pub threads: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let threads = std::thread::available_parallelism()
            .map(|count| count.get().saturating_sub(1).max(1))
            .unwrap_or(1);
        Self { threads }
    }
}

/// # Engine Settings
///
/// Aggregate of every configuration category, loadable from one file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineSettings {
    /// Scene pipeline settings
    pub scene: SceneConfig,
    /// Render system settings
    pub render: RenderConfig,
    /// Worker pool settings
    pub workers: WorkerConfig,
}

impl Config for EngineSettings {}
impl Config for SceneConfig {}
impl Config for RenderConfig {}

impl EngineSettings {
    /// Validate every category
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scene.validate()?;
        self.render.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(EngineSettings::default().validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip_keeps_overrides() {
        let text = "[scene]\nmax_updates = 4\nmutations = true\n\n[render]\ninstancing = false\n";
        let settings = EngineSettings::from_str_with(text, ConfigFormat::Toml).unwrap();
        assert_eq!(settings.scene.max_updates, 4);
        assert!(settings.scene.mutations);
        assert!(!settings.render.instancing);
        // Unspecified fields fall back to defaults
        assert_eq!(settings.scene.pool_margin, SceneConfig::default().pool_margin);
    }

    #[test]
    fn test_ron_parse() {
        let text = "(max_updates: 8, min_chunk: 2)";
        let scene = SceneConfig::from_str_with(text, ConfigFormat::Ron).unwrap();
        assert_eq!(scene.max_updates, 8);
        assert_eq!(scene.min_chunk, 2);
    }

    #[test]
    fn test_zero_max_updates_rejected() {
        let config = SceneConfig { max_updates: 0, ..SceneConfig::default() };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { field: "max_updates", .. })));
    }

    #[test]
    fn test_unsupported_extension() {
        let result = ConfigFormat::from_path(std::path::Path::new("settings.json"));
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }
}
