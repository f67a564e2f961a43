//! # Core Engine Module
//!
//! Shared configuration used by every subsystem of the scene core.

pub mod config;

pub use config::{
    EngineSettings,
    SceneConfig,
    RenderConfig,
    WorkerConfig,
    Config,
    ConfigError,
    ConfigFormat,
};
