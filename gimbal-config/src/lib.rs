//! Typed configuration loading, CLI overrides, and logger init/hot-reload (SPEC_FULL.md §6, §8).

pub mod config;
pub mod logging;

pub use config::{
    apply_override, parse_config_file, Config, ConfigError, DetectionConfig, LogConfig, PfConfig,
    PredictConfig, SerialConfig,
};
pub use logging::{init, spawn_reload_watcher, FilterHandle};
