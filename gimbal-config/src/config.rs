//! Typed configuration loaded from a YAML file at startup (SPEC_FULL.md §6, §8).

use gimbal_predict::GimbalLimits;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid --set override {key}={value}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
    #[error("expanding shell variables in {field}: {source}")]
    ShellExpand {
        field: String,
        #[source]
        source: shellexpand::LookupError<std::env::VarError>,
    },
}

fn default_particle_count() -> usize {
    10_000
}

fn default_seed() -> u64 {
    0xC0FFEE
}

fn default_measurement_std() -> f64 {
    0.05
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PfConfig {
    #[serde(default = "default_particle_count")]
    pub particle_count: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_measurement_std")]
    pub measurement_std: f64,
}

impl Default for PfConfig {
    fn default() -> Self {
        PfConfig {
            particle_count: default_particle_count(),
            seed: default_seed(),
            measurement_std: default_measurement_std(),
        }
    }
}

fn default_radius() -> f64 {
    0.15
}

fn default_max_ttl() -> f64 {
    0.3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetectionConfig {
    #[serde(default = "default_radius")]
    pub default_radius: f64,
    #[serde(default = "default_max_ttl")]
    pub selector_max_ttl: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        DetectionConfig {
            default_radius: default_radius(),
            selector_max_ttl: default_max_ttl(),
        }
    }
}

fn default_alpha() -> f64 {
    0.1
}

fn default_t_gimbal_actuation() -> f64 {
    0.01
}

fn default_tolerance_coeff() -> f64 {
    1.0
}

fn default_chase_distance() -> f64 {
    6.0
}

fn default_bullet_speed() -> f64 {
    20.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PredictConfig {
    #[serde(default = "default_alpha")]
    pub smoothing_alpha: f64,
    #[serde(default = "default_t_gimbal_actuation")]
    pub t_gimbal_actuation: f64,
    #[serde(default = "default_tolerance_coeff")]
    pub tolerance_coeff: f64,
    #[serde(default = "default_chase_distance")]
    pub chase_distance: f64,
    #[serde(default = "default_bullet_speed")]
    pub initial_bullet_speed: f64,
}

impl Default for PredictConfig {
    fn default() -> Self {
        PredictConfig {
            smoothing_alpha: default_alpha(),
            t_gimbal_actuation: default_t_gimbal_actuation(),
            tolerance_coeff: default_tolerance_coeff(),
            chase_distance: default_chase_distance(),
            initial_bullet_speed: default_bullet_speed(),
        }
    }
}

fn default_device_path() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_baud_rate() -> u32 {
    115_200
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SerialConfig {
    #[serde(default = "default_device_path")]
    pub device_path: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            device_path: default_device_path(),
            baud_rate: default_baud_rate(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// The logger subtree; re-parsed in isolation by the hot-reload watcher (SPEC_FULL.md §6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: default_log_level(),
        }
    }
}

fn default_gimbal_limits() -> GimbalLimits {
    GimbalLimits {
        pitch_min: -0.5,
        pitch_max: 0.5,
        yaw_min: -std::f64::consts::PI,
        yaw_max: std::f64::consts::PI,
        has_yaw_limits: false,
        safety_margin: 0.02,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub pf: PfConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub predict: PredictConfig,
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default = "default_gimbal_limits")]
    pub gimbal_limits: GimbalLimits,
    #[serde(default)]
    pub logs: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            pf: PfConfig::default(),
            detection: DetectionConfig::default(),
            predict: PredictConfig::default(),
            serial: SerialConfig::default(),
            gimbal_limits: default_gimbal_limits(),
            logs: LogConfig::default(),
        }
    }
}

/// Load a YAML config file from disk. `serial.device_path` may contain shell variables (`~`,
/// `$VAR`), expanded here so the rest of the pipeline only ever sees a concrete path.
pub fn parse_config_file<P: AsRef<std::path::Path>>(path: P) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let mut config: Config = serde_yaml::from_str(&contents)?;
    config.serial.device_path = shellexpand::full(&config.serial.device_path)
        .map_err(|source| ConfigError::ShellExpand {
            field: "serial.device_path".to_string(),
            source,
        })?
        .into_owned();
    Ok(config)
}

/// Apply a single `dotted.key=value` CLI override onto an already-loaded config.
///
/// Only the fields workers actually read are addressable this way; unknown keys are rejected
/// rather than silently ignored, matching the typed-registry design in SPEC_FULL.md §6.
pub fn apply_override(config: &mut Config, key: &str, value: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    };
    let parse_f64 = |v: &str| v.parse::<f64>().map_err(|e| invalid(&e.to_string()));
    let parse_usize = |v: &str| v.parse::<usize>().map_err(|e| invalid(&e.to_string()));
    let parse_u64 = |v: &str| v.parse::<u64>().map_err(|e| invalid(&e.to_string()));
    let parse_u32 = |v: &str| v.parse::<u32>().map_err(|e| invalid(&e.to_string()));
    let parse_bool = |v: &str| v.parse::<bool>().map_err(|e| invalid(&e.to_string()));

    match key.to_ascii_lowercase().as_str() {
        "pf.particle_count" => config.pf.particle_count = parse_usize(value)?,
        "pf.seed" => config.pf.seed = parse_u64(value)?,
        "pf.measurement_std" => config.pf.measurement_std = parse_f64(value)?,
        "detection.default_radius" => config.detection.default_radius = parse_f64(value)?,
        "detection.selector_max_ttl" => config.detection.selector_max_ttl = parse_f64(value)?,
        "predict.smoothing_alpha" => config.predict.smoothing_alpha = parse_f64(value)?,
        "predict.t_gimbal_actuation" => config.predict.t_gimbal_actuation = parse_f64(value)?,
        "predict.tolerance_coeff" => config.predict.tolerance_coeff = parse_f64(value)?,
        "predict.chase_distance" => config.predict.chase_distance = parse_f64(value)?,
        "predict.initial_bullet_speed" => config.predict.initial_bullet_speed = parse_f64(value)?,
        "serial.device_path" => config.serial.device_path = value.to_string(),
        "serial.baud_rate" => config.serial.baud_rate = parse_u32(value)?,
        "gimbal_limits.has_yaw_limits" => config.gimbal_limits.has_yaw_limits = parse_bool(value)?,
        "gimbal_limits.safety_margin" => config.gimbal_limits.safety_margin = parse_f64(value)?,
        "logs.level" => config.logs.level = value.to_string(),
        _ => return Err(invalid("unknown config key")),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_yaml() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.pf.particle_count, config.pf.particle_count);
        assert_eq!(parsed.logs, config.logs);
    }

    #[test]
    fn unknown_top_level_field_is_rejected() {
        let yaml = "pf:\n  particle_count: 10\nbogus: true\n";
        assert!(serde_yaml::from_str::<Config>(yaml).is_err());
    }

    #[test]
    fn override_patches_a_nested_field() {
        let mut config = Config::default();
        apply_override(&mut config, "pf.particle_count", "5000").unwrap();
        assert_eq!(config.pf.particle_count, 5000);
    }

    #[test]
    fn override_rejects_unknown_key() {
        let mut config = Config::default();
        assert!(apply_override(&mut config, "pf.nonexistent", "1").is_err());
    }

    #[test]
    fn override_rejects_malformed_value() {
        let mut config = Config::default();
        assert!(apply_override(&mut config, "pf.particle_count", "not-a-number").is_err());
    }
}
