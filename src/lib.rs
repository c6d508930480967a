pub mod display;
pub mod error;
pub mod pipeline;
pub mod scaling;
pub mod sensor;
pub mod transform;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use error::{Error, ErrorKind, Result};
pub use pipeline::{FramePipeline, PipelineSettings, Scenario};
use sensor::synthetic::SyntheticSettings;
use sensor::DeviceConfiguration;

/// Prefix for environment overrides, e.g. `DEPTHVIEW__PIPELINE__KEY_WAIT_MS=30`
pub const ENV_PREFIX: &str = "DEPTHVIEW";

/// System configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub sensor: SensorConfig,
    pub display: DisplayConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    pub device_index: u32,
    pub camera: DeviceConfiguration,
    pub synthetic: SyntheticSettings,
}

/// Largest window size; point cloud windows use it as is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Negative waits forever
    pub capture_timeout_ms: i64,
    pub max_capture_retries: u32,
    pub key_wait_ms: u64,
    pub quit_key: char,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            camera: DeviceConfiguration::default(),
            synthetic: SyntheticSettings::default(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capture_timeout_ms: -1,
            max_capture_retries: 3,
            key_wait_ms: 10,
            quit_key: 'q',
        }
    }
}

impl Config {
    /// Layer defaults, an optional TOML file, then `DEPTHVIEW__*` environment variables
    pub fn load(path: Option<&Path>) -> std::result::Result<Self, config::ConfigError> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Config::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).format(config::FileFormat::Toml));
        }

        builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
