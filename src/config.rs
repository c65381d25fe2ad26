use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::error::ConfigError;

const ENV_PREFIX: &str = "ECHO_AFC";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Frames per second requested from the frame source.
    pub sampling_rate_hz: f64,
    /// Upper bound on segmentation calls in flight at once.
    pub max_concurrent_segmentations: usize,
    /// Per-frame segmentation deadline in milliseconds, 0 disables it.
    pub segmentation_timeout_ms: u64,
    /// Mask pixels strictly above this value count as left ventricle.
    pub foreground_threshold: u8,
    pub progress_buffer_size: usize,
    /// Decimal places used when rendering the percentage.
    pub display_precision: usize,
    pub log_level: String,
    /// Frame rate the image sequence was recorded at.
    pub source_fps: f64,
    /// Darkest-is-blood cutoff for the intensity threshold backend.
    pub max_blood_pool_intensity: u8,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            sampling_rate_hz: 30.0,
            max_concurrent_segmentations: 4,
            segmentation_timeout_ms: 10_000,
            foreground_threshold: 127,
            progress_buffer_size: 64,
            display_precision: 0,
            log_level: "info".to_string(),
            source_fps: 30.0,
            max_blood_pool_intensity: 60,
        }
    }
}

impl Configuration {
    /// Layers an optional file and `ECHO_AFC_*` environment variables over the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, Self::environment())
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX).try_parsing(true)
    }

    fn load_with(path: Option<&Path>, environment: config::Environment) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let configuration: Configuration = builder
            .add_source(environment)
            .build()?
            .try_deserialize()?;
        configuration.validate()?;
        Ok(configuration)
    }

    pub fn segmentation_timeout(&self) -> Option<Duration> {
        match self.segmentation_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    pub fn tracing_level(&self) -> Result<Level, ConfigError> {
        Level::from_str(&self.log_level)
            .map_err(|_| ConfigError::Invalid(format!("unknown log level '{}'", self.log_level)))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.sampling_rate_hz.is_finite() || self.sampling_rate_hz <= 0.0 {
            return Err(ConfigError::Invalid(
                "Sampling rate must be a positive number of frames per second".to_string(),
            ));
        }

        if !self.source_fps.is_finite() || self.source_fps <= 0.0 {
            return Err(ConfigError::Invalid(
                "Source frame rate must be a positive number of frames per second".to_string(),
            ));
        }

        if self.max_concurrent_segmentations == 0 {
            return Err(ConfigError::Invalid(
                "Max concurrent segmentations must be greater than 0".to_string(),
            ));
        }

        if self.progress_buffer_size == 0 {
            return Err(ConfigError::Invalid(
                "Progress buffer size must be greater than 0".to_string(),
            ));
        }

        self.tracing_level()?;
        Ok(())
    }
}
