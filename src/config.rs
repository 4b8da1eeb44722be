//! Configuration for crabcapture
//!
//! Settings live in a TOML file with a `[capture]` and a `[logging]` section.
//! [`CaptureSettings::load_layered`] overlays environment variables such as
//! `CRABCAPTURE_CAPTURE__DEFAULT_FPS=15` on top of the file.

use crate::errors::CaptureError;
use crate::platform::RequestTemplate;
use crate::types::VideoSize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Frame rate used until the host sets one
pub const DEFAULT_FPS: f32 = 5.0;

/// Highest frame rate accepted by [`CaptureSettings::validate`]
pub const MAX_FPS: f32 = 240.0;

/// Environment variable prefix for [`CaptureSettings::load_layered`]
pub const ENV_PREFIX: &str = "CRABCAPTURE";

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    pub capture: CaptureConfig,
    pub logging: LoggingConfig,
}

/// Capture pipeline defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Target frames per second
    pub default_fps: f32,
    /// Requested resolution [width, height]; [0, 0] leaves capture unconfigured
    pub default_resolution: [u32; 2],
    /// Images the platform image reader may hold at once
    pub image_reader_depth: u32,
    pub request_template: RequestTemplate,
    /// Converted frame buffers kept for reuse
    pub pool_capacity: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            default_fps: DEFAULT_FPS,
            default_resolution: [0, 0],
            image_reader_depth: 1,
            request_template: RequestTemplate::Record,
            pool_capacity: 3,
        }
    }
}

impl CaptureConfig {
    pub fn resolution(&self) -> VideoSize {
        VideoSize::new(self.default_resolution[0], self.default_resolution[1])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `env_logger` filter used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "crabcapture=info".to_string(),
        }
    }
}

impl CaptureSettings {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CaptureError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("[Config] No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| CaptureError::Config(format!("Failed to read config file: {}", e)))?;

        let settings: CaptureSettings = toml::from_str(&contents)
            .map_err(|e| CaptureError::Config(format!("Failed to parse config file: {}", e)))?;

        settings.validate().map_err(CaptureError::Config)?;

        log::info!("[Config] Loaded configuration from {:?}", path);
        Ok(settings)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CaptureError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| CaptureError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)?;

        log::info!("[Config] Saved configuration to {:?}", path);
        Ok(())
    }

    /// Defaults, then the optional TOML file at `path`, then `CRABCAPTURE_*` variables.
    ///
    /// Nested keys use a double underscore: `CRABCAPTURE_CAPTURE__POOL_CAPACITY=4`.
    pub fn load_layered<P: AsRef<Path>>(path: P) -> Result<Self, CaptureError> {
        let to_error = |e: ::config::ConfigError| CaptureError::Config(e.to_string());

        let settings: CaptureSettings = ::config::Config::builder()
            .add_source(::config::Config::try_from(&Self::default()).map_err(to_error)?)
            .add_source(::config::File::from(path.as_ref()).required(false))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(to_error)?
            .try_deserialize()
            .map_err(to_error)?;

        settings.validate().map_err(CaptureError::Config)?;
        Ok(settings)
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("crabcapture.toml")
    }

    /// Load from default location, falling back to defaults on any error
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("[Config] Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Whether `fps` is a usable target frame rate
    pub fn is_valid_fps(fps: f32) -> bool {
        fps.is_finite() && fps > 0.0 && fps <= MAX_FPS
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        let capture = &self.capture;
        if !Self::is_valid_fps(capture.default_fps) {
            return Err(format!("Invalid default FPS (must be in (0, {}])", MAX_FPS));
        }
        if !capture.resolution().is_valid() {
            return Err("Default resolution must be [0, 0] or fully positive".to_string());
        }
        if capture.image_reader_depth == 0 {
            return Err("Image reader depth must be at least 1".to_string());
        }
        if capture.pool_capacity == 0 {
            return Err("Pool capacity must be at least 1".to_string());
        }
        Ok(())
    }
}
