//! Application configuration
//!
//! Loads `config.json` from `AR_CAMERA_CONFIG` or the platform config
//! directory. Every field has a serde default so partial files load.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ml::CropAndScale;
use crate::scene::AnnotationStyle;

/// Environment variable pointing at an explicit config file
pub const CONFIG_ENV_VAR: &str = "AR_CAMERA_CONFIG";

const CONFIG_DIR_NAME: &str = "ar-smart-camera";
const CONFIG_FILE_NAME: &str = "config.json";

/// Top-level application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub annotation: AnnotationStyle,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub log: LogSettings,
}

/// Camera and world-tracking settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Camera index (0 for default)
    #[serde(rename = "index", default)]
    pub index: u32,
    /// Requested frame width
    #[serde(rename = "width", default = "default_camera_width")]
    pub width: u32,
    /// Requested frame height
    #[serde(rename = "height", default = "default_camera_height")]
    pub height: u32,
    /// Vertical field of view of the virtual camera in degrees
    #[serde(rename = "fovDegrees", default = "default_fov_degrees")]
    pub fov_degrees: f32,
    /// Distance in metres of the virtual feature plane used for hit tests
    #[serde(rename = "featureDistance", default = "default_feature_distance")]
    pub feature_distance: f32,
}

fn default_camera_width() -> u32 {
    1280
}
fn default_camera_height() -> u32 {
    720
}
fn default_fov_degrees() -> f32 {
    60.0
}
fn default_feature_distance() -> f32 {
    0.5
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: default_camera_width(),
            height: default_camera_height(),
            fov_degrees: default_fov_degrees(),
            feature_distance: default_feature_distance(),
        }
    }
}

/// Image classifier settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// ONNX model file; relative paths are resolved against the models directory
    #[serde(rename = "model", default = "default_model")]
    pub model: PathBuf,
    /// Labels file, one label per line in model output order
    #[serde(rename = "labels", default = "default_labels")]
    pub labels: PathBuf,
    /// Square input size expected by the model
    #[serde(rename = "inputSize", default = "default_input_size")]
    pub input_size: u32,
    /// How camera frames are fitted into the model input
    #[serde(rename = "cropAndScale", default)]
    pub crop_and_scale: CropAndScale,
    /// ONNX Runtime intra-op threads
    #[serde(rename = "intraThreads", default = "default_intra_threads")]
    pub intra_threads: usize,
    /// Pause after an iteration that published no prediction
    #[serde(rename = "idleDelayMs", default = "default_idle_delay_ms")]
    pub idle_delay_ms: u64,
}

fn default_model() -> PathBuf {
    PathBuf::from("resnet50.onnx")
}
fn default_labels() -> PathBuf {
    PathBuf::from("resnet50_labels.txt")
}
fn default_input_size() -> u32 {
    224
}
fn default_intra_threads() -> usize {
    2
}
fn default_idle_delay_ms() -> u64 {
    5
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            labels: default_labels(),
            input_size: default_input_size(),
            crop_and_scale: CropAndScale::default(),
            intra_threads: default_intra_threads(),
            idle_delay_ms: default_idle_delay_ms(),
        }
    }
}

/// Window and diagnostic overlay settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(rename = "windowTitle", default = "default_window_title")]
    pub window_title: String,
    #[serde(rename = "windowWidth", default = "default_window_width")]
    pub window_width: u32,
    #[serde(rename = "windowHeight", default = "default_window_height")]
    pub window_height: u32,
    /// Show FPS, camera frame count and node count
    #[serde(rename = "showStatistics", default = "default_show_statistics")]
    pub show_statistics: bool,
}

fn default_window_title() -> String {
    "AR Smart Camera".to_string()
}
fn default_window_width() -> u32 {
    1280
}
fn default_window_height() -> u32 {
    720
}
fn default_show_statistics() -> bool {
    true
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            window_title: default_window_title(),
            window_width: default_window_width(),
            window_height: default_window_height(),
            show_statistics: default_show_statistics(),
        }
    }
}

/// Logging settings stored in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    /// Filter used when no log environment variable is set
    #[serde(rename = "level", default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Default config file location
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load from a specific file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Config file to load: `AR_CAMERA_CONFIG` if set, else the default location
    pub fn resolve_path() -> Result<PathBuf, ConfigError> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Ok(PathBuf::from(path)),
            None => Self::default_path(),
        }
    }

    /// Load the resolved config file, falling back to defaults.
    ///
    /// Nothing is logged here; this runs before the logger exists. Call
    /// [`LoadedConfig::log_outcome`] once logging is up.
    pub fn load() -> LoadedConfig {
        match Self::resolve_path() {
            Ok(path) => Self::load_or_default(&path),
            Err(e) => LoadedConfig {
                config: Self::default(),
                path: None,
                error: Some(e),
            },
        }
    }

    /// Load `path` if it exists. A missing file is not an error.
    pub fn load_or_default(path: &Path) -> LoadedConfig {
        if !path.exists() {
            return LoadedConfig {
                config: Self::default(),
                path: None,
                error: None,
            };
        }

        match Self::load_from(path) {
            Ok(config) => LoadedConfig {
                config,
                path: Some(path.to_path_buf()),
                error: None,
            },
            Err(e) => LoadedConfig {
                config: Self::default(),
                path: Some(path.to_path_buf()),
                error: Some(e),
            },
        }
    }
}

/// Result of [`AppConfig::load`]
#[derive(Debug)]
pub struct LoadedConfig {
    /// Effective configuration
    pub config: AppConfig,
    /// File the configuration came from, or failed to come from
    pub path: Option<PathBuf>,
    /// Why defaults were used instead of the file
    pub error: Option<ConfigError>,
}

impl LoadedConfig {
    /// Whether the defaults were used because loading failed
    pub fn fell_back(&self) -> bool {
        self.error.is_some()
    }

    pub fn log_outcome(&self) {
        match (&self.path, &self.error) {
            (Some(path), None) => log::info!("Loaded config from {:?}", path),
            (None, None) => log::info!("No config file; using defaults"),
            (Some(path), Some(e)) => log::warn!("Failed to load config {:?}: {}. Using defaults.", path, e),
            (None, Some(e)) => log::warn!("{}; using default configuration", e),
        }
    }
}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    NoConfigDir,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "JSON error: {}", e),
            ConfigError::NoConfigDir => write!(f, "Could not find config directory"),
        }
    }
}

impl std::error::Error for ConfigError {}
