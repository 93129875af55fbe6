//! Configuration management for chitti.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default configuration directory name.
const CONFIG_DIR_NAME: &str = "chitti";

/// Prefix for environment variable overrides.
const ENV_PREFIX: &str = "CHITTI_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `CHITTI_`, `__` between section and key)
/// 2. TOML config file at `~/.config/chitti/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Camera configuration.
    pub camera: CameraConfig,
    /// Volatile frame storage configuration.
    pub volatile: VolatileConfig,
    /// Vision-language inference configuration.
    pub inference: InferenceConfig,
    /// Speech output configuration.
    pub speech: SpeechConfig,
    /// Retention audit configuration.
    pub audit: AuditConfig,
    /// Cycle loop configuration.
    pub cycle: CycleConfig,
}

/// Camera-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// V4L2 device node.
    pub device: PathBuf,
    /// Capture width in pixels.
    pub width: u32,
    /// Capture height in pixels.
    pub height: u32,
    /// JPEG quality (1-100).
    pub jpeg_quality: u8,
    /// Path or name of the ffmpeg binary used to grab frames.
    pub ffmpeg_path: PathBuf,
}

/// Volatile (RAM-backed) frame storage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolatileConfig {
    /// Directory frames are written to. Must live on tmpfs/ramfs.
    pub root: PathBuf,
    /// File name of the single frame slot inside `root`.
    pub frame_file_name: String,
    /// Refuse to start unless `root` is on a RAM-backed filesystem.
    pub require_ram_backed: bool,
}

/// Vision-language inference configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Generate endpoint of the inference server.
    pub url: String,
    /// Model name sent with each request.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Prompt sent alongside each frame.
    pub prompt: String,
}

/// Speech output configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Speech synthesizer binary (must support `--stdin` and `--stdout`).
    pub engine: PathBuf,
    /// Audio player binary reading WAV from stdin.
    pub player: PathBuf,
    /// Maximum time to wait for playback, in seconds.
    pub timeout_secs: u64,
    /// Synthesizer voice, if not the engine default.
    pub voice: Option<String>,
    /// Speaking rate in words per minute, if not the engine default.
    pub words_per_minute: Option<u32>,
}

/// Retention audit configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Mount point of the persistent volume whose usage is audited.
    pub mount_point: PathBuf,
}

/// Cycle loop configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Delay between cycles in continuous mode, in milliseconds.
    pub delay_ms: u64,
    /// Number of recorded cycles after which continuous mode stops.
    /// Aborted cycles don't count. Set to 0 for unlimited.
    pub max_cycles: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/video0"),
            width: 640,
            height: 480,
            jpeg_quality: 85,
            ffmpeg_path: PathBuf::from("ffmpeg"),
        }
    }
}

impl Default for VolatileConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/dev/shm/chitti"),
            frame_file_name: "frame.jpg".to_string(),
            require_ram_backed: true,
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:11434/api/generate".to_string(),
            model: "moondream".to_string(),
            timeout_secs: 30,
            prompt: "Describe what you see in one short sentence.".to_string(),
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            engine: PathBuf::from("espeak"),
            player: PathBuf::from("aplay"),
            timeout_secs: 30,
            voice: None,
            words_per_minute: None,
        }
    }
}

impl SpeechConfig {
    /// Get the speech timeout as a Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            mount_point: PathBuf::from("/"),
        }
    }
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            delay_ms: 100,
            max_cycles: 0,
        }
    }
}

impl Config {
    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing, or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if !self.volatile.root.is_absolute() {
            return Err(Error::config_validation(format!(
                "volatile.root must be an absolute path, got {}",
                self.volatile.root.display()
            )));
        }

        let mut components = Path::new(&self.volatile.frame_file_name).components();
        let bare_name = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !bare_name {
            return Err(Error::config_validation(format!(
                "volatile.frame_file_name must be a bare file name, got {:?}",
                self.volatile.frame_file_name
            )));
        }

        if !self.audit.mount_point.is_absolute() {
            return Err(Error::config_validation(format!(
                "audit.mount_point must be an absolute path, got {}",
                self.audit.mount_point.display()
            )));
        }

        if !(1..=100).contains(&self.camera.jpeg_quality) {
            return Err(Error::config_validation(format!(
                "camera.jpeg_quality must be between 1 and 100, got {}",
                self.camera.jpeg_quality
            )));
        }

        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(Error::config_validation(
                "camera.width and camera.height must be greater than 0",
            ));
        }

        if self.inference.timeout_secs == 0 {
            return Err(Error::config_validation(
                "inference.timeout_secs must be greater than 0",
            ));
        }

        if self.speech.timeout_secs == 0 {
            return Err(Error::config_validation(
                "speech.timeout_secs must be greater than 0",
            ));
        }

        if reqwest::Url::parse(&self.inference.url).is_err() {
            return Err(Error::config_validation(format!(
                "inference.url is not a valid URL: {}",
                self.inference.url
            )));
        }

        if self.inference.model.trim().is_empty() {
            return Err(Error::config_validation("inference.model must not be empty"));
        }

        if self.inference.prompt.trim().is_empty() {
            return Err(Error::config_validation("inference.prompt must not be empty"));
        }

        Ok(())
    }

    /// Get the path of the single volatile frame slot.
    #[must_use]
    pub fn frame_path(&self) -> PathBuf {
        self.volatile.root.join(&self.volatile.frame_file_name)
    }

    /// Get the inference timeout as a Duration.
    #[must_use]
    pub fn inference_timeout(&self) -> Duration {
        Duration::from_secs(self.inference.timeout_secs)
    }

    /// Get the inter-cycle delay as a Duration.
    #[must_use]
    pub fn cycle_delay(&self) -> Duration {
        Duration::from_millis(self.cycle.delay_ms)
    }

    /// Get the cycle limit, if any.
    #[must_use]
    pub fn max_cycles(&self) -> Option<u64> {
        if self.cycle.max_cycles == 0 {
            None
        } else {
            Some(self.cycle.max_cycles)
        }
    }
}
