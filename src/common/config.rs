use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::common::error::{FaceScanError, Result};
use crate::common::paths;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub verification: VerificationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CameraConfig {
    pub device_index: u32,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub warmup_frames: u32,
    #[serde(default = "default_warmup_delay")]
    pub warmup_delay_ms: u64,
}

fn default_warmup_delay() -> u64 {
    50
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: 640,
            height: 480,
            warmup_frames: 0,
            warmup_delay_ms: default_warmup_delay(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EngineConfig {
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
    #[serde(default = "default_distance_threshold")]
    pub distance_threshold: f32,
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_socket_path() -> PathBuf { paths::engine_socket_path() }
fn default_distance_threshold() -> f32 { 0.2 }
fn default_connect_retries() -> u32 { 3 }
fn default_request_timeout() -> u64 { 30_000 }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            distance_threshold: default_distance_threshold(),
            connect_retries: default_connect_retries(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

/// Timeout guards for each suspension point of a scan. Zero disables a guard.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ScanConfig {
    #[serde(default = "default_init_timeout")]
    pub init_timeout_ms: u64,
    #[serde(default = "default_device_timeout")]
    pub device_timeout_ms: u64,
    #[serde(default = "default_capture_timeout")]
    pub capture_timeout_ms: u64,
    #[serde(default = "default_engine_timeout")]
    pub engine_timeout_ms: u64,
}

fn default_init_timeout() -> u64 { 60_000 }
fn default_device_timeout() -> u64 { 10_000 }
fn default_capture_timeout() -> u64 { 2_000 }
fn default_engine_timeout() -> u64 { 30_000 }

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            init_timeout_ms: default_init_timeout(),
            device_timeout_ms: default_device_timeout(),
            capture_timeout_ms: default_capture_timeout(),
            engine_timeout_ms: default_engine_timeout(),
        }
    }
}

impl ScanConfig {
    /// Configuration with every timeout guard disabled.
    pub fn unguarded() -> Self {
        Self {
            init_timeout_ms: 0,
            device_timeout_ms: 0,
            capture_timeout_ms: 0,
            engine_timeout_ms: 0,
        }
    }

    pub fn init_timeout(&self) -> Option<Duration> { guard(self.init_timeout_ms) }
    pub fn device_timeout(&self) -> Option<Duration> { guard(self.device_timeout_ms) }
    pub fn capture_timeout(&self) -> Option<Duration> { guard(self.capture_timeout_ms) }
    pub fn engine_timeout(&self) -> Option<Duration> { guard(self.engine_timeout_ms) }
}

fn guard(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VerificationConfig {
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_fetch_retries")]
    pub fetch_retries: u32,
}

fn default_cache_ttl() -> u64 { 300 }
fn default_fetch_retries() -> u32 { 2 }

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl(),
            fetch_retries: default_fetch_retries(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StorageConfig {
    /// Falls back to the platform data directory when unset.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl Config {
    /// Load the first config file found, or defaults if none exists.
    pub fn load() -> Result<Self> {
        for path in [PathBuf::from("configs/facescan.toml"), paths::system_config_file()] {
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FaceScanError::Config(format!(
                "Config file not found: {}", path.display()
            )));
        }

        tracing::info!("Loading config from: {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| FaceScanError::Config(format!("Config parse error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.camera.width == 0 || self.camera.width > 4096 {
            return Err(FaceScanError::Config(format!(
                "Camera width must be between 1 and 4096, got {}", self.camera.width
            )));
        }
        if self.camera.height == 0 || self.camera.height > 4096 {
            return Err(FaceScanError::Config(format!(
                "Camera height must be between 1 and 4096, got {}", self.camera.height
            )));
        }

        if !(0.0..=1.0).contains(&self.engine.distance_threshold) {
            return Err(FaceScanError::Config(format!(
                "Distance threshold must be between 0.0 and 1.0, got {}",
                self.engine.distance_threshold
            )));
        }
        if self.engine.connect_retries == 0 {
            return Err(FaceScanError::Config(
                "Engine connect_retries must be at least 1".into()
            ));
        }

        if self.verification.fetch_retries > 10 {
            return Err(FaceScanError::Config(format!(
                "Template fetch retries must be at most 10, got {}",
                self.verification.fetch_retries
            )));
        }

        Ok(())
    }
}
