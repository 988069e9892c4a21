//! Process configuration – reads `carebot.toml`.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use carebot_engine::{EngineConfig, TelemetryConfig, TrackingConfig};
use carebot_hal::RetryPolicy;
use carebot_types::{CarebotError, RobotId};
use serde::{Deserialize, Serialize};

/// Actuator retry budget, in TOML-friendly units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySection {
    /// Additional attempts after the first failure.
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl RetrySection {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retries,
            backoff: Duration::from_millis(self.backoff_ms),
        }
    }
}

/// Persisted process configuration. Every field has a default so an empty
/// file (or no file at all) yields a runnable left-arm setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Which arm this process controls.
    #[serde(default = "default_robot_id")]
    pub robot_id: RobotId,

    /// WebSocket port for commands and events.
    #[serde(default = "default_ws_port")]
    pub ws_port: u16,

    #[serde(default)]
    pub retry: RetrySection,

    #[serde(default)]
    pub tracking: TrackingConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Multiplier applied to gesture move/dwell times.
    #[serde(default = "default_gesture_time_scale")]
    pub gesture_time_scale: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            robot_id: default_robot_id(),
            ws_port: default_ws_port(),
            retry: RetrySection::default(),
            tracking: TrackingConfig::default(),
            telemetry: TelemetryConfig::default(),
            gesture_time_scale: default_gesture_time_scale(),
        }
    }
}

impl Config {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            identity: self.robot_id,
            tracking: self.tracking.clone(),
            telemetry: self.telemetry.clone(),
            gesture_time_scale: self.gesture_time_scale,
        }
    }
}

fn default_robot_id() -> RobotId {
    RobotId::Left
}
fn default_ws_port() -> u16 {
    carebot_bridge::DEFAULT_PORT
}
fn default_retries() -> u32 {
    3
}
fn default_backoff_ms() -> u64 {
    50
}
fn default_gesture_time_scale() -> f32 {
    1.0
}

/// Resolve the config path: `CAREBOT_CONFIG` if set, else `./carebot.toml`.
pub fn config_path() -> PathBuf {
    std::env::var("CAREBOT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("carebot.toml"))
}

/// Load the config, falling back to defaults when the file does not exist.
pub fn load() -> Result<Config, CarebotError> {
    load_from(&config_path())
}

/// Load from a specific path. Extracted for testability.
pub(crate) fn load_from(path: &PathBuf) -> Result<Config, CarebotError> {
    if !path.exists() {
        return Ok(apply_env_overrides(Config::default()));
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        CarebotError::Config(format!("failed to read {}: {e}", path.display()))
    })?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| CarebotError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(apply_env_overrides(cfg))
}

/// Apply `CAREBOT_*` environment variable overrides.
///
/// | Variable | Config field |
/// |---|---|
/// | `CAREBOT_ROBOT_ID` | `robot_id` |
/// | `CAREBOT_WS_PORT` | `ws_port` |
fn apply_env_overrides(mut cfg: Config) -> Config {
    if let Ok(v) = std::env::var("CAREBOT_ROBOT_ID")
        && let Ok(id) = v.parse::<RobotId>()
    {
        cfg.robot_id = id;
    }
    if let Ok(v) = std::env::var("CAREBOT_WS_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.ws_port = port;
    }
    cfg
}
