//! Tunable engine parameters.
//!
//! PID gains, the telemetry suppression threshold, and gesture timing are
//! deliberately configuration rather than hard-coded policy; the defaults
//! below match the reference tuning for the stock arm.

use carebot_types::RobotId;
use serde::{Deserialize, Serialize};

/// Per-axis PID gains for the face-tracking loop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl Default for PidGains {
    fn default() -> Self {
        Self {
            kp: 0.25,
            ki: 0.1,
            kd: 0.05,
        }
    }
}

/// Face-tracking loop parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Loop cadence in milliseconds (floored at 50).
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,
    #[serde(default = "default_frame_width")]
    pub frame_width: u32,
    #[serde(default = "default_frame_height")]
    pub frame_height: u32,
    /// Half-width of the no-actuation zone around the frame center, pixels.
    #[serde(default = "default_deadzone_px")]
    pub deadzone_px: f32,
    /// Largest per-cycle correction, degrees.
    #[serde(default = "default_max_step_deg")]
    pub max_step_deg: f32,
    /// Suppress servo writes smaller than this, degrees.
    #[serde(default = "default_min_angle_delta")]
    pub min_angle_delta: u8,
    /// Duration handed to the servo controller per tracking move.
    #[serde(default = "default_move_time_ms")]
    pub move_time_ms: u32,
    #[serde(default)]
    pub pan: PidGains,
    #[serde(default)]
    pub tilt: PidGains,
}

impl TrackingConfig {
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.update_interval_ms.max(50))
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: default_update_interval_ms(),
            frame_width: default_frame_width(),
            frame_height: default_frame_height(),
            deadzone_px: default_deadzone_px(),
            max_step_deg: default_max_step_deg(),
            min_angle_delta: default_min_angle_delta(),
            move_time_ms: default_move_time_ms(),
            pan: PidGains::default(),
            tilt: PidGains::default(),
        }
    }
}

/// Joint telemetry publisher parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_interval_ms")]
    pub interval_ms: u64,
    /// Forced keep-alive: never stay silent longer than this.
    #[serde(default = "default_keepalive_ms")]
    pub keepalive_ms: u64,
    /// Per-joint change threshold below which snapshots are suppressed.
    #[serde(default = "default_min_delta_deg")]
    pub min_delta_deg: u8,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_telemetry_interval_ms(),
            keepalive_ms: default_keepalive_ms(),
            min_delta_deg: default_min_delta_deg(),
        }
    }
}

/// Top-level engine configuration, built once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Which physical instance this process controls.
    pub identity: RobotId,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// Multiplier applied to gesture move/dwell times (tests use a small
    /// value to fast-forward trajectories).
    #[serde(default = "default_gesture_time_scale")]
    pub gesture_time_scale: f32,
}

impl EngineConfig {
    pub fn new(identity: RobotId) -> Self {
        Self {
            identity,
            tracking: TrackingConfig::default(),
            telemetry: TelemetryConfig::default(),
            gesture_time_scale: default_gesture_time_scale(),
        }
    }
}

fn default_update_interval_ms() -> u64 {
    200
}
fn default_frame_width() -> u32 {
    640
}
fn default_frame_height() -> u32 {
    480
}
fn default_deadzone_px() -> f32 {
    60.0
}
fn default_max_step_deg() -> f32 {
    15.0
}
fn default_min_angle_delta() -> u8 {
    1
}
fn default_move_time_ms() -> u32 {
    500
}
fn default_telemetry_interval_ms() -> u64 {
    200
}
fn default_keepalive_ms() -> u64 {
    1000
}
fn default_min_delta_deg() -> u8 {
    1
}
fn default_gesture_time_scale() -> f32 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_is_floored() {
        let cfg = TrackingConfig {
            update_interval_ms: 10,
            ..TrackingConfig::default()
        };
        assert_eq!(cfg.interval(), std::time::Duration::from_millis(50));
    }

    #[test]
    fn defaults_match_reference_tuning() {
        let cfg = EngineConfig::new(RobotId::Left);
        assert_eq!(cfg.tracking.update_interval_ms, 200);
        assert_eq!(cfg.telemetry.keepalive_ms, 1000);
        assert!((cfg.tracking.pan.kp - 0.25).abs() < f32::EPSILON);
    }
}
