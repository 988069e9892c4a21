use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of servos on one arm.
pub const JOINT_COUNT: usize = 6;

/// Joint angle vector, in degrees (0..=180 per joint).
pub type JointAngles = [u8; JOINT_COUNT];

/// Clamp an arbitrary integer angle into the servo's valid 0..=180 range.
pub fn clamp_angle(raw: i64) -> u8 {
    raw.clamp(0, 180) as u8
}

/// Identity of one physical arm instance. A shared bus addresses instances
/// by this tag; `Scope` adds the broadcast marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RobotId {
    #[serde(rename = "robot_left")]
    Left,
    #[serde(rename = "robot_right")]
    Right,
}

impl RobotId {
    pub fn as_str(&self) -> &'static str {
        match self {
            RobotId::Left => "robot_left",
            RobotId::Right => "robot_right",
        }
    }
}

impl std::fmt::Display for RobotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RobotId {
    type Err = CarebotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "robot_left" => Ok(RobotId::Left),
            "robot_right" => Ok(RobotId::Right),
            other => Err(CarebotError::Config(format!(
                "unknown robot_id '{other}' (expected robot_left or robot_right)"
            ))),
        }
    }
}

/// Routing scope carried by an inbound envelope: one instance or broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    Robot(RobotId),
}

impl Scope {
    /// Parse the `robot_id` field of an envelope. Unrecognised values yield
    /// `None`, which the router treats as "not for me".
    pub fn parse(raw: &str) -> Option<Scope> {
        match raw {
            "all" => Some(Scope::All),
            other => other.parse::<RobotId>().ok().map(Scope::Robot),
        }
    }

    /// Whether an envelope with this scope should be handled by `instance`.
    pub fn addresses(&self, instance: RobotId) -> bool {
        match self {
            Scope::All => true,
            Scope::Robot(id) => *id == instance,
        }
    }
}

/// One-based servo index (1..=6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JointId(u8);

impl JointId {
    pub fn new(raw: i64) -> Option<JointId> {
        (1..=JOINT_COUNT as i64)
            .contains(&raw)
            .then_some(JointId(raw as u8))
    }

    /// One-based wire index.
    pub fn get(&self) -> u8 {
        self.0
    }

    /// Zero-based array index.
    pub fn index(&self) -> usize {
        (self.0 - 1) as usize
    }
}

/// Snapshot of the joint register: the last known/commanded angles and a
/// sequence number bumped on every successful actuator write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JointState {
    pub angles: JointAngles,
    pub seq: u64,
}

/// Face bounding box in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bbox {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Bbox {
    pub fn center(&self) -> (f32, f32) {
        (
            self.x as f32 + self.w as f32 / 2.0,
            self.y as f32 + self.h as f32 / 2.0,
        )
    }
}

/// One frame's detection result from the external face detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingSample {
    pub detected: bool,
    pub bbox: Option<Bbox>,
}

impl TrackingSample {
    pub fn not_detected() -> Self {
        Self {
            detected: false,
            bbox: None,
        }
    }

    pub fn face(bbox: Bbox) -> Self {
        Self {
            detected: true,
            bbox: Some(bbox),
        }
    }
}

/// Raw inbound envelope as delivered by the transport. Command-specific
/// payload fields are all optional here; the router validates shape per
/// command. `sid` is a legacy alias for `id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandEnvelope {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub robot_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angles: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_ms: Option<u64>,
}

impl CommandEnvelope {
    /// Convenience constructor for a bare command with no payload.
    pub fn bare(command: &str) -> Self {
        Self {
            kind: Some("command".to_string()),
            command: command.to_string(),
            ..Self::default()
        }
    }

    /// Envelopes without a `type` are accepted as commands (legacy clients);
    /// any other explicit `type` is ignored by the router.
    pub fn is_command(&self) -> bool {
        self.kind.as_deref().is_none_or(|k| k == "command")
    }

    /// `id` with `sid` fallback.
    pub fn joint_field(&self) -> Option<i64> {
        self.id.or(self.sid)
    }
}

/// Terminal status of a dispatched command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Completed,
    Cancelled,
    Error,
}

/// Outgoing event body, tagged on the wire by its `type` field. Timestamps
/// and identity are added by the emitter (see [`Stamped`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutgoingEvent {
    Hello {
        agent: String,
        capabilities: Vec<String>,
    },
    Ack {
        command: String,
        status: String,
    },
    Progress {
        command: String,
        status: String,
    },
    Result {
        command: String,
        status: ResultStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        outcome: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Error {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        command: Option<String>,
    },
    JointState {
        angles: JointAngles,
        seq: u64,
    },
    FaceTracking {
        status: String,
        detected: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        bbox: Option<Bbox>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        joints: Option<JointAngles>,
    },
}

/// A fully stamped outgoing envelope, ready for the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stamped {
    pub ts: DateTime<Utc>,
    pub who: String,
    pub robot_id: RobotId,
    #[serde(flatten)]
    pub event: OutgoingEvent,
}

/// Global error type spanning hardware faults, payload rejections, and
/// channel plumbing.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum CarebotError {
    #[error("Hardware I/O fault on {component}: {details}")]
    HardwareIo { component: String, details: String },

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CarebotError {
    pub fn hardware(component: impl Into<String>, details: impl Into<String>) -> Self {
        CarebotError::HardwareIo {
            component: component.into(),
            details: details.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_parse_and_addressing() {
        assert_eq!(Scope::parse("all"), Some(Scope::All));
        assert_eq!(
            Scope::parse("robot_left"),
            Some(Scope::Robot(RobotId::Left))
        );
        assert_eq!(Scope::parse("robot_center"), None);

        assert!(Scope::All.addresses(RobotId::Right));
        assert!(Scope::Robot(RobotId::Left).addresses(RobotId::Left));
        assert!(!Scope::Robot(RobotId::Right).addresses(RobotId::Left));
    }

    #[test]
    fn joint_id_bounds() {
        assert!(JointId::new(0).is_none());
        assert!(JointId::new(7).is_none());
        let id = JointId::new(6).unwrap();
        assert_eq!(id.get(), 6);
        assert_eq!(id.index(), 5);
    }

    #[test]
    fn clamp_angle_range() {
        assert_eq!(clamp_angle(-20), 0);
        assert_eq!(clamp_angle(90), 90);
        assert_eq!(clamp_angle(500), 180);
    }

    #[test]
    fn envelope_accepts_sid_alias() {
        let env: CommandEnvelope = serde_json::from_str(
            r#"{"type":"command","command":"set_joint","sid":3,"angle":45}"#,
        )
        .unwrap();
        assert!(env.is_command());
        assert_eq!(env.joint_field(), Some(3));
        assert_eq!(env.angle, Some(45));
    }

    #[test]
    fn envelope_without_type_is_command() {
        let env: CommandEnvelope =
            serde_json::from_str(r#"{"command":"make_heart"}"#).unwrap();
        assert!(env.is_command());
        let env: CommandEnvelope =
            serde_json::from_str(r#"{"type":"server_dispatch","command":"x"}"#).unwrap();
        assert!(!env.is_command());
    }

    #[test]
    fn envelope_keeps_non_ascii_command() {
        let env: CommandEnvelope =
            serde_json::from_str(r#"{"type":"command","command":"face_tracking_모드"}"#)
                .unwrap();
        assert_eq!(env.command, "face_tracking_모드");
    }

    #[test]
    fn stamped_event_flattens_type_tag() {
        let stamped = Stamped {
            ts: Utc::now(),
            who: "carebot".to_string(),
            robot_id: RobotId::Left,
            event: OutgoingEvent::Ack {
                command: "hug".to_string(),
                status: "accepted".to_string(),
            },
        };
        let json = serde_json::to_value(&stamped).unwrap();
        assert_eq!(json["type"], "ack");
        assert_eq!(json["who"], "carebot");
        assert_eq!(json["robot_id"], "robot_left");
        assert_eq!(json["command"], "hug");
        assert!(json["ts"].is_string());
    }

    #[test]
    fn result_event_skips_absent_fields() {
        let event = OutgoingEvent::Result {
            command: "init_pose".to_string(),
            status: ResultStatus::Completed,
            outcome: Some("init_completed".to_string()),
            error: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["outcome"], "init_completed");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn stamped_roundtrip() {
        let stamped = Stamped {
            ts: Utc::now(),
            who: "carebot".to_string(),
            robot_id: RobotId::Right,
            event: OutgoingEvent::JointState {
                angles: [90, 135, 45, 45, 90, 30],
                seq: 7,
            },
        };
        let json = serde_json::to_string(&stamped).unwrap();
        let back: Stamped = serde_json::from_str(&json).unwrap();
        assert_eq!(back, stamped);
    }

    #[test]
    fn error_display() {
        let err = CarebotError::hardware("joint_3", "write timed out");
        assert!(err.to_string().contains("joint_3"));
        let err = CarebotError::InvalidPayload("angles must have length 6".into());
        assert!(err.to_string().contains("length 6"));
    }
}
