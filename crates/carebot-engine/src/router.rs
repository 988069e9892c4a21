//! Envelope routing: scope filter, alias resolution, payload validation.
//!
//! The router is pure; the engine emits the corresponding events. A scope
//! mismatch is a silent drop (bus traffic addressed to the other arm), a
//! bad name or payload is a rejection that becomes an `error` event, and
//! everything else becomes a validated [`RobotCommand`] ready for the
//! supervisor.

use carebot_types::{
    clamp_angle, CommandEnvelope, JointAngles, JointId, RobotId, Scope, JOINT_COUNT,
};

/// Default move duration for set_joint / set_joints, milliseconds.
pub const DEFAULT_SET_TIME_MS: u32 = 500;
/// Default move duration for nudge_joint, milliseconds.
pub const DEFAULT_NUDGE_TIME_MS: u32 = 300;
/// Upper bound on any requested move duration, milliseconds.
const MAX_TIME_MS: u64 = 60_000;

/// A validated logical command with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RobotCommand {
    FaceTracking,
    StopFaceTracking,
    InitPose,
    MakeHeart,
    Hug,
    SetJoint {
        id: JointId,
        angle: u8,
        time_ms: u32,
    },
    SetJoints {
        angles: JointAngles,
        time_ms: u32,
    },
    NudgeJoint {
        id: JointId,
        delta: i32,
        time_ms: u32,
    },
}

/// Why an envelope was silently dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// `robot_id` addressed a different instance (or was unrecognised).
    ScopeMismatch,
    /// `type` was present and not `"command"`.
    NotACommand,
}

/// Routing decision for one inbound envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Routing {
    Dispatch {
        /// The command name as received (echoed back in events).
        name: String,
        command: RobotCommand,
    },
    Drop(DropReason),
    Reject {
        error: &'static str,
        command: Option<String>,
    },
}

/// Decide what to do with `env` for the instance `identity`.
pub fn route(identity: RobotId, env: &CommandEnvelope) -> Routing {
    if !env.is_command() {
        return Routing::Drop(DropReason::NotACommand);
    }

    // Scope filter: absent/empty addresses everyone; otherwise the scope
    // must name this instance or `all`. Unrecognised ids are not ours.
    if let Some(raw) = env.robot_id.as_deref()
        && !raw.is_empty()
        && !Scope::parse(raw).is_some_and(|s| s.addresses(identity))
    {
        return Routing::Drop(DropReason::ScopeMismatch);
    }

    let name = env.command.trim();
    if name.is_empty() {
        return Routing::Reject {
            error: "missing_command",
            command: None,
        };
    }

    let command = match resolve_alias(name) {
        Some(kind) => kind,
        None => {
            return Routing::Reject {
                error: "unknown_command",
                command: Some(name.to_string()),
            };
        }
    };

    match validate(command, env) {
        Ok(command) => Routing::Dispatch {
            name: name.to_string(),
            command,
        },
        Err(()) => Routing::Reject {
            error: "invalid_payload",
            command: Some(name.to_string()),
        },
    }
}

/// Canonical command tag, before payload validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandKind {
    FaceTracking,
    StopFaceTracking,
    InitPose,
    MakeHeart,
    Hug,
    SetJoint,
    SetJoints,
    NudgeJoint,
}

/// Static alias table, including the non-ASCII aliases accepted by the
/// voice frontend.
fn resolve_alias(name: &str) -> Option<CommandKind> {
    match name {
        "face_tracking" | "face_tracking_mode" | "face_tracking_모드" => {
            Some(CommandKind::FaceTracking)
        }
        "stop_face_tracking" | "stop_face_tracking_mode" => Some(CommandKind::StopFaceTracking),
        "init_pose" | "init" | "ready_pose" => Some(CommandKind::InitPose),
        "make_heart" => Some(CommandKind::MakeHeart),
        "hug" | "make_hug" => Some(CommandKind::Hug),
        "set_joint" => Some(CommandKind::SetJoint),
        "set_joints" => Some(CommandKind::SetJoints),
        "nudge_joint" => Some(CommandKind::NudgeJoint),
        _ => None,
    }
}

fn time_ms(env: &CommandEnvelope, default: u32) -> u32 {
    env.time_ms
        .map(|t| t.min(MAX_TIME_MS) as u32)
        .unwrap_or(default)
}

fn validate(kind: CommandKind, env: &CommandEnvelope) -> Result<RobotCommand, ()> {
    match kind {
        CommandKind::FaceTracking => Ok(RobotCommand::FaceTracking),
        CommandKind::StopFaceTracking => Ok(RobotCommand::StopFaceTracking),
        CommandKind::InitPose => Ok(RobotCommand::InitPose),
        CommandKind::MakeHeart => Ok(RobotCommand::MakeHeart),
        CommandKind::Hug => Ok(RobotCommand::Hug),

        CommandKind::SetJoint => {
            let id = env.joint_field().and_then(JointId::new).ok_or(())?;
            let angle = clamp_angle(env.angle.ok_or(())?);
            Ok(RobotCommand::SetJoint {
                id,
                angle,
                time_ms: time_ms(env, DEFAULT_SET_TIME_MS),
            })
        }

        CommandKind::SetJoints => {
            let raw = env.angles.as_ref().ok_or(())?;
            if raw.len() != JOINT_COUNT {
                return Err(());
            }
            let mut angles: JointAngles = [0; JOINT_COUNT];
            for (slot, value) in angles.iter_mut().zip(raw) {
                *slot = clamp_angle(*value);
            }
            Ok(RobotCommand::SetJoints {
                angles,
                time_ms: time_ms(env, DEFAULT_SET_TIME_MS),
            })
        }

        CommandKind::NudgeJoint => {
            let id = env.joint_field().and_then(JointId::new).ok_or(())?;
            let delta = env
                .delta
                .unwrap_or(0)
                .clamp(i32::MIN as i64, i32::MAX as i64) as i32;
            Ok(RobotCommand::NudgeJoint {
                id,
                delta,
                time_ms: time_ms(env, DEFAULT_NUDGE_TIME_MS),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(json: &str) -> CommandEnvelope {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn aliases_resolve_to_the_same_command() {
        for name in ["face_tracking", "face_tracking_mode", "face_tracking_모드"] {
            let routing = route(RobotId::Left, &CommandEnvelope::bare(name));
            assert!(
                matches!(
                    routing,
                    Routing::Dispatch { command: RobotCommand::FaceTracking, .. }
                ),
                "alias {name} did not resolve"
            );
        }
        for name in ["init_pose", "init", "ready_pose"] {
            let routing = route(RobotId::Left, &CommandEnvelope::bare(name));
            assert!(matches!(
                routing,
                Routing::Dispatch { command: RobotCommand::InitPose, .. }
            ));
        }
    }

    #[test]
    fn dispatch_echoes_the_received_name() {
        let routing = route(RobotId::Left, &CommandEnvelope::bare("make_hug"));
        match routing {
            Routing::Dispatch { name, command } => {
                assert_eq!(name, "make_hug");
                assert_eq!(command, RobotCommand::Hug);
            }
            other => panic!("unexpected routing: {other:?}"),
        }
    }

    #[test]
    fn unknown_command_is_rejected() {
        let routing = route(RobotId::Left, &CommandEnvelope::bare("dance"));
        assert_eq!(
            routing,
            Routing::Reject {
                error: "unknown_command",
                command: Some("dance".to_string()),
            }
        );
    }

    #[test]
    fn empty_command_is_missing() {
        let routing = route(RobotId::Left, &env(r#"{"type":"command","command":"  "}"#));
        assert_eq!(
            routing,
            Routing::Reject {
                error: "missing_command",
                command: None,
            }
        );
    }

    #[test]
    fn scope_mismatch_is_a_silent_drop() {
        let e = env(r#"{"type":"command","command":"hug","robot_id":"robot_right"}"#);
        assert_eq!(
            route(RobotId::Left, &e),
            Routing::Drop(DropReason::ScopeMismatch)
        );
        // Unrecognised scopes are also not ours.
        let e = env(r#"{"type":"command","command":"hug","robot_id":"robot_centre"}"#);
        assert_eq!(
            route(RobotId::Left, &e),
            Routing::Drop(DropReason::ScopeMismatch)
        );
    }

    #[test]
    fn broadcast_and_absent_scope_are_accepted() {
        let e = env(r#"{"type":"command","command":"hug","robot_id":"all"}"#);
        assert!(matches!(route(RobotId::Left, &e), Routing::Dispatch { .. }));
        let e = env(r#"{"type":"command","command":"hug"}"#);
        assert!(matches!(route(RobotId::Right, &e), Routing::Dispatch { .. }));
    }

    #[test]
    fn non_command_types_are_ignored() {
        let e = env(r#"{"type":"server_dispatch","command":"hug"}"#);
        assert_eq!(route(RobotId::Left, &e), Routing::Drop(DropReason::NotACommand));
    }

    #[test]
    fn set_joint_validates_id_and_clamps_angle() {
        let e = env(r#"{"type":"command","command":"set_joint","id":7,"angle":90}"#);
        assert_eq!(
            route(RobotId::Left, &e),
            Routing::Reject {
                error: "invalid_payload",
                command: Some("set_joint".to_string()),
            }
        );

        let e = env(r#"{"type":"command","command":"set_joint","sid":2,"angle":300}"#);
        match route(RobotId::Left, &e) {
            Routing::Dispatch {
                command: RobotCommand::SetJoint { id, angle, time_ms },
                ..
            } => {
                assert_eq!(id.get(), 2);
                assert_eq!(angle, 180);
                assert_eq!(time_ms, DEFAULT_SET_TIME_MS);
            }
            other => panic!("unexpected routing: {other:?}"),
        }
    }

    #[test]
    fn set_joint_requires_an_angle() {
        let e = env(r#"{"type":"command","command":"set_joint","id":1}"#);
        assert!(matches!(
            route(RobotId::Left, &e),
            Routing::Reject { error: "invalid_payload", .. }
        ));
    }

    #[test]
    fn set_joints_requires_exactly_six_angles() {
        let e = env(r#"{"type":"command","command":"set_joints","angles":[90,90,90]}"#);
        assert!(matches!(
            route(RobotId::Left, &e),
            Routing::Reject { error: "invalid_payload", .. }
        ));

        let e = env(
            r#"{"type":"command","command":"set_joints","angles":[90,135,45,45,90,30],"time_ms":700}"#,
        );
        match route(RobotId::Left, &e) {
            Routing::Dispatch {
                command: RobotCommand::SetJoints { angles, time_ms },
                ..
            } => {
                assert_eq!(angles, [90, 135, 45, 45, 90, 30]);
                assert_eq!(time_ms, 700);
            }
            other => panic!("unexpected routing: {other:?}"),
        }
    }

    #[test]
    fn nudge_defaults_delta_and_duration() {
        let e = env(r#"{"type":"command","command":"nudge_joint","id":4}"#);
        match route(RobotId::Left, &e) {
            Routing::Dispatch {
                command: RobotCommand::NudgeJoint { id, delta, time_ms },
                ..
            } => {
                assert_eq!(id.get(), 4);
                assert_eq!(delta, 0);
                assert_eq!(time_ms, DEFAULT_NUDGE_TIME_MS);
            }
            other => panic!("unexpected routing: {other:?}"),
        }
    }
}
