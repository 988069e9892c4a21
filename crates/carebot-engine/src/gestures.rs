//! Motion primitives: fixed, timed joint-angle trajectories.
//!
//! Gesture tables are pure data; the executor walks them through the
//! [`ArmGateway`], checking the cancellation token before each waypoint and
//! sleeping cancellably through each dwell. `make_heart` and `hug` are
//! mirrored for the right arm so the same logical gesture looks physically
//! symmetric across a left/right pair.

use std::sync::Arc;
use std::time::Duration;

use carebot_hal::ArmGateway;
use carebot_types::{JointAngles, RobotId};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::supervisor::{sleep_cancellable, TaskExit};

/// Neutral "ready" pose the arm parks in between activities.
pub const READY_POSE: JointAngles = [90, 150, 20, 20, 90, 30];
/// Conservative all-neutral pose used by `init_pose`.
pub const NEUTRAL_POSE: JointAngles = [90, 90, 90, 90, 90, 90];

const HEART_POSE: JointAngles = [60, 48, 45, 20, 120, 180];
const HUG_OPEN_POSE: JointAngles = [90, 120, 20, 20, 70, 20];
const HUG_EMBRACE_POSE: JointAngles = [90, 160, 35, 35, 100, 40];

/// One step of a trajectory: a full-arm target, how long the servo
/// controller gets to reach it, and how long to dwell before the next step
/// (the dwell covers the move itself).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Waypoint {
    pub angles: JointAngles,
    pub move_ms: u32,
    pub dwell_ms: u64,
}

/// A named trajectory plus the outcome string reported on completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gesture {
    pub outcome: &'static str,
    pub waypoints: Vec<Waypoint>,
}

/// Reflect the pan-symmetric joints (base rotation and wrist roll) so a
/// right arm performs the left arm's trajectory as a mirror image.
fn mirrored(angles: JointAngles) -> JointAngles {
    let mut out = angles;
    out[0] = 180 - out[0];
    out[4] = 180 - out[4];
    out
}

fn oriented(side: RobotId, angles: JointAngles) -> JointAngles {
    match side {
        RobotId::Left => angles,
        RobotId::Right => mirrored(angles),
    }
}

/// Heart gesture: strike the pose, hold, return to ready.
pub fn make_heart(side: RobotId) -> Gesture {
    Gesture {
        outcome: "heart_completed",
        waypoints: vec![
            Waypoint {
                angles: oriented(side, HEART_POSE),
                move_ms: 2000,
                dwell_ms: 2000,
            },
            Waypoint {
                angles: oriented(side, READY_POSE),
                move_ms: 2000,
                dwell_ms: 2000,
            },
        ],
    }
}

/// Hug gesture: open slightly, embrace and hold, return to ready.
pub fn hug(side: RobotId) -> Gesture {
    Gesture {
        outcome: "hug_completed",
        waypoints: vec![
            Waypoint {
                angles: oriented(side, HUG_OPEN_POSE),
                move_ms: 1200,
                dwell_ms: 1200,
            },
            Waypoint {
                angles: oriented(side, HUG_EMBRACE_POSE),
                move_ms: 1500,
                // Move plus a short hold of the embrace.
                dwell_ms: 2300,
            },
            Waypoint {
                angles: oriented(side, READY_POSE),
                move_ms: 1200,
                dwell_ms: 1200,
            },
        ],
    }
}

/// Move every joint to neutral and settle. Identical on both arms.
pub fn init_pose() -> Gesture {
    Gesture {
        outcome: "init_completed",
        waypoints: vec![Waypoint {
            angles: NEUTRAL_POSE,
            move_ms: 1200,
            dwell_ms: 1500,
        }],
    }
}

/// Walk a gesture through the gateway. The cancellation token is polled
/// before each waypoint and during each dwell, never mid-write.
pub async fn run_gesture(
    gateway: Arc<ArmGateway>,
    gesture: Gesture,
    time_scale: f32,
    token: CancellationToken,
) -> TaskExit {
    let scale = |ms: u64| -> u64 { ((ms as f32) * time_scale).max(1.0) as u64 };

    for (step, wp) in gesture.waypoints.iter().enumerate() {
        if token.is_cancelled() {
            return TaskExit::Cancelled;
        }
        debug!(step, angles = ?wp.angles, "gesture waypoint");
        if let Err(err) = gateway
            .write_all(wp.angles, scale(wp.move_ms as u64) as u32)
            .await
        {
            error!(step, %err, "gesture write failed");
            return TaskExit::Failed("hardware_io".to_string());
        }
        if !sleep_cancellable(&token, Duration::from_millis(scale(wp.dwell_ms))).await {
            return TaskExit::Cancelled;
        }
    }
    TaskExit::Completed(gesture.outcome.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use carebot_hal::{RetryPolicy, SimArm, SimArmHandle};

    fn gateway() -> (Arc<ArmGateway>, SimArmHandle) {
        let (arm, handle) = SimArm::new();
        (
            Arc::new(ArmGateway::new(Box::new(arm), RetryPolicy::default())),
            handle,
        )
    }

    #[test]
    fn right_arm_gestures_are_mirrored() {
        let left = make_heart(RobotId::Left);
        let right = make_heart(RobotId::Right);
        let l = left.waypoints[0].angles;
        let r = right.waypoints[0].angles;
        assert_eq!(r[0], 180 - l[0]);
        assert_eq!(r[4], 180 - l[4]);
        // Non-pan joints are shared.
        assert_eq!(r[1], l[1]);
        assert_eq!(r[2], l[2]);
        assert_eq!(r[3], l[3]);
        assert_eq!(r[5], l[5]);
    }

    #[test]
    fn gestures_end_at_a_rest_pose() {
        assert_eq!(make_heart(RobotId::Left).waypoints.last().unwrap().angles, READY_POSE);
        assert_eq!(hug(RobotId::Left).waypoints.last().unwrap().angles, READY_POSE);
        assert_eq!(init_pose().waypoints.last().unwrap().angles, NEUTRAL_POSE);
    }

    #[tokio::test(start_paused = true)]
    async fn gesture_runs_to_completion() {
        let (gw, handle) = gateway();
        let exit = run_gesture(
            Arc::clone(&gw),
            hug(RobotId::Left),
            0.01,
            CancellationToken::new(),
        )
        .await;
        assert_eq!(exit, TaskExit::Completed("hug_completed".to_string()));
        assert_eq!(handle.angles(), READY_POSE);
        assert_eq!(handle.write_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn pre_cancelled_gesture_never_touches_the_arm() {
        let (gw, handle) = gateway();
        let token = CancellationToken::new();
        token.cancel();
        let exit = run_gesture(Arc::clone(&gw), init_pose(), 1.0, token).await;
        assert_eq!(exit, TaskExit::Cancelled);
        assert_eq!(handle.write_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn write_failure_surfaces_hardware_io() {
        let (gw, handle) = gateway();
        // More failures than the retry budget covers.
        handle.fail_next_writes(10);
        let exit = run_gesture(
            Arc::clone(&gw),
            init_pose(),
            0.01,
            CancellationToken::new(),
        )
        .await;
        assert_eq!(exit, TaskExit::Failed("hardware_io".to_string()));
    }
}
