//! The engine proper: inbound command loop, preemption, dispatch.
//!
//! One engine instance owns one robot identity. Envelopes arrive on an
//! mpsc queue from the transport collaborator; events leave through the
//! [`Emitter`]. Ordering guarantees: a preempted task's terminal event is
//! emitted before the new command's `ack`, and per command `ack` precedes
//! `progress` precedes the terminal `result`.

use std::sync::Arc;

use carebot_hal::{ArmGateway, FaceDetector};
use carebot_types::{clamp_angle, CommandEnvelope, JointId};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::emitter::Emitter;
use crate::gestures;
use crate::router::{route, RobotCommand, Routing};
use crate::supervisor::{TaskExit, TaskKind, TaskSupervisor};
use crate::tracking::FaceTracker;

/// What this agent announces in its `hello` event.
pub const CAPABILITIES: [&str; 5] = [
    "face_tracking",
    "make_heart",
    "hug",
    "init_pose",
    "manual_control",
];

pub struct Engine {
    cfg: EngineConfig,
    emitter: Emitter,
    gateway: Arc<ArmGateway>,
    detector: Arc<Mutex<Box<dyn FaceDetector>>>,
    supervisor: TaskSupervisor,
}

impl Engine {
    pub fn new(
        cfg: EngineConfig,
        gateway: Arc<ArmGateway>,
        detector: Box<dyn FaceDetector>,
        emitter: Emitter,
    ) -> Self {
        let supervisor = TaskSupervisor::new(emitter.clone());
        Self {
            cfg,
            emitter,
            gateway,
            detector: Arc::new(Mutex::new(detector)),
            supervisor,
        }
    }

    /// Consume envelopes until the queue closes or `shutdown` fires, then
    /// wind down the active task.
    pub async fn run(
        mut self,
        mut rx: mpsc::UnboundedReceiver<CommandEnvelope>,
        shutdown: CancellationToken,
    ) {
        info!(identity = %self.cfg.identity, "engine running");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                envelope = rx.recv() => match envelope {
                    Some(envelope) => self.handle(envelope).await,
                    None => break,
                },
            }
        }
        self.supervisor.preempt().await;
        info!(identity = %self.cfg.identity, "engine stopped");
    }

    /// Route and dispatch one envelope.
    pub async fn handle(&mut self, envelope: CommandEnvelope) {
        match route(self.cfg.identity, &envelope) {
            Routing::Drop(reason) => {
                debug!(?reason, command = %envelope.command, "envelope dropped");
            }
            Routing::Reject { error, command } => {
                debug!(error, command = ?command, "envelope rejected");
                self.emitter.error(error, command.as_deref());
            }
            Routing::Dispatch { name, command } => self.dispatch(name, command).await,
        }
    }

    async fn dispatch(&mut self, name: String, command: RobotCommand) {
        // Preempt first: the cancelled task's terminal event must land
        // before this command's ack.
        let preempted = self.supervisor.preempt().await;
        self.emitter.ack(&name);
        info!(command = %name, preempted = ?preempted, "dispatching");

        match command {
            RobotCommand::StopFaceTracking => {
                // Stop is its own command; stopping an idle tracker is a
                // no-op, never an error.
                let outcome = if preempted == Some(TaskKind::Tracking) {
                    "stopped"
                } else {
                    "not_running"
                };
                self.emitter.result_completed(&name, outcome);
            }

            RobotCommand::FaceTracking => {
                let tracker = FaceTracker::new(
                    Arc::clone(&self.gateway),
                    Arc::clone(&self.detector),
                    self.emitter.clone(),
                    self.cfg.tracking.clone(),
                );
                self.supervisor
                    .start(&name, TaskKind::Tracking, |token| tracker.run(token));
            }

            RobotCommand::MakeHeart => {
                self.start_gesture(&name, gestures::make_heart(self.cfg.identity));
            }
            RobotCommand::Hug => {
                self.start_gesture(&name, gestures::hug(self.cfg.identity));
            }
            RobotCommand::InitPose => {
                self.start_gesture(&name, gestures::init_pose());
            }

            RobotCommand::SetJoint { id, angle, time_ms } => {
                let gateway = Arc::clone(&self.gateway);
                self.supervisor
                    .start(&name, TaskKind::ManualMove, move |_token| async move {
                        match gateway.write_joint(id, angle, time_ms).await {
                            Ok(_) => TaskExit::Completed("ok".to_string()),
                            Err(_) => TaskExit::Failed("hardware_io".to_string()),
                        }
                    });
            }

            RobotCommand::SetJoints { angles, time_ms } => {
                let gateway = Arc::clone(&self.gateway);
                self.supervisor
                    .start(&name, TaskKind::ManualMove, move |_token| async move {
                        match gateway.write_all(angles, time_ms).await {
                            Ok(_) => TaskExit::Completed("ok".to_string()),
                            Err(_) => TaskExit::Failed("hardware_io".to_string()),
                        }
                    });
            }

            RobotCommand::NudgeJoint { id, delta, time_ms } => {
                let gateway = Arc::clone(&self.gateway);
                self.supervisor
                    .start(&name, TaskKind::ManualMove, move |_token| async move {
                        nudge(gateway, id, delta, time_ms).await
                    });
            }
        }
    }

    fn start_gesture(&mut self, name: &str, gesture: gestures::Gesture) {
        let gateway = Arc::clone(&self.gateway);
        let scale = self.cfg.gesture_time_scale;
        self.supervisor.start(name, TaskKind::Gesture, move |token| {
            gestures::run_gesture(gateway, gesture, scale, token)
        });
    }
}

/// Read-modify-write for nudge: if the current angle cannot be read, do not
/// move at all.
async fn nudge(
    gateway: Arc<ArmGateway>,
    id: JointId,
    delta: i32,
    time_ms: u32,
) -> TaskExit {
    let current = match gateway.read_joint(id).await {
        Ok(angle) => angle,
        Err(_) => return TaskExit::Failed("hardware_io".to_string()),
    };
    let target = clamp_angle(current as i64 + delta as i64);
    match gateway.write_joint(id, target, time_ms).await {
        Ok(_) => TaskExit::Completed("ok".to_string()),
        Err(_) => TaskExit::Failed("hardware_io".to_string()),
    }
}
