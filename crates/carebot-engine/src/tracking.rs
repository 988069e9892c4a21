//! Camera-driven closed-loop face tracking.
//!
//! A long-running task started by `face_tracking` and ended by
//! `stop_face_tracking` or by preemption. Each cycle samples the external
//! detector, runs one PID controller per axis, and issues a bounded move
//! through the gateway. Losing the face is not an error: the loop keeps
//! emitting `detected:false` until a face reappears or it is cancelled.
//! The cancellation token is polled at the top of each cycle and during the
//! inter-cycle sleep; the loop exits silently, leaving the terminal result
//! event to its task wrapper.

use std::sync::Arc;

use carebot_hal::{ArmGateway, FaceDetector, PidController};
use carebot_types::{Bbox, JointAngles, OutgoingEvent};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::config::TrackingConfig;
use crate::emitter::Emitter;
use crate::supervisor::{sleep_cancellable, TaskExit};

/// Initial pan/tilt targets before the first detection.
const INITIAL_PAN_DEG: f32 = 90.0;
const INITIAL_TILT_DEG: f32 = 90.0;

/// One face-tracking session.
pub struct FaceTracker {
    gateway: Arc<ArmGateway>,
    detector: Arc<Mutex<Box<dyn FaceDetector>>>,
    emitter: Emitter,
    cfg: TrackingConfig,
}

impl FaceTracker {
    pub fn new(
        gateway: Arc<ArmGateway>,
        detector: Arc<Mutex<Box<dyn FaceDetector>>>,
        emitter: Emitter,
        cfg: TrackingConfig,
    ) -> Self {
        Self {
            gateway,
            detector,
            emitter,
            cfg,
        }
    }

    /// Run until cancelled. Only a gateway failure (retry budget exhausted)
    /// ends the session with an error.
    pub async fn run(self, token: CancellationToken) -> TaskExit {
        let interval = self.cfg.interval();
        let dt = interval.as_secs_f32();
        let limit = self.cfg.max_step_deg;

        let mut pan_pid =
            PidController::new(self.cfg.pan.kp, self.cfg.pan.ki, self.cfg.pan.kd)
                .with_output_limits(-limit, limit);
        let mut tilt_pid =
            PidController::new(self.cfg.tilt.kp, self.cfg.tilt.ki, self.cfg.tilt.kd)
                .with_output_limits(-limit, limit);

        let mut pan = INITIAL_PAN_DEG;
        let mut tilt = INITIAL_TILT_DEG;
        let mut last_sent: Option<JointAngles> = None;

        loop {
            if token.is_cancelled() {
                return TaskExit::Cancelled;
            }

            let sample = { self.detector.lock().await.sample() };
            match sample.bbox.filter(|_| sample.detected) {
                None => {
                    // Face lost: hold position, drop controller memory so the
                    // reacquired face starts from a clean error history.
                    pan_pid.reset();
                    tilt_pid.reset();
                    self.emitter.emit(OutgoingEvent::FaceTracking {
                        status: "running".to_string(),
                        detected: false,
                        bbox: None,
                        joints: None,
                    });
                }
                Some(bbox) => {
                    let (cx, cy) = bbox.center();
                    let center_x = self.cfg.frame_width as f32 / 2.0;
                    let center_y = self.cfg.frame_height as f32 / 2.0;

                    let err_x = center_x - cx;
                    if err_x.abs() > self.cfg.deadzone_px {
                        pan = (pan + pan_pid.step(err_x, dt)).clamp(0.0, 180.0);
                    }
                    let err_y = center_y - cy;
                    if err_y.abs() > self.cfg.deadzone_px {
                        tilt = (tilt + tilt_pid.step(err_y, dt)).clamp(0.0, 180.0);
                    }

                    // Tilt is split across the two lift joints.
                    let lift = (tilt / 2.0).round() as u8;
                    let joints: JointAngles =
                        [pan.round() as u8, 135, lift, lift, 90, 30];

                    if self.should_send(last_sent, joints) {
                        if let Err(err) =
                            self.gateway.write_all(joints, self.cfg.move_time_ms).await
                        {
                            error!(%err, "tracking write failed");
                            return TaskExit::Failed("hardware_io".to_string());
                        }
                        last_sent = Some(joints);
                    } else {
                        debug!(?joints, "tracking move suppressed (below threshold)");
                    }

                    self.emitter.emit(OutgoingEvent::FaceTracking {
                        status: "running".to_string(),
                        detected: true,
                        bbox: Some(bbox),
                        joints: Some(joints),
                    });
                }
            }

            if !sleep_cancellable(&token, interval).await {
                return TaskExit::Cancelled;
            }
        }
    }

    /// Suppress writes whose largest per-joint change is below the
    /// configured threshold, to keep the servos from chattering.
    fn should_send(&self, last: Option<JointAngles>, next: JointAngles) -> bool {
        match last {
            None => true,
            Some(prev) => prev
                .iter()
                .zip(next.iter())
                .any(|(a, b)| a.abs_diff(*b) >= self.cfg.min_angle_delta),
        }
    }
}

/// Helper for tests and the engine: box a detector behind the shared lock.
pub fn shared_detector(detector: Box<dyn FaceDetector>) -> Arc<Mutex<Box<dyn FaceDetector>>> {
    Arc::new(Mutex::new(detector))
}
