//! Periodic `joint_state` publisher.
//!
//! Runs beside the supervisor, never preempted by commands. Each tick
//! snapshots the joint register; near-duplicate snapshots are suppressed,
//! but a forced keep-alive bounds how stale observers can get. Stops only
//! on process shutdown.

use std::sync::Arc;
use std::time::Duration;

use carebot_hal::ArmGateway;
use carebot_types::{JointAngles, OutgoingEvent};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::TelemetryConfig;
use crate::emitter::Emitter;
use crate::supervisor::sleep_cancellable;

pub struct TelemetryPublisher {
    gateway: Arc<ArmGateway>,
    emitter: Emitter,
    cfg: TelemetryConfig,
}

impl TelemetryPublisher {
    pub fn new(gateway: Arc<ArmGateway>, emitter: Emitter, cfg: TelemetryConfig) -> Self {
        Self {
            gateway,
            emitter,
            cfg,
        }
    }

    /// Publish until `shutdown` fires.
    pub async fn run(self, shutdown: CancellationToken) {
        let interval = Duration::from_millis(self.cfg.interval_ms.max(50));
        let keepalive = Duration::from_millis(self.cfg.keepalive_ms);
        let mut last_emitted: Option<JointAngles> = None;
        let mut last_emit_at = Instant::now();

        loop {
            if !sleep_cancellable(&shutdown, interval).await {
                debug!("telemetry publisher stopping");
                return;
            }

            let snap = self.gateway.snapshot().await;
            let forced = last_emit_at.elapsed() >= keepalive;
            let changed = match last_emitted {
                None => true,
                Some(prev) => Self::max_delta(prev, snap.angles) >= self.cfg.min_delta_deg,
            };

            if changed || forced {
                self.emitter.emit(OutgoingEvent::JointState {
                    angles: snap.angles,
                    seq: snap.seq,
                });
                last_emitted = Some(snap.angles);
                last_emit_at = Instant::now();
            }
        }
    }

    fn max_delta(a: JointAngles, b: JointAngles) -> u8 {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| x.abs_diff(*y))
            .max()
            .unwrap_or(0)
    }
}
