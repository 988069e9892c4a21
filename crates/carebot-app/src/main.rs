//! `carebot` – robotic-arm command agent.
//!
//! Wires the whole stack together:
//!
//! 1. Load `carebot.toml` (every field defaulted, `CAREBOT_*` overrides).
//! 2. Build the actuator gateway over the simulated arm and a null face
//!    detector, then park the arm in the safe ready pose. Real hardware
//!    swaps in its own [`ArmDevice`] and [`FaceDetector`] implementations
//!    here.
//! 3. Announce `hello`, start the telemetry publisher and the WebSocket
//!    bridge, then hand the command queue to the engine.
//! 4. Ctrl-C cancels the shared shutdown token; the engine winds down any
//!    active task before exiting.

mod config;
mod logging;

use std::sync::Arc;

use carebot_engine::gestures::READY_POSE;
use carebot_engine::{Emitter, Engine, TelemetryPublisher, CAPABILITIES};
use carebot_hal::{ArmGateway, NullDetector, SimArm};
use carebot_types::CarebotError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Duration handed to the servo controller for the startup move.
const READY_POSE_TIME_MS: u32 = 1500;

/// Park the arm in the safe ready pose. Best-effort: a hardware fault here
/// is logged and the process keeps starting, so a flaky serial link does
/// not prevent the agent from coming up and serving commands.
async fn park_ready(gateway: &ArmGateway) {
    if let Err(e) = gateway.write_all(READY_POSE, READY_POSE_TIME_MS).await {
        warn!(error = %e, "startup ready pose failed");
    }
}

#[tokio::main]
async fn main() -> Result<(), CarebotError> {
    logging::init_tracing();

    let cfg = config::load()?;
    info!(robot_id = %cfg.robot_id, ws_port = cfg.ws_port, "starting");

    let (arm, _arm_handle) = SimArm::new();
    let gateway = Arc::new(ArmGateway::new(Box::new(arm), cfg.retry.policy()));
    park_ready(&gateway).await;
    let emitter = Emitter::new(cfg.robot_id);

    let shutdown = CancellationToken::new();

    let telemetry = TelemetryPublisher::new(
        Arc::clone(&gateway),
        emitter.clone(),
        cfg.telemetry.clone(),
    );
    tokio::spawn(telemetry.run(shutdown.clone()));

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let bridge = carebot_bridge::BridgeServer::new(emitter.clone(), command_tx)
        .with_port(cfg.ws_port);
    let bridge_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = bridge.run(bridge_shutdown).await {
            error!(error = %e, "bridge failed");
        }
    });

    // Broadcast hello once at startup; the bridge repeats it per connection.
    emitter.hello(&CAPABILITIES);

    let engine = Engine::new(
        cfg.engine_config(),
        gateway,
        Box::new(NullDetector),
        emitter,
    );
    let engine_shutdown = shutdown.clone();
    let engine_task = tokio::spawn(engine.run(command_rx, engine_shutdown));

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| CarebotError::Channel(format!("signal handler: {e}")))?;
    info!("shutdown requested");
    shutdown.cancel();
    engine_task
        .await
        .map_err(|e| CarebotError::Channel(format!("engine task: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use carebot_hal::RetryPolicy;

    #[tokio::test(start_paused = true)]
    async fn first_write_after_boot_is_the_ready_pose() {
        let (arm, handle) = SimArm::new();
        let gateway = ArmGateway::new(Box::new(arm), RetryPolicy::default());

        park_ready(&gateway).await;

        assert_eq!(handle.write_count(), 1);
        assert_eq!(handle.angles(), READY_POSE);
        assert_eq!(gateway.snapshot().await.angles, READY_POSE);
    }

    #[tokio::test(start_paused = true)]
    async fn startup_survives_a_dead_arm() {
        let (arm, handle) = SimArm::new();
        let gateway = ArmGateway::new(Box::new(arm), RetryPolicy::default());
        handle.fail_next_writes(10);

        // Does not propagate the fault; startup continues.
        park_ready(&gateway).await;
        assert_eq!(handle.write_count(), 0);
        assert_eq!(gateway.snapshot().await.seq, 0);
    }
}
