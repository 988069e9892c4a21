//! `carebot-engine` – command dispatch and preemption engine.
//!
//! Receives parsed [`CommandEnvelope`][carebot_types::CommandEnvelope]s from
//! a transport collaborator, preempts whatever the arm is currently doing,
//! and emits the ordered ack/progress/result/error event sequence while the
//! new unit of work (a gesture, a manual move, or the face-tracking loop)
//! runs against the [`ArmGateway`][carebot_hal::ArmGateway].
//!
//! # Modules
//!
//! - [`router`] – envelope scoping, alias resolution, payload validation.
//! - [`supervisor`] – the at-most-one-active-task preemption controller.
//! - [`gestures`] – fixed waypoint trajectories (heart, hug, init pose).
//! - [`tracking`] – the cancellable PID face-tracking loop.
//! - [`telemetry`] – periodic `joint_state` publisher with change
//!   suppression and forced keep-alive.
//! - [`emitter`] – event stamping and broadcast fan-out.
//! - [`config`] – tunable engine parameters.
//! - [`engine`] – the wiring that runs the inbound command loop.

pub mod config;
pub mod emitter;
pub mod engine;
pub mod gestures;
pub mod router;
pub mod supervisor;
pub mod telemetry;
pub mod tracking;

pub use config::{EngineConfig, PidGains, TelemetryConfig, TrackingConfig};
pub use emitter::Emitter;
pub use engine::{Engine, CAPABILITIES};
pub use router::{route, RobotCommand, Routing};
pub use supervisor::{TaskExit, TaskKind, TaskSupervisor};
pub use telemetry::TelemetryPublisher;
pub use tracking::FaceTracker;
