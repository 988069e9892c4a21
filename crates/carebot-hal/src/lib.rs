//! `carebot-hal` – hardware abstraction for the arm controller.
//!
//! The rest of the system only ever talks to the traits defined here, so the
//! vendor serial driver and the vision detector can be swapped without
//! touching dispatch or tracking logic.
//!
//! # Modules
//!
//! - [`arm`] – the blocking [`ArmDevice`] driver trait.
//! - [`sim`] – in-process simulated arm with fault injection for headless
//!   tests and CI.
//! - [`register`] – the authoritative [`JointRegister`] snapshot.
//! - [`gateway`] – [`ArmGateway`], the single owner of the serial resource:
//!   one exclusive lock, bounded retries.
//! - [`pid`] – generic PID controller used by the face-tracking loop.
//! - [`detector`] – the [`FaceDetector`] trait and stub detectors.

pub mod arm;
pub mod detector;
pub mod gateway;
pub mod pid;
pub mod register;
pub mod sim;

pub use arm::ArmDevice;
pub use detector::{FaceDetector, NullDetector, ScriptedDetector};
pub use gateway::{ArmGateway, RetryPolicy};
pub use pid::PidController;
pub use register::JointRegister;
pub use sim::{SimArm, SimArmHandle};
