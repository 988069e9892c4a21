//! Blocking driver trait for a 6-servo serial arm.
//!
//! Drivers implement this trait; everything above them goes through the
//! [`ArmGateway`][crate::gateway::ArmGateway], which serializes access and
//! retries transient failures. A real driver wraps the vendor serial
//! protocol; [`SimArm`][crate::sim::SimArm] provides an in-process stand-in.

use carebot_types::{CarebotError, JointAngles, JointId};

/// A position-controlled 6-joint arm reachable over a serial bus.
///
/// All calls are blocking and may fail transiently; callers are expected to
/// hold exclusive access for the span of one call and to retry on failure.
pub trait ArmDevice: Send {
    /// Command a single joint to `angle` degrees over `time_ms` milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`CarebotError::HardwareIo`] when the serial write fails.
    fn write_joint(&mut self, id: JointId, angle: u8, time_ms: u32) -> Result<(), CarebotError>;

    /// Command all six joints at once.
    ///
    /// # Errors
    ///
    /// Returns [`CarebotError::HardwareIo`] when the serial write fails.
    fn write_all(&mut self, angles: JointAngles, time_ms: u32) -> Result<(), CarebotError>;

    /// Read back the current angle of a single joint.
    ///
    /// # Errors
    ///
    /// Returns [`CarebotError::HardwareIo`] when the read fails or times out.
    fn read_joint(&mut self, id: JointId) -> Result<u8, CarebotError>;

    /// Read back all six joint angles.
    ///
    /// # Errors
    ///
    /// Returns [`CarebotError::HardwareIo`] when any read fails.
    fn read_all(&mut self) -> Result<JointAngles, CarebotError>;
}
