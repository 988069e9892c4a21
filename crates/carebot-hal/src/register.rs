//! [`JointRegister`] – the in-memory authoritative snapshot of the arm.
//!
//! Owned by the [`ArmGateway`][crate::gateway::ArmGateway] and mutated only
//! on its successful write path; every other component (telemetry, the
//! tracking loop's next cycle) reads a consistent [`JointState`] copy.

use carebot_types::{JointAngles, JointId, JointState};

/// Last known/commanded angle of each joint plus a write sequence number.
#[derive(Debug, Clone)]
pub struct JointRegister {
    angles: JointAngles,
    seq: u64,
}

impl JointRegister {
    /// Start the register at the given pose with sequence zero.
    pub fn new(initial: JointAngles) -> Self {
        Self {
            angles: initial,
            seq: 0,
        }
    }

    /// Record a successful full-arm write. Returns the new sequence number.
    pub fn record_all(&mut self, angles: JointAngles) -> u64 {
        self.angles = angles;
        self.seq += 1;
        self.seq
    }

    /// Record a successful single-joint write. Returns the new sequence number.
    pub fn record_joint(&mut self, id: JointId, angle: u8) -> u64 {
        self.angles[id.index()] = angle;
        self.seq += 1;
        self.seq
    }

    /// Overwrite the angle vector from a hardware read-back without bumping
    /// the sequence number (reads observe state, they do not command it).
    pub fn sync(&mut self, angles: JointAngles) {
        self.angles = angles;
    }

    /// Consistent snapshot for readers.
    pub fn snapshot(&self) -> JointState {
        JointState {
            angles: self.angles,
            seq: self.seq,
        }
    }
}

impl Default for JointRegister {
    fn default() -> Self {
        Self::new([90; 6])
    }
}
