//! In-process simulated arm for CI and headless runs.
//!
//! [`SimArm`] records commanded angles and can be told to fail its next N
//! writes, which lets tests exercise the gateway's retry path without any
//! physical hardware. The paired [`SimArmHandle`] shares state with the
//! driver so tests can inject faults and inspect positions while the
//! gateway owns the driver box.

use std::sync::{Arc, Mutex};

use carebot_types::{CarebotError, JointAngles, JointId};

use crate::arm::ArmDevice;

#[derive(Debug)]
struct SimState {
    angles: JointAngles,
    pending_write_failures: u32,
    pending_read_failures: u32,
    write_count: u64,
}

/// Simulated 6-joint arm. Starts at 90 degrees on every joint.
pub struct SimArm {
    state: Arc<Mutex<SimState>>,
}

/// Test-side handle to a [`SimArm`]'s shared state.
#[derive(Clone)]
pub struct SimArmHandle {
    state: Arc<Mutex<SimState>>,
}

impl SimArm {
    /// Create a simulated arm and its inspection handle.
    pub fn new() -> (SimArm, SimArmHandle) {
        let state = Arc::new(Mutex::new(SimState {
            angles: [90; 6],
            pending_write_failures: 0,
            pending_read_failures: 0,
            write_count: 0,
        }));
        (
            SimArm {
                state: Arc::clone(&state),
            },
            SimArmHandle { state },
        )
    }
}

impl ArmDevice for SimArm {
    fn write_joint(&mut self, id: JointId, angle: u8, _time_ms: u32) -> Result<(), CarebotError> {
        let mut st = self.state.lock().expect("sim arm state poisoned");
        if st.pending_write_failures > 0 {
            st.pending_write_failures -= 1;
            return Err(CarebotError::hardware("sim_arm", "injected write fault"));
        }
        st.angles[id.index()] = angle;
        st.write_count += 1;
        Ok(())
    }

    fn write_all(&mut self, angles: JointAngles, _time_ms: u32) -> Result<(), CarebotError> {
        let mut st = self.state.lock().expect("sim arm state poisoned");
        if st.pending_write_failures > 0 {
            st.pending_write_failures -= 1;
            return Err(CarebotError::hardware("sim_arm", "injected write fault"));
        }
        st.angles = angles;
        st.write_count += 1;
        Ok(())
    }

    fn read_joint(&mut self, id: JointId) -> Result<u8, CarebotError> {
        let mut st = self.state.lock().expect("sim arm state poisoned");
        if st.pending_read_failures > 0 {
            st.pending_read_failures -= 1;
            return Err(CarebotError::hardware("sim_arm", "injected read fault"));
        }
        Ok(st.angles[id.index()])
    }

    fn read_all(&mut self) -> Result<JointAngles, CarebotError> {
        let mut st = self.state.lock().expect("sim arm state poisoned");
        if st.pending_read_failures > 0 {
            st.pending_read_failures -= 1;
            return Err(CarebotError::hardware("sim_arm", "injected read fault"));
        }
        Ok(st.angles)
    }
}

impl SimArmHandle {
    /// Make the next `n` writes fail with a hardware fault.
    pub fn fail_next_writes(&self, n: u32) {
        self.state
            .lock()
            .expect("sim arm state poisoned")
            .pending_write_failures = n;
    }

    /// Make the next `n` reads fail with a hardware fault.
    pub fn fail_next_reads(&self, n: u32) {
        self.state
            .lock()
            .expect("sim arm state poisoned")
            .pending_read_failures = n;
    }

    /// Current simulated joint angles.
    pub fn angles(&self) -> JointAngles {
        self.state.lock().expect("sim arm state poisoned").angles
    }

    /// Total number of successful writes so far.
    pub fn write_count(&self) -> u64 {
        self.state
            .lock()
            .expect("sim arm state poisoned")
            .write_count
    }
}
