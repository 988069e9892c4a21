//! [`ArmGateway`] – single owner of the serial arm resource.
//!
//! All physical reads and writes from every caller (gesture execution,
//! manual control, the tracking loop, telemetry) funnel through one async
//! mutex, so concurrent tasks can never interleave partial serial
//! transactions. Each operation is attempted up to a bounded retry budget
//! with a fixed backoff; the backoff sleep happens with the lock released,
//! and the lock is never held across a cancellation check.
//!
//! On a successful write the [`JointRegister`] is updated under the same
//! lock hold, so the register and the hardware never disagree about what
//! was last commanded.

use std::time::Duration;

use carebot_types::{CarebotError, JointAngles, JointId, JointState};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::arm::ArmDevice;
use crate::register::JointRegister;

/// Bounded retry policy for serial operations.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure (total attempts = retries + 1).
    pub retries: u32,
    /// Fixed pause between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            backoff: Duration::from_millis(50),
        }
    }
}

struct GatewayInner {
    device: Box<dyn ArmDevice>,
    register: JointRegister,
}

/// Serialized, retrying front door to the physical arm.
pub struct ArmGateway {
    inner: Mutex<GatewayInner>,
    policy: RetryPolicy,
}

impl ArmGateway {
    pub fn new(device: Box<dyn ArmDevice>, policy: RetryPolicy) -> Self {
        Self {
            inner: Mutex::new(GatewayInner {
                device,
                register: JointRegister::default(),
            }),
            policy,
        }
    }

    /// Command one joint. Returns the register sequence number of the write.
    ///
    /// # Errors
    ///
    /// Returns [`CarebotError::HardwareIo`] after the retry budget is
    /// exhausted; the register is left unchanged in that case.
    pub async fn write_joint(
        &self,
        id: JointId,
        angle: u8,
        time_ms: u32,
    ) -> Result<u64, CarebotError> {
        self.with_retry("write_joint", |inner| {
            inner.device.write_joint(id, angle, time_ms)?;
            Ok(inner.register.record_joint(id, angle))
        })
        .await
    }

    /// Command all six joints. Returns the register sequence number.
    ///
    /// # Errors
    ///
    /// Returns [`CarebotError::HardwareIo`] after the retry budget is
    /// exhausted; the register is left unchanged in that case.
    pub async fn write_all(
        &self,
        angles: JointAngles,
        time_ms: u32,
    ) -> Result<u64, CarebotError> {
        self.with_retry("write_all", |inner| {
            inner.device.write_all(angles, time_ms)?;
            Ok(inner.register.record_all(angles))
        })
        .await
    }

    /// Read back one joint angle from the hardware.
    pub async fn read_joint(&self, id: JointId) -> Result<u8, CarebotError> {
        self.with_retry("read_joint", |inner| inner.device.read_joint(id))
            .await
    }

    /// Read back all joint angles and refresh the register's angle vector
    /// (without bumping its sequence number).
    pub async fn read_all(&self) -> Result<JointAngles, CarebotError> {
        self.with_retry("read_all", |inner| {
            let angles = inner.device.read_all()?;
            inner.register.sync(angles);
            Ok(angles)
        })
        .await
    }

    /// Snapshot the joint register without touching the hardware.
    pub async fn snapshot(&self) -> JointState {
        self.inner.lock().await.register.snapshot()
    }

    /// Run `op` under the gateway lock, retrying per the policy. The lock is
    /// acquired per attempt and released before any backoff sleep.
    async fn with_retry<T>(
        &self,
        what: &str,
        mut op: impl FnMut(&mut GatewayInner) -> Result<T, CarebotError>,
    ) -> Result<T, CarebotError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let result = {
                let mut inner = self.inner.lock().await;
                op(&mut inner)
            };
            match result {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(op = what, attempt, "arm operation recovered after retry");
                    }
                    return Ok(value);
                }
                Err(err) if attempt <= self.policy.retries => {
                    warn!(op = what, attempt, %err, "arm operation failed, retrying");
                    tokio::time::sleep(self.policy.backoff).await;
                }
                Err(err) => {
                    warn!(op = what, attempt, %err, "arm operation failed, budget exhausted");
                    return Err(err);
                }
            }
        }
    }
}
