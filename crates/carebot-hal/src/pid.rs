//! Generic PID (Proportional–Integral–Derivative) controller.
//!
//! Used by the face-tracking loop with one instance per axis (pan, tilt).
//! The controller is hardware-agnostic: the caller supplies the current
//! error and the elapsed time, and applies the returned correction to
//! whatever actuator it drives.

/// A tunable PID controller operating directly on an error signal.
///
/// Output limits clamp both the correction and the integral accumulator
/// (anti-windup).
#[derive(Debug, Clone)]
pub struct PidController {
    kp: f32,
    ki: f32,
    kd: f32,
    integral: f32,
    last_error: Option<f32>,
    output_min: f32,
    output_max: f32,
}

impl PidController {
    /// Create a controller with the given gains and unclamped output.
    pub fn new(kp: f32, ki: f32, kd: f32) -> Self {
        Self {
            kp,
            ki,
            kd,
            integral: 0.0,
            last_error: None,
            output_min: f32::NEG_INFINITY,
            output_max: f32::INFINITY,
        }
    }

    /// Clamp the controller output to `[min, max]`. Integral wind-up is
    /// clamped to the same range.
    pub fn with_output_limits(mut self, min: f32, max: f32) -> Self {
        self.output_min = min;
        self.output_max = max;
        self
    }

    /// Compute the next correction for the given `error` (set-point minus
    /// measurement) after `dt` seconds.
    ///
    /// Returns `0.0` without updating internal state if `dt` is not positive.
    pub fn step(&mut self, error: f32, dt: f32) -> f32 {
        if dt <= 0.0 {
            return 0.0;
        }

        let p = self.kp * error;

        self.integral += error * dt;
        let i = (self.ki * self.integral).clamp(self.output_min, self.output_max);
        if self.ki.abs() > f32::EPSILON {
            // Back-calculate so the accumulator cannot grow past the limits.
            self.integral = i / self.ki;
        }

        let d = match self.last_error {
            Some(prev) => self.kd * (error - prev) / dt,
            None => 0.0,
        };
        self.last_error = Some(error);

        (p + i + d).clamp(self.output_min, self.output_max)
    }

    /// Drop the integral accumulator and derivative memory, e.g. when the
    /// tracked face is lost and reacquired.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_error = None;
    }
}
