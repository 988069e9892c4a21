//! [`FaceDetector`] trait and stub detectors.
//!
//! The engine consumes only the per-frame detection result; image capture
//! and the actual vision pipeline live behind this trait. Sampling never
//! fails: a missing camera or empty frame is reported as "not detected",
//! and the tracking loop keeps running.

use std::collections::VecDeque;

use carebot_types::TrackingSample;

/// One-face-per-frame detector.
pub trait FaceDetector: Send {
    /// Produce the detection result for the next frame.
    fn sample(&mut self) -> TrackingSample;
}

/// Detector stand-in that never sees a face. Used when no camera is
/// configured, mirroring the "detector unavailable" policy.
#[derive(Debug, Default)]
pub struct NullDetector;

impl FaceDetector for NullDetector {
    fn sample(&mut self) -> TrackingSample {
        TrackingSample::not_detected()
    }
}

/// Detector that replays a fixed script of samples, then repeats the last
/// one. Used by tests to drive the tracking loop deterministically.
#[derive(Debug, Default)]
pub struct ScriptedDetector {
    script: VecDeque<TrackingSample>,
    last: Option<TrackingSample>,
}

impl ScriptedDetector {
    pub fn new(samples: impl IntoIterator<Item = TrackingSample>) -> Self {
        Self {
            script: samples.into_iter().collect(),
            last: None,
        }
    }
}

impl FaceDetector for ScriptedDetector {
    fn sample(&mut self) -> TrackingSample {
        match self.script.pop_front() {
            Some(sample) => {
                self.last = Some(sample);
                sample
            }
            None => self.last.unwrap_or_else(TrackingSample::not_detected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carebot_types::Bbox;

    #[test]
    fn null_detector_never_detects() {
        let mut det = NullDetector;
        assert!(!det.sample().detected);
    }

    #[test]
    fn scripted_detector_replays_then_repeats() {
        let face = TrackingSample::face(Bbox {
            x: 300,
            y: 200,
            w: 40,
            h: 40,
        });
        let mut det =
            ScriptedDetector::new([TrackingSample::not_detected(), face]);
        assert!(!det.sample().detected);
        assert!(det.sample().detected);
        // Script exhausted: keeps returning the last sample.
        assert!(det.sample().detected);
    }
}
