//! Event stamping and fan-out.
//!
//! Every outgoing event is stamped with an ISO-8601 UTC timestamp,
//! `who:"carebot"`, and this instance's `robot_id`, then broadcast so the
//! transport loop(s) and any test observer receive the same ordered stream.
//! Emission is fire-and-forget: a bus with no subscribers is a normal
//! condition, not an error.

use carebot_types::{OutgoingEvent, ResultStatus, RobotId, Stamped};
use chrono::Utc;
use tokio::sync::broadcast;
use tracing::trace;

/// Default broadcast capacity before slow subscribers start lagging.
const DEFAULT_CAPACITY: usize = 256;

/// Identity string stamped into every event.
pub const WHO: &str = "carebot";

/// Cheaply cloneable event sink. All clones share one broadcast channel.
#[derive(Clone)]
pub struct Emitter {
    robot_id: RobotId,
    tx: broadcast::Sender<Stamped>,
}

impl Emitter {
    pub fn new(robot_id: RobotId) -> Self {
        Self::with_capacity(robot_id, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(robot_id: RobotId, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { robot_id, tx }
    }

    pub fn robot_id(&self) -> RobotId {
        self.robot_id
    }

    /// Subscribe to the stamped event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Stamped> {
        self.tx.subscribe()
    }

    /// Stamp an event without broadcasting it (used by the bridge for
    /// per-connection `hello` frames).
    pub fn stamp(&self, event: OutgoingEvent) -> Stamped {
        Stamped {
            ts: Utc::now(),
            who: WHO.to_string(),
            robot_id: self.robot_id,
            event,
        }
    }

    /// Stamp and broadcast an event.
    pub fn emit(&self, event: OutgoingEvent) {
        let stamped = self.stamp(event);
        if self.tx.send(stamped).is_err() {
            trace!("event dropped, no subscribers");
        }
    }

    pub fn hello(&self, capabilities: &[&str]) {
        self.emit(self.hello_event(capabilities));
    }

    /// Build a `hello` body (also used per-connection by the bridge).
    pub fn hello_event(&self, capabilities: &[&str]) -> OutgoingEvent {
        OutgoingEvent::Hello {
            agent: WHO.to_string(),
            capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn ack(&self, command: &str) {
        self.emit(OutgoingEvent::Ack {
            command: command.to_string(),
            status: "accepted".to_string(),
        });
    }

    pub fn progress_started(&self, command: &str) {
        self.emit(OutgoingEvent::Progress {
            command: command.to_string(),
            status: "started".to_string(),
        });
    }

    pub fn result_completed(&self, command: &str, outcome: &str) {
        self.emit(OutgoingEvent::Result {
            command: command.to_string(),
            status: ResultStatus::Completed,
            outcome: Some(outcome.to_string()),
            error: None,
        });
    }

    pub fn result_cancelled(&self, command: &str) {
        self.emit(OutgoingEvent::Result {
            command: command.to_string(),
            status: ResultStatus::Cancelled,
            outcome: None,
            error: None,
        });
    }

    pub fn result_error(&self, command: &str, error: &str) {
        self.emit(OutgoingEvent::Result {
            command: command.to_string(),
            status: ResultStatus::Error,
            outcome: None,
            error: Some(error.to_string()),
        });
    }

    pub fn error(&self, error: &str, command: Option<&str>) {
        self.emit(OutgoingEvent::Error {
            error: error.to_string(),
            command: command.map(|c| c.to_string()),
        });
    }
}
