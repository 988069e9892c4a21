//! [`TaskSupervisor`] – the preemption controller.
//!
//! Owns at most one active task handle per robot instance. Submitting new
//! work first cancels the current task's token and then *awaits* its join
//! handle, so the preempted task has observed cancellation, released the
//! gateway, and emitted its terminal event before anything new starts.
//! Cancellation is cooperative: tasks poll their token between waypoints or
//! cycles, never inside an actuator write.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::emitter::Emitter;

/// What kind of work a task handle represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Gesture,
    Tracking,
    ManualMove,
}

impl TaskKind {
    /// Long-running tasks announce themselves with `progress{started}`.
    pub fn is_long_running(&self) -> bool {
        matches!(self, TaskKind::Gesture | TaskKind::Tracking)
    }
}

/// How a task function exited. Mapped to the terminal `result` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskExit {
    Completed(String),
    Cancelled,
    Failed(String),
}

struct ActiveTask {
    id: Uuid,
    command: String,
    kind: TaskKind,
    token: CancellationToken,
    join: JoinHandle<()>,
}

/// At-most-one-active-task controller for a single robot instance.
pub struct TaskSupervisor {
    emitter: Emitter,
    active: Option<ActiveTask>,
}

impl TaskSupervisor {
    pub fn new(emitter: Emitter) -> Self {
        Self {
            emitter,
            active: None,
        }
    }

    /// Cancel the active task (if any) and wait for it to reach a terminal
    /// state. Returns the kind of task that was actually still running, or
    /// `None` if there was nothing to preempt.
    pub async fn preempt(&mut self) -> Option<TaskKind> {
        let task = self.active.take()?;
        if task.join.is_finished() {
            // Already terminal; its result event has been emitted.
            let _ = task.join.await;
            return None;
        }
        info!(task_id = %task.id, command = %task.command, "preempting active task");
        task.token.cancel();
        if task.join.await.is_err() {
            warn!(task_id = %task.id, command = %task.command, "preempted task panicked");
        }
        Some(task.kind)
    }

    /// Start a new task. The caller must have preempted first; the previous
    /// handle is gone by the time this runs.
    ///
    /// Emits `progress{started}` for long-running kinds, then spawns the
    /// task function and maps its [`TaskExit`] to the terminal event.
    pub fn start<F, Fut>(&mut self, command: &str, kind: TaskKind, task_fn: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = TaskExit> + Send + 'static,
    {
        let token = CancellationToken::new();
        if kind.is_long_running() {
            self.emitter.progress_started(command);
        }

        let id = Uuid::new_v4();
        let fut = task_fn(token.clone());
        let emitter = self.emitter.clone();
        let cmd = command.to_string();
        let join = tokio::spawn(async move {
            match fut.await {
                TaskExit::Completed(outcome) => emitter.result_completed(&cmd, &outcome),
                TaskExit::Cancelled => emitter.result_cancelled(&cmd),
                TaskExit::Failed(error) => emitter.result_error(&cmd, &error),
            }
        });

        self.active = Some(ActiveTask {
            id,
            command: command.to_string(),
            kind,
            token,
            join,
        });
    }

    /// Whether a task handle exists and has not yet reached a terminal state.
    pub fn has_active_task(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|task| !task.join.is_finished())
    }
}

/// Sleep that wakes early on cancellation. Returns `false` when cancelled.
pub async fn sleep_cancellable(token: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carebot_types::{OutgoingEvent, ResultStatus, RobotId};

    fn supervisor() -> (TaskSupervisor, tokio::sync::broadcast::Receiver<carebot_types::Stamped>) {
        let emitter = Emitter::new(RobotId::Left);
        let rx = emitter.subscribe();
        (TaskSupervisor::new(emitter), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn completed_task_emits_result_with_outcome() {
        let (mut sup, mut rx) = supervisor();
        sup.start("init_pose", TaskKind::Gesture, |_token| async {
            TaskExit::Completed("init_completed".to_string())
        });

        // progress first, then the terminal result.
        let progress = rx.recv().await.unwrap();
        assert!(matches!(progress.event, OutgoingEvent::Progress { .. }));
        let result = rx.recv().await.unwrap();
        match result.event {
            OutgoingEvent::Result {
                status, outcome, ..
            } => {
                assert_eq!(status, ResultStatus::Completed);
                assert_eq!(outcome.as_deref(), Some("init_completed"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn preempt_awaits_cooperative_exit_and_reports_kind() {
        let (mut sup, mut rx) = supervisor();
        sup.start("face_tracking", TaskKind::Tracking, |token| async move {
            loop {
                if !sleep_cancellable(&token, Duration::from_millis(100)).await {
                    return TaskExit::Cancelled;
                }
            }
        });
        let _progress = rx.recv().await.unwrap();

        let preempted = sup.preempt().await;
        assert_eq!(preempted, Some(TaskKind::Tracking));
        assert!(!sup.has_active_task());

        let result = rx.recv().await.unwrap();
        assert!(matches!(
            result.event,
            OutgoingEvent::Result {
                status: ResultStatus::Cancelled,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn preempting_a_finished_task_reports_nothing_running() {
        let (mut sup, mut rx) = supervisor();
        sup.start("set_joint", TaskKind::ManualMove, |_token| async {
            TaskExit::Completed("ok".to_string())
        });
        // Let the task finish and emit its result.
        let _result = rx.recv().await.unwrap();

        assert_eq!(sup.preempt().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_moves_do_not_emit_progress() {
        let (mut sup, mut rx) = supervisor();
        sup.start("set_joints", TaskKind::ManualMove, |_token| async {
            TaskExit::Completed("ok".to_string())
        });
        let first = rx.recv().await.unwrap();
        assert!(matches!(first.event, OutgoingEvent::Result { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_task_maps_to_result_error() {
        let (mut sup, mut rx) = supervisor();
        sup.start("hug", TaskKind::Gesture, |_token| async {
            TaskExit::Failed("hardware_io".to_string())
        });
        let _progress = rx.recv().await.unwrap();
        let result = rx.recv().await.unwrap();
        match result.event {
            OutgoingEvent::Result { status, error, .. } => {
                assert_eq!(status, ResultStatus::Error);
                assert_eq!(error.as_deref(), Some("hardware_io"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
