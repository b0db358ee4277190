//! Background task runner.
//!
//! Every task gets its own OS thread. The work's result, error or panic is
//! turned into a [`TaskCompletion`] and delivered once over a oneshot
//! channel, so the caller's thread never sees a failure as anything but a
//! value. At most one task per key runs at a time.

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use hybrid_telemetry::Stopwatch;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::TaskError;

/// Lifecycle of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Accepted, worker not yet running.
    Idle,
    /// Worker is running.
    Running,
    /// Finished with a result.
    Completed,
    /// Finished with an error or panic.
    Failed,
}

impl TaskState {
    /// Check if the task is in a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// The single notification a task delivers.
#[derive(Debug)]
pub struct TaskCompletion<T> {
    /// Task identifier.
    pub id: Uuid,
    /// Single-flight key.
    pub key: String,
    /// Result of the work.
    pub result: Result<T, TaskError>,
    /// Wall time spent in the work.
    pub elapsed: Duration,
}

impl<T> TaskCompletion<T> {
    /// Whether the work succeeded.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Caller's side of a running task.
#[derive(Debug)]
pub struct TaskHandle<T> {
    id: Uuid,
    key: String,
    state: Arc<Mutex<TaskState>>,
    rx: oneshot::Receiver<TaskCompletion<T>>,
}

impl<T> TaskHandle<T> {
    /// Task identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Single-flight key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> TaskState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for the completion.
    pub async fn wait(self) -> TaskCompletion<T> {
        let (id, key) = (self.id, self.key.clone());
        self.rx.await.unwrap_or_else(|_| lost(id, key))
    }

    /// Block the current thread until completion. Must not be called from
    /// inside an async runtime.
    #[must_use]
    pub fn blocking_wait(self) -> TaskCompletion<T> {
        let (id, key) = (self.id, self.key.clone());
        self.rx.blocking_recv().unwrap_or_else(|_| lost(id, key))
    }

    /// The completion, if it has arrived. Never blocks.
    pub fn try_complete(&mut self) -> Option<TaskCompletion<T>> {
        match self.rx.try_recv() {
            Ok(completion) => Some(completion),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(lost(self.id, self.key.clone())),
        }
    }
}

fn lost<T>(id: Uuid, key: String) -> TaskCompletion<T> {
    TaskCompletion {
        id,
        key,
        result: Err(TaskError::Lost),
        elapsed: Duration::ZERO,
    }
}

/// Releases a key when the worker is done, even if it unwinds.
struct InFlight {
    key: String,
    keys: Arc<Mutex<HashSet<String>>>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

/// Runs work on dedicated threads with per-key single-flight.
#[derive(Clone, Default)]
pub struct TaskRunner {
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRunner")
            .field("in_flight", &self.running())
            .finish()
    }
}

impl TaskRunner {
    /// Create a runner with nothing in flight.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a task for `key` is running.
    #[must_use]
    pub fn is_running(&self, key: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    /// Keys of running tasks, sorted.
    #[must_use]
    pub fn running(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Start `work` on a new thread.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::AlreadyRunning`] if a task for `key` has not
    /// finished yet, or [`TaskError::Spawn`] if no thread could be started.
    pub fn spawn<T, E, F>(&self, key: impl Into<String>, work: F) -> Result<TaskHandle<T>, TaskError>
    where
        T: Send + 'static,
        E: fmt::Display,
        F: FnOnce() -> Result<T, E> + Send + 'static,
    {
        let key = key.into();
        {
            let mut keys = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if !keys.insert(key.clone()) {
                debug!(key = %key, "task already running");
                return Err(TaskError::AlreadyRunning(key));
            }
        }
        let guard = InFlight {
            key: key.clone(),
            keys: Arc::clone(&self.in_flight),
        };

        let id = Uuid::new_v4();
        let state = Arc::new(Mutex::new(TaskState::Idle));
        let (tx, rx) = oneshot::channel();

        let worker_state = Arc::clone(&state);
        let worker_key = key.clone();
        let spawned = thread::Builder::new()
            .name(format!("task-{key}"))
            .spawn(move || {
                set_state(&worker_state, TaskState::Running);
                let stopwatch = Stopwatch::start(worker_key.clone());
                let result = match panic::catch_unwind(AssertUnwindSafe(work)) {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(e)) => Err(TaskError::Failed(e.to_string())),
                    Err(payload) => Err(TaskError::Panicked(panic_message(payload.as_ref()))),
                };
                let elapsed = stopwatch.finish();

                match &result {
                    Ok(_) => set_state(&worker_state, TaskState::Completed),
                    Err(e) => {
                        warn!(key = %worker_key, error = %e, "task failed");
                        set_state(&worker_state, TaskState::Failed);
                    },
                }
                drop(guard);

                if tx
                    .send(TaskCompletion {
                        id,
                        key: worker_key.clone(),
                        result,
                        elapsed,
                    })
                    .is_err()
                {
                    debug!(key = %worker_key, "task handle dropped before completion");
                }
            });

        // On failure the closure, and with it the guard, is dropped here.
        spawned.map_err(|e| TaskError::Spawn(e.to_string()))?;
        debug!(key = %key, id = %id, "task started");
        Ok(TaskHandle { id, key, state, rx })
    }
}

fn set_state(state: &Mutex<TaskState>, next: TaskState) {
    *state.lock().unwrap_or_else(PoisonError::into_inner) = next;
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;

    #[tokio::test]
    async fn test_success() {
        let runner = TaskRunner::new();
        let handle = runner.spawn("demo", || Ok::<_, String>(42)).unwrap();
        let completion = handle.wait().await;
        assert_eq!(completion.key, "demo");
        assert_eq!(completion.result.unwrap(), 42);
        assert!(!runner.is_running("demo"));
    }

    #[tokio::test]
    async fn test_error_becomes_value() {
        let runner = TaskRunner::new();
        let handle = runner
            .spawn("demo", || Err::<(), _>("synthesis failed"))
            .unwrap();
        let completion = handle.wait().await;
        assert_eq!(
            completion.result.unwrap_err(),
            TaskError::Failed("synthesis failed".to_string())
        );
    }

    #[tokio::test]
    async fn test_panic_becomes_value() {
        let runner = TaskRunner::new();
        let handle = runner
            .spawn("demo", || -> Result<(), String> { panic!("model exploded") })
            .unwrap();
        let completion = handle.wait().await;
        assert_eq!(
            completion.result.unwrap_err(),
            TaskError::Panicked("model exploded".to_string())
        );
        // The key is released even though the work unwound.
        assert!(!runner.is_running("demo"));
    }

    #[test]
    fn test_single_flight_per_key() {
        let runner = TaskRunner::new();
        let (release, gate) = mpsc::channel::<()>();
        let first = runner
            .spawn("demo", move || gate.recv().map_err(|e| e.to_string()))
            .unwrap();

        assert!(runner.is_running("demo"));
        assert_eq!(
            runner.spawn("demo", || Ok::<_, String>(())).unwrap_err(),
            TaskError::AlreadyRunning("demo".to_string())
        );
        let other = runner.spawn("demo2", || Ok::<_, String>(())).unwrap();
        assert!(other.blocking_wait().is_ok());

        release.send(()).unwrap();
        let done = first.blocking_wait();
        assert!(done.is_ok());

        let again = runner.spawn("demo", || Ok::<_, String>(())).unwrap();
        assert!(again.blocking_wait().is_ok());
    }

    #[test]
    fn test_state_transitions() {
        let runner = TaskRunner::new();
        let (release, gate) = mpsc::channel::<()>();
        let (started_tx, started_rx) = mpsc::channel::<()>();
        let mut handle = runner
            .spawn("demo", move || {
                started_tx.send(()).map_err(|e| e.to_string())?;
                gate.recv().map_err(|e| e.to_string())
            })
            .unwrap();

        started_rx.recv().unwrap();
        assert_eq!(handle.state(), TaskState::Running);
        assert!(handle.try_complete().is_none());

        release.send(()).unwrap();
        let completion = loop {
            if let Some(c) = handle.try_complete() {
                break c;
            }
            thread::sleep(Duration::from_millis(1));
        };
        assert!(completion.is_ok());
        assert_eq!(handle.state(), TaskState::Completed);
        assert!(handle.state().is_terminal());
    }

    #[test]
    fn test_failed_state() {
        let runner = TaskRunner::new();
        let handle = runner.spawn("demo", || Err::<(), _>("no")).unwrap();
        let state = Arc::clone(&handle.state);
        let completion = handle.blocking_wait();
        assert!(!completion.is_ok());
        assert_eq!(*state.lock().unwrap(), TaskState::Failed);
    }
}
