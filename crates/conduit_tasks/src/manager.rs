//! The task manager: an in-memory store with concurrent access, monotonic
//! transitions, and bounded memory via a background sweeper.
//!
//! A single mutex guards the map of task ids to entries; each entry pairs
//! the record with a [`watch`] sender so [`TaskManager::await_result`] can
//! block on a transition without polling.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{watch, Mutex};
use tracing::{debug, instrument};

use conduit_error::{TaskError, TaskErrorKind};

use crate::cursor;
use crate::record::{Progress, Task, TaskStatus, DEFAULT_TTL_SECS, MAX_TTL_SECS};

struct Entry {
    task: Task,
    tx: watch::Sender<Task>,
}

/// One page of a [`TaskManager::list`] call.
#[derive(Debug, Clone)]
pub struct TaskPage {
    pub tasks: Vec<Task>,
    pub next_cursor: Option<String>,
}

/// Shared handle onto the in-memory task store. Cheaply cloneable; every
/// clone refers to the same underlying map.
#[derive(Clone)]
pub struct TaskManager {
    tasks: Arc<Mutex<HashMap<String, Entry>>>,
}

impl TaskManager {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Spawn the background sweeper, which deletes terminal records whose
    /// TTL has elapsed every [`crate::record::SWEEP_INTERVAL_SECS`].
    /// Returns a handle the caller can abort on shutdown.
    pub fn spawn_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(StdDuration::from_secs(crate::record::SWEEP_INTERVAL_SECS));
            loop {
                interval.tick().await;
                manager.sweep_expired().await;
            }
        })
    }

    /// Create a new task in the `working` state with the given TTL
    /// (clamped to `MAX_TTL_SECS`; `None` uses the default).
    #[instrument(skip(self))]
    pub async fn create(&self, ttl_secs: Option<i64>) -> Task {
        let ttl_secs = ttl_secs.unwrap_or(DEFAULT_TTL_SECS).clamp(1, MAX_TTL_SECS);
        let task_id = uuid::Uuid::new_v4().simple().to_string();
        let task = Task::new(task_id.clone(), ttl_secs);
        let (tx, _rx) = watch::channel(task.clone());
        self.tasks.lock().await.insert(task_id.clone(), Entry { task: task.clone(), tx });
        debug!(%task_id, ttl_secs, "created task");
        task
    }

    /// Fetch a point-in-time snapshot of a task.
    pub async fn get(&self, task_id: &str) -> Result<Task, TaskError> {
        self.tasks
            .lock()
            .await
            .get(task_id)
            .map(|e| e.task.clone())
            .ok_or_else(|| TaskError::new(TaskErrorKind::NotFound(task_id.to_string())))
    }

    /// Apply a status transition to a task, validating against the
    /// transition DAG. Broadcasts the new snapshot to any waiters.
    #[instrument(skip(self, result, error))]
    pub async fn update(
        &self,
        task_id: &str,
        status: TaskStatus,
        result: Option<Value>,
        error: Option<String>,
    ) -> Result<Task, TaskError> {
        let mut guard = self.tasks.lock().await;
        let entry = guard
            .get_mut(task_id)
            .ok_or_else(|| TaskError::new(TaskErrorKind::NotFound(task_id.to_string())))?;
        entry.task.transition(status, result, error)?;
        let snapshot = entry.task.clone();
        let _ = entry.tx.send(snapshot.clone());
        Ok(snapshot)
    }

    /// Report progress on a task still `working`. Does not change status.
    pub async fn report_progress(
        &self,
        task_id: &str,
        step: u64,
        message: Option<String>,
    ) -> Result<(), TaskError> {
        let mut guard = self.tasks.lock().await;
        let entry = guard
            .get_mut(task_id)
            .ok_or_else(|| TaskError::new(TaskErrorKind::NotFound(task_id.to_string())))?;
        if entry.task.status.is_terminal() {
            return Err(TaskError::new(TaskErrorKind::InvalidTransition {
                from: format!("{:?}", entry.task.status),
                to: "progress".to_string(),
            }));
        }
        entry.task.progress = Progress { step, message };
        entry.task.updated_at = Utc::now();
        let _ = entry.tx.send(entry.task.clone());
        Ok(())
    }

    /// Wait for a task to reach a terminal state, or until `deadline`
    /// elapses, whichever comes first. Returns the latest snapshot either
    /// way — callers distinguish "timed out" by checking `status`.
    #[instrument(skip(self))]
    pub async fn await_result(&self, task_id: &str, deadline: StdDuration) -> Result<Task, TaskError> {
        let mut rx = {
            let guard = self.tasks.lock().await;
            let entry = guard
                .get(task_id)
                .ok_or_else(|| TaskError::new(TaskErrorKind::NotFound(task_id.to_string())))?;
            if entry.task.status.is_terminal() {
                return Ok(entry.task.clone());
            }
            entry.tx.subscribe()
        };

        let wait = rx.wait_for(|task| task.status.is_terminal());
        match tokio::time::timeout(deadline, wait).await {
            Ok(Ok(task)) => Ok(task.clone()),
            Ok(Err(_)) => Err(TaskError::new(TaskErrorKind::NotFound(task_id.to_string()))),
            Err(_) => {
                let guard = self.tasks.lock().await;
                guard
                    .get(task_id)
                    .map(|e| e.task.clone())
                    .ok_or_else(|| TaskError::new(TaskErrorKind::NotFound(task_id.to_string())))
            }
        }
    }

    /// Signal cancellation. The task's own cancellation token is flipped;
    /// whatever goroutine is driving the task observes it and transitions
    /// to `cancelled` itself — this call does not transition the status.
    #[instrument(skip(self))]
    pub async fn cancel(&self, task_id: &str) -> Result<(), TaskError> {
        let guard = self.tasks.lock().await;
        let entry = guard
            .get(task_id)
            .ok_or_else(|| TaskError::new(TaskErrorKind::NotFound(task_id.to_string())))?;
        entry.task.cancellation.cancel();
        Ok(())
    }

    /// List tasks ordered by `(created_at, task_id)`, paginated by an
    /// opaque cursor from a previous page.
    pub async fn list(&self, cursor: Option<&str>, limit: usize) -> TaskPage {
        let guard = self.tasks.lock().await;
        let mut tasks: Vec<Task> = guard.values().map(|e| e.task.clone()).collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.task_id.cmp(&b.task_id)));

        let start = match cursor.and_then(cursor::decode) {
            Some((after_created, after_id)) => tasks
                .iter()
                .position(|t| (t.created_at, t.task_id.as_str()) > (after_created, after_id.as_str()))
                .unwrap_or(tasks.len()),
            None => 0,
        };

        let page: Vec<Task> = tasks[start..].iter().take(limit).cloned().collect();
        let next_cursor = if start + page.len() < tasks.len() {
            page.last().map(|t| cursor::encode(t.created_at, &t.task_id))
        } else {
            None
        };

        TaskPage { tasks: page, next_cursor }
    }

    /// Delete terminal records whose TTL has elapsed since their last
    /// update. Runs on every sweeper tick; also callable directly in tests.
    #[instrument(skip(self))]
    pub async fn sweep_expired(&self) {
        let now = Utc::now();
        let mut guard = self.tasks.lock().await;
        let before = guard.len();
        guard.retain(|_, entry| !entry.task.is_expired(now));
        let removed = before - guard.len();
        if removed > 0 {
            debug!(removed, "swept expired tasks");
        }
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}
