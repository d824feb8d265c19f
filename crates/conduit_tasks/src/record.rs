//! The task record and its status transitions (SEP-1686 task envelope).

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use conduit_error::{TaskError, TaskErrorKind};

/// Default time-to-live for a terminal task before the sweeper reclaims it.
pub const DEFAULT_TTL_SECS: i64 = 30 * 60;
/// Upper bound a caller may request for a task's TTL.
pub const MAX_TTL_SECS: i64 = 2 * 60 * 60;
/// How often the background sweeper scans for expired terminal tasks.
pub const SWEEP_INTERVAL_SECS: u64 = 60;
/// Default block timeout for `tasks/result` when the caller specifies none.
pub const DEFAULT_RESULT_TIMEOUT_SECS: u64 = 60;

/// Where a task currently sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Working,
    Completed,
    Failed,
    Cancelled,
    InputRequired,
}

impl TaskStatus {
    /// Terminal states are absorbing: once reached, no further transition
    /// is ever valid.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    fn can_transition_to(self, next: Self) -> bool {
        use TaskStatus::*;
        match (self, next) {
            (Working, Completed | Failed | Cancelled | InputRequired) => true,
            (InputRequired, Working) => true,
            _ => false,
        }
    }
}

/// Progress reporting for a task still `working`: a monotonic step counter
/// plus an optional free-form message from whatever is driving the task.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Progress {
    pub step: u64,
    pub message: Option<String>,
}

/// A long-running invocation record. Owned by the executing task, mutated
/// only through [`crate::manager::TaskManager::update`], read by any
/// handler as an immutable snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub task_id: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ttl_secs: i64,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub progress: Progress,
    #[serde(skip)]
    pub cancellation: CancellationToken,
}

impl Task {
    pub(crate) fn new(task_id: String, ttl_secs: i64) -> Self {
        let now = Utc::now();
        Self {
            task_id,
            status: TaskStatus::Working,
            created_at: now,
            updated_at: now,
            ttl_secs,
            result: None,
            error: None,
            progress: Progress::default(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Whether this record is eligible for sweeping: terminal and past its
    /// TTL since the last update.
    pub(crate) fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status.is_terminal() && now - self.updated_at > chrono::Duration::seconds(self.ttl_secs)
    }

    /// Apply a status transition, enforcing the DAG and the
    /// result/error mutual-exclusivity invariant. `updated_at` is bumped on
    /// every successful transition and never moves backward.
    pub(crate) fn transition(
        &mut self,
        next: TaskStatus,
        result: Option<Value>,
        error: Option<String>,
    ) -> Result<(), TaskError> {
        if self.status.is_terminal() {
            return Err(TaskError::new(TaskErrorKind::InvalidTransition {
                from: format!("{:?}", self.status),
                to: format!("{next:?}"),
            }));
        }
        if !self.status.can_transition_to(next) {
            return Err(TaskError::new(TaskErrorKind::InvalidTransition {
                from: format!("{:?}", self.status),
                to: format!("{next:?}"),
            }));
        }
        if result.is_some() && error.is_some() {
            return Err(TaskError::new(TaskErrorKind::InvalidTransition {
                from: "result+error".to_string(),
                to: format!("{next:?}"),
            }));
        }
        self.status = next;
        if result.is_some() {
            self.result = result;
        }
        if error.is_some() {
            self.error = error;
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}
