//! The task manager (SEP-1686): an in-memory store of long-running
//! invocation records with monotonic status transitions, a background TTL
//! sweeper, and cursor-paginated listing.

mod cursor;
mod manager;
mod record;

pub use manager::{TaskManager, TaskPage};
pub use record::{
    Progress, Task, TaskStatus, DEFAULT_RESULT_TIMEOUT_SECS, DEFAULT_TTL_SECS, MAX_TTL_SECS,
    SWEEP_INTERVAL_SECS,
};
