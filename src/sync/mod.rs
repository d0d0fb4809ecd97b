//! Project synchronization.
//!
//! Reconciles a client-held, possibly offline-edited task tree with the
//! server's authoritative copy:
//!
//! - `merge`: field-level tree merge with ingestion validation
//! - `report`: per-status rollup over the merged top-level tasks
//! - `coordinator`: concurrency/terminal-state guards, persistence, and
//!   the change-event publish

mod coordinator;
mod merge;
mod report;

pub use coordinator::{ProjectSyncCoordinator, SyncOutcome, SyncRequest, SyncSummary};
pub use merge::{merge_forest, TaskPatch};
pub use report::task_report;
