//! Workflow engine — durable plan jobs over a Postgres-backed queue
//!
//! Jobs are claimed with `SELECT FOR UPDATE SKIP LOCKED` so any number of
//! worker tasks (or service instances) can consume the same queue without
//! double-claiming. Acknowledgement is late: a job only leaves `running`
//! once its outcome is durably recorded, giving at-least-once redelivery
//! after a hard kill.
//!
//! ## Modules
//!
//! - `queue` — job rows: enqueue, claim, complete, fail with backoff
//! - `worker` — worker loop and the C1→C6 plan pipeline
//! - `reaper` — TTL cleanup of terminal jobs

pub mod queue;
pub mod reaper;
pub mod worker;

pub use queue::{
    claim_job, complete_job, enqueue_plan, fail_job, job_status, pending_job_count,
    terminal_status, ClaimedJob, JobState, JobStatusRow, QUEUE_NAV,
};
pub use worker::{execute_plan, run_worker, WorkerContext};
