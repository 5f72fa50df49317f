//! Plan job queue — PostgreSQL-backed durable work queue
//!
//! Uses `SELECT FOR UPDATE SKIP LOCKED` so concurrent workers never claim
//! the same row. The job row is also the result backend: the manifest of
//! a succeeded job and the error of a failed one live on the row itself.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::types::PlanRequest;

/// Default queue for plan orchestration jobs. Additional queues are a
/// deployment concern (workers subscribe by name); the name carries no
/// semantics beyond routing.
pub const QUEUE_NAV: &str = "nav";

/// Exponential backoff for retrying jobs.
const BACKOFF_BASE_SECS: f64 = 2.0;
const BACKOFF_CAP_SECS: f64 = 60.0;

/// How many child hops a status read will traverse before giving up.
const MAX_CHILD_DEPTH: usize = 8;

/// A running job whose claim is older than this is considered abandoned
/// (worker died mid-job) and becomes claimable again. Must exceed the
/// longest stage budget, so only dead workers are preempted.
const STALE_CLAIM_SECS: f64 = 900.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Retrying,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Retrying => "retrying",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<JobState> {
        match s {
            "pending" => Some(JobState::Pending),
            "running" => Some(JobState::Running),
            "retrying" => Some(JobState::Retrying),
            "succeeded" => Some(JobState::Succeeded),
            "failed" => Some(JobState::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

/// A claimed plan job ready for execution.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub id: String,
    pub queue: String,
    pub pack_id: Uuid,
    pub request: serde_json::Value,
    pub retry_count: i32,
    pub max_retries: i32,
}

/// Status view for the poll endpoint.
#[derive(Debug, Clone)]
pub struct JobStatusRow {
    pub id: String,
    pub state: JobState,
    pub result: Option<serde_json::Value>,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub child_job_id: Option<String>,
}

/// Enqueue a new plan job, returning its id. The pack id is generated
/// here, once, and is stable across every retry of the job.
pub async fn enqueue_plan(
    pool: &PgPool,
    queue: &str,
    request: &PlanRequest,
    max_retries: i32,
) -> Result<String, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let pack_id = Uuid::new_v4();
    let request = serde_json::to_value(request).map_err(|e| sqlx::Error::Protocol(e.to_string()))?;

    sqlx::query(
        "INSERT INTO plan_jobs (id, queue, pack_id, request, max_retries) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(&id)
    .bind(queue)
    .bind(pack_id)
    .bind(&request)
    .bind(max_retries)
    .execute(pool)
    .await?;

    Ok(id)
}

/// Atomically claim the next runnable job on `queue`.
///
/// Retrying jobs become runnable once their backoff (`run_after`) has
/// elapsed; running jobs whose claim went stale are redelivered
/// (at-least-once). Returns `None` when the queue is empty.
pub async fn claim_job(pool: &PgPool, queue: &str) -> Result<Option<ClaimedJob>, sqlx::Error> {
    let row: Option<(String, String, Uuid, serde_json::Value, i32, i32)> = sqlx::query_as(
        r#"
        UPDATE plan_jobs
        SET    state = 'running',
               claimed_at = NOW()
        WHERE  id = (
            SELECT id
            FROM   plan_jobs
            WHERE  queue = $1
              AND  (
                    (state IN ('pending', 'retrying') AND run_after <= NOW())
                 OR (state = 'running'
                     AND claimed_at < NOW() - make_interval(secs => $2))
              )
            ORDER  BY created_at ASC
            LIMIT  1
            FOR UPDATE SKIP LOCKED
        )
        RETURNING id, queue, pack_id, request, retry_count, max_retries
        "#,
    )
    .bind(queue)
    .bind(STALE_CLAIM_SECS)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(id, queue, pack_id, request, retry_count, max_retries)| ClaimedJob {
        id,
        queue,
        pack_id,
        request,
        retry_count,
        max_retries,
    }))
}

/// Record a successful outcome. The result document is the manifest the
/// poll endpoint will echo.
pub async fn complete_job(
    pool: &PgPool,
    job_id: &str,
    result: &serde_json::Value,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE plan_jobs \
         SET state = 'succeeded', result = $2, completed_at = NOW(), \
             error_kind = NULL, error_message = NULL \
         WHERE id = $1",
    )
    .bind(job_id)
    .bind(result)
    .execute(pool)
    .await?;
    Ok(())
}

fn backoff_secs(retry_count: i32) -> f64 {
    (BACKOFF_BASE_SECS * 2f64.powi(retry_count)).min(BACKOFF_CAP_SECS)
}

/// Record a failure. Retryable failures re-queue with exponential
/// backoff until the retry budget (the smaller of the job's ceiling and
/// the error kind's budget) is exhausted; everything else is terminal.
pub async fn fail_job(
    pool: &PgPool,
    job: &ClaimedJob,
    error_kind: &str,
    error_message: &str,
    retryable: bool,
    kind_budget: i32,
) -> Result<(), sqlx::Error> {
    let next_retry = job.retry_count + 1;
    let allowed = job.max_retries.min(kind_budget);
    let exhausted = !retryable || next_retry > allowed;

    if exhausted {
        warn!(
            job_id = %job.id,
            error_kind,
            retries = job.retry_count,
            "Job permanently failed: {}",
            error_message
        );
    }

    let new_state = if exhausted { "failed" } else { "retrying" };
    let delay = backoff_secs(job.retry_count);

    sqlx::query(
        "UPDATE plan_jobs \
         SET state         = $1, \
             retry_count   = $2, \
             error_kind    = $3, \
             error_message = $4, \
             run_after     = NOW() + make_interval(secs => $5), \
             completed_at  = CASE WHEN $6 THEN NOW() ELSE NULL END, \
             claimed_at    = NULL \
         WHERE id = $7",
    )
    .bind(new_state)
    .bind(next_retry)
    .bind(error_kind)
    .bind(error_message)
    .bind(delay)
    .bind(exhausted)
    .bind(&job.id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Hand the job off to a child on another queue. The parent keeps its
/// pack id and request; status reads traverse to the child.
pub async fn replace_with_child(
    pool: &PgPool,
    parent: &ClaimedJob,
    child_queue: &str,
) -> Result<String, sqlx::Error> {
    let child_id = Uuid::new_v4().to_string();

    let mut tx = pool.begin().await?;
    sqlx::query(
        "INSERT INTO plan_jobs (id, queue, pack_id, request, max_retries) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(&child_id)
    .bind(child_queue)
    .bind(parent.pack_id)
    .bind(&parent.request)
    .bind(parent.max_retries)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE plan_jobs \
         SET state = 'succeeded', child_job_id = $2, completed_at = NOW() \
         WHERE id = $1",
    )
    .bind(&parent.id)
    .bind(&child_id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok(child_id)
}

async fn fetch_status(pool: &PgPool, job_id: &str) -> Result<Option<JobStatusRow>, sqlx::Error> {
    let row: Option<(
        String,
        String,
        Option<serde_json::Value>,
        Option<String>,
        Option<String>,
        Option<String>,
    )> = sqlx::query_as(
        "SELECT id, state, result, error_kind, error_message, child_job_id \
         FROM plan_jobs WHERE id = $1",
    )
    .bind(job_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(id, state, result, error_kind, error_message, child_job_id)| JobStatusRow {
        id,
        state: JobState::parse(&state).unwrap_or(JobState::Failed),
        result,
        error_kind,
        error_message,
        child_job_id,
    }))
}

/// Status of the job itself, without child traversal.
pub async fn job_status(pool: &PgPool, job_id: &str) -> Result<Option<JobStatusRow>, sqlx::Error> {
    fetch_status(pool, job_id).await
}

/// Status for polling: follows child references to the terminal
/// descendant so a job that replaced itself with a sub-pipeline reports
/// the sub-pipeline's outcome.
pub async fn terminal_status(
    pool: &PgPool,
    job_id: &str,
) -> Result<Option<JobStatusRow>, sqlx::Error> {
    let mut current = match fetch_status(pool, job_id).await? {
        Some(row) => row,
        None => return Ok(None),
    };

    for _ in 0..MAX_CHILD_DEPTH {
        let child_id = match &current.child_job_id {
            Some(id) => id.clone(),
            None => break,
        };
        match fetch_status(pool, &child_id).await? {
            Some(child) => current = child,
            None => {
                warn!(job_id, child_id = %child_id, "Dangling child job reference");
                break;
            }
        }
    }

    Ok(Some(current))
}

/// Count runnable jobs on a queue (metrics/logging only).
pub async fn pending_job_count(pool: &PgPool, queue: &str) -> Result<i64, sqlx::Error> {
    let count: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM plan_jobs WHERE queue = $1 AND state IN ('pending', 'retrying')",
    )
    .bind(queue)
    .fetch_one(pool)
    .await?;
    Ok(count.0)
}

/// Delete terminal jobs older than `ttl_secs`. Returns how many were
/// removed.
pub async fn delete_expired(pool: &PgPool, ttl_secs: u64) -> Result<u64, sqlx::Error> {
    let res = sqlx::query(
        "DELETE FROM plan_jobs \
         WHERE state IN ('succeeded', 'failed') \
           AND completed_at < NOW() - make_interval(secs => $1)",
    )
    .bind(ttl_secs as f64)
    .execute(pool)
    .await?;
    Ok(res.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff_secs(0), 2.0);
        assert_eq!(backoff_secs(1), 4.0);
        assert_eq!(backoff_secs(2), 8.0);
        assert_eq!(backoff_secs(10), 60.0);
    }

    #[test]
    fn job_state_round_trips() {
        for s in [
            JobState::Pending,
            JobState::Running,
            JobState::Retrying,
            JobState::Succeeded,
            JobState::Failed,
        ] {
            assert_eq!(JobState::parse(s.as_str()), Some(s));
        }
        assert_eq!(JobState::parse("bogus"), None);
        assert!(JobState::Succeeded.is_terminal());
        assert!(!JobState::Retrying.is_terminal());
    }
}
