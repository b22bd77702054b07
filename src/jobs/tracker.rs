use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::JobError;
use crate::jobs::executor::{Executor, ThreadExecutor};
use crate::jobs::journal::{JobEvent, JobJournal};

/// Opaque, globally unique job id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        JobId(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(JobId(Uuid::parse_str(s)?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }

    /// Allowed moves: pending → running → complete | failed.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Complete)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Complete => "complete",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRecord {
    pub id: JobId,
    pub label: String,
    pub status: JobStatus,
    /// Failure message when `status` is `Failed`.
    pub error: Option<String>,
    #[serde(skip)]
    seq: u64,
}

struct Inner {
    jobs: Mutex<HashMap<JobId, JobRecord>>,
    changed: Condvar,
    next_seq: AtomicU64,
    journal: Option<JobJournal>,
}

impl Inner {
    fn transition(&self, id: JobId, next: JobStatus, error: Option<String>) {
        let mut jobs = self.jobs.lock();
        let Some(record) = jobs.get_mut(&id) else {
            warn!(job_id = %id, "transition for unknown job");
            return;
        };

        if !record.status.can_transition_to(next) {
            warn!(job_id = %id, from = %record.status, to = %next, "ignoring illegal job transition");
            return;
        }

        record.status = next;
        record.error = error;
        if let Some(journal) = &self.journal {
            journal.log(
                &JobEvent::now(id, &record.label, next).with_error(record.error.as_deref()),
            );
        }
        drop(jobs);
        self.changed.notify_all();
    }
}

/// Tracks long-running generation requests.
///
/// `submit` records a pending job and hands the body to the executor without
/// waiting for it. Records are kept for the life of the tracker. Cloning shares
/// the same job table.
#[derive(Clone)]
pub struct JobTracker {
    inner: Arc<Inner>,
    executor: Arc<dyn Executor>,
}

impl JobTracker {
    pub fn new(executor: Arc<dyn Executor>, journal: Option<JobJournal>) -> Self {
        Self {
            inner: Arc::new(Inner {
                jobs: Mutex::new(HashMap::new()),
                changed: Condvar::new(),
                next_seq: AtomicU64::new(0),
                journal,
            }),
            executor,
        }
    }

    /// Tracker running each job on its own thread.
    pub fn threaded() -> Self {
        Self::new(Arc::new(ThreadExecutor), None)
    }

    /// Schedule `job` and return its id immediately.
    ///
    /// An `Err` from the job, or a panic inside it, marks the job failed; neither
    /// reaches the executor. A job the executor refuses to start is failed
    /// straight away.
    pub fn submit<F, E>(&self, label: &str, job: F) -> JobId
    where
        F: FnOnce() -> Result<(), E> + Send + 'static,
        E: fmt::Display + 'static,
    {
        let id = JobId::new();
        let record = JobRecord {
            id,
            label: label.to_string(),
            status: JobStatus::Pending,
            error: None,
            seq: self.inner.next_seq.fetch_add(1, Ordering::Relaxed),
        };

        if let Some(journal) = &self.inner.journal {
            journal.log(&JobEvent::now(id, label, JobStatus::Pending));
        }
        self.inner.jobs.lock().insert(id, record);
        info!(job_id = %id, label, "job submitted");

        let inner = Arc::clone(&self.inner);
        let thread_name = format!("job-{}", id.0.simple());
        if let Err(e) = self
            .executor
            .execute(thread_name, Box::new(move || run_job(&inner, id, job)))
        {
            let message = format!("failed to start job: {}", e);
            error!(job_id = %id, error = %e, "executor rejected job");
            self.inner.transition(id, JobStatus::Running, None);
            self.inner.transition(id, JobStatus::Failed, Some(message));
        }
        id
    }

    pub fn status(&self, id: JobId) -> Result<JobStatus, JobError> {
        self.record(id).map(|r| r.status)
    }

    pub fn record(&self, id: JobId) -> Result<JobRecord, JobError> {
        self.inner
            .jobs
            .lock()
            .get(&id)
            .cloned()
            .ok_or(JobError::NotFound(id))
    }

    /// Every job in submission order.
    pub fn list(&self) -> Vec<JobRecord> {
        let mut records: Vec<JobRecord> = self.inner.jobs.lock().values().cloned().collect();
        records.sort_by_key(|r| r.seq);
        records
    }

    /// Block until the job is complete or failed, or `timeout` elapses.
    /// Returns the status observed last. A timeout too large to represent as
    /// a deadline waits without limit.
    pub fn wait(&self, id: JobId, timeout: Duration) -> Result<JobStatus, JobError> {
        self.wait_until(id, Instant::now().checked_add(timeout))
    }

    /// Wait for every job in `ids` under one shared `timeout`.
    pub fn wait_all(&self, ids: &[JobId], timeout: Duration) -> Result<(), JobError> {
        let deadline = Instant::now().checked_add(timeout);
        for id in ids {
            self.wait_until(*id, deadline)?;
        }
        Ok(())
    }

    fn wait_until(&self, id: JobId, deadline: Option<Instant>) -> Result<JobStatus, JobError> {
        let mut jobs = self.inner.jobs.lock();
        loop {
            let status = jobs.get(&id).ok_or(JobError::NotFound(id))?.status;
            if status.is_terminal() {
                return Ok(status);
            }
            match deadline {
                Some(deadline) => {
                    if self.inner.changed.wait_until(&mut jobs, deadline).timed_out() {
                        return jobs
                            .get(&id)
                            .map(|r| r.status)
                            .ok_or(JobError::NotFound(id));
                    }
                }
                None => self.inner.changed.wait(&mut jobs),
            }
        }
    }
}

fn run_job<F, E>(inner: &Inner, id: JobId, job: F)
where
    F: FnOnce() -> Result<(), E>,
    E: fmt::Display,
{
    inner.transition(id, JobStatus::Running, None);

    match panic::catch_unwind(AssertUnwindSafe(job)) {
        Ok(Ok(())) => {
            info!(job_id = %id, "job complete");
            inner.transition(id, JobStatus::Complete, None);
        }
        Ok(Err(e)) => {
            let message = e.to_string();
            error!(job_id = %id, error = %message, "job failed");
            inner.transition(id, JobStatus::Failed, Some(message));
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(job_id = %id, panic = %message, "job panicked");
            inner.transition(id, JobStatus::Failed, Some(format!("job panicked: {}", message)));
        }
    }
}
