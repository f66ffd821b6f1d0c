//! Background parse jobs
//!
//! Long-running parses run on a dedicated worker thread with its own
//! runtime, a wall-clock timeout, and a message channel back to the caller
//! (`progress` / `complete` / `error`). The job table is the only other
//! process-wide mutable state besides the schema registry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::time::Duration;

use dashmap::DashMap;
use trellis_core::{Result, TrellisError};
use trellis_store::GraphStore;

use crate::orchestrator::{ParseOptions, ParseOutcome, parse_project_with_progress};

/// Default wall-clock budget for one parse job.
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone)]
pub enum JobMessage {
    Progress { stage: String, detail: String },
    Complete { outcome: JobOutcome },
    Error { message: String },
}

/// The completion payload sent over the channel.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub project_id: String,
    pub node_count: u64,
    pub edge_count: u64,
}

impl From<&ParseOutcome> for JobOutcome {
    fn from(outcome: &ParseOutcome) -> Self {
        JobOutcome {
            project_id: outcome.project_id.clone(),
            node_count: outcome.node_count,
            edge_count: outcome.edge_count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Complete,
    Failed,
}

pub struct JobHandle {
    pub job_id: u64,
    receiver: mpsc::Receiver<JobMessage>,
}

impl JobHandle {
    /// Next message, blocking. `None` once the worker is gone.
    pub fn recv(&self) -> Option<JobMessage> {
        self.receiver.recv().ok()
    }

    pub fn try_recv(&self) -> Option<JobMessage> {
        self.receiver.try_recv().ok()
    }

    /// Drain messages until the job finishes.
    pub fn wait(self) -> Result<JobOutcome> {
        while let Some(message) = self.recv() {
            match message {
                JobMessage::Progress { stage, detail } => {
                    tracing::debug!(stage = %stage, "{detail}");
                }
                JobMessage::Complete { outcome } => return Ok(outcome),
                JobMessage::Error { message } => return Err(TrellisError::JobFailed(message)),
            }
        }
        Err(TrellisError::JobFailed("worker channel closed".into()))
    }
}

pub struct JobManager {
    next_id: AtomicU64,
    jobs: Arc<DashMap<u64, JobStatus>>,
}

impl JobManager {
    pub fn new() -> Self {
        JobManager {
            next_id: AtomicU64::new(1),
            jobs: Arc::new(DashMap::new()),
        }
    }

    pub fn status(&self, job_id: u64) -> Option<JobStatus> {
        self.jobs.get(&job_id).map(|s| *s.value())
    }

    /// Spawn a parse on an isolated worker thread. The caller consumes the
    /// handle's message stream; the job survives the handle being dropped.
    pub fn spawn(
        &self,
        store: Arc<dyn GraphStore>,
        options: ParseOptions,
        timeout: Duration,
    ) -> JobHandle {
        let job_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.jobs.insert(job_id, JobStatus::Running);
        let jobs = Arc::clone(&self.jobs);
        let (sender, receiver) = mpsc::channel();

        std::thread::spawn(move || {
            tracing::debug!(job_id, "parse worker started");
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    jobs.insert(job_id, JobStatus::Failed);
                    let _ = sender.send(JobMessage::Error {
                        message: format!("worker runtime: {e}"),
                    });
                    return;
                }
            };

            let progress_sender = Mutex::new(sender.clone());
            let progress = move |stage: &str, detail: &str| {
                if let Ok(sender) = progress_sender.lock() {
                    let _ = sender.send(JobMessage::Progress {
                        stage: stage.to_string(),
                        detail: detail.to_string(),
                    });
                }
            };

            let result = runtime.block_on(tokio::time::timeout(
                timeout,
                parse_project_with_progress(store.as_ref(), &options, Some(&progress)),
            ));

            match result {
                Ok(Ok(outcome)) => {
                    jobs.insert(job_id, JobStatus::Complete);
                    let _ = sender.send(JobMessage::Complete {
                        outcome: JobOutcome::from(&outcome),
                    });
                }
                Ok(Err(err)) => {
                    jobs.insert(job_id, JobStatus::Failed);
                    let _ = sender.send(JobMessage::Error {
                        message: err.to_string(),
                    });
                }
                Err(_) => {
                    // The parse future was dropped mid-flight; committed
                    // chunks stay, the failed status must still land.
                    jobs.insert(job_id, JobStatus::Failed);
                    let err = TrellisError::Timeout(timeout.as_secs());
                    if let Some(project_id) = project_id_of(&options) {
                        let mark = store.update_project_status(
                            &project_id,
                            trellis_core::ProjectStatus::Failed,
                            0,
                            0,
                        );
                        if let Err(e) = runtime.block_on(mark) {
                            tracing::error!("failed to mark timed-out project: {e}");
                        }
                    }
                    let _ = sender.send(JobMessage::Error {
                        message: err.to_string(),
                    });
                }
            }
            tracing::debug!(job_id, "parse worker finished");
        });

        JobHandle { job_id, receiver }
    }
}

impl Default for JobManager {
    fn default() -> Self {
        Self::new()
    }
}

fn project_id_of(options: &ParseOptions) -> Option<String> {
    if let Some(id) = &options.project_id {
        return Some(id.clone());
    }
    let root = options.project_path.canonicalize().ok()?;
    Some(trellis_core::identity::project_id(&root.to_string_lossy()))
}
