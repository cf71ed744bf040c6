//! Job executor: dispatches each newly queued job to its type handler on
//! a dedicated worker thread, so submission returns as soon as the ledger
//! row exists.
//!
//! Dispatch happens at most once per job, guarded by the ledger's atomic
//! queued -> running claim. Any handler error or panic is caught at this
//! boundary and recorded as a failed terminal state — a handler crash can
//! never leave a job stuck in running. Cancellation is cooperative: the
//! executor sets the job's token and the worker observes it at its next
//! checkpoint, not immediately.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use tracing::info_span;

use crate::config::MurmurConfig;
use crate::error::SubmitError;
use crate::handlers::{self, HandlerContext, HandlerError, LedgerProgress};
use crate::job::{Job, JobPatch, NewJobRequest};
use crate::ledger::JobLedger;

pub mod cancel;

pub use cancel::{CancelRegistry, CancelToken};

/// One executor per process. Jobs run concurrently, each on its own
/// worker thread; the executor imposes no queue depth limit (external
/// tool parallelism is bounded by the per-job `workers` parameter).
pub struct JobExecutor {
    ledger: Arc<JobLedger>,
    config: Arc<MurmurConfig>,
    cancels: CancelRegistry,
}

impl JobExecutor {
    pub fn new(ledger: Arc<JobLedger>, config: Arc<MurmurConfig>) -> Self {
        Self {
            ledger,
            config,
            cancels: CancelRegistry::new(),
        }
    }

    pub fn ledger(&self) -> &Arc<JobLedger> {
        &self.ledger
    }

    /// Validates and submits a job: creates the ledger row (queued),
    /// registers a cancellation token and hands the job off to a worker
    /// thread. Returns immediately with the created record.
    pub fn submit(self: &Arc<Self>, request: NewJobRequest) -> Result<Job, SubmitError> {
        request.validate()?;
        let job = self.ledger.create(request)?;
        let token = self.cancels.register(&job.id);

        let executor = Arc::clone(self);
        let worker_job = job.clone();
        let short_id: String = job.id.chars().take(8).collect();
        let spawned = thread::Builder::new()
            .name(format!("job-{}", short_id))
            .spawn(move || executor.run_job(worker_job, token));

        if let Err(e) = spawned {
            // Submission failed as a whole: remove the row we just wrote
            // so no job is left queued with nothing to run it.
            self.cancels.remove(&job.id);
            if let Err(del) = self.ledger.delete(&job.id) {
                log::error!("Failed to remove undispatched job {}: {}", job.id, del);
            }
            return Err(SubmitError::Dispatch(e.to_string()));
        }

        Ok(job)
    }

    /// Sets the cancellation flag for a job and returns immediately; the
    /// worker observes it at its next checkpoint. Returns whether a live
    /// token existed.
    pub fn cancel(&self, job_id: &str) -> bool {
        let found = self.cancels.cancel(job_id);
        if found {
            log::info!("Cancellation requested for job {}", job_id);
        }
        found
    }

    /// Restart semantics: always a brand-new job with the same type and
    /// parameters, never a resume. Returns `None` when the id is unknown.
    pub fn restart(self: &Arc<Self>, job_id: &str) -> Result<Option<Job>, SubmitError> {
        match self.ledger.get(job_id)? {
            Some(original) => {
                log::info!("Restarting job {} as a new submission", job_id);
                self.submit(NewJobRequest::new(original.job_type, original.parameters))
                    .map(Some)
            }
            None => Ok(None),
        }
    }

    fn run_job(self: Arc<Self>, job: Job, token: CancelToken) {
        let _span = info_span!("job", id = %job.id, job_type = %job.job_type).entered();

        let progress = LedgerProgress::new(
            Arc::clone(&self.ledger),
            &job.id,
            Some(self.config.directories.job_log_path(&job.id)),
        );
        progress.log_line(&format!("{} job starting", job.job_type));

        // Pre-claim checkpoint: a job cancelled while still queued goes
        // straight to cancelled without ever entering running.
        if token.is_cancelled() {
            self.ledger.update(&job.id, JobPatch::cancelled());
            progress.log_line("cancelled before dispatch");
            self.cancels.remove(&job.id);
            return;
        }

        match self.ledger.claim(&job.id) {
            Ok(true) => {}
            Ok(false) => {
                log::warn!("Job {} was not claimable, abandoning dispatch", job.id);
                self.cancels.remove(&job.id);
                return;
            }
            Err(e) => {
                log::error!("Failed to claim job {}: {}", job.id, e);
                self.cancels.remove(&job.id);
                return;
            }
        }

        let ctx = HandlerContext {
            job: &job,
            config: &self.config,
            progress: &progress,
            token: &token,
        };
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handlers::run(&ctx)));

        match outcome {
            Ok(Ok(outcome)) => {
                for followup in outcome.followups {
                    match self.submit(followup) {
                        Ok(spawned) => {
                            log::info!("Job {} spawned follow-up job {}", job.id, spawned.id)
                        }
                        Err(e) => {
                            log::error!("Job {} failed to spawn follow-up: {}", job.id, e)
                        }
                    }
                }
                self.ledger
                    .update(&job.id, JobPatch::completed(&outcome.summary));
                progress.log_line("job completed");
            }
            Ok(Err(HandlerError::Cancelled)) => {
                self.ledger.update(&job.id, JobPatch::cancelled());
                progress.log_line("job cancelled");
            }
            Ok(Err(e)) => {
                let message = e.to_string();
                log::warn!("Job {} failed: {}", job.id, message);
                self.ledger.update(&job.id, JobPatch::failed(&message));
                progress.log_line(&format!("job failed: {}", message));
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                log::error!("Handler for job {} panicked: {}", job.id, message);
                self.ledger.update(
                    &job.id,
                    JobPatch::failed(&format!("internal error: {}", message)),
                );
                progress.log_line("job failed: handler panicked");
            }
        }

        self.cancels.remove(&job.id);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
