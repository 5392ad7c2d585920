//! Bounded parallel dispatch of build jobs.

use crate::collector::ResultCollector;
use fanout_core::matrix::JobSpec;
use fanout_core::ports::{JobContext, JobRunner};
use fanout_core::run::{JobResult, JobStatus, Run};
use fanout_core::{Error, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Dispatch settings for one run.
#[derive(Debug, Clone)]
pub struct ScheduleOptions {
    /// Worker pool size.
    pub concurrency: usize,
    /// Stop dispatching after the first failed job.
    pub fail_fast: bool,
    pub recipe: PathBuf,
    /// Each job writes under `output_root/<job id>`.
    pub output_root: PathBuf,
}

/// Hands jobs to a bounded pool of workers.
pub struct Scheduler {
    runner: Arc<dyn JobRunner>,
}

impl Scheduler {
    pub fn new(runner: Arc<dyn JobRunner>) -> Self {
        Self { runner }
    }

    /// Run every job and collect results in submission order.
    ///
    /// With `fail_fast`, the first failure cancels the shared token: jobs not
    /// yet dispatched, and dispatched jobs that have not reached their tool
    /// invocation, end up `skipped`. In-flight tool invocations run to
    /// completion and keep their real result.
    pub async fn run_all(&self, jobs: Vec<JobSpec>, options: &ScheduleOptions) -> Result<Run> {
        if options.concurrency == 0 {
            return Err(Error::Configuration(
                "concurrency must be at least 1".to_string(),
            ));
        }

        let mut run = Run::new(jobs);
        let collector = Arc::new(ResultCollector::new(run.jobs.len()));
        let semaphore = Arc::new(Semaphore::new(options.concurrency));
        let cancel = CancellationToken::new();
        let mut workers = JoinSet::new();

        info!(
            run_id = %run.id,
            jobs = run.jobs.len(),
            concurrency = options.concurrency,
            fail_fast = options.fail_fast,
            runner = self.runner.name(),
            "Starting run"
        );

        for job in &run.jobs {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| Error::Internal("Worker semaphore closed".to_string()))?;

            if cancel.is_cancelled() {
                drop(permit);
                info!(job = %job.id(), "Skipping job after fail-fast");
                collector.record(job.index(), JobResult::skipped(job)).await?;
                continue;
            }

            let ctx = JobContext {
                recipe: options.recipe.clone(),
                output_folder: options.output_root.join(job.id().as_str()),
                cancel: cancel.clone(),
            };
            let job = job.clone();
            let runner = Arc::clone(&self.runner);
            let collector = Arc::clone(&collector);
            let cancel = cancel.clone();
            let fail_fast = options.fail_fast;

            info!(job = %job.id(), name = %job.display_name(), "Dispatching job");

            workers.spawn(async move {
                let result = runner.run(&job, &ctx).await;
                match result.status {
                    JobStatus::Succeeded => {
                        info!(job = %job.id(), duration_ms = result.duration_ms, "Job succeeded")
                    }
                    JobStatus::Failed => {
                        warn!(
                            job = %job.id(),
                            error = ?result.failure.as_ref().map(|f| &f.message),
                            "Job failed"
                        );
                        if fail_fast && !cancel.is_cancelled() {
                            warn!(job = %job.id(), "Fail-fast: cancelling remaining jobs");
                            cancel.cancel();
                        }
                    }
                    JobStatus::Skipped => info!(job = %job.id(), "Job skipped"),
                }
                // Recorded before the permit drops so the dispatcher sees the
                // cancellation when it acquires the freed slot.
                let recorded = collector.record(job.index(), result).await;
                drop(permit);
                recorded
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(recorded) => recorded?,
                Err(e) => {
                    error!(error = %e, "Worker task failed");
                    return Err(Error::Internal(format!("worker task failed: {e}")));
                }
            }
        }

        run.results = collector.take().await?;
        run.aborted = cancel.is_cancelled();
        run.completed_at = Some(chrono::Utc::now());

        info!(
            run_id = %run.id,
            succeeded = run.count(JobStatus::Succeeded),
            failed = run.count(JobStatus::Failed),
            skipped = run.count(JobStatus::Skipped),
            "Run settled"
        );

        Ok(run)
    }
}
