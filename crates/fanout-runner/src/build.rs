//! The build tool job runner.

use crate::artifacts::discover_artifacts;
use crate::process::Invocation;
use crate::runner::{CapturedLog, OutputLine, OutputStream};
use crate::template::TemplateContext;
use async_trait::async_trait;
use fanout_core::config::{BuildConfig, RunConfig};
use fanout_core::matrix::JobSpec;
use fanout_core::ports::{JobContext, JobRunner};
use fanout_core::run::{FailureKind, JobFailure, JobResult};
use fanout_core::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Runs the configured build tool once per job.
///
/// The tool writes into the job's own output folder. A job succeeds when
/// the tool exits zero and at least one artifact was produced.
pub struct BuildToolRunner {
    config: BuildConfig,
    timeout: Duration,
}

enum Outcome {
    Built(Vec<PathBuf>),
    Cancelled,
}

impl BuildToolRunner {
    pub fn new(config: BuildConfig, timeout: Duration) -> Self {
        Self { config, timeout }
    }

    pub fn from_run_config(config: &RunConfig) -> Self {
        Self::new(config.build.clone(), config.job_timeout())
    }

    /// The command line that would run for `job`.
    pub fn invocation(&self, job: &JobSpec, ctx: &JobContext) -> Invocation {
        let template = TemplateContext {
            job,
            recipe: &ctx.recipe,
            output_folder: &ctx.output_folder,
            variant_config: self.config.variant_config.as_deref(),
        };
        let mut env = template.env();
        env.extend(
            self.config
                .env
                .iter()
                .map(|(k, v)| (k.clone(), template.render(v))),
        );
        Invocation {
            program: self.config.program.clone(),
            args: template.render_args(&self.config.args),
            env,
            cwd: None,
        }
    }

    async fn build(&self, job: &JobSpec, ctx: &JobContext, log: &mut CapturedLog) -> Result<Outcome> {
        tokio::fs::create_dir_all(&ctx.output_folder).await?;

        // Last checkpoint before the tool starts.
        if ctx.cancel.is_cancelled() {
            return Ok(Outcome::Cancelled);
        }

        let invocation = self.invocation(job, ctx);
        let (tx, mut rx) = mpsc::channel::<OutputLine>(256);
        let job_id = job.id().clone();
        let drain = tokio::spawn(async move {
            let mut captured = CapturedLog::default();
            while let Some(line) = rx.recv().await {
                match line.stream {
                    OutputStream::Stdout => debug!(job = %job_id, "{}", line.content),
                    OutputStream::Stderr => debug!(job = %job_id, stream = "stderr", "{}", line.content),
                }
                captured.push(line);
            }
            captured
        });

        let executed = invocation.execute(self.timeout, tx).await;
        *log = drain
            .await
            .map_err(|e| Error::Internal(format!("log capture failed: {e}")))?;
        let outcome = executed?;

        if !outcome.success() {
            return Err(Error::ToolInvocation {
                exit_code: outcome.exit_code,
                message: format!("'{}' exited unsuccessfully", self.config.program),
                log_tail: log.tail(self.config.log_tail_lines),
            });
        }

        let artifacts = discover_artifacts(&ctx.output_folder, &self.config.artifact_extensions)?;
        Ok(Outcome::Built(artifacts))
    }
}

#[async_trait]
impl JobRunner for BuildToolRunner {
    async fn run(&self, job: &JobSpec, ctx: &JobContext) -> JobResult {
        if ctx.cancel.is_cancelled() {
            return JobResult::skipped(job);
        }

        let started_at = chrono::Utc::now();
        info!(job = %job.id(), name = %job.display_name(), "Building");

        let mut log = CapturedLog::default();
        match self.build(job, ctx, &mut log).await {
            Ok(Outcome::Cancelled) => JobResult::skipped(job),
            Ok(Outcome::Built(artifacts)) if artifacts.is_empty() => {
                warn!(job = %job.id(), folder = %ctx.output_folder.display(), "Build produced no artifacts");
                let failure = JobFailure {
                    kind: FailureKind::NoArtifacts,
                    message: format!(
                        "no artifacts matching {:?} under {}",
                        self.config.artifact_extensions,
                        ctx.output_folder.display()
                    ),
                    exit_code: Some(0),
                    log_tail: log.tail(self.config.log_tail_lines),
                };
                JobResult::failed(job, failure, log.text(), started_at)
            }
            Ok(Outcome::Built(artifacts)) => {
                info!(job = %job.id(), artifacts = artifacts.len(), "Build succeeded");
                JobResult::succeeded(job, artifacts, log.text(), started_at)
            }
            Err(e) => {
                warn!(job = %job.id(), error = %e, "Build failed");
                let mut failure = JobFailure::from(&e);
                if failure.log_tail.is_empty() {
                    failure.log_tail = log.tail(self.config.log_tail_lines);
                }
                JobResult::failed(job, failure, log.text(), started_at)
            }
        }
    }

    fn name(&self) -> &str {
        "build-tool"
    }
}
