//! Run and job execution types.

use crate::artifact::{Artifact, PublishResult};
use crate::error::Error;
use crate::ids::{JobId, RunId};
use crate::matrix::JobSpec;
use crate::trigger::TriggerKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Succeeded,
    Failed,
    Skipped,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ToolInvocation,
    Timeout,
    NoArtifacts,
    Internal,
}

/// Why a job failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub message: String,
    pub exit_code: Option<i32>,
    /// Last lines of the tool output.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub log_tail: String,
}

impl From<&Error> for JobFailure {
    fn from(err: &Error) -> Self {
        match err {
            Error::ToolInvocation {
                exit_code,
                log_tail,
                ..
            } => Self {
                kind: FailureKind::ToolInvocation,
                message: err.to_string(),
                exit_code: *exit_code,
                log_tail: log_tail.clone(),
            },
            Error::Timeout { .. } => Self {
                kind: FailureKind::Timeout,
                message: err.to_string(),
                exit_code: None,
                log_tail: String::new(),
            },
            other => Self {
                kind: FailureKind::Internal,
                message: other.to_string(),
                exit_code: None,
                log_tail: String::new(),
            },
        }
    }
}

/// Outcome of one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub job_id: JobId,
    pub status: JobStatus,
    /// Produced artifact files, sorted by path.
    pub artifacts: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub log: String,
    pub failure: Option<JobFailure>,
    pub duration_ms: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobResult {
    pub fn succeeded(
        job: &JobSpec,
        artifacts: Vec<PathBuf>,
        log: String,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self::finish(job, JobStatus::Succeeded, artifacts, log, None, started_at)
    }

    pub fn failed(job: &JobSpec, failure: JobFailure, log: String, started_at: DateTime<Utc>) -> Self {
        Self::finish(job, JobStatus::Failed, Vec::new(), log, Some(failure), started_at)
    }

    /// A job that never started.
    pub fn skipped(job: &JobSpec) -> Self {
        Self {
            job_id: job.id().clone(),
            status: JobStatus::Skipped,
            artifacts: Vec::new(),
            log: String::new(),
            failure: None,
            duration_ms: 0,
            started_at: None,
            completed_at: None,
        }
    }

    fn finish(
        job: &JobSpec,
        status: JobStatus,
        artifacts: Vec<PathBuf>,
        log: String,
        failure: Option<JobFailure>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let completed_at = Utc::now();
        let duration_ms = (completed_at - started_at).num_milliseconds().max(0) as u64;
        Self {
            job_id: job.id().clone(),
            status,
            artifacts,
            log,
            failure,
            duration_ms,
            started_at: Some(started_at),
            completed_at: Some(completed_at),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Succeeded
    }

    pub fn is_failure(&self) -> bool {
        self.status == JobStatus::Failed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Failure,
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Success)
    }
}

/// Run controller lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Resolving,
    Running,
    Publishing,
    Done(RunStatus),
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done(_))
    }

    /// Legal forward transitions. Publishing may be bypassed, and any
    /// non-terminal state may fail straight to `Done`.
    pub fn can_transition_to(&self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (Idle, Resolving) => true,
            (Resolving, Running) => true,
            (Running, Publishing) => true,
            (Running, Done(_)) | (Publishing, Done(_)) => true,
            (Idle | Resolving, Done(RunStatus::Failure)) => true,
            _ => false,
        }
    }
}

/// Aggregate of scheduled jobs and their results, in submission order.
#[derive(Debug, Clone, Serialize)]
pub struct Run {
    pub id: RunId,
    pub jobs: Vec<JobSpec>,
    pub results: Vec<JobResult>,
    /// Set when fail-fast stopped dispatching.
    pub aborted: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Run {
    pub fn new(jobs: Vec<JobSpec>) -> Self {
        Self {
            id: RunId::new(),
            jobs,
            results: Vec::new(),
            aborted: false,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn count(&self, status: JobStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn has_failures(&self) -> bool {
        self.results.iter().any(JobResult::is_failure)
    }

    /// Artifacts of successful jobs, job order first, then path order.
    pub fn artifacts(&self) -> Vec<Artifact> {
        self.results
            .iter()
            .filter(|r| r.is_success())
            .flat_map(|r| {
                r.artifacts
                    .iter()
                    .map(|path| Artifact::new(r.job_id.clone(), path.clone()))
            })
            .collect()
    }

    /// Pairs each job with its result.
    pub fn entries(&self) -> impl Iterator<Item = (&JobSpec, &JobResult)> {
        self.jobs.iter().zip(self.results.iter())
    }
}

/// Final, user-facing summary of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run: Run,
    pub trigger: TriggerKind,
    pub publish: Option<PublishResult>,
    /// Publishing was requested but skipped (dry run).
    pub publish_skipped: bool,
    pub tolerate_partial_failure: bool,
    pub status: RunStatus,
}

impl RunReport {
    pub fn new(
        run: Run,
        trigger: TriggerKind,
        publish: Option<PublishResult>,
        tolerate_partial_failure: bool,
    ) -> Self {
        let jobs_failed = run.has_failures() && !tolerate_partial_failure;
        let publish_failed = publish.as_ref().is_some_and(PublishResult::has_failures);
        let status = if jobs_failed || publish_failed || run.aborted {
            RunStatus::Failure
        } else {
            RunStatus::Success
        };
        Self {
            run,
            trigger,
            publish,
            publish_skipped: false,
            tolerate_partial_failure,
            status,
        }
    }

    /// Process exit code: 0 success, 1 job failure, 3 publish failure only.
    pub fn exit_code(&self) -> i32 {
        let jobs_failed =
            self.run.aborted || (self.run.has_failures() && !self.tolerate_partial_failure);
        if jobs_failed {
            1
        } else if self
            .publish
            .as_ref()
            .is_some_and(PublishResult::has_failures)
        {
            3
        } else {
            0
        }
    }
}
