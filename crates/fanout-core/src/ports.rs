//! Port traits.
//!
//! These traits define the interfaces between the orchestration core and the
//! adapters that talk to external tools and services.

use crate::Result;
use crate::artifact::Artifact;
use crate::matrix::JobSpec;
use crate::run::JobResult;
use crate::secrets::{Channel, Credential};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Per-job execution context.
#[derive(Debug, Clone)]
pub struct JobContext {
    /// Recipe location from the trigger.
    pub recipe: PathBuf,
    /// Job-scoped output folder. No two jobs share one.
    pub output_folder: PathBuf,
    /// Cancelled when the run is failing fast.
    pub cancel: CancellationToken,
}

/// Executes one build job.
///
/// Build failures are reported through the returned [`JobResult`], never as
/// an error, so the scheduler can carry on with the remaining jobs.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, job: &JobSpec, ctx: &JobContext) -> JobResult;

    /// Runner name for logging.
    fn name(&self) -> &str;
}

/// Uploads a single artifact to a channel.
///
/// Implementations classify failures: [`crate::Error::Network`] is retried by
/// the publisher, every other error is permanent.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(
        &self,
        artifact: &Artifact,
        channel: &Channel,
        credential: &Credential,
    ) -> Result<()>;

    /// Uploader name for logging.
    fn name(&self) -> &str;
}
