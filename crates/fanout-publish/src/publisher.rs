//! Retrying artifact publisher.

use crate::retry::Backoff;
use fanout_core::artifact::{Artifact, ArtifactOutcome, PublishResult, PublishStatus};
use fanout_core::config::RetryPolicy;
use fanout_core::ports::Uploader;
use fanout_core::secrets::{Channel, Credential};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Uploads a batch of artifacts one at a time.
///
/// Transient failures are retried with exponential backoff up to
/// `max_retries` extra attempts. Permanent failures are recorded after a
/// single attempt. Publishing always carries on to the next artifact.
pub struct Publisher {
    uploader: Arc<dyn Uploader>,
    backoff: Backoff,
}

impl Publisher {
    pub fn new(uploader: Arc<dyn Uploader>, retry: RetryPolicy) -> Self {
        Self {
            uploader,
            backoff: Backoff::new(retry),
        }
    }

    pub fn uploader_name(&self) -> &str {
        self.uploader.name()
    }

    /// Publish every artifact and report one outcome per distinct path.
    pub async fn publish(
        &self,
        artifacts: &[Artifact],
        credential: &Credential,
        channel: &Channel,
    ) -> PublishResult {
        let mut seen = HashSet::new();
        let mut result = PublishResult::default();

        info!(
            artifacts = artifacts.len(),
            channel = %channel,
            uploader = self.uploader.name(),
            "Publishing artifacts"
        );

        for artifact in artifacts {
            if !seen.insert(artifact.path()) {
                debug!(artifact = %artifact.path().display(), "Duplicate artifact ignored");
                continue;
            }
            let outcome = self.publish_one(artifact, credential, channel).await;
            result.outcomes.push(outcome);
        }

        info!(
            uploaded = result.uploaded(),
            failed = result.failed(),
            "Publishing finished"
        );
        result
    }

    async fn publish_one(
        &self,
        artifact: &Artifact,
        credential: &Credential,
        channel: &Channel,
    ) -> ArtifactOutcome {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.uploader.upload(artifact, channel, credential).await {
                Ok(()) => {
                    info!(artifact = %artifact.file_name(), attempts, "Artifact uploaded");
                    return ArtifactOutcome {
                        artifact: artifact.clone(),
                        status: PublishStatus::Uploaded,
                        attempts,
                        error: None,
                    };
                }
                Err(e) => {
                    let message = credential.mask(&e.to_string());
                    if e.is_transient() && self.backoff.should_retry(attempts) {
                        let delay = self.backoff.delay(attempts);
                        warn!(
                            artifact = %artifact.file_name(),
                            attempt = attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %message,
                            "Upload failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    error!(
                        artifact = %artifact.file_name(),
                        attempts,
                        error = %message,
                        "Upload failed"
                    );
                    return ArtifactOutcome {
                        artifact: artifact.clone(),
                        status: PublishStatus::Failed,
                        attempts,
                        error: Some(message),
                    };
                }
            }
        }
    }
}
