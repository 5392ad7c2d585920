//! Artifact and publish outcome types.

use crate::ids::JobId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A build output file eligible for publishing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Artifact {
    pub job_id: JobId,
    pub path: PathBuf,
}

impl Artifact {
    pub fn new(job_id: JobId, path: PathBuf) -> Self {
        Self { job_id, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    Uploaded,
    Failed,
}

/// Result of publishing one artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactOutcome {
    pub artifact: Artifact,
    pub status: PublishStatus,
    /// Upload attempts made, including the first.
    pub attempts: u32,
    pub error: Option<String>,
}

impl ArtifactOutcome {
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }

    pub fn is_success(&self) -> bool {
        self.status == PublishStatus::Uploaded
    }
}

/// Per-artifact outcomes, in the order artifacts were handed in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishResult {
    pub outcomes: Vec<ArtifactOutcome>,
}

impl PublishResult {
    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(|o| !o.is_success())
    }

    pub fn uploaded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.uploaded()
    }
}
