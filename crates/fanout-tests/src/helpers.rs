//! Fake uploaders and small helpers.

use async_trait::async_trait;
use fanout_core::artifact::Artifact;
use fanout_core::config::RetryPolicy;
use fanout_core::ports::Uploader;
use fanout_core::secrets::{Channel, Credential};
use fanout_core::{Error, Result};
use std::collections::HashMap;
use std::sync::Mutex;

/// Uploader that records every attempt and fails on cue.
///
/// Scripted errors are keyed by file name and consumed one per attempt;
/// once a file's script is empty its uploads succeed.
#[derive(Default)]
pub struct RecordingUploader {
    script: Mutex<HashMap<String, Vec<Error>>>,
    attempts: Mutex<Vec<String>>,
    uploaded: Mutex<Vec<String>>,
}

impl RecordingUploader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `times` uploads of `file_name` with a transient error.
    pub fn fail_transiently(self, file_name: &str, times: usize) -> Self {
        let errors = (0..times)
            .map(|_| Error::Network("connection reset by peer".to_string()))
            .collect();
        self.script(file_name, errors)
    }

    /// Reject `file_name` permanently as a duplicate.
    pub fn conflict(self, file_name: &str) -> Self {
        let error = Error::Conflict(format!("{file_name} already exists"));
        self.script(file_name, vec![error])
    }

    pub fn script(self, file_name: &str, errors: Vec<Error>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.insert(file_name.to_string(), errors);
        }
        self
    }

    /// File names of every attempt, in order.
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().map(|a| a.clone()).unwrap_or_default()
    }

    /// File names of successful uploads, in order.
    pub fn uploaded(&self) -> Vec<String> {
        self.uploaded.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Uploader for RecordingUploader {
    async fn upload(
        &self,
        artifact: &Artifact,
        _channel: &Channel,
        credential: &Credential,
    ) -> Result<()> {
        let name = artifact.file_name();
        self.attempts
            .lock()
            .map_err(|_| Error::Internal("attempt log poisoned".to_string()))?
            .push(name.clone());

        let scripted = self
            .script
            .lock()
            .map_err(|_| Error::Internal("upload script poisoned".to_string()))?
            .get_mut(&name)
            .filter(|errors| !errors.is_empty())
            .map(|errors| errors.remove(0));
        if let Some(err) = scripted {
            // Echo the secret back the way a careless server would.
            return Err(match err {
                Error::Authentication(msg) => {
                    Error::Authentication(format!("{msg} (token {})", credential.expose()))
                }
                other => other,
            });
        }

        self.uploaded
            .lock()
            .map_err(|_| Error::Internal("upload log poisoned".to_string()))?
            .push(name);
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Retry policy with millisecond delays.
pub fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay_ms: 1,
        max_delay_ms: 5,
        jitter: false,
    }
}
