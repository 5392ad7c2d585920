//! Upload through an external command-line client.

use async_trait::async_trait;
use fanout_core::artifact::Artifact;
use fanout_core::config::CommandUploaderConfig;
use fanout_core::ports::Uploader;
use fanout_core::secrets::{Channel, Credential};
use fanout_core::{Error, Result};
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{Duration, timeout};
use tracing::{debug, info};

/// Runs the configured upload command once per artifact.
///
/// The credential is handed to the child through `token_env` and never
/// appears on the command line. Failures are classified from the exit
/// status and the tool's output.
pub struct CommandUploader {
    config: CommandUploaderConfig,
}

impl CommandUploader {
    pub fn new(config: CommandUploaderConfig) -> Self {
        Self { config }
    }

    fn render_args(&self, artifact: &Artifact, channel: &Channel) -> Vec<String> {
        let artifact_path = artifact.path().display().to_string();
        self.config
            .args
            .iter()
            .map(|arg| {
                arg.replace("{user}", &channel.target_user)
                    .replace("{artifact}", &artifact_path)
            })
            .collect()
    }
}

const AUTH_MARKERS: &[&str] = &["unauthorized", "authentication", "invalid token", "forbidden"];
const CONFLICT_MARKERS: &[&str] = &["conflict", "already exists"];
const REJECTED_MARKERS: &[&str] = &["invalid package", "bad request"];

const AUTH_CODES: &[&str] = &["401", "403"];
const CONFLICT_CODES: &[&str] = &["409"];
const REJECTED_CODES: &[&str] = &["400", "404", "422"];

/// Words that introduce an HTTP status in client output, e.g. `HTTP 401`.
const STATUS_PREFIXES: &[&str] = &["http", "httperror", "status", "code", "error"];

/// Status codes written as `HTTP 409`, `status: 401` and the like.
///
/// Digits inside file names, hashes or byte counts are not status codes.
fn status_codes(lower: &str) -> Vec<&str> {
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    words
        .windows(2)
        .filter(|pair| {
            STATUS_PREFIXES.contains(&pair[0])
                && pair[1].len() == 3
                && pair[1].bytes().all(|b| b.is_ascii_digit())
        })
        .map(|pair| pair[1])
        .collect()
}

/// Map a failed upload's output onto the publish error kinds.
fn classify(exit_code: Option<i32>, output: &str) -> Error {
    let lower = output.to_lowercase();
    let codes = status_codes(&lower);
    let detail = format!(
        "upload exited with {}: {}",
        exit_code.map_or_else(|| "signal".to_string(), |c| c.to_string()),
        output.trim()
    );
    let mentions = |phrases: &[&str], status: &[&str]| {
        phrases.iter().any(|p| lower.contains(p)) || codes.iter().any(|c| status.contains(c))
    };

    if mentions(AUTH_MARKERS, AUTH_CODES) {
        Error::Authentication(detail)
    } else if mentions(CONFLICT_MARKERS, CONFLICT_CODES) {
        Error::Conflict(detail)
    } else if mentions(REJECTED_MARKERS, REJECTED_CODES) {
        Error::Rejected(detail)
    } else {
        Error::Network(detail)
    }
}

#[async_trait]
impl Uploader for CommandUploader {
    async fn upload(
        &self,
        artifact: &Artifact,
        channel: &Channel,
        credential: &Credential,
    ) -> Result<()> {
        let args = self.render_args(artifact, channel);
        info!(
            program = %self.config.program,
            artifact = %artifact.file_name(),
            channel = %channel,
            "Running upload command"
        );

        let child = Command::new(&self.config.program)
            .args(&args)
            .env(&self.config.token_env, credential.expose())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => Error::Rejected(format!(
                    "upload program '{}' not found",
                    self.config.program
                )),
                _ => Error::Network(format!("failed to start upload program: {e}")),
            })?;

        let output = match timeout(
            Duration::from_secs(self.config.timeout_secs),
            child.wait_with_output(),
        )
        .await
        {
            Ok(output) => output.map_err(|e| Error::Network(format!("upload failed: {e}")))?,
            Err(_) => {
                return Err(Error::Network(format!(
                    "upload timed out after {}s",
                    self.config.timeout_secs
                )));
            }
        };

        let combined = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        let combined = credential.mask(&combined);
        debug!(exit_code = ?output.status.code(), output = %combined.trim(), "Upload command finished");

        if output.status.success() {
            Ok(())
        } else {
            Err(classify(output.status.code(), &combined))
        }
    }

    fn name(&self) -> &str {
        "command"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanout_core::JobId;
    use std::path::PathBuf;

    fn uploader(script: &str) -> CommandUploader {
        CommandUploader::new(CommandUploaderConfig {
            program: "sh".into(),
            args: vec!["-c".into(), script.into(), "upload".into(), "{user}".into(), "{artifact}".into()],
            token_env: "FANOUT_TEST_TOKEN".into(),
            timeout_secs: 5,
        })
    }

    fn artifact() -> Artifact {
        Artifact::new(
            JobId::derive([("python", "3.9")]),
            PathBuf::from("/tmp/out/pkg-1.0-0.tar.bz2"),
        )
    }

    #[test]
    fn test_classify() {
        assert!(matches!(classify(Some(1), "HTTP 401 Unauthorized"), Error::Authentication(_)));
        assert!(matches!(
            classify(Some(1), "Conflict: file already exists"),
            Error::Conflict(_)
        ));
        assert!(matches!(classify(Some(1), "400 Bad Request"), Error::Rejected(_)));
        assert!(matches!(classify(Some(1), "connection reset by peer"), Error::Network(_)));
        assert!(matches!(classify(None, ""), Error::Network(_)));
    }

    #[test]
    fn test_digits_in_file_names_are_not_status_codes() {
        let output = "Uploading pkg-1.4.0-py39h1401abc_0.tar.bz2 (4003 bytes)\n\
                      ConnectionResetError: connection reset by peer";
        let err = classify(Some(1), output);
        assert!(matches!(err, Error::Network(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_status_codes_after_http_prefix() {
        assert!(matches!(classify(Some(1), "HTTPError: 409"), Error::Conflict(_)));
        assert!(matches!(classify(Some(1), "server said status=403"), Error::Authentication(_)));
        assert!(matches!(classify(Some(1), "HTTP 404 for /my-org"), Error::Rejected(_)));
        assert!(matches!(classify(Some(1), "wrote 409 bytes, then EOF"), Error::Network(_)));
    }

    #[test]
    fn test_render_args() {
        let up = uploader("true");
        let args = up.render_args(&artifact(), &Channel::new("my-org"));
        assert_eq!(args[3], "my-org");
        assert_eq!(args[4], "/tmp/out/pkg-1.0-0.tar.bz2");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_token_is_passed_through_environment() {
        let up = uploader(r#"test "$FANOUT_TEST_TOKEN" = "tok" && test "$1" = "my-org""#);
        up.upload(&artifact(), &Channel::new("my-org"), &Credential::new("tok"))
            .await
            .unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failure_output_is_classified_and_masked() {
        let up = uploader(r#"echo "401 unauthorized for $FANOUT_TEST_TOKEN" >&2; exit 1"#);
        let err = up
            .upload(&artifact(), &Channel::new("my-org"), &Credential::new("tok-123"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
        assert!(!err.to_string().contains("tok-123"));
    }

    #[tokio::test]
    async fn test_missing_program_is_permanent() {
        let up = CommandUploader::new(CommandUploaderConfig {
            program: "fanout-surely-missing-uploader".into(),
            ..CommandUploaderConfig::default()
        });
        let err = up
            .upload(&artifact(), &Channel::new("my-org"), &Credential::new("tok"))
            .await
            .unwrap_err();
        assert!(!err.is_transient());
    }
}
