//! Run configuration.
//!
//! Loaded once from YAML at startup, validated, then shared read-only for the
//! duration of the run.

use crate::matrix::MatrixConfig;
use crate::trigger::TriggerKind;
use crate::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Placeholders understood by build argument templates, besides `axis.<name>`.
pub const BUILD_PLACEHOLDERS: &[&str] = &[
    "recipe",
    "output_folder",
    "variant_config",
    "variants",
    "job_id",
];

/// Placeholders understood by upload command templates.
pub const UPLOAD_PLACEHOLDERS: &[&str] = &["user", "artifact"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub matrix: MatrixConfig,
    /// Maximum number of jobs running at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_true")]
    pub fail_fast: bool,
    /// Job failures alone do not fail the run.
    #[serde(default)]
    pub tolerate_partial_failure: bool,
    #[serde(default = "default_job_timeout")]
    pub job_timeout_secs: u64,
    /// Root of the per-job output folders.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub publish: PublishConfig,
}

fn default_concurrency() -> usize {
    2
}

fn default_true() -> bool {
    true
}

fn default_job_timeout() -> u64 {
    3600
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("build-output")
}

/// External build tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default = "default_build_program")]
    pub program: String,
    /// Argument template, see [`BUILD_PLACEHOLDERS`].
    #[serde(default = "default_build_args")]
    pub args: Vec<String>,
    pub variant_config: Option<PathBuf>,
    #[serde(default = "default_artifact_extensions")]
    pub artifact_extensions: Vec<String>,
    /// Extra environment for the build tool.
    #[serde(default)]
    pub env: IndexMap<String, String>,
    #[serde(default = "default_log_tail_lines")]
    pub log_tail_lines: usize,
}

fn default_build_program() -> String {
    "conda".to_string()
}

fn default_build_args() -> Vec<String> {
    [
        "build",
        "{recipe}",
        "--output-folder",
        "{output_folder}",
        "--variant-config-files",
        "{variant_config}",
        "--variants",
        "{variants}",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_artifact_extensions() -> Vec<String> {
    vec![".tar.bz2".to_string(), ".conda".to_string()]
}

fn default_log_tail_lines() -> usize {
    20
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            program: default_build_program(),
            args: default_build_args(),
            variant_config: None,
            artifact_extensions: default_artifact_extensions(),
            env: IndexMap::new(),
            log_tail_lines: default_log_tail_lines(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Owner of the uploaded packages. Required when a run publishes.
    pub target_user: Option<String>,
    /// Trigger kinds that publish.
    #[serde(default = "default_publish_on")]
    pub publish_on: Vec<TriggerKind>,
    /// Environment variable holding the upload credential.
    #[serde(default = "default_credential_env")]
    pub credential_env: String,
    #[serde(default)]
    pub uploader: UploaderConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_publish_on() -> Vec<TriggerKind> {
    vec![TriggerKind::Release]
}

fn default_credential_env() -> String {
    "ANACONDA_API_TOKEN".to_string()
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            target_user: None,
            publish_on: default_publish_on(),
            credential_env: default_credential_env(),
            uploader: UploaderConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl PublishConfig {
    pub fn publishes_on(&self, kind: TriggerKind) -> bool {
        self.publish_on.contains(&kind)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UploaderConfig {
    Command(CommandUploaderConfig),
    Http(HttpUploaderConfig),
}

impl Default for UploaderConfig {
    fn default() -> Self {
        UploaderConfig::Command(CommandUploaderConfig::default())
    }
}

/// External upload CLI, invoked once per artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandUploaderConfig {
    #[serde(default = "default_upload_program")]
    pub program: String,
    /// Argument template, see [`UPLOAD_PLACEHOLDERS`].
    #[serde(default = "default_upload_args")]
    pub args: Vec<String>,
    /// Variable through which the child process receives the credential.
    #[serde(default = "default_credential_env")]
    pub token_env: String,
    #[serde(default = "default_upload_timeout")]
    pub timeout_secs: u64,
}

fn default_upload_program() -> String {
    "anaconda".to_string()
}

fn default_upload_args() -> Vec<String> {
    ["upload", "--user", "{user}", "{artifact}"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_upload_timeout() -> u64 {
    600
}

impl Default for CommandUploaderConfig {
    fn default() -> Self {
        Self {
            program: default_upload_program(),
            args: default_upload_args(),
            token_env: default_credential_env(),
            timeout_secs: default_upload_timeout(),
        }
    }
}

/// HTTP channel API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpUploaderConfig {
    /// Base URL; artifacts go to `{url}/{target_user}/{file_name}`.
    pub url: String,
    #[serde(default = "default_upload_timeout")]
    pub timeout_secs: u64,
}

/// Retry policy for transient upload failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    #[serde(default = "default_true")]
    pub jitter: bool,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    30_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): the base doubles per
    /// retry and is capped at `max_delay_ms`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(32);
        let delay = self.base_delay_ms.saturating_mul(1u64 << exp);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

/// Command-line overrides applied on top of the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub concurrency: Option<usize>,
    pub fail_fast: Option<bool>,
    pub job_timeout_secs: Option<u64>,
    pub output_dir: Option<PathBuf>,
}

impl RunConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn apply(&mut self, overrides: &ConfigOverrides) {
        if let Some(concurrency) = overrides.concurrency {
            self.concurrency = concurrency;
        }
        if let Some(fail_fast) = overrides.fail_fast {
            self.fail_fast = fail_fast;
        }
        if let Some(timeout) = overrides.job_timeout_secs {
            self.job_timeout_secs = timeout;
        }
        if let Some(dir) = &overrides.output_dir {
            self.output_dir = dir.clone();
        }
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    /// Check everything that can be checked without touching the matrix
    /// values. Matrix checks live with the axis resolver.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::Configuration(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.job_timeout_secs == 0 {
            return Err(Error::Configuration(
                "job_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.build.program.trim().is_empty() {
            return Err(Error::Configuration("build.program is empty".to_string()));
        }
        for arg in &self.build.args {
            for name in placeholders(arg) {
                let known = BUILD_PLACEHOLDERS.contains(&name)
                    || name
                        .strip_prefix("axis.")
                        .is_some_and(|axis| self.matrix.axes.contains_key(axis));
                if !known {
                    return Err(Error::Configuration(format!(
                        "unknown placeholder {{{name}}} in build.args"
                    )));
                }
            }
        }
        let retry = &self.publish.retry;
        if retry.base_delay_ms > retry.max_delay_ms {
            return Err(Error::Configuration(format!(
                "retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                retry.base_delay_ms, retry.max_delay_ms
            )));
        }
        match &self.publish.uploader {
            UploaderConfig::Command(cmd) => {
                if cmd.program.trim().is_empty() {
                    return Err(Error::Configuration(
                        "publish.uploader.program is empty".to_string(),
                    ));
                }
                for name in cmd.args.iter().flat_map(|a| placeholders(a)) {
                    if !UPLOAD_PLACEHOLDERS.contains(&name) {
                        return Err(Error::Configuration(format!(
                            "unknown placeholder {{{name}}} in publish.uploader.args"
                        )));
                    }
                }
            }
            UploaderConfig::Http(http) => {
                if !(http.url.starts_with("http://") || http.url.starts_with("https://")) {
                    return Err(Error::Configuration(format!(
                        "publish.uploader.url is not an http(s) URL: {}",
                        http.url
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Names of `{placeholder}` tokens in a template argument.
pub fn placeholders(template: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                names.push(&after[..end]);
                rest = &after[end + 1..];
            }
            None => break,
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MINIMAL: &str = r#"
matrix:
  axes:
    python: ["3.8", "3.9"]
    os: [ubuntu-latest, macos-latest]
"#;

    #[test]
    fn test_defaults() {
        let config = RunConfig::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.concurrency, 2);
        assert!(config.fail_fast);
        assert!(!config.tolerate_partial_failure);
        assert_eq!(config.job_timeout_secs, 3600);
        assert_eq!(config.output_dir, PathBuf::from("build-output"));
        assert_eq!(config.build.program, "conda");
        assert_eq!(config.publish.publish_on, vec![TriggerKind::Release]);
        assert_eq!(config.publish.retry, RetryPolicy::default());
        assert!(matches!(config.publish.uploader, UploaderConfig::Command(_)));
        config.validate().unwrap();
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
matrix:
  axes:
    python: ["3.10", "3.11"]
  exclude:
    - python: "3.10"
concurrency: 4
fail_fast: false
tolerate_partial_failure: true
job_timeout_secs: 120
output_dir: out
build:
  program: rattler-build
  args: ["build", "--recipe", "{recipe}", "--output-dir", "{output_folder}", "--python={axis.python}"]
  artifact_extensions: [".conda"]
  env:
    CONDA_BLD_PATH: /tmp/bld
publish:
  target_user: sbck
  publish_on: [release, manual]
  credential_env: CHANNEL_TOKEN
  uploader:
    kind: http
    url: https://upload.example.org/api
  retry:
    max_retries: 5
    base_delay_ms: 10
    max_delay_ms: 100
    jitter: false
"#;
        let config = RunConfig::from_yaml(yaml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.concurrency, 4);
        assert!(!config.fail_fast);
        assert_eq!(config.build.env["CONDA_BLD_PATH"], "/tmp/bld");
        assert!(config.publish.publishes_on(TriggerKind::Manual));
        assert_eq!(config.publish.target_user.as_deref(), Some("sbck"));
        match &config.publish.uploader {
            UploaderConfig::Http(http) => assert_eq!(http.url, "https://upload.example.org/api"),
            other => panic!("unexpected uploader: {other:?}"),
        }
        assert_eq!(config.publish.retry.max_retries, 5);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = RunConfig::from_yaml(MINIMAL).unwrap();
        config.concurrency = 0;
        assert!(config.validate().unwrap_err().is_configuration());

        let mut config = RunConfig::from_yaml(MINIMAL).unwrap();
        config.job_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = RunConfig::from_yaml(MINIMAL).unwrap();
        config.publish.retry.base_delay_ms = 10_000;
        config.publish.retry.max_delay_ms = 10;
        assert!(config.validate().is_err());

        let mut config = RunConfig::from_yaml(MINIMAL).unwrap();
        config.build.args.push("{axis.compiler}".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("axis.compiler"));
    }

    #[test]
    fn test_overrides() {
        let mut config = RunConfig::from_yaml(MINIMAL).unwrap();
        config.apply(&ConfigOverrides {
            concurrency: Some(8),
            fail_fast: Some(false),
            job_timeout_secs: None,
            output_dir: Some(PathBuf::from("dist")),
        });
        assert_eq!(config.concurrency, 8);
        assert!(!config.fail_fast);
        assert_eq!(config.job_timeout_secs, 3600);
        assert_eq!(config.output_dir, PathBuf::from("dist"));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay_ms: 100,
            max_delay_ms: 1000,
            jitter: false,
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(5), Duration::from_millis(1000));
        assert_eq!(policy.backoff(64), Duration::from_millis(1000));
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders("--python={axis.python}"), vec!["axis.python"]);
        assert_eq!(placeholders("{a}-{b}"), vec!["a", "b"]);
        assert!(placeholders("plain").is_empty());
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = RunConfig::from_file(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(err.is_configuration());
    }
}
