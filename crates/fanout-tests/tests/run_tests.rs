//! End-to-end runs of the controller against the scripted build tool.
//!
//! Run with: `cargo test -p fanout-tests --test run_tests`

#![cfg(unix)]

use fanout_core::config::RunConfig;
use fanout_core::run::{FailureKind, JobStatus, RunState, RunStatus};
use fanout_core::secrets::Credential;
use fanout_core::trigger::TriggerKind;
use fanout_publish::Publisher;
use fanout_runner::BuildToolRunner;
use fanout_scheduler::RunController;
use fanout_tests::{AXES_2X2, BuildScript, RecordingUploader, WorkspaceFixture, fast_retry, init_test_logging};
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::sync::Arc;

fn controller(config: RunConfig, uploader: Arc<RecordingUploader>) -> RunController {
    let runner = Arc::new(BuildToolRunner::from_run_config(&config));
    let publisher = Publisher::new(uploader, config.publish.retry.clone());
    RunController::new(Arc::new(config), runner)
        .with_publisher(publisher, Credential::new("s3cr3t-token"))
}

#[tokio::test]
async fn test_release_builds_matrix_and_publishes_every_artifact() {
    init_test_logging();
    let ws = WorkspaceFixture::new().unwrap();
    let config = ws.write_config(&ws.config_yaml(AXES_2X2, "")).unwrap();
    let uploader = Arc::new(RecordingUploader::new());
    let mut controller = controller(config, uploader.clone());

    let report = controller.handle(&ws.trigger(TriggerKind::Release)).await.unwrap();

    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.run.count(JobStatus::Succeeded), 4);
    assert_eq!(
        uploader.uploaded(),
        vec![
            "pkg-py3.8-ubuntu.conda",
            "pkg-py3.8-macos.conda",
            "pkg-py3.9-ubuntu.conda",
            "pkg-py3.9-macos.conda",
        ]
    );
    let folders: HashSet<_> = report
        .run
        .results
        .iter()
        .map(|r| r.artifacts[0].parent().unwrap().parent().unwrap().to_path_buf())
        .collect();
    assert_eq!(folders.len(), 4, "each job writes to its own folder");
    assert_eq!(controller.state(), RunState::Done(RunStatus::Success));
}

#[tokio::test]
async fn test_fail_fast_skips_jobs_after_first_failure() {
    init_test_logging();
    let script = BuildScript::failing(&["3.8-macos"]).slow("3.8-ubuntu", 1.0);
    let ws = WorkspaceFixture::with_script(&script).unwrap();
    let config = ws
        .write_config(&ws.config_yaml(AXES_2X2, "concurrency: 2\nfail_fast: true\n"))
        .unwrap();
    let uploader = Arc::new(RecordingUploader::new());
    let mut controller = controller(config, uploader.clone());

    let report = controller.handle(&ws.trigger(TriggerKind::Release)).await.unwrap();

    let statuses: Vec<_> = report.run.results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            JobStatus::Succeeded,
            JobStatus::Failed,
            JobStatus::Skipped,
            JobStatus::Skipped,
        ]
    );
    assert_eq!(report.status, RunStatus::Failure);
    assert_eq!(report.exit_code(), 1);
    assert!(uploader.attempts().is_empty());

    let failure = report.run.results[1].failure.as_ref().unwrap();
    assert_eq!(failure.kind, FailureKind::ToolInvocation);
    assert_eq!(failure.exit_code, Some(1));
    assert!(failure.log_tail.contains("build of 3.8-macos broke"));
}

#[tokio::test]
async fn test_without_fail_fast_successful_artifacts_are_still_published() {
    init_test_logging();
    let ws = WorkspaceFixture::with_script(&BuildScript::failing(&["3.9-ubuntu"])).unwrap();
    let config = ws
        .write_config(&ws.config_yaml(AXES_2X2, "fail_fast: false\n"))
        .unwrap();
    let uploader = Arc::new(RecordingUploader::new());
    let mut controller = controller(config, uploader.clone());

    let report = controller.handle(&ws.trigger(TriggerKind::Release)).await.unwrap();

    assert_eq!(report.run.count(JobStatus::Skipped), 0);
    assert_eq!(report.run.count(JobStatus::Failed), 1);
    assert_eq!(uploader.uploaded().len(), 3);
    // Job failures outrank publish results.
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn test_transient_upload_failures_are_retried() {
    init_test_logging();
    let ws = WorkspaceFixture::new().unwrap();
    let config = ws
        .write_config(&ws.config_yaml("    python: ['3.8', '3.9']\n    os: [ubuntu]\n", ""))
        .unwrap();
    let uploader =
        Arc::new(RecordingUploader::new().fail_transiently("pkg-py3.9-ubuntu.conda", 2));
    let mut controller = controller(config, uploader.clone());

    let report = controller.handle(&ws.trigger(TriggerKind::Release)).await.unwrap();

    let publish = report.publish.as_ref().unwrap();
    assert!(!publish.has_failures());
    assert_eq!(publish.outcomes[0].retries(), 0);
    assert_eq!(publish.outcomes[1].retries(), 2);
    assert_eq!(uploader.attempts().len(), 4);
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn test_permanent_upload_failure_exits_three() {
    init_test_logging();
    let ws = WorkspaceFixture::new().unwrap();
    let config = ws.write_config(&ws.config_yaml(AXES_2X2, "")).unwrap();
    let uploader = Arc::new(RecordingUploader::new().conflict("pkg-py3.8-macos.conda"));
    let mut controller = controller(config, uploader.clone());

    let report = controller.handle(&ws.trigger(TriggerKind::Release)).await.unwrap();

    let publish = report.publish.as_ref().unwrap();
    assert_eq!(publish.failed(), 1);
    assert_eq!(publish.uploaded(), 3);
    let conflicted = uploader
        .attempts()
        .iter()
        .filter(|a| a.as_str() == "pkg-py3.8-macos.conda")
        .count();
    assert_eq!(conflicted, 1, "permanent failures are not retried");
    assert_eq!(report.exit_code(), 3);
}

#[tokio::test]
async fn test_job_without_artifacts_fails() {
    init_test_logging();
    let ws = WorkspaceFixture::with_script(&BuildScript::empty(&["3.8-ubuntu"])).unwrap();
    let config = ws
        .write_config(&ws.config_yaml("    python: ['3.8']\n    os: [ubuntu]\n", ""))
        .unwrap();
    let mut controller = controller(config, Arc::new(RecordingUploader::new()));

    let report = controller.handle(&ws.trigger(TriggerKind::Manual)).await.unwrap();

    let failure = report.run.results[0].failure.as_ref().unwrap();
    assert_eq!(failure.kind, FailureKind::NoArtifacts);
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn test_bad_exclusion_fails_before_any_job_runs() {
    init_test_logging();
    let ws = WorkspaceFixture::new().unwrap();
    let yaml = format!(
        "matrix:\n  axes:\n{AXES_2X2}  exclude:\n    - {{python: '2.7'}}\noutput_dir: {}\n",
        ws.output_dir().display()
    );
    let config = ws.write_config(&yaml).unwrap();
    let mut controller = controller(config, Arc::new(RecordingUploader::new()));

    let err = controller
        .handle(&ws.trigger(TriggerKind::Manual))
        .await
        .unwrap_err();

    assert!(err.is_configuration());
    assert!(!ws.output_dir().exists());
    assert_eq!(
        controller.history(),
        &[
            RunState::Idle,
            RunState::Resolving,
            RunState::Done(RunStatus::Failure)
        ]
    );
}

#[tokio::test]
async fn test_report_json_never_contains_the_credential() {
    init_test_logging();
    let ws = WorkspaceFixture::new().unwrap();
    let config = ws
        .write_config(&ws.config_yaml("    python: ['3.8']\n    os: [ubuntu]\n", ""))
        .unwrap();
    let uploader = Arc::new(RecordingUploader::new().script(
        "pkg-py3.8-ubuntu.conda",
        vec![fanout_core::Error::Authentication("401".to_string())],
    ));
    let mut controller = controller(config, uploader);

    let report = controller.handle(&ws.trigger(TriggerKind::Release)).await.unwrap();
    let json = serde_json::to_string(&report).unwrap();

    assert_eq!(report.exit_code(), 3);
    assert!(json.contains("***"));
    assert!(!json.contains("s3cr3t-token"));
}
