//! Serialized shapes of configuration and run report types.

use fanout_core::artifact::{Artifact, ArtifactOutcome, PublishResult, PublishStatus};
use fanout_core::config::{RunConfig, UploaderConfig};
use fanout_core::matrix::JobSpec;
use fanout_core::run::*;
use fanout_core::trigger::TriggerKind;
use pretty_assertions::assert_eq;
use std::path::PathBuf;

#[test]
fn test_scalar_axis_values_are_normalised() {
    let config = RunConfig::from_yaml(
        "matrix:\n  axes:\n    python: [3.8, '3.10']\n    shards: [1, 2]\n    debug: [true, false]\n",
    )
    .unwrap();

    let axes = config.matrix.axes();
    let values: Vec<Vec<&str>> = axes
        .iter()
        .map(|a| a.values.iter().map(|v| v.as_str()).collect())
        .collect();
    assert_eq!(
        values,
        vec![vec!["3.8", "3.10"], vec!["1", "2"], vec!["true", "false"]]
    );
}

#[test]
fn test_unquoted_versions_keep_written_text() {
    let config =
        RunConfig::from_yaml("matrix:\n  axes:\n    python: [3.9, 3.10, 3.1]\n").unwrap();

    let values: Vec<&str> = config.matrix.axes.values().flatten().map(|v| v.as_str()).collect();
    assert_eq!(values, vec!["3.9", "3.10", "3.1"]);
}

#[test]
fn test_uploader_kind_tag() {
    let config = RunConfig::from_yaml(
        "matrix:\n  axes: {}\npublish:\n  uploader:\n    kind: http\n    url: https://upload.example.org/api\n",
    )
    .unwrap();
    match config.publish.uploader {
        UploaderConfig::Http(http) => assert_eq!(http.url, "https://upload.example.org/api"),
        other => panic!("expected http uploader, got {other:?}"),
    }
}

#[test]
fn test_report_json_shape() {
    let jobs = vec![
        JobSpec::new(0, vec![("python".into(), "3.8".into())]),
        JobSpec::new(1, vec![("python".into(), "3.9".into())]),
    ];
    let mut run = Run::new(jobs.clone());
    let now = chrono::Utc::now();
    let pkg = PathBuf::from("out/pkg.conda");
    run.results = vec![
        JobResult::succeeded(&jobs[0], vec![pkg.clone()], "ok".into(), now),
        JobResult::skipped(&jobs[1]),
    ];
    let publish = PublishResult {
        outcomes: vec![ArtifactOutcome {
            artifact: Artifact::new(jobs[0].id().clone(), pkg),
            status: PublishStatus::Uploaded,
            attempts: 1,
            error: None,
        }],
    };
    let report = RunReport::new(run, TriggerKind::Release, Some(publish), false);

    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["status"], "success");
    assert_eq!(json["trigger"], "release");
    assert_eq!(json["run"]["results"][0]["status"], "succeeded");
    assert_eq!(json["run"]["results"][1]["status"], "skipped");
    assert_eq!(json["run"]["results"][0]["job_id"], jobs[0].id().as_str());
    assert_eq!(json["publish"]["outcomes"][0]["status"], "uploaded");
    assert!(json["run"]["id"].is_string());
}

#[test]
fn test_failure_kind_serialises_snake_case() {
    let failure = JobFailure {
        kind: FailureKind::NoArtifacts,
        message: "nothing built".into(),
        exit_code: Some(0),
        log_tail: String::new(),
    };
    let json = serde_json::to_value(&failure).unwrap();
    assert_eq!(json["kind"], "no_artifacts");
    assert!(json.get("log_tail").is_none());
}
