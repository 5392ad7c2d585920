//! Command handlers.
//!
//! Each handler returns the process exit code: 0 success, 1 job failure,
//! 2 configuration error, 3 publish failure only.

use crate::commands::{ConfigArgs, RunArgs};
use crate::{config, summary};
use anyhow::Context;
use console::style;
use fanout_core::config::ConfigOverrides;
use fanout_core::run::RunReport;
use fanout_core::trigger::Trigger;
use fanout_publish::{Publisher, create_uploader};
use fanout_runner::BuildToolRunner;
use fanout_scheduler::{AxisResolver, RunController};
use std::sync::Arc;
use tracing::error;

pub const EXIT_JOB_FAILURE: u8 = 1;
pub const EXIT_CONFIGURATION: u8 = 2;

/// Exit code for an error that ended the run before a report existed.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<fanout_core::Error>() {
        Some(e) if e.is_configuration() => EXIT_CONFIGURATION,
        _ => EXIT_JOB_FAILURE,
    }
}

fn report_error(err: &anyhow::Error) -> u8 {
    error!(error = %format!("{err:#}"), "fanout failed");
    eprintln!("{} {err:#}", style("error:").red().bold());
    exit_code_for(err)
}

/// Build every job and publish the artifacts.
pub async fn run(args: RunArgs) -> u8 {
    match execute(&args).await {
        Ok(report) => {
            if args.json {
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => println!("{json}"),
                    Err(e) => return report_error(&e.into()),
                }
            } else {
                print!("{}", summary::render_report(&report));
            }
            report.exit_code().clamp(0, u8::MAX as i32) as u8
        }
        Err(e) => report_error(&e),
    }
}

async fn execute(args: &RunArgs) -> anyhow::Result<RunReport> {
    let config = config::load(&args.config, &args.overrides())?;
    let credential = config::credential(&config, args.trigger, args.dry_run)?;

    let runner = Arc::new(BuildToolRunner::from_run_config(&config));
    let publisher = match credential {
        Some(credential) => {
            let uploader = create_uploader(&config.publish.uploader)?;
            Some((Publisher::new(uploader, config.publish.retry.clone()), credential))
        }
        None => None,
    };

    let mut controller = RunController::new(Arc::new(config), runner).dry_run(args.dry_run);
    if let Some((publisher, credential)) = publisher {
        controller = controller.with_publisher(publisher, credential);
    }

    let trigger = Trigger::new(&args.recipe, &args.config, args.trigger);
    let report = controller.handle(&trigger).await?;
    Ok(report)
}

/// Print the resolved job list.
pub fn expand(args: &ConfigArgs) -> u8 {
    let result = (|| -> anyhow::Result<()> {
        let config = config::load(&args.config, &ConfigOverrides::default())?;
        let jobs = AxisResolver::new().resolve(&config.matrix)?;
        if args.json {
            let json = serde_json::to_string_pretty(&jobs).context("failed to encode jobs")?;
            println!("{json}");
        } else {
            print!("{}", summary::render_jobs(&jobs));
        }
        Ok(())
    })();

    match result {
        Ok(()) => 0,
        Err(e) => report_error(&e),
    }
}

/// Validate the configuration file.
pub fn validate(args: &ConfigArgs) -> u8 {
    match config::load(&args.config, &ConfigOverrides::default()) {
        Ok(config) => {
            let jobs = AxisResolver::new()
                .resolve(&config.matrix)
                .map(|jobs| jobs.len())
                .unwrap_or_default();
            if args.json {
                println!("{}", serde_json::json!({ "valid": true, "jobs": jobs }));
            } else {
                println!(
                    "{} {} is valid ({} jobs)",
                    style("✓").green(),
                    args.config.display(),
                    jobs
                );
            }
            0
        }
        Err(e) => report_error(&e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanout_core::Error;

    #[test]
    fn test_configuration_errors_exit_two() {
        let err: anyhow::Error = Error::Configuration("bad axis".into()).into();
        assert_eq!(exit_code_for(&err), EXIT_CONFIGURATION);
    }

    #[test]
    fn test_other_fatal_errors_exit_one() {
        let err: anyhow::Error = Error::Internal("worker panicked".into()).into();
        assert_eq!(exit_code_for(&err), EXIT_JOB_FAILURE);
        assert_eq!(exit_code_for(&anyhow::anyhow!("boom")), EXIT_JOB_FAILURE);
    }
}
