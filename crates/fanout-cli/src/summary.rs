//! Human-readable run summaries.

use console::style;
use fanout_core::artifact::PublishStatus;
use fanout_core::matrix::JobSpec;
use fanout_core::run::{JobStatus, RunReport};
use std::fmt::Write;

fn status_cell(status: JobStatus) -> String {
    let padded = format!("{:<9}", status.as_str());
    match status {
        JobStatus::Succeeded => style(padded).green().to_string(),
        JobStatus::Failed => style(padded).red().bold().to_string(),
        JobStatus::Skipped => style(padded).dim().to_string(),
    }
}

fn seconds(duration_ms: u64) -> String {
    format!("{:.1}s", duration_ms as f64 / 1000.0)
}

/// The resolved job list.
pub fn render_jobs(jobs: &[JobSpec]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", style(format!("{} jobs", jobs.len())).bold());
    for job in jobs {
        let _ = writeln!(out, "  {:>3}  {}  {}", job.index(), job.id(), job.display_name());
    }
    out
}

/// Per-job table, per-artifact publish table and the verdict.
pub fn render_report(report: &RunReport) -> String {
    let mut out = String::new();
    let run = &report.run;

    let _ = writeln!(
        out,
        "{} {} ({} trigger)",
        style("Run").bold(),
        run.id,
        report.trigger
    );
    let _ = writeln!(
        out,
        "  {:<16}  {:<9}  {:>7}  {:>9}  {}",
        "JOB", "STATUS", "TIME", "ARTIFACTS", "AXES"
    );
    for (job, result) in run.entries() {
        let _ = writeln!(
            out,
            "  {:<16}  {}  {:>7}  {:>9}  {}",
            job.id().as_str(),
            status_cell(result.status),
            seconds(result.duration_ms),
            result.artifacts.len(),
            job.display_name()
        );
        if let Some(failure) = &result.failure {
            let _ = writeln!(out, "      {} {}", style("error:").red(), failure.message);
            for line in failure.log_tail.lines() {
                let _ = writeln!(out, "      {}", style(line).dim());
            }
        }
    }

    if let Some(publish) = &report.publish {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", style("Publish").bold());
        for outcome in &publish.outcomes {
            let (mark, label) = match outcome.status {
                PublishStatus::Uploaded => (style("✓").green(), "uploaded"),
                PublishStatus::Failed => (style("✗").red(), "failed"),
            };
            let _ = write!(
                out,
                "  {} {:<40} {:<8} retries={}",
                mark,
                outcome.artifact.file_name(),
                label,
                outcome.retries()
            );
            if let Some(error) = &outcome.error {
                let _ = write!(out, "  {error}");
            }
            let _ = writeln!(out);
        }
    } else if report.publish_skipped {
        let artifacts = run.artifacts();
        let _ = writeln!(out);
        if run.aborted {
            let _ = writeln!(out, "{} publish skipped: run aborted", style("!").yellow());
        } else {
            let _ = writeln!(
                out,
                "{} dry run, would publish {} artifact(s):",
                style("i").blue(),
                artifacts.len()
            );
            for artifact in &artifacts {
                let _ = writeln!(out, "    {}", artifact.path().display());
            }
        }
    }

    let _ = writeln!(out);
    let counts = format!(
        "{} succeeded, {} failed, {} skipped",
        run.count(JobStatus::Succeeded),
        run.count(JobStatus::Failed),
        run.count(JobStatus::Skipped)
    );
    if report.status.is_success() {
        let _ = writeln!(out, "{} Run succeeded: {counts}", style("✓").green().bold());
    } else {
        let _ = writeln!(
            out,
            "{} Run failed (exit {}): {counts}",
            style("✗").red().bold(),
            report.exit_code()
        );
    }
    out
}
