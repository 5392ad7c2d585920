//! Trigger-driven run orchestration.

use crate::matrix::AxisResolver;
use crate::scheduler::{ScheduleOptions, Scheduler};
use fanout_core::config::RunConfig;
use fanout_core::matrix::JobSpec;
use fanout_core::ports::JobRunner;
use fanout_core::run::{RunReport, RunState, RunStatus};
use fanout_core::secrets::{Channel, Credential};
use fanout_core::trigger::Trigger;
use fanout_core::{Error, Result};
use fanout_publish::Publisher;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Drives one trigger through resolve, build and publish.
///
/// The controller is single-use: it starts in [`RunState::Idle`] and ends in
/// [`RunState::Done`]. Every transition is validated and kept in
/// [`RunController::history`].
pub struct RunController {
    config: Arc<RunConfig>,
    runner: Arc<dyn JobRunner>,
    publisher: Option<(Publisher, Credential)>,
    dry_run: bool,
    history: Vec<RunState>,
}

impl RunController {
    pub fn new(config: Arc<RunConfig>, runner: Arc<dyn JobRunner>) -> Self {
        Self {
            config,
            runner,
            publisher: None,
            dry_run: false,
            history: vec![RunState::Idle],
        }
    }

    pub fn with_publisher(mut self, publisher: Publisher, credential: Credential) -> Self {
        self.publisher = Some((publisher, credential));
        self
    }

    /// Build everything but skip publishing.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn state(&self) -> RunState {
        self.history.last().copied().unwrap_or(RunState::Idle)
    }

    /// Every state the controller has been in, oldest first.
    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    fn transition(&mut self, next: RunState) -> Result<()> {
        let current = self.state();
        if !current.can_transition_to(next) {
            return Err(Error::Internal(format!(
                "illegal run state transition {current:?} -> {next:?}"
            )));
        }
        info!(from = ?current, to = ?next, "Run state changed");
        self.history.push(next);
        Ok(())
    }

    /// Whether this trigger should end with an upload, ignoring dry runs.
    fn wants_publish(&self, trigger: &Trigger) -> bool {
        self.config.publish.publishes_on(trigger.kind)
    }

    /// Handle one trigger. Configuration problems are returned as errors
    /// before any job starts; job and publish failures are reported in the
    /// returned [`RunReport`].
    pub async fn handle(&mut self, trigger: &Trigger) -> Result<RunReport> {
        if self.state() != RunState::Idle {
            return Err(Error::Internal(
                "run controller already handled a trigger".to_string(),
            ));
        }

        info!(
            recipe = %trigger.recipe.display(),
            axis_config = %trigger.axis_config.display(),
            kind = %trigger.kind,
            dry_run = self.dry_run,
            "Handling trigger"
        );

        self.transition(RunState::Resolving)?;
        let jobs = match self.resolve(trigger) {
            Ok(jobs) => jobs,
            Err(e) => {
                error!(error = %e, "Run rejected before any job started");
                self.transition(RunState::Done(RunStatus::Failure))?;
                return Err(e);
            }
        };

        self.transition(RunState::Running)?;
        let options = ScheduleOptions {
            concurrency: self.config.concurrency,
            fail_fast: self.config.fail_fast,
            recipe: trigger.recipe.clone(),
            output_root: self.config.output_dir.clone(),
        };
        let run = match Scheduler::new(Arc::clone(&self.runner))
            .run_all(jobs, &options)
            .await
        {
            Ok(run) => run,
            Err(e) => {
                error!(error = %e, "Scheduler fault");
                self.transition(RunState::Done(RunStatus::Failure))?;
                return Err(e);
            }
        };

        let wants_publish = self.wants_publish(trigger);
        let mut publish_skipped = false;
        let mut publish = None;

        if wants_publish && run.aborted {
            warn!("Run aborted by fail-fast, nothing will be published");
            publish_skipped = true;
        } else if wants_publish && self.dry_run {
            info!(artifacts = run.artifacts().len(), "Dry run, skipping publish");
            publish_skipped = true;
        } else if wants_publish {
            let artifacts = run.artifacts();
            if artifacts.is_empty() {
                warn!("No artifacts to publish");
            } else {
                self.transition(RunState::Publishing)?;
                let (publisher, credential) = self.publisher.as_ref().ok_or_else(|| {
                    Error::Internal("publisher missing after validation".to_string())
                })?;
                let channel = Channel::new(self.config.publish.target_user.clone().unwrap_or_default());
                publish = Some(publisher.publish(&artifacts, credential, &channel).await);
            }
        }

        let mut report = RunReport::new(
            run,
            trigger.kind,
            publish,
            self.config.tolerate_partial_failure,
        );
        report.publish_skipped = publish_skipped;

        self.transition(RunState::Done(report.status))?;
        info!(
            run_id = %report.run.id,
            status = ?report.status,
            exit_code = report.exit_code(),
            "Run finished"
        );
        Ok(report)
    }

    fn resolve(&self, trigger: &Trigger) -> Result<Vec<JobSpec>> {
        self.config.validate()?;

        if !trigger.recipe.exists() {
            return Err(Error::Configuration(format!(
                "recipe {} does not exist",
                trigger.recipe.display()
            )));
        }

        if self.wants_publish(trigger) && !self.dry_run {
            if self.config.publish.target_user.is_none() {
                return Err(Error::Configuration(format!(
                    "publish.target_user is required for {} triggers",
                    trigger.kind
                )));
            }
            if self.publisher.is_none() {
                return Err(Error::Configuration(
                    "no upload credential configured".to_string(),
                ));
            }
        }

        AxisResolver::new().resolve(&self.config.matrix)
    }
}
