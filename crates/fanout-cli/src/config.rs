//! Loading the run configuration and the upload credential.

use fanout_core::config::{ConfigOverrides, RunConfig};
use fanout_core::secrets::Credential;
use fanout_core::trigger::TriggerKind;
use fanout_core::Result;
use fanout_scheduler::AxisResolver;
use std::path::Path;
use tracing::debug;

/// Read, override and validate the configuration file.
pub fn load(path: &Path, overrides: &ConfigOverrides) -> Result<RunConfig> {
    let mut config = RunConfig::from_file(path)?;
    config.apply(overrides);
    config.validate()?;
    // Matrix checks too, so bad axes exit before any work starts.
    let jobs = AxisResolver::new().resolve(&config.matrix)?;
    debug!(path = %path.display(), jobs = jobs.len(), "Loaded configuration");
    Ok(config)
}

/// The upload credential, when this run will publish.
pub fn credential(config: &RunConfig, kind: TriggerKind, dry_run: bool) -> Result<Option<Credential>> {
    if dry_run || !config.publish.publishes_on(kind) {
        return Ok(None);
    }
    Credential::from_env(&config.publish.credential_env).map(Some)
}
