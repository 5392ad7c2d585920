//! Trigger events that start a run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// A published release.
    Release,
    Manual,
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerKind::Release => f.write_str("release"),
            TriggerKind::Manual => f.write_str("manual"),
        }
    }
}

impl std::str::FromStr for TriggerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "release" => Ok(TriggerKind::Release),
            "manual" => Ok(TriggerKind::Manual),
            other => Err(format!("unknown trigger kind: {other}")),
        }
    }
}

/// Event that starts a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    /// Recipe directory handed to the build tool.
    pub recipe: PathBuf,
    /// Run configuration file holding the axis definitions.
    pub axis_config: PathBuf,
    pub kind: TriggerKind,
}

impl Trigger {
    pub fn new(recipe: impl Into<PathBuf>, axis_config: impl Into<PathBuf>, kind: TriggerKind) -> Self {
        Self {
            recipe: recipe.into(),
            axis_config: axis_config.into(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_kind_parse() {
        assert_eq!("release".parse::<TriggerKind>(), Ok(TriggerKind::Release));
        assert_eq!("manual".parse::<TriggerKind>(), Ok(TriggerKind::Manual));
        assert!("push".parse::<TriggerKind>().is_err());
        assert_eq!(TriggerKind::Release.to_string(), "release");
    }
}
