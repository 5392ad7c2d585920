//! Upload credential and target channel.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

const MASK: &str = "***";

/// Remote destination of uploads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Account or organisation that owns the uploaded packages.
    pub target_user: String,
}

impl Channel {
    pub fn new(target_user: impl Into<String>) -> Self {
        Self {
            target_user: target_user.into(),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.target_user)
    }
}

/// Opaque upload secret.
///
/// Read-only once loaded. `Debug` and `Display` never print the value and
/// the type is not serialisable.
#[derive(Clone)]
pub struct Credential {
    secret: String,
}

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Load the credential from an environment variable.
    pub fn from_env(var: &str) -> Result<Self> {
        match std::env::var(var) {
            Ok(value) if !value.trim().is_empty() => Ok(Self::new(value.trim())),
            _ => Err(Error::Configuration(format!(
                "credential environment variable {var} is not set"
            ))),
        }
    }

    /// The raw secret. Only for authorization headers and child environments.
    pub fn expose(&self) -> &str {
        &self.secret
    }

    /// Replace every occurrence of the secret in `input`.
    pub fn mask(&self, input: &str) -> String {
        if self.secret.is_empty() {
            return input.to_string();
        }
        input.replace(&self.secret, MASK)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&MASK).finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MASK)
    }
}
