//! Integration test infrastructure for fanout.
//!
//! Provides a temporary workspace with a recipe and a scripted shell build
//! tool, plus uploaders with scripted failures, so the run controller can be
//! exercised end to end without a real packaging toolchain.
//!
//! # Usage
//!
//! ```ignore
//! use fanout_tests::{WorkspaceFixture, RecordingUploader};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let ws = WorkspaceFixture::new().unwrap();
//!     let config = ws.write_config(&ws.config_yaml(AXES_2X2, "")).unwrap();
//!     // Build a RunController from `config` and `ws.trigger(..)`.
//! }
//! ```

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;

/// Initialize test logging (call once per test binary).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,fanout_tests=debug")),
        )
        .with_test_writer()
        .try_init();
}
