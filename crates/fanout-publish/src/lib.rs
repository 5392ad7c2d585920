//! Artifact publishing for fanout.
//!
//! [`Publisher`] drives any [`fanout_core::ports::Uploader`] with bounded,
//! exponentially backed-off retries. Two uploaders ship with the crate: an
//! external upload command and an HTTP channel API.

pub mod command;
pub mod http;
pub mod publisher;
pub mod retry;

pub use command::CommandUploader;
pub use http::HttpUploader;
pub use publisher::Publisher;
pub use retry::Backoff;

use fanout_core::Result;
use fanout_core::config::UploaderConfig;
use fanout_core::ports::Uploader;
use std::sync::Arc;

/// Create the uploader for a configuration.
pub fn create_uploader(config: &UploaderConfig) -> Result<Arc<dyn Uploader>> {
    let uploader: Arc<dyn Uploader> = match config {
        UploaderConfig::Command(c) => Arc::new(CommandUploader::new(c.clone())),
        UploaderConfig::Http(c) => Arc::new(HttpUploader::new(c.clone())?),
    };
    Ok(uploader)
}
