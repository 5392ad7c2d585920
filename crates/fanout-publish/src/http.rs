//! Upload through an HTTP channel API.

use async_trait::async_trait;
use fanout_core::artifact::Artifact;
use fanout_core::config::HttpUploaderConfig;
use fanout_core::ports::Uploader;
use fanout_core::secrets::{Channel, Credential};
use fanout_core::{Error, Result};
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;
use tracing::{debug, info};

/// POSTs each artifact's bytes to `{url}/{target_user}/{file_name}` with a
/// bearer token.
pub struct HttpUploader {
    client: Client,
    url: Url,
}

impl HttpUploader {
    pub fn new(config: HttpUploaderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))?;
        let url = Url::parse(&config.url).map_err(|e| {
            Error::Configuration(format!("invalid upload url '{}': {e}", config.url))
        })?;
        if url.cannot_be_a_base() {
            return Err(Error::Configuration(format!(
                "upload url '{}' cannot take a path",
                config.url
            )));
        }
        Ok(Self { client, url })
    }

    /// User and file name are appended as percent-encoded path segments.
    fn endpoint(&self, artifact: &Artifact, channel: &Channel) -> Result<Url> {
        let mut url = self.url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Configuration(format!("upload url '{}' cannot take a path", self.url)))?
            .pop_if_empty()
            .push(&channel.target_user)
            .push(&artifact.file_name());
        Ok(url)
    }
}

/// Map a non-success response onto the publish error kinds.
fn classify(status: StatusCode, body: &str) -> Error {
    let detail = format!("{status}: {}", body.trim());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Authentication(detail),
        StatusCode::CONFLICT => Error::Conflict(detail),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => Error::Network(detail),
        s if s.is_server_error() => Error::Network(detail),
        _ => Error::Rejected(detail),
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    async fn upload(
        &self,
        artifact: &Artifact,
        channel: &Channel,
        credential: &Credential,
    ) -> Result<()> {
        let body = tokio::fs::read(artifact.path()).await.map_err(|e| {
            Error::Rejected(format!(
                "cannot read artifact {}: {e}",
                artifact.path().display()
            ))
        })?;
        let endpoint = self.endpoint(artifact, channel)?;

        info!(endpoint = %endpoint, bytes = body.len(), "Uploading artifact");

        let response = self
            .client
            .post(endpoint.clone())
            .bearer_auth(credential.expose())
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Network(credential.mask(&e.to_string())))?;

        let status = response.status();
        if status.is_success() {
            debug!(%status, "Upload accepted");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify(status, &credential.mask(&body)))
    }

    fn name(&self) -> &str {
        "http"
    }
}
