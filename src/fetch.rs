use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

use crate::config::FetchConfig;
use crate::source::{PhotoSource, RawImageBuffer};

/// Failure to obtain a photo's bytes. The only error that stops a photo's
/// pipeline.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The request failed or the server answered with a non-success status.
    /// `status` is `None` when no response was received.
    #[error("failed to fetch {resource}{}: {message}", status_suffix(.status))]
    NetworkFailure {
        resource: String,
        status: Option<u16>,
        message: String,
    },
    /// A local file could not be read.
    #[error("failed to read {resource}: {message}")]
    ReadFailure { resource: String, message: String },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl FetchError {
    /// Identifier of the source that failed.
    pub fn source_id(&self) -> &str {
        match self {
            Self::NetworkFailure { resource, .. } | Self::ReadFailure { resource, .. } => resource,
        }
    }
}

/// Anything that can turn a [`PhotoSource`] into bytes.
///
/// Implementations perform exactly one read per call and never retry or
/// cache. [`ResourceFetcher`] is the bundled implementation.
#[async_trait::async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, source: &PhotoSource) -> Result<RawImageBuffer, FetchError>;
}

/// HTTP + filesystem fetcher.
pub struct ResourceFetcher {
    client: Client,
}

impl ResourceFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a fetcher whose HTTP client honours the configured timeout and
    /// user agent.
    pub fn from_config(config: &FetchConfig) -> reqwest::Result<Self> {
        let mut builder = Client::builder().user_agent(config.user_agent.clone());
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self::new(builder.build()?))
    }

    async fn fetch_url(&self, url: &str) -> Result<RawImageBuffer, FetchError> {
        let network_failure = |status: Option<u16>, message: String| FetchError::NetworkFailure {
            resource: url.to_string(),
            status,
            message,
        };

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| network_failure(None, e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(network_failure(
                Some(status.as_u16()),
                status.canonical_reason().unwrap_or("unexpected status").to_string(),
            ));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| network_failure(Some(status.as_u16()), e.to_string()))?;

        log::debug!("Fetched {} bytes from {url}", bytes.len());
        Ok(RawImageBuffer::new(bytes.to_vec(), None))
    }
}

impl Default for ResourceFetcher {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

#[async_trait::async_trait]
impl Fetch for ResourceFetcher {
    async fn fetch(&self, source: &PhotoSource) -> Result<RawImageBuffer, FetchError> {
        match source {
            PhotoSource::Url(url) => self.fetch_url(url).await,
            PhotoSource::File { path, content_type } => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|e| FetchError::ReadFailure {
                        resource: path.display().to_string(),
                        message: e.to_string(),
                    })?;
                log::debug!("Read {} bytes from {}", bytes.len(), path.display());
                Ok(RawImageBuffer::new(bytes, content_type.clone()))
            }
            PhotoSource::Bytes {
                data, content_type, ..
            } => Ok(RawImageBuffer::new(data.clone(), content_type.clone())),
        }
    }
}
