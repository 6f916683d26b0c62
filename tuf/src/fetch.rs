//! File retrieval for metadata and targets.
//!
//! Any transport implements [`Fetcher`] and reports failures as
//! [`DownloadError`]s. [`HttpFetcher`] is the streaming reqwest-based
//! implementation.

use std::future::Future;
use std::time::Duration;

use futures::StreamExt;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{DownloadError, Error};

/// A transport that retrieves the bytes behind a URL.
pub trait Fetcher {
    /// Fetches `url`, failing with [`DownloadError::LengthMismatch`] as soon as
    /// more than `max_length` bytes arrive.
    fn fetch(
        &self,
        url: &str,
        max_length: u64,
    ) -> impl Future<Output = Result<Vec<u8>, DownloadError>> + Send;
}

/// Settings for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
    /// Time allowed to establish a connection.
    pub connect_timeout: Duration,
    /// Longest gap allowed between two received chunks.
    pub chunk_timeout: Duration,
    /// Time allowed for a whole transfer, if bounded.
    pub total_timeout: Option<Duration>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: "arcbox-tuf/0.1".to_owned(),
            connect_timeout: Duration::from_secs(10),
            chunk_timeout: Duration::from_secs(30),
            total_timeout: None,
        }
    }
}

impl FetcherConfig {
    /// Sets the longest gap allowed between chunks.
    pub fn with_chunk_timeout(mut self, timeout: Duration) -> Self {
        self.chunk_timeout = timeout;
        self
    }

    /// Bounds the duration of a whole transfer.
    pub fn with_total_timeout(mut self, timeout: Duration) -> Self {
        self.total_timeout = Some(timeout);
        self
    }
}

/// Streaming HTTP fetcher.
pub struct HttpFetcher {
    config: FetcherConfig,
    http: reqwest::Client,
}

impl HttpFetcher {
    /// Creates a fetcher with the given settings.
    pub fn new(config: FetcherConfig) -> Result<Self, DownloadError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.connect_timeout)
            .build()?;
        Ok(Self { config, http })
    }

    /// Returns the settings this fetcher was built with.
    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    async fn fetch_within_chunk_timeout(
        &self,
        url: &str,
        max_length: u64,
    ) -> Result<Vec<u8>, DownloadError> {
        let started = Instant::now();
        let chunk_timeout = self.config.chunk_timeout;
        let response = tokio::time::timeout(chunk_timeout, self.http.get(url).send())
            .await
            .map_err(|_| {
                DownloadError::slow_retrieval(format!(
                    "No response from {url} within {chunk_timeout:?}"
                ))
            })??;

        let status = response.status();
        if !status.is_success() {
            warn!(url, status = status.as_u16(), "fetch failed");
            return Err(DownloadError::fetcher_http(
                format!("GET {url} returned {status}"),
                status.as_u16(),
            ));
        }

        if let Some(declared) = response.content_length() {
            if declared > max_length {
                return Err(DownloadError::length_mismatch(format!(
                    "Declared length {declared} exceeds the maximum allowed length of {max_length}"
                )));
            }
        }

        let mut data = Vec::new();
        let mut stream = response.bytes_stream();

        loop {
            let next = tokio::time::timeout(chunk_timeout, stream.next())
                .await
                .map_err(|_| {
                    DownloadError::slow_retrieval(format!(
                        "No data received from {url} within {chunk_timeout:?}"
                    ))
                })?;
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk?;

            let received = data.len() as u64 + chunk.len() as u64;
            if received > max_length {
                return Err(DownloadError::length_mismatch(format!(
                    "Downloaded {received} bytes exceeding the maximum allowed length of {max_length}"
                )));
            }
            data.extend_from_slice(&chunk);
        }

        debug!(url, size = data.len(), elapsed = ?started.elapsed(), "fetch complete");
        Ok(data)
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, max_length: u64) -> Result<Vec<u8>, DownloadError> {
        let Some(budget) = self.config.total_timeout else {
            return self.fetch_within_chunk_timeout(url, max_length).await;
        };
        tokio::time::timeout(budget, self.fetch_within_chunk_timeout(url, max_length))
            .await
            .map_err(|_| {
                warn!(url, budget = ?budget, "transfer exceeded time budget");
                DownloadError::slow_retrieval(format!("Download of {url} exceeded {budget:?}"))
            })?
    }
}

impl From<reqwest::Error> for DownloadError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            Self::fetcher_http(err.to_string(), status.as_u16())
        } else if err.is_timeout() {
            Self::slow_retrieval(err.to_string())
        } else {
            Self::other(err.to_string())
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Download(err.into())
    }
}

/// Downloads at most `max_length` bytes from `url`.
pub async fn download_bytes<F: Fetcher>(
    fetcher: &F,
    url: &str,
    max_length: u64,
) -> Result<Vec<u8>, Error> {
    info!(url, max_length, "downloading");
    let data = fetcher.fetch(url, max_length).await?;
    Ok(data)
}

/// Downloads `url` and checks that exactly `expected_length` bytes arrived.
pub async fn download_exact<F: Fetcher>(
    fetcher: &F,
    url: &str,
    expected_length: u64,
) -> Result<Vec<u8>, Error> {
    let data = download_bytes(fetcher, url, expected_length).await?;
    let received = data.len() as u64;
    if received != expected_length {
        warn!(url, received, expected_length, "download length mismatch");
        return Err(DownloadError::length_mismatch(format!(
            "Downloaded {received} bytes, expected {expected_length}"
        ))
        .into());
    }
    Ok(data)
}
