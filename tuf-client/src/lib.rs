#![warn(missing_docs)]

//! Verified target downloads and caching on top of the [`tuf`] error taxonomy.
//!
//! This crate builds on top of [`tuf`] to provide:
//! - A retry policy that retries download failures and aborts on repository
//!   and integrity failures
//! - A local cache of verified targets, re-verified on every load
//! - [`TargetDownloader`], which ties fetching, verification and caching together
//!
//! # Example
//!
//! ```no_run
//! use tuf::{FetcherConfig, HashAlgorithm, HttpFetcher};
//! use tuf_client::{TargetDownloader, TargetInfo};
//!
//! # async fn example() -> Result<(), tuf_client::Error> {
//! let fetcher = HttpFetcher::new(FetcherConfig::default())?;
//! let downloader = TargetDownloader::new(
//!     tuf_client::default_cache_dir(),
//!     "https://updates.example.com/targets",
//!     fetcher,
//! )?;
//!
//! let target = TargetInfo::new("bins/tool.tar.gz", 3_145_728)
//!     .with_hash(HashAlgorithm::Sha256, "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855");
//!
//! match downloader.ensure(&target).await {
//!     Ok(cached) => println!("verified at {}", cached.path.display()),
//!     Err(err) => eprintln!("{:?}: {err}", err.kind()),
//! }
//! # Ok(())
//! # }
//! ```

mod cache;
mod error;
pub mod retry;

pub use cache::{CacheMetadata, CachedTarget};
pub use error::Error;
pub use retry::{Decision, RetryPolicy};

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use tuf::{Fetcher, HashAlgorithm};

/// Length and hashes of a target, as listed in trusted targets metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetInfo {
    /// Target path relative to the targets base URL.
    pub name: String,
    /// Expected length in bytes.
    pub length: u64,
    /// Expected digests, hex encoded.
    pub hashes: Vec<(HashAlgorithm, String)>,
}

impl TargetInfo {
    /// Creates target info without hashes.
    pub fn new(name: impl Into<String>, length: u64) -> Self {
        Self {
            name: name.into(),
            length,
            hashes: Vec::new(),
        }
    }

    /// Adds an expected digest.
    pub fn with_hash(mut self, algorithm: HashAlgorithm, digest: impl Into<String>) -> Self {
        self.hashes.push((algorithm, digest.into()));
        self
    }

    /// Returns the expected SHA-256 digest, if listed.
    pub fn sha256(&self) -> Option<&str> {
        self.hashes
            .iter()
            .find(|(algorithm, _)| *algorithm == HashAlgorithm::Sha256)
            .map(|(_, digest)| digest.as_str())
    }

    fn hash_refs(&self) -> Vec<(HashAlgorithm, &str)> {
        self.hashes
            .iter()
            .map(|(algorithm, digest)| (*algorithm, digest.as_str()))
            .collect()
    }
}

/// Downloads targets, verifies them and keeps verified copies on disk.
pub struct TargetDownloader<F> {
    cache_dir: PathBuf,
    base_url: String,
    fetcher: F,
    policy: RetryPolicy,
}

impl<F: Fetcher> TargetDownloader<F> {
    /// Creates a downloader with the given cache directory and targets base URL.
    pub fn new(
        cache_dir: impl Into<PathBuf>,
        base_url: impl Into<String>,
        fetcher: F,
    ) -> Result<Self, Error> {
        let cache_dir = cache_dir.into();
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self {
            cache_dir,
            base_url: base_url.into(),
            fetcher,
            policy: RetryPolicy::default(),
        })
    }

    /// Replaces the retry policy used for downloads.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the download URL for a target.
    pub fn target_url(&self, target: &TargetInfo) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            target.name.trim_start_matches('/')
        )
    }

    /// Ensures a verified copy of `target` is available locally.
    ///
    /// A valid cached copy is returned as is. Otherwise the target is
    /// downloaded (download failures are retried per the policy), checked
    /// against the expected length and hashes, and stored.
    pub async fn ensure(&self, target: &TargetInfo) -> Result<CachedTarget, Error> {
        let entry_dir = self.entry_dir(target)?;

        if let Some(cached) = cache::load_cached(&entry_dir, target)? {
            info!(name = %target.name, "using cached target");
            return Ok(cached);
        }

        let url = self.target_url(target);
        let fetcher = &self.fetcher;
        let url_ref = url.as_str();
        let length = target.length;
        let data = self
            .policy
            .run(move || async move { tuf::download_bytes(fetcher, url_ref, length).await })
            .await?;

        tuf::verify_length_and_hashes(&data, target.length, &target.hash_refs())?;
        info!(name = %target.name, size = data.len(), "target verified");

        let cached = cache::store(&entry_dir, &target.name, &data)?;
        debug!(path = %cached.path.display(), "target cached");
        Ok(cached)
    }

    /// Lists all cached targets.
    pub fn list_cached(&self) -> Result<Vec<CachedTarget>, Error> {
        cache::list_all(&self.cache_dir)
    }

    /// Removes the cached copy of a target. Returns whether one existed.
    pub fn remove(&self, target: &TargetInfo) -> Result<bool, Error> {
        cache::remove(&self.entry_dir(target)?)
    }

    fn entry_dir(&self, target: &TargetInfo) -> Result<PathBuf, Error> {
        Ok(self.cache_dir.join(cache::entry_name(&target.name)?))
    }
}

/// Returns the default cache directory (`~/.cache/arcbox/tuf/targets`).
pub fn default_cache_dir() -> PathBuf {
    base_cache_dir().join("arcbox").join("tuf").join("targets")
}

fn base_cache_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("XDG_CACHE_HOME") {
        return PathBuf::from(dir);
    }
    if let Ok(home) = std::env::var("HOME") {
        return Path::new(&home).join(".cache");
    }
    std::env::temp_dir()
}
