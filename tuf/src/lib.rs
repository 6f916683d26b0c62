#![warn(missing_docs)]

//! Error taxonomy and verification primitives for a TUF update client.
//!
//! This crate provides:
//! - The failure kinds a verification/download pipeline raises, grouped into
//!   repository and download categories plus a standalone integrity kind
//! - Length and hash checks for downloaded objects
//! - Signature-threshold, version and expiry checks for parsed metadata
//! - A [`Fetcher`] abstraction and a streaming HTTP implementation
//!
//! # Example
//!
//! ```
//! use tuf::{DownloadError, Error, RepositoryError};
//!
//! fn policy(err: &Error) -> &'static str {
//!     match err {
//!         Error::Download(DownloadError::FetcherHttp { status_code: 404, .. }) => "give up",
//!         Error::Download(_) => "retry",
//!         Error::Repository(RepositoryError::ExpiredMetadata(_)) => "refresh",
//!         Error::Repository(_) => "abort",
//!         Error::LengthOrHashMismatch(_) => "reject artifact",
//!     }
//! }
//!
//! let err: Error = DownloadError::fetcher_http("GET /2.root.json", 404).into();
//! assert_eq!(policy(&err), "give up");
//! assert_eq!(err.status_code(), Some(404));
//! ```

mod error;
pub mod fetch;
pub mod metadata;
pub mod verify;

pub use error::{Category, DownloadError, Error, ErrorKind, RepositoryError, Result};
pub use fetch::{Fetcher, FetcherConfig, HttpFetcher, download_bytes, download_exact};
pub use metadata::{Role, VersionRule, check_expiry, check_threshold, check_version, require_meta};
pub use verify::{HashAlgorithm, verify_hashes, verify_length, verify_length_and_hashes};
