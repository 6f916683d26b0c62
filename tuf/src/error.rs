//! Failure kinds raised by the verification and download pipeline.
//!
//! Every failure belongs to exactly one [`Category`]. Repository and download
//! failures are grouped under their own enums so a caller can match a whole
//! category with a single arm (`Error::Download(_)`) or a single kind
//! (`Error::Repository(RepositoryError::ExpiredMetadata(_))`).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Errors raised while verifying repository metadata or downloading files.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The length or a content hash of an object differs from the expected value.
    ///
    /// This kind stands alone: it belongs to neither the repository nor the
    /// download category.
    #[error("length or hash mismatch: {0}")]
    LengthOrHashMismatch(String),

    /// The repository or one of its metadata files is not trustworthy.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// A file could not be retrieved.
    #[error(transparent)]
    Download(#[from] DownloadError),
}

/// Repository state and metadata trust failures.
///
/// Retrying with the same data never changes the outcome of these.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    /// The repository is in an invalid state, such as a missing file.
    #[error("repository error: {0}")]
    Invalid(String),

    /// Metadata did not reach its required signature threshold.
    #[error("unsigned metadata: {0}")]
    UnsignedMetadata(String),

    /// Metadata declares a version number that breaks the ordering rules.
    #[error("bad version number: {0}")]
    BadVersionNumber(String),

    /// Metadata expired at or before the verification instant.
    #[error("expired metadata: {0}")]
    ExpiredMetadata(String),
}

/// Failures while retrieving a file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DownloadError {
    /// Generic retrieval failure.
    #[error("download error: {0}")]
    Other(String),

    /// The number of bytes received differs from the declared length.
    #[error("download length mismatch: {0}")]
    LengthMismatch(String),

    /// The transfer did not complete within the allowed time budget.
    #[error("slow retrieval: {0}")]
    SlowRetrieval(String),

    /// The remote endpoint answered with a non-success HTTP status.
    #[error("HTTP {status_code}: {message}")]
    FetcherHttp {
        /// Message describing the failed request.
        message: String,
        /// Status code exactly as returned by the server.
        status_code: u16,
    },
}

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The top-level category a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Standalone length/hash failures.
    Integrity,
    /// Repository and metadata trust failures.
    Repository,
    /// File retrieval failures.
    Download,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Integrity => "integrity",
            Self::Repository => "repository",
            Self::Download => "download",
        })
    }
}

/// Discriminator naming the concrete kind of a failure.
///
/// The serialized form is the stable name returned by [`ErrorKind::as_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`Error::LengthOrHashMismatch`].
    LengthOrHashMismatch,
    /// See [`RepositoryError::Invalid`].
    Repository,
    /// See [`RepositoryError::UnsignedMetadata`].
    UnsignedMetadata,
    /// See [`RepositoryError::BadVersionNumber`].
    BadVersionNumber,
    /// See [`RepositoryError::ExpiredMetadata`].
    ExpiredMetadata,
    /// See [`DownloadError::Other`].
    Download,
    /// See [`DownloadError::LengthMismatch`].
    DownloadLengthMismatch,
    /// See [`DownloadError::SlowRetrieval`].
    SlowRetrieval,
    /// See [`DownloadError::FetcherHttp`].
    FetcherHttp,
}

impl ErrorKind {
    /// Returns the category this kind refines.
    pub fn category(self) -> Category {
        match self {
            Self::LengthOrHashMismatch => Category::Integrity,
            Self::Repository
            | Self::UnsignedMetadata
            | Self::BadVersionNumber
            | Self::ExpiredMetadata => Category::Repository,
            Self::Download
            | Self::DownloadLengthMismatch
            | Self::SlowRetrieval
            | Self::FetcherHttp => Category::Download,
        }
    }

    /// Returns the stable snake_case name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LengthOrHashMismatch => "length_or_hash_mismatch",
            Self::Repository => "repository",
            Self::UnsignedMetadata => "unsigned_metadata",
            Self::BadVersionNumber => "bad_version_number",
            Self::ExpiredMetadata => "expired_metadata",
            Self::Download => "download",
            Self::DownloadLengthMismatch => "download_length_mismatch",
            Self::SlowRetrieval => "slow_retrieval",
            Self::FetcherHttp => "fetcher_http",
        }
    }

    /// Returns a one-line description, used when a failure is built without a message.
    pub fn description(self) -> &'static str {
        match self {
            Self::LengthOrHashMismatch => "object length or hash does not match",
            Self::Repository => "repository is in an invalid state",
            Self::UnsignedMetadata => "metadata has an insufficient threshold of signatures",
            Self::BadVersionNumber => "metadata contains an invalid version number",
            Self::ExpiredMetadata => "metadata has expired",
            Self::Download => "file could not be downloaded",
            Self::DownloadLengthMismatch => "downloaded length does not match",
            Self::SlowRetrieval => "download took an unreasonably long time",
            Self::FetcherHttp => "HTTP request failed",
        }
    }

    /// Returns all kinds.
    pub fn all() -> &'static [ErrorKind] {
        &[
            Self::LengthOrHashMismatch,
            Self::Repository,
            Self::UnsignedMetadata,
            Self::BadVersionNumber,
            Self::ExpiredMetadata,
            Self::Download,
            Self::DownloadLengthMismatch,
            Self::SlowRetrieval,
            Self::FetcherHttp,
        ]
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn non_empty(message: impl Into<String>, kind: ErrorKind) -> String {
    let message = message.into();
    if message.trim().is_empty() {
        kind.description().to_owned()
    } else {
        message
    }
}

impl Error {
    /// Builds a [`Error::LengthOrHashMismatch`].
    pub fn length_or_hash_mismatch(message: impl Into<String>) -> Self {
        Self::LengthOrHashMismatch(non_empty(message, ErrorKind::LengthOrHashMismatch))
    }

    /// Returns the concrete kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::LengthOrHashMismatch(_) => ErrorKind::LengthOrHashMismatch,
            Self::Repository(e) => e.kind(),
            Self::Download(e) => e.kind(),
        }
    }

    /// Returns the category of the concrete kind.
    pub fn category(&self) -> Category {
        self.kind().category()
    }

    /// Returns the message supplied at construction.
    pub fn message(&self) -> &str {
        match self {
            Self::LengthOrHashMismatch(message) => message,
            Self::Repository(e) => e.message(),
            Self::Download(e) => e.message(),
        }
    }

    /// Returns the HTTP status code for [`DownloadError::FetcherHttp`] failures.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Download(e) => e.status_code(),
            _ => None,
        }
    }

    /// Returns `true` for any repository-category failure.
    pub fn is_repository(&self) -> bool {
        matches!(self, Self::Repository(_))
    }

    /// Returns `true` for any download-category failure.
    pub fn is_download(&self) -> bool {
        matches!(self, Self::Download(_))
    }
}

impl RepositoryError {
    /// Builds a [`RepositoryError::Invalid`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(non_empty(message, ErrorKind::Repository))
    }

    /// Builds a [`RepositoryError::UnsignedMetadata`].
    pub fn unsigned_metadata(message: impl Into<String>) -> Self {
        Self::UnsignedMetadata(non_empty(message, ErrorKind::UnsignedMetadata))
    }

    /// Builds a [`RepositoryError::BadVersionNumber`].
    pub fn bad_version_number(message: impl Into<String>) -> Self {
        Self::BadVersionNumber(non_empty(message, ErrorKind::BadVersionNumber))
    }

    /// Builds a [`RepositoryError::ExpiredMetadata`].
    pub fn expired_metadata(message: impl Into<String>) -> Self {
        Self::ExpiredMetadata(non_empty(message, ErrorKind::ExpiredMetadata))
    }

    /// Returns the concrete kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Invalid(_) => ErrorKind::Repository,
            Self::UnsignedMetadata(_) => ErrorKind::UnsignedMetadata,
            Self::BadVersionNumber(_) => ErrorKind::BadVersionNumber,
            Self::ExpiredMetadata(_) => ErrorKind::ExpiredMetadata,
        }
    }

    /// Returns the message supplied at construction.
    pub fn message(&self) -> &str {
        match self {
            Self::Invalid(message)
            | Self::UnsignedMetadata(message)
            | Self::BadVersionNumber(message)
            | Self::ExpiredMetadata(message) => message,
        }
    }
}

impl DownloadError {
    /// Builds a [`DownloadError::Other`].
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(non_empty(message, ErrorKind::Download))
    }

    /// Builds a [`DownloadError::LengthMismatch`].
    pub fn length_mismatch(message: impl Into<String>) -> Self {
        Self::LengthMismatch(non_empty(message, ErrorKind::DownloadLengthMismatch))
    }

    /// Builds a [`DownloadError::SlowRetrieval`].
    pub fn slow_retrieval(message: impl Into<String>) -> Self {
        Self::SlowRetrieval(non_empty(message, ErrorKind::SlowRetrieval))
    }

    /// Builds a [`DownloadError::FetcherHttp`] carrying `status_code` verbatim.
    pub fn fetcher_http(message: impl Into<String>, status_code: u16) -> Self {
        Self::FetcherHttp {
            message: non_empty(message, ErrorKind::FetcherHttp),
            status_code,
        }
    }

    /// Returns the concrete kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Other(_) => ErrorKind::Download,
            Self::LengthMismatch(_) => ErrorKind::DownloadLengthMismatch,
            Self::SlowRetrieval(_) => ErrorKind::SlowRetrieval,
            Self::FetcherHttp { .. } => ErrorKind::FetcherHttp,
        }
    }

    /// Returns the message supplied at construction.
    pub fn message(&self) -> &str {
        match self {
            Self::Other(message)
            | Self::LengthMismatch(message)
            | Self::SlowRetrieval(message)
            | Self::FetcherHttp { message, .. } => message,
        }
    }

    /// Returns the HTTP status code for [`DownloadError::FetcherHttp`].
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::FetcherHttp { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_of_each(message: &str) -> Vec<Error> {
        vec![
            Error::length_or_hash_mismatch(message),
            RepositoryError::invalid(message).into(),
            RepositoryError::unsigned_metadata(message).into(),
            RepositoryError::bad_version_number(message).into(),
            RepositoryError::expired_metadata(message).into(),
            DownloadError::other(message).into(),
            DownloadError::length_mismatch(message).into(),
            DownloadError::slow_retrieval(message).into(),
            DownloadError::fetcher_http(message, 503).into(),
        ]
    }

    fn repository_handler(err: &Error) -> bool {
        matches!(err, Error::Repository(_))
    }

    fn download_handler(err: &Error) -> bool {
        matches!(err, Error::Download(_))
    }

    #[test]
    fn message_round_trip() {
        for err in one_of_each("root.json is missing") {
            assert_eq!(err.message(), "root.json is missing", "{:?}", err.kind());
        }
    }

    #[test]
    fn one_instance_per_kind() {
        let kinds: Vec<_> = one_of_each("x").iter().map(Error::kind).collect();
        assert_eq!(kinds, ErrorKind::all());
    }

    #[test]
    fn empty_message_replaced_with_description() {
        let err = RepositoryError::expired_metadata("");
        assert_eq!(err.message(), "metadata has expired");

        let err = DownloadError::fetcher_http("   ", 500);
        assert_eq!(err.message(), "HTTP request failed");
        assert_eq!(err.status_code(), Some(500));
    }

    #[test]
    fn fetcher_http_exposes_status_and_is_download() {
        let err: Error = DownloadError::fetcher_http("Not Found", 404).into();
        assert_eq!(err.status_code(), Some(404));
        assert!(download_handler(&err));
        assert!(!repository_handler(&err));
        assert_eq!(err.category(), Category::Download);

        match err {
            Error::Download(DownloadError::FetcherHttp { status_code, .. }) => {
                assert_eq!(status_code, 404);
            }
            _ => panic!("unexpected error variant"),
        }
    }

    #[test]
    fn status_code_absent_for_other_kinds() {
        for err in one_of_each("x") {
            if err.kind() != ErrorKind::FetcherHttp {
                assert_eq!(err.status_code(), None, "{:?}", err.kind());
            }
        }
    }

    #[test]
    fn repository_kinds_match_category_handler() {
        let errs: [Error; 3] = [
            RepositoryError::unsigned_metadata("a").into(),
            RepositoryError::bad_version_number("b").into(),
            RepositoryError::expired_metadata("c").into(),
        ];
        for err in &errs {
            assert!(repository_handler(err));
            assert!(!download_handler(err));
            assert!(err.is_repository());
            assert_eq!(err.category(), Category::Repository);
        }
    }

    #[test]
    fn download_kinds_match_category_handler() {
        let errs: [Error; 3] = [
            DownloadError::length_mismatch("a").into(),
            DownloadError::slow_retrieval("b").into(),
            DownloadError::fetcher_http("c", 502).into(),
        ];
        for err in &errs {
            assert!(download_handler(err));
            assert!(!repository_handler(err));
            assert!(err.is_download());
        }
    }

    #[test]
    fn length_or_hash_mismatch_is_standalone() {
        let err = Error::length_or_hash_mismatch("sha256 differs");
        assert!(!repository_handler(&err));
        assert!(!download_handler(&err));
        assert!(!err.is_repository());
        assert!(!err.is_download());
        assert_eq!(err.category(), Category::Integrity);
    }

    #[test]
    fn specific_kind_does_not_match_siblings() {
        let err: Error = RepositoryError::expired_metadata("timestamp").into();
        assert!(matches!(
            err,
            Error::Repository(RepositoryError::ExpiredMetadata(_))
        ));
        assert!(!matches!(
            err,
            Error::Repository(RepositoryError::UnsignedMetadata(_))
        ));
    }

    #[test]
    fn display_keeps_kind_message_and_status() {
        let err: Error = DownloadError::fetcher_http("GET /1.root.json", 404).into();
        assert_eq!(err.to_string(), "HTTP 404: GET /1.root.json");

        let err: Error = RepositoryError::unsigned_metadata("root was signed by 1/2 keys").into();
        assert_eq!(
            err.to_string(),
            "unsigned metadata: root was signed by 1/2 keys"
        );
    }

    #[test]
    fn kinds_form_two_levels() {
        let repository = ErrorKind::all()
            .iter()
            .filter(|k| k.category() == Category::Repository)
            .count();
        let download = ErrorKind::all()
            .iter()
            .filter(|k| k.category() == Category::Download)
            .count();
        assert_eq!(repository, 4);
        assert_eq!(download, 4);
    }

    #[test]
    fn kind_names_unique() {
        let names: Vec<_> = ErrorKind::all().iter().map(|k| k.as_str()).collect();
        let mut deduped = names.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(names.len(), deduped.len());
    }

    #[test]
    fn kind_serializes_as_name() {
        let json = serde_json::to_string(&ErrorKind::FetcherHttp).unwrap();
        assert_eq!(json, "\"fetcher_http\"");
        let json = serde_json::to_string(&Category::Integrity).unwrap();
        assert_eq!(json, "\"integrity\"");
    }

    #[test]
    fn errors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync + 'static>() {}
        assert_send_sync::<Error>();
        assert_send_sync::<RepositoryError>();
        assert_send_sync::<DownloadError>();
    }
}
