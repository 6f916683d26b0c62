/// Errors from target caching and downloading.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A verification or download failure from the [`tuf`] crate, with its
    /// kind preserved.
    #[error(transparent)]
    Tuf(#[from] tuf::Error),

    /// A filesystem I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Cache metadata JSON could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the taxonomy kind for [`Error::Tuf`] failures.
    pub fn kind(&self) -> Option<tuf::ErrorKind> {
        match self {
            Self::Tuf(e) => Some(e.kind()),
            _ => None,
        }
    }

    /// Returns the wrapped taxonomy error, if any.
    pub fn as_tuf(&self) -> Option<&tuf::Error> {
        match self {
            Self::Tuf(e) => Some(e),
            _ => None,
        }
    }
}

impl From<tuf::RepositoryError> for Error {
    fn from(err: tuf::RepositoryError) -> Self {
        Self::Tuf(err.into())
    }
}

impl From<tuf::DownloadError> for Error {
    fn from(err: tuf::DownloadError) -> Self {
        Self::Tuf(err.into())
    }
}
