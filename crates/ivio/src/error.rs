//! Error types for ivio.

use thiserror::Error;

/// Result type for ivio operations.
pub type Result<T> = std::result::Result<T, IoError>;

/// Errors that abort an open, read or write operation outright.
///
/// Recoverable parse problems are not errors; they go to the session's
/// diagnostic sink and the read call reports "no value" instead.
#[derive(Debug, Error)]
pub enum IoError {
    /// A file could not be located through the search path.
    #[error("could not find file: {0}")]
    NotFound(String),

    /// A compressed envelope was detected or requested but support for it
    /// was not compiled in.
    #[error("{method} compression detected but {method} support is not available")]
    MissingBackend {
        /// Compression method name, e.g. `gzip`.
        method: &'static str,
    },

    /// A header string was rejected by the registry.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// A previous write failed and the output session stopped writing.
    #[error("writing disabled after an earlier failure")]
    WriteDisabled,

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl IoError {
    /// Whether the error means a compression backend is missing.
    pub fn is_missing_backend(&self) -> bool {
        matches!(self, Self::MissingBackend { .. })
    }
}
