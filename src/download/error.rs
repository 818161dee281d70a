//! Error types for the download module.
//!
//! Every failure of a single image download maps to exactly one variant here,
//! and each variant carries the URL or path needed to report it.

use std::path::PathBuf;

use thiserror::Error;

/// Boxed transport error carried by [`DownloadError::Stream`].
pub type TransportError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while downloading a single image.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The source URL is malformed, not http(s), or has no host.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The rejected URL string.
        url: String,
    },

    /// The server answered with a non-2xx status.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The connection succeeded but the body ended before any byte arrived.
    #[error("response has no data for {url}")]
    EmptyResponse {
        /// The URL whose body was empty.
        url: String,
    },

    /// Transport failure while connecting or reading the body.
    #[error("transport error downloading {url}: {source}")]
    Stream {
        /// The URL being read.
        url: String,
        /// The underlying transport error.
        #[source]
        source: TransportError,
    },

    /// Directory creation, file write, flush or rename failed.
    #[error("filesystem error at {path}: {source}")]
    FileSystem {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Field-less category of a [`DownloadError`], for logging and branching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadErrorKind {
    InvalidUrl,
    HttpStatus,
    EmptyResponse,
    Stream,
    FileSystem,
}

impl DownloadErrorKind {
    /// Returns the stable string label for display output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidUrl => "invalid_url",
            Self::HttpStatus => "http_status",
            Self::EmptyResponse => "empty_response",
            Self::Stream => "stream",
            Self::FileSystem => "filesystem",
        }
    }
}

impl DownloadError {
    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an empty response error.
    pub fn empty_response(url: impl Into<String>) -> Self {
        Self::EmptyResponse { url: url.into() }
    }

    /// Creates a transport error from any error type.
    pub fn stream(url: impl Into<String>, source: impl Into<TransportError>) -> Self {
        Self::Stream {
            url: url.into(),
            source: source.into(),
        }
    }

    /// Creates a filesystem error.
    pub fn file_system(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileSystem {
            path: path.into(),
            source,
        }
    }

    /// Returns the category of this error.
    #[must_use]
    pub fn kind(&self) -> DownloadErrorKind {
        match self {
            Self::InvalidUrl { .. } => DownloadErrorKind::InvalidUrl,
            Self::HttpStatus { .. } => DownloadErrorKind::HttpStatus,
            Self::EmptyResponse { .. } => DownloadErrorKind::EmptyResponse,
            Self::Stream { .. } => DownloadErrorKind::Stream,
            Self::FileSystem { .. } => DownloadErrorKind::FileSystem,
        }
    }
}

// No `From<reqwest::Error>` or `From<std::io::Error>`: every variant needs a
// URL or path the source error does not carry, so callers go through the
// constructors above.
