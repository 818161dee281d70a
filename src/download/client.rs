//! HTTP client wrapper for downloading images.
//!
//! `HttpClient` opens the GET stream, classifies the body from its first
//! bytes and hands prefix and remainder to the persister.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_SNIFF_BYTES, MAX_SNIFF_BYTES, READ_TIMEOUT_SECS,
};
use super::error::DownloadError;
use super::path::{derive_relative_path, parse_source_url, reconcile_extension};
use super::persist::persist_stream;
use super::sniff::{ImageFormat, classify, read_prefix};
use crate::user_agent;

/// Tunables for [`HttpClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadOptions {
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Longest wait for the next read on the connection, in seconds.
    pub read_timeout_secs: u64,
    /// Leading bytes gathered before classification; 0 uses the first chunk.
    pub sniff_bytes: usize,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: READ_TIMEOUT_SECS,
            sniff_bytes: DEFAULT_SNIFF_BYTES,
        }
    }
}

/// Result of a completed image download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageDownload {
    /// Final path, relative to the destination root.
    pub path: PathBuf,
    /// Bytes written to disk.
    pub bytes_written: u64,
    /// Encoding detected from the leading bytes, if any.
    pub format: Option<ImageFormat>,
}

/// HTTP client for downloading images with streaming support.
///
/// Create once and reuse; downloads share the connection pool but no other
/// state, so concurrent calls need no coordination.
///
/// # Example
///
/// ```no_run
/// use image_archiver_core::HttpClient;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new();
/// let path = client
///     .download_image("https://cdn.example.com/file/cover.jpeg", Path::new("./images"))
///     .await?;
/// println!("Saved to: {}", path.display());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    sniff_bytes: usize,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a new HTTP client with default options.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static configuration.
    /// This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        Self::with_options(DownloadOptions::default())
            .expect("failed to build HTTP client with static configuration")
    }

    /// Creates a new HTTP client from explicit options.
    ///
    /// A `sniff_bytes` above the supported maximum is clamped.
    ///
    /// # Errors
    ///
    /// Returns the builder error if the TLS backend cannot be initialised.
    pub fn with_options(options: DownloadOptions) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(options.connect_timeout_secs))
            .read_timeout(Duration::from_secs(options.read_timeout_secs))
            .gzip(true)
            .user_agent(user_agent::default_download_user_agent())
            .build()?;
        Ok(Self {
            client,
            sniff_bytes: options.sniff_bytes.min(MAX_SNIFF_BYTES),
        })
    }

    /// Downloads an image into `dest_root` and returns its relative path.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if:
    /// - The URL is invalid (no I/O is attempted)
    /// - The server returns a non-2xx status (no directory is created)
    /// - The body is empty (no file is created)
    /// - The transport fails while connecting or reading
    /// - Creating directories or writing the file fails
    #[must_use = "download result contains the path of the saved image"]
    #[instrument(skip(self, dest_root), fields(url = %source_url))]
    pub async fn download_image(
        &self,
        source_url: &str,
        dest_root: &Path,
    ) -> Result<PathBuf, DownloadError> {
        Ok(self
            .download_image_with_metadata(source_url, dest_root)
            .await?
            .path)
    }

    /// Downloads an image and returns its path, size and detected format.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`download_image`](Self::download_image).
    #[must_use = "download result contains path and format metadata"]
    #[instrument(skip(self, dest_root), fields(url = %source_url))]
    pub async fn download_image_with_metadata(
        &self,
        source_url: &str,
        dest_root: &Path,
    ) -> Result<ImageDownload, DownloadError> {
        let url = parse_source_url(source_url)?;
        let derived = derive_relative_path(&url);
        debug!(path = %derived.display(), "derived destination path");

        let response = self.fetch(&url).await?;
        let mut body = response.bytes_stream();

        let prefix = read_prefix(&mut body, self.sniff_bytes, source_url).await?;
        let format = classify(&prefix);
        debug!(prefix_len = prefix.len(), format = ?format, "classified response body");

        let path = reconcile_extension(derived, format);
        let bytes_written = persist_stream(dest_root, &path, &prefix, body, source_url).await?;

        info!(path = %path.display(), bytes = bytes_written, "download complete");

        Ok(ImageDownload {
            path,
            bytes_written,
            format,
        })
    }

    /// Issues the GET request and checks the response status.
    ///
    /// The body is left unread so the caller can stream it.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::HttpStatus`] for a non-2xx response and
    /// [`DownloadError::Stream`] when the request cannot be sent.
    pub async fn fetch(&self, url: &Url) -> Result<reqwest::Response, DownloadError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| DownloadError::stream(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "server rejected request");
            return Err(DownloadError::http_status(url.as_str(), status.as_u16()));
        }

        Ok(response)
    }

    /// Returns the configured sniff window in bytes.
    #[must_use]
    pub fn sniff_bytes(&self) -> usize {
        self.sniff_bytes
    }
}
