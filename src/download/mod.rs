//! Single-image download pipeline.
//!
//! A source URL becomes a sanitized relative path, the response body is
//! classified from its leading bytes, the path's extension is reconciled with
//! the detected encoding, and every byte (classification prefix included) is
//! written under the destination root.
//!
//! # Example
//!
//! ```no_run
//! use image_archiver_core::download::HttpClient;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new();
//! let relative = client
//!     .download_image("https://cdn6.fiction.live/file/fictionlive/cover.jpeg", Path::new("tmp"))
//!     .await?;
//! println!("Saved: {}", relative.display());
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod error;
mod path;
mod persist;
mod sniff;

pub use client::{DownloadOptions, HttpClient, ImageDownload};
pub use constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_SNIFF_BYTES, MAX_SNIFF_BYTES, READ_TIMEOUT_SECS,
    REPLACEMENT_CHAR,
};
pub use error::{DownloadError, DownloadErrorKind, TransportError};
pub use path::{
    derive_relative_path, extension_of, parse_source_url, reconcile_extension, sanitize_segment,
};
pub use persist::ensure_parent_dir;
pub use sniff::{ImageFormat, classify, signature_window};

// Note: no module-local Result alias. Use `Result<T, DownloadError>` explicitly.
