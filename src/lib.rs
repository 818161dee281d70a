//! Image Archiver Core Library
//!
//! This library downloads the images referenced by archived stories. Each
//! image lands under a destination root at a path derived from its source URL,
//! with the file extension reconciled against the encoding detected from the
//! leading bytes of the response body.
//!
//! # Architecture
//!
//! - [`download`] - path derivation, type sniffing, streaming fetch and persistence
//! - [`config`] - file-backed defaults for the command-line entry point

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod download;
mod user_agent;

// Re-export commonly used types
pub use config::{FileConfig, LoadedConfig, VerbositySetting, load_default_file_config};
pub use download::{
    DownloadError, DownloadErrorKind, DownloadOptions, HttpClient, ImageDownload, ImageFormat,
    classify, derive_relative_path, reconcile_extension,
};
