//! Constants for the download module (timeouts, sanitization, sniffing).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout: longest wait for the next body chunk (5 minutes).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Character substituted for anything a filesystem segment cannot hold.
pub const REPLACEMENT_CHAR: char = '!';

/// Longest segment name, in bytes, most filesystems accept.
pub const MAX_SEGMENT_BYTES: usize = 255;

/// Default number of leading bytes gathered before classification.
///
/// Every signature in the sniff table fits inside this window.
pub const DEFAULT_SNIFF_BYTES: usize = 16;

/// Upper bound accepted for a configured sniff window.
pub const MAX_SNIFF_BYTES: usize = 4096;

/// Suffix of the hidden staging file that is renamed into place on success.
pub const PARTIAL_SUFFIX: &str = ".part";
