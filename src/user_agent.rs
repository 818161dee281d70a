//! User-Agent string sent with image requests.

/// Default User-Agent for image requests (identifies the tool).
#[must_use]
pub(crate) fn default_download_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("image-archiver/{version} (story-image-archiver)")
}
