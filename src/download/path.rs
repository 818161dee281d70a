//! Destination path derivation and extension reconciliation.
//!
//! A source URL maps to a relative path made of its host and path segments,
//! each sanitized on its own so segment count and order survive. The path is
//! later extended (never rewritten) when the sniffed encoding disagrees with
//! its extension.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use url::Url;

use super::constants::{MAX_SEGMENT_BYTES, REPLACEMENT_CHAR};
use super::error::DownloadError;
use super::sniff::ImageFormat;

/// Windows device names that cannot be used as a file stem.
const WINDOWS_RESERVED: &[&str] = &["con", "prn", "aux", "nul"];

/// Parses and validates a source URL.
///
/// Only `http` and `https` URLs with a host are accepted.
///
/// # Errors
///
/// Returns [`DownloadError::InvalidUrl`] when the input does not parse or
/// names an unsupported scheme.
pub fn parse_source_url(source_url: &str) -> Result<Url, DownloadError> {
    let url = Url::parse(source_url).map_err(|_| DownloadError::invalid_url(source_url))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(DownloadError::invalid_url(source_url));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(DownloadError::invalid_url(source_url));
    }
    Ok(url)
}

/// Derives the relative destination path for a URL.
///
/// The scheme and `//` are stripped from the serialized URL, the remainder is
/// split on `/`, and every non-empty segment is passed through
/// [`sanitize_segment`]. Query string and fragment stay in the last segment.
///
/// # Example
///
/// ```
/// use image_archiver_core::derive_relative_path;
/// use std::path::Path;
/// use url::Url;
///
/// let url = Url::parse("https://cdn.example.com/file/a b.jpg").unwrap();
/// assert_eq!(
///     derive_relative_path(&url),
///     Path::new("cdn.example.com").join("file").join("a%20b.jpg"),
/// );
/// ```
#[must_use]
pub fn derive_relative_path(url: &Url) -> PathBuf {
    let serialized = url.as_str();
    let remainder = serialized
        .strip_prefix(url.scheme())
        .and_then(|rest| rest.strip_prefix("://"))
        .unwrap_or(serialized);

    remainder
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(sanitize_segment)
        .collect()
}

/// Makes one path segment safe to use as a file or directory name.
///
/// Illegal characters are replaced one-for-one with `!`; dot-only names,
/// Windows device names and trailing dots/spaces are replaced as a whole.
/// The same input always yields the same output.
#[must_use]
pub fn sanitize_segment(segment: &str) -> String {
    let replaced: String = segment
        .chars()
        .map(|c| {
            if is_illegal_char(c) {
                REPLACEMENT_CHAR
            } else {
                c
            }
        })
        .collect();

    if is_dot_only(&replaced) || is_windows_reserved(&replaced) {
        return REPLACEMENT_CHAR.to_string();
    }

    let trimmed = replaced.trim_end_matches(['.', ' ']);
    let mut out = if trimmed.len() == replaced.len() {
        replaced
    } else {
        let mut owned = trimmed.to_string();
        owned.push(REPLACEMENT_CHAR);
        owned
    };

    truncate_on_char_boundary(&mut out, MAX_SEGMENT_BYTES);
    // The cut may expose a trailing dot or space; those are dropped outright.
    let kept = out.trim_end_matches(['.', ' ']).len();
    if kept == 0 {
        return REPLACEMENT_CHAR.to_string();
    }
    out.truncate(kept);
    out
}

fn is_illegal_char(c: char) -> bool {
    matches!(c, '/' | '?' | '<' | '>' | '\\' | ':' | '*' | '|' | '"')
        || matches!(c, '\u{0000}'..='\u{001f}' | '\u{0080}'..='\u{009f}')
}

fn is_dot_only(segment: &str) -> bool {
    !segment.is_empty() && segment.chars().all(|c| c == '.')
}

fn is_windows_reserved(segment: &str) -> bool {
    let stem = segment.split_once('.').map_or(segment, |(stem, _)| stem);
    let stem = stem.to_ascii_lowercase();
    if WINDOWS_RESERVED.contains(&stem.as_str()) {
        return true;
    }
    let bytes = stem.as_bytes();
    bytes.len() == 4
        && (stem.starts_with("com") || stem.starts_with("lpt"))
        && bytes[3].is_ascii_digit()
}

fn truncate_on_char_boundary(value: &mut String, max_bytes: usize) {
    if value.len() <= max_bytes {
        return;
    }
    let mut take = max_bytes;
    while take > 0 && !value.is_char_boundary(take) {
        take -= 1;
    }
    value.truncate(take);
}

/// Returns the extension of the final path component, leading dot included.
///
/// A name whose only dot is its first character has no extension.
#[must_use]
pub fn extension_of(path: &Path) -> String {
    let Some(name) = path.file_name() else {
        return String::new();
    };
    let name = name.to_string_lossy();
    match name.rfind('.') {
        Some(index) if index > 0 => name[index..].to_string(),
        _ => String::new(),
    }
}

/// Appends the detected format's extension when the path disagrees with it.
///
/// The comparison is exact and case-sensitive, so `photo.JPG` sniffed as JPEG
/// becomes `photo.JPG.jpg`. Without a format the path is returned unchanged.
#[must_use]
pub fn reconcile_extension(path: PathBuf, format: Option<ImageFormat>) -> PathBuf {
    let Some(format) = format else {
        return path;
    };
    let wanted = format!(".{}", format.extension());
    if extension_of(&path) == wanted {
        return path;
    }
    let mut raw: OsString = path.into_os_string();
    raw.push(&wanted);
    PathBuf::from(raw)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::path::Component;

    fn derive(url: &str) -> PathBuf {
        derive_relative_path(&Url::parse(url).unwrap())
    }

    #[test]
    fn test_derive_relative_path_keeps_host_and_segments() {
        let path = derive(
            "https://cdn6.fiction.live/file/fictionlive/6dddb2ff-bdf2-418f-9a6d-710ca1c35acb.jpg",
        );
        assert_eq!(
            path,
            Path::new("cdn6.fiction.live/file/fictionlive/6dddb2ff-bdf2-418f-9a6d-710ca1c35acb.jpg")
        );
    }

    #[test]
    fn test_derive_relative_path_is_deterministic() {
        let url = "http://example.com/a/b:c/d.png?size=large";
        assert_eq!(derive(url), derive(url));
    }

    #[test]
    fn test_derive_relative_path_ignores_scheme() {
        assert_eq!(
            derive("http://example.com/x/y.gif"),
            derive("https://example.com/x/y.gif")
        );
    }

    #[test]
    fn test_derive_relative_path_replaces_port_separator() {
        assert_eq!(
            derive("http://127.0.0.1:8080/img.png"),
            Path::new("127.0.0.1!8080").join("img.png")
        );
    }

    #[test]
    fn test_derive_relative_path_keeps_query_in_last_segment() {
        assert_eq!(
            derive("https://example.com/img.png?w=10&h=20"),
            Path::new("example.com").join("img.png!w=10&h=20")
        );
    }

    #[test]
    fn test_derive_relative_path_drops_empty_segments() {
        assert_eq!(
            derive("https://example.com//dir/"),
            Path::new("example.com").join("dir")
        );
    }

    #[test]
    fn test_derive_relative_path_never_escapes_root() {
        let urls = [
            "https://example.com/../../etc/passwd",
            "https://example.com/%2e%2e/%2E%2E/secret",
            "https://example.com/a/.../b",
            "https://example.com/a/..%2f../b",
            "https://example.com/C:/Windows/system.ini",
            "https://example.com/\\\\server\\share",
        ];
        for url in urls {
            let path = derive(url);
            assert!(path.is_relative(), "{url} produced {path:?}");
            for component in path.components() {
                assert!(
                    matches!(component, Component::Normal(_)),
                    "{url} produced non-normal component {component:?}"
                );
                assert_ne!(component.as_os_str(), "..");
                assert_ne!(component.as_os_str(), ".");
            }
        }
    }

    #[test]
    fn test_sanitize_segment_replaces_each_illegal_char() {
        assert_eq!(sanitize_segment("a:b*c?d"), "a!b!c!d");
        assert_eq!(sanitize_segment("<|>"), "!!!");
        assert_eq!(sanitize_segment("tab\there"), "tab!here");
    }

    #[test]
    fn test_sanitize_segment_reserved_names() {
        assert_eq!(sanitize_segment("."), "!");
        assert_eq!(sanitize_segment(".."), "!");
        assert_eq!(sanitize_segment("..."), "!");
        assert_eq!(sanitize_segment("CON"), "!");
        assert_eq!(sanitize_segment("lpt1.jpg"), "!");
        assert_eq!(sanitize_segment("console.jpg"), "console.jpg");
    }

    #[test]
    fn test_sanitize_segment_trailing_dots_and_spaces() {
        assert_eq!(sanitize_segment("name. ."), "name!");
        assert_eq!(sanitize_segment("name.jpg"), "name.jpg");
    }

    #[test]
    fn test_sanitize_segment_truncates_to_segment_limit() {
        let long = "é".repeat(200);
        let out = sanitize_segment(&long);
        assert!(out.len() <= MAX_SEGMENT_BYTES);
        assert!(out.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_sanitize_segment_drops_dot_exposed_by_truncation() {
        let long = format!("{}.{}", "a".repeat(254), "b".repeat(20));
        assert_eq!(sanitize_segment(&long), "a".repeat(254));

        let spaced = format!("{} {}", "a".repeat(254), "b".repeat(20));
        assert_eq!(sanitize_segment(&spaced), "a".repeat(254));
    }

    #[test]
    fn test_sanitize_segment_never_truncates_to_empty() {
        let dots_then_name = format!("{}x", ".".repeat(300));
        assert_eq!(sanitize_segment(&dots_then_name), "!");
    }

    #[test]
    fn test_parse_source_url_rejects_invalid_input() {
        assert!(matches!(
            parse_source_url("not a url"),
            Err(DownloadError::InvalidUrl { .. })
        ));
        assert!(matches!(
            parse_source_url("ftp://example.com/a.png"),
            Err(DownloadError::InvalidUrl { .. })
        ));
        assert!(matches!(
            parse_source_url("file:///etc/hosts"),
            Err(DownloadError::InvalidUrl { .. })
        ));
        assert!(parse_source_url("https://example.com/a.png").is_ok());
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of(Path::new("a/b/c.jpeg")), ".jpeg");
        assert_eq!(extension_of(Path::new("a/b/c")), "");
        assert_eq!(extension_of(Path::new("a/.hidden")), "");
        assert_eq!(extension_of(Path::new("a/b.tar.gz")), ".gz");
    }

    #[test]
    fn test_reconcile_extension_appends_mismatch() {
        let path = PathBuf::from("host/447506bd.jpeg");
        assert_eq!(
            reconcile_extension(path, Some(ImageFormat::Jpeg)),
            PathBuf::from("host/447506bd.jpeg.jpg")
        );
    }

    #[test]
    fn test_reconcile_extension_keeps_matching_path() {
        let path = PathBuf::from("host/a.png");
        assert_eq!(
            reconcile_extension(path.clone(), Some(ImageFormat::Png)),
            path
        );
    }

    #[test]
    fn test_reconcile_extension_is_case_sensitive() {
        let path = PathBuf::from("host/a.PNG");
        assert_eq!(
            reconcile_extension(path, Some(ImageFormat::Png)),
            PathBuf::from("host/a.PNG.png")
        );
    }

    #[test]
    fn test_reconcile_extension_without_format_is_passthrough() {
        let path = PathBuf::from("host/a.bin");
        assert_eq!(reconcile_extension(path.clone(), None), path);
    }

    #[test]
    fn test_reconcile_extension_on_extensionless_path() {
        assert_eq!(
            reconcile_extension(PathBuf::from("host/image"), Some(ImageFormat::Webp)),
            PathBuf::from("host/image.webp")
        );
    }
}
