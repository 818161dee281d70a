//! Image encoding detection from leading bytes.
//!
//! Classification never looks at the URL: only the magic numbers at the start
//! of the body decide the format.

use futures_util::{Stream, StreamExt};
use serde::Serialize;

use super::error::{DownloadError, TransportError};

/// Image encodings recognised by [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Webp,
    Flif,
    Cr2,
    Tiff,
    Bmp,
    Jxr,
    Psd,
    Bpg,
    Jp2,
    Jxl,
    Avif,
    Heic,
    Ico,
    Cur,
}

impl ImageFormat {
    /// Canonical file extension, without the leading dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Webp => "webp",
            Self::Flif => "flif",
            Self::Cr2 => "cr2",
            Self::Tiff => "tif",
            Self::Bmp => "bmp",
            Self::Jxr => "jxr",
            Self::Psd => "psd",
            Self::Bpg => "bpg",
            Self::Jp2 => "jp2",
            Self::Jxl => "jxl",
            Self::Avif => "avif",
            Self::Heic => "heic",
            Self::Ico => "ico",
            Self::Cur => "cur",
        }
    }
}

/// A byte pattern expected at a fixed offset.
type Part = (usize, &'static [u8]);

struct Signature {
    format: ImageFormat,
    parts: &'static [Part],
}

impl Signature {
    fn matches(&self, bytes: &[u8]) -> bool {
        self.parts.iter().all(|&(offset, pattern)| {
            bytes.get(offset..offset + pattern.len()) == Some(pattern)
        })
    }

    fn required_len(&self) -> usize {
        self.parts
            .iter()
            .map(|&(offset, pattern)| offset + pattern.len())
            .max()
            .unwrap_or(0)
    }
}

const fn sig(format: ImageFormat, parts: &'static [Part]) -> Signature {
    Signature { format, parts }
}

const FTYP: Part = (4, b"ftyp");

/// Ordered signature table; the first match wins.
///
/// CR2 is a TIFF container and must be tested before plain TIFF.
static SIGNATURES: &[Signature] = &[
    sig(ImageFormat::Jpeg, &[(0, &[0xFF, 0xD8, 0xFF])]),
    sig(
        ImageFormat::Png,
        &[(0, &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A])],
    ),
    sig(ImageFormat::Gif, &[(0, b"GIF")]),
    sig(ImageFormat::Webp, &[(0, b"RIFF"), (8, b"WEBP")]),
    sig(ImageFormat::Flif, &[(0, b"FLIF")]),
    sig(ImageFormat::Cr2, &[(0, &[0x49, 0x49, 0x2A, 0x00]), (8, b"CR")]),
    sig(ImageFormat::Cr2, &[(0, &[0x4D, 0x4D, 0x00, 0x2A]), (8, b"CR")]),
    sig(ImageFormat::Tiff, &[(0, &[0x49, 0x49, 0x2A, 0x00])]),
    sig(ImageFormat::Tiff, &[(0, &[0x4D, 0x4D, 0x00, 0x2A])]),
    sig(ImageFormat::Bmp, &[(0, b"BM")]),
    sig(ImageFormat::Jxr, &[(0, &[0x49, 0x49, 0xBC])]),
    sig(ImageFormat::Psd, &[(0, b"8BPS")]),
    sig(ImageFormat::Bpg, &[(0, &[0x42, 0x50, 0x47, 0xFB])]),
    sig(
        ImageFormat::Jp2,
        &[(
            0,
            &[
                0x00, 0x00, 0x00, 0x0C, 0x6A, 0x50, 0x20, 0x20, 0x0D, 0x0A, 0x87, 0x0A,
            ],
        )],
    ),
    sig(ImageFormat::Jxl, &[(0, &[0xFF, 0x0A])]),
    sig(
        ImageFormat::Jxl,
        &[(
            0,
            &[
                0x00, 0x00, 0x00, 0x0C, 0x4A, 0x58, 0x4C, 0x20, 0x0D, 0x0A, 0x87, 0x0A,
            ],
        )],
    ),
    sig(ImageFormat::Avif, &[FTYP, (8, b"avif")]),
    sig(ImageFormat::Avif, &[FTYP, (8, b"avis")]),
    sig(ImageFormat::Heic, &[FTYP, (8, b"heic")]),
    sig(ImageFormat::Heic, &[FTYP, (8, b"heix")]),
    sig(ImageFormat::Heic, &[FTYP, (8, b"hevc")]),
    sig(ImageFormat::Heic, &[FTYP, (8, b"hevx")]),
    sig(ImageFormat::Heic, &[FTYP, (8, b"mif1")]),
    sig(ImageFormat::Heic, &[FTYP, (8, b"msf1")]),
    sig(ImageFormat::Ico, &[(0, &[0x00, 0x00, 0x01, 0x00])]),
    sig(ImageFormat::Cur, &[(0, &[0x00, 0x00, 0x02, 0x00])]),
];

/// Classifies an image from the leading bytes of its body.
///
/// Returns `None` when no signature matches, including when `bytes` is too
/// short for the signature it would otherwise start.
#[must_use]
pub fn classify(bytes: &[u8]) -> Option<ImageFormat> {
    SIGNATURES
        .iter()
        .find(|signature| signature.matches(bytes))
        .map(|signature| signature.format)
}

/// Number of leading bytes needed to evaluate every signature in the table.
#[must_use]
pub fn signature_window() -> usize {
    SIGNATURES
        .iter()
        .map(Signature::required_len)
        .max()
        .unwrap_or(0)
}

/// Reads chunks from `stream` until at least `window` bytes are buffered.
///
/// A `window` of zero stops after the first non-empty chunk. The last chunk is
/// kept whole, so the prefix may exceed the window by less than one chunk.
/// Everything returned here must still be written out by the caller.
///
/// # Errors
///
/// Returns [`DownloadError::EmptyResponse`] when the stream ends before any
/// byte arrives, and [`DownloadError::Stream`] when a chunk read fails.
pub(crate) async fn read_prefix<S, B, E>(
    stream: &mut S,
    window: usize,
    url: &str,
) -> Result<Vec<u8>, DownloadError>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Into<TransportError>,
{
    let target = window.max(1);
    let mut prefix = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| DownloadError::stream(url, e))?;
        prefix.extend_from_slice(chunk.as_ref());
        if prefix.len() >= target {
            break;
        }
    }

    if prefix.is_empty() {
        return Err(DownloadError::empty_response(url));
    }
    Ok(prefix)
}
