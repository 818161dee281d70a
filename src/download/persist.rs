//! Writing a sniffed body to its final destination.
//!
//! The prefix already consumed for classification is written first, then the
//! rest of the stream in order. Bytes go to a uniquely named hidden file next
//! to the destination which is renamed over it only once everything has been
//! flushed. The staging file is deleted when dropped, so an error or a
//! cancelled download leaves nothing behind.

use std::path::Path;

use futures_util::{Stream, StreamExt};
use tempfile::NamedTempFile;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use super::constants::PARTIAL_SUFFIX;
use super::error::{DownloadError, TransportError};

/// Creates every missing directory above `path`.
///
/// # Errors
///
/// Returns [`DownloadError::FileSystem`] naming the directory that could not
/// be created.
pub async fn ensure_parent_dir(path: &Path) -> Result<(), DownloadError> {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| DownloadError::file_system(parent, e))
}

/// Creates the staging file for `final_path` in the same directory.
///
/// Names look like `.XXXXXX.part`; the random part keeps them apart from
/// each other and from any path a URL can derive to a real download.
fn staging_file_for(final_path: &Path) -> Result<NamedTempFile, DownloadError> {
    let dir = final_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut builder = tempfile::Builder::new();
    builder.prefix(".").suffix(PARTIAL_SUFFIX);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o644));
    }

    builder
        .tempfile_in(dir)
        .map_err(|e| DownloadError::file_system(dir, e))
}

/// Writes `prefix` followed by the remainder of `rest` to `dest_root/relative`.
///
/// Returns the total number of bytes written. On failure, or if the returned
/// future is dropped, the staging file is removed and the destination path
/// keeps whatever it held before.
///
/// # Errors
///
/// Returns [`DownloadError::Stream`] when reading `rest` fails and
/// [`DownloadError::FileSystem`] when creating, writing, flushing or renaming
/// fails.
pub(crate) async fn persist_stream<S, B, E>(
    dest_root: &Path,
    relative: &Path,
    prefix: &[u8],
    rest: S,
    url: &str,
) -> Result<u64, DownloadError>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Into<TransportError>,
{
    let final_path = dest_root.join(relative);
    ensure_parent_dir(&final_path).await?;

    let staged = staging_file_for(&final_path)?;
    let file = staged
        .as_file()
        .try_clone()
        .map_err(|e| DownloadError::file_system(staged.path(), e))?;

    let bytes_written =
        match stream_to_file(File::from_std(file), prefix, rest, url, &final_path).await {
            Ok(n) => n,
            Err(err) => {
                debug!(path = %staged.path().display(), "discarding staging file after error");
                return Err(err);
            }
        };

    staged
        .persist(&final_path)
        .map_err(|e| DownloadError::file_system(&final_path, e.error))?;

    Ok(bytes_written)
}

async fn stream_to_file<S, B, E>(
    file: File,
    prefix: &[u8],
    mut rest: S,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Into<TransportError>,
{
    let mut writer = BufWriter::new(file);

    writer
        .write_all(prefix)
        .await
        .map_err(|e| DownloadError::file_system(file_path, e))?;
    let mut bytes_written = prefix.len() as u64;

    while let Some(chunk_result) = rest.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::stream(url, e))?;
        let chunk = chunk.as_ref();

        writer
            .write_all(chunk)
            .await
            .map_err(|e| DownloadError::file_system(file_path, e))?;

        bytes_written += chunk.len() as u64;
    }

    // Write completion is only reported once the buffered bytes reach the file.
    writer
        .flush()
        .await
        .map_err(|e| DownloadError::file_system(file_path, e))?;
    writer
        .into_inner()
        .sync_all()
        .await
        .map_err(|e| DownloadError::file_system(file_path, e))?;

    Ok(bytes_written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    use futures_util::stream;
    use tempfile::TempDir;

    type Chunk = Result<Vec<u8>, std::io::Error>;

    fn entry_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_persist_stream_writes_prefix_then_rest() {
        let temp_dir = TempDir::new().unwrap();
        let rest: Vec<Chunk> = vec![Ok(b"-middle-".to_vec()), Ok(b"end".to_vec())];

        let written = persist_stream(
            temp_dir.path(),
            Path::new("host/dir/file.bin"),
            b"start",
            stream::iter(rest),
            "http://host/dir/file.bin",
        )
        .await
        .unwrap();

        let final_path = temp_dir.path().join("host/dir/file.bin");
        assert_eq!(written, 16);
        assert_eq!(std::fs::read(&final_path).unwrap(), b"start-middle-end");
        assert_eq!(entry_names(&temp_dir.path().join("host/dir")), ["file.bin"]);
    }

    #[tokio::test]
    async fn test_persist_stream_truncates_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let final_path = temp_dir.path().join("a.bin");
        std::fs::write(&final_path, b"previous much longer contents").unwrap();

        persist_stream(
            temp_dir.path(),
            Path::new("a.bin"),
            b"new",
            stream::iter(Vec::<Chunk>::new()),
            "http://host/a.bin",
        )
        .await
        .unwrap();

        assert_eq!(std::fs::read(&final_path).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_persist_stream_does_not_clobber_part_named_sibling() {
        let temp_dir = TempDir::new().unwrap();

        persist_stream(
            temp_dir.path(),
            Path::new("img/photo.part"),
            b"first",
            stream::iter(Vec::<Chunk>::new()),
            "http://host/img/photo.part",
        )
        .await
        .unwrap();
        persist_stream(
            temp_dir.path(),
            Path::new("img/photo"),
            b"second",
            stream::iter(Vec::<Chunk>::new()),
            "http://host/img/photo",
        )
        .await
        .unwrap();

        let img = temp_dir.path().join("img");
        assert_eq!(std::fs::read(img.join("photo.part")).unwrap(), b"first");
        assert_eq!(std::fs::read(img.join("photo")).unwrap(), b"second");
        assert_eq!(entry_names(&img), ["photo", "photo.part"]);
    }

    #[tokio::test]
    async fn test_persist_stream_mid_transfer_error_leaves_no_file() {
        let temp_dir = TempDir::new().unwrap();
        let rest: Vec<Chunk> = vec![
            Ok(b"more".to_vec()),
            Err(std::io::Error::other("connection reset")),
        ];

        let err = persist_stream(
            temp_dir.path(),
            Path::new("host/broken.jpg"),
            b"\xFF\xD8\xFF",
            stream::iter(rest),
            "http://host/broken.jpg",
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DownloadError::Stream { .. }), "got {err:?}");
        assert!(entry_names(&temp_dir.path().join("host")).is_empty());
    }

    #[tokio::test]
    async fn test_persist_stream_cancelled_mid_transfer_leaves_no_file() {
        let temp_dir = TempDir::new().unwrap();
        let rest = stream::iter(vec![Ok::<_, std::io::Error>(b"more".to_vec())])
            .chain(stream::pending());

        let result = tokio::time::timeout(
            Duration::from_millis(50),
            persist_stream(
                temp_dir.path(),
                Path::new("host/stalled.jpg"),
                b"\xFF\xD8\xFF",
                rest,
                "http://host/stalled.jpg",
            ),
        )
        .await;

        assert!(result.is_err(), "stalled stream should time out");
        assert!(entry_names(&temp_dir.path().join("host")).is_empty());
    }

    #[tokio::test]
    async fn test_persist_stream_directory_failure_is_file_system_error() {
        let temp_dir = TempDir::new().unwrap();
        // A regular file where a directory is needed.
        std::fs::write(temp_dir.path().join("host"), b"not a dir").unwrap();

        let err = persist_stream(
            temp_dir.path(),
            Path::new("host/img.png"),
            b"x",
            stream::iter(Vec::<Chunk>::new()),
            "http://host/img.png",
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DownloadError::FileSystem { .. }), "got {err:?}");
    }

    #[test]
    fn test_staging_file_is_hidden_sibling() {
        let temp_dir = TempDir::new().unwrap();
        let staged = staging_file_for(&temp_dir.path().join("a.jpg")).unwrap();

        assert_eq!(staged.path().parent(), Some(temp_dir.path()));
        let name = staged.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with('.'), "{name}");
        assert!(name.ends_with(PARTIAL_SUFFIX), "{name}");
        assert_ne!(name, "a.jpg.part");
    }

    #[tokio::test]
    async fn test_ensure_parent_dir_accepts_bare_file_name() {
        ensure_parent_dir(Path::new("file.jpg")).await.unwrap();
    }
}
