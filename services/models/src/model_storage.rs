use anyhow::{Context, Result};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

/// Filesystem directory holding uploaded model bytes
///
/// Files are named `<id><ext>`, so the directory layout carries no
/// client-controlled path components.
#[derive(Debug, Clone)]
pub struct ModelStorage {
    root: PathBuf,
}

impl ModelStorage {
    /// Open the storage directory, creating it if missing
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .with_context(|| format!("Failed to create upload directory {}", root.display()))?;

        info!(upload_dir = %root.display(), "Model storage initialized");

        Ok(Self { root })
    }

    /// Storage directory without touching the filesystem
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Location for a model's bytes: `<root>/<id><ext>`
    pub fn path_for(&self, model_id: &str, extension: &str) -> PathBuf {
        self.root
            .join(format!("{}{}", sanitize_file_stem(model_id), extension))
    }

    /// Create `path` for writing, failing with `AlreadyExists` if it is taken
    ///
    /// The returned file belongs to the caller alone; nothing else is ever
    /// truncated or overwritten.
    pub async fn create_new(&self, path: &Path) -> io::Result<File> {
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
    }

    /// Stream chunks into a file from [`ModelStorage::create_new`], returning
    /// the number of bytes written
    ///
    /// A failure from either the stream or the filesystem removes whatever was
    /// partially written before the error is returned.
    #[instrument(skip(self, file, chunks), fields(path = %path.display()))]
    pub async fn write_stream<S, E>(&self, file: File, path: &Path, chunks: S) -> io::Result<u64>
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Send,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        match copy_chunks(file, chunks).await {
            Ok(written) => {
                debug!(size_bytes = written, "Model bytes written");
                Ok(written)
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(path).await {
                    if cleanup.kind() != io::ErrorKind::NotFound {
                        warn!(error = %cleanup, "Failed to remove partial upload");
                    }
                }
                Err(e)
            }
        }
    }

    /// Remove a stored file; `Ok(false)` when it was already gone
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn remove(&self, path: &Path) -> io::Result<bool> {
        match fs::remove_file(path).await {
            Ok(()) => {
                debug!("Model file removed");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Check if a stored file exists
    pub async fn exists(&self, path: &Path) -> bool {
        fs::try_exists(path).await.unwrap_or(false)
    }

    /// Open a stored file for streaming back to a client
    pub async fn open(&self, path: &Path) -> io::Result<File> {
        File::open(path).await
    }
}

async fn copy_chunks<S, E>(mut file: File, chunks: S) -> io::Result<u64>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    tokio::pin!(chunks);

    let mut written = 0u64;
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(io::Error::other)?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    file.sync_all().await?;

    Ok(written)
}

/// Sanitize a file stem to prevent path traversal
fn sanitize_file_stem(stem: &str) -> String {
    stem.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}
