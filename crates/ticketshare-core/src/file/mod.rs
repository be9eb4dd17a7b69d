//! File operations for TicketShare.
//!
//! - Describing the single offered file
//! - Sequential chunked reading on the host side
//! - Ordered writing with a running SHA-256 on the receiver side
//! - Filename sanitizing for advertised names

use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{Error, Result};

/// The file a host offers to every receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferedFile {
    /// Path on the host's filesystem
    pub path: PathBuf,
    /// Name advertised in file info
    pub name: String,
    /// Size advertised in file info
    pub size: u64,
}

impl OfferedFile {
    /// Stat `path` and capture the name and size to advertise.
    ///
    /// # Errors
    ///
    /// Returns `Error::FileNotFound` if nothing exists at `path`, and
    /// `Error::InvalidPath` if it is not a regular file or has no file name.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let metadata = std::fs::metadata(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.display().to_string())
            } else {
                Error::FileOpen {
                    path: path.clone(),
                    source: e,
                }
            }
        })?;

        if !metadata.is_file() {
            return Err(Error::InvalidPath(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| Error::InvalidPath(path.display().to_string()))?;

        Ok(Self {
            path,
            name,
            size: metadata.len(),
        })
    }
}

/// Sequential fixed-size chunk reader.
///
/// Every chunk except the last is exactly `chunk_size` bytes; an empty file
/// yields no chunks at all.
#[derive(Debug)]
pub struct FileChunker {
    path: PathBuf,
    file: File,
    chunk_size: usize,
}

impl FileChunker {
    /// Open `path` for chunked reading.
    ///
    /// `chunk_size` is clamped to `1..=MAX_CHUNK_SIZE`.
    ///
    /// # Errors
    ///
    /// Returns `Error::FileOpen` if the file cannot be opened.
    pub async fn open(path: &Path, chunk_size: usize) -> Result<Self> {
        let file = File::open(path).await.map_err(|source| Error::FileOpen {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            chunk_size: chunk_size.clamp(1, crate::MAX_CHUNK_SIZE),
        })
    }

    /// Read the next chunk, or `None` at end of file.
    ///
    /// # Errors
    ///
    /// Returns `Error::FileRead` if the underlying read fails.
    pub async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        let mut buffer = vec![0u8; self.chunk_size];
        let mut filled = 0;

        while filled < buffer.len() {
            let n = self
                .file
                .read(&mut buffer[filled..])
                .await
                .map_err(|source| Error::FileRead {
                    path: self.path.clone(),
                    source,
                })?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled == 0 {
            return Ok(None);
        }

        buffer.truncate(filled);
        Ok(Some(buffer))
    }
}

/// Result of a completed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrittenFile {
    /// Bytes written
    pub bytes_written: u64,
    /// SHA-256 over the written bytes, in order
    pub sha256: [u8; 32],
}

/// Writer for received chunks, appended in arrival order.
///
/// Dropping a writer without calling [`FileWriter::finalize`] leaves whatever
/// was written on disk.
#[derive(Debug)]
pub struct FileWriter {
    output_path: PathBuf,
    file: File,
    bytes_written: u64,
    sha256_hasher: Sha256,
}

impl FileWriter {
    /// Create (or truncate) the output file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns `Error::FileCreate` if the file cannot be created.
    pub async fn create(output_path: &Path) -> Result<Self> {
        let create_err = |source| Error::FileCreate {
            path: output_path.to_path_buf(),
            source,
        };

        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(create_err)?;
            }
        }

        let file = File::create(output_path).await.map_err(create_err)?;
        Ok(Self::from_file(output_path, file))
    }

    /// Write into an already open `file` whose path is `output_path`.
    pub fn from_file(output_path: &Path, file: File) -> Self {
        Self {
            output_path: output_path.to_path_buf(),
            file,
            bytes_written: 0,
            sha256_hasher: Sha256::new(),
        }
    }

    /// Append one chunk.
    ///
    /// # Errors
    ///
    /// Returns `Error::FileWrite` if the write fails.
    pub async fn write_chunk(&mut self, data: &[u8]) -> Result<()> {
        self.file
            .write_all(data)
            .await
            .map_err(|source| self.write_error(source))?;

        self.sha256_hasher.update(data);
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    /// Flush and sync the file, returning the byte count and digest.
    ///
    /// # Errors
    ///
    /// Returns `Error::FileWrite` if the file cannot be synced.
    pub async fn finalize(mut self) -> Result<WrittenFile> {
        self.file
            .flush()
            .await
            .map_err(|source| self.write_error(source))?;
        self.file
            .sync_all()
            .await
            .map_err(|source| self.write_error(source))?;

        Ok(WrittenFile {
            bytes_written: self.bytes_written,
            sha256: self.sha256_hasher.finalize().into(),
        })
    }

    /// Stop writing and leave what was written so far on disk.
    ///
    /// Waits for any in-flight write to land. Returns the bytes kept.
    pub async fn abandon(mut self) -> u64 {
        if let Err(e) = self.file.flush().await {
            tracing::debug!(
                "Failed to flush partial file {}: {}",
                self.output_path.display(),
                e
            );
        }
        self.bytes_written
    }

    /// Get the output path.
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Get the current bytes written count.
    pub const fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    fn write_error(&self, source: std::io::Error) -> Error {
        Error::FileWrite {
            path: self.output_path.clone(),
            source,
        }
    }
}

/// Reduce an advertised filename to a single safe path component.
///
/// Directory parts are dropped (both `/` and `\` separators), so a host cannot
/// steer the receiver outside its output directory.
///
/// # Errors
///
/// Returns `Error::InvalidPath` if nothing usable remains.
pub fn sanitize_file_name(advertised: &str) -> Result<String> {
    let last = advertised
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    let mut components = Path::new(last).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) => Ok(name.to_string_lossy().to_string()),
        _ => Err(Error::InvalidPath(format!(
            "unusable file name '{advertised}'"
        ))),
    }
}

/// Destination for an advertised filename inside `output_dir`.
///
/// # Errors
///
/// Returns `Error::InvalidPath` if the name cannot be sanitized.
pub fn destination_path(output_dir: &Path, advertised: &str) -> Result<PathBuf> {
    Ok(output_dir.join(sanitize_file_name(advertised)?))
}

/// Format a file size for display.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Lowercase hex rendering of a digest.
#[must_use]
pub fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}
