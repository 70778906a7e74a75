//! Local cache tier backed by the filesystem.
//!
//! Cached artifacts are stored sealed, under the logical name plus the
//! [`SEALED_SUFFIX`]. Writes go to a temporary sibling first and are renamed
//! into place on completion, so a cached artifact is either the previous
//! fully written version or the new one, and readers holding an open file
//! are unaffected by a concurrent overwrite.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::io::{ReaderStream, StreamReader};

use crate::error::{Error, Result};
use crate::stream::PayloadStream;
use crate::transform::SEALED_SUFFIX;

#[derive(Debug)]
pub(crate) struct LocalCache {
    root: PathBuf,
}

impl LocalCache {
    pub fn new(root: &Path) -> Self {
        Self { root: root.into() }
    }

    fn sealed_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}{SEALED_SUFFIX}"))
    }

    /// Existence probe via stat.
    ///
    /// `Ok(None)` strictly means the artifact does not exist; any other
    /// failure (permissions, I/O) propagates and must not be treated as a
    /// miss by callers.
    pub async fn probe(&self, name: &str) -> Result<Option<u64>> {
        match tokio::fs::metadata(self.sealed_path(name)).await {
            Ok(metadata) => Ok(Some(metadata.len())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Opens the sealed artifact for streaming reads.
    pub async fn open(&self, name: &str) -> Result<PayloadStream> {
        let path = self.sealed_path(name);
        let file = match OpenOptions::new().read(true).open(path).await {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(Error::NotFound(name.into()));
            }
            Err(err) => return Err(err.into()),
        };

        Ok(ReaderStream::new(file).boxed())
    }

    /// Starts an incremental write. The artifact becomes visible only after
    /// [`CacheWriter::finish`].
    pub async fn create(&self, name: &str) -> Result<CacheWriter> {
        let final_path = self.sealed_path(name);
        if let Some(parent) = final_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp_path = final_path.with_extension("sealed.tmp");
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .await?;

        Ok(CacheWriter {
            writer: BufWriter::new(file),
            temp_path,
            final_path,
        })
    }

    /// Writes a full payload stream as the sealed artifact for `name`.
    pub async fn write_stream(&self, name: &str, stream: PayloadStream) -> Result<()> {
        let mut sink = self.create(name).await?;
        let mut reader = StreamReader::new(stream);

        match tokio::io::copy(&mut reader, sink.writer()).await {
            Ok(_) => sink.finish().await,
            Err(err) => {
                sink.discard().await;
                Err(Error::from_stream_io(err))
            }
        }
    }

    /// Removes the sealed artifact.
    ///
    /// Returns `false` if there was nothing to remove; a missing artifact is
    /// not an error.
    pub async fn remove(&self, name: &str) -> Result<bool> {
        match tokio::fs::remove_file(self.sealed_path(name)).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

/// Incremental writer for one cached artifact.
pub(crate) struct CacheWriter {
    writer: BufWriter<File>,
    temp_path: PathBuf,
    final_path: PathBuf,
}

impl CacheWriter {
    fn writer(&mut self) -> &mut BufWriter<File> {
        &mut self.writer
    }

    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        self.writer.write_all(chunk).await?;
        Ok(())
    }

    /// Flushes, syncs and atomically renames the artifact into place.
    pub async fn finish(mut self) -> Result<()> {
        self.writer.flush().await?;
        let file = self.writer.into_inner();
        file.sync_data().await?;
        drop(file);

        tokio::fs::rename(&self.temp_path, &self.final_path).await?;
        Ok(())
    }

    /// Abandons the write, leaving any previously committed artifact intact.
    pub async fn discard(self) {
        drop(self.writer);
        if let Err(err) = tokio::fs::remove_file(&self.temp_path).await {
            if err.kind() != ErrorKind::NotFound {
                tracing::warn!(path = %self.temp_path.display(), error = %err, "failed to clean up temporary cache file");
            }
        }
    }
}
