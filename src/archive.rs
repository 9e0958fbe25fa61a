//! The archive-stream resource: the open, sequentially written export
//! destination.
//!
//! The session and the worker each hold a clone of the handle. The session
//! side may close or discard the stream at any point of teardown; writes
//! arriving after that fail with an ordinary io error instead of reaching a
//! dead file, which keeps cancellation race-free.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone)]
pub struct ArchiveStream {
    inner: Arc<StreamInner>,
}

struct StreamInner {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl ArchiveStream {
    /// Opens (creates or truncates) the destination file.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create export destination {}", path.display()))?;
        Ok(Self {
            inner: Arc::new(StreamInner {
                path: path.to_path_buf(),
                file: Mutex::new(Some(file)),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    /// Closes the destination, flushing it to disk. Close errors are logged,
    /// never surfaced. Idempotent.
    pub fn close(&self) {
        if let Some(file) = self.lock().take() {
            if let Err(err) = file.sync_all() {
                tracing::warn!(path = %self.inner.path.display(), error = %err, "failed to flush export destination");
            }
        }
    }

    /// Closes the destination and deletes the (partial) output file.
    pub fn discard(&self) {
        self.close();
        if let Err(err) = std::fs::remove_file(&self.inner.path) {
            tracing::warn!(path = %self.inner.path.display(), error = %err, "failed to remove partial export");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<File>> {
        match self.inner.file.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("archive stream lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn closed_error() -> io::Error {
        io::Error::new(io::ErrorKind::BrokenPipe, "archive stream closed")
    }
}

impl Write for ArchiveStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.lock().as_mut() {
            Some(file) => file.write(buf),
            None => Err(Self::closed_error()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.lock().as_mut() {
            Some(file) => file.flush(),
            None => Err(Self::closed_error()),
        }
    }
}

// Container writers need to rewind for their central directory.
impl Seek for ArchiveStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self.lock().as_mut() {
            Some(file) => file.seek(pos),
            None => Err(Self::closed_error()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn writes_land_in_the_destination_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.zip");
        let mut stream = ArchiveStream::create(&path).unwrap();
        stream.write_all(b"payload").unwrap();
        stream.close();
        assert_eq!(std::fs::read(&path).unwrap(), b"payload");
    }

    #[test]
    fn writes_after_close_fail_without_panicking() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.zip");
        let mut stream = ArchiveStream::create(&path).unwrap();
        stream.close();
        assert!(!stream.is_open());
        let err = stream.write(b"late").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        // close is idempotent
        stream.close();
    }

    #[test]
    fn discard_removes_partial_output() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.zip");
        let mut stream = ArchiveStream::create(&path).unwrap();
        stream.write_all(b"partial").unwrap();

        let clone = stream.clone();
        clone.discard();

        assert!(!path.exists());
        assert!(stream.write(b"more").is_err());
    }

    #[test]
    fn discard_on_missing_file_is_swallowed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.zip");
        let stream = ArchiveStream::create(&path).unwrap();
        stream.close();
        std::fs::remove_file(&path).unwrap();
        // second delete fails inside, but only logs
        stream.discard();
    }
}
