use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;

use crate::error::Result;

/// Where the winning candidate ends up. Called at most once per run.
pub trait OutputSink: Sync {
    fn persist(&self, bytes: &[u8]) -> Result<()>;
}

/// Writes to a uniquely named temp file beside the target and renames it
/// into place, so a failed write never leaves a truncated output file behind.
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }
}

impl OutputSink for FileSink {
    fn persist(&self, bytes: &[u8]) -> Result<()> {
        let mut tmp = NamedTempFile::new_in(self.parent_dir())?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        // An unpersisted temp file is removed on drop.
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

/// Keeps the result in memory; handy for library callers and tests.
#[derive(Default)]
pub struct MemorySink {
    written: Mutex<Vec<Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every buffer persisted so far, in write order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.written.lock().map(|w| w.clone()).unwrap_or_default()
    }
}

impl OutputSink for MemorySink {
    fn persist(&self, bytes: &[u8]) -> Result<()> {
        if let Ok(mut written) = self.written.lock() {
            written.push(bytes.to_vec());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    #[test]
    fn file_sink_writes_exact_bytes_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.png");
        let sink = FileSink::new(&target);

        sink.persist(b"candidate bytes").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"candidate bytes");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn file_sink_leaves_sibling_files_alone() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.png");
        let sibling = dir.path().join("out.png.partial");
        fs::write(&sibling, b"keep me").unwrap();
        fs::write(&target, b"old output").unwrap();

        FileSink::new(&target).persist(b"new output").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"new output");
        assert_eq!(fs::read(&sibling).unwrap(), b"keep me");
    }

    #[test]
    fn file_sink_reports_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path().join("missing").join("out.png"));
        assert!(sink.persist(b"x").is_err());
    }

    #[test]
    fn memory_sink_records_writes() {
        let sink = MemorySink::new();
        sink.persist(b"one").unwrap();
        assert_eq!(sink.writes(), vec![b"one".to_vec()]);
    }
}
