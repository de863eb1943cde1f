//! Append-only text sinks backing the output channels.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::util::Result;

/// Append-only text sink. No random access, no read-back.
pub trait OutputSink {
    /// Append text.
    fn write_str(&mut self, text: &str) -> Result<()>;

    /// Push buffered text to the underlying medium.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Total bytes appended so far.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Buffered file sink.
pub struct FileSink {
    path: PathBuf,
    writer: BufWriter<File>,
    pos: u64,
}

impl FileSink {
    /// Create (truncating) the file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        Ok(Self {
            path: path.as_ref().to_path_buf(),
            writer: BufWriter::with_capacity(2 * 1024 * 1024, file), // 2MB buffer
            pos: 0,
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OutputSink for FileSink {
    fn write_str(&mut self, text: &str) -> Result<()> {
        self.writer.write_all(text.as_bytes())?;
        self.pos += text.len() as u64;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    #[inline]
    fn len(&self) -> u64 {
        self.pos
    }
}

/// In-memory sink whose buffer stays readable through a shared handle.
#[derive(Clone, Default)]
pub struct MemorySink {
    buf: Arc<Mutex<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything written so far.
    pub fn contents(&self) -> String {
        self.buf.lock().clone()
    }

    /// Take the contents, leaving the buffer empty.
    pub fn take(&self) -> String {
        std::mem::take(&mut *self.buf.lock())
    }
}

impl OutputSink for MemorySink {
    fn write_str(&mut self, text: &str) -> Result<()> {
        self.buf.lock().push_str(text);
        Ok(())
    }

    fn len(&self) -> u64 {
        self.buf.lock().len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_sink_shared_handle() {
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        writer.write_str("Node OBCube {\n").unwrap();
        assert_eq!(sink.contents(), "Node OBCube {\n");
        assert_eq!(writer.len(), 14);
        assert_eq!(sink.take(), "Node OBCube {\n");
        assert!(sink.is_empty());
    }

    #[test]
    fn test_file_sink() -> crate::util::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("scene.vrscene");
        let mut sink = FileSink::create(&path)?;
        sink.write_str("// header\n")?;
        sink.flush()?;
        assert_eq!(sink.len(), 10);
        assert_eq!(std::fs::read_to_string(&path)?, "// header\n");
        Ok(())
    }
}
