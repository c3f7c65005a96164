//! The Open spool file.

use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::fs::SpoolFs;
use super::state::SpoolFileState;

/// Capacity of the write buffer in front of each spool file.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1 << 20;

/// Line delimiter between payloads.
pub const DELIMITER: u8 = b'\n';

/// An append-only spool file in the staging area.
///
/// Tracks the number of bytes appended so the writer can rotate on size
/// without asking the filesystem. Whole lines are buffered and written out
/// once the buffer fills, and the file remembers how many complete lines
/// reached the filesystem so a failed write can be cut back to them.
pub struct SpoolFile {
    name: String,
    path: PathBuf,
    inner: Box<dyn Write + Send>,
    buffer: Vec<u8>,
    capacity: usize,
    size: u64,
    lines: u64,
    written_size: u64,
    written_lines: u64,
    opened_at: Instant,
}

/// A spool file that has been flushed and closed, waiting for hand-off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedFile {
    /// File name, shared by the staging and the handling path.
    pub name: String,
    /// Location in the staging area.
    pub staging_path: PathBuf,
    /// Bytes written, delimiters included.
    pub size: u64,
    /// Number of payloads written.
    pub lines: u64,
}

/// A close that failed, handing the file back with the error.
#[derive(Debug)]
pub struct CloseError {
    file: SpoolFile,
    error: io::Error,
}

impl CloseError {
    /// The error from the final write.
    #[must_use]
    pub fn error(&self) -> &io::Error {
        &self.error
    }

    /// Splits into the file and the error.
    #[must_use]
    pub fn into_parts(self) -> (SpoolFile, io::Error) {
        (self.file, self.error)
    }
}

/// What [`SpoolFile::salvage`] kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Salvaged {
    /// The file cut back to its complete lines; `None` if none were written
    /// and the file was removed.
    pub closed: Option<ClosedFile>,
    /// Appended lines that did not make it to the filesystem.
    pub lost: u64,
}

impl SpoolFile {
    /// Creates `name` in `staging_dir`.
    ///
    /// # Errors
    ///
    /// Returns the I/O error from the filesystem.
    pub fn create(
        fs: &dyn SpoolFs,
        staging_dir: &Path,
        name: impl Into<String>,
        buffer_capacity: usize,
    ) -> io::Result<Self> {
        let name = name.into();
        let path = staging_dir.join(&name);
        let inner = fs.create(&path)?;
        Ok(Self {
            name,
            path,
            inner,
            buffer: Vec::new(),
            capacity: buffer_capacity.max(1),
            size: 0,
            lines: 0,
            written_size: 0,
            written_lines: 0,
            opened_at: Instant::now(),
        })
    }

    /// Appends one payload followed by the delimiter.
    ///
    /// # Errors
    ///
    /// Returns the I/O error from writing out a full buffer. The file must
    /// then be [salvaged](Self::salvage); further appends would follow a
    /// partial line.
    pub fn append(&mut self, payload: &[u8]) -> io::Result<()> {
        self.buffer.extend_from_slice(payload);
        self.buffer.push(DELIMITER);
        self.size += payload.len() as u64 + 1;
        self.lines += 1;
        if self.buffer.len() >= self.capacity {
            self.write_buffer()?;
        }
        Ok(())
    }

    fn write_buffer(&mut self) -> io::Result<()> {
        let mut written = 0;
        let result = loop {
            if written == self.buffer.len() {
                break Ok(());
            }
            match self.inner.write(&self.buffer[written..]) {
                Ok(0) => break Err(io::Error::from(io::ErrorKind::WriteZero)),
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => break Err(e),
            }
        };
        let whole = self.buffer[..written]
            .iter()
            .rposition(|&b| b == DELIMITER)
            .map_or(0, |i| i + 1);
        self.written_size += whole as u64;
        self.written_lines += self.buffer[..whole]
            .iter()
            .filter(|&&b| b == DELIMITER)
            .count() as u64;
        self.buffer.drain(..written);
        result
    }

    /// Writes out the buffer and releases the handle.
    ///
    /// # Errors
    ///
    /// Returns a [`CloseError`] carrying the file back if the final write
    /// fails.
    pub fn close(mut self) -> Result<ClosedFile, CloseError> {
        if let Err(error) = self.write_buffer().and_then(|()| self.inner.flush()) {
            return Err(CloseError { file: self, error });
        }
        Ok(ClosedFile {
            name: self.name,
            staging_path: self.path,
            size: self.size,
            lines: self.lines,
        })
    }

    /// Cuts the file back to the complete lines that reached the
    /// filesystem after a failed write. A file with none is removed.
    ///
    /// # Errors
    ///
    /// Returns the I/O error from truncating the file.
    pub fn salvage(self, fs: &dyn SpoolFs) -> io::Result<Salvaged> {
        let lost = self.lines - self.written_lines;
        drop(self.inner);
        if self.written_lines == 0 {
            fs.remove(&self.path)?;
            return Ok(Salvaged { closed: None, lost });
        }
        fs.truncate(&self.path, self.written_size)?;
        Ok(Salvaged {
            closed: Some(ClosedFile {
                name: self.name,
                staging_path: self.path,
                size: self.written_size,
                lines: self.written_lines,
            }),
            lost,
        })
    }

    /// Bytes appended so far.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Payloads appended so far.
    #[must_use]
    pub fn lines(&self) -> u64 {
        self.lines
    }

    /// File name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path in the staging area.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lifecycle state; always Open while this value exists.
    #[must_use]
    pub fn state(&self) -> SpoolFileState {
        SpoolFileState::Open
    }

    /// Time since the file was created.
    #[must_use]
    pub fn age(&self) -> std::time::Duration {
        self.opened_at.elapsed()
    }
}

impl fmt::Debug for SpoolFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpoolFile")
            .field("path", &self.path)
            .field("size", &self.size)
            .field("lines", &self.lines)
            .finish_non_exhaustive()
    }
}
