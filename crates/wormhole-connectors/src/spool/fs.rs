//! Filesystem abstraction for the spool.
//!
//! The writer, the move worker and the reader only touch the filesystem
//! through [`SpoolFs`]. [`OsFs`] is the real implementation; [`MemoryFs`]
//! keeps everything in a map so state transitions and races can be tested
//! without disk I/O.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

/// An entry returned by [`SpoolFs::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// File name without the directory.
    pub name: String,
    /// Full path of the entry.
    pub path: PathBuf,
    /// Whether the entry is a directory.
    pub is_dir: bool,
}

/// Filesystem operations used by the spool.
///
/// `rename` must be atomic within one directory: when two callers race to
/// rename the same source, exactly one must succeed.
pub trait SpoolFs: Send + Sync + fmt::Debug {
    /// Creates (or truncates) a file and returns a writer for it.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    fn create(&self, path: &Path) -> io::Result<Box<dyn Write + Send>>;

    /// Atomically renames `from` to `to`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `from` does not exist.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Copies the contents of `from` to `to`, returning the byte count.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64>;

    /// Removes a file.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the file does not exist.
    fn remove(&self, path: &Path) -> io::Result<()>;

    /// Reads a whole file.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the file does not exist.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Lists the entries of a directory.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    fn list(&self, dir: &Path) -> io::Result<Vec<DirEntry>>;

    /// Creates a directory and its parents if missing.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    fn create_dir_all(&self, dir: &Path) -> io::Result<()>;

    /// Cuts a file down to `len` bytes.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the file does not exist.
    fn truncate(&self, path: &Path, len: u64) -> io::Result<()>;
}

/// [`SpoolFs`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFs;

impl SpoolFs for OsFs {
    fn create(&self, path: &Path) -> io::Result<Box<dyn Write + Send>> {
        Ok(Box::new(std::fs::File::create(path)?))
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
        let written = std::fs::copy(from, to)?;
        std::fs::File::open(to)?.sync_all()?;
        Ok(written)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry.path(),
                is_dir: entry.file_type()?.is_dir(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn create_dir_all(&self, dir: &Path) -> io::Result<()> {
        std::fs::create_dir_all(dir)
    }

    fn truncate(&self, path: &Path, len: u64) -> io::Result<()> {
        let file = std::fs::OpenOptions::new().write(true).open(path)?;
        file.set_len(len)?;
        file.sync_all()
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    files: BTreeMap<PathBuf, Arc<Mutex<Vec<u8>>>>,
    dirs: BTreeSet<PathBuf>,
    fail_renames_into: BTreeSet<PathBuf>,
    write_limit: Option<usize>,
}

/// In-memory [`SpoolFs`] for tests.
///
/// Cloning shares the underlying state. Writers returned by `create` append
/// to a buffer that stays attached to the path across renames.
#[derive(Debug, Clone, Default)]
pub struct MemoryFs {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryFs {
    /// Creates an empty in-memory filesystem.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a file with the given contents.
    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        self.state
            .lock()
            .files
            .insert(path.into(), Arc::new(Mutex::new(contents.into())));
    }

    /// Returns `true` if a file exists at `path`.
    #[must_use]
    pub fn exists(&self, path: &Path) -> bool {
        self.state.lock().files.contains_key(path)
    }

    /// Returns the contents of the file at `path`.
    #[must_use]
    pub fn contents(&self, path: &Path) -> Option<Vec<u8>> {
        self.state
            .lock()
            .files
            .get(path)
            .map(|buf| buf.lock().clone())
    }

    /// Returns every file path, sorted.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.state.lock().files.keys().cloned().collect()
    }

    /// Makes renames from another directory into `dir` fail, as a rename
    /// across filesystems would. Renames within `dir` still succeed.
    pub fn fail_renames_into(&self, dir: impl Into<PathBuf>) {
        self.state.lock().fail_renames_into.insert(dir.into());
    }

    /// Caps every file at `limit` bytes, as a full disk would: the write
    /// reaching the cap is cut short and later writes fail.
    pub fn fail_writes_after(&self, limit: usize) {
        self.state.lock().write_limit = Some(limit);
    }
}

struct MemoryWriter {
    buf: Arc<Mutex<Vec<u8>>>,
    state: Arc<Mutex<MemoryState>>,
}

impl Write for MemoryWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let limit = self.state.lock().write_limit;
        let mut buf = self.buf.lock();
        let room = limit.map_or(data.len(), |limit| limit.saturating_sub(buf.len()));
        if room == 0 && !data.is_empty() {
            return Err(io::Error::new(io::ErrorKind::Other, "no space left on device"));
        }
        let n = room.min(data.len());
        buf.extend_from_slice(&data[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} not found", path.display()),
    )
}

impl SpoolFs for MemoryFs {
    fn create(&self, path: &Path) -> io::Result<Box<dyn Write + Send>> {
        let buf = Arc::new(Mutex::new(Vec::new()));
        self.state
            .lock()
            .files
            .insert(path.to_path_buf(), Arc::clone(&buf));
        Ok(Box::new(MemoryWriter {
            buf,
            state: Arc::clone(&self.state),
        }))
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let mut state = self.state.lock();
        let crosses = from.parent() != to.parent();
        if crosses
            && to
                .parent()
                .is_some_and(|dir| state.fail_renames_into.contains(dir))
        {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "rename across devices",
            ));
        }
        let buf = state.files.remove(from).ok_or_else(|| not_found(from))?;
        state.files.insert(to.to_path_buf(), buf);
        Ok(())
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
        let mut state = self.state.lock();
        let data = state
            .files
            .get(from)
            .map(|buf| buf.lock().clone())
            .ok_or_else(|| not_found(from))?;
        let len = data.len() as u64;
        state
            .files
            .insert(to.to_path_buf(), Arc::new(Mutex::new(data)));
        Ok(len)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        self.state
            .lock()
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| not_found(path))
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.contents(path).ok_or_else(|| not_found(path))
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<DirEntry>> {
        let state = self.state.lock();
        let mut entries: Vec<DirEntry> = state
            .files
            .keys()
            .map(|p| (p, false))
            .chain(state.dirs.iter().map(|p| (p, true)))
            .filter(|(p, _)| p.parent() == Some(dir))
            .filter_map(|(p, is_dir)| {
                p.file_name().map(|name| DirEntry {
                    name: name.to_string_lossy().into_owned(),
                    path: p.clone(),
                    is_dir,
                })
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn create_dir_all(&self, dir: &Path) -> io::Result<()> {
        let mut state = self.state.lock();
        let mut current = Some(dir);
        while let Some(d) = current {
            if d.as_os_str().is_empty() {
                break;
            }
            state.dirs.insert(d.to_path_buf());
            current = d.parent();
        }
        Ok(())
    }

    fn truncate(&self, path: &Path, len: u64) -> io::Result<()> {
        let state = self.state.lock();
        let buf = state.files.get(path).ok_or_else(|| not_found(path))?;
        buf.lock()
            .truncate(usize::try_from(len).unwrap_or(usize::MAX));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_rename_is_exclusive() {
        let fs = MemoryFs::new();
        fs.insert("/h/a.hsxa", b"x".to_vec());

        assert!(fs.rename(Path::new("/h/a.hsxa"), Path::new("/h/a.hsxa_bak")).is_ok());
        let second = fs.rename(Path::new("/h/a.hsxa"), Path::new("/h/a.hsxa_bak"));
        assert_eq!(second.unwrap_err().kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_memory_writer_follows_rename() {
        let fs = MemoryFs::new();
        let mut w = fs.create(Path::new("/stage/a")).unwrap();
        w.write_all(b"hello\n").unwrap();
        fs.rename(Path::new("/stage/a"), Path::new("/h/a")).unwrap();
        assert_eq!(fs.contents(Path::new("/h/a")).unwrap(), b"hello\n");
    }

    #[test]
    fn test_memory_write_limit_cuts_short() {
        let fs = MemoryFs::new();
        fs.fail_writes_after(4);
        let mut w = fs.create(Path::new("/stage/a")).unwrap();
        assert_eq!(w.write(b"abcdef").unwrap(), 4);
        assert!(w.write(b"ef").is_err());
        assert_eq!(fs.contents(Path::new("/stage/a")).unwrap(), b"abcd");

        fs.truncate(Path::new("/stage/a"), 2).unwrap();
        assert_eq!(fs.contents(Path::new("/stage/a")).unwrap(), b"ab");
        assert_eq!(
            fs.truncate(Path::new("/stage/missing"), 0).unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
    }

    #[test]
    fn test_memory_list_marks_dirs() {
        let fs = MemoryFs::new();
        fs.create_dir_all(Path::new("/h/nested")).unwrap();
        fs.insert("/h/b.hsxa", Vec::new());
        fs.insert("/other/c.hsxa", Vec::new());

        let entries = fs.list(Path::new("/h")).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "b.hsxa");
        assert!(!entries[0].is_dir);
        assert_eq!(entries[1].name, "nested");
        assert!(entries[1].is_dir);
    }

    #[test]
    fn test_os_fs_roundtrip() {
        let dir = tempdir().unwrap();
        let fs = OsFs;
        let a = dir.path().join("a.hsxa");
        let b = dir.path().join("a.hsxa_bak");

        let mut w = fs.create(&a).unwrap();
        w.write_all(b"line\n").unwrap();
        w.flush().unwrap();
        drop(w);

        fs.rename(&a, &b).unwrap();
        assert!(fs.rename(&a, &b).is_err());
        assert_eq!(fs.read(&b).unwrap(), b"line\n");
        fs.truncate(&b, 4).unwrap();
        assert_eq!(fs.read(&b).unwrap(), b"line");

        let names: Vec<String> = fs.list(dir.path()).unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["a.hsxa_bak".to_string()]);

        fs.remove(&b).unwrap();
        assert!(fs.list(dir.path()).unwrap().is_empty());
    }
}
