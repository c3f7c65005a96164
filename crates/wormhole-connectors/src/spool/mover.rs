//! Background hand-off of closed spool files.
//!
//! [`MoveWorker`] owns a bounded queue of closed files and a task that moves
//! each one from the staging area into the handling directory. It is built
//! by the caller and injected into every writer that should share it; when
//! the queue is full, `submit` waits, pushing backpressure back into the
//! write path. [`MoveWorker::shutdown`] closes the queue and waits until
//! every queued move has been attempted.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::file::ClosedFile;
use super::fs::SpoolFs;
use super::naming::partial_name;
use crate::error::ConnectorError;

/// Default capacity of the move queue.
pub const DEFAULT_MOVE_QUEUE_CAPACITY: usize = 5000;

/// Counters for the move worker.
#[derive(Debug, Default)]
pub struct MoveMetrics {
    /// Files moved into the handling directory.
    pub moved: AtomicU64,
    /// Moves that needed the copy fallback.
    pub copied: AtomicU64,
    /// Moves that failed; the file stays in staging.
    pub failed: AtomicU64,
}

impl MoveMetrics {
    /// Files moved so far.
    #[must_use]
    pub fn moved(&self) -> u64 {
        self.moved.load(Ordering::Relaxed)
    }

    /// Failed moves so far.
    #[must_use]
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Bounded hand-off queue serviced by one background task.
pub struct MoveWorker {
    tx: Mutex<Option<mpsc::Sender<ClosedFile>>>,
    task: Mutex<Option<JoinHandle<()>>>,
    handling_dir: PathBuf,
    capacity: usize,
    metrics: Arc<MoveMetrics>,
}

impl MoveWorker {
    /// Starts a worker that moves files into `handling_dir`.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(fs: Arc<dyn SpoolFs>, handling_dir: impl Into<PathBuf>, capacity: usize) -> Self {
        let handling_dir = handling_dir.into();
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let metrics = Arc::new(MoveMetrics::default());
        let task = tokio::spawn(move_loop(
            fs,
            handling_dir.clone(),
            rx,
            Arc::clone(&metrics),
        ));
        Self {
            tx: Mutex::new(Some(tx)),
            task: Mutex::new(Some(task)),
            handling_dir,
            capacity,
            metrics,
        }
    }

    /// Queues a closed file for hand-off, waiting while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::Closed` after [`shutdown`](Self::shutdown).
    pub async fn submit(&self, file: ClosedFile) -> Result<(), ConnectorError> {
        let tx = self.tx.lock().clone().ok_or(ConnectorError::Closed)?;
        tx.send(file).await.map_err(|_| ConnectorError::Closed)
    }

    /// Closes the queue and waits for every queued move to finish.
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&self) {
        drop(self.tx.lock().take());
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!(error = %e, "spool move worker panicked");
            }
            info!(
                moved = self.metrics.moved(),
                failed = self.metrics.failed(),
                "spool move worker drained"
            );
        }
    }

    /// Directory files are moved into.
    #[must_use]
    pub fn handling_dir(&self) -> &Path {
        &self.handling_dir
    }

    /// Queue capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the worker counters.
    #[must_use]
    pub fn metrics(&self) -> &MoveMetrics {
        &self.metrics
    }
}

impl fmt::Debug for MoveWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MoveWorker")
            .field("handling_dir", &self.handling_dir)
            .field("capacity", &self.capacity)
            .field("open", &self.tx.lock().is_some())
            .finish_non_exhaustive()
    }
}

async fn move_loop(
    fs: Arc<dyn SpoolFs>,
    handling_dir: PathBuf,
    mut rx: mpsc::Receiver<ClosedFile>,
    metrics: Arc<MoveMetrics>,
) {
    while let Some(file) = rx.recv().await {
        let fs = Arc::clone(&fs);
        let dir = handling_dir.clone();
        let source = file.staging_path.clone();
        let name = file.name.clone();
        let result =
            tokio::task::spawn_blocking(move || hand_off(fs.as_ref(), &source, &dir, &name)).await;

        match result {
            Ok(Ok(HandOff { target, copied })) => {
                metrics.moved.fetch_add(1, Ordering::Relaxed);
                if copied {
                    metrics.copied.fetch_add(1, Ordering::Relaxed);
                }
                debug!(
                    target = %target.display(),
                    bytes = file.size,
                    lines = file.lines,
                    copied,
                    "spool file handed off"
                );
            }
            Ok(Err(e)) => {
                metrics.failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    source = %file.staging_path.display(),
                    error = %e,
                    "failed to move spool file"
                );
            }
            Err(e) => {
                metrics.failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    source = %file.staging_path.display(),
                    error = %e,
                    "spool move task failed"
                );
            }
        }
    }
}

struct HandOff {
    target: PathBuf,
    copied: bool,
}

/// Moves `source` to `handling_dir/name`.
///
/// Tries an atomic rename first. If that fails for any reason other than a
/// missing source, the file is copied under a name without the Ready suffix
/// and then renamed, so readers never see a partial file.
fn hand_off(
    fs: &dyn SpoolFs,
    source: &Path,
    handling_dir: &Path,
    name: &str,
) -> io::Result<HandOff> {
    let target = handling_dir.join(name);
    match fs.rename(source, &target) {
        Ok(()) => Ok(HandOff {
            target,
            copied: false,
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(e),
        Err(e) => {
            debug!(error = %e, "rename into handling directory failed, copying");
            let partial = handling_dir.join(partial_name(name));
            fs.copy(source, &partial)?;
            fs.rename(&partial, &target)?;
            fs.remove(source)?;
            Ok(HandOff {
                target,
                copied: true,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spool::fs::MemoryFs;
    use std::io::Write;

    fn staged(fs: &MemoryFs, name: &str, body: &[u8]) -> ClosedFile {
        let path = PathBuf::from("/stage").join(name);
        let mut w = fs.create(&path).unwrap();
        w.write_all(body).unwrap();
        ClosedFile {
            name: name.to_string(),
            staging_path: path,
            size: body.len() as u64,
            lines: 1,
        }
    }

    #[tokio::test]
    async fn test_shutdown_drains_queue() {
        let fs = MemoryFs::new();
        let worker = MoveWorker::spawn(Arc::new(fs.clone()), "/handling", 4);

        for i in 0..10 {
            let file = staged(&fs, &format!("m_{i}.hsxa"), b"x\n");
            worker.submit(file).await.unwrap();
        }
        worker.shutdown().await;

        assert_eq!(worker.metrics().moved(), 10);
        for i in 0..10 {
            assert!(fs.exists(Path::new(&format!("/handling/m_{i}.hsxa"))));
            assert!(!fs.exists(Path::new(&format!("/stage/m_{i}.hsxa"))));
        }
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_closed() {
        let fs = MemoryFs::new();
        let worker = MoveWorker::spawn(Arc::new(fs.clone()), "/handling", 1);
        worker.shutdown().await;
        worker.shutdown().await;

        let file = staged(&fs, "late.hsxa", b"x\n");
        assert!(matches!(
            worker.submit(file).await,
            Err(ConnectorError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_missing_source_is_logged_not_retried() {
        let fs = MemoryFs::new();
        let worker = MoveWorker::spawn(Arc::new(fs.clone()), "/handling", 1);
        worker
            .submit(ClosedFile {
                name: "gone.hsxa".into(),
                staging_path: PathBuf::from("/stage/gone.hsxa"),
                size: 0,
                lines: 0,
            })
            .await
            .unwrap();
        worker.shutdown().await;

        assert_eq!(worker.metrics().failed(), 1);
        assert_eq!(worker.metrics().moved(), 0);
    }

    #[test]
    fn test_copy_fallback_across_filesystems() {
        let fs = MemoryFs::new();
        fs.fail_renames_into("/handling");
        staged(&fs, "big.hsxa", b"payload\n");

        let done = hand_off(&fs, Path::new("/stage/big.hsxa"), Path::new("/handling"), "big.hsxa").unwrap();
        assert!(done.copied);
        assert_eq!(fs.contents(&done.target).unwrap(), b"payload\n");
        assert!(!fs.exists(Path::new("/stage/big.hsxa")));
        assert!(!fs.exists(Path::new("/handling/big.hsxa.part")));
    }

    #[test]
    fn test_rename_fast_path() {
        let fs = MemoryFs::new();
        staged(&fs, "a.hsxa", b"payload\n");
        let done = hand_off(&fs, Path::new("/stage/a.hsxa"), Path::new("/handling"), "a.hsxa").unwrap();
        assert!(!done.copied);
        assert_eq!(done.target, PathBuf::from("/handling/a.hsxa"));
        assert_eq!(fs.contents(&done.target).unwrap(), b"payload\n");
    }
}
