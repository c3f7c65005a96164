//! Spool writer.
//!
//! [`SpoolWriter`] drains the ingest queue into newline-delimited files in
//! the staging area and hands each closed file to the [`MoveWorker`]. A file
//! is rotated as soon as its size reaches `max_file_size`, or when the
//! rotation tick fires, whichever comes first.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::file::{Salvaged, SpoolFile, DEFAULT_BUFFER_CAPACITY, DELIMITER};
use super::fs::SpoolFs;
use super::mover::{MoveWorker, DEFAULT_MOVE_QUEUE_CAPACITY};
use super::naming;
use crate::config::{ConfigKeySpec, ConnectorConfig};
use crate::error::ConnectorError;
use crate::metrics::ConnectorMetrics;
use crate::shutdown::{self, ShutdownSignal};

/// Default size at which a spool file is rotated.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Default rotation tick.
pub const DEFAULT_WRITER_TICK: Duration = Duration::from_secs(1);

/// Default handling directory.
pub const DEFAULT_HANDLING_PATH: &str = "./tmp";

/// Configuration for [`SpoolWriter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpoolWriterConfig {
    /// Shared directory readers scan.
    pub handling_dir: PathBuf,
    /// Process-local directory holding Open files.
    pub staging_dir: PathBuf,
    /// Rotation tick.
    pub tick: Duration,
    /// Size at which the open file is rotated.
    pub max_file_size: u64,
    /// Write buffer capacity per file.
    pub buffer_capacity: usize,
    /// Capacity of the move queue.
    pub move_queue_capacity: usize,
}

impl Default for SpoolWriterConfig {
    fn default() -> Self {
        Self {
            handling_dir: PathBuf::from(DEFAULT_HANDLING_PATH),
            staging_dir: std::env::temp_dir(),
            tick: DEFAULT_WRITER_TICK,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            move_queue_capacity: DEFAULT_MOVE_QUEUE_CAPACITY,
        }
    }
}

impl SpoolWriterConfig {
    /// Parses a writer config from a [`ConnectorConfig`].
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::ConfigurationError` if a value is invalid.
    pub fn from_config(config: &ConnectorConfig) -> Result<Self, ConnectorError> {
        let defaults = Self::default();
        let cfg = Self {
            handling_dir: config
                .get("spool.handling.path")
                .map_or(defaults.handling_dir, PathBuf::from),
            staging_dir: config
                .get("spool.staging.path")
                .map_or(defaults.staging_dir, PathBuf::from),
            tick: config
                .get_secs("spool.writer.tick.secs")?
                .unwrap_or(defaults.tick),
            max_file_size: config
                .get_parsed("spool.file.max.size")?
                .unwrap_or(defaults.max_file_size),
            buffer_capacity: config
                .get_parsed("spool.writer.buffer.size")?
                .unwrap_or(defaults.buffer_capacity),
            move_queue_capacity: config
                .get_parsed("spool.move.queue.size")?
                .unwrap_or(defaults.move_queue_capacity),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::ConfigurationError` on zero sizes or tick.
    pub fn validate(&self) -> Result<(), ConnectorError> {
        if self.tick.is_zero() {
            return Err(ConnectorError::ConfigurationError(
                "spool.writer.tick.secs must be > 0".into(),
            ));
        }
        if self.max_file_size == 0 {
            return Err(ConnectorError::ConfigurationError(
                "spool.file.max.size must be > 0".into(),
            ));
        }
        if self.move_queue_capacity == 0 {
            return Err(ConnectorError::ConfigurationError(
                "spool.move.queue.size must be > 0".into(),
            ));
        }
        if self.handling_dir == self.staging_dir {
            return Err(ConnectorError::ConfigurationError(
                "spool staging and handling paths must differ".into(),
            ));
        }
        Ok(())
    }

    /// Keys read by [`from_config`](Self::from_config).
    #[must_use]
    pub fn config_keys() -> Vec<ConfigKeySpec> {
        vec![
            ConfigKeySpec::optional(
                "spool.handling.path",
                "Directory shared with the dimension side",
                DEFAULT_HANDLING_PATH,
            ),
            ConfigKeySpec::optional(
                "spool.staging.path",
                "Directory for files being written",
                "OS temp dir",
            ),
            ConfigKeySpec::optional("spool.writer.tick.secs", "Rotation interval", "1"),
            ConfigKeySpec::optional(
                "spool.file.max.size",
                "Rotation size in bytes",
                DEFAULT_MAX_FILE_SIZE.to_string(),
            ),
            ConfigKeySpec::optional(
                "spool.writer.buffer.size",
                "Write buffer per file in bytes",
                DEFAULT_BUFFER_CAPACITY.to_string(),
            ),
            ConfigKeySpec::optional(
                "spool.move.queue.size",
                "Closed files waiting for hand-off",
                DEFAULT_MOVE_QUEUE_CAPACITY.to_string(),
            ),
        ]
    }
}

/// Why a file was rotated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    /// The file reached the size limit.
    Size,
    /// The rotation tick fired.
    Timer,
    /// The writer is shutting down.
    Shutdown,
}

/// Counters for [`SpoolWriter`].
#[derive(Debug, Default)]
pub struct SpoolWriterMetrics {
    /// Payloads appended.
    pub payloads: AtomicU64,
    /// Bytes appended, delimiters included.
    pub bytes: AtomicU64,
    /// Files rotated because they reached the size limit.
    pub size_rotations: AtomicU64,
    /// Files rotated by the tick.
    pub timer_rotations: AtomicU64,
    /// Files closed on shutdown.
    pub shutdown_rotations: AtomicU64,
    /// Payloads dropped because they were empty, could not be framed or
    /// were lost to a failed write.
    pub dropped: AtomicU64,
    /// Files cut back to their complete lines after a failed write.
    pub salvaged: AtomicU64,
}

impl SpoolWriterMetrics {
    /// Records an appended payload of `bytes` bytes.
    pub fn record_payload(&self, bytes: u64) {
        self.payloads.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Records a rotation.
    pub fn record_rotation(&self, reason: Rotation) {
        let counter = match reason {
            Rotation::Size => &self.size_rotations,
            Rotation::Timer => &self.timer_rotations,
            Rotation::Shutdown => &self.shutdown_rotations,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a dropped payload.
    pub fn record_drop(&self) {
        self.record_drops(1);
    }

    /// Records `n` dropped payloads.
    pub fn record_drops(&self, n: u64) {
        self.dropped.fetch_add(n, Ordering::Relaxed);
    }

    /// Rotations for `reason` so far.
    #[must_use]
    pub fn rotations(&self, reason: Rotation) -> u64 {
        match reason {
            Rotation::Size => self.size_rotations.load(Ordering::Relaxed),
            Rotation::Timer => self.timer_rotations.load(Ordering::Relaxed),
            Rotation::Shutdown => self.shutdown_rotations.load(Ordering::Relaxed),
        }
    }

    /// Converts to [`ConnectorMetrics`].
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_connector_metrics(&self) -> ConnectorMetrics {
        let mut m = ConnectorMetrics {
            records_total: self.payloads.load(Ordering::Relaxed),
            bytes_total: self.bytes.load(Ordering::Relaxed),
            errors_total: self.dropped.load(Ordering::Relaxed),
            lag: 0,
            custom: Vec::new(),
        };
        m.add_custom("spool.rotations.size", self.rotations(Rotation::Size) as f64);
        m.add_custom("spool.rotations.timer", self.rotations(Rotation::Timer) as f64);
        m.add_custom(
            "spool.rotations.shutdown",
            self.rotations(Rotation::Shutdown) as f64,
        );
        m.add_custom(
            "spool.salvaged",
            self.salvaged.load(Ordering::Relaxed) as f64,
        );
        m
    }
}

/// Appends payloads to rotating spool files.
pub struct SpoolWriter {
    config: SpoolWriterConfig,
    fs: Arc<dyn SpoolFs>,
    mover: Arc<MoveWorker>,
    current: Option<SpoolFile>,
    metrics: Arc<SpoolWriterMetrics>,
}

impl SpoolWriter {
    /// Creates a writer that hands files to `mover`.
    ///
    /// Creates the staging and handling directories if they are missing.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::Io` if a directory cannot be created.
    pub fn new(
        config: SpoolWriterConfig,
        fs: Arc<dyn SpoolFs>,
        mover: Arc<MoveWorker>,
    ) -> Result<Self, ConnectorError> {
        fs.create_dir_all(&config.staging_dir)?;
        fs.create_dir_all(&config.handling_dir)?;
        Ok(Self {
            config,
            fs,
            mover,
            current: None,
            metrics: Arc::new(SpoolWriterMetrics::default()),
        })
    }

    /// Returns the shared metrics handle.
    #[must_use]
    pub fn metrics(&self) -> Arc<SpoolWriterMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Returns the writer configuration.
    #[must_use]
    pub fn config(&self) -> &SpoolWriterConfig {
        &self.config
    }

    /// Size of the open file, or 0 if none is open.
    #[must_use]
    pub fn open_size(&self) -> u64 {
        self.current.as_ref().map_or(0, SpoolFile::size)
    }

    /// Appends one payload, opening a file if none is open.
    ///
    /// Returns `true` if the append pushed the file over the size limit and
    /// it was rotated. An empty payload, or one containing the line
    /// delimiter, is dropped.
    ///
    /// If the write fails, the file is cut back to its last complete line
    /// and handed off; the lines after it are counted as dropped.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::Io` if the file cannot be created or
    /// written, and `ConnectorError::Closed` if the move worker is gone.
    pub async fn append(&mut self, payload: &[u8]) -> Result<bool, ConnectorError> {
        if payload.is_empty() {
            self.metrics.record_drop();
            warn!("dropping empty payload");
            return Ok(false);
        }
        if payload.contains(&DELIMITER) {
            self.metrics.record_drop();
            warn!(len = payload.len(), "dropping payload containing a newline");
            return Ok(false);
        }

        if self.current.is_none() {
            let file = SpoolFile::create(
                self.fs.as_ref(),
                &self.config.staging_dir,
                naming::generate(),
                self.config.buffer_capacity,
            )?;
            debug!(path = %file.path().display(), "opened spool file");
            self.current = Some(file);
        }
        let Some(file) = self.current.as_mut() else {
            return Err(ConnectorError::Internal("spool file not open".into()));
        };

        if let Err(e) = file.append(payload) {
            if let Some(file) = self.current.take() {
                self.salvage(file, &e).await?;
            }
            return Err(e.into());
        }
        self.metrics.record_payload(payload.len() as u64 + 1);

        if file.size() >= self.config.max_file_size {
            self.rotate(Rotation::Size).await?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Closes the open file, if any, and queues it for hand-off.
    ///
    /// Returns `true` if a file was closed.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::Io` if the final flush fails and
    /// `ConnectorError::Closed` if the move worker is gone.
    pub async fn rotate(&mut self, reason: Rotation) -> Result<bool, ConnectorError> {
        let Some(file) = self.current.take() else {
            return Ok(false);
        };
        let closed = match file.close() {
            Ok(closed) => closed,
            Err(failed) => {
                let (file, e) = failed.into_parts();
                self.salvage(file, &e).await?;
                return Err(e.into());
            }
        };
        debug!(
            path = %closed.staging_path.display(),
            bytes = closed.size,
            lines = closed.lines,
            ?reason,
            "rotated spool file"
        );
        self.metrics.record_rotation(reason);
        self.mover.submit(closed).await?;
        Ok(true)
    }

    /// Cuts a file whose write failed back to its complete lines and hands
    /// it off.
    async fn salvage(&mut self, file: SpoolFile, cause: &io::Error) -> Result<(), ConnectorError> {
        let path = file.path().to_path_buf();
        let appended = file.lines();
        match file.salvage(self.fs.as_ref()) {
            Ok(Salvaged { closed, lost }) => {
                self.metrics.record_drops(lost);
                error!(
                    path = %path.display(),
                    lost,
                    kept = closed.as_ref().map_or(0, |c| c.lines),
                    error = %cause,
                    "spool write failed; lines after the last complete one are lost"
                );
                if let Some(closed) = closed {
                    self.metrics.salvaged.fetch_add(1, Ordering::Relaxed);
                    self.mover.submit(closed).await?;
                }
            }
            Err(e) => {
                // The file keeps a partial line and stays in staging.
                self.metrics.record_drops(appended);
                error!(
                    path = %path.display(),
                    lost = appended,
                    error = %cause,
                    truncate_error = %e,
                    "spool write failed and the file could not be cut back"
                );
            }
        }
        Ok(())
    }

    /// Drains `rx` until `shutdown` flips, the queue closes or the move
    /// worker fails.
    ///
    /// On exit the payloads still queued are written, the open file is
    /// closed and handed off, and the move worker is drained.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::Closed` if the move worker stopped while the
    /// writer was still running.
    pub async fn run(
        mut self,
        mut rx: mpsc::Receiver<Bytes>,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), ConnectorError> {
        let tick = self.config.tick;
        let mut ticker = time::interval_at(Instant::now() + tick, tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            staging = %self.config.staging_dir.display(),
            handling = %self.config.handling_dir.display(),
            max_file_size = self.config.max_file_size,
            tick_secs = tick.as_secs_f64(),
            "spool writer started"
        );

        let mut result = Ok(());
        loop {
            tokio::select! {
                () = shutdown::requested(&mut shutdown) => break,
                maybe = rx.recv() => {
                    let Some(payload) = maybe else { break };
                    match self.append(&payload).await {
                        Ok(true) => ticker.reset(),
                        Ok(false) => {}
                        Err(ConnectorError::Closed) => {
                            result = Err(ConnectorError::Closed);
                            break;
                        }
                        Err(e) => error!(error = %e, "failed to append to spool file"),
                    }
                }
                _ = ticker.tick() => {
                    match self.rotate(Rotation::Timer).await {
                        Ok(_) => {}
                        Err(ConnectorError::Closed) => {
                            result = Err(ConnectorError::Closed);
                            break;
                        }
                        Err(e) => error!(error = %e, "failed to rotate spool file"),
                    }
                }
            }
        }

        // Payloads already queued are still written before the final close.
        rx.close();
        while result.is_ok() {
            let Some(payload) = rx.recv().await else { break };
            match self.append(&payload).await {
                Ok(_) => {}
                Err(ConnectorError::Closed) => result = Err(ConnectorError::Closed),
                Err(e) => error!(error = %e, "failed to append to spool file"),
            }
        }

        if let Err(e) = self.rotate(Rotation::Shutdown).await {
            error!(error = %e, "failed to close spool file on shutdown");
        }
        self.mover.shutdown().await;

        let m = &self.metrics;
        info!(
            payloads = m.payloads.load(Ordering::Relaxed),
            dropped = m.dropped.load(Ordering::Relaxed),
            "spool writer stopped"
        );
        result
    }
}

impl std::fmt::Debug for SpoolWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpoolWriter")
            .field("config", &self.config)
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spool::fs::{MemoryFs, OsFs};
    use std::path::Path;
    use tokio::sync::watch;

    const MIB: usize = 1024 * 1024;

    fn config() -> SpoolWriterConfig {
        SpoolWriterConfig {
            handling_dir: PathBuf::from("/handling"),
            staging_dir: PathBuf::from("/stage"),
            ..SpoolWriterConfig::default()
        }
    }

    fn writer(fs: &MemoryFs, config: SpoolWriterConfig) -> SpoolWriter {
        let shared: Arc<dyn SpoolFs> = Arc::new(fs.clone());
        let mover = Arc::new(MoveWorker::spawn(
            Arc::clone(&shared),
            config.handling_dir.clone(),
            config.move_queue_capacity,
        ));
        SpoolWriter::new(config, shared, mover).unwrap()
    }

    fn files_in(fs: &MemoryFs, dir: &str) -> Vec<PathBuf> {
        fs.paths()
            .into_iter()
            .filter(|p| p.parent() == Some(Path::new(dir)))
            .collect()
    }

    #[tokio::test]
    async fn test_rotates_once_cumulative_size_reaches_limit() {
        let fs = MemoryFs::new();
        let mut w = writer(&fs, config());
        let chunk = vec![b'a'; 6 * MIB];

        assert!(!w.append(&chunk).await.unwrap());
        assert_eq!(w.open_size(), 6 * MIB as u64 + 1);

        assert!(w.append(&chunk).await.unwrap());
        assert_eq!(w.open_size(), 0);
        assert_eq!(w.metrics().rotations(Rotation::Size), 1);

        w.mover.shutdown().await;
        let handed = files_in(&fs, "/handling");
        assert_eq!(handed.len(), 1);
        assert_eq!(fs.contents(&handed[0]).unwrap().len(), 12 * MIB + 2);
    }

    #[tokio::test]
    async fn test_newline_payload_is_dropped() {
        let fs = MemoryFs::new();
        let mut w = writer(&fs, config());
        assert!(!w.append(b"one\ntwo").await.unwrap());
        assert_eq!(w.open_size(), 0);
        assert_eq!(w.metrics().dropped.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_empty_payload_is_dropped() {
        let fs = MemoryFs::new();
        let mut w = writer(&fs, config());
        assert!(!w.append(b"").await.unwrap());
        assert_eq!(w.open_size(), 0);
        assert_eq!(w.metrics().dropped.load(Ordering::Relaxed), 1);
        assert_eq!(w.metrics().payloads.load(Ordering::Relaxed), 0);
        assert!(files_in(&fs, "/stage").is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_hands_off_complete_lines() {
        let fs = MemoryFs::new();
        fs.fail_writes_after(17);
        let cfg = SpoolWriterConfig {
            buffer_capacity: 8,
            ..config()
        };
        let mut w = writer(&fs, cfg);

        w.append(b"aaaa").await.unwrap();
        w.append(b"bbbb").await.unwrap();
        w.append(b"cccc").await.unwrap();
        // The disk fills two bytes into "dddd".
        assert!(matches!(
            w.append(b"dddd").await,
            Err(ConnectorError::Io(_))
        ));
        assert_eq!(w.open_size(), 0);
        assert_eq!(w.metrics().dropped.load(Ordering::Relaxed), 1);
        assert_eq!(w.metrics().salvaged.load(Ordering::Relaxed), 1);

        // The writer carries on with a fresh file.
        w.append(b"eeee").await.unwrap();
        w.rotate(Rotation::Shutdown).await.unwrap();
        w.mover.shutdown().await;

        assert!(files_in(&fs, "/stage").is_empty());
        let mut contents: Vec<Vec<u8>> = files_in(&fs, "/handling")
            .iter()
            .map(|p| fs.contents(p).unwrap())
            .collect();
        contents.sort();
        assert_eq!(
            contents,
            vec![b"aaaa\nbbbb\ncccc\n".to_vec(), b"eeee\n".to_vec()]
        );
    }

    #[tokio::test]
    async fn test_rotate_without_open_file_is_noop() {
        let fs = MemoryFs::new();
        let mut w = writer(&fs, config());
        assert!(!w.rotate(Rotation::Timer).await.unwrap());
        assert_eq!(w.metrics().rotations(Rotation::Timer), 0);
    }

    #[tokio::test]
    async fn test_timer_rotates_idle_file() {
        let fs = MemoryFs::new();
        let w = writer(&fs, config());
        let metrics = w.metrics();
        let (tx, rx) = mpsc::channel(8);
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(w.run(rx, stop_rx));

        tx.send(Bytes::from(vec![b'k'; 1024])).await.unwrap();
        time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(metrics.rotations(Rotation::Timer), 1);
        assert_eq!(metrics.rotations(Rotation::Size), 0);

        stop_tx.send(true).unwrap();
        task.await.unwrap().unwrap();

        assert_eq!(metrics.rotations(Rotation::Shutdown), 0);
        let handed = files_in(&fs, "/handling");
        assert_eq!(handed.len(), 1);
        assert_eq!(fs.contents(&handed[0]).unwrap().len(), 1025);
    }

    #[tokio::test]
    async fn test_shutdown_flushes_open_file() {
        let fs = MemoryFs::new();
        let cfg = SpoolWriterConfig {
            tick: Duration::from_secs(3600),
            ..config()
        };
        let w = writer(&fs, cfg);
        let metrics = w.metrics();
        let (tx, rx) = mpsc::channel(8);
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(w.run(rx, stop_rx));

        tx.send(Bytes::from_static(b"first")).await.unwrap();
        tx.send(Bytes::from_static(b"second")).await.unwrap();
        while metrics.payloads.load(Ordering::Relaxed) < 2 {
            tokio::task::yield_now().await;
        }
        stop_tx.send(true).unwrap();
        task.await.unwrap().unwrap();

        assert_eq!(metrics.rotations(Rotation::Shutdown), 1);
        assert!(files_in(&fs, "/stage").is_empty());
        let handed = files_in(&fs, "/handling");
        assert_eq!(handed.len(), 1);
        assert_eq!(fs.contents(&handed[0]).unwrap(), b"first\nsecond\n");
    }

    #[tokio::test]
    async fn test_closed_queue_stops_writer() {
        let fs = MemoryFs::new();
        let w = writer(&fs, config());
        let (tx, rx) = mpsc::channel(1);
        let (_stop_tx, stop_rx) = watch::channel(false);
        tx.send(Bytes::from_static(b"last")).await.unwrap();
        drop(tx);

        w.run(rx, stop_rx).await.unwrap();
        assert_eq!(files_in(&fs, "/handling").len(), 1);
    }

    #[tokio::test]
    async fn test_writes_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = SpoolWriterConfig {
            handling_dir: dir.path().join("handling"),
            staging_dir: dir.path().join("stage"),
            ..SpoolWriterConfig::default()
        };
        let fs: Arc<dyn SpoolFs> = Arc::new(OsFs);
        let mover = Arc::new(MoveWorker::spawn(Arc::clone(&fs), cfg.handling_dir.clone(), 4));
        let mut w = SpoolWriter::new(cfg.clone(), Arc::clone(&fs), Arc::clone(&mover)).unwrap();

        w.append(b"{\"a\":1}").await.unwrap();
        w.rotate(Rotation::Timer).await.unwrap();
        mover.shutdown().await;

        let entries = fs.list(&cfg.handling_dir).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].name.ends_with(".hsxa"));
        assert_eq!(fs.read(&entries[0].path).unwrap(), b"{\"a\":1}\n");
        assert!(fs.list(&cfg.staging_dir).unwrap().is_empty());
    }

    #[test]
    fn test_config_from_properties() {
        let mut props = ConnectorConfig::new("stargate");
        props.set("spool.handling.path", "/data/spool");
        props.set("spool.writer.tick.secs", "2");
        props.set("spool.file.max.size", "4096");
        let cfg = SpoolWriterConfig::from_config(&props).unwrap();
        assert_eq!(cfg.handling_dir, PathBuf::from("/data/spool"));
        assert_eq!(cfg.tick, Duration::from_secs(2));
        assert_eq!(cfg.max_file_size, 4096);
        assert_eq!(cfg.move_queue_capacity, DEFAULT_MOVE_QUEUE_CAPACITY);
    }

    #[test]
    fn test_config_rejects_zero_tick() {
        let mut props = ConnectorConfig::new("stargate");
        props.set("spool.writer.tick.secs", "0");
        assert!(SpoolWriterConfig::from_config(&props).is_err());
    }
}
