//! Spool reader.
//!
//! [`SpoolReader`] scans the handling directory on a fixed interval. Every
//! Ready file found is claimed by renaming it to the Claimed suffix, streamed
//! line by line through the [`Transform`] into the delivery queue and then
//! deleted. If anything fails half way the file is renamed back to Ready and
//! retried from the start on a later scan, so lines may be delivered more
//! than once.
//!
//! File workers are capped by a semaphore. Files that find no free permit
//! stay Ready until the next scan.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::file::DELIMITER;
use super::fs::SpoolFs;
use super::state::{SpoolEntry, SpoolEvent, SpoolFileState};
use super::writer::DEFAULT_HANDLING_PATH;
use crate::config::{ConfigKeySpec, ConnectorConfig};
use crate::error::ConnectorError;
use crate::message::{Envelope, Transform};
use crate::metrics::ConnectorMetrics;
use crate::shutdown::{self, ShutdownSignal};

/// Default interval between directory scans.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(5);

/// Default cap on concurrent file workers.
pub const DEFAULT_READER_WORKERS: usize = 8;

/// Configuration for [`SpoolReader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpoolReaderConfig {
    /// Directory to scan.
    pub handling_dir: PathBuf,
    /// Interval between scans.
    pub scan_interval: Duration,
    /// Maximum number of files processed at once.
    pub workers: usize,
    /// Release Claimed files left behind by a crashed reader on start.
    pub recover_claimed: bool,
}

impl Default for SpoolReaderConfig {
    fn default() -> Self {
        Self {
            handling_dir: PathBuf::from(DEFAULT_HANDLING_PATH),
            scan_interval: DEFAULT_SCAN_INTERVAL,
            workers: DEFAULT_READER_WORKERS,
            recover_claimed: false,
        }
    }
}

impl SpoolReaderConfig {
    /// Parses a reader config from a [`ConnectorConfig`].
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
            scan_interval: config
                .get_secs("spool.scan.interval.secs")?
                .unwrap_or(defaults.scan_interval),
            workers: config
                .get_parsed("spool.reader.workers")?
                .unwrap_or(defaults.workers),
            recover_claimed: config
                .get_parsed("spool.reader.recover.claimed")?
                .unwrap_or(defaults.recover_claimed),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::ConfigurationError` on a zero interval or
    /// worker count.
    pub fn validate(&self) -> Result<(), ConnectorError> {
        if self.scan_interval.is_zero() {
            return Err(ConnectorError::ConfigurationError(
                "spool.scan.interval.secs must be > 0".into(),
            ));
        }
        if self.workers == 0 {
            return Err(ConnectorError::ConfigurationError(
                "spool.reader.workers must be > 0".into(),
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
                "Directory shared with the stargate side",
                DEFAULT_HANDLING_PATH,
            ),
            ConfigKeySpec::optional("spool.scan.interval.secs", "Scan interval", "5"),
            ConfigKeySpec::optional(
                "spool.reader.workers",
                "Files processed concurrently",
                DEFAULT_READER_WORKERS.to_string(),
            ),
            ConfigKeySpec::optional(
                "spool.reader.recover.claimed",
                "Release leftover claimed files on start (single reader only)",
                "false",
            ),
        ]
    }
}

/// Counters for [`SpoolReader`].
#[derive(Debug, Default)]
pub struct SpoolReaderMetrics {
    /// Files claimed.
    pub claimed: AtomicU64,
    /// Files fully forwarded and deleted.
    pub completed: AtomicU64,
    /// Files released back to Ready after a failure.
    pub released: AtomicU64,
    /// Claims lost to another reader.
    pub lost_races: AtomicU64,
    /// Lines pushed into the delivery queue.
    pub lines: AtomicU64,
    /// Lines the transform rejected.
    pub transform_failures: AtomicU64,
    /// Ready files left for a later scan because every worker was busy.
    pub deferred: AtomicU64,
}

impl SpoolReaderMetrics {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads a counter.
    #[must_use]
    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    /// Converts to [`ConnectorMetrics`].
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_connector_metrics(&self) -> ConnectorMetrics {
        let mut m = ConnectorMetrics {
            records_total: Self::get(&self.lines),
            bytes_total: 0,
            errors_total: Self::get(&self.transform_failures),
            lag: 0,
            custom: Vec::new(),
        };
        m.add_custom("spool.files.claimed", Self::get(&self.claimed) as f64);
        m.add_custom("spool.files.completed", Self::get(&self.completed) as f64);
        m.add_custom("spool.files.released", Self::get(&self.released) as f64);
        m.add_custom("spool.claims.lost", Self::get(&self.lost_races) as f64);
        m
    }
}

/// Result of one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Files handed to a worker.
    pub dispatched: usize,
    /// Ready files left for a later scan.
    pub deferred: usize,
}

struct ReaderShared {
    fs: Arc<dyn SpoolFs>,
    tx: mpsc::Sender<Envelope>,
    transform: Transform,
    metrics: Arc<SpoolReaderMetrics>,
}

/// Streams Ready spool files into the delivery queue.
pub struct SpoolReader {
    config: SpoolReaderConfig,
    shared: Arc<ReaderShared>,
    permits: Arc<Semaphore>,
}

impl SpoolReader {
    /// Creates a reader over `config.handling_dir`.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::Io` if the directory cannot be created.
    pub fn new(
        config: SpoolReaderConfig,
        fs: Arc<dyn SpoolFs>,
        tx: mpsc::Sender<Envelope>,
        transform: Transform,
    ) -> Result<Self, ConnectorError> {
        fs.create_dir_all(&config.handling_dir)?;
        let permits = Arc::new(Semaphore::new(config.workers));
        Ok(Self {
            config,
            shared: Arc::new(ReaderShared {
                fs,
                tx,
                transform,
                metrics: Arc::new(SpoolReaderMetrics::default()),
            }),
            permits,
        })
    }

    /// Returns the shared metrics handle.
    #[must_use]
    pub fn metrics(&self) -> Arc<SpoolReaderMetrics> {
        Arc::clone(&self.shared.metrics)
    }

    /// Returns the reader configuration.
    #[must_use]
    pub fn config(&self) -> &SpoolReaderConfig {
        &self.config
    }

    /// Renames every Claimed file in the handling directory back to Ready.
    ///
    /// Only safe when no other reader serves the same directory.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::Io` if the directory cannot be listed.
    pub fn recover_claimed(&self) -> Result<usize, ConnectorError> {
        let fs = self.shared.fs.as_ref();
        let mut released = 0;
        for entry in fs.list(&self.config.handling_dir)? {
            if entry.is_dir
                || SpoolFileState::from_file_name(&entry.name) != Some(SpoolFileState::Claimed)
            {
                continue;
            }
            let mut file = SpoolEntry::claimed(entry.path)?;
            let target = file.target_path(SpoolEvent::Release)?;
            match fs.rename(file.path(), &target) {
                Ok(()) => {
                    file.apply(SpoolEvent::Release)?;
                    released += 1;
                    info!(path = %target.display(), "released leftover claimed file");
                }
                Err(e) => warn!(
                    path = %file.path().display(),
                    error = %e,
                    "failed to release leftover claimed file"
                ),
            }
        }
        Ok(released)
    }

    /// Runs one scan and waits for every file it dispatched.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::Io` if the directory cannot be listed.
    pub async fn scan_once(&self, shutdown: &ShutdownSignal) -> Result<ScanReport, ConnectorError> {
        let mut workers = JoinSet::new();
        let report = self.dispatch(&mut workers, shutdown)?;
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "spool file worker panicked");
            }
        }
        Ok(report)
    }

    /// Scans every `scan_interval` until shutdown, then waits for the file
    /// workers to finish or release their files.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::Io` if leftover claims cannot be recovered
    /// on start.
    pub async fn run(self, mut shutdown: ShutdownSignal) -> Result<(), ConnectorError> {
        if self.config.recover_claimed {
            let released = self.recover_claimed()?;
            info!(released, "recovered claimed spool files");
        }

        let interval = self.config.scan_interval;
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let worker_shutdown = shutdown.clone();
        let mut workers = JoinSet::new();

        info!(
            handling = %self.config.handling_dir.display(),
            scan_interval_secs = interval.as_secs_f64(),
            workers = self.config.workers,
            "spool reader started"
        );

        loop {
            tokio::select! {
                () = shutdown::requested(&mut shutdown) => break,
                _ = ticker.tick() => {
                    match self.dispatch(&mut workers, &worker_shutdown) {
                        Ok(report) if report.dispatched > 0 || report.deferred > 0 => debug!(
                            dispatched = report.dispatched,
                            deferred = report.deferred,
                            "spool scan"
                        ),
                        Ok(_) => {}
                        Err(e) => error!(error = %e, "failed to scan handling directory"),
                    }
                }
                Some(joined) = workers.join_next(), if !workers.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "spool file worker panicked");
                    }
                }
            }
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "spool file worker panicked");
            }
        }
        info!("spool reader stopped");
        Ok(())
    }

    fn dispatch(
        &self,
        workers: &mut JoinSet<()>,
        shutdown: &ShutdownSignal,
    ) -> Result<ScanReport, ConnectorError> {
        let mut report = ScanReport::default();
        for entry in self.shared.fs.list(&self.config.handling_dir)? {
            if entry.is_dir {
                warn!(path = %entry.path.display(), "unexpected directory in handling path");
                continue;
            }
            if SpoolFileState::from_file_name(&entry.name) != Some(SpoolFileState::Ready) {
                continue;
            }
            let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() else {
                report.deferred += 1;
                continue;
            };
            let file = SpoolEntry::ready(entry.path)?;
            workers.spawn(process_file(
                Arc::clone(&self.shared),
                file,
                shutdown.clone(),
                permit,
            ));
            report.dispatched += 1;
        }
        if report.deferred > 0 {
            self.shared
                .metrics
                .deferred
                .fetch_add(report.deferred as u64, Ordering::Relaxed);
        }
        Ok(report)
    }
}

impl std::fmt::Debug for SpoolReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpoolReader")
            .field("config", &self.config)
            .field("free_workers", &self.permits.available_permits())
            .finish_non_exhaustive()
    }
}

enum Forward {
    Done,
    Failed,
}

async fn process_file(
    shared: Arc<ReaderShared>,
    mut file: SpoolEntry,
    mut shutdown: ShutdownSignal,
    _permit: OwnedSemaphorePermit,
) {
    let metrics = &shared.metrics;
    let fs = Arc::clone(&shared.fs);

    let claimed = match file.target_path(SpoolEvent::Claim) {
        Ok(path) => path,
        Err(e) => {
            error!(path = %file.path().display(), error = %e, "cannot claim spool file");
            return;
        }
    };
    match fs.rename(file.path(), &claimed) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            SpoolReaderMetrics::bump(&metrics.lost_races);
            debug!(path = %file.path().display(), "spool file claimed elsewhere");
            return;
        }
        Err(e) => {
            error!(path = %file.path().display(), error = %e, "failed to claim spool file");
            return;
        }
    }
    if let Err(e) = file.apply(SpoolEvent::Claim) {
        error!(path = %claimed.display(), error = %e, "spool state out of sync");
        return;
    }
    SpoolReaderMetrics::bump(&metrics.claimed);
    debug!(path = %claimed.display(), "claimed spool file");

    let outcome = forward_lines(&shared, &claimed, &mut shutdown).await;

    match outcome {
        Forward::Done => match fs.remove(file.path()) {
            Ok(()) => {
                if let Err(e) = file.apply(SpoolEvent::Complete) {
                    error!(path = %claimed.display(), error = %e, "spool state out of sync");
                }
                SpoolReaderMetrics::bump(&metrics.completed);
            }
            Err(e) => error!(
                path = %file.path().display(),
                error = %e,
                "failed to delete forwarded spool file"
            ),
        },
        Forward::Failed => release(fs.as_ref(), &mut file, metrics),
    }
}

async fn forward_lines(
    shared: &ReaderShared,
    path: &std::path::Path,
    shutdown: &mut ShutdownSignal,
) -> Forward {
    let fs = Arc::clone(&shared.fs);
    let owned = path.to_path_buf();
    let data = match tokio::task::spawn_blocking(move || fs.read(&owned)).await {
        Ok(Ok(data)) => data,
        Ok(Err(e)) => {
            error!(path = %path.display(), error = %e, "failed to read spool file");
            return Forward::Failed;
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "spool read task failed");
            return Forward::Failed;
        }
    };

    // The writer never spools an empty payload; the only empty slice is the
    // one after the final delimiter.
    for line in data.split(|b| *b == DELIMITER).filter(|l| !l.is_empty()) {
        let envelope = match (shared.transform)(line) {
            Ok(envelope) => envelope,
            Err(e) => {
                SpoolReaderMetrics::bump(&shared.metrics.transform_failures);
                warn!(path = %path.display(), error = %e, "failed to decode spool line");
                return Forward::Failed;
            }
        };
        tokio::select! {
            sent = shared.tx.send(envelope) => {
                if sent.is_err() {
                    warn!(path = %path.display(), "delivery queue closed");
                    return Forward::Failed;
                }
            }
            () = shutdown::requested(shutdown) => {
                debug!(path = %path.display(), "shutdown while forwarding spool file");
                return Forward::Failed;
            }
        }
        SpoolReaderMetrics::bump(&shared.metrics.lines);
    }
    Forward::Done
}

fn release(fs: &dyn SpoolFs, file: &mut SpoolEntry, metrics: &SpoolReaderMetrics) {
    let target = match file.target_path(SpoolEvent::Release) {
        Ok(path) => path,
        Err(e) => {
            error!(path = %file.path().display(), error = %e, "cannot release spool file");
            return;
        }
    };
    match fs.rename(file.path(), &target) {
        Ok(()) => {
            if let Err(e) = file.apply(SpoolEvent::Release) {
                error!(path = %target.display(), error = %e, "spool state out of sync");
            }
            SpoolReaderMetrics::bump(&metrics.released);
            info!(path = %target.display(), "released spool file for retry");
        }
        Err(e) => error!(
            path = %file.path().display(),
            error = %e,
            "failed to release spool file, it stays claimed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SerdeError;
    use crate::message::{kafka_transform, KafkaMessage};
    use crate::spool::fs::MemoryFs;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::watch;

    fn config(workers: usize) -> SpoolReaderConfig {
        SpoolReaderConfig {
            handling_dir: PathBuf::from("/handling"),
            workers,
            ..SpoolReaderConfig::default()
        }
    }

    fn spool_file(fs: &MemoryFs, name: &str, lines: usize) {
        let mut body = Vec::new();
        for i in 0..lines {
            let msg = KafkaMessage::new("t", format!("{name}-{i}"), vec![i as u8], 0);
            body.extend(msg.encode().unwrap());
            body.push(b'\n');
        }
        fs.insert(PathBuf::from("/handling").join(name), body);
    }

    fn reader(
        fs: &MemoryFs,
        config: SpoolReaderConfig,
        transform: Transform,
        capacity: usize,
    ) -> (SpoolReader, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel(capacity);
        let reader = SpoolReader::new(config, Arc::new(fs.clone()), tx, transform).unwrap();
        (reader, rx)
    }

    fn drain(rx: &mut mpsc::Receiver<Envelope>) -> Vec<Envelope> {
        let mut out = Vec::new();
        while let Ok(env) = rx.try_recv() {
            out.push(env);
        }
        out
    }

    #[tokio::test]
    async fn test_forwards_and_deletes() {
        let fs = MemoryFs::new();
        spool_file(&fs, "message_1_1.hsxa", 3);
        let (reader, mut rx) = reader(&fs, config(4), kafka_transform(), 16);
        let (_stop, shutdown) = watch::channel(false);

        let report = reader.scan_once(&shutdown).await.unwrap();
        assert_eq!(report.dispatched, 1);

        let got = drain(&mut rx);
        assert_eq!(got.len(), 3);
        match &got[2] {
            Envelope::Kafka(m) => assert_eq!(m.key, "message_1_1.hsxa-2"),
            other => panic!("unexpected envelope {other:?}"),
        }
        assert!(fs.paths().is_empty());
        assert_eq!(SpoolReaderMetrics::get(&reader.metrics().completed), 1);
    }

    #[tokio::test]
    async fn test_ignores_foreign_names_and_warns_on_dirs() {
        let fs = MemoryFs::new();
        fs.insert("/handling/notes.txt", b"x\n".to_vec());
        fs.insert("/handling/message_1_2.hsxa.part", b"x\n".to_vec());
        fs.insert("/handling/message_1_3.hsxa_bak", b"x\n".to_vec());
        fs.create_dir_all(Path::new("/handling/nested.hsxa")).unwrap();
        let (reader, mut rx) = reader(&fs, config(4), kafka_transform(), 16);
        let (_stop, shutdown) = watch::channel(false);

        let report = reader.scan_once(&shutdown).await.unwrap();
        assert_eq!(report, ScanReport::default());
        assert!(drain(&mut rx).is_empty());
        assert_eq!(fs.paths().len(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_scans_claim_exactly_once() {
        let fs = MemoryFs::new();
        spool_file(&fs, "message_1_1.hsxa", 5);
        let (a, mut rx_a) = reader(&fs, config(4), kafka_transform(), 16);
        let (b, mut rx_b) = reader(&fs, config(4), kafka_transform(), 16);
        let (_stop, shutdown) = watch::channel(false);

        let (ra, rb) = tokio::join!(a.scan_once(&shutdown), b.scan_once(&shutdown));
        ra.unwrap();
        rb.unwrap();

        let claimed = SpoolReaderMetrics::get(&a.metrics().claimed)
            + SpoolReaderMetrics::get(&b.metrics().claimed);
        assert_eq!(claimed, 1);
        assert_eq!(drain(&mut rx_a).len() + drain(&mut rx_b).len(), 5);
        assert!(fs.paths().is_empty());
    }

    #[tokio::test]
    async fn test_transform_failing_twice_releases_twice() {
        let fs = MemoryFs::new();
        spool_file(&fs, "message_1_1.hsxa", 4);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let inner = kafka_transform();
        let flaky: Transform = Arc::new(move |line| {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                return Err(SerdeError::MalformedInput("injected".into()));
            }
            inner(line)
        });
        let (reader, mut rx) = reader(&fs, config(4), flaky, 16);
        let (_stop, shutdown) = watch::channel(false);
        let metrics = reader.metrics();

        for _ in 0..2 {
            reader.scan_once(&shutdown).await.unwrap();
            assert!(fs.exists(Path::new("/handling/message_1_1.hsxa")));
        }
        assert_eq!(SpoolReaderMetrics::get(&metrics.released), 2);
        assert!(drain(&mut rx).is_empty());

        reader.scan_once(&shutdown).await.unwrap();
        assert_eq!(drain(&mut rx).len(), 4);
        assert_eq!(SpoolReaderMetrics::get(&metrics.completed), 1);
        assert!(fs.paths().is_empty());
    }

    #[tokio::test]
    async fn test_worker_cap_defers_excess_files() {
        let fs = MemoryFs::new();
        for i in 0..5 {
            spool_file(&fs, &format!("message_1_{i}.hsxa"), 1);
        }
        let (reader, mut rx) = reader(&fs, config(2), kafka_transform(), 16);
        let (_stop, shutdown) = watch::channel(false);

        let first = reader.scan_once(&shutdown).await.unwrap();
        assert_eq!(first, ScanReport { dispatched: 2, deferred: 3 });
        let second = reader.scan_once(&shutdown).await.unwrap();
        assert_eq!(second, ScanReport { dispatched: 2, deferred: 1 });
        let third = reader.scan_once(&shutdown).await.unwrap();
        assert_eq!(third, ScanReport { dispatched: 1, deferred: 0 });

        assert_eq!(drain(&mut rx).len(), 5);
        assert_eq!(SpoolReaderMetrics::get(&reader.metrics().deferred), 4);
    }

    #[tokio::test]
    async fn test_shutdown_releases_blocked_file() {
        let fs = MemoryFs::new();
        spool_file(&fs, "message_1_1.hsxa", 3);
        let (reader, mut rx) = reader(&fs, config(1), kafka_transform(), 1);
        let (stop, shutdown) = watch::channel(false);

        let (report, ()) = tokio::join!(reader.scan_once(&shutdown), async {
            time::sleep(Duration::from_millis(50)).await;
            stop.send(true).unwrap();
        });
        report.unwrap();

        assert_eq!(drain(&mut rx).len(), 1);
        assert!(fs.exists(Path::new("/handling/message_1_1.hsxa")));
        assert_eq!(SpoolReaderMetrics::get(&reader.metrics().released), 1);
    }

    #[tokio::test]
    async fn test_recover_claimed_on_start() {
        let fs = MemoryFs::new();
        fs.insert("/handling/message_1_1.hsxa_bak", b"x\n".to_vec());
        let (reader, _rx) = reader(&fs, config(1), kafka_transform(), 1);
        assert_eq!(reader.recover_claimed().unwrap(), 1);
        assert!(fs.exists(Path::new("/handling/message_1_1.hsxa")));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let fs = MemoryFs::new();
        spool_file(&fs, "message_1_1.hsxa", 2);
        let cfg = SpoolReaderConfig {
            scan_interval: Duration::from_millis(20),
            ..config(2)
        };
        let (reader, mut rx) = reader(&fs, cfg, kafka_transform(), 16);
        let (stop, shutdown) = watch::channel(false);
        let task = tokio::spawn(reader.run(shutdown));

        let first = time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
        assert!(first.is_some());
        stop.send(true).unwrap();
        task.await.unwrap().unwrap();
    }

    #[test]
    fn test_config_from_properties() {
        let mut props = ConnectorConfig::new("dimension");
        props.set("spool.scan.interval.secs", "7");
        props.set("spool.reader.workers", "3");
        props.set("spool.reader.recover.claimed", "true");
        let cfg = SpoolReaderConfig::from_config(&props).unwrap();
        assert_eq!(cfg.scan_interval, Duration::from_secs(7));
        assert_eq!(cfg.workers, 3);
        assert!(cfg.recover_claimed);

        props.set("spool.reader.workers", "0");
        assert!(SpoolReaderConfig::from_config(&props).is_err());
    }
}
