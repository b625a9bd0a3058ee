//! Pipeline coordinator.
//!
//! Runs a catch-up pass over the watch tree at startup, then drains the event
//! queue on a fixed tick. Each file goes through the same chain under one
//! ledger session: checksum, ledger check, generate, parse, store, record.
//! Files are processed strictly one at a time because the generator writes
//! to a fixed output path.

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::checksum::file_checksum;
use super::stats::{CatchUpSummary, PipelineStats, PipelineStatsSnapshot};
use crate::config::Config;
use crate::generator::ReportGenerator;
use crate::logging::spans;
use crate::report::parse_report_file;
use crate::storage::{ChecksumLedger, ReportSink};
use crate::watcher::{scan_directory, EventPublisher, EventQueue, FileFilter};
use crate::{Error, Result};

/// Settings the coordinator needs from the service configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root of the watch tree.
    pub root: PathBuf,
    /// File name filter shared with the watcher.
    pub filter: FileFilter,
    /// Include subdirectories in the catch-up pass.
    pub recursive: bool,
    /// Report template handed to the generator.
    pub template: PathBuf,
    /// Fixed path the generator writes to.
    pub report_output: PathBuf,
    /// Interval between queue drains.
    pub tick_interval: Duration,
}

impl PipelineConfig {
    /// Derive pipeline settings from the service configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file pattern is not a valid glob.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            root: config.watch_dir.clone(),
            filter: FileFilter::new(&config.pattern)?,
            recursive: config.recursive,
            template: config.template.clone(),
            report_output: config.report_output(),
            tick_interval: config.tick_interval,
        })
    }
}

/// What happened to a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Report generated, parsed, stored and checksum recorded.
    Imported,
    /// Checksum already in the ledger; nothing done.
    AlreadyImported,
    /// File vanished before it could be read.
    Missing,
}

/// Drives files from the queue through generation, parsing and storage.
pub struct Coordinator {
    config: PipelineConfig,
    ledger: Arc<dyn ChecksumLedger>,
    generator: Arc<dyn ReportGenerator>,
    sink: Arc<dyn ReportSink>,
    queue: EventQueue,
    stats: Arc<PipelineStats>,
}

impl Coordinator {
    /// Create a coordinator with an empty event queue.
    #[must_use]
    pub fn new(
        config: PipelineConfig,
        ledger: Arc<dyn ChecksumLedger>,
        generator: Arc<dyn ReportGenerator>,
        sink: Arc<dyn ReportSink>,
    ) -> Self {
        Self {
            config,
            ledger,
            generator,
            sink,
            queue: EventQueue::new(),
            stats: PipelineStats::new(),
        }
    }

    /// Producer handle for the watcher.
    #[must_use]
    pub fn publisher(&self) -> EventPublisher {
        self.queue.publisher()
    }

    /// Pending event queue.
    #[must_use]
    pub const fn queue(&self) -> &EventQueue {
        &self.queue
    }

    /// Pipeline settings.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> PipelineStatsSnapshot {
        self.stats.snapshot()
    }

    /// Run one file through the pipeline.
    ///
    /// The checksum is recorded only after the report has been stored, so a
    /// file that fails anywhere in the chain is retried when it is seen again.
    ///
    /// # Errors
    ///
    /// Returns the first error in the chain. Only ledger errors are fatal;
    /// see [`Error::is_fatal`].
    pub fn process_file(&self, path: &Path) -> Result<ProcessOutcome> {
        let _span = spans::file_span(path).entered();
        self.stats.files_seen.fetch_add(1, Ordering::Relaxed);

        let result = self.import(path);
        match &result {
            Ok(ProcessOutcome::Imported) => {
                self.stats.imported.fetch_add(1, Ordering::Relaxed);
            }
            Ok(ProcessOutcome::AlreadyImported) => {
                self.stats.duplicates.fetch_add(1, Ordering::Relaxed);
            }
            Ok(ProcessOutcome::Missing) => {
                self.stats.stale_events.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
            }
        }
        result
    }

    fn import(&self, path: &Path) -> Result<ProcessOutcome> {
        if !path.is_file() {
            tracing::debug!("File no longer exists, skipping");
            return Ok(ProcessOutcome::Missing);
        }

        let checksum = match file_checksum(path) {
            Ok(sum) => sum,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("File removed while hashing, skipping");
                return Ok(ProcessOutcome::Missing);
            }
            Err(e) => return Err(e.into()),
        };

        let mut session = self.ledger.open()?;
        if session.has_checksum(&checksum)? {
            session.close();
            tracing::debug!(checksum = %checksum, "Already imported, skipping");
            return Ok(ProcessOutcome::AlreadyImported);
        }

        let report_path =
            self.generator
                .generate(path, &self.config.template, &self.config.report_output)?;
        let report =
            parse_report_file(&report_path)?.with_source(path.display().to_string(), &checksum);
        self.sink.store(&report)?;

        session.insert_checksum(&checksum, path)?;
        session.close();

        tracing::info!(
            checksum = %checksum,
            sample = %report.sample_identification,
            nuclides = report.results.len(),
            "Imported spectrum"
        );
        Ok(ProcessOutcome::Imported)
    }

    /// Process a file, absorbing recoverable failures.
    ///
    /// Returns `Ok(None)` for a failure that must not stop the loop.
    fn process_isolated(&self, path: &Path) -> Result<Option<ProcessOutcome>> {
        match self.process_file(path) {
            Ok(outcome) => Ok(Some(outcome)),
            Err(e) if e.is_fatal() => {
                tracing::error!(path = %path.display(), error = %e, "Ledger failure, stopping pipeline");
                Err(e)
            }
            Err(Error::Parse(e)) => {
                tracing::warn!(
                    path = %path.display(),
                    line = e.line(),
                    error = %e,
                    "Malformed report, checksum withheld"
                );
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Import failed, checksum withheld");
                Ok(None)
            }
        }
    }

    /// Import every matching file in the watch tree not yet in the ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if the tree cannot be scanned or the ledger fails.
    pub fn catch_up(&self) -> Result<CatchUpSummary> {
        self.catch_up_until(&CancellationToken::new())
    }

    fn catch_up_until(&self, shutdown: &CancellationToken) -> Result<CatchUpSummary> {
        let _span = spans::catch_up_span(&self.config.root).entered();

        let scan = scan_directory(&self.config.root, &self.config.filter, self.config.recursive)?;
        let mut summary = CatchUpSummary {
            found: scan.files.len(),
            ..CatchUpSummary::default()
        };

        for path in &scan.files {
            if shutdown.is_cancelled() {
                tracing::info!("Catch-up interrupted by shutdown");
                break;
            }
            match self.process_isolated(path)? {
                Some(ProcessOutcome::Imported) => summary.imported += 1,
                Some(ProcessOutcome::AlreadyImported | ProcessOutcome::Missing) => {
                    summary.skipped += 1;
                }
                None => summary.failed += 1,
            }
        }

        tracing::info!(
            found = summary.found,
            imported = summary.imported,
            skipped = summary.skipped,
            failed = summary.failed,
            "Catch-up complete"
        );
        Ok(summary)
    }

    /// Process every pending event in dequeue order.
    ///
    /// Returns the number of events taken off the queue.
    ///
    /// # Errors
    ///
    /// Returns a fatal error immediately; remaining events stay queued.
    pub fn drain_queue(&self) -> Result<usize> {
        let mut handled = 0;
        while let Some(event) = self.queue.try_pop() {
            handled += 1;
            tracing::trace!(path = %event.path().display(), kind = ?event.kind, "Dequeued file event");
            self.process_isolated(event.path())?;
        }
        Ok(handled)
    }

    /// Run the catch-up pass, then drain the queue on every tick until
    /// `shutdown` is cancelled.
    ///
    /// File processing runs on the blocking pool. A file in flight when
    /// shutdown is requested is finished first.
    ///
    /// # Errors
    ///
    /// Returns an error if the catch-up scan fails or the ledger fails.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) -> Result<()> {
        let this = Arc::clone(&self);
        let token = shutdown.clone();
        tokio::task::spawn_blocking(move || this.catch_up_until(&token))
            .await
            .map_err(|e| Error::internal(format!("catch-up task failed: {e}")))??;

        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval = ?self.config.tick_interval, "Pipeline running");

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if self.queue.is_empty() {
                        continue;
                    }
                    let this = Arc::clone(&self);
                    let handled = tokio::task::spawn_blocking(move || this.drain_queue())
                        .await
                        .map_err(|e| Error::internal(format!("drain task failed: {e}")))??;
                    tracing::debug!(handled, "Drained event queue");
                }
            }
        }

        let stats = self.stats();
        tracing::info!(
            seen = stats.files_seen,
            imported = stats.imported,
            duplicates = stats.duplicates,
            failures = stats.failures,
            "Pipeline stopped"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GeneratorError, LedgerError};
    use crate::storage::{count_reports, Database, LedgerSession, SqliteLedger, SqliteReportStore};
    use crate::watcher::{FileEvent, DEFAULT_PATTERN};
    use std::fs;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    /// Stands in for the analysis tool: the spectrum file already holds
    /// report text, so it is copied to the output verbatim.
    #[derive(Default)]
    struct CopyGenerator {
        calls: AtomicUsize,
    }

    impl ReportGenerator for CopyGenerator {
        fn generate(&self, spectrum: &Path, _template: &Path, output: &Path) -> Result<PathBuf> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            fs::copy(spectrum, output)?;
            Ok(output.to_path_buf())
        }
    }

    struct FailingGenerator;

    impl ReportGenerator for FailingGenerator {
        fn generate(&self, _spectrum: &Path, _template: &Path, _output: &Path) -> Result<PathBuf> {
            Err(GeneratorError::ExitStatus {
                program: "fake".to_string(),
                status: "exit status: 2".to_string(),
                stderr: String::new(),
            }
            .into())
        }
    }

    struct BrokenLedger;

    impl ChecksumLedger for BrokenLedger {
        fn open(&self) -> Result<Box<dyn LedgerSession + '_>> {
            Err(LedgerError::Open("disk gone".to_string()).into())
        }
    }

    struct Fixture {
        _tmp: TempDir,
        incoming: PathBuf,
        ledger: Arc<SqliteLedger>,
        store: Arc<SqliteReportStore>,
        coordinator: Arc<Coordinator>,
    }

    impl Fixture {
        fn new(generator: Arc<dyn ReportGenerator>) -> Self {
            let tmp = TempDir::new().unwrap();
            let incoming = tmp.path().join("incoming");
            fs::create_dir(&incoming).unwrap();

            let ledger = Arc::new(SqliteLedger::new(Database::open_in_memory().unwrap()).unwrap());
            let store =
                Arc::new(SqliteReportStore::new(Database::open_in_memory().unwrap()).unwrap());

            let config = PipelineConfig {
                root: incoming.clone(),
                filter: FileFilter::new(DEFAULT_PATTERN).unwrap(),
                recursive: true,
                template: tmp.path().join("report.tpl"),
                report_output: tmp.path().join("report.txt"),
                tick_interval: Duration::from_millis(20),
            };
            let coordinator = Arc::new(Coordinator::new(
                config,
                Arc::clone(&ledger) as Arc<dyn ChecksumLedger>,
                generator,
                Arc::clone(&store) as Arc<dyn ReportSink>,
            ));

            Self {
                _tmp: tmp,
                incoming,
                ledger,
                store,
                coordinator,
            }
        }

        fn write(&self, name: &str, contents: &str) -> PathBuf {
            let path = self.incoming.join(name);
            fs::write(&path, contents).unwrap();
            path
        }

        fn reports(&self) -> i64 {
            self.store.database().with_conn(count_reports).unwrap()
        }
    }

    fn report_text(sample: &str) -> String {
        format!(
            "Laboratory:::Lab North\n\
             Sample Identification:::{sample}\n\
             +++INTR+++\n\
             CS-137 0.95 661.66 1.00 1.0E+01 5.0E-01\n\
             ---INTR---\n"
        )
    }

    #[test]
    fn test_process_file_imports_once() {
        let generator = Arc::new(CopyGenerator::default());
        let fx = Fixture::new(Arc::clone(&generator) as Arc<dyn ReportGenerator>);
        let path = fx.write("a.spe", &report_text("S-1"));

        assert_eq!(
            fx.coordinator.process_file(&path).unwrap(),
            ProcessOutcome::Imported
        );
        assert_eq!(
            fx.coordinator.process_file(&path).unwrap(),
            ProcessOutcome::AlreadyImported
        );

        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fx.reports(), 1);
        assert_eq!(fx.ledger.count().unwrap(), 1);
    }

    #[test]
    fn test_same_bytes_at_two_paths_import_once() {
        let fx = Fixture::new(Arc::new(CopyGenerator::default()));
        let first = fx.write("a.spe", &report_text("S-1"));
        let second = fx.write("copy.spe", &report_text("S-1"));

        fx.coordinator.queue().push(FileEvent::created(&first));
        fx.coordinator.queue().push(FileEvent::created(&second));
        fx.coordinator.queue().push(FileEvent::renamed(&first));
        assert_eq!(fx.coordinator.drain_queue().unwrap(), 3);

        assert_eq!(fx.reports(), 1);
        assert_eq!(fx.ledger.count().unwrap(), 1);
        let stats = fx.coordinator.stats();
        assert_eq!(stats.imported, 1);
        assert_eq!(stats.duplicates, 2);
    }

    #[test]
    fn test_stored_report_is_annotated() {
        let fx = Fixture::new(Arc::new(CopyGenerator::default()));
        let path = fx.write("a.spe", &report_text("S-7"));
        fx.coordinator.process_file(&path).unwrap();

        let checksum = file_checksum(&path).unwrap();
        let ids = fx
            .store
            .database()
            .with_conn(|conn| crate::storage::find_reports_by_checksum(conn, &checksum))
            .unwrap();
        assert_eq!(ids.len(), 1);

        let report = fx
            .store
            .database()
            .with_conn(|conn| crate::storage::get_report(conn, ids[0]))
            .unwrap();
        assert_eq!(report.sample_identification, "S-7");
        assert_eq!(report.source_path, path.display().to_string());
        assert_eq!(report.checksum, checksum);
    }

    #[test]
    fn test_stale_event_is_benign() {
        let generator = Arc::new(CopyGenerator::default());
        let fx = Fixture::new(Arc::clone(&generator) as Arc<dyn ReportGenerator>);
        let stale = fx.write("stale.spe", &report_text("S-0"));
        fs::remove_file(&stale).unwrap();
        let first = fx.write("a.spe", &report_text("S-1"));
        let second = fx.write("b.spe", &report_text("S-2"));

        fx.coordinator.queue().push(FileEvent::created(&stale));
        fx.coordinator.queue().push(FileEvent::created(&first));
        fx.coordinator.queue().push(FileEvent::created(&second));
        assert_eq!(fx.coordinator.drain_queue().unwrap(), 3);

        assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
        let stats = fx.coordinator.stats();
        assert_eq!(stats.stale_events, 1);
        assert_eq!(stats.imported, 2);
        assert_eq!(stats.failures, 0);
        assert_eq!(fx.ledger.count().unwrap(), 2);

        let report_id = |path: &Path| {
            let checksum = file_checksum(path).unwrap();
            let ids = fx
                .store
                .database()
                .with_conn(|conn| crate::storage::find_reports_by_checksum(conn, &checksum))
                .unwrap();
            assert_eq!(ids.len(), 1);
            ids[0]
        };
        // imported in dequeue order
        assert!(report_id(&first) < report_id(&second));
    }

    #[test]
    fn test_malformed_report_withholds_checksum() {
        let fx = Fixture::new(Arc::new(CopyGenerator::default()));
        let bad = fx.write("bad.spe", "Laboratory:::Lab\nLive Time:::abc\n");
        let good = fx.write("good.spe", &report_text("S-2"));

        fx.coordinator.queue().push(FileEvent::created(&bad));
        fx.coordinator.queue().push(FileEvent::created(&good));
        assert_eq!(fx.coordinator.drain_queue().unwrap(), 2);

        assert_eq!(fx.reports(), 1);
        assert_eq!(fx.ledger.count().unwrap(), 1);

        let err = fx.coordinator.process_file(&bad).unwrap_err();
        assert!(!err.is_fatal());
        match err {
            Error::Parse(e) => assert_eq!(e.line(), 2),
            other => panic!("expected a parse error, got {other}"),
        }
        assert_eq!(fx.coordinator.stats().failures, 2);
    }

    #[test]
    fn test_generator_failure_withholds_checksum() {
        let fx = Fixture::new(Arc::new(FailingGenerator));
        let path = fx.write("a.spe", &report_text("S-1"));

        let err = fx.coordinator.process_file(&path).unwrap_err();
        assert!(matches!(err, Error::Generator(_)));
        assert_eq!(fx.ledger.count().unwrap(), 0);
        assert_eq!(fx.reports(), 0);
    }

    #[test]
    fn test_catch_up_counts() {
        let fx = Fixture::new(Arc::new(CopyGenerator::default()));
        let seen = fx.write("old.spe", &report_text("S-0"));
        fx.coordinator.process_file(&seen).unwrap();

        fx.write("new1.spe", &report_text("S-1"));
        fx.write("new2.SPE", &report_text("S-2"));
        fx.write("notes.txt", "not a spectrum");
        let nested = fx.incoming.join("2026");
        fs::create_dir(&nested).unwrap();
        fs::write(nested.join("new3.spe"), report_text("S-3")).unwrap();

        let summary = fx.coordinator.catch_up().unwrap();
        assert_eq!(
            summary,
            CatchUpSummary {
                found: 4,
                imported: 3,
                skipped: 1,
                failed: 0,
            }
        );
        assert_eq!(fx.reports(), 4);
        assert_eq!(fx.ledger.count().unwrap(), 4);
    }

    #[test]
    fn test_catch_up_continues_after_failure() {
        let fx = Fixture::new(Arc::new(CopyGenerator::default()));
        fx.write("a.spe", "Sample Taken On:::not a date\n");
        fx.write("b.spe", &report_text("S-1"));

        let summary = fx.coordinator.catch_up().unwrap();
        assert_eq!(summary.found, 2);
        assert_eq!(summary.imported, 1);
        assert_eq!(summary.failed, 1);
    }

    #[test]
    fn test_ledger_failure_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.spe");
        fs::write(&path, report_text("S-1")).unwrap();

        let store = Arc::new(SqliteReportStore::new(Database::open_in_memory().unwrap()).unwrap());
        let config = PipelineConfig {
            root: tmp.path().to_path_buf(),
            filter: FileFilter::new(DEFAULT_PATTERN).unwrap(),
            recursive: false,
            template: tmp.path().join("report.tpl"),
            report_output: tmp.path().join("report.txt"),
            tick_interval: Duration::from_millis(20),
        };
        let coordinator = Coordinator::new(
            config,
            Arc::new(BrokenLedger),
            Arc::new(CopyGenerator::default()),
            store,
        );

        coordinator.queue().push(FileEvent::created(&path));
        coordinator.queue().push(FileEvent::created(&path));
        let err = coordinator.drain_queue().unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(coordinator.queue().len(), 1);

        assert!(coordinator.catch_up().unwrap_err().is_fatal());
    }

    #[test]
    fn test_pipeline_config_from_config() {
        let config = Config {
            watch_dir: PathBuf::from("/incoming"),
            data_dir: PathBuf::from("/data"),
            pattern: "*.chn".to_string(),
            ..Config::default()
        };
        let pipeline = PipelineConfig::from_config(&config).unwrap();
        assert_eq!(pipeline.root, PathBuf::from("/incoming"));
        assert_eq!(pipeline.filter.pattern(), "*.chn");
        assert_eq!(pipeline.report_output, PathBuf::from("/data/report.txt"));

        let config = Config {
            pattern: "[".to_string(),
            ..Config::default()
        };
        assert!(PipelineConfig::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_run_catches_up_then_drains_until_cancelled() {
        let fx = Fixture::new(Arc::new(CopyGenerator::default()));
        fx.write("before.spe", &report_text("S-1"));

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(Arc::clone(&fx.coordinator).run(shutdown.clone()));

        let later = fx.write("after.spe", &report_text("S-2"));
        fx.coordinator.publisher().publish(FileEvent::created(&later));

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while fx.coordinator.stats().imported < 2 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        shutdown.cancel();
        handle.await.unwrap().unwrap();

        assert_eq!(fx.coordinator.stats().imported, 2);
        assert_eq!(fx.reports(), 2);
    }
}
