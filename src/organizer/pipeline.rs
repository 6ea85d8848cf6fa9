//! Background organizing pipeline.
//!
//! The filesystem watcher feeds raw events into a bounded channel. A single
//! dispatcher task owns the processed cache, the debouncer and the admission
//! filter; it pushes admitted paths onto the work queue and records results
//! reported back by the workers. Workers run the blocking move protocol on
//! the blocking pool.

use anyhow::{anyhow, Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::admission::AdmissionFilter;
use super::cache::ProcessedCache;
use super::debounce::Debouncer;
use super::worker::{process_item, ItemResult, PassReport};
use super::StatusSink;
use crate::common::config::Config;
use crate::common::errors::OrganizeError;
use crate::common::fsops::{FileOps, RealFs};

/// How often stale cache entries are swept
pub const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Pause after a failed dispatcher step
pub const ERROR_BACKOFF: Duration = Duration::from_secs(5);

const RAW_EVENT_CAPACITY: usize = 1024;
const QUERY_CAPACITY: usize = 16;

/// What a stopped pipeline hands back
#[derive(Debug)]
pub struct PipelineSummary {
    pub report: PassReport,
    pub cache: ProcessedCache,
}

enum Query {
    Contains(PathBuf, oneshot::Sender<bool>),
    Len(oneshot::Sender<usize>),
}

struct Completed {
    path: PathBuf,
    /// None when the item was dropped during shutdown or its task panicked
    result: Option<ItemResult>,
}

struct Running {
    watcher: RecommendedWatcher,
    cancel: CancellationToken,
    queries: mpsc::Sender<Query>,
    task: JoinHandle<PipelineSummary>,
}

/// Watches the configured folder and organizes files as they arrive
pub struct Organizer {
    config: Arc<Config>,
    sink: Arc<dyn StatusSink>,
    fs: Arc<dyn FileOps>,
    running: Option<Running>,
}

impl Organizer {
    pub fn new(config: Arc<Config>, sink: Arc<dyn StatusSink>) -> Self {
        Self {
            config,
            sink,
            fs: Arc::new(RealFs),
            running: None,
        }
    }

    /// Replace the filesystem primitives used by the move protocol
    pub fn with_fs(mut self, fs: Arc<dyn FileOps>) -> Self {
        self.fs = fs;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.running.is_some()
    }

    /// Organize every file currently in the watch root, synchronously, in
    /// directory order. Used by one-shot runs.
    pub fn run_once(&self, cache: &mut ProcessedCache) -> Result<PassReport> {
        let admission = AdmissionFilter::new(&self.config);
        let mut report = PassReport::default();

        for path in existing_files(&self.config.watch_root)? {
            report.scanned += 1;
            if let Err(reason) = admission.check(&path, cache) {
                tracing::debug!(path = %path.display(), %reason, "not admitted");
                report.rejected += 1;
                continue;
            }
            report.admitted += 1;

            let result = process_item(&self.config, self.fs.as_ref(), self.sink.as_ref(), &path);
            report.tally(&result);
            if result.marks_processed() {
                cache.record(&path);
            }
        }

        tracing::info!(
            scanned = report.scanned,
            moved = report.moved,
            failed = report.failed,
            "organize pass complete"
        );
        Ok(report)
    }

    /// Start watching. Files already present are organized first when
    /// `organize_on_startup` is set. Calling this while active is a no-op.
    pub async fn start(&mut self) -> Result<(), OrganizeError> {
        self.start_with_cache(ProcessedCache::new(self.config.cache_capacity))
            .await
    }

    /// Start with a previously returned cache
    pub async fn start_with_cache(&mut self, cache: ProcessedCache) -> Result<(), OrganizeError> {
        if self.running.is_some() {
            tracing::debug!("organizer already running");
            return Ok(());
        }

        let root = &self.config.watch_root;
        if !root.is_dir() {
            return Err(OrganizeError::io(
                root,
                std::io::Error::new(std::io::ErrorKind::NotFound, "watch folder does not exist"),
            ));
        }

        let (raw_tx, raw_rx) = mpsc::channel(RAW_EVENT_CAPACITY);
        let watcher = create_watcher(root, raw_tx)?;

        let cancel = CancellationToken::new();
        let (work_tx, work_rx) = mpsc::channel::<PathBuf>(self.config.batch_size.max(1));
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let (query_tx, query_rx) = mpsc::channel(QUERY_CAPACITY);

        let queue = Arc::new(Mutex::new(work_rx));
        let mut workers = JoinSet::new();
        for id in 0..self.config.workers.max(1) {
            workers.spawn(worker_loop(
                id,
                queue.clone(),
                self.config.clone(),
                self.fs.clone(),
                self.sink.clone(),
                done_tx.clone(),
                cancel.clone(),
            ));
        }
        drop(done_tx);

        let dispatcher = Dispatcher {
            config: self.config.clone(),
            sink: self.sink.clone(),
            admission: AdmissionFilter::new(&self.config),
            debouncer: Debouncer::new(self.config.debounce_window()),
            cache,
            in_flight: HashSet::new(),
            work_tx: Some(work_tx),
            report: PassReport::default(),
        };
        let task = tokio::spawn(dispatcher.run(raw_rx, done_rx, query_rx, workers, cancel.clone()));

        tracing::info!(
            root = %root.display(),
            workers = self.config.workers,
            "organizer started"
        );
        self.sink.status(&format!("Watching {}", root.display()));

        self.running = Some(Running {
            watcher,
            cancel,
            queries: query_tx,
            task,
        });
        Ok(())
    }

    /// Stop watching, let in-flight moves finish and return the final tally.
    pub async fn stop(&mut self) -> Result<PipelineSummary, OrganizeError> {
        let Some(running) = self.running.take() else {
            return Err(OrganizeError::State("organizer is not running".into()));
        };

        drop(running.watcher);
        running.cancel.cancel();
        let summary = running
            .task
            .await
            .map_err(|e| OrganizeError::State(format!("pipeline task failed: {}", e)))?;

        tracing::info!(
            moved = summary.report.moved,
            failed = summary.report.failed,
            cached = summary.cache.len(),
            "organizer stopped"
        );
        self.sink.status("Organizer stopped");
        Ok(summary)
    }

    /// Whether the running pipeline has `path` in its processed cache.
    /// `None` when not running.
    pub async fn is_processed(&self, path: &Path) -> Option<bool> {
        let running = self.running.as_ref()?;
        let (tx, rx) = oneshot::channel();
        running
            .queries
            .send(Query::Contains(path.to_path_buf(), tx))
            .await
            .ok()?;
        rx.await.ok()
    }

    pub async fn processed_count(&self) -> Option<usize> {
        let running = self.running.as_ref()?;
        let (tx, rx) = oneshot::channel();
        running.queries.send(Query::Len(tx)).await.ok()?;
        rx.await.ok()
    }
}

/// Regular files directly inside `root`, sorted by name
pub fn existing_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(root)
        .with_context(|| format!("Failed to read watch folder: {}", root.display()))?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.path())
        .collect();
    files.sort();
    Ok(files)
}

fn create_watcher(
    root: &Path,
    raw_tx: mpsc::Sender<PathBuf>,
) -> Result<RecommendedWatcher, OrganizeError> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                return;
            }
            for path in event.paths {
                if let Err(e) = raw_tx.try_send(path) {
                    tracing::warn!(error = %e, "event queue full, dropping event");
                }
            }
        }
        Err(e) => tracing::warn!(error = %e, "filesystem watcher error"),
    })?;
    // Category, backup and script folders live below the root, so a flat
    // watch never sees our own writes.
    watcher.watch(root, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

struct Dispatcher {
    config: Arc<Config>,
    sink: Arc<dyn StatusSink>,
    admission: AdmissionFilter,
    debouncer: Debouncer,
    cache: ProcessedCache,
    in_flight: HashSet<PathBuf>,
    work_tx: Option<mpsc::Sender<PathBuf>>,
    report: PassReport,
}

impl Dispatcher {
    async fn run(
        mut self,
        mut raw_rx: mpsc::Receiver<PathBuf>,
        mut done_rx: mpsc::UnboundedReceiver<Completed>,
        mut query_rx: mpsc::Receiver<Query>,
        mut workers: JoinSet<()>,
        cancel: CancellationToken,
    ) -> PipelineSummary {
        if self.config.options.organize_on_startup {
            if let Err(e) = self.scan_existing(&cancel).await {
                tracing::error!(error = %e, "initial scan failed");
                self.sink.status(&format!("Initial scan failed: {}", e));
            }
        }

        let tick = (self.debouncer.window() / 4)
            .clamp(Duration::from_millis(20), Duration::from_millis(500));
        let mut debounce_tick = time::interval(tick);
        debounce_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut housekeeping = time::interval_at(
            time::Instant::now() + HOUSEKEEPING_INTERVAL,
            HOUSEKEEPING_INTERVAL,
        );

        loop {
            let step: Result<()> = tokio::select! {
                _ = cancel.cancelled() => break,
                Some(path) = raw_rx.recv() => {
                    self.debouncer.touch(path, Instant::now());
                    Ok(())
                }
                Some(done) = done_rx.recv() => {
                    self.complete(done);
                    Ok(())
                }
                Some(query) = query_rx.recv() => {
                    self.answer(query);
                    Ok(())
                }
                _ = debounce_tick.tick() => self.flush_debounced().await,
                _ = housekeeping.tick() => {
                    self.housekeeping();
                    Ok(())
                }
            };

            if let Err(e) = step {
                tracing::error!(error = %e, "organizer error, backing off");
                self.sink.status(&format!("Organizer error: {}", e));
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = time::sleep(ERROR_BACKOFF) => {}
                }
            }
        }

        // Closing the queue lets workers drain and exit
        self.work_tx = None;
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "worker task failed");
            }
        }
        while let Ok(done) = done_rx.try_recv() {
            self.complete(done);
        }

        PipelineSummary {
            report: self.report,
            cache: self.cache,
        }
    }

    async fn scan_existing(&mut self, cancel: &CancellationToken) -> Result<()> {
        let files = existing_files(&self.config.watch_root)?;
        tracing::info!(count = files.len(), "organizing existing files");
        for path in files {
            if cancel.is_cancelled() {
                break;
            }
            self.admit(path).await?;
        }
        Ok(())
    }

    async fn flush_debounced(&mut self) -> Result<()> {
        for path in self.debouncer.drain_ready(Instant::now()) {
            self.admit(path).await?;
        }
        Ok(())
    }

    async fn admit(&mut self, path: PathBuf) -> Result<()> {
        self.report.scanned += 1;
        if self.in_flight.contains(&path) {
            tracing::debug!(path = %path.display(), "already queued");
            return Ok(());
        }

        match self.admission.check(&path, &self.cache) {
            Ok(()) => {
                let Some(tx) = &self.work_tx else {
                    return Ok(());
                };
                tx.send(path.clone())
                    .await
                    .map_err(|_| anyhow!("work queue closed"))?;
                self.in_flight.insert(path);
                self.report.admitted += 1;
            }
            Err(reason) => {
                tracing::debug!(path = %path.display(), %reason, "not admitted");
                self.report.rejected += 1;
            }
        }
        Ok(())
    }

    fn complete(&mut self, done: Completed) {
        self.in_flight.remove(&done.path);
        if let Some(result) = done.result {
            self.report.tally(&result);
            if result.marks_processed() {
                self.cache.record(&done.path);
            }
        }
    }

    fn answer(&self, query: Query) {
        match query {
            Query::Contains(path, reply) => {
                let _ = reply.send(self.cache.contains(&path));
            }
            Query::Len(reply) => {
                let _ = reply.send(self.cache.len());
            }
        }
    }

    fn housekeeping(&mut self) {
        let removed = self.cache.sweep(self.config.cache_retention());
        tracing::info!(removed, remaining = self.cache.len(), "processed cache swept");
    }
}

async fn worker_loop(
    id: usize,
    queue: Arc<Mutex<mpsc::Receiver<PathBuf>>>,
    config: Arc<Config>,
    fs: Arc<dyn FileOps>,
    sink: Arc<dyn StatusSink>,
    done: mpsc::UnboundedSender<Completed>,
    cancel: CancellationToken,
) {
    loop {
        let next = {
            let mut rx = queue.lock().await;
            rx.recv().await
        };
        let Some(path) = next else {
            break;
        };

        if cancel.is_cancelled() {
            tracing::debug!(worker = id, path = %path.display(), "shutting down, item dropped");
            let _ = done.send(Completed { path, result: None });
            continue;
        }

        let (config, fs, sink, item) = (config.clone(), fs.clone(), sink.clone(), path.clone());
        let joined = tokio::task::spawn_blocking(move || {
            process_item(&config, fs.as_ref(), sink.as_ref(), &item)
        })
        .await;

        let result = match joined {
            Ok(result) => Some(result),
            Err(e) => {
                tracing::error!(worker = id, path = %path.display(), error = %e, "move task failed");
                None
            }
        };
        let _ = done.send(Completed { path, result });
    }
    tracing::debug!(worker = id, "worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Quiet;
    impl StatusSink for Quiet {
        fn status(&self, _message: &str) {}
    }

    fn test_config(root: &Path) -> Config {
        let mut config = Config::with_root(root);
        config.min_free_space_gb = 0;
        config.debounce_ms = 50;
        config.require_download_dir = false;
        config
    }

    #[test]
    fn test_existing_files_skips_dirs() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.pdf"), "x").unwrap();
        std::fs::write(dir.path().join("a.zip"), "x").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let files = existing_files(dir.path()).unwrap();
        assert_eq!(files, vec![dir.path().join("a.zip"), dir.path().join("b.pdf")]);
    }

    #[test]
    fn test_run_once_moves_and_caches() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("report.pdf"), "pdf").unwrap();
        std::fs::write(dir.path().join("notes.unknownext"), "?").unwrap();

        let organizer = Organizer::new(Arc::new(test_config(dir.path())), Arc::new(Quiet));
        let mut cache = ProcessedCache::new(100);
        let report = organizer.run_once(&mut cache).unwrap();

        assert_eq!(report.moved, 1);
        assert_eq!(report.unclassified, 1);
        assert!(dir.path().join("[DOC] 文档").join("PDF").join("report.pdf").exists());
        assert!(cache.contains(&dir.path().join("report.pdf")));
        assert!(cache.contains(&dir.path().join("notes.unknownext")));

        // Second pass sees the unknown file as processed
        let again = organizer.run_once(&mut cache).unwrap();
        assert_eq!(again.moved, 0);
        assert_eq!(again.rejected, 1);
    }

    #[test]
    fn test_confirmation_declined_by_default() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("song.mp3"), "x").unwrap();
        let mut config = test_config(dir.path());
        config.options.confirm_before_move = true;

        let organizer = Organizer::new(Arc::new(config), Arc::new(Quiet));
        let mut cache = ProcessedCache::new(10);
        let report = organizer.run_once(&mut cache).unwrap();

        assert_eq!(report.declined, 1);
        assert!(dir.path().join("song.mp3").exists());
        assert!(cache.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_startup_scan_then_stop() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("report.pdf"), "pdf").unwrap();

        let mut organizer = Organizer::new(Arc::new(test_config(dir.path())), Arc::new(Quiet));
        organizer.start().await.unwrap();
        assert!(organizer.is_active());

        let target = dir.path().join("[DOC] 文档").join("PDF").join("report.pdf");
        for _ in 0..100 {
            if organizer.is_processed(&dir.path().join("report.pdf")).await == Some(true) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let summary = organizer.stop().await.unwrap();
        assert!(!organizer.is_active());
        assert!(target.exists());
        assert_eq!(summary.report.moved, 1);
        assert!(summary.cache.contains(&dir.path().join("report.pdf")));
    }

    #[tokio::test]
    async fn test_stop_when_not_running() {
        let dir = TempDir::new().unwrap();
        let mut organizer = Organizer::new(Arc::new(test_config(dir.path())), Arc::new(Quiet));
        assert!(matches!(organizer.stop().await, Err(OrganizeError::State(_))));
        assert_eq!(organizer.processed_count().await, None);
    }
}
