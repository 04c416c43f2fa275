//! Batch download orchestration.
//!
//! [`Downloader::run_batch`] turns free-form input text into a stream of
//! [`BatchUpdate`] snapshots: parse, expand playlists, fan the resolved
//! items out to a bounded worker pool, and fold results into session
//! counters, the catalog, and history. Consumers only ever see owned
//! snapshots; all shared mutation stays behind the per-item locks and the
//! session log.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::mpsc;

use crate::catalog::MusicCatalog;
use crate::config::Config;
use crate::extractor::{
    DownloadRequest, ExtractError, MediaExtractor, ProgressEvent, TrackInfo, SEARCH_PREFIX,
};
use crate::model::{batch_output_dir, DownloadItem, DownloadSession, DownloadStatus};
use crate::progress::{render_items, LogLevel, SessionLog};
use crate::resolver;
use crate::store::{SessionHistory, Settings};

/// Retry count handed to the extraction collaborator.
const DOWNLOAD_RETRIES: u32 = 3;

/// Snapshot update channel depth.
const UPDATE_BUFFER: usize = 32;

/// Per-run overrides of the persisted settings.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub quality: Option<String>,
    pub embed_thumbnail: Option<bool>,
    pub auto_zip: Option<bool>,
}

/// One owned snapshot of batch state, safe to consume from any task.
#[derive(Debug, Clone)]
pub struct BatchUpdate {
    /// Session record with current counters
    pub session: DownloadSession,
    /// One-line progress summary
    pub progress: String,
    /// Rendered per-item status lines
    pub items: String,
    /// Recent session log lines
    pub logs: String,
    /// Set on the last update of the run
    pub finished: bool,
}

/// Cooperative cancellation flag shared with a running batch.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Request the batch to stop. Running transfers finish; queued items
    /// are left untouched.
    pub fn stop(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// The batch orchestrator.
pub struct Downloader {
    extractor: Arc<dyn MediaExtractor>,
    config: Config,
    settings: Settings,
    proxy_url: String,
    catalog: Arc<MusicCatalog>,
    cancel: CancelHandle,
}

impl Downloader {
    pub fn new(
        extractor: Arc<dyn MediaExtractor>,
        config: Config,
        settings: Settings,
        proxy_url: String,
        catalog: Arc<MusicCatalog>,
    ) -> Self {
        Self {
            extractor,
            config,
            settings,
            proxy_url,
            catalog,
            cancel: CancelHandle::default(),
        }
    }

    /// Handle for cancelling a batch started from this downloader.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Start a batch run over `input` and stream snapshots.
    ///
    /// The run executes on a spawned task; dropping the receiver does not
    /// abort it, it just stops observing. The final update has `finished`
    /// set and carries the settled session counters.
    pub fn run_batch(&self, input: &str, options: BatchOptions) -> mpsc::Receiver<BatchUpdate> {
        let (tx, rx) = mpsc::channel(UPDATE_BUFFER);
        let run = BatchRun {
            extractor: Arc::clone(&self.extractor),
            config: self.config.clone(),
            quality: options
                .quality
                .unwrap_or_else(|| self.settings.default_quality.clone()),
            embed_thumbnail: options
                .embed_thumbnail
                .unwrap_or(self.settings.embed_thumbnail),
            auto_zip: options.auto_zip.unwrap_or(self.settings.auto_zip),
            max_history: self.settings.max_history,
            proxy_url: self.proxy_url.clone(),
            catalog: Arc::clone(&self.catalog),
            cancel: self.cancel.clone(),
        };
        let input = input.to_string();
        tokio::spawn(async move {
            run.execute(&input, tx).await;
        });
        rx
    }
}

/// State for one in-flight batch, detached from the [`Downloader`].
struct BatchRun {
    extractor: Arc<dyn MediaExtractor>,
    config: Config,
    quality: String,
    embed_thumbnail: bool,
    auto_zip: bool,
    max_history: usize,
    proxy_url: String,
    catalog: Arc<MusicCatalog>,
    cancel: CancelHandle,
}

impl BatchRun {
    async fn execute(&self, input: &str, tx: mpsc::Sender<BatchUpdate>) {
        let inputs = resolver::parse_input(input);
        let log = Arc::new(SessionLog::new(0));

        if inputs.is_empty() {
            log.log(LogLevel::Error, "No valid input lines");
            let session = DownloadSession::new(session_token(), 0, &self.config.root_dir);
            let _ = tx.send(final_update(&session, &[], &log)).await;
            return;
        }
        log.log(
            LogLevel::Info,
            &format!("Input: {}", resolver::classify(&inputs)),
        );

        // Expansion phase: every input line becomes one or more items.
        let mut items: Vec<Arc<Mutex<DownloadItem>>> = Vec::new();
        for raw in &inputs {
            if self.cancel.is_stopped() {
                log.log(LogLevel::Warn, "Stopped during playlist expansion");
                break;
            }
            if resolver::is_playlist_url(raw) {
                log.log(LogLevel::Info, &format!("Expanding playlist: {raw}"));
            }
            let expansion = resolver::expand(self.extractor.as_ref(), raw).await;
            if let Some(warning) = expansion.warning {
                log.log(LogLevel::Warn, &warning);
            }
            for descriptor in expansion.descriptors {
                let id = format!("{:04}", items.len() + 1);
                items.push(Arc::new(Mutex::new(DownloadItem::new(id, &descriptor))));
            }
        }

        let total = items.len() as u32;
        log.set_total(total);
        log.log(
            LogLevel::Info,
            &format!("Resolved {total} track(s), starting downloads"),
        );

        let output_dir = batch_output_dir(&self.config.root_dir);
        if let Err(e) = std::fs::create_dir_all(&output_dir) {
            log.log(
                LogLevel::Error,
                &format!("Cannot create output dir: {e}"),
            );
            let session = DownloadSession::new(session_token(), total, &output_dir);
            let _ = tx.send(final_update(&session, &items, &log)).await;
            return;
        }

        let mut session = DownloadSession::new(session_token(), total, &output_dir);
        let _ = tx.send(snapshot(&session, &items, &log, false)).await;

        // Bounded worker pool over the resolved items.
        let mut pool = FuturesUnordered::new();
        let mut pending = items.iter();
        for item in pending.by_ref().take(self.config.max_workers) {
            pool.push(self.run_job(Arc::clone(item), Arc::clone(&log), &output_dir));
        }
        while pool.next().await.is_some() {
            if let Some(item) = pending.next() {
                pool.push(self.run_job(Arc::clone(item), Arc::clone(&log), &output_dir));
            }
            let (completed, failed, skipped, _) = log.counters();
            session.completed = completed;
            session.failed = failed;
            session.skipped = skipped;
            let _ = tx.send(snapshot(&session, &items, &log, false)).await;
        }

        if self.cancel.is_stopped() {
            log.log(LogLevel::Warn, "Batch stopped by user");
        }

        // Packaging, best-effort.
        if self.auto_zip && session.completed > 0 && !self.cancel.is_stopped() {
            match crate::package::zip_output_dir(&output_dir) {
                Ok(zip_path) => {
                    log.log(
                        LogLevel::Ok,
                        &format!("Packaged: {}", zip_path.display()),
                    );
                    session.zip_path = zip_path.display().to_string();
                }
                Err(e) => log.log(LogLevel::Warn, &format!("Packaging failed: {e}")),
            }
        }

        let mut history = SessionHistory::open(self.config.history_path(), self.max_history);
        if let Err(e) = history.add_session(session.clone()) {
            tracing::warn!("History save failed: {}", e);
        }

        log.log(LogLevel::Info, &format!("Done: {}", log.render_progress()));
        let _ = tx.send(final_update(&session, &items, &log)).await;
    }

    /// Run one job, folding a panicking worker into a failed item so the
    /// pool keeps draining.
    async fn run_job(
        &self,
        item: Arc<Mutex<DownloadItem>>,
        log: Arc<SessionLog>,
        output_dir: &std::path::Path,
    ) {
        let job = self.download_one(Arc::clone(&item), Arc::clone(&log), output_dir);
        if std::panic::AssertUnwindSafe(job).catch_unwind().await.is_err() {
            let mut guard = item.lock();
            if !guard.status.is_terminal() {
                guard.status = DownloadStatus::Failed;
                guard.error = "internal error".to_string();
                log.log(LogLevel::Error, &guard.status_line());
                drop(guard);
                log.count_failed();
            }
        }
    }

    /// Run one item to a terminal state, or leave it queued on cancel.
    async fn download_one(
        &self,
        item: Arc<Mutex<DownloadItem>>,
        log: Arc<SessionLog>,
        output_dir: &std::path::Path,
    ) {
        if self.cancel.is_stopped() {
            return;
        }

        let (target, display) = {
            let mut guard = item.lock();
            guard.status = DownloadStatus::Extracting;
            let target = if guard.url.is_empty() {
                format!("{SEARCH_PREFIX}{}", guard.query)
            } else {
                guard.url.clone()
            };
            (target, guard.status_line())
        };
        log.log(LogLevel::Download, &display);

        let request = DownloadRequest {
            target,
            output_dir: output_dir.to_path_buf(),
            quality: self.quality.clone(),
            archive_path: self.config.archive_path.clone(),
            embed_thumbnail: self.embed_thumbnail,
            retries: DOWNLOAD_RETRIES,
            timeout_secs: self.config.timeout_secs,
            proxy_url: self.proxy_url.clone(),
        };

        let hook_item = Arc::clone(&item);
        let hook: crate::extractor::ProgressHook = Arc::new(move |event| {
            let mut guard = hook_item.lock();
            match event {
                ProgressEvent::Downloading {
                    percent,
                    speed,
                    eta,
                } => {
                    guard.status = DownloadStatus::Downloading;
                    guard.progress = percent;
                    guard.speed = speed;
                    guard.eta = eta;
                }
                ProgressEvent::Finished => {
                    guard.status = DownloadStatus::Converting;
                    guard.progress = 100.0;
                }
                ProgressEvent::Errored => {}
            }
        });

        match self.extractor.download(&request, hook).await {
            Ok(info) => {
                self.finish_completed(&item, &log, info);
            }
            Err(ExtractError::AlreadyDownloaded) => {
                let mut guard = item.lock();
                guard.status = DownloadStatus::Skipped;
                log.log(
                    LogLevel::Info,
                    &format!("Skipped (already downloaded): {}", guard.title),
                );
                drop(guard);
                log.count_skipped();
            }
            Err(e) => {
                let mut guard = item.lock();
                guard.status = DownloadStatus::Failed;
                guard.error = e.to_string();
                log.log(LogLevel::Error, &guard.status_line());
                drop(guard);
                log.count_failed();
            }
        }
    }

    fn finish_completed(
        &self,
        item: &Arc<Mutex<DownloadItem>>,
        log: &SessionLog,
        info: TrackInfo,
    ) {
        let (title, artist, file_path, source_url) = {
            let mut guard = item.lock();
            guard.status = DownloadStatus::Completed;
            guard.progress = 100.0;
            if !info.title.is_empty() {
                guard.title = info.title.clone();
            }
            guard.artist = info.artist.clone();
            if info.duration > 0 {
                guard.duration = info.duration;
            }
            guard.file_path = info.file_path.clone();
            let source = if info.source_url.is_empty() {
                guard.url.clone()
            } else {
                info.source_url.clone()
            };
            (
                guard.title.clone(),
                guard.artist.clone(),
                guard.file_path.clone(),
                source,
            )
        };
        self.catalog
            .add(&title, &artist, &file_path, &source_url, &info);
        log.log(LogLevel::Ok, &format!("Completed: {title}"));
        log.count_completed();
    }
}

fn session_token() -> String {
    rand::rng()
        .sample_iter(rand::distr::Alphanumeric)
        .take(8)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}

fn snapshot(
    session: &DownloadSession,
    items: &[Arc<Mutex<DownloadItem>>],
    log: &SessionLog,
    finished: bool,
) -> BatchUpdate {
    let rendered: Vec<DownloadItem> = items.iter().map(|item| item.lock().clone()).collect();
    BatchUpdate {
        session: session.clone(),
        progress: log.render_progress(),
        items: render_items(&rendered),
        logs: log.get_logs(20),
        finished,
    }
}

fn final_update(
    session: &DownloadSession,
    items: &[Arc<Mutex<DownloadItem>>],
    log: &SessionLog,
) -> BatchUpdate {
    let mut session = session.clone();
    let (completed, failed, skipped, _) = log.counters();
    session.completed = completed;
    session.failed = failed;
    session.skipped = skipped;
    snapshot(&session, items, log, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;

    use crate::extractor::mocks::{MockExtractor, MockOutcome};
    use crate::extractor::{PlaylistEntry, ProgressHook};
    use crate::model::TrackDescriptor;

    fn harness(mock: MockExtractor, root: &std::path::Path) -> Downloader {
        let config = Config::with_root(root);
        let catalog = Arc::new(MusicCatalog::open(config.catalog_path()));
        let settings = Settings {
            auto_zip: false,
            ..Settings::default()
        };
        Downloader::new(Arc::new(mock), config, settings, String::new(), catalog)
    }

    /// Completes every download after a short delay, so a test can change
    /// state while jobs are in flight.
    struct SlowExtractor;

    #[async_trait]
    impl MediaExtractor for SlowExtractor {
        async fn expand_playlist(
            &self,
            _url: &str,
        ) -> Result<Vec<PlaylistEntry>, ExtractError> {
            Ok(vec![])
        }

        async fn download(
            &self,
            _request: &DownloadRequest,
            _progress: ProgressHook,
        ) -> Result<TrackInfo, ExtractError> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(TrackInfo::titled("Slow Track", "Artist", 60))
        }
    }

    /// Emits a download event, then a finished event, pausing at a gate
    /// after each so a test can observe the item in between.
    struct GatedExtractor {
        resume: tokio::sync::Notify,
    }

    #[async_trait]
    impl MediaExtractor for GatedExtractor {
        async fn expand_playlist(
            &self,
            _url: &str,
        ) -> Result<Vec<PlaylistEntry>, ExtractError> {
            Ok(vec![])
        }

        async fn download(
            &self,
            _request: &DownloadRequest,
            progress: ProgressHook,
        ) -> Result<TrackInfo, ExtractError> {
            progress(ProgressEvent::Downloading {
                percent: 42.5,
                speed: "1.2MiB/s".to_string(),
                eta: "00:05".to_string(),
            });
            self.resume.notified().await;
            progress(ProgressEvent::Finished);
            self.resume.notified().await;
            Ok(TrackInfo::titled("Gated Track", "Artist", 60))
        }
    }

    async fn drain(mut rx: mpsc::Receiver<BatchUpdate>) -> Vec<BatchUpdate> {
        let mut updates = Vec::new();
        while let Some(update) = rx.recv().await {
            updates.push(update);
        }
        updates
    }

    fn info(title: &str) -> TrackInfo {
        TrackInfo::titled(title, "Artist", 120)
    }

    #[tokio::test]
    async fn test_batch_completes_all_items() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockExtractor::completing()
            .outcome("ytsearch:a", MockOutcome::Complete(info("Song A")))
            .outcome("ytsearch:b", MockOutcome::Complete(info("Song B")))
            .outcome("ytsearch:c", MockOutcome::Complete(info("Song C")));
        let downloader = harness(mock, dir.path());

        let updates = drain(downloader.run_batch("a\nb\nc", BatchOptions::default())).await;
        let last = updates.last().unwrap();
        assert!(last.finished);
        assert_eq!(last.session.total, 3);
        assert_eq!(last.session.completed, 3);
        assert_eq!(last.session.failed, 0);
        assert_eq!(last.session.skipped, 0);
        assert_eq!(downloader.catalog.statistics().total_songs, 3);
    }

    #[tokio::test]
    async fn test_mixed_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockExtractor::completing()
            .outcome("https://y/watch?v=ok", MockOutcome::Complete(info("Good")))
            .outcome("https://y/watch?v=dup", MockOutcome::AlreadyDownloaded)
            .outcome(
                "https://y/watch?v=bad",
                MockOutcome::Fail("network unreachable".to_string()),
            );
        let downloader = harness(mock, dir.path());

        let input = "https://y/watch?v=ok\nhttps://y/watch?v=dup\nhttps://y/watch?v=bad";
        let updates = drain(downloader.run_batch(input, BatchOptions::default())).await;
        let last = updates.last().unwrap();
        assert_eq!(last.session.completed, 1);
        assert_eq!(last.session.skipped, 1);
        assert_eq!(last.session.failed, 1);
        assert_eq!(last.session.processed(), last.session.total);
        assert!(last.items.contains("[SKIPPED]"));
        assert!(last.items.contains("[FAILED]"));
    }

    #[tokio::test]
    async fn test_counters_never_exceed_total() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = harness(MockExtractor::completing(), dir.path());
        let updates = drain(downloader.run_batch("a\nb\nc\nd", BatchOptions::default())).await;
        for update in &updates {
            assert!(update.session.processed() <= update.session.total);
        }
        assert_eq!(updates.last().unwrap().session.processed(), 4);
    }

    #[tokio::test]
    async fn test_empty_input_finishes_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = harness(MockExtractor::completing(), dir.path());
        let updates = drain(downloader.run_batch("# only a comment\n\n", BatchOptions::default()))
            .await;
        assert_eq!(updates.len(), 1);
        let last = &updates[0];
        assert!(last.finished);
        assert_eq!(last.session.total, 0);
        assert!(last.logs.contains("No valid input"));
    }

    #[tokio::test]
    async fn test_cancel_before_start_processes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = harness(MockExtractor::completing(), dir.path());
        downloader.cancel_handle().stop();
        let updates = drain(downloader.run_batch("a\nb", BatchOptions::default())).await;
        let last = updates.last().unwrap();
        assert!(last.finished);
        assert_eq!(last.session.processed(), 0);
        assert!(last.logs.contains("Stopped"));
    }

    #[tokio::test]
    async fn test_cancel_mid_run_abandons_queued_items() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::with_root(dir.path());
        // One worker at a time, so cancellation lands between jobs
        config.max_workers = 1;
        let catalog = Arc::new(MusicCatalog::open(config.catalog_path()));
        let settings = Settings {
            auto_zip: false,
            ..Settings::default()
        };
        let downloader = Downloader::new(
            Arc::new(SlowExtractor),
            config,
            settings,
            String::new(),
            catalog,
        );
        let cancel = downloader.cancel_handle();

        let mut rx = downloader.run_batch("a\nb\nc\nd", BatchOptions::default());
        let mut last = None;
        while let Some(update) = rx.recv().await {
            if update.session.processed() >= 1 && !cancel.is_stopped() {
                cancel.stop();
            }
            last = Some(update);
        }

        let last = last.unwrap();
        assert!(last.finished);
        assert_eq!(last.session.total, 4);
        // Jobs already dispatched finish and count; the rest never start.
        assert!(last.session.processed() >= 1);
        assert!(last.session.processed() < last.session.total);
        assert_eq!(last.session.failed, 0);
        assert!(last.items.contains("[QUEUED]"));
        assert!(last.logs.contains("Batch stopped by user"));
    }

    #[tokio::test]
    async fn test_progress_events_drive_item_state() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::with_root(dir.path());
        let extractor = Arc::new(GatedExtractor {
            resume: tokio::sync::Notify::new(),
        });
        let run = BatchRun {
            extractor: Arc::clone(&extractor) as Arc<dyn MediaExtractor>,
            config: config.clone(),
            quality: "320".to_string(),
            embed_thumbnail: false,
            auto_zip: false,
            max_history: 50,
            proxy_url: String::new(),
            catalog: Arc::new(MusicCatalog::open(config.catalog_path())),
            cancel: CancelHandle::default(),
        };
        let item = Arc::new(Mutex::new(DownloadItem::new(
            "0001".to_string(),
            &TrackDescriptor {
                url: "https://y/watch?v=1".to_string(),
                title: "Test Song".to_string(),
                duration: 0,
            },
        )));
        let log = Arc::new(SessionLog::new(1));

        let mut job = Box::pin(run.download_one(
            Arc::clone(&item),
            Arc::clone(&log),
            dir.path(),
        ));

        // First poll runs up to the first gate: the download event has fired.
        assert!(futures::poll!(job.as_mut()).is_pending());
        {
            let guard = item.lock();
            assert_eq!(guard.status, DownloadStatus::Downloading);
            assert_eq!(guard.progress, 42.5);
            assert_eq!(guard.speed, "1.2MiB/s");
            assert_eq!(guard.eta, "00:05");
            let line = guard.status_line();
            assert!(line.contains("42%"));
            assert!(line.contains("1.2MiB/s"));
        }

        // Release the gate: the finished event moves the item to converting.
        extractor.resume.notify_one();
        assert!(futures::poll!(job.as_mut()).is_pending());
        {
            let guard = item.lock();
            assert_eq!(guard.status, DownloadStatus::Converting);
            assert_eq!(guard.progress, 100.0);
            assert!(guard.status_line().contains("Converting audio"));
        }

        // Release again: the job runs to completion.
        extractor.resume.notify_one();
        job.await;
        let guard = item.lock();
        assert_eq!(guard.status, DownloadStatus::Completed);
        assert_eq!(guard.title, "Gated Track");
        assert_eq!(log.counters(), (1, 0, 0, 1));
    }

    #[tokio::test]
    async fn test_search_queries_get_prefixed() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockExtractor::completing().outcome(
            "ytsearch:Artist - Song",
            MockOutcome::Complete(info("Resolved")),
        );
        // Any unprefixed target would hit the default outcome; make that a failure
        let mock = MockExtractor {
            default_outcome: MockOutcome::Fail("wrong target".to_string()),
            ..mock
        };
        let downloader = harness(mock, dir.path());
        let updates = drain(downloader.run_batch("Artist - Song", BatchOptions::default())).await;
        let last = updates.last().unwrap();
        assert_eq!(last.session.completed, 1);
        assert_eq!(last.session.failed, 0);
    }

    #[tokio::test]
    async fn test_playlist_expands_to_items() {
        let dir = tempfile::tempdir().unwrap();
        let entries = (0..3)
            .map(|i| PlaylistEntry {
                id: format!("v{i}"),
                title: format!("Track {i}"),
                url: format!("https://y/watch?v=v{i}"),
                duration: 100,
            })
            .collect();
        let downloader = harness(MockExtractor::with_playlist(entries), dir.path());
        let updates = drain(
            downloader.run_batch("https://y/playlist?list=PL1", BatchOptions::default()),
        )
        .await;
        let last = updates.last().unwrap();
        assert_eq!(last.session.total, 3);
        assert_eq!(last.session.completed, 3);
    }

    #[tokio::test]
    async fn test_history_records_session() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = harness(MockExtractor::completing(), dir.path());
        let config = Config::with_root(dir.path());
        drain(downloader.run_batch("a", BatchOptions::default())).await;
        let history = SessionHistory::open(config.history_path(), 50);
        assert_eq!(history.len(), 1);
        let recorded = &history.recent(1)[0];
        assert_eq!(recorded.total, 1);
        assert_eq!(recorded.completed, 1);
    }
}
