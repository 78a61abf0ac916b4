use crate::error::{Result, ScanError};
use crate::extract::{LinkExtractor, resolve_url};
use crate::fetch::Fetcher;
use crate::frontier::Frontier;
use crate::observer::{CrawlObserver, TracingObserver};
use crate::result::{ClassifiedRecord, CrawlSummary, SinkReport};
use crate::scope::{ScopePolicy, Verdict, is_valid_url};
use futures::future::try_join_all;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

/// Coordinator lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlPhase {
    Idle,
    Running,
    Draining,
    Finished,
}

/// Destination for classified records.
///
/// `emit` is called concurrently from every worker and must not block.
/// `close` is called exactly once after the frontier has drained.
pub trait RecordSink: Send + Sync + 'static {
    fn emit(&self, record: ClassifiedRecord);

    fn close(self) -> impl Future<Output = SinkReport> + Send;
}

impl RecordSink for UnboundedSender<ClassifiedRecord> {
    fn emit(&self, record: ClassifiedRecord) {
        // receiver gone means nobody is listening; nothing to persist
        let _ = self.send(record);
    }

    async fn close(self) -> SinkReport {
        SinkReport::default()
    }
}

#[derive(Debug, Default)]
struct CrawlStats {
    pages_crawled: AtomicUsize,
    fetch_failures: AtomicUsize,
    assets_scanned: AtomicUsize,
    asset_failures: AtomicUsize,
    in_scope_found: AtomicUsize,
    out_of_scope_found: AtomicUsize,
    invalid_urls: AtomicUsize,
}

impl CrawlStats {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn read(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::Relaxed)
    }
}

/// Counts asset events on their way to the real observer.
struct CountingObserver<'a> {
    inner: &'a dyn CrawlObserver,
    stats: &'a CrawlStats,
}

impl CrawlObserver for CountingObserver<'_> {
    fn asset_scanned(&self, asset_url: &str, found: &[String]) {
        CrawlStats::bump(&self.stats.assets_scanned);
        self.inner.asset_scanned(asset_url, found);
    }

    fn asset_failed(&self, asset_url: &str, error: &ScanError) {
        CrawlStats::bump(&self.stats.asset_failures);
        self.inner.asset_failed(asset_url, error);
    }
}

/// Everything a worker task needs, shared behind one `Arc`.
struct WorkerContext<S> {
    frontier: Frontier,
    fetcher: Fetcher,
    extractor: LinkExtractor,
    policy: ScopePolicy,
    observer: Arc<dyn CrawlObserver>,
    stats: CrawlStats,
    sink: S,
}

impl<S: RecordSink> WorkerContext<S> {
    async fn run(self: Arc<Self>, worker_id: usize) {
        debug!("Worker {} started", worker_id);
        while let Some(item) = self.frontier.dequeue().await {
            self.process(worker_id, item.url()).await;
        }
        debug!("Worker {} finished", worker_id);
    }

    async fn process(&self, worker_id: usize, url: &str) {
        self.observer.page_started(worker_id, url);

        let page = match self.fetcher.fetch(url).await {
            Ok(page) => page,
            Err(e) => {
                CrawlStats::bump(&self.stats.fetch_failures);
                self.observer.fetch_failed(url, &e);
                return;
            }
        };
        CrawlStats::bump(&self.stats.pages_crawled);

        let observer = CountingObserver {
            inner: self.observer.as_ref(),
            stats: &self.stats,
        };
        let candidates = self
            .extractor
            .extract(&page.final_url, &page.body, &observer)
            .await;

        for candidate in candidates {
            self.route(candidate);
        }
    }

    fn route(&self, url: String) {
        match self.policy.classify(&url) {
            Verdict::Invalid => {
                CrawlStats::bump(&self.stats.invalid_urls);
                self.observer.invalid_url(&url);
            }
            Verdict::InScope => {
                CrawlStats::bump(&self.stats.in_scope_found);
                let record = ClassifiedRecord::in_scope(url);
                self.observer.url_classified(&record);
                if self.frontier.enqueue_if_new(&record.url) {
                    debug!("Queued {}", record.url);
                }
                self.sink.emit(record);
            }
            Verdict::OutOfScope => {
                CrawlStats::bump(&self.stats.out_of_scope_found);
                let record = ClassifiedRecord::out_of_scope(url);
                self.observer.url_classified(&record);
                self.sink.emit(record);
            }
        }
    }
}

/// Crawl coordinator: seeds the frontier, runs the worker pool and closes
/// the record sink once no more work can appear.
pub struct Crawler {
    policy: ScopePolicy,
    fetcher: Fetcher,
    workers: usize,
    dedupe_assets: bool,
    observer: Arc<dyn CrawlObserver>,
    phase: Mutex<CrawlPhase>,
}

impl Crawler {
    pub fn new(policy: ScopePolicy) -> Result<Self> {
        Ok(Self {
            policy,
            fetcher: Fetcher::new()?,
            workers: 1,
            dedupe_assets: false,
            observer: Arc::new(TracingObserver),
            phase: Mutex::new(CrawlPhase::Idle),
        })
    }

    /// Number of concurrent workers; zero is treated as one.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Result<Self> {
        self.fetcher = Fetcher::with_timeout(timeout)?;
        Ok(self)
    }

    pub fn with_fetcher(mut self, fetcher: Fetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn CrawlObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Fetch each embedded asset at most once per crawl instead of once per reference.
    pub fn with_asset_dedupe(mut self, dedupe: bool) -> Self {
        self.dedupe_assets = dedupe;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn phase(&self) -> CrawlPhase {
        *self.phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_phase(&self, phase: CrawlPhase) {
        *self.phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = phase;
        self.observer.phase_changed(phase);
    }

    fn begin(&self) -> Result<()> {
        let mut phase = self.phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if matches!(*phase, CrawlPhase::Running | CrawlPhase::Draining) {
            return Err(ScanError::AlreadyRunning);
        }
        *phase = CrawlPhase::Running;
        Ok(())
    }

    /// Crawls everything reachable from `start_url` within scope, emitting a
    /// record for every classified URL into `sink`, then closes the sink.
    ///
    /// Per-URL failures never abort the crawl; they are reported to the
    /// observer and counted in the returned summary.
    pub async fn crawl<S: RecordSink>(&self, start_url: &str, sink: S) -> Result<CrawlSummary> {
        if !is_valid_url(start_url) {
            return Err(ScanError::InvalidUrl(format!(
                "start URL must be an absolute http(s) URL: {start_url}"
            )));
        }
        // same serialized form discovered links are keyed by
        let start_url = resolve_url(start_url, start_url);
        let start_url = start_url.as_str();

        self.begin()?;
        self.observer.phase_changed(CrawlPhase::Running);
        info!("Starting crawl of {} with {} worker(s)", start_url, self.workers);
        let started = Instant::now();

        let extractor = if self.dedupe_assets {
            LinkExtractor::with_asset_dedupe(self.fetcher.clone())
        } else {
            LinkExtractor::new(self.fetcher.clone())
        };

        let context = Arc::new(WorkerContext {
            frontier: Frontier::new(),
            fetcher: self.fetcher.clone(),
            extractor,
            policy: self.policy.clone(),
            observer: self.observer.clone(),
            stats: CrawlStats::default(),
            sink,
        });
        context.frontier.enqueue_if_new(start_url);

        let handles: Vec<_> = (0..self.workers)
            .map(|worker_id| tokio::spawn(context.clone().run(worker_id)))
            .collect();
        let abort_handles: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();

        if let Err(e) = try_join_all(handles).await {
            // a worker panicked; stop the rest instead of leaving them crawling detached
            for handle in &abort_handles {
                handle.abort();
            }
            self.set_phase(CrawlPhase::Finished);
            return Err(ScanError::JoinError(e));
        }

        self.set_phase(CrawlPhase::Draining);
        let context = Arc::try_unwrap(context)
            .map_err(|_| ScanError::Other("worker context still shared after join".into()))?;

        let stats = &context.stats;
        let unique_urls_enqueued = context.frontier.visited_len();
        let sink_report = context.sink.close().await;

        let summary = CrawlSummary {
            seed: start_url.to_string(),
            workers: self.workers,
            pages_crawled: CrawlStats::read(&stats.pages_crawled),
            fetch_failures: CrawlStats::read(&stats.fetch_failures),
            assets_scanned: CrawlStats::read(&stats.assets_scanned),
            asset_failures: CrawlStats::read(&stats.asset_failures),
            in_scope_found: CrawlStats::read(&stats.in_scope_found),
            out_of_scope_found: CrawlStats::read(&stats.out_of_scope_found),
            invalid_urls: CrawlStats::read(&stats.invalid_urls),
            unique_urls_enqueued,
            elapsed: started.elapsed(),
            sink: sink_report,
        };

        self.set_phase(CrawlPhase::Finished);
        self.observer.crawl_finished(&summary);
        Ok(summary)
    }
}
