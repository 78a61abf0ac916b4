use crate::sink::{OutputPaths, OutputSink};
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use urlscan_scanner::error::Result;
use urlscan_scanner::{
    Classification, ClassifiedRecord, CrawlObserver, CrawlPhase, CrawlSummary, Crawler, ScanError,
    ScopePolicy, TracingObserver,
};

/// Options for configuring a crawl operation
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub url: String,
    /// Base path the two output file names are derived from
    pub output: PathBuf,
    pub in_scope: Vec<String>,
    pub out_of_scope: Vec<String>,
    pub threads: usize,
    pub timeout: Option<Duration>,
    pub dedupe_assets: bool,
    pub show_progress_bars: bool,
}

impl CrawlOptions {
    pub fn new(url: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            output: output.into(),
            in_scope: Vec::new(),
            out_of_scope: Vec::new(),
            threads: 1,
            timeout: None,
            dedupe_assets: false,
            show_progress_bars: false,
        }
    }

    pub fn policy(&self) -> ScopePolicy {
        ScopePolicy::new(self.in_scope.iter().cloned(), self.out_of_scope.iter().cloned())
    }
}

/// Everything known about a finished crawl
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outputs: OutputPaths,
    pub policy: ScopePolicy,
    pub summary: CrawlSummary,
}

/// Spinner showing live crawl counts. Log lines from the wrapped observer
/// are printed with the spinner suspended so the two don't interleave.
pub struct ProgressObserver {
    bar: ProgressBar,
    inner: Arc<dyn CrawlObserver>,
    pages: AtomicUsize,
    in_scope: AtomicUsize,
    out_of_scope: AtomicUsize,
}

impl ProgressObserver {
    pub fn new(inner: Arc<dyn CrawlObserver>) -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            bar.set_style(style);
        }
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_message("Starting crawl...");
        Self::with_bar(bar, inner)
    }

    pub fn with_bar(bar: ProgressBar, inner: Arc<dyn CrawlObserver>) -> Self {
        Self {
            bar,
            inner,
            pages: AtomicUsize::new(0),
            in_scope: AtomicUsize::new(0),
            out_of_scope: AtomicUsize::new(0),
        }
    }

    pub fn message(&self) -> String {
        self.bar.message()
    }

    fn refresh(&self) {
        self.bar.set_message(format!(
            "Crawling... {} pages, {} in-scope, {} out-of-scope",
            self.pages.load(Ordering::Relaxed),
            self.in_scope.load(Ordering::Relaxed),
            self.out_of_scope.load(Ordering::Relaxed),
        ));
    }
}

impl CrawlObserver for ProgressObserver {
    fn phase_changed(&self, phase: CrawlPhase) {
        self.bar.suspend(|| self.inner.phase_changed(phase));
        if phase == CrawlPhase::Draining {
            self.bar.set_message("Flushing output...");
        }
    }

    fn page_started(&self, worker_id: usize, url: &str) {
        self.pages.fetch_add(1, Ordering::Relaxed);
        self.bar.suspend(|| self.inner.page_started(worker_id, url));
        self.refresh();
    }

    fn fetch_failed(&self, url: &str, error: &ScanError) {
        self.bar.suspend(|| self.inner.fetch_failed(url, error));
    }

    fn asset_scanned(&self, asset_url: &str, found: &[String]) {
        self.bar.suspend(|| self.inner.asset_scanned(asset_url, found));
    }

    fn asset_failed(&self, asset_url: &str, error: &ScanError) {
        self.bar.suspend(|| self.inner.asset_failed(asset_url, error));
    }

    fn invalid_url(&self, url: &str) {
        self.bar.suspend(|| self.inner.invalid_url(url));
    }

    fn url_classified(&self, record: &ClassifiedRecord) {
        match record.classification {
            Classification::InScope => self.in_scope.fetch_add(1, Ordering::Relaxed),
            Classification::OutOfScope => self.out_of_scope.fetch_add(1, Ordering::Relaxed),
        };
        self.bar.suspend(|| self.inner.url_classified(record));
        self.refresh();
    }

    fn crawl_finished(&self, summary: &CrawlSummary) {
        self.bar.finish_with_message(format!(
            "Crawl complete! {} pages, {} in-scope, {} out-of-scope",
            summary.pages_crawled, summary.in_scope_found, summary.out_of_scope_found
        ));
        self.inner.crawl_finished(summary);
    }
}

/// Execute a crawl with the given options, writing both output streams.
///
/// `observer` replaces the default tracing observer when given; with
/// `show_progress_bars` it is wrapped in a spinner.
pub async fn execute_crawl(
    options: CrawlOptions,
    observer: Option<Arc<dyn CrawlObserver>>,
) -> Result<CrawlReport> {
    let policy = options.policy();
    let outputs = OutputPaths::from_base(&options.output);

    let observer = observer.unwrap_or_else(|| Arc::new(TracingObserver));
    let observer: Arc<dyn CrawlObserver> = if options.show_progress_bars {
        Arc::new(ProgressObserver::new(observer))
    } else {
        observer
    };

    // built before the files so a bad timeout or seed doesn't leave empty outputs behind
    let crawler = Crawler::new(policy.clone())?
        .with_timeout(options.timeout)?
        .with_workers(options.threads)
        .with_asset_dedupe(options.dedupe_assets)
        .with_observer(observer);
    validate_seed(&options.url)?;

    let sink = OutputSink::create(&outputs).await?;

    let started_at = Utc::now();
    let summary = crawler.crawl(&options.url, sink).await?;
    let finished_at = Utc::now();

    Ok(CrawlReport {
        started_at,
        finished_at,
        outputs,
        policy,
        summary,
    })
}

fn validate_seed(url: &str) -> Result<()> {
    if urlscan_scanner::scope::is_valid_url(url) {
        Ok(())
    } else {
        Err(ScanError::InvalidUrl(format!(
            "start URL must be an absolute http(s) URL: {url}"
        )))
    }
}

/// Generate a plain-text report for a finished crawl
pub fn generate_crawl_report(report: &CrawlReport) -> String {
    let summary = &report.summary;
    let mut out = String::new();

    out.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    out.push_str("# Summary:\n");
    out.push_str(&format!("  Seed: {}\n", summary.seed));
    out.push_str(&format!("  Workers: {}\n", summary.workers));
    out.push_str(&format!("  Pages crawled: {}\n", summary.pages_crawled));
    out.push_str(&format!("  Fetch failures: {}\n", summary.fetch_failures));
    out.push_str(&format!(
        "  Code assets scanned: {} ({} failed)\n",
        summary.assets_scanned, summary.asset_failures
    ));
    out.push_str(&format!("  Invalid URLs skipped: {}\n", summary.invalid_urls));
    out.push_str(&format!("  Elapsed: {:.2?}\n", summary.elapsed));

    out.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");

    out.push_str("## Scope\n");
    out.push_str(&format!("  In-scope suffixes: {}\n", format_suffixes(report.policy.in_scope())));
    out.push_str(&format!(
        "  Out-of-scope suffixes: {}\n\n",
        format_suffixes(report.policy.out_scope())
    ));

    out.push_str("## Output\n");
    out.push_str(&format!(
        "  {} unique in-scope URLs -> {}\n",
        summary.sink.in_scope_written,
        report.outputs.in_scope.display()
    ));
    out.push_str(&format!(
        "  {} unique out-of-scope URLs -> {}\n",
        summary.sink.out_of_scope_written,
        report.outputs.out_of_scope.display()
    ));
    if summary.sink.write_errors > 0 {
        out.push_str(&format!("  {} write error(s)\n", summary.sink.write_errors));
    }
    out.push('\n');

    out
}

fn format_suffixes(suffixes: &[String]) -> String {
    if suffixes.is_empty() {
        "(none)".to_string()
    } else {
        suffixes.join(", ")
    }
}
