use crate::crawler::CrawlPhase;
use crate::error::ScanError;
use crate::result::{Classification, ClassifiedRecord, CrawlSummary};
use tracing::{debug, info, warn};

/// Receives every crawl event the coordinator produces.
///
/// All methods default to no-ops so observers only implement what they need.
/// Methods are called from worker tasks and must not block.
pub trait CrawlObserver: Send + Sync {
    fn phase_changed(&self, _phase: CrawlPhase) {}

    /// A worker accepted `url` from the frontier and is about to fetch it.
    fn page_started(&self, _worker_id: usize, _url: &str) {}

    fn fetch_failed(&self, _url: &str, _error: &ScanError) {}

    fn asset_scanned(&self, _asset_url: &str, _found: &[String]) {}

    fn asset_failed(&self, _asset_url: &str, _error: &ScanError) {}

    fn invalid_url(&self, _url: &str) {}

    fn url_classified(&self, _record: &ClassifiedRecord) {}

    fn crawl_finished(&self, _summary: &CrawlSummary) {}
}

/// Default observer: every event becomes a `tracing` log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl CrawlObserver for TracingObserver {
    fn phase_changed(&self, phase: CrawlPhase) {
        debug!("Crawl phase: {:?}", phase);
    }

    fn page_started(&self, worker_id: usize, url: &str) {
        info!("[Worker {}] Crawling: {}", worker_id, url);
    }

    fn fetch_failed(&self, url: &str, error: &ScanError) {
        warn!("Error fetching URL {}: {}", url, error);
    }

    fn asset_scanned(&self, _asset_url: &str, found: &[String]) {
        for url in found {
            info!("URL found in script: {}", url);
        }
    }

    fn asset_failed(&self, asset_url: &str, error: &ScanError) {
        warn!("Error fetching script URL {}: {}", asset_url, error);
    }

    fn invalid_url(&self, url: &str) {
        info!("Invalid URL found: {}", url);
    }

    fn url_classified(&self, record: &ClassifiedRecord) {
        match record.classification {
            Classification::InScope => info!("In-scope URL found: {}", record.url),
            Classification::OutOfScope => info!("Out-of-scope URL found: {}", record.url),
        }
    }

    fn crawl_finished(&self, summary: &CrawlSummary) {
        info!(
            "SCAN FINISHED: {} page(s) crawled in {:.2?}",
            summary.pages_crawled, summary.elapsed
        );
    }
}
