use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Which output stream a discovered URL belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    InScope,
    OutOfScope,
}

impl Classification {
    /// Line prefix used when the record is persisted.
    pub fn label(&self) -> &'static str {
        match self {
            Classification::InScope => "In-scope",
            Classification::OutOfScope => "Out-Of-Scope",
        }
    }
}

/// A resolved, validated URL together with its scope classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedRecord {
    pub classification: Classification,
    pub url: String,
}

impl ClassifiedRecord {
    pub fn new(classification: Classification, url: impl Into<String>) -> Self {
        Self {
            classification,
            url: url.into(),
        }
    }

    pub fn in_scope(url: impl Into<String>) -> Self {
        Self::new(Classification::InScope, url)
    }

    pub fn out_of_scope(url: impl Into<String>) -> Self {
        Self::new(Classification::OutOfScope, url)
    }
}

impl fmt::Display for ClassifiedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.classification.label(), self.url)
    }
}

/// Per-stream totals reported by a record sink once it has been closed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkReport {
    pub in_scope_written: usize,
    pub out_of_scope_written: usize,
    pub write_errors: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlSummary {
    pub seed: String,
    pub workers: usize,
    pub pages_crawled: usize,
    pub fetch_failures: usize,
    pub assets_scanned: usize,
    pub asset_failures: usize,
    pub in_scope_found: usize,
    pub out_of_scope_found: usize,
    pub invalid_urls: usize,
    pub unique_urls_enqueued: usize,
    pub elapsed: Duration,
    pub sink: SinkReport,
}
