pub mod crawler;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod frontier;
pub mod observer;
pub mod result;
pub mod scope;

pub use crawler::{CrawlPhase, Crawler, RecordSink};
pub use error::ScanError;
pub use fetch::{FetchedPage, Fetcher};
pub use frontier::{Frontier, WorkItem};
pub use observer::{CrawlObserver, TracingObserver};
pub use result::{Classification, ClassifiedRecord, CrawlSummary, SinkReport};
pub use scope::ScopePolicy;
