// File-backed output streams for classified URLs

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use urlscan_scanner::{Classification, ClassifiedRecord, RecordSink, SinkReport};

pub const IN_SCOPE_HEADER: &str = "--IN SCOPE URLS:---";
pub const OUT_OF_SCOPE_HEADER: &str = "--OUT OF SCOPE URLS:---";

/// The two files a crawl writes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPaths {
    pub in_scope: PathBuf,
    pub out_of_scope: PathBuf,
}

impl OutputPaths {
    /// Derives `<stem>-inscope.<ext>` and `<stem>-outscope.<ext>` next to `base`.
    pub fn from_base(base: &Path) -> Self {
        let stem = base
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        let extension = base.extension().map(|e| e.to_string_lossy().into_owned());

        let sibling = |suffix: &str| {
            let name = match &extension {
                Some(ext) => format!("{stem}-{suffix}.{ext}"),
                None => format!("{stem}-{suffix}"),
            };
            base.with_file_name(name)
        };

        Self {
            in_scope: sibling("inscope"),
            out_of_scope: sibling("outscope"),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct StreamStats {
    written: usize,
    errors: usize,
}

/// Two independent append-only streams, one writer task each.
///
/// Each writer persists a URL at most once, in the order records arrive.
pub struct OutputSink {
    in_scope: UnboundedSender<ClassifiedRecord>,
    out_of_scope: UnboundedSender<ClassifiedRecord>,
    in_scope_writer: JoinHandle<StreamStats>,
    out_of_scope_writer: JoinHandle<StreamStats>,
}

impl OutputSink {
    /// Creates both files and writes their headers before returning, so a
    /// destination that cannot be created fails before any crawling starts.
    pub async fn create(paths: &OutputPaths) -> io::Result<Self> {
        let in_scope_file = open_stream(&paths.in_scope, IN_SCOPE_HEADER).await?;
        let out_of_scope_file = open_stream(&paths.out_of_scope, OUT_OF_SCOPE_HEADER).await?;

        let (in_scope, in_scope_rx) = mpsc::unbounded_channel();
        let (out_of_scope, out_of_scope_rx) = mpsc::unbounded_channel();

        Ok(Self {
            in_scope,
            out_of_scope,
            in_scope_writer: tokio::spawn(write_stream(in_scope_file, in_scope_rx, "in-scope")),
            out_of_scope_writer: tokio::spawn(write_stream(
                out_of_scope_file,
                out_of_scope_rx,
                "out-of-scope",
            )),
        })
    }
}

impl RecordSink for OutputSink {
    fn emit(&self, record: ClassifiedRecord) {
        let intake = match record.classification {
            Classification::InScope => &self.in_scope,
            Classification::OutOfScope => &self.out_of_scope,
        };
        if let Err(e) = intake.send(record) {
            warn!("Output stream closed, dropping {}", e.0);
        }
    }

    async fn close(self) -> SinkReport {
        let OutputSink {
            in_scope,
            out_of_scope,
            in_scope_writer,
            out_of_scope_writer,
        } = self;

        // closing the intakes lets each writer drain and finish
        drop(in_scope);
        drop(out_of_scope);

        let in_stats = join_writer(in_scope_writer, "in-scope").await;
        let out_stats = join_writer(out_of_scope_writer, "out-of-scope").await;

        SinkReport {
            in_scope_written: in_stats.written,
            out_of_scope_written: out_stats.written,
            write_errors: in_stats.errors + out_stats.errors,
        }
    }
}

async fn open_stream(path: &Path, header: &str) -> io::Result<BufWriter<File>> {
    let file = File::create(path).await.map_err(|e| {
        io::Error::new(e.kind(), format!("could not create {}: {}", path.display(), e))
    })?;
    let mut writer = BufWriter::new(file);
    writer.write_all(format!("{header}\n").as_bytes()).await?;
    writer.flush().await?;
    debug!("Opened output stream {}", path.display());
    Ok(writer)
}

async fn write_stream<W>(
    mut writer: W,
    mut intake: UnboundedReceiver<ClassifiedRecord>,
    label: &'static str,
) -> StreamStats
where
    W: AsyncWrite + Unpin,
{
    let mut seen = HashSet::new();
    let mut stats = StreamStats::default();

    while let Some(record) = intake.recv().await {
        write_record(&mut writer, &record, &mut seen, &mut stats, label).await;
        // drain whatever is already queued, then flush once
        while let Ok(record) = intake.try_recv() {
            write_record(&mut writer, &record, &mut seen, &mut stats, label).await;
        }
        if let Err(e) = writer.flush().await {
            stats.errors += 1;
            warn!("Could not flush {} output: {}", label, e);
        }
    }

    if let Err(e) = writer.shutdown().await {
        stats.errors += 1;
        warn!("Could not close {} output: {}", label, e);
    }
    stats
}

async fn write_record<W>(
    writer: &mut W,
    record: &ClassifiedRecord,
    seen: &mut HashSet<String>,
    stats: &mut StreamStats,
    label: &str,
) where
    W: AsyncWrite + Unpin,
{
    if seen.contains(&record.url) {
        return;
    }
    match writer.write_all(format!("{record}\n").as_bytes()).await {
        Ok(()) => {
            seen.insert(record.url.clone());
            stats.written += 1;
        }
        Err(e) => {
            stats.errors += 1;
            warn!("Could not write URL {} to {} output: {}", record.url, label, e);
        }
    }
}

async fn join_writer(handle: JoinHandle<StreamStats>, label: &str) -> StreamStats {
    match handle.await {
        Ok(stats) => stats,
        Err(e) => {
            warn!("The {} writer task failed: {}", label, e);
            StreamStats {
                written: 0,
                errors: 1,
            }
        }
    }
}
