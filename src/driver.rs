use crate::config::{BuildConfig, INITIAL_ARENA_CAPACITY, INITIAL_LIST_CAPACITY};
use crate::cursor::Cursor;
use crate::interner::Interner;
use crate::list::{Edge, GrowableList};
use crate::stats::BuildStats;
use crate::tokenizer::{parse_buffer, Scan, ScanState};
use anyhow::{bail, Context, Result};
use bzip2::read::MultiBzDecoder;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use tracing::{info, trace};

/// Receives byte-level progress from the read loop.
pub trait ProgressSink {
    /// `total` is `None` when the stream length is unknown.
    fn update(&mut self, processed: u64, total: Option<u64>);

    fn finish(&mut self) {}
}

impl ProgressSink for () {
    fn update(&mut self, _processed: u64, _total: Option<u64>) {}
}

impl ProgressSink for ProgressBar {
    fn update(&mut self, processed: u64, total: Option<u64>) {
        if let Some(total) = total {
            self.set_length(total);
        }
        self.set_position(processed);
    }

    fn finish(&mut self) {
        self.finish_and_clear();
    }
}

impl<P: ProgressSink + ?Sized> ProgressSink for Box<P> {
    fn update(&mut self, processed: u64, total: Option<u64>) {
        (**self).update(processed, total);
    }

    fn finish(&mut self) {
        (**self).finish();
    }
}

/// The extracted link graph.
pub struct Graph {
    pub interner: Interner,
    pub edges: GrowableList<Edge>,
    pub stats: BuildStats,
}

/// Drives the read/resume loop over `reader` with a fixed buffer of
/// `buffer_size` bytes, filling `interner` and `edges`.
///
/// Bytes of a token cut off by the end of one read are moved to the front of
/// the buffer and completed by the next read.
pub fn build_graph_inner<R: Read, P: ProgressSink>(
    reader: &mut R,
    buffer_size: usize,
    total: Option<u64>,
    interner: &mut Interner,
    edges: &mut GrowableList<Edge>,
    progress: &mut P,
) -> Result<BuildStats> {
    let mut buf = vec![0u8; buffer_size];
    let mut pending = 0usize;
    let mut state = ScanState::default();
    let mut stats = BuildStats::new();

    loop {
        if pending == buffer_size {
            bail!(
                "A single token exceeds the {} byte read buffer at offset {}",
                buffer_size,
                stats.bytes_read - pending as u64
            );
        }

        let read = read_retrying(reader, &mut buf[pending..])?;
        if read == 0 {
            break;
        }
        stats.add_read(read as u64);
        progress.update(stats.bytes_read, total);

        let filled = pending + read;
        let edges_before = edges.len();
        let mut cursor = Cursor::new(&buf[..filled]);
        let scan = parse_buffer(&mut cursor, interner, edges, &mut state);
        stats.add_links((edges.len() - edges_before) as u64);

        pending = match scan {
            Scan::Complete => 0,
            Scan::Pending(at) => {
                let carried = filled - at;
                buf.copy_within(at..filled, 0);
                stats.record_carry(carried as u64);
                carried
            }
        };

        trace!(read, filled, pending, in_body = state.in_body, "Buffer scanned");
    }

    if pending > 0 {
        trace!(pending, "Discarding incomplete token at end of stream");
    }

    stats.records = state.records;
    progress.finish();
    Ok(stats)
}

fn read_retrying<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    loop {
        match reader.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).context("Failed to read from input"),
        }
    }
}

fn is_bz2(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "bz2")
}

fn make_progress_bar(total: Option<u64>) -> ProgressBar {
    match total {
        Some(total) => {
            let pb = ProgressBar::new(total);
            if let Ok(style) = ProgressStyle::with_template(
                "[{elapsed_precise}] [{bar:50}] {bytes}/{total_bytes} ({percent}%)",
            ) {
                pb.set_style(style.progress_chars("=> "));
            }
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("[{elapsed_precise}] {spinner} {bytes}") {
                pb.set_style(style);
            }
            pb
        }
    }
}

/// Builds the link graph of the dump at `path`. Files ending in `.bz2` are
/// decompressed on the fly, following every stream of a multistream dump.
pub fn build_graph(path: &str, config: &BuildConfig, show_progress: bool) -> Result<Graph> {
    config.validate()?;

    let input = Path::new(path);
    let file = File::open(input).with_context(|| format!("Failed to open wiki dump at: {}", path))?;
    let file_size = file
        .metadata()
        .with_context(|| format!("Failed to get metadata for: {}", path))?
        .len();

    let compressed = is_bz2(input);
    let total = if compressed { None } else { Some(file_size) };

    info!(
        path,
        file_size,
        compressed,
        buffer_capacity = config.buffer_capacity,
        "Building link graph"
    );

    let mut interner = Interner::with_capacity(INITIAL_ARENA_CAPACITY, INITIAL_LIST_CAPACITY);
    let mut edges = GrowableList::with_capacity(INITIAL_LIST_CAPACITY);

    let stats = {
        let mut progress: Box<dyn ProgressSink> = if show_progress {
            Box::new(make_progress_bar(total))
        } else {
            Box::new(())
        };
        let mut reader: Box<dyn Read> = if compressed {
            Box::new(MultiBzDecoder::new(file))
        } else {
            Box::new(file)
        };
        build_graph_inner(
            &mut reader,
            config.buffer_capacity,
            total,
            &mut interner,
            &mut edges,
            &mut progress,
        )?
    };

    info!(
        records = stats.records,
        nodes = interner.len(),
        edges = edges.len(),
        bytes = stats.bytes_read,
        "Link graph built"
    );

    Ok(Graph {
        interner,
        edges,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Yields at most `chunk` bytes per read.
    struct Chunked<'a> {
        data: &'a [u8],
        chunk: usize,
    }

    impl Read for Chunked<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.chunk.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    const SIMPLE: &[u8] = b"starting noise <title>Page</title><text>pre-text \
        [[first link]] then [[second link]].</text>";

    fn run(data: &[u8], buffer_size: usize, chunk: usize) -> Result<Graph> {
        let mut interner = Interner::with_capacity(64, 4);
        let mut edges = GrowableList::with_capacity(4);
        let mut reader = Chunked { data, chunk };
        let stats = build_graph_inner(
            &mut reader,
            buffer_size,
            Some(data.len() as u64),
            &mut interner,
            &mut edges,
            &mut (),
        )?;
        Ok(Graph {
            interner,
            edges,
            stats,
        })
    }

    fn assert_simple_graph(graph: &Graph) {
        let interner = &graph.interner;
        assert_eq!(interner.len(), 3);
        let page = interner.lookup(b"Page").unwrap();
        let first = interner.lookup(b"first link").unwrap();
        let second = interner.lookup(b"second link").unwrap();
        assert_eq!(
            graph.edges.as_slice(),
            &[Edge::new(page, first), Edge::new(page, second)]
        );
    }

    #[test]
    fn single_read() {
        let graph = run(SIMPLE, 1 << 16, usize::MAX).unwrap();
        assert_simple_graph(&graph);
        assert_eq!(graph.stats.records, 1);
        assert_eq!(graph.stats.links, 2);
        assert_eq!(graph.stats.bytes_read, SIMPLE.len() as u64);
    }

    #[test]
    fn independent_of_read_size() {
        for chunk in 1..=SIMPLE.len() {
            let graph = run(SIMPLE, 32, chunk).unwrap();
            assert_simple_graph(&graph);
        }
    }

    #[test]
    fn independent_of_buffer_size() {
        for buffer_size in 16..=SIMPLE.len() + 1 {
            let graph = run(SIMPLE, buffer_size, usize::MAX).unwrap();
            assert_simple_graph(&graph);
        }
    }

    #[test]
    fn carried_bytes_are_counted() {
        let graph = run(SIMPLE, 24, usize::MAX).unwrap();
        assert!(graph.stats.resumes > 0);
        assert!(graph.stats.max_carried > 0);
        assert!(graph.stats.max_carried < 24);
    }

    #[test]
    fn token_larger_than_buffer_is_an_error() {
        let data = b"<title>A title far longer than the buffer</title>";
        let result = run(data, 16, usize::MAX);
        assert!(result.is_err());
    }

    #[test]
    fn empty_stream() {
        let graph = run(b"", 64, usize::MAX).unwrap();
        assert!(graph.interner.is_empty());
        assert!(graph.edges.is_empty());
        assert_eq!(graph.stats.reads, 0);
    }

    #[test]
    fn truncated_stream_keeps_completed_tokens() {
        let graph = run(b"<title>A</title><text>[[B]] [[C", 64, 5).unwrap();
        assert_eq!(graph.interner.len(), 2);
        assert_eq!(graph.edges.len(), 1);
    }

    struct Interrupting<'a> {
        inner: &'a [u8],
        interrupted: bool,
    }

    impl Read for Interrupting<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::new(ErrorKind::Interrupted, "signal"));
            }
            self.inner.read(buf)
        }
    }

    #[test]
    fn interrupted_reads_are_retried() {
        let mut interner = Interner::with_capacity(64, 4);
        let mut edges = GrowableList::with_capacity(4);
        let mut reader = Interrupting {
            inner: SIMPLE,
            interrupted: false,
        };
        build_graph_inner(&mut reader, 64, None, &mut interner, &mut edges, &mut ()).unwrap();
        assert_eq!(edges.len(), 2);
    }
}
