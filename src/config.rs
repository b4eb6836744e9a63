use anyhow::{ensure, Result};

/// Default read-buffer size (8 MiB)
pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024 * 1024;

/// Upper bound on a single title or link span; the read buffer must be larger
pub const MAX_SPAN_LEN: usize = 512;

/// Initial byte capacity of the interner's arena
pub const INITIAL_ARENA_CAPACITY: usize = 1 << 20;

/// Initial entry capacity for the edge list and the interner's slice list
pub const INITIAL_LIST_CAPACITY: usize = 1 << 20;

/// Bumped whenever the on-disk graph layout changes
pub const GRAPH_VERSION: u32 = 1;

/// Tag name following `<` that opens a record title
pub const TITLE_TAG: &[u8] = b"title";

/// Tag name following `<` that opens a record body
pub const TEXT_TAG: &[u8] = b"text";

/// Relationship type written to exported edge files
pub const EDGE_TYPE: &str = "LINKS_TO";

/// Node label written to exported node files
pub const NODE_LABEL: &str = "Page";

#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub buffer_capacity: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl BuildConfig {
    pub fn new(buffer_capacity: usize) -> Self {
        Self { buffer_capacity }
    }

    /// Rejects buffers that could not hold the longest markup span.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.buffer_capacity > MAX_SPAN_LEN,
            "Buffer capacity {} must exceed the maximum span length {}",
            self.buffer_capacity,
            MAX_SPAN_LEN
        );
        Ok(())
    }
}
