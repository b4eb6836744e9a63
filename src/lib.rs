//! Labyrinth: streaming wikilink graph extraction from Wikipedia XML dumps
//!
//! The dump is far too large to hold in memory, so it is consumed as a
//! sequence of fixed-size reads. Every `<title>` becomes a node and every
//! `[[Target]]` / `[[Target|Label]]` inside a `<text>` body becomes an edge
//! from the current title to the target.
//!
//! # Architecture
//!
//! - **Single pass, bounded memory** -- One read buffer, reused for the whole
//!   dump. Tokens cut off by a read boundary are carried to the front of the
//!   buffer and completed by the next read; nothing is copied elsewhere.
//! - **Offsets, never pointers** -- Interned strings live in an append-only
//!   arena and are addressed by `(offset, length)`, so arena growth never
//!   invalidates a reference.
//! - **Hash-indexed interning** -- Titles are deduplicated through an
//!   FxHashMap keyed by content hash; ids are dense and assigned in
//!   first-seen order.
//!
//! # Key Modules
//!
//! - [`arena`] -- Append-only byte arena and `Slice` references
//! - [`list`] -- Doubling growable list and the `Edge` type
//! - [`interner`] -- String to dense-id interner
//! - [`cursor`] -- Forward-only view over the read buffer
//! - [`tokenizer`] -- Resumable title/text/link state machine
//! - [`driver`] -- Read/resume loop and progress reporting
//! - [`graph`] -- Graph artifact persistence with staleness checks
//! - [`export`] -- CSV export for bulk graph import
//! - [`stats`] -- Build counters
//! - [`config`] -- Constants and build configuration
//!
//! # Example Usage
//!
//! ```bash
//! # Build the link graph
//! labyrinth build -i enwiki-latest-pages-articles.xml.bz2 -o output/graph.bin
//!
//! # Export for neo4j-admin import
//! labyrinth export-csv -g output/graph.bin -o output/csv
//! ```

pub mod arena;
pub mod config;
pub mod cursor;
pub mod driver;
pub mod export;
pub mod graph;
pub mod interner;
pub mod list;
pub mod stats;
pub mod tokenizer;
