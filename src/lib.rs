//! fathom: a segment-based full-text search library
//!
//! Module map:
//! - `store`    byte-addressable directories, typed inputs/outputs, locks
//! - `analysis` token stream contract and the basic analyzers
//! - `index`    inverted indexing, segment files, readers, writer, merger
//! - `search`   query algebra, scorers, rewrites, collectors, searchers
//! - `util`     norm byte encoding, deletion bitsets
//!
//! Indexing flows documents through the analyzer into per-field postings
//! hashes, flushed a segment at a time; searching rewrites the query tree
//! against a reader, builds weights and per-segment scorers, and collects
//! the top hits through a priority queue.

pub mod analysis;
pub mod core;
pub mod index;
pub mod search;
pub mod store;
pub mod util;

pub use crate::core::{Error, ErrorKind, IndexConfig, Result};
pub use crate::index::{Document, Field, FieldFlags, FieldValue, IndexReader, IndexWriter, Term};
pub use crate::search::{IndexSearcher, Query, TopDocs};
pub use crate::store::{Directory, FsDirectory, MmapDirectory, RamDirectory};
