use serde::{Deserialize, Serialize};

/// Writer and reader tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// In-memory postings budget before an automatic flush
    pub ram_buffer_bytes: usize,
    /// Buffered document cap before an automatic flush (0 = unbounded)
    pub max_buffered_docs: usize,
    /// Every n-th term is mirrored into the sparse term index
    pub index_interval: u32,
    /// Skip entry every n postings
    pub skip_interval: u32,
    pub max_skip_levels: u32,
    /// Segments per level before a merge is selected
    pub merge_factor: usize,
    /// Load only every n-th entry of the term index
    pub term_index_divisor: u32,
    pub write_lock_timeout_ms: u64,
    /// Capacity of the per-reader term lookup cache
    pub term_cache_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        IndexConfig {
            ram_buffer_bytes: 16 * 1024 * 1024,
            max_buffered_docs: 0,
            index_interval: 128,
            skip_interval: 16,
            max_skip_levels: 10,
            merge_factor: 10,
            term_index_divisor: 1,
            write_lock_timeout_ms: 1000,
            term_cache_size: 1024,
        }
    }
}

impl IndexConfig {
    pub fn with_ram_buffer(mut self, bytes: usize) -> Self {
        self.ram_buffer_bytes = bytes;
        self
    }

    pub fn with_max_buffered_docs(mut self, docs: usize) -> Self {
        self.max_buffered_docs = docs;
        self
    }

    pub fn with_merge_factor(mut self, factor: usize) -> Self {
        self.merge_factor = factor;
        self
    }
}
