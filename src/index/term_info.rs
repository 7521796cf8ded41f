/// Dictionary entry for one term in one segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TermInfo {
    pub doc_freq: u32,
    /// Byte offset of the term's postings in the frequency file
    pub freq_pointer: u64,
    /// Byte offset of the term's positions in the prox file
    pub prox_pointer: u64,
    /// Offset from `freq_pointer` to the skip data; meaningful only when
    /// `doc_freq >= skip_interval`
    pub skip_offset: u64,
}

impl TermInfo {
    pub fn new(doc_freq: u32, freq_pointer: u64, prox_pointer: u64, skip_offset: u64) -> Self {
        TermInfo {
            doc_freq,
            freq_pointer,
            prox_pointer,
            skip_offset,
        }
    }
}
