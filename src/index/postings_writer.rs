use crate::core::error::{Error, Result};
use crate::index::skip::SkipListWriter;
use crate::index::term_info::TermInfo;
use crate::store::output::IndexOutput;

/// One position occurrence handed to the postings writer
#[derive(Debug, Clone)]
pub struct PositionEntry {
    pub position: u32,
    pub payload: Option<Vec<u8>>,
}

/// Streams one segment's `.frq` and `.prx` files term by term
///
/// Freq encoding per posting: a VInt whose low bit set means "freq == 1";
/// otherwise the remaining bits are the doc delta and the freq follows as
/// its own VInt. Fields that omit term frequencies write plain doc deltas.
/// Prox encoding per occurrence: a VInt position delta, with the low bit
/// flagging an attached payload when the field stores payloads; a flagged
/// occurrence is followed by the payload length (0 repeats the previous
/// length) and the payload bytes.
pub struct PostingsWriter {
    pub freq_out: Box<dyn IndexOutput>,
    pub prox_out: Box<dyn IndexOutput>,
    skip_writer: SkipListWriter,
    skip_interval: u32,
    // per-term state
    freq_start: u64,
    prox_start: u64,
    last_doc: u32,
    df: u32,
    omit_tf: bool,
    store_payloads: bool,
    last_payload_length: u32,
}

impl PostingsWriter {
    pub fn new(
        freq_out: Box<dyn IndexOutput>,
        prox_out: Box<dyn IndexOutput>,
        skip_interval: u32,
        max_skip_levels: u32,
    ) -> Self {
        PostingsWriter {
            freq_out,
            prox_out,
            skip_writer: SkipListWriter::new(skip_interval, max_skip_levels),
            skip_interval,
            freq_start: 0,
            prox_start: 0,
            last_doc: 0,
            df: 0,
            omit_tf: false,
            store_payloads: false,
            last_payload_length: 0,
        }
    }

    pub fn start_term(&mut self, omit_tf: bool, store_payloads: bool) {
        self.freq_start = self.freq_out.position();
        self.prox_start = self.prox_out.position();
        self.last_doc = 0;
        self.df = 0;
        self.omit_tf = omit_tf;
        self.store_payloads = store_payloads && !omit_tf;
        self.last_payload_length = 0;
        self.skip_writer
            .reset(self.freq_start, self.prox_start, self.store_payloads);
    }

    /// Docs must arrive in strictly increasing order within a term
    pub fn add_doc(&mut self, doc: u32, freq: u32, positions: &[PositionEntry]) -> Result<()> {
        if self.df > 0 && doc <= self.last_doc {
            return Err(Error::corrupt(format!(
                "docs out of order ({} after {})",
                doc, self.last_doc
            )));
        }
        if self.df > 0 && self.df % self.skip_interval == 0 {
            self.skip_writer.set_skip_data(
                self.last_doc,
                self.freq_out.position(),
                self.prox_out.position(),
                self.last_payload_length,
            );
            self.skip_writer.buffer_skip(self.df);
        }

        let delta = doc - self.last_doc;
        if self.omit_tf {
            self.freq_out.write_vint(delta)?;
        } else if freq == 1 {
            self.freq_out.write_vint(delta << 1 | 1)?;
        } else {
            self.freq_out.write_vint(delta << 1)?;
            self.freq_out.write_vint(freq)?;
        }
        self.last_doc = doc;
        self.df += 1;

        if !self.omit_tf {
            let mut last_position = 0u32;
            for entry in positions {
                let pos_delta = entry.position - last_position;
                last_position = entry.position;
                if self.store_payloads {
                    match entry.payload.as_deref() {
                        Some(payload) if !payload.is_empty() => {
                            self.prox_out.write_vint(pos_delta << 1 | 1)?;
                            let len = payload.len() as u32;
                            if len == self.last_payload_length {
                                self.prox_out.write_vint(0)?;
                            } else {
                                self.prox_out.write_vint(len)?;
                                self.last_payload_length = len;
                            }
                            self.prox_out.write_bytes(payload)?;
                        }
                        _ => self.prox_out.write_vint(pos_delta << 1)?,
                    }
                } else {
                    self.prox_out.write_vint(pos_delta)?;
                }
            }
        }
        Ok(())
    }

    /// Appends skip data when the list is long enough and returns the
    /// term's dictionary entry
    pub fn finish_term(&mut self) -> Result<TermInfo> {
        let mut skip_offset = 0u64;
        if self.df >= self.skip_interval {
            skip_offset = self.freq_out.position() - self.freq_start;
            self.skip_writer.write_to(self.freq_out.as_mut())?;
        }
        Ok(TermInfo {
            doc_freq: self.df,
            freq_pointer: self.freq_start,
            prox_pointer: self.prox_start,
            skip_offset,
        })
    }

    pub fn finish(&mut self) -> Result<()> {
        self.freq_out.flush()?;
        self.prox_out.flush()
    }
}
