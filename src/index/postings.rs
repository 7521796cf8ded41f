use std::sync::Arc;

use crate::core::error::{Error, Result};
use crate::index::skip::SkipListReader;
use crate::index::term_info::TermInfo;
use crate::store::input::IndexInput;
use crate::util::bits::DeletedDocs;

/// Doc iterator over one term's postings
pub trait TermDocs: Send {
    fn doc(&self) -> u32;

    fn freq(&self) -> u32;

    /// Advances to the next undeleted doc; false when exhausted
    fn next(&mut self) -> Result<bool>;

    /// Moves to the first doc `>= target`, skipping via the skip list
    /// where possible; false when exhausted
    fn advance(&mut self, target: u32) -> Result<bool>;
}

/// Doc iterator that also walks positions and payloads
pub trait TermPositions: TermDocs {
    /// Next position of the term within the current doc; call at most
    /// `freq()` times per doc
    fn next_position(&mut self) -> Result<u32>;

    fn payload_length(&self) -> u32;

    /// True while the current position's payload has not been fetched
    fn has_payload(&self) -> bool;

    /// Payload of the current position, if one was stored
    fn payload(&mut self) -> Result<Option<Vec<u8>>>;
}

/// Postings cursor of one term inside one segment
pub struct SegmentPostings {
    freq_input: Box<dyn IndexInput>,
    prox_input: Option<Box<dyn IndexInput>>,
    deleted: Option<Arc<DeletedDocs>>,
    term_info: TermInfo,
    skip_interval: u32,
    max_skip_levels: u32,
    omit_tf: bool,
    store_payloads: bool,

    count: u32,
    started: bool,
    doc: u32,
    freq: u32,

    // prox bookkeeping: positions are consumed lazily, so entries of
    // passed docs are parsed (or leapt over via the skip list) on demand
    prox_debt: u64,
    pending_prox_seek: Option<u64>,
    position: u32,
    positions_read: u32,
    payload_length: u32,
    payload_pending: bool,

    skip_reader: Option<SkipListReader>,
}

impl SegmentPostings {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        mut freq_input: Box<dyn IndexInput>,
        prox_input: Option<Box<dyn IndexInput>>,
        deleted: Option<Arc<DeletedDocs>>,
        term_info: TermInfo,
        skip_interval: u32,
        max_skip_levels: u32,
        omit_tf: bool,
        store_payloads: bool,
    ) -> Result<Self> {
        freq_input.seek(term_info.freq_pointer)?;
        let mut prox = prox_input;
        if let Some(prox_input) = prox.as_mut() {
            prox_input.seek(term_info.prox_pointer)?;
        }
        Ok(SegmentPostings {
            freq_input,
            prox_input: prox,
            deleted,
            term_info,
            skip_interval,
            max_skip_levels,
            omit_tf,
            store_payloads,
            count: 0,
            started: false,
            doc: 0,
            freq: 1,
            prox_debt: 0,
            pending_prox_seek: None,
            position: 0,
            positions_read: 0,
            payload_length: 0,
            payload_pending: false,
            skip_reader: None,
        })
    }

    fn is_deleted(&self, doc: u32) -> bool {
        self.deleted
            .as_ref()
            .map(|d| d.is_deleted(doc))
            .unwrap_or(false)
    }

    /// Reads one raw posting; returns false at the end of the list
    fn read_one(&mut self) -> Result<bool> {
        if self.count >= self.term_info.doc_freq {
            return Ok(false);
        }
        // Positions of the doc we are leaving become debt; an unfetched
        // payload must be walked over first so the prox cursor sits on an
        // entry boundary
        self.drain_payload()?;
        if !self.omit_tf && self.started {
            self.prox_debt += (self.freq - self.positions_read) as u64;
        }
        let code = self.freq_input.read_vint()?;
        if self.omit_tf {
            self.doc += code;
            self.freq = 1;
        } else {
            self.doc += code >> 1;
            if code & 1 != 0 {
                self.freq = 1;
            } else {
                self.freq = self.freq_input.read_vint()?;
            }
        }
        self.count += 1;
        self.started = true;
        self.position = 0;
        self.positions_read = 0;
        self.payload_pending = false;
        Ok(true)
    }

    /// Works through deferred prox entries so the cursor reaches the
    /// current doc's positions
    fn settle_prox(&mut self) -> Result<()> {
        let Some(prox) = self.prox_input.as_mut() else {
            return Err(Error::invalid_argument(
                "positions were not requested for this iterator".to_string(),
            ));
        };
        if let Some(target) = self.pending_prox_seek.take() {
            prox.seek(target)?;
            self.prox_debt = 0;
            return Ok(());
        }
        while self.prox_debt > 0 {
            let code = prox.read_vint()?;
            if self.store_payloads {
                if code & 1 != 0 {
                    let len = prox.read_vint()?;
                    if len != 0 {
                        self.payload_length = len;
                    }
                    let mut scratch = vec![0u8; self.payload_length as usize];
                    prox.read_bytes(&mut scratch)?;
                }
            }
            self.prox_debt -= 1;
        }
        Ok(())
    }

    /// Discards an unconsumed payload so the cursor is at the next entry
    fn drain_payload(&mut self) -> Result<()> {
        if self.payload_pending {
            let len = self.payload_length as usize;
            if let Some(prox) = self.prox_input.as_mut() {
                let mut scratch = vec![0u8; len];
                prox.read_bytes(&mut scratch)?;
            }
            self.payload_pending = false;
        }
        Ok(())
    }
}

impl TermDocs for SegmentPostings {
    fn doc(&self) -> u32 {
        self.doc
    }

    fn freq(&self) -> u32 {
        self.freq
    }

    fn next(&mut self) -> Result<bool> {
        loop {
            if !self.read_one()? {
                return Ok(false);
            }
            if !self.is_deleted(self.doc) {
                return Ok(true);
            }
        }
    }

    fn advance(&mut self, target: u32) -> Result<bool> {
        if self.started && self.doc >= target {
            return Ok(true);
        }
        // Descend the skip structure only when it can beat linear scanning
        if self.term_info.doc_freq >= self.skip_interval && target > self.doc {
            if self.skip_reader.is_none() {
                let mut input = self.freq_input.clone_input();
                input.seek(self.term_info.freq_pointer + self.term_info.skip_offset)?;
                self.skip_reader = Some(SkipListReader::open(
                    input,
                    self.term_info.doc_freq,
                    self.skip_interval,
                    self.max_skip_levels,
                    self.store_payloads,
                    self.term_info.freq_pointer,
                    self.term_info.prox_pointer,
                )?);
            }
            let skip = self.skip_reader.as_mut().unwrap();
            skip.skip_to(target)?;
            if skip.num_skipped() > self.count {
                self.freq_input.seek(skip.freq_pointer())?;
                self.doc = skip.doc();
                self.count = skip.num_skipped();
                self.started = true;
                self.positions_read = 0;
                self.freq = 0;
                if !self.omit_tf {
                    self.pending_prox_seek = Some(skip.prox_pointer());
                    self.prox_debt = 0;
                    self.payload_length = skip.payload_length();
                    self.payload_pending = false;
                }
            }
        }
        loop {
            if !self.read_one()? {
                return Ok(false);
            }
            if self.doc >= target && !self.is_deleted(self.doc) {
                return Ok(true);
            }
            if self.doc >= target {
                // Deleted landing doc; fall through to the next live one
                return self.next();
            }
        }
    }
}

impl TermPositions for SegmentPostings {
    fn next_position(&mut self) -> Result<u32> {
        self.drain_payload()?;
        self.settle_prox()?;
        let prox = self.prox_input.as_mut().unwrap();
        let code = prox.read_vint()?;
        if self.store_payloads {
            self.position += code >> 1;
            if code & 1 != 0 {
                let len = prox.read_vint()?;
                if len != 0 {
                    self.payload_length = len;
                }
                self.payload_pending = true;
            }
        } else {
            self.position += code;
        }
        self.positions_read += 1;
        Ok(self.position)
    }

    fn payload_length(&self) -> u32 {
        self.payload_length
    }

    fn has_payload(&self) -> bool {
        self.payload_pending
    }

    fn payload(&mut self) -> Result<Option<Vec<u8>>> {
        if !self.payload_pending {
            return Ok(None);
        }
        let len = self.payload_length as usize;
        let prox = self.prox_input.as_mut().unwrap();
        let mut bytes = vec![0u8; len];
        prox.read_bytes(&mut bytes)?;
        self.payload_pending = false;
        Ok(Some(bytes))
    }
}
