use crate::core::error::Result;
use crate::index::postings::{SegmentPostings, TermDocs, TermPositions};
use crate::search::spans::Spans;

/// Spans of a single term: every occurrence is a `[position, position+1)`
/// span carrying that occurrence's payload
pub struct TermSpans {
    tp: SegmentPostings,
    doc: u32,
    freq: u32,
    count: u32,
    position: u32,
    positioned: bool,
    exhausted: bool,
}

impl TermSpans {
    pub fn new(tp: SegmentPostings) -> Self {
        TermSpans {
            tp,
            doc: 0,
            freq: 0,
            count: 0,
            position: 0,
            positioned: false,
            exhausted: false,
        }
    }

    fn settle_doc(&mut self, found: bool) -> Result<bool> {
        if !found {
            self.exhausted = true;
            return Ok(false);
        }
        self.doc = self.tp.doc();
        self.freq = self.tp.freq();
        self.count = 0;
        self.positioned = true;
        self.next_in_doc()
    }

    fn next_in_doc(&mut self) -> Result<bool> {
        if self.count >= self.freq {
            return Ok(false);
        }
        self.position = self.tp.next_position()?;
        self.count += 1;
        Ok(true)
    }
}

impl Spans for TermSpans {
    fn next(&mut self) -> Result<bool> {
        if self.exhausted {
            return Ok(false);
        }
        if self.positioned && self.next_in_doc()? {
            return Ok(true);
        }
        let found = self.tp.next()?;
        self.settle_doc(found)
    }

    fn skip_to(&mut self, target: u32) -> Result<bool> {
        if self.exhausted {
            return Ok(false);
        }
        if self.positioned && self.doc >= target {
            return Ok(true);
        }
        let found = self.tp.advance(target)?;
        self.settle_doc(found)
    }

    fn doc(&self) -> u32 {
        self.doc
    }

    fn start(&self) -> u32 {
        self.position
    }

    fn end(&self) -> u32 {
        self.position + 1
    }

    fn payload(&mut self) -> Result<Vec<Vec<u8>>> {
        Ok(self.tp.payload()?.into_iter().collect())
    }

    fn is_payload_available(&self) -> bool {
        self.tp.has_payload()
    }
}
