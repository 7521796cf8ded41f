use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::error::{Error, Result};
use crate::index::field::Document;
use crate::index::postings::{TermDocs, TermPositions};
use crate::index::segment_reader::SegmentReader;
use crate::index::term::Term;
use crate::index::term_dict::TermEnum;

/// Ordered term cursor, abstracted over one segment or many
pub trait TermIterator: Send {
    fn next(&mut self) -> Result<bool>;

    fn term(&self) -> Option<&Term>;

    /// Doc freq of the current term, summed across composed segments
    fn doc_freq(&self) -> u32;
}

impl TermIterator for TermEnum {
    fn next(&mut self) -> Result<bool> {
        TermEnum::next(self)
    }

    fn term(&self) -> Option<&Term> {
        TermEnum::term(self)
    }

    fn doc_freq(&self) -> u32 {
        TermEnum::doc_freq(self)
    }
}

/// One logical reader over every committed segment
///
/// Doc ids are the segment-local ids shifted by the per-segment base, in
/// segment order; term enumeration is an ordered multiway merge.
pub trait IndexReader: Send + Sync {
    fn max_doc(&self) -> u32;

    fn num_docs(&self) -> u32;

    fn doc_freq(&self, term: &Term) -> Result<u32>;

    fn term_docs(&self, term: &Term) -> Result<Option<Box<dyn TermDocs>>>;

    fn term_positions(&self, term: &Term) -> Result<Option<Box<dyn TermPositions>>>;

    fn terms(&self) -> Result<Box<dyn TermIterator>>;

    fn terms_from(&self, target: &Term) -> Result<Box<dyn TermIterator>>;

    fn norms(&self, field: &str) -> Result<Option<Arc<Vec<u8>>>>;

    fn document(&self, doc: u32) -> Result<Document>;

    fn is_deleted(&self, doc: u32) -> bool;

    fn has_deletions(&self) -> bool;

    /// The underlying segments with their doc-id bases
    fn leaves(&self) -> Vec<(&SegmentReader, u32)>;
}

impl IndexReader for SegmentReader {
    fn max_doc(&self) -> u32 {
        SegmentReader::max_doc(self)
    }

    fn num_docs(&self) -> u32 {
        SegmentReader::num_docs(self)
    }

    fn doc_freq(&self, term: &Term) -> Result<u32> {
        SegmentReader::doc_freq(self, term)
    }

    fn term_docs(&self, term: &Term) -> Result<Option<Box<dyn TermDocs>>> {
        Ok(SegmentReader::term_docs(self, term)?
            .map(|p| Box::new(p) as Box<dyn TermDocs>))
    }

    fn term_positions(&self, term: &Term) -> Result<Option<Box<dyn TermPositions>>> {
        Ok(SegmentReader::term_positions(self, term)?
            .map(|p| Box::new(p) as Box<dyn TermPositions>))
    }

    fn terms(&self) -> Result<Box<dyn TermIterator>> {
        Ok(Box::new(SegmentReader::terms(self)?))
    }

    fn terms_from(&self, target: &Term) -> Result<Box<dyn TermIterator>> {
        Ok(Box::new(SegmentReader::terms_from(self, target)?))
    }

    fn norms(&self, field: &str) -> Result<Option<Arc<Vec<u8>>>> {
        Ok(SegmentReader::norms(self, field))
    }

    fn document(&self, doc: u32) -> Result<Document> {
        SegmentReader::document(self, doc)
    }

    fn is_deleted(&self, doc: u32) -> bool {
        SegmentReader::is_deleted(self, doc)
    }

    fn has_deletions(&self) -> bool {
        SegmentReader::has_deletions(self)
    }

    fn leaves(&self) -> Vec<(&SegmentReader, u32)> {
        vec![(self, 0)]
    }
}

/// Composes N segment readers behind doc-id base offsets
pub struct MultiReader {
    readers: Vec<SegmentReader>,
    /// Base of each segment plus a trailing total
    starts: Vec<u32>,
    norms_cache: Mutex<HashMap<String, Option<Arc<Vec<u8>>>>>,
}

impl MultiReader {
    pub fn new(readers: Vec<SegmentReader>) -> Self {
        let mut starts = Vec::with_capacity(readers.len() + 1);
        let mut base = 0u32;
        for reader in &readers {
            starts.push(base);
            base += reader.max_doc();
        }
        starts.push(base);
        MultiReader {
            readers,
            starts,
            norms_cache: Mutex::new(HashMap::new()),
        }
    }

    fn reader_for(&self, doc: u32) -> Result<(usize, u32)> {
        if doc >= *self.starts.last().unwrap() {
            return Err(Error::invalid_argument(format!(
                "doc {} out of range ({} docs)",
                doc,
                self.starts.last().unwrap()
            )));
        }
        let idx = match self.starts.binary_search(&doc) {
            Ok(exact) => exact,
            Err(ins) => ins - 1,
        };
        // Empty segments share a base with their successor; find the
        // segment that actually covers the doc
        let mut idx = idx.min(self.readers.len() - 1);
        while doc >= self.starts[idx + 1] {
            idx += 1;
        }
        Ok((idx, doc - self.starts[idx]))
    }
}

impl IndexReader for MultiReader {
    fn max_doc(&self) -> u32 {
        *self.starts.last().unwrap()
    }

    fn num_docs(&self) -> u32 {
        self.readers.iter().map(|r| r.num_docs()).sum()
    }

    fn doc_freq(&self, term: &Term) -> Result<u32> {
        let mut total = 0;
        for reader in &self.readers {
            total += reader.doc_freq(term)?;
        }
        Ok(total)
    }

    fn term_docs(&self, term: &Term) -> Result<Option<Box<dyn TermDocs>>> {
        let mut subs = Vec::new();
        for (i, reader) in self.readers.iter().enumerate() {
            if let Some(postings) = reader.term_docs(term)? {
                subs.push(SubDocs {
                    base: self.starts[i],
                    end: self.starts[i + 1],
                    docs: Box::new(postings) as Box<dyn TermDocs>,
                });
            }
        }
        if subs.is_empty() {
            return Ok(None);
        }
        Ok(Some(Box::new(MultiTermDocs::new(subs))))
    }

    fn term_positions(&self, term: &Term) -> Result<Option<Box<dyn TermPositions>>> {
        let mut subs = Vec::new();
        for (i, reader) in self.readers.iter().enumerate() {
            if let Some(postings) = reader.term_positions(term)? {
                subs.push(SubPositions {
                    base: self.starts[i],
                    end: self.starts[i + 1],
                    positions: Box::new(postings) as Box<dyn TermPositions>,
                });
            }
        }
        if subs.is_empty() {
            return Ok(None);
        }
        Ok(Some(Box::new(MultiTermPositions::new(subs))))
    }

    fn terms(&self) -> Result<Box<dyn TermIterator>> {
        let mut cursors = Vec::new();
        for reader in &self.readers {
            cursors.push(Box::new(reader.terms()?) as Box<dyn TermIterator>);
        }
        Ok(Box::new(MergedTermIterator::new(cursors)?))
    }

    fn terms_from(&self, target: &Term) -> Result<Box<dyn TermIterator>> {
        let mut cursors = Vec::new();
        for reader in &self.readers {
            cursors.push(Box::new(reader.terms_from(target)?) as Box<dyn TermIterator>);
        }
        Ok(Box::new(MergedTermIterator::new_positioned(cursors)?))
    }

    fn norms(&self, field: &str) -> Result<Option<Arc<Vec<u8>>>> {
        if let Some(cached) = self.norms_cache.lock().get(field) {
            return Ok(cached.clone());
        }
        let mut any = false;
        let mut bytes = Vec::with_capacity(self.max_doc() as usize);
        for reader in &self.readers {
            match reader.norms(field) {
                Some(segment_norms) => {
                    any = true;
                    bytes.extend_from_slice(&segment_norms);
                }
                None => bytes.extend(std::iter::repeat_n(0u8, reader.max_doc() as usize)),
            }
        }
        let result = if any { Some(Arc::new(bytes)) } else { None };
        self.norms_cache
            .lock()
            .insert(field.to_string(), result.clone());
        Ok(result)
    }

    fn document(&self, doc: u32) -> Result<Document> {
        let (idx, local) = self.reader_for(doc)?;
        self.readers[idx].document(local)
    }

    fn is_deleted(&self, doc: u32) -> bool {
        match self.reader_for(doc) {
            Ok((idx, local)) => self.readers[idx].is_deleted(local),
            Err(_) => false,
        }
    }

    fn has_deletions(&self) -> bool {
        self.readers.iter().any(|r| r.has_deletions())
    }

    fn leaves(&self) -> Vec<(&SegmentReader, u32)> {
        self.readers
            .iter()
            .enumerate()
            .map(|(i, r)| (r, self.starts[i]))
            .collect()
    }
}

struct SubDocs {
    base: u32,
    end: u32,
    docs: Box<dyn TermDocs>,
}

/// Chains per-segment doc iterators into one ascending stream
pub struct MultiTermDocs {
    subs: Vec<SubDocs>,
    idx: usize,
    doc: u32,
    freq: u32,
    exhausted: bool,
}

impl MultiTermDocs {
    fn new(subs: Vec<SubDocs>) -> Self {
        MultiTermDocs {
            subs,
            idx: 0,
            doc: 0,
            freq: 1,
            exhausted: false,
        }
    }
}

impl TermDocs for MultiTermDocs {
    fn doc(&self) -> u32 {
        self.doc
    }

    fn freq(&self) -> u32 {
        self.freq
    }

    fn next(&mut self) -> Result<bool> {
        while self.idx < self.subs.len() {
            let sub = &mut self.subs[self.idx];
            if sub.docs.next()? {
                self.doc = sub.base + sub.docs.doc();
                self.freq = sub.docs.freq();
                return Ok(true);
            }
            self.idx += 1;
        }
        self.exhausted = true;
        Ok(false)
    }

    fn advance(&mut self, target: u32) -> Result<bool> {
        while self.idx < self.subs.len() {
            let sub = &mut self.subs[self.idx];
            if target < sub.end {
                let local_target = target.saturating_sub(sub.base);
                if sub.docs.advance(local_target)? {
                    self.doc = sub.base + sub.docs.doc();
                    self.freq = sub.docs.freq();
                    return Ok(true);
                }
            }
            self.idx += 1;
        }
        self.exhausted = true;
        Ok(false)
    }
}

struct SubPositions {
    base: u32,
    end: u32,
    positions: Box<dyn TermPositions>,
}

/// Position-aware variant of `MultiTermDocs`
pub struct MultiTermPositions {
    subs: Vec<SubPositions>,
    idx: usize,
    doc: u32,
    freq: u32,
}

impl MultiTermPositions {
    fn new(subs: Vec<SubPositions>) -> Self {
        MultiTermPositions {
            subs,
            idx: 0,
            doc: 0,
            freq: 1,
        }
    }
}

impl TermDocs for MultiTermPositions {
    fn doc(&self) -> u32 {
        self.doc
    }

    fn freq(&self) -> u32 {
        self.freq
    }

    fn next(&mut self) -> Result<bool> {
        while self.idx < self.subs.len() {
            let sub = &mut self.subs[self.idx];
            if sub.positions.next()? {
                self.doc = sub.base + sub.positions.doc();
                self.freq = sub.positions.freq();
                return Ok(true);
            }
            self.idx += 1;
        }
        Ok(false)
    }

    fn advance(&mut self, target: u32) -> Result<bool> {
        while self.idx < self.subs.len() {
            let sub = &mut self.subs[self.idx];
            if target < sub.end {
                let local_target = target.saturating_sub(sub.base);
                if sub.positions.advance(local_target)? {
                    self.doc = sub.base + sub.positions.doc();
                    self.freq = sub.positions.freq();
                    return Ok(true);
                }
            }
            self.idx += 1;
        }
        Ok(false)
    }
}

impl TermPositions for MultiTermPositions {
    fn next_position(&mut self) -> Result<u32> {
        self.subs[self.idx].positions.next_position()
    }

    fn payload_length(&self) -> u32 {
        self.subs[self.idx].positions.payload_length()
    }

    fn has_payload(&self) -> bool {
        self.subs[self.idx].positions.has_payload()
    }

    fn payload(&mut self) -> Result<Option<Vec<u8>>> {
        self.subs[self.idx].positions.payload()
    }
}

/// Ordered multiway merge of per-segment term cursors
pub struct MergedTermIterator {
    cursors: Vec<Box<dyn TermIterator>>,
    /// Cursors currently positioned on a term
    active: Vec<bool>,
    current: Option<Term>,
    current_df: u32,
}

impl MergedTermIterator {
    /// From cursors positioned before their first term
    fn new(mut cursors: Vec<Box<dyn TermIterator>>) -> Result<Self> {
        let mut active = Vec::with_capacity(cursors.len());
        for cursor in cursors.iter_mut() {
            active.push(cursor.next()?);
        }
        Ok(MergedTermIterator {
            cursors,
            active,
            current: None,
            current_df: 0,
        })
    }

    /// From cursors already sitting on their first term (seeked); the
    /// merged cursor is then positioned too
    fn new_positioned(cursors: Vec<Box<dyn TermIterator>>) -> Result<Self> {
        let active = cursors.iter().map(|c| c.term().is_some()).collect();
        let mut merged = MergedTermIterator {
            cursors,
            active,
            current: None,
            current_df: 0,
        };
        merged.settle();
        Ok(merged)
    }

    /// Points `current` at the smallest term under any active cursor
    fn settle(&mut self) {
        let mut min: Option<Term> = None;
        for (i, cursor) in self.cursors.iter().enumerate() {
            if !self.active[i] {
                continue;
            }
            if let Some(term) = cursor.term() {
                if min.as_ref().map(|m| term < m).unwrap_or(true) {
                    min = Some(term.clone());
                }
            }
        }
        self.current_df = match &min {
            Some(term) => self
                .cursors
                .iter()
                .enumerate()
                .filter(|(i, c)| self.active[*i] && c.term() == Some(term))
                .map(|(_, c)| c.doc_freq())
                .sum(),
            None => 0,
        };
        self.current = min;
    }
}

impl TermIterator for MergedTermIterator {
    fn next(&mut self) -> Result<bool> {
        // Drop cursors still parked on the term just returned
        if let Some(current) = self.current.take() {
            for (i, cursor) in self.cursors.iter_mut().enumerate() {
                if self.active[i] && cursor.term() == Some(&current) {
                    self.active[i] = cursor.next()?;
                }
            }
        }
        self.settle();
        Ok(self.current.is_some())
    }

    fn term(&self) -> Option<&Term> {
        self.current.as_ref()
    }

    fn doc_freq(&self) -> u32 {
        self.current_df
    }
}
