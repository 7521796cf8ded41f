use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;

use crate::core::error::Result;
use crate::index::postings::{SegmentPostings, TermDocs, TermPositions};
use crate::index::segment_reader::SegmentReader;
use crate::index::term::Term;
use crate::search::query::PhraseQuery;
use crate::search::scorer::{DocIdSetIterator, Scorer, ScorerContext, Weight, NO_MORE_DOCS};
use crate::search::searcher::IndexSearcher;
use crate::search::similarity::Similarity;

/// Weight of a phrase query; idf sums over all phrase terms
pub struct PhraseWeight {
    query: PhraseQuery,
    idf: f32,
    query_weight: f32,
    value: f32,
    min_doc_freq: u32,
    similarity: Arc<dyn Similarity>,
}

impl PhraseWeight {
    pub fn new(searcher: &IndexSearcher, query: &PhraseQuery) -> Result<Self> {
        let similarity = searcher.similarity();
        let max_doc = searcher.max_doc().max(1);
        let mut idf = 0.0;
        let mut min_doc_freq = u32::MAX;
        for text in &query.terms {
            let df = searcher.doc_freq(&Term::new(query.field.clone(), text.clone()))?;
            min_doc_freq = min_doc_freq.min(df);
            idf += similarity.idf(df, max_doc);
        }
        Ok(PhraseWeight {
            query: query.clone(),
            idf,
            query_weight: 0.0,
            value: 0.0,
            min_doc_freq,
            similarity,
        })
    }
}

impl Weight for PhraseWeight {
    fn sum_of_squared_weights(&mut self) -> Result<f32> {
        self.query_weight = self.idf * self.query.boost;
        Ok(self.query_weight * self.query_weight)
    }

    fn normalize(&mut self, norm: f32) {
        self.query_weight *= norm;
        self.value = self.query_weight * self.idf;
    }

    fn scorer(
        &self,
        reader: &SegmentReader,
        _ctx: ScorerContext,
    ) -> Result<Option<Box<dyn Scorer>>> {
        let mut postings = Vec::with_capacity(self.query.terms.len());
        for (text, &offset) in self.query.terms.iter().zip(&self.query.positions) {
            let term = Term::new(self.query.field.clone(), text.clone());
            let Some(tp) = reader.term_positions(&term)? else {
                return Ok(None);
            };
            postings.push(PhrasePositions {
                tp,
                offset,
                position: 0,
                remaining: 0,
            });
        }
        if postings.is_empty() {
            return Ok(None);
        }
        let norms = reader.norms(&self.query.field);
        Ok(Some(Box::new(PhraseScorer {
            postings,
            slop: self.query.slop,
            norms,
            value: self.value,
            min_doc_freq: self.min_doc_freq,
            similarity: self.similarity.clone(),
            doc: 0,
            freq: 0.0,
            positioned: false,
        })))
    }
}

struct PhrasePositions {
    tp: SegmentPostings,
    /// The term's position inside the phrase; matching compares
    /// occurrence positions shifted back by this
    offset: u32,
    position: i64,
    remaining: u32,
}

impl PhrasePositions {
    fn first_position(&mut self) -> Result<()> {
        self.remaining = self.tp.freq();
        self.next_position()?;
        Ok(())
    }

    /// False once the current doc's positions are exhausted
    fn next_position(&mut self) -> Result<bool> {
        if self.remaining == 0 {
            return Ok(false);
        }
        self.remaining -= 1;
        self.position = self.tp.next_position()? as i64 - self.offset as i64;
        Ok(true)
    }
}

/// Doc-aligned phrase matcher; exact when `slop == 0`
pub struct PhraseScorer {
    postings: Vec<PhrasePositions>,
    slop: u32,
    norms: Option<Arc<Vec<u8>>>,
    value: f32,
    min_doc_freq: u32,
    similarity: Arc<dyn Similarity>,
    doc: u32,
    freq: f32,
    positioned: bool,
}

impl PhraseScorer {
    /// Leapfrogs all term iterators onto one shared doc `>= target`
    fn align(&mut self, mut target: u32) -> Result<bool> {
        if !self.positioned {
            for pp in self.postings.iter_mut() {
                if !pp.tp.next()? {
                    return Ok(false);
                }
            }
            self.positioned = true;
            let first_max = self
                .postings
                .iter()
                .map(|pp| pp.tp.doc())
                .max()
                .unwrap_or(0);
            target = target.max(first_max);
        }
        loop {
            let mut all_equal = true;
            for pp in self.postings.iter_mut() {
                if pp.tp.doc() < target {
                    if !pp.tp.advance(target)? {
                        return Ok(false);
                    }
                }
                if pp.tp.doc() > target {
                    target = pp.tp.doc();
                    all_equal = false;
                }
            }
            if all_equal {
                self.doc = target;
                return Ok(true);
            }
        }
    }

    fn exact_freq(&mut self) -> Result<f32> {
        for pp in self.postings.iter_mut() {
            pp.first_position()?;
        }
        let mut freq = 0u32;
        'matching: loop {
            let max = self.postings.iter().map(|pp| pp.position).max().unwrap();
            // Everyone catches up to the laggard's target
            for i in 0..self.postings.len() {
                while self.postings[i].position < max {
                    if !self.postings[i].next_position()? {
                        break 'matching;
                    }
                }
            }
            let min = self.postings.iter().map(|pp| pp.position).min().unwrap();
            let new_max = self.postings.iter().map(|pp| pp.position).max().unwrap();
            if min == new_max {
                freq += 1;
                if !self.postings[0].next_position()? {
                    break;
                }
            }
        }
        Ok(freq as f32)
    }

    /// Accumulates `sloppy_freq` over alignments within the slop budget
    fn sloppy_freq(&mut self) -> Result<f32> {
        let mut end = i64::MIN;
        let mut heap: BinaryHeap<Reverse<(i64, usize)>> = BinaryHeap::new();
        for (i, pp) in self.postings.iter_mut().enumerate() {
            pp.first_position()?;
            end = end.max(pp.position);
            heap.push(Reverse((pp.position, i)));
        }
        let mut freq = 0.0f32;
        let mut done = false;
        while !done {
            let Reverse((_, idx)) = heap.pop().unwrap();
            let mut start = self.postings[idx].position;
            let next = heap
                .peek()
                .map(|Reverse((p, _))| *p)
                .unwrap_or(i64::MAX);
            // Slide this term as close to the runner-up as possible
            loop {
                if !self.postings[idx].next_position()? {
                    done = true;
                    break;
                }
                if self.postings[idx].position <= next {
                    start = self.postings[idx].position;
                } else {
                    break;
                }
            }
            let match_length = end - start;
            if match_length >= 0 && match_length <= self.slop as i64 {
                freq += self.similarity.sloppy_freq(match_length as u32);
            }
            if self.postings[idx].position > end {
                end = self.postings[idx].position;
            }
            heap.push(Reverse((self.postings[idx].position, idx)));
        }
        Ok(freq)
    }

    fn phrase_freq(&mut self) -> Result<f32> {
        if self.slop == 0 {
            self.exact_freq()
        } else {
            self.sloppy_freq()
        }
    }

    fn norm(&self, doc: u32) -> f32 {
        match &self.norms {
            Some(norms) => self.similarity.decode_norm_value(norms[doc as usize]),
            None => 1.0,
        }
    }

    fn search(&mut self, mut target: Option<u32>) -> Result<u32> {
        loop {
            let aligned = match target.take() {
                Some(t) => self.align(t)?,
                None => {
                    if self.positioned {
                        // Move past the current doc through the leader
                        if !self.postings[0].tp.next()? {
                            self.doc = NO_MORE_DOCS;
                            return Ok(NO_MORE_DOCS);
                        }
                        let t = self.postings[0].tp.doc();
                        self.align(t)?
                    } else {
                        self.align(0)?
                    }
                }
            };
            if !aligned {
                self.doc = NO_MORE_DOCS;
                return Ok(NO_MORE_DOCS);
            }
            self.freq = self.phrase_freq()?;
            if self.freq > 0.0 {
                return Ok(self.doc);
            }
            target = None;
        }
    }
}

impl DocIdSetIterator for PhraseScorer {
    fn doc_id(&self) -> u32 {
        self.doc
    }

    fn next_doc(&mut self) -> Result<u32> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        self.search(None)
    }

    fn advance(&mut self, target: u32) -> Result<u32> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        if self.positioned && self.doc >= target {
            return Ok(self.doc);
        }
        self.search(Some(target))
    }
}

impl Scorer for PhraseScorer {
    fn score(&mut self) -> Result<f32> {
        Ok(self.similarity.tf(self.freq) * self.value * self.norm(self.doc))
    }

    fn freq(&self) -> u32 {
        self.freq as u32
    }

    fn cost(&self) -> u64 {
        self.min_doc_freq as u64
    }
}
