use std::sync::Arc;

use crate::core::error::Result;
use crate::index::postings::{SegmentPostings, TermDocs};
use crate::index::segment_reader::SegmentReader;
use crate::index::term::Term;
use crate::search::scorer::{DocIdSetIterator, Scorer, ScorerContext, Weight, NO_MORE_DOCS};
use crate::search::searcher::IndexSearcher;
use crate::search::similarity::Similarity;

/// Per-searcher state of a term query
pub struct TermWeight {
    term: Term,
    boost: f32,
    idf: f32,
    query_weight: f32,
    value: f32,
    doc_freq: u32,
    similarity: Arc<dyn Similarity>,
}

impl TermWeight {
    pub fn new(searcher: &IndexSearcher, term: &Term, boost: f32) -> Result<Self> {
        let doc_freq = searcher.doc_freq(term)?;
        let similarity = searcher.similarity();
        let idf = similarity.idf(doc_freq, searcher.max_doc().max(1));
        Ok(TermWeight {
            term: term.clone(),
            boost,
            idf,
            query_weight: 0.0,
            value: 0.0,
            doc_freq,
            similarity,
        })
    }
}

impl Weight for TermWeight {
    fn sum_of_squared_weights(&mut self) -> Result<f32> {
        self.query_weight = self.idf * self.boost;
        Ok(self.query_weight * self.query_weight)
    }

    fn normalize(&mut self, norm: f32) {
        self.query_weight *= norm;
        // score(doc) = tf(freq) · idf² · boost · queryNorm · docNorm
        self.value = self.query_weight * self.idf;
    }

    fn scorer(
        &self,
        reader: &SegmentReader,
        _ctx: ScorerContext,
    ) -> Result<Option<Box<dyn Scorer>>> {
        let Some(postings) = reader.term_docs(&self.term)? else {
            return Ok(None);
        };
        let norms = reader.norms(&self.term.field);
        Ok(Some(Box::new(TermScorer::new(
            postings,
            norms,
            self.value,
            self.doc_freq,
            self.similarity.clone(),
        ))))
    }
}

const SCORE_CACHE_SIZE: usize = 32;

/// Scores one term's postings: `tf(freq) · weightValue · norm`
pub struct TermScorer {
    postings: SegmentPostings,
    norms: Option<Arc<Vec<u8>>>,
    value: f32,
    doc_freq: u32,
    similarity: Arc<dyn Similarity>,
    /// Precomputed `tf(freq) · value` for small freqs, the common case
    score_cache: [f32; SCORE_CACHE_SIZE],
    doc: u32,
}

impl TermScorer {
    pub fn new(
        postings: SegmentPostings,
        norms: Option<Arc<Vec<u8>>>,
        value: f32,
        doc_freq: u32,
        similarity: Arc<dyn Similarity>,
    ) -> Self {
        let mut score_cache = [0.0f32; SCORE_CACHE_SIZE];
        for (freq, slot) in score_cache.iter_mut().enumerate() {
            *slot = similarity.tf(freq as f32) * value;
        }
        TermScorer {
            postings,
            norms,
            value,
            doc_freq,
            similarity,
            score_cache,
            doc: 0,
        }
    }

    fn norm(&self, doc: u32) -> f32 {
        match &self.norms {
            Some(norms) => self.similarity.decode_norm_value(norms[doc as usize]),
            None => 1.0,
        }
    }
}

impl DocIdSetIterator for TermScorer {
    fn doc_id(&self) -> u32 {
        self.doc
    }

    fn next_doc(&mut self) -> Result<u32> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        self.doc = if self.postings.next()? {
            self.postings.doc()
        } else {
            NO_MORE_DOCS
        };
        Ok(self.doc)
    }

    fn advance(&mut self, target: u32) -> Result<u32> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        self.doc = if self.postings.advance(target)? {
            self.postings.doc()
        } else {
            NO_MORE_DOCS
        };
        Ok(self.doc)
    }
}

impl Scorer for TermScorer {
    fn score(&mut self) -> Result<f32> {
        let freq = self.postings.freq();
        let raw = if (freq as usize) < SCORE_CACHE_SIZE {
            self.score_cache[freq as usize]
        } else {
            self.similarity.tf(freq as f32) * self.value
        };
        Ok(raw * self.norm(self.doc))
    }

    fn freq(&self) -> u32 {
        self.postings.freq()
    }

    fn cost(&self) -> u64 {
        self.doc_freq as u64
    }
}
