use std::sync::Arc;

use crate::core::error::Result;
use crate::index::segment_reader::SegmentReader;
use crate::index::term::Term;
use crate::search::scorer::{DocIdSetIterator, Scorer, ScorerContext, Weight, NO_MORE_DOCS};
use crate::search::searcher::IndexSearcher;
use crate::search::similarity::Similarity;
use crate::search::spans::{Spans, TermSpans};

/// Combines per-occurrence payload scores into one doc score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadFunction {
    Max,
    Min,
    Average,
}

impl PayloadFunction {
    pub fn fold(self, current: f32, count: u32, score: f32) -> f32 {
        match self {
            PayloadFunction::Max => {
                if count == 0 {
                    score
                } else {
                    current.max(score)
                }
            }
            PayloadFunction::Min => {
                if count == 0 {
                    score
                } else {
                    current.min(score)
                }
            }
            PayloadFunction::Average => current + score,
        }
    }

    pub fn doc_score(self, count: u32, current: f32) -> f32 {
        if count == 0 {
            return 1.0;
        }
        match self {
            PayloadFunction::Average => current / count as f32,
            _ => current,
        }
    }
}

/// Term query whose score folds in the payloads of the matched
/// occurrences
///
/// With `include_span_score` unset, the doc score is exactly the payload
/// function's result, which makes payload values directly observable.
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadTermQuery {
    pub term: Term,
    pub function: PayloadFunction,
    pub include_span_score: bool,
    pub boost: f32,
}

impl PayloadTermQuery {
    pub fn new(term: Term, function: PayloadFunction, include_span_score: bool) -> Self {
        PayloadTermQuery {
            term,
            function,
            include_span_score,
            boost: 1.0,
        }
    }
}

pub struct PayloadTermWeight {
    query: PayloadTermQuery,
    idf: f32,
    query_weight: f32,
    value: f32,
    similarity: Arc<dyn Similarity>,
}

impl PayloadTermWeight {
    pub fn new(searcher: &IndexSearcher, query: &PayloadTermQuery) -> Result<Self> {
        let similarity = searcher.similarity();
        let idf = similarity.idf(searcher.doc_freq(&query.term)?, searcher.max_doc().max(1));
        Ok(PayloadTermWeight {
            query: query.clone(),
            idf,
            query_weight: 0.0,
            value: 0.0,
            similarity,
        })
    }
}

impl Weight for PayloadTermWeight {
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
        let Some(tp) = reader.term_positions(&self.query.term)? else {
            return Ok(None);
        };
        let norms = reader.norms(&self.query.term.field);
        Ok(Some(Box::new(PayloadTermScorer {
            spans: TermSpans::new(tp),
            field: self.query.term.field.clone(),
            function: self.query.function,
            include_span_score: self.query.include_span_score,
            norms,
            value: self.value,
            similarity: self.similarity.clone(),
            doc: 0,
            freq: 0.0,
            payload_score: 0.0,
            payload_count: 0,
            more: true,
            first_time: true,
        })))
    }
}

/// Span scorer over one term that folds payloads as it walks positions
pub struct PayloadTermScorer {
    spans: TermSpans,
    field: String,
    function: PayloadFunction,
    include_span_score: bool,
    norms: Option<Arc<Vec<u8>>>,
    value: f32,
    similarity: Arc<dyn Similarity>,
    doc: u32,
    freq: f32,
    payload_score: f32,
    payload_count: u32,
    more: bool,
    first_time: bool,
}

impl PayloadTermScorer {
    fn settle_doc(&mut self) -> Result<u32> {
        if !self.more {
            self.doc = NO_MORE_DOCS;
            return Ok(NO_MORE_DOCS);
        }
        self.doc = self.spans.doc();
        self.freq = 0.0;
        self.payload_score = 0.0;
        self.payload_count = 0;
        loop {
            let match_length = self.spans.end() - self.spans.start();
            self.freq += self.similarity.sloppy_freq(match_length);
            if self.spans.is_payload_available() {
                for payload in self.spans.payload()? {
                    let score = self.similarity.score_payload(&self.field, &payload);
                    self.payload_score =
                        self.function
                            .fold(self.payload_score, self.payload_count, score);
                    self.payload_count += 1;
                }
            }
            self.more = self.spans.next()?;
            if !self.more || self.spans.doc() != self.doc {
                break;
            }
        }
        Ok(self.doc)
    }

    fn norm(&self, doc: u32) -> f32 {
        match &self.norms {
            Some(norms) => self.similarity.decode_norm_value(norms[doc as usize]),
            None => 1.0,
        }
    }
}

impl DocIdSetIterator for PayloadTermScorer {
    fn doc_id(&self) -> u32 {
        self.doc
    }

    fn next_doc(&mut self) -> Result<u32> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        if self.first_time {
            self.first_time = false;
            self.more = self.spans.next()?;
        }
        self.settle_doc()
    }

    fn advance(&mut self, target: u32) -> Result<u32> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        if self.first_time {
            self.first_time = false;
            self.more = self.spans.skip_to(target)?;
            return self.settle_doc();
        }
        if self.doc >= target {
            return Ok(self.doc);
        }
        if self.more && self.spans.doc() < target {
            self.more = self.spans.skip_to(target)?;
        }
        self.settle_doc()
    }
}

impl Scorer for PayloadTermScorer {
    fn score(&mut self) -> Result<f32> {
        let payload_part = self.function.doc_score(self.payload_count, self.payload_score);
        if self.include_span_score {
            let span_part = self.similarity.tf(self.freq) * self.value * self.norm(self.doc);
            Ok(span_part * payload_part)
        } else {
            Ok(payload_part)
        }
    }

    fn freq(&self) -> u32 {
        self.freq as u32
    }
}
