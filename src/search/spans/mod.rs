pub mod near_ordered;
pub mod near_unordered;
pub mod or_spans;
pub mod term_spans;

use std::collections::HashSet;
use std::sync::Arc;

use crate::core::error::Result;
use crate::index::multi_reader::IndexReader;
use crate::index::segment_reader::SegmentReader;
use crate::index::term::Term;
use crate::search::multi_term::MultiTermQuery;
use crate::search::rewrite;
use crate::search::scorer::{DocIdSetIterator, Scorer, ScorerContext, Weight, NO_MORE_DOCS};
use crate::search::searcher::IndexSearcher;
use crate::search::similarity::Similarity;

pub use near_ordered::NearSpansOrdered;
pub use near_unordered::NearSpansUnordered;
pub use or_spans::{SpanNotSpans, SpanOrSpans};
pub use term_spans::TermSpans;

/// Iterator over `(doc, start, end)` position ranges
///
/// `next` moves to the next span in (doc, start, end) order; `skip_to`
/// jumps to the first span of a doc `>= target`.
pub trait Spans: Send {
    fn next(&mut self) -> Result<bool>;

    fn skip_to(&mut self, target: u32) -> Result<bool>;

    fn doc(&self) -> u32;

    fn start(&self) -> u32;

    /// Exclusive end position
    fn end(&self) -> u32;

    fn payload(&mut self) -> Result<Vec<Vec<u8>>>;

    fn is_payload_available(&self) -> bool;
}

/// Spans over nothing, used when a term is absent from a segment
pub struct EmptySpans;

impl Spans for EmptySpans {
    fn next(&mut self) -> Result<bool> {
        Ok(false)
    }
    fn skip_to(&mut self, _target: u32) -> Result<bool> {
        Ok(false)
    }
    fn doc(&self) -> u32 {
        NO_MORE_DOCS
    }
    fn start(&self) -> u32 {
        0
    }
    fn end(&self) -> u32 {
        0
    }
    fn payload(&mut self) -> Result<Vec<Vec<u8>>> {
        Ok(Vec::new())
    }
    fn is_payload_available(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpanTermQuery {
    pub term: Term,
    pub boost: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpanNearQuery {
    pub clauses: Vec<SpanQuery>,
    pub slop: u32,
    pub in_order: bool,
    pub boost: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpanOrQuery {
    pub clauses: Vec<SpanQuery>,
    pub boost: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpanNotQuery {
    pub include: Box<SpanQuery>,
    pub exclude: Box<SpanQuery>,
    pub boost: f32,
}

/// Matches spans fully inside `[0, end)`
#[derive(Debug, Clone, PartialEq)]
pub struct SpanFirstQuery {
    pub inner: Box<SpanQuery>,
    pub end: u32,
    pub boost: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpanPositionRangeQuery {
    pub inner: Box<SpanQuery>,
    pub start: u32,
    pub end: u32,
    pub boost: f32,
}

/// Matches spans whose collected payloads byte-equal the reference list
#[derive(Debug, Clone, PartialEq)]
pub struct SpanPayloadCheckQuery {
    pub inner: Box<SpanQuery>,
    pub payloads: Vec<Vec<u8>>,
    pub boost: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpanMultiTermQuery {
    pub inner: MultiTermQuery,
    pub boost: f32,
}

/// Position-aware query algebra
#[derive(Debug, Clone, PartialEq)]
pub enum SpanQuery {
    Term(SpanTermQuery),
    Near(SpanNearQuery),
    Or(SpanOrQuery),
    Not(SpanNotQuery),
    First(SpanFirstQuery),
    PositionRange(SpanPositionRangeQuery),
    PayloadCheck(SpanPayloadCheckQuery),
    MultiTerm(SpanMultiTermQuery),
}

impl SpanQuery {
    pub fn span_term(field: impl Into<String>, text: impl Into<String>) -> SpanQuery {
        SpanQuery::Term(SpanTermQuery {
            term: Term::new(field, text),
            boost: 1.0,
        })
    }

    pub fn boost(&self) -> f32 {
        match self {
            SpanQuery::Term(q) => q.boost,
            SpanQuery::Near(q) => q.boost,
            SpanQuery::Or(q) => q.boost,
            SpanQuery::Not(q) => q.boost,
            SpanQuery::First(q) => q.boost,
            SpanQuery::PositionRange(q) => q.boost,
            SpanQuery::PayloadCheck(q) => q.boost,
            SpanQuery::MultiTerm(q) => q.boost,
        }
    }

    pub fn set_boost(&mut self, boost: f32) {
        match self {
            SpanQuery::Term(q) => q.boost = boost,
            SpanQuery::Near(q) => q.boost = boost,
            SpanQuery::Or(q) => q.boost = boost,
            SpanQuery::Not(q) => q.boost = boost,
            SpanQuery::First(q) => q.boost = boost,
            SpanQuery::PositionRange(q) => q.boost = boost,
            SpanQuery::PayloadCheck(q) => q.boost = boost,
            SpanQuery::MultiTerm(q) => q.boost = boost,
        }
    }

    /// The single field a span query operates on
    pub fn field(&self) -> Option<String> {
        match self {
            SpanQuery::Term(q) => Some(q.term.field.clone()),
            SpanQuery::Near(q) => q.clauses.first().and_then(|c| c.field()),
            SpanQuery::Or(q) => q.clauses.first().and_then(|c| c.field()),
            SpanQuery::Not(q) => q.include.field(),
            SpanQuery::First(q) => q.inner.field(),
            SpanQuery::PositionRange(q) => q.inner.field(),
            SpanQuery::PayloadCheck(q) => q.inner.field(),
            SpanQuery::MultiTerm(q) => Some(q.inner.field.clone()),
        }
    }

    pub fn extract_terms(&self, out: &mut HashSet<Term>) {
        match self {
            SpanQuery::Term(q) => {
                out.insert(q.term.clone());
            }
            SpanQuery::Near(q) => {
                for clause in &q.clauses {
                    clause.extract_terms(out);
                }
            }
            SpanQuery::Or(q) => {
                for clause in &q.clauses {
                    clause.extract_terms(out);
                }
            }
            SpanQuery::Not(q) => q.include.extract_terms(out),
            SpanQuery::First(q) => q.inner.extract_terms(out),
            SpanQuery::PositionRange(q) => q.inner.extract_terms(out),
            SpanQuery::PayloadCheck(q) => q.inner.extract_terms(out),
            SpanQuery::MultiTerm(_) => {}
        }
    }

    /// Expands nested multi-term variants into `SpanOr` of `SpanTerm`
    pub fn rewrite(&self, reader: &dyn IndexReader) -> Result<SpanQuery> {
        let rewrap = |inner: &SpanQuery| inner.rewrite(reader).map(Box::new);
        Ok(match self {
            SpanQuery::MultiTerm(q) => rewrite::rewrite_multi_term_span(&q.inner, reader)?,
            SpanQuery::Near(q) => SpanQuery::Near(SpanNearQuery {
                clauses: q
                    .clauses
                    .iter()
                    .map(|c| c.rewrite(reader))
                    .collect::<Result<_>>()?,
                slop: q.slop,
                in_order: q.in_order,
                boost: q.boost,
            }),
            SpanQuery::Or(q) => SpanQuery::Or(SpanOrQuery {
                clauses: q
                    .clauses
                    .iter()
                    .map(|c| c.rewrite(reader))
                    .collect::<Result<_>>()?,
                boost: q.boost,
            }),
            SpanQuery::Not(q) => SpanQuery::Not(SpanNotQuery {
                include: rewrap(&q.include)?,
                exclude: rewrap(&q.exclude)?,
                boost: q.boost,
            }),
            SpanQuery::First(q) => SpanQuery::First(SpanFirstQuery {
                inner: rewrap(&q.inner)?,
                end: q.end,
                boost: q.boost,
            }),
            SpanQuery::PositionRange(q) => SpanQuery::PositionRange(SpanPositionRangeQuery {
                inner: rewrap(&q.inner)?,
                start: q.start,
                end: q.end,
                boost: q.boost,
            }),
            SpanQuery::PayloadCheck(q) => SpanQuery::PayloadCheck(SpanPayloadCheckQuery {
                inner: rewrap(&q.inner)?,
                payloads: q.payloads.clone(),
                boost: q.boost,
            }),
            SpanQuery::Term(_) => self.clone(),
        })
    }

    pub fn get_spans(&self, reader: &SegmentReader) -> Result<Box<dyn Spans>> {
        match self {
            SpanQuery::Term(q) => match reader.term_positions(&q.term)? {
                Some(tp) => Ok(Box::new(TermSpans::new(tp))),
                None => Ok(Box::new(EmptySpans)),
            },
            SpanQuery::Near(q) => {
                let mut sub = Vec::with_capacity(q.clauses.len());
                for clause in &q.clauses {
                    sub.push(clause.get_spans(reader)?);
                }
                if q.in_order {
                    Ok(Box::new(NearSpansOrdered::new(sub, q.slop, true)))
                } else {
                    Ok(Box::new(NearSpansUnordered::new(sub, q.slop)))
                }
            }
            SpanQuery::Or(q) => {
                let mut sub = Vec::with_capacity(q.clauses.len());
                for clause in &q.clauses {
                    sub.push(clause.get_spans(reader)?);
                }
                Ok(Box::new(SpanOrSpans::new(sub)))
            }
            SpanQuery::Not(q) => Ok(Box::new(SpanNotSpans::new(
                q.include.get_spans(reader)?,
                q.exclude.get_spans(reader)?,
            ))),
            SpanQuery::First(q) => Ok(Box::new(GuardedSpans {
                inner: q.inner.get_spans(reader)?,
                guard: SpanGuard::First { end: q.end },
                cached_payloads: None,
            })),
            SpanQuery::PositionRange(q) => Ok(Box::new(GuardedSpans {
                inner: q.inner.get_spans(reader)?,
                guard: SpanGuard::PositionRange {
                    start: q.start,
                    end: q.end,
                },
                cached_payloads: None,
            })),
            SpanQuery::PayloadCheck(q) => Ok(Box::new(GuardedSpans {
                inner: q.inner.get_spans(reader)?,
                guard: SpanGuard::Payload {
                    expected: q.payloads.clone(),
                },
                cached_payloads: None,
            })),
            SpanQuery::MultiTerm(_) => Err(crate::core::error::Error::unsupported(
                "span multi-term queries must be rewritten before span enumeration",
            )),
        }
    }

    pub fn to_query_string(&self, default_field: &str) -> String {
        match self {
            SpanQuery::Term(q) => format!("spanTerm({}:{})", q.term.field, q.term.text),
            SpanQuery::Near(q) => format!(
                "spanNear([{}], {}, {})",
                q.clauses
                    .iter()
                    .map(|c| c.to_query_string(default_field))
                    .collect::<Vec<_>>()
                    .join(", "),
                q.slop,
                q.in_order
            ),
            SpanQuery::Or(q) => format!(
                "spanOr([{}])",
                q.clauses
                    .iter()
                    .map(|c| c.to_query_string(default_field))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            SpanQuery::Not(q) => format!(
                "spanNot({}, {})",
                q.include.to_query_string(default_field),
                q.exclude.to_query_string(default_field)
            ),
            SpanQuery::First(q) => format!(
                "spanFirst({}, {})",
                q.inner.to_query_string(default_field),
                q.end
            ),
            SpanQuery::PositionRange(q) => format!(
                "spanPosRange({}, {}, {})",
                q.inner.to_query_string(default_field),
                q.start,
                q.end
            ),
            SpanQuery::PayloadCheck(q) => format!(
                "spanPayCheck({}, payloads:{})",
                q.inner.to_query_string(default_field),
                q.payloads.len()
            ),
            SpanQuery::MultiTerm(q) => {
                format!("spanMulti({})", q.inner.to_query_string(default_field))
            }
        }
    }
}

enum SpanGuard {
    First { end: u32 },
    PositionRange { start: u32, end: u32 },
    Payload { expected: Vec<Vec<u8>> },
}

/// Filters inner spans by position or payload constraints
struct GuardedSpans {
    inner: Box<dyn Spans>,
    guard: SpanGuard,
    cached_payloads: Option<Vec<Vec<u8>>>,
}

impl GuardedSpans {
    fn acceptable(&mut self) -> Result<bool> {
        self.cached_payloads = None;
        match &self.guard {
            SpanGuard::First { end } => Ok(self.inner.end() <= *end),
            SpanGuard::PositionRange { start, end } => {
                Ok(self.inner.start() >= *start && self.inner.end() <= *end)
            }
            SpanGuard::Payload { expected } => {
                let collected = if self.inner.is_payload_available() {
                    self.inner.payload()?
                } else {
                    Vec::new()
                };
                let ok = collected == *expected;
                self.cached_payloads = Some(collected);
                Ok(ok)
            }
        }
    }
}

impl Spans for GuardedSpans {
    fn next(&mut self) -> Result<bool> {
        while self.inner.next()? {
            if self.acceptable()? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn skip_to(&mut self, target: u32) -> Result<bool> {
        if !self.inner.skip_to(target)? {
            return Ok(false);
        }
        if self.acceptable()? {
            return Ok(true);
        }
        self.next()
    }

    fn doc(&self) -> u32 {
        self.inner.doc()
    }

    fn start(&self) -> u32 {
        self.inner.start()
    }

    fn end(&self) -> u32 {
        self.inner.end()
    }

    fn payload(&mut self) -> Result<Vec<Vec<u8>>> {
        match self.cached_payloads.take() {
            Some(payloads) => Ok(payloads),
            None => self.inner.payload(),
        }
    }

    fn is_payload_available(&self) -> bool {
        self.cached_payloads.is_some() || self.inner.is_payload_available()
    }
}

/// Weight shared by every span query variant
pub struct SpanWeight {
    query: SpanQuery,
    boost: f32,
    idf: f32,
    query_weight: f32,
    value: f32,
    similarity: Arc<dyn Similarity>,
}

impl SpanWeight {
    pub fn new(searcher: &IndexSearcher, query: SpanQuery, boost: f32) -> Result<Self> {
        let mut terms = HashSet::new();
        query.extract_terms(&mut terms);
        let similarity = searcher.similarity();
        let max_doc = searcher.max_doc().max(1);
        let mut idf = 0.0;
        for term in &terms {
            idf += similarity.idf(searcher.doc_freq(term)?, max_doc);
        }
        Ok(SpanWeight {
            query,
            boost,
            idf,
            query_weight: 0.0,
            value: 0.0,
            similarity,
        })
    }
}

impl Weight for SpanWeight {
    fn sum_of_squared_weights(&mut self) -> Result<f32> {
        self.query_weight = self.idf * self.boost;
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
        let spans = self.query.get_spans(reader)?;
        let norms = self
            .query
            .field()
            .and_then(|field| reader.norms(&field));
        Ok(Some(Box::new(SpanScorer::new(
            spans,
            norms,
            self.value,
            self.similarity.clone(),
        ))))
    }
}

/// Scores span matches: `tf(Σ sloppyFreq(spanLength)) · value · norm`
pub struct SpanScorer {
    spans: Box<dyn Spans>,
    norms: Option<Arc<Vec<u8>>>,
    value: f32,
    similarity: Arc<dyn Similarity>,
    doc: u32,
    freq: f32,
    more: bool,
    first_time: bool,
}

impl SpanScorer {
    pub fn new(
        spans: Box<dyn Spans>,
        norms: Option<Arc<Vec<u8>>>,
        value: f32,
        similarity: Arc<dyn Similarity>,
    ) -> Self {
        SpanScorer {
            spans,
            norms,
            value,
            similarity,
            doc: 0,
            freq: 0.0,
            more: true,
            first_time: true,
        }
    }

    /// Folds every span of the landing doc into `freq`, leaving the spans
    /// cursor on the following doc
    fn settle_doc(&mut self) -> Result<u32> {
        if !self.more {
            self.doc = NO_MORE_DOCS;
            return Ok(NO_MORE_DOCS);
        }
        self.doc = self.spans.doc();
        self.freq = 0.0;
        loop {
            let match_length = self.spans.end() - self.spans.start();
            self.freq += self.similarity.sloppy_freq(match_length);
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

impl DocIdSetIterator for SpanScorer {
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

impl Scorer for SpanScorer {
    fn score(&mut self) -> Result<f32> {
        Ok(self.similarity.tf(self.freq) * self.value * self.norm(self.doc))
    }

    fn freq(&self) -> u32 {
        self.freq as u32
    }
}
