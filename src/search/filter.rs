use roaring::RoaringBitmap;

use crate::core::error::Result;
use crate::index::postings::TermDocs;
use crate::index::segment_reader::SegmentReader;
use crate::index::term::Term;
use crate::search::multi_term::{MultiTermKind, MultiTermQuery, RewriteMethod};
use crate::search::query::{ConstantScoreInner, ConstantScoreQuery, FilteredQuery};
use crate::search::scorer::{DocIdSetIterator, Scorer, ScorerContext, Weight, NO_MORE_DOCS};
use crate::search::searcher::IndexSearcher;

/// A reusable doc-id set producer, evaluated per segment
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Term(Term),
    Range {
        field: String,
        lower: Option<String>,
        upper: Option<String>,
        include_lower: bool,
        include_upper: bool,
    },
    /// Every doc containing any term matched by the pattern
    MultiTerm(Box<MultiTermQuery>),
}

impl Filter {
    /// Lower bound of a range filter
    pub fn lower(&self) -> Option<&str> {
        match self {
            Filter::Range { lower, .. } => lower.as_deref(),
            _ => None,
        }
    }

    /// Upper bound of a range filter; always the configured upper bound
    pub fn upper(&self) -> Option<&str> {
        match self {
            Filter::Range { upper, .. } => upper.as_deref(),
            _ => None,
        }
    }

    pub fn doc_id_set(&self, reader: &SegmentReader) -> Result<RoaringBitmap> {
        let mut bits = RoaringBitmap::new();
        match self {
            Filter::Term(term) => {
                if let Some(mut postings) = reader.term_docs(term)? {
                    while postings.next()? {
                        bits.insert(postings.doc());
                    }
                }
            }
            Filter::Range {
                field,
                lower,
                upper,
                include_lower,
                include_upper,
            } => {
                let q = MultiTermQuery {
                    field: field.clone(),
                    kind: MultiTermKind::Range {
                        lower: lower.clone(),
                        upper: upper.clone(),
                        include_lower: *include_lower,
                        include_upper: *include_upper,
                    },
                    rewrite: RewriteMethod::ConstantScoreFilter,
                    boost: 1.0,
                };
                collect_multi_term(&q, reader, &mut bits)?;
            }
            Filter::MultiTerm(q) => collect_multi_term(q, reader, &mut bits)?,
        }
        Ok(bits)
    }
}

fn collect_multi_term(
    q: &MultiTermQuery,
    reader: &SegmentReader,
    bits: &mut RoaringBitmap,
) -> Result<()> {
    q.visit_matching_terms(reader, |term, _df, _boost| {
        if let Some(mut postings) = reader.term_docs(term)? {
            while postings.next()? {
                bits.insert(postings.doc());
            }
        }
        Ok(true)
    })
}

/// Iterates a materialized doc-id set in order
pub struct BitSetScorer {
    docs: Vec<u32>,
    idx: usize,
    score: f32,
    doc: u32,
}

impl BitSetScorer {
    pub fn new(bits: &RoaringBitmap, score: f32) -> Self {
        BitSetScorer {
            docs: bits.iter().collect(),
            idx: 0,
            score,
            doc: 0,
        }
    }
}

impl DocIdSetIterator for BitSetScorer {
    fn doc_id(&self) -> u32 {
        self.doc
    }

    fn next_doc(&mut self) -> Result<u32> {
        if self.idx >= self.docs.len() {
            self.doc = NO_MORE_DOCS;
            return Ok(NO_MORE_DOCS);
        }
        self.doc = self.docs[self.idx];
        self.idx += 1;
        Ok(self.doc)
    }

    fn advance(&mut self, target: u32) -> Result<u32> {
        // First member at or past the target
        let from = self.idx;
        let offset = self.docs[from..].partition_point(|&d| d < target);
        self.idx = from + offset;
        self.next_doc()
    }
}

impl Scorer for BitSetScorer {
    fn score(&mut self) -> Result<f32> {
        Ok(self.score)
    }

    fn cost(&self) -> u64 {
        self.docs.len() as u64
    }
}

/// Weight of a constant-score query: every match scores `boost · norm`
pub struct ConstantScoreWeight {
    query: ConstantScoreQuery,
    inner_weight: Option<Box<dyn Weight>>,
    query_weight: f32,
    value: f32,
}

impl ConstantScoreWeight {
    pub fn new(searcher: &IndexSearcher, query: ConstantScoreQuery) -> Result<Self> {
        let inner_weight = match &query.inner {
            ConstantScoreInner::Query(inner) => Some(inner.create_weight(searcher)?),
            ConstantScoreInner::Filter(_) => None,
        };
        Ok(ConstantScoreWeight {
            query,
            inner_weight,
            query_weight: 0.0,
            value: 0.0,
        })
    }
}

impl Weight for ConstantScoreWeight {
    fn sum_of_squared_weights(&mut self) -> Result<f32> {
        self.query_weight = self.query.boost;
        Ok(self.query_weight * self.query_weight)
    }

    fn normalize(&mut self, norm: f32) {
        self.value = self.query_weight * norm;
    }

    fn scorer(
        &self,
        reader: &SegmentReader,
        _ctx: ScorerContext,
    ) -> Result<Option<Box<dyn Scorer>>> {
        match &self.query.inner {
            ConstantScoreInner::Filter(filter) => {
                let bits = filter.doc_id_set(reader)?;
                Ok(Some(Box::new(BitSetScorer::new(&bits, self.value))))
            }
            ConstantScoreInner::Query(_) => {
                let inner = self.inner_weight.as_ref().unwrap();
                let Some(scorer) = inner.scorer(reader, ScorerContext::nested())? else {
                    return Ok(None);
                };
                Ok(Some(Box::new(ConstantScorer {
                    inner: scorer,
                    value: self.value,
                })))
            }
        }
    }
}

/// Matches like the inner scorer, scores a constant
pub struct ConstantScorer {
    inner: Box<dyn Scorer>,
    value: f32,
}

impl DocIdSetIterator for ConstantScorer {
    fn doc_id(&self) -> u32 {
        self.inner.doc_id()
    }

    fn next_doc(&mut self) -> Result<u32> {
        self.inner.next_doc()
    }

    fn advance(&mut self, target: u32) -> Result<u32> {
        self.inner.advance(target)
    }
}

impl Scorer for ConstantScorer {
    fn score(&mut self) -> Result<f32> {
        Ok(self.value)
    }

    fn cost(&self) -> u64 {
        self.inner.cost()
    }
}

/// Weight of `FilteredQuery`: the inner query's scores on the
/// intersection with the filter's doc set
pub struct FilteredWeight {
    inner: Box<dyn Weight>,
    filter: Filter,
    boost: f32,
}

impl FilteredWeight {
    pub fn new(searcher: &IndexSearcher, query: &FilteredQuery) -> Result<Self> {
        Ok(FilteredWeight {
            inner: query.query.create_weight(searcher)?,
            filter: query.filter.clone(),
            boost: query.boost,
        })
    }
}

impl Weight for FilteredWeight {
    fn sum_of_squared_weights(&mut self) -> Result<f32> {
        Ok(self.inner.sum_of_squared_weights()? * self.boost * self.boost)
    }

    fn normalize(&mut self, norm: f32) {
        self.inner.normalize(norm * self.boost);
    }

    fn scorer(
        &self,
        reader: &SegmentReader,
        _ctx: ScorerContext,
    ) -> Result<Option<Box<dyn Scorer>>> {
        let Some(scorer) = self.inner.scorer(reader, ScorerContext::nested())? else {
            return Ok(None);
        };
        let bits = self.filter.doc_id_set(reader)?;
        if bits.is_empty() {
            return Ok(None);
        }
        Ok(Some(Box::new(FilteredScorer {
            inner: scorer,
            members: bits.iter().collect(),
            doc: 0,
        })))
    }
}

/// Inner scorer constrained to the filter's members
pub struct FilteredScorer {
    inner: Box<dyn Scorer>,
    members: Vec<u32>,
    doc: u32,
}

impl FilteredScorer {
    /// Skips the inner scorer along the member list until both agree
    fn converge(&mut self, mut doc: u32) -> Result<u32> {
        loop {
            if doc == NO_MORE_DOCS {
                self.doc = NO_MORE_DOCS;
                return Ok(NO_MORE_DOCS);
            }
            let slot = self.members.partition_point(|&d| d < doc);
            match self.members.get(slot) {
                None => {
                    self.doc = NO_MORE_DOCS;
                    return Ok(NO_MORE_DOCS);
                }
                Some(&member) if member == doc => {
                    self.doc = doc;
                    return Ok(doc);
                }
                Some(&member) => {
                    doc = self.inner.advance(member)?;
                }
            }
        }
    }
}

impl DocIdSetIterator for FilteredScorer {
    fn doc_id(&self) -> u32 {
        self.doc
    }

    fn next_doc(&mut self) -> Result<u32> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        let doc = self.inner.next_doc()?;
        self.converge(doc)
    }

    fn advance(&mut self, target: u32) -> Result<u32> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        let doc = self.inner.advance(target)?;
        self.converge(doc)
    }
}

impl Scorer for FilteredScorer {
    fn score(&mut self) -> Result<f32> {
        self.inner.score()
    }

    fn freq(&self) -> u32 {
        self.inner.freq()
    }

    fn cost(&self) -> u64 {
        (self.members.len() as u64).min(self.inner.cost())
    }
}

/// Weight for the match-everything query
pub struct MatchAllWeight {
    boost: f32,
    query_weight: f32,
    value: f32,
}

impl MatchAllWeight {
    pub fn new(boost: f32) -> Self {
        MatchAllWeight {
            boost,
            query_weight: 0.0,
            value: 0.0,
        }
    }
}

impl Weight for MatchAllWeight {
    fn sum_of_squared_weights(&mut self) -> Result<f32> {
        self.query_weight = self.boost;
        Ok(self.query_weight * self.query_weight)
    }

    fn normalize(&mut self, norm: f32) {
        self.value = self.query_weight * norm;
    }

    fn scorer(
        &self,
        reader: &SegmentReader,
        _ctx: ScorerContext,
    ) -> Result<Option<Box<dyn Scorer>>> {
        Ok(Some(Box::new(AllScorer {
            max_doc: reader.max_doc(),
            deleted: reader.deleted_docs().cloned(),
            value: self.value,
            doc: 0,
            started: false,
        })))
    }
}

struct AllScorer {
    max_doc: u32,
    deleted: Option<std::sync::Arc<crate::util::bits::DeletedDocs>>,
    value: f32,
    doc: u32,
    started: bool,
}

impl AllScorer {
    fn seek(&mut self, mut doc: u32) -> u32 {
        while doc < self.max_doc {
            let live = self
                .deleted
                .as_ref()
                .map(|d| !d.is_deleted(doc))
                .unwrap_or(true);
            if live {
                self.doc = doc;
                self.started = true;
                return doc;
            }
            doc += 1;
        }
        self.doc = NO_MORE_DOCS;
        NO_MORE_DOCS
    }
}

impl DocIdSetIterator for AllScorer {
    fn doc_id(&self) -> u32 {
        self.doc
    }

    fn next_doc(&mut self) -> Result<u32> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        let from = if self.started { self.doc + 1 } else { 0 };
        Ok(self.seek(from))
    }

    fn advance(&mut self, target: u32) -> Result<u32> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        if self.started && self.doc >= target {
            return Ok(self.doc);
        }
        Ok(self.seek(target))
    }
}

impl Scorer for AllScorer {
    fn score(&mut self) -> Result<f32> {
        Ok(self.value)
    }

    fn cost(&self) -> u64 {
        self.max_doc as u64
    }
}
