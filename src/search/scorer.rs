use crate::core::error::Result;
use crate::index::segment_reader::SegmentReader;
use crate::search::collector::Collector;

/// Sentinel returned once an iterator is exhausted; repeated calls after
/// it keep returning it
pub const NO_MORE_DOCS: u32 = u32::MAX;

/// Ascending doc-id iterator
pub trait DocIdSetIterator: Send {
    /// Current doc, meaningless before the first `next_doc`
    fn doc_id(&self) -> u32;

    fn next_doc(&mut self) -> Result<u32>;

    /// Smallest doc `>= target`, or `NO_MORE_DOCS`
    fn advance(&mut self, target: u32) -> Result<u32>;
}

/// Doc iterator that can also score the current doc
pub trait Scorer: DocIdSetIterator {
    fn score(&mut self) -> Result<f32>;

    fn freq(&self) -> u32 {
        1
    }

    /// Estimated docs this scorer may match, used to order conjunctions
    fn cost(&self) -> u64 {
        u64::MAX
    }
}

/// Exhausts a scorer into a collector
pub fn drive(scorer: &mut dyn Scorer, collector: &mut dyn Collector) -> Result<()> {
    loop {
        let doc = scorer.next_doc()?;
        if doc == NO_MORE_DOCS {
            return Ok(());
        }
        let score = scorer.score()?;
        collector.collect(doc, score)?;
    }
}

/// How a weight should shape its scorer
#[derive(Debug, Clone, Copy)]
pub struct ScorerContext {
    /// Collector insists on ascending doc ids
    pub score_docs_in_order: bool,
    /// The scorer feeds a collector directly rather than a parent scorer
    pub top_level: bool,
}

impl ScorerContext {
    pub fn top(score_docs_in_order: bool) -> Self {
        ScorerContext {
            score_docs_in_order,
            top_level: true,
        }
    }

    pub fn nested() -> Self {
        ScorerContext {
            score_docs_in_order: true,
            top_level: false,
        }
    }
}

/// Per-searcher state of a query: idf-style statistics and normalization
///
/// The weight life cycle is fixed: `sum_of_squared_weights` once, then
/// `normalize` with the query norm, then one `scorer` per segment.
pub trait Weight: Send {
    fn sum_of_squared_weights(&mut self) -> Result<f32>;

    fn normalize(&mut self, norm: f32);

    fn scorer(
        &self,
        reader: &SegmentReader,
        ctx: ScorerContext,
    ) -> Result<Option<Box<dyn Scorer>>>;

    /// True when `scorer` may hand out docs out of order at the top level
    fn scores_out_of_order(&self) -> bool {
        false
    }
}
