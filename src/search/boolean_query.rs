use std::sync::Arc;

use crate::core::error::Result;
use crate::index::segment_reader::SegmentReader;
use crate::search::boolean_scorer::BooleanScorer;
use crate::search::conjunction::ConjunctionScorer;
use crate::search::disjunction::DisjunctionSumScorer;
use crate::search::query::{BooleanQuery, Occur};
use crate::search::scorer::{DocIdSetIterator, Scorer, ScorerContext, Weight, NO_MORE_DOCS};
use crate::search::searcher::IndexSearcher;
use crate::search::similarity::Similarity;

/// Weight of a boolean query: sub-weights plus coord bookkeeping
pub struct BooleanWeight {
    weights: Vec<(Occur, Box<dyn Weight>)>,
    boost: f32,
    min_should_match: u32,
    similarity: Arc<dyn Similarity>,
    /// Scoring clauses (required + optional)
    max_coord: u32,
}

impl BooleanWeight {
    pub fn new(searcher: &IndexSearcher, query: &BooleanQuery) -> Result<Self> {
        let mut weights = Vec::with_capacity(query.clauses.len());
        let mut max_coord = 0;
        for clause in &query.clauses {
            if clause.occur != Occur::MustNot {
                max_coord += 1;
            }
            weights.push((clause.occur, clause.query.create_weight(searcher)?));
        }
        Ok(BooleanWeight {
            weights,
            boost: query.boost,
            min_should_match: query.min_should_match,
            similarity: searcher.similarity(),
            max_coord,
        })
    }

    fn coord_factors(&self) -> Vec<f32> {
        (0..=self.max_coord)
            .map(|matched| self.similarity.coord(matched, self.max_coord))
            .collect()
    }
}

impl Weight for BooleanWeight {
    fn sum_of_squared_weights(&mut self) -> Result<f32> {
        let mut sum = 0.0;
        for (occur, weight) in self.weights.iter_mut() {
            let s = weight.sum_of_squared_weights()?;
            if *occur != Occur::MustNot {
                sum += s;
            }
        }
        Ok(sum * self.boost * self.boost)
    }

    fn normalize(&mut self, norm: f32) {
        let norm = norm * self.boost;
        for (_, weight) in self.weights.iter_mut() {
            weight.normalize(norm);
        }
    }

    fn scorer(
        &self,
        reader: &SegmentReader,
        ctx: ScorerContext,
    ) -> Result<Option<Box<dyn Scorer>>> {
        let mut required = Vec::new();
        let mut optional = Vec::new();
        let mut prohibited = Vec::new();
        for (occur, weight) in &self.weights {
            let sub = weight.scorer(reader, ScorerContext::nested())?;
            match (occur, sub) {
                (Occur::Must, Some(s)) => required.push(s),
                // A required clause with no postings kills the whole
                // conjunction in this segment
                (Occur::Must, None) => return Ok(None),
                (Occur::Should, Some(s)) => optional.push(s),
                (Occur::Should, None) => {}
                (Occur::MustNot, Some(s)) => prohibited.push(s),
                (Occur::MustNot, None) => {}
            }
        }
        if required.is_empty() && optional.is_empty() {
            return Ok(None);
        }
        if required.is_empty()
            && (optional.len() as u32) < self.min_should_match.max(1)
        {
            return Ok(None);
        }
        let coord = self.coord_factors();
        let num_required = required.len() as u32;

        // The windowed scorer only handles pure disjunctions and needs an
        // out-of-order-tolerant top-level collector
        if ctx.top_level && !ctx.score_docs_in_order && required.is_empty() {
            return Ok(Some(Box::new(BooleanScorer::new(
                optional,
                prohibited,
                self.min_should_match,
                coord,
            ))));
        }

        Ok(Some(Box::new(BooleanScorer2::new(
            required,
            optional,
            prohibited,
            self.min_should_match,
            num_required,
            coord,
        ))))
    }

    fn scores_out_of_order(&self) -> bool {
        // Only the window scorer reorders, and only when selected
        false
    }
}

/// In-order boolean scorer composed from conjunction/disjunction parts
pub struct BooleanScorer2 {
    req: Option<ConjunctionScorer>,
    opt: Option<DisjunctionSumScorer>,
    excl: Option<DisjunctionSumScorer>,
    min_should_match: u32,
    num_required: u32,
    coord: Vec<f32>,
    doc: u32,
    score: f32,
    matched: u32,
}

impl BooleanScorer2 {
    pub fn new(
        required: Vec<Box<dyn Scorer>>,
        optional: Vec<Box<dyn Scorer>>,
        prohibited: Vec<Box<dyn Scorer>>,
        min_should_match: u32,
        num_required: u32,
        coord: Vec<f32>,
    ) -> Self {
        let req = if required.is_empty() {
            None
        } else {
            Some(ConjunctionScorer::new(required))
        };
        let opt = if optional.is_empty() {
            None
        } else {
            Some(DisjunctionSumScorer::new(optional, min_should_match.max(1)))
        };
        let excl = if prohibited.is_empty() {
            None
        } else {
            Some(DisjunctionSumScorer::new(prohibited, 1))
        };
        BooleanScorer2 {
            req,
            opt,
            excl,
            min_should_match,
            num_required,
            coord,
            doc: 0,
            score: 0.0,
            matched: 0,
        }
    }

    fn excluded(&mut self, doc: u32) -> Result<bool> {
        match &mut self.excl {
            Some(excl) => Ok(excl.advance(doc)? == doc),
            None => Ok(false),
        }
    }

    /// Required-clause driven matching
    fn next_with_required(&mut self, mut target: Option<u32>) -> Result<u32> {
        loop {
            let req = self.req.as_mut().unwrap();
            let doc = match target.take() {
                Some(t) => req.advance(t)?,
                None => req.next_doc()?,
            };
            if doc == NO_MORE_DOCS {
                self.doc = NO_MORE_DOCS;
                return Ok(NO_MORE_DOCS);
            }
            if self.excluded(doc)? {
                continue;
            }
            let mut opt_matched = 0u32;
            let mut opt_score = 0.0f32;
            if let Some(opt) = &mut self.opt {
                if opt.advance(doc)? == doc {
                    opt_matched = opt.num_matchers();
                    opt_score = opt.score()?;
                }
            }
            if self.min_should_match > 0 && opt_matched < self.min_should_match {
                continue;
            }
            let req_score = self.req.as_mut().unwrap().score()?;
            let matched = self.num_required + opt_matched;
            self.doc = doc;
            self.matched = matched;
            self.score = (req_score + opt_score) * self.coord[matched as usize];
            return Ok(doc);
        }
    }

    /// Pure disjunction matching
    fn next_optional_only(&mut self, mut target: Option<u32>) -> Result<u32> {
        loop {
            let opt = self.opt.as_mut().unwrap();
            let doc = match target.take() {
                Some(t) => opt.advance(t)?,
                None => opt.next_doc()?,
            };
            if doc == NO_MORE_DOCS {
                self.doc = NO_MORE_DOCS;
                return Ok(NO_MORE_DOCS);
            }
            if self.excluded(doc)? {
                continue;
            }
            let matched = self.opt.as_mut().unwrap().num_matchers();
            let score = self.opt.as_mut().unwrap().score()?;
            self.doc = doc;
            self.matched = matched;
            self.score = score * self.coord[matched as usize];
            return Ok(doc);
        }
    }

    fn step(&mut self, target: Option<u32>) -> Result<u32> {
        if self.req.is_some() {
            self.next_with_required(target)
        } else {
            self.next_optional_only(target)
        }
    }
}

impl DocIdSetIterator for BooleanScorer2 {
    fn doc_id(&self) -> u32 {
        self.doc
    }

    fn next_doc(&mut self) -> Result<u32> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        self.step(None)
    }

    fn advance(&mut self, target: u32) -> Result<u32> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        if self.doc >= target && self.doc != 0 {
            return Ok(self.doc);
        }
        self.step(Some(target))
    }
}

impl Scorer for BooleanScorer2 {
    fn score(&mut self) -> Result<f32> {
        Ok(self.score)
    }

    fn freq(&self) -> u32 {
        self.matched
    }

    fn cost(&self) -> u64 {
        match (&self.req, &self.opt) {
            (Some(req), _) => req.cost(),
            (None, Some(opt)) => opt.cost(),
            (None, None) => 0,
        }
    }
}
