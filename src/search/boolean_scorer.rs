use crate::core::error::{Error, Result};
use crate::search::scorer::{DocIdSetIterator, Scorer, NO_MORE_DOCS};

const WINDOW_SIZE: u32 = 2048;
const WINDOW_MASK: u32 = WINDOW_SIZE - 1;

#[derive(Clone, Copy)]
struct Bucket {
    doc: i64,
    score: f32,
    matchers: u32,
    prohibited: bool,
}

const EMPTY_BUCKET: Bucket = Bucket {
    doc: -1,
    score: 0.0,
    matchers: 0,
    prohibited: false,
};

/// Windowed disjunction scorer
///
/// Scores docs in fixed windows of 2048 ids through a bucket table
/// indexed by `doc & 2047`; each sub-scorer sweeps the window once, then
/// surviving buckets are replayed. Hits inside a window are not
/// guaranteed in doc order, so this scorer is only legal at the top
/// level under a collector that tolerates reordering. `advance` is not
/// part of its contract.
pub struct BooleanScorer {
    optional: Vec<Box<dyn Scorer>>,
    opt_docs: Vec<u32>,
    prohibited: Vec<Box<dyn Scorer>>,
    min_should_match: u32,
    coord: Vec<f32>,
    buckets: Vec<Bucket>,
    pending: Vec<(u32, f32, u32)>,
    pending_idx: usize,
    doc: u32,
    score: f32,
    matched: u32,
    positioned: bool,
}

impl BooleanScorer {
    pub fn new(
        optional: Vec<Box<dyn Scorer>>,
        prohibited: Vec<Box<dyn Scorer>>,
        min_should_match: u32,
        coord: Vec<f32>,
    ) -> Self {
        let opt_docs = vec![0; optional.len()];
        BooleanScorer {
            optional,
            opt_docs,
            prohibited,
            min_should_match: min_should_match.max(1),
            coord,
            buckets: vec![EMPTY_BUCKET; WINDOW_SIZE as usize],
            pending: Vec::new(),
            pending_idx: 0,
            doc: 0,
            score: 0.0,
            matched: 0,
            positioned: false,
        }
    }

    fn init(&mut self) -> Result<()> {
        for i in 0..self.optional.len() {
            self.opt_docs[i] = self.optional[i].next_doc()?;
        }
        self.positioned = true;
        Ok(())
    }

    /// Sweeps one window into the bucket table and replays survivors
    fn fill_window(&mut self) -> Result<bool> {
        let window_min = self.opt_docs.iter().copied().min().unwrap_or(NO_MORE_DOCS);
        if window_min == NO_MORE_DOCS {
            return Ok(false);
        }
        let base = window_min & !WINDOW_MASK;
        let end = base.saturating_add(WINDOW_SIZE);

        for bucket in &mut self.buckets {
            *bucket = EMPTY_BUCKET;
        }

        for i in 0..self.optional.len() {
            while self.opt_docs[i] < end {
                let doc = self.opt_docs[i];
                let slot = (doc & WINDOW_MASK) as usize;
                let score = self.optional[i].score()?;
                let bucket = &mut self.buckets[slot];
                if bucket.doc != doc as i64 {
                    *bucket = Bucket {
                        doc: doc as i64,
                        score,
                        matchers: 1,
                        prohibited: false,
                    };
                } else {
                    bucket.score += score;
                    bucket.matchers += 1;
                }
                self.opt_docs[i] = self.optional[i].next_doc()?;
            }
        }

        for scorer in self.prohibited.iter_mut() {
            let mut doc = scorer.advance(base)?;
            while doc < end {
                let slot = (doc & WINDOW_MASK) as usize;
                if self.buckets[slot].doc == doc as i64 {
                    self.buckets[slot].prohibited = true;
                }
                doc = scorer.next_doc()?;
            }
        }

        self.pending.clear();
        self.pending_idx = 0;
        for bucket in &self.buckets {
            if bucket.doc < 0 || bucket.prohibited || bucket.matchers < self.min_should_match {
                continue;
            }
            let coord = self.coord[(bucket.matchers as usize).min(self.coord.len() - 1)];
            self.pending
                .push((bucket.doc as u32, bucket.score * coord, bucket.matchers));
        }
        Ok(true)
    }
}

impl DocIdSetIterator for BooleanScorer {
    fn doc_id(&self) -> u32 {
        self.doc
    }

    fn next_doc(&mut self) -> Result<u32> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        if !self.positioned {
            self.init()?;
        }
        loop {
            if self.pending_idx < self.pending.len() {
                let (doc, score, matched) = self.pending[self.pending_idx];
                self.pending_idx += 1;
                self.doc = doc;
                self.score = score;
                self.matched = matched;
                return Ok(doc);
            }
            if !self.fill_window()? {
                self.doc = NO_MORE_DOCS;
                return Ok(NO_MORE_DOCS);
            }
        }
    }

    fn advance(&mut self, _target: u32) -> Result<u32> {
        Err(Error::unsupported(
            "window boolean scorer cannot advance; it is top-level only",
        ))
    }
}

impl Scorer for BooleanScorer {
    fn score(&mut self) -> Result<f32> {
        Ok(self.score)
    }

    fn freq(&self) -> u32 {
        self.matched
    }
}
