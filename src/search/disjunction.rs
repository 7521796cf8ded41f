use crate::core::error::Result;
use crate::search::scorer::{DocIdSetIterator, Scorer, NO_MORE_DOCS};

/// Union of sub-scorers, summing scores of everyone on the current doc
///
/// `min_matchers` below 2 means any single sub-scorer suffices; higher
/// values implement `minimum_should_match`.
pub struct DisjunctionSumScorer {
    scorers: Vec<Box<dyn Scorer>>,
    docs: Vec<u32>,
    min_matchers: u32,
    doc: u32,
    score: f32,
    matchers: u32,
    positioned: bool,
}

impl DisjunctionSumScorer {
    pub fn new(scorers: Vec<Box<dyn Scorer>>, min_matchers: u32) -> Self {
        let docs = vec![0; scorers.len()];
        DisjunctionSumScorer {
            scorers,
            docs,
            min_matchers: min_matchers.max(1),
            doc: 0,
            score: 0.0,
            matchers: 0,
            positioned: false,
        }
    }

    /// Sub-scorers matching the current doc
    pub fn num_matchers(&self) -> u32 {
        self.matchers
    }

    fn init(&mut self) -> Result<()> {
        for i in 0..self.scorers.len() {
            self.docs[i] = self.scorers[i].next_doc()?;
        }
        self.positioned = true;
        Ok(())
    }

    /// Settles on the smallest doc with enough matchers at or past the
    /// current cursor positions
    fn settle(&mut self) -> Result<u32> {
        loop {
            let candidate = self.docs.iter().copied().min().unwrap_or(NO_MORE_DOCS);
            if candidate == NO_MORE_DOCS {
                self.doc = NO_MORE_DOCS;
                return Ok(NO_MORE_DOCS);
            }
            let mut matchers = 0u32;
            let mut score = 0.0f32;
            for i in 0..self.scorers.len() {
                if self.docs[i] == candidate {
                    matchers += 1;
                    score += self.scorers[i].score()?;
                }
            }
            if matchers >= self.min_matchers {
                self.doc = candidate;
                self.score = score;
                self.matchers = matchers;
                return Ok(candidate);
            }
            // Too few matchers: everyone on the candidate moves on
            for i in 0..self.scorers.len() {
                if self.docs[i] == candidate {
                    self.docs[i] = self.scorers[i].next_doc()?;
                }
            }
        }
    }
}

impl DocIdSetIterator for DisjunctionSumScorer {
    fn doc_id(&self) -> u32 {
        self.doc
    }

    fn next_doc(&mut self) -> Result<u32> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        if !self.positioned {
            self.init()?;
        } else {
            let emitted = self.doc;
            for i in 0..self.scorers.len() {
                if self.docs[i] == emitted {
                    self.docs[i] = self.scorers[i].next_doc()?;
                }
            }
        }
        self.settle()
    }

    fn advance(&mut self, target: u32) -> Result<u32> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        if !self.positioned {
            for i in 0..self.scorers.len() {
                self.docs[i] = self.scorers[i].advance(target)?;
            }
            self.positioned = true;
        } else {
            if self.doc >= target {
                return Ok(self.doc);
            }
            for i in 0..self.scorers.len() {
                if self.docs[i] < target {
                    self.docs[i] = self.scorers[i].advance(target)?;
                }
            }
        }
        self.settle()
    }
}

impl Scorer for DisjunctionSumScorer {
    fn score(&mut self) -> Result<f32> {
        Ok(self.score)
    }

    fn freq(&self) -> u32 {
        self.matchers
    }

    fn cost(&self) -> u64 {
        self.scorers.iter().map(|s| s.cost()).sum()
    }
}
