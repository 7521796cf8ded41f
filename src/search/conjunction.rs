use crate::core::error::Result;
use crate::search::scorer::{DocIdSetIterator, Scorer, NO_MORE_DOCS};

/// Intersection of sub-scorers by leapfrogging
///
/// Sub-scorers are kept sorted by ascending cost so the rarest list
/// leads and the dense ones only confirm. All sub-scorers sit on the
/// same doc whenever this scorer is positioned.
pub struct ConjunctionScorer {
    scorers: Vec<Box<dyn Scorer>>,
    docs: Vec<u32>,
    doc: u32,
    positioned: bool,
}

impl ConjunctionScorer {
    pub fn new(mut scorers: Vec<Box<dyn Scorer>>) -> Self {
        scorers.sort_by_key(|s| s.cost());
        let docs = vec![0; scorers.len()];
        ConjunctionScorer {
            scorers,
            docs,
            doc: 0,
            positioned: false,
        }
    }

    fn leapfrog(&mut self, mut target: u32) -> Result<u32> {
        if self.scorers.is_empty() {
            self.doc = NO_MORE_DOCS;
            return Ok(NO_MORE_DOCS);
        }
        loop {
            let mut all_equal = true;
            for i in 0..self.scorers.len() {
                if !self.positioned || self.docs[i] < target {
                    self.docs[i] = self.scorers[i].advance(target)?;
                }
                if self.docs[i] == NO_MORE_DOCS {
                    self.doc = NO_MORE_DOCS;
                    return Ok(NO_MORE_DOCS);
                }
                if self.docs[i] > target {
                    // Overshoot becomes the new candidate for everyone
                    target = self.docs[i];
                    all_equal = false;
                }
            }
            self.positioned = true;
            if all_equal {
                self.doc = target;
                return Ok(target);
            }
        }
    }
}

impl DocIdSetIterator for ConjunctionScorer {
    fn doc_id(&self) -> u32 {
        self.doc
    }

    fn next_doc(&mut self) -> Result<u32> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        let target = if self.positioned { self.doc + 1 } else { 0 };
        self.leapfrog(target)
    }

    fn advance(&mut self, target: u32) -> Result<u32> {
        if self.doc == NO_MORE_DOCS {
            return Ok(NO_MORE_DOCS);
        }
        if self.positioned && self.doc >= target {
            return Ok(self.doc);
        }
        self.leapfrog(target)
    }
}

impl Scorer for ConjunctionScorer {
    fn score(&mut self) -> Result<f32> {
        let mut total = 0.0;
        for scorer in self.scorers.iter_mut() {
            total += scorer.score()?;
        }
        Ok(total)
    }

    fn cost(&self) -> u64 {
        self.scorers.iter().map(|s| s.cost()).min().unwrap_or(0)
    }
}
