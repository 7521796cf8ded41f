use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::core::error::Result;
use crate::index::field::FieldValue;
use crate::index::segment_reader::SegmentReader;

/// One ranked hit
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreDoc {
    pub doc: u32,
    pub score: f32,
}

/// Result page of a top-K search
#[derive(Debug, Clone, Default)]
pub struct TopDocs {
    pub total_hits: u32,
    pub max_score: f32,
    pub score_docs: Vec<ScoreDoc>,
}

/// Receives matching docs as a scorer drives through a segment
///
/// `collect` gets segment-local doc ids; the collector translates via the
/// base given in `set_next_reader`.
pub trait Collector: Send {
    fn set_next_reader(&mut self, reader: &SegmentReader, base: u32) -> Result<()>;

    fn collect(&mut self, doc: u32, score: f32) -> Result<()>;

    /// Window-based scorers may deliver out of order; a collector must
    /// opt in
    fn accepts_docs_out_of_order(&self) -> bool {
        false
    }
}

struct HitEntry {
    score: f32,
    doc: u32,
}

impl HitEntry {
    /// Higher score wins; ties go to the earlier doc
    fn better_than(&self, other: &Self) -> bool {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.doc.cmp(&self.doc))
            == Ordering::Greater
    }
}

// Heap orders worst-first so the root is the eviction candidate: lower
// score is worse, and on ties the larger doc id is worse.
impl PartialEq for HitEntry {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score && self.doc == other.doc
    }
}
impl Eq for HitEntry {}
impl PartialOrd for HitEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HitEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.doc.cmp(&other.doc))
    }
}

/// Bounded priority queue of the best `n` hits by score, doc id as the
/// tie break
pub struct TopScoreDocCollector {
    heap: BinaryHeap<HitEntry>,
    n: usize,
    base: u32,
    total_hits: u32,
    max_score: f32,
}

impl TopScoreDocCollector {
    pub fn new(n: usize) -> Self {
        TopScoreDocCollector {
            heap: BinaryHeap::with_capacity(n + 1),
            n: n.max(1),
            base: 0,
            total_hits: 0,
            max_score: f32::NEG_INFINITY,
        }
    }

    pub fn top_docs(self) -> TopDocs {
        let mut score_docs: Vec<ScoreDoc> = self
            .heap
            .into_iter()
            .map(|e| ScoreDoc {
                doc: e.doc,
                score: e.score,
            })
            .collect();
        score_docs.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.doc.cmp(&b.doc))
        });
        TopDocs {
            total_hits: self.total_hits,
            max_score: if self.total_hits == 0 {
                0.0
            } else {
                self.max_score
            },
            score_docs,
        }
    }
}

impl Collector for TopScoreDocCollector {
    fn set_next_reader(&mut self, _reader: &SegmentReader, base: u32) -> Result<()> {
        self.base = base;
        Ok(())
    }

    fn collect(&mut self, doc: u32, score: f32) -> Result<()> {
        self.total_hits += 1;
        if score > self.max_score {
            self.max_score = score;
        }
        let entry = HitEntry {
            score,
            doc: self.base + doc,
        };
        if self.heap.len() < self.n {
            self.heap.push(entry);
        } else if let Some(worst) = self.heap.peek() {
            // Insert only if strictly better than the current worst
            if entry.better_than(worst) {
                self.heap.pop();
                self.heap.push(entry);
            }
        }
        Ok(())
    }

    fn accepts_docs_out_of_order(&self) -> bool {
        true
    }
}

/// Sort key cascade for field sorting
#[derive(Debug, Clone, PartialEq)]
pub enum SortField {
    Score { reverse: bool },
    Doc { reverse: bool },
    /// Orders by a stored string field; missing values sort last
    StringValue { field: String, reverse: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sort(pub Vec<SortField>);

impl Sort {
    pub fn by_score() -> Self {
        Sort(vec![SortField::Score { reverse: false }])
    }

    pub fn by_field(field: impl Into<String>, reverse: bool) -> Self {
        Sort(vec![SortField::StringValue {
            field: field.into(),
            reverse,
        }])
    }
}

#[derive(Debug, Clone, PartialEq)]
enum SortValue {
    Score(f32),
    Doc(u32),
    Str(Option<String>),
}

struct FieldHit {
    keys: Vec<SortValue>,
    reverse: Vec<bool>,
    doc: u32,
    score: f32,
}

impl FieldHit {
    /// Greater means better (kept over the other)
    fn compare(&self, other: &Self) -> Ordering {
        for ((a, b), &reverse) in self.keys.iter().zip(&other.keys).zip(&self.reverse) {
            let ord = match (a, b) {
                (SortValue::Score(x), SortValue::Score(y)) => x.total_cmp(y),
                (SortValue::Doc(x), SortValue::Doc(y)) => y.cmp(x),
                (SortValue::Str(x), SortValue::Str(y)) => match (x, y) {
                    // Smaller string ranks higher; missing ranks last
                    (Some(x), Some(y)) => y.cmp(x),
                    (Some(_), None) => Ordering::Greater,
                    (None, Some(_)) => Ordering::Less,
                    (None, None) => Ordering::Equal,
                },
                _ => Ordering::Equal,
            };
            let ord = if reverse { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        // Final tie break: earlier doc wins
        other.doc.cmp(&self.doc)
    }
}

impl PartialEq for FieldHit {
    fn eq(&self, other: &Self) -> bool {
        self.doc == other.doc
    }
}
impl Eq for FieldHit {}
impl PartialOrd for FieldHit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for FieldHit {
    fn cmp(&self, other: &Self) -> Ordering {
        // Worst-first heap
        other.compare(self)
    }
}

/// Top-K hits under a `Sort` cascade instead of raw score
///
/// Stored-field sort keys are resolved against the current segment's
/// reader through the per-leaf adapter returned by `leaf`.
pub struct TopFieldCollector {
    sort: Sort,
    heap: BinaryHeap<FieldHit>,
    n: usize,
    total_hits: u32,
    max_score: f32,
}

impl TopFieldCollector {
    pub fn new(sort: Sort, n: usize) -> Self {
        TopFieldCollector {
            sort,
            heap: BinaryHeap::with_capacity(n + 1),
            n: n.max(1),
            total_hits: 0,
            max_score: f32::NEG_INFINITY,
        }
    }

    /// Collector view bound to one segment
    pub fn leaf<'a>(&'a mut self, reader: &'a SegmentReader, base: u32) -> LeafFieldCollector<'a> {
        LeafFieldCollector {
            inner: self,
            reader,
            base,
            values: Default::default(),
        }
    }

    fn offer(&mut self, hit: FieldHit) {
        self.total_hits += 1;
        if hit.score > self.max_score {
            self.max_score = hit.score;
        }
        if self.heap.len() < self.n {
            self.heap.push(hit);
        } else if let Some(worst) = self.heap.peek() {
            if hit.compare(worst) == Ordering::Greater {
                self.heap.pop();
                self.heap.push(hit);
            }
        }
    }

    pub fn top_docs(self) -> TopDocs {
        let mut hits: Vec<FieldHit> = self.heap.into_vec();
        hits.sort_by(|a, b| b.compare(a));
        let score_docs = hits
            .into_iter()
            .map(|h| ScoreDoc {
                doc: h.doc,
                score: h.score,
            })
            .collect();
        TopDocs {
            total_hits: self.total_hits,
            max_score: if self.total_hits == 0 {
                0.0
            } else {
                self.max_score
            },
            score_docs,
        }
    }
}

/// One segment's view of a `TopFieldCollector`
pub struct LeafFieldCollector<'a> {
    inner: &'a mut TopFieldCollector,
    reader: &'a SegmentReader,
    base: u32,
    /// field → doc → value, filled on demand
    values: std::collections::HashMap<String, std::collections::HashMap<u32, Option<String>>>,
}

impl LeafFieldCollector<'_> {
    fn field_value(&mut self, field: &str, doc: u32) -> Result<Option<String>> {
        if let Some(cached) = self.values.get(field).and_then(|m| m.get(&doc)) {
            return Ok(cached.clone());
        }
        let document = self.reader.document(doc)?;
        let value = document.get_value(field).and_then(|v| match v {
            FieldValue::Text(s) => Some(s.clone()),
            FieldValue::Bytes(_) => None,
        });
        self.values
            .entry(field.to_string())
            .or_default()
            .insert(doc, value.clone());
        Ok(value)
    }
}

impl Collector for LeafFieldCollector<'_> {
    fn set_next_reader(&mut self, _reader: &SegmentReader, _base: u32) -> Result<()> {
        Ok(())
    }

    fn collect(&mut self, doc: u32, score: f32) -> Result<()> {
        let sort = self.inner.sort.clone();
        let mut keys = Vec::with_capacity(sort.0.len());
        let mut reverse = Vec::with_capacity(sort.0.len());
        for sort_field in &sort.0 {
            match sort_field {
                SortField::Score { reverse: r } => {
                    keys.push(SortValue::Score(score));
                    reverse.push(*r);
                }
                SortField::Doc { reverse: r } => {
                    keys.push(SortValue::Doc(self.base + doc));
                    reverse.push(*r);
                }
                SortField::StringValue { field, reverse: r } => {
                    keys.push(SortValue::Str(self.field_value(field, doc)?));
                    reverse.push(*r);
                }
            }
        }
        self.inner.offer(FieldHit {
            keys,
            reverse,
            doc: self.base + doc,
            score,
        });
        Ok(())
    }
}

/// Counts matches without keeping any
#[derive(Debug, Default)]
pub struct TotalHitCountCollector {
    pub total_hits: u32,
}

impl Collector for TotalHitCountCollector {
    fn set_next_reader(&mut self, _reader: &SegmentReader, _base: u32) -> Result<()> {
        Ok(())
    }

    fn collect(&mut self, _doc: u32, _score: f32) -> Result<()> {
        self.total_hits += 1;
        Ok(())
    }

    fn accepts_docs_out_of_order(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_score_collector_order_and_ties() {
        let mut collector = TopScoreDocCollector::new(3);
        // No set_next_reader needed: base defaults to 0
        for (doc, score) in [(4u32, 1.0f32), (1, 2.0), (9, 2.0), (2, 0.5), (7, 3.0)] {
            collector.collect(doc, score).unwrap();
        }
        let top = collector.top_docs();
        assert_eq!(top.total_hits, 5);
        assert_eq!(top.max_score, 3.0);
        let docs: Vec<u32> = top.score_docs.iter().map(|d| d.doc).collect();
        // Ties broken by ascending doc id
        assert_eq!(docs, vec![7, 1, 9]);
    }

    #[test]
    fn test_collector_keeps_only_n() {
        let mut collector = TopScoreDocCollector::new(2);
        for doc in 0..100u32 {
            collector.collect(doc, doc as f32).unwrap();
        }
        let top = collector.top_docs();
        assert_eq!(top.total_hits, 100);
        assert_eq!(top.score_docs.len(), 2);
        assert_eq!(top.score_docs[0].doc, 99);
        assert_eq!(top.score_docs[1].doc, 98);
    }
}
