use std::sync::Arc;

use crate::core::config::IndexConfig;
use crate::core::error::{Error, ErrorKind, Result};
use crate::index::field::Document;
use crate::index::multi_reader::IndexReader;
use crate::index::open_reader;
use crate::index::term::Term;
use crate::search::collector::{
    Collector, ScoreDoc, Sort, TopDocs, TopFieldCollector, TopScoreDocCollector,
};
use crate::search::filter::Filter;
use crate::search::pool::ThreadPool;
use crate::search::query::{FilteredQuery, Query};
use crate::search::scorer::{drive, ScorerContext, Weight};
use crate::search::similarity::{DefaultSimilarity, Similarity};

/// Executes queries against one reader
pub struct IndexSearcher {
    reader: Box<dyn IndexReader>,
    similarity: Arc<dyn Similarity>,
}

impl IndexSearcher {
    pub fn new(reader: Box<dyn IndexReader>) -> Self {
        IndexSearcher {
            reader,
            similarity: Arc::new(DefaultSimilarity),
        }
    }

    pub fn with_similarity(mut self, similarity: Arc<dyn Similarity>) -> Self {
        self.similarity = similarity;
        self
    }

    /// Opens a searcher over the latest commit in `dir`
    pub fn open(
        dir: &dyn crate::store::directory::Directory,
        config: &IndexConfig,
    ) -> Result<Self> {
        Ok(IndexSearcher::new(open_reader(dir, config)?))
    }

    pub fn reader(&self) -> &dyn IndexReader {
        self.reader.as_ref()
    }

    pub fn similarity(&self) -> Arc<dyn Similarity> {
        self.similarity.clone()
    }

    pub fn max_doc(&self) -> u32 {
        self.reader.max_doc()
    }

    pub fn doc_freq(&self, term: &Term) -> Result<u32> {
        self.reader.doc_freq(term)
    }

    pub fn doc(&self, doc: u32) -> Result<Document> {
        self.reader.document(doc)
    }

    /// Applies `rewrite` until it reaches a fixed point
    pub fn rewrite(&self, query: &Query) -> Result<Query> {
        let mut current = query.clone();
        for _ in 0..16 {
            let next = current.rewrite(self.reader.as_ref())?;
            if next == current {
                return Ok(current);
            }
            current = next;
        }
        Err(Error::new(
            ErrorKind::InvalidState,
            format!(
                "query failed to reach a rewrite fixed point: {}",
                query.to_query_string("")
            ),
        ))
    }

    fn normalized_weight(&self, query: &Query) -> Result<Box<dyn Weight>> {
        let rewritten = self.rewrite(query)?;
        let mut weight = rewritten.create_weight(self)?;
        let sum = weight.sum_of_squared_weights()?;
        let norm = self.similarity.query_norm(sum);
        weight.normalize(norm);
        Ok(weight)
    }

    /// Top `n` hits by score
    pub fn search(&self, query: &Query, n: usize) -> Result<TopDocs> {
        let mut collector = TopScoreDocCollector::new(n);
        self.search_collector(query, &mut collector)?;
        Ok(collector.top_docs())
    }

    /// Top `n` hits with the query's doc set intersected by a filter
    pub fn search_filtered(
        &self,
        query: &Query,
        filter: Option<&Filter>,
        n: usize,
    ) -> Result<TopDocs> {
        match filter {
            None => self.search(query, n),
            Some(filter) => {
                let filtered = Query::Filtered(FilteredQuery {
                    query: Box::new(query.clone()),
                    filter: filter.clone(),
                    boost: 1.0,
                });
                self.search(&filtered, n)
            }
        }
    }

    /// Top `n` hits under a sort cascade
    pub fn search_sorted(&self, query: &Query, n: usize, sort: &Sort) -> Result<TopDocs> {
        let weight = self.normalized_weight(query)?;
        let mut collector = TopFieldCollector::new(sort.clone(), n);
        for (leaf, base) in self.reader.leaves() {
            let ctx = ScorerContext::top(true);
            if let Some(mut scorer) = weight.scorer(leaf, ctx)? {
                let mut leaf_collector = collector.leaf(leaf, base);
                drive(scorer.as_mut(), &mut leaf_collector)?;
            }
        }
        Ok(collector.top_docs())
    }

    /// Drives the query through an arbitrary collector
    pub fn search_collector(&self, query: &Query, collector: &mut dyn Collector) -> Result<()> {
        let weight = self.normalized_weight(query)?;
        let in_order = !collector.accepts_docs_out_of_order();
        for (leaf, base) in self.reader.leaves() {
            collector.set_next_reader(leaf, base)?;
            if let Some(mut scorer) = weight.scorer(leaf, ScorerContext::top(in_order))? {
                drive(scorer.as_mut(), collector)?;
            }
        }
        Ok(())
    }
}

fn merge_top_docs(per_searcher: Vec<(u32, TopDocs)>, n: usize) -> TopDocs {
    let mut all: Vec<ScoreDoc> = Vec::new();
    let mut total_hits = 0;
    let mut max_score = f32::NEG_INFINITY;
    let mut any = false;
    for (base, top) in per_searcher {
        total_hits += top.total_hits;
        if top.total_hits > 0 {
            any = true;
            max_score = max_score.max(top.max_score);
        }
        for hit in top.score_docs {
            all.push(ScoreDoc {
                doc: base + hit.doc,
                score: hit.score,
            });
        }
    }
    all.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.doc.cmp(&b.doc)));
    all.truncate(n);
    TopDocs {
        total_hits,
        max_score: if any { max_score } else { 0.0 },
        score_docs: all,
    }
}

/// Trivial federation: searches each sub-searcher and merges hits, with
/// doc ids offset by searcher base
pub struct MultiSearcher {
    searchers: Vec<Arc<IndexSearcher>>,
}

impl MultiSearcher {
    pub fn new(searchers: Vec<Arc<IndexSearcher>>) -> Self {
        MultiSearcher { searchers }
    }

    fn bases(&self) -> Vec<u32> {
        let mut bases = Vec::with_capacity(self.searchers.len());
        let mut base = 0;
        for searcher in &self.searchers {
            bases.push(base);
            base += searcher.max_doc();
        }
        bases
    }

    pub fn search(&self, query: &Query, n: usize) -> Result<TopDocs> {
        let bases = self.bases();
        let mut per_searcher = Vec::with_capacity(self.searchers.len());
        for (i, searcher) in self.searchers.iter().enumerate() {
            per_searcher.push((bases[i], searcher.search(query, n)?));
        }
        Ok(merge_top_docs(per_searcher, n))
    }
}

/// `MultiSearcher` fanning out one pool task per sub-searcher
pub struct ParallelMultiSearcher {
    searchers: Vec<Arc<IndexSearcher>>,
    pool: ThreadPool,
}

impl ParallelMultiSearcher {
    pub fn new(searchers: Vec<Arc<IndexSearcher>>, pool: ThreadPool) -> Self {
        ParallelMultiSearcher { searchers, pool }
    }

    pub fn search(&self, query: &Query, n: usize) -> Result<TopDocs> {
        let mut base = 0;
        let mut handles = Vec::with_capacity(self.searchers.len());
        for searcher in &self.searchers {
            let searcher = searcher.clone();
            let query = query.clone();
            let searcher_base = base;
            base += searcher.max_doc();
            handles.push(
                self.pool
                    .execute(move || (searcher_base, searcher.search(&query, n))),
            );
        }
        let mut per_searcher = Vec::with_capacity(handles.len());
        for handle in handles {
            let (searcher_base, result) = handle.join()?;
            per_searcher.push((searcher_base, result?));
        }
        Ok(merge_top_docs(per_searcher, n))
    }
}
