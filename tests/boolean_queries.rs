use std::sync::Arc;

use fathom::analysis::SimpleAnalyzer;
use fathom::index::{Document, Field, IndexReader, IndexWriter};
use fathom::search::{
    BooleanQuery, DocIdSetIterator, IndexSearcher, Query, Scorer, ScorerContext, TopDocs,
    TotalHitCountCollector, Weight, NO_MORE_DOCS,
};
use fathom::store::{Directory, RamDirectory};
use fathom::IndexConfig;

fn build(texts: &[&str]) -> Arc<RamDirectory> {
    let dir = Arc::new(RamDirectory::new());
    let mut writer = IndexWriter::open(
        dir.clone() as Arc<dyn Directory>,
        Arc::new(SimpleAnalyzer),
        IndexConfig::default(),
    )
    .unwrap();
    for text in texts {
        let mut doc = Document::new();
        doc.add(Field::unstored("body", *text));
        writer.add_document(&doc).unwrap();
    }
    writer.close().unwrap();
    dir
}

fn docs(top: &TopDocs) -> Vec<u32> {
    let mut out: Vec<u32> = top.score_docs.iter().map(|d| d.doc).collect();
    out.sort_unstable();
    out
}

const CORPUS: [&str; 6] = [
    "apple banana",
    "apple cherry",
    "banana cherry",
    "apple banana cherry",
    "durian",
    "apple durian",
];

#[test]
fn test_must_should_must_not() {
    let dir = build(&CORPUS);
    let searcher = IndexSearcher::open(dir.as_ref(), &IndexConfig::default()).unwrap();

    let query = Query::Boolean(
        BooleanQuery::new()
            .with_must(Query::term("body", "apple"))
            .with_must_not(Query::term("body", "durian")),
    );
    let top = searcher.search(&query, 10).unwrap();
    assert_eq!(docs(&top), vec![0, 1, 3]);

    let with_should = Query::Boolean(
        BooleanQuery::new()
            .with_must(Query::term("body", "apple"))
            .with_should(Query::term("body", "cherry")),
    );
    let top = searcher.search(&with_should, 10).unwrap();
    assert_eq!(docs(&top), vec![0, 1, 3, 5]);
    // Docs matching the optional clause outrank the rest
    let best: Vec<u32> = top.score_docs[..2].iter().map(|d| d.doc).collect();
    assert!(best.contains(&1) && best.contains(&3));
}

#[test]
fn test_min_should_match() {
    let dir = build(&CORPUS);
    let searcher = IndexSearcher::open(dir.as_ref(), &IndexConfig::default()).unwrap();

    let query = Query::Boolean(
        BooleanQuery::new()
            .with_should(Query::term("body", "apple"))
            .with_should(Query::term("body", "banana"))
            .with_should(Query::term("body", "cherry"))
            .with_min_should_match(2),
    );
    let top = searcher.search(&query, 10).unwrap();
    assert_eq!(docs(&top), vec![0, 1, 2, 3]);

    let all_three = Query::Boolean(
        BooleanQuery::new()
            .with_should(Query::term("body", "apple"))
            .with_should(Query::term("body", "banana"))
            .with_should(Query::term("body", "cherry"))
            .with_min_should_match(3),
    );
    let top = searcher.search(&all_three, 10).unwrap();
    assert_eq!(docs(&top), vec![3]);
}

#[test]
fn test_pure_disjunction_counts_match_collector() {
    let dir = build(&CORPUS);
    let searcher = IndexSearcher::open(dir.as_ref(), &IndexConfig::default()).unwrap();

    let query = Query::Boolean(
        BooleanQuery::new()
            .with_should(Query::term("body", "apple"))
            .with_should(Query::term("body", "banana")),
    );
    // The counting collector tolerates out-of-order delivery, steering
    // pure disjunctions through the windowed scorer
    let mut counter = TotalHitCountCollector::default();
    searcher.search_collector(&query, &mut counter).unwrap();
    assert_eq!(counter.total_hits, 5);

    // And the in-order path agrees
    let top = searcher.search(&query, 10).unwrap();
    assert_eq!(top.total_hits, 5);
    assert_eq!(docs(&top), vec![0, 1, 2, 3, 5]);
}

#[test]
fn test_coord_rewards_more_matches() {
    let dir = build(&CORPUS);
    let searcher = IndexSearcher::open(dir.as_ref(), &IndexConfig::default()).unwrap();

    let query = Query::Boolean(
        BooleanQuery::new()
            .with_should(Query::term("body", "apple"))
            .with_should(Query::term("body", "banana"))
            .with_should(Query::term("body", "cherry")),
    );
    let top = searcher.search(&query, 10).unwrap();
    assert_eq!(top.score_docs[0].doc, 3, "doc matching all clauses ranks first");
}

#[test]
fn test_scorer_monotonicity_and_done_is_sticky() {
    let dir = build(&CORPUS);
    let searcher = IndexSearcher::open(dir.as_ref(), &IndexConfig::default()).unwrap();

    let query = Query::Boolean(
        BooleanQuery::new()
            .with_should(Query::term("body", "apple"))
            .with_should(Query::term("body", "cherry")),
    );
    let rewritten = searcher.rewrite(&query).unwrap();
    let mut weight = rewritten.create_weight(&searcher).unwrap();
    let sum = weight.sum_of_squared_weights().unwrap();
    weight.normalize(1.0 / sum.sqrt().max(1e-9));

    let leaves = searcher.reader().leaves();
    let (leaf, _base) = leaves[0];
    // Nested context keeps the in-order composite scorer
    let mut scorer = weight
        .scorer(leaf, ScorerContext::nested())
        .unwrap()
        .unwrap();

    let mut last = None;
    loop {
        let doc = scorer.next_doc().unwrap();
        if doc == NO_MORE_DOCS {
            break;
        }
        if let Some(last) = last {
            assert!(doc > last, "docs must be strictly increasing");
        }
        assert!(scorer.score().unwrap() > 0.0);
        last = Some(doc);
    }
    // DONE is idempotent
    assert_eq!(scorer.next_doc().unwrap(), NO_MORE_DOCS);
    assert_eq!(scorer.next_doc().unwrap(), NO_MORE_DOCS);
    assert_eq!(scorer.advance(0).unwrap(), NO_MORE_DOCS);
}

#[test]
fn test_advance_returns_ceiling() {
    let dir = build(&CORPUS);
    let searcher = IndexSearcher::open(dir.as_ref(), &IndexConfig::default()).unwrap();

    let rewritten = searcher.rewrite(&Query::term("body", "apple")).unwrap();
    let mut weight = rewritten.create_weight(&searcher).unwrap();
    let _ = weight.sum_of_squared_weights().unwrap();
    weight.normalize(1.0);
    let leaves = searcher.reader().leaves();
    let mut scorer = weight
        .scorer(leaves[0].0, ScorerContext::nested())
        .unwrap()
        .unwrap();

    // apple matches docs 0, 1, 3, 5
    assert_eq!(scorer.advance(2).unwrap(), 3);
    assert_eq!(scorer.advance(3).unwrap(), 3, "advance at current doc holds still");
    assert_eq!(scorer.advance(4).unwrap(), 5);
    assert_eq!(scorer.advance(6).unwrap(), NO_MORE_DOCS);
}
