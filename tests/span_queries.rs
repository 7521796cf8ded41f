use std::sync::Arc;

use fathom::analysis::{PayloadAnalyzer, SimpleAnalyzer};
use fathom::index::{Document, Field, IndexWriter, Term};
use fathom::search::spans::{
    SpanFirstQuery, SpanNearQuery, SpanNotQuery, SpanOrQuery, SpanPayloadCheckQuery,
    SpanPositionRangeQuery, SpanQuery,
};
use fathom::search::{IndexSearcher, Query};
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

fn matching_docs(searcher: &IndexSearcher, query: &Query) -> Vec<u32> {
    let mut docs: Vec<u32> = searcher
        .search(query, 100)
        .unwrap()
        .score_docs
        .iter()
        .map(|d| d.doc)
        .collect();
    docs.sort_unstable();
    docs
}

#[test]
fn test_span_near_ordered() {
    let dir = build(&[
        "quick brown fox",
        "brown quick fox",
        "quick slow red brown fox",
        "quick fox",
    ]);
    let searcher = IndexSearcher::open(dir.as_ref(), &IndexConfig::default()).unwrap();

    let near = |slop: u32, in_order: bool| {
        Query::Span(SpanQuery::Near(SpanNearQuery {
            clauses: vec![
                SpanQuery::span_term("body", "quick"),
                SpanQuery::span_term("body", "brown"),
            ],
            slop,
            in_order,
            boost: 1.0,
        }))
    };

    // Adjacent and ordered
    assert_eq!(matching_docs(&searcher, &near(0, true)), vec![0]);
    // Two words of slack admits the stretched doc
    assert_eq!(matching_docs(&searcher, &near(2, true)), vec![0, 2]);
    // Unordered also accepts the reversed doc
    assert_eq!(matching_docs(&searcher, &near(0, false)), vec![0, 1]);
}

#[test]
fn test_span_or_and_not() {
    let dir = build(&["alpha beta", "alpha gamma", "delta beta", "alpha beta gamma"]);
    let searcher = IndexSearcher::open(dir.as_ref(), &IndexConfig::default()).unwrap();

    let or = Query::Span(SpanQuery::Or(SpanOrQuery {
        clauses: vec![
            SpanQuery::span_term("body", "beta"),
            SpanQuery::span_term("body", "gamma"),
        ],
        boost: 1.0,
    }));
    assert_eq!(matching_docs(&searcher, &or), vec![0, 1, 2, 3]);

    // alpha spans, except where immediately followed by beta
    let not = Query::Span(SpanQuery::Not(SpanNotQuery {
        include: Box::new(SpanQuery::Near(SpanNearQuery {
            clauses: vec![
                SpanQuery::span_term("body", "alpha"),
                SpanQuery::span_term("body", "gamma"),
            ],
            slop: 1,
            in_order: true,
            boost: 1.0,
        })),
        exclude: Box::new(SpanQuery::span_term("body", "beta")),
        boost: 1.0,
    }));
    // Doc 1: alpha gamma with no beta inside the span. Doc 3: the beta
    // occurrence sits inside the alpha..gamma span and kills it.
    assert_eq!(matching_docs(&searcher, &not), vec![1]);
}

#[test]
fn test_span_first_and_position_range() {
    let dir = build(&["target words here", "words target here", "words here target"]);
    let searcher = IndexSearcher::open(dir.as_ref(), &IndexConfig::default()).unwrap();

    // Positions are 1-based: first token occupies span [1, 2)
    let first = Query::Span(SpanQuery::First(SpanFirstQuery {
        inner: Box::new(SpanQuery::span_term("body", "target")),
        end: 2,
        boost: 1.0,
    }));
    assert_eq!(matching_docs(&searcher, &first), vec![0]);

    let middle = Query::Span(SpanQuery::PositionRange(SpanPositionRangeQuery {
        inner: Box::new(SpanQuery::span_term("body", "target")),
        start: 2,
        end: 3,
        boost: 1.0,
    }));
    assert_eq!(matching_docs(&searcher, &middle), vec![1]);
}

#[test]
fn test_span_payload_check() {
    let dir = Arc::new(RamDirectory::new());
    {
        let analyzer = Arc::new(PayloadAnalyzer::new("body", vec![vec![7u8], vec![9u8]]));
        let mut writer = IndexWriter::open(
            dir.clone() as Arc<dyn Directory>,
            analyzer,
            IndexConfig::default(),
        )
        .unwrap();
        // mark sits at an even position (payload 7) in doc 0 and an odd
        // position (payload 9) in doc 1
        for text in ["mark trailing", "leading mark"] {
            let mut doc = Document::new();
            doc.add(Field::unstored("body", text));
            writer.add_document(&doc).unwrap();
        }
        writer.close().unwrap();
    }
    let searcher = IndexSearcher::open(dir.as_ref(), &IndexConfig::default()).unwrap();

    let with_seven = Query::Span(SpanQuery::PayloadCheck(SpanPayloadCheckQuery {
        inner: Box::new(SpanQuery::span_term("body", "mark")),
        payloads: vec![vec![7u8]],
        boost: 1.0,
    }));
    assert_eq!(matching_docs(&searcher, &with_seven), vec![0]);

    let with_nine = Query::Span(SpanQuery::PayloadCheck(SpanPayloadCheckQuery {
        inner: Box::new(SpanQuery::span_term("body", "mark")),
        payloads: vec![vec![9u8]],
        boost: 1.0,
    }));
    assert_eq!(matching_docs(&searcher, &with_nine), vec![1]);
}

#[test]
fn test_span_rewrites_wildcard_into_or() {
    let dir = build(&["prefix_one tail", "prefix_two tail", "other tail"]);
    let searcher = IndexSearcher::open(dir.as_ref(), &IndexConfig::default()).unwrap();

    let span_multi = Query::Span(SpanQuery::MultiTerm(
        fathom::search::spans::SpanMultiTermQuery {
            inner: fathom::search::MultiTermQuery::prefix("body", "prefix_"),
            boost: 1.0,
        },
    ));
    let rewritten = searcher.rewrite(&span_multi).unwrap();
    match &rewritten {
        Query::Span(SpanQuery::Or(or)) => {
            assert_eq!(or.clauses.len(), 2);
            assert!(or
                .clauses
                .iter()
                .all(|c| matches!(c, SpanQuery::Term(_))));
        }
        other => panic!("expected span-or rewrite, got {:?}", other),
    }
    assert_eq!(matching_docs(&searcher, &span_multi), vec![0, 1]);

    // Nested: the multi-term rewrites inside a near
    let near = Query::Span(SpanQuery::Near(SpanNearQuery {
        clauses: vec![
            SpanQuery::MultiTerm(fathom::search::spans::SpanMultiTermQuery {
                inner: fathom::search::MultiTermQuery::prefix("body", "prefix_"),
                boost: 1.0,
            }),
            SpanQuery::span_term("body", "tail"),
        ],
        slop: 0,
        in_order: true,
        boost: 1.0,
    }));
    assert_eq!(matching_docs(&searcher, &near), vec![0, 1]);
}
