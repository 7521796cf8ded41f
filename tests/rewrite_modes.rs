use std::sync::Arc;

use fathom::analysis::WhitespaceAnalyzer;
use fathom::index::{Document, Field, IndexWriter};
use fathom::search::{
    ConstantScoreInner, IndexSearcher, MultiTermQuery, Query, RewriteMethod,
};
use fathom::store::{Directory, RamDirectory};
use fathom::IndexConfig;

/// One doc per distinct term `th0000 … thNNNN`
fn build(term_count: usize) -> Arc<RamDirectory> {
    let dir = Arc::new(RamDirectory::new());
    let mut writer = IndexWriter::open(
        dir.clone() as Arc<dyn Directory>,
        Arc::new(WhitespaceAnalyzer),
        IndexConfig::default(),
    )
    .unwrap();
    for i in 0..term_count {
        let mut doc = Document::new();
        doc.add(Field::unstored("body", format!("th{:04} other", i)));
        writer.add_document(&doc).unwrap();
    }
    writer.close().unwrap();
    dir
}

#[test]
fn test_auto_rewrite_switches_to_filter_past_term_cutoff() {
    let dir = build(500);
    let searcher = IndexSearcher::open(dir.as_ref(), &IndexConfig::default()).unwrap();

    // A generous doc cutoff isolates the term-count trigger: 500
    // matching terms must cross the 350-term threshold
    let query = Query::MultiTerm(MultiTermQuery::wildcard("body", "th*").with_rewrite(
        RewriteMethod::ConstantScoreAuto {
            term_count_cutoff: 350,
            doc_count_percent: 100.0,
        },
    ));
    let rewritten = searcher.rewrite(&query).unwrap();
    match rewritten {
        Query::ConstantScore(cs) => match cs.inner {
            ConstantScoreInner::Filter(_) => {}
            ConstantScoreInner::Query(_) => {
                panic!("500 matching terms exceed the 350 cutoff; expected the filter form")
            }
        },
        other => panic!("expected constant-score rewrite, got {:?}", other),
    }

    // The filter form still matches every doc
    let top = searcher.search(&query, 1000).unwrap();
    assert_eq!(top.total_hits, 500);

    // Under the cutoffs the expansion stays a scoring boolean
    let small = Query::MultiTerm(MultiTermQuery::wildcard("body", "th000*").with_rewrite(
        RewriteMethod::ConstantScoreAuto {
            term_count_cutoff: 350,
            doc_count_percent: 100.0,
        },
    ));
    match searcher.rewrite(&small).unwrap() {
        Query::ConstantScore(cs) => match cs.inner {
            ConstantScoreInner::Query(q) => match *q {
                Query::Boolean(b) => assert_eq!(b.clauses.len(), 10),
                other => panic!("expected boolean inside constant score, got {:?}", other),
            },
            ConstantScoreInner::Filter(_) => panic!("10 terms should stay a boolean"),
        },
        other => panic!("expected constant-score rewrite, got {:?}", other),
    }
}

#[test]
fn test_scoring_boolean_rewrite_caps_clauses() {
    let dir = build(50);
    let searcher = IndexSearcher::open(dir.as_ref(), &IndexConfig::default()).unwrap();

    let small = Query::MultiTerm(
        MultiTermQuery::wildcard("body", "th*")
            .with_rewrite(RewriteMethod::ScoringBoolean {
                max_clause_count: 1024,
            }),
    );
    match searcher.rewrite(&small).unwrap() {
        Query::Boolean(b) => assert_eq!(b.clauses.len(), 50),
        other => panic!("expected boolean expansion, got {:?}", other),
    }

    let capped = Query::MultiTerm(
        MultiTermQuery::wildcard("body", "th*")
            .with_rewrite(RewriteMethod::ScoringBoolean {
                max_clause_count: 10,
            }),
    );
    assert!(searcher.rewrite(&capped).is_err());
}

#[test]
fn test_top_terms_fuzzy_rewrite() {
    let dir = Arc::new(RamDirectory::new());
    {
        let mut writer = IndexWriter::open(
            dir.clone() as Arc<dyn Directory>,
            Arc::new(WhitespaceAnalyzer),
            IndexConfig::default(),
        )
        .unwrap();
        for text in ["fox", "fix", "fog", "box", "lynx", "fax"] {
            let mut doc = Document::new();
            doc.add(Field::unstored("body", text));
            writer.add_document(&doc).unwrap();
        }
        writer.close().unwrap();
    }
    let searcher = IndexSearcher::open(dir.as_ref(), &IndexConfig::default()).unwrap();

    let fuzzy = Query::MultiTerm(MultiTermQuery::fuzzy("body", "fox", 1, 0));
    let rewritten = searcher.rewrite(&fuzzy).unwrap();
    let Query::Boolean(b) = &rewritten else {
        panic!("fuzzy defaults to the top-terms boolean rewrite");
    };
    let expanded: Vec<String> = b
        .clauses
        .iter()
        .map(|c| match &c.query {
            Query::Term(t) => t.term.text.clone(),
            other => panic!("expected term clause, got {:?}", other),
        })
        .collect();
    assert!(expanded.contains(&"fox".to_string()));
    assert!(expanded.contains(&"fix".to_string()));
    assert!(expanded.contains(&"fog".to_string()));
    assert!(expanded.contains(&"box".to_string()));
    assert!(expanded.contains(&"fax".to_string()));
    assert!(!expanded.contains(&"lynx".to_string()));

    // The exact term carries the highest expansion boost
    let fox_boost = b
        .clauses
        .iter()
        .find_map(|c| match &c.query {
            Query::Term(t) if t.term.text == "fox" => Some(t.boost),
            _ => None,
        })
        .unwrap();
    for clause in &b.clauses {
        if let Query::Term(t) = &clause.query {
            assert!(t.boost <= fox_boost);
        }
    }

    // Searching the fuzzy query ranks the exact match first
    let top = searcher.search(&fuzzy, 10).unwrap();
    assert_eq!(top.score_docs[0].doc, 0);
}

#[test]
fn test_rewrite_is_idempotent() {
    let dir = build(20);
    let searcher = IndexSearcher::open(dir.as_ref(), &IndexConfig::default()).unwrap();

    let queries = vec![
        Query::MultiTerm(MultiTermQuery::wildcard("body", "th*")),
        Query::MultiTerm(MultiTermQuery::prefix("body", "th00")),
        Query::MultiTerm(MultiTermQuery::range(
            "body",
            Some("th0002".to_string()),
            Some("th0009".to_string()),
            true,
            true,
        )),
        Query::term("body", "other"),
    ];
    for query in queries {
        let once = searcher.rewrite(&query).unwrap();
        let twice = searcher.rewrite(&once).unwrap();
        assert_eq!(once, twice, "rewrite must be a fixed point for {:?}", query);
    }
}

#[test]
fn test_prefix_and_range_match_expected_docs() {
    let dir = build(30);
    let searcher = IndexSearcher::open(dir.as_ref(), &IndexConfig::default()).unwrap();

    let prefix = Query::MultiTerm(MultiTermQuery::prefix("body", "th000"));
    assert_eq!(searcher.search(&prefix, 100).unwrap().total_hits, 10);

    let range = Query::MultiTerm(MultiTermQuery::range(
        "body",
        Some("th0010".to_string()),
        Some("th0019".to_string()),
        true,
        false,
    ));
    assert_eq!(searcher.search(&range, 100).unwrap().total_hits, 9);
}
