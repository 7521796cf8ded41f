use std::sync::Arc;

use fathom::analysis::PayloadAnalyzer;
use fathom::index::{Document, Field, IndexWriter, Term};
use fathom::search::{IndexSearcher, PayloadFunction, PayloadTermQuery, Query};
use fathom::store::{Directory, RamDirectory};
use fathom::IndexConfig;

/// 1000 docs; every tenth contains "seventy" in `multi`, and every
/// hundredth contains it twice. The analyzer attaches payload [2] and [4]
/// to alternating positions.
fn build() -> Arc<RamDirectory> {
    let dir = Arc::new(RamDirectory::new());
    let analyzer = Arc::new(PayloadAnalyzer::new("multi", vec![vec![2u8], vec![4u8]]));
    let mut writer = IndexWriter::open(
        dir.clone() as Arc<dyn Directory>,
        analyzer,
        IndexConfig::default(),
    )
    .unwrap();
    for i in 0..1000u32 {
        let mut doc = Document::new();
        let text = if i % 100 == 0 {
            // Two occurrences land on both payload values
            "seventy seventy"
        } else if i % 10 == 0 {
            // One occurrence at an even position gets payload [2]
            "seventy filler"
        } else {
            "filler words"
        };
        doc.add(Field::unstored("multi", text));
        writer.add_document(&doc).unwrap();
    }
    writer.close().unwrap();
    dir
}

#[test]
fn test_max_payload_scores() {
    let dir = build();
    let searcher = IndexSearcher::open(dir.as_ref(), &IndexConfig::default())
        .unwrap()
        .with_similarity(Arc::new(fathom::search::PayloadByteSimilarity));

    let query = Query::Payload(PayloadTermQuery::new(
        Term::new("multi", "seventy"),
        PayloadFunction::Max,
        false,
    ));
    let top = searcher.search(&query, 1000).unwrap();
    assert_eq!(top.total_hits, 100);

    let mut fours = 0;
    let mut twos = 0;
    for hit in &top.score_docs {
        if (hit.score - 4.0).abs() < 1e-6 {
            fours += 1;
            assert_eq!(hit.doc % 100, 0);
        } else {
            assert!((hit.score - 2.0).abs() < 1e-6, "unexpected score {}", hit.score);
            twos += 1;
        }
    }
    assert_eq!(fours, 10, "double-occurrence docs see the [4] payload");
    assert_eq!(twos, 90);
    assert_eq!(top.max_score, 4.0);
}

#[test]
fn test_min_and_average_payloads() {
    let dir = build();
    let searcher = IndexSearcher::open(dir.as_ref(), &IndexConfig::default())
        .unwrap()
        .with_similarity(Arc::new(fathom::search::PayloadByteSimilarity));

    let min_query = Query::Payload(PayloadTermQuery::new(
        Term::new("multi", "seventy"),
        PayloadFunction::Min,
        false,
    ));
    let top = searcher.search(&min_query, 1000).unwrap();
    // Min is 2 whether the doc saw one payload or both
    for hit in &top.score_docs {
        assert!((hit.score - 2.0).abs() < 1e-6);
    }

    let avg_query = Query::Payload(PayloadTermQuery::new(
        Term::new("multi", "seventy"),
        PayloadFunction::Average,
        false,
    ));
    let top = searcher.search(&avg_query, 1000).unwrap();
    let mut threes = 0;
    for hit in &top.score_docs {
        if (hit.score - 3.0).abs() < 1e-6 {
            threes += 1;
        }
    }
    assert_eq!(threes, 10, "double docs average (2+4)/2");
}
