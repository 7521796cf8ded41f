use std::sync::Arc;

use fathom::analysis::SimpleAnalyzer;
use fathom::index::{Document, Field, FieldFlags, FieldValue, IndexWriter};
use fathom::search::{IndexSearcher, PhraseQuery, Query};
use fathom::store::RamDirectory;
use fathom::IndexConfig;

fn body_field(text: &str) -> Field {
    // Norms off keeps same-tf docs at identical scores, so ties resolve
    // by doc id
    Field::new(
        "body",
        FieldValue::Text(text.to_string()),
        FieldFlags {
            indexed: true,
            tokenized: true,
            stored: true,
            omit_norms: true,
            ..FieldFlags::default()
        },
    )
}

fn build_index(dir: &Arc<RamDirectory>) {
    let mut writer = IndexWriter::open(
        dir.clone() as Arc<dyn fathom::Directory>,
        Arc::new(SimpleAnalyzer),
        IndexConfig::default(),
    )
    .unwrap();
    for text in ["the quick brown fox", "the lazy dog", "quick brown dog"] {
        let mut doc = Document::new();
        doc.add(body_field(text));
        writer.add_document(&doc).unwrap();
    }
    writer.close().unwrap();
}

#[test]
fn test_term_query_top_docs() {
    let dir = Arc::new(RamDirectory::new());
    build_index(&dir);
    let searcher = IndexSearcher::open(dir.as_ref(), &IndexConfig::default()).unwrap();

    let top = searcher.search(&Query::term("body", "quick"), 2).unwrap();
    assert_eq!(top.total_hits, 2);
    let docs: Vec<u32> = top.score_docs.iter().map(|d| d.doc).collect();
    assert_eq!(docs, vec![0, 2], "equal scores tie-break by doc id");
    assert!((top.score_docs[0].score - top.score_docs[1].score).abs() < 1e-6);
}

#[test]
fn test_exact_phrase() {
    let dir = Arc::new(RamDirectory::new());
    build_index(&dir);
    let searcher = IndexSearcher::open(dir.as_ref(), &IndexConfig::default()).unwrap();

    let phrase = Query::Phrase(PhraseQuery::new("body").add("quick").add("brown"));
    let top = searcher.search(&phrase, 10).unwrap();
    let docs: Vec<u32> = top.score_docs.iter().map(|d| d.doc).collect();
    assert_eq!(docs.len(), 2);
    assert!(docs.contains(&0) && docs.contains(&2));
}

#[test]
fn test_sloppy_phrase() {
    let dir = Arc::new(RamDirectory::new());
    build_index(&dir);
    let searcher = IndexSearcher::open(dir.as_ref(), &IndexConfig::default()).unwrap();

    let phrase = Query::Phrase(
        PhraseQuery::new("body")
            .add("quick")
            .add("dog")
            .with_slop(2),
    );
    let top = searcher.search(&phrase, 10).unwrap();
    let docs: Vec<u32> = top.score_docs.iter().map(|d| d.doc).collect();
    assert_eq!(docs, vec![2], "only 'quick brown dog' fits within slop 2");
}

#[test]
fn test_stored_fields_round_trip() {
    let dir = Arc::new(RamDirectory::new());
    build_index(&dir);
    let searcher = IndexSearcher::open(dir.as_ref(), &IndexConfig::default()).unwrap();

    let doc = searcher.doc(1).unwrap();
    assert_eq!(
        doc.get_value("body").and_then(|v| v.as_text()),
        Some("the lazy dog")
    );
}

#[test]
fn test_missing_term_matches_nothing() {
    let dir = Arc::new(RamDirectory::new());
    build_index(&dir);
    let searcher = IndexSearcher::open(dir.as_ref(), &IndexConfig::default()).unwrap();

    let top = searcher.search(&Query::term("body", "zebra"), 10).unwrap();
    assert_eq!(top.total_hits, 0);
    assert_eq!(top.max_score, 0.0);
}
