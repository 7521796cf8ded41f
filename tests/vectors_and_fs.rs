use std::sync::Arc;

use fathom::analysis::SimpleAnalyzer;
use fathom::index::{Document, Field, FieldValue, IndexReader, IndexWriter, Term};
use fathom::search::{IndexSearcher, Query};
use fathom::store::{Directory, FsDirectory, MmapDirectory};
use fathom::IndexConfig;

fn vectored_body(text: &str) -> Field {
    Field::text("body", text).with_term_vectors(true, true)
}

#[test]
fn test_term_vectors_round_trip_and_totals() {
    let tmp = tempfile::tempdir().unwrap();
    let dir = Arc::new(FsDirectory::open(tmp.path()).unwrap());
    {
        let mut writer = IndexWriter::open(
            dir.clone() as Arc<dyn Directory>,
            Arc::new(SimpleAnalyzer),
            IndexConfig::default(),
        )
        .unwrap();
        for text in ["sun rises sun sets", "moon rises"] {
            let mut doc = Document::new();
            doc.add(vectored_body(text));
            writer.add_document(&doc).unwrap();
        }
        writer.close().unwrap();
    }

    let reader = fathom::index::open_reader(dir.as_ref(), &IndexConfig::default()).unwrap();
    let leaves = reader.leaves();
    let (segment, _) = leaves[0];

    let vector = segment.term_vector(0, "body").unwrap().unwrap();
    let sun = vector.entries.iter().find(|e| e.term == "sun").unwrap();
    assert_eq!(sun.freq, 2);
    assert_eq!(sun.positions, vec![1, 3]);
    assert_eq!(sun.offsets[0], (0, 3));

    // Summing doc_freq over the dictionary equals the total number of
    // (doc, term) pairs recorded in the vectors
    let mut dict_pairs = 0u64;
    let mut terms = segment.terms().unwrap();
    while terms.next().unwrap() {
        dict_pairs += terms.doc_freq() as u64;
    }
    let mut vector_pairs = 0u64;
    for doc in 0..segment.max_doc() {
        for (_field, vector) in segment.term_vectors(doc).unwrap() {
            vector_pairs += vector.entries.len() as u64;
        }
    }
    assert_eq!(dict_pairs, vector_pairs);
}

#[test]
fn test_mmap_directory_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    {
        let dir = Arc::new(FsDirectory::open(tmp.path()).unwrap());
        let mut writer = IndexWriter::open(
            dir.clone() as Arc<dyn Directory>,
            Arc::new(SimpleAnalyzer),
            IndexConfig::default(),
        )
        .unwrap();
        for i in 0..100u32 {
            let mut doc = Document::new();
            doc.add(Field::text("body", format!("common word{}", i % 10)));
            doc.add(Field::stored("payload", FieldValue::Bytes(vec![i as u8; 8])));
            writer.add_document(&doc).unwrap();
        }
        writer.close().unwrap();
    }

    // The same files searched through the mmap read path
    let dir = MmapDirectory::open(tmp.path()).unwrap();
    let searcher = IndexSearcher::open(&dir, &IndexConfig::default()).unwrap();
    let top = searcher.search(&Query::term("body", "word3"), 100).unwrap();
    assert_eq!(top.total_hits, 10);
    for hit in &top.score_docs {
        assert_eq!(hit.doc % 10, 3);
        let doc = searcher.doc(hit.doc).unwrap();
        assert_eq!(
            doc.get_value("payload").map(|v| v.as_bytes().to_vec()),
            Some(vec![hit.doc as u8; 8])
        );
    }
    assert_eq!(
        searcher.doc_freq(&Term::new("body", "common")).unwrap(),
        100
    );
}
