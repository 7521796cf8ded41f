use std::sync::Arc;

use fathom::analysis::SimpleAnalyzer;
use fathom::index::{Document, Field, FieldValue, IndexReader, IndexWriter, Term, TermDocs};
use fathom::search::{IndexSearcher, Query, Sort, ThreadPool};
use fathom::store::{Directory, RamDirectory};
use fathom::{ErrorKind, IndexConfig};

fn small_buffer_config() -> IndexConfig {
    // Tiny doc budget forces several segments
    IndexConfig::default().with_max_buffered_docs(10)
}

fn add_doc(writer: &mut IndexWriter, id: u32, body: &str) {
    let mut doc = Document::new();
    doc.add(Field::keyword("id", format!("{:04}", id)));
    doc.add(Field::text("body", body));
    writer.add_document(&doc).unwrap();
}

#[test]
fn test_multi_segment_search_matches_optimized() {
    let dir = Arc::new(RamDirectory::new());
    {
        let mut writer = IndexWriter::open(
            dir.clone() as Arc<dyn Directory>,
            Arc::new(SimpleAnalyzer),
            small_buffer_config().with_merge_factor(100),
        )
        .unwrap();
        for i in 0..95u32 {
            let body = if i % 7 == 0 {
                "shared rare token"
            } else {
                "shared common filler"
            };
            add_doc(&mut writer, i, body);
        }
        writer.commit().unwrap();
        assert!(writer.segment_count() > 1, "expected several segments");
        drop(writer);
    }

    let key = |s: &IndexSearcher, doc: u32| {
        s.doc(doc)
            .unwrap()
            .get_value("id")
            .and_then(|v| v.as_text().map(str::to_string))
            .unwrap()
    };

    let searcher = IndexSearcher::open(dir.as_ref(), &IndexConfig::default()).unwrap();
    let before = searcher.search(&Query::term("body", "rare"), 20).unwrap();
    assert_eq!(before.total_hits, 14);
    let keys_before: Vec<String> = before
        .score_docs
        .iter()
        .map(|d| key(&searcher, d.doc))
        .collect();
    drop(searcher);

    // Merge everything into one segment
    {
        let mut writer = IndexWriter::open(
            dir.clone() as Arc<dyn Directory>,
            Arc::new(SimpleAnalyzer),
            IndexConfig::default(),
        )
        .unwrap();
        writer.optimize().unwrap();
        assert_eq!(writer.segment_count(), 1);
        writer.close().unwrap();
    }

    let searcher = IndexSearcher::open(dir.as_ref(), &IndexConfig::default()).unwrap();
    let after = searcher.search(&Query::term("body", "rare"), 20).unwrap();
    assert_eq!(after.total_hits, before.total_hits);

    // Doc ids may shift under merging, so compare by stored key
    let keys_after: Vec<String> = after.score_docs.iter().map(|d| key(&searcher, d.doc)).collect();
    assert_eq!(keys_before, keys_after, "merge must preserve ranking");
}

#[test]
fn test_delete_documents() {
    let dir = Arc::new(RamDirectory::new());
    {
        let mut writer = IndexWriter::open(
            dir.clone() as Arc<dyn Directory>,
            Arc::new(SimpleAnalyzer),
            IndexConfig::default(),
        )
        .unwrap();
        for i in 0..20u32 {
            add_doc(&mut writer, i, "payload text");
        }
        writer.commit().unwrap();
        writer.delete_documents(Term::new("id", "0005")).unwrap();
        writer.delete_documents(Term::new("id", "0011")).unwrap();
        writer.commit().unwrap();
        assert_eq!(writer.num_docs().unwrap(), 18);
        writer.close().unwrap();
    }

    let reader = fathom::index::open_reader(dir.as_ref(), &IndexConfig::default()).unwrap();
    assert_eq!(reader.num_docs(), 18);
    assert_eq!(reader.max_doc(), 20);
    assert!(reader.is_deleted(5));
    assert!(reader.is_deleted(11));
    assert!(!reader.is_deleted(4));

    let searcher = IndexSearcher::new(reader);
    let top = searcher.search(&Query::term("body", "payload"), 30).unwrap();
    assert_eq!(top.total_hits, 18);
    assert!(top.score_docs.iter().all(|d| d.doc != 5 && d.doc != 11));

    // Optimizing drops the deleted docs for good
    {
        let mut writer = IndexWriter::open(
            dir.clone() as Arc<dyn Directory>,
            Arc::new(SimpleAnalyzer),
            IndexConfig::default(),
        )
        .unwrap();
        writer.optimize().unwrap();
        writer.close().unwrap();
    }
    let reader = fathom::index::open_reader(dir.as_ref(), &IndexConfig::default()).unwrap();
    assert_eq!(reader.max_doc(), 18);
    assert!(!reader.has_deletions());
}

#[test]
fn test_round_trip_stored_and_postings() {
    let dir = Arc::new(RamDirectory::new());
    let n = 50u32;
    {
        let mut writer = IndexWriter::open(
            dir.clone() as Arc<dyn Directory>,
            Arc::new(SimpleAnalyzer),
            IndexConfig::default(),
        )
        .unwrap();
        for i in 0..n {
            let mut doc = Document::new();
            doc.add(Field::keyword("id", format!("{:04}", i)));
            doc.add(Field::text("body", format!("term{} always", i % 5)));
            doc.add(Field::stored(
                "blob",
                FieldValue::Bytes(vec![(i % 251) as u8; 16]),
            ));
            writer.add_document(&doc).unwrap();
        }
        writer.close().unwrap();
    }

    let reader = fathom::index::open_reader(dir.as_ref(), &IndexConfig::default()).unwrap();
    assert_eq!(reader.num_docs(), n);
    // Stored values come back byte for byte
    for i in 0..n {
        let doc = reader.document(i).unwrap();
        assert_eq!(
            doc.get_value("id").and_then(|v| v.as_text()),
            Some(format!("{:04}", i).as_str())
        );
        assert_eq!(
            doc.get_value("blob").map(|v| v.as_bytes().to_vec()),
            Some(vec![(i % 251) as u8; 16])
        );
    }
    // Each indexed term yields exactly the source docs
    for bucket in 0..5u32 {
        let mut postings = reader
            .term_docs(&Term::new("body", format!("term{}", bucket)))
            .unwrap()
            .unwrap();
        let mut got = Vec::new();
        while postings.next().unwrap() {
            got.push(postings.doc());
        }
        let expected: Vec<u32> = (0..n).filter(|i| i % 5 == bucket).collect();
        assert_eq!(got, expected);
    }
    // doc_freq equals the length of the posting list
    assert_eq!(reader.doc_freq(&Term::new("body", "always")).unwrap(), n);
}

#[test]
fn test_write_lock_excludes_second_writer() {
    let dir = Arc::new(RamDirectory::new());
    let writer = IndexWriter::open(
        dir.clone() as Arc<dyn Directory>,
        Arc::new(SimpleAnalyzer),
        IndexConfig::default(),
    )
    .unwrap();

    let mut quick = IndexConfig::default();
    quick.write_lock_timeout_ms = 120;
    let second = IndexWriter::open(
        dir.clone() as Arc<dyn Directory>,
        Arc::new(SimpleAnalyzer),
        quick.clone(),
    );
    match second {
        Err(e) => assert_eq!(e.kind, ErrorKind::LockFailed),
        Ok(_) => panic!("second writer must not obtain the lock"),
    }

    writer.close().unwrap();
    // Lock released; a new writer may open
    IndexWriter::open(
        dir.clone() as Arc<dyn Directory>,
        Arc::new(SimpleAnalyzer),
        quick,
    )
    .unwrap();
}

#[test]
fn test_sorted_search_by_stored_field() {
    let dir = Arc::new(RamDirectory::new());
    {
        let mut writer = IndexWriter::open(
            dir.clone() as Arc<dyn Directory>,
            Arc::new(SimpleAnalyzer),
            IndexConfig::default(),
        )
        .unwrap();
        for (i, name) in ["delta", "alpha", "charlie", "bravo"].iter().enumerate() {
            let mut doc = Document::new();
            doc.add(Field::keyword("name", *name));
            doc.add(Field::text("body", format!("entry {}", i)));
            writer.add_document(&doc).unwrap();
        }
        writer.close().unwrap();
    }
    let searcher = IndexSearcher::open(dir.as_ref(), &IndexConfig::default()).unwrap();

    let top = searcher
        .search_sorted(&Query::term("body", "entry"), 10, &Sort::by_field("name", false))
        .unwrap();
    let names: Vec<String> = top
        .score_docs
        .iter()
        .map(|d| {
            searcher
                .doc(d.doc)
                .unwrap()
                .get_value("name")
                .unwrap()
                .as_text()
                .unwrap()
                .to_string()
        })
        .collect();
    assert_eq!(names, vec!["alpha", "bravo", "charlie", "delta"]);

    let reversed = searcher
        .search_sorted(&Query::term("body", "entry"), 10, &Sort::by_field("name", true))
        .unwrap();
    let names: Vec<u32> = reversed.score_docs.iter().map(|d| d.doc).collect();
    assert_eq!(names, vec![0, 2, 3, 1]);
}

#[test]
fn test_parallel_multi_searcher_merges_hits() {
    let make_index = |texts: &[&str]| {
        let dir = Arc::new(RamDirectory::new());
        let mut writer = IndexWriter::open(
            dir.clone() as Arc<dyn Directory>,
            Arc::new(SimpleAnalyzer),
            IndexConfig::default(),
        )
        .unwrap();
        for text in texts {
            let mut doc = Document::new();
            doc.add(Field::text("body", *text));
            writer.add_document(&doc).unwrap();
        }
        writer.close().unwrap();
        dir
    };
    let dir_a = make_index(&["needle one", "hay"]);
    let dir_b = make_index(&["hay bale", "needle two", "needle three"]);

    let searchers = vec![
        Arc::new(IndexSearcher::open(dir_a.as_ref(), &IndexConfig::default()).unwrap()),
        Arc::new(IndexSearcher::open(dir_b.as_ref(), &IndexConfig::default()).unwrap()),
    ];
    let parallel =
        fathom::search::ParallelMultiSearcher::new(searchers.clone(), ThreadPool::new(4));
    let top = parallel.search(&Query::term("body", "needle"), 10).unwrap();
    assert_eq!(top.total_hits, 3);
    let mut docs: Vec<u32> = top.score_docs.iter().map(|d| d.doc).collect();
    docs.sort_unstable();
    // Second searcher's docs sit above the first's base (max_doc = 2)
    assert_eq!(docs, vec![0, 3, 4]);

    let serial = fathom::search::MultiSearcher::new(searchers);
    let serial_top = serial.search(&Query::term("body", "needle"), 10).unwrap();
    assert_eq!(serial_top.total_hits, 3);
}
