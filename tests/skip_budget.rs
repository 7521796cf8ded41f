use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fathom::analysis::WhitespaceAnalyzer;
use fathom::core::Result;
use fathom::index::{Document, Field, IndexReader, IndexWriter, Term, TermDocs};
use fathom::store::input::CountingIndexInput;
use fathom::store::output::IndexOutput;
use fathom::store::{Directory, IndexInput, Lock, RamDirectory};
use fathom::IndexConfig;

/// Counts bytes read from the frequency file, across all cursor clones
struct FreqCountingDirectory {
    inner: Arc<RamDirectory>,
    freq_bytes: Arc<AtomicU64>,
}

impl Directory for FreqCountingDirectory {
    fn list(&self) -> Result<Vec<String>> {
        self.inner.list()
    }
    fn exists(&self, name: &str) -> Result<bool> {
        self.inner.exists(name)
    }
    fn length(&self, name: &str) -> Result<u64> {
        self.inner.length(name)
    }
    fn modified(&self, name: &str) -> Result<DateTime<Utc>> {
        self.inner.modified(name)
    }
    fn create_output(&self, name: &str) -> Result<Box<dyn IndexOutput>> {
        self.inner.create_output(name)
    }
    fn open_input(&self, name: &str) -> Result<Box<dyn IndexInput>> {
        let input = self.inner.open_input(name)?;
        if name.ends_with(".frq") {
            Ok(Box::new(CountingIndexInput::with_counter(
                input,
                self.freq_bytes.clone(),
            )))
        } else {
            Ok(input)
        }
    }
    fn delete(&self, name: &str) -> Result<()> {
        self.inner.delete(name)
    }
    fn make_lock(&self, name: &str) -> Box<dyn Lock> {
        self.inner.make_lock(name)
    }
    fn sync(&self, name: &str) -> Result<()> {
        self.inner.sync(name)
    }
}

#[test]
fn test_multi_level_skipping_reads_few_freq_bytes() {
    let ram = Arc::new(RamDirectory::new());
    {
        let mut writer = IndexWriter::open(
            ram.clone() as Arc<dyn Directory>,
            Arc::new(WhitespaceAnalyzer),
            IndexConfig::default(),
        )
        .unwrap();
        for _ in 0..5000 {
            let mut doc = Document::new();
            doc.add(Field::unstored("body", "a"));
            writer.add_document(&doc).unwrap();
        }
        writer.close().unwrap();
    }

    let freq_bytes = Arc::new(AtomicU64::new(0));
    let counting = FreqCountingDirectory {
        inner: ram,
        freq_bytes: freq_bytes.clone(),
    };
    let reader = fathom::index::open_reader(&counting, &IndexConfig::default()).unwrap();
    let mut postings = reader
        .term_docs(&Term::new("body", "a"))
        .unwrap()
        .expect("term must exist");

    for target in [14u32, 17, 287, 4800] {
        assert!(postings.advance(target).unwrap());
        assert_eq!(postings.doc(), target, "every doc matches, so advance lands exactly");
    }

    let bytes = freq_bytes.load(Ordering::Relaxed);
    assert!(
        bytes <= 300,
        "skipping should touch at most ~250 freq bytes (±20%), read {}",
        bytes
    );
    assert!(bytes > 0);
}

#[test]
fn test_advance_agrees_with_linear_scan() {
    let ram = Arc::new(RamDirectory::new());
    {
        let mut writer = IndexWriter::open(
            ram.clone() as Arc<dyn Directory>,
            Arc::new(WhitespaceAnalyzer),
            IndexConfig::default(),
        )
        .unwrap();
        // Term 'b' appears in every third doc only
        for i in 0..3000 {
            let mut doc = Document::new();
            let text = if i % 3 == 0 { "a b" } else { "a" };
            doc.add(Field::unstored("body", text));
            writer.add_document(&doc).unwrap();
        }
        writer.close().unwrap();
    }
    let reader = fathom::index::open_reader(ram.as_ref(), &IndexConfig::default()).unwrap();

    // Collect via linear next()
    let mut linear = Vec::new();
    let mut postings = reader.term_docs(&Term::new("body", "b")).unwrap().unwrap();
    while postings.next().unwrap() {
        linear.push(postings.doc());
    }
    assert_eq!(linear.len(), 1000);

    // Every advance must land on the ceiling the linear scan predicts
    let mut skipping = reader.term_docs(&Term::new("body", "b")).unwrap().unwrap();
    for target in [1u32, 2, 3, 100, 101, 1000, 2500, 2998] {
        let expected = linear.iter().copied().find(|&d| d >= target);
        let found = skipping.advance(target).unwrap();
        match expected {
            Some(doc) => {
                assert!(found);
                assert_eq!(skipping.doc(), doc, "advance({}) diverged from linear scan", target);
            }
            None => assert!(!found),
        }
    }
    // Advance past the end stays exhausted
    assert!(!skipping.advance(5000).unwrap());
    assert!(!skipping.next().unwrap());
}
