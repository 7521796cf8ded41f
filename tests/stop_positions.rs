use std::collections::HashSet;
use std::sync::Arc;

use fathom::analysis::{StopAnalyzer, StopFilter, TokenStream, WhitespaceTokenizer};
use fathom::index::{Document, Field, IndexReader, IndexWriter, Term, TermDocs, TermPositions};
use fathom::store::{Directory, RamDirectory};
use fathom::IndexConfig;

const NUMBERS: [&str; 19] = [
    "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten", "eleven",
    "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen", "nineteen",
];

/// Stop words: every number that is not a multiple of three
fn stop_words() -> HashSet<String> {
    NUMBERS
        .iter()
        .enumerate()
        .filter(|(i, _)| (i + 1) % 3 != 0)
        .map(|(_, w)| w.to_string())
        .collect()
}

#[test]
fn test_stop_filter_preserves_positions() {
    let text = NUMBERS.join(" ");
    let mut stream = StopFilter::new(
        Box::new(WhitespaceTokenizer::new(&text)),
        stop_words(),
        true,
    );
    let mut position = 0;
    let mut at = Vec::new();
    while stream.increment_token().unwrap() {
        position += stream.token().position_increment;
        at.push((stream.token().term.clone(), position));
    }
    // "six" keeps its textual position even though it is only the second
    // surviving token
    assert!(at.contains(&("six".to_string(), 6)));
    assert_eq!(at[0], ("three".to_string(), 3));
    assert_eq!(at[1], ("six".to_string(), 6));
}

#[test]
fn test_stop_filter_without_increments_collapses_positions() {
    let text = NUMBERS.join(" ");
    let mut stream = StopFilter::new(
        Box::new(WhitespaceTokenizer::new(&text)),
        stop_words(),
        false,
    );
    let mut position = 0;
    let mut six_position = 0;
    while stream.increment_token().unwrap() {
        position += stream.token().position_increment;
        if stream.token().term == "six" {
            six_position = position;
        }
    }
    assert_eq!(six_position, 2, "without increments six is just the 2nd token");
}

#[test]
fn test_indexed_positions_survive_stop_words() {
    let dir = Arc::new(RamDirectory::new());
    let analyzer = Arc::new(StopAnalyzer::new(stop_words(), true));
    {
        let mut writer = IndexWriter::open(
            dir.clone() as Arc<dyn Directory>,
            analyzer,
            IndexConfig::default(),
        )
        .unwrap();
        let mut doc = Document::new();
        doc.add(Field::unstored("body", NUMBERS.join(" ")));
        writer.add_document(&doc).unwrap();
        writer.close().unwrap();
    }

    let reader = fathom::index::open_reader(dir.as_ref(), &IndexConfig::default()).unwrap();
    let mut positions = reader
        .term_positions(&Term::new("body", "six"))
        .unwrap()
        .expect("six must be indexed");
    assert!(positions.next().unwrap());
    assert_eq!(positions.doc(), 0);
    assert_eq!(positions.freq(), 1);
    assert_eq!(positions.next_position().unwrap(), 6);
}
