use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use rand::{rngs::StdRng, Rng, SeedableRng};

use fathom::analysis::SimpleAnalyzer;
use fathom::index::{Document, Field, IndexWriter};
use fathom::search::{BooleanQuery, IndexSearcher, PhraseQuery, Query};
use fathom::store::{Directory, RamDirectory};
use fathom::IndexConfig;

const WORDS: [&str; 16] = [
    "search", "engine", "index", "segment", "postings", "query", "scorer", "term", "field",
    "document", "merge", "flush", "skip", "norm", "payload", "vector",
];

fn build_index(doc_count: usize) -> Arc<RamDirectory> {
    let mut rng = StdRng::seed_from_u64(7);
    let dir = Arc::new(RamDirectory::new());
    let mut writer = IndexWriter::open(
        dir.clone() as Arc<dyn Directory>,
        Arc::new(SimpleAnalyzer),
        IndexConfig::default(),
    )
    .unwrap();
    for _ in 0..doc_count {
        let mut body = String::new();
        for _ in 0..30 {
            body.push_str(WORDS[rng.gen_range(0..WORDS.len())]);
            body.push(' ');
        }
        let mut doc = Document::new();
        doc.add(Field::text("body", body));
        writer.add_document(&doc).unwrap();
    }
    writer.close().unwrap();
    dir
}

fn bench_search(c: &mut Criterion) {
    let dir = build_index(20_000);
    let searcher = IndexSearcher::open(dir.as_ref(), &IndexConfig::default()).unwrap();

    c.bench_function("term_query_top10", |b| {
        let query = Query::term("body", "segment");
        b.iter(|| searcher.search(&query, 10).unwrap());
    });

    c.bench_function("boolean_and_top10", |b| {
        let query = Query::Boolean(
            BooleanQuery::new()
                .with_must(Query::term("body", "segment"))
                .with_must(Query::term("body", "scorer")),
        );
        b.iter(|| searcher.search(&query, 10).unwrap());
    });

    c.bench_function("phrase_top10", |b| {
        let query = Query::Phrase(PhraseQuery::new("body").add("segment").add("postings"));
        b.iter(|| searcher.search(&query, 10).unwrap());
    });
}

criterion_group!(benches, bench_search);
criterion_main!(benches);
