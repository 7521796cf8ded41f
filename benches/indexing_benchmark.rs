use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{rngs::StdRng, Rng, SeedableRng};

use fathom::analysis::SimpleAnalyzer;
use fathom::index::{Document, Field, IndexWriter};
use fathom::store::{Directory, RamDirectory};
use fathom::IndexConfig;

const WORDS: [&str; 16] = [
    "search", "engine", "index", "segment", "postings", "query", "scorer", "term", "field",
    "document", "merge", "flush", "skip", "norm", "payload", "vector",
];

fn synth_doc(rng: &mut StdRng, words: usize) -> Document {
    let mut body = String::new();
    for _ in 0..words {
        body.push_str(WORDS[rng.gen_range(0..WORDS.len())]);
        body.push(' ');
    }
    let mut doc = Document::new();
    doc.add(Field::text("body", body));
    doc
}

fn bench_indexing(c: &mut Criterion) {
    let mut group = c.benchmark_group("indexing");
    for &doc_count in &[100usize, 1000] {
        group.throughput(Throughput::Elements(doc_count as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(doc_count),
            &doc_count,
            |b, &doc_count| {
                b.iter(|| {
                    let mut rng = StdRng::seed_from_u64(42);
                    let dir = Arc::new(RamDirectory::new());
                    let mut writer = IndexWriter::open(
                        dir.clone() as Arc<dyn Directory>,
                        Arc::new(SimpleAnalyzer),
                        IndexConfig::default(),
                    )
                    .unwrap();
                    for _ in 0..doc_count {
                        writer.add_document(&synth_doc(&mut rng, 40)).unwrap();
                    }
                    writer.close().unwrap();
                    dir
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_indexing);
criterion_main!(benches);
