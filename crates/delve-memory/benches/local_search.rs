use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use delve_memory::document::{SplitterConfig, TextSplitter};
use delve_memory::in_memory_store::cosine_similarity;
use delve_memory::{InMemoryVectorStore, RecordMetadata, VectorRecord, VectorStore};
use std::hint::black_box;

const DIM: usize = 384;

#[allow(clippy::cast_precision_loss)]
fn vector(seed: usize) -> Vec<f32> {
    (0..DIM)
        .map(|i| ((seed * 31 + i * 17) % 97) as f32 / 97.0 - 0.5)
        .collect()
}

fn cosine(c: &mut Criterion) {
    let a = vector(1);
    let b = vector(2);
    c.bench_function("cosine_similarity_384", |bench| {
        bench.iter(|| cosine_similarity(black_box(&a), black_box(&b)));
    });
}

fn local_search(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let mut group = c.benchmark_group("local_search");

    for size in [100, 1_000, 10_000] {
        let store = InMemoryVectorStore::new();
        rt.block_on(async {
            for i in 0..size {
                store
                    .insert(
                        "bench",
                        VectorRecord {
                            id: format!("chunk_{i}"),
                            vector: vector(i),
                            metadata: RecordMetadata::default(),
                        },
                    )
                    .await
                    .unwrap();
            }
        });
        let query = vector(size / 2);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("top5", size), &query, |b, query| {
            b.iter(|| rt.block_on(store.search("bench", black_box(query.clone()), 5)));
        });
    }

    group.finish();
}

fn split(c: &mut Criterion) {
    let source = "fn handler(req: Request) -> Response {\n    let body = req.body();\n    \
                  respond(body)\n}\n\n"
        .repeat(500);
    let splitter = TextSplitter::new(SplitterConfig::default());
    let mut group = c.benchmark_group("splitter");
    group.throughput(Throughput::Bytes(source.len() as u64));
    group.bench_function("recursive_1000_200", |b| {
        b.iter(|| splitter.split_text(black_box(&source)));
    });
    group.finish();
}

criterion_group!(benches, cosine, local_search, split);
criterion_main!(benches);
