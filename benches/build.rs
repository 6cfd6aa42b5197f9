use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fastnj::{build_tree, BuildConfig, SequenceRecord};

fn synthetic_alignment(n: usize, columns: usize) -> Vec<SequenceRecord> {
    let bases = ['A', 'T', 'C', 'G'];
    let mut state = 0x9e3779b97f4a7c15u64;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };
    (0..n)
        .map(|i| {
            let seq: String = (0..columns)
                .map(|_| bases[(next() % 4) as usize])
                .collect();
            SequenceRecord::new(format!("S{}", i), seq)
        })
        .collect()
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_tree");
    for &n in &[16usize, 64, 128] {
        let records = synthetic_alignment(n, 200);
        group.bench_with_input(BenchmarkId::from_parameter(n), &records, |b, records| {
            b.iter(|| build_tree(black_box(records), &BuildConfig::default()).unwrap());
        });
    }
    group.finish();
}

fn bench_build_bootstrap(c: &mut Criterion) {
    let records = synthetic_alignment(32, 200);
    let config = BuildConfig::with_bootstrap();
    c.bench_function("build_tree_bootstrap_32", |b| {
        b.iter(|| build_tree(black_box(&records), &config).unwrap());
    });
}

criterion_group!(benches, bench_build, bench_build_bootstrap);
criterion_main!(benches);
