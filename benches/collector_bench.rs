//! Performance benchmarks for the coverage scan.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use diffexpr::{
    ChromId, CollectorConfig, CoverageCollector, Feature, FeatureKind, Mapping, MappingBatch,
    Strand,
};

fn synthetic_features(count: u64) -> Vec<Feature> {
    (0..count)
        .map(|i| {
            Feature::new(
                i + 1,
                format!("locus{i}"),
                i * 150,
                i * 150 + 120,
                if i % 2 == 0 {
                    Strand::Forward
                } else {
                    Strand::Reverse
                },
                ChromId(1),
                FeatureKind::Gene,
            )
        })
        .collect()
}

fn synthetic_batch(mappings: u64, span: u64) -> MappingBatch {
    MappingBatch::new(
        ChromId(1),
        (0..mappings)
            .map(|i| {
                let start = (i * 97) % span;
                Mapping::new(
                    start,
                    start + 80,
                    if i % 2 == 0 {
                        Strand::Forward
                    } else {
                        Strand::Reverse
                    },
                    1,
                )
            })
            .collect(),
    )
}

fn benchmark_batch_scan(c: &mut Criterion) {
    let features = synthetic_features(2_000);
    let batch = synthetic_batch(50_000, 2_000 * 150);

    c.bench_function("scan_2k_features_50k_mappings", |b| {
        b.iter(|| {
            let mut collector =
                CoverageCollector::new(&features, CollectorConfig::default());
            collector.accept(black_box(batch.clone()));
            black_box(collector.into_counts());
        });
    });
}

criterion_group!(benches, benchmark_batch_scan);
criterion_main!(benches);
