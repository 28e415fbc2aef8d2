// Benchmark for tone sweep expansion and block parsing
// Run with: cargo bench

use criterion::{Criterion, criterion_group, criterion_main};
use firmbridge::{BlockArgs, Request};
use firmbridge_shared::ToneRequest;
use std::hint::black_box;

fn bench_full_range_sweep(c: &mut Criterion) {
    let request = ToneRequest::new(16.35, 4978.03, 1.0, 10, 0).unwrap();
    c.bench_function("expand C0..Eb8 in 1 Hz steps", |b| {
        b.iter(|| {
            let steps = black_box(&request).steps().count();
            assert_eq!(steps, 4963);
        });
    });
}

fn bench_block_parsing(c: &mut Criterion) {
    let args: BlockArgs = [
        ("INITIALTONE", "16.35"),
        ("FINALTONE", "4978.03"),
        ("STEP", "20"),
        ("DRUATION", "100"),
        ("SILENT", "0"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    c.bench_function("parse bendTones block", |b| {
        b.iter(|| {
            let request = Request::from_block(black_box("bendTones"), black_box(&args));
            assert!(request.is_ok());
        });
    });
}

criterion_group!(benches, bench_full_range_sweep, bench_block_parsing);
criterion_main!(benches);
