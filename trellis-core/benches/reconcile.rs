//! Reconciliation pass benchmarks.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use trellis_core::render::{DiffRenderer, ManualFrames, MemorySink};
use trellis_core::tree::tags::{li, ul};
use trellis_core::tree::Node;

fn mounted_list(width: usize) -> (DiffRenderer, Vec<Node>) {
    let sink = Arc::new(MemorySink::new());
    let frames = Arc::new(ManualFrames::new());
    let renderer = DiffRenderer::new(sink.clone(), frames);
    let root = renderer.mount(sink.create_root("BODY"), "BODY");
    let items: Vec<Node> = (0..width).map(|i| li().text(format!("item {i}"))).collect();
    root.children([ul().children(items.clone())]);
    renderer.render_now();
    (renderer, items)
}

fn bench_initial_mount(c: &mut Criterion) {
    let mut group = c.benchmark_group("initial_mount");
    for width in [10usize, 100, 1_000] {
        group.throughput(Throughput::Elements(width as u64));
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, &width| {
            b.iter(|| black_box(mounted_list(width)));
        });
    }
    group.finish();
}

fn bench_text_updates(c: &mut Criterion) {
    let mut group = c.benchmark_group("text_updates");
    for width in [10usize, 100, 1_000] {
        let (renderer, items) = mounted_list(width);
        let mut round = 0u64;
        group.throughput(Throughput::Elements(width as u64));
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, _| {
            b.iter(|| {
                round += 1;
                for item in &items {
                    item.text(format!("round {round}"));
                }
                black_box(renderer.render_now())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_initial_mount, bench_text_updates);
criterion_main!(benches);
