//! Benchmarks for registration ranking, graph snapshots and pixel pulls
//!
//! Run with: cargo bench

use colorpipe::image::{DataType, Image, PixelLayout};
use colorpipe::modules;
use colorpipe::registration::rank;
use colorpipe::{ApiKind, Conversion, FilterGraph, FilterNode, Registry, Traversal};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn bench_rank(c: &mut Criterion) {
    let mut group = c.benchmark_group("registration_rank");

    let cases = [
        ("exact", "org/colorpipe/imaging/icc.lcms", "//imaging/icc.lcms"),
        ("optional", "org/colorpipe/imaging/icc.lcms._CPU", "//imaging/icc._CPU._GPU"),
        ("excluded", "org/colorpipe/imaging/icc.lcms", "//imaging/icc.-lcms"),
        ("api_scoped", "org/colorpipe/imaging/icc.lcms", "//imaging/icc.7+lcms"),
    ];
    for (name, registration, pattern) in cases {
        group.bench_function(name, |b| {
            b.iter(|| rank(black_box(registration), black_box(pattern), ApiKind::Run))
        });
    }

    group.finish();
}

fn copy_chain(registry: &Registry, len: usize) -> Vec<FilterNode> {
    let nodes: Vec<FilterNode> = (0..len)
        .filter_map(|_| registry.create_node("//imaging/copy", None).ok())
        .collect();
    for pair in nodes.windows(2) {
        let _ = FilterNode::connect(&pair[0], modules::DATA, &pair[1], modules::DATA);
    }
    nodes
}

fn bench_graph_from_node(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_from_node");
    let registry = Registry::with_builtins();

    for len in [4usize, 32, 256] {
        let nodes = copy_chain(&registry, len);
        let seed = &nodes[len / 2];
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), seed, |b, seed| {
            b.iter(|| black_box(FilterGraph::from_node(seed, Traversal::Both)))
        });
        for node in &nodes {
            node.detach();
        }
    }

    group.finish();
}

fn bench_copy_conversion(c: &mut Criterion) {
    let mut group = c.benchmark_group("copy_conversion");
    let registry = Registry::with_builtins();

    for size in [16u32, 128, 512] {
        let input = Image::new(size, size, PixelLayout::new(DataType::Float, 3));
        let output = Image::new(size, size, PixelLayout::new(DataType::Float, 3));
        let Ok(conversion) =
            Conversion::basic(&registry, input, Some(output), "//imaging/copy", None)
        else {
            continue;
        };

        group.throughput(Throughput::Elements(size as u64 * size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &conversion, |b, conv| {
            b.iter(|| black_box(conv.run_pixels(None).ok()))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_rank,
    bench_graph_from_node,
    bench_copy_conversion,
);

criterion_main!(benches);
