//! Benchmarks for rasterization, tile rendering and PNG encoding.
//!
//! Run with: cargo bench --package renderer --bench render_benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use raster_common::{BoundingBox, NoDataValues, RasterDataset, TileRequest};
use renderer::encode::encode_png;
use renderer::ramp::{RampConfig, RampResolver};
use renderer::rasterize::rasterize;
use renderer::tiles::render_tile;

const FIVE: [&str; 5] = ["#0000FF", "#00FF00", "#FFFF00", "#FF7F00", "#FF0000"];

/// Density-like raster: mostly zero, a few distinct integer classes.
fn generate_quantized_grid(width: usize, height: usize) -> Vec<f32> {
    let mut rng = rand::thread_rng();
    (0..width * height)
        .map(|_| {
            if rng.gen_bool(0.6) {
                -1.0
            } else {
                rng.gen_range(0..30) as f32
            }
        })
        .collect()
}

/// Continuous raster where almost every value is distinct.
fn generate_continuous_grid(width: usize, height: usize) -> Vec<f32> {
    let mut rng = rand::thread_rng();
    (0..width * height).map(|_| rng.gen_range(0.0..25.0)).collect()
}

fn dataset(samples: Vec<f32>, width: usize, height: usize) -> RasterDataset {
    RasterDataset::new(samples, width, height, BoundingBox::new(34.0, -5.0, 42.0, 5.0))
        .expect("bench dataset")
}

fn ramp() -> RampResolver {
    RampResolver::new(&RampConfig::ranges(vec![0.0, 2.0, 5.0, 10.0, 25.0], FIVE))
}

fn bench_rasterize(c: &mut Criterion) {
    let mut group = c.benchmark_group("rasterize");
    let ramp = ramp();
    let no_data = NoDataValues::default();

    for &(w, h) in &[(256usize, 256usize), (1024, 1024), (2048, 2048)] {
        group.throughput(Throughput::Elements((w * h) as u64));

        let quantized = dataset(generate_quantized_grid(w, h), w, h);
        group.bench_with_input(
            BenchmarkId::new("quantized", format!("{}x{}", w, h)),
            &quantized,
            |b, ds| b.iter(|| rasterize(black_box(ds), &ramp, &no_data)),
        );

        let continuous = dataset(generate_continuous_grid(w, h), w, h);
        group.bench_with_input(
            BenchmarkId::new("continuous", format!("{}x{}", w, h)),
            &continuous,
            |b, ds| b.iter(|| rasterize(black_box(ds), &ramp, &no_data)),
        );
    }
    group.finish();
}

fn bench_tiles(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_tile");
    let ds = dataset(generate_quantized_grid(960, 1200), 960, 1200);
    let ramp = ramp();
    let no_data = NoDataValues::default();

    for &(z, x, y) in &[(5u32, 19u32, 16u32), (9, 310, 255), (12, 2480, 2042)] {
        let request = TileRequest::new(z, x, y, 256);
        group.bench_with_input(BenchmarkId::new("zoom", z), &request, |b, req| {
            b.iter(|| render_tile(&ds, &ramp, &no_data, black_box(req)))
        });
    }
    group.finish();
}

fn bench_png(c: &mut Criterion) {
    let ds = dataset(generate_quantized_grid(512, 512), 512, 512);
    let image = rasterize(&ds, &ramp(), &NoDataValues::default());
    c.bench_function("encode_png_512", |b| b.iter(|| encode_png(black_box(&image))));
}

criterion_group!(benches, bench_rasterize, bench_tiles, bench_png);
criterion_main!(benches);
