//! Benchmarks for the Darkroom pipeline stages.
//!
//! Run with: cargo bench -p darkroom-core

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use darkroom_core::config::{Config, HashAlgorithm, TensorConfig};
use darkroom_core::pipeline::tensor::{encode_tensor, tensorize};
use darkroom_core::pipeline::{Hasher, ImageCodec, Pipeline, StandardCodec};
use darkroom_core::storage::{MemoryStore, ObjectStore};
use darkroom_core::types::{Namespace, ObjectEvent};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::sync::Arc;

fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }))
}

fn benchmark_content_hash(c: &mut Criterion) {
    let data = vec![0xA5u8; 4 * 1024 * 1024];

    c.bench_function("content_hash_md5_4mb", |b| {
        b.iter(|| Hasher::content_hash(HashAlgorithm::Md5, black_box(&data)))
    });
    c.bench_function("content_hash_blake3_4mb", |b| {
        b.iter(|| Hasher::content_hash(HashAlgorithm::Blake3, black_box(&data)))
    });
}

fn benchmark_tensorize(c: &mut Criterion) {
    let img = gradient(1920, 1080);
    let config = TensorConfig::default();

    c.bench_function("tensorize_1080p_500px", |b| {
        b.iter(|| {
            let tensor = tensorize(&StandardCodec, black_box(&img), &config).expect("tensorize");
            encode_tensor(&tensor)
        })
    });
}

fn benchmark_grayscale(c: &mut Criterion) {
    let img = gradient(1920, 1080);

    c.bench_function("grayscale_encode_png_1080p", |b| {
        b.iter(|| {
            let mono = StandardCodec
                .convert_channels(black_box(&img), 1)
                .expect("convert");
            StandardCodec.encode(&mono, ImageFormat::Png).expect("encode")
        })
    });
}

fn benchmark_canonical_fan_out(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("runtime");
    let store = Arc::new(MemoryStore::new("bench"));
    let bytes = StandardCodec
        .encode(&gradient(640, 480), ImageFormat::Png)
        .expect("encode");
    rt.block_on(store.put("canonical/bench.png", bytes))
        .expect("put");

    let pipeline = Pipeline::new(&Config::default(), store).expect("pipeline");
    let event = ObjectEvent {
        store: "bench".to_string(),
        namespace: Namespace::Canonical,
        key: "bench.png".to_string(),
    };

    c.bench_function("handle_canonical_640x480", |b| {
        b.iter(|| rt.block_on(pipeline.handle(black_box(&event))))
    });
}

criterion_group!(
    benches,
    benchmark_content_hash,
    benchmark_tensorize,
    benchmark_grayscale,
    benchmark_canonical_fan_out,
);
criterion_main!(benches);
