//! Benchmarks for the imgrake acquisition pipeline.
//!
//! Run with: cargo bench -p imgrake-core

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{DynamicImage, ImageFormat, RgbaImage};
use imgrake_core::config::{ImageConfig, LimitsConfig};
use imgrake_core::pipeline::{address_for, ImageDecoder, Normalizer};
use imgrake_core::Keyword;
use std::io::Cursor;

fn encoded_png(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x % 256) as u8, (y % 256) as u8, 64, 255])
    }));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

fn benchmark_address(c: &mut Criterion) {
    let keyword = Keyword::new("golden retriever puppy");

    c.bench_function("address_for", |b| {
        b.iter(|| {
            let _ = address_for(black_box(&keyword));
        })
    });
}

fn benchmark_decode(c: &mut Criterion) {
    let bytes = encoded_png(1024, 768);
    let decoder = ImageDecoder::new(LimitsConfig::default());
    let rt = tokio::runtime::Runtime::new().unwrap();
    let path = std::path::Path::new("bench.png");

    c.bench_function("decode_png_1024", |b| {
        b.iter(|| {
            let _ = rt.block_on(decoder.decode_from_bytes(black_box(bytes.clone()), path));
        })
    });
}

fn benchmark_normalize(c: &mut Criterion) {
    let bytes = encoded_png(1024, 768);
    let normalizer = Normalizer::new(ImageConfig::default(), LimitsConfig::default());
    let rt = tokio::runtime::Runtime::new().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("000001.png");

    c.bench_function("normalize_png_to_jpeg_256", |b| {
        b.iter(|| {
            std::fs::write(&path, &bytes).unwrap();
            let _ = rt.block_on(normalizer.normalize(black_box(&path)));
        })
    });
}

criterion_group!(
    benches,
    benchmark_address,
    benchmark_decode,
    benchmark_normalize,
);
criterion_main!(benches);
