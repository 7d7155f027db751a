use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use rugcut::{
    config::{ColorMode, ModelConfig, ResizePolicy},
    utils::TensorPreprocessor,
    ImagePreprocessor,
};
use std::io::Cursor;

const PHOTO_SIZES: [(u32, u32); 3] = [(1280, 960), (3000, 2000), (4032, 3024)];

fn synthetic_photo(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 251) as u8, (y % 241) as u8, ((x + y) % 239) as u8])
    }));
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Jpeg)
        .expect("encode benchmark input");
    out.into_inner()
}

fn bench_prepare(c: &mut Criterion) {
    let mut group = c.benchmark_group("prepare");
    group.sample_size(10);
    let policy = ResizePolicy::default();

    for (width, height) in PHOTO_SIZES {
        let raw = synthetic_photo(width, height);
        let label = format!("{width}x{height}");

        group.bench_with_input(BenchmarkId::new("png_rgba", &label), &raw, |b, raw| {
            b.iter(|| ImagePreprocessor::prepare(black_box(raw), ColorMode::Rgba, &policy));
        });
        group.bench_with_input(BenchmarkId::new("jpeg_rgb", &label), &raw, |b, raw| {
            b.iter(|| ImagePreprocessor::prepare(black_box(raw), ColorMode::Rgb, &policy));
        });
    }

    group.finish();
}

fn bench_tensor_conversion(c: &mut Criterion) {
    let mut group = c.benchmark_group("tensor");
    group.sample_size(10);
    let config = ModelConfig::default();
    let image = image::load_from_memory(&synthetic_photo(1600, 1067)).expect("decode input");

    group.bench_function("image_to_tensor_1600x1067", |b| {
        b.iter(|| TensorPreprocessor::image_to_tensor(black_box(&image), &config));
    });

    group.finish();
}

criterion_group!(benches, bench_prepare, bench_tensor_conversion);
criterion_main!(benches);
