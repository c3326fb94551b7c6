//! Benchmarks for the imagepipe stage runner.
//!
//! Run with: cargo bench -p imagepipe-core

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{Rgba, RgbaImage};
use imagepipe_core::{NoProgress, Pipe, PipeEnv, PipeOptions, TempRegistry};
use std::path::Path;
use std::sync::Arc;

fn fixture_dir(count: usize) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..count {
        RgbaImage::from_pixel(256, 256, Rgba([i as u8, 90, 160, 255]))
            .save(dir.path().join(format!("img{i:03}.png")))
            .unwrap();
    }
    dir
}

fn pipe_over(dir: &Path, registry: &Arc<TempRegistry>, workers: usize) -> Pipe {
    let env = PipeEnv::new(Arc::clone(registry)).with_reporter(Arc::new(NoProgress));
    Pipe::new(
        [dir.join("*.png").to_string_lossy().into_owned()],
        PipeOptions::default().parallel_workers(workers),
        env,
    )
    .unwrap()
}

fn benchmark_copy_stage(c: &mut Criterion) {
    let dir = fixture_dir(32);
    let registry = Arc::new(TempRegistry::new());
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("copy_stage_32", |b| {
        b.iter(|| {
            let pipe = pipe_over(dir.path(), &registry, 1);
            let _ = rt.block_on(black_box(&pipe).copy_to_temp_dir());
        })
    });
}

fn benchmark_thumbnail_stage(c: &mut Criterion) {
    let dir = fixture_dir(16);
    let registry = Arc::new(TempRegistry::new());
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("thumbnail_stage_16");
    for workers in [1, 4] {
        group.bench_function(format!("workers_{workers}"), |b| {
            b.iter(|| {
                let pipe = pipe_over(dir.path(), &registry, workers);
                let _ = rt.block_on(black_box(&pipe).thumbnail(64, None));
            })
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_copy_stage, benchmark_thumbnail_stage);
criterion_main!(benches);
