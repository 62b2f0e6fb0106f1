//! Criterion benchmarks over the software surface.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rasterblas::{BufferId, Context, CopyDst, CopySrc, MemcpyKind};

fn upload(c: &mut Context, data: &[f32]) -> BufferId {
    let buf = c.alloc(data.len() * 4).unwrap();
    c.memcpy(
        CopyDst::Device(buf),
        CopySrc::Host(data),
        data.len() * 4,
        MemcpyKind::Infer,
    )
    .unwrap();
    buf
}

fn bench_saxpy(c: &mut Criterion) {
    let mut group = c.benchmark_group("saxpy");
    for n in [256usize, 1024, 4096] {
        let mut ctx = Context::new(1024, 8).unwrap();
        let data: Vec<f32> = (0..n).map(|i| i as f32).collect();
        let x = upload(&mut ctx, &data);
        let y = upload(&mut ctx, &data);
        group.bench_function(format!("n{n}"), |b| {
            b.iter(|| {
                ctx.saxpy(black_box(n), 2.0, x, 1, y, 1).unwrap();
                ctx.sync();
            })
        });
    }
    group.finish();
}

fn bench_sdot(c: &mut Criterion) {
    let mut group = c.benchmark_group("sdot");
    for n in [256usize, 1024, 4096] {
        let mut ctx = Context::new(1024, 8).unwrap();
        let data: Vec<f32> = (0..n).map(|i| (i as f32) * 0.001).collect();
        let x = upload(&mut ctx, &data);
        let y = upload(&mut ctx, &data);
        let r = upload(&mut ctx, &[0.0]);
        group.bench_function(format!("n{n}"), |b| {
            b.iter(|| {
                ctx.sdot(black_box(n), r, x, 1, y, 1).unwrap();
                ctx.sync();
            })
        });
    }
    group.finish();
}

fn bench_gemm(c: &mut Criterion) {
    let mut group = c.benchmark_group("sgemm");
    for dim in [16usize, 32, 64] {
        let mut ctx = Context::new(2048, 64).unwrap();
        let data: Vec<f32> = (0..dim * dim).map(|i| (i % 17) as f32).collect();
        let a = upload(&mut ctx, &data);
        let b_m = upload(&mut ctx, &data);
        let out = upload(&mut ctx, &vec![0.0f32; dim * dim]);
        let d = dim as i32;
        group.bench_function(format!("generic_{dim}"), |b| {
            b.iter(|| {
                ctx.sgemm(false, false, d, d, d, 1.0, a, d, b_m, d, 0.0, out, d)
                    .unwrap();
                ctx.sync();
            })
        });
        group.bench_function(format!("tiled_{dim}"), |b| {
            b.iter(|| {
                ctx.sgemm_tiled4(false, false, d, d, d, 1.0, a, d, b_m, d, 0.0, out, d)
                    .unwrap();
                ctx.sync();
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_saxpy, bench_sdot, bench_gemm);
criterion_main!(benches);
