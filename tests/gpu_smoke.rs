//! Smoke tests against a real GPU adapter.
//!
//! Ignored by default since CI machines may have no adapter; run with
//! `cargo test --features gpu -- --ignored`.

#![cfg(feature = "gpu")]

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

fn download(c: &mut Context, buf: BufferId, n: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; n];
    c.sync();
    c.memcpy(
        CopyDst::Host(&mut out),
        CopySrc::Device(buf),
        n * 4,
        MemcpyKind::Infer,
    )
    .unwrap();
    out
}

#[test]
#[ignore = "requires a GPU adapter"]
fn gpu_round_trip_and_saxpy() {
    let mut c = Context::gpu(16, 16).unwrap();
    let data: Vec<f32> = (0..8).map(|i| i as f32).collect();
    let x = upload(&mut c, &data);
    assert_eq!(download(&mut c, x, 8), data);

    let y = upload(&mut c, &[1.0; 8]);
    c.saxpy(8, 2.0, x, 1, y, 1).unwrap();
    let got = download(&mut c, y, 8);
    let want: Vec<f32> = data.iter().map(|v| 2.0 * v + 1.0).collect();
    assert_eq!(got, want);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn gpu_reductions() {
    let mut c = Context::gpu(16, 16).unwrap();
    let x = upload(&mut c, &[1.0, -2.0, 3.0, -4.0]);
    let r = upload(&mut c, &[0.0]);
    c.sasum(4, r, x, 1).unwrap();
    assert_eq!(download(&mut c, r, 1), vec![10.0]);

    let ones = upload(&mut c, &[1.0; 32]);
    let twos = upload(&mut c, &[2.0; 32]);
    let r2 = upload(&mut c, &[0.0]);
    c.sdot(32, r2, ones, 1, twos, 1).unwrap();
    assert_eq!(download(&mut c, r2, 1), vec![64.0]);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn gpu_gemm_matches_soft_backend() {
    let dim = 8usize;
    let d = dim as i32;
    let adata: Vec<f32> = (0..dim * dim).map(|i| ((i % 7) as f32) * 0.5 - 1.0).collect();
    let bdata: Vec<f32> = (0..dim * dim).map(|i| ((i % 5) as f32) - 2.0).collect();

    let mut soft = Context::new(256, 16).unwrap();
    let (sa, sb) = (upload(&mut soft, &adata), upload(&mut soft, &bdata));
    let sc = upload(&mut soft, &vec![0.0f32; dim * dim]);
    soft.sgemm(false, false, d, d, d, 1.0, sa, d, sb, d, 0.0, sc, d)
        .unwrap();
    let want = download(&mut soft, sc, dim * dim);

    let mut gpu = Context::gpu(256, 16).unwrap();
    let (ga, gb) = (upload(&mut gpu, &adata), upload(&mut gpu, &bdata));
    let gc = upload(&mut gpu, &vec![0.0f32; dim * dim]);
    gpu.sgemm(false, false, d, d, d, 1.0, ga, d, gb, d, 0.0, gc, d)
        .unwrap();
    let got = download(&mut gpu, gc, dim * dim);

    for (g, e) in got.iter().zip(&want) {
        assert!((g - e).abs() < 1e-4, "got {g}, expected {e}");
    }
}
