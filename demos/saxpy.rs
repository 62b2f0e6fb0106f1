//! Scaled vector accumulate: y <- alpha * x + y.

use rasterblas::{Context, CopyDst, CopySrc, MemcpyKind, Result};

fn main() -> Result<()> {
    let n = 8usize;
    let mut ctx = Context::new(16, 16)?;

    let x = ctx.alloc(n * 4)?;
    let y = ctx.alloc(n * 4)?;

    let xs: Vec<f32> = (0..n).map(|i| i as f32).collect();
    let ys = vec![1.0f32; n];
    ctx.memcpy(CopyDst::Device(x), CopySrc::Host(&xs), n * 4, MemcpyKind::Infer)?;
    ctx.memcpy(CopyDst::Device(y), CopySrc::Host(&ys), n * 4, MemcpyKind::Infer)?;

    ctx.saxpy(n, 2.0, x, 1, y, 1)?;
    ctx.sync();

    let mut out = vec![0.0f32; n];
    ctx.memcpy(CopyDst::Host(&mut out), CopySrc::Device(y), n * 4, MemcpyKind::Infer)?;

    println!("y = 2x + 1: {out:?}");

    ctx.free(x);
    ctx.free(y);
    Ok(())
}
