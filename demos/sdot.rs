//! Dot product of two 32-element vectors.

use rasterblas::{Context, CopyDst, CopySrc, MemcpyKind, Result};

fn main() -> Result<()> {
    let n = 32usize;
    let mut ctx = Context::new(16, 16)?;

    let x = ctx.alloc(n * 4)?;
    let y = ctx.alloc(n * 4)?;
    let r = ctx.alloc(4)?;

    let xs = vec![1.0f32; n];
    let ys = vec![2.0f32; n];
    ctx.memcpy(CopyDst::Device(x), CopySrc::Host(&xs), n * 4, MemcpyKind::Infer)?;
    ctx.memcpy(CopyDst::Device(y), CopySrc::Host(&ys), n * 4, MemcpyKind::Infer)?;

    ctx.sdot(n, r, x, 1, y, 1)?;
    ctx.sync();

    let mut out = [0.0f32];
    ctx.memcpy(CopyDst::Host(&mut out), CopySrc::Device(r), 4, MemcpyKind::Infer)?;

    println!("dot(x, y) = {}", out[0]);

    ctx.free(x);
    ctx.free(y);
    ctx.free(r);
    Ok(())
}
