//! General matrix multiply: C <- alpha * A * B + beta * C.

use rasterblas::{Context, CopyDst, CopySrc, MemcpyKind, Result};

fn main() -> Result<()> {
    let n = 4usize;
    let bytes = n * n * 4;
    let mut ctx = Context::new(128, 128)?;

    let a = ctx.alloc(bytes)?;
    let b = ctx.alloc(bytes)?;
    let c = ctx.alloc(bytes)?;

    // Column-major operands
    let adata: Vec<f32> = (0..n * n).map(|i| (i + 1) as f32).collect();
    let mut ident = vec![0.0f32; n * n];
    for i in 0..n {
        ident[n * i + i] = 1.0;
    }
    ctx.memcpy(CopyDst::Device(a), CopySrc::Host(&adata), bytes, MemcpyKind::Infer)?;
    ctx.memcpy(CopyDst::Device(b), CopySrc::Host(&ident), bytes, MemcpyKind::Infer)?;

    let d = n as i32;
    ctx.sgemm(false, false, d, d, d, 1.0, a, d, b, d, 0.0, c, d)?;
    ctx.sync();

    let mut out = vec![0.0f32; n * n];
    ctx.memcpy(CopyDst::Host(&mut out), CopySrc::Device(c), bytes, MemcpyKind::Infer)?;

    for row in 0..n {
        let cells: Vec<String> = (0..n).map(|col| format!("{:5.1}", out[n * col + row])).collect();
        println!("{}", cells.join(" "));
    }

    ctx.free(a);
    ctx.free(b);
    ctx.free(c);
    Ok(())
}
