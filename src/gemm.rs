//! Matrix multiply: generic sgemm and the 4-wide tiled variant
//!
//! Matrices are column-major with explicit leading dimensions. The generic
//! path is one pass over C: each lane recovers its `(row, col)` from the flat
//! index and walks the inner dimension with transpose-aware fetches. The
//! tiled path first relinearizes operands so the inner walk reads whole
//! pixels, then multiplies four lanes at a time; it is restricted to square
//! operands with dimensions that are multiples of four.

use crate::context::{BufferId, Context};
use crate::error::{BlasError, Result};
use crate::surface::{Program, Uniforms};

fn check_gemm_args(
    trans_a: bool,
    trans_b: bool,
    m: i32,
    n: i32,
    k: i32,
    lda: i32,
    ldb: i32,
    ldc: i32,
) -> Result<()> {
    if m < 0 || n < 0 || k < 0 {
        return Err(BlasError::InvalidValue(format!(
            "matrix dimensions must be non-negative, got m={m} n={n} k={k}"
        )));
    }
    let min_lda = if trans_a { k } else { m };
    let min_ldb = if trans_b { n } else { k };
    if lda < min_lda.max(1) || ldb < min_ldb.max(1) || ldc < m.max(1) {
        return Err(BlasError::DimensionOverflow(format!(
            "leading dimensions lda={lda} ldb={ldb} ldc={ldc} too small for m={m} n={n} k={k}"
        )));
    }
    Ok(())
}

impl Context {
    /// General matrix multiply: `C <- alpha * op(A) * op(B) + beta * C`.
    ///
    /// `op(X)` is `X` or its transpose per the flags. All matrices are
    /// column-major; `lda`, `ldb`, `ldc` are element strides between columns
    /// as stored. When `beta` is zero, C is never read.
    #[allow(clippy::too_many_arguments)]
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), level = "debug"))]
    pub fn sgemm(
        &mut self,
        trans_a: bool,
        trans_b: bool,
        m: i32,
        n: i32,
        k: i32,
        alpha: f32,
        a: BufferId,
        lda: i32,
        b: BufferId,
        ldb: i32,
        beta: f32,
        c: BufferId,
        ldc: i32,
    ) -> Result<()> {
        check_gemm_args(trans_a, trans_b, m, n, k, lda, ldb, ldc)?;
        let elems = (m as usize) * (n as usize);
        let viewport = self.op_shape(elems, c)?;
        self.run_pass(
            Program::Sgemm,
            &[a, b, c],
            c,
            viewport,
            Uniforms {
                alpha,
                beta,
                m,
                n,
                k,
                lda,
                ldb,
                ldc,
                trans_a,
                trans_b,
                max_index: elems as i32,
                ..Uniforms::default()
            },
        )
    }

    /// Tiled matrix multiply for square operands whose dimension is a
    /// multiple of four.
    ///
    /// Produces the same result as [`Context::sgemm`] for the shapes it
    /// accepts. Operands whose storage order opposes the tiled fetch pattern
    /// (A untransposed, B transposed) are relinearized into scratch buffers
    /// first; the scratch is released before returning on every path.
    #[allow(clippy::too_many_arguments)]
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), level = "debug"))]
    pub fn sgemm_tiled4(
        &mut self,
        trans_a: bool,
        trans_b: bool,
        m: i32,
        n: i32,
        k: i32,
        alpha: f32,
        a: BufferId,
        lda: i32,
        b: BufferId,
        ldb: i32,
        beta: f32,
        c: BufferId,
        ldc: i32,
    ) -> Result<()> {
        check_gemm_args(trans_a, trans_b, m, n, k, lda, ldb, ldc)?;
        if m != n || m != k || m % 4 != 0 {
            return Err(BlasError::InvalidValue(format!(
                "tiled multiply requires square multiple-of-4 operands, got m={m} n={n} k={k}"
            )));
        }
        // The relinearization gather and the 4-wide inner walk both address
        // operands as densely packed; a wider leading dimension would be
        // read at the wrong offsets.
        if lda != m || ldb != k || ldc != m {
            return Err(BlasError::InvalidValue(format!(
                "tiled multiply requires packed operands (lda=m, ldb=k, ldc=m), \
                 got lda={lda} ldb={ldb} ldc={ldc} for m={m}"
            )));
        }

        fn multiply(
            ctx: &mut Context,
            ua: BufferId,
            ub: BufferId,
            c: BufferId,
            elems: usize,
            uniforms: Uniforms,
        ) -> Result<()> {
            let viewport = ctx.op_shape(elems, c)?;
            ctx.run_pass(Program::Sgemm4x4, &[ua, ub, c], c, viewport, uniforms)
        }

        let elems = (m as usize) * (n as usize);
        let uniforms = Uniforms {
            alpha,
            beta,
            m,
            n,
            k,
            lda,
            ldb,
            ldc,
            trans_a,
            trans_b,
            max_index: elems as i32,
            ..Uniforms::default()
        };

        // The tiled kernel walks rows of A and columns of B contiguously, so
        // column-major A needs relinearizing unless already transposed, and
        // B only when transposed.
        match (!trans_a, trans_b) {
            (false, false) => multiply(self, a, b, c, elems, uniforms),
            (true, false) => self.with_temp((m * k) as usize * 4, |ctx, ra| {
                ctx.relinearize(a, ra, m, k)?;
                multiply(ctx, ra, b, c, elems, uniforms)
            }),
            (false, true) => self.with_temp((k * n) as usize * 4, |ctx, rb| {
                ctx.relinearize(b, rb, k, n)?;
                multiply(ctx, a, rb, c, elems, uniforms)
            }),
            (true, true) => self.with_temp((m * k) as usize * 4, |ctx, ra| {
                ctx.relinearize(a, ra, m, k)?;
                ctx.with_temp((k * n) as usize * 4, |ctx, rb| {
                    ctx.relinearize(b, rb, k, n)?;
                    multiply(ctx, ra, rb, c, elems, uniforms)
                })
            }),
        }
    }

    /// Transpose-gather `src` (column-major, `rows` x `cols`) into `dst` so
    /// rows become contiguous.
    fn relinearize(&mut self, src: BufferId, dst: BufferId, rows: i32, cols: i32) -> Result<()> {
        let elems = (rows as usize) * (cols as usize);
        let viewport = self.op_shape(elems, dst)?;
        self.run_pass(
            Program::Sgemm4x4Reorder,
            &[src, dst],
            dst,
            viewport,
            Uniforms {
                m: rows,
                max_index: elems as i32,
                ..Uniforms::default()
            },
        )?;
        self.sync();
        Ok(())
    }
}
