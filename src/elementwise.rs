//! Level-1 element-wise routines: sscal, scopy, saxpy, sswap
//!
//! Each routine is one full-viewport pass (sswap issues three copy passes
//! through a temporary). The per-lane gate is shared across the strided
//! programs: a lane at flat index `i` participates only when `i < n` and
//! `i % inc == 0`; every other lane passes its current output value through
//! unchanged.

use crate::context::{BufferId, Context};
use crate::error::{BlasError, Result};
use crate::surface::{Program, Uniforms};

fn check_stride(name: &str, inc: i32) -> Result<()> {
    if inc < 1 {
        return Err(BlasError::InvalidValue(format!(
            "{name} stride must be positive, got {inc}"
        )));
    }
    Ok(())
}

impl Context {
    /// Scale the first `n` elements of `x` in place: `x <- alpha * x`.
    ///
    /// Lanes past `n` or skipped by `incx` keep their values.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), level = "debug"))]
    pub fn sscal(&mut self, n: usize, alpha: f32, x: BufferId, incx: i32) -> Result<()> {
        check_stride("sscal", incx)?;
        let viewport = self.op_shape(n, x)?;
        self.run_pass(
            Program::Sscal,
            &[x],
            x,
            viewport,
            Uniforms {
                alpha,
                incx,
                max_index: n as i32,
                ..Uniforms::default()
            },
        )
    }

    /// Copy `n` logical elements of `x` (stride `incx`) into `y` (stride
    /// `incy`).
    ///
    /// Each written lane `i` of `y` (those with `i < n`, `i % incy == 0`)
    /// takes the source lane `i + (i / incy) * (incx - incy)`, so the k-th
    /// stride position of `x` lands on the k-th stride position of `y`.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), level = "debug"))]
    pub fn scopy(
        &mut self,
        n: usize,
        x: BufferId,
        incx: i32,
        y: BufferId,
        incy: i32,
    ) -> Result<()> {
        check_stride("scopy x", incx)?;
        check_stride("scopy y", incy)?;
        let viewport = self.op_shape(n, y)?;
        self.run_pass(
            Program::Scopy,
            &[x, y],
            y,
            viewport,
            Uniforms {
                incx,
                incy,
                max_index: n as i32,
                ..Uniforms::default()
            },
        )
    }

    /// Strided accumulate: `y <- alpha * x + y` over `n` elements.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), level = "debug"))]
    pub fn saxpy(
        &mut self,
        n: usize,
        alpha: f32,
        x: BufferId,
        incx: i32,
        y: BufferId,
        incy: i32,
    ) -> Result<()> {
        check_stride("saxpy x", incx)?;
        check_stride("saxpy y", incy)?;
        let viewport = self.op_shape(n, y)?;
        self.run_pass(
            Program::Saxpy,
            &[x, y],
            y,
            viewport,
            Uniforms {
                alpha,
                incx,
                incy,
                max_index: n as i32,
                ..Uniforms::default()
            },
        )
    }

    /// Exchange `n` elements between `x` (stride `incx`) and `y` (stride
    /// `incy`) through a scratch buffer.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), level = "debug"))]
    pub fn sswap(
        &mut self,
        n: usize,
        x: BufferId,
        incx: i32,
        y: BufferId,
        incy: i32,
    ) -> Result<()> {
        check_stride("sswap x", incx)?;
        check_stride("sswap y", incy)?;
        self.with_temp(n * std::mem::size_of::<f32>(), |ctx, temp| {
            ctx.scopy(n, x, 1, temp, 1)?;
            ctx.sync();
            ctx.scopy(n, y, incy, x, incx)?;
            ctx.scopy(n, temp, incx, y, incy)?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::context::{Context, CopyDst, CopySrc, MemcpyKind};
    use crate::error::BlasError;

    fn ctx() -> Context {
        Context::new(16, 16).unwrap()
    }

    fn upload(c: &mut Context, data: &[f32]) -> crate::context::BufferId {
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

    fn download(c: &mut Context, buf: crate::context::BufferId, n: usize) -> Vec<f32> {
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
    fn test_sscal_unit_stride() {
        let mut c = ctx();
        let x = upload(&mut c, &[1.0, 2.0, 3.0, 4.0]);
        c.sscal(4, 2.0, x, 1).unwrap();
        assert_eq!(download(&mut c, x, 4), vec![2.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    fn test_sscal_stride_two_skips_odd_lanes() {
        let mut c = ctx();
        let x = upload(&mut c, &[1.0, 2.0, 3.0, 4.0]);
        c.sscal(4, 10.0, x, 2).unwrap();
        assert_eq!(download(&mut c, x, 4), vec![10.0, 2.0, 30.0, 4.0]);
    }

    #[test]
    fn test_sscal_rejects_zero_stride() {
        let mut c = ctx();
        let x = upload(&mut c, &[1.0; 4]);
        let err = c.sscal(4, 2.0, x, 0).unwrap_err();
        assert!(matches!(err, BlasError::InvalidValue(_)));
    }

    #[test]
    fn test_scopy_unit_stride() {
        let mut c = ctx();
        let x = upload(&mut c, &[1.0, 2.0, 3.0, 4.0]);
        let y = upload(&mut c, &[0.0; 4]);
        c.scopy(4, x, 1, y, 1).unwrap();
        assert_eq!(download(&mut c, y, 4), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_scopy_gathers_strided_source() {
        let mut c = ctx();
        // incx = 2, incy = 1: y[i] takes x[2i]
        let x = upload(&mut c, &[1.0, -1.0, 2.0, -2.0, 3.0, -3.0, 4.0, -4.0]);
        let y = upload(&mut c, &[9.0; 4]);
        c.scopy(4, x, 2, y, 1).unwrap();
        assert_eq!(download(&mut c, y, 4), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_scopy_scatters_strided_destination() {
        let mut c = ctx();
        // incx = 1, incy = 2: lanes 0 and 2 of y written, 1 and 3 kept
        let x = upload(&mut c, &[5.0, 6.0, 7.0, 8.0]);
        let y = upload(&mut c, &[0.0, 1.0, 2.0, 3.0]);
        c.scopy(4, x, 1, y, 2).unwrap();
        assert_eq!(download(&mut c, y, 4), vec![5.0, 1.0, 6.0, 3.0]);
    }

    #[test]
    fn test_saxpy_unit_stride() {
        let mut c = ctx();
        let x = upload(&mut c, &[1.0, 1.0, 1.0, 1.0]);
        let y = upload(&mut c, &[1.0, 2.0, 3.0, 4.0]);
        c.saxpy(4, 2.0, x, 1, y, 1).unwrap();
        assert_eq!(download(&mut c, y, 4), vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_saxpy_lanes_past_n_untouched() {
        let mut c = ctx();
        let x = upload(&mut c, &[1.0; 8]);
        let y = upload(&mut c, &[1.0; 8]);
        c.saxpy(4, 1.0, x, 1, y, 1).unwrap();
        let out = download(&mut c, y, 8);
        assert_eq!(&out[..4], &[2.0; 4]);
        assert_eq!(&out[4..], &[1.0; 4]);
    }

    #[test]
    fn test_sswap_unit_stride() {
        let mut c = ctx();
        let x = upload(&mut c, &[1.0, 2.0, 3.0, 4.0]);
        let y = upload(&mut c, &[5.0, 6.0, 7.0, 8.0]);
        c.sswap(4, x, 1, y, 1).unwrap();
        assert_eq!(download(&mut c, x, 4), vec![5.0, 6.0, 7.0, 8.0]);
        assert_eq!(download(&mut c, y, 4), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_sswap_frees_its_scratch() {
        let mut c = ctx();
        let x = upload(&mut c, &[1.0; 4]);
        let y = upload(&mut c, &[2.0; 4]);
        let before = c.live_buffers();
        c.sswap(4, x, 1, y, 1).unwrap();
        assert_eq!(c.live_buffers(), before);
    }
}
