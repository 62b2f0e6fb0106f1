//! Reductions: sasum and sdot
//!
//! Both routines reduce through the same halving tree. The input (or the
//! element-wise product, for sdot) is copied into a scratch buffer, then
//! folded in place: each pass adds the upper half of the live pixel range
//! onto the lower half and zeroes the upper half, with a sync barrier
//! between passes. A terminal pass collapses the four lanes of pixel zero
//! into lane zero, which a final one-element copy lands in `result`.
//!
//! The fold schedule halves the live element count each pass, so the
//! reduction is exact for power-of-two `n` and for `n <= 4` (which go
//! straight to the terminal pass). Other sizes drop partial pixels mid-tree
//! and are not supported.

use crate::context::{BufferId, Context};
use crate::error::{BlasError, Result};
use crate::surface::{Program, Uniforms};

impl Context {
    /// Sum of absolute values of the first `n` elements of `x`, written into
    /// lane 0 of `result`.
    ///
    /// Lanes skipped by `incx` contribute their previous scratch value; with
    /// the unit-stride copy seeding the scratch this matches summing every
    /// lane. `n` must be a power of two (or at most 4).
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), level = "debug"))]
    pub fn sasum(&mut self, n: usize, result: BufferId, x: BufferId, incx: i32) -> Result<()> {
        if incx < 1 {
            return Err(BlasError::InvalidValue(format!(
                "sasum stride must be positive, got {incx}"
            )));
        }
        self.with_temp(n * std::mem::size_of::<f32>(), |ctx, temp| {
            ctx.scopy(n, x, 1, temp, 1)?;
            ctx.sync();
            ctx.halving_reduce(Program::Sasum, n, temp, incx)?;
            ctx.scopy(1, temp, 1, result, 1)
        })
    }

    /// Dot product of the first `n` elements of `x` and `y`, written into
    /// lane 0 of `result`.
    ///
    /// Neither input is modified; the product is formed in a scratch buffer
    /// and reduced there. `n` must be a power of two (or at most 4).
    #[cfg_attr(feature = "tracing", tracing::instrument(skip(self), level = "debug"))]
    pub fn sdot(
        &mut self,
        n: usize,
        result: BufferId,
        x: BufferId,
        incx: i32,
        y: BufferId,
        incy: i32,
    ) -> Result<()> {
        if incx < 1 || incy < 1 {
            return Err(BlasError::InvalidValue(format!(
                "sdot strides must be positive, got {incx} and {incy}"
            )));
        }
        self.with_temp(n * std::mem::size_of::<f32>(), |ctx, temp| {
            ctx.scopy(n, y, 1, temp, 1)?;
            ctx.sync();
            let viewport = ctx.op_shape(n, temp)?;
            ctx.run_pass(
                Program::SdotMul,
                &[x, temp],
                temp,
                viewport,
                Uniforms {
                    incx,
                    incy,
                    max_index: n as i32,
                    ..Uniforms::default()
                },
            )?;
            ctx.sync();
            ctx.halving_reduce(Program::SdotSum, n, temp, 1)?;
            ctx.scopy(1, temp, 1, result, 1)
        })
    }

    /// Fold `scratch` down to a single value in lane 0 of its first pixel.
    ///
    /// Each pass covers `tn` live elements; once `tn` drops below one pixel
    /// it snaps to 1 and the terminal pass collapses pixel zero's lanes.
    fn halving_reduce(
        &mut self,
        program: Program,
        n: usize,
        scratch: BufferId,
        incx: i32,
    ) -> Result<()> {
        let viewport = self.op_shape(n, scratch)?;
        let mut tn = n / 2;
        if tn == 0 {
            // A single element still needs the terminal pass so the
            // transform (abs for sasum) is applied to it.
            tn = 1;
        }
        while tn != 0 {
            if tn < 4 {
                tn = 1;
            }
            self.run_pass(
                program,
                &[scratch],
                scratch,
                viewport,
                Uniforms {
                    incx,
                    max_index: tn as i32,
                    ..Uniforms::default()
                },
            )?;
            self.sync();
            tn /= 2;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::context::{BufferId, Context, CopyDst, CopySrc, MemcpyKind};

    fn ctx() -> Context {
        Context::new(16, 16).unwrap()
    }

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

    fn read_scalar(c: &mut Context, buf: BufferId) -> f32 {
        let mut out = [0.0f32];
        c.sync();
        c.memcpy(
            CopyDst::Host(&mut out),
            CopySrc::Device(buf),
            4,
            MemcpyKind::Infer,
        )
        .unwrap();
        out[0]
    }

    #[test]
    fn test_sasum_single_pixel() {
        let mut c = ctx();
        let x = upload(&mut c, &[1.0, -2.0, 3.0, -4.0]);
        let r = upload(&mut c, &[0.0]);
        c.sasum(4, r, x, 1).unwrap();
        assert_eq!(read_scalar(&mut c, r), 10.0);
    }

    #[test]
    fn test_sasum_single_negative_element() {
        let mut c = ctx();
        let x = upload(&mut c, &[-5.0]);
        let r = upload(&mut c, &[0.0]);
        c.sasum(1, r, x, 1).unwrap();
        assert_eq!(read_scalar(&mut c, r), 5.0);
    }

    #[test]
    fn test_sasum_two_pixels() {
        let mut c = ctx();
        let x = upload(&mut c, &[-1.0; 8]);
        let r = upload(&mut c, &[0.0]);
        c.sasum(8, r, x, 1).unwrap();
        assert_eq!(read_scalar(&mut c, r), 8.0);
    }

    #[test]
    fn test_sasum_larger_power_of_two() {
        let mut c = ctx();
        let data: Vec<f32> = (0..32).map(|i| if i % 2 == 0 { 0.5 } else { -0.5 }).collect();
        let x = upload(&mut c, &data);
        let r = upload(&mut c, &[0.0]);
        c.sasum(32, r, x, 1).unwrap();
        assert_eq!(read_scalar(&mut c, r), 16.0);
    }

    #[test]
    fn test_sasum_does_not_leak_scratch() {
        let mut c = ctx();
        let x = upload(&mut c, &[1.0; 8]);
        let r = upload(&mut c, &[0.0]);
        let before = c.live_buffers();
        c.sasum(8, r, x, 1).unwrap();
        assert_eq!(c.live_buffers(), before);
    }

    #[test]
    fn test_sdot_single_pixel() {
        let mut c = ctx();
        let x = upload(&mut c, &[1.0, 2.0, 3.0, 4.0]);
        let y = upload(&mut c, &[2.0, 2.0, 2.0, 2.0]);
        let r = upload(&mut c, &[0.0]);
        c.sdot(4, r, x, 1, y, 1).unwrap();
        assert_eq!(read_scalar(&mut c, r), 20.0);
    }

    #[test]
    fn test_sdot_thirty_two_elements() {
        let mut c = ctx();
        let x = upload(&mut c, &[1.0; 32]);
        let y = upload(&mut c, &[2.0; 32]);
        let r = upload(&mut c, &[0.0]);
        c.sdot(32, r, x, 1, y, 1).unwrap();
        assert_eq!(read_scalar(&mut c, r), 64.0);
    }

    #[test]
    fn test_sdot_preserves_inputs() {
        let mut c = ctx();
        let x = upload(&mut c, &[1.0, 2.0, 3.0, 4.0]);
        let y = upload(&mut c, &[5.0, 6.0, 7.0, 8.0]);
        let r = upload(&mut c, &[0.0]);
        c.sdot(4, r, x, 1, y, 1).unwrap();
        c.sync();
        let mut back = [0.0f32; 4];
        c.memcpy(
            CopyDst::Host(&mut back),
            CopySrc::Device(y),
            16,
            MemcpyKind::Infer,
        )
        .unwrap();
        assert_eq!(back, [5.0, 6.0, 7.0, 8.0]);
        assert_eq!(read_scalar(&mut c, r), 70.0);
    }

    #[test]
    fn test_sdot_sign_mix() {
        let mut c = ctx();
        let x = upload(&mut c, &[1.0, -1.0, 2.0, -2.0, 1.0, -1.0, 2.0, -2.0]);
        let y = upload(&mut c, &[3.0, 3.0, 0.5, 0.5, 3.0, 3.0, 0.5, 0.5]);
        let r = upload(&mut c, &[0.0]);
        c.sdot(8, r, x, 1, y, 1).unwrap();
        assert_eq!(read_scalar(&mut c, r), 0.0);
    }
}
