//! Software rasterizer
//!
//! Executes every per-pixel program on the CPU, one fragment at a time, with
//! the same lane arithmetic as the GPU shaders. Inputs are snapshotted before
//! a pass writes anything, so a pass whose output aliases an input still
//! observes pre-pass values. Out-of-range fetches return zero, matching the
//! border behavior the shader programs rely on at reduction edges.

use std::collections::HashMap;

use crate::error::{BlasError, Result};
use crate::layout::FLOATS_PER_PIXEL;
use crate::surface::{PassDesc, Program, RenderSurface, TargetId, Uniforms};

struct Texture {
    width: usize,
    height: usize,
    texels: Vec<f32>,
}

/// Deterministic CPU implementation of the compute-surface contract.
pub struct SoftSurface {
    targets: HashMap<TargetId, Texture>,
    next_id: u64,
}

impl SoftSurface {
    pub fn new() -> Self {
        Self {
            targets: HashMap::new(),
            next_id: 1,
        }
    }
}

impl Default for SoftSurface {
    fn default() -> Self {
        Self::new()
    }
}

/// Fetch a flat element, zero outside the buffer.
fn elem(texels: &[f32], index: i32) -> f32 {
    if index < 0 {
        return 0.0;
    }
    texels.get(index as usize).copied().unwrap_or(0.0)
}

/// One halving-reduction fragment shared by the sum and abs-sum programs.
fn reduce_pixel(
    input: &[f32],
    p: usize,
    u: &Uniforms,
    transform: fn(f32) -> f32,
    out: &mut [f32],
) {
    if u.max_index == 1 {
        // Terminal pass: collapse the four lanes of pixel zero into lane 0.
        if p == 0 {
            out[0] = transform(elem(input, 0))
                + transform(elem(input, 1))
                + transform(elem(input, 2))
                + transform(elem(input, 3));
            out[1] = 0.0;
            out[2] = 0.0;
            out[3] = 0.0;
        } else {
            out.fill(0.0);
        }
        return;
    }

    let halfway = u.max_index / 4;
    if p as i32 > halfway {
        out.fill(0.0);
        return;
    }
    let src_pixel = (p as i32 + halfway) / u.incx;
    for c in 0..FLOATS_PER_PIXEL {
        let i = p as i32 + c as i32;
        let own = transform(elem(input, (p * FLOATS_PER_PIXEL + c) as i32));
        if i > u.max_index || i % u.incx != 0 {
            out[c] = own;
        } else {
            out[c] = transform(elem(input, src_pixel * 4 + c as i32)) + own;
        }
    }
}

impl RenderSurface for SoftSurface {
    fn create_target(&mut self, width: usize, height: usize) -> Result<TargetId> {
        let id = TargetId(self.next_id);
        self.next_id += 1;
        self.targets.insert(
            id,
            Texture {
                width,
                height,
                texels: vec![0.0; width * height * FLOATS_PER_PIXEL],
            },
        );
        Ok(id)
    }

    fn destroy_target(&mut self, target: TargetId) {
        self.targets.remove(&target);
    }

    fn upload(
        &mut self,
        target: TargetId,
        width: usize,
        height: usize,
        texels: &[f32],
    ) -> Result<()> {
        let tex = self
            .targets
            .get_mut(&target)
            .ok_or_else(|| BlasError::InvalidValue(format!("unknown target {target:?}")))?;
        let lanes = width * height * FLOATS_PER_PIXEL;
        if texels.len() < lanes || tex.texels.len() < lanes {
            return Err(BlasError::InvalidValue(
                "upload region exceeds target".to_string(),
            ));
        }
        tex.texels[..lanes].copy_from_slice(&texels[..lanes]);
        Ok(())
    }

    fn download(
        &mut self,
        target: TargetId,
        width: usize,
        height: usize,
        texels: &mut [f32],
    ) -> Result<()> {
        let tex = self
            .targets
            .get(&target)
            .ok_or_else(|| BlasError::InvalidValue(format!("unknown target {target:?}")))?;
        let lanes = width * height * FLOATS_PER_PIXEL;
        if texels.len() < lanes || tex.texels.len() < lanes {
            return Err(BlasError::InvalidValue(
                "download region exceeds target".to_string(),
            ));
        }
        texels[..lanes].copy_from_slice(&tex.texels[..lanes]);
        Ok(())
    }

    fn draw(&mut self, pass: &PassDesc<'_>) -> Result<()> {
        // Snapshot inputs so in-place passes read pre-pass values.
        let mut inputs: Vec<Vec<f32>> = Vec::with_capacity(pass.inputs.len());
        for id in pass.inputs {
            let tex = self
                .targets
                .get(id)
                .ok_or_else(|| BlasError::InvalidValue(format!("unknown input {id:?}")))?;
            inputs.push(tex.texels.clone());
        }

        let (vw, vh) = pass.viewport;
        let out = self
            .targets
            .get_mut(&pass.output)
            .ok_or_else(|| BlasError::InvalidValue(format!("unknown output {:?}", pass.output)))?;
        if vw > out.width || vh > out.height {
            return Err(BlasError::InvalidValue(format!(
                "viewport {vw}x{vh} exceeds target {}x{}",
                out.width, out.height
            )));
        }

        let u = &pass.uniforms;
        for y in 0..vh {
            for x in 0..vw {
                let p = y * vw + x;
                let index = (y * vw + x * FLOATS_PER_PIXEL) as i32;
                let frag = &mut out.texels[p * FLOATS_PER_PIXEL..(p + 1) * FLOATS_PER_PIXEL];
                shade(pass.program, &inputs, p, index, u, frag);
            }
        }
        Ok(())
    }

    fn sync(&mut self) {}
}

/// Run one fragment of `program`, writing its four lanes into `out`.
fn shade(program: Program, inputs: &[Vec<f32>], p: usize, index: i32, u: &Uniforms, out: &mut [f32]) {
    match program {
        Program::Sscal => {
            let x = &inputs[0];
            for c in 0..FLOATS_PER_PIXEL {
                let i = index + c as i32;
                let v = elem(x, (p * FLOATS_PER_PIXEL + c) as i32);
                out[c] = if i > u.max_index || i % u.incx != 0 {
                    v
                } else {
                    u.alpha * v
                };
            }
        }
        Program::Scopy | Program::Saxpy | Program::SdotMul => {
            let x = &inputs[0];
            let y = &inputs[1];
            for c in 0..FLOATS_PER_PIXEL {
                let i = index + c as i32;
                let mut v = elem(y, (p * FLOATS_PER_PIXEL + c) as i32);
                if i < u.max_index && i % u.incy == 0 {
                    let xi = i + (i / u.incy) * (u.incx - u.incy);
                    match program {
                        Program::Scopy => v = elem(x, xi),
                        Program::Saxpy => v += u.alpha * elem(x, xi),
                        Program::SdotMul => v *= elem(x, xi),
                        _ => unreachable!(),
                    }
                }
                out[c] = v;
            }
        }
        Program::SdotSum => reduce_pixel(&inputs[0], p, u, |v| v, out),
        Program::Sasum => reduce_pixel(&inputs[0], p, u, f32::abs, out),
        Program::Sgemm => {
            let a = &inputs[0];
            let b = &inputs[1];
            let c_in = &inputs[2];
            for c in 0..FLOATS_PER_PIXEL {
                let o = index + c as i32;
                let mut v = if u.beta != 0.0 {
                    elem(c_in, (p * FLOATS_PER_PIXEL + c) as i32)
                } else {
                    0.0
                };
                if o < u.max_index {
                    let i = o % u.m;
                    let j = o / u.m;
                    let mut acc = 0.0f32;
                    for l in 0..u.k {
                        let av = if u.trans_a {
                            elem(a, u.lda * i + l)
                        } else {
                            elem(a, u.lda * l + i)
                        };
                        let bv = if u.trans_b {
                            elem(b, u.ldb * l + j)
                        } else {
                            elem(b, u.ldb * j + l)
                        };
                        acc += av * bv;
                    }
                    v = u.alpha * acc + v * u.beta;
                }
                out[c] = v;
            }
        }
        Program::Sgemm4x4 => {
            let a = &inputs[0];
            let b = &inputs[1];
            let c_in = &inputs[2];
            for c in 0..FLOATS_PER_PIXEL {
                let o = index + c as i32;
                let mut v = if u.beta != 0.0 {
                    elem(c_in, (p * FLOATS_PER_PIXEL + c) as i32)
                } else {
                    0.0
                };
                if o < u.max_index {
                    let i = o % u.m;
                    let j = o / u.m;
                    let mut acc = 0.0f32;
                    // Inner walk in whole pixels over relinearized operands
                    let mut l = 0;
                    while l < u.k {
                        let ai = u.lda * i + l;
                        let bi = u.ldb * j + l;
                        for c2 in 0..FLOATS_PER_PIXEL as i32 {
                            acc += elem(a, ai + c2) * elem(b, bi + c2);
                        }
                        l += FLOATS_PER_PIXEL as i32;
                    }
                    v = u.alpha * acc + v * u.beta;
                }
                out[c] = v;
            }
        }
        Program::Sgemm4x4Reorder => {
            let src = &inputs[0];
            let frag = index / 4;
            for c in 0..FLOATS_PER_PIXEL {
                let o = frag * 4 + c as i32;
                out[c] = if index + (c as i32) < u.max_index {
                    elem(src, u.m * (o % u.m) + o / u.m)
                } else {
                    0.0
                };
            }
        }
    }
}
