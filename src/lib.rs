//! # rasterblas
//!
//! Single-precision BLAS routines executed as full-viewport raster passes
//! over packed pixel surfaces.
//!
//! Numeric buffers live on a 2-D compute surface, four `f32` lanes per
//! pixel. Every operation is one or more per-pixel program passes over a
//! viewport shaped by the coordinate mapper in [`layout`]; reductions run a
//! halving tree of such passes. The default backend is a deterministic CPU
//! rasterizer; enable the `gpu` feature for a wgpu-backed surface running
//! the same programs as compute shaders.
//!
//! ## Example
//!
//! ```
//! use rasterblas::{Context, CopyDst, CopySrc, MemcpyKind};
//!
//! let mut ctx = Context::new(16, 16)?;
//! let x = ctx.alloc(4 * 4)?;
//! let y = ctx.alloc(4 * 4)?;
//! ctx.memcpy(CopyDst::Device(x), CopySrc::Host(&[1.0, 2.0, 3.0, 4.0]), 16, MemcpyKind::Infer)?;
//! ctx.memcpy(CopyDst::Device(y), CopySrc::Host(&[1.0; 4]), 16, MemcpyKind::Infer)?;
//!
//! // y <- 2x + y
//! ctx.saxpy(4, 2.0, x, 1, y, 1)?;
//! ctx.sync();
//!
//! let mut out = [0.0f32; 4];
//! ctx.memcpy(CopyDst::Host(&mut out), CopySrc::Device(y), 16, MemcpyKind::Infer)?;
//! assert_eq!(out, [3.0, 5.0, 7.0, 9.0]);
//! # Ok::<(), rasterblas::BlasError>(())
//! ```

pub mod backends;
pub mod context;
pub mod elementwise;
pub mod error;
pub mod gemm;
pub mod layout;
pub mod reduce;
pub mod surface;

pub use backends::SoftSurface;
#[cfg(feature = "gpu")]
pub use backends::GpuSurface;
pub use context::{BufferId, Context, CopyDst, CopySrc, MemcpyKind};
pub use error::{BlasError, Result};
pub use layout::{shape_for, SurfaceShape, BYTES_PER_PIXEL, FLOATS_PER_PIXEL};
pub use surface::{PassDesc, Program, RenderSurface, TargetId, Uniforms};
