//! The compute-surface contract
//!
//! The core of the library is written against a narrow rendering contract: a
//! [`RenderSurface`] supplies pixel-addressable targets, uploads/downloads
//! texel data, and executes one full-viewport pass of a named per-pixel
//! [`Program`] over a target. The surface bootstrap (device acquisition,
//! program compilation) happens when the backend is constructed; after that
//! every arithmetic operation in the crate is a sequence of [`PassDesc`]
//! draws.
//!
//! Two implementations ship with the crate: a deterministic CPU rasterizer
//! ([`crate::backends::SoftSurface`]) and a wgpu-backed surface behind the
//! `gpu` feature.

use crate::error::Result;

/// Opaque handle to a backing pixel surface and its render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(pub(crate) u64);

/// The per-pixel programs a surface must provide, compiled at bootstrap.
///
/// Every program maps a fragment position to a flat element index
/// (`index = y * viewport_width + x * 4`) and computes up to four packed
/// lanes. `SdotSum` and `Sasum` are the same halving-reduction step, differing
/// only in the transform applied to fetched values (identity vs. absolute
/// value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Program {
    /// In-place scale: `x <- alpha * x`
    Sscal,
    /// Strided copy `y <- x` via the index remap
    Scopy,
    /// Strided `y <- alpha * x + y`
    Saxpy,
    /// Element-wise multiply into the reduction scratch (dot step 1)
    SdotMul,
    /// Halving-reduction step, identity transform (dot step 2)
    SdotSum,
    /// Halving-reduction step, absolute-value transform
    Sasum,
    /// Generic transpose-aware matrix multiply
    Sgemm,
    /// 4-wide tiled matrix multiply over reordered operands
    Sgemm4x4,
    /// Relinearization gather feeding the tiled multiply
    Sgemm4x4Reorder,
}

impl Program {
    /// Every program, in bootstrap compilation order.
    pub const ALL: [Program; 9] = [
        Program::Sscal,
        Program::Scopy,
        Program::Saxpy,
        Program::SdotMul,
        Program::SdotSum,
        Program::Sasum,
        Program::Sgemm,
        Program::Sgemm4x4,
        Program::Sgemm4x4Reorder,
    ];

    /// Number of input surfaces the program samples (excluding the render
    /// target it writes, which is bound separately but may alias an input).
    pub fn input_arity(self) -> usize {
        match self {
            Program::Sscal | Program::SdotSum | Program::Sasum => 1,
            Program::Scopy | Program::Saxpy | Program::SdotMul | Program::Sgemm4x4Reorder => 2,
            Program::Sgemm | Program::Sgemm4x4 => 3,
        }
    }
}

/// Uniform parameters for one dispatch. Transient: built, handed to the
/// surface, and discarded per pass.
#[derive(Debug, Clone, Copy)]
pub struct Uniforms {
    /// Scale factor (sscal, saxpy, gemm)
    pub alpha: f32,
    /// Accumulation factor for the gemm output
    pub beta: f32,
    /// Stride of the first operand
    pub incx: i32,
    /// Stride of the second operand
    pub incy: i32,
    /// Exclusive bound on valid flat element indices
    pub max_index: i32,
    /// GEMM row count of C (also the reorder row length)
    pub m: i32,
    /// GEMM column count of C
    pub n: i32,
    /// GEMM inner dimension
    pub k: i32,
    /// Leading dimension of A
    pub lda: i32,
    /// Leading dimension of B
    pub ldb: i32,
    /// Leading dimension of C
    pub ldc: i32,
    /// A is transposed
    pub trans_a: bool,
    /// B is transposed
    pub trans_b: bool,
}

impl Default for Uniforms {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            beta: 0.0,
            incx: 1,
            incy: 1,
            max_index: 0,
            m: 0,
            n: 0,
            k: 0,
            lda: 1,
            ldb: 1,
            ldc: 1,
            trans_a: false,
            trans_b: false,
        }
    }
}

/// One full-viewport compute pass.
///
/// `inputs` are bound to texture units in order; `output` is the render
/// target. The output may also appear among the inputs (in-place passes);
/// a pass always observes the values inputs held before the pass started.
#[derive(Debug)]
pub struct PassDesc<'a> {
    /// Per-pixel program to run
    pub program: Program,
    /// Input surfaces, bound in order (0..=2)
    pub inputs: &'a [TargetId],
    /// Render target written by the pass
    pub output: TargetId,
    /// Viewport in pixels; the flat-index rule uses this width
    pub viewport: (usize, usize),
    /// Scalar/stride/bound parameters
    pub uniforms: Uniforms,
}

/// The collaborator contract: a ready compute surface with compiled programs.
pub trait RenderSurface {
    /// Allocate a `width` x `height` pixel target, zero-initialized.
    fn create_target(&mut self, width: usize, height: usize) -> Result<TargetId>;

    /// Release a target. Unknown handles are ignored.
    fn destroy_target(&mut self, target: TargetId);

    /// Upload exactly `width * height * 4` texel lanes into the target region.
    fn upload(&mut self, target: TargetId, width: usize, height: usize, texels: &[f32])
        -> Result<()>;

    /// Download exactly `width * height * 4` texel lanes from the target.
    fn download(
        &mut self,
        target: TargetId,
        width: usize,
        height: usize,
        texels: &mut [f32],
    ) -> Result<()>;

    /// Execute one full-viewport pass.
    fn draw(&mut self, pass: &PassDesc<'_>) -> Result<()>;

    /// Block until all previously issued work has completed.
    fn sync(&mut self);
}
