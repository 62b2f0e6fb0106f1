//! Compute context: buffer allocator, host transfers, and the dispatcher
//!
//! A [`Context`] owns one [`RenderSurface`], a host staging area the size of
//! the full surface, and the registry of live device buffers. All BLAS entry
//! points are methods on the context; each one resolves buffer handles
//! against the registry, picks a viewport shape, and issues one or more
//! full-viewport passes through the dispatcher.
//!
//! The registry is an owning map keyed by opaque [`BufferId`] handles; a
//! freed or foreign handle simply fails to resolve and surfaces as
//! [`BlasError::InvalidValue`].

use std::collections::HashMap;

use crate::backends::SoftSurface;
use crate::error::{BlasError, Result};
use crate::layout::{self, SurfaceShape, BYTES_PER_PIXEL, FLOATS_PER_PIXEL};
use crate::surface::{PassDesc, Program, RenderSurface, TargetId, Uniforms};

/// Opaque handle to a device buffer owned by a [`Context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(u64);

/// One numeric array resident on the compute surface.
#[derive(Debug)]
pub(crate) struct DeviceBuffer {
    /// Logical size in bytes
    pub size: usize,
    /// Pixel-surface shape of the backing target
    pub shape: SurfaceShape,
    /// Backing pixel surface / render target
    pub target: TargetId,
}

impl DeviceBuffer {
    /// Element (lane) capacity implied by the logical byte size.
    pub fn len(&self) -> usize {
        self.size / std::mem::size_of::<f32>()
    }
}

/// Transfer direction for [`Context::memcpy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemcpyKind {
    /// Resolve the direction from which endpoints are live device buffers
    Infer,
    /// Host memory into a device buffer
    HostToDevice,
    /// Device buffer into host memory
    DeviceToHost,
    /// Device buffer into device buffer (not supported; use `scopy`)
    DeviceToDevice,
}

/// Source endpoint of a transfer.
#[derive(Debug)]
pub enum CopySrc<'a> {
    /// Host-side data
    Host(&'a [f32]),
    /// A device buffer handle
    Device(BufferId),
}

/// Destination endpoint of a transfer.
#[derive(Debug)]
pub enum CopyDst<'a> {
    /// Host-side storage
    Host(&'a mut [f32]),
    /// A device buffer handle
    Device(BufferId),
}

/// An independent compute session.
///
/// Exactly one context exists per session; it exclusively owns every buffer
/// allocated under it. Dropping the context frees all buffers and releases
/// the surface, invalidating every handle derived from it.
pub struct Context {
    surface: Box<dyn RenderSurface>,
    max_width: usize,
    max_height: usize,
    /// Whole-surface staging area for padded/partial transfers
    staging: Vec<f32>,
    buffers: HashMap<BufferId, DeviceBuffer>,
    next_id: u64,
}

impl Context {
    /// Create a context over the built-in software rasterizer.
    ///
    /// `width` and `height` fix the maximum surface shape; the largest
    /// allocatable buffer holds `width * height * 4` elements.
    pub fn new(width: usize, height: usize) -> Result<Self> {
        Self::with_surface(Box::new(SoftSurface::new()), width, height)
    }

    /// Create a context over a wgpu-backed surface.
    #[cfg(feature = "gpu")]
    pub fn gpu(width: usize, height: usize) -> Result<Self> {
        let surface = crate::backends::gpu::GpuSurface::new()?;
        Self::with_surface(Box::new(surface), width, height)
    }

    /// Create a context over a caller-supplied surface.
    pub fn with_surface(
        surface: Box<dyn RenderSurface>,
        width: usize,
        height: usize,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(BlasError::InvalidValue(
                "surface capacity must be nonzero".to_string(),
            ));
        }
        Ok(Self {
            surface,
            max_width: width,
            max_height: height,
            staging: vec![0.0; width * height * FLOATS_PER_PIXEL],
            buffers: HashMap::new(),
            next_id: 1,
        })
    }

    /// Maximum capacity in bytes of a single buffer.
    pub fn capacity(&self) -> usize {
        self.max_width * self.max_height * BYTES_PER_PIXEL
    }

    /// Number of live buffers in the registry.
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Block until all previously issued device work completes.
    pub fn sync(&mut self) {
        self.surface.sync();
    }

    // ------------------------------------------------------------------
    // Allocator
    // ------------------------------------------------------------------

    /// Allocate a device buffer of `size` bytes.
    ///
    /// The pixel shape is derived by the coordinate mapper; a request whose
    /// derived shape exceeds the surface capacity fails with
    /// [`BlasError::DimensionOverflow`] and leaves the registry unchanged.
    pub fn alloc(&mut self, size: usize) -> Result<BufferId> {
        if size == 0 {
            return Err(BlasError::InvalidValue(
                "cannot allocate an empty buffer".to_string(),
            ));
        }
        let shape = layout::shape_for(size, self.max_width, self.max_height)?;
        let target = self.surface.create_target(shape.width, shape.height)?;

        let id = BufferId(self.next_id);
        self.next_id += 1;
        self.buffers.insert(
            id,
            DeviceBuffer {
                size,
                shape,
                target,
            },
        );
        Ok(id)
    }

    /// Release a buffer and remove it from the registry.
    ///
    /// A handle that is already freed (or foreign) is ignored; any handle
    /// becomes invalid for further operations once freed.
    pub fn free(&mut self, buf: BufferId) {
        if let Some(buffer) = self.buffers.remove(&buf) {
            self.surface.destroy_target(buffer.target);
        }
    }

    /// Allocate a temporary buffer for the duration of `f`, releasing it on
    /// every exit path.
    pub(crate) fn with_temp<T>(
        &mut self,
        size: usize,
        f: impl FnOnce(&mut Self, BufferId) -> Result<T>,
    ) -> Result<T> {
        let temp = self.alloc(size)?;
        let out = f(self, temp);
        self.free(temp);
        out
    }

    pub(crate) fn buffer(&self, id: BufferId) -> Result<&DeviceBuffer> {
        self.buffers
            .get(&id)
            .ok_or_else(|| BlasError::InvalidValue(format!("unknown buffer handle {id:?}")))
    }

    // ------------------------------------------------------------------
    // Host <-> device transfer
    // ------------------------------------------------------------------

    /// Copy `size` bytes between host memory and a device buffer.
    ///
    /// With [`MemcpyKind::Infer`] the direction is resolved from which
    /// endpoints name live device buffers. Direct device-to-device copies are
    /// rejected with [`BlasError::NotSupported`]; use [`Context::scopy`]
    /// instead. Transfers into or out of a padded buffer, and partial
    /// transfers, stage through the context's host staging area so the last
    /// partially-filled pixel is never corrupted.
    pub fn memcpy(
        &mut self,
        dst: CopyDst<'_>,
        src: CopySrc<'_>,
        size: usize,
        kind: MemcpyKind,
    ) -> Result<()> {
        let dst_buf = match &dst {
            CopyDst::Device(id) => self.buffers.get(id),
            CopyDst::Host(_) => None,
        };
        let src_buf = match &src {
            CopySrc::Device(id) => self.buffers.get(id),
            CopySrc::Host(_) => None,
        };

        let kind = match kind {
            MemcpyKind::Infer => match (dst_buf.is_some(), src_buf.is_some()) {
                (true, true) => MemcpyKind::DeviceToDevice,
                (true, false) => MemcpyKind::HostToDevice,
                (false, true) => MemcpyKind::DeviceToHost,
                (false, false) => {
                    return Err(BlasError::InvalidValue(
                        "neither endpoint is a live device buffer".to_string(),
                    ))
                }
            },
            explicit => explicit,
        };

        if size % std::mem::size_of::<f32>() != 0 {
            return Err(BlasError::InvalidValue(format!(
                "transfer size {size} is not a whole number of elements"
            )));
        }
        let n = size / std::mem::size_of::<f32>();

        match kind {
            MemcpyKind::DeviceToDevice => Err(BlasError::NotSupported(
                "device-to-device memcpy; use scopy".to_string(),
            )),
            MemcpyKind::HostToDevice => {
                let (CopyDst::Device(id), CopySrc::Host(host)) = (&dst, &src) else {
                    return Err(BlasError::InvalidValue(
                        "host-to-device requires a device destination and host source".to_string(),
                    ));
                };
                let id = *id;
                let (size_ok, shape) = {
                    let buf = self.buffer(id)?;
                    (size <= buf.size, buf.shape)
                };
                if !size_ok || n > host.len() {
                    return Err(BlasError::InvalidValue(format!(
                        "transfer of {size} bytes exceeds an endpoint"
                    )));
                }
                let exact = {
                    let buf = self.buffer(id)?;
                    !shape.padded && size == buf.size && n == shape.lanes()
                };
                let target = self.buffer(id)?.target;
                if exact {
                    self.surface.upload(target, shape.width, shape.height, &host[..n])
                } else {
                    // Stage: overlay onto the current contents so lanes past
                    // the transfer (padding, partial prefix) survive.
                    let lanes = shape.lanes();
                    self.surface.download(
                        target,
                        shape.width,
                        shape.height,
                        &mut self.staging[..lanes],
                    )?;
                    self.staging[..n].copy_from_slice(&host[..n]);
                    self.surface
                        .upload(target, shape.width, shape.height, &self.staging[..lanes])
                }
            }
            MemcpyKind::DeviceToHost => {
                let (CopyDst::Host(host), CopySrc::Device(id)) = (dst, &src) else {
                    return Err(BlasError::InvalidValue(
                        "device-to-host requires a host destination and device source".to_string(),
                    ));
                };
                let id = *id;
                let (size_ok, shape, target) = {
                    let buf = self.buffer(id)?;
                    (size <= buf.size, buf.shape, buf.target)
                };
                if !size_ok || n > host.len() {
                    return Err(BlasError::InvalidValue(format!(
                        "transfer of {size} bytes exceeds an endpoint"
                    )));
                }
                let exact = {
                    let buf = self.buffer(id)?;
                    !shape.padded && size == buf.size && n == shape.lanes()
                };
                if exact {
                    self.surface
                        .download(target, shape.width, shape.height, &mut host[..n])
                } else {
                    let lanes = shape.lanes();
                    self.surface.download(
                        target,
                        shape.width,
                        shape.height,
                        &mut self.staging[..lanes],
                    )?;
                    host[..n].copy_from_slice(&self.staging[..n]);
                    Ok(())
                }
            }
            MemcpyKind::Infer => unreachable!("direction resolved above"),
        }
    }

    // ------------------------------------------------------------------
    // Dispatcher
    // ------------------------------------------------------------------

    /// Pick the viewport shape for an `n`-element operation against `buf`.
    ///
    /// When `n` matches the buffer's full element capacity its precomputed
    /// shape is reused; otherwise the shape is recomputed for `n`.
    pub(crate) fn op_shape(&self, n: usize, buf: BufferId) -> Result<(usize, usize)> {
        let buf = self.buffer(buf)?;
        if n == buf.len() {
            Ok((buf.shape.width, buf.shape.height))
        } else {
            let shape = layout::shape_for(
                n * std::mem::size_of::<f32>(),
                self.max_width,
                self.max_height,
            )?;
            Ok((shape.width, shape.height))
        }
    }

    /// Issue one full-viewport pass: bind inputs in order, set uniforms, set
    /// the render target and viewport, draw the quad.
    pub(crate) fn run_pass(
        &mut self,
        program: Program,
        inputs: &[BufferId],
        output: BufferId,
        viewport: (usize, usize),
        uniforms: Uniforms,
    ) -> Result<()> {
        debug_assert_eq!(inputs.len(), program.input_arity());
        let mut targets = [TargetId(0); 3];
        for (slot, id) in inputs.iter().enumerate() {
            targets[slot] = self.buffer(*id)?.target;
        }
        let output = self.buffer(output)?.target;
        self.surface.draw(&PassDesc {
            program,
            inputs: &targets[..inputs.len()],
            output,
            viewport,
            uniforms,
        })
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        // Free every buffer still registered before the surface goes away.
        for (_, buffer) in self.buffers.drain() {
            self.surface.destroy_target(buffer.target);
        }
    }
}
