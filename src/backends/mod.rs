//! Surface backends
//!
//! `soft` is the always-available CPU rasterizer used as the default surface
//! and as the reference for the per-pixel programs. `gpu` executes the same
//! programs as wgpu compute dispatches and is gated behind the `gpu` feature.

pub mod soft;

#[cfg(feature = "gpu")]
pub mod gpu;

pub use soft::SoftSurface;

#[cfg(feature = "gpu")]
pub use gpu::GpuSurface;
