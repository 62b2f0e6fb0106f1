//! wgpu-backed compute surface
//!
//! Each target is a storage buffer of packed `f32` lanes. A draw snapshots
//! its input buffers into scratch copies, binds them read-only alongside the
//! read-write output, and dispatches one workgroup grid covering the
//! viewport. All programs are compiled at construction; readback goes
//! through a mapped staging buffer.

mod shaders;

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::error::{BlasError, Result};
use crate::layout::{BYTES_PER_PIXEL, FLOATS_PER_PIXEL};
use crate::surface::{PassDesc, Program, RenderSurface, TargetId, Uniforms};

const WORKGROUP_DIM: u32 = 16;

/// GPU-side mirror of [`Uniforms`] plus the viewport extent.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct RawUniforms {
    width: u32,
    height: u32,
    max_index: i32,
    incx: i32,
    incy: i32,
    alpha: f32,
    beta: f32,
    m: i32,
    n: i32,
    k: i32,
    lda: i32,
    ldb: i32,
    ldc: i32,
    trans_a: u32,
    trans_b: u32,
    pad0: u32,
}

impl RawUniforms {
    fn new(u: &Uniforms, viewport: (usize, usize)) -> Self {
        Self {
            width: viewport.0 as u32,
            height: viewport.1 as u32,
            max_index: u.max_index,
            incx: u.incx,
            incy: u.incy,
            alpha: u.alpha,
            beta: u.beta,
            m: u.m,
            n: u.n,
            k: u.k,
            lda: u.lda,
            ldb: u.ldb,
            ldc: u.ldc,
            trans_a: u.trans_a as u32,
            trans_b: u.trans_b as u32,
            pad0: 0,
        }
    }
}

struct GpuTarget {
    buffer: wgpu::Buffer,
    size: u64,
}

/// Compute surface executing the per-pixel programs as wgpu dispatches.
pub struct GpuSurface {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipelines: HashMap<Program, wgpu::ComputePipeline>,
    bind_layout: wgpu::BindGroupLayout,
    /// Bound to input slots a program does not use
    dummy: wgpu::Buffer,
    targets: HashMap<TargetId, GpuTarget>,
    next_id: u64,
}

impl GpuSurface {
    /// Acquire an adapter and compile every program.
    pub fn new() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| BlasError::AllocFailed("no compatible GPU adapter".to_string()))?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("rasterblas device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
            },
            None,
        ))
        .map_err(|e| BlasError::AllocFailed(format!("device request failed: {e}")))?;

        let bind_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("rasterblas bindings"),
            entries: &[
                uniform_entry(0),
                storage_entry(1, true),
                storage_entry(2, true),
                storage_entry(3, true),
                storage_entry(4, false),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("rasterblas layout"),
            bind_group_layouts: &[&bind_layout],
            push_constant_ranges: &[],
        });

        let mut pipelines = HashMap::new();
        for program in Program::ALL {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("rasterblas program"),
                source: wgpu::ShaderSource::Wgsl(shaders::source(program).into()),
            });
            let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("rasterblas pipeline"),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: "main",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });
            pipelines.insert(program, pipeline);
        }

        let dummy = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("rasterblas dummy input"),
            size: BYTES_PER_PIXEL as u64,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });

        Ok(Self {
            device,
            queue,
            pipelines,
            bind_layout,
            dummy,
            targets: HashMap::new(),
            next_id: 1,
        })
    }

    fn target(&self, id: TargetId) -> Result<&GpuTarget> {
        self.targets
            .get(&id)
            .ok_or_else(|| BlasError::InvalidValue(format!("unknown target {id:?}")))
    }

    /// Read `size` bytes of `buffer` back to the host.
    fn read_back(&self, buffer: &wgpu::Buffer, size: u64, out: &mut [f32]) -> Result<()> {
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("rasterblas staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("rasterblas readback"),
            });
        encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = futures_intrusive::channel::shared::oneshot_channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = sender.send(res);
        });
        self.device.poll(wgpu::Maintain::Wait);

        match pollster::block_on(receiver.receive()) {
            Some(Ok(())) => {}
            _ => {
                return Err(BlasError::ExecutionFailed(
                    "buffer readback mapping failed".to_string(),
                ))
            }
        }

        let data = slice.get_mapped_range();
        out.copy_from_slice(bytemuck::cast_slice(&data));
        drop(data);
        staging.unmap();
        Ok(())
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl RenderSurface for GpuSurface {
    fn create_target(&mut self, width: usize, height: usize) -> Result<TargetId> {
        let size = (width * height * BYTES_PER_PIXEL) as u64;
        // wgpu zero-initializes buffers
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("rasterblas target"),
            size,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let id = TargetId(self.next_id);
        self.next_id += 1;
        self.targets.insert(id, GpuTarget { buffer, size });
        Ok(id)
    }

    fn destroy_target(&mut self, target: TargetId) {
        if let Some(t) = self.targets.remove(&target) {
            t.buffer.destroy();
        }
    }

    fn upload(
        &mut self,
        target: TargetId,
        width: usize,
        height: usize,
        texels: &[f32],
    ) -> Result<()> {
        let lanes = width * height * FLOATS_PER_PIXEL;
        let t = self.target(target)?;
        if texels.len() < lanes || (lanes * 4) as u64 > t.size {
            return Err(BlasError::InvalidValue(
                "upload region exceeds target".to_string(),
            ));
        }
        self.queue
            .write_buffer(&t.buffer, 0, bytemuck::cast_slice(&texels[..lanes]));
        Ok(())
    }

    fn download(
        &mut self,
        target: TargetId,
        width: usize,
        height: usize,
        texels: &mut [f32],
    ) -> Result<()> {
        let lanes = width * height * FLOATS_PER_PIXEL;
        let t = self.target(target)?;
        if texels.len() < lanes || (lanes * 4) as u64 > t.size {
            return Err(BlasError::InvalidValue(
                "download region exceeds target".to_string(),
            ));
        }
        let buffer = &self.targets[&target].buffer;
        let size = (lanes * 4) as u64;
        let mut out = vec![0.0f32; lanes];
        self.read_back(buffer, size, &mut out)?;
        texels[..lanes].copy_from_slice(&out);
        Ok(())
    }

    fn draw(&mut self, pass: &PassDesc<'_>) -> Result<()> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("rasterblas pass"),
            });

        // Snapshot inputs so a pass whose output aliases an input still
        // reads pre-pass values.
        let mut snapshots = Vec::with_capacity(pass.inputs.len());
        for id in pass.inputs {
            let t = self.target(*id)?;
            let copy = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("rasterblas input snapshot"),
                size: t.size,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            encoder.copy_buffer_to_buffer(&t.buffer, 0, &copy, 0, t.size);
            snapshots.push(copy);
        }

        let output = self.target(pass.output)?;
        let raw = RawUniforms::new(&pass.uniforms, pass.viewport);
        let uniform = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("rasterblas uniforms"),
                contents: bytemuck::bytes_of(&raw),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let in0 = snapshots.first().unwrap_or(&self.dummy);
        let in1 = snapshots.get(1).unwrap_or(&self.dummy);
        let in2 = snapshots.get(2).unwrap_or(&self.dummy);
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("rasterblas bind group"),
            layout: &self.bind_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: in0.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: in1.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: in2.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: output.buffer.as_entire_binding(),
                },
            ],
        });

        let pipeline = self
            .pipelines
            .get(&pass.program)
            .ok_or_else(|| BlasError::ExecutionFailed(format!("{:?} not compiled", pass.program)))?;

        {
            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("rasterblas dispatch"),
                timestamp_writes: None,
            });
            cpass.set_pipeline(pipeline);
            cpass.set_bind_group(0, &bind_group, &[]);
            let (vw, vh) = pass.viewport;
            cpass.dispatch_workgroups(
                (vw as u32).div_ceil(WORKGROUP_DIM),
                (vh as u32).div_ceil(WORKGROUP_DIM),
                1,
            );
        }

        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn sync(&mut self) {
        self.device.poll(wgpu::Maintain::Wait);
    }
}
