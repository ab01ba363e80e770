//! Fireflies drawn as fixed-size screen-space squares.
//!
//! One instance per firefly. The instance buffer is rewritten only when the
//! swarm reports a change, and sprites ignore fog and lighting.

use crate::camera::PerspectiveCamera;
use crate::fireflies::FireflySwarm;
use crate::gpu::GpuContext;
use crate::render_target::DEPTH_FORMAT;

/// Sprite edge in CSS pixels, scaled by the pixel ratio when drawn.
pub const POINT_SIZE: f32 = 4.0;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FireflyInstance {
    pub position: [f32; 3],
    pub _padding: f32,
    pub color: [f32; 4],
}

impl FireflyInstance {
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<FireflyInstance>() as u64,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &[
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            },
            wgpu::VertexAttribute {
                offset: 16,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x4,
            },
        ],
    };
}

/// Instance data for every firefly, in swarm order.
pub fn instances(swarm: &FireflySwarm) -> Vec<FireflyInstance> {
    swarm
        .positions()
        .iter()
        .zip(swarm.colors())
        .map(|(p, c)| FireflyInstance {
            position: p.to_array(),
            _padding: 0.0,
            color: c.to_array(),
        })
        .collect()
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct FireflyUniforms {
    view_proj: [[f32; 4]; 4],
    resolution: [f32; 2],
    point_size: f32,
    _padding: f32,
}

pub struct FireflyPass {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    instance_buffer: Option<wgpu::Buffer>,
    instance_count: u32,
}

impl FireflyPass {
    pub fn new(gpu: &GpuContext) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Firefly Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/fireflies.wgsl").into()),
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Firefly Uniforms"),
            size: std::mem::size_of::<FireflyUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Firefly Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Firefly Bind Group"),
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Firefly Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Firefly Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs"),
                buffers: &[FireflyInstance::LAYOUT],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: gpu.config.format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            uniform_buffer,
            uniform_bind_group,
            instance_buffer: None,
            instance_count: 0,
        }
    }

    /// Upload camera and sprite size, and the swarm if it moved.
    pub fn prepare(
        &mut self,
        gpu: &GpuContext,
        camera: &PerspectiveCamera,
        swarm: &mut FireflySwarm,
        resolution: (u32, u32),
        pixel_ratio: f32,
    ) {
        let uniforms = FireflyUniforms {
            view_proj: camera.view_projection().to_cols_array_2d(),
            resolution: [resolution.0 as f32, resolution.1 as f32],
            point_size: POINT_SIZE * pixel_ratio,
            _padding: 0.0,
        };
        gpu.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));

        if !swarm.take_dirty() {
            return;
        }
        let data = instances(swarm);
        self.instance_count = data.len() as u32;
        if data.is_empty() {
            return;
        }

        let size = std::mem::size_of_val(data.as_slice()) as u64;
        let fits = self.instance_buffer.as_ref().is_some_and(|b| b.size() >= size);
        if !fits {
            self.instance_buffer = Some(gpu.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Firefly Instances"),
                size,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
        }
        if let Some(buffer) = &self.instance_buffer {
            gpu.queue.write_buffer(buffer, 0, bytemuck::cast_slice(&data));
        }
    }

    pub fn render(&self, render_pass: &mut wgpu::RenderPass) {
        let Some(buffer) = &self.instance_buffer else {
            return;
        };
        if self.instance_count == 0 {
            return;
        }
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
        render_pass.set_vertex_buffer(0, buffer.slice(..));
        render_pass.draw(0..6, 0..self.instance_count);
    }
}
