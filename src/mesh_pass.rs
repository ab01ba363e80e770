//! Lit, fogged, textured mesh rendering.
//!
//! The mesh pass uses three bind groups:
//! - **Group 0**: frame uniforms (view/projection, camera position, fog, lights)
//! - **Group 1**: model uniforms (model matrix, normal matrix, color), one
//!   aligned slot per draw addressed with a dynamic offset
//! - **Group 2**: base color texture and sampler
//!
//! GPU copies of the attached model (one [`Mesh`] per primitive, one texture
//! per image) are owned here and rebuilt by [`MeshPass::upload_model`].

use glam::Mat4;

use crate::camera::PerspectiveCamera;
use crate::ecs::{RenderMesh, WorldTransform};
use crate::gpu::GpuContext;
use crate::lighting::{Fog, LightUniforms, SceneLights};
use crate::mesh::{Mesh, Vertex3d};
use crate::model::ModelData;
use crate::render_target::DEPTH_FORMAT;
use crate::texture::Texture;

/// Per-frame uniforms shared by every draw.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub camera_position: [f32; 4],
    pub fog_color: [f32; 4],
    /// Fog near (x) and far (y) in view depth.
    pub fog_range: [f32; 4],
    pub lights: LightUniforms,
}

impl FrameUniforms {
    pub fn new(camera: &PerspectiveCamera, fog: &Fog, lights: &SceneLights) -> Self {
        Self {
            view_proj: camera.view_projection().to_cols_array_2d(),
            view: camera.view_matrix().to_cols_array_2d(),
            camera_position: camera.position.extend(1.0).to_array(),
            fog_color: fog.color.to_array(),
            fog_range: [fog.near, fog.far, 0.0, 0.0],
            lights: LightUniforms::from(lights),
        }
    }
}

/// Per-draw model uniforms.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelUniforms {
    pub model: [[f32; 4]; 4],
    /// Inverse transpose of the model matrix.
    pub normal_matrix: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl ModelUniforms {
    pub fn new(model: Mat4, color: [f32; 4]) -> Self {
        let normal = if model.determinant().abs() > f32::EPSILON {
            model.inverse().transpose()
        } else {
            Mat4::IDENTITY
        };
        Self {
            model: model.to_cols_array_2d(),
            normal_matrix: normal.to_cols_array_2d(),
            color,
        }
    }
}

/// Round `size` up to the next multiple of `alignment`.
pub fn aligned_stride(size: u64, alignment: u64) -> u64 {
    let alignment = alignment.max(1);
    size.div_ceil(alignment) * alignment
}

struct DrawItem {
    primitive: usize,
    texture: Option<usize>,
}

pub struct MeshPass {
    pipeline: wgpu::RenderPipeline,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    model_layout: wgpu::BindGroupLayout,
    model_buffer: wgpu::Buffer,
    model_bind_group: wgpu::BindGroup,
    /// Byte distance between model slots.
    model_stride: u64,
    model_capacity: usize,
    texture_layout: wgpu::BindGroupLayout,
    white: wgpu::BindGroup,
    meshes: Vec<Mesh>,
    textures: Vec<wgpu::BindGroup>,
    // Reused between frames
    staging: Vec<u8>,
    draws: Vec<DrawItem>,
}

impl MeshPass {
    const INITIAL_CAPACITY: usize = 64;

    pub fn new(gpu: &GpuContext) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Mesh Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/mesh.wgsl").into()),
        });

        // Frame uniforms (group 0)
        let frame_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Uniforms"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let frame_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Bind Group"),
            layout: &frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        // Model uniforms (group 1), one slot per draw
        let model_stride = aligned_stride(
            std::mem::size_of::<ModelUniforms>() as u64,
            u64::from(device.limits().min_uniform_buffer_offset_alignment),
        );

        let model_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Model Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<ModelUniforms>() as u64
                    ),
                },
                count: None,
            }],
        });

        let (model_buffer, model_bind_group) =
            Self::create_model_buffer(gpu, &model_layout, model_stride, Self::INITIAL_CAPACITY);

        // Texture (group 2)
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Mesh Texture Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let white = Self::texture_bind_group(gpu, &texture_layout, &Texture::white(gpu));

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mesh Pipeline Layout"),
            bind_group_layouts: &[&frame_layout, &model_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Mesh Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs"),
                buffers: &[Vertex3d::LAYOUT],
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
                cull_mode: Some(wgpu::Face::Back),
                front_face: wgpu::FrontFace::Ccw,
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
            frame_buffer,
            frame_bind_group,
            model_layout,
            model_buffer,
            model_bind_group,
            model_stride,
            model_capacity: Self::INITIAL_CAPACITY,
            texture_layout,
            white,
            meshes: Vec::new(),
            textures: Vec::new(),
            staging: Vec::new(),
            draws: Vec::new(),
        }
    }

    fn create_model_buffer(
        gpu: &GpuContext,
        layout: &wgpu::BindGroupLayout,
        stride: u64,
        capacity: usize,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Model Uniforms"),
            size: stride * capacity as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Model Bind Group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<ModelUniforms>() as u64),
                }),
            }],
        });
        (buffer, bind_group)
    }

    fn texture_bind_group(
        gpu: &GpuContext,
        layout: &wgpu::BindGroupLayout,
        texture: &Texture,
    ) -> wgpu::BindGroup {
        gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Mesh Texture Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&texture.sampler),
                },
            ],
        })
    }

    /// Replace the GPU copies of the model's primitives and images.
    pub fn upload_model(&mut self, gpu: &GpuContext, model: &ModelData) {
        self.meshes = model
            .primitives
            .iter()
            .map(|p| p.geometry.upload(gpu))
            .collect();
        self.textures = model
            .images
            .iter()
            .enumerate()
            .map(|(i, image)| {
                let texture = Texture::from_rgba(
                    gpu,
                    &image.pixels,
                    image.width,
                    image.height,
                    &format!("Model Texture {i}"),
                );
                Self::texture_bind_group(gpu, &self.texture_layout, &texture)
            })
            .collect();
        log::debug!(
            "uploaded {} meshes and {} textures",
            self.meshes.len(),
            self.textures.len()
        );
    }

    /// Drop every model resource.
    pub fn clear_model(&mut self) {
        self.meshes.clear();
        self.textures.clear();
    }

    /// Write this frame's uniforms. Must run before the pass is recorded.
    pub fn prepare(
        &mut self,
        gpu: &GpuContext,
        camera: &PerspectiveCamera,
        fog: &Fog,
        lights: &SceneLights,
        world: &hecs::World,
    ) {
        let frame = FrameUniforms::new(camera, fog, lights);
        gpu.queue
            .write_buffer(&self.frame_buffer, 0, bytemuck::cast_slice(&[frame]));

        self.draws.clear();
        self.staging.clear();
        let stride = self.model_stride as usize;
        for (_, (transform, render)) in world.query::<(&WorldTransform, &RenderMesh)>().iter() {
            if render.primitive.index() >= self.meshes.len() {
                continue;
            }
            let uniforms = ModelUniforms::new(transform.0, render.color.to_array());
            let start = self.staging.len();
            self.staging.extend_from_slice(bytemuck::bytes_of(&uniforms));
            self.staging.resize(start + stride, 0);
            self.draws.push(DrawItem {
                primitive: render.primitive.index(),
                texture: render.texture.map(|t| t.index()),
            });
        }

        if self.draws.len() > self.model_capacity {
            let capacity = self.draws.len().next_power_of_two();
            let (buffer, bind_group) =
                Self::create_model_buffer(gpu, &self.model_layout, self.model_stride, capacity);
            self.model_buffer = buffer;
            self.model_bind_group = bind_group;
            self.model_capacity = capacity;
        }

        if !self.staging.is_empty() {
            gpu.queue.write_buffer(&self.model_buffer, 0, &self.staging);
        }
    }

    /// Draw everything collected by [`prepare`](Self::prepare).
    pub fn render(&self, render_pass: &mut wgpu::RenderPass) {
        if self.draws.is_empty() {
            return;
        }

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.frame_bind_group, &[]);

        for (slot, draw) in self.draws.iter().enumerate() {
            let Some(mesh) = self.meshes.get(draw.primitive).filter(|m| m.index_count > 0) else {
                continue;
            };
            let offset = (slot as u64 * self.model_stride) as u32;
            render_pass.set_bind_group(1, &self.model_bind_group, &[offset]);

            let texture = draw
                .texture
                .and_then(|t| self.textures.get(t))
                .unwrap_or(&self.white);
            render_pass.set_bind_group(2, texture, &[]);

            render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn model_slots_are_aligned() {
        let size = std::mem::size_of::<ModelUniforms>() as u64;
        assert_eq!(size, 144);
        assert_eq!(aligned_stride(size, 256), 256);
        assert_eq!(aligned_stride(256, 256), 256);
        assert_eq!(aligned_stride(257, 256), 512);
        assert_eq!(aligned_stride(144, 0), 144);
    }

    #[test]
    fn normal_matrix_undoes_non_uniform_scale() {
        let model = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let uniforms = ModelUniforms::new(model, [1.0; 4]);
        let normal = Mat4::from_cols_array_2d(&uniforms.normal_matrix);
        let n = normal.transform_vector3(Vec3::X);
        assert!((n.x - 0.5).abs() < 1e-6);
    }

    #[test]
    fn degenerate_model_gets_identity_normals() {
        let uniforms = ModelUniforms::new(Mat4::from_scale(Vec3::ZERO), [1.0; 4]);
        assert_eq!(uniforms.normal_matrix, Mat4::IDENTITY.to_cols_array_2d());
    }

    #[test]
    fn frame_uniforms_carry_fog_range() {
        let camera = PerspectiveCamera::new(75.0, 1.0, 0.1, 100.0).at(Vec3::new(0.0, 0.0, 5.0));
        let frame = FrameUniforms::new(&camera, &Fog::default(), &SceneLights::default());
        assert_eq!(frame.fog_range[..2], [1.0, 15.0]);
        assert_eq!(frame.camera_position, [0.0, 0.0, 5.0, 1.0]);
    }
}
