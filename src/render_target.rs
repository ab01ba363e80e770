//! Off-screen color and depth targets for the scene pass.

use crate::gpu::GpuContext;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// The drawing buffer: the scene is rendered here at `viewport * pixel_ratio`
/// and then blitted onto the window surface.
///
/// The color texture uses the surface format so the blit is a plain copy.
pub struct RenderTarget {
    #[allow(dead_code)]
    color: wgpu::Texture,
    /// Bound as the scene pass color attachment and sampled by the blit.
    pub view: wgpu::TextureView,
    #[allow(dead_code)]
    depth: wgpu::Texture,
    pub depth_view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl RenderTarget {
    /// Allocate a target of `width` x `height` pixels (clamped to at least 1x1).
    pub fn new(gpu: &GpuContext, width: u32, height: u32) -> Self {
        let limit = gpu.device.limits().max_texture_dimension_2d;
        let width = width.clamp(1, limit);
        let height = height.clamp(1, limit);
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let color = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Scene Color Target"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: gpu.config.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = color.create_view(&wgpu::TextureViewDescriptor::default());

        let depth = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Scene Depth Target"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            color,
            view,
            depth,
            depth_view,
            width,
            height,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Reallocate if the drawing buffer size changed. Returns true if it did.
    pub fn ensure_size(&mut self, gpu: &GpuContext, width: u32, height: u32) -> bool {
        let limit = gpu.device.limits().max_texture_dimension_2d;
        let wanted = (width.clamp(1, limit), height.clamp(1, limit));
        if wanted == self.size() {
            return false;
        }
        log::debug!("drawing buffer resized to {}x{}", wanted.0, wanted.1);
        *self = Self::new(gpu, wanted.0, wanted.1);
        true
    }
}
