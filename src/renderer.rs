//! Frame rendering.
//!
//! Order per frame:
//! 1. scene pass into the drawing buffer: clear, meshes, fireflies
//! 2. blit the drawing buffer to the window surface
//! 3. 2D pass on the surface: loading overlay, then the debug panel

use crate::assets::{Assets, FontId};
use crate::blit::BlitPass;
use crate::draw2d::Draw2d;
use crate::firefly_pass::FireflyPass;
use crate::gpu::GpuContext;
use crate::mesh_pass::MeshPass;
use crate::render_target::RenderTarget;
use crate::viewer::Viewer;

pub struct Renderer {
    target: RenderTarget,
    mesh_pass: MeshPass,
    firefly_pass: FireflyPass,
    blit: BlitPass,
    draw_2d: Draw2d,
    assets: Assets,
    font: Option<FontId>,
    /// Scene model generation currently on the GPU.
    uploaded_generation: u64,
}

impl Renderer {
    /// Panel label size in logical pixels.
    const FONT_SIZE: f32 = 13.0;

    pub fn new(gpu: &GpuContext, viewer: &Viewer) -> Self {
        let (width, height) = viewer.viewport().drawing_buffer();
        let target = RenderTarget::new(gpu, width, height);
        let mut blit = BlitPass::new(gpu);
        blit.set_source(gpu, &target);

        let mut assets = Assets::new();
        let font_px = Self::FONT_SIZE * viewer.viewport().device_pixel_ratio;
        let font = assets.system_font(gpu, font_px);
        if font.is_none() {
            log::warn!("no system font found, debug panel labels are disabled");
        }

        Self {
            target,
            mesh_pass: MeshPass::new(gpu),
            firefly_pass: FireflyPass::new(gpu),
            blit,
            draw_2d: Draw2d::new(gpu),
            assets,
            font,
            uploaded_generation: 0,
        }
    }

    /// Upload a newly attached model.
    fn sync_model(&mut self, gpu: &GpuContext, viewer: &Viewer) {
        let generation = viewer.scene.model_generation();
        if generation == self.uploaded_generation {
            return;
        }
        match viewer.scene.model() {
            Some(model) => self.mesh_pass.upload_model(gpu, model),
            None => self.mesh_pass.clear_model(),
        }
        self.uploaded_generation = generation;
    }

    /// Draw one frame from the viewer's current state.
    pub fn render(&mut self, gpu: &GpuContext, viewer: &mut Viewer) -> Result<(), wgpu::SurfaceError> {
        let viewport = viewer.viewport();
        let (width, height) = viewport.drawing_buffer();
        if self.target.ensure_size(gpu, width, height) {
            self.blit.set_source(gpu, &self.target);
        }

        self.sync_model(gpu, viewer);

        let scene = &mut viewer.scene;
        self.mesh_pass
            .prepare(gpu, &viewer.camera, &scene.fog, &scene.lights, &scene.world);
        self.firefly_pass.prepare(
            gpu,
            &viewer.camera,
            &mut scene.fireflies,
            self.target.size(),
            viewport.pixel_ratio(),
        );

        // Overlay and panel, in physical surface pixels
        let scale = viewport.device_pixel_ratio;
        self.draw_2d.clear();
        self.draw_2d.update_font_bind_groups(gpu, &self.assets);
        viewer
            .overlay
            .draw(&mut self.draw_2d, gpu.width() as f32, gpu.height() as f32);
        viewer.panel.draw(
            &mut self.draw_2d,
            &self.assets,
            self.font,
            &viewer.scene.lights,
            viewport.width,
            scale,
        );

        let output = gpu.surface.get_current_texture()?;
        let surface_view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        {
            let clear = viewer.scene.clear_color;
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: f64::from(clear.r),
                            g: f64::from(clear.g),
                            b: f64::from(clear.b),
                            a: f64::from(clear.a),
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.target.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.mesh_pass.render(&mut pass);
            self.firefly_pass.render(&mut pass);
        }

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Present Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &surface_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.blit.render(&mut pass);
            self.draw_2d.render(gpu, &mut pass);
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}
