//! Font atlases for panel and overlay text.
//!
//! No font ships with the viewer; [`Assets::system_font`] looks through a list
//! of well-known system font locations and rasterizes the first one that
//! parses.

use crate::gpu::GpuContext;
use fontdue::{Font, FontSettings};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Opaque identifier for a loaded font.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FontId(pub(crate) usize);

/// Placement of one glyph inside the atlas.
#[derive(Clone, Copy, Debug)]
pub struct GlyphInfo {
    /// Atlas region (x, y, width, height), normalized to [0, 1].
    pub uv: [f32; 4],
    pub width: u32,
    pub height: u32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub advance: f32,
}

/// Printable ASCII rasterized into a single-channel texture.
pub struct FontAtlas {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    glyphs: HashMap<char, GlyphInfo>,
    size: f32,
}

impl FontAtlas {
    /// Rasterize a TTF/OTF font at `size` pixels.
    pub fn new(gpu: &GpuContext, font_data: &[u8], size: f32) -> Result<Self, String> {
        let font = Font::from_bytes(font_data, FontSettings::default()).map_err(str::to_string)?;

        let rasterized: Vec<(char, fontdue::Metrics, Vec<u8>)> = (32u8..=126u8)
            .map(|b| {
                let c = b as char;
                let (metrics, bitmap) = font.rasterize(c, size);
                (c, metrics, bitmap)
            })
            .collect();

        let (atlas_width, atlas_height) = pack_size(
            rasterized
                .iter()
                .map(|(_, m, _)| (m.width as u32, m.height as u32)),
        );

        let padding = 1u32;
        let mut atlas_data = vec![0u8; (atlas_width * atlas_height) as usize];
        let mut glyphs = HashMap::new();
        let mut x = padding;
        let mut y = padding;
        let mut row_height = 0u32;

        for (c, metrics, bitmap) in &rasterized {
            let glyph_w = metrics.width as u32;
            let glyph_h = metrics.height as u32;

            if x + glyph_w + padding > atlas_width {
                x = padding;
                y += row_height + padding;
                row_height = 0;
            }

            for gy in 0..glyph_h {
                let src = (gy * glyph_w) as usize;
                let dst = ((y + gy) * atlas_width + x) as usize;
                atlas_data[dst..dst + glyph_w as usize]
                    .copy_from_slice(&bitmap[src..src + glyph_w as usize]);
            }

            glyphs.insert(
                *c,
                GlyphInfo {
                    uv: [
                        x as f32 / atlas_width as f32,
                        y as f32 / atlas_height as f32,
                        glyph_w as f32 / atlas_width as f32,
                        glyph_h as f32 / atlas_height as f32,
                    ],
                    width: glyph_w,
                    height: glyph_h,
                    offset_x: metrics.xmin as f32,
                    offset_y: metrics.ymin as f32,
                    advance: metrics.advance_width,
                },
            );

            x += glyph_w + padding;
            row_height = row_height.max(glyph_h);
        }

        let extent = wgpu::Extent3d {
            width: atlas_width,
            height: atlas_height,
            depth_or_array_layers: 1,
        };
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Font Atlas"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::R8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        gpu.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &atlas_data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(atlas_width),
                rows_per_image: Some(atlas_height),
            },
            extent,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = gpu.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Font Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Ok(Self {
            texture,
            view,
            sampler,
            glyphs,
            size,
        })
    }

    pub fn glyph(&self, c: char) -> Option<&GlyphInfo> {
        self.glyphs.get(&c)
    }

    /// Pixel size the atlas was rasterized at.
    pub fn size(&self) -> f32 {
        self.size
    }

    /// Width of `text` in pixels.
    pub fn measure(&self, text: &str) -> f32 {
        text.chars()
            .map(|c| self.glyphs.get(&c).map_or(self.size * 0.5, |g| g.advance))
            .sum()
    }
}

/// Smallest power-of-two atlas (starting at 256x256) that row-packs every glyph.
fn pack_size(glyphs: impl Iterator<Item = (u32, u32)> + Clone) -> (u32, u32) {
    let padding = 1u32;
    let mut width = 256u32;
    let mut height = 256u32;

    loop {
        let mut x = padding;
        let mut y = padding;
        let mut row_height = 0u32;
        let mut fits = true;

        for (w, h) in glyphs.clone() {
            if x + w + padding > width {
                x = padding;
                y += row_height + padding;
                row_height = 0;
            }
            if y + h + padding > height || w + 2 * padding > width {
                fits = false;
                break;
            }
            x += w + padding;
            row_height = row_height.max(h);
        }

        if fits {
            return (width, height);
        }
        if width <= height {
            width *= 2;
        } else {
            height *= 2;
        }
    }
}

const SYSTEM_FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\segoeui.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Loaded font atlases.
#[derive(Default)]
pub struct Assets {
    pub(crate) fonts: Vec<Arc<FontAtlas>>,
}

impl Assets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a font file and rasterize it at `size` pixels.
    pub fn load_font(
        &mut self,
        gpu: &GpuContext,
        path: impl AsRef<Path>,
        size: f32,
    ) -> Result<FontId, String> {
        let data = std::fs::read(path.as_ref()).map_err(|e| e.to_string())?;
        self.load_font_bytes(gpu, &data, size)
    }

    /// Rasterize TTF/OTF bytes at `size` pixels.
    pub fn load_font_bytes(
        &mut self,
        gpu: &GpuContext,
        data: &[u8],
        size: f32,
    ) -> Result<FontId, String> {
        let atlas = FontAtlas::new(gpu, data, size)?;
        let id = FontId(self.fonts.len());
        self.fonts.push(Arc::new(atlas));
        Ok(id)
    }

    /// First usable font among the well-known system locations.
    pub fn system_font(&mut self, gpu: &GpuContext, size: f32) -> Option<FontId> {
        for path in SYSTEM_FONT_PATHS {
            if !Path::new(path).exists() {
                continue;
            }
            match self.load_font(gpu, path, size) {
                Ok(id) => {
                    log::debug!("using font {path}");
                    return Some(id);
                }
                Err(e) => log::debug!("skipping font {path}: {e}"),
            }
        }
        log::warn!("no system font found; debug panel labels will not be drawn");
        None
    }

    pub fn font(&self, id: FontId) -> Option<Arc<FontAtlas>> {
        self.fonts.get(id.0).cloned()
    }
}
