use std::path::Path;

use image::imageops::FilterType;
use image::RgbaImage;
use wgpu::util::DeviceExt;

use super::pipeline::{TextureKind, DEPTH_FORMAT};
use crate::error::{RenderError, RenderResult};
use crate::renderer::state::SamplerKind;
use crate::renderer::vertex::Vertex;

pub(crate) struct GpuTexture {
    pub(crate) _texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
    pub(crate) kind: TextureKind,
}

pub(crate) struct GpuTarget {
    pub(crate) _texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
    pub(crate) format: wgpu::TextureFormat,
    pub(crate) sampled: bool,
}

impl GpuTarget {
    pub(crate) fn new(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        sampled: bool,
    ) -> Self {
        let mut usage = wgpu::TextureUsages::RENDER_ATTACHMENT;
        if sampled {
            usage |= wgpu::TextureUsages::TEXTURE_BINDING;
        }
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
            format,
            sampled,
        }
    }

    pub(crate) fn kind(&self) -> TextureKind {
        if self.format == DEPTH_FORMAT {
            TextureKind::Depth
        } else {
            TextureKind::Color
        }
    }
}

pub(crate) struct GpuMesh {
    pub(crate) vertices: wgpu::Buffer,
    pub(crate) indices: wgpu::Buffer,
    pub(crate) index_count: u32,
}

impl GpuMesh {
    pub(crate) fn new(
        device: &wgpu::Device,
        label: &str,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> Self {
        Self {
            vertices: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(vertices),
                usage: wgpu::BufferUsages::VERTEX,
            }),
            indices: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX,
            }),
            index_count: indices.len() as u32,
        }
    }
}

pub(crate) fn mip_level_count(width: u32, height: u32) -> u32 {
    let max_dimension = width.max(height).max(1);
    u32::BITS - max_dimension.leading_zeros()
}

/// Halves the image down to 1x1, starting with the image itself.
fn mip_chain(base: RgbaImage) -> Vec<RgbaImage> {
    let levels = mip_level_count(base.width(), base.height());
    let mut chain = Vec::with_capacity(levels as usize);
    chain.push(base);
    for _ in 1..levels {
        let Some(prev) = chain.last() else { break };
        let width = (prev.width() / 2).max(1);
        let height = (prev.height() / 2).max(1);
        let next = image::imageops::resize(prev, width, height, FilterType::Triangle);
        chain.push(next);
    }
    chain
}

pub(crate) fn read_image(path: &Path) -> RenderResult<RgbaImage> {
    image::open(path)
        .map(|img| img.to_rgba8())
        .map_err(|err| RenderError::asset(path.display().to_string(), err))
}

fn upload_layers(queue: &wgpu::Queue, texture: &wgpu::Texture, layers: &[Vec<RgbaImage>]) {
    for (layer, chain) in layers.iter().enumerate() {
        for (mip, level) in chain.iter().enumerate() {
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture,
                    mip_level: mip as u32,
                    origin: wgpu::Origin3d {
                        x: 0,
                        y: 0,
                        z: layer as u32,
                    },
                    aspect: wgpu::TextureAspect::All,
                },
                level.as_raw(),
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * level.width()),
                    rows_per_image: Some(level.height()),
                },
                wgpu::Extent3d {
                    width: level.width(),
                    height: level.height(),
                    depth_or_array_layers: 1,
                },
            );
        }
    }
}

fn create_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    faces: Vec<RgbaImage>,
    kind: TextureKind,
) -> GpuTexture {
    let (width, height) = faces
        .first()
        .map(|img| img.dimensions())
        .unwrap_or((1, 1));
    let layers: Vec<Vec<RgbaImage>> = faces.into_iter().map(mip_chain).collect();

    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: layers.len() as u32,
        },
        mip_level_count: mip_level_count(width, height),
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    upload_layers(queue, &texture, &layers);

    let view = texture.create_view(&wgpu::TextureViewDescriptor {
        dimension: Some(match kind {
            TextureKind::Cube => wgpu::TextureViewDimension::Cube,
            _ => wgpu::TextureViewDimension::D2,
        }),
        ..Default::default()
    });
    GpuTexture {
        _texture: texture,
        view,
        kind,
    }
}

pub(crate) fn texture_from_image(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    image: RgbaImage,
) -> GpuTexture {
    create_texture(device, queue, label, vec![image], TextureKind::Color)
}

/// Six faces in +X, -X, +Y, -Y, +Z, -Z order. All faces must be square and equal.
pub(crate) fn cube_from_images(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    faces: Vec<RgbaImage>,
) -> RenderResult<GpuTexture> {
    let Some(first) = faces.first().map(|img| img.dimensions()) else {
        return Err(RenderError::asset(label, "cube map has no faces"));
    };
    if first.0 != first.1 || faces.iter().any(|img| img.dimensions() != first) {
        return Err(RenderError::asset(label, "cube faces must be square and the same size"));
    }
    Ok(create_texture(device, queue, label, faces, TextureKind::Cube))
}

/// 1x1 stand-ins bound where a pass would otherwise sample its own target.
pub(crate) struct Fallbacks {
    pub(crate) color: GpuTexture,
    pub(crate) depth: GpuTarget,
}

impl Fallbacks {
    pub(crate) fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let black = RgbaImage::from_pixel(1, 1, image::Rgba([0, 0, 0, 255]));
        let color = texture_from_image(device, queue, "fallback color", black);
        let depth = GpuTarget::new(device, "fallback depth", 1, 1, DEPTH_FORMAT, true);

        // Unshadowed: depth at the far plane.
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("fallback clear"),
        });
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("fallback clear"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        queue.submit(Some(encoder.finish()));

        Self { color, depth }
    }
}

pub(crate) struct Samplers {
    anisotropic: wgpu::Sampler,
    point: wgpu::Sampler,
    shadow: wgpu::Sampler,
}

impl Samplers {
    pub(crate) fn new(device: &wgpu::Device) -> Self {
        let anisotropic = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("anisotropic"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            anisotropy_clamp: 16,
            ..Default::default()
        });
        let point = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("point"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let shadow = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("shadow compare"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });
        Self {
            anisotropic,
            point,
            shadow,
        }
    }

    pub(crate) fn get(&self, kind: SamplerKind) -> &wgpu::Sampler {
        match kind {
            SamplerKind::Anisotropic => &self.anisotropic,
            SamplerKind::Point => &self.point,
            SamplerKind::ShadowCompare => &self.shadow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_levels_cover_largest_dimension() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(512, 512), 10);
        assert_eq!(mip_level_count(640, 16), 10);
        assert_eq!(mip_level_count(0, 0), 1);
    }

    #[test]
    fn mip_chain_ends_at_one_pixel() {
        let chain = mip_chain(RgbaImage::new(8, 2));
        let sizes: Vec<_> = chain.iter().map(|img| img.dimensions()).collect();
        assert_eq!(sizes, vec![(8, 2), (4, 1), (2, 1), (1, 1)]);
    }
}
