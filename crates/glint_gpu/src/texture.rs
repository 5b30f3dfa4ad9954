//! Coverage textures for text sprites
//!
//! A sprite texture is single-channel (`R8Unorm`). Recycled textures are
//! rewritten in place when the new sprite fits; otherwise they are
//! reallocated. The texture therefore often has more capacity than the
//! sprite uses, and `uv_max` tells the shader how much of it to sample.

use std::borrow::Cow;
use std::sync::Arc;

use glint_text::TextImage;

/// A GPU texture holding one rendered text sprite
pub struct SpriteTexture {
    texture: wgpu::Texture,
    bind_group: Arc<wgpu::BindGroup>,
    /// Allocated size
    capacity: (u32, u32),
    /// Size of the sprite currently stored
    size: (u32, u32),
}

impl SpriteTexture {
    pub(crate) fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        queue: &wgpu::Queue,
        image: &TextImage,
    ) -> Self {
        let max_dim = device.limits().max_texture_dimension_2d;
        let capacity = (
            image.width.clamp(1, max_dim),
            image.height.clamp(1, max_dim),
        );

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Text Sprite Texture"),
            size: wgpu::Extent3d {
                width: capacity.0,
                height: capacity.1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::R8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Text Sprite Bind Group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            }],
        });

        let mut sprite = Self {
            texture,
            bind_group: Arc::new(bind_group),
            capacity,
            size: (0, 0),
        };
        sprite.write(queue, image);
        sprite
    }

    /// Whether `image` can be written without reallocating
    pub fn fits(&self, image: &TextImage) -> bool {
        image.width <= self.capacity.0 && image.height <= self.capacity.1
    }

    /// Replace the stored sprite; `image` must fit.
    pub(crate) fn write(&mut self, queue: &wgpu::Queue, image: &TextImage) {
        let width = image.width.min(self.capacity.0);
        let height = image.height.min(self.capacity.1);
        self.size = (width, height);
        if width == 0 || height == 0 {
            return;
        }

        let Some((data, bytes_per_row)) = padded_rows(&image.pixels, image.width, width, height)
        else {
            tracing::warn!(
                "Text sprite data too short for {}x{}; skipping upload",
                width,
                height
            );
            return;
        };

        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    pub fn capacity(&self) -> (u32, u32) {
        self.capacity
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Fraction of the texture covered by the sprite
    pub fn uv_max(&self) -> [f32; 2] {
        uv_max(self.size, self.capacity)
    }

    pub(crate) fn bind_group(&self) -> &Arc<wgpu::BindGroup> {
        &self.bind_group
    }
}

pub(crate) fn uv_max(size: (u32, u32), capacity: (u32, u32)) -> [f32; 2] {
    [
        size.0 as f32 / capacity.0.max(1) as f32,
        size.1 as f32 / capacity.1.max(1) as f32,
    ]
}

/// Copy the top-left `width` × `height` block of a `stride`-wide 8-bit
/// image into rows padded to `COPY_BYTES_PER_ROW_ALIGNMENT`.
pub(crate) fn padded_rows(
    pixels: &[u8],
    stride: u32,
    width: u32,
    height: u32,
) -> Option<(Cow<'_, [u8]>, u32)> {
    let stride = stride as usize;
    let row_bytes = width as usize;
    let rows = height as usize;
    if row_bytes > stride || pixels.len() < stride.checked_mul(rows)? {
        return None;
    }

    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize;
    let padded_row_bytes = row_bytes.checked_add(align - 1)? / align * align;
    let bytes_per_row = u32::try_from(padded_row_bytes).ok()?;

    if padded_row_bytes == stride {
        return Some((Cow::Borrowed(&pixels[..stride * rows]), bytes_per_row));
    }

    let mut padded = vec![0u8; padded_row_bytes.checked_mul(rows)?];
    for row in 0..rows {
        let src = row * stride;
        let dst = row * padded_row_bytes;
        padded[dst..dst + row_bytes].copy_from_slice(&pixels[src..src + row_bytes]);
    }
    Some((Cow::Owned(padded), bytes_per_row))
}
