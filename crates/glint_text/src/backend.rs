//! Graphics backend contract
//!
//! The text core needs exactly three things from the GPU: allocate a
//! texture from a coverage image, overwrite a (recycled) texture with a new
//! image, and draw one textured quad tinted with a color.

/// A single-channel coverage image copied out of the pixel surface.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextImage {
    pub width: u32,
    pub height: u32,
    /// Row-major coverage, `width * height` bytes
    pub pixels: Vec<u8>,
}

impl TextImage {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Per-draw uniforms for the text quad, in raw pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadUniforms {
    /// Center of the quad, relative to the viewport center
    pub center: [f32; 2],
    /// Width and height of the quad
    pub size: [f32; 2],
    /// Premultiplied RGBA tint
    pub color: [f32; 4],
}

/// Texture upload and quad submission.
pub trait TextBackend {
    /// Backend texture object; dropping it releases the GPU memory.
    type Texture;

    /// Allocate a new texture holding `image`.
    fn create_texture(&mut self, image: &TextImage) -> Self::Texture;

    /// Replace the contents of an existing texture with `image`.
    fn update_texture(&mut self, texture: &mut Self::Texture, image: &TextImage);

    /// Draw `texture` as one quad.
    fn draw_quad(&mut self, texture: &Self::Texture, quad: &QuadUniforms);
}
