//! wgpu backend for Glint text sprites
//!
//! Implements [`glint_text::TextBackend`] with one `R8Unorm` texture per
//! cached sprite and an instanced quad pipeline. Typical use:
//!
//! ```ignore
//! let backend = WgpuTextBackend::new(device, queue, surface_format);
//! let mut fonts = FontSet::new(SystemFonts::new(), backend);
//! // per frame
//! fonts.backend_mut().begin_frame();
//! fonts.get(14).draw_str("Hello", Point::new(-100.0, 0.0), Color::WHITE);
//! fonts.backend_mut().render(&mut pass);
//! ```

mod backend;
pub mod shaders;
mod texture;

pub use backend::{request_headless_device, GpuError, SpriteInstance, WgpuTextBackend};
pub use texture::SpriteTexture;
