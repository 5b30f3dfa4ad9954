//! Zoom-stable text rendering for Glint UI
//!
//! This crate provides:
//! - View/raw coordinate scaling driven by a global zoom ratio
//! - Layout resolution (wrap width, alignment, truncation, line stepping)
//! - Text preprocessing (curly quotes, keyboard accelerators, markup)
//! - Rasterization of whole text runs into a reusable pixel surface
//! - A render cache that recycles GPU textures instead of freeing them
//! - A per-pixel-size font registry that owns the graphics backend
//!
//! Glyph shaping is provided by a [`ShapingEngine`]; [`SystemFonts`] is the
//! fontdb + rustybuzz + swash implementation. GPU work goes through a
//! [`TextBackend`], implemented for wgpu by `glint_gpu`.

pub mod backend;
pub mod cache;
pub mod config;
pub mod font;
pub mod geometry;
pub mod headless;
pub mod layout;
pub mod markup;
mod paragraph;
pub mod preprocess;
pub mod registry;
pub mod scale;
pub mod shaping;
pub mod stepping;
pub mod surface;
pub mod system;

pub use backend::{QuadUniforms, TextBackend, TextImage};
pub use cache::{CacheKey, RenderCache, RenderedResult, TextureKey, TexturePool};
pub use config::{DrawingSettings, TextConfig};
pub use font::Font;
pub use geometry::{Color, Point};
pub use layout::{Alignment, DisplayText, Layout, ResolvedLayout, Truncate};
pub use markup::{MarkupError, StyledText, TextStyle, Underline};
pub use preprocess::{escape_markup, escape_markup_has_error, unescape_markup, AcceleratorMode};
pub use registry::{FontRef, FontSet};
pub use scale::Scaler;
pub use shaping::{FontMetrics, LineExtents, ShapeOptions, ShapingContext, ShapingEngine};
pub use stepping::{CustomStepping, LineStepping, NaturalStepping, Placement, SteppingStrategy};
pub use surface::PixelSurface;
pub use system::{SystemFonts, SystemShaper};

use thiserror::Error;

/// Text rendering errors
#[derive(Error, Debug)]
pub enum TextError {
    #[error("No font matches description: {0}")]
    FontNotFound(String),

    #[error("Failed to load font: {0}")]
    FontLoad(String),

    #[error("Invalid font data")]
    InvalidFontData,

    #[error("Failed to load fonts from {0}")]
    FontDirectory(String),

    #[error("Invalid text configuration: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, TextError>;
