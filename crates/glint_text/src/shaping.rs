//! Shaping engine contract
//!
//! Shaping and glyph rasterization are delegated to an engine. The engine
//! owns the font database; each font instance owns one [`ShapingContext`]
//! created from it. A context is stateful in the same way a paragraph
//! layout object is: configure the font, set the text with its layout
//! options, then query extents and draw lines one at a time.

use std::path::Path;

use crate::layout::{Alignment, Truncate};
use crate::markup::StyledText;
use crate::surface::PixelSurface;
use crate::Result;

/// Vertical metrics of the configured font, in raw pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FontMetrics {
    /// Distance from the top of a line to its baseline
    pub ascent: f32,
    /// Distance from the baseline to the bottom of a line
    pub descent: f32,
    /// Stroke thickness of underline decorations
    pub underline_thickness: f32,
}

impl FontMetrics {
    /// Natural line height (ascent + descent), rounded up
    pub fn height(&self) -> u32 {
        (self.ascent + self.descent).ceil().max(0.0) as u32
    }

    /// Underline stroke thickness in whole pixels (at least one)
    pub fn underline_px(&self) -> u32 {
        self.underline_thickness.ceil().max(1.0) as u32
    }
}

/// Layout parameters passed to the engine, in raw pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShapeOptions {
    /// Wrap (or ellipsize) at this width; `None` is unbounded
    pub wrap_width: Option<u32>,
    pub alignment: Alignment,
    pub truncate: Truncate,
    /// Distance between left tab stops; 0 disables tab expansion
    pub tab_width: u32,
}

/// Position of one laid-out line, as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineExtents {
    /// Byte offset of the line's first character in the shaped text
    pub start: usize,
    /// Left edge of the line after alignment
    pub x: i32,
    /// Baseline under the engine's own line stepping
    pub baseline: i32,
    /// Logical width of the line
    pub width: u32,
    /// The line follows a paragraph separator
    pub starts_paragraph: bool,
    /// The line holds no characters (e.g. after a trailing newline)
    pub is_empty: bool,
}

/// A font database that hands out per-instance shaping contexts.
pub trait ShapingEngine {
    type Context: ShapingContext;

    /// Create an independent context (one per font instance).
    fn create_context(&self) -> Self::Context;

    /// Register an additional directory of font files.
    ///
    /// Returns how many faces were added.
    fn add_font_dir(&mut self, dir: &Path) -> Result<usize>;
}

/// Per-instance shaping state: current font, current text and its lines.
pub trait ShapingContext {
    /// Select the font matching `description` (comma separated family list)
    /// at `pixel_size` raw pixels, shaping for `language`.
    fn set_font(
        &mut self,
        description: &str,
        language: &str,
        pixel_size: u32,
    ) -> Result<FontMetrics>;

    /// Shape and lay out `text` with the given options.
    fn set_text(&mut self, text: &StyledText, options: &ShapeOptions);

    /// Logical extents of the current text (width, height) under the
    /// engine's own line stepping.
    fn pixel_size(&self) -> (u32, u32);

    /// Lines of the current text, top to bottom.
    fn lines(&self) -> &[LineExtents];

    /// Rasterize line `index` with its left edge at `x` and its baseline at
    /// `baseline`, accumulating coverage into `surface`.
    fn draw_line(&mut self, index: usize, surface: &mut PixelSurface, x: i32, baseline: i32);
}
