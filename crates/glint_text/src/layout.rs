//! Text layout parameters
//!
//! A [`Layout`] describes how a string occupies space: wrap width,
//! alignment, truncation and line spacing. It is expressed in view units and
//! resolved into raw pixels ([`ResolvedLayout`]) just before shaping.

use crate::scale::Scaler;
use crate::stepping::{CustomStepping, NaturalStepping, SteppingStrategy};

/// Horizontal alignment of each line within the wrap width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
    /// Stretch inter-word spacing so every line except the last line of a
    /// paragraph fills the wrap width
    Justified,
}

/// Where an ellipsis replaces text that does not fit the wrap width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Truncate {
    /// Wrap instead of truncating
    #[default]
    None,
    Front,
    Middle,
    Back,
}

/// Layout request in view units.
///
/// Built with the consuming `with_*` methods and immutable afterwards. Two
/// layouts are equal iff every field matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Layout {
    width: Option<u32>,
    alignment: Alignment,
    truncate: Truncate,
    line_height: Option<u32>,
    paragraph_break: Option<u32>,
}

impl Layout {
    /// Unbounded width, left aligned, no truncation, natural spacing
    pub const fn new() -> Self {
        Self {
            width: None,
            alignment: Alignment::Left,
            truncate: Truncate::None,
            line_height: None,
            paragraph_break: None,
        }
    }

    /// Wrap (or truncate) at the given width in view units
    pub const fn with_width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    pub const fn with_alignment(mut self, alignment: Alignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub const fn with_truncate(mut self, truncate: Truncate) -> Self {
        self.truncate = truncate;
        self
    }

    /// Fixed distance between consecutive baselines in view units
    pub const fn with_line_height(mut self, line_height: u32) -> Self {
        self.line_height = Some(line_height);
        self
    }

    /// Extra space inserted before each new paragraph in view units
    pub const fn with_paragraph_break(mut self, paragraph_break: u32) -> Self {
        self.paragraph_break = Some(paragraph_break);
        self
    }

    pub fn width(&self) -> Option<u32> {
        self.width
    }

    pub fn alignment(&self) -> Alignment {
        self.alignment
    }

    pub fn truncate(&self) -> Truncate {
        self.truncate
    }

    /// Requested line height, `None` meaning the font's natural height
    pub fn line_height(&self) -> Option<u32> {
        self.line_height
    }

    /// Requested paragraph break, `None` meaning none was requested
    pub fn paragraph_break(&self) -> Option<u32> {
        self.paragraph_break
    }

    /// Neither a line height nor a paragraph break was requested, so the
    /// shaping engine's own line stepping can be used verbatim.
    pub fn is_default_skip(&self) -> bool {
        self.line_height.is_none() && self.paragraph_break.is_none()
    }

    /// Convert into raw pixels for the given zoom.
    pub fn resolve(&self, scaler: &Scaler) -> ResolvedLayout {
        let wrap_width = self
            .width
            .filter(|&width| width > 0)
            .map(|width| to_raw_u32(scaler.raw_from_view_ceil(to_view_i32(width))));
        let line_height = self
            .line_height
            .map(|height| to_raw_u32(scaler.raw_from_view_floor(to_view_i32(height))));
        let paragraph_break = self
            .paragraph_break
            .map_or(0, |gap| to_raw_u32(scaler.raw_from_view_floor(to_view_i32(gap))));

        let stepping = if self.is_default_skip() {
            SteppingStrategy::Natural(NaturalStepping)
        } else {
            SteppingStrategy::Custom(CustomStepping {
                line_height,
                paragraph_break,
            })
        };

        ResolvedLayout {
            wrap_width,
            alignment: self.alignment,
            truncate: self.truncate,
            stepping,
        }
    }
}

/// A layout converted to raw pixels, with defaults filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedLayout {
    /// Raw wrap width; `None` is unbounded
    pub wrap_width: Option<u32>,
    pub alignment: Alignment,
    pub truncate: Truncate,
    /// How lines are placed vertically
    pub stepping: SteppingStrategy,
}

/// A string paired with the layout it is displayed with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DisplayText {
    text: String,
    layout: Layout,
}

impl DisplayText {
    pub fn new(text: impl Into<String>, layout: Layout) -> Self {
        Self {
            text: text.into(),
            layout,
        }
    }

    /// Text with the default layout
    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, Layout::new())
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

fn to_view_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn to_raw_u32(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layouts_compare_structurally() {
        let a = Layout::new().with_width(120).with_alignment(Alignment::Center);
        let b = Layout::new().with_alignment(Alignment::Center).with_width(120);
        assert_eq!(a, b);
        assert_ne!(a, a.with_width(121));
        assert_ne!(a, a.with_truncate(Truncate::Back));
        assert_ne!(a, a.with_paragraph_break(0));
    }

    #[test]
    fn default_layout_uses_natural_stepping() {
        let resolved = Layout::new().resolve(&Scaler::default());
        assert_eq!(resolved.wrap_width, None);
        assert!(matches!(resolved.stepping, SteppingStrategy::Natural(_)));
    }

    #[test]
    fn explicit_paragraph_break_selects_custom_stepping() {
        let resolved = Layout::new()
            .with_paragraph_break(0)
            .resolve(&Scaler::default());
        assert_eq!(
            resolved.stepping,
            SteppingStrategy::Custom(CustomStepping {
                line_height: None,
                paragraph_break: 0,
            })
        );
    }

    #[test]
    fn resolution_scales_to_raw_pixels() {
        let scaler = Scaler::new(150);
        let resolved = Layout::new()
            .with_width(101)
            .with_line_height(15)
            .with_paragraph_break(5)
            .resolve(&scaler);
        // 101 * 1.5 = 151.5 → ceil
        assert_eq!(resolved.wrap_width, Some(152));
        // 15 * 1.5 = 22.5 → floor, 5 * 1.5 = 7.5 → floor
        assert_eq!(
            resolved.stepping,
            SteppingStrategy::Custom(CustomStepping {
                line_height: Some(22),
                paragraph_break: 7,
            })
        );
    }

    #[test]
    fn zero_width_is_unbounded() {
        let resolved = Layout::new().with_width(0).resolve(&Scaler::default());
        assert_eq!(resolved.wrap_width, None);
    }

    #[test]
    fn display_text_equality_covers_layout() {
        let a = DisplayText::new("Hello", Layout::new().with_width(50));
        let b = DisplayText::new("Hello", Layout::new().with_width(50));
        let c = DisplayText::new("Hello", Layout::new().with_width(51));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, DisplayText::plain("Hello"));
    }
}
