//! Deterministic engine and backend for tests and headless tools
//!
//! [`MonospaceEngine`] gives every character the same advance and draws
//! glyphs as solid boxes, so extents depend only on the pixel size and the
//! layout options. [`HeadlessBackend`] keeps textures in memory and records
//! every quad it is asked to draw.

use std::path::Path;

use crate::backend::{QuadUniforms, TextBackend, TextImage};
use crate::markup::{StyledText, Underline};
use crate::paragraph::{self, Cluster, ClusterKind, Paragraphs, Source};
use crate::shaping::{FontMetrics, LineExtents, ShapeOptions, ShapingContext, ShapingEngine};
use crate::surface::PixelSurface;
use crate::{Result, TextError};

const FONT_EXTENSIONS: [&str; 4] = ["ttf", "otf", "ttc", "otc"];

/// Fixed-advance shaping engine
#[derive(Debug, Default)]
pub struct MonospaceEngine {
    font_files: usize,
}

impl MonospaceEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Font files seen by [`add_font_dir`](ShapingEngine::add_font_dir)
    pub fn font_files(&self) -> usize {
        self.font_files
    }
}

impl ShapingEngine for MonospaceEngine {
    type Context = MonospaceContext;

    fn create_context(&self) -> MonospaceContext {
        MonospaceContext::default()
    }

    fn add_font_dir(&mut self, dir: &Path) -> Result<usize> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| TextError::FontDirectory(format!("{}: {}", dir.display(), e)))?;
        let count = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| {
                        FONT_EXTENSIONS
                            .iter()
                            .any(|known| ext.eq_ignore_ascii_case(known))
                    })
            })
            .count();
        self.font_files += count;
        Ok(count)
    }
}

/// Shaping context of [`MonospaceEngine`]
#[derive(Debug, Default)]
pub struct MonospaceContext {
    pixel_size: u32,
    metrics: FontMetrics,
    text: StyledText,
    clusters: Vec<Cluster>,
    laid: Paragraphs,
    lines: Vec<LineExtents>,
    size: (u32, u32),
}

impl MonospaceContext {
    /// Advance of every character in raw pixels
    pub fn advance(&self) -> u32 {
        self.pixel_size.div_ceil(2).max(1)
    }
}

impl ShapingContext for MonospaceContext {
    fn set_font(
        &mut self,
        description: &str,
        _language: &str,
        pixel_size: u32,
    ) -> Result<FontMetrics> {
        if description.split(',').all(|family| family.trim().is_empty()) {
            return Err(TextError::FontNotFound(description.to_string()));
        }

        self.pixel_size = pixel_size.max(1);
        self.metrics = FontMetrics {
            ascent: (self.pixel_size * 4).div_ceil(5) as f32,
            descent: self.pixel_size.div_ceil(5) as f32,
            underline_thickness: (self.pixel_size as f32 / 12.0).max(1.0),
        };
        Ok(self.metrics)
    }

    fn set_text(&mut self, text: &StyledText, options: &ShapeOptions) {
        let advance = self.advance() as f32;
        self.text = text.clone();
        self.clusters = text
            .text
            .char_indices()
            .filter(|&(_, c)| c != '\n')
            .map(|(byte, c)| Cluster {
                byte,
                advance,
                kind: ClusterKind::of(c),
            })
            .collect();
        self.laid = paragraph::lay_out(&text.text, &self.clusters, options, advance);

        let line_height = self.metrics.height();
        let ascent = self.metrics.ascent.ceil() as i32;
        self.lines = self
            .laid
            .lines
            .iter()
            .enumerate()
            .map(|(i, line)| LineExtents {
                start: line.start,
                x: line.x.round() as i32,
                baseline: i as i32 * line_height as i32 + ascent,
                width: line.width.ceil() as u32,
                starts_paragraph: line.starts_paragraph,
                is_empty: line.is_empty,
            })
            .collect();
        self.size = (
            self.laid.width.ceil() as u32,
            self.lines.len() as u32 * line_height,
        );
    }

    fn pixel_size(&self) -> (u32, u32) {
        self.size
    }

    fn lines(&self) -> &[LineExtents] {
        &self.lines
    }

    fn draw_line(&mut self, index: usize, surface: &mut PixelSurface, x: i32, baseline: i32) {
        let Some(line) = self.laid.lines.get(index) else {
            return;
        };
        let ascent = self.metrics.ascent.ceil() as i32;
        let descent = self.metrics.descent.ceil() as i32;
        let thickness = self.metrics.underline_px();

        for item in &line.items {
            let (byte, ink) = match item.source {
                Source::Cluster(i) => (
                    self.clusters[i].byte,
                    self.clusters[i].kind == ClusterKind::Ink,
                ),
                Source::Ellipsis { byte } => (byte, true),
            };
            let style = self.text.style_at(byte);
            let left = x + item.x.round() as i32;
            let width = item.advance.round() as u32;

            if ink {
                let box_width = if style.bold { width } else { width.saturating_sub(1).max(1) };
                surface.fill_rect(left, baseline - ascent, box_width, ascent as u32, u8::MAX);
            }
            match style.underline {
                Underline::None => {}
                Underline::Single => {
                    surface.fill_rect(left, baseline + 1, width, thickness, u8::MAX)
                }
                Underline::Low => surface.fill_rect(
                    left,
                    baseline + descent - thickness as i32,
                    width,
                    thickness,
                    u8::MAX,
                ),
            }
            if style.strikethrough {
                surface.fill_rect(left, baseline - ascent / 3, width, thickness, u8::MAX);
            }
        }
    }
}

/// An in-memory texture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessTexture {
    /// Unique per allocation; updates keep the id
    pub id: u64,
    pub image: TextImage,
}

/// A recorded draw
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub texture: u64,
    pub quad: QuadUniforms,
}

/// Backend that keeps textures in memory and records draws.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    next_id: u64,
    /// Textures allocated so far
    pub created: usize,
    /// Texture contents replaced so far
    pub updated: usize,
    pub draws: Vec<DrawCall>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain the recorded draws.
    pub fn take_draws(&mut self) -> Vec<DrawCall> {
        std::mem::take(&mut self.draws)
    }
}

impl TextBackend for HeadlessBackend {
    type Texture = HeadlessTexture;

    fn create_texture(&mut self, image: &TextImage) -> HeadlessTexture {
        self.created += 1;
        self.next_id += 1;
        HeadlessTexture {
            id: self.next_id,
            image: image.clone(),
        }
    }

    fn update_texture(&mut self, texture: &mut HeadlessTexture, image: &TextImage) {
        self.updated += 1;
        texture.image = image.clone();
    }

    fn draw_quad(&mut self, texture: &HeadlessTexture, quad: &QuadUniforms) {
        self.draws.push(DrawCall {
            texture: texture.id,
            quad: *quad,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::parse_markup;

    fn context(pixel_size: u32) -> MonospaceContext {
        let mut context = MonospaceEngine::new().create_context();
        context.set_font("Mono", "en", pixel_size).unwrap();
        context
    }

    #[test]
    fn metrics_scale_with_pixel_size() {
        let context = context(20);
        assert_eq!(context.advance(), 10);
        assert_eq!(context.metrics.height(), 20);
        assert_eq!(context.metrics.underline_px(), 2);
    }

    #[test]
    fn empty_description_is_not_found() {
        let mut context = MonospaceEngine::new().create_context();
        assert!(matches!(
            context.set_font(" , ", "en", 12),
            Err(TextError::FontNotFound(_))
        ));
    }

    #[test]
    fn extents_follow_lines() {
        let mut context = context(20);
        context.set_text(&StyledText::plain("abc\nde"), &ShapeOptions::default());
        assert_eq!(context.pixel_size(), (30, 40));
        let lines = context.lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].baseline, 16);
        assert_eq!(lines[1].baseline, 36);
        assert!(lines[1].starts_paragraph);
    }

    #[test]
    fn draws_boxes_and_decorations() {
        let mut context = context(20);
        let styled = parse_markup("a<u>b</u>", None).unwrap();
        context.set_text(&styled, &ShapeOptions::default());
        let mut surface = PixelSurface::new(32, 32);
        context.draw_line(0, &mut surface, 0, 16);

        assert_eq!(surface.pixel(0, 0), 255);
        assert_eq!(surface.pixel(9, 0), 0);
        assert_eq!(surface.pixel(0, 17), 0);
        assert_eq!(surface.pixel(12, 17), 255);
    }

    #[test]
    fn missing_font_dir_is_an_error() {
        let mut engine = MonospaceEngine::new();
        let result = engine.add_font_dir(Path::new("/nonexistent/glint/fonts"));
        assert!(matches!(result, Err(TextError::FontDirectory(_))));
    }

    #[test]
    fn backend_records_draws() {
        let mut backend = HeadlessBackend::new();
        let image = TextImage {
            width: 1,
            height: 1,
            pixels: vec![9],
        };
        let mut texture = backend.create_texture(&image);
        backend.update_texture(&mut texture, &image);
        backend.draw_quad(
            &texture,
            &QuadUniforms {
                center: [1.0, 2.0],
                size: [1.0, 1.0],
                color: [1.0; 4],
            },
        );
        assert_eq!(backend.created, 1);
        assert_eq!(backend.updated, 1);
        let draws = backend.take_draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].texture, texture.id);
        assert!(backend.draws.is_empty());
    }
}
