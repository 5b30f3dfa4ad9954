//! System font engine
//!
//! Fonts are discovered with fontdb, shaped with rustybuzz and rasterized
//! with swash. Every [`SystemShaper`] shares its engine's database, so font
//! directories added later become visible to contexts that already exist
//! the next time they select a font.

use std::cell::RefCell;
use std::num::NonZeroUsize;
use std::ops::Range;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use fontdb::{Database, Family, Query, Stretch, Style, Weight};
use lru::LruCache;
use rustc_hash::FxHashMap;
use swash::scale::{Render, ScaleContext, Source};
use swash::zeno::Format;

use crate::markup::{StyledText, Underline};
use crate::paragraph::{self, Cluster, ClusterKind, Paragraphs, ELLIPSIS};
use crate::shaping::{FontMetrics, LineExtents, ShapeOptions, ShapingContext, ShapingEngine};
use crate::surface::PixelSurface;
use crate::{Result, TextError};

/// Rasterized glyph masks kept per context
const GLYPH_CACHE_SIZE: NonZeroUsize = match NonZeroUsize::new(1024) {
    Some(size) => size,
    None => unreachable!(),
};

const REGULAR: usize = 0;

/// fontdb-backed engine
pub struct SystemFonts {
    db: Rc<RefCell<Database>>,
}

impl SystemFonts {
    /// Create an engine and load the system fonts
    pub fn new() -> Self {
        let mut db = Database::new();
        db.load_system_fonts();
        tracing::debug!("Loaded {} system font faces", db.len());
        Self::with_database(db)
    }

    /// Create an engine over an existing database
    pub fn with_database(db: Database) -> Self {
        Self {
            db: Rc::new(RefCell::new(db)),
        }
    }

    /// Register font data held in memory.
    pub fn load_font_data(&mut self, data: Vec<u8>) {
        self.db.borrow_mut().load_font_data(data);
    }

    pub fn face_count(&self) -> usize {
        self.db.borrow().len()
    }
}

impl Default for SystemFonts {
    fn default() -> Self {
        Self::new()
    }
}

impl ShapingEngine for SystemFonts {
    type Context = SystemShaper;

    fn create_context(&self) -> SystemShaper {
        SystemShaper::new(Rc::clone(&self.db))
    }

    fn add_font_dir(&mut self, dir: &Path) -> Result<usize> {
        if !dir.is_dir() {
            return Err(TextError::FontDirectory(dir.display().to_string()));
        }
        let mut db = self.db.borrow_mut();
        let before = db.len();
        db.load_fonts_dir(dir);
        let added = db.len() - before;
        if added == 0 {
            tracing::warn!("No font faces found in {}", dir.display());
        } else {
            tracing::debug!("Loaded {} font faces from {}", added, dir.display());
        }
        Ok(added)
    }
}

/// Font bytes plus the face index within a collection
#[derive(Clone)]
struct LoadedFace {
    data: Arc<Vec<u8>>,
    index: u32,
}

#[derive(Debug, Clone, Copy)]
struct ShapedGlyph {
    id: u16,
    slot: usize,
    x_offset: f32,
    y_offset: f32,
    x_advance: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct GlyphKey {
    slot: usize,
    id: u16,
    size: u32,
}

struct GlyphMask {
    left: i32,
    top: i32,
    width: u32,
    height: u32,
    data: Vec<u8>,
}

/// swash scaling state plus a cache of rendered masks
struct GlyphRasterizer {
    context: ScaleContext,
    masks: LruCache<GlyphKey, Option<GlyphMask>>,
}

impl GlyphRasterizer {
    fn new() -> Self {
        Self {
            context: ScaleContext::new(),
            masks: LruCache::new(GLYPH_CACHE_SIZE),
        }
    }

    fn clear(&mut self) {
        self.masks.clear();
    }

    /// Blend one glyph into `surface` with its origin at (x, baseline).
    fn draw(
        &mut self,
        face: &LoadedFace,
        glyph: &ShapedGlyph,
        size: f32,
        x: f32,
        baseline: f32,
        surface: &mut PixelSurface,
    ) {
        let key = GlyphKey {
            slot: glyph.slot,
            id: glyph.id,
            size: size.to_bits(),
        };
        if !self.masks.contains(&key) {
            let mask = self.rasterize(face, glyph.id, size);
            self.masks.put(key, mask);
        }
        if let Some(Some(mask)) = self.masks.get(&key) {
            surface.blit_mask(
                (x + glyph.x_offset).round() as i32 + mask.left,
                (baseline - glyph.y_offset).round() as i32 - mask.top,
                mask.width,
                mask.height,
                &mask.data,
            );
        }
    }

    fn rasterize(&mut self, face: &LoadedFace, id: u16, size: f32) -> Option<GlyphMask> {
        let font = swash::FontRef::from_index(&face.data, face.index as usize)?;
        let mut scaler = self.context.builder(font).size(size).hint(true).build();

        let mut render = Render::new(&[Source::Outline]);
        render.format(Format::Alpha);
        let image = render.render(&mut scaler, id)?;
        if image.placement.width == 0 || image.placement.height == 0 {
            return None;
        }
        Some(GlyphMask {
            left: image.placement.left,
            top: image.placement.top,
            width: image.placement.width,
            height: image.placement.height,
            data: image.data,
        })
    }
}

/// Shaping context of [`SystemFonts`]
///
/// Holds up to four faces of the selected family (regular, bold, italic,
/// bold italic); styled variants are looked up the first time markup asks
/// for them and fall back to the regular face when missing.
pub struct SystemShaper {
    db: Rc<RefCell<Database>>,
    loaded: FxHashMap<fontdb::ID, LoadedFace>,
    families: Vec<String>,
    variants: [Option<LoadedFace>; 4],
    resolved: [bool; 4],
    language: Option<rustybuzz::Language>,
    pixel_size: f32,
    metrics: FontMetrics,
    /// Underline offset below the baseline
    underline_position: f32,
    text: StyledText,
    clusters: Vec<Cluster>,
    cluster_glyphs: Vec<Range<usize>>,
    glyphs: Vec<ShapedGlyph>,
    ellipsis: Vec<ShapedGlyph>,
    ellipsis_advance: f32,
    laid: Paragraphs,
    lines: Vec<LineExtents>,
    size: (u32, u32),
    rasterizer: GlyphRasterizer,
}

impl SystemShaper {
    fn new(db: Rc<RefCell<Database>>) -> Self {
        Self {
            db,
            loaded: FxHashMap::default(),
            families: Vec::new(),
            variants: Default::default(),
            resolved: [false; 4],
            language: None,
            pixel_size: 0.0,
            metrics: FontMetrics::default(),
            underline_position: 0.0,
            text: StyledText::default(),
            clusters: Vec::new(),
            cluster_glyphs: Vec::new(),
            glyphs: Vec::new(),
            ellipsis: Vec::new(),
            ellipsis_advance: 0.0,
            laid: Paragraphs::default(),
            lines: Vec::new(),
            size: (0, 0),
            rasterizer: GlyphRasterizer::new(),
        }
    }

    /// Find and load the best face of the selected families.
    fn query(&mut self, weight: u16, italic: bool) -> Option<LoadedFace> {
        let id = {
            let db = self.db.borrow();
            let mut families: Vec<Family<'_>> =
                self.families.iter().map(|name| family(name)).collect();
            families.push(Family::SansSerif);
            let query = Query {
                families: &families,
                weight: Weight(weight),
                style: if italic { Style::Italic } else { Style::Normal },
                stretch: Stretch::Normal,
            };
            db.query(&query)?
        };

        if let Some(face) = self.loaded.get(&id) {
            return Some(face.clone());
        }
        let face = self
            .db
            .borrow()
            .with_face_data(id, |data, index| LoadedFace {
                data: Arc::new(data.to_vec()),
                index,
            });
        match face {
            Some(face) => {
                self.loaded.insert(id, face.clone());
                Some(face)
            }
            None => {
                tracing::warn!("Failed to read font data for face {:?}", id);
                None
            }
        }
    }

    /// Face slot for a style, loading the variant on first use.
    fn slot_for(&mut self, bold: bool, italic: bool) -> usize {
        let slot = usize::from(bold) | (usize::from(italic) << 1);
        if !self.resolved[slot] {
            self.resolved[slot] = true;
            self.variants[slot] = self.query(if bold { 700 } else { 400 }, italic);
        }
        if self.variants[slot].is_some() {
            slot
        } else {
            REGULAR
        }
    }

    /// Shape `text` with the face in `slot`, appending one glyph list per
    /// cluster. `base` is the byte offset of `text` in the full string.
    fn shape_run(&mut self, text: &str, base: usize, slot: usize) {
        let Some(face) = self.variants[slot].clone() else {
            return;
        };
        let Some(shaped) = shape(&face, text, self.language.as_ref(), self.pixel_size, slot)
        else {
            return;
        };

        for (cluster, glyph) in shaped {
            let byte = base + cluster;
            let index = self.glyphs.len();
            self.glyphs.push(glyph);
            match self.clusters.last_mut() {
                Some(last) if last.byte == byte => {
                    last.advance += glyph.x_advance;
                    if let Some(range) = self.cluster_glyphs.last_mut() {
                        range.end = index + 1;
                    }
                }
                _ => {
                    let c = text[cluster..].chars().next().unwrap_or(' ');
                    self.clusters.push(Cluster {
                        byte,
                        advance: glyph.x_advance,
                        kind: ClusterKind::of(c),
                    });
                    self.cluster_glyphs.push(index..index + 1);
                }
            }
        }
    }
}

/// Map CSS-style generic names onto fontdb families.
fn family(name: &str) -> Family<'_> {
    match name.to_ascii_lowercase().as_str() {
        "sans" | "sans-serif" => Family::SansSerif,
        "serif" => Family::Serif,
        "mono" | "monospace" => Family::Monospace,
        "cursive" => Family::Cursive,
        "fantasy" => Family::Fantasy,
        _ => Family::Name(name),
    }
}

/// Shape one run; yields (cluster byte offset within `text`, glyph).
fn shape(
    face: &LoadedFace,
    text: &str,
    language: Option<&rustybuzz::Language>,
    pixel_size: f32,
    slot: usize,
) -> Option<Vec<(usize, ShapedGlyph)>> {
    let face = rustybuzz::Face::from_slice(&face.data, face.index)?;
    let scale = pixel_size / face.units_per_em() as f32;

    let mut buffer = rustybuzz::UnicodeBuffer::new();
    buffer.push_str(text);
    buffer.set_direction(rustybuzz::Direction::LeftToRight);
    if let Some(language) = language {
        buffer.set_language(language.clone());
    }

    let output = rustybuzz::shape(&face, &[], buffer);
    let glyphs = output
        .glyph_infos()
        .iter()
        .zip(output.glyph_positions())
        .map(|(info, position)| {
            (
                info.cluster as usize,
                ShapedGlyph {
                    id: info.glyph_id as u16,
                    slot,
                    x_offset: position.x_offset as f32 * scale,
                    y_offset: position.y_offset as f32 * scale,
                    x_advance: position.x_advance as f32 * scale,
                },
            )
        })
        .collect();
    Some(glyphs)
}

impl ShapingContext for SystemShaper {
    fn set_font(
        &mut self,
        description: &str,
        language: &str,
        pixel_size: u32,
    ) -> Result<FontMetrics> {
        self.families = description
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(String::from)
            .collect();
        self.variants = Default::default();
        self.resolved = [false; 4];
        self.rasterizer.clear();

        let regular = self
            .query(400, false)
            .ok_or_else(|| TextError::FontNotFound(description.to_string()))?;
        let face = rustybuzz::Face::from_slice(&regular.data, regular.index)
            .ok_or(TextError::InvalidFontData)?;

        self.pixel_size = pixel_size.max(1) as f32;
        let scale = self.pixel_size / face.units_per_em() as f32;
        let underline = face.underline_metrics();
        self.metrics = FontMetrics {
            ascent: f32::from(face.ascender()) * scale,
            descent: -f32::from(face.descender()) * scale,
            underline_thickness: underline
                .map(|m| f32::from(m.thickness) * scale)
                .unwrap_or(self.pixel_size / 14.0),
        };
        self.underline_position = underline
            .map(|m| -f32::from(m.position) * scale)
            .unwrap_or(self.pixel_size / 10.0);
        self.language = language.parse().ok();
        if self.language.is_none() {
            tracing::debug!("Unknown shaping language {:?}", language);
        }

        self.variants[REGULAR] = Some(regular.clone());
        self.resolved[REGULAR] = true;

        let ellipsis = ELLIPSIS.to_string();
        let language = self.language.as_ref();
        self.ellipsis = shape(&regular, &ellipsis, language, self.pixel_size, REGULAR)
            .map(|glyphs| glyphs.into_iter().map(|(_, glyph)| glyph).collect())
            .unwrap_or_default();
        self.ellipsis_advance = self.ellipsis.iter().map(|glyph| glyph.x_advance).sum();

        Ok(self.metrics)
    }

    fn set_text(&mut self, text: &StyledText, options: &ShapeOptions) {
        self.text = text.clone();
        self.clusters.clear();
        self.cluster_glyphs.clear();
        self.glyphs.clear();

        let mut offset = 0;
        for paragraph in text.text.split('\n') {
            let mut run_start = 0;
            let mut run_slot = None;
            for (index, _) in paragraph.char_indices() {
                let style = text.style_at(offset + index);
                let slot = self.slot_for(style.bold, style.italic);
                match run_slot {
                    Some(current) if current != slot => {
                        self.shape_run(&paragraph[run_start..index], offset + run_start, current);
                        run_start = index;
                        run_slot = Some(slot);
                    }
                    Some(_) => {}
                    None => run_slot = Some(slot),
                }
            }
            if let Some(slot) = run_slot {
                self.shape_run(&paragraph[run_start..], offset + run_start, slot);
            }
            offset += paragraph.len() + 1;
        }

        self.laid = paragraph::lay_out(&text.text, &self.clusters, options, self.ellipsis_advance);

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
        let origin = x as f32;
        let base = baseline as f32;
        let thickness = self.metrics.underline_px();
        let descent = self.metrics.descent.ceil() as i32;

        for item in &line.items {
            let (byte, glyphs, ink) = match item.source {
                paragraph::Source::Cluster(i) => (
                    self.clusters[i].byte,
                    &self.glyphs[self.cluster_glyphs[i].clone()],
                    self.clusters[i].kind == ClusterKind::Ink,
                ),
                paragraph::Source::Ellipsis { byte } => (byte, &self.ellipsis[..], true),
            };

            if ink {
                let mut pen = origin + item.x;
                for glyph in glyphs {
                    if let Some(face) = self.variants[glyph.slot].as_ref() {
                        self.rasterizer
                            .draw(face, glyph, self.pixel_size, pen, base, surface);
                    }
                    pen += glyph.x_advance;
                }
            }

            let style = self.text.style_at(byte);
            let left = (origin + item.x).round() as i32;
            let width = item.advance.round() as u32;
            match style.underline {
                Underline::None => {}
                Underline::Single => surface.fill_rect(
                    left,
                    (base + self.underline_position).round() as i32,
                    width,
                    thickness,
                    u8::MAX,
                ),
                Underline::Low => surface.fill_rect(
                    left,
                    baseline + descent - thickness as i32,
                    width,
                    thickness,
                    u8::MAX,
                ),
            }
            if style.strikethrough {
                let y = base - self.metrics.ascent * 0.3;
                surface.fill_rect(left, y.round() as i32, width, thickness, u8::MAX);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_names_map_to_generic_families() {
        assert!(matches!(family("Sans-Serif"), Family::SansSerif));
        assert!(matches!(family("monospace"), Family::Monospace));
        assert!(matches!(family("Ubuntu"), Family::Name("Ubuntu")));
    }

    #[test]
    fn empty_database_reports_missing_font() {
        let engine = SystemFonts::with_database(Database::new());
        let mut context = engine.create_context();
        let result = context.set_font("Ubuntu", "en", 14);
        assert!(matches!(result, Err(TextError::FontNotFound(_))));
    }

    #[test]
    fn add_font_dir_rejects_missing_directory() {
        let mut engine = SystemFonts::with_database(Database::new());
        let result = engine.add_font_dir(Path::new("/nonexistent/glint/fonts"));
        assert!(matches!(result, Err(TextError::FontDirectory(_))));
    }

    #[test]
    fn variants_fall_back_to_regular_slot() {
        let engine = SystemFonts::with_database(Database::new());
        let mut context = engine.create_context();
        assert_eq!(context.slot_for(true, true), REGULAR);
        assert!(context.resolved[3]);
    }

    #[test]
    fn metrics_scale_with_units_per_em() {
        let engine = SystemFonts::new();
        let mut context = engine.create_context();
        let Ok(small) = context.set_font("sans-serif", "en", 12) else {
            return;
        };
        let large = context.set_font("sans-serif", "en", 48).unwrap();

        assert!(small.ascent > 0.0 && small.ascent < 24.0);
        assert!((large.ascent / small.ascent - 4.0).abs() < 0.01);
        if small.descent > 0.0 {
            assert!((large.descent / small.descent - 4.0).abs() < 0.01);
        }
    }
}
