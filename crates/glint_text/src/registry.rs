//! Font registry keyed by pixel size
//!
//! A [`FontSet`] is the one object callers keep around: it owns the shaping
//! engine, the graphics backend, the shared drawing settings and one
//! [`Font`] per requested pixel size. Fonts are created on first use and
//! live as long as the set; dropping the set releases every texture before
//! the backend goes away.

use std::collections::BTreeMap;
use std::path::Path;

use crate::backend::TextBackend;
use crate::config::{DrawingSettings, TextConfig};
use crate::font::Font;
use crate::geometry::{Color, Point};
use crate::layout::{DisplayText, Layout};
use crate::scale::Scaler;
use crate::shaping::{ShapingContext, ShapingEngine};
use crate::Result;

/// All fonts of an application, one per pixel size.
pub struct FontSet<E: ShapingEngine, B: TextBackend> {
    // Declared first so fonts release their textures before the backend drops.
    fonts: BTreeMap<i32, Font<E::Context, B::Texture>>,
    engine: E,
    backend: B,
    settings: DrawingSettings,
    zoom: u32,
    show_underlines: bool,
    update_interval: u32,
}

impl<E: ShapingEngine, B: TextBackend> FontSet<E, B> {
    pub fn new(engine: E, backend: B) -> Self {
        Self::from_config(engine, backend, TextConfig::default())
    }

    pub fn from_config(engine: E, backend: B, config: TextConfig) -> Self {
        Self {
            fonts: BTreeMap::new(),
            engine,
            backend,
            settings: config.drawing,
            zoom: Scaler::new(config.zoom).zoom(),
            show_underlines: false,
            update_interval: config.cache_update_interval,
        }
    }

    /// Make the fonts in `dir` available to every size.
    pub fn add(&mut self, dir: impl AsRef<Path>) -> Result<usize> {
        self.engine.add_font_dir(dir.as_ref())
    }

    /// The font for `size`, created on first request.
    ///
    /// A font created before the last zoom change is brought up to date
    /// here, which invalidates its cached sprites.
    pub fn get(&mut self, size: i32) -> FontRef<'_, E::Context, B> {
        let engine = &self.engine;
        let settings = &self.settings;
        let (zoom, interval) = (self.zoom, self.update_interval);
        let font = self.fonts.entry(size).or_insert_with(|| {
            tracing::debug!("Creating font for size {}", size);
            let mut font = Font::with_update_interval(engine.create_context(), interval);
            font.set_zoom(zoom);
            font.set_drawing_settings(settings.clone());
            font.set_pixel_size(size);
            font
        });
        font.set_zoom(zoom);

        FontRef {
            font,
            backend: &mut self.backend,
            show_underlines: self.show_underlines,
        }
    }

    /// Replace the drawing settings of every size. All cached sprites are
    /// invalidated.
    pub fn set_drawing_settings(&mut self, settings: DrawingSettings) {
        for font in self.fonts.values_mut() {
            font.set_drawing_settings(settings.clone());
        }
        self.settings = settings;
    }

    pub fn drawing_settings(&self) -> &DrawingSettings {
        &self.settings
    }

    /// Set the display zoom in percent (clamped to the supported range).
    pub fn set_zoom(&mut self, zoom: u32) {
        self.zoom = Scaler::new(zoom).zoom();
    }

    pub fn zoom(&self) -> u32 {
        self.zoom
    }

    /// Reveal keyboard accelerators as underlines
    pub fn set_show_underlines(&mut self, show: bool) {
        self.show_underlines = show;
    }

    pub fn show_underlines(&self) -> bool {
        self.show_underlines
    }

    /// Advance every font's cache compaction clock; call once per frame.
    pub fn step(&mut self) {
        for font in self.fonts.values_mut() {
            font.step();
        }
    }

    /// Pixel sizes created so far, ascending
    pub fn sizes(&self) -> impl Iterator<Item = i32> + '_ {
        self.fonts.keys().copied()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

/// A font borrowed from a [`FontSet`] together with the backend it draws to.
pub struct FontRef<'a, C, B: TextBackend> {
    font: &'a mut Font<C, B::Texture>,
    backend: &'a mut B,
    show_underlines: bool,
}

impl<'a, C: ShapingContext, B: TextBackend> FontRef<'a, C, B> {
    /// Draw with the top-left corner at `point`, snapped to whole pixels.
    pub fn draw(&mut self, text: &DisplayText, point: Point, color: Color) {
        self.font
            .draw(&mut *self.backend, text, point, color, self.show_underlines);
    }

    pub fn draw_str(&mut self, text: &str, point: Point, color: Color) {
        self.draw(&DisplayText::plain(text), point, color);
    }

    /// Draw with the top-left corner exactly at `point`.
    pub fn draw_aliased(&mut self, text: &DisplayText, point: Point, color: Color) {
        self.font
            .draw_aliased(&mut *self.backend, text, point, color, self.show_underlines);
    }

    pub fn draw_aliased_str(&mut self, text: &str, point: Point, color: Color) {
        self.draw_aliased(&DisplayText::plain(text), point, color);
    }

    pub fn width(&mut self, text: &str) -> i32 {
        self.font.width(&mut *self.backend, text, self.show_underlines)
    }

    pub fn height(&self) -> i32 {
        self.font.height()
    }

    pub fn formatted_width(&mut self, text: &DisplayText) -> i32 {
        self.font
            .formatted_width(&mut *self.backend, text, self.show_underlines)
    }

    pub fn formatted_height(&mut self, text: &DisplayText) -> i32 {
        self.font
            .formatted_height(&mut *self.backend, text, self.show_underlines)
    }

    pub fn formatted_bounds(&mut self, text: &DisplayText) -> Point {
        self.font
            .formatted_bounds(&mut *self.backend, text, self.show_underlines)
    }

    pub fn line_height(&self, layout: &Layout) -> i32 {
        self.font.line_height(layout)
    }

    pub fn paragraph_break(&self, layout: &Layout) -> i32 {
        self.font.paragraph_break(layout)
    }

    pub fn show_underlines(&self) -> bool {
        self.show_underlines
    }

    pub fn font(&self) -> &Font<C, B::Texture> {
        &*self.font
    }

    pub fn font_mut(&mut self) -> &mut Font<C, B::Texture> {
        &mut *self.font
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{HeadlessBackend, MonospaceEngine};

    fn font_set() -> FontSet<MonospaceEngine, HeadlessBackend> {
        FontSet::new(MonospaceEngine::new(), HeadlessBackend::new())
    }

    #[test]
    fn fonts_are_created_once_per_size() {
        let mut fonts = font_set();
        fonts.get(14);
        fonts.get(18);
        fonts.get(14);
        assert_eq!(fonts.sizes().collect::<Vec<_>>(), vec![14, 18]);
        assert_eq!(fonts.get(18).font().pixel_size(), 18);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut fonts = font_set();
        fonts.set_zoom(5);
        assert_eq!(fonts.zoom(), 50);
    }

    #[test]
    fn zoom_changes_reach_existing_fonts_on_get() {
        let mut fonts = font_set();
        assert_eq!(fonts.get(20).height(), 20);

        fonts.set_zoom(200);
        let font = fonts.get(20);
        assert_eq!(font.font().scaler().zoom(), 200);
        assert_eq!(font.height(), 20);
    }

    #[test]
    fn settings_broadcast_to_every_size() {
        let mut fonts = font_set();
        fonts.get(12);
        fonts.get(20);
        let settings = DrawingSettings {
            line_height_scale: 2.0,
            ..DrawingSettings::default()
        };
        fonts.set_drawing_settings(settings.clone());
        assert_eq!(fonts.get(12).font().drawing_settings(), &settings);
        assert_eq!(fonts.get(20).line_height(&Layout::new()), 40);
        assert_eq!(fonts.get(24).font().drawing_settings(), &settings);
    }

    #[test]
    fn underline_flag_is_passed_to_fonts() {
        let mut fonts = font_set();
        assert!(!fonts.get(12).show_underlines());
        fonts.set_show_underlines(true);
        assert!(fonts.get(12).show_underlines());
    }
}
