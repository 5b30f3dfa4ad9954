//! One font at one pixel size
//!
//! A [`Font`] turns [`DisplayText`] into cached GPU sprites. It owns a
//! shaping context, a pixel surface and a render cache; textures are
//! created through whatever [`TextBackend`] the caller passes in, and are
//! released when the font is dropped.
//!
//! Pixel sizes and every measurement are in view units. Internally the
//! font renders at raw (zoomed) resolution, so a string occupies the same
//! view-space footprint at any zoom.

use crate::backend::{QuadUniforms, TextBackend};
use crate::cache::{CacheKey, RenderCache, RenderedResult, DEFAULT_UPDATE_INTERVAL};
use crate::config::DrawingSettings;
use crate::geometry::{Color, Point};
use crate::layout::{DisplayText, Layout};
use crate::markup::StyledText;
use crate::preprocess::{self, AcceleratorMode};
use crate::scale::Scaler;
use crate::shaping::{FontMetrics, ShapeOptions, ShapingContext};
use crate::stepping::{LineStepping, Placement};
use crate::surface::PixelSurface;

/// Tab stops are this many space widths apart
const SPACES_PER_TAB: u32 = 4;

/// Upper bound on shape/grow/retry passes for one render. Growth makes the
/// surface fit on the first retry, so two passes always suffice.
const MAX_RENDER_PASSES: usize = 4;

/// A font instance for a single pixel size.
pub struct Font<C, T> {
    context: C,
    surface: PixelSurface,
    cache: RenderCache<T>,
    pixel_size: i32,
    settings: DrawingSettings,
    scaler: Scaler,
    metrics: FontMetrics,
    /// Raw natural font height
    font_height: u32,
    /// Raw default line height (font height × line height scale)
    default_line_height: u32,
    /// Raw default paragraph break (font height × paragraph break scale)
    default_paragraph_break: u32,
    /// Raw distance between tab stops
    tab_width: u32,
    ready: bool,
}

impl<C: ShapingContext, T> Font<C, T> {
    /// Create a font with no pixel size; nothing renders until
    /// [`set_pixel_size`](Self::set_pixel_size) is called.
    pub fn new(context: C) -> Self {
        Self::with_update_interval(context, DEFAULT_UPDATE_INTERVAL)
    }

    /// Create a font whose cache compacts every `update_interval` ticks.
    pub fn with_update_interval(context: C, update_interval: u32) -> Self {
        Self {
            context,
            surface: PixelSurface::default(),
            cache: RenderCache::new(update_interval),
            pixel_size: 0,
            settings: DrawingSettings::default(),
            scaler: Scaler::default(),
            metrics: FontMetrics::default(),
            font_height: 0,
            default_line_height: 0,
            default_paragraph_break: 0,
            tab_width: 0,
            ready: false,
        }
    }

    /// Set the font size in view units. It is a rough estimate of the
    /// rendered height.
    pub fn set_pixel_size(&mut self, size: i32) {
        self.pixel_size = size;
        self.update_font();
    }

    /// Replace all drawing settings at once.
    pub fn set_drawing_settings(&mut self, settings: DrawingSettings) {
        self.settings = settings;
        self.update_font();
    }

    pub fn set_font_description(&mut self, description: impl Into<String>) {
        self.settings.description = description.into();
        self.update_font();
    }

    pub fn set_language(&mut self, language: impl Into<String>) {
        self.settings.language = language.into();
        self.update_font();
    }

    /// Follow a new display zoom. Metrics, tab stops and every cached
    /// sprite are recomputed when the zoom actually changes.
    pub fn set_zoom(&mut self, zoom: u32) {
        let scaler = Scaler::new(zoom);
        if scaler != self.scaler {
            self.scaler = scaler;
            self.update_font();
        }
    }

    pub fn pixel_size(&self) -> i32 {
        self.pixel_size
    }

    pub fn drawing_settings(&self) -> &DrawingSettings {
        &self.settings
    }

    pub fn scaler(&self) -> &Scaler {
        &self.scaler
    }

    /// Raw metrics of the current font
    pub fn metrics(&self) -> FontMetrics {
        self.metrics
    }

    pub fn cache(&self) -> &RenderCache<T> {
        &self.cache
    }

    pub fn surface(&self) -> &PixelSurface {
        &self.surface
    }

    /// Advance the cache compaction clock by one tick.
    pub fn step(&mut self) {
        self.cache.step();
    }

    /// Draw text with its origin snapped to whole raw pixels.
    pub fn draw<B>(
        &mut self,
        backend: &mut B,
        text: &DisplayText,
        point: Point,
        color: Color,
        show_underlines: bool,
    ) where
        B: TextBackend<Texture = T>,
    {
        self.draw_common(backend, text, point, color, show_underlines, true);
    }

    /// Draw text at a sub-pixel position.
    pub fn draw_aliased<B>(
        &mut self,
        backend: &mut B,
        text: &DisplayText,
        point: Point,
        color: Color,
        show_underlines: bool,
    ) where
        B: TextBackend<Texture = T>,
    {
        self.draw_common(backend, text, point, color, show_underlines, false);
    }

    /// Width of unformatted text in view units
    pub fn width<B>(&mut self, backend: &mut B, text: &str, show_underlines: bool) -> i32
    where
        B: TextBackend<Texture = T>,
    {
        self.formatted_width(backend, &DisplayText::plain(text), show_underlines)
    }

    /// Natural font height in view units
    pub fn height(&self) -> i32 {
        self.view_ceil(self.font_height)
    }

    pub fn formatted_width<B>(
        &mut self,
        backend: &mut B,
        text: &DisplayText,
        show_underlines: bool,
    ) -> i32
    where
        B: TextBackend<Texture = T>,
    {
        self.formatted_bounds(backend, text, show_underlines).x as i32
    }

    pub fn formatted_height<B>(
        &mut self,
        backend: &mut B,
        text: &DisplayText,
        show_underlines: bool,
    ) -> i32
    where
        B: TextBackend<Texture = T>,
    {
        self.formatted_bounds(backend, text, show_underlines).y as i32
    }

    /// Width and height of the laid-out text in view units. Blank lines
    /// count even though they produce no sprite.
    pub fn formatted_bounds<B>(
        &mut self,
        backend: &mut B,
        text: &DisplayText,
        show_underlines: bool,
    ) -> Point
    where
        B: TextBackend<Texture = T>,
    {
        if text.is_empty() {
            return Point::default();
        }
        let rendered = self.render(backend, text, show_underlines);
        Point::new(
            f64::from(self.view_ceil(rendered.width)),
            f64::from(self.view_ceil(rendered.height)),
        )
    }

    /// Distance between baselines for `layout`, in view units
    pub fn line_height(&self, layout: &Layout) -> i32 {
        match layout.line_height() {
            Some(height) => i32::try_from(height).unwrap_or(i32::MAX),
            None => self.view_ceil(self.default_line_height),
        }
    }

    /// Extra space between paragraphs for `layout`, in view units
    pub fn paragraph_break(&self, layout: &Layout) -> i32 {
        match layout.paragraph_break() {
            Some(gap) => i32::try_from(gap).unwrap_or(i32::MAX),
            None => self.view_ceil(self.default_paragraph_break),
        }
    }

    /// Look up or produce the sprite for `text`.
    pub fn render<B>(
        &mut self,
        backend: &mut B,
        text: &DisplayText,
        show_underlines: bool,
    ) -> RenderedResult
    where
        B: TextBackend<Texture = T>,
    {
        if text.is_empty() || !self.ready {
            return RenderedResult::default();
        }

        let key = CacheKey::new(text.clone(), show_underlines);
        if let Some(cached) = self.cache.lookup(&key) {
            return cached;
        }

        let resolved = text.layout().resolve(&self.scaler);
        let styled = preprocess::prepare(
            text.text(),
            AcceleratorMode::from_show_underlines(show_underlines),
        );
        let options = ShapeOptions {
            wrap_width: resolved.wrap_width,
            alignment: resolved.alignment,
            truncate: resolved.truncate,
            tab_width: self.tab_width,
        };
        let underline_pad = if show_underlines {
            2 * self.metrics.underline_px()
        } else {
            0
        };

        let (width, placement) = self.layout_into_surface(&styled, &options, |lines, height| {
            let mut placement = resolved.stepping.place(lines, height);
            placement.height += underline_pad;
            placement
        });

        let origins: Vec<i32> = self.context.lines().iter().map(|line| line.x).collect();
        for (index, (&x, &baseline)) in origins.iter().zip(&placement.baselines).enumerate() {
            self.context.draw_line(index, &mut self.surface, x, baseline);
        }

        let image = self.surface.take_region(width, placement.height);
        let result = if image.is_empty() {
            RenderedResult::new(None, image.width, image.height)
        } else {
            let texture = self.cache.recycle_or_allocate(backend, &image);
            RenderedResult::new(Some(texture), image.width, image.height)
        };
        self.cache.insert(key, result);
        result
    }

    /// Shape the text and make sure the surface can hold it, growing the
    /// surface and shaping again from scratch when it cannot.
    fn layout_into_surface(
        &mut self,
        styled: &StyledText,
        options: &ShapeOptions,
        place: impl Fn(&[crate::shaping::LineExtents], u32) -> Placement,
    ) -> (u32, Placement) {
        let mut passes = 0;
        loop {
            passes += 1;
            self.context.set_text(styled, options);
            let (width, natural_height) = self.context.pixel_size();
            let placement = place(self.context.lines(), natural_height);

            if !self.surface.ensure_capacity(width, placement.height) {
                return (width, placement);
            }
            if passes >= MAX_RENDER_PASSES {
                tracing::error!(
                    "Text surface still growing after {} passes for {}x{}",
                    passes,
                    width,
                    placement.height
                );
                return (width, placement);
            }
        }
    }

    fn draw_common<B>(
        &mut self,
        backend: &mut B,
        text: &DisplayText,
        point: Point,
        color: Color,
        show_underlines: bool,
        align_to_pixel: bool,
    ) where
        B: TextBackend<Texture = T>,
    {
        if text.is_empty() {
            return;
        }

        let rendered = self.render(backend, text, show_underlines);
        let Some(texture) = rendered.texture.and_then(|key| self.cache.texture(key)) else {
            return;
        };

        let mut center = Point::new(
            self.scaler.raw_from_view_f(point.x),
            self.scaler.raw_from_view_f(point.y),
        );
        if align_to_pixel {
            center = center.floor();
        }
        center += rendered.center;

        let quad = QuadUniforms {
            center: [center.x as f32, center.y as f32],
            size: [rendered.width as f32, rendered.height as f32],
            color: color.to_array(),
        };
        backend.draw_quad(texture, &quad);
    }

    fn update_font(&mut self) {
        if self.pixel_size <= 0 {
            return;
        }

        self.cache.clear();

        let raw_size = self.scaler.raw_from_view_floor(self.pixel_size).max(1) as u32;
        let metrics = match self.context.set_font(
            &self.settings.description,
            &self.settings.language,
            raw_size,
        ) {
            Ok(metrics) => metrics,
            Err(err) => {
                tracing::warn!(
                    "Cannot use font \"{}\" at {}px: {}",
                    self.settings.description,
                    raw_size,
                    err
                );
                self.ready = false;
                return;
            }
        };

        self.metrics = metrics;
        self.font_height = metrics.height();
        self.default_line_height = scaled(self.font_height, self.settings.line_height_scale);
        self.default_paragraph_break =
            scaled(self.font_height, self.settings.paragraph_break_scale);

        self.context
            .set_text(&StyledText::plain(" "), &ShapeOptions::default());
        let space = self.context.pixel_size().0;
        self.tab_width = SPACES_PER_TAB * space;

        self.ready = true;
        tracing::debug!(
            "Font \"{}\" at {}px (raw {}px): height {}, line height {}, tab {}",
            self.settings.description,
            self.pixel_size,
            raw_size,
            self.font_height,
            self.default_line_height,
            self.tab_width
        );
    }

    fn view_ceil(&self, raw: u32) -> i32 {
        self.scaler
            .view_from_raw_ceil(i32::try_from(raw).unwrap_or(i32::MAX))
    }
}

/// `height × scale`, truncated; negative scales disable the spacing.
fn scaled(height: u32, scale: f64) -> u32 {
    if scale >= 0.0 {
        (f64::from(height) * scale) as u32
    } else {
        0
    }
}
