//! Reusable rasterization surface
//!
//! Every render of a font instance draws into the same coverage buffer.
//! The buffer only ever grows: when a text's extents exceed the capacity in
//! a dimension, that dimension becomes the smallest multiple of its current
//! size that fits. After each render the used region is copied out and
//! everything drawn is cleared, so the next render starts from zero
//! coverage even when ink spilled past the copied region.

use crate::backend::TextImage;

/// Initial surface width in raw pixels
pub const DEFAULT_SURFACE_WIDTH: u32 = 256;

/// Initial surface height in raw pixels
pub const DEFAULT_SURFACE_HEIGHT: u32 = 64;

/// An 8-bit coverage buffer that text lines are rasterized into.
#[derive(Debug, Clone)]
pub struct PixelSurface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    /// Bounds of everything drawn since the last `take_region`
    dirty: Option<Area>,
}

impl Default for PixelSurface {
    fn default() -> Self {
        Self::new(DEFAULT_SURFACE_WIDTH, DEFAULT_SURFACE_HEIGHT)
    }
}

impl PixelSurface {
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize],
            dirty: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Grow so that a `width` × `height` region fits.
    ///
    /// Returns `true` when the surface was reallocated; its previous
    /// contents are discarded and the caller must render again.
    pub fn ensure_capacity(&mut self, width: u32, height: u32) -> bool {
        let new_width = grown(self.width, width);
        let new_height = grown(self.height, height);
        if new_width == self.width && new_height == self.height {
            return false;
        }

        tracing::debug!(
            "Growing text surface from {}x{} to {}x{}",
            self.width,
            self.height,
            new_width,
            new_height
        );
        *self = Self::new(new_width, new_height);
        true
    }

    /// Coverage at (x, y), or 0 outside the surface
    pub fn pixel(&self, x: u32, y: u32) -> u8 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        self.pixels[self.index(x, y)]
    }

    /// Combine a `width` × `height` coverage mask whose top-left corner is
    /// at (x, y). Overlapping glyphs keep the larger coverage; anything
    /// outside the surface is clipped.
    pub fn blit_mask(&mut self, x: i32, y: i32, width: u32, height: u32, mask: &[u8]) {
        if mask.len() < width as usize * height as usize {
            return;
        }
        let Some(area) = self.clip(x, y, width, height) else {
            return;
        };
        for dest_y in area.top..area.bottom {
            let row = (i64::from(dest_y) - i64::from(y)) as usize;
            for dest_x in area.left..area.right {
                let col = (i64::from(dest_x) - i64::from(x)) as usize;
                let value = mask[row * width as usize + col];
                let index = self.index(dest_x, dest_y);
                self.pixels[index] = self.pixels[index].max(value);
            }
        }
        self.mark_dirty(area);
    }

    /// Fill a rectangle with the given coverage (used for decorations).
    pub fn fill_rect(&mut self, x: i32, y: i32, width: u32, height: u32, coverage: u8) {
        let Some(area) = self.clip(x, y, width, height) else {
            return;
        };
        for dest_y in area.top..area.bottom {
            let start = self.index(area.left, dest_y);
            let end = self.index(area.right, dest_y);
            for pixel in &mut self.pixels[start..end] {
                *pixel = (*pixel).max(coverage);
            }
        }
        self.mark_dirty(area);
    }

    /// Copy the top-left `width` × `height` region into a standalone image
    /// and clear everything drawn since the last copy, including ink that
    /// fell outside the region.
    ///
    /// The copy never reads past the surface: a region larger than the
    /// capacity is truncated and a warning is logged.
    pub fn take_region(&mut self, width: u32, height: u32) -> TextImage {
        let copy_width = width.min(self.width);
        let copy_height = height.min(self.height);
        if copy_width < width || copy_height < height {
            tracing::warn!(
                "Text region {}x{} exceeds surface {}x{}; truncating to {}x{}",
                width,
                height,
                self.width,
                self.height,
                copy_width,
                copy_height
            );
        }

        let mut pixels = Vec::with_capacity(copy_width as usize * copy_height as usize);
        for y in 0..copy_height {
            let start = self.index(0, y);
            pixels.extend_from_slice(&self.pixels[start..start + copy_width as usize]);
        }

        if let Some(dirty) = self.dirty.take() {
            for y in dirty.top..dirty.bottom {
                let start = self.index(dirty.left, y);
                let end = self.index(dirty.right, y);
                self.pixels[start..end].fill(0);
            }
        }

        TextImage {
            width: copy_width,
            height: copy_height,
            pixels,
        }
    }

    /// Whether every pixel is clear
    pub fn is_clear(&self) -> bool {
        self.pixels.iter().all(|&p| p == 0)
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Intersection of a rectangle with the surface
    fn clip(&self, x: i32, y: i32, width: u32, height: u32) -> Option<Area> {
        let clamp = |v: i64, max: u32| v.clamp(0, i64::from(max)) as u32;
        let area = Area {
            left: clamp(i64::from(x), self.width),
            top: clamp(i64::from(y), self.height),
            right: clamp(i64::from(x) + i64::from(width), self.width),
            bottom: clamp(i64::from(y) + i64::from(height), self.height),
        };
        (area.left < area.right && area.top < area.bottom).then_some(area)
    }

    fn mark_dirty(&mut self, area: Area) {
        self.dirty = Some(match self.dirty {
            Some(dirty) => Area {
                left: dirty.left.min(area.left),
                top: dirty.top.min(area.top),
                right: dirty.right.max(area.right),
                bottom: dirty.bottom.max(area.bottom),
            },
            None => area,
        });
    }
}

/// Half-open pixel rectangle inside the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Area {
    left: u32,
    top: u32,
    right: u32,
    bottom: u32,
}

/// Smallest multiple of `current` that is at least `needed`.
fn grown(current: u32, needed: u32) -> u32 {
    if needed <= current {
        current
    } else {
        current.saturating_mul(needed.div_ceil(current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growth_uses_smallest_multiple() {
        assert_eq!(grown(256, 100), 256);
        assert_eq!(grown(256, 256), 256);
        assert_eq!(grown(256, 257), 512);
        assert_eq!(grown(256, 512), 512);
        assert_eq!(grown(64, 1000), 1024);
    }

    #[test]
    fn ensure_capacity_is_monotonic_and_idempotent() {
        let mut surface = PixelSurface::default();
        assert!(!surface.ensure_capacity(100, 20));
        assert!(surface.ensure_capacity(300, 20));
        assert_eq!((surface.width(), surface.height()), (512, 64));
        assert!(!surface.ensure_capacity(300, 20));
        assert!(surface.ensure_capacity(10, 65));
        assert_eq!((surface.width(), surface.height()), (512, 128));
        assert!(!surface.ensure_capacity(10, 10));
    }

    #[test]
    fn take_region_copies_and_clears() {
        let mut surface = PixelSurface::new(8, 4);
        surface.fill_rect(1, 1, 2, 2, 200);
        let image = surface.take_region(4, 3);
        assert_eq!((image.width, image.height), (4, 3));
        assert_eq!(
            image.pixels,
            vec![
                0, 0, 0, 0, //
                0, 200, 200, 0, //
                0, 200, 200, 0,
            ]
        );
        assert!(surface.is_clear());
    }

    #[test]
    fn take_region_truncates_at_capacity() {
        let mut surface = PixelSurface::new(4, 2);
        surface.fill_rect(0, 0, 4, 2, 9);
        let image = surface.take_region(4, 5);
        assert_eq!((image.width, image.height), (4, 2));
        assert_eq!(image.pixels.len(), 8);
    }

    #[test]
    fn blit_clips_and_keeps_maximum() {
        let mut surface = PixelSurface::new(4, 4);
        surface.blit_mask(-1, -1, 2, 2, &[10, 20, 30, 40]);
        assert_eq!(surface.pixel(0, 0), 40);
        surface.blit_mask(0, 0, 1, 1, &[5]);
        assert_eq!(surface.pixel(0, 0), 40);
        surface.blit_mask(3, 3, 2, 2, &[1, 2, 3, 4]);
        assert_eq!(surface.pixel(3, 3), 1);
    }

    #[test]
    fn take_region_clears_ink_outside_the_copy() {
        let mut surface = PixelSurface::new(16, 8);
        surface.fill_rect(0, 0, 2, 2, 50);
        surface.fill_rect(10, 5, 3, 2, 255);
        surface.blit_mask(6, 6, 2, 1, &[7, 8]);

        let image = surface.take_region(4, 4);
        assert_eq!((image.width, image.height), (4, 4));
        assert_eq!(image.pixels[0], 50);
        assert!(surface.is_clear());

        let next = surface.take_region(16, 8);
        assert!(next.pixels.iter().all(|&p| p == 0));
    }

    #[test]
    fn drawing_fully_outside_leaves_nothing_dirty() {
        let mut surface = PixelSurface::new(4, 4);
        surface.fill_rect(-5, -5, 2, 2, 255);
        surface.fill_rect(8, 0, 2, 2, 255);
        assert!(surface.is_clear());
        assert_eq!(surface.dirty, None);
    }
}
