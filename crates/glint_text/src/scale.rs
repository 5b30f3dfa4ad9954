//! Conversion between view units and raw device pixels
//!
//! Layout code works in view units, which do not change with the display
//! zoom. Rasterization and GPU upload work in raw pixels. A single zoom
//! ratio, expressed as a percentage, relates the two:
//!
//! ```text
//! raw  = round(view * zoom / 100)
//! view = round(raw * 100 / zoom)
//! ```
//!
//! The integer variants use exact integer arithmetic so that a value whose
//! product with the zoom is divisible by 100 converts without error.

/// Default zoom ratio (percent)
pub const DEFAULT_ZOOM: u32 = 100;

/// Smallest supported zoom ratio (percent)
///
/// Below 50% a single raw pixel spans more than two view units and a
/// view → raw → view round trip could drift by more than one unit.
pub const MIN_ZOOM: u32 = 50;

/// Largest supported zoom ratio (percent)
pub const MAX_ZOOM: u32 = 1000;

/// Converts between view units and raw pixels for one zoom ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Scaler {
    zoom: u32,
}

impl Default for Scaler {
    fn default() -> Self {
        Self { zoom: DEFAULT_ZOOM }
    }
}

impl Scaler {
    /// Create a scaler for the given zoom percentage (clamped to the supported range).
    pub fn new(zoom: u32) -> Self {
        let clamped = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        if clamped != zoom {
            tracing::warn!(
                "Zoom {}% is outside {}%..={}%; using {}%",
                zoom,
                MIN_ZOOM,
                MAX_ZOOM,
                clamped
            );
        }
        Self { zoom: clamped }
    }

    /// Current zoom ratio in percent
    pub fn zoom(&self) -> u32 {
        self.zoom
    }

    /// Raw pixels from view units, rounded to nearest.
    pub fn raw_from_view(&self, view: i32) -> i32 {
        round_div(i64::from(view) * i64::from(self.zoom), 100)
    }

    /// Raw pixels from view units, rounded up.
    pub fn raw_from_view_ceil(&self, view: i32) -> i32 {
        ceil_div(i64::from(view) * i64::from(self.zoom), 100)
    }

    /// Raw pixels from view units, rounded down.
    pub fn raw_from_view_floor(&self, view: i32) -> i32 {
        floor_div(i64::from(view) * i64::from(self.zoom), 100)
    }

    /// Raw pixels from view units without rounding.
    pub fn raw_from_view_f(&self, view: f64) -> f64 {
        view * f64::from(self.zoom) / 100.0
    }

    /// View units from raw pixels, rounded to nearest.
    pub fn view_from_raw(&self, raw: i32) -> i32 {
        round_div(i64::from(raw) * 100, i64::from(self.zoom))
    }

    /// View units from raw pixels, rounded up.
    ///
    /// Every measurement handed back to callers goes through this so that
    /// text is never reported narrower or shorter than it renders.
    pub fn view_from_raw_ceil(&self, raw: i32) -> i32 {
        ceil_div(i64::from(raw) * 100, i64::from(self.zoom))
    }

    /// View units from raw pixels, rounded down.
    pub fn view_from_raw_floor(&self, raw: i32) -> i32 {
        floor_div(i64::from(raw) * 100, i64::from(self.zoom))
    }

    /// View units from raw pixels without rounding.
    pub fn view_from_raw_f(&self, raw: f64) -> f64 {
        raw * 100.0 / f64::from(self.zoom)
    }
}

fn floor_div(num: i64, den: i64) -> i32 {
    saturate(num.div_euclid(den))
}

fn ceil_div(num: i64, den: i64) -> i32 {
    saturate(-(-num).div_euclid(den))
}

/// Round half up: floor((2n + d) / 2d).
fn round_div(num: i64, den: i64) -> i32 {
    saturate((2 * num + den).div_euclid(2 * den))
}

fn saturate(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}
