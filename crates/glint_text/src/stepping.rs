//! Vertical line placement strategies
//!
//! The shaping engine's own line spacing comes from the font metrics and
//! cannot be tuned independently, so custom line heights and paragraph
//! breaks are applied by walking the lines and placing each baseline
//! explicitly. That walk is slower and changes the reported height, so it
//! only runs when the layout asks for custom spacing.

use crate::shaping::LineExtents;

/// Baselines for each drawn line and the resulting text height
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Placement {
    /// One baseline per line to draw; may be shorter than the engine's line
    /// list when a trailing empty paragraph is dropped
    pub baselines: Vec<i32>,
    /// Total height in raw pixels
    pub height: u32,
}

/// Places laid-out lines vertically.
pub trait LineStepping {
    /// `natural_height` is the engine's height for `lines`.
    fn place(&self, lines: &[LineExtents], natural_height: u32) -> Placement;
}

/// Use the engine's baselines and height verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NaturalStepping;

impl LineStepping for NaturalStepping {
    fn place(&self, lines: &[LineExtents], natural_height: u32) -> Placement {
        Placement {
            baselines: lines.iter().map(|line| line.baseline).collect(),
            height: natural_height,
        }
    }
}

/// Step baselines manually with a fixed line height and/or paragraph gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CustomStepping {
    /// Fixed baseline distance; `None` keeps the engine's per-line delta
    pub line_height: Option<u32>,
    /// Extra space before each new paragraph
    pub paragraph_break: u32,
}

impl LineStepping for CustomStepping {
    fn place(&self, lines: &[LineExtents], natural_height: u32) -> Placement {
        let Some(first) = lines.first() else {
            return Placement {
                baselines: Vec::new(),
                height: natural_height,
            };
        };

        let paragraph_break = i64::from(self.paragraph_break);
        let mut baselines = Vec::with_capacity(lines.len());
        let mut baseline = i64::from(first.baseline);
        let mut extra: i64 = 0;
        let mut trailing_paragraph = false;
        baselines.push(first.baseline);

        for (index, pair) in lines.windows(2).enumerate() {
            let (previous, line) = (&pair[0], &pair[1]);
            let natural_step = i64::from(line.baseline) - i64::from(previous.baseline);

            // A trailing newline leaves an empty final paragraph; it is
            // replaced by one paragraph break allowance below.
            if index + 2 == lines.len() && line.is_empty && line.starts_paragraph {
                extra -= natural_step;
                trailing_paragraph = true;
                break;
            }

            let mut step = self.line_height.map_or(natural_step, i64::from);
            if line.starts_paragraph {
                step += paragraph_break;
            }
            baseline += step;
            extra += step - natural_step;
            baselines.push(saturate(baseline));
        }

        let mut height = i64::from(natural_height) + extra;
        if trailing_paragraph {
            height += paragraph_break;
        }

        Placement {
            baselines,
            height: u32::try_from(height.max(0)).unwrap_or(u32::MAX),
        }
    }
}

/// The stepping strategy selected for one render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SteppingStrategy {
    Natural(NaturalStepping),
    Custom(CustomStepping),
}

impl LineStepping for SteppingStrategy {
    fn place(&self, lines: &[LineExtents], natural_height: u32) -> Placement {
        match self {
            Self::Natural(stepping) => stepping.place(lines, natural_height),
            Self::Custom(stepping) => stepping.place(lines, natural_height),
        }
    }
}

fn saturate(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}
