//! Line breaking, truncation and alignment
//!
//! Engines shape text into [`Cluster`]s (one per grapheme-ish unit, in
//! logical order, with newlines omitted) and hand them to [`lay_out`],
//! which splits paragraphs, wraps at Unicode line break opportunities or
//! ellipsizes, expands tabs and aligns each line. Positions stay in float
//! pixels; engines round when they report [`LineExtents`](crate::LineExtents).

use std::ops::Range;

use rustc_hash::FxHashSet;
use unicode_linebreak::{linebreaks, BreakOpportunity};

use crate::layout::{Alignment, Truncate};
use crate::shaping::ShapeOptions;

/// Character inserted where truncated text was removed
pub(crate) const ELLIPSIS: char = '\u{2026}';

const EPSILON: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClusterKind {
    Ink,
    Space,
    Tab,
}

impl ClusterKind {
    pub(crate) fn of(c: char) -> Self {
        match c {
            '\t' => Self::Tab,
            c if c.is_whitespace() => Self::Space,
            _ => Self::Ink,
        }
    }
}

/// A shaped unit of text
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Cluster {
    /// Byte offset of the cluster in the full text
    pub byte: usize,
    pub advance: f32,
    pub kind: ClusterKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Source {
    /// Index into the cluster slice passed to [`lay_out`]
    Cluster(usize),
    /// An ellipsis standing in for text starting at `byte`
    Ellipsis { byte: usize },
}

/// A cluster positioned on its line
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Placed {
    /// Offset from the line's left edge
    pub x: f32,
    pub advance: f32,
    pub source: Source,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct LaidLine {
    pub start: usize,
    /// Alignment offset of the line's left edge
    pub x: f32,
    pub width: f32,
    pub items: Vec<Placed>,
    pub starts_paragraph: bool,
    pub is_empty: bool,
    /// Wrapped line that is not the last of its paragraph
    justify: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct Paragraphs {
    pub lines: Vec<LaidLine>,
    /// Logical width of the whole text
    pub width: f32,
}

/// Lay out `clusters` (shaped from `text`) into aligned lines.
pub(crate) fn lay_out(
    text: &str,
    clusters: &[Cluster],
    options: &ShapeOptions,
    ellipsis_advance: f32,
) -> Paragraphs {
    let tab = options.tab_width as f32;
    let max = options.wrap_width.map(|w| w as f32);
    let mut lines = Vec::new();
    let mut first = 0;
    let mut offset = 0;

    for (n, paragraph) in text.split('\n').enumerate() {
        let end = offset + paragraph.len();
        let count = clusters[first..]
            .iter()
            .take_while(|cluster| cluster.byte < end)
            .count();
        let range = first..first + count;
        let starts_paragraph = n > 0;

        if range.is_empty() {
            lines.push(LaidLine {
                start: offset,
                starts_paragraph,
                is_empty: true,
                ..LaidLine::default()
            });
        } else {
            match max {
                Some(max) if options.truncate != Truncate::None => {
                    let mut line =
                        ellipsize(clusters, range, max, options.truncate, tab, ellipsis_advance);
                    line.starts_paragraph = starts_paragraph;
                    lines.push(line);
                }
                Some(max) => {
                    let breaks = break_positions(paragraph, offset);
                    let ranges = wrap(clusters, range, &breaks, max, tab);
                    let last = ranges.len() - 1;
                    for (i, range) in ranges.into_iter().enumerate() {
                        let mut line = place(clusters, range, tab, i != last);
                        line.starts_paragraph = starts_paragraph && i == 0;
                        line.justify = i != last;
                        lines.push(line);
                    }
                }
                None => {
                    let mut line = place(clusters, range, tab, false);
                    line.starts_paragraph = starts_paragraph;
                    lines.push(line);
                }
            }
        }

        first += count;
        offset = end + 1;
    }

    let width = align(&mut lines, clusters, options);
    Paragraphs { lines, width }
}

fn break_positions(paragraph: &str, offset: usize) -> FxHashSet<usize> {
    linebreaks(paragraph)
        .filter(|(_, opportunity)| *opportunity == BreakOpportunity::Allowed)
        .map(|(index, _)| offset + index)
        .collect()
}

fn advance_at(cluster: &Cluster, x: f32, tab: f32) -> f32 {
    if cluster.kind == ClusterKind::Tab && tab > 0.0 {
        let stop = ((x + EPSILON) / tab).floor() * tab + tab;
        stop - x
    } else {
        cluster.advance
    }
}

fn measure(clusters: &[Cluster], range: Range<usize>, tab: f32) -> f32 {
    clusters[range]
        .iter()
        .fold(0.0, |x, cluster| x + advance_at(cluster, x, tab))
}

/// Greedy wrapping; a single unbreakable run wider than `max` is split
/// between clusters.
fn wrap(
    clusters: &[Cluster],
    range: Range<usize>,
    breaks: &FxHashSet<usize>,
    max: f32,
    tab: f32,
) -> Vec<Range<usize>> {
    let mut lines = Vec::new();
    let mut start = range.start;
    let mut last_break = None;
    let mut x = 0.0;
    let mut i = range.start;

    while i < range.end {
        let cluster = &clusters[i];
        if i > start && breaks.contains(&cluster.byte) {
            last_break = Some(i);
        }
        let advance = advance_at(cluster, x, tab);
        if cluster.kind != ClusterKind::Space && i > start && x + advance > max + EPSILON {
            let at = match last_break {
                Some(at) if at > start => at,
                _ => i,
            };
            lines.push(start..at);
            start = at;
            last_break = None;
            x = measure(clusters, start..i, tab);
            continue;
        }
        x += advance;
        i += 1;
    }
    lines.push(start..range.end);
    lines
}

/// Position clusters left to right. Spaces hanging at the end of a wrapped
/// line do not count towards its width.
fn place(clusters: &[Cluster], range: Range<usize>, tab: f32, hang_spaces: bool) -> LaidLine {
    let mut items = Vec::with_capacity(range.len());
    let mut x = 0.0;
    let mut width = 0.0;
    for i in range.clone() {
        let cluster = &clusters[i];
        let advance = advance_at(cluster, x, tab);
        items.push(Placed {
            x,
            advance,
            source: Source::Cluster(i),
        });
        x += advance;
        if !hang_spaces || cluster.kind != ClusterKind::Space {
            width = x;
        }
    }
    LaidLine {
        start: clusters[range.start].byte,
        width,
        items,
        ..LaidLine::default()
    }
}

fn ellipsize(
    clusters: &[Cluster],
    range: Range<usize>,
    max: f32,
    truncate: Truncate,
    tab: f32,
    ellipsis: f32,
) -> LaidLine {
    let full = place(clusters, range.clone(), tab, false);
    if full.width <= max + EPSILON {
        return full;
    }

    let budget = (max - ellipsis).max(0.0);
    let advances: Vec<f32> = full.items.iter().map(|item| item.advance).collect();
    let count = advances.len();
    let (front, back) = match truncate {
        Truncate::None => (count, 0),
        Truncate::Back => (fitting(advances.iter(), budget), 0),
        Truncate::Front => (0, fitting(advances.iter().rev(), budget)),
        Truncate::Middle => {
            let (mut front, mut back, mut used) = (0, 0, 0.0);
            loop {
                let mut progressed = false;
                if front + back < count && used + advances[front] <= budget + EPSILON {
                    used += advances[front];
                    front += 1;
                    progressed = true;
                }
                if front + back < count
                    && used + advances[count - 1 - back] <= budget + EPSILON
                {
                    used += advances[count - 1 - back];
                    back += 1;
                    progressed = true;
                }
                if !progressed {
                    break;
                }
            }
            (front, back)
        }
    };

    let mut items = Vec::with_capacity(front + back + 1);
    let mut x = 0.0;
    for item in &full.items[..front] {
        items.push(Placed { x, ..*item });
        x += item.advance;
    }
    items.push(Placed {
        x,
        advance: ellipsis,
        source: Source::Ellipsis {
            byte: clusters[range.start + front].byte,
        },
    });
    x += ellipsis;
    for item in &full.items[count - back..] {
        items.push(Placed { x, ..*item });
        x += item.advance;
    }

    LaidLine {
        start: full.start,
        width: x,
        items,
        ..LaidLine::default()
    }
}

/// How many leading advances fit in `budget`
fn fitting<'a>(advances: impl Iterator<Item = &'a f32>, budget: f32) -> usize {
    let mut used = 0.0;
    advances
        .take_while(|&&advance| {
            used += advance;
            used <= budget + EPSILON
        })
        .count()
}

/// Apply alignment offsets and justification; returns the text width.
fn align(lines: &mut [LaidLine], clusters: &[Cluster], options: &ShapeOptions) -> f32 {
    let widest = lines.iter().map(|line| line.width).fold(0.0, f32::max);
    let container = options
        .wrap_width
        .map_or(widest, |width| (width as f32).max(widest));

    for line in lines.iter_mut() {
        let slack = (container - line.width).max(0.0);
        match options.alignment {
            Alignment::Left => {}
            Alignment::Center => line.x = (slack / 2.0).floor(),
            Alignment::Right => line.x = slack,
            Alignment::Justified => {
                if line.justify {
                    justify(line, clusters, slack);
                }
            }
        }
    }

    match (options.alignment, options.wrap_width) {
        (Alignment::Left, _) | (_, None) => widest,
        _ => container,
    }
}

/// Spread `slack` over the interior spaces of a line.
fn justify(line: &mut LaidLine, clusters: &[Cluster], slack: f32) {
    let is_space = |item: &Placed| {
        matches!(item.source, Source::Cluster(i) if clusters[i].kind == ClusterKind::Space)
    };
    let Some(last_ink) = line.items.iter().rposition(|item| !is_space(item)) else {
        return;
    };
    let gaps = line.items[..last_ink].iter().filter(|item| is_space(item)).count();
    if gaps == 0 {
        return;
    }

    let extra = slack / gaps as f32;
    let mut shift = 0.0;
    for item in line.items.iter_mut() {
        item.x += shift;
        if is_space(item) {
            shift += extra;
        }
    }
    line.width += slack;
}
