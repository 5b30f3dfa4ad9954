//! Lightweight text markup
//!
//! Parses the small markup language used in UI strings:
//!
//! - `<b>`, `<i>`, `<u>`, `<s>` for bold, italic, underline and strikethrough
//! - `<span>` with `weight`, `style`, `underline` and `strikethrough`
//!   attributes (`font_weight` / `font_style` are accepted as aliases)
//! - the entities `&lt;`, `&gt;`, `&amp;`, `&quot;`, `&apos;` and numeric
//!   character references
//! - optional keyboard accelerators: a marker character (usually `_`)
//!   flags the following character, and a doubled marker is a literal
//!
//! Parsing is strict: anything outside this subset is an error, and callers
//! fall back to showing the text without markup.

use std::ops::Range;

use thiserror::Error;

/// Underline decoration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Underline {
    #[default]
    None,
    Single,
    /// Drawn below the descent line, as used for keyboard accelerators
    Low,
}

/// Style attributes of a run of text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: Underline,
    pub strikethrough: bool,
}

/// A styled byte range of [`StyledText::text`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleSpan {
    pub range: Range<usize>,
    pub style: TextStyle,
}

/// Text with markup removed, plus its style runs and accelerators.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StyledText {
    /// Plain text to shape
    pub text: String,
    /// Non-default style runs, sorted and non-overlapping
    pub spans: Vec<StyleSpan>,
    /// Byte ranges of characters flagged as keyboard accelerators
    pub accelerators: Vec<Range<usize>>,
    /// Draw a low underline under the accelerator characters
    pub show_accelerators: bool,
}

impl StyledText {
    /// Unstyled text with no accelerators
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// The first accelerator character, if any
    pub fn accelerator(&self) -> Option<char> {
        self.accelerators
            .first()
            .and_then(|range| self.text.get(range.clone()))
            .and_then(|s| s.chars().next())
    }

    /// Style in effect at byte offset `index`
    pub fn style_at(&self, index: usize) -> TextStyle {
        let mut style = self
            .spans
            .iter()
            .find(|span| span.range.contains(&index))
            .map(|span| span.style)
            .unwrap_or_default();
        if self.show_accelerators
            && self.accelerators.iter().any(|range| range.contains(&index))
        {
            style.underline = Underline::Low;
        }
        style
    }

    /// Whether any character is drawn with a non-default style
    pub fn has_styles(&self) -> bool {
        !self.spans.is_empty() || (self.show_accelerators && !self.accelerators.is_empty())
    }
}

/// A markup syntax error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Error at byte {offset}: {message}")]
pub struct MarkupError {
    /// Byte offset in the input where the error was detected
    pub offset: usize,
    pub message: String,
}

impl MarkupError {
    fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

/// Parse `input`, treating `accel_marker` (if any) as the accelerator marker.
pub fn parse_markup(input: &str, accel_marker: Option<char>) -> Result<StyledText, MarkupError> {
    let mut parser = Parser {
        input,
        out: StyledText::default(),
        stack: Vec::new(),
        style: TextStyle::default(),
        pending_accelerator: false,
    };
    parser.run(accel_marker)?;
    Ok(parser.out)
}

struct Parser<'a> {
    input: &'a str,
    out: StyledText,
    stack: Vec<(&'a str, TextStyle)>,
    style: TextStyle,
    pending_accelerator: bool,
}

impl<'a> Parser<'a> {
    fn run(&mut self, accel_marker: Option<char>) -> Result<(), MarkupError> {
        let input = self.input;
        let mut chars = input.char_indices().peekable();

        while let Some((offset, c)) = chars.next() {
            match c {
                '<' => {
                    let end = input[offset..]
                        .find('>')
                        .map(|len| offset + len)
                        .ok_or_else(|| MarkupError::new(offset, "unterminated tag"))?;
                    self.tag(offset, &input[offset + 1..end])?;
                    while chars.peek().is_some_and(|&(i, _)| i <= end) {
                        chars.next();
                    }
                }
                '&' => {
                    let end = input[offset..]
                        .find(';')
                        .map(|len| offset + len)
                        .ok_or_else(|| MarkupError::new(offset, "unterminated entity"))?;
                    let decoded = decode_entity(&input[offset..=end])
                        .ok_or_else(|| MarkupError::new(offset, "invalid entity"))?;
                    self.push_char(decoded);
                    while chars.peek().is_some_and(|&(i, _)| i <= end) {
                        chars.next();
                    }
                }
                c if Some(c) == accel_marker => {
                    if chars.peek().is_some_and(|&(_, next)| next == c) {
                        chars.next();
                        self.push_char(c);
                    } else {
                        self.pending_accelerator = true;
                    }
                }
                c => self.push_char(c),
            }
        }

        match self.stack.last() {
            Some((name, _)) => Err(MarkupError::new(
                input.len(),
                format!("unclosed tag <{}>", name),
            )),
            None => Ok(()),
        }
    }

    fn push_char(&mut self, c: char) {
        let start = self.out.text.len();
        self.out.text.push(c);
        let end = self.out.text.len();

        if std::mem::take(&mut self.pending_accelerator) {
            self.out.accelerators.push(start..end);
        }

        if self.style == TextStyle::default() {
            return;
        }
        match self.out.spans.last_mut() {
            Some(span) if span.style == self.style && span.range.end == start => {
                span.range.end = end;
            }
            _ => self.out.spans.push(StyleSpan {
                range: start..end,
                style: self.style,
            }),
        }
    }

    fn tag(&mut self, offset: usize, body: &'a str) -> Result<(), MarkupError> {
        if let Some(name) = body.strip_prefix('/') {
            let name = name.trim();
            return match self.stack.pop() {
                Some((open, previous)) if open == name => {
                    self.style = previous;
                    Ok(())
                }
                Some((open, _)) => Err(MarkupError::new(
                    offset,
                    format!("</{}> does not close <{}>", name, open),
                )),
                None => Err(MarkupError::new(offset, format!("unexpected </{}>", name))),
            };
        }

        let body = body.trim_end();
        let (name, attributes) = match body.find(char::is_whitespace) {
            Some(split) => (&body[..split], &body[split..]),
            None => (body, ""),
        };

        let mut style = self.style;
        match name {
            "b" => style.bold = true,
            "i" => style.italic = true,
            "u" => style.underline = Underline::Single,
            "s" => style.strikethrough = true,
            "span" => apply_span_attributes(offset, attributes, &mut style)?,
            "" => return Err(MarkupError::new(offset, "empty tag")),
            other => {
                return Err(MarkupError::new(offset, format!("unknown tag <{}>", other)));
            }
        }
        if name != "span" && !attributes.trim().is_empty() {
            return Err(MarkupError::new(
                offset,
                format!("<{}> does not take attributes", name),
            ));
        }

        self.stack.push((name, self.style));
        self.style = style;
        Ok(())
    }
}

fn apply_span_attributes(
    offset: usize,
    mut rest: &str,
    style: &mut TextStyle,
) -> Result<(), MarkupError> {
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return Ok(());
        }

        let eq = rest
            .find('=')
            .ok_or_else(|| MarkupError::new(offset, "attribute without value"))?;
        let name = rest[..eq].trim();
        let after = rest[eq + 1..].trim_start();
        let quote = after
            .chars()
            .next()
            .filter(|&q| q == '"' || q == '\'')
            .ok_or_else(|| MarkupError::new(offset, "attribute value must be quoted"))?;
        let close = after[1..]
            .find(quote)
            .ok_or_else(|| MarkupError::new(offset, "unterminated attribute value"))?;
        let value = &after[1..=close];
        rest = &after[close + 2..];

        let invalid = || {
            MarkupError::new(
                offset,
                format!("invalid value \"{}\" for attribute {}", value, name),
            )
        };
        match name {
            "weight" | "font_weight" => {
                style.bold = match value {
                    "bold" | "semibold" | "ultrabold" | "heavy" | "ultraheavy" => true,
                    "normal" | "light" | "ultralight" | "thin" | "book" | "medium" => false,
                    number => number.parse::<u16>().map_err(|_| invalid())? >= 600,
                };
            }
            "style" | "font_style" => {
                style.italic = match value {
                    "italic" | "oblique" => true,
                    "normal" => false,
                    _ => return Err(invalid()),
                };
            }
            "underline" => {
                style.underline = match value {
                    "none" => Underline::None,
                    "single" | "double" | "error" => Underline::Single,
                    "low" => Underline::Low,
                    _ => return Err(invalid()),
                };
            }
            "strikethrough" => {
                style.strikethrough = match value {
                    "true" => true,
                    "false" => false,
                    _ => return Err(invalid()),
                };
            }
            other => {
                return Err(MarkupError::new(
                    offset,
                    format!("unknown attribute {}", other),
                ));
            }
        }
    }
}

/// Decode one `&...;` entity.
fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "&lt;" => Some('<'),
        "&gt;" => Some('>'),
        "&amp;" => Some('&'),
        "&quot;" => Some('"'),
        "&apos;" => Some('\''),
        numeric if numeric.starts_with("&#") => {
            let decoded = html_escape::decode_html_entities(numeric);
            let mut chars = decoded.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c != '&' => Some(c),
                _ => None,
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        let styled = parse_markup("Hello, world", None).unwrap();
        assert_eq!(styled.text, "Hello, world");
        assert!(styled.spans.is_empty());
        assert!(styled.accelerators.is_empty());
    }

    #[test]
    fn tags_become_spans() {
        let styled = parse_markup("a <b>bold <i>both</i></b> c", None).unwrap();
        assert_eq!(styled.text, "a bold both c");
        assert_eq!(styled.spans.len(), 2);
        assert_eq!(styled.spans[0].range, 2..7);
        assert!(styled.spans[0].style.bold && !styled.spans[0].style.italic);
        assert_eq!(styled.spans[1].range, 7..11);
        assert!(styled.spans[1].style.bold && styled.spans[1].style.italic);
        assert_eq!(styled.style_at(0), TextStyle::default());
    }

    #[test]
    fn span_attributes() {
        let styled = parse_markup(
            "<span weight=\"700\" underline='single' strikethrough=\"true\">x</span>",
            None,
        )
        .unwrap();
        let style = styled.style_at(0);
        assert!(style.bold);
        assert_eq!(style.underline, Underline::Single);
        assert!(style.strikethrough);
        assert!(!style.italic);
    }

    #[test]
    fn entities_are_decoded() {
        let styled = parse_markup("&lt;a&gt; &amp; &#65;&#x42;", None).unwrap();
        assert_eq!(styled.text, "<a> & AB");
    }

    #[test]
    fn accelerator_marks_next_character() {
        let styled = parse_markup("_Save", Some('_')).unwrap();
        assert_eq!(styled.text, "Save");
        assert_eq!(styled.accelerator(), Some('S'));
        assert_eq!(styled.style_at(0).underline, Underline::None);

        let shown = StyledText {
            show_accelerators: true,
            ..styled
        };
        assert_eq!(shown.style_at(0).underline, Underline::Low);
        assert_eq!(shown.style_at(1).underline, Underline::None);
    }

    #[test]
    fn doubled_marker_is_literal() {
        let styled = parse_markup("__Save", Some('_')).unwrap();
        assert_eq!(styled.text, "_Save");
        assert_eq!(styled.accelerator(), None);
    }

    #[test]
    fn marker_is_plain_without_accelerators() {
        let styled = parse_markup("_Save", None).unwrap();
        assert_eq!(styled.text, "_Save");
    }

    #[test]
    fn malformed_markup_is_rejected() {
        for bad in [
            "<b>open",
            "close</b>",
            "<b>x</i>",
            "<blink>x</blink>",
            "a < b",
            "Tom & Jerry",
            "&bogus;",
            "<span colour=\"red\">x</span>",
            "<span weight=bold>x</span>",
            "<b class=\"x\">y</b>",
        ] {
            assert!(parse_markup(bad, None).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn error_reports_offset() {
        let err = parse_markup("ok <nope>", None).unwrap_err();
        assert_eq!(err.offset, 3);
        assert!(err.to_string().contains("nope"));
    }
}
