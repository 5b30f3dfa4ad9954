//! Presentation-only text transforms applied before shaping
//!
//! 1. Straight quotes become curly quotes (markup tags are left alone) and
//!    stray `&` characters are escaped.
//! 2. Keyboard accelerator markers (`_`) are either revealed as low
//!    underlines or stripped.
//! 3. The result is parsed as markup; malformed markup is logged and the
//!    text is shown without markup instead.

use crate::markup::{parse_markup, StyledText};

/// Marker character for keyboard accelerators
pub const ACCELERATOR_MARKER: char = '_';

/// Character references left untouched by [`replace_characters`]
const ACCEPTABLE_REFERENCES: [&str; 3] = ["gt;", "lt;", "amp;"];

/// How keyboard accelerator markers are presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AcceleratorMode {
    /// Underline the marked characters
    Reveal,
    /// Hide the markers
    #[default]
    Strip,
}

impl AcceleratorMode {
    pub fn from_show_underlines(show: bool) -> Self {
        if show {
            Self::Reveal
        } else {
            Self::Strip
        }
    }
}

/// Run the whole preprocessing chain. Never fails.
pub fn prepare(text: &str, mode: AcceleratorMode) -> StyledText {
    let replaced = replace_characters(text);
    match parse_markup(&replaced, Some(ACCELERATOR_MARKER)) {
        Ok(mut styled) => {
            styled.show_accelerators = mode == AcceleratorMode::Reveal;
            styled
        }
        Err(err) => {
            tracing::warn!("Markup error in {:?}: {}", text, err);
            StyledText::plain(remove_accelerator(&replaced))
        }
    }
}

/// Replace straight quotes with curly ones and escape `&` except for the
/// references markup needs (`&lt;`, `&gt;`, `&amp;`).
///
/// A quote opens after whitespace or at the start of the string and closes
/// anywhere else. Characters inside `<...>` are copied unchanged.
pub fn replace_characters(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut after_whitespace = true;
    let mut in_tag = false;

    for (offset, c) in text.char_indices() {
        if in_tag {
            if c == '>' {
                in_tag = false;
            }
            out.push(c);
            continue;
        }

        match c {
            '\'' => out.push(if after_whitespace { '\u{2018}' } else { '\u{2019}' }),
            '"' => out.push(if after_whitespace { '\u{201C}' } else { '\u{201D}' }),
            '&' => {
                out.push('&');
                let rest = &text[offset + 1..];
                if !ACCEPTABLE_REFERENCES.iter().any(|r| rest.starts_with(r)) {
                    out.push_str("amp;");
                }
            }
            c => out.push(c),
        }
        after_whitespace = c.is_whitespace();
        in_tag = c == '<';
    }
    out
}

/// Remove accelerator markers outside of tags; a doubled marker leaves one
/// literal marker behind.
pub fn remove_accelerator(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    let mut after_marker = false;

    for c in text.chars() {
        let escaped = std::mem::take(&mut after_marker);
        if in_tag {
            out.push(c);
            in_tag = c != '>';
        } else if c == '<' {
            out.push(c);
            in_tag = true;
        } else if c != ACCELERATOR_MARKER || escaped {
            out.push(c);
        } else {
            after_marker = true;
        }
    }
    out
}

/// Return `text` unchanged if it parses as markup; otherwise return it with
/// quotes replaced and `<` / `>` escaped so that it will parse.
///
/// Meant for strings from data files or user input that get embedded in
/// markup-bearing UI text.
pub fn escape_markup_has_error(text: &str) -> String {
    let replaced = replace_characters(text);
    if parse_markup(&replaced, Some(ACCELERATOR_MARKER)).is_ok() {
        return text.to_string();
    }

    let mut out = String::with_capacity(replaced.len());
    for c in replaced.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

/// Escape `&`, `<` and `>` as character references.
pub fn escape_markup(raw: &str) -> String {
    html_escape::encode_text(raw).into_owned()
}

/// Reverse [`escape_markup`]. Only complete `&amp;`, `&lt;` and `&gt;`
/// references are decoded.
pub fn unescape_markup(escaped: &str) -> String {
    const REFERENCES: [(&str, char); 3] = [("&amp;", '&'), ("&lt;", '<'), ("&gt;", '>')];

    let mut out = String::with_capacity(escaped.len());
    let mut rest = escaped;
    while let Some(offset) = rest.find('&') {
        out.push_str(&rest[..offset]);
        rest = &rest[offset..];
        match REFERENCES.iter().find(|(r, _)| rest.starts_with(r)) {
            Some((reference, c)) => {
                out.push(*c);
                rest = &rest[reference.len()..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
