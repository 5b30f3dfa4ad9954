//! Measure text with the system fonts
//!
//! Prints the view-space extents of each argument at a few pixel sizes,
//! rendering into in-memory textures instead of a GPU.
//!
//! Run with: cargo run -p glint_text --example measure_text -- "Hello, world"

use glint_text::headless::HeadlessBackend;
use glint_text::{DisplayText, FontSet, Layout, SystemFonts};

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let mut fonts = FontSet::new(SystemFonts::new(), HeadlessBackend::new());
    let texts: Vec<String> = std::env::args().skip(1).collect();
    let texts = if texts.is_empty() {
        vec!["The quick brown fox jumps over the lazy dog".to_string()]
    } else {
        texts
    };

    for size in [12, 14, 18] {
        let mut font = fonts.get(size);
        for text in &texts {
            let wrapped = DisplayText::new(text.as_str(), Layout::new().with_width(200));
            println!(
                "{size:>3}px  {:>4} wide  {:>4}x{:<4} wrapped  {:?}",
                font.width(text),
                font.formatted_width(&wrapped),
                font.formatted_height(&wrapped),
                text
            );
        }
    }
}
