use glint_text::headless::{HeadlessBackend, HeadlessTexture, MonospaceContext, MonospaceEngine};
use glint_text::preprocess::{prepare, AcceleratorMode};
use glint_text::{
    Color, DisplayText, DrawingSettings, Font, FontSet, Layout, Point, ShapingEngine, TextConfig,
};

type TestFont = Font<MonospaceContext, HeadlessTexture>;

fn font_set() -> FontSet<MonospaceEngine, HeadlessBackend> {
    FontSet::new(MonospaceEngine::new(), HeadlessBackend::new())
}

fn sized_font(size: i32) -> TestFont {
    let mut font = Font::new(MonospaceEngine::new().create_context());
    font.set_pixel_size(size);
    font
}

#[test]
fn identical_text_reuses_its_texture() {
    let mut fonts = font_set();
    let text = DisplayText::new("Hello world", Layout::new().with_width(200));
    {
        let mut font = fonts.get(20);
        font.draw(&text, Point::new(0.0, 0.0), Color::WHITE);
        font.draw(&text, Point::new(40.0, 8.0), Color::WHITE);
    }
    let draws = fonts.backend_mut().take_draws();
    assert_eq!(draws.len(), 2);
    assert_eq!(draws[0].texture, draws[1].texture);
    assert_eq!(draws[0].quad.size, draws[1].quad.size);
    assert_eq!(fonts.backend().created, 1);

    let wider = DisplayText::new("Hello world", Layout::new().with_width(201));
    let mut font = fonts.get(20);
    assert_eq!(font.formatted_width(&wider), font.formatted_width(&text));
    assert_eq!(font.font().cache().len(), 2);
    drop(font);
    assert_eq!(fonts.backend().created, 2);
}

#[test]
fn measured_extents_match_the_sprite() {
    let mut fonts = font_set();
    let mut font = fonts.get(20);
    assert_eq!(font.width("abc"), 30);
    assert_eq!(font.height(), 20);
    assert_eq!(
        font.formatted_bounds(&DisplayText::plain("abc\nde")),
        Point::new(30.0, 40.0)
    );
}

#[test]
fn draw_positions_are_converted_to_raw_pixels() {
    let mut fonts = font_set();
    fonts.get(20).draw_str("abc", Point::new(10.0, 5.0), Color::WHITE);
    fonts.set_zoom(200);
    fonts.get(20).draw_str("abc", Point::new(10.0, 5.0), Color::WHITE);

    let draws = fonts.backend_mut().take_draws();
    assert_eq!(draws[0].quad.center, [25.0, 15.0]);
    assert_eq!(draws[0].quad.size, [30.0, 20.0]);
    assert_eq!(draws[1].quad.center, [50.0, 30.0]);
    assert_eq!(draws[1].quad.size, [60.0, 40.0]);
}

#[test]
fn aliased_draws_keep_subpixel_positions() {
    let mut fonts = font_set();
    {
        let mut font = fonts.get(20);
        font.draw_str("abc", Point::new(10.5, 5.25), Color::WHITE);
        font.draw_aliased_str("abc", Point::new(10.5, 5.25), Color::WHITE);
    }
    let draws = fonts.backend_mut().take_draws();
    assert_eq!(draws[0].quad.center, [25.0, 15.0]);
    assert_eq!(draws[1].quad.center, [25.5, 15.25]);
}

#[test]
fn empty_text_draws_nothing() {
    let mut fonts = font_set();
    {
        let mut font = fonts.get(20);
        font.draw_str("", Point::default(), Color::WHITE);
        assert_eq!(font.width(""), 0);
        assert_eq!(font.formatted_height(&DisplayText::plain("")), 0);
    }
    assert!(fonts.backend().draws.is_empty());
    assert_eq!(fonts.backend().created, 0);
}

#[test]
fn unsized_font_renders_nothing() {
    let mut font = Font::<MonospaceContext, HeadlessTexture>::new(
        MonospaceEngine::new().create_context(),
    );
    let mut backend = HeadlessBackend::new();
    let result = font.render(&mut backend, &DisplayText::plain("abc"), false);
    assert!(result.texture.is_none());
    assert_eq!(font.formatted_width(&mut backend, &DisplayText::plain("abc"), false), 0);
    assert_eq!(backend.created, 0);
}

#[test]
fn surface_growth_matches_a_presized_surface() {
    let line = "0123456789".repeat(6);
    let text = DisplayText::plain(vec![line; 30].join("\n"));
    let mut backend = HeadlessBackend::new();
    let mut font = sized_font(20);

    let grown = font.render(&mut backend, &text, false);
    assert!(font.surface().width() >= 600);
    assert!(font.surface().height() >= 600);
    let grown_pixels = font
        .cache()
        .texture(grown.texture.expect("texture"))
        .expect("resident")
        .image
        .clone();

    // Same settings again: the cache is cleared but the surface keeps its size.
    let settings = font.drawing_settings().clone();
    font.set_drawing_settings(settings);
    let presized = font.render(&mut backend, &text, false);
    let presized_pixels = &font
        .cache()
        .texture(presized.texture.expect("texture"))
        .expect("resident")
        .image;

    assert_eq!((grown.width, grown.height), (600, 600));
    assert_eq!(&grown_pixels, presized_pixels);
    assert!(font.surface().is_clear());
}

#[test]
fn settings_change_recycles_textures() {
    let text = DisplayText::plain("Status");
    let mut backend = HeadlessBackend::new();
    let mut font = sized_font(20);

    let before = font.render(&mut backend, &text, false);
    font.set_drawing_settings(DrawingSettings {
        description: "Noto Sans".to_string(),
        line_height_scale: 1.5,
        ..DrawingSettings::default()
    });
    let after = font.render(&mut backend, &text, false);

    assert_ne!(before.texture, after.texture);
    assert_eq!(backend.created, 1);
    assert_eq!(backend.updated, 1);
    let key = before.texture.expect("texture");
    assert!(font.cache().texture(key).is_none());

    let mut reference_backend = HeadlessBackend::new();
    let mut reference = sized_font(20);
    let expected = reference.render(&mut reference_backend, &text, false);
    let expected = &reference
        .cache()
        .texture(expected.texture.expect("texture"))
        .expect("resident")
        .image;
    let actual = &font
        .cache()
        .texture(after.texture.expect("texture"))
        .expect("resident")
        .image;
    assert_eq!(actual, expected);
}

#[test]
fn ink_outside_the_sprite_never_reaches_later_renders() {
    let mut backend = HeadlessBackend::new();
    let mut font = sized_font(20);

    // The underlined space hanging at the wrap point lies past the 70px sprite.
    let wrapped = DisplayText::new("<u>aaa bbb ccc</u>", Layout::new().with_width(75));
    let first = font.render(&mut backend, &wrapped, false);
    assert_eq!((first.width, first.height), (70, 40));
    assert!(font.surface().is_clear());

    let plain = DisplayText::plain("xxxxxxxxxx");
    let second = font.render(&mut backend, &plain, false);
    let actual = &font
        .cache()
        .texture(second.texture.expect("texture"))
        .expect("resident")
        .image;

    let mut reference_backend = HeadlessBackend::new();
    let mut reference = sized_font(20);
    let expected = reference.render(&mut reference_backend, &plain, false);
    let expected = &reference
        .cache()
        .texture(expected.texture.expect("texture"))
        .expect("resident")
        .image;
    assert_eq!(actual, expected);
    assert_eq!(actual.pixels[(17 * actual.width + 75) as usize], 0);
}

#[test]
fn blank_lines_still_take_up_space() {
    let mut fonts = font_set();
    {
        let mut font = fonts.get(20);
        assert_eq!(font.formatted_height(&DisplayText::plain("a\n")), 40);
        assert_eq!(font.formatted_height(&DisplayText::plain("\n")), 40);
        assert_eq!(font.formatted_height(&DisplayText::plain("\n\n")), 60);
        assert_eq!(font.formatted_width(&DisplayText::plain("\n")), 0);
        font.draw_str("\n", Point::default(), Color::WHITE);
    }
    assert!(fonts.backend().draws.is_empty());
    assert_eq!(fonts.backend().created, 1);
}

#[test]
fn doubled_underscore_is_a_literal() {
    let mut fonts = font_set();
    let mut font = fonts.get(20);
    assert_eq!(font.width("__Save"), 50);
    assert_eq!(font.width("_Save"), 40);

    let styled = prepare("_Save", AcceleratorMode::Strip);
    assert_eq!(styled.text, "Save");
    assert_eq!(styled.accelerator(), Some('S'));
}

#[test]
fn revealed_accelerators_are_underlined() {
    let mut backend = HeadlessBackend::new();
    let mut font = sized_font(20);
    let text = DisplayText::plain("_Save");

    let hidden = font.render(&mut backend, &text, false);
    let shown = font.render(&mut backend, &text, true);
    assert_eq!(hidden.height, 20);
    assert_eq!(shown.height, 24);
    assert_ne!(hidden.texture, shown.texture);

    let image = &font
        .cache()
        .texture(shown.texture.expect("texture"))
        .expect("resident")
        .image;
    let at = |x: u32, y: u32| image.pixels[(y * image.width + x) as usize];
    assert_eq!(at(2, 18), 255);
    assert_eq!(at(12, 18), 0);
}

#[test]
fn paragraph_break_adds_exactly_its_height() {
    let mut fonts = font_set();
    let mut font = fonts.get(20);
    let natural = font.formatted_height(&DisplayText::plain("ab\ncd"));
    let zero = font.formatted_height(&DisplayText::new(
        "ab\ncd",
        Layout::new().with_paragraph_break(0),
    ));
    let seven = font.formatted_height(&DisplayText::new(
        "ab\ncd",
        Layout::new().with_paragraph_break(7),
    ));
    assert_eq!(natural, 40);
    assert_eq!(zero, natural);
    assert_eq!(seven, natural + 7);
}

#[test]
fn fixed_line_height_spaces_wrapped_lines() {
    let mut fonts = font_set();
    let mut font = fonts.get(20);
    let layout = Layout::new().with_width(45).with_line_height(30);
    assert_eq!(font.formatted_height(&DisplayText::new("aaa bbb ccc", layout)), 80);
}

#[test]
fn default_spacing_follows_drawing_settings() {
    let mut fonts = font_set();
    let font = fonts.get(20);
    assert_eq!(font.line_height(&Layout::new()), 24);
    assert_eq!(font.paragraph_break(&Layout::new()), 8);
    assert_eq!(font.line_height(&Layout::new().with_line_height(31)), 31);
    assert_eq!(font.paragraph_break(&Layout::new().with_paragraph_break(3)), 3);
}

#[test]
fn zoom_change_rerenders_at_the_new_resolution() {
    let mut fonts = font_set();
    let text = DisplayText::plain("abc");
    assert_eq!(fonts.get(20).formatted_width(&text), 30);

    fonts.set_zoom(150);
    assert_eq!(fonts.get(20).formatted_width(&text), 30);
    assert_eq!(fonts.backend().created, 1);
    assert_eq!(fonts.backend().updated, 1);
}

#[test]
fn cache_compaction_recycles_unused_sprites() {
    let config = TextConfig::from_toml_str("cache_update_interval = 2").expect("config");
    let mut fonts = FontSet::from_config(MonospaceEngine::new(), HeadlessBackend::new(), config);
    fonts.get(20).draw_str("old", Point::default(), Color::WHITE);
    for _ in 0..4 {
        fonts.step();
    }
    assert_eq!(fonts.get(20).font().cache().len(), 0);

    fonts.get(20).draw_str("new", Point::default(), Color::WHITE);
    assert_eq!(fonts.backend().created, 1);
    assert_eq!(fonts.backend().updated, 1);
}

#[test]
fn font_dirs_are_registered_with_the_engine() {
    let dir = std::env::temp_dir().join(format!("glint_text_fonts_{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("temp dir");
    std::fs::write(dir.join("a.ttf"), b"").expect("write");
    std::fs::write(dir.join("b.OTF"), b"").expect("write");
    std::fs::write(dir.join("readme.txt"), b"").expect("write");

    let mut fonts = font_set();
    let added = fonts.add(&dir).expect("add");
    std::fs::remove_dir_all(&dir).ok();

    assert_eq!(added, 2);
    assert_eq!(fonts.engine().font_files(), 2);
}
