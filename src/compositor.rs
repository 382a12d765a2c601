// src/compositor.rs - style selection, text measurement and canvas composition

use image::imageops::FilterType;
use image::Rgb;
use rand::seq::IndexedRandom;
use rand::Rng;

use crate::canvas::{generate_light_background, parse_hex_color, Canvas, ColorMode};
use crate::config::{Config, FontWeight, RunProperties};
use crate::fonts::Face;

/// Font and color selections for one label
#[derive(Debug, Clone, PartialEq)]
pub struct LabelStyle {
    pub font_family: String,
    pub font_size: u32,
    pub font_weight: FontWeight,
    pub text_color: String,
}

impl LabelStyle {
    /// Draw a style; `families` is the run's family pool
    pub fn sample<R: Rng + ?Sized>(config: &Config, families: &[String], rng: &mut R) -> Self {
        let font_family = families.choose(rng).cloned().unwrap_or_default();
        let variation = config.font_size_variation as i64;
        let font_size = (config.base_font_size as i64 + rng.random_range(-variation..=variation))
            .max(1) as u32;
        let font_weight = config
            .font_weights
            .choose(rng)
            .copied()
            .unwrap_or(FontWeight::Normal);
        let text_color = config
            .text_colors
            .choose(rng)
            .cloned()
            .unwrap_or_else(|| "#000000".to_string());

        LabelStyle {
            font_family,
            font_size,
            font_weight,
            text_color,
        }
    }

    pub fn text_rgb(&self) -> Rgb<u8> {
        parse_hex_color(&self.text_color).unwrap_or(Rgb([0, 0, 0]))
    }
}

/// Background decision, made once per label and authoritative downstream
#[derive(Debug, Clone, PartialEq)]
pub struct Background {
    /// Generated even for transparent labels; used as rotation fill reference and export fill
    pub color: String,
    pub mode: ColorMode,
}

impl Background {
    pub fn sample<R: Rng + ?Sized>(config: &Config, rng: &mut R) -> Self {
        let color = generate_light_background(config.min_background_brightness, rng);
        let mode = if rng.random::<f64>() < config.transparent_bg_prob {
            ColorMode::Alpha
        } else {
            ColorMode::Opaque
        };

        Background { color, mode }
    }

    pub fn rgb(&self) -> Rgb<u8> {
        parse_hex_color(&self.color).unwrap_or(Rgb([255, 255, 255]))
    }

    /// Value recorded in the label metadata
    pub fn label(&self) -> String {
        match self.mode {
            ColorMode::Alpha => "transparent".to_string(),
            ColorMode::Opaque => self.color.clone(),
        }
    }
}

/// Largest size with the aspect ratio of `width` x `height` that fits inside the target box
pub fn fit_within(width: u32, height: u32, target_width: u32, target_height: u32) -> (u32, u32) {
    let aspect = width as f64 / height.max(1) as f64;
    let target_aspect = target_width as f64 / target_height.max(1) as f64;

    if aspect > target_aspect {
        let new_height = (target_width as f64 / aspect) as u32;
        (target_width.max(1), new_height.max(1))
    } else {
        let new_width = (target_height as f64 * aspect) as u32;
        (new_width.max(1), target_height.max(1))
    }
}

/// Render `text` onto a fresh canvas in the background's mode.
///
/// With a run target size the empty canvas is fitted to the target box first and the text is
/// then drawn at its native size, so `style.font_size` is the size of the rendered glyphs.
pub fn compose(
    text: &str,
    style: &LabelStyle,
    face: &Face,
    background: &Background,
    padding: u32,
    properties: &RunProperties,
) -> Canvas {
    let font_size = style.font_size as f32;
    let bounds = face.measure(font_size, text);

    let width = (bounds.width + 2 * padding).max(1);
    let height = (bounds.height + 2 * padding).max(1);
    let mut canvas = Canvas::new(background.mode, width, height, background.rgb());

    if let Some((target_width, target_height)) = properties.target_size {
        let (new_width, new_height) = fit_within(width, height, target_width, target_height);
        canvas = canvas.resize(new_width, new_height, FilterType::Lanczos3);
    }

    // Offset by the bearings so overshooting glyphs stay inside the padding
    let x = padding as i32 - bounds.left;
    let y = padding as i32 - bounds.top;
    face.draw(&mut canvas, style.text_rgb(), x, y, font_size, text);

    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn builtin() -> Face {
        Face::Builtin {
            bold: false,
            italic: false,
        }
    }

    fn style() -> LabelStyle {
        LabelStyle {
            font_family: "DejaVu Sans".to_string(),
            font_size: 24,
            font_weight: FontWeight::Normal,
            text_color: "#000000".to_string(),
        }
    }

    #[test]
    fn fit_keeps_aspect_on_limiting_axis() {
        assert_eq!(fit_within(200, 100, 300, 300), (300, 150));
        assert_eq!(fit_within(100, 200, 300, 300), (150, 300));
        assert_eq!(fit_within(400, 100, 200, 100), (200, 50));
    }

    #[test]
    fn canvas_is_text_plus_padding() {
        let face = builtin();
        let bounds = face.measure(24.0, "23");
        let background = Background {
            color: "#eeeeee".to_string(),
            mode: ColorMode::Opaque,
        };
        let canvas = compose("23", &style(), &face, &background, 20, &RunProperties { target_size: None });
        assert_eq!(canvas.dimensions(), (bounds.width + 40, bounds.height + 40));
        assert_eq!(canvas.mode(), ColorMode::Opaque);

        if let Canvas::Rgb(img) = canvas {
            assert_eq!(img.get_pixel(0, 0), &Rgb([0xee, 0xee, 0xee]));
            assert_eq!(img.get_pixel(20, 20 + 3), &Rgb([0, 0, 0]));
        }
    }

    #[test]
    fn transparent_canvas_stays_alpha_through_resize() {
        let background = Background {
            color: "#eeeeee".to_string(),
            mode: ColorMode::Alpha,
        };
        let props = RunProperties {
            target_size: Some((300, 150)),
        };
        let canvas = compose("10", &style(), &builtin(), &background, 20, &props);
        assert_eq!(canvas.mode(), ColorMode::Alpha);
        let (w, h) = canvas.dimensions();
        assert!(w <= 300 && h <= 150);
        assert!(w == 300 || h == 150);

        let alpha = canvas.alpha().unwrap();
        assert_eq!(alpha.get_pixel(0, 0)[0], 0);
        assert!(alpha.pixels().any(|p| p[0] > 0));
    }

    #[test]
    fn fitted_canvas_draws_text_at_native_size() {
        let face = builtin();
        let bounds = face.measure(24.0, "10");
        let background = Background {
            color: "#eeeeee".to_string(),
            mode: ColorMode::Alpha,
        };
        let props = RunProperties {
            target_size: Some((400, 200)),
        };
        let canvas = compose("10", &style(), &face, &background, 20, &props);
        let (w, h) = canvas.dimensions();
        assert!(w <= 400 && h <= 200);
        assert!(w > bounds.width + 40 || h > bounds.height + 40);

        let alpha = canvas.alpha().unwrap();
        let ink_rows: Vec<u32> = (0..h)
            .filter(|&y| (0..w).any(|x| alpha.get_pixel(x, y)[0] > 0))
            .collect();
        let ink_height = ink_rows.last().unwrap() - ink_rows.first().unwrap() + 1;
        assert_eq!(ink_height, bounds.height);
        assert_eq!(*ink_rows.first().unwrap(), 20);
    }

    #[test]
    fn zero_transparency_probability_never_goes_transparent() {
        let config = Config {
            transparent_bg_prob: 0.0,
            ..Config::default()
        };
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(21);
        for _ in 0..100 {
            let bg = Background::sample(&config, &mut rng);
            assert_eq!(bg.mode, ColorMode::Opaque);
            assert!(bg.label().starts_with('#'));
        }
    }

    #[test]
    fn sampled_style_stays_in_range() {
        let config = Config::default();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(8);
        for _ in 0..100 {
            let s = LabelStyle::sample(&config, &config.font_families, &mut rng);
            assert!((18..=30).contains(&s.font_size));
            assert!(config.font_families.contains(&s.font_family));
            assert!(config.text_colors.contains(&s.text_color));
        }
    }
}
