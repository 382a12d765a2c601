// src/vintage.rs - aged-print look: blur, paper texture, sepia, grain and dimming

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use imageproc::filter::gaussian_blur_f32;
use imageproc::noise::gaussian_noise_mut;
use rand::RngCore;

use crate::canvas::Canvas;
use crate::config::Config;
use crate::effects::EffectChain;
use crate::errors::{LabelSynthError, Result};

const BLUR_PROBABILITY: f64 = 0.8;
const TEXTURE_PROBABILITY: f64 = 0.6;
const SEPIA_PROBABILITY: f64 = 0.7;
const NOISE_PROBABILITY: f64 = 0.5;

/// Weight of the paper texture when blended over the label
const TEXTURE_WEIGHT: f32 = 0.1;

/// Load the paper texture once per run; failures only disable the texture stage
pub fn load_texture(path: Option<&str>) -> Option<GrayImage> {
    let path = path?;
    match image::open(path) {
        Ok(img) => {
            log::info!("Loaded texture {}", path);
            Some(img.to_luma8())
        }
        Err(e) => {
            log::warn!("Texture {} unavailable, texture overlay disabled: {}", path, e);
            None
        }
    }
}

pub fn blur(image: &RgbImage, sigma: f32) -> RgbImage {
    if sigma <= 0.0 {
        return image.clone();
    }
    gaussian_blur_f32(image, sigma)
}

/// Blend a grayscale texture, stretched to the image size, over every channel
pub fn overlay_texture(mut image: RgbImage, texture: &GrayImage) -> Result<RgbImage> {
    if texture.width() == 0 || texture.height() == 0 {
        return Err(LabelSynthError::Effect {
            effect: "texture",
            reason: "empty texture".to_string(),
        });
    }

    let (width, height) = image.dimensions();
    let texture = imageops::resize(texture, width, height, FilterType::Triangle);

    for (x, y, px) in image.enumerate_pixels_mut() {
        let t = texture.get_pixel(x, y)[0] as f32;
        for c in 0..3 {
            let v = (1.0 - TEXTURE_WEIGHT) * px[c] as f32 + TEXTURE_WEIGHT * t;
            px[c] = v.round().clamp(0.0, 255.0) as u8;
        }
    }

    Ok(image)
}

/// Sepia toning, warmer on the diagonal as intensity grows
pub fn sepia(mut image: RgbImage, intensity: f32) -> RgbImage {
    let boost = 0.1 * intensity;
    let matrix = [
        [0.393 + boost, 0.769, 0.189],
        [0.349, 0.686 + boost, 0.168],
        [0.272, 0.534, 0.131 + boost],
    ];

    for px in image.pixels_mut() {
        let (r, g, b) = (px[0] as f32, px[1] as f32, px[2] as f32);
        for (c, row) in matrix.iter().enumerate() {
            let v = row[0] * r + row[1] * g + row[2] * b;
            px[c] = v.clamp(0.0, 255.0) as u8;
        }
    }

    image
}

pub fn add_noise(mut image: RgbImage, sigma: f64, seed: u64) -> RgbImage {
    if sigma > 0.0 {
        gaussian_noise_mut(&mut image, 0.0, sigma, seed);
    }
    image
}

/// Scale every channel by `factor` (below 1 darkens)
pub fn adjust_brightness(mut image: RgbImage, factor: f32) -> RgbImage {
    for px in image.pixels_mut() {
        for c in 0..3 {
            px[c] = (px[c] as f32 * factor).round().clamp(0.0, 255.0) as u8;
        }
    }
    image
}

/// The vintage stages in application order
pub fn vintage_chain<'a>(intensity: f64, blur_intensity: f64, texture: Option<&'a GrayImage>) -> EffectChain<'a> {
    let i = intensity as f32;

    EffectChain::new()
        .stage("blur", BLUR_PROBABILITY, move |img, _, _| {
            Ok(blur(&img, (blur_intensity * intensity) as f32))
        })
        .stage("texture", TEXTURE_PROBABILITY, move |img, _, _| match texture {
            Some(texture) => overlay_texture(img, texture),
            None => Ok(img),
        })
        .stage("sepia", SEPIA_PROBABILITY, move |img, _, _| Ok(sepia(img, i)))
        .stage("noise", NOISE_PROBABILITY, move |img, _, rng| {
            Ok(add_noise(img, 20.0 * intensity, rng.next_u64()))
        })
        .stage("brightness", 1.0, move |img, _, _| {
            Ok(adjust_brightness(img, 1.0 - 0.2 * i))
        })
}

/// Apply the vintage stages to the color channels; on failure the input comes back unchanged
pub fn apply_vintage_effects(
    canvas: Canvas,
    config: &Config,
    texture: Option<&GrayImage>,
    rng: &mut dyn RngCore,
) -> Canvas {
    let chain = vintage_chain(config.vintage_intensity, config.blur_intensity, texture);
    let original = canvas.clone();

    let result = canvas.map_rgb(|rgb, mask| chain.apply(rgb, mask, rng).map(|(img, _)| img));
    match result {
        Ok(canvas) => canvas,
        Err(e) => {
            log::warn!("Vintage effects failed, keeping the plain label: {}", e);
            original
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::ColorMode;
    use image::{Luma, Rgb, Rgba, RgbaImage};
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn sepia_of_white_saturates() {
        let out = sepia(RgbImage::from_pixel(1, 1, Rgb([255, 255, 255])), 0.0);
        // 0.272 + 0.534 + 0.131 = 0.937
        assert_eq!(out.get_pixel(0, 0), &Rgb([255, 255, 238]));
    }

    #[test]
    fn brightness_scales_channels() {
        let out = adjust_brightness(RgbImage::from_pixel(1, 1, Rgb([200, 100, 10])), 0.5);
        assert_eq!(out.get_pixel(0, 0), &Rgb([100, 50, 5]));
    }

    #[test]
    fn texture_blend_weights() {
        let texture = GrayImage::from_pixel(3, 3, Luma([0]));
        let out = overlay_texture(RgbImage::from_pixel(6, 4, Rgb([200, 100, 50])), &texture).unwrap();
        assert_eq!(out.dimensions(), (6, 4));
        assert_eq!(out.get_pixel(5, 3), &Rgb([180, 90, 45]));
    }

    #[test]
    fn zero_sigma_blur_is_identity() {
        let img = RgbImage::from_fn(4, 4, |x, y| Rgb([(x * 60) as u8, (y * 60) as u8, 0]));
        assert_eq!(blur(&img, 0.0), img);
    }

    #[test]
    fn vintage_keeps_alpha_and_mode() {
        let img = RgbaImage::from_fn(12, 8, |x, _| Rgba([30, 30, 30, if x < 6 { 255 } else { 0 }]));
        let canvas = Canvas::Rgba(img);
        let alpha = canvas.alpha().unwrap();

        let config = Config {
            vintage_intensity: 1.0,
            ..Config::default()
        };
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        let out = apply_vintage_effects(canvas, &config, None, &mut rng);

        assert_eq!(out.mode(), ColorMode::Alpha);
        assert_eq!(out.alpha().unwrap(), alpha);
    }

    #[test]
    fn brightness_always_runs() {
        let config = Config {
            vintage_intensity: 1.0,
            blur_intensity: 0.0,
            ..Config::default()
        };
        let canvas = Canvas::Rgb(RgbImage::from_pixel(4, 4, Rgb([255, 255, 255])));
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(9);
        let chain = vintage_chain(config.vintage_intensity, config.blur_intensity, None);
        assert_eq!(chain.names().last(), Some(&"brightness"));

        let out = apply_vintage_effects(canvas, &config, None, &mut rng);
        if let Canvas::Rgb(img) = out {
            assert!(img.pixels().all(|p| p[0] < 255));
        }
    }

    #[test]
    fn failed_chain_returns_input_unchanged() {
        let config = Config {
            vintage_intensity: 1.0,
            ..Config::default()
        };
        let empty = GrayImage::new(0, 0);
        let rgb = RgbImage::from_fn(10, 6, |x, y| Rgb([(x * 20) as u8, (y * 30) as u8, 90]));
        let input = Canvas::Rgb(rgb.clone());
        let chain = vintage_chain(config.vintage_intensity, config.blur_intensity, Some(&empty));
        let mut failures = 0;

        for seed in 0..32 {
            let mut replay = Xoshiro256PlusPlus::seed_from_u64(seed);
            let fails = chain.apply(rgb.clone(), None, &mut replay).is_err();

            let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
            let out = apply_vintage_effects(input.clone(), &config, Some(&empty), &mut rng);
            if fails {
                failures += 1;
                assert_eq!(out, input);
            } else {
                assert_ne!(out, input);
            }
        }

        assert!(failures > 0);
    }

    #[test]
    fn missing_texture_file_is_ignored() {
        assert!(load_texture(Some("/no/such/texture.png")).is_none());
        assert!(load_texture(None).is_none());
    }
}
