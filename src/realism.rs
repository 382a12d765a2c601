// src/realism.rs - capture artifacts: resampling, JPEG, misregistration, gamma, grid, rank filters

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{GrayImage, ImageFormat, Rgb, RgbImage};
use rand::seq::IndexedRandom;
use rand::{Rng, RngCore};

use crate::canvas::Canvas;
use crate::effects::EffectChain;
use crate::errors::Result;

const SCALING_FILTERS: [FilterType; 3] = [FilterType::Nearest, FilterType::Triangle, FilterType::CatmullRom];

const GRID_COLOR: Rgb<u8> = Rgb([0xee, 0xee, 0xee]);
const SPECK_COLOR: Rgb<u8> = Rgb([0xdd, 0xdd, 0xdd]);

/// Which order statistic a rank filter keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankFilter {
    Min,
    Max,
}

/// Resize by `factor`; each side is truncated and kept at least 1 px
pub fn rescale(image: &RgbImage, factor: f64, filter: FilterType) -> RgbImage {
    let (width, height) = image.dimensions();
    let scaled_width = ((width as f64 * factor) as u32).max(1);
    let scaled_height = ((height as f64 * factor) as u32).max(1);
    imageops::resize(image, scaled_width, scaled_height, filter)
}

/// Resample to `factor` times the size and back, losing detail but not geometry
pub fn resample_round_trip(image: &RgbImage, factor: f64, filter: FilterType) -> RgbImage {
    let (width, height) = image.dimensions();
    let scaled = rescale(image, factor, filter);
    imageops::resize(&scaled, width, height, filter)
}

/// Encode as JPEG at `quality` and decode again
pub fn jpeg_round_trip(image: &RgbImage, quality: u8) -> Result<RgbImage> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality).encode_image(image)?;
    let decoded = image::load_from_memory_with_format(&buffer, ImageFormat::Jpeg)?;
    Ok(decoded.to_rgb8())
}

/// Shift each channel horizontally by its own offset, wrapping at the edges
pub fn shift_channels(image: &RgbImage, offsets: [i32; 3]) -> RgbImage {
    let (width, height) = image.dimensions();
    let w = width as i32;

    RgbImage::from_fn(width, height, |x, y| {
        let mut px = Rgb([0, 0, 0]);
        for (c, offset) in offsets.iter().enumerate() {
            let src_x = (x as i32 - offset).rem_euclid(w) as u32;
            px[c] = image.get_pixel(src_x, y)[c];
        }
        px
    })
}

/// Lookup table for `floor((v / 255)^gamma * 255)`
pub fn gamma_lut(gamma: f64) -> [u8; 256] {
    let mut lut = [0u8; 256];
    for (v, entry) in lut.iter_mut().enumerate() {
        *entry = ((v as f64 / 255.0).powf(gamma) * 255.0).floor().clamp(0.0, 255.0) as u8;
    }
    lut
}

pub fn apply_gamma(mut image: RgbImage, gamma: f64) -> RgbImage {
    let lut = gamma_lut(gamma);
    for px in image.pixels_mut() {
        for c in 0..3 {
            px[c] = lut[px[c] as usize];
        }
    }
    image
}

/// Grid spacing for a background of the given complexity
pub fn grid_spacing(complexity: u32) -> u32 {
    40u32.saturating_sub(6 * complexity).max(5)
}

/// White backdrop with a light grid and, at higher complexity, scattered specks
pub fn grid_background(width: u32, height: u32, complexity: u32, rng: &mut dyn RngCore) -> RgbImage {
    let mut background = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    let spacing = grid_spacing(complexity) as usize;

    for x in (0..width).step_by(spacing) {
        for y in 0..height {
            background.put_pixel(x, y, GRID_COLOR);
        }
    }
    for y in (0..height).step_by(spacing) {
        for x in 0..width {
            background.put_pixel(x, y, GRID_COLOR);
        }
    }

    if complexity > 2 && width > 0 && height > 0 {
        for _ in 0..10 * complexity {
            let x = rng.random_range(0..width);
            let y = rng.random_range(0..height);
            background.put_pixel(x, y, SPECK_COLOR);
        }
    }

    background
}

/// Put the label over `background`; with a mask the label is blended by its alpha,
/// without one it covers the background completely
pub fn composite_over(label: &RgbImage, background: RgbImage, mask: Option<&GrayImage>) -> RgbImage {
    let mask = match mask {
        Some(mask) if mask.dimensions() == label.dimensions() => mask,
        _ => return label.clone(),
    };

    let mut out = background;
    for (x, y, dst) in out.enumerate_pixels_mut() {
        let a = mask.get_pixel(x, y)[0] as f32 / 255.0;
        let src = label.get_pixel(x, y);
        for c in 0..3 {
            let v = src[c] as f32 * a + dst[c] as f32 * (1.0 - a);
            dst[c] = v.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Square min or max filter; windows are clamped at the borders
pub fn rank_filter(image: &RgbImage, size: u32, kind: RankFilter) -> RgbImage {
    if size <= 1 {
        return image.clone();
    }

    let (width, height) = image.dimensions();
    let half = (size / 2) as i64;
    let upper = size as i64 - half - 1;
    let mut filtered = RgbImage::new(width, height);

    for y in 0..height {
        for x in 0..width {
            let mut acc = match kind {
                RankFilter::Min => [u8::MAX; 3],
                RankFilter::Max => [u8::MIN; 3],
            };

            for ny in (y as i64 - half).max(0)..=(y as i64 + upper).min(height as i64 - 1) {
                for nx in (x as i64 - half).max(0)..=(x as i64 + upper).min(width as i64 - 1) {
                    let px = image.get_pixel(nx as u32, ny as u32);
                    for c in 0..3 {
                        acc[c] = match kind {
                            RankFilter::Min => acc[c].min(px[c]),
                            RankFilter::Max => acc[c].max(px[c]),
                        };
                    }
                }
            }

            filtered.put_pixel(x, y, Rgb(acc));
        }
    }

    filtered
}

/// The realism stages in application order for intensity `i`
pub fn realism_chain<'a>(intensity: f64) -> EffectChain<'a> {
    let i = intensity.clamp(0.0, 1.0);

    EffectChain::new()
        .stage("scaling", i, move |img, mask, rng| {
            let factor = rng.random_range((1.0 - i / 2.0).max(0.5)..=(1.0 + i).min(2.0));
            let filter = *SCALING_FILTERS.choose(rng).unwrap_or(&FilterType::Triangle);
            log::debug!("Resampling by {:.2} with {:?}", factor, filter);
            // the alpha mask is fixed, so alpha canvases keep their size
            match mask {
                Some(_) => Ok(resample_round_trip(&img, factor, filter)),
                None => Ok(rescale(&img, factor, filter)),
            }
        })
        .stage("jpeg", i, move |img, _, rng| {
            let min_quality = (90 - (50.0 * i).floor() as i32).max(20) as u8;
            let quality = rng.random_range(min_quality..=90);
            jpeg_round_trip(&img, quality)
        })
        .stage("channel_shift", i / 2.0, |img, _, rng| {
            let offsets = [
                rng.random_range(-1..=1),
                rng.random_range(-1..=1),
                rng.random_range(-1..=1),
            ];
            Ok(shift_channels(&img, offsets))
        })
        .stage("gamma", i, move |img, _, rng| {
            let gamma = rng.random_range((2.4 - i).max(1.5)..=(2.4 + i).min(3.0));
            Ok(apply_gamma(img, gamma))
        })
        .stage("background", i, move |img, mask, rng| {
            let complexity = (5.0 * i).floor() as u32;
            let background = grid_background(img.width(), img.height(), complexity, rng);
            Ok(composite_over(&img, background, mask))
        })
        .stage("morphology", i / 3.0, move |img, _, rng| {
            let sizes = [1, ((1.0 + 4.0 * i).floor() as u32).min(5)];
            let size = *sizes.choose(rng).unwrap_or(&1);
            let kind = if rng.random_bool(0.5) {
                RankFilter::Max
            } else {
                RankFilter::Min
            };
            Ok(rank_filter(&img, size, kind))
        })
}

/// Degrade the label the way a scanned or photographed print looks; codec failures are fatal
pub fn enhance_realism(canvas: Canvas, intensity: f64, rng: &mut dyn RngCore) -> Result<Canvas> {
    let chain = realism_chain(intensity);
    canvas.map_rgb(|rgb, mask| chain.apply(rgb, mask, rng).map(|(img, _)| img))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::ColorMode;
    use image::{Luma, Rgba, RgbaImage};
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn alpha_label() -> Canvas {
        Canvas::Rgba(RgbaImage::from_fn(40, 20, |x, y| {
            let ink = (10..30).contains(&x) && (5..15).contains(&y);
            if ink {
                Rgba([20, 20, 20, 255])
            } else {
                Rgba([0, 0, 0, (x % 3) as u8 * 60])
            }
        }))
    }

    #[test]
    fn gamma_lut_values() {
        let lut = gamma_lut(2.0);
        assert_eq!(lut[0], 0);
        assert_eq!(lut[255], 255);
        // (128 / 255)^2 * 255 = 64.25
        assert_eq!(lut[128], 64);
    }

    #[test]
    fn gamma_keeps_alpha_identical() {
        let canvas = alpha_label();
        let alpha = canvas.alpha().unwrap();
        let out = canvas.map_rgb(|rgb, _| Ok(apply_gamma(rgb, 2.2))).unwrap();
        assert_eq!(out.alpha().unwrap(), alpha);
    }

    #[test]
    fn scaling_keeps_geometry_and_alpha() {
        let canvas = alpha_label();
        let alpha = canvas.alpha().unwrap();
        let out = canvas
            .map_rgb(|rgb, _| Ok(resample_round_trip(&rgb, 0.5, FilterType::Triangle)))
            .unwrap();
        assert_eq!(out.dimensions(), (40, 20));
        assert_eq!(out.alpha().unwrap(), alpha);
    }

    #[test]
    fn opaque_scaling_changes_size_by_factor() {
        let img = RgbImage::from_pixel(40, 20, Rgb([200, 200, 200]));
        assert_eq!(rescale(&img, 2.0, FilterType::Triangle).dimensions(), (80, 40));
        assert_eq!(rescale(&img, 0.55, FilterType::Nearest).dimensions(), (22, 11));

        let chain = EffectChain::new().stage("scaling", 1.0, |img, mask, _| {
            assert!(mask.is_none());
            Ok(rescale(&img, 1.5, FilterType::CatmullRom))
        });
        let out = Canvas::Rgb(img)
            .map_rgb(|rgb, mask| {
                let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
                chain.apply(rgb, mask, &mut rng).map(|(img, _)| img)
            })
            .unwrap();
        assert_eq!(out.dimensions(), (60, 30));
    }

    #[test]
    fn realism_can_resize_opaque_labels() {
        let resized = (0..16).any(|seed| {
            let opaque = Canvas::Rgb(RgbImage::from_pixel(30, 12, Rgb([240, 240, 240])));
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
            enhance_realism(opaque, 1.0, &mut rng).unwrap().dimensions() != (30, 12)
        });
        assert!(resized);
    }

    #[test]
    fn channel_shift_wraps() {
        let img = RgbImage::from_fn(3, 1, |x, _| Rgb([x as u8, 10 + x as u8, 20 + x as u8]));
        let out = shift_channels(&img, [1, 0, -1]);
        assert_eq!(out.get_pixel(0, 0), &Rgb([2, 10, 21]));
        assert_eq!(out.get_pixel(2, 0), &Rgb([1, 12, 20]));
    }

    #[test]
    fn jpeg_round_trip_keeps_size() {
        let img = RgbImage::from_fn(17, 9, |x, y| Rgb([(x * 15) as u8, (y * 25) as u8, 128]));
        let out = jpeg_round_trip(&img, 50).unwrap();
        assert_eq!(out.dimensions(), (17, 9));
    }

    #[test]
    fn min_filter_spreads_dark_pixel() {
        let mut img = RgbImage::from_pixel(5, 5, Rgb([255, 255, 255]));
        img.put_pixel(2, 2, Rgb([0, 0, 0]));

        let eroded = rank_filter(&img, 3, RankFilter::Min);
        assert_eq!(eroded.get_pixel(1, 1), &Rgb([0, 0, 0]));
        assert_eq!(eroded.get_pixel(0, 0), &Rgb([255, 255, 255]));

        let dilated = rank_filter(&img, 3, RankFilter::Max);
        assert!(dilated.pixels().all(|p| p == &Rgb([255, 255, 255])));
        assert_eq!(rank_filter(&img, 1, RankFilter::Min), img);
    }

    #[test]
    fn grid_shows_through_transparent_pixels() {
        let label = RgbImage::from_pixel(10, 10, Rgb([0, 0, 0]));
        let mask = GrayImage::from_fn(10, 10, |x, _| Luma([if x < 5 { 255 } else { 0 }]));
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let background = grid_background(10, 10, 0, &mut rng);

        let out = composite_over(&label, background.clone(), Some(&mask));
        assert_eq!(out.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(out.get_pixel(7, 0), &GRID_COLOR);
        assert_eq!(out.get_pixel(7, 3), &Rgb([255, 255, 255]));

        assert_eq!(composite_over(&label, background, None), label);
    }

    #[test]
    fn grid_spacing_bottoms_out() {
        assert_eq!(grid_spacing(0), 40);
        assert_eq!(grid_spacing(5), 10);
        assert_eq!(grid_spacing(7), 5);
    }

    #[test]
    fn full_intensity_keeps_mode_and_alpha() {
        for seed in 0..8 {
            let canvas = alpha_label();
            let alpha = canvas.alpha().unwrap();
            let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
            let out = enhance_realism(canvas, 1.0, &mut rng).unwrap();
            assert_eq!(out.mode(), ColorMode::Alpha);
            assert_eq!(out.alpha().unwrap(), alpha);
        }

        let opaque = Canvas::Rgb(RgbImage::from_pixel(30, 12, Rgb([240, 240, 240])));
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(99);
        let out = enhance_realism(opaque, 1.0, &mut rng).unwrap();
        assert_eq!(out.mode(), ColorMode::Opaque);
    }
}
